use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::SlackConfig;
use crate::platform::events::{self, Event};
use crate::platform::{ChannelInfo, ChatApi, OutboundMessage, SelfInfo, UserInfo};

/// Result of `rtm.connect`
#[derive(Debug, Clone, Deserialize)]
pub struct RtmSession {
    pub url: String,
    #[serde(rename = "self")]
    pub self_info: SelfInfo,
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: UserInfo,
}

#[derive(Debug, Deserialize)]
struct ChannelEnvelope {
    channel: ChannelInfo,
}

#[derive(Debug, Deserialize)]
struct MembersPage {
    members: Vec<String>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

/// Slack Web API client. Proxies come from the usual `http_proxy` /
/// `https_proxy` variables, which reqwest picks up on its own.
pub struct SlackClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl SlackClient {
    pub fn new(config: &SlackConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn get<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> Result<T> {
        debug!("Slack API call: {}", method);
        let response = self
            .client
            .get(self.url(method))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to send request to Slack ({})", method))?;
        decode_response(method, response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &impl serde::Serialize,
    ) -> Result<T> {
        debug!("Slack API call: {}", method);
        let response = self
            .client
            .post(self.url(method))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to Slack ({})", method))?;
        decode_response(method, response).await
    }

    /// Authenticate and obtain the WebSocket URL plus the bot's identity
    pub async fn rtm_connect(&self) -> Result<RtmSession> {
        self.get("rtm.connect", &[]).await
    }

    async fn channel_members(&self, channel_id: &str) -> Result<Vec<String>> {
        let mut members = Vec::new();
        let mut cursor = String::new();
        loop {
            let mut query = vec![("channel", channel_id), ("limit", "1000")];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.as_str()));
            }
            let page: MembersPage = self.get("conversations.members", &query).await?;
            members.extend(page.members);
            match page.response_metadata {
                Some(meta) if !meta.next_cursor.is_empty() => cursor = meta.next_cursor,
                _ => break,
            }
        }
        Ok(members)
    }
}

async fn decode_response<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        anyhow::bail!("Slack API error ({}, {}): {}", method, status, error_body);
    }

    let body: serde_json::Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse Slack response ({})", method))?;
    check_envelope(method, body)
}

/// Slack answers 200 for most application errors; the `ok` field decides.
fn check_envelope<T: DeserializeOwned>(method: &str, body: serde_json::Value) -> Result<T> {
    if body.get("ok").and_then(|ok| ok.as_bool()) != Some(true) {
        let err = body
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("unknown");
        anyhow::bail!("Slack {} failed: {}", method, err);
    }
    serde_json::from_value(body).with_context(|| format!("Unexpected Slack response ({})", method))
}

#[async_trait]
impl ChatApi for SlackClient {
    async fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo> {
        let envelope: ChannelEnvelope = self
            .get("conversations.info", &[("channel", channel_id)])
            .await
            .with_context(|| format!("failed to fetch channel info(id: {})", channel_id))?;
        let mut channel = envelope.channel;
        channel.members = self.channel_members(channel_id).await?;
        Ok(channel)
    }

    async fn user_info(&self, user_id: &str) -> Result<UserInfo> {
        let envelope: UserEnvelope = self
            .get("users.info", &[("user", user_id)])
            .await
            .with_context(|| format!("Cannot find user: {}", user_id))?;
        Ok(envelope.user)
    }

    async fn post_message(&self, message: &OutboundMessage) -> Result<()> {
        let _: serde_json::Value = self.post("chat.postMessage", message).await?;
        Ok(())
    }
}

/// Read RTM frames from `url` and forward decoded events until the socket
/// closes or the receiver goes away. Malformed frames are logged and dropped.
pub async fn listen(url: &str, tx: mpsc::Sender<Event>) -> Result<()> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .context("Failed to open RTM WebSocket")?;
    let (mut write, mut read) = ws_stream.split();

    info!("RTM connected and listening for events...");

    while let Some(frame) = read.next().await {
        let text = match frame {
            Ok(Message::Text(t)) => t,
            Ok(Message::Ping(payload)) => {
                if let Err(e) = write.send(Message::Pong(payload)).await {
                    warn!("RTM: failed to send pong: {}", e);
                    break;
                }
                continue;
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                warn!("RTM WebSocket error: {}", e);
                break;
            }
            _ => continue,
        };

        let event = match events::parse_event(&text) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping event: {:#} ({})", e, text);
                continue;
            }
        };

        if tx.send(event).await.is_err() {
            return Ok(());
        }
    }

    info!("RTM connection closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_ok_is_decoded() {
        let user: UserEnvelope = check_envelope(
            "users.info",
            json!({"ok": true, "user": {"id": "U1", "name": "taro", "real_name": "Taro"}}),
        )
        .unwrap();
        assert_eq!(user.user.name, "taro");
    }

    #[test]
    fn test_envelope_error_is_surfaced() {
        let err = check_envelope::<UserEnvelope>(
            "users.info",
            json!({"ok": false, "error": "user_not_found"}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("user_not_found"));
    }

    #[test]
    fn test_envelope_without_ok_is_rejected() {
        assert!(check_envelope::<serde_json::Value>("chat.postMessage", json!({})).is_err());
    }

    #[test]
    fn test_rtm_session_decoding() {
        let session: RtmSession = check_envelope(
            "rtm.connect",
            json!({
                "ok": true,
                "url": "wss://example.invalid/websocket/abc",
                "team": {"id": "T1", "name": "team", "domain": "team"},
                "self": {"id": "UBOT00001", "name": "fbot"}
            }),
        )
        .unwrap();
        assert_eq!(session.url, "wss://example.invalid/websocket/abc");
        assert_eq!(session.self_info.name, "fbot");
    }

    #[test]
    fn test_members_page_cursor() {
        let page: MembersPage = check_envelope(
            "conversations.members",
            json!({"ok": true, "members": ["U1", "U2"], "response_metadata": {"next_cursor": "abc"}}),
        )
        .unwrap();
        assert_eq!(page.members.len(), 2);
        assert_eq!(page.response_metadata.unwrap().next_cursor, "abc");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let config = SlackConfig {
            bot_token: "t".to_string(),
            channel: "C1".to_string(),
            api_base_url: "http://localhost:9000/api/".to_string(),
        };
        let client = SlackClient::new(&config);
        assert_eq!(client.url("users.info"), "http://localhost:9000/api/users.info");
    }
}
