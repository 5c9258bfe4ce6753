//! Chat command language.
//!
//! A command is a message of the form `$ <cmd> [<arg>...] [-c <N>]`, optionally
//! prefixed by a reminder marker. [`parse`] turns raw text into a [`Command`];
//! [`table::CommandTable`] maps the command name to an action.

pub mod actions;
pub mod table;

/// Marks a message as directed at the bot
pub const TRIGGER: &str = "$";

/// Repeat-count flag. Matched as a substring of a token.
pub const COUNT_FLAG: &str = "-c";

const REMINDER_PREFIX: &str = "Reminder:";
const REMINDER_PREFIX_JA: [&str; 2] = ["リマインダー", ":"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Not addressed to the bot, or nothing after the trigger
    Invalid { input: String },
    Valid(ValidCommand),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidCommand {
    pub input: String,
    pub cmd: String,
    pub args: Vec<String>,
    /// Always at least 1
    pub runs: u32,
}

impl Command {
    pub fn is_cmd(&self) -> bool {
        matches!(self, Command::Valid(_))
    }
}

/// Drop one trailing period and squeeze runs of spaces
pub fn trim(raw: &str) -> String {
    let text = raw.strip_suffix('.').unwrap_or(raw);
    let mut out = String::with_capacity(text.len());
    let mut prev_space = false;
    for c in text.chars() {
        if c == ' ' {
            if !prev_space {
                out.push(c);
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }
    out
}

pub fn tokenize(raw: &str) -> Vec<String> {
    trim(raw).split(' ').map(str::to_string).collect()
}

/// Remove a reminder marker at the head of the token list, if any
pub fn strip_reminder(mut tokens: Vec<String>) -> Vec<String> {
    if tokens.first().map(String::as_str) == Some(REMINDER_PREFIX) {
        tokens.remove(0);
    } else if tokens.len() >= 2
        && tokens[0] == REMINDER_PREFIX_JA[0]
        && tokens[1] == REMINDER_PREFIX_JA[1]
    {
        tokens.drain(..2);
    }
    tokens
}

/// Pull the `-c <N>` pair out of `tokens`.
///
/// The first token containing `-c` is the flag and the one after it is the
/// count. Both are removed unless that would leave nothing, in which case the
/// tokens are returned as they were.
pub fn extract_count(tokens: Vec<String>) -> (Vec<String>, u32) {
    let Some(idx) = tokens.iter().position(|t| t.contains(COUNT_FLAG)) else {
        return (tokens, 1);
    };

    let runs = parse_count(tokens.get(idx + 1).map(String::as_str));
    let rest: Vec<String> = tokens
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != idx && *i != idx + 1)
        .map(|(_, t)| t.clone())
        .collect();

    if rest.is_empty() {
        (tokens, runs)
    } else {
        (rest, runs)
    }
}

/// Leading-digits integer parse; anything that does not yield a positive
/// count becomes 1.
fn parse_count(value: Option<&str>) -> u32 {
    let Some(value) = value else {
        return 1;
    };
    let value = value.strip_prefix('+').unwrap_or(value);
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    match digits.parse::<u32>() {
        Ok(n) if n >= 1 => n,
        _ => 1,
    }
}

pub fn parse(raw: &str) -> Command {
    let invalid = || Command::Invalid {
        input: raw.to_string(),
    };

    let mut tokens = strip_reminder(tokenize(raw));
    if tokens.first().map(String::as_str) != Some(TRIGGER) {
        return invalid();
    }
    tokens.remove(0);
    if tokens.is_empty() {
        return invalid();
    }

    let (tokens, runs) = extract_count(tokens);
    let mut tokens = tokens.into_iter();
    let Some(cmd) = tokens.next() else {
        return invalid();
    };

    Command::Valid(ValidCommand {
        input: raw.to_string(),
        cmd,
        args: tokens.collect(),
        runs,
    })
}
