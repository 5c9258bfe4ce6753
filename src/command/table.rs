use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::command::actions::{Action, HelpAction, OjichatAction, StatsAction, VersionAction};

/// Command name → action. Names without an entry resolve to `help`, so
/// lookup always succeeds.
pub struct CommandTable {
    actions: HashMap<String, Arc<dyn Action>>,
    /// Registration order, used for the help listing
    order: Vec<String>,
    help: Arc<dyn Action>,
}

impl CommandTable {
    pub fn empty() -> Self {
        let mut table = Self {
            actions: HashMap::new(),
            order: Vec::new(),
            help: Arc::new(HelpAction::new(std::iter::empty())),
        };
        table.refresh_help();
        table
    }

    /// The built-in command set
    pub fn new() -> Self {
        let mut table = Self::empty();
        table.register(Arc::new(OjichatAction));
        table.register(Arc::new(StatsAction));
        table.register(Arc::new(VersionAction));
        table
    }

    /// Add or replace a command; the help text is rebuilt to include it
    pub fn register(&mut self, action: Arc<dyn Action>) {
        let name = action.name().to_string();
        info!("Registered command: {} ({})", name, action.description());
        if self.actions.insert(name.clone(), action).is_none() {
            self.order.push(name);
        }
        self.refresh_help();
    }

    fn refresh_help(&mut self) {
        let listed = self
            .order
            .iter()
            .filter(|name| name.as_str() != "help")
            .filter_map(|name| self.actions.get(name))
            .map(|action| action.as_ref());
        self.help = Arc::new(HelpAction::new(listed));
    }

    pub fn resolve(&self, name: &str) -> Arc<dyn Action> {
        self.actions
            .get(name)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.help))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .map(String::as_str)
            .filter(|name| *name != "help")
            .chain(std::iter::once("help"))
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}
