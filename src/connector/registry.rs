//! Connectors by system name.

use super::Connector;
use crate::error::{BuildError, BuildResult};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Registered connectors. Filled while building the dispatcher, read-only
/// afterwards.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under [`Connector::name`]. Names are unique.
    pub fn register(&mut self, connector: Arc<dyn Connector>) -> BuildResult<()> {
        let name = connector.name().to_string();
        if self.connectors.contains_key(&name) {
            return Err(BuildError::DuplicateConnector { system: name });
        }
        self.connectors.insert(name, connector);
        Ok(())
    }

    pub fn get(&self, system: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.get(system).cloned()
    }

    pub fn contains(&self, system: &str) -> bool {
        self.connectors.contains_key(system)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.connectors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

impl fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("connectors", &self.names())
            .finish()
    }
}
