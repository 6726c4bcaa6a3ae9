//! Listener introspection for `/listeners`.

use crate::config::schema::ListenerConfig;

pub trait ListenerSource: Send + Sync {
    /// Listen addresses, in configuration order.
    fn addresses(&self) -> Vec<String>;
}

pub struct StaticListeners {
    listeners: Vec<ListenerConfig>,
}

impl StaticListeners {
    pub fn new(listeners: Vec<ListenerConfig>) -> Self {
        Self { listeners }
    }
}

impl ListenerSource for StaticListeners {
    fn addresses(&self) -> Vec<String> {
        self.listeners.iter().map(|l| l.address.clone()).collect()
    }
}
