//! Command routing across plugins.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

use super::event::ChatEvent;
use super::reply::Reply;

/// A chat plugin.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name, used in logs.
    fn name(&self) -> &str;

    /// Handle an event. Returns `true` when the plugin consumed it.
    async fn handle(&self, event: &ChatEvent, reply: &dyn Reply) -> Result<bool>;
}

/// Offers each event to the plugins in order until one consumes it.
pub struct Router {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl Router {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self { plugins }
    }

    /// Route one event. Plugin failures are logged and the event is dropped
    /// without a reply.
    pub async fn route(&self, event: &ChatEvent, reply: &dyn Reply) -> bool {
        for plugin in &self.plugins {
            match plugin.handle(event, reply).await {
                Ok(true) => {
                    tracing::debug!(
                        plugin = plugin.name(),
                        room = event.room,
                        sender = event.sender.id,
                        command = event.command(),
                        "Event handled"
                    );
                    return true;
                }
                Ok(false) => continue,
                Err(e) => {
                    tracing::error!(
                        plugin = plugin.name(),
                        room = event.room,
                        sender = event.sender.id,
                        "Command failed: {}",
                        e
                    );
                    return false;
                }
            }
        }
        false
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }
}
