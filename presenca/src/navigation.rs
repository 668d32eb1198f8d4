//! Where the controller sends the user once attendance is confirmed

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

/// Page router seam
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Leave the confirmation page for `route`
    async fn navigate(&self, route: &str);
}

/// Navigator that only logs the requested route
#[derive(Debug, Default, Clone)]
pub struct LoggingNavigator;

#[async_trait]
impl Navigator for LoggingNavigator {
    async fn navigate(&self, route: &str) {
        info!(route, "navigation requested");
    }
}

/// Navigator that remembers every route it was asked for
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes requested so far, oldest first
    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().clone()
    }
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn navigate(&self, route: &str) {
        self.routes.lock().push(route.to_string());
    }
}
