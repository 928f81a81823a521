use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::app::Application;
use crate::protocol::HandshakeRequest;

/// Builds a fresh application for each accepted connection.
pub type AppFactory = Arc<dyn Fn(&HandshakeRequest) -> Box<dyn Application> + Send + Sync>;

/// A named application factory.
#[derive(Clone)]
pub struct Registration {
    name: String,
    factory: AppFactory,
}

impl Registration {
    /// Identifier the application was registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create an application instance for `request`.
    #[must_use]
    pub fn instantiate(&self, request: &HandshakeRequest) -> Box<dyn Application> {
        (self.factory)(request)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Application factories keyed by virtual host.
///
/// The `None` key is the default entry, used when the request carries no
/// `Host` header or names a host with no registration of its own. Host
/// names compare case-insensitively, including any `:port` suffix.
#[derive(Debug, Clone, Default)]
pub struct AppRegistry {
    apps: HashMap<Option<String>, Registration>,
}

impl AppRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` as `name` for `host`. The last registration for a host wins.
    pub fn register<F>(&mut self, name: impl Into<String>, host: Option<&str>, factory: F)
    where
        F: Fn(&HandshakeRequest) -> Box<dyn Application> + Send + Sync + 'static,
    {
        let name = name.into();
        let key = host.map(str::to_ascii_lowercase);
        info!(
            app = %name,
            host = key.as_deref().unwrap_or("default"),
            "registered app"
        );
        self.apps.insert(
            key,
            Registration {
                name,
                factory: Arc::new(factory),
            },
        );
    }

    /// Find the registration for `host`, falling back to the default entry.
    #[must_use]
    pub fn lookup(&self, host: Option<&str>) -> Option<&Registration> {
        host.and_then(|h| self.apps.get(&Some(h.to_ascii_lowercase())))
            .or_else(|| self.apps.get(&None))
    }

    /// The default registration, if any.
    #[must_use]
    pub fn default_app(&self) -> Option<&Registration> {
        self.apps.get(&None)
    }

    /// Number of registered hosts, the default entry included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}
