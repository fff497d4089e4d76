/// Game-post lifecycle decision logic.
pub mod lifecycle;

use std::{sync::Arc, time::SystemTime};

use tokio::sync::RwLock;

use crate::{
    config::AppConfig,
    dao::{party_directory::PartyDirectory, post_store::GamePostStore},
    error::ServiceError,
};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Time source injected into the service layer so deadline behavior is
/// a pure function of a supplied instant.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> SystemTime;
}

/// Wall-clock time source used outside of tests.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// The pair of storage handles installed together by the supervisor.
pub struct StorageBackend {
    /// Game-post records.
    pub posts: Arc<dyn GamePostStore>,
    /// Read-only party lookups.
    pub parties: Arc<dyn PartyDirectory>,
}

/// Central application state carrying configuration and the injected
/// storage handles. The application runs in degraded mode until a
/// backend is installed.
pub struct AppState {
    config: AppConfig,
    backend: RwLock<Option<StorageBackend>>,
    clock: Arc<dyn Clock>,
}

impl AppState {
    /// Construct an [`AppState`] wrapped in an [`Arc`] so it can be
    /// cloned cheaply. Starts degraded, on the system clock.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Construct with an explicit time source.
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> SharedState {
        Arc::new(Self {
            config,
            backend: RwLock::new(None),
            clock,
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Current instant from the injected clock.
    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    /// Install storage handles and leave degraded mode.
    pub async fn install_backend(&self, backend: StorageBackend) {
        let mut guard = self.backend.write().await;
        *guard = Some(backend);
    }

    /// Remove the storage handles and enter degraded mode.
    pub async fn clear_backend(&self) {
        let mut guard = self.backend.write().await;
        guard.take();
    }

    /// Whether the application currently has no storage backend.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.backend.read().await;
        guard.is_none()
    }

    /// Post store handle, or a degraded-mode error.
    pub async fn require_posts(&self) -> Result<Arc<dyn GamePostStore>, ServiceError> {
        let guard = self.backend.read().await;
        guard
            .as_ref()
            .map(|backend| backend.posts.clone())
            .ok_or(ServiceError::Degraded)
    }

    /// Party directory handle, or a degraded-mode error.
    pub async fn require_parties(&self) -> Result<Arc<dyn PartyDirectory>, ServiceError> {
        let guard = self.backend.read().await;
        guard
            .as_ref()
            .map(|backend| backend.parties.clone())
            .ok_or(ServiceError::Degraded)
    }
}
