//! crates/relevamiento_client/src/lib.rs
//!
//! Host-side wiring of a survey client: HTTP gateway, durable storage,
//! notifications and a store rehydrated from what the last run persisted.

pub mod config;
pub mod gateway;
pub mod notify;
pub mod storage;

use relevamiento_core::domain::RiskFactor;
use relevamiento_core::ports::{Notifier, PortError, SurveyGateway};
use relevamiento_core::store::slices::{SchoolSpace, SchoolSpaceAction};
use relevamiento_core::{
    survey_store, Action, DispatchHook, PersistenceBridge, RiskFactorsSection, Store, StoreError,
    VisitsSection,
};
use std::sync::Arc;
use tracing::{info, warn};

pub use config::{ClientConfig, ConfigError};
pub use gateway::HttpSurveyGateway;
pub use notify::TracingNotifier;
pub use storage::{storage_for, FileStorage};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("State container error: {0}")]
    Store(#[from] StoreError),

    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),
}

/// Everything a survey screen needs, wired once at startup.
pub struct ClientContext {
    pub store: Arc<Store>,
    pub gateway: Arc<dyn SurveyGateway>,
    pub bridge: Arc<PersistenceBridge>,
    pub notifier: Arc<dyn Notifier>,
}

impl ClientContext {
    /// Assembles a context from already-built parts and rehydrates the store
    /// from `bridge` before anything can dispatch.
    pub fn assemble(
        gateway: Arc<dyn SurveyGateway>,
        bridge: Arc<PersistenceBridge>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ClientError> {
        let hook: Arc<dyn DispatchHook> = bridge.clone();
        let store = survey_store(vec![hook])?;

        if let Some(persisted) = bridge.restore() {
            match store.rehydrate(&persisted) {
                Ok(snapshot) => {
                    let slices: Vec<&str> = snapshot.slice_names().collect();
                    info!(?slices, "Client state restored");
                }
                Err(err) => warn!(error = %err, "Persisted client state ignored"),
            }
        }

        Ok(Self {
            store: Arc::new(store),
            gateway,
            bridge,
            notifier,
        })
    }

    /// The survey currently being filled in, if any.
    pub fn active_survey(&self) -> Option<i64> {
        self.store
            .select::<SchoolSpace, _>(|s| s.relevamiento_id)
            .flatten()
    }

    /// Opens a new survey for building `cui` and makes it the active one.
    pub async fn start_survey(&self, cui: i64, created_by: &str) -> Result<i64, ClientError> {
        let id = self.gateway.create_survey(cui, created_by).await?;
        self.store
            .dispatch(Action::new::<SchoolSpace>(SchoolSpaceAction::SetCui(Some(cui))))?;
        self.store
            .dispatch(Action::new::<SchoolSpace>(SchoolSpaceAction::SetRelevamientoId(id)))?;
        info!(relevamiento_id = id, cui, "Survey started");
        Ok(id)
    }

    pub fn visits_section(&self) -> VisitsSection {
        VisitsSection::new(
            Arc::clone(&self.store),
            Arc::clone(&self.gateway),
            Arc::clone(&self.notifier),
        )
    }

    pub fn risk_factors_section(&self, rows: Vec<RiskFactor>) -> RiskFactorsSection {
        RiskFactorsSection::new(
            Arc::clone(&self.store),
            Arc::clone(&self.gateway),
            Arc::clone(&self.notifier),
            rows,
        )
    }
}

/// Builds the client described by `config`.
pub fn bootstrap(config: &ClientConfig) -> Result<ClientContext, ClientError> {
    let gateway: Arc<dyn SurveyGateway> = Arc::new(HttpSurveyGateway::new(config)?);
    let storage = storage_for(config.storage_path.as_deref());
    let bridge = Arc::new(PersistenceBridge::new(storage));
    ClientContext::assemble(gateway, bridge, Arc::new(TracingNotifier))
}
