//! crates/relevamiento_core/src/ports.rs
//!
//! Defines the service contracts (traits) around the survey core.
//! The server implements `DatabaseService` against its datastore; the client
//! implements `SurveyGateway`, `DurableStorage` and `Notifier` against its host.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{
    AccessibilityCondition, ConservationState, DiningService, NewSiteWork, OutdoorArea,
    RiskFactor, RoomDimensions, SiteWork, SurveySession, SurveyStatus, Visit,
};
use crate::validation::ValidationError;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl From<ValidationError> for PortError {
    fn from(err: ValidationError) -> Self {
        PortError::Invalid(err.to_string())
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Server-side Port
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Survey sessions ---
    async fn create_survey(&self, cui: i64, created_by: &str) -> PortResult<SurveySession>;

    async fn get_survey(&self, id: i64) -> PortResult<SurveySession>;

    async fn list_surveys_by_cui(&self, cui: i64) -> PortResult<Vec<SurveySession>>;

    async fn update_survey_status(&self, id: i64, status: SurveyStatus) -> PortResult<()>;

    // --- Visits ---
    async fn get_visits(&self, relevamiento_id: i64) -> PortResult<Vec<Visit>>;

    /// Replaces every visit of `relevamiento_id` with `visits`, all or nothing.
    async fn replace_visits(&self, relevamiento_id: i64, visits: &[Visit]) -> PortResult<()>;

    // --- Site ---
    async fn list_site_works(&self) -> PortResult<Vec<SiteWork>>;

    async fn create_site_work(&self, work: NewSiteWork) -> PortResult<i64>;

    async fn save_risk_factors(&self, factors: &[RiskFactor]) -> PortResult<()>;

    async fn list_outdoor_areas(&self, relevamiento_id: i64) -> PortResult<Vec<OutdoorArea>>;

    // --- Constructions ---
    async fn get_construction_institutions(
        &self,
        relevamiento_id: i64,
        construccion_id: i64,
    ) -> PortResult<Vec<i64>>;

    async fn replace_construction_institutions(
        &self,
        relevamiento_id: i64,
        construccion_id: i64,
        institution_ids: &[i64],
    ) -> PortResult<()>;

    async fn save_accessibility(
        &self,
        relevamiento_id: i64,
        construccion_id: i64,
        conditions: &[AccessibilityCondition],
    ) -> PortResult<()>;

    /// Replaces the dining answers of one construction.
    async fn save_dining_use(
        &self,
        relevamiento_id: i64,
        construccion_id: i64,
        services: &[DiningService],
    ) -> PortResult<()>;

    /// Replaces the conservation rows of every construction named in `states`.
    async fn save_conservation_states(&self, states: &[ConservationState]) -> PortResult<()>;

    async fn update_room_dimensions(&self, local_id: i64, dims: RoomDimensions) -> PortResult<()>;
}

//=========================================================================================
// Client-side Ports
//=========================================================================================

/// Body of a successful bulk write. Anything without `success: true` is a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAck {
    #[serde(default)]
    pub success: bool,
}

/// The endpoint calls the survey sections make.
#[async_trait]
pub trait SurveyGateway: Send + Sync {
    /// Opens a new survey and returns its server-assigned identifier.
    async fn create_survey(&self, cui: i64, created_by: &str) -> PortResult<i64>;

    async fn fetch_visits(&self, relevamiento_id: i64) -> PortResult<Vec<Visit>>;

    async fn save_visits(&self, visits: &[Visit]) -> PortResult<BulkAck>;

    async fn save_risk_factors(&self, factors: &[RiskFactor]) -> PortResult<BulkAck>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage rejected the write: {0}")]
    Rejected(String),
}

/// Key-value storage that outlives the page (or process).
pub trait DurableStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A human-readable message surfaced to the person filling the survey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Success, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Info, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Error, message: message.into() }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}
