pub mod domain;
pub mod ports;
pub mod sections;
pub mod store;
pub mod validation;

pub use domain::{
    AccessibilityCondition, Attachment, ClockTime, ConservationState, DiningService, Institution,
    NewSiteWork, OutdoorArea, RiskFactor, RoomDimensions, SiteWork, SurveySession, SurveyStatus,
    Visit, VisitDraft,
};
pub use ports::{
    BulkAck, DatabaseService, DurableStorage, Notification, NotificationLevel, Notifier,
    PortError, PortResult, StorageError, SurveyGateway,
};
pub use sections::{RiskFactorsSection, SectionError, SubmitOutcome, VisitsSection};
pub use store::persist::{MemoryStorage, NoopStorage, PersistenceBridge};
pub use store::{survey_store, Action, DispatchHook, Slice, Snapshot, Store, StoreError};
pub use validation::ValidationError;
