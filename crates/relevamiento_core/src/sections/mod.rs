//! crates/relevamiento_core/src/sections/mod.rs
//!
//! Survey section components: local editing over one slice, validation, and
//! a single bulk submit guarded against re-entry.

pub mod risk_factors;
pub mod visits;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::store::StoreError;
use crate::validation::ValidationError;

pub use risk_factors::{RiskFactorField, RiskFactorsSection};
pub use visits::VisitsSection;

#[derive(Debug, thiserror::Error)]
pub enum SectionError {
    #[error("No survey is active")]
    NoActiveSurvey,
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("Visit number {0} does not exist")]
    UnknownVisit(u32),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How a bulk submit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The endpoint confirmed the write.
    Submitted,
    /// Nothing was sent: empty section, no survey, or invalid records.
    Rejected,
    /// The call was made and failed, or came back without a success flag.
    Failed,
    /// Another submit of this section is still pending; nothing was sent.
    InFlight,
}

/// Cooperative re-entrancy guard for a submit action.
#[derive(Debug, Default)]
pub struct SubmitGuard {
    in_flight: AtomicBool,
}

impl SubmitGuard {
    /// Claims the guard, or `None` while another claim is alive.
    pub fn try_begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight {
                flag: &self.in_flight,
            })
    }

    pub fn is_active(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Releases its guard when dropped, whichever way the submit ends.
#[derive(Debug)]
pub struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    use crate::domain::{RiskFactor, Visit};
    use crate::ports::{
        BulkAck, Notification, NotificationLevel, Notifier, PortError, PortResult, SurveyGateway,
    };
    use crate::store::slices::{SchoolSpace, SchoolSpaceAction};
    use crate::store::{survey_store, Action, Store};

    #[derive(Debug, Clone, Copy)]
    pub enum Reply {
        Ack(bool),
        Unreachable,
    }

    pub struct FakeGateway {
        pub reply: Reply,
        pub existing: Vec<Visit>,
        pub gate: Option<Arc<Notify>>,
        pub calls: AtomicUsize,
        pub saved_visits: Mutex<Vec<Vec<Visit>>>,
        pub saved_factors: Mutex<Vec<Vec<RiskFactor>>>,
    }

    impl FakeGateway {
        pub fn replying(reply: Reply) -> Self {
            Self {
                reply,
                existing: Vec::new(),
                gate: None,
                calls: AtomicUsize::new(0),
                saved_visits: Mutex::new(Vec::new()),
                saved_factors: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn answer(&self) -> PortResult<BulkAck> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match self.reply {
                Reply::Ack(success) => Ok(BulkAck { success }),
                Reply::Unreachable => Err(PortError::Transport("connection refused".into())),
            }
        }
    }

    #[async_trait]
    impl SurveyGateway for FakeGateway {
        async fn create_survey(&self, _cui: i64, _created_by: &str) -> PortResult<i64> {
            Ok(1)
        }

        async fn fetch_visits(&self, _relevamiento_id: i64) -> PortResult<Vec<Visit>> {
            match self.reply {
                Reply::Unreachable => Err(PortError::Transport("connection refused".into())),
                Reply::Ack(_) => Ok(self.existing.clone()),
            }
        }

        async fn save_visits(&self, visits: &[Visit]) -> PortResult<BulkAck> {
            self.saved_visits.lock().unwrap().push(visits.to_vec());
            self.answer().await
        }

        async fn save_risk_factors(&self, factors: &[RiskFactor]) -> PortResult<BulkAck> {
            self.saved_factors.lock().unwrap().push(factors.to_vec());
            self.answer().await
        }
    }

    #[derive(Default)]
    pub struct RecordingNotifier {
        pub seen: Mutex<Vec<Notification>>,
    }

    impl RecordingNotifier {
        pub fn levels(&self) -> Vec<NotificationLevel> {
            self.seen.lock().unwrap().iter().map(|n| n.level).collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: Notification) {
            self.seen.lock().unwrap().push(notification);
        }
    }

    /// A survey store with relevamiento `id` active.
    pub fn store_with_session(id: Option<i64>) -> Arc<Store> {
        let store = survey_store(Vec::new()).unwrap();
        if let Some(id) = id {
            store
                .dispatch(Action::new::<SchoolSpace>(SchoolSpaceAction::SetRelevamientoId(id)))
                .unwrap();
        }
        Arc::new(store)
    }
}
