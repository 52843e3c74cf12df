//! crates/relevamiento_core/src/sections/risk_factors.rs
//!
//! Environmental risk factors around the site, answered row by row in a
//! fixed table.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error};

use super::{SubmitGuard, SubmitOutcome};
use crate::domain::RiskFactor;
use crate::ports::{BulkAck, Notification, Notifier, SurveyGateway};
use crate::store::slices::{RiskFactors, RiskFactorsAction, SchoolSpace};
use crate::store::{Action, Store};

/// The editable columns of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskFactorField {
    Disponibilidad,
    Distancia,
    Mitigacion,
}

pub struct RiskFactorsSection {
    store: Arc<Store>,
    gateway: Arc<dyn SurveyGateway>,
    notifier: Arc<dyn Notifier>,
    rows: Mutex<Vec<RiskFactor>>,
    guard: SubmitGuard,
}

impl RiskFactorsSection {
    pub fn new(
        store: Arc<Store>,
        gateway: Arc<dyn SurveyGateway>,
        notifier: Arc<dyn Notifier>,
        rows: Vec<RiskFactor>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            rows: Mutex::new(rows),
            guard: SubmitGuard::default(),
        }
    }

    fn rows_mut(&self) -> std::sync::MutexGuard<'_, Vec<RiskFactor>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn rows(&self) -> Vec<RiskFactor> {
        self.rows_mut().clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.guard.is_active()
    }

    /// Sets one cell. Returns false when `index` is out of range.
    pub fn set_field(&self, index: usize, field: RiskFactorField, value: impl Into<String>) -> bool {
        let mut rows = self.rows_mut();
        let Some(row) = rows.get_mut(index) else {
            return false;
        };
        let cell = match field {
            RiskFactorField::Disponibilidad => &mut row.disponibilidad,
            RiskFactorField::Distancia => &mut row.distancia,
            RiskFactorField::Mitigacion => &mut row.mitigacion,
        };
        *cell = value.into();
        true
    }

    fn any_answered(rows: &[RiskFactor]) -> bool {
        rows.iter().any(|r| {
            [&r.disponibilidad, &r.distancia, &r.mitigacion]
                .iter()
                .any(|v| !v.trim().is_empty())
        })
    }

    /// Sends the whole table. On success the rows become the slice value.
    pub async fn submit(&self) -> SubmitOutcome {
        let Some(_in_flight) = self.guard.try_begin() else {
            debug!("risk factors submit already pending");
            return SubmitOutcome::InFlight;
        };

        let rows = self.rows();
        if !Self::any_answered(&rows) {
            self.notifier.notify(Notification::warning(
                "Complete at least one field before continuing.",
            ));
            return SubmitOutcome::Rejected;
        }
        let Some(relevamiento_id) = self
            .store
            .select::<SchoolSpace, _>(|s| s.relevamiento_id)
            .flatten()
        else {
            self.notifier.notify(Notification::error("No survey is active."));
            return SubmitOutcome::Rejected;
        };

        let tagged: Vec<RiskFactor> = rows
            .into_iter()
            .map(|row| RiskFactor {
                relevamiento_id: Some(relevamiento_id),
                ..row
            })
            .collect();

        match self.gateway.save_risk_factors(&tagged).await {
            Ok(BulkAck { success: true }) => {
                if let Err(err) = self
                    .store
                    .dispatch(Action::new::<RiskFactors>(RiskFactorsAction::Set(tagged)))
                {
                    error!(error = %err, "Failed to keep saved risk factors");
                }
                self.notifier
                    .notify(Notification::success("Risk factors saved successfully."));
                SubmitOutcome::Submitted
            }
            Ok(ack) => {
                error!(?ack, "Risk factors endpoint did not confirm the write");
                self.notifier
                    .notify(Notification::error("Error saving the risk factors."));
                SubmitOutcome::Failed
            }
            Err(err) => {
                error!(error = %err, "Failed to send risk factors");
                self.notifier
                    .notify(Notification::error("Error saving the risk factors."));
                SubmitOutcome::Failed
            }
        }
    }
}
