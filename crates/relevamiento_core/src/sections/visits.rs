//! crates/relevamiento_core/src/sections/visits.rs
//!
//! The visits log: the visits made to complete the survey, edited locally and
//! saved in one bulk call.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error};

use super::{SectionError, SubmitGuard, SubmitOutcome};
use crate::domain::{Visit, VisitDraft};
use crate::ports::{BulkAck, Notification, Notifier, SurveyGateway};
use crate::store::slices::{SchoolSpace, Visits, VisitsAction};
use crate::store::{Action, Store};
use crate::validation::{validate_visit, validate_visit_batch, ValidationError};

pub struct VisitsSection {
    store: Arc<Store>,
    gateway: Arc<dyn SurveyGateway>,
    notifier: Arc<dyn Notifier>,
    /// Number of the visit being edited, if any.
    editing: Mutex<Option<u32>>,
    guard: SubmitGuard,
}

impl VisitsSection {
    pub fn new(
        store: Arc<Store>,
        gateway: Arc<dyn SurveyGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            editing: Mutex::new(None),
            guard: SubmitGuard::default(),
        }
    }

    fn session_id(&self) -> Option<i64> {
        self.store
            .select::<SchoolSpace, _>(|s| s.relevamiento_id)
            .flatten()
    }

    fn editing(&self) -> std::sync::MutexGuard<'_, Option<u32>> {
        self.editing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn visits(&self) -> Vec<Visit> {
        self.store
            .select::<Visits, _>(|s| s.visits.clone())
            .unwrap_or_default()
    }

    /// True while a bulk submit is pending.
    pub fn is_submitting(&self) -> bool {
        self.guard.is_active()
    }

    /// Loads the visits already saved for the active survey.
    ///
    /// Returns true when saved visits were found, meaning an existing record
    /// is being edited.
    pub async fn load_existing(&self) -> bool {
        let Some(relevamiento_id) = self.session_id() else {
            return false;
        };
        match self.gateway.fetch_visits(relevamiento_id).await {
            Ok(visits) if !visits.is_empty() => {
                match self
                    .store
                    .dispatch(Action::new::<Visits>(VisitsAction::Set(visits)))
                {
                    Ok(_) => true,
                    Err(err) => {
                        error!(error = %err, "Failed to store loaded visits");
                        false
                    }
                }
            }
            Ok(_) => false,
            Err(err) => {
                error!(relevamiento_id, error = %err, "Failed to load visits");
                false
            }
        }
    }

    /// Starts editing visit `numero_visita`; the next `add` replaces it.
    pub fn begin_edit(&self, numero_visita: u32) -> Option<VisitDraft> {
        let draft = self
            .store
            .select::<Visits, _>(|s| s.find(numero_visita).map(VisitDraft::from))
            .flatten()?;
        *self.editing() = Some(numero_visita);
        Some(draft)
    }

    pub fn cancel_edit(&self) {
        *self.editing() = None;
    }

    /// Validates `draft` and appends it, or replaces the visit being edited.
    pub fn add(&self, draft: &VisitDraft) -> Result<Visit, SectionError> {
        let Some(relevamiento_id) = self.session_id() else {
            self.notifier
                .notify(Notification::error("No survey is active."));
            return Err(SectionError::NoActiveSurvey);
        };

        let visit = validate_visit(draft, relevamiento_id).map_err(|err| self.warn(err))?;

        let mut editing = self.editing();
        let clashes = self.visits().iter().any(|v| {
            v.numero_visita == visit.numero_visita && Some(v.numero_visita) != *editing
        });
        if clashes {
            return Err(self
                .warn(ValidationError::DuplicateVisitNumber(visit.numero_visita))
                .into());
        }

        // The visit being edited may have been removed since `begin_edit`.
        let replaced = (*editing).filter(|original| {
            self.store
                .select::<Visits, _>(|s| s.find(*original).is_some())
                .unwrap_or(false)
        });
        let action = match replaced {
            Some(original) => VisitsAction::Update {
                original,
                visit: visit.clone(),
            },
            None => VisitsAction::Add(visit.clone()),
        };
        self.store.dispatch(Action::new::<Visits>(action))?;
        *editing = None;
        Ok(visit)
    }

    /// Removes visit `numero_visita`.
    pub fn remove(&self, numero_visita: u32) -> Result<(), SectionError> {
        let exists = self
            .store
            .select::<Visits, _>(|s| s.find(numero_visita).is_some())
            .unwrap_or(false);
        if !exists {
            let err = SectionError::UnknownVisit(numero_visita);
            self.notifier.notify(Notification::error(err.to_string()));
            return Err(err);
        }
        self.store
            .dispatch(Action::new::<Visits>(VisitsAction::Remove(numero_visita)))?;
        let mut editing = self.editing();
        if *editing == Some(numero_visita) {
            *editing = None;
        }
        Ok(())
    }

    /// Re-validates every visit and sends them all in one call.
    pub async fn submit_all(&self) -> SubmitOutcome {
        let Some(_in_flight) = self.guard.try_begin() else {
            debug!("visits submit already pending");
            return SubmitOutcome::InFlight;
        };

        let visits = self.visits();
        let Some(relevamiento_id) = self.session_id().filter(|_| !visits.is_empty()) else {
            self.notifier.notify(Notification::error(
                "There are no visits to save or no survey is active.",
            ));
            return SubmitOutcome::Rejected;
        };

        let checked = visits
            .iter()
            .map(|v| {
                validate_visit(&VisitDraft::from(v), relevamiento_id)
                    .map_err(|err| format!("Visit {}: {}", v.numero_visita, err))
            })
            .collect::<Result<Vec<_>, _>>()
            .and_then(|all| {
                validate_visit_batch(&all)
                    .map(|_| all)
                    .map_err(|err| err.to_string())
            });
        let visits = match checked {
            Ok(visits) => visits,
            Err(reason) => {
                debug!(%reason, "visit failed re-validation");
                self.notifier.notify(Notification::warning(format!(
                    "Visits not saved. {}",
                    reason
                )));
                return SubmitOutcome::Rejected;
            }
        };

        match self.gateway.save_visits(&visits).await {
            Ok(BulkAck { success: true }) => {
                self.notifier
                    .notify(Notification::success("Visits saved successfully."));
                SubmitOutcome::Submitted
            }
            Ok(ack) => {
                error!(?ack, "Visits endpoint did not confirm the write");
                self.notifier
                    .notify(Notification::error("There was a problem saving the visits."));
                SubmitOutcome::Failed
            }
            Err(err) => {
                error!(error = %err, "Failed to send visits");
                self.notifier
                    .notify(Notification::error("Error sending the visits."));
                SubmitOutcome::Failed
            }
        }
    }

    fn warn(&self, err: ValidationError) -> ValidationError {
        self.notifier.notify(Notification::warning(err.to_string()));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::NotificationLevel;
    use crate::sections::testing::{store_with_session, FakeGateway, RecordingNotifier, Reply};
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn build(gateway: Arc<FakeGateway>, session: Option<i64>) -> (VisitsSection, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let section = VisitsSection::new(store_with_session(session), gateway, notifier.clone());
        (section, notifier)
    }

    fn draft(numero: &str) -> VisitDraft {
        VisitDraft::new(numero, "2024-01-01", "08:00", "09:30")
    }

    #[test]
    fn add_valid_visit_tags_it_with_the_session() {
        let (section, notifier) = build(Arc::new(FakeGateway::replying(Reply::Ack(true))), Some(8));
        let visit = section.add(&draft("1")).unwrap();

        assert_eq!(visit.relevamiento_id, 8);
        assert_eq!(section.visits(), vec![visit]);
        assert!(notifier.levels().is_empty());
    }

    #[test]
    fn add_with_bad_hour_warns_and_changes_nothing() {
        let (section, notifier) = build(Arc::new(FakeGateway::replying(Reply::Ack(true))), Some(8));
        let mut bad = draft("1");
        bad.hora_inicio = "25:00".into();

        assert!(matches!(
            section.add(&bad),
            Err(SectionError::Invalid(ValidationError::InvalidTime { .. }))
        ));
        assert!(section.visits().is_empty());
        assert_eq!(notifier.levels(), vec![NotificationLevel::Warning]);
    }

    #[test]
    fn add_without_session_is_an_error() {
        let (section, notifier) = build(Arc::new(FakeGateway::replying(Reply::Ack(true))), None);
        assert!(matches!(section.add(&draft("1")), Err(SectionError::NoActiveSurvey)));
        assert_eq!(notifier.levels(), vec![NotificationLevel::Error]);
    }

    #[test]
    fn duplicate_number_is_rejected_unless_editing_that_visit() {
        let (section, _) = build(Arc::new(FakeGateway::replying(Reply::Ack(true))), Some(1));
        section.add(&draft("1")).unwrap();
        section.add(&draft("2")).unwrap();

        assert!(matches!(
            section.add(&draft("2")),
            Err(SectionError::Invalid(ValidationError::DuplicateVisitNumber(2)))
        ));

        let editable = section.begin_edit(2).unwrap();
        assert_eq!(editable.hora_finalizacion, "09:30");
        section
            .add(&draft("2").with_observaciones("portón cerrado"))
            .unwrap();
        let visits = section.visits();
        assert_eq!(visits.len(), 2);
        assert_eq!(visits[1].observaciones.as_deref(), Some("portón cerrado"));

        // Editing visit 2 may not take number 1.
        section.begin_edit(2).unwrap();
        assert!(section.add(&draft("1")).is_err());
        section.cancel_edit();
    }

    #[test]
    fn removing_the_visit_being_edited_ends_the_edit() {
        let (section, notifier) = build(Arc::new(FakeGateway::replying(Reply::Ack(true))), Some(1));
        section.add(&draft("1")).unwrap();
        section.add(&draft("2")).unwrap();

        section.begin_edit(2).unwrap();
        section.remove(2).unwrap();
        let readded = section.add(&draft("2")).unwrap();

        let numbers: Vec<u32> = section.visits().iter().map(|v| v.numero_visita).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(section.visits()[1], readded);
        assert!(notifier.levels().is_empty());

        // A later add is a plain append, not a replacement of visit 2.
        section.add(&draft("3")).unwrap();
        assert_eq!(section.visits().len(), 3);
    }

    #[test]
    fn edit_target_gone_from_the_slice_falls_back_to_append() {
        let (section, _) = build(Arc::new(FakeGateway::replying(Reply::Ack(true))), Some(1));
        section.add(&draft("1")).unwrap();
        section.begin_edit(1).unwrap();
        section
            .store
            .dispatch(Action::new::<Visits>(VisitsAction::Clear))
            .unwrap();

        section.add(&draft("5")).unwrap();
        let numbers: Vec<u32> = section.visits().iter().map(|v| v.numero_visita).collect();
        assert_eq!(numbers, vec![5]);
    }

    #[test]
    fn removing_unknown_visit_reports_an_error() {
        let (section, notifier) = build(Arc::new(FakeGateway::replying(Reply::Ack(true))), Some(1));
        section.add(&draft("1")).unwrap();

        assert!(matches!(section.remove(4), Err(SectionError::UnknownVisit(4))));
        assert_eq!(notifier.levels(), vec![NotificationLevel::Error]);

        section.remove(1).unwrap();
        assert!(section.visits().is_empty());
    }

    #[tokio::test]
    async fn submitting_nothing_makes_no_call() {
        let gateway = Arc::new(FakeGateway::replying(Reply::Ack(true)));
        let (section, notifier) = build(gateway.clone(), Some(1));

        assert_eq!(section.submit_all().await, SubmitOutcome::Rejected);
        assert_eq!(gateway.calls(), 0);
        assert_eq!(notifier.levels(), vec![NotificationLevel::Error]);
        assert!(!section.is_submitting());
    }

    #[tokio::test]
    async fn successful_submit_sends_every_visit_once() {
        let gateway = Arc::new(FakeGateway::replying(Reply::Ack(true)));
        let (section, notifier) = build(gateway.clone(), Some(3));
        section.add(&draft("1")).unwrap();
        section.add(&draft("2")).unwrap();

        assert_eq!(section.submit_all().await, SubmitOutcome::Submitted);
        let sent = gateway.saved_visits.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].len(), 2);
        assert!(sent[0].iter().all(|v| v.relevamiento_id == 3));
        assert_eq!(notifier.levels(), vec![NotificationLevel::Success]);
    }

    #[tokio::test]
    async fn missing_success_flag_or_transport_error_is_a_failure() {
        for reply in [Reply::Ack(false), Reply::Unreachable] {
            let gateway = Arc::new(FakeGateway::replying(reply));
            let (section, notifier) = build(gateway.clone(), Some(3));
            section.add(&draft("1")).unwrap();

            assert_eq!(section.submit_all().await, SubmitOutcome::Failed);
            assert_eq!(section.visits().len(), 1);
            assert_eq!(notifier.levels(), vec![NotificationLevel::Error]);
            assert!(!section.is_submitting());
        }
    }

    #[tokio::test]
    async fn stale_invalid_visit_blocks_the_whole_submit() {
        let gateway = Arc::new(FakeGateway::replying(Reply::Ack(true)));
        let (section, notifier) = build(gateway.clone(), Some(3));
        let visit = section.add(&draft("1")).unwrap();
        // A duplicate slipped in through a direct dispatch.
        section
            .store
            .dispatch(Action::new::<Visits>(VisitsAction::Add(visit)))
            .unwrap();

        assert_eq!(section.submit_all().await, SubmitOutcome::Rejected);
        assert_eq!(gateway.calls(), 0);
        assert_eq!(notifier.levels(), vec![NotificationLevel::Warning]);
        let seen = notifier.seen.lock().unwrap();
        assert!(seen[0].message.contains("Visit number 1 is already registered"));
    }

    #[tokio::test]
    async fn visits_without_an_active_survey_are_not_sent() {
        let gateway = Arc::new(FakeGateway::replying(Reply::Ack(true)));
        let (section, notifier) = build(gateway.clone(), None);
        let visit = validate_visit(&draft("1"), 3).unwrap();
        section
            .store
            .dispatch(Action::new::<Visits>(VisitsAction::Add(visit)))
            .unwrap();

        assert_eq!(section.submit_all().await, SubmitOutcome::Rejected);
        assert_eq!(gateway.calls(), 0);
        assert_eq!(notifier.levels(), vec![NotificationLevel::Error]);
        assert_eq!(section.visits().len(), 1);
    }

    #[tokio::test]
    async fn second_submit_while_first_pending_is_a_no_op() {
        let gate = Arc::new(Notify::new());
        let mut fake = FakeGateway::replying(Reply::Ack(true));
        fake.gate = Some(gate.clone());
        let gateway = Arc::new(fake);
        let (section, _) = build(gateway.clone(), Some(3));
        section.add(&draft("1")).unwrap();

        let (first, second) = futures::join!(section.submit_all(), async {
            let outcome = section.submit_all().await;
            gate.notify_one();
            outcome
        });

        assert_eq!(first, SubmitOutcome::Submitted);
        assert_eq!(second, SubmitOutcome::InFlight);
        assert_eq!(gateway.calls(), 1);

        gate.notify_one();
        assert_eq!(section.submit_all().await, SubmitOutcome::Submitted);
        assert_eq!(gateway.calls(), 2);
    }

    #[tokio::test]
    async fn loading_existing_visits_fills_the_slice() {
        let mut fake = FakeGateway::replying(Reply::Ack(true));
        fake.existing = vec![validate_visit(&draft("7"), 3).unwrap()];
        let (section, _) = build(Arc::new(fake), Some(3));

        assert!(section.load_existing().await);
        assert_eq!(section.visits()[0].numero_visita, 7);
    }

    #[tokio::test]
    async fn loading_without_saved_visits_or_session_edits_nothing() {
        let (section, _) = build(Arc::new(FakeGateway::replying(Reply::Ack(true))), Some(3));
        assert!(!section.load_existing().await);

        let (section, _) = build(Arc::new(FakeGateway::replying(Reply::Unreachable)), Some(3));
        assert!(!section.load_existing().await);

        let (section, _) = build(Arc::new(FakeGateway::replying(Reply::Ack(true))), None);
        assert!(!section.load_existing().await);
    }
}
