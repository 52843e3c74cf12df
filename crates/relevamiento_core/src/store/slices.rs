//! crates/relevamiento_core/src/store/slices.rs
//!
//! The standard survey slices. Reducers are pure: they clone what they
//! change and never look at another slice.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::Slice;
use crate::domain::{Attachment, Institution, RiskFactor, SiteWork, Visit};

//=========================================================================================
// School space (session identity)
//=========================================================================================

/// Which survey is active, for which building and institution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolSpaceState {
    pub relevamiento_id: Option<i64>,
    pub cui: Option<i64>,
    pub institucion_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub enum SchoolSpaceAction {
    SetRelevamientoId(i64),
    SetCui(Option<i64>),
    SetInstitucionId(Option<i64>),
    Reset,
}

pub struct SchoolSpace;

impl Slice for SchoolSpace {
    const NAME: &'static str = "school_space";
    type State = SchoolSpaceState;
    type Action = SchoolSpaceAction;

    fn reduce(state: &SchoolSpaceState, action: &SchoolSpaceAction) -> SchoolSpaceState {
        match action {
            SchoolSpaceAction::SetRelevamientoId(id) => SchoolSpaceState {
                relevamiento_id: Some(*id),
                ..state.clone()
            },
            SchoolSpaceAction::SetCui(cui) => SchoolSpaceState {
                cui: *cui,
                ..state.clone()
            },
            SchoolSpaceAction::SetInstitucionId(id) => SchoolSpaceState {
                institucion_id: *id,
                ..state.clone()
            },
            SchoolSpaceAction::Reset => SchoolSpaceState::default(),
        }
    }
}

//=========================================================================================
// Visits
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitsState {
    pub visits: Vec<Visit>,
}

impl VisitsState {
    pub fn find(&self, numero_visita: u32) -> Option<&Visit> {
        self.visits.iter().find(|v| v.numero_visita == numero_visita)
    }
}

#[derive(Debug, Clone)]
pub enum VisitsAction {
    Add(Visit),
    /// Replaces the visit currently numbered `original`.
    Update { original: u32, visit: Visit },
    Remove(u32),
    Set(Vec<Visit>),
    Clear,
}

pub struct Visits;

impl Slice for Visits {
    const NAME: &'static str = "visits";
    type State = VisitsState;
    type Action = VisitsAction;

    fn reduce(state: &VisitsState, action: &VisitsAction) -> VisitsState {
        let mut visits = state.visits.clone();
        match action {
            VisitsAction::Add(visit) => visits.push(visit.clone()),
            VisitsAction::Update { original, visit } => {
                if let Some(slot) = visits.iter_mut().find(|v| v.numero_visita == *original) {
                    *slot = visit.clone();
                }
            }
            VisitsAction::Remove(numero) => visits.retain(|v| v.numero_visita != *numero),
            VisitsAction::Set(all) => visits = all.clone(),
            VisitsAction::Clear => visits.clear(),
        }
        VisitsState { visits }
    }
}

//=========================================================================================
// Institution
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionState {
    pub selected: Option<i64>,
    pub available: Vec<Institution>,
}

#[derive(Debug, Clone)]
pub enum InstitutionAction {
    Select(Option<i64>),
    SetAvailable(Vec<Institution>),
}

pub struct InstitutionSlice;

impl Slice for InstitutionSlice {
    const NAME: &'static str = "institution";
    type State = InstitutionState;
    type Action = InstitutionAction;

    fn reduce(state: &InstitutionState, action: &InstitutionAction) -> InstitutionState {
        match action {
            InstitutionAction::Select(id) => InstitutionState {
                selected: *id,
                ..state.clone()
            },
            InstitutionAction::SetAvailable(all) => InstitutionState {
                available: all.clone(),
                ..state.clone()
            },
        }
    }
}

//=========================================================================================
// Attachments
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentsState {
    pub files: Vec<Attachment>,
}

#[derive(Debug, Clone)]
pub enum AttachmentsAction {
    Add(Attachment),
    Remove(Uuid),
    Reset,
}

pub struct Attachments;

impl Slice for Attachments {
    const NAME: &'static str = "attachments";
    type State = AttachmentsState;
    type Action = AttachmentsAction;

    fn reduce(state: &AttachmentsState, action: &AttachmentsAction) -> AttachmentsState {
        let mut files = state.files.clone();
        match action {
            AttachmentsAction::Add(file) => files.push(file.clone()),
            AttachmentsAction::Remove(id) => files.retain(|f| f.id != *id),
            AttachmentsAction::Reset => files.clear(),
        }
        AttachmentsState { files }
    }
}

//=========================================================================================
// Basic services and transport
//=========================================================================================

/// Answer to one service question (electricity, gas, bus line, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAnswer {
    pub servicio: String,
    #[serde(default)]
    pub disponibilidad: String,
    #[serde(default)]
    pub estado: String,
    #[serde(default)]
    pub observaciones: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicesState {
    pub servicios: Vec<ServiceAnswer>,
}

#[derive(Debug, Clone)]
pub enum ServicesAction {
    Set(Vec<ServiceAnswer>),
    Reset,
}

fn reduce_services(action: &ServicesAction) -> ServicesState {
    match action {
        ServicesAction::Set(all) => ServicesState {
            servicios: all.clone(),
        },
        ServicesAction::Reset => ServicesState::default(),
    }
}

pub struct BasicServices;

impl Slice for BasicServices {
    const NAME: &'static str = "basic_services";
    type State = ServicesState;
    type Action = ServicesAction;

    fn reduce(_: &ServicesState, action: &ServicesAction) -> ServicesState {
        reduce_services(action)
    }
}

pub struct Transport;

impl Slice for Transport {
    const NAME: &'static str = "transport";
    type State = ServicesState;
    type Action = ServicesAction;

    fn reduce(_: &ServicesState, action: &ServicesAction) -> ServicesState {
        reduce_services(action)
    }
}

//=========================================================================================
// Risk factors
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactorsState {
    pub factores: Vec<RiskFactor>,
}

#[derive(Debug, Clone)]
pub enum RiskFactorsAction {
    Set(Vec<RiskFactor>),
    Reset,
}

pub struct RiskFactors;

impl Slice for RiskFactors {
    const NAME: &'static str = "risk_factors";
    type State = RiskFactorsState;
    type Action = RiskFactorsAction;

    fn reduce(_: &RiskFactorsState, action: &RiskFactorsAction) -> RiskFactorsState {
        match action {
            RiskFactorsAction::Set(all) => RiskFactorsState {
                factores: all.clone(),
            },
            RiskFactorsAction::Reset => RiskFactorsState::default(),
        }
    }
}

//=========================================================================================
// Constructions
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionsState {
    pub construcciones: Vec<i64>,
    pub selected: Option<i64>,
}

#[derive(Debug, Clone)]
pub enum ConstructionsAction {
    Add(i64),
    Remove(i64),
    Select(Option<i64>),
    Reset,
}

pub struct Constructions;

impl Slice for Constructions {
    const NAME: &'static str = "constructions";
    type State = ConstructionsState;
    type Action = ConstructionsAction;

    fn reduce(state: &ConstructionsState, action: &ConstructionsAction) -> ConstructionsState {
        let mut next = state.clone();
        match action {
            ConstructionsAction::Add(id) => {
                if !next.construcciones.contains(id) {
                    next.construcciones.push(*id);
                }
            }
            ConstructionsAction::Remove(id) => {
                next.construcciones.retain(|c| c != id);
                if next.selected == Some(*id) {
                    next.selected = None;
                }
            }
            ConstructionsAction::Select(id) => next.selected = *id,
            ConstructionsAction::Reset => next = ConstructionsState::default(),
        }
        next
    }
}

//=========================================================================================
// Water service
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaterServiceState {
    /// Answers keyed by question identifier.
    pub answers: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub enum WaterServiceAction {
    SetAnswer { question: String, answer: String },
    Reset,
}

pub struct WaterService;

impl Slice for WaterService {
    const NAME: &'static str = "water_service";
    type State = WaterServiceState;
    type Action = WaterServiceAction;

    fn reduce(state: &WaterServiceState, action: &WaterServiceAction) -> WaterServiceState {
        match action {
            WaterServiceAction::SetAnswer { question, answer } => {
                let mut answers = state.answers.clone();
                answers.insert(question.clone(), answer.clone());
                WaterServiceState { answers }
            }
            WaterServiceAction::Reset => WaterServiceState::default(),
        }
    }
}

//=========================================================================================
// Site
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteState {
    pub predio_id: Option<i64>,
    pub obras: Vec<SiteWork>,
}

#[derive(Debug, Clone)]
pub enum SiteAction {
    SetPredio(Option<i64>),
    AddObra(SiteWork),
    SetObras(Vec<SiteWork>),
    Reset,
}

pub struct Site;

impl Slice for Site {
    const NAME: &'static str = "site";
    type State = SiteState;
    type Action = SiteAction;

    fn reduce(state: &SiteState, action: &SiteAction) -> SiteState {
        let mut next = state.clone();
        match action {
            SiteAction::SetPredio(id) => next.predio_id = *id,
            SiteAction::AddObra(obra) => next.obras.push(obra.clone()),
            SiteAction::SetObras(all) => next.obras = all.clone(),
            SiteAction::Reset => next = SiteState::default(),
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VisitDraft;
    use crate::validation::validate_visit;

    fn visit(numero: u32) -> Visit {
        validate_visit(
            &VisitDraft::new(numero.to_string(), "2024-03-01", "08:00", "10:00"),
            1,
        )
        .unwrap()
    }

    #[test]
    fn visits_update_replaces_by_original_number() {
        let state = Visits::reduce(&VisitsState::default(), &VisitsAction::Add(visit(1)));
        let state = Visits::reduce(&state, &VisitsAction::Add(visit(2)));
        let state = Visits::reduce(
            &state,
            &VisitsAction::Update {
                original: 1,
                visit: visit(5),
            },
        );
        let numbers: Vec<_> = state.visits.iter().map(|v| v.numero_visita).collect();
        assert_eq!(numbers, vec![5, 2]);

        let state = Visits::reduce(&state, &VisitsAction::Remove(2));
        assert!(state.find(2).is_none());
        assert!(state.find(5).is_some());
    }

    #[test]
    fn school_space_setters_keep_other_fields() {
        let state = SchoolSpace::reduce(
            &SchoolSpaceState::default(),
            &SchoolSpaceAction::SetCui(Some(700123)),
        );
        let state = SchoolSpace::reduce(&state, &SchoolSpaceAction::SetRelevamientoId(9));
        assert_eq!(state.cui, Some(700123));
        assert_eq!(state.relevamiento_id, Some(9));
        assert_eq!(
            SchoolSpace::reduce(&state, &SchoolSpaceAction::Reset),
            SchoolSpaceState::default()
        );
    }

    #[test]
    fn constructions_add_is_idempotent_and_remove_clears_selection() {
        let state = Constructions::reduce(&Default::default(), &ConstructionsAction::Add(3));
        let state = Constructions::reduce(&state, &ConstructionsAction::Add(3));
        let state = Constructions::reduce(&state, &ConstructionsAction::Select(Some(3)));
        assert_eq!(state.construcciones, vec![3]);

        let state = Constructions::reduce(&state, &ConstructionsAction::Remove(3));
        assert!(state.construcciones.is_empty());
        assert_eq!(state.selected, None);
    }

    #[test]
    fn attachments_remove_by_id() {
        let plan = Attachment::new("plano.pdf", "application/pdf");
        let photo = Attachment::new("frente.jpg", "image/jpeg");
        let state = Attachments::reduce(&Default::default(), &AttachmentsAction::Add(plan.clone()));
        let state = Attachments::reduce(&state, &AttachmentsAction::Add(photo.clone()));
        let state = Attachments::reduce(&state, &AttachmentsAction::Remove(plan.id));
        assert_eq!(state.files, vec![photo]);
    }

    #[test]
    fn water_answers_overwrite_per_question() {
        let set = |q: &str, a: &str| WaterServiceAction::SetAnswer {
            question: q.into(),
            answer: a.into(),
        };
        let state = WaterService::reduce(&Default::default(), &set("red_publica", "si"));
        let state = WaterService::reduce(&state, &set("red_publica", "no"));
        assert_eq!(state.answers.len(), 1);
        assert_eq!(state.answers["red_publica"], "no");
    }
}
