//! crates/relevamiento_core/src/validation.rs
//!
//! Field-level validation shared by the client sections and the API boundary.

use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::domain::{Visit, VisitDraft};

/// 24-hour `HH:MM`.
pub static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").expect("clock time pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Complete all required fields ({0} is missing)")]
    MissingField(&'static str),
    #[error("{field} must be a valid number, got '{value}'")]
    NotANumber { field: &'static str, value: String },
    #[error("{field} must use the HH:MM format, got '{value}'")]
    InvalidTime { field: &'static str, value: String },
    #[error("{field} must be a YYYY-MM-DD date, got '{value}'")]
    InvalidDate { field: &'static str, value: String },
    #[error("Invalid value for {field}: '{value}'")]
    InvalidValue { field: &'static str, value: String },
    #[error("Visit number {0} is already registered")]
    DuplicateVisitNumber(u32),
    #[error("Visits belong to more than one survey")]
    MixedSessions,
    #[error("Complete at least one field before saving")]
    NothingFilledIn,
}

fn required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

fn time_field(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if !CLOCK_TIME.is_match(value.trim()) {
        return Err(ValidationError::InvalidTime {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Turns a form draft into a `Visit` tagged with `relevamiento_id`.
///
/// Checks run in the order the form reports them: presence, then the visit
/// number, then both times, then the date.
pub fn validate_visit(draft: &VisitDraft, relevamiento_id: i64) -> Result<Visit, ValidationError> {
    required("numero_visita", &draft.numero_visita)?;
    required("fecha", &draft.fecha)?;
    required("hora_inicio", &draft.hora_inicio)?;
    required("hora_finalizacion", &draft.hora_finalizacion)?;

    let numero_visita = draft
        .numero_visita
        .trim()
        .parse::<u32>()
        .map_err(|_| ValidationError::NotANumber {
            field: "numero_visita",
            value: draft.numero_visita.clone(),
        })?;

    time_field("hora_inicio", &draft.hora_inicio)?;
    time_field("hora_finalizacion", &draft.hora_finalizacion)?;

    let fecha = NaiveDate::parse_from_str(draft.fecha.trim(), "%Y-%m-%d").map_err(|_| {
        ValidationError::InvalidDate {
            field: "fecha",
            value: draft.fecha.clone(),
        }
    })?;

    let observaciones = Some(draft.observaciones.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(Visit {
        numero_visita,
        fecha,
        hora_inicio: draft.hora_inicio.trim().parse()?,
        hora_finalizacion: draft.hora_finalizacion.trim().parse()?,
        observaciones,
        relevamiento_id,
    })
}

/// Checks a batch of visits before a bulk write: one survey, unique numbers.
pub fn validate_visit_batch(visits: &[Visit]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(visits.len());
    let session = visits.first().map(|v| v.relevamiento_id);
    for visit in visits {
        if Some(visit.relevamiento_id) != session {
            return Err(ValidationError::MixedSessions);
        }
        if !seen.insert(visit.numero_visita) {
            return Err(ValidationError::DuplicateVisitNumber(visit.numero_visita));
        }
    }
    Ok(())
}
