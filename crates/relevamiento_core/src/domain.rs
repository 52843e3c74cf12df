//! crates/relevamiento_core/src/domain.rs
//!
//! Defines the core data structures of a school-facility survey.
//! Field names follow the survey's column names so the same types can be
//! serialized into client storage and onto the wire unchanged.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::validation::{ValidationError, CLOCK_TIME};

//=========================================================================================
// Survey Session
//=========================================================================================

/// Completion status of a survey session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyStatus {
    Complete,
    #[default]
    Incomplete,
}

impl SurveyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyStatus::Complete => "complete",
            SurveyStatus::Incomplete => "incomplete",
        }
    }
}

impl FromStr for SurveyStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "complete" => Ok(SurveyStatus::Complete),
            "incomplete" => Ok(SurveyStatus::Incomplete),
            other => Err(ValidationError::InvalidValue {
                field: "estado",
                value: other.to_string(),
            }),
        }
    }
}

/// One survey ("relevamiento") of a school building, identified by a
/// server-assigned integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveySession {
    pub id: i64,
    /// Registry number of the surveyed building.
    pub cui: i64,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub status: SurveyStatus,
}

//=========================================================================================
// Visits
//=========================================================================================

/// A 24-hour wall-clock time rendered as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl FromStr for ClockTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidTime {
            field: "time",
            value: s.to_string(),
        };
        let caps = CLOCK_TIME.captures(s).ok_or_else(invalid)?;
        let hour = caps[1].parse::<u8>().map_err(|_| invalid())?;
        let minute = caps[2].parse::<u8>().map_err(|_| invalid())?;
        ClockTime::new(hour, minute).ok_or_else(invalid)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A validated visit made to complete the survey.
///
/// Visit numbers are unique within one survey session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub numero_visita: u32,
    pub fecha: NaiveDate,
    pub hora_inicio: ClockTime,
    pub hora_finalizacion: ClockTime,
    #[serde(default)]
    pub observaciones: Option<String>,
    #[serde(alias = "session_id")]
    pub relevamiento_id: i64,
}

/// A visit as typed into the form, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitDraft {
    pub numero_visita: String,
    pub fecha: String,
    pub hora_inicio: String,
    pub hora_finalizacion: String,
    pub observaciones: String,
}

impl VisitDraft {
    pub fn new(
        numero_visita: impl Into<String>,
        fecha: impl Into<String>,
        hora_inicio: impl Into<String>,
        hora_finalizacion: impl Into<String>,
    ) -> Self {
        Self {
            numero_visita: numero_visita.into(),
            fecha: fecha.into(),
            hora_inicio: hora_inicio.into(),
            hora_finalizacion: hora_finalizacion.into(),
            observaciones: String::new(),
        }
    }

    pub fn with_observaciones(mut self, observaciones: impl Into<String>) -> Self {
        self.observaciones = observaciones.into();
        self
    }
}

impl From<&Visit> for VisitDraft {
    fn from(visit: &Visit) -> Self {
        Self {
            numero_visita: visit.numero_visita.to_string(),
            fecha: visit.fecha.format("%Y-%m-%d").to_string(),
            hora_inicio: visit.hora_inicio.to_string(),
            hora_finalizacion: visit.hora_finalizacion.to_string(),
            observaciones: visit.observaciones.clone().unwrap_or_default(),
        }
    }
}

//=========================================================================================
// Site ("predio")
//=========================================================================================

/// A construction work in progress on the school site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteWork {
    pub id: i64,
    pub tipo_obra: String,
    pub estado: String,
    pub financiamiento: String,
    pub destino: Vec<String>,
    pub superficie_total: f64,
    pub relevamiento_id: i64,
}

/// A site work about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSiteWork {
    pub tipo_obra: String,
    pub estado: String,
    pub financiamiento: String,
    pub destino: Vec<String>,
    pub superficie_total: f64,
    pub relevamiento_id: i64,
}

/// One row of the environmental risk-factor table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub id_servicio: i64,
    pub factor: String,
    #[serde(default)]
    pub disponibilidad: String,
    #[serde(default)]
    pub distancia: String,
    #[serde(default)]
    pub mitigacion: String,
    #[serde(default)]
    pub relevamiento_id: Option<i64>,
}

/// An outdoor area (yard, sports field, parking) drawn on the site plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutdoorArea {
    pub id: i64,
    pub identificacion_plano: i64,
    pub tipo: String,
    pub superficie: f64,
    pub estado_conservacion: Option<String>,
    pub terminacion_piso: Option<String>,
    pub relevamiento_id: i64,
}

//=========================================================================================
// Constructions and rooms
//=========================================================================================

/// Accessibility answer for one service of a construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessibilityCondition {
    pub servicio: String,
    #[serde(default)]
    pub disponibilidad: String,
    #[serde(default)]
    pub estado: String,
    #[serde(default)]
    pub cantidad: u32,
    #[serde(default)]
    pub mantenimiento: String,
}

impl AccessibilityCondition {
    /// A condition carries data when any of its answers was filled in.
    pub fn has_data(&self) -> bool {
        !self.disponibilidad.trim().is_empty()
            || !self.estado.trim().is_empty()
            || self.cantidad > 0
            || !self.mantenimiento.trim().is_empty()
    }
}

/// Dining use of a construction: whether a service is offered and which
/// kinds of dining room serve it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiningService {
    pub servicio: String,
    #[serde(default)]
    pub disponibilidad: String,
    #[serde(default)]
    pub tipos_comedor: Vec<String>,
}

impl DiningService {
    pub fn has_data(&self) -> bool {
        !self.disponibilidad.trim().is_empty() || !self.tipos_comedor.is_empty()
    }
}

/// Construction type and conservation state of one structural element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConservationState {
    #[serde(default)]
    pub estructura: String,
    #[serde(default)]
    pub disponibilidad: String,
    #[serde(default)]
    pub estado: String,
    #[serde(default)]
    pub relevamiento_id: Option<i64>,
    #[serde(default, alias = "construcion_id")]
    pub construccion_id: Option<i64>,
}

impl ConservationState {
    /// Answered when presence was stated (`Si`/`No`), or when both the
    /// construction type and its state were given.
    pub fn is_answered(&self) -> bool {
        matches!(self.disponibilidad.trim(), "Si" | "No")
            || (!self.estructura.trim().is_empty() && !self.estado.trim().is_empty())
    }
}

/// Predominant dimensions of a room, in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomDimensions {
    pub largo_predominante: f64,
    pub ancho_predominante: f64,
    pub diametro: f64,
    pub altura_maxima: f64,
    pub altura_minima: f64,
}

impl RoomDimensions {
    pub fn is_empty(&self) -> bool {
        [
            self.largo_predominante,
            self.ancho_predominante,
            self.diametro,
            self.altura_maxima,
            self.altura_minima,
        ]
        .iter()
        .all(|v| *v == 0.0)
    }
}

//=========================================================================================
// Client-only records
//=========================================================================================

/// A file attached to the survey before upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub nombre: String,
    pub tipo: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl Attachment {
    pub fn new(nombre: impl Into<String>, tipo: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            nombre: nombre.into(),
            tipo: tipo.into(),
            url: None,
        }
    }
}

/// An institution operating in the surveyed building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    pub id: i64,
    pub nombre: String,
}
