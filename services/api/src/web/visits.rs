//! services/api/src/web/visits.rs
//!
//! Handlers for the visit log of a survey. A POST carries every visit of one
//! survey and replaces what was stored for it.

use crate::error::{HttpError, HttpResult};
use crate::web::rest::{json_body, required_id, ErrorResponse, SuccessResponse};
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use relevamiento_core::domain::{Visit, VisitDraft};
use relevamiento_core::validation::{validate_visit, validate_visit_batch};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

/// One visit as it crosses the wire. Dates are `YYYY-MM-DD`, times `HH:MM`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VisitBody {
    pub numero_visita: u32,
    pub fecha: String,
    pub hora_inicio: String,
    pub hora_finalizacion: String,
    #[serde(default)]
    pub observaciones: Option<String>,
    #[serde(alias = "session_id")]
    pub relevamiento_id: i64,
}

impl VisitBody {
    fn to_draft(&self) -> VisitDraft {
        VisitDraft::new(
            self.numero_visita.to_string(),
            self.fecha.as_str(),
            self.hora_inicio.as_str(),
            self.hora_finalizacion.as_str(),
        )
        .with_observaciones(self.observaciones.clone().unwrap_or_default())
    }
}

impl From<Visit> for VisitBody {
    fn from(visit: Visit) -> Self {
        Self {
            numero_visita: visit.numero_visita,
            fecha: visit.fecha.format("%Y-%m-%d").to_string(),
            hora_inicio: visit.hora_inicio.to_string(),
            hora_finalizacion: visit.hora_finalizacion.to_string(),
            observaciones: visit.observaciones,
            relevamiento_id: visit.relevamiento_id,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct VisitsQuery {
    /// Survey whose visits are listed.
    pub session_id: Option<String>,
    /// Same as `session_id`.
    pub relevamiento_id: Option<String>,
}

/// List the visits of a survey ordered by visit number.
#[utoipa::path(
    get,
    path = "/visits",
    params(VisitsQuery),
    responses(
        (status = 200, description = "Visits of the survey", body = [VisitBody]),
        (status = 400, description = "Missing session_id", body = ErrorResponse),
        (status = 500, description = "Datastore failure", body = ErrorResponse)
    )
)]
pub async fn get_visits_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<VisitsQuery>,
) -> HttpResult<Json<Vec<VisitBody>>> {
    let raw = query.session_id.as_deref().or(query.relevamiento_id.as_deref());
    let relevamiento_id = required_id("session_id", raw)?;

    let visits = app_state
        .db
        .get_visits(relevamiento_id)
        .await
        .map_err(|e| HttpError::from_port("Error fetching visits", e))?;
    Ok(Json(visits.into_iter().map(VisitBody::from).collect()))
}

/// Store every visit of one survey, replacing the previous set.
#[utoipa::path(
    post,
    path = "/visits",
    request_body = [VisitBody],
    responses(
        (status = 200, description = "Visits stored", body = SuccessResponse),
        (status = 400, description = "Empty, mixed or invalid visits", body = ErrorResponse),
        (status = 500, description = "Datastore failure", body = ErrorResponse)
    )
)]
pub async fn save_visits_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<Vec<VisitBody>>, JsonRejection>,
) -> HttpResult<Json<SuccessResponse>> {
    let bodies = json_body(payload)?;

    let visits = bodies
        .iter()
        .map(|body| validate_visit(&body.to_draft(), body.relevamiento_id))
        .collect::<Result<Vec<_>, _>>()?;
    validate_visit_batch(&visits)?;
    let relevamiento_id = visits
        .first()
        .map(|v| v.relevamiento_id)
        .ok_or_else(|| HttpError::bad_request("At least one visit is required"))?;

    app_state
        .db
        .replace_visits(relevamiento_id, &visits)
        .await
        .map_err(|e| HttpError::from_port("Error saving visits", e))?;
    info!(relevamiento_id, count = visits.len(), "Visits saved");
    Ok(SuccessResponse::ok())
}
