//! services/api/src/web/site.rs
//!
//! Handlers for the school site ("predio"): works in progress, environmental
//! risk factors and outdoor areas.

use crate::error::{HttpError, HttpResult};
use crate::web::rest::{json_body, required_id, required_text, ErrorResponse, SuccessResponse};
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use relevamiento_core::domain::{NewSiteWork, OutdoorArea, RiskFactor, SiteWork};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

//=========================================================================================
// Site works ("obras en predio")
//=========================================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct SiteWorkRequest {
    pub tipo_obra: String,
    pub estado: String,
    pub financiamiento: String,
    #[serde(default)]
    pub destino: Vec<String>,
    pub superficie_total: f64,
    pub relevamiento_id: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SiteWorkBody {
    pub id: i64,
    pub tipo_obra: String,
    pub estado: String,
    pub financiamiento: String,
    pub destino: Vec<String>,
    pub superficie_total: f64,
    pub relevamiento_id: i64,
}

impl From<SiteWork> for SiteWorkBody {
    fn from(work: SiteWork) -> Self {
        Self {
            id: work.id,
            tipo_obra: work.tipo_obra,
            estado: work.estado,
            financiamiento: work.financiamiento,
            destino: work.destino,
            superficie_total: work.superficie_total,
            relevamiento_id: work.relevamiento_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatedResponse {
    pub message: String,
    pub id: i64,
}

/// List every registered site work.
#[utoipa::path(
    get,
    path = "/obras_en_predio",
    responses(
        (status = 200, description = "Site works", body = [SiteWorkBody]),
        (status = 500, description = "Datastore failure", body = ErrorResponse)
    )
)]
pub async fn list_site_works_handler(
    State(app_state): State<Arc<AppState>>,
) -> HttpResult<Json<Vec<SiteWorkBody>>> {
    let works = app_state
        .db
        .list_site_works()
        .await
        .map_err(|e| HttpError::from_port("Error fetching site works", e))?;
    Ok(Json(works.into_iter().map(SiteWorkBody::from).collect()))
}

/// Register a work in progress on the site.
#[utoipa::path(
    post,
    path = "/obras_en_predio",
    request_body = SiteWorkRequest,
    responses(
        (status = 201, description = "Site work stored", body = CreatedResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 500, description = "Datastore failure", body = ErrorResponse)
    )
)]
pub async fn create_site_work_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<SiteWorkRequest>, JsonRejection>,
) -> HttpResult<impl IntoResponse> {
    let request = json_body(payload)?;
    required_text("tipo_obra", &request.tipo_obra)?;
    required_text("estado", &request.estado)?;
    required_text("financiamiento", &request.financiamiento)?;
    if !request.superficie_total.is_finite() || request.superficie_total < 0.0 {
        return Err(HttpError::bad_request(
            "superficie_total must be a non-negative number",
        ));
    }

    let work = NewSiteWork {
        tipo_obra: request.tipo_obra.trim().to_string(),
        estado: request.estado.trim().to_string(),
        financiamiento: request.financiamiento.trim().to_string(),
        destino: request
            .destino
            .into_iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect(),
        superficie_total: request.superficie_total,
        relevamiento_id: request.relevamiento_id,
    };
    let id = app_state
        .db
        .create_site_work(work)
        .await
        .map_err(|e| HttpError::from_port("Error storing the site work", e))?;
    info!(id, relevamiento_id = request.relevamiento_id, "Site work stored");

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Site work stored successfully".to_string(),
            id,
        }),
    ))
}

//=========================================================================================
// Risk factors
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RiskFactorBody {
    pub id_servicio: i64,
    pub factor: String,
    #[serde(default)]
    pub disponibilidad: String,
    #[serde(default)]
    pub distancia: String,
    #[serde(default)]
    pub mitigacion: String,
    pub relevamiento_id: Option<i64>,
}

impl From<RiskFactorBody> for RiskFactor {
    fn from(body: RiskFactorBody) -> Self {
        RiskFactor {
            id_servicio: body.id_servicio,
            factor: body.factor,
            disponibilidad: body.disponibilidad,
            distancia: body.distancia,
            mitigacion: body.mitigacion,
            relevamiento_id: body.relevamiento_id,
        }
    }
}

/// Store the risk-factor table of a survey.
#[utoipa::path(
    post,
    path = "/servicios_factores_riesgo",
    request_body = [RiskFactorBody],
    responses(
        (status = 200, description = "Risk factors stored", body = SuccessResponse),
        (status = 400, description = "Empty table or rows without a survey", body = ErrorResponse),
        (status = 500, description = "Datastore failure", body = ErrorResponse)
    )
)]
pub async fn save_risk_factors_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<Vec<RiskFactorBody>>, JsonRejection>,
) -> HttpResult<Json<SuccessResponse>> {
    let bodies = json_body(payload)?;
    if bodies.is_empty() {
        return Err(HttpError::bad_request("At least one risk factor is required"));
    }
    if let Some(row) = bodies.iter().find(|b| b.relevamiento_id.is_none()) {
        return Err(HttpError::bad_request(format!(
            "relevamiento_id is required (factor '{}')",
            row.factor
        )));
    }

    let factors: Vec<RiskFactor> = bodies.into_iter().map(RiskFactor::from).collect();
    app_state
        .db
        .save_risk_factors(&factors)
        .await
        .map_err(|e| HttpError::from_port("Error saving risk factors", e))?;
    info!(count = factors.len(), "Risk factors saved");
    Ok(SuccessResponse::ok())
}

//=========================================================================================
// Outdoor areas
//=========================================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OutdoorAreaBody {
    pub id: i64,
    pub identificacion_plano: i64,
    pub tipo: String,
    pub superficie: f64,
    pub estado_conservacion: Option<String>,
    pub terminacion_piso: Option<String>,
    pub relevamiento_id: i64,
}

impl From<OutdoorArea> for OutdoorAreaBody {
    fn from(area: OutdoorArea) -> Self {
        Self {
            id: area.id,
            identificacion_plano: area.identificacion_plano,
            tipo: area.tipo,
            superficie: area.superficie,
            estado_conservacion: area.estado_conservacion,
            terminacion_piso: area.terminacion_piso,
            relevamiento_id: area.relevamiento_id,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SurveyQuery {
    pub relevamiento_id: Option<String>,
}

/// List the outdoor areas drawn for a survey.
#[utoipa::path(
    get,
    path = "/areas_exteriores",
    params(SurveyQuery),
    responses(
        (status = 200, description = "Outdoor areas", body = [OutdoorAreaBody]),
        (status = 400, description = "Missing relevamiento_id", body = ErrorResponse),
        (status = 500, description = "Datastore failure", body = ErrorResponse)
    )
)]
pub async fn list_outdoor_areas_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<SurveyQuery>,
) -> HttpResult<Json<Vec<OutdoorAreaBody>>> {
    let relevamiento_id = required_id("relevamiento_id", query.relevamiento_id.as_deref())?;
    let areas = app_state
        .db
        .list_outdoor_areas(relevamiento_id)
        .await
        .map_err(|e| HttpError::from_port("Error fetching outdoor areas", e))?;
    Ok(Json(areas.into_iter().map(OutdoorAreaBody::from).collect()))
}
