//! services/api/src/web/constructions.rs
//!
//! Handlers scoped to one construction of a survey: which institutions use
//! it, its accessibility conditions, dining use, conservation state and the
//! dimensions of its rooms.

use crate::error::{HttpError, HttpResult};
use crate::web::rest::{json_body, path_param, required_id, ErrorResponse, SuccessResponse};
use crate::web::state::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    Json,
};
use relevamiento_core::domain::{
    AccessibilityCondition, ConservationState, DiningService, RoomDimensions,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

//=========================================================================================
// Institutions per construction
//=========================================================================================

#[derive(Debug, Deserialize, IntoParams)]
pub struct ConstructionQuery {
    pub relevamiento_id: Option<String>,
    pub construccion_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InstitutionsRequest {
    pub relevamiento_id: i64,
    pub construccion_id: i64,
    pub instituciones: Vec<i64>,
}

/// List the institutions linked to a construction.
#[utoipa::path(
    get,
    path = "/instituciones_por_construccion",
    params(ConstructionQuery),
    responses(
        (status = 200, description = "Institution identifiers", body = [i64]),
        (status = 400, description = "Missing identifiers", body = ErrorResponse),
        (status = 500, description = "Datastore failure", body = ErrorResponse)
    )
)]
pub async fn get_institutions_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ConstructionQuery>,
) -> HttpResult<Json<Vec<i64>>> {
    let relevamiento_id = required_id("relevamiento_id", query.relevamiento_id.as_deref())?;
    let construccion_id = required_id("construccion_id", query.construccion_id.as_deref())?;

    let ids = app_state
        .db
        .get_construction_institutions(relevamiento_id, construccion_id)
        .await
        .map_err(|e| HttpError::from_port("Error fetching institutions", e))?;
    Ok(Json(ids))
}

/// Replace the institutions linked to a construction.
#[utoipa::path(
    post,
    path = "/instituciones_por_construccion",
    request_body = InstitutionsRequest,
    responses(
        (status = 200, description = "Links replaced", body = SuccessResponse),
        (status = 400, description = "Missing fields", body = ErrorResponse),
        (status = 500, description = "Datastore failure", body = ErrorResponse)
    )
)]
pub async fn replace_institutions_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<InstitutionsRequest>, JsonRejection>,
) -> HttpResult<Json<SuccessResponse>> {
    let request = json_body(payload)?;
    app_state
        .db
        .replace_construction_institutions(
            request.relevamiento_id,
            request.construccion_id,
            &request.instituciones,
        )
        .await
        .map_err(|e| HttpError::from_port("Error saving institutions", e))?;
    info!(
        relevamiento_id = request.relevamiento_id,
        construccion_id = request.construccion_id,
        count = request.instituciones.len(),
        "Construction institutions replaced"
    );
    Ok(SuccessResponse::ok())
}

//=========================================================================================
// Accessibility conditions
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConditionBody {
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

impl From<ConditionBody> for AccessibilityCondition {
    fn from(body: ConditionBody) -> Self {
        AccessibilityCondition {
            servicio: body.servicio,
            disponibilidad: body.disponibilidad,
            estado: body.estado,
            cantidad: body.cantidad,
            mantenimiento: body.mantenimiento,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AccessibilityRequest {
    pub relevamiento_id: i64,
    pub construccion_id: i64,
    pub servicios: Vec<ConditionBody>,
}

/// Store the accessibility conditions of a construction.
///
/// Services with no answer at all are skipped.
#[utoipa::path(
    post,
    path = "/condiciones_accesibilidad",
    request_body = AccessibilityRequest,
    responses(
        (status = 200, description = "Conditions stored", body = SuccessResponse),
        (status = 400, description = "No service was answered", body = ErrorResponse),
        (status = 500, description = "Datastore failure", body = ErrorResponse)
    )
)]
pub async fn save_accessibility_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<AccessibilityRequest>, JsonRejection>,
) -> HttpResult<Json<SuccessResponse>> {
    let request = json_body(payload)?;
    let conditions: Vec<AccessibilityCondition> = request
        .servicios
        .into_iter()
        .map(AccessibilityCondition::from)
        .collect();
    if !conditions.iter().any(AccessibilityCondition::has_data) {
        return Err(HttpError::bad_request(
            "Complete at least one accessibility condition",
        ));
    }

    app_state
        .db
        .save_accessibility(request.relevamiento_id, request.construccion_id, &conditions)
        .await
        .map_err(|e| HttpError::from_port("Error saving accessibility conditions", e))?;
    info!(
        relevamiento_id = request.relevamiento_id,
        construccion_id = request.construccion_id,
        "Accessibility conditions saved"
    );
    Ok(SuccessResponse::ok())
}

//=========================================================================================
// Dining use
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DiningServiceBody {
    pub servicio: String,
    #[serde(default)]
    pub disponibilidad: String,
    #[serde(default)]
    pub tipos_comedor: Vec<String>,
}

impl From<DiningServiceBody> for DiningService {
    fn from(body: DiningServiceBody) -> Self {
        DiningService {
            servicio: body.servicio,
            disponibilidad: body.disponibilidad,
            tipos_comedor: body.tipos_comedor,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DiningUseRequest {
    pub relevamiento_id: i64,
    #[serde(alias = "costruccion_id")]
    pub construccion_id: i64,
    pub servicios: Vec<DiningServiceBody>,
}

/// Store the dining use of a construction.
///
/// Services with neither an answer nor a dining type are skipped.
#[utoipa::path(
    post,
    path = "/uso_comedor",
    request_body = DiningUseRequest,
    responses(
        (status = 200, description = "Dining use stored", body = SuccessResponse),
        (status = 400, description = "No service was answered", body = ErrorResponse),
        (status = 500, description = "Datastore failure", body = ErrorResponse)
    )
)]
pub async fn save_dining_use_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<DiningUseRequest>, JsonRejection>,
) -> HttpResult<Json<SuccessResponse>> {
    let request = json_body(payload)?;
    let services: Vec<DiningService> = request
        .servicios
        .into_iter()
        .map(DiningService::from)
        .collect();
    if !services.iter().any(DiningService::has_data) {
        return Err(HttpError::bad_request(
            "Complete at least one dining service",
        ));
    }

    app_state
        .db
        .save_dining_use(request.relevamiento_id, request.construccion_id, &services)
        .await
        .map_err(|e| HttpError::from_port("Error saving dining use", e))?;
    info!(
        relevamiento_id = request.relevamiento_id,
        construccion_id = request.construccion_id,
        "Dining use saved"
    );
    Ok(SuccessResponse::ok())
}

//=========================================================================================
// Conservation state
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConservationBody {
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

impl From<ConservationBody> for ConservationState {
    fn from(body: ConservationBody) -> Self {
        ConservationState {
            estructura: body.estructura,
            disponibilidad: body.disponibilidad,
            estado: body.estado,
            relevamiento_id: body.relevamiento_id,
            construccion_id: body.construccion_id,
        }
    }
}

/// Store the construction type and conservation state of each structure.
///
/// Every row must be answered and name its survey and construction; the
/// stored rows of each construction in the batch are replaced.
#[utoipa::path(
    post,
    path = "/estado_conservacion",
    request_body = [ConservationBody],
    responses(
        (status = 200, description = "Conservation state stored", body = SuccessResponse),
        (status = 400, description = "Empty batch, missing identifiers or unanswered rows", body = ErrorResponse),
        (status = 500, description = "Datastore failure", body = ErrorResponse)
    )
)]
pub async fn save_conservation_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<Vec<ConservationBody>>, JsonRejection>,
) -> HttpResult<Json<SuccessResponse>> {
    let states: Vec<ConservationState> = json_body(payload)?
        .into_iter()
        .map(ConservationState::from)
        .collect();
    if states.is_empty() {
        return Err(HttpError::bad_request("At least one structure is required"));
    }
    for (index, state) in states.iter().enumerate() {
        if state.relevamiento_id.is_none() || state.construccion_id.is_none() {
            return Err(HttpError::bad_request(format!(
                "relevamiento_id and construccion_id are required (row {})",
                index + 1
            )));
        }
        if !state.is_answered() {
            return Err(HttpError::bad_request(format!(
                "Row {} is not answered: give its presence, or its type and state",
                index + 1
            )));
        }
    }

    app_state
        .db
        .save_conservation_states(&states)
        .await
        .map_err(|e| HttpError::from_port("Error saving conservation state", e))?;
    info!(count = states.len(), "Conservation state saved");
    Ok(SuccessResponse::ok())
}

//=========================================================================================
// Room dimensions
//=========================================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema)]
pub struct DimensionsBody {
    #[serde(default)]
    pub largo_predominante: f64,
    #[serde(default)]
    pub ancho_predominante: f64,
    #[serde(default)]
    pub diametro: f64,
    #[serde(default)]
    pub altura_maxima: f64,
    #[serde(default)]
    pub altura_minima: f64,
}

impl From<DimensionsBody> for RoomDimensions {
    fn from(body: DimensionsBody) -> Self {
        RoomDimensions {
            largo_predominante: body.largo_predominante,
            ancho_predominante: body.ancho_predominante,
            diametro: body.diametro,
            altura_maxima: body.altura_maxima,
            altura_minima: body.altura_minima,
        }
    }
}

/// Update the predominant dimensions of a room.
#[utoipa::path(
    patch,
    path = "/locales/{id}/dimensiones",
    params(("id" = i64, Path, description = "Room identifier")),
    request_body = DimensionsBody,
    responses(
        (status = 200, description = "Dimensions updated", body = SuccessResponse),
        (status = 400, description = "No dimension given, or a negative one", body = ErrorResponse),
        (status = 404, description = "No such room", body = ErrorResponse),
        (status = 500, description = "Datastore failure", body = ErrorResponse)
    )
)]
pub async fn update_dimensions_handler(
    State(app_state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<DimensionsBody>, JsonRejection>,
) -> HttpResult<Json<SuccessResponse>> {
    let id = path_param(id)?;
    let dims = RoomDimensions::from(json_body(payload)?);
    if dims.is_empty() {
        return Err(HttpError::bad_request("At least one dimension is required"));
    }
    let values = [
        dims.largo_predominante,
        dims.ancho_predominante,
        dims.diametro,
        dims.altura_maxima,
        dims.altura_minima,
    ];
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(HttpError::bad_request("Dimensions must be non-negative numbers"));
    }

    app_state
        .db
        .update_room_dimensions(id, dims)
        .await
        .map_err(|e| HttpError::from_port("Error updating room dimensions", e))?;
    info!(local_id = id, "Room dimensions updated");
    Ok(SuccessResponse::ok())
}
