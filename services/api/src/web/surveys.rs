//! services/api/src/web/surveys.rs
//!
//! Handlers for survey sessions ("relevamientos"): opening one, looking them
//! up by building, and marking them complete.

use crate::error::{HttpError, HttpResult};
use crate::web::rest::{json_body, path_param, required_id, required_text, ErrorResponse, SuccessResponse};
use crate::web::state::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use relevamiento_core::domain::{SurveySession, SurveyStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

//=========================================================================================
// Payloads
//=========================================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSurveyRequest {
    pub cui: i64,
    pub created_by: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InsertedId {
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateSurveyResponse {
    pub inserted: InsertedId,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SurveyBody {
    pub id: i64,
    pub cui: i64,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    /// `complete` or `incomplete`.
    pub estado: String,
}

impl From<SurveySession> for SurveyBody {
    fn from(session: SurveySession) -> Self {
        Self {
            id: session.id,
            cui: session.cui,
            created_at: session.created_at,
            created_by: session.created_by,
            estado: session.status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusRequest {
    pub estado: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CuiQuery {
    /// Registry number of the surveyed building.
    pub cui: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Open a new survey for a building.
#[utoipa::path(
    post,
    path = "/relevamientos",
    request_body = CreateSurveyRequest,
    responses(
        (status = 201, description = "Survey created", body = CreateSurveyResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 500, description = "Datastore failure", body = ErrorResponse)
    )
)]
pub async fn create_survey_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<CreateSurveyRequest>, JsonRejection>,
) -> HttpResult<impl IntoResponse> {
    let request = json_body(payload)?;
    required_text("created_by", &request.created_by)?;

    let session = app_state
        .db
        .create_survey(request.cui, request.created_by.trim())
        .await
        .map_err(|e| HttpError::from_port("Error creating the survey", e))?;
    info!(id = session.id, cui = session.cui, "Survey created");

    Ok((
        StatusCode::CREATED,
        Json(CreateSurveyResponse {
            inserted: InsertedId { id: session.id },
        }),
    ))
}

/// List the surveys of a building, newest first.
#[utoipa::path(
    get,
    path = "/relevamientos",
    params(CuiQuery),
    responses(
        (status = 200, description = "Surveys of the building", body = [SurveyBody]),
        (status = 400, description = "Missing cui", body = ErrorResponse),
        (status = 500, description = "Datastore failure", body = ErrorResponse)
    )
)]
pub async fn list_surveys_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<CuiQuery>,
) -> HttpResult<Json<Vec<SurveyBody>>> {
    let cui = required_id("cui", query.cui.as_deref())?;
    let sessions = app_state
        .db
        .list_surveys_by_cui(cui)
        .await
        .map_err(|e| HttpError::from_port("Error fetching surveys", e))?;
    Ok(Json(sessions.into_iter().map(SurveyBody::from).collect()))
}

/// Fetch one survey.
#[utoipa::path(
    get,
    path = "/relevamientos/{id}",
    params(("id" = i64, Path, description = "Survey identifier")),
    responses(
        (status = 200, description = "The survey", body = SurveyBody),
        (status = 404, description = "No such survey", body = ErrorResponse),
        (status = 500, description = "Datastore failure", body = ErrorResponse)
    )
)]
pub async fn get_survey_handler(
    State(app_state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> HttpResult<Json<SurveyBody>> {
    let id = path_param(id)?;
    let session = app_state
        .db
        .get_survey(id)
        .await
        .map_err(|e| HttpError::from_port("Error fetching the survey", e))?;
    Ok(Json(session.into()))
}

/// Mark a survey complete or incomplete.
#[utoipa::path(
    patch,
    path = "/relevamientos/{id}/estado",
    params(("id" = i64, Path, description = "Survey identifier")),
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Status updated", body = SuccessResponse),
        (status = 400, description = "Unknown status", body = ErrorResponse),
        (status = 404, description = "No such survey", body = ErrorResponse),
        (status = 500, description = "Datastore failure", body = ErrorResponse)
    )
)]
pub async fn update_status_handler(
    State(app_state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> HttpResult<Json<SuccessResponse>> {
    let id = path_param(id)?;
    let request = json_body(payload)?;
    let status = request.estado.trim().parse::<SurveyStatus>()?;

    app_state
        .db
        .update_survey_status(id, status)
        .await
        .map_err(|e| HttpError::from_port("Error updating the survey status", e))?;
    info!(id, estado = status.as_str(), "Survey status updated");
    Ok(SuccessResponse::ok())
}
