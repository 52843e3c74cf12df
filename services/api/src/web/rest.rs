//! services/api/src/web/rest.rs
//!
//! Contains the master definition for the OpenAPI specification and the
//! payload pieces every REST handler shares.

use crate::error::{HttpError, HttpResult};
use crate::web::{constructions, site, surveys, visits};
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::Path;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        surveys::create_survey_handler,
        surveys::list_surveys_handler,
        surveys::get_survey_handler,
        surveys::update_status_handler,
        visits::get_visits_handler,
        visits::save_visits_handler,
        site::list_site_works_handler,
        site::create_site_work_handler,
        site::save_risk_factors_handler,
        site::list_outdoor_areas_handler,
        constructions::get_institutions_handler,
        constructions::replace_institutions_handler,
        constructions::save_accessibility_handler,
        constructions::save_dining_use_handler,
        constructions::save_conservation_handler,
        constructions::update_dimensions_handler,
    ),
    components(
        schemas(
            SuccessResponse,
            ErrorResponse,
            surveys::CreateSurveyRequest,
            surveys::CreateSurveyResponse,
            surveys::InsertedId,
            surveys::SurveyBody,
            surveys::StatusRequest,
            visits::VisitBody,
            site::SiteWorkRequest,
            site::SiteWorkBody,
            site::CreatedResponse,
            site::RiskFactorBody,
            site::OutdoorAreaBody,
            constructions::InstitutionsRequest,
            constructions::AccessibilityRequest,
            constructions::ConditionBody,
            constructions::DiningUseRequest,
            constructions::DiningServiceBody,
            constructions::ConservationBody,
            constructions::DimensionsBody,
        )
    ),
    tags(
        (name = "Relevamiento API", description = "Endpoints that store the records of a school-facility survey.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Shared Response and Payload Structs
//=========================================================================================

/// Acknowledgement of a write. Callers treat anything but `success: true` as failure.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

/// Body of every error response. `error` is present on datastore failures only.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

//=========================================================================================
// Boundary Helpers
//=========================================================================================

/// Unwraps a JSON body, answering malformed payloads with a 400 `{message}`.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> HttpResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| HttpError::bad_request(rejection.body_text()))
}

/// Unwraps a path parameter, answering malformed ones with a `{message}` 400.
pub fn path_param<T>(param: Result<Path<T>, PathRejection>) -> HttpResult<T> {
    param
        .map(|Path(value)| value)
        .map_err(|rejection| HttpError::bad_request(rejection.body_text()))
}

/// Parses a required integer query parameter.
pub fn required_id(name: &str, raw: Option<&str>) -> HttpResult<i64> {
    let raw = raw
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| HttpError::bad_request(format!("{} is required", name)))?;
    raw.parse::<i64>()
        .map_err(|_| HttpError::bad_request(format!("{} must be an integer, got '{}'", name, raw)))
}

/// Rejects blank text fields.
pub fn required_text(name: &str, value: &str) -> HttpResult<()> {
    if value.trim().is_empty() {
        return Err(HttpError::bad_request(format!("{} is required", name)));
    }
    Ok(())
}
