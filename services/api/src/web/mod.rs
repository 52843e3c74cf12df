//! services/api/src/web/mod.rs
//!
//! The HTTP surface of the service: one module of handlers per survey area,
//! assembled into a single router.

pub mod constructions;
pub mod rest;
pub mod site;
pub mod state;
pub mod surveys;
pub mod visits;

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use rest::ApiDoc;
use state::AppState;

/// Builds the complete application: every REST route plus the Swagger UI.
pub fn router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route(
            "/relevamientos",
            post(surveys::create_survey_handler).get(surveys::list_surveys_handler),
        )
        .route("/relevamientos/{id}", get(surveys::get_survey_handler))
        .route(
            "/relevamientos/{id}/estado",
            patch(surveys::update_status_handler),
        )
        .route(
            "/visits",
            get(visits::get_visits_handler).post(visits::save_visits_handler),
        )
        .route(
            "/obras_en_predio",
            get(site::list_site_works_handler).post(site::create_site_work_handler),
        )
        .route(
            "/servicios_factores_riesgo",
            post(site::save_risk_factors_handler),
        )
        .route("/areas_exteriores", get(site::list_outdoor_areas_handler))
        .route(
            "/instituciones_por_construccion",
            get(constructions::get_institutions_handler)
                .post(constructions::replace_institutions_handler),
        )
        .route(
            "/condiciones_accesibilidad",
            post(constructions::save_accessibility_handler),
        )
        .route("/uso_comedor", post(constructions::save_dining_use_handler))
        .route(
            "/estado_conservacion",
            post(constructions::save_conservation_handler),
        )
        .route(
            "/locales/{id}/dimensiones",
            patch(constructions::update_dimensions_handler),
        )
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}
