//! HTTP-level integration tests for the site endpoints: works in progress,
//! risk factors and outdoor areas.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, post_json, seeded_db, MemoryDb};
use relevamiento_core::domain::OutdoorArea;
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: POST then GET /obras_en_predio
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_and_list_site_works() {
    let db = seeded_db();
    let response = post_json(
        build_test_app(db.clone()),
        "/obras_en_predio",
        json!({
            "tipo_obra": "Ampliación",
            "estado": "En ejecución",
            "financiamiento": "Provincial",
            "destino": ["Aulas", " ", "Sanitarios"],
            "superficie_total": 120.5,
            "relevamiento_id": 1
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["id"], 1);
    assert!(json["message"].is_string());

    let response = get(build_test_app(db), "/obras_en_predio").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json[0]["destino"], json!(["Aulas", "Sanitarios"]));
    assert_eq!(json[0]["superficie_total"], 120.5);
}

#[tokio::test]
async fn test_site_work_requires_fields() {
    let response = post_json(
        build_test_app(seeded_db()),
        "/obras_en_predio",
        json!({
            "tipo_obra": "",
            "estado": "Terminada",
            "financiamiento": "Nacional",
            "superficie_total": 10.0,
            "relevamiento_id": 1
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "tipo_obra is required");

    let response = post_json(
        build_test_app(seeded_db()),
        "/obras_en_predio",
        json!({
            "tipo_obra": "Refacción",
            "estado": "Terminada",
            "financiamiento": "Nacional",
            "superficie_total": -3.0,
            "relevamiento_id": 1
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: POST /servicios_factores_riesgo
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_save_risk_factors() {
    let db = seeded_db();
    let response = post_json(
        build_test_app(db.clone()),
        "/servicios_factores_riesgo",
        json!([
            { "id_servicio": 1, "factor": "Industria", "disponibilidad": "Si", "relevamiento_id": 1 },
            { "id_servicio": 2, "factor": "Basural", "relevamiento_id": 1 }
        ]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "success": true }));

    let stored = db.tables.lock().unwrap().risk_factors.clone();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].disponibilidad, "");
}

#[tokio::test]
async fn test_risk_factors_need_a_survey_and_rows() {
    let response = post_json(
        build_test_app(seeded_db()),
        "/servicios_factores_riesgo",
        json!([]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json(
        build_test_app(seeded_db()),
        "/servicios_factores_riesgo",
        json!([{ "id_servicio": 1, "factor": "Industria", "relevamiento_id": null }]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["message"],
        "relevamiento_id is required (factor 'Industria')"
    );
}

// ---------------------------------------------------------------------------
// Test: GET /areas_exteriores
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_list_outdoor_areas_of_a_survey() {
    let db = seeded_db();
    {
        let mut tables = db.tables.lock().unwrap();
        for (id, relevamiento_id) in [(1, 1), (2, 7)] {
            tables.outdoor_areas.push(OutdoorArea {
                id,
                identificacion_plano: id * 10,
                tipo: "Patio".to_string(),
                superficie: 300.0,
                estado_conservacion: Some("Bueno".to_string()),
                terminacion_piso: None,
                relevamiento_id,
            });
        }
    }

    let response = get(build_test_app(db.clone()), "/areas_exteriores?relevamiento_id=1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["identificacion_plano"], 10);

    let response = get(build_test_app(db), "/areas_exteriores").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_site_works_datastore_failure() {
    let response = get(build_test_app(Arc::new(MemoryDb::broken())), "/obras_en_predio").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["message"],
        "Error fetching site works"
    );
}
