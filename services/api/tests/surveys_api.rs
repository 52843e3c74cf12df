//! HTTP-level integration tests for the `/relevamientos` endpoints and the
//! OpenAPI document.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, patch_json, post_json, seeded_db};
use relevamiento_core::domain::SurveyStatus;
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: POST /relevamientos returns the inserted id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_survey() {
    let db = seeded_db();
    let response = post_json(
        build_test_app(db.clone()),
        "/relevamientos",
        json!({ "cui": 700123, "created_by": "surveyor@example.org" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await, json!({ "inserted": { "id": 2 } }));

    let response = get(build_test_app(db), "/relevamientos?cui=700123").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let surveys = json.as_array().unwrap();
    assert_eq!(surveys.len(), 2);
    assert_eq!(surveys[0]["id"], 2);
    assert_eq!(surveys[0]["estado"], "incomplete");
}

#[tokio::test]
async fn test_create_survey_requires_author() {
    let response = post_json(
        build_test_app(seeded_db()),
        "/relevamientos",
        json!({ "cui": 700123, "created_by": "  " }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "created_by is required");
}

#[tokio::test]
async fn test_list_surveys_requires_cui() {
    let response = get(build_test_app(seeded_db()), "/relevamientos").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: GET /relevamientos/{id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_get_survey_and_missing_survey() {
    let db = seeded_db();
    let response = get(build_test_app(db.clone()), "/relevamientos/1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["cui"], 700123);

    let response = get(build_test_app(db), "/relevamientos/42").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "Survey 42 not found");
}

#[tokio::test]
async fn test_non_numeric_survey_id_is_a_json_bad_request() {
    let db = seeded_db();
    let response = get(build_test_app(db.clone()), "/relevamientos/abc").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["message"].as_str().unwrap().contains("abc"));

    let response = patch_json(
        build_test_app(db),
        "/relevamientos/x1/estado",
        json!({ "estado": "complete" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["message"].is_string());
}

// ---------------------------------------------------------------------------
// Test: PATCH /relevamientos/{id}/estado
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_mark_survey_complete() {
    let db = seeded_db();
    let response = patch_json(
        build_test_app(db.clone()),
        "/relevamientos/1/estado",
        json!({ "estado": "complete" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "success": true }));
    assert_eq!(
        db.tables.lock().unwrap().surveys[0].status,
        SurveyStatus::Complete
    );
}

#[tokio::test]
async fn test_unknown_status_is_rejected() {
    let response = patch_json(
        build_test_app(seeded_db()),
        "/relevamientos/1/estado",
        json!({ "estado": "archived" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["message"],
        "Invalid value for estado: 'archived'"
    );
}

// ---------------------------------------------------------------------------
// Test: the OpenAPI document is served
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_openapi_document_is_served() {
    let response = get(build_test_app(seeded_db()), "/api-docs/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["paths"]["/visits"]["post"].is_object());
}
