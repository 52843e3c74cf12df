//! Shared helpers for the HTTP-level integration tests.
//!
//! The router is driven directly through `tower::ServiceExt::oneshot` against
//! an in-memory `DatabaseService`, so no PostgreSQL instance is needed.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use api_lib::web::{self, state::AppState};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Method, Request};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use relevamiento_core::domain::{
    AccessibilityCondition, ConservationState, DiningService, NewSiteWork, OutdoorArea,
    RiskFactor, RoomDimensions, SiteWork, SurveySession, SurveyStatus, Visit,
};
use relevamiento_core::ports::{DatabaseService, PortError, PortResult};
use serde_json::Value;
use tower::ServiceExt;

//=========================================================================================
// In-memory datastore
//=========================================================================================

#[derive(Default)]
pub struct Tables {
    pub surveys: Vec<SurveySession>,
    pub visits: BTreeMap<i64, Vec<Visit>>,
    pub site_works: Vec<SiteWork>,
    pub risk_factors: Vec<RiskFactor>,
    pub outdoor_areas: Vec<OutdoorArea>,
    pub institutions: BTreeMap<(i64, i64), BTreeSet<i64>>,
    pub accessibility: BTreeMap<(i64, i64), Vec<AccessibilityCondition>>,
    pub dining: BTreeMap<(i64, i64), Vec<DiningService>>,
    pub conservation: Vec<ConservationState>,
    pub rooms: BTreeMap<i64, RoomDimensions>,
}

/// A `DatabaseService` backed by plain collections. When `broken` is set every
/// call fails the way a lost connection would.
#[derive(Default)]
pub struct MemoryDb {
    pub tables: Mutex<Tables>,
    pub broken: bool,
}

impl MemoryDb {
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Default::default()
        }
    }

    fn tables(&self) -> PortResult<std::sync::MutexGuard<'_, Tables>> {
        if self.broken {
            return Err(PortError::Unexpected("connection refused".to_string()));
        }
        Ok(self.tables.lock().unwrap())
    }

    fn survey_exists(tables: &Tables, id: i64) -> PortResult<()> {
        if tables.surveys.iter().any(|s| s.id == id) {
            Ok(())
        } else {
            Err(PortError::Invalid(format!("survey {} does not exist", id)))
        }
    }
}

#[async_trait]
impl DatabaseService for MemoryDb {
    async fn create_survey(&self, cui: i64, created_by: &str) -> PortResult<SurveySession> {
        let mut tables = self.tables()?;
        let session = SurveySession {
            id: tables.surveys.len() as i64 + 1,
            cui,
            created_at: Utc::now(),
            created_by: created_by.to_string(),
            status: SurveyStatus::Incomplete,
        };
        tables.surveys.push(session.clone());
        Ok(session)
    }

    async fn get_survey(&self, id: i64) -> PortResult<SurveySession> {
        self.tables()?
            .surveys
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Survey {} not found", id)))
    }

    async fn list_surveys_by_cui(&self, cui: i64) -> PortResult<Vec<SurveySession>> {
        let mut found: Vec<SurveySession> = self
            .tables()?
            .surveys
            .iter()
            .filter(|s| s.cui == cui)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(found)
    }

    async fn update_survey_status(&self, id: i64, status: SurveyStatus) -> PortResult<()> {
        let mut tables = self.tables()?;
        let survey = tables
            .surveys
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Survey {} not found", id)))?;
        survey.status = status;
        Ok(())
    }

    async fn get_visits(&self, relevamiento_id: i64) -> PortResult<Vec<Visit>> {
        let mut visits = self
            .tables()?
            .visits
            .get(&relevamiento_id)
            .cloned()
            .unwrap_or_default();
        visits.sort_by_key(|v| v.numero_visita);
        Ok(visits)
    }

    async fn replace_visits(&self, relevamiento_id: i64, visits: &[Visit]) -> PortResult<()> {
        let mut tables = self.tables()?;
        Self::survey_exists(&tables, relevamiento_id)?;
        tables.visits.insert(relevamiento_id, visits.to_vec());
        Ok(())
    }

    async fn list_site_works(&self) -> PortResult<Vec<SiteWork>> {
        Ok(self.tables()?.site_works.clone())
    }

    async fn create_site_work(&self, work: NewSiteWork) -> PortResult<i64> {
        let mut tables = self.tables()?;
        Self::survey_exists(&tables, work.relevamiento_id)?;
        let id = tables.site_works.len() as i64 + 1;
        tables.site_works.push(SiteWork {
            id,
            tipo_obra: work.tipo_obra,
            estado: work.estado,
            financiamiento: work.financiamiento,
            destino: work.destino,
            superficie_total: work.superficie_total,
            relevamiento_id: work.relevamiento_id,
        });
        Ok(id)
    }

    async fn save_risk_factors(&self, factors: &[RiskFactor]) -> PortResult<()> {
        let mut tables = self.tables()?;
        let sessions: BTreeSet<Option<i64>> =
            factors.iter().map(|f| f.relevamiento_id).collect();
        tables
            .risk_factors
            .retain(|f| !sessions.contains(&f.relevamiento_id));
        tables.risk_factors.extend_from_slice(factors);
        Ok(())
    }

    async fn list_outdoor_areas(&self, relevamiento_id: i64) -> PortResult<Vec<OutdoorArea>> {
        Ok(self
            .tables()?
            .outdoor_areas
            .iter()
            .filter(|a| a.relevamiento_id == relevamiento_id)
            .cloned()
            .collect())
    }

    async fn get_construction_institutions(
        &self,
        relevamiento_id: i64,
        construccion_id: i64,
    ) -> PortResult<Vec<i64>> {
        Ok(self
            .tables()?
            .institutions
            .get(&(relevamiento_id, construccion_id))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn replace_construction_institutions(
        &self,
        relevamiento_id: i64,
        construccion_id: i64,
        institution_ids: &[i64],
    ) -> PortResult<()> {
        self.tables()?.institutions.insert(
            (relevamiento_id, construccion_id),
            institution_ids.iter().copied().collect(),
        );
        Ok(())
    }

    async fn save_accessibility(
        &self,
        relevamiento_id: i64,
        construccion_id: i64,
        conditions: &[AccessibilityCondition],
    ) -> PortResult<()> {
        let kept = conditions.iter().filter(|c| c.has_data()).cloned().collect();
        self.tables()?
            .accessibility
            .insert((relevamiento_id, construccion_id), kept);
        Ok(())
    }

    async fn save_dining_use(
        &self,
        relevamiento_id: i64,
        construccion_id: i64,
        services: &[DiningService],
    ) -> PortResult<()> {
        let mut tables = self.tables()?;
        Self::survey_exists(&tables, relevamiento_id)?;
        let kept = services.iter().filter(|s| s.has_data()).cloned().collect();
        tables.dining.insert((relevamiento_id, construccion_id), kept);
        Ok(())
    }

    async fn save_conservation_states(&self, states: &[ConservationState]) -> PortResult<()> {
        let mut tables = self.tables()?;
        let keys: BTreeSet<(Option<i64>, Option<i64>)> = states
            .iter()
            .map(|s| (s.relevamiento_id, s.construccion_id))
            .collect();
        for (relevamiento_id, _) in &keys {
            Self::survey_exists(&tables, relevamiento_id.unwrap_or_default())?;
        }
        tables
            .conservation
            .retain(|s| !keys.contains(&(s.relevamiento_id, s.construccion_id)));
        tables.conservation.extend_from_slice(states);
        Ok(())
    }

    async fn update_room_dimensions(&self, local_id: i64, dims: RoomDimensions) -> PortResult<()> {
        let mut tables = self.tables()?;
        let room = tables
            .rooms
            .get_mut(&local_id)
            .ok_or_else(|| PortError::NotFound(format!("Room {} not found", local_id)))?;
        *room = dims;
        Ok(())
    }
}

//=========================================================================================
// App and request helpers
//=========================================================================================

/// Builds the full router over `db`.
pub fn build_test_app(db: Arc<MemoryDb>) -> Router {
    let state = Arc::new(AppState { db });
    web::router(state)
}

/// A fresh datastore holding one survey (id 1) for building 700123.
pub fn seeded_db() -> Arc<MemoryDb> {
    let db = MemoryDb::default();
    db.tables.lock().unwrap().surveys.push(SurveySession {
        id: 1,
        cui: 700123,
        created_at: Utc::now(),
        created_by: "inspector@example.org".to_string(),
        status: SurveyStatus::Incomplete,
    });
    Arc::new(db)
}

pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn send_json(app: Router, method: Method, uri: &str, body: Value) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    send_json(app, Method::POST, uri, body).await
}

pub async fn patch_json(app: Router, uri: &str, body: Value) -> Response {
    send_json(app, Method::PATCH, uri, body).await
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
