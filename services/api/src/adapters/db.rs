//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use relevamiento_core::domain::{
    AccessibilityCondition, ClockTime, ConservationState, DiningService, NewSiteWork,
    OutdoorArea, RiskFactor, RoomDimensions, SiteWork, SurveySession, SurveyStatus, Visit,
};
use relevamiento_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use std::collections::BTreeSet;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Maps a driver error onto the port's taxonomy.
///
/// Foreign-key violations (23503) mean the request named a survey that does
/// not exist, which is the caller's mistake.
fn port_error(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503") => {
            PortError::Invalid(format!(
                "referenced record does not exist ({})",
                db_err.constraint().unwrap_or("unknown constraint")
            ))
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn to_i32(field: &str, value: u32) -> PortResult<i32> {
    i32::try_from(value).map_err(|_| PortError::Invalid(format!("{} is out of range", field)))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SurveyRecord {
    id: i64,
    cui: i64,
    created_at: DateTime<Utc>,
    created_by: String,
    estado: String,
}
impl SurveyRecord {
    fn to_domain(self) -> PortResult<SurveySession> {
        let status = self
            .estado
            .parse::<SurveyStatus>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(SurveySession {
            id: self.id,
            cui: self.cui,
            created_at: self.created_at,
            created_by: self.created_by,
            status,
        })
    }
}

#[derive(FromRow)]
struct VisitRecord {
    relevamiento_id: i64,
    numero_visita: i32,
    fecha: NaiveDate,
    hora_inicio: String,
    hora_finalizacion: String,
    observaciones: Option<String>,
}
impl VisitRecord {
    fn to_domain(self) -> PortResult<Visit> {
        let clock = |raw: &str| {
            raw.parse::<ClockTime>()
                .map_err(|e| PortError::Unexpected(format!("stored visit time: {}", e)))
        };
        Ok(Visit {
            numero_visita: u32::try_from(self.numero_visita)
                .map_err(|_| PortError::Unexpected("negative visit number stored".to_string()))?,
            fecha: self.fecha,
            hora_inicio: clock(&self.hora_inicio)?,
            hora_finalizacion: clock(&self.hora_finalizacion)?,
            observaciones: self.observaciones,
            relevamiento_id: self.relevamiento_id,
        })
    }
}

#[derive(FromRow)]
struct SiteWorkRecord {
    id: i64,
    tipo_obra: String,
    estado: String,
    financiamiento: String,
    destino: Vec<String>,
    superficie_total: f64,
    relevamiento_id: i64,
}
impl SiteWorkRecord {
    fn to_domain(self) -> SiteWork {
        SiteWork {
            id: self.id,
            tipo_obra: self.tipo_obra,
            estado: self.estado,
            financiamiento: self.financiamiento,
            destino: self.destino,
            superficie_total: self.superficie_total,
            relevamiento_id: self.relevamiento_id,
        }
    }
}

#[derive(FromRow)]
struct OutdoorAreaRecord {
    id: i64,
    identificacion_plano: i64,
    tipo: String,
    superficie: f64,
    estado_conservacion: Option<String>,
    terminacion_piso: Option<String>,
    relevamiento_id: i64,
}
impl OutdoorAreaRecord {
    fn to_domain(self) -> OutdoorArea {
        OutdoorArea {
            id: self.id,
            identificacion_plano: self.identificacion_plano,
            tipo: self.tipo,
            superficie: self.superficie,
            estado_conservacion: self.estado_conservacion,
            terminacion_piso: self.terminacion_piso,
            relevamiento_id: self.relevamiento_id,
        }
    }
}

const SURVEY_COLUMNS: &str = "id, cui, created_at, created_by, estado";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_survey(&self, cui: i64, created_by: &str) -> PortResult<SurveySession> {
        let record = sqlx::query_as::<_, SurveyRecord>(&format!(
            "INSERT INTO relevamientos (cui, created_by) VALUES ($1, $2) RETURNING {}",
            SURVEY_COLUMNS
        ))
        .bind(cui)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)?;
        record.to_domain()
    }

    async fn get_survey(&self, id: i64) -> PortResult<SurveySession> {
        let record = sqlx::query_as::<_, SurveyRecord>(&format!(
            "SELECT {} FROM relevamientos WHERE id = $1",
            SURVEY_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Survey {} not found", id)),
            _ => port_error(e),
        })?;
        record.to_domain()
    }

    async fn list_surveys_by_cui(&self, cui: i64) -> PortResult<Vec<SurveySession>> {
        let records = sqlx::query_as::<_, SurveyRecord>(&format!(
            "SELECT {} FROM relevamientos WHERE cui = $1 ORDER BY created_at DESC, id DESC",
            SURVEY_COLUMNS
        ))
        .bind(cui)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        records.into_iter().map(SurveyRecord::to_domain).collect()
    }

    async fn update_survey_status(&self, id: i64, status: SurveyStatus) -> PortResult<()> {
        let result = sqlx::query("UPDATE relevamientos SET estado = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Survey {} not found", id)));
        }
        Ok(())
    }

    async fn get_visits(&self, relevamiento_id: i64) -> PortResult<Vec<Visit>> {
        let records = sqlx::query_as::<_, VisitRecord>(
            "SELECT relevamiento_id, numero_visita, fecha, hora_inicio, hora_finalizacion, observaciones \
             FROM visitas WHERE relevamiento_id = $1 ORDER BY numero_visita ASC",
        )
        .bind(relevamiento_id)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        records.into_iter().map(VisitRecord::to_domain).collect()
    }

    async fn replace_visits(&self, relevamiento_id: i64, visits: &[Visit]) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(port_error)?;

        sqlx::query("DELETE FROM visitas WHERE relevamiento_id = $1")
            .bind(relevamiento_id)
            .execute(&mut *tx)
            .await
            .map_err(port_error)?;

        for visit in visits {
            sqlx::query(
                "INSERT INTO visitas \
                 (relevamiento_id, numero_visita, fecha, hora_inicio, hora_finalizacion, observaciones) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(relevamiento_id)
            .bind(to_i32("numero_visita", visit.numero_visita)?)
            .bind(visit.fecha)
            .bind(visit.hora_inicio.to_string())
            .bind(visit.hora_finalizacion.to_string())
            .bind(visit.observaciones.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(port_error)?;
        }

        tx.commit().await.map_err(port_error)
    }

    async fn list_site_works(&self) -> PortResult<Vec<SiteWork>> {
        let records = sqlx::query_as::<_, SiteWorkRecord>(
            "SELECT id, tipo_obra, estado, financiamiento, destino, superficie_total, relevamiento_id \
             FROM obras_en_predio ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(records.into_iter().map(SiteWorkRecord::to_domain).collect())
    }

    async fn create_site_work(&self, work: NewSiteWork) -> PortResult<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO obras_en_predio \
             (tipo_obra, estado, financiamiento, destino, superficie_total, relevamiento_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(&work.tipo_obra)
        .bind(&work.estado)
        .bind(&work.financiamiento)
        .bind(&work.destino)
        .bind(work.superficie_total)
        .bind(work.relevamiento_id)
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(id)
    }

    async fn save_risk_factors(&self, factors: &[RiskFactor]) -> PortResult<()> {
        let mut sessions = BTreeSet::new();
        for factor in factors {
            let id = factor.relevamiento_id.ok_or_else(|| {
                PortError::Invalid(format!("factor '{}' has no relevamiento_id", factor.factor))
            })?;
            sessions.insert(id);
        }

        let mut tx = self.pool.begin().await.map_err(port_error)?;
        for relevamiento_id in &sessions {
            sqlx::query("DELETE FROM servicios_factores_riesgo WHERE relevamiento_id = $1")
                .bind(relevamiento_id)
                .execute(&mut *tx)
                .await
                .map_err(port_error)?;
        }
        for factor in factors {
            sqlx::query(
                "INSERT INTO servicios_factores_riesgo \
                 (relevamiento_id, id_servicio, factor, disponibilidad, distancia, mitigacion) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(factor.relevamiento_id)
            .bind(factor.id_servicio)
            .bind(&factor.factor)
            .bind(&factor.disponibilidad)
            .bind(&factor.distancia)
            .bind(&factor.mitigacion)
            .execute(&mut *tx)
            .await
            .map_err(port_error)?;
        }
        tx.commit().await.map_err(port_error)
    }

    async fn list_outdoor_areas(&self, relevamiento_id: i64) -> PortResult<Vec<OutdoorArea>> {
        let records = sqlx::query_as::<_, OutdoorAreaRecord>(
            "SELECT id, identificacion_plano, tipo, superficie, estado_conservacion, terminacion_piso, relevamiento_id \
             FROM areas_exteriores WHERE relevamiento_id = $1 ORDER BY identificacion_plano ASC",
        )
        .bind(relevamiento_id)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(records.into_iter().map(OutdoorAreaRecord::to_domain).collect())
    }

    async fn get_construction_institutions(
        &self,
        relevamiento_id: i64,
        construccion_id: i64,
    ) -> PortResult<Vec<i64>> {
        sqlx::query_scalar(
            "SELECT institucion_id FROM instituciones_por_construccion \
             WHERE relevamiento_id = $1 AND construccion_id = $2 ORDER BY institucion_id ASC",
        )
        .bind(relevamiento_id)
        .bind(construccion_id)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)
    }

    async fn replace_construction_institutions(
        &self,
        relevamiento_id: i64,
        construccion_id: i64,
        institution_ids: &[i64],
    ) -> PortResult<()> {
        let unique: BTreeSet<i64> = institution_ids.iter().copied().collect();
        let mut tx = self.pool.begin().await.map_err(port_error)?;

        sqlx::query(
            "DELETE FROM instituciones_por_construccion \
             WHERE relevamiento_id = $1 AND construccion_id = $2",
        )
        .bind(relevamiento_id)
        .bind(construccion_id)
        .execute(&mut *tx)
        .await
        .map_err(port_error)?;

        for institucion_id in unique {
            sqlx::query(
                "INSERT INTO instituciones_por_construccion \
                 (relevamiento_id, construccion_id, institucion_id) VALUES ($1, $2, $3)",
            )
            .bind(relevamiento_id)
            .bind(construccion_id)
            .bind(institucion_id)
            .execute(&mut *tx)
            .await
            .map_err(port_error)?;
        }

        tx.commit().await.map_err(port_error)
    }

    async fn save_accessibility(
        &self,
        relevamiento_id: i64,
        construccion_id: i64,
        conditions: &[AccessibilityCondition],
    ) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(port_error)?;

        sqlx::query(
            "DELETE FROM condiciones_accesibilidad \
             WHERE relevamiento_id = $1 AND construccion_id = $2",
        )
        .bind(relevamiento_id)
        .bind(construccion_id)
        .execute(&mut *tx)
        .await
        .map_err(port_error)?;

        for condition in conditions.iter().filter(|c| c.has_data()) {
            sqlx::query(
                "INSERT INTO condiciones_accesibilidad \
                 (relevamiento_id, construccion_id, servicio, disponibilidad, estado, cantidad, mantenimiento) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(relevamiento_id)
            .bind(construccion_id)
            .bind(&condition.servicio)
            .bind(&condition.disponibilidad)
            .bind(&condition.estado)
            .bind(to_i32("cantidad", condition.cantidad)?)
            .bind(&condition.mantenimiento)
            .execute(&mut *tx)
            .await
            .map_err(port_error)?;
        }

        tx.commit().await.map_err(port_error)
    }

    async fn save_dining_use(
        &self,
        relevamiento_id: i64,
        construccion_id: i64,
        services: &[DiningService],
    ) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(port_error)?;

        sqlx::query("DELETE FROM uso_comedor WHERE relevamiento_id = $1 AND construccion_id = $2")
            .bind(relevamiento_id)
            .bind(construccion_id)
            .execute(&mut *tx)
            .await
            .map_err(port_error)?;

        for service in services.iter().filter(|s| s.has_data()) {
            sqlx::query(
                "INSERT INTO uso_comedor \
                 (relevamiento_id, construccion_id, servicio, disponibilidad, tipos_comedor) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(relevamiento_id)
            .bind(construccion_id)
            .bind(&service.servicio)
            .bind(&service.disponibilidad)
            .bind(&service.tipos_comedor)
            .execute(&mut *tx)
            .await
            .map_err(port_error)?;
        }

        tx.commit().await.map_err(port_error)
    }

    async fn save_conservation_states(&self, states: &[ConservationState]) -> PortResult<()> {
        let mut rows = Vec::with_capacity(states.len());
        for state in states {
            let (Some(relevamiento_id), Some(construccion_id)) =
                (state.relevamiento_id, state.construccion_id)
            else {
                return Err(PortError::Invalid(format!(
                    "structure '{}' is missing its survey or construction",
                    state.estructura
                )));
            };
            rows.push((relevamiento_id, construccion_id, state));
        }
        let targets: BTreeSet<(i64, i64)> = rows.iter().map(|(r, c, _)| (*r, *c)).collect();

        let mut tx = self.pool.begin().await.map_err(port_error)?;
        for (relevamiento_id, construccion_id) in &targets {
            sqlx::query(
                "DELETE FROM estado_conservacion \
                 WHERE relevamiento_id = $1 AND construccion_id = $2",
            )
            .bind(relevamiento_id)
            .bind(construccion_id)
            .execute(&mut *tx)
            .await
            .map_err(port_error)?;
        }
        for (relevamiento_id, construccion_id, state) in rows {
            sqlx::query(
                "INSERT INTO estado_conservacion \
                 (relevamiento_id, construccion_id, estructura, disponibilidad, estado) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(relevamiento_id)
            .bind(construccion_id)
            .bind(&state.estructura)
            .bind(&state.disponibilidad)
            .bind(&state.estado)
            .execute(&mut *tx)
            .await
            .map_err(port_error)?;
        }
        tx.commit().await.map_err(port_error)
    }

    async fn update_room_dimensions(&self, local_id: i64, dims: RoomDimensions) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE locales SET largo_predominante = $1, ancho_predominante = $2, diametro = $3, \
             altura_maxima = $4, altura_minima = $5 WHERE id = $6",
        )
        .bind(dims.largo_predominante)
        .bind(dims.ancho_predominante)
        .bind(dims.diametro)
        .bind(dims.altura_maxima)
        .bind(dims.altura_minima)
        .bind(local_id)
        .execute(&self.pool)
        .await
        .map_err(port_error)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Room {} not found", local_id)));
        }
        Ok(())
    }
}
