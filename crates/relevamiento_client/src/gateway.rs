//! crates/relevamiento_client/src/gateway.rs
//!
//! The `SurveyGateway` port over HTTP, talking to the survey API with
//! [`reqwest`].

use async_trait::async_trait;
use relevamiento_core::domain::{RiskFactor, Visit};
use relevamiento_core::ports::{BulkAck, PortError, PortResult, SurveyGateway};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::ClientConfig;

pub struct HttpSurveyGateway {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct Inserted {
    inserted: InsertedId,
}

#[derive(Deserialize)]
struct InsertedId {
    id: i64,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn transport(e: reqwest::Error) -> PortError {
    PortError::Transport(e.to_string())
}

impl HttpSurveyGateway {
    /// Builds a client whose every request is bounded by the configured timeout.
    pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config.api_base_url.clone()))
    }

    /// Reuses an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ---- private helpers ----

    /// Returns the response unchanged on 2xx, or `PortError::Rejected` carrying
    /// the server's `message` (or raw body) otherwise.
    async fn ensure_success(response: reqwest::Response) -> PortResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);
        Err(PortError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    /// Only a 200 whose body says `success: true` acknowledges a bulk write.
    async fn read_ack(response: reqwest::Response) -> PortResult<BulkAck> {
        let response = Self::ensure_success(response).await?;
        if response.status() != StatusCode::OK {
            debug!(status = %response.status(), "Bulk write answered without 200");
            return Ok(BulkAck { success: false });
        }
        let body = response.text().await.map_err(transport)?;
        Ok(serde_json::from_str::<BulkAck>(&body).unwrap_or_default())
    }
}

#[async_trait]
impl SurveyGateway for HttpSurveyGateway {
    async fn create_survey(&self, cui: i64, created_by: &str) -> PortResult<i64> {
        let response = self
            .client
            .post(self.url("/relevamientos"))
            .json(&json!({ "cui": cui, "created_by": created_by }))
            .send()
            .await
            .map_err(transport)?;
        let created: Inserted = Self::ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("unreadable survey id: {}", e)))?;
        Ok(created.inserted.id)
    }

    async fn fetch_visits(&self, relevamiento_id: i64) -> PortResult<Vec<Visit>> {
        let response = self
            .client
            .get(self.url("/visits"))
            .query(&[("session_id", relevamiento_id)])
            .send()
            .await
            .map_err(transport)?;
        Self::ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("unreadable visits: {}", e)))
    }

    async fn save_visits(&self, visits: &[Visit]) -> PortResult<BulkAck> {
        let response = self
            .client
            .post(self.url("/visits"))
            .json(visits)
            .send()
            .await
            .map_err(transport)?;
        Self::read_ack(response).await
    }

    async fn save_risk_factors(&self, factors: &[RiskFactor]) -> PortResult<BulkAck> {
        let response = self
            .client
            .post(self.url("/servicios_factores_riesgo"))
            .json(factors)
            .send()
            .await
            .map_err(transport)?;
        Self::read_ack(response).await
    }
}
