//! HTTP implementation of the ledger gateway.
//!
//! Talks JSON to the ACP indexer API: `POST /acp/operations` for signed
//! operations, `GET /acp/jobs/{id}` for snapshots. Every request carries the
//! API access key and a bounded timeout from [`ClientConfig`].

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::StatusCode;

use super::{GatewayError, LedgerGateway, SignedOperation, SubmitReceipt};
use crate::config::ClientConfig;
use crate::types::Job;

const API_KEY_HEADER: &str = "x-api-key";

pub struct HttpLedgerGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpLedgerGateway {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn request_error(err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Transport(err.to_string())
        }
    }

    async fn status_error(status: StatusCode, response: reqwest::Response) -> GatewayError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Unauthorized,
            StatusCode::CONFLICT => GatewayError::StaleNonce,
            s if s.is_client_error() => {
                let body = response.text().await.unwrap_or_default();
                GatewayError::RejectedByContract(body)
            }
            s => GatewayError::Transport(format!("unexpected status {}", s)),
        }
    }
}

#[async_trait]
impl LedgerGateway for HttpLedgerGateway {
    async fn submit_operation(&self, op: &SignedOperation) -> Result<SubmitReceipt, GatewayError> {
        let url = format!("{}/acp/operations", self.base_url);
        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(op)
            .send()
            .await
            .map_err(Self::request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(status, response).await);
        }

        response
            .json::<SubmitReceipt>()
            .await
            .map_err(|e| GatewayError::Transport(format!("invalid receipt payload: {}", e)))
    }

    async fn fetch_job(&self, job_id: u64) -> Result<Option<Job>, GatewayError> {
        let url = format!("{}/acp/jobs/{}", self.base_url, job_id);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(Self::request_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::status_error(status, response).await);
        }

        let job = response
            .json::<Job>()
            .await
            .map_err(|e| GatewayError::Transport(format!("invalid job payload: {}", e)))?;
        Ok(Some(job))
    }
}
