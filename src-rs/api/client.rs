use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{CreateTaskResponse, DashboardBackend, StatusQuery, TaskRequest};
use crate::chat::{ChatTitle, HistorySource};
use crate::dashboard::{TaskId, TaskStatusResponse};
use crate::error::{TrackerError, TrackerResult};
use crate::storage::Credentials;

/// HTTP client for the dashboard-generation and chat-history endpoints.
pub struct DashboardClient {
    pub base_url: String,
    credentials: Credentials,
    client: Client,
}

impl DashboardClient {
    pub fn new(base_url: &str, credentials: Credentials, timeout: Duration) -> TrackerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TrackerError::Transport(err.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            client,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    fn auth_headers(&self) -> TrackerResult<HeaderMap> {
        let token = self.credentials.require_token()?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| TrackerError::AuthRequired)?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    /// Maps non-success statuses to errors. A 401 also drops stored credentials.
    async fn check(&self, resp: Response) -> TrackerResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED {
            warn!("backend rejected credentials, clearing stored token");
            self.credentials.clear()?;
            return Err(TrackerError::SessionExpired);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(TrackerError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl DashboardBackend for DashboardClient {
    async fn create_task(&self, request: &TaskRequest) -> TrackerResult<TaskId> {
        let url = format!("{}/llm/dashboard", self.base_url);
        let headers = self.auth_headers()?;
        debug!(chat_id = %request.chat_id, message_id = %request.message_id, "creating dashboard task");

        let resp = self.client.post(url).headers(headers).json(request).send().await?;
        let resp = self.check(resp).await?;
        let body = resp.json::<CreateTaskResponse>().await?;
        match body.task_id {
            Some(task_id) if !task_id.trim().is_empty() => Ok(task_id),
            _ => Err(TrackerError::InvalidResponse(
                "no task_id received from server".to_string(),
            )),
        }
    }

    async fn task_status(&self, query: &StatusQuery) -> TrackerResult<TaskStatusResponse> {
        let url = format!("{}/llm/dashboard/{}", self.base_url, query.task_id);
        let headers = self.auth_headers()?;
        let resp = self
            .client
            .get(url)
            .headers(headers)
            .query(&[
                ("chat_id", query.chat_id.as_str()),
                ("message_id", query.message_id.as_str()),
            ])
            .send()
            .await?;
        let resp = self.check(resp).await?;
        Ok(resp.json::<TaskStatusResponse>().await?)
    }
}

#[async_trait]
impl HistorySource for DashboardClient {
    async fn fetch_titles(&self) -> TrackerResult<Vec<ChatTitle>> {
        let url = format!("{}/api/titles", self.base_url);
        let headers = self.auth_headers()?;
        let resp = self.client.get(url).headers(headers).send().await?;
        let resp = self.check(resp).await?;
        let value = resp.json::<Value>().await?;
        let items = value.as_array().cloned().unwrap_or_default();
        let mut out = Vec::new();
        for item in items {
            if let Ok(title) = serde_json::from_value::<ChatTitle>(item) {
                out.push(title);
            }
        }
        Ok(out)
    }

    async fn fetch_history(&self, chat_id: &str) -> TrackerResult<Value> {
        let url = format!("{}/api/history", self.base_url);
        let headers = self.auth_headers()?;
        let resp = self
            .client
            .get(url)
            .headers(headers)
            .query(&[("chat_id", chat_id)])
            .send()
            .await?;
        let resp = self.check(resp).await?;
        Ok(resp.json::<Value>().await?)
    }
}
