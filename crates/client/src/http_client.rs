use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use console_config::ApiConfig;
use console_domain::{
    ConsoleError, ConsoleResult, Execution, Job, JobPage, JobQuery, Member, SchedulerApi,
    TotalCount,
};

use crate::credentials::CredentialStore;

const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// 基于reqwest的调度服务客户端
pub struct HttpSchedulerApi {
    base_url: String,
    http_client: reqwest::Client,
    credentials: Arc<CredentialStore>,
}

impl HttpSchedulerApi {
    pub fn new(config: &ApiConfig, credentials: Arc<CredentialStore>) -> ConsoleResult<Self> {
        Self::with_timeout(
            config.normalized_base_url(),
            Duration::from_secs(config.request_timeout_seconds),
            credentials,
        )
    }

    pub fn with_timeout(
        base_url: &str,
        timeout: Duration,
        credentials: Arc<CredentialStore>,
    ) -> ConsoleResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConsoleError::config_error(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    fn job_path(name: &str) -> String {
        format!("/jobs/{}", urlencoding::encode(name))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http_client.request(method, url);
        match self.credentials.get() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// 发送请求并把非2xx状态转换为错误
    async fn send(&self, builder: RequestBuilder, what: &str) -> ConsoleResult<Response> {
        let response = builder.send().await.map_err(|e| {
            warn!("{} failed to reach scheduler: {}", what, e);
            ConsoleError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            debug!("{} -> HTTP {}", what, status);
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!("{} failed: HTTP {} - {}", what, status, body);
        Err(ConsoleError::from_status(status.as_u16(), body))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> ConsoleResult<T> {
        let response = self.send(builder, what).await?;
        let bytes = response.bytes().await.map_err(ConsoleError::from)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!("{} returned an undecodable body: {}", what, e);
            ConsoleError::Serialization(format!("{what}: {e}"))
        })
    }

    async fn send_empty(&self, builder: RequestBuilder, what: &str) -> ConsoleResult<()> {
        self.send(builder, what).await?;
        Ok(())
    }
}

#[async_trait]
impl SchedulerApi for HttpSchedulerApi {
    async fn list_jobs(&self, query: &JobQuery) -> ConsoleResult<JobPage> {
        let builder = self.request(Method::GET, "/jobs").query(query);
        let response = self.send(builder, "GET /jobs").await?;

        let total = match response.headers().get(TOTAL_COUNT_HEADER) {
            Some(value) => {
                let raw = value
                    .to_str()
                    .map_err(|e| ConsoleError::Serialization(format!("X-Total-Count: {e}")))?;
                Some(raw.parse::<TotalCount>()?)
            }
            None => None,
        };

        let bytes = response.bytes().await.map_err(ConsoleError::from)?;
        let jobs: Vec<Job> = serde_json::from_slice(&bytes)
            .map_err(|e| ConsoleError::Serialization(format!("GET /jobs: {e}")))?;
        Ok(JobPage { jobs, total })
    }

    async fn get_job(&self, name: &str) -> ConsoleResult<Job> {
        let path = Self::job_path(name);
        self.send_json(self.request(Method::GET, &path), &format!("GET {path}"))
            .await
    }

    async fn upsert_job(&self, body: &Value) -> ConsoleResult<()> {
        let builder = self.request(Method::POST, "/jobs").json(body);
        self.send_empty(builder, "POST /jobs").await
    }

    async fn run_job(&self, name: &str) -> ConsoleResult<()> {
        let path = Self::job_path(name);
        self.send_empty(self.request(Method::POST, &path), &format!("POST {path}"))
            .await
    }

    async fn toggle_job(&self, name: &str) -> ConsoleResult<()> {
        let path = format!("{}/toggle", Self::job_path(name));
        self.send_empty(self.request(Method::POST, &path), &format!("POST {path}"))
            .await
    }

    async fn delete_job(&self, name: &str) -> ConsoleResult<()> {
        let path = Self::job_path(name);
        self.send_empty(self.request(Method::DELETE, &path), &format!("DELETE {path}"))
            .await
    }

    async fn list_executions(
        &self,
        job_name: &str,
        output_size_limit: Option<usize>,
    ) -> ConsoleResult<Vec<Execution>> {
        let path = format!("{}/executions", Self::job_path(job_name));
        let mut builder = self.request(Method::GET, &path);
        if let Some(limit) = output_size_limit {
            builder = builder.query(&[("output_size_limit", limit)]);
        }
        self.send_json(builder, &format!("GET {path}")).await
    }

    async fn get_execution(&self, job_name: &str, execution_id: &str) -> ConsoleResult<Execution> {
        let path = format!(
            "{}/executions/{}",
            Self::job_path(job_name),
            urlencoding::encode(execution_id)
        );
        self.send_json(self.request(Method::GET, &path), &format!("GET {path}"))
            .await
    }

    async fn busy(&self) -> ConsoleResult<Vec<Execution>> {
        self.send_json(self.request(Method::GET, "/busy"), "GET /busy")
            .await
    }

    async fn members(&self) -> ConsoleResult<Vec<Member>> {
        self.send_json(self.request(Method::GET, "/members"), "GET /members")
            .await
    }

    async fn leader(&self) -> ConsoleResult<Member> {
        self.send_json(self.request(Method::GET, "/leader"), "GET /leader")
            .await
    }
}
