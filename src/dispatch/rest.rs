//! REST sidecar for the dispatch client.
//!
//! Everything the dashboard fetches or triggers outside the push channel:
//! country lists, security-rule bodies, index syntheses, and the workflow
//! commands. Plain async results; callers overwrite their cache on success
//! and keep the previous value on error. No retries.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::config::Config;
use crate::logging::log_rest_error;

/// Startup knobs of one offline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartParams {
    pub sample_queue_size: u32,
    pub sampling_threads: u32,
    pub samples_per_thread: u32,
    pub state_queue_size: u32,
    /// Run duration in minutes.
    pub duration: u64,
}

impl Default for StartParams {
    fn default() -> Self {
        Self {
            sample_queue_size: 1,
            sampling_threads: 1,
            samples_per_thread: 1,
            state_queue_size: 1,
            duration: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Country {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CountriesResponse {
    #[serde(default)]
    countries: Vec<Country>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecurityIndexesResponse {
    security_indexes_synthesis: Value,
}

pub struct RestClient {
    http: reqwest::Client,
    base: Url,
}

impl RestClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base = Url::parse(&cfg.base_url)
            .with_context(|| format!("invalid base url {}", cfg.base_url))?;
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .context("building http client")?;
        Ok(Self { http, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .with_context(|| format!("invalid path {}", path))
    }

    async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = self.endpoint(path)?;
        let mut request = self.http.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                log_rest_error(path, &err.to_string());
                return Err(err).with_context(|| format!("requesting {}", path));
            }
        };
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log_rest_error(path, &format!("{}: {}", status, body));
            bail!("{} failed with {}", path, status);
        }
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        let text = response.text().await?;
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).with_context(|| format!("decoding response of {}", path))
    }

    /// Countries selectable at workflow creation.
    pub async fn countries(&self) -> Result<Vec<Country>> {
        let body = self.post("offline/countries", None).await?;
        let decoded: CountriesResponse =
            serde_json::from_value(body).context("decoding countries")?;
        Ok(decoded.countries)
    }

    /// One computed security rule, addressed by workflow, attribute set,
    /// index type and contingency.
    pub async fn security_rule(
        &self,
        workflow_id: &str,
        attribute_set: &str,
        index_type: &str,
        contingency_id: &str,
    ) -> Result<Value> {
        let path = format!(
            "offline/rule/{}/{}/{}/{}",
            workflow_id, attribute_set, index_type, contingency_id
        );
        self.post(&path, None).await
    }

    /// Security-index synthesis of a workflow.
    pub async fn security_indexes(&self, workflow_id: &str) -> Result<Value> {
        let path = format!("offline/workflow/{}/getsecurityindexes", workflow_id);
        let body = self.post(&path, None).await?;
        let decoded: SecurityIndexesResponse =
            serde_json::from_value(body).context("decoding security indexes")?;
        Ok(decoded.security_indexes_synthesis)
    }

    pub async fn create_workflow(
        &self,
        params: &crate::dispatch::envelope::CreationParams,
    ) -> Result<()> {
        let body = serde_json::to_value(params)?;
        self.post("offline/workflow/create", Some(&body)).await?;
        Ok(())
    }

    pub async fn remove_workflow(&self, workflow_id: &str) -> Result<()> {
        let path = format!("offline/workflow/{}/remove", workflow_id);
        self.post(&path, None).await?;
        Ok(())
    }

    pub async fn start_workflow(&self, workflow_id: &str, params: &StartParams) -> Result<()> {
        let path = format!("offline/workflow/{}/start", workflow_id);
        let body = serde_json::to_value(params)?;
        self.post(&path, Some(&body)).await?;
        Ok(())
    }

    pub async fn stop_workflow(&self, workflow_id: &str) -> Result<()> {
        let path = format!("offline/workflow/{}/stop", workflow_id);
        self.post(&path, None).await?;
        Ok(())
    }

    pub async fn compute_security_rules(&self, workflow_id: &str) -> Result<()> {
        let path = format!("offline/workflow/{}/computesecurityrules", workflow_id);
        self.post(&path, None).await?;
        Ok(())
    }
}
