//! Shared GCP REST plumbing: configuration, authentication, JSON calls.

use std::time::{Duration, Instant};

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{Error, Result};

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

// Refresh metadata tokens this long before they actually expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Project-level settings for the GCP data sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GcpConfig {
    /// Project that owns the billing export and the monitored VMs.
    pub project_id: String,

    /// BigQuery dataset holding the `gcp_billing_export_v1_*` tables.
    pub billing_dataset: String,

    /// Read tiles from the Firestore `realtime/summary` document when present.
    pub use_firestore_cache: bool,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            billing_dataset: "billing_export".to_string(),
            use_firestore_cache: true,
        }
    }
}

impl GcpConfig {
    /// Fail early if the project is not set.
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(Error::Config(
                "gcp.project_id is not set (or GCP_PROJECT_ID)".into(),
            ));
        }
        Ok(())
    }
}

/// How requests to Google APIs are authorized.
#[derive(Debug, Clone)]
pub enum GcpAuth {
    /// A pre-issued OAuth access token (e.g. `gcloud auth print-access-token`).
    AccessToken(String),
    /// Fetch tokens for the attached service account from the GCE metadata server.
    MetadataServer,
}

impl std::fmt::Display for GcpAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccessToken(_) => write!(f, "access_token"),
            Self::MetadataServer => write!(f, "metadata_server"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Authorized HTTP client shared by every GCP-backed source.
pub struct GcpClient {
    http: reqwest::Client,
    auth: GcpAuth,
    cached: Mutex<Option<CachedToken>>,
    config: GcpConfig,
}

impl GcpClient {
    pub fn new(config: GcpConfig, auth: GcpAuth) -> Self {
        Self {
            http: reqwest::Client::new(),
            auth,
            cached: Mutex::new(None),
            config,
        }
    }

    pub fn config(&self) -> &GcpConfig {
        &self.config
    }

    pub fn project_id(&self) -> &str {
        &self.config.project_id
    }

    async fn bearer_token(&self) -> Result<String> {
        match &self.auth {
            GcpAuth::AccessToken(token) => Ok(token.clone()),
            GcpAuth::MetadataServer => {
                let mut cached = self.cached.lock().await;
                if let Some(c) = cached.as_ref().filter(|c| c.expires_at > Instant::now()) {
                    return Ok(c.token.clone());
                }

                debug!("fetching access token from metadata server");
                let response = self
                    .http
                    .get(METADATA_TOKEN_URL)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| Error::Auth(format!("metadata server unreachable: {e}")))?;

                if !response.status().is_success() {
                    let status = response.status();
                    return Err(Error::Auth(format!("metadata server returned {status}")));
                }

                let token: MetadataToken = response
                    .json()
                    .await
                    .map_err(|e| Error::Auth(e.to_string()))?;

                let lifetime =
                    Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
                *cached = Some(CachedToken {
                    token: token.access_token.clone(),
                    expires_at: Instant::now() + lifetime,
                });
                Ok(token.access_token)
            }
        }
    }

    async fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.bearer_token().await?;
        Ok(req
            .header("Authorization", format!("Bearer {token}"))
            .header("accept", "application/json"))
    }

    /// GET a JSON document.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        service: &'static str,
        url: reqwest::Url,
    ) -> Result<T> {
        self.get_json_optional(service, url)
            .await?
            .ok_or_else(|| Error::Api {
                service,
                status: StatusCode::NOT_FOUND.as_u16(),
                body: String::new(),
            })
    }

    /// GET a JSON document, mapping 404 to `None`.
    pub(crate) async fn get_json_optional<T: DeserializeOwned>(
        &self,
        service: &'static str,
        url: reqwest::Url,
    ) -> Result<Option<T>> {
        let req = self.authorized(self.http.get(url)).await?;
        let response = req.send().await.map_err(|e| Error::Network(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::decode(service, response).await.map(Some)
    }

    /// POST a JSON body and decode the JSON reply.
    pub(crate) async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        service: &'static str,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let req = self
            .authorized(self.http.post(url).header("content-type", "application/json"))
            .await?;
        let response = req
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        Self::decode(service, response).await
    }

    async fn decode<T: DeserializeOwned>(
        service: &'static str,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                service,
                status,
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(format!("{service}: {e}")))
    }
}

impl std::fmt::Display for GcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gcp({}, auth={})", self.config.project_id, self.auth)
    }
}
