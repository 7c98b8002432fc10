//! Lead API HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required). The grid loads with
//! two GETs issued side by side and writes one field at a time with PATCH.

use std::thread;
use std::time::Duration;

use leadgrid_engine::{CellValue, Field, FieldKey, GridData, Lead, LeadId, PatchRequest};

pub const DEFAULT_PAGE: u32 = 1;

/// Lead API client (blocking).
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::blocking::Client,
    api_base: String,
}

/// Error type for API operations. The display text is what the grid shows
/// in a cell after a failed save.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("API error {0}: {1}")]
    Http(u16, String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("HTTP client setup failed: {0}")]
    Setup(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http(status, _) => Some(*status),
            _ => None,
        }
    }
}

/// One page of leads as served by `GET /api/leads`.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LeadPage {
    #[serde(default)]
    pub data: Vec<Lead>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl ApiClient {
    /// Create a client for `api_base` (e.g. `http://localhost:8000`).
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("leadgrid/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Column definitions, in display order.
    pub fn fetch_fields(&self) -> Result<Vec<Field>, ClientError> {
        let url = format!("{}/api/fields", self.api_base);
        let resp = self.get(&url, &[])?;
        resp.json::<Vec<Field>>()
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    pub fn fetch_leads(&self, page: u32, page_size: u32) -> Result<LeadPage, ClientError> {
        let url = format!("{}/api/leads", self.api_base);
        let query = [
            ("page", page.to_string()),
            ("page_size", page_size.to_string()),
        ];
        let resp = self.get(&url, &query)?;
        resp.json::<LeadPage>()
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// Fetch fields and one page of leads concurrently. Either failing fails
    /// the whole load; nothing is returned partially.
    pub fn load(&self, page: u32, page_size: u32) -> Result<GridData, ClientError> {
        let (fields, leads) = thread::scope(|s| {
            let fields = s.spawn(|| self.fetch_fields());
            let leads = s.spawn(|| self.fetch_leads(page, page_size));
            (joined(fields.join()), joined(leads.join()))
        });

        let fields = fields?;
        let leads = leads?;
        log::info!(
            "loaded {} fields, {} leads (page {}, total {:?})",
            fields.len(),
            leads.data.len(),
            page,
            leads.total
        );
        Ok(GridData {
            fields,
            leads: leads.data,
        })
    }

    /// PATCH a single field of one lead. The response body is ignored.
    pub fn commit_field(
        &self,
        lead_id: &LeadId,
        field_key: &FieldKey,
        value: &CellValue,
    ) -> Result<(), ClientError> {
        let mut body = serde_json::Map::new();
        body.insert(field_key.to_string(), serde_json::Value::from(value.clone()));
        self.patch_lead(lead_id, &serde_json::Value::Object(body))
    }

    /// Send a PATCH produced by the grid controller.
    pub fn send(&self, request: &PatchRequest) -> Result<(), ClientError> {
        self.commit_field(&request.key.lead, &request.key.field, &request.value)
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// `{base}/api/leads/{id}` with the id encoded as one path segment.
    fn lead_url(&self, lead_id: &LeadId) -> Result<reqwest::Url, ClientError> {
        let mut url = reqwest::Url::parse(&self.api_base)
            .map_err(|e| ClientError::Setup(format!("invalid API base {}: {}", self.api_base, e)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Setup(format!("API base cannot have a path: {}", self.api_base)))?
            .pop_if_empty()
            .extend(["api", "leads", lead_id.as_str()]);
        Ok(url)
    }

    fn patch_lead(&self, lead_id: &LeadId, body: &serde_json::Value) -> Result<(), ClientError> {
        let url = self.lead_url(lead_id)?;
        log::debug!("PATCH {} {}", url, body);
        let response = self
            .http
            .patch(url)
            .json(body)
            .send()
            .map_err(|e| ClientError::Network(e.to_string()))?;
        check_status(response).map(|_| ())
    }

    fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::blocking::Response, ClientError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .map_err(|e| ClientError::Network(e.to_string()))?;
        check_status(response)
    }
}

fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, ClientError> {
    let status = response.status().as_u16();
    if !response.status().is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ClientError::Http(status, body));
    }
    Ok(response)
}

fn joined<T>(
    result: thread::Result<Result<T, ClientError>>,
) -> Result<T, ClientError> {
    result.unwrap_or_else(|_| Err(ClientError::Network("request thread panicked".into())))
}

// ── Tests ───────────────────────────────────────────────────────────
