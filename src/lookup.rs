/*!
 * Remote archive lookup
 *
 * Each file is uploaded once to the lookup service, which answers with the
 * archive locations holding an identical file. There are no retries: the
 * first answer decides the file's fate.
 */

use std::fs;
use std::path::Path;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

use crate::config::EndpointConfig;
use crate::error::{AuditError, Result};
use crate::types::LookupOutcome;

/// Multipart field carrying the file bytes
pub const FILE_FIELD: &str = "file";

/// Something that can tell whether the archive holds a file
pub trait Lookup: Send + Sync {
    /// Resolve one local file.
    ///
    /// Local read failures come back as [`AuditError::Filesystem`]; any other
    /// error is fatal for the batch.
    fn lookup(&self, path: &Path) -> Result<LookupOutcome>;
}

/// Blocking HTTP client for the lookup service
pub struct LookupClient {
    client: Client,
    url: Url,
}

impl LookupClient {
    /// Build a client from endpoint configuration
    pub fn new(config: &EndpointConfig) -> Result<Self> {
        let mut url = config.url.clone();
        if !config.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &config.query {
                pairs.append_pair(key, value);
            }
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| crate::error!(Config, "Invalid header name {:?}: {}", name, e))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| crate::error!(Config, "Invalid value for header {}: {}", name, e))?;
            headers.insert(name, value);
        }

        if config.insecure {
            warn!(
                host = url.host_str().unwrap_or_default(),
                "TLS certificate verification is disabled"
            );
        }

        let client = Client::builder()
            .user_agent(concat!("archive-audit/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        Ok(Self { client, url })
    }

    /// Host of the configured endpoint, safe to display
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }
}

impl Lookup for LookupClient {
    fn lookup(&self, path: &Path) -> Result<LookupOutcome> {
        // The handle lives only inside fs::read, so it is released before the
        // request goes out whatever happens next.
        let bytes = fs::read(path).map_err(|source| AuditError::Filesystem {
            path: path.to_path_buf(),
            source,
        })?;

        let file_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let size = bytes.len();
        let form = Form::new().part(FILE_FIELD, Part::bytes(bytes).file_name(file_name));

        let response = self.client.post(self.url.clone()).multipart(form).send()?;
        let status = response.status();
        let body = response.text()?;
        debug!(path = %path.display(), size, status = status.as_u16(), "lookup response");

        classify_response(status, body)
    }
}

/// Turn a lookup response into an outcome.
///
/// 404 means the archive does not hold the file. A 2xx response must carry a
/// JSON array of location strings; anything else is a request error carrying
/// the server's body.
pub fn classify_response(status: StatusCode, body: String) -> Result<LookupOutcome> {
    if status == StatusCode::NOT_FOUND {
        return Ok(LookupOutcome::NotFound);
    }

    if status.is_success() {
        return match serde_json::from_str::<Vec<String>>(&body) {
            Ok(locations) => Ok(LookupOutcome::Found(locations)),
            Err(e) => {
                warn!(status = status.as_u16(), error = %e, "unexpected lookup payload");
                Err(AuditError::Request {
                    status: status.as_u16(),
                    body,
                })
            }
        };
    }

    Err(AuditError::Request {
        status: status.as_u16(),
        body,
    })
}
