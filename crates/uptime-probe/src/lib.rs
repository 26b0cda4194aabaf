//! The Probe Engine (C3): executes a single HTTP probe and classifies the outcome.
//! Never fails for a down target — transport failures are encoded in the returned
//! `Probe`. The only failure is invalid input (malformed method/URL).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uptime_store::{ErrorKind, ProbeError};

/// Total deadline for a single probe request, including connect, TLS, and body read.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ProbeEngineError {
    #[error("invalid probe input: {0}")]
    InvalidInput(String),
}

/// The result of a single probe: up/down plus, when down, a structured classification
/// of why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    pub url: String,
    pub up: bool,
    #[serde(default)]
    pub error: Option<ProbeError>,
}

/// Executes a single HTTP request against `url` using `method`, with a fixed 10-second
/// total timeout. Redirects are not followed: a probe must observe the target's own
/// status code.
#[tracing::instrument(skip_all, fields(%method, %url))]
pub async fn probe(method: &str, url: &str) -> Result<Probe, ProbeEngineError> {
    let reqwest_method = reqwest::Method::from_bytes(method.as_bytes())
        .map_err(|e| ProbeEngineError::InvalidInput(e.to_string()))?;
    let parsed_url =
        reqwest::Url::parse(url).map_err(|e| ProbeEngineError::InvalidInput(e.to_string()))?;

    let client = reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| ProbeEngineError::InvalidInput(e.to_string()))?;

    match client.request(reqwest_method, parsed_url).send().await {
        Ok(response) if response.status().as_u16() == 200 => Ok(Probe {
            url: url.to_string(),
            up: true,
            error: None,
        }),
        Ok(response) => {
            let status = response.status();
            tracing::warn!(status = %status, "probe received non-200 status");
            Ok(Probe {
                url: url.to_string(),
                up: false,
                error: Some(ProbeError {
                    status_code: Some(status.as_u16()),
                    kind: ErrorKind::Response,
                    error: status
                        .canonical_reason()
                        .unwrap_or("unexpected status code")
                        .to_string(),
                }),
            })
        }
        Err(err) => {
            tracing::warn!(error = %err, "probe transport failure");
            Ok(Probe {
                url: url.to_string(),
                up: false,
                error: Some(classify_transport_error(&err)),
            })
        }
    }
}

fn classify_transport_error(err: &reqwest::Error) -> ProbeError {
    let message = last_colon_segment(&err.to_string());
    let status_code = err.status().map(|s| s.as_u16());

    let kind = if err.is_timeout() {
        ErrorKind::Timeout
    } else if err.is_connect() {
        let lower = err.to_string().to_lowercase();
        if lower.contains("dns") || lower.contains("resolve") || lower.contains("lookup") {
            ErrorKind::Dns
        } else {
            ErrorKind::Server
        }
    } else if err.is_request() || err.is_body() || err.is_decode() {
        ErrorKind::Server
    } else {
        ErrorKind::Unknown
    };

    ProbeError {
        status_code,
        kind,
        error: message,
    }
}

/// The trailing `: `-delimited segment of an error's Display string, matching how the
/// source derives a short message from a wrapped platform error.
fn last_colon_segment(message: &str) -> String {
    message
        .rsplit(": ")
        .next()
        .unwrap_or(message)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn probe_reports_up_on_200() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(200);
        });

        let result = probe("GET", &server.url("/")).await.unwrap();
        mock.assert();
        assert!(result.up);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn probe_classifies_non_200_as_response_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(500);
        });

        let result = probe("GET", &server.url("/")).await.unwrap();
        assert!(!result.up);
        let error = result.error.unwrap();
        assert_eq!(error.status_code, Some(500));
        assert_eq!(error.kind, ErrorKind::Response);
    }

    #[tokio::test]
    async fn probe_rejects_invalid_method() {
        let err = probe("NOT A METHOD", "http://example.invalid/").await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn probe_rejects_malformed_url() {
        let err = probe("GET", "not-a-url").await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn probe_classifies_connection_refused_as_server_error() {
        // No listener bound on this port; connection should be refused quickly.
        let result = probe("GET", "http://127.0.0.1:1/").await.unwrap();
        assert!(!result.up);
        let error = result.error.unwrap();
        assert!(matches!(error.kind, ErrorKind::Server | ErrorKind::Unknown));
    }
}
