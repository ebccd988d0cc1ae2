use crate::error::ResolveError;
use crate::http::client::{REQUEST_TIMEOUT, create_client};
use crate::types::MethodSource;
use reqwest::header::ALLOW;
use reqwest::{Client, Method};

/// Fallback probes, in order, when OPTIONS gives no usable `Allow` list.
const PROBE_ORDER: [Method; 3] = [Method::HEAD, Method::GET, Method::POST];

/// Methods that carry the configured body.
pub const BODY_METHODS: [&str; 3] = ["POST", "PUT", "PATCH"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Best single method; reported to the user as the suggestion.
    pub chosen: String,
    /// Ordered, never empty.
    pub supported: Vec<String>,
    pub source: MethodSource,
}

impl Resolution {
    fn single(method: String, source: MethodSource) -> Self {
        Self {
            chosen: method.clone(),
            supported: vec![method],
            source,
        }
    }
}

pub fn carries_body(method: &str) -> bool {
    BODY_METHODS.contains(&method)
}

/// Determines which method(s) to send.
///
/// An explicit method short-circuits without touching the network. Otherwise the
/// target is asked via OPTIONS, then probed with HEAD, GET and POST in turn.
pub async fn resolve(url: &str, explicit: Option<&str>) -> Result<Resolution, ResolveError> {
    if let Some(method) = explicit.map(str::trim).filter(|m| !m.is_empty()) {
        return Ok(Resolution::single(
            method.to_ascii_uppercase(),
            MethodSource::Explicit,
        ));
    }

    let client = create_client(1).map_err(ResolveError::Client)?;
    detect(&client, url).await
}

async fn detect(client: &Client, url: &str) -> Result<Resolution, ResolveError> {
    if let Some(allowed) = probe_options(client, url).await {
        let chosen = choose_best_method(&allowed);
        tracing::info!("OPTIONS allows [{}], choosing {}", allowed.join(", "), chosen);
        return Ok(Resolution {
            chosen,
            supported: allowed,
            source: MethodSource::Allow,
        });
    }

    for method in PROBE_ORDER {
        tracing::debug!("Probing {} with {}", url, method);
        match client
            .request(method.clone(), url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => {
                tracing::info!(
                    "{} probe answered with {}, using it",
                    method,
                    response.status().as_u16()
                );
                return Ok(Resolution::single(method.to_string(), MethodSource::Probe));
            }
            Err(err) => tracing::debug!("{} probe failed: {}", method, err),
        }
    }

    Err(ResolveError::NoMethod {
        url: url.to_string(),
    })
}

async fn probe_options(client: &Client, url: &str) -> Option<Vec<String>> {
    let response = match client
        .request(Method::OPTIONS, url)
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!("OPTIONS probe failed: {}", err);
            return None;
        }
    };

    let allow = response.headers().get(ALLOW)?.to_str().ok()?;
    let methods = parse_allow(allow);
    if methods.is_empty() { None } else { Some(methods) }
}

/// Splits an `Allow` header value into trimmed method names, keeping order.
pub fn parse_allow(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// POST > GET > HEAD > first listed.
pub fn choose_best_method(methods: &[String]) -> String {
    ["POST", "GET", "HEAD"]
        .into_iter()
        .find(|preferred| methods.iter().any(|m| m == preferred))
        .map(str::to_string)
        .or_else(|| methods.first().cloned())
        .unwrap_or_else(|| "GET".to_string())
}
