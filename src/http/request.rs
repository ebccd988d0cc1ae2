use crate::engine::RunCounters;
use crate::http::client::REQUEST_TIMEOUT;
use crate::http::headers::random_headers;
use crate::http::methods::carries_body;
use crate::http::status::status_label;
use crate::types::{ErrorKind, Outcome};
use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Method};

/// Sends one request and folds its outcome into `counters`.
///
/// Never fails: construction and transport errors become
/// [`Outcome::Unreachable`] and bump only the unreachable counter.
pub async fn execute_request(
    client: &Client,
    url: &str,
    method: &str,
    body: Option<&str>,
    counters: &RunCounters,
) -> Outcome {
    let method = match Method::from_bytes(method.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            tracing::debug!("Invalid method token {:?}", method);
            return unreachable(counters, ErrorKind::Malformed);
        }
    };

    let mut headers = random_headers();
    let mut request = client.request(method.clone(), url).timeout(REQUEST_TIMEOUT);

    if carries_body(method.as_str()) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        request = request.body(body.unwrap_or_default().to_string());
    }

    // `headers` replaces same-named client defaults such as the user agent.
    let request = request.headers(headers);

    match request.send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            counters.record_response(status);

            // Drain so the connection goes back to the pool.
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                if chunk.is_err() {
                    break;
                }
            }

            Outcome::Responded {
                status,
                label: status_label(status),
            }
        }
        Err(err) => {
            let kind = ErrorKind::from_reqwest_error(&err);
            tracing::trace!("{} {} failed: {}", method, url, err);
            unreachable(counters, kind)
        }
    }
}

fn unreachable(counters: &RunCounters, kind: ErrorKind) -> Outcome {
    counters.record_unreachable(kind);
    Outcome::Unreachable(kind)
}
