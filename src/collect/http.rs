// src/collect/http.rs
use metrics::counter;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::collect::error::CollectorError;
use crate::model::Platform;
use crate::rate_limiter::RateLimiter;

pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

pub(crate) fn default_client() -> Client {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Send `req` through `limiter` and decode a JSON body.
///
/// 404 (not found) and 403 (blocked) become `Ok(None)`; any other non-2xx is
/// an error carrying the status.
pub(crate) async fn get_json<T: DeserializeOwned>(
    platform: Platform,
    limiter: &RateLimiter,
    req: RequestBuilder,
    endpoint: &str,
) -> Result<Option<T>, CollectorError> {
    limiter.acquire().await;
    counter!("collect_http_requests_total", "platform" => platform.as_str()).increment(1);

    let resp = req.send().await?;
    let status = resp.status();

    if status == StatusCode::NOT_FOUND {
        tracing::debug!(target: "collect", %platform, endpoint, "not found upstream");
        return Ok(None);
    }
    if status == StatusCode::FORBIDDEN {
        tracing::warn!(target: "collect", %platform, endpoint, "request blocked (403)");
        counter!("collect_blocked_total", "platform" => platform.as_str()).increment(1);
        return Ok(None);
    }
    if !status.is_success() {
        return Err(CollectorError::Status {
            platform,
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
        });
    }

    let bytes = resp.bytes().await?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}
