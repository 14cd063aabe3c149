//! Reachability probe for the pvcast server's generated API docs.

use serde::Serialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8099;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum DocsStatus {
    Available,
    Unavailable(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct DocsProbe {
    pub url: String,
    pub result: DocsStatus,
}

impl DocsProbe {
    pub fn to_message(&self) -> String {
        match &self.result {
            DocsStatus::Available => format!("API docs available at {}", self.url),
            DocsStatus::Unavailable(reason) => {
                format!("Could not load API docs from {} ({})", self.url, reason)
            }
        }
    }
}

pub fn docs_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}/docs")
}

/// GET `url` and report whether it answered with HTTP 200.
///
/// Transport failures are folded into `Unavailable`; only a client that
/// cannot be constructed is returned as an error.
#[cfg(feature = "docs")]
pub async fn probe(url: &str, timeout: Duration) -> anyhow::Result<DocsProbe> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(format!("pvcast-config/{}", env!("CARGO_PKG_VERSION")))
        .build()?;

    let result = match client.get(url).send().await {
        Ok(resp) if resp.status() == reqwest::StatusCode::OK => DocsStatus::Available,
        Ok(resp) => DocsStatus::Unavailable(format!("HTTP {}", resp.status().as_u16())),
        Err(e) if e.is_timeout() => DocsStatus::Unavailable(format!(
            "timed out after {}",
            humantime::format_duration(timeout)
        )),
        Err(e) => DocsStatus::Unavailable(e.to_string()),
    };
    debug!(%url, ?result, "docs probe finished");

    Ok(DocsProbe {
        url: url.to_string(),
        result,
    })
}
