//! URL validator capability
//!
//! Decides whether a URL points at a reachable image. The verdict is either
//! `valid` or `invalid: <reason>`; only transport failures surface as tool
//! errors, so the model can tell "this URL is wrong" apart from "the check
//! itself broke".

use crate::config::ToolsConfig;
use crate::error::{IconAgentError, Result};
use crate::tools::{OutputKind, ParamKind, ParamSchema, Tool, ToolExecutor, ToolResult};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Capability name advertised to the model
pub const URL_VALIDATOR_NAME: &str = "url_validator";

/// Rejects URLs the validator must not contact
#[derive(Debug, Clone, Default)]
pub struct HostPolicy {
    allow_private_hosts: bool,
}

impl HostPolicy {
    /// Policy that blocks localhost and private address literals
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy that allows any host
    pub fn allow_private_hosts() -> Self {
        Self {
            allow_private_hosts: true,
        }
    }

    /// Check scheme and host, returning the parsed URL
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the URL is malformed, uses a
    /// scheme other than http(s), or targets a blocked host
    pub fn check(&self, raw: &str) -> std::result::Result<Url, String> {
        let url = Url::parse(raw.trim()).map_err(|e| format!("malformed URL ({})", e))?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(format!("unsupported scheme '{}'", other)),
        }

        let host = url
            .host_str()
            .ok_or_else(|| "URL has no host".to_string())?;

        if !self.allow_private_hosts {
            if host.eq_ignore_ascii_case("localhost") {
                return Err("localhost is not allowed".to_string());
            }
            let literal = host.trim_start_matches('[').trim_end_matches(']');
            if let Ok(ip) = IpAddr::from_str(literal) {
                if is_private(&ip) {
                    return Err(format!("address {} is not publicly routable", ip));
                }
            }
        }

        Ok(url)
    }
}

fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || v4.octets()[0] == 0
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Maximum redirect hops followed before giving up
const MAX_REDIRECTS: usize = 10;

/// Follow redirects only to targets the host policy accepts; a rejected hop
/// stops and hands back the 3xx response
fn redirect_policy(policy: HostPolicy) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.stop();
        }
        match policy.check(attempt.url().as_str()) {
            Ok(_) => attempt.follow(),
            Err(reason) => {
                tracing::debug!(target = %attempt.url(), reason = %reason, "Redirect blocked");
                attempt.stop()
            }
        }
    })
}

/// Checks that a URL resolves to an image
pub struct UrlValidatorTool {
    client: reqwest::Client,
    policy: HostPolicy,
}

impl UrlValidatorTool {
    /// Create a validator using the fetch timeout and host policy in `config`
    pub fn new(config: &ToolsConfig) -> Self {
        let policy = if config.allow_private_hosts {
            HostPolicy::allow_private_hosts()
        } else {
            HostPolicy::new()
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_seconds))
            .user_agent(concat!("iconagent/", env!("CARGO_PKG_VERSION")))
            .redirect(redirect_policy(policy.clone()))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, policy }
    }

    /// Produce the verdict for `raw_url`
    ///
    /// # Errors
    ///
    /// Returns `ToolExecution` if the host cannot be reached at all
    pub async fn verdict(&self, raw_url: &str) -> Result<String> {
        let url = match self.policy.check(raw_url) {
            Ok(url) => url,
            Err(reason) => return Ok(format!("invalid: {}", reason)),
        };

        let mut response = self.probe(Method::HEAD, &url).await?;
        if matches!(
            response.status(),
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
        ) {
            tracing::debug!(url = %url, "HEAD refused, retrying with GET");
            response = self.probe(Method::GET, &url).await?;
        }

        let status = response.status();
        if status.is_redirection() {
            let target = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("an unknown location");
            return Ok(format!("invalid: redirect to {} was not followed", target));
        }
        if !status.is_success() {
            return Ok(format!("invalid: HTTP status {}", status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if content_type.starts_with("image/") {
            Ok("valid".to_string())
        } else if content_type.is_empty() {
            Ok("invalid: response has no content type".to_string())
        } else {
            Ok(format!("invalid: content type is {}", content_type))
        }
    }

    async fn probe(&self, method: Method, url: &Url) -> Result<reqwest::Response> {
        self.client
            .request(method.clone(), url.clone())
            .send()
            .await
            .map_err(|e| {
                IconAgentError::ToolExecution {
                    tool: URL_VALIDATOR_NAME.to_string(),
                    message: format!("{} {} failed: {}", method, url, e),
                }
                .into()
            })
    }
}

#[async_trait]
impl ToolExecutor for UrlValidatorTool {
    fn tool_definition(&self) -> Tool {
        Tool::new(
            URL_VALIDATOR_NAME,
            "Checks whether a URL is reachable and serves an image. Returns 'valid' or 'invalid: <reason>'.",
            vec![ParamSchema::required(
                "url",
                ParamKind::String,
                "Absolute http(s) URL of the candidate image",
            )],
            OutputKind::Verdict,
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let url = args["url"].as_str().unwrap_or_default();
        let verdict = self.verdict(url).await?;
        tracing::debug!(url = %url, verdict = %verdict, "URL validated");
        Ok(ToolResult::success(verdict))
    }
}
