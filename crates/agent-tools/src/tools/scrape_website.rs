//! Page scraping through the Firecrawl API, with SSRF checks on the target.

use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use super::truncate_utf8;
use crate::error::ToolError;
use crate::tool::{ParamKind, ParamSpec, Tool, ToolArgs, ToolOutput};

/// Maximum scraped text handed back to the assistant (8KB).
const MAX_CONTENT_BYTES: usize = 8 * 1024;

/// Check if an IP address is private/internal (SSRF protection).
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private()
                || ipv4.is_loopback()
                // Link-local, includes cloud metadata services
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_documentation()
                // Shared address space (100.64.0.0/10)
                || (ipv4.octets()[0] == 100 && (ipv4.octets()[1] & 0xC0) == 64)
                || *ipv4 == Ipv4Addr::new(169, 254, 169, 254)
                || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                || ipv6
                    .to_ipv4_mapped()
                    .map(|v4| is_private_ip(&IpAddr::V4(v4)))
                    .unwrap_or(false)
                // Unique local (fc00::/7)
                || (ipv6.segments()[0] & 0xFE00) == 0xFC00
                // Link-local (fe80::/10)
                || (ipv6.segments()[0] & 0xFFC0) == 0xFE80
        }
    }
}

/// Reject non-http(s) URLs and hosts that resolve to internal addresses.
async fn validate_url_ssrf(url_str: &str) -> Result<Url, ToolError> {
    let url = Url::parse(url_str).map_err(|e| ToolError::invalid("url", format!("Invalid URL: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ToolError::invalid("url", "only http and https URLs are allowed"));
    }

    let host = url
        .host_str()
        .ok_or_else(|| ToolError::invalid("url", "URL must have a host"))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let port = url.port_or_known_default().unwrap_or(80);

    let addrs = tokio::task::spawn_blocking(move || {
        (host.as_str(), port)
            .to_socket_addrs()
            .map(|iter| iter.collect::<Vec<_>>())
    })
    .await
    .map_err(|e| ToolError::ExecutionFailed(format!("DNS resolution task failed: {}", e)))?
    .map_err(|e| ToolError::ExecutionFailed(format!("Failed to resolve hostname: {}", e)))?;

    for addr in addrs {
        if is_private_ip(&addr.ip()) {
            warn!(%url, ip = %addr.ip(), "Blocked scrape of internal address");
            return Err(ToolError::invalid(
                "url",
                "URL resolves to a private or internal address",
            ));
        }
    }

    Ok(url)
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ScrapeData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

/// Fetches a public web page as markdown.
pub struct ScrapeWebsite;

#[async_trait]
impl Tool for ScrapeWebsite {
    fn name(&self) -> &str {
        "scrape_website"
    }

    fn description(&self) -> &str {
        "Read the text content of a public web page."
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::required(
            "url",
            ParamKind::String,
            "http or https URL of the page",
        )];
        PARAMS
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let services = &args.ctx.services;
        let api_key = services
            .config
            .firecrawl_api_key()
            .ok_or(ToolError::NotConfigured("Website scraping"))?;
        let url = validate_url_ssrf(&args.get_string("url")?).await?;

        debug!(%url, "Scraping page");

        let response = services
            .http
            .post(format!("{}/v1/scrape", services.config.firecrawl_base_url))
            .bearer_auth(api_key)
            .json(&json!({
                "url": url.as_str(),
                "formats": ["markdown"],
                "onlyMainContent": true,
            }))
            .send()
            .await?;

        let status = response.status();
        let body: ScrapeResponse = response.json().await?;
        if !status.is_success() || !body.success {
            return Err(ToolError::ExecutionFailed(format!(
                "Scrape failed: {}",
                body.error.unwrap_or_else(|| format!("HTTP {}", status))
            )));
        }

        let data = body.data.unwrap_or(ScrapeData {
            markdown: None,
            metadata: None,
        });
        let markdown = data.markdown.unwrap_or_default();
        if markdown.trim().is_empty() {
            return Ok(ToolOutput::success("The page has no readable content."));
        }

        let title = data
            .metadata
            .as_ref()
            .and_then(|m| m.get("title"))
            .and_then(|t| t.as_str())
            .map(|t| format!("{}\n\n", t))
            .unwrap_or_default();
        Ok(ToolOutput::success(format!(
            "{}{}",
            title,
            truncate_utf8(markdown.trim(), MAX_CONTENT_BYTES)
        )))
    }
}
