//! Domain derivation and synthesized external tool names.
//!
//! Every tool announced by a tab is exposed under a name built from the
//! sanitized domain, the data-source segment and the sanitized tool name, so
//! the same tool name on two tabs (or on a tab and a cached snapshot) never
//! collides in the external registry.

use std::sync::LazyLock;

use regex::Regex;
use url::{Host, Url};

use crate::catalog::DataSourceId;

/// Domain used when a tab URL is missing or unparsable.
pub const UNKNOWN_DOMAIN: &str = "unknown";

static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());
static REPEATED_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_{2,}").unwrap());

/// Map an arbitrary string onto the characters legal in an MCP tool name.
///
/// Runs of disallowed characters collapse into one `_`; leading and trailing
/// underscores are trimmed.
pub fn sanitize_name(raw: &str) -> String {
    let replaced = DISALLOWED.replace_all(raw, "_");
    let collapsed = REPEATED_UNDERSCORE.replace_all(&replaced, "_");
    collapsed.trim_matches('_').to_string()
}

/// Derive the catalog domain from a tab URL.
///
/// Loopback hosts are normalized to `localhost:<port>` so that dev servers on
/// different ports stay apart while `127.0.0.1` and `localhost` merge.
pub fn domain_from_url(url: Option<&str>) -> String {
    let Some(parsed) = url.and_then(|u| Url::parse(u).ok()) else {
        return UNKNOWN_DOMAIN.to_string();
    };

    let loopback = match parsed.host() {
        Some(Host::Domain(host)) => host.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(addr)) => addr.is_loopback(),
        Some(Host::Ipv6(addr)) => addr.is_loopback(),
        None => return UNKNOWN_DOMAIN.to_string(),
    };

    if loopback {
        return match parsed.port_or_known_default() {
            Some(port) => format!("localhost:{}", port),
            None => "localhost".to_string(),
        };
    }

    parsed
        .host_str()
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| UNKNOWN_DOMAIN.to_string())
}

/// Externally visible name for a catalog tool.
pub fn external_tool_name(
    prefix: &str,
    domain: &str,
    data_id: &DataSourceId,
    tool_name: &str,
) -> String {
    format!(
        "{}_{}_{}_{}",
        sanitize_name(prefix),
        sanitize_name(domain),
        data_id.name_segment(),
        sanitize_name(tool_name)
    )
}
