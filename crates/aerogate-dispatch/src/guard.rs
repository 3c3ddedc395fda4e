// crates/aerogate-dispatch/src/guard.rs
// ============================================================================
// Module: Webhook URL Guard
// Description: SSRF guard for webhook registration and delivery.
// Purpose: Reject endpoints resolving to private or local address space.
// Dependencies: url, std::net
// ============================================================================

//! ## Overview
//! The guard validates webhook URLs twice: at registration and again
//! immediately before each POST, so a hostname that re-resolves into private
//! address space between the two checks still fails closed. Rejected ranges:
//! RFC 1918 (10/8, 172.16/12, 192.168/16), loopback, link-local, unspecified,
//! multicast, broadcast, and IPv6 unique-local.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;
use std::net::ToSocketAddrs;

use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// URL guard failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuardError {
    /// URL failed to parse.
    #[error("invalid webhook url: {0}")]
    Invalid(String),
    /// Scheme is not http or https.
    #[error("unsupported webhook scheme: {0}")]
    Scheme(String),
    /// URL embeds credentials.
    #[error("webhook url credentials are not allowed")]
    Credentials,
    /// Host is missing or failed to resolve.
    #[error("webhook host resolution failed: {0}")]
    Resolution(String),
    /// Host resolves into private or local address space.
    #[error("webhook host resolves to private or link-local address: {0}")]
    PrivateAddress(String),
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates a webhook URL and returns it parsed.
///
/// Resolves the host and rejects any peer address in private or local
/// ranges. Run at registration and again before every POST.
///
/// # Errors
///
/// Returns [`GuardError`] when the URL is malformed, carries credentials, or
/// resolves into a forbidden range.
pub fn validate_webhook_url(raw: &str) -> Result<Url, GuardError> {
    let url = Url::parse(raw).map_err(|err| GuardError::Invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(GuardError::Scheme(url.scheme().to_string()));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(GuardError::Credentials);
    }
    let host = url
        .host_str()
        .ok_or_else(|| GuardError::Resolution("url has no host".to_string()))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| GuardError::Resolution("url has no port".to_string()))?;
    for ip in resolve_host_ips(host, port)? {
        if is_private_or_link_local(&ip) {
            return Err(GuardError::PrivateAddress(host.to_string()));
        }
    }
    Ok(url)
}

/// Resolves a host into candidate peer addresses.
fn resolve_host_ips(host: &str, port: u16) -> Result<Vec<IpAddr>, GuardError> {
    let bare = host.strip_prefix('[').and_then(|inner| inner.strip_suffix(']')).unwrap_or(host);
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }
    let ips: Vec<IpAddr> = (bare, port)
        .to_socket_addrs()
        .map_err(|err| GuardError::Resolution(err.to_string()))?
        .map(|addr| addr.ip())
        .collect();
    if ips.is_empty() {
        return Err(GuardError::Resolution(format!("no addresses for {host}")));
    }
    Ok(ips)
}

/// Returns true when an IP is private, loopback, link-local, or otherwise local.
#[must_use]
pub(crate) fn is_private_or_link_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => {
            addr.is_private()
                || addr.is_loopback()
                || addr.is_link_local()
                || addr.is_unspecified()
                || addr.is_multicast()
                || addr.is_broadcast()
        }
        IpAddr::V6(addr) => {
            let mapped_private = addr.to_ipv4_mapped().is_some_and(|mapped| {
                mapped.is_private()
                    || mapped.is_loopback()
                    || mapped.is_link_local()
                    || mapped.is_unspecified()
                    || mapped.is_multicast()
                    || mapped.is_broadcast()
            });
            mapped_private
                || addr.is_loopback()
                || addr.is_unique_local()
                || addr.is_unicast_link_local()
                || addr.is_unspecified()
                || addr.is_multicast()
        }
    }
}
