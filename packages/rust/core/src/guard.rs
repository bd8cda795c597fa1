//! URL validation and SSRF protection for outbound fetches.

use std::net::IpAddr;

use reqwest::redirect::Policy;
use url::{Host, Url};

use doc2md_shared::{Doc2MdError, Result};

/// Parse a caller-supplied URL and check it may be fetched.
///
/// Only `http`/`https` are accepted. Loopback, private, and link-local
/// hosts are rejected unless `allow_private_hosts` is set.
pub fn check_url(raw: &str, allow_private_hosts: bool) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Doc2MdError::validation("url must not be empty"));
    }

    let url = Url::parse(raw).map_err(|e| Doc2MdError::validation(format!("invalid URL '{raw}': {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Doc2MdError::validation(format!(
                "unsupported URL scheme '{other}', expected http or https"
            )));
        }
    }

    if url.host().is_none() {
        return Err(Doc2MdError::validation(format!("URL has no host: {raw}")));
    }

    if !allow_private_hosts && is_internal_host(&url) {
        return Err(Doc2MdError::Blocked(url.to_string()));
    }

    Ok(url)
}

/// Redirect hops followed before a request fails.
pub const MAX_REDIRECTS: usize = 5;

/// Redirect policy that runs [`check_url`] on every hop.
///
/// A redirect into a blocked host stops the request with the
/// [`Doc2MdError::Blocked`] error as its source.
pub fn redirect_policy(allow_private_hosts: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            return attempt.error(Doc2MdError::Network(format!(
                "too many redirects (limit {MAX_REDIRECTS})"
            )));
        }
        match check_url(attempt.url().as_str(), allow_private_hosts) {
            Ok(_) => attempt.follow(),
            Err(e) => attempt.error(e),
        }
    })
}

/// The guard error behind a failed request, if a redirect hop was refused.
pub(crate) fn blocked_redirect(err: &reqwest::Error) -> Option<Doc2MdError> {
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(Doc2MdError::Blocked(url)) = inner.downcast_ref::<Doc2MdError>() {
            return Some(Doc2MdError::Blocked(url.clone()));
        }
        source = inner.source();
    }
    None
}

/// Whether the URL's host is a loopback, private, or local-only name.
fn is_internal_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(Host::Domain(host)) => {
            let host = host.to_ascii_lowercase();
            host == "localhost"
                || host.ends_with(".localhost")
                || host.ends_with(".local")
                || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
                // 192.0.0.0/24
                || (v4.octets()[0] == 192 && v4.octets()[1] == 0 && v4.octets()[2] == 0)
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (first & 0xfe00) == 0xfc00
                // fe80::/10 link local
                || (first & 0xffc0) == 0xfe80
        }
    }
}
