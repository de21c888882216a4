// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hostname extraction from URL-ish configuration values.
//!
//! The coordinator API URL and registry domain are configured either as full
//! URLs or bare hostnames; the backend override and credential map only want
//! the host part.

/// Extract the hostname from a URL or bare domain.
///
/// Returns `None` when no hostname can be found (empty input, or a URL with
/// an empty authority) — callers treat that as a malformed value.
pub fn hostname(raw: &str) -> Option<String> {
    let rest = raw.trim();
    let rest = rest
        .strip_prefix("https://")
        .or_else(|| rest.strip_prefix("http://"))
        .unwrap_or(rest);
    // authority ends at the first path/query/fragment delimiter
    let authority = rest.split(['/', '?', '#']).next()?;
    // drop userinfo, then port
    let host = authority.rsplit('@').next()?.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
