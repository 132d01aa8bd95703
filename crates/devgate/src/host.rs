// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host normalization shared by accounts, settings and connect params.

use url::Url;

/// Normalize a user-supplied host into a base URL.
///
/// `gitpod.io` becomes `https://gitpod.io`; explicit schemes are kept and
/// trailing slashes are dropped.
pub fn normalize_host(host: &str) -> String {
    let trimmed = host.trim().trim_end_matches('/');
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    }
}

/// The authority (`host[:port]`) of a host; bare hosts are normalized first.
///
/// Falls back to the trimmed input when it does not parse as a URL.
pub fn host_authority(host: &str) -> String {
    let normalized = normalize_host(host);
    match Url::parse(&normalized) {
        Ok(url) => match (url.host_str(), url.port()) {
            (Some(h), Some(port)) => format!("{h}:{port}"),
            (Some(h), None) => h.to_owned(),
            (None, _) => host.trim().to_owned(),
        },
        Err(_) => host.trim().to_owned(),
    }
}

/// Whether two hosts name the same control plane after normalization.
pub fn same_host(a: &str, b: &str) -> bool {
    normalize_host(a) == normalize_host(b)
}
