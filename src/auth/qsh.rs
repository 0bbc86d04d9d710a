// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Query string hash (QSH) canonicalization.
//!
//! The `qsh` claim binds a token to one HTTP request:
//!
//! ```text
//! canonical = METHOD "&" canonical_path "&" canonical_query
//! qsh       = hex(sha256(canonical))
//! ```
//!
//! - `canonical_path`: request path, optionally with the add-on's context path
//!   stripped, `/` when empty, no trailing `/`, `&` escaped as `%26`
//! - `canonical_query`: parameters except `jwt`, names and values
//!   percent-decoded then re-encoded with the RFC 3986 unreserved set, values
//!   of repeated names sorted and joined with `,`, pairs sorted by name
//!
//! Hosts may or may not address the add-on through its context path, so both
//! variants are accepted.

use std::collections::BTreeMap;

use axum::http::{Method, Uri};
use sha2::{Digest, Sha256};

/// Query parameter that carries the token itself; never part of the hash.
pub const JWT_PARAM: &str = "jwt";

/// Computes and checks query string hashes for one add-on base URL.
#[derive(Debug, Clone, Default)]
pub struct QueryStringHasher {
    /// Path component of the add-on base URL (`/app` for `https://h/app/`)
    context_path: Option<String>,
}

impl QueryStringHasher {
    /// Build a hasher for the add-on served at `base_url`.
    pub fn new(base_url: &str) -> Self {
        let context_path = url::Url::parse(base_url)
            .ok()
            .map(|url| url.path().trim_end_matches('/').to_string())
            .filter(|path| !path.is_empty());
        Self { context_path }
    }

    pub fn context_path(&self) -> Option<&str> {
        self.context_path.as_deref()
    }

    /// Canonical request string, with or without the context path stripped.
    pub fn canonical_request(&self, method: &Method, uri: &Uri, strip_context: bool) -> String {
        let context = if strip_context {
            self.context_path.as_deref()
        } else {
            None
        };
        format!(
            "{}&{}&{}",
            method.as_str().to_uppercase(),
            canonical_path(uri.path(), context),
            canonical_query(uri.query())
        )
    }

    /// Hex-encoded SHA-256 of the canonical request.
    pub fn hash(&self, method: &Method, uri: &Uri, strip_context: bool) -> String {
        let canonical = self.canonical_request(method, uri, strip_context);
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }

    /// Whether `claim` matches either canonicalization variant of the request.
    pub fn matches(&self, claim: &str, method: &Method, uri: &Uri) -> bool {
        if self.hash(method, uri, false) == claim {
            return true;
        }
        self.context_path.is_some() && self.hash(method, uri, true) == claim
    }
}

fn canonical_path(path: &str, context_path: Option<&str>) -> String {
    let path = match context_path {
        // Only strip whole segments: `/app` is not a prefix of `/application`
        Some(context) => path
            .strip_prefix(context)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .unwrap_or(path),
        None => path,
    };

    let mut canonical = if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    if canonical.len() > 1 && canonical.ends_with('/') {
        canonical.pop();
    }
    canonical.replace('&', "%26")
}

fn canonical_query(query: Option<&str>) -> String {
    let Some(query) = query else {
        return String::new();
    };

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if name == JWT_PARAM {
            continue;
        }
        params
            .entry(urlencoding::encode(&name).into_owned())
            .or_default()
            .push(urlencoding::encode(&value).into_owned());
    }

    params
        .into_iter()
        .map(|(name, mut values)| {
            values.sort();
            format!("{name}={}", values.join(","))
        })
        .collect::<Vec<_>>()
        .join("&")
}
