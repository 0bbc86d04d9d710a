// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! JWT verification and the installation handshake for tenant callbacks.
//!
//! ## Auth Flow
//!
//! 1. The host platform installs the add-on and sends the tenant's shared
//!    secret in the `installed` callback (optionally RS256-signed)
//! 2. Every later callback carries an HS256 JWT signed with that secret
//! 3. The add-on:
//!    - Decodes the token unverified to find the tenant (`iss`)
//!    - Verifies signature and expiry with the tenant's secret
//!    - Checks the query string hash (`qsh`) against the request
//!    - Mints a session token returned in `X-acpt`
//!
//! ## Security
//!
//! - Only HS256 and RS256 are accepted, never `none`
//! - Unverified claims only select the tenant and key
//! - Installation keys are fetched over HTTPS with a bounded fallback cache
//! - No clock skew tolerance on `exp`/`nbf`

pub mod claims;
pub mod error;
pub mod extractor;
pub mod install;
pub mod keys;
pub mod middleware;
pub mod qsh;
pub mod session;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use claims::{HostClaims, InstallIssuer, VerifiedIdentity};
pub use error::AuthError;
pub use extractor::{InstallVerification, Verified};
pub use install::verify_installation;
pub use keys::{FallbackKeyCache, KeyResolver};
pub use middleware::{authenticate, authenticate_token_only};
pub use qsh::QueryStringHasher;
pub use session::SESSION_TOKEN_HEADER;
