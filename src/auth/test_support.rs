// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token fixtures shared by the auth unit tests.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::Value;

/// RSA key pair standing in for the host's installation signing key.
pub const INSTALL_PRIVATE_PEM: &str = include_str!("testdata/install_private.pem");
pub const INSTALL_PUBLIC_PEM: &str = include_str!("testdata/install_public.pem");
/// Public half of an unrelated key pair.
pub const OTHER_PUBLIC_PEM: &str = include_str!("testdata/other_public.pem");

pub const ADDON_BASE_URL: &str = "https://addon.example";
pub const ADDON_KEY: &str = "com.example.addon";

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn hs256_token(claims: &Value, secret: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn rs256_token(claims: &Value, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    encode(
        &header,
        claims,
        &EncodingKey::from_rsa_pem(INSTALL_PRIVATE_PEM.as_bytes()).unwrap(),
    )
    .unwrap()
}

/// Unsigned token declaring `alg: none`.
pub fn none_token(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
    format!("{header}.{payload}.")
}
