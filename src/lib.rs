// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Add-on Auth - JWT verification and installation handshake
//!
//! This crate gates the callbacks a host platform sends to a multi-tenant
//! add-on: install/uninstall handshakes, HS256 tenant requests bound to the
//! request by a query string hash, and session token re-issuance.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token codec, QSH, key resolver and the two middlewares
//! - `config` - Environment configuration
//! - `storage` - Tenant store trait and backends (in-memory, redb)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
