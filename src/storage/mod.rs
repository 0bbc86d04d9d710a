// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Tenant Storage
//!
//! The authentication core only reads and writes full [`Tenant`] records
//! through the [`TenantStore`] trait. Two backends are provided:
//!
//! - [`InMemoryTenantStore`] - process-local map, used in tests and when no
//!   database path is configured
//! - [`RedbTenantStore`] - embedded ACID database (pure Rust, `redb`)
//!
//! ## Lookup Keys
//!
//! ```text
//! clientKey  -> Tenant      (primary, unique)
//! baseUrl    -> clientKey   (secondary)
//! ```
//!
//! Both backends are safe to share across concurrent requests behind an `Arc`.

pub mod memory;
pub mod tenant_db;

pub use memory::InMemoryTenantStore;
pub use tenant_db::RedbTenantStore;

use crate::models::Tenant;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("tenant not found: {0}")]
    NotFound(String),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("tenant store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// CRUD over tenant records.
pub trait TenantStore: Send + Sync {
    /// Look up a tenant by its client key.
    fn get(&self, client_key: &str) -> StoreResult<Tenant>;

    /// Look up a tenant by its host base URL.
    fn get_by_url(&self, base_url: &str) -> StoreResult<Tenant>;

    /// Insert or fully overwrite the tenant keyed by `client_key`.
    fn set(&self, tenant: Tenant) -> StoreResult<Tenant>;

    /// Administrative removal of a tenant record.
    fn delete(&self, client_key: &str) -> StoreResult<()>;

    /// Check the backend is reachable (readiness probe).
    fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
