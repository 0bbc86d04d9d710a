// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded tenant database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `tenants`: client_key → serialized Tenant (JSON bytes)
//! - `tenants_by_url`: base_url → client_key

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::models::Tenant;

use super::{StoreError, StoreResult, TenantStore};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: client_key → serialized Tenant (JSON bytes).
const TENANTS: TableDefinition<&str, &[u8]> = TableDefinition::new("tenants");

/// Secondary index: host base URL → client_key.
const TENANTS_BY_URL: TableDefinition<&str, &str> = TableDefinition::new("tenants_by_url");

// =============================================================================
// RedbTenantStore
// =============================================================================

/// Tenant store persisted in a single redb file.
pub struct RedbTenantStore {
    db: Database,
}

impl RedbTenantStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(TENANTS)?;
            let _ = write_txn.open_table(TENANTS_BY_URL)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    fn read_tenant(&self, client_key: &str) -> StoreResult<Option<Tenant>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TENANTS)?;
        match table.get(client_key)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }
}

impl TenantStore for RedbTenantStore {
    fn get(&self, client_key: &str) -> StoreResult<Tenant> {
        tracing::trace!(client_key = %client_key, "Tenant requested from database");
        self.read_tenant(client_key)?
            .ok_or_else(|| StoreError::NotFound(client_key.to_string()))
    }

    fn get_by_url(&self, base_url: &str) -> StoreResult<Tenant> {
        let client_key = {
            let read_txn = self.db.begin_read()?;
            let index = read_txn.open_table(TENANTS_BY_URL)?;
            match index.get(base_url)? {
                Some(v) => v.value().to_string(),
                None => return Err(StoreError::NotFound(base_url.to_string())),
            }
        };
        self.get(&client_key)
    }

    fn set(&self, tenant: Tenant) -> StoreResult<Tenant> {
        let json = serde_json::to_vec(&tenant)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TENANTS)?;
            let mut index = write_txn.open_table(TENANTS_BY_URL)?;

            // Read the previous base URL before overwriting so a moved host
            // does not leave a dangling index entry
            let previous_url = match table.get(tenant.client_key.as_str())? {
                Some(existing) => {
                    let previous: Tenant = serde_json::from_slice(existing.value())?;
                    Some(previous.base_url)
                }
                None => None,
            };

            match &previous_url {
                Some(url) => {
                    tracing::debug!(client_key = %tenant.client_key, "Tenant will be updated in database");
                    // Another tenant may have been installed on the old URL since
                    let indexed_here = url != &tenant.base_url
                        && index
                            .get(url.as_str())?
                            .is_some_and(|v| v.value() == tenant.client_key);
                    if indexed_here {
                        index.remove(url.as_str())?;
                    }
                }
                None => {
                    tracing::debug!(client_key = %tenant.client_key, "Tenant will be inserted in database");
                }
            }

            table.insert(tenant.client_key.as_str(), json.as_slice())?;
            index.insert(tenant.base_url.as_str(), tenant.client_key.as_str())?;
        }
        write_txn.commit()?;

        Ok(tenant)
    }

    fn ping(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(TENANTS)?;
        Ok(())
    }

    fn delete(&self, client_key: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TENANTS)?;
            let removed: Tenant = match table.remove(client_key)? {
                Some(bytes) => serde_json::from_slice(bytes.value())?,
                None => return Err(StoreError::NotFound(client_key.to_string())),
            };

            let mut index = write_txn.open_table(TENANTS_BY_URL)?;
            let indexed_here = index
                .get(removed.base_url.as_str())?
                .is_some_and(|v| v.value() == client_key);
            if indexed_here {
                index.remove(removed.base_url.as_str())?;
            }
        }
        write_txn.commit()?;

        tracing::warn!(client_key = %client_key, "Deleted tenant record from database");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
