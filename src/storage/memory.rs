// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory tenant store.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::Tenant;

use super::{StoreError, StoreResult, TenantStore};

#[derive(Default)]
pub struct InMemoryTenantStore {
    tenants: RwLock<HashMap<String, Tenant>>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing tenant (tests and bootstrap).
    pub fn with_tenant(self, tenant: Tenant) -> Self {
        if let Ok(mut tenants) = self.tenants.write() {
            tenants.insert(tenant.client_key.clone(), tenant);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.tenants.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("tenant map lock poisoned".to_string())
}

impl TenantStore for InMemoryTenantStore {
    fn get(&self, client_key: &str) -> StoreResult<Tenant> {
        let tenants = self.tenants.read().map_err(|_| poisoned())?;
        tenants
            .get(client_key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(client_key.to_string()))
    }

    fn get_by_url(&self, base_url: &str) -> StoreResult<Tenant> {
        let tenants = self.tenants.read().map_err(|_| poisoned())?;
        tenants
            .values()
            .find(|tenant| tenant.base_url == base_url)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(base_url.to_string()))
    }

    fn set(&self, tenant: Tenant) -> StoreResult<Tenant> {
        let mut tenants = self.tenants.write().map_err(|_| poisoned())?;
        tenants.insert(tenant.client_key.clone(), tenant.clone());
        Ok(tenant)
    }

    fn ping(&self) -> StoreResult<()> {
        self.tenants.read().map(|_| ()).map_err(|_| poisoned())
    }

    fn delete(&self, client_key: &str) -> StoreResult<()> {
        let mut tenants = self.tenants.write().map_err(|_| poisoned())?;
        match tenants.remove(client_key) {
            Some(_) => {
                tracing::warn!(client_key = %client_key, "Deleted tenant record");
                Ok(())
            }
            None => Err(StoreError::NotFound(client_key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_by_key_and_url() {
        let store = InMemoryTenantStore::new();
        store
            .set(Tenant::new("tenantA", "https://a.example", "secret"))
            .unwrap();

        assert_eq!(store.get("tenantA").unwrap().shared_secret, "secret");
        assert_eq!(
            store.get_by_url("https://a.example").unwrap().client_key,
            "tenantA"
        );
    }

    #[test]
    fn set_overwrites_existing_record() {
        let store = InMemoryTenantStore::new().with_tenant(Tenant::new("t", "https://h", "old"));

        let mut updated = Tenant::new("t", "https://h", "new");
        updated.addon_installed = false;
        store.set(updated).unwrap();

        let tenant = store.get("t").unwrap();
        assert_eq!(tenant.shared_secret, "new");
        assert!(!tenant.addon_installed);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_tenant_is_not_found() {
        let store = InMemoryTenantStore::new();
        assert!(store.get("nobody").unwrap_err().is_not_found());
        assert!(store.get_by_url("https://nowhere").unwrap_err().is_not_found());
        assert!(store.delete("nobody").unwrap_err().is_not_found());
    }

    #[test]
    fn delete_removes_record() {
        let store = InMemoryTenantStore::new().with_tenant(Tenant::new("t", "https://h", "s"));
        store.delete("t").unwrap();
        assert!(store.is_empty());
    }
}
