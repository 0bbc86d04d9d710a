// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::keys::{FallbackKeyCache, KeyResolver};
use crate::auth::qsh::QueryStringHasher;
use crate::config::AddonConfig;
use crate::storage::TenantStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Add-on identity and auth settings
    pub config: Arc<AddonConfig>,
    /// Tenant persistence
    pub tenants: Arc<dyn TenantStore>,
    /// Installation key resolver (owns the fallback cache)
    pub keys: Arc<KeyResolver>,
    /// QSH canonicalizer bound to the add-on base URL
    pub qsh: QueryStringHasher,
}

impl AppState {
    /// Build state from configuration, creating the key resolver and its
    /// fallback cache.
    pub fn new(config: AddonConfig, tenants: Arc<dyn TenantStore>) -> Self {
        let cache = Arc::new(FallbackKeyCache::new(
            config.key_cache_ttl,
            config.key_cache_sweep,
        ));
        let keys = KeyResolver::new(config.install_keys_url.clone(), cache);
        Self::with_key_resolver(config, tenants, keys)
    }

    /// Build state around an existing key resolver.
    pub fn with_key_resolver(
        config: AddonConfig,
        tenants: Arc<dyn TenantStore>,
        keys: KeyResolver,
    ) -> Self {
        let qsh = QueryStringHasher::new(&config.base_url);
        Self {
            config: Arc::new(config),
            tenants,
            keys: Arc::new(keys),
            qsh,
        }
    }
}
