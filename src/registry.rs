//! Process-wide module registry.
//!
//! Modules are registered explicitly (see [`crate::register`]) and looked up by id.
//! Ids are dotted paths; the last segment is the name used in configuration, so
//! `http.encoders.zstd` is referred to as `zstd` inside an `encode` block.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::info;

use crate::{encode::EncodingModule, error::EncodeError};

/// Registration record of a module.
#[derive(Clone, Copy, Debug)]
pub struct ModuleInfo {
    /// Globally unique module id, e.g. `http.encoders.zstd`.
    pub id: &'static str,
    /// Constructs a zero-valued instance.
    pub new: fn() -> EncodingModule,
}

impl ModuleInfo {
    /// Last segment of the id.
    pub fn name(&self) -> &'static str {
        self.id.rsplit('.').next().unwrap_or(self.id)
    }

    /// Everything before the last segment of the id.
    pub fn namespace(&self) -> &'static str {
        self.id.rsplit_once('.').map_or("", |(ns, _)| ns)
    }
}

static MODULES: Lazy<RwLock<HashMap<&'static str, ModuleInfo>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Adds a module to the registry. Ids must be unique.
pub fn register_module(info: ModuleInfo) -> Result<(), EncodeError> {
    let mut modules = MODULES.write();
    if modules.contains_key(info.id) {
        return Err(EncodeError::DuplicateModule(info.id.to_string()));
    }
    modules.insert(info.id, info);
    info!(id = info.id, "module registered");
    Ok(())
}

pub fn get_module(id: &str) -> Option<ModuleInfo> {
    MODULES.read().get(id).copied()
}

/// Registered modules in `namespace`, sorted by id.
pub fn get_modules(namespace: &str) -> Vec<ModuleInfo> {
    let mut found: Vec<ModuleInfo> = MODULES
        .read()
        .values()
        .filter(|m| m.namespace() == namespace)
        .copied()
        .collect();
    found.sort_by_key(|m| m.id);
    found
}

/// Creates a zero-valued instance of the module registered under `id`.
pub fn new_module(id: &str) -> Result<EncodingModule, EncodeError> {
    get_module(id)
        .map(|info| (info.new)())
        .ok_or_else(|| EncodeError::UnknownModule(id.to_string()))
}
