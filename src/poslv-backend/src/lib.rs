// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::collections::HashMap;

use poslv_app::normalize_name;
use poslv_core::{DynResult, PacketSource};

pub mod codec;
mod simulated;
mod tcp_json;

pub use simulated::{SimulatedSource, SimulationProfile};
pub use tcp_json::TcpJsonSource;

/// Backend-specific settings for instantiating a packet source.
#[derive(Debug, Clone, Default)]
pub struct SourceAccess {
    pub simulation: SimulationProfile,
}

pub type SourceFactory = fn(&SourceAccess) -> DynResult<Box<dyn PacketSource>>;

/// Context for registering and instantiating packet sources.
#[derive(Clone)]
pub struct RegistrationContext {
    factories: HashMap<String, SourceFactory>,
}

impl RegistrationContext {
    /// Create a new empty registration context.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a source factory under a stable name (e.g. "tcp-json").
    pub fn register_source(&mut self, name: &str, factory: SourceFactory) {
        let key = normalize_name(name);
        self.factories.insert(key, factory);
    }

    pub fn is_source_registered(&self, name: &str) -> bool {
        let key = normalize_name(name);
        self.factories.contains_key(&key)
    }

    /// List registered source names.
    pub fn registered_sources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate a packet source by name.
    pub fn build_source(&self, name: &str, access: &SourceAccess) -> DynResult<Box<dyn PacketSource>> {
        let key = normalize_name(name);
        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| format!("Unknown packet source: {}", name))?;
        factory(access)
    }
}

impl Default for RegistrationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Register all built-in packet sources on a context.
pub fn register_builtin_sources_on(context: &mut RegistrationContext) {
    context.register_source("tcp-json", tcp_json_factory);
    context.register_source("simulated", simulated_factory);
}

fn tcp_json_factory(_access: &SourceAccess) -> DynResult<Box<dyn PacketSource>> {
    Ok(Box::new(TcpJsonSource::new()))
}

fn simulated_factory(access: &SourceAccess) -> DynResult<Box<dyn PacketSource>> {
    Ok(Box::new(SimulatedSource::new(access.simulation.clone())))
}
