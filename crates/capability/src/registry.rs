//! Capability registration and lookup.

use std::collections::HashMap;

use tracing::debug;

use crate::{Capability, CapabilityDescriptor, CapabilityName, Error, Result};

/// The fixed set of capabilities exposed to the model.
///
/// Built once at startup and read-only afterwards; share it behind an `Arc`.
/// [`Registry::names`] and [`Registry::schema_for_model`] follow registration order.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    capabilities: Vec<Capability>,
    index: HashMap<CapabilityName, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability, rejecting a second registration under the same name.
    pub fn register(&mut self, capability: Capability) -> Result<()> {
        let name = capability.name();
        if self.index.contains_key(&name) {
            return Err(Error::DuplicateCapability(name));
        }
        debug!(capability = %name, "registered capability");
        self.index.insert(name, self.capabilities.len());
        self.capabilities.push(capability);
        Ok(())
    }

    /// Look up a capability by its wire name.
    pub fn resolve(&self, name: &str) -> Result<&Capability> {
        let parsed: CapabilityName = name.parse()?;
        self.get(parsed)
            .ok_or_else(|| Error::UnknownCapability(name.to_string()))
    }

    pub fn get(&self, name: CapabilityName) -> Option<&Capability> {
        self.index.get(&name).map(|&i| &self.capabilities[i])
    }

    /// Declarations to forward to the model, in registration order.
    pub fn schema_for_model(&self) -> Vec<CapabilityDescriptor> {
        self.capabilities.iter().map(Capability::descriptor).collect()
    }

    pub fn names(&self) -> Vec<CapabilityName> {
        self.capabilities.iter().map(Capability::name).collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}
