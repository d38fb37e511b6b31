//! Configuration types for the mode controller.
//!
//! The tier topology is static for the lifetime of a controller. It is
//! described by name here and bound to live component instances through a
//! [`ComponentRegistry`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use modeswitch_core::Mode;
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};
use crate::lifecycle::Lifecycle;
use crate::tier::Tier;

/// Configuration of one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Tier name, unique within the topology.
    pub name: String,
    /// Modes in which the tier is live.
    pub live_modes: Vec<Mode>,
    /// Names of the member components.
    pub components: Vec<String>,
}

impl TierConfig {
    /// Create a tier configuration.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, live_modes: &[Mode], components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            live_modes: live_modes.to_vec(),
            components: components.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ordered tiers, most upstream first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// The tiers in start order.
    pub tiers: Vec<TierConfig>,
}

impl TopologyConfig {
    /// The event-pipeline server topology: job stores first, then the
    /// processing stages that read from them. Both tiers serve only in
    /// `NORMAL` mode.
    #[must_use]
    pub fn server_default() -> Self {
        Self {
            tiers: vec![
                TierConfig::new(
                    "stores",
                    &[Mode::Normal],
                    ["gateway_db", "router_db", "batch_router_db", "error_db"],
                ),
                TierConfig::new("processing", &[Mode::Normal], ["processor", "router"]),
            ],
        }
    }

    /// Parse a topology from JSON.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Parse` on malformed input, or a validation error.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a topology file.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Io` if the file cannot be read, otherwise the
    /// errors of [`TopologyConfig::from_json`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ControlError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Check structural invariants.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no tiers, a tier name repeats, a tier is
    /// empty, or a component is assigned twice.
    pub fn validate(&self) -> Result<()> {
        if self.tiers.is_empty() {
            return Err(ControlError::EmptyTopology);
        }

        let mut tier_names = HashSet::new();
        let mut component_names = HashSet::new();
        for tier in &self.tiers {
            if !tier_names.insert(tier.name.as_str()) {
                return Err(ControlError::DuplicateTier(tier.name.clone()));
            }
            if tier.components.is_empty() {
                return Err(ControlError::EmptyTier(tier.name.clone()));
            }
            for component in &tier.components {
                if !component_names.insert(component.as_str()) {
                    return Err(ControlError::DuplicateComponent(component.clone()));
                }
            }
        }
        Ok(())
    }

    /// Every component name, in tier order.
    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.tiers
            .iter()
            .flat_map(|t| t.components.iter().map(String::as_str))
    }

    /// Resolve component names against `registry` and build the tiers.
    ///
    /// # Errors
    ///
    /// Returns a validation error, or `ControlError::UnknownComponent` if a
    /// name is missing from the registry.
    pub fn bind(&self, registry: &ComponentRegistry) -> Result<Vec<Tier>> {
        self.validate()?;

        self.tiers
            .iter()
            .map(|tier| {
                let components = tier
                    .components
                    .iter()
                    .map(|name| {
                        registry
                            .get(name)
                            .ok_or_else(|| ControlError::UnknownComponent {
                                tier: tier.name.clone(),
                                component: name.clone(),
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Tier::new(
                    tier.name.clone(),
                    tier.live_modes.iter().copied(),
                    components,
                ))
            })
            .collect()
    }
}

/// Live component instances, keyed by [`Lifecycle::name`].
#[derive(Default, Clone)]
pub struct ComponentRegistry {
    components: HashMap<String, Arc<dyn Lifecycle>>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component under its own name, replacing any previous entry.
    pub fn register(&mut self, component: Arc<dyn Lifecycle>) -> &mut Self {
        self.components
            .insert(component.name().to_string(), component);
        self
    }

    /// Look up a component.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Lifecycle>> {
        self.components.get(name).cloned()
    }

    /// Number of registered components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.components.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ComponentRegistry")
            .field("components", &names)
            .finish()
    }
}

/// Host-level settings for running a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Topology file. The server default topology is used when unset.
    pub topology_path: Option<PathBuf>,
    /// Fixed mode for nodes without a control plane driving them.
    pub static_mode: Option<Mode>,
    /// Capacity of the mode-update channel.
    pub update_buffer: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            topology_path: None,
            static_mode: None,
            update_buffer: 8,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `MODESWITCH_TOPOLOGY`: Path to a JSON topology file
    /// - `MODESWITCH_STATIC_MODE`: Fixed server mode (`NORMAL` or `DEGRADED`)
    /// - `MODESWITCH_UPDATE_BUFFER`: Mode-update channel capacity
    ///
    /// Unparseable values are ignored and the default is kept.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup("MODESWITCH_TOPOLOGY") {
            if !val.is_empty() {
                config.topology_path = Some(PathBuf::from(val));
            }
        }
        if let Some(val) = lookup("MODESWITCH_STATIC_MODE") {
            if let Ok(mode) = val.parse() {
                config.static_mode = Some(mode);
            }
        }
        if let Some(val) = lookup("MODESWITCH_UPDATE_BUFFER") {
            if let Ok(n) = val.parse::<usize>() {
                if n > 0 {
                    config.update_buffer = n;
                }
            }
        }

        config
    }

    /// Load the configured topology, or the server default.
    ///
    /// # Errors
    ///
    /// Returns an error if the topology file cannot be read or is invalid.
    pub fn load_topology(&self) -> Result<TopologyConfig> {
        match &self.topology_path {
            Some(path) => TopologyConfig::from_file(path),
            None => Ok(TopologyConfig::server_default()),
        }
    }
}
