//! Kernel configuration - TOML to KernelConfig conversion
//!
//! # Config Format
//!
//! ```toml
//! [scene]
//! root_name = "root"
//! max_deferred_passes = 1000
//!
//! [types]
//! register_core_types = true
//! allow_unknown_types = true
//! allow_unknown_properties = true
//!
//! [derived_cache]
//! tracked_type = "CSGBlock"
//! tracked_keys = ["x", "y", "z", "rx", "ry", "rz", "sx", "sy", "sz", "block"]
//!
//! [transform]
//! propagate_to_children = true
//! ```
//!
//! Every section and field is optional.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;
use void_scene::SceneTreeConfig;

/// Default node type whose changes invalidate the derived cache
pub const DEFAULT_TRACKED_TYPE: &str = "CSGBlock";

/// Default property keys whose changes invalidate the derived cache
pub const DEFAULT_TRACKED_KEYS: [&str; 10] = ["x", "y", "z", "rx", "ry", "rz", "sx", "sy", "sz", "block"];

/// Errors from config loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Node type registry settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypesConfig {
    pub register_core_types: bool,
    pub allow_unknown_types: bool,
    pub allow_unknown_properties: bool,
}

impl Default for TypesConfig {
    fn default() -> Self {
        Self {
            register_core_types: true,
            allow_unknown_types: true,
            allow_unknown_properties: true,
        }
    }
}

/// What counts as a derived-cache change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedCacheConfig {
    pub tracked_type: String,
    pub tracked_keys: BTreeSet<String>,
}

impl Default for DerivedCacheConfig {
    fn default() -> Self {
        Self {
            tracked_type: DEFAULT_TRACKED_TYPE.to_string(),
            tracked_keys: DEFAULT_TRACKED_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformConfig {
    /// Move descendants along when a parent's transform changes
    pub propagate_to_children: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            propagate_to_children: true,
        }
    }
}

/// Complete kernel configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelConfig {
    pub scene: SceneTreeConfig,
    pub types: TypesConfig,
    pub derived_cache: DerivedCacheConfig,
    pub transform: TransformConfig,
}

/// Raw TOML structure for scene section
#[derive(Debug, Deserialize, Default)]
struct SceneToml {
    root_name: Option<String>,
    max_deferred_passes: Option<usize>,
}

/// Raw TOML structure for types section
#[derive(Debug, Deserialize, Default)]
struct TypesToml {
    register_core_types: Option<bool>,
    allow_unknown_types: Option<bool>,
    allow_unknown_properties: Option<bool>,
}

/// Raw TOML structure for derived cache section
#[derive(Debug, Deserialize, Default)]
struct DerivedCacheToml {
    tracked_type: Option<String>,
    tracked_keys: Option<Vec<String>>,
}

/// Raw TOML structure for transform section
#[derive(Debug, Deserialize, Default)]
struct TransformToml {
    propagate_to_children: Option<bool>,
}

/// Root TOML structure
#[derive(Debug, Deserialize, Default)]
struct KernelToml {
    #[serde(default)]
    scene: Option<SceneToml>,
    #[serde(default)]
    types: Option<TypesToml>,
    #[serde(default)]
    derived_cache: Option<DerivedCacheToml>,
    #[serde(default)]
    transform: Option<TransformToml>,
}

/// Parse a kernel config from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<KernelConfig> {
    let raw: KernelToml = toml::from_str(content)?;
    let defaults = KernelConfig::default();

    let scene = raw.scene.unwrap_or_default();
    let scene = SceneTreeConfig {
        root_name: scene.root_name.unwrap_or(defaults.scene.root_name),
        max_deferred_passes: scene.max_deferred_passes.unwrap_or(defaults.scene.max_deferred_passes),
    };
    if scene.max_deferred_passes == 0 {
        return Err(ConfigError::Invalid("scene.max_deferred_passes must be > 0".into()));
    }
    if scene.root_name.trim().is_empty() {
        return Err(ConfigError::Invalid("scene.root_name must not be blank".into()));
    }

    let types = raw.types.unwrap_or_default();
    let types = TypesConfig {
        register_core_types: types.register_core_types.unwrap_or(defaults.types.register_core_types),
        allow_unknown_types: types.allow_unknown_types.unwrap_or(defaults.types.allow_unknown_types),
        allow_unknown_properties: types
            .allow_unknown_properties
            .unwrap_or(defaults.types.allow_unknown_properties),
    };

    let derived = raw.derived_cache.unwrap_or_default();
    let derived_cache = DerivedCacheConfig {
        tracked_type: derived.tracked_type.unwrap_or(defaults.derived_cache.tracked_type),
        tracked_keys: derived
            .tracked_keys
            .map(|keys| keys.into_iter().filter(|k| !k.trim().is_empty()).collect())
            .unwrap_or(defaults.derived_cache.tracked_keys),
    };
    if derived_cache.tracked_type.trim().is_empty() {
        return Err(ConfigError::Invalid("derived_cache.tracked_type must not be blank".into()));
    }

    let transform = TransformConfig {
        propagate_to_children: raw
            .transform
            .and_then(|t| t.propagate_to_children)
            .unwrap_or(defaults.transform.propagate_to_children),
    };

    Ok(KernelConfig {
        scene,
        types,
        derived_cache,
        transform,
    })
}

/// Load and parse a kernel config from a file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<KernelConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}
