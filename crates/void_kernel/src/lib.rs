//! # Void Kernel
//!
//! The kernel owns the authoritative scene. It:
//! - Drives the scene tree tick
//! - Validates and applies scene op batches
//! - Keeps the scene and derived-cache revision counters
//! - Carries descendants along with transform changes
//! - Produces scene and schema snapshots
//!
//! ## Architecture
//!
//! ```text
//! Clients ──► SceneOpBatch ──► SceneOpApplier ──► SceneEngine (SceneTree + types)
//!                                    │                  │
//!                                    ▼                  ▼
//!                               SceneOpAck        SceneSnapshot
//! ```
//!
//! The kernel never lets clients touch the tree directly. Every change is a
//! declarative op that is validated first, so a bad op fails on its own and
//! never leaves the tree half-modified.

pub mod apply;
pub mod config;
pub mod engine;
pub mod transform;

pub use apply::{ApplyStats, SceneOpApplier, ATOMIC_REJECTED};
pub use config::{
    load_config, parse_config, ConfigError, ConfigResult, DerivedCacheConfig, KernelConfig, TransformConfig,
    TypesConfig, DEFAULT_TRACKED_KEYS, DEFAULT_TRACKED_TYPE,
};
pub use engine::{SceneEngine, SCHEMA_REVISION};
pub use transform::{is_transform_key, propagate, trim_float};
