//! Node type registry
//!
//! Node types describe which properties a node may carry, their value types,
//! defaults and editor metadata. The scene mutator and the op applier consume
//! them only through the [`NodeTypes`] trait.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node::{Node, TYPE_PROPERTY};

/// Implicit type of nodes without a type marker
pub const DEFAULT_TYPE: &str = "Node";

/// Property validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("key empty")]
    EmptyKey,

    #[error("unknown type: {0}")]
    UnknownType(String),

    #[error("unknown property: {0}")]
    UnknownProperty(String),

    #[error("invalid {expected} value: '{value}'")]
    InvalidValue { expected: PropertyType, value: String },
}

/// Value type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    String,
    Int,
    Float,
    Bool,
}

impl PropertyType {
    /// Wire name of the type
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Int => "INT",
            Self::Float => "FLOAT",
            Self::Bool => "BOOL",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "STRING" => Some(Self::String),
            "INT" => Some(Self::Int),
            "FLOAT" => Some(Self::Float),
            "BOOL" => Some(Self::Bool),
            _ => None,
        }
    }

    /// Check that `value` parses as this type
    pub fn validate(&self, value: &str) -> Result<(), PropertyError> {
        let valid = match self {
            Self::String => true,
            Self::Int => value.trim().parse::<i64>().is_ok(),
            Self::Float => value.trim().parse::<f64>().is_ok_and(f64::is_finite),
            Self::Bool => matches!(value.trim(), "true" | "false"),
        };
        if valid {
            Ok(())
        } else {
            Err(PropertyError::InvalidValue {
                expected: *self,
                value: value.to_string(),
            })
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Property definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub key: String,
    pub ty: PropertyType,
    pub default_value: Option<String>,
    pub display_name: String,
    pub category: String,
    pub order: u32,
    pub editor_hints: BTreeMap<String, String>,
}

impl PropertyDef {
    /// Create a property without default. Display name defaults to the key.
    pub fn new(key: impl Into<String>, ty: PropertyType) -> Self {
        let key = key.into();
        Self {
            display_name: key.clone(),
            key,
            ty,
            default_value: None,
            category: String::new(),
            order: 0,
            editor_hints: BTreeMap::new(),
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_display(mut self, name: impl Into<String>, category: impl Into<String>, order: u32) -> Self {
        self.display_name = name.into();
        self.category = category.into();
        self.order = order;
        self
    }

    pub fn with_hint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.editor_hints.insert(key.into(), value.into());
        self
    }
}

/// Node type definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTypeDef {
    pub type_id: String,
    pub display_name: String,
    pub category: String,
    pub order: u32,
    pub properties: BTreeMap<String, PropertyDef>,
}

impl NodeTypeDef {
    pub fn new(
        type_id: impl Into<String>,
        display_name: impl Into<String>,
        category: impl Into<String>,
        order: u32,
    ) -> Self {
        Self {
            type_id: type_id.into(),
            display_name: display_name.into(),
            category: category.into(),
            order,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, prop: PropertyDef) -> Self {
        self.properties.insert(prop.key.clone(), prop);
        self
    }

    pub fn property(&self, key: &str) -> Option<&PropertyDef> {
        self.properties.get(key)
    }

    /// Properties in editor order: category, order, display name, key
    pub fn sorted_properties(&self) -> Vec<&PropertyDef> {
        let mut props: Vec<_> = self.properties.values().collect();
        props.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then(a.order.cmp(&b.order))
                .then_with(|| a.display_name.cmp(&b.display_name))
                .then_with(|| a.key.cmp(&b.key))
        });
        props
    }
}

/// Type knowledge consumed by the scene mutator and the op applier
pub trait NodeTypes {
    /// Resolve the type id of a node
    fn type_id_for(&self, node: &Node) -> String;

    /// Tag `node` with `type_id` and fill in missing property defaults
    fn apply_defaults(&self, node: &mut Node, type_id: &str);

    fn validate_set_property(&self, type_id: &str, key: &str, value: &str) -> Result<(), PropertyError>;

    fn validate_remove_property(&self, type_id: &str, key: &str) -> Result<(), PropertyError>;
}

/// Registry of node type definitions
#[derive(Debug, Clone)]
pub struct NodeTypeRegistry {
    types: BTreeMap<String, NodeTypeDef>,
    allow_unknown_types: bool,
    allow_unknown_properties: bool,
}

impl NodeTypeRegistry {
    /// Create an empty, permissive registry
    pub fn new() -> Self {
        Self {
            types: BTreeMap::new(),
            allow_unknown_types: true,
            allow_unknown_properties: true,
        }
    }

    /// Create a registry with the built-in core types
    pub fn with_core_types() -> Self {
        let mut registry = Self::new();
        crate::builtin::register_core_types(&mut registry);
        registry
    }

    /// Register or replace a type definition
    pub fn register_type(&mut self, def: NodeTypeDef) {
        log::debug!("Registered node type '{}' ({} properties)", def.type_id, def.properties.len());
        self.types.insert(def.type_id.clone(), def);
    }

    pub fn get(&self, type_id: &str) -> Option<&NodeTypeDef> {
        self.types.get(type_id)
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.types.contains_key(type_id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// All types ordered by (order, type id)
    pub fn schema(&self) -> Vec<NodeTypeDef> {
        let mut types: Vec<_> = self.types.values().cloned().collect();
        types.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.type_id.cmp(&b.type_id)));
        types
    }

    pub fn allow_unknown_types(&self) -> bool {
        self.allow_unknown_types
    }

    pub fn set_allow_unknown_types(&mut self, allow: bool) {
        self.allow_unknown_types = allow;
    }

    pub fn allow_unknown_properties(&self) -> bool {
        self.allow_unknown_properties
    }

    pub fn set_allow_unknown_properties(&mut self, allow: bool) {
        self.allow_unknown_properties = allow;
    }

    fn lookup(&self, type_id: &str, key: &str) -> Result<Option<&PropertyDef>, PropertyError> {
        if key.trim().is_empty() {
            return Err(PropertyError::EmptyKey);
        }
        let Some(def) = self.types.get(type_id) else {
            return if self.allow_unknown_types {
                Ok(None)
            } else {
                Err(PropertyError::UnknownType(type_id.to_string()))
            };
        };
        if key == TYPE_PROPERTY {
            return Ok(None);
        }
        match def.property(key) {
            Some(prop) => Ok(Some(prop)),
            None if self.allow_unknown_properties => Ok(None),
            None => Err(PropertyError::UnknownProperty(key.to_string())),
        }
    }
}

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTypes for NodeTypeRegistry {
    fn type_id_for(&self, node: &Node) -> String {
        if let Some(explicit) = node.property(TYPE_PROPERTY) {
            if !explicit.trim().is_empty() {
                return explicit.to_string();
            }
        }
        node.behavior_type().unwrap_or(DEFAULT_TYPE).to_string()
    }

    fn apply_defaults(&self, node: &mut Node, type_id: &str) {
        let type_id = if type_id.trim().is_empty() { DEFAULT_TYPE } else { type_id };

        if type_id != DEFAULT_TYPE {
            let tagged = node.property(TYPE_PROPERTY).is_some_and(|t| !t.trim().is_empty());
            if !tagged {
                node.set_property(TYPE_PROPERTY, type_id);
            }
        }

        let Some(def) = self.types.get(type_id) else {
            return;
        };
        for prop in def.properties.values() {
            if prop.key.trim().is_empty() || node.has_property(&prop.key) {
                continue;
            }
            if let Some(default) = &prop.default_value {
                node.set_property(prop.key.clone(), default.clone());
            }
        }
    }

    fn validate_set_property(&self, type_id: &str, key: &str, value: &str) -> Result<(), PropertyError> {
        match self.lookup(type_id, key)? {
            Some(prop) => prop.ty.validate(value),
            None => Ok(()),
        }
    }

    fn validate_remove_property(&self, type_id: &str, key: &str) -> Result<(), PropertyError> {
        self.lookup(type_id, key).map(|_| ())
    }
}
