//! Built-in core node types

use crate::types::{NodeTypeDef, NodeTypeRegistry, PropertyDef, PropertyType};

fn float(key: &str, default: &str, label: &str, category: &str, order: u32) -> PropertyDef {
    PropertyDef::new(key, PropertyType::Float)
        .with_default(default)
        .with_display(label, category, order)
}

fn transform(key: &str, default: &str, label: &str, order: u32, step: &str) -> PropertyDef {
    float(key, default, label, "Transform", order).with_hint("step", step)
}

fn unit_range(prop: PropertyDef, step: &str) -> PropertyDef {
    prop.with_hint("min", "0").with_hint("max", "1").with_hint("step", step)
}

/// Register Node, Node3D, WorldEnvironment, Camera3D, CharacterBody3D and CSGBlock
pub fn register_core_types(registry: &mut NodeTypeRegistry) {
    registry.register_type(
        NodeTypeDef::new("Node", "Node", "Core", 0).with_property(
            PropertyDef::new("foo", PropertyType::String).with_display("Foo", "Debug", 0),
        ),
    );

    registry.register_type(
        NodeTypeDef::new("Node3D", "Node3D", "Core", 10)
            .with_property(transform("x", "0", "X", 0, "0.1"))
            .with_property(transform("y", "0", "Y", 1, "0.1"))
            .with_property(transform("z", "0", "Z", 2, "0.1"))
            .with_property(transform("rx", "0", "Rot X", 10, "1"))
            .with_property(transform("ry", "0", "Rot Y", 11, "1"))
            .with_property(transform("rz", "0", "Rot Z", 12, "1")),
    );

    registry.register_type(
        NodeTypeDef::new("WorldEnvironment", "WorldEnvironment", "Core", 11)
            .with_property(
                PropertyDef::new("fog_enabled", PropertyType::Bool)
                    .with_default("false")
                    .with_display("Enabled", "Fog", 0),
            )
            .with_property(unit_range(float("fog_color_r", "0.5", "R", "Fog Color", 1), "0.01"))
            .with_property(unit_range(float("fog_color_g", "0.5", "G", "Fog Color", 2), "0.01"))
            .with_property(unit_range(float("fog_color_b", "0.5", "B", "Fog Color", 3), "0.01"))
            .with_property(unit_range(float("fog_density", "0.02", "Density", "Fog", 4), "0.001"))
            .with_property(
                PropertyDef::new("time_enabled", PropertyType::Bool)
                    .with_default("true")
                    .with_display("Fixed Time", "Time", 10),
            )
            .with_property(
                PropertyDef::new("time_ticks", PropertyType::Int)
                    .with_default("6000")
                    .with_display("Time (ticks)", "Time", 11)
                    .with_hint("min", "0")
                    .with_hint("max", "24000")
                    .with_hint("step", "100"),
            )
            .with_property(
                PropertyDef::new("weather", PropertyType::String)
                    .with_default("clear")
                    .with_display("Weather", "Weather", 20),
            )
            .with_property(unit_range(float("ambient_light", "1.0", "Ambient", "Light", 30), "0.05")),
    );

    registry.register_type(
        NodeTypeDef::new("Camera3D", "Camera3D", "Core", 12)
            .with_property(transform("x", "0", "X", 0, "0.1"))
            .with_property(transform("y", "1.6", "Y", 1, "0.1"))
            .with_property(transform("z", "0", "Z", 2, "0.1"))
            .with_property(transform("rx", "0", "Rot X", 10, "1"))
            .with_property(transform("ry", "0", "Rot Y", 11, "1"))
            .with_property(transform("rz", "0", "Rot Z", 12, "1"))
            .with_property(
                float("fov", "70", "FOV", "Camera", 20)
                    .with_hint("min", "1")
                    .with_hint("max", "179")
                    .with_hint("step", "1"),
            )
            .with_property(
                float("near", "0.05", "Near", "Camera", 21)
                    .with_hint("min", "0.001")
                    .with_hint("step", "0.01"),
            )
            .with_property(float("far", "1000", "Far", "Camera", 22).with_hint("min", "1").with_hint("step", "1")),
    );

    registry.register_type(
        NodeTypeDef::new("CharacterBody3D", "CharacterBody3D", "Core", 13)
            .with_property(transform("x", "0", "X", 0, "0.1"))
            .with_property(transform("y", "0", "Y", 1, "0.1"))
            .with_property(transform("z", "0", "Z", 2, "0.1"))
            .with_property(transform("ry", "0", "Yaw", 10, "1"))
            .with_property(
                float("speed", "6", "Speed", "Movement", 20)
                    .with_hint("min", "0")
                    .with_hint("step", "0.1"),
            ),
    );

    registry.register_type(
        NodeTypeDef::new("CSGBlock", "CSG Block", "CSG", 20)
            .with_property(transform("x", "0", "X", 0, "1"))
            .with_property(transform("y", "0", "Y", 1, "1"))
            .with_property(transform("z", "0", "Z", 2, "1"))
            .with_property(transform("rx", "0", "Rot X", 3, "15"))
            .with_property(transform("ry", "0", "Rot Y", 4, "15"))
            .with_property(transform("rz", "0", "Rot Z", 5, "15"))
            .with_property(float("sx", "1", "Size X", "Size", 10).with_hint("min", "1").with_hint("step", "1"))
            .with_property(float("sy", "1", "Size Y", "Size", 11).with_hint("min", "1").with_hint("step", "1"))
            .with_property(float("sz", "1", "Size Z", "Size", 12).with_hint("min", "1").with_hint("step", "1"))
            .with_property(
                PropertyDef::new("block", PropertyType::String)
                    .with_default("minecraft:stone")
                    .with_display("Block", "Render", 20),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_types_registered() {
        let registry = NodeTypeRegistry::with_core_types();
        assert_eq!(registry.len(), 6);

        let csg = registry.get("CSGBlock").unwrap();
        assert_eq!(csg.display_name, "CSG Block");
        assert_eq!(csg.property("sx").unwrap().default_value.as_deref(), Some("1"));
        assert_eq!(csg.property("block").unwrap().default_value.as_deref(), Some("minecraft:stone"));

        let env = registry.get("WorldEnvironment").unwrap();
        assert_eq!(env.property("time_ticks").unwrap().ty, PropertyType::Int);
        assert_eq!(env.property("time_ticks").unwrap().editor_hints.get("max").map(String::as_str), Some("24000"));

        assert!(registry.get("Node").unwrap().property("foo").unwrap().default_value.is_none());
    }
}
