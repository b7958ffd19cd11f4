//! Transform propagation
//!
//! Nodes store their transform as string properties: position `x y z`,
//! Euler rotation in degrees `rx ry rz` and size `sx sy sz`. Moving,
//! rotating or scaling a node carries its descendants along. Rotation and
//! scale act about the parent's pivot, which is the centre of its box for
//! sized nodes and its position otherwise.

use std::collections::BTreeMap;

use glam::{DQuat, DVec3, EulerRot};
use void_scene::{Node, NodeHandle, NodeTypeRegistry, NodeTypes, SceneTree};

pub const POSITION_KEYS: [&str; 3] = ["x", "y", "z"];
pub const ROTATION_KEYS: [&str; 3] = ["rx", "ry", "rz"];
pub const SCALE_KEYS: [&str; 3] = ["sx", "sy", "sz"];

const MIN_SCALE: f64 = 1e-6;
const EPSILON: f64 = 1e-9;

pub fn is_transform_key(key: &str) -> bool {
    POSITION_KEYS.contains(&key) || ROTATION_KEYS.contains(&key) || SCALE_KEYS.contains(&key)
}

/// Format a float the way transform properties are stored: whole numbers
/// without a fraction, everything else in shortest form.
pub fn trim_float(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let rounded = value.round();
    if rounded.abs() < 1e15 && (value - rounded).abs() < 1e-6 {
        return format!("{}", rounded as i64);
    }
    format!("{}", value as f32)
}

fn parse_float(value: Option<&str>, fallback: f64) -> f64 {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(fallback)
}

/// Quaternion from Euler degrees, applied X then Y then Z
pub fn euler_to_quat(rx: f64, ry: f64, rz: f64) -> DQuat {
    DQuat::from_euler(EulerRot::ZYX, rz.to_radians(), ry.to_radians(), rx.to_radians()).normalize()
}

/// Euler degrees `(rx, ry, rz)` in `(-180, 180]`
pub fn quat_to_euler(q: DQuat) -> (f64, f64, f64) {
    let (z, y, x) = q.normalize().to_euler(EulerRot::ZYX);
    (wrap_degrees(x.to_degrees()), wrap_degrees(y.to_degrees()), wrap_degrees(z.to_degrees()))
}

fn wrap_degrees(deg: f64) -> f64 {
    if !deg.is_finite() {
        return 0.0;
    }
    let mut wrapped = deg % 360.0;
    if wrapped > 180.0 {
        wrapped -= 360.0;
    } else if wrapped < -180.0 {
        wrapped += 360.0;
    }
    if wrapped.abs() < 1e-6 {
        0.0
    } else {
        wrapped
    }
}

fn is_identity(q: DQuat, eps: f64) -> bool {
    q.x.abs() <= eps && q.y.abs() <= eps && q.z.abs() <= eps && (q.w.abs() - 1.0).abs() <= eps
}

fn is_near(a: DVec3, b: DVec3, eps: f64) -> bool {
    (a - b).abs().max_element() <= eps
}

fn safe_div(a: f64, b: f64) -> f64 {
    if !a.is_finite() || !b.is_finite() || b.abs() < 1e-12 {
        return 1.0;
    }
    let v = a / b;
    if v.is_finite() {
        v
    } else {
        1.0
    }
}

/// Whether the node's type declares `key`, or the node already carries it
fn accepts(types: &NodeTypeRegistry, node: &Node, key: &str) -> bool {
    if node.has_property(key) {
        return true;
    }
    let type_id = types.type_id_for(node);
    types.get(&type_id).is_some_and(|def| def.property(key).is_some())
}

fn accepts_all(types: &NodeTypeRegistry, node: &Node, keys: &[&str]) -> bool {
    keys.iter().all(|k| accepts(types, node, k))
}

/// Pivot, rotation and scale of a parent
#[derive(Debug, Clone, Copy)]
struct Frame {
    pivot: DVec3,
    rot: DQuat,
    scale: DVec3,
}

impl Frame {
    fn read(types: &NodeTypeRegistry, node: &Node, overrides: &BTreeMap<&str, &str>) -> Self {
        let get = |key: &str| overrides.get(key).copied().or_else(|| node.property(key));

        let pos = DVec3::new(
            parse_float(get("x"), 0.0),
            parse_float(get("y"), 0.0),
            parse_float(get("z"), 0.0),
        );
        let rot = euler_to_quat(
            parse_float(get("rx"), 0.0),
            parse_float(get("ry"), 0.0),
            parse_float(get("rz"), 0.0),
        );

        if accepts_all(types, node, &SCALE_KEYS) {
            let scale = DVec3::new(
                parse_float(get("sx"), 1.0).max(MIN_SCALE),
                parse_float(get("sy"), 1.0).max(MIN_SCALE),
                parse_float(get("sz"), 1.0).max(MIN_SCALE),
            );
            Self {
                pivot: pos + scale * 0.5,
                rot,
                scale,
            }
        } else {
            Self {
                pivot: pos,
                rot,
                scale: DVec3::ONE,
            }
        }
    }

    fn is_near(&self, other: &Frame, eps: f64) -> bool {
        is_near(self.pivot, other.pivot, eps)
            && is_near(self.scale, other.scale, eps)
            && is_identity((other.rot * self.rot.inverse()).normalize(), eps)
    }
}

/// Position and size of a descendant
struct Pose {
    pivot: DVec3,
    size: Option<DVec3>,
}

impl Pose {
    fn read(types: &NodeTypeRegistry, node: &Node) -> Self {
        let pos = DVec3::new(
            parse_float(node.property("x"), 0.0),
            parse_float(node.property("y"), 0.0),
            parse_float(node.property("z"), 0.0),
        );
        if accepts_all(types, node, &SCALE_KEYS) {
            let size = DVec3::new(
                parse_float(node.property("sx"), 1.0).max(1.0),
                parse_float(node.property("sy"), 1.0).max(1.0),
                parse_float(node.property("sz"), 1.0).max(1.0),
            );
            Self {
                pivot: pos + size * 0.5,
                size: Some(size),
            }
        } else {
            Self { pivot: pos, size: None }
        }
    }
}

/// Change from one parent frame to another
struct Delta {
    before: Frame,
    after: Frame,
    before_inv: DQuat,
    rot: DQuat,
    factors: DVec3,
    rotated: bool,
    scaled: bool,
}

impl Delta {
    fn new(before: Frame, after: Frame) -> Self {
        let before_inv = before.rot.normalize().inverse();
        let rot = (after.rot.normalize() * before_inv).normalize();
        let factors = DVec3::new(
            safe_div(after.scale.x, before.scale.x),
            safe_div(after.scale.y, before.scale.y),
            safe_div(after.scale.z, before.scale.z),
        );
        Self {
            before,
            after,
            before_inv,
            rot,
            factors,
            rotated: !is_identity(rot, 1e-12),
            scaled: !is_near(factors, DVec3::ONE, 1e-12),
        }
    }

    /// Move one descendant. Returns whether anything was written.
    fn apply(&self, types: &NodeTypeRegistry, node: &mut Node) -> bool {
        let mut changed = false;

        if accepts_all(types, node, &POSITION_KEYS) {
            let pose = Pose::read(types, node);
            let local = self.before_inv * (pose.pivot - self.before.pivot);
            let pivot = self.after.pivot + self.after.rot * (local * self.factors);

            let mut size = pose.size;
            if let Some(current) = pose.size.filter(|_| self.scaled) {
                let scaled = (current * self.factors).round().max(DVec3::ONE);
                node.set_property("sx", format!("{}", scaled.x as i64));
                node.set_property("sy", format!("{}", scaled.y as i64));
                node.set_property("sz", format!("{}", scaled.z as i64));
                size = Some(scaled);
            }

            let base = match size {
                Some(size) => pivot - size * 0.5,
                None => pivot,
            };
            node.set_property("x", trim_float(base.x));
            node.set_property("y", trim_float(base.y));
            node.set_property("z", trim_float(base.z));
            changed = true;
        }

        if self.rotated && accepts_all(types, node, &ROTATION_KEYS) {
            let current = euler_to_quat(
                parse_float(node.property("rx"), 0.0),
                parse_float(node.property("ry"), 0.0),
                parse_float(node.property("rz"), 0.0),
            );
            let (rx, ry, rz) = quat_to_euler(self.rot * current);
            node.set_property("rx", trim_float(rx));
            node.set_property("ry", trim_float(ry));
            node.set_property("rz", trim_float(rz));
            changed = true;
        }

        changed
    }
}

/// Carry the descendants of `parent` along with a transform change.
///
/// `changes` are the transform keys about to be written to `parent`; the
/// parent itself is not modified. Returns whether any descendant moved.
pub fn propagate(
    tree: &mut SceneTree,
    types: &NodeTypeRegistry,
    parent: NodeHandle,
    changes: &[(&str, &str)],
) -> bool {
    let Some(node) = tree.node(parent) else {
        return false;
    };
    if node.children().is_empty() {
        return false;
    }

    let overrides: BTreeMap<&str, &str> = changes.iter().copied().collect();
    let before = Frame::read(types, node, &BTreeMap::new());
    let after = Frame::read(types, node, &overrides);
    if before.is_near(&after, EPSILON) {
        return false;
    }

    let delta = Delta::new(before, after);
    let mut moved = false;
    for handle in tree.subtree(parent).into_iter().skip(1) {
        if let Some(node) = tree.node_mut(handle) {
            moved |= delta.apply(types, node);
        }
    }
    moved
}
