//! One-shot rig calibration: upright detection, facing correction, uniform
//! scaling to a target height, ground placement and camera framing.

use std::f32::consts::{FRAC_PI_2, PI};

use bevy::prelude::*;

use crate::config::RetargetConfig;
use crate::rig::RigNodes;
use crate::skeleton::find_bone;

/// Relative improvement in height a later upright candidate needs to win.
const UPRIGHT_EPSILON: f32 = 1e-4;
/// Fraction of the bounding sphere radius the camera is raised by.
pub const CAMERA_LIFT: f32 = 0.2;

/// Axis aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn from_point(point: Vec3) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let mut bounds = Self::from_point(points.next()?);
        for point in points {
            bounds.extend(point);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Vertical extent.
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Sphere centered on the box, passing through its corners.
    pub fn bounding_sphere(&self) -> FramingSphere {
        FramingSphere {
            center: self.center(),
            radius: self.size().length() * 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramingSphere {
    pub center: Vec3,
    pub radius: f32,
}

/// Root rotations tried when looking for the upright orientation, in
/// tie-break order. Quarter turns about X stand up Z-up exports, the ones
/// about Z stand up rigs lying along X.
pub fn upright_candidates() -> [Quat; 7] {
    [
        Quat::IDENTITY,
        Quat::from_rotation_x(PI),
        Quat::from_rotation_x(-FRAC_PI_2),
        Quat::from_rotation_x(FRAC_PI_2),
        Quat::from_rotation_z(-FRAC_PI_2),
        Quat::from_rotation_z(FRAC_PI_2),
        Quat::from_rotation_y(PI),
    ]
}

/// Pick the candidate rotation with the largest vertical extent. Earlier
/// candidates win ties.
pub fn select_upright(mut measure: impl FnMut(Quat) -> Option<Bounds>) -> Option<Quat> {
    let mut best: Option<(Quat, f32)> = None;

    for rotation in upright_candidates() {
        let Some(height) = measure(rotation).map(|b| b.height()) else {
            continue;
        };
        match best {
            Some((_, best_height))
                if height <= best_height + UPRIGHT_EPSILON * best_height.abs().max(1.0) => {}
            _ => best = Some((rotation, height)),
        }
    }

    best.map(|(rotation, _)| rotation)
}

/// The rig faces +Z (toward the camera). A nose behind its head means the
/// rig is facing away.
pub fn needs_facing_flip(head: Vec3, nose: Vec3) -> bool {
    nose.z < head.z
}

/// Root transform that scales `bounds` (measured with `rotation` and unit
/// scale) to `target_height`, centers it horizontally and puts its lowest
/// point on the ground.
pub fn normalize_transform(rotation: Quat, bounds: &Bounds, target_height: f32) -> Option<Transform> {
    let height = bounds.height();
    if height <= f32::EPSILON || target_height <= 0.0 {
        return None;
    }

    let scale = target_height / height;
    let center = bounds.center();

    Some(Transform {
        translation: Vec3::new(-scale * center.x, -scale * bounds.min.y, -scale * center.z),
        rotation,
        scale: Vec3::splat(scale),
    })
}

/// Camera transform that fits `sphere` in both the vertical and horizontal
/// field of view.
pub fn frame_camera(sphere: &FramingSphere, fov: f32, aspect_ratio: f32, margin: f32) -> Transform {
    let half_vertical = fov * 0.5;
    let half_horizontal = f32::atan(f32::tan(half_vertical) * aspect_ratio.max(f32::EPSILON));

    let vertical_distance = sphere.radius / f32::sin(half_vertical);
    let horizontal_distance = sphere.radius / f32::sin(half_horizontal);
    let distance = f32::max(vertical_distance, horizontal_distance) * margin.max(1.0);

    let translation = sphere.center + Vec3::Z * distance + Vec3::Y * sphere.radius * CAMERA_LIFT;
    Transform::from_translation(translation).looking_at(sphere.center, Vec3::Y)
}

/// Result of calibrating a rig.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub target_height: f32,
    /// Rotation chosen by upright detection.
    pub upright: Quat,
    /// Whether an extra half turn about the vertical axis was applied.
    pub facing_flipped: bool,
    /// Transform written to the rig root.
    pub root_transform: Transform,
    /// Bounding sphere of the normalized rig, used for camera framing.
    pub sphere: FramingSphere,
}

impl Calibration {
    pub fn scale(&self) -> f32 {
        self.root_transform.scale.x
    }
}

/// Calibrate the rig under `root` and write the resulting root transform.
///
/// Every measurement assumes a fresh root transform, so repeated calls
/// converge to the same result. Returns `None` (and leaves the rig at its
/// authored transform) when the rig has no mesh geometry.
pub fn calibrate(nodes: &mut RigNodes, root: Entity, config: &RetargetConfig) -> Option<Calibration> {
    let measure = |rotation: Quat| nodes.mesh_bounds(root, &Transform::from_rotation(rotation));

    let Some(upright) = select_upright(measure) else {
        warn!("No mesh geometry found under {root:?}, skipping calibration.");
        restore_root(nodes, root);
        return None;
    };

    let mut rotation = upright;
    let mut facing_flipped = false;

    let head = find_bone(nodes, root, &config.head_bone);
    let nose = config
        .nose_bones
        .iter()
        .find_map(|name| find_bone(nodes, root, name));
    if let (Some(head), Some(nose)) = (head, nose) {
        let upright_root = Transform::from_rotation(upright);
        let head_pos = nodes.position_with_root(head, root, &upright_root);
        let nose_pos = nodes.position_with_root(nose, root, &upright_root);
        if needs_facing_flip(head_pos, nose_pos) {
            rotation = Quat::from_rotation_y(PI) * upright;
            facing_flipped = true;
        }
    }

    let root_transform = nodes
        .mesh_bounds(root, &Transform::from_rotation(rotation))
        .and_then(|bounds| normalize_transform(rotation, &bounds, config.target_height));
    let Some(root_transform) = root_transform else {
        warn!("Rig {root:?} has no vertical extent, skipping calibration.");
        restore_root(nodes, root);
        return None;
    };

    let sphere = nodes.mesh_bounds(root, &root_transform)?.bounding_sphere();
    nodes.set_root_transform(root, root_transform);

    info!(
        "Calibrated rig {root:?}: scale {:.4}, facing flipped: {facing_flipped}",
        root_transform.scale.x
    );

    Some(Calibration {
        target_height: config.target_height,
        upright,
        facing_flipped,
        root_transform,
        sphere,
    })
}

fn restore_root(nodes: &mut RigNodes, root: Entity) {
    if let Some(origin) = nodes.origin(root) {
        nodes.set_root_transform(root, origin);
    }
}
