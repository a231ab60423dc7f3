//! Read and write access to a loaded rig hierarchy.

use bevy::ecs::system::SystemParam;
use bevy::math::Affine3A;
use bevy::prelude::*;
use bevy::render::primitives::Aabb;

use crate::calibration::Bounds;
use crate::camera::AvatarCamera;

/// Original transform when it was first loaded.
#[derive(Component, Clone, Copy, Reflect)]
pub struct OriginTransform(Transform);

impl OriginTransform {
    pub fn new(transform: Transform) -> Self {
        Self(transform)
    }

    pub fn get(&self) -> Transform {
        self.0
    }
}

/// Hierarchy queries over rig nodes.
///
/// World transforms are recomputed from [`Transform`] and [`Parent`] on demand
/// instead of read from [`GlobalTransform`], so a root transform written
/// earlier in the same system is already visible.
#[derive(SystemParam)]
pub struct RigNodes<'w, 's> {
    q_children: Query<'w, 's, &'static Children>,
    q_parents: Query<'w, 's, &'static Parent>,
    q_names: Query<'w, 's, &'static Name>,
    q_transforms: Query<'w, 's, &'static mut Transform, Without<AvatarCamera>>,
    q_origins: Query<'w, 's, &'static OriginTransform>,
    q_meshes: Query<'w, 's, &'static Aabb, With<Handle<Mesh>>>,
}

impl<'w, 's> RigNodes<'w, 's> {
    /// `root` followed by all of its descendants in depth-first pre-order.
    pub fn depth_first(&self, root: Entity) -> Vec<Entity> {
        let mut order = Vec::new();
        let mut stack = vec![root];

        while let Some(entity) = stack.pop() {
            order.push(entity);
            if let Ok(children) = self.q_children.get(entity) {
                stack.extend(children.iter().rev());
            }
        }

        order
    }

    pub fn has_descendants(&self, root: Entity) -> bool {
        self.q_children
            .get(root)
            .is_ok_and(|children| children.is_empty() == false)
    }

    pub fn name(&self, entity: Entity) -> Option<&str> {
        self.q_names.get(entity).ok().map(Name::as_str)
    }

    pub fn local_transform(&self, entity: Entity) -> Option<Transform> {
        self.q_transforms.get(entity).ok().copied()
    }

    pub fn local_rotation(&self, entity: Entity) -> Option<Quat> {
        self.q_transforms.get(entity).ok().map(|t| t.rotation)
    }

    /// The only way bones are written to: translation and scale of a
    /// skinned bone are never touched.
    pub fn set_local_rotation(&mut self, entity: Entity, rotation: Quat) {
        if let Ok(mut transform) = self.q_transforms.get_mut(entity) {
            transform.rotation = rotation;
        }
    }

    /// Overwrite the transform of the rig root (not a skinned bone).
    pub fn set_root_transform(&mut self, root: Entity, transform: Transform) {
        if let Ok(mut root_transform) = self.q_transforms.get_mut(root) {
            *root_transform = transform;
        }
    }

    fn local_affine(&self, entity: Entity) -> Affine3A {
        self.q_transforms
            .get(entity)
            .map(Transform::compute_affine)
            .unwrap_or(Affine3A::IDENTITY)
    }

    /// Transform from `entity`'s local space into world space.
    pub fn world_affine(&self, entity: Entity) -> Affine3A {
        let mut affine = self.local_affine(entity);
        let mut current = entity;
        while let Ok(parent) = self.q_parents.get(current) {
            current = parent.get();
            affine = self.local_affine(current) * affine;
        }
        affine
    }

    /// World transform of `entity`'s parent (identity for top level nodes).
    pub fn parent_world_affine(&self, entity: Entity) -> Affine3A {
        match self.q_parents.get(entity) {
            Ok(parent) => self.world_affine(parent.get()),
            Err(_) => Affine3A::IDENTITY,
        }
    }

    pub fn world_translation(&self, entity: Entity) -> Vec3 {
        self.world_affine(entity).translation.into()
    }

    /// Transform from `entity`'s local space into `root`'s local space.
    pub fn affine_below(&self, entity: Entity, root: Entity) -> Affine3A {
        if entity == root {
            return Affine3A::IDENTITY;
        }

        let mut affine = self.local_affine(entity);
        let mut current = entity;
        while let Ok(parent) = self.q_parents.get(current) {
            current = parent.get();
            if current == root {
                break;
            }
            affine = self.local_affine(current) * affine;
        }
        affine
    }

    /// Position of `entity` if `root` had `root_transform`.
    pub fn position_with_root(
        &self,
        entity: Entity,
        root: Entity,
        root_transform: &Transform,
    ) -> Vec3 {
        let affine = root_transform.compute_affine() * self.affine_below(entity, root);
        affine.translation.into()
    }

    /// Bounds of every renderable mesh under `root` if `root` had
    /// `root_transform`. Helper and bone nodes do not contribute.
    pub fn mesh_bounds(&self, root: Entity, root_transform: &Transform) -> Option<Bounds> {
        let root_affine = root_transform.compute_affine();
        let mut bounds: Option<Bounds> = None;

        for entity in self.depth_first(root) {
            let Ok(aabb) = self.q_meshes.get(entity) else {
                continue;
            };

            let affine = root_affine * self.affine_below(entity, root);
            let center = Vec3::from(aabb.center);
            let half = Vec3::from(aabb.half_extents);

            for i in 0..8 {
                let sign = Vec3::new(
                    if i & 1 == 0 { -1.0 } else { 1.0 },
                    if i & 2 == 0 { -1.0 } else { 1.0 },
                    if i & 4 == 0 { -1.0 } else { 1.0 },
                );
                let corner = affine.transform_point3(center + half * sign);
                match bounds.as_mut() {
                    Some(bounds) => bounds.extend(corner),
                    None => bounds = Some(Bounds::from_point(corner)),
                }
            }
        }

        bounds
    }

    /// Rest transform of the rig root, if it has been recorded.
    pub fn origin(&self, entity: Entity) -> Option<Transform> {
        self.q_origins.get(entity).ok().map(OriginTransform::get)
    }

    /// Put every node below `root` back into its recorded rest rotation.
    pub fn restore_rest_pose(&mut self, root: Entity) {
        for entity in self.depth_first(root) {
            if entity == root {
                continue;
            }
            if let Some(origin) = self.origin(entity) {
                self.set_local_rotation(entity, origin.rotation);
            }
        }
    }

    /// Recursively log the rig hierarchy with local euler angles.
    pub fn trace_hierarchy(&self, root: Entity) {
        fn recursive_trace(nodes: &RigNodes, indent: usize, parent: Entity) {
            let Ok(children) = nodes.q_children.get(parent) else {
                return;
            };
            for &child in children.iter() {
                if let (Some(name), Some(rotation)) = (nodes.name(child), nodes.local_rotation(child))
                {
                    let euler = quat_to_eulerdeg(rotation);
                    debug!(
                        "{}{}: ({:.2}, {:.2}, {:.2})",
                        "| ".repeat(indent),
                        name,
                        euler.x,
                        euler.y,
                        euler.z
                    );
                }
                recursive_trace(nodes, indent + 1, child);
            }
        }

        debug!("RIG HIERARCHY");
        recursive_trace(self, 0, root);
    }
}

pub fn quat_to_eulerdeg(rotation: Quat) -> Vec3 {
    let euler = rotation.to_euler(EulerRot::XYZ);
    Vec3::new(
        euler.0.to_degrees(),
        euler.1.to_degrees(),
        euler.2.to_degrees(),
    )
}
