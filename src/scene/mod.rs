pub mod animation;
pub mod material;
pub mod placement;

use glam::{Mat4, Quat, Vec3};
use std::sync::Arc;

use animation::AnimationClip;
use material::Material;

/// Translation / rotation / per-axis scale, composed as `T * R * S`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_decomposed(translation: [f32; 3], rotation: [f32; 4], scale: [f32; 3]) -> Self {
        Self {
            translation: Vec3::from(translation),
            rotation: Quat::from_array(rotation).normalize(),
            scale: Vec3::from(scale),
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Axis-aligned bounding box. An empty box has `min > max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.extend(other.min);
        self.extend(other.max);
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    /// Bounds of the eight transformed corners.
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        if self.is_empty() {
            return Aabb::EMPTY;
        }
        let mut out = Aabb::EMPTY;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.extend(matrix.transform_point3(corner));
        }
        out
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[derive(Debug, Clone)]
pub struct MeshNode {
    pub local_bounds: Aabb,
    pub material: Option<Arc<Material>>,
    /// Material as it came out of the loader; overlays are cleared back to it.
    pub source_material: Option<Arc<Material>>,
}

impl MeshNode {
    pub fn new(local_bounds: Aabb, material: Option<Arc<Material>>) -> Self {
        Self {
            local_bounds,
            source_material: material.clone(),
            material,
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Mesh(MeshNode),
    Group,
    Bone,
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn group(name: impl Into<String>, transform: Transform, children: Vec<SceneNode>) -> Self {
        Self {
            name: name.into(),
            transform,
            kind: NodeKind::Group,
            children,
        }
    }

    pub fn mesh(name: impl Into<String>, transform: Transform, mesh: MeshNode) -> Self {
        Self {
            name: name.into(),
            transform,
            kind: NodeKind::Mesh(mesh),
            children: Vec::new(),
        }
    }

    pub fn bone(name: impl Into<String>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            transform,
            kind: NodeKind::Bone,
            children: Vec::new(),
        }
    }

    fn visit_with<F>(&self, parent: &Mat4, visitor: &mut F)
    where
        F: FnMut(&SceneNode, &Mat4),
    {
        let world = *parent * self.transform.matrix();
        visitor(self, &world);
        for child in &self.children {
            child.visit_with(&world, visitor);
        }
    }

    fn visit_meshes_mut_with<F>(&mut self, visitor: &mut F)
    where
        F: FnMut(&str, &mut MeshNode),
    {
        if let NodeKind::Mesh(mesh) = &mut self.kind {
            visitor(&self.name, mesh);
        }
        for child in &mut self.children {
            child.visit_meshes_mut_with(visitor);
        }
    }
}

/// A loaded model hierarchy. Owned by the scene once installed.
#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    pub uri: String,
    pub digest: String,
    pub root: Transform,
    pub nodes: Vec<SceneNode>,
    pub clips: Vec<AnimationClip>,
    pub compressed_geometry: bool,
}

impl Model {
    pub fn new(name: impl Into<String>, nodes: Vec<SceneNode>) -> Self {
        Self {
            name: name.into(),
            uri: String::new(),
            digest: String::new(),
            root: Transform::IDENTITY,
            nodes,
            clips: Vec::new(),
            compressed_geometry: false,
        }
    }

    /// Depth-first visit of every node with its world matrix (root included).
    pub fn visit<F>(&self, mut visitor: F)
    where
        F: FnMut(&SceneNode, &Mat4),
    {
        let root = self.root.matrix();
        for node in &self.nodes {
            node.visit_with(&root, &mut visitor);
        }
    }

    /// Visits every mesh node mutably, passing the owning node's name.
    pub fn visit_meshes_mut<F>(&mut self, mut visitor: F)
    where
        F: FnMut(&str, &mut MeshNode),
    {
        for node in &mut self.nodes {
            node.visit_meshes_mut_with(&mut visitor);
        }
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.visit(|node, _| {
            if matches!(node.kind, NodeKind::Mesh(_)) {
                count += 1;
            }
        });
        count
    }

    pub fn bone_count(&self) -> usize {
        let mut count = 0;
        self.visit(|node, _| {
            if matches!(node.kind, NodeKind::Bone) {
                count += 1;
            }
        });
        count
    }

    /// World-space bounds of all mesh nodes under the current root transform.
    pub fn world_bounds(&self) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        self.visit(|node, world| {
            if let NodeKind::Mesh(mesh) = &node.kind {
                bounds.union(&mesh.local_bounds.transformed(world));
            }
        });
        bounds
    }

    pub fn materials(&self) -> Vec<Option<Arc<Material>>> {
        let mut out = Vec::new();
        self.visit(|node, _| {
            if let NodeKind::Mesh(mesh) = &node.kind {
                out.push(mesh.material.clone());
            }
        });
        out
    }
}
