//! Scene graph and hierarchical scene organization.
//!
//! A scene is a tree of [`SceneNode`]s. Every node wraps an [`Object3D`] that
//! holds its local [`Transform`], the matrices derived from it and the nodes it
//! owns. Parents own their children exclusively; the parent id a child keeps
//! is for lookups only.
//!
//! World matrices are recomputed lazily during [`SceneNode::update`]: a node's
//! local matrix only when its transform changed, its world matrix when the
//! local matrix, an ancestor, or the parent changed.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    context::Renderer,
    data_structures::{renderable::Renderable, transform::Transform},
    error::Result,
};

/// Process-wide unique identity of a scene node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Child indices leading from a node down to one of its descendants.
pub type NodePath = Vec<usize>;

/// Transform state and children shared by every scene node.
pub struct Object3D {
    id: NodeId,
    pub name: Option<String>,
    transform: Transform,
    local_model: Matrix4<f32>,
    world_model: Matrix4<f32>,
    children: Vec<Box<dyn SceneNode>>,
    parent: Option<NodeId>,
    local_dirty: bool,
    world_dirty: bool,
}

impl Object3D {
    pub fn new() -> Self {
        Self {
            id: NodeId::next(),
            name: None,
            transform: Transform::default(),
            local_model: Matrix4::identity(),
            world_model: Matrix4::identity(),
            children: Vec::new(),
            parent: None,
            local_dirty: true,
            world_dirty: true,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new()
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Mutable access to the local transform. Marks the node for recomputation.
    pub fn transform_mut(&mut self) -> &mut Transform {
        self.local_dirty = true;
        &mut self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.local_dirty = true;
    }

    pub fn local_model(&self) -> &Matrix4<f32> {
        &self.local_model
    }

    pub fn world_model(&self) -> &Matrix4<f32> {
        &self.world_model
    }

    pub fn children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    pub fn add_child(&mut self, mut child: Box<dyn SceneNode>) {
        let object = child.object_mut();
        object.parent = Some(self.id);
        object.world_dirty = true;
        self.children.push(child);
    }

    /// Detaches the direct child `id` and hands it back to the caller.
    pub fn remove_child(&mut self, id: NodeId) -> Option<Box<dyn SceneNode>> {
        let position = self.children.iter().position(|child| child.id() == id)?;
        let mut child = self.children.remove(position);
        let object = child.object_mut();
        object.parent = None;
        object.world_dirty = true;
        Some(child)
    }

    /// Recomputes what changed since the last update and recurses into the children.
    pub fn update(&mut self, delta_t: f32, parent_world: &Matrix4<f32>, parent_changed: bool) {
        let local_changed = std::mem::take(&mut self.local_dirty);
        if local_changed {
            self.local_model = self.transform.to_matrix();
        }
        let changed = parent_changed || local_changed || std::mem::take(&mut self.world_dirty);
        if changed {
            self.world_model = parent_world * self.local_model;
        }
        for child in self.children.iter_mut() {
            child.update(delta_t, &self.world_model, changed);
        }
    }

    /// Destroys every descendant, depth-first, stopping at the first failure.
    pub fn destroy_children(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        for child in self.children.iter_mut() {
            child.destroy(renderer)?;
        }
        Ok(())
    }

    pub fn find(&self, id: NodeId) -> Option<&dyn SceneNode> {
        for child in self.children.iter() {
            if child.id() == id {
                return Some(child.as_ref());
            }
            if let Some(found) = child.object().find(id) {
                return Some(found);
            }
        }
        None
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut Box<dyn SceneNode>> {
        for child in self.children.iter_mut() {
            if child.id() == id {
                return Some(child);
            }
            if let Some(found) = child.object_mut().find_mut(id) {
                return Some(found);
            }
        }
        None
    }

    /// Visits every descendant depth-first, children in their stored order.
    pub fn visit(&self, visitor: &mut dyn FnMut(&dyn SceneNode)) {
        for child in self.children.iter() {
            visitor(child.as_ref());
            child.object().visit(visitor);
        }
    }

    /// Paths to every descendant, keyed by node id.
    pub fn index_paths(&self) -> HashMap<NodeId, NodePath> {
        let mut paths = HashMap::new();
        self.collect_paths(&mut Vec::new(), &mut paths);
        paths
    }

    fn collect_paths(&self, prefix: &mut NodePath, paths: &mut HashMap<NodeId, NodePath>) {
        for (idx, child) in self.children.iter().enumerate() {
            prefix.push(idx);
            paths.insert(child.id(), prefix.clone());
            child.object().collect_paths(prefix, paths);
            prefix.pop();
        }
    }

    pub fn node_at_path(&self, path: &[usize]) -> Option<&dyn SceneNode> {
        let (first, rest) = path.split_first()?;
        let child = self.children.get(*first)?;
        if rest.is_empty() {
            Some(child.as_ref())
        } else {
            child.object().node_at_path(rest)
        }
    }

    pub fn node_at_path_mut(&mut self, path: &[usize]) -> Option<&mut Box<dyn SceneNode>> {
        let (first, rest) = path.split_first()?;
        let child = self.children.get_mut(*first)?;
        if rest.is_empty() {
            Some(child)
        } else {
            child.object_mut().node_at_path_mut(rest)
        }
    }
}

impl Default for Object3D {
    fn default() -> Self {
        Self::new()
    }
}

/// A node of the scene tree.
///
/// Implementors only provide access to their [`Object3D`]; everything else has
/// a default that works on it. Nodes that draw something return themselves
/// from [`SceneNode::as_renderable_mut`].
pub trait SceneNode {
    fn object(&self) -> &Object3D;

    fn object_mut(&mut self) -> &mut Object3D;

    fn as_renderable(&self) -> Option<&Renderable> {
        None
    }

    fn as_renderable_mut(&mut self) -> Option<&mut Renderable> {
        None
    }

    fn id(&self) -> NodeId {
        self.object().id()
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        self.object().children()
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        self.object_mut().children_mut()
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.object_mut().add_child(child);
    }

    fn remove_child(&mut self, id: NodeId) -> Option<Box<dyn SceneNode>> {
        self.object_mut().remove_child(id)
    }

    fn get_local_transform(&self) -> &Transform {
        self.object().transform()
    }

    fn set_local_transform(&mut self, transform: Transform) {
        self.object_mut().set_transform(transform);
    }

    fn world_model(&self) -> Matrix4<f32> {
        *self.object().world_model()
    }

    /**
     * Recomputes this node's matrices and those of all descendants.
     * `parent_changed` forces the world matrix to be rebuilt even if the local transform is unchanged.
     */
    fn update(&mut self, delta_t: f32, parent_world: &Matrix4<f32>, parent_changed: bool) {
        self.object_mut().update(delta_t, parent_world, parent_changed);
    }

    /// Releases the GPU resources of this subtree.
    fn destroy(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        self.object_mut().destroy_children(renderer)
    }
}

/// A node that only groups and transforms its children.
#[derive(Default)]
pub struct ContainerNode {
    pub object: Object3D,
}

impl ContainerNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            object: Object3D::named(name),
        }
    }
}

impl SceneNode for ContainerNode {
    fn object(&self) -> &Object3D {
        &self.object
    }

    fn object_mut(&mut self) -> &mut Object3D {
        &mut self.object
    }
}
