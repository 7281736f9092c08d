//! The root of a scene tree: cameras, per-frame listeners and program batching.
//!
//! A [`Scene`] is attached to a renderer once with [`Scene::scene_attached`],
//! which initializes every renderable in the tree and sorts it into the
//! [`ProgramCache`]. After that a frame driver calls [`Scene::update`] and
//! [`Scene::render`] once per frame.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    hash::{Hash, Hasher},
    rc::Rc,
};

use cgmath::{Matrix4, SquareMatrix};
use log::debug;

use crate::{
    context::Renderer,
    data_structures::{
        camera::Camera,
        renderable::Renderable,
        scene_graph::{NodeId, NodePath, Object3D, SceneNode},
    },
    error::{RenderError, Result},
    render::ProgramCache,
};

/// What an update listener gets to see and change each frame.
pub struct UpdateContext<'a> {
    /// Milliseconds since the previous frame.
    pub delta_t: f32,
    pub root: &'a mut Object3D,
    pub cameras: &'a mut Vec<Camera>,
}

type ListenerFn = dyn FnMut(&mut UpdateContext<'_>);

/// A per-frame callback. Listeners compare equal when they share the same
/// closure, so clones of one listener count as one registration.
#[derive(Clone)]
pub struct UpdateListener(Rc<RefCell<ListenerFn>>);

impl UpdateListener {
    pub fn new(listener: impl FnMut(&mut UpdateContext<'_>) + 'static) -> Self {
        Self(Rc::new(RefCell::new(listener)))
    }

    fn call(&self, context: &mut UpdateContext<'_>) {
        (&mut *self.0.borrow_mut())(context);
    }
}

impl PartialEq for UpdateListener {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl Eq for UpdateListener {}

impl Hash for UpdateListener {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as *const () as usize).hash(state);
    }
}

impl std::fmt::Debug for UpdateListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("UpdateListener")
            .field(&(Rc::as_ptr(&self.0) as *const ()))
            .finish()
    }
}

pub struct Scene {
    pub root: Object3D,
    cameras: Vec<Camera>,
    active_camera: usize,
    update_listeners: HashSet<UpdateListener>,
    program_cache: ProgramCache,
    /// Where each renderable sat in the tree when last looked up.
    node_paths: HashMap<NodeId, NodePath>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            root: Object3D::new(),
            cameras: Vec::new(),
            active_camera: 0,
            update_listeners: HashSet::new(),
            program_cache: ProgramCache::new(),
            node_paths: HashMap::new(),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            root: Object3D::named(name),
            ..Self::new()
        }
    }

    /// Initializes every renderable in the tree, depth-first in child order,
    /// and files it under its program.
    ///
    /// The first failure aborts the walk. Renderables initialized before it
    /// stay initialized and cached.
    pub fn scene_attached(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        let Self {
            root,
            program_cache,
            ..
        } = self;
        for child in root.children_mut().iter_mut() {
            attach_subtree(child.as_mut(), renderer, program_cache)?;
        }
        Ok(())
    }

    /// Attaches the subtree rooted at `id`, typically one added after
    /// [`Scene::scene_attached`]. Returns `false` if no such node exists.
    pub fn initialize_node(&mut self, renderer: &mut dyn Renderer, id: NodeId) -> Result<bool> {
        let Self {
            root,
            program_cache,
            ..
        } = self;
        match root.find_mut(id) {
            Some(node) => {
                attach_subtree(node.as_mut(), renderer, program_cache)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drops the renderables of the subtree rooted at `id` from the program
    /// cache, so they are no longer drawn. GPU resources are left alone.
    /// Returns how many renderables were removed.
    pub fn uninitialize_node(&mut self, id: NodeId) -> usize {
        let Some(node) = self.root.find(id) else {
            return 0;
        };
        let mut ids = vec![node.id()];
        node.object().visit(&mut |descendant| ids.push(descendant.id()));
        ids.into_iter()
            .filter(|id| self.program_cache.remove(*id))
            .count()
    }

    pub fn add_update_listener(&mut self, listener: UpdateListener) -> bool {
        self.update_listeners.insert(listener)
    }

    pub fn remove_update_listener(&mut self, listener: &UpdateListener) -> bool {
        self.update_listeners.remove(listener)
    }

    /// Appends a camera. The active camera index is unchanged.
    pub fn add_camera(&mut self, camera: Camera) {
        self.cameras.push(camera);
    }

    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    pub fn cameras_mut(&mut self) -> &mut Vec<Camera> {
        &mut self.cameras
    }

    pub fn active_camera(&self) -> usize {
        self.active_camera
    }

    /// Selects the camera [`Scene::render`] uses. Bounds are checked at render time.
    pub fn set_active_camera(&mut self, index: usize) {
        self.active_camera = index;
    }

    pub fn program_cache(&self) -> &ProgramCache {
        &self.program_cache
    }

    pub fn program_cache_mut(&mut self) -> &mut ProgramCache {
        &mut self.program_cache
    }

    /// Runs every update listener, in no particular order, then recomputes
    /// the transforms of the whole tree.
    pub fn update(&mut self, delta_t: f32) {
        let mut context = UpdateContext {
            delta_t,
            root: &mut self.root,
            cameras: &mut self.cameras,
        };
        for listener in self.update_listeners.iter() {
            listener.call(&mut context);
        }
        self.root.update(delta_t, &Matrix4::identity(), false);
    }

    /// Draws every cached renderable, one program bucket at a time.
    ///
    /// Per bucket the program is bound and its camera state applied once, then
    /// each member gets its shader state set, is drawn, and has its shader
    /// state cleaned. The program is unbound at the end.
    ///
    /// Members are found through cached tree paths. The cache is rebuilt at
    /// most once per call, the first time a path no longer leads to its node.
    pub fn render(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        let camera = self
            .cameras
            .get(self.active_camera)
            .ok_or(RenderError::InvalidCameraIndex {
                index: self.active_camera,
                count: self.cameras.len(),
            })?;
        let projection = camera.projection();
        let view = camera.view();
        let mut refreshed = false;

        for bucket in self.program_cache.buckets() {
            if bucket.is_empty() {
                continue;
            }
            debug!("Rendering batch with program {}", bucket.program());
            renderer.use_program(Some(bucket.program()))?;
            renderer.apply_program_state(&projection, &view)?;

            for id in bucket.members() {
                if !refreshed && !path_leads_to(&self.root, &self.node_paths, id) {
                    self.node_paths = self.root.index_paths();
                    refreshed = true;
                }
                let Some(renderable) = renderable_at(&mut self.root, &self.node_paths, id) else {
                    debug!("Skipping renderable {id:?}, it is no longer part of the scene");
                    continue;
                };
                let drawn = renderable
                    .set_shader_state(renderer)
                    .map(|_| renderable.render(renderer));
                renderable.clean_shader_state(renderer);
                drawn?;
            }
        }

        renderer.use_program(None)
    }

    /// Releases every GPU resource reachable from the tree and empties the
    /// program cache. Must run against the renderer the scene was attached to.
    pub fn destroy(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        self.program_cache.clear();
        self.node_paths.clear();
        self.root.destroy_children(renderer)
    }
}

fn path_leads_to(root: &Object3D, paths: &HashMap<NodeId, NodePath>, id: NodeId) -> bool {
    paths
        .get(&id)
        .and_then(|path| root.node_at_path(path))
        .is_some_and(|node| node.id() == id)
}

fn renderable_at<'a>(
    root: &'a mut Object3D,
    paths: &HashMap<NodeId, NodePath>,
    id: NodeId,
) -> Option<&'a mut Renderable> {
    paths
        .get(&id)
        .and_then(|path| root.node_at_path_mut(path))
        .filter(|node| node.id() == id)
        .and_then(|node| node.as_renderable_mut())
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneNode for Scene {
    fn object(&self) -> &Object3D {
        &self.root
    }

    fn object_mut(&mut self) -> &mut Object3D {
        &mut self.root
    }

    fn destroy(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        Scene::destroy(self, renderer)
    }
}

fn attach_subtree(
    node: &mut dyn SceneNode,
    renderer: &mut dyn Renderer,
    program_cache: &mut ProgramCache,
) -> Result<()> {
    if let Some(renderable) = node.as_renderable_mut() {
        renderable.initialize(renderer)?;
        program_cache.insert(renderable.program(), renderable.id());
    }
    for child in node.get_children_mut().iter_mut() {
        attach_subtree(child.as_mut(), renderer, program_cache)?;
    }
    Ok(())
}
