//! Scene nodes that draw a geometry with a named program.

use log::{debug, warn};

use crate::{
    context::{Renderer, UniformLocation},
    data_structures::scene_graph::{Object3D, SceneNode},
    error::{RenderError, Result},
    resources::geometry::Geometry,
};

/// Name of the per-draw world matrix uniform every program is expected to expose.
pub const MODEL_UNIFORM: &str = "model";

/// A node drawing one [`Geometry`] with the program called `program`.
///
/// The geometry can be replaced at any time with [`Renderable::set_geometry`];
/// the replacement is staged and only swapped in, on the render thread, by the
/// next [`Renderable::set_shader_state`].
pub struct Renderable {
    pub object: Object3D,
    geometry: Geometry,
    pending_geometry: Option<Geometry>,
    program: String,
    model_uniform: Option<UniformLocation>,
}

impl Renderable {
    pub fn new(geometry: Geometry, program: impl Into<String>) -> Self {
        Self {
            object: Object3D::new(),
            geometry,
            pending_geometry: None,
            program: program.into(),
            model_uniform: None,
        }
    }

    pub fn named(name: impl Into<String>, geometry: Geometry, program: impl Into<String>) -> Self {
        Self {
            object: Object3D::named(name),
            ..Self::new(geometry, program)
        }
    }

    /// Resolves the program, caches its model uniform and initializes the geometry.
    ///
    /// Leaves the program bound on `renderer`.
    pub fn initialize(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        debug!("Initializing renderable {:?} with program {}", self.id(), self.program);
        renderer.use_program(Some(&self.program))?;
        let program = renderer
            .active_program()
            .ok_or_else(|| RenderError::UnknownProgram(self.program.clone()))?;
        if !program.is_ready() {
            return Err(RenderError::ProgramNotReady(self.program.clone()));
        }
        self.model_uniform = program.uniform(MODEL_UNIFORM);
        if self.model_uniform.is_none() {
            warn!(
                "Program {} has no {MODEL_UNIFORM} uniform, renderable {:?} is drawn untransformed.",
                self.program,
                self.id()
            );
        }
        if !self.geometry.is_initialized() {
            self.geometry.initialize(renderer)?;
        }
        Ok(())
    }

    /// Stages `geometry` to replace the active one on the next draw.
    ///
    /// A replacement that was staged earlier and never drawn is handed back
    /// without being destroyed. The caller owns its GPU resources, if any.
    pub fn set_geometry(&mut self, geometry: Geometry) -> Option<Geometry> {
        let discarded = self.pending_geometry.replace(geometry);
        if discarded.is_some() {
            warn!(
                "Pending geometry of renderable {:?} replaced before it was drawn.",
                self.id()
            );
        }
        discarded
    }

    /// Applies a staged geometry swap, binds the vertex array and uploads the
    /// world matrix. Call once per draw, right before [`Renderable::render`].
    pub fn set_shader_state(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        if let Some(mut next) = self.pending_geometry.take() {
            if self.geometry.is_initialized() {
                if let Err(err) = self.geometry.destroy(renderer) {
                    self.pending_geometry = Some(next);
                    return Err(err);
                }
            }
            if !next.is_initialized() {
                // stays staged so the next draw retries
                if let Err(err) = next.initialize(renderer) {
                    self.pending_geometry = Some(next);
                    return Err(err);
                }
            }
            self.geometry = next;
        }

        renderer.activate_vertex_array(self.geometry.vertex_array());
        if let Some(location) = self.model_uniform {
            renderer.set_uniform_matrix(location, self.object.world_model());
        }
        Ok(())
    }

    pub fn render(&self, renderer: &mut dyn Renderer) {
        self.geometry.render(renderer);
    }

    pub fn clean_shader_state(&self, renderer: &mut dyn Renderer) {
        renderer.activate_vertex_array(None);
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn pending_geometry(&self) -> Option<&Geometry> {
        self.pending_geometry.as_ref()
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn model_uniform(&self) -> Option<UniformLocation> {
        self.model_uniform
    }
}

impl SceneNode for Renderable {
    fn object(&self) -> &Object3D {
        &self.object
    }

    fn object_mut(&mut self) -> &mut Object3D {
        &mut self.object
    }

    fn as_renderable(&self) -> Option<&Renderable> {
        Some(self)
    }

    fn as_renderable_mut(&mut self) -> Option<&mut Renderable> {
        Some(self)
    }

    fn destroy(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        if self.geometry.is_initialized() {
            self.geometry.destroy(renderer)?;
        }
        if let Some(pending) = self.pending_geometry.as_mut() {
            if pending.is_initialized() {
                pending.destroy(renderer)?;
            }
        }
        self.object.destroy_children(renderer)
    }
}
