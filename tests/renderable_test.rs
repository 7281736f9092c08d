use cgmath::{Matrix4, Vector3};
use scene_ngin::{
    backends::headless::{Command, HeadlessProgram, HeadlessRenderer},
    data_structures::{
        renderable::Renderable,
        scene::Scene,
        scene_graph::{NodeId, SceneNode},
    },
    error::RenderError,
    pipelines::MODEL_LOCATION,
};

use crate::common::test_utils::{
    count, destroy_and_check, indexed_quad, position, renderer, scene_with_camera, triangle,
};

mod common;

fn renderable_mut(scene: &mut Scene, id: NodeId) -> &mut Renderable {
    scene
        .root
        .find_mut(id)
        .and_then(|node| node.as_renderable_mut())
        .unwrap()
}

#[test]
fn initialize_binds_program_and_caches_model_uniform() {
    let mut renderer = renderer();
    let mut renderable = Renderable::new(triangle(), "simple");

    renderable.initialize(&mut renderer).unwrap();

    assert_eq!(renderer.active_program_name(), Some("simple"));
    assert_eq!(renderable.model_uniform(), Some(MODEL_LOCATION));
    assert!(renderable.geometry().is_initialized());

    renderable.destroy(&mut renderer).unwrap();
    assert_eq!(renderer.stats().live_buffers(), 0);
}

#[test]
fn initialize_fails_for_unknown_or_unready_programs() {
    let mut renderer = renderer();
    renderer.register_program(HeadlessProgram::new("late").with_ready(false));

    let mut unknown = Renderable::new(triangle(), "missing");
    assert_eq!(
        unknown.initialize(&mut renderer).unwrap_err(),
        RenderError::UnknownProgram("missing".to_string())
    );

    let mut unready = Renderable::new(triangle(), "late");
    assert_eq!(
        unready.initialize(&mut renderer).unwrap_err(),
        RenderError::ProgramNotReady("late".to_string())
    );
    assert!(!unready.geometry().is_initialized());

    renderer.program_mut("late").unwrap().set_ready(true);
    unready.initialize(&mut renderer).unwrap();
    unready.destroy(&mut renderer).unwrap();
}

#[test]
fn program_without_model_uniform_draws_untransformed() {
    let mut renderer = HeadlessRenderer::new();
    renderer.register_program(HeadlessProgram::bare("flat"));
    let mut renderable = Renderable::new(triangle(), "flat");
    renderable.initialize(&mut renderer).unwrap();
    renderer.clear_commands();

    renderable.set_shader_state(&mut renderer).unwrap();

    assert_eq!(renderable.model_uniform(), None);
    assert_eq!(
        count(renderer.commands(), |c| matches!(
            c,
            Command::SetUniformMatrix { .. }
        )),
        0
    );
    renderable.destroy(&mut renderer).unwrap();
}

#[test]
fn staged_geometry_is_swapped_on_the_next_draw() {
    let mut renderer = renderer();
    let mut scene = scene_with_camera();
    let renderable = Box::new(Renderable::new(triangle(), "simple"));
    let id = renderable.id();
    scene.root.add_child(renderable);
    scene.scene_attached(&mut renderer).unwrap();

    let old_vertex_array = renderable_mut(&mut scene, id)
        .geometry()
        .vertex_array()
        .unwrap();
    assert!(renderable_mut(&mut scene, id)
        .set_geometry(indexed_quad())
        .is_none());
    // still drawing the old one until the next frame
    assert!(renderable_mut(&mut scene, id).pending_geometry().is_some());
    renderer.clear_commands();

    scene.update(16.0);
    scene.render(&mut renderer).unwrap();

    let commands = renderer.commands();
    let deleted = position(commands, |c| {
        *c == Command::DeleteVertexArray(old_vertex_array)
    });
    let created = position(commands, |c| matches!(c, Command::CreateVertexArray(_)));
    let drawn = position(commands, |c| matches!(c, Command::DrawElements { count: 6, .. }));
    assert!(deleted < created && created < drawn);
    assert_eq!(count(commands, |c| matches!(c, Command::DrawArrays { .. })), 0);

    let swapped = renderable_mut(&mut scene, id);
    assert!(swapped.pending_geometry().is_none());
    assert!(swapped.geometry().is_indexed());
    assert!(!renderer.is_live_vertex_array(old_vertex_array));

    destroy_and_check(&mut scene, &mut renderer);
}

#[test]
fn restaging_hands_back_the_undrawn_geometry() {
    let mut renderable = Renderable::new(triangle(), "simple");

    assert!(renderable.set_geometry(indexed_quad()).is_none());
    let discarded = renderable.set_geometry(triangle()).unwrap();

    assert!(discarded.is_indexed());
    assert!(!renderable.pending_geometry().unwrap().is_indexed());
}

#[test]
fn failed_swap_stays_staged_and_is_retried() {
    let mut renderer = renderer();
    let mut scene = scene_with_camera();
    let renderable = Box::new(Renderable::new(triangle(), "simple"));
    let id = renderable.id();
    scene.root.add_child(renderable);
    scene.scene_attached(&mut renderer).unwrap();

    renderable_mut(&mut scene, id).set_geometry(indexed_quad());
    renderer.fail_next_buffer_allocations(1);

    let err = scene.render(&mut renderer).unwrap_err();
    assert_eq!(err, RenderError::ResourceAllocation { resource: "buffer" });
    assert!(renderable_mut(&mut scene, id).pending_geometry().is_some());
    // clean_shader_state still ran
    assert_eq!(renderer.active_vertex_array(), None);

    scene.render(&mut renderer).unwrap();
    let swapped = renderable_mut(&mut scene, id);
    assert!(swapped.pending_geometry().is_none());
    assert!(swapped.geometry().is_initialized());

    destroy_and_check(&mut scene, &mut renderer);
}

#[test]
fn shader_state_uploads_the_world_matrix() {
    let mut renderer = renderer();
    let mut scene = scene_with_camera();
    let mut renderable = Box::new(Renderable::new(triangle(), "simple"));
    renderable
        .object
        .transform_mut()
        .translate(Vector3::new(1.0, 2.0, 3.0));
    scene.root.add_child(renderable);
    scene.scene_attached(&mut renderer).unwrap();
    renderer.clear_commands();

    scene.update(16.0);
    scene.render(&mut renderer).unwrap();

    assert!(renderer.commands().contains(&Command::SetUniformMatrix {
        location: MODEL_LOCATION,
        matrix: Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0)),
    }));

    destroy_and_check(&mut scene, &mut renderer);
}

#[test]
fn destroy_releases_an_initialized_pending_geometry() {
    let mut renderer = renderer();
    let mut renderable = Renderable::new(triangle(), "simple");
    renderable.initialize(&mut renderer).unwrap();

    let mut pending = indexed_quad();
    pending.initialize(&mut renderer).unwrap();
    renderable.set_geometry(pending);
    assert_eq!(renderer.stats().live_vertex_arrays(), 2);

    renderable.destroy(&mut renderer).unwrap();

    assert_eq!(renderer.stats().live_buffers(), 0);
    assert_eq!(renderer.stats().live_vertex_arrays(), 0);
    assert!(!renderable.geometry().is_initialized());
    assert!(!renderable.pending_geometry().unwrap().is_initialized());
}
