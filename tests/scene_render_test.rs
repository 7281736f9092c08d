use std::{cell::Cell, rc::Rc};

use cgmath::{Matrix4, SquareMatrix, Vector3};
use scene_ngin::{
    backends::headless::{Command, HeadlessRenderer},
    context::{IndexType, PrimitiveMode},
    data_structures::{
        camera::Camera,
        renderable::Renderable,
        scene::{Scene, UpdateListener},
        scene_graph::{ContainerNode, SceneNode},
    },
    error::RenderError,
    pipelines::MODEL_LOCATION,
};

use crate::common::test_utils::{
    count, destroy_and_check, renderer, scene_with_camera, triangle, unit_box,
};

mod common;

#[test]
fn single_box_renders_one_batch() {
    let mut renderer = renderer();
    let mut scene = scene_with_camera();
    scene.root.add_child(unit_box("simple"));
    scene.scene_attached(&mut renderer).unwrap();
    renderer.clear_commands();

    scene.update(16.0);
    scene.render(&mut renderer).unwrap();

    let commands = renderer.take_commands();
    let camera = &scene.cameras()[0];
    let vertex_array = match &commands[2] {
        Command::ActivateVertexArray(Some(vertex_array)) => *vertex_array,
        other => panic!("expected a vertex array bind, got {other:?}"),
    };
    assert_eq!(
        commands,
        vec![
            Command::UseProgram(Some("simple".to_string())),
            Command::ApplyProgramState {
                program: "simple".to_string(),
                projection: camera.projection(),
                view: camera.view(),
            },
            Command::ActivateVertexArray(Some(vertex_array)),
            Command::SetUniformMatrix {
                location: MODEL_LOCATION,
                matrix: Matrix4::identity(),
            },
            Command::DrawElements {
                mode: PrimitiveMode::Triangles,
                count: 36,
                index_type: IndexType::U16,
                offset: 0,
            },
            Command::ActivateVertexArray(None),
            Command::UseProgram(None),
        ]
    );

    destroy_and_check(&mut scene, &mut renderer);
}

#[test]
fn program_state_is_applied_once_per_program() {
    let mut renderer = renderer();
    let mut scene = scene_with_camera();
    let mut group = Box::new(ContainerNode::named("group"));
    group.add_child(unit_box("simple"));
    group.add_child(unit_box("color"));
    scene.root.add_child(unit_box("simple"));
    scene.root.add_child(group);
    scene.root.add_child(unit_box("simple"));
    scene.scene_attached(&mut renderer).unwrap();

    assert_eq!(scene.program_cache().len(), 2);
    assert_eq!(scene.program_cache().bucket("simple").unwrap().len(), 3);
    assert_eq!(scene.program_cache().bucket("color").unwrap().len(), 1);
    renderer.clear_commands();

    scene.render(&mut renderer).unwrap();

    let commands = renderer.take_commands();
    assert_eq!(
        count(&commands, |c| matches!(c, Command::ApplyProgramState { .. })),
        2
    );
    assert_eq!(
        count(&commands, |c| *c == Command::UseProgram(Some("simple".into()))),
        1
    );
    assert_eq!(
        count(&commands, |c| *c == Command::UseProgram(Some("color".into()))),
        1
    );
    assert_eq!(
        count(&commands, |c| matches!(c, Command::DrawElements { .. })),
        4
    );
    assert_eq!(commands.last(), Some(&Command::UseProgram(None)));

    // every draw happens between its bucket's bind and the next one
    let mut current = None;
    for command in &commands {
        match command {
            Command::UseProgram(program) => current = program.clone(),
            Command::DrawElements { .. } => assert!(current.is_some()),
            _ => {}
        }
    }

    destroy_and_check(&mut scene, &mut renderer);
}

#[test]
fn attach_initializes_every_renderable_in_the_tree() {
    let mut renderer = renderer();
    let mut scene = scene_with_camera();
    let mut outer = Box::new(ContainerNode::new());
    let mut inner = Box::new(ContainerNode::new());
    let deep = unit_box("color");
    let deep_id = deep.id();
    inner.add_child(deep);
    outer.add_child(inner);
    let shallow = unit_box("simple");
    let shallow_id = shallow.id();
    scene.root.add_child(shallow);
    scene.root.add_child(outer);

    scene.scene_attached(&mut renderer).unwrap();

    let mut initialized = 0;
    scene.root.visit(&mut |node| {
        if let Some(renderable) = node.as_renderable() {
            assert!(renderable.geometry().is_initialized());
            initialized += 1;
        }
    });
    assert_eq!(initialized, 2);
    assert_eq!(scene.program_cache().program_of(shallow_id), Some("simple"));
    assert_eq!(scene.program_cache().program_of(deep_id), Some("color"));

    destroy_and_check(&mut scene, &mut renderer);
}

#[test]
fn attach_stops_at_the_first_failure() {
    let mut renderer = renderer();
    let mut scene = scene_with_camera();
    let first = unit_box("simple");
    let first_id = first.id();
    let broken = unit_box("missing");
    let broken_id = broken.id();
    let last = unit_box("simple");
    let last_id = last.id();
    scene.root.add_child(first);
    scene.root.add_child(broken);
    scene.root.add_child(last);

    let err = scene.scene_attached(&mut renderer).unwrap_err();

    assert_eq!(err, RenderError::UnknownProgram("missing".to_string()));
    assert!(scene.program_cache().contains(first_id));
    assert!(!scene.program_cache().contains(broken_id));
    assert!(!scene.program_cache().contains(last_id));
    assert_eq!(renderer.stats().live_vertex_arrays(), 1);

    destroy_and_check(&mut scene, &mut renderer);
}

#[test]
fn render_checks_the_active_camera() {
    let mut renderer = renderer();
    let mut scene = Scene::new();
    scene.root.add_child(unit_box("simple"));
    scene.scene_attached(&mut renderer).unwrap();
    renderer.clear_commands();

    assert_eq!(
        scene.render(&mut renderer).unwrap_err(),
        RenderError::InvalidCameraIndex { index: 0, count: 0 }
    );

    scene.add_camera(Camera::perspective(800, 600, Vector3::new(0.0, 0.0, 5.0)));
    scene.set_active_camera(1);
    assert_eq!(
        scene.render(&mut renderer).unwrap_err(),
        RenderError::InvalidCameraIndex { index: 1, count: 1 }
    );
    assert!(renderer.commands().is_empty());

    scene.set_active_camera(0);
    scene.render(&mut renderer).unwrap();

    destroy_and_check(&mut scene, &mut renderer);
}

#[test]
fn active_camera_selects_the_view() {
    let mut renderer = renderer();
    let mut scene = scene_with_camera();
    let second = Camera::perspective(400, 400, Vector3::new(3.0, 0.0, 0.0));
    scene.add_camera(second.clone());
    scene.set_active_camera(1);
    scene.root.add_child(unit_box("simple"));
    scene.scene_attached(&mut renderer).unwrap();
    renderer.clear_commands();

    scene.render(&mut renderer).unwrap();

    assert!(renderer.commands().contains(&Command::ApplyProgramState {
        program: "simple".to_string(),
        projection: second.projection(),
        view: second.view(),
    }));
    destroy_and_check(&mut scene, &mut renderer);
}

#[test]
fn update_listeners_form_a_set() {
    let mut scene = scene_with_camera();
    let calls = Rc::new(Cell::new(0));
    let seen = calls.clone();
    let listener = UpdateListener::new(move |ctx| {
        assert_eq!(ctx.delta_t, 16.0);
        seen.set(seen.get() + 1);
    });

    assert!(scene.add_update_listener(listener.clone()));
    assert!(!scene.add_update_listener(listener.clone()));
    scene.update(16.0);
    assert_eq!(calls.get(), 1);

    assert!(scene.remove_update_listener(&listener));
    assert!(!scene.remove_update_listener(&listener));
    scene.update(16.0);
    assert_eq!(calls.get(), 1);
}

#[test]
fn listeners_run_before_transforms_are_recomputed() {
    let mut scene = scene_with_camera();
    let node = Box::new(ContainerNode::new());
    let id = node.id();
    scene.root.add_child(node);
    scene.add_update_listener(UpdateListener::new(move |ctx| {
        if let Some(node) = ctx.root.find_mut(id) {
            node.object_mut()
                .transform_mut()
                .translate(Vector3::new(1.0, 0.0, 0.0));
        }
        ctx.cameras[0].transform.position.z = 10.0;
    }));

    scene.update(16.0);
    scene.update(16.0);

    let world = scene.root.find(id).unwrap().world_model();
    assert_eq!(world, Matrix4::from_translation(Vector3::new(2.0, 0.0, 0.0)));
    assert_eq!(scene.cameras()[0].transform.position.z, 10.0);
}

#[test]
fn world_matrices_follow_the_parent_chain() {
    let mut scene = Scene::new();
    let mut parent = Box::new(ContainerNode::new());
    parent
        .object
        .transform_mut()
        .translate(Vector3::new(0.0, 1.0, 0.0));
    let mut child = Box::new(ContainerNode::new());
    child
        .object
        .transform_mut()
        .translate(Vector3::new(2.0, 0.0, 0.0));
    let parent_id = parent.id();
    let child_id = child.id();
    parent.add_child(child);
    scene.root.add_child(parent);

    scene.update(16.0);
    assert_eq!(
        scene.root.find(child_id).unwrap().world_model(),
        Matrix4::from_translation(Vector3::new(2.0, 1.0, 0.0))
    );

    // moving the parent alone still moves the child
    scene
        .root
        .find_mut(parent_id)
        .unwrap()
        .object_mut()
        .transform_mut()
        .translate(Vector3::new(0.0, 1.0, 0.0));
    scene.update(16.0);
    let child = scene.root.find(child_id).unwrap();
    assert_eq!(
        child.world_model(),
        Matrix4::from_translation(Vector3::new(2.0, 2.0, 0.0))
    );
    assert_eq!(
        *child.object().local_model(),
        Matrix4::from_translation(Vector3::new(2.0, 0.0, 0.0))
    );
    assert_eq!(child.object().parent(), Some(parent_id));
}

#[test]
fn late_nodes_are_initialized_and_uninitialized_by_id() {
    let mut renderer = renderer();
    let mut scene = scene_with_camera();
    scene.root.add_child(unit_box("simple"));
    scene.scene_attached(&mut renderer).unwrap();

    let mut group = Box::new(ContainerNode::new());
    group.add_child(Box::new(Renderable::new(triangle(), "color")));
    group.add_child(unit_box("simple"));
    let group_id = group.id();
    scene.root.add_child(group);

    assert!(scene.initialize_node(&mut renderer, group_id).unwrap());
    assert_eq!(scene.program_cache().bucket("simple").unwrap().len(), 2);
    assert_eq!(scene.program_cache().bucket("color").unwrap().len(), 1);

    renderer.clear_commands();
    scene.render(&mut renderer).unwrap();
    assert_eq!(
        count(renderer.commands(), |c| matches!(c, Command::DrawArrays { .. })),
        1
    );

    assert_eq!(scene.uninitialize_node(group_id), 2);
    assert_eq!(scene.uninitialize_node(group_id), 0);
    renderer.clear_commands();
    scene.render(&mut renderer).unwrap();
    let commands = renderer.take_commands();
    assert_eq!(count(&commands, |c| matches!(c, Command::DrawArrays { .. })), 0);
    assert_eq!(
        count(&commands, |c| matches!(c, Command::DrawElements { .. })),
        1
    );
    // the emptied color bucket is skipped entirely
    assert_eq!(
        count(&commands, |c| *c == Command::UseProgram(Some("color".into()))),
        0
    );

    let unknown = ContainerNode::new().id();
    assert!(!scene.initialize_node(&mut renderer, unknown).unwrap());

    destroy_and_check(&mut scene, &mut renderer);
}

#[test]
fn removed_nodes_are_skipped_while_still_cached() {
    let mut renderer = renderer();
    let mut scene = scene_with_camera();
    let gone = unit_box("simple");
    let gone_id = gone.id();
    scene.root.add_child(gone);
    scene.root.add_child(unit_box("simple"));
    scene.scene_attached(&mut renderer).unwrap();

    let mut detached = scene.root.remove_child(gone_id).unwrap();
    assert!(scene.program_cache().contains(gone_id));
    renderer.clear_commands();

    scene.render(&mut renderer).unwrap();
    assert_eq!(
        count(renderer.commands(), |c| matches!(c, Command::DrawElements { .. })),
        1
    );

    detached.destroy(&mut renderer).unwrap();
    destroy_and_check(&mut scene, &mut renderer);
}

#[test]
fn reordered_children_are_each_drawn_once() {
    let mut renderer = renderer();
    let mut scene = scene_with_camera();
    let mut left = unit_box("simple");
    left.object.transform_mut().translate(Vector3::new(-1.0, 0.0, 0.0));
    let left_id = left.id();
    let mut right = unit_box("simple");
    right.object.transform_mut().translate(Vector3::new(1.0, 0.0, 0.0));
    scene.root.add_child(left);
    scene.root.add_child(right);
    scene.scene_attached(&mut renderer).unwrap();
    scene.update(16.0);
    scene.render(&mut renderer).unwrap();

    // moves `left` behind `right` in the child list
    let left = scene.root.remove_child(left_id).unwrap();
    scene.root.add_child(left);
    renderer.clear_commands();
    scene.update(16.0);
    scene.render(&mut renderer).unwrap();

    let commands = renderer.commands();
    assert_eq!(
        count(commands, |c| matches!(c, Command::DrawElements { .. })),
        2
    );
    for x in [-1.0, 1.0] {
        let model = Command::SetUniformMatrix {
            location: MODEL_LOCATION,
            matrix: Matrix4::from_translation(Vector3::new(x, 0.0, 0.0)),
        };
        assert_eq!(count(commands, |c| *c == model), 1, "{commands:#?}");
    }

    destroy_and_check(&mut scene, &mut renderer);
}

#[test]
fn destroy_empties_the_cache_and_frees_everything() {
    let mut renderer = HeadlessRenderer::with_programs(["simple"]);
    let mut scene = scene_with_camera();
    let mut group = Box::new(ContainerNode::new());
    group.add_child(unit_box("simple"));
    scene.root.add_child(group);
    scene.root.add_child(unit_box("simple"));
    scene.scene_attached(&mut renderer).unwrap();
    assert_eq!(renderer.stats().live_vertex_arrays(), 2);

    destroy_and_check(&mut scene, &mut renderer);
    assert!(scene.program_cache().is_empty());
}
