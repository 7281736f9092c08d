use scene_ngin::{
    backends::headless::{Command, HeadlessRenderer},
    context::{
        AttributeDescriptor, AttributeFormat, BufferUsage, IndexType, PrimitiveMode,
    },
    data_structures::{camera::Camera, renderable::Renderable, scene::Scene},
    resources::{Buffer, Geometry, shapes::box_geometry},
};

/// Renderer knowing the `simple` and `color` programs.
pub(crate) fn renderer() -> HeadlessRenderer {
    HeadlessRenderer::with_programs(["simple", "color"])
}

/// Three vertices with `position` only, drawn as one triangle.
pub(crate) fn triangle() -> Geometry {
    let vertices: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    Geometry::new(
        Buffer::from_slice(&vertices, BufferUsage::Vertex),
        3,
        PrimitiveMode::Triangles,
    )
    .with_attribute(
        "position",
        AttributeDescriptor::new(AttributeFormat::Float32x3, 12, 0),
    )
    .unwrap()
}

/// A quad as two indexed triangles.
pub(crate) fn indexed_quad() -> Geometry {
    let vertices: [[f32; 3]; 4] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
    ];
    let indices: [u16; 6] = [0, 1, 2, 0, 2, 3];
    Geometry::indexed(
        Buffer::from_slice(&indices, BufferUsage::Index),
        Buffer::from_slice(&vertices, BufferUsage::Vertex),
        PrimitiveMode::Triangles,
        IndexType::U16,
    )
    .with_attribute(
        "position",
        AttributeDescriptor::new(AttributeFormat::Float32x3, 12, 0),
    )
    .unwrap()
}

pub(crate) fn unit_box(program: &str) -> Box<Renderable> {
    Box::new(Renderable::new(box_geometry(1.0, 1.0, 1.0).unwrap(), program))
}

/// Scene with a single camera five units back on +Z.
pub(crate) fn scene_with_camera() -> Scene {
    let mut scene = Scene::new();
    scene.add_camera(Camera::perspective(800, 600, [0.0, 0.0, 5.0].into()));
    scene
}

pub(crate) fn count(commands: &[Command], matches: impl Fn(&Command) -> bool) -> usize {
    commands.iter().filter(|command| matches(command)).count()
}

/// Index of the first command `matches` accepts.
pub(crate) fn position(commands: &[Command], matches: impl Fn(&Command) -> bool) -> usize {
    commands
        .iter()
        .position(|command| matches(command))
        .unwrap_or_else(|| panic!("no matching command in {commands:#?}"))
}

/// Tears the scene down and checks nothing is left allocated.
pub(crate) fn destroy_and_check(scene: &mut Scene, renderer: &mut HeadlessRenderer) {
    scene.destroy(renderer).unwrap();
    let stats = renderer.stats();
    assert_eq!(stats.live_buffers(), 0, "{stats:?}");
    assert_eq!(stats.live_vertex_arrays(), 0, "{stats:?}");
}
