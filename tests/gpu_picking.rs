//! GPU picking against a headless device. Every test returns early when the
//! machine has no adapter.

use scenepick::{
    Color, PickId, PickingBuffer, PickingTarget, Projection, RawGeometry, Scene, SceneRenderer,
    SoftwarePickingBuffer, Transform, Vec3, pick_index, request_headless_device,
};

const WIDTH: u32 = 128;
const HEIGHT: u32 = 64;

fn three_cubes() -> Scene {
    let mut scene = Scene::new();
    let camera = scene.camera().node;
    scene
        .graph_mut()
        .set_local(camera, Transform::from_position(Vec3::new(0.0, 0.0, 10.0)))
        .unwrap();

    let cube = scene.add_mesh(RawGeometry::cube());
    for x in [-3.0, 0.0, 3.0] {
        scene
            .spawn_pickable(
                cube,
                Transform::from_position(Vec3::new(x, 0.0, 0.0)),
                Color::WHITE,
                None,
            )
            .unwrap();
    }
    scene
}

fn render_gpu(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    renderer: &mut SceneRenderer,
    scene: &Scene,
    picking: &PickingBuffer,
) {
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Test Picking Encoder"),
    });
    renderer.render_picking(device, queue, &mut encoder, scene, picking);
    queue.submit(std::iter::once(encoder.finish()));
}

#[test]
fn gpu_and_software_targets_agree() {
    let Some((device, queue)) = request_headless_device() else {
        return;
    };
    let scene = three_cubes();
    let mut renderer = SceneRenderer::new(&device, wgpu::TextureFormat::Rgba8UnormSrgb);
    let picking = PickingBuffer::new(&device, &queue, WIDTH, HEIGHT);
    render_gpu(&device, &queue, &mut renderer, &scene, &picking);

    let mut software = SoftwarePickingBuffer::new(WIDTH, HEIGHT);
    scene
        .render_picking_software(&mut software, WIDTH as f32 / HEIGHT as f32)
        .unwrap();

    // Sample a row through the cube centers, skipping pixels on cube edges
    // where rasterization rules may differ.
    let y = HEIGHT / 2;
    for x in (0..WIDTH).step_by(4) {
        let expected = software.pick(x, y);
        let neighbours_agree = software.pick(x.saturating_sub(1), y) == expected
            && software.pick(x + 1, y) == expected;
        if neighbours_agree {
            assert_eq!(picking.pick(x, y), expected, "pixel ({x}, {y})");
        }
    }
    assert_eq!(pick_index(picking.pick(WIDTH / 2, HEIGHT / 2)), 2);
    assert_eq!(pick_index(picking.pick(0, HEIGHT - 1)), 0);
}

#[test]
fn rows_are_read_bottom_up() {
    let Some((device, queue)) = request_headless_device() else {
        return;
    };
    let mut scene = Scene::new();
    let camera = scene.camera().node;
    scene
        .graph_mut()
        .set_local(camera, Transform::from_position(Vec3::new(0.0, 0.0, 6.0)))
        .unwrap();
    let cube = scene.add_mesh(RawGeometry::cube());
    // Only above the horizon.
    scene
        .spawn_pickable(
            cube,
            Transform::from_position(Vec3::new(0.0, 1.2, 0.0)),
            Color::WHITE,
            None,
        )
        .unwrap();

    let mut renderer = SceneRenderer::new(&device, wgpu::TextureFormat::Rgba8UnormSrgb);
    let picking = PickingBuffer::new(&device, &queue, WIDTH, HEIGHT);
    render_gpu(&device, &queue, &mut renderer, &scene, &picking);

    let x = WIDTH / 2;
    let upper = (0..HEIGHT)
        .filter(|&y| picking.pick(x, y).is_some())
        .collect::<Vec<_>>();
    assert!(!upper.is_empty());
    assert!(upper.iter().all(|&y| y > HEIGHT / 2));
}

#[test]
fn finalize_is_idempotent_and_resize_revives() {
    let Some((device, queue)) = request_headless_device() else {
        return;
    };
    let scene = three_cubes();
    let mut renderer = SceneRenderer::new(&device, wgpu::TextureFormat::Rgba8UnormSrgb);
    let mut picking = PickingBuffer::new(&device, &queue, WIDTH, HEIGHT);

    picking.finalize();
    picking.finalize();
    assert!(picking.is_finalized());
    assert_eq!(picking.pick(WIDTH / 2, HEIGHT / 2), None);

    // Rendering into a finalized buffer records nothing.
    render_gpu(&device, &queue, &mut renderer, &scene, &picking);

    picking.resize(WIDTH * 2, HEIGHT * 2);
    assert!(!picking.is_finalized());
    assert_eq!(picking.size(), (WIDTH * 2, HEIGHT * 2));
    render_gpu(&device, &queue, &mut renderer, &scene, &picking);
    assert_eq!(pick_index(picking.pick(WIDTH, HEIGHT)), 2);
}

#[test]
fn many_objects_keep_their_own_uniform_slots() {
    let Some((device, queue)) = request_headless_device() else {
        return;
    };
    let mut scene = Scene::new();
    let camera = scene.camera().node;
    scene
        .graph_mut()
        .set_local(camera, Transform::from_position(Vec3::new(0.0, 0.0, 30.0)))
        .unwrap();
    let cube = scene.add_mesh(RawGeometry::cube());

    // More objects than the renderer's initial uniform capacity.
    let columns = 20;
    for i in 0..columns {
        let x = (i as f32 - (columns - 1) as f32 / 2.0) * 1.5;
        scene
            .spawn_pickable(
                cube,
                Transform::from_position(Vec3::new(x, 0.0, 0.0)),
                Color::WHITE,
                None,
            )
            .unwrap();
    }

    let (width, height) = (512, 128);
    let mut renderer = SceneRenderer::new(&device, wgpu::TextureFormat::Rgba8UnormSrgb);
    let picking = PickingBuffer::new(&device, &queue, width, height);
    render_gpu(&device, &queue, &mut renderer, &scene, &picking);

    let vp = scene
        .camera()
        .view_projection(scene.graph(), width as f32 / height as f32)
        .unwrap();
    for (id, node) in scene.pickables() {
        let center = scene.graph().world_position(node).unwrap();
        let ndc = vp.project_point3(center);
        let x = ((ndc.x * 0.5 + 0.5) * width as f32) as u32;
        let y = ((ndc.y * 0.5 + 0.5) * height as f32) as u32;
        assert_eq!(picking.pick(x, y), Some(id));
    }
}

#[test]
fn empty_meshes_are_skipped() {
    let Some((device, queue)) = request_headless_device() else {
        return;
    };
    let mut scene = three_cubes();
    let empty = scene.add_mesh(RawGeometry::default());
    let dangling = scene.add_mesh(RawGeometry::new(Vec::new(), vec![0, 1, 2]));
    for mesh in [empty, dangling] {
        scene
            .spawn_pickable(mesh, Transform::new(), Color::WHITE, None)
            .unwrap();
    }

    let mut renderer = SceneRenderer::new(&device, wgpu::TextureFormat::Rgba8UnormSrgb);
    let picking = PickingBuffer::new(&device, &queue, WIDTH, HEIGHT);
    render_gpu(&device, &queue, &mut renderer, &scene, &picking);

    assert_eq!(pick_index(picking.pick(WIDTH / 2, HEIGHT / 2)), 2);
}

#[test]
fn ids_read_back_exactly_from_the_device() {
    let Some((device, queue)) = request_headless_device() else {
        return;
    };
    // A 16 x 16 grid of cubes under an orthographic camera, one cell per
    // 16 pixels. Ids 1..=256 cover every low byte and the first carry.
    const GRID: u32 = 16;
    const SIZE: u32 = GRID * 16;

    let mut scene = Scene::new();
    let camera = scene.camera().node;
    scene
        .graph_mut()
        .set_local(camera, Transform::from_position(Vec3::new(0.0, 0.0, 10.0)))
        .unwrap();
    scene.set_projection(Projection::Orthographic {
        half_height: GRID as f32 / 2.0,
        near: 0.1,
        far: 20.0,
    });
    let cube = scene.add_mesh(RawGeometry::cube());
    let cell_center = |i: u32| (i % GRID, i / GRID);
    for i in 0..GRID * GRID {
        let (col, row) = cell_center(i);
        let position = Vec3::new(
            col as f32 + 0.5 - GRID as f32 / 2.0,
            row as f32 + 0.5 - GRID as f32 / 2.0,
            0.0,
        );
        scene
            .spawn_pickable(
                cube,
                Transform::from_position(position).uniform_scale(0.8),
                Color::WHITE,
                None,
            )
            .unwrap();
    }

    let mut renderer = SceneRenderer::new(&device, wgpu::TextureFormat::Rgba8UnormSrgb);
    let picking = PickingBuffer::new(&device, &queue, SIZE, SIZE);
    render_gpu(&device, &queue, &mut renderer, &scene, &picking);

    for i in 0..GRID * GRID {
        let (col, row) = cell_center(i);
        let picked = picking.pick(col * 16 + 8, row * 16 + 8);
        assert_eq!(picked, PickId::new(i + 1), "cell ({col}, {row})");
    }
}
