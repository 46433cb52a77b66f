//! Window, event loop and the per-frame contract with the application.
//!
//! Each frame runs in a fixed order:
//!
//! 1. [`BaseApp::update`] with this frame's [`Input`]
//! 2. picking pass into the [`PickingBuffer`]
//! 3. lit pass to the surface
//! 4. present
//!
//! A primary-button press is resolved immediately against the picking buffer
//! as it was last rendered, so the result reflects the scene one frame
//! behind the cursor event. Objects that moved during that frame are picked
//! at their previous position.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec2;
use winit::application::ApplicationHandler;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::color::Color;
use crate::ecs::MeshId;
use crate::geometry::RawGeometry;
use crate::gpu::{GpuContext, GpuError};
use crate::input::Input;
use crate::picking::{PickId, PickingBuffer, PickingTarget};
use crate::renderer::SceneRenderer;
use crate::scene::Scene;

/// An application driven by [`run`].
pub trait BaseApp: Sized + 'static {
    /// Builds the scene once the window and GPU exist.
    fn initialize(ctx: &mut SetupContext) -> Self;

    /// Called once per frame before anything is drawn.
    fn update(&mut self, frame: &mut Frame);

    /// Called for every primary-button press with the object under the
    /// cursor, or `None` for the background.
    fn on_pick(&mut self, _picked: Option<PickId>, _scene: &mut Scene) {}

    /// Called once when the window closes, before GPU resources are released.
    fn finalize(&mut self) {}
}

/// Context provided during app setup.
pub struct SetupContext<'a> {
    pub gpu: &'a GpuContext,
    pub scene: &'a mut Scene,
}

impl SetupContext<'_> {
    pub fn mesh_cube(&mut self) -> MeshId {
        self.scene.add_mesh(RawGeometry::cube())
    }

    pub fn mesh_sphere(&mut self, segments: u32, rings: u32, radius: f32) -> MeshId {
        self.scene
            .add_mesh(RawGeometry::sphere(segments, rings, radius))
    }

    pub fn mesh_plane(&mut self, size: f32) -> MeshId {
        self.scene.add_mesh(RawGeometry::plane(size))
    }
}

/// Context provided each frame.
pub struct Frame<'a> {
    /// GPU context for advanced rendering.
    pub gpu: &'a GpuContext,
    pub scene: &'a mut Scene,
    /// Input state for this frame.
    pub input: &'a Input,
    /// Total elapsed time in seconds.
    pub time: f32,
    /// Delta time since last frame in seconds.
    pub dt: f32,
}

impl Frame<'_> {
    /// Current frames per second.
    pub fn fps(&self) -> f32 {
        if self.dt > 0.0 { 1.0 / self.dt } else { 0.0 }
    }

    pub fn width(&self) -> u32 {
        self.gpu.width()
    }

    pub fn height(&self) -> u32 {
        self.gpu.height()
    }

    pub fn aspect(&self) -> f32 {
        self.gpu.aspect()
    }
}

/// Configuration for the app window.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub clear_color: Color,
    /// When false no picking buffer is allocated and `on_pick` always
    /// receives `None`.
    pub picking: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Scenepick".to_string(),
            width: 800,
            height: 600,
            clear_color: Color::rgb(0.02, 0.02, 0.05),
            picking: true,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }

    pub fn picking(mut self, enabled: bool) -> Self {
        self.picking = enabled;
        self
    }
}

/// Errors that stop [`run`].
#[derive(Debug)]
pub enum RunError {
    EventLoop(EventLoopError),
    Window(OsError),
    Gpu(GpuError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::EventLoop(e) => write!(f, "Event loop failed: {e}"),
            RunError::Window(e) => write!(f, "Failed to create window: {e}"),
            RunError::Gpu(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::EventLoop(e) => Some(e),
            RunError::Window(e) => Some(e),
            RunError::Gpu(e) => Some(e),
        }
    }
}

impl From<EventLoopError> for RunError {
    fn from(e: EventLoopError) -> Self {
        RunError::EventLoop(e)
    }
}

/// Opens a window and runs `A` until it is closed.
///
/// # Example
/// ```ignore
/// struct Viewer;
///
/// impl BaseApp for Viewer {
///     fn initialize(ctx: &mut SetupContext) -> Self {
///         let cube = ctx.mesh_cube();
///         ctx.scene
///             .spawn_pickable(cube, Transform::new(), Color::WHITE, None)
///             .unwrap();
///         Viewer
///     }
///
///     fn update(&mut self, _frame: &mut Frame) {}
///
///     fn on_pick(&mut self, picked: Option<PickId>, _scene: &mut Scene) {
///         println!("picked {picked:?}");
///     }
/// }
///
/// scenepick::run::<Viewer>(AppConfig::new().title("Viewer"))?;
/// ```
pub fn run<A: BaseApp>(config: AppConfig) -> Result<(), RunError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = Runner::<A>::Pending { config };
    event_loop.run_app(&mut runner)?;

    match runner {
        Runner::Failed(e) => Err(e),
        _ => Ok(()),
    }
}

/// Converts a window cursor position (top-left origin) to picking
/// coordinates (bottom-left origin) for a target `height` pixels tall.
pub fn window_to_pick_coords(position: Vec2, height: u32) -> (u32, u32) {
    let x = position.x.max(0.0) as u32;
    let y_down = position.y.max(0.0) as u32;
    let y = height.saturating_sub(1).saturating_sub(y_down);
    (x, y)
}

struct Running<A> {
    window: Arc<Window>,
    gpu: GpuContext,
    renderer: SceneRenderer,
    picking: Option<PickingBuffer>,
    scene: Scene,
    input: Input,
    app: A,
    start_time: Instant,
    last_frame: Instant,
}

enum Runner<A> {
    Pending { config: AppConfig },
    Running(Box<Running<A>>),
    Failed(RunError),
    Exited,
}

impl<A: BaseApp> Runner<A> {
    fn start(config: &AppConfig, event_loop: &ActiveEventLoop) -> Result<Running<A>, RunError> {
        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .map_err(RunError::Window)?,
        );
        let gpu = GpuContext::new(window.clone()).map_err(RunError::Gpu)?;

        let mut renderer = SceneRenderer::new(&gpu.device, gpu.format());
        renderer.clear_color = config.clear_color;

        let picking = config
            .picking
            .then(|| PickingBuffer::new(&gpu.device, &gpu.queue, gpu.width(), gpu.height()));

        let mut scene = Scene::new();
        let app = A::initialize(&mut SetupContext {
            gpu: &gpu,
            scene: &mut scene,
        });
        log::info!(
            "{} started with {} pickable objects",
            config.title,
            scene.pickables().count()
        );

        Ok(Running {
            window,
            gpu,
            renderer,
            picking,
            scene,
            input: Input::new(),
            app,
            start_time: Instant::now(),
            last_frame: Instant::now(),
        })
    }

    /// Finalizes the app, then the picking buffer. Safe to call repeatedly.
    fn shutdown(&mut self) {
        if !matches!(self, Runner::Running(_)) {
            return;
        }
        if let Runner::Running(mut running) = std::mem::replace(self, Runner::Exited) {
            running.app.finalize();
            if let Some(picking) = running.picking.as_mut() {
                picking.finalize();
            }
            log::info!("shut down");
        }
    }
}

impl<A> Running<A> {
    fn render(&mut self) {
        let output = match self.gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("surface lost or outdated, reconfiguring");
                self.gpu.reconfigure();
                return;
            }
            Err(e) => {
                log::warn!("skipping frame: {e}");
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        if let Some(picking) = &self.picking {
            self.renderer.render_picking(
                &self.gpu.device,
                &self.gpu.queue,
                &mut encoder,
                &self.scene,
                picking,
            );
        }
        self.renderer.render_lit(
            &self.gpu.device,
            &self.gpu.queue,
            &mut encoder,
            &view,
            (self.gpu.width(), self.gpu.height()),
            &self.scene,
        );

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        self.window.pre_present_notify();
        output.present();
    }
}

impl<A: BaseApp> ApplicationHandler for Runner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Runner::Pending { config } = self else {
            return;
        };
        *self = match Self::start(config, event_loop) {
            Ok(running) => Runner::Running(Box::new(running)),
            Err(e) => {
                log::error!("{e}");
                event_loop.exit();
                Runner::Failed(e)
            }
        };
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if matches!(event, WindowEvent::CloseRequested) {
            self.shutdown();
            event_loop.exit();
            return;
        }

        let Runner::Running(running) = self else {
            return;
        };
        let running = &mut **running;

        running.input.handle_event(&event);

        match event {
            WindowEvent::Resized(size) => {
                running.gpu.resize(size.width, size.height);
                if size.width > 0 && size.height > 0 {
                    if let Some(picking) = running.picking.as_mut() {
                        picking.resize(size.width, size.height);
                    }
                }
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                let picked = running.picking.as_ref().and_then(|picking| {
                    let (_, height) = picking.size();
                    let (x, y) = window_to_pick_coords(running.input.mouse_position(), height);
                    picking.pick(x, y)
                });
                log::debug!("click picked {picked:?}");
                running.app.on_pick(picked, &mut running.scene);
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let time = running.start_time.elapsed().as_secs_f32();
                let dt = now.duration_since(running.last_frame).as_secs_f32();
                running.last_frame = now;

                let mut frame = Frame {
                    gpu: &running.gpu,
                    scene: &mut running.scene,
                    input: &running.input,
                    time,
                    dt,
                };
                running.app.update(&mut frame);

                running.render();

                running.input.begin_frame();
                running.window.request_redraw();
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}
