use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use glam::Vec2;
use log::info;
use pollster::block_on;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{DeviceEvent, ElementState, Event, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::{KeyCode as WinitKey, PhysicalKey};
use winit::platform::run_on_demand::EventLoopExtRunOnDemand;
use winit::window::{CursorGrabMode, WindowBuilder};

use crate::camera::{FlyCamera, Movement};
use crate::input::{InputState, KeyCode, NamedKey};
use crate::render::{CameraParams, Renderer};
use crate::scene::Scene;

/// Scale applied to pixel-based scroll deltas so trackpads behave like
/// scroll wheels.
const PIXELS_PER_SCROLL_LINE: f32 = 20.0;

/// Opens a window and runs the render loop until the user quits.
///
/// Meshes referenced by the scene load lazily from `asset_root`.
pub fn run_interactive(scene: Scene, asset_root: PathBuf) -> Result<()> {
    // The windowing backend panics on displayless machines; capture that
    // and surface it as a WindowInitError so the caller can fall back.
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let mut event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;

    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Atrium")
            .with_inner_size(LogicalSize::new(1280.0, 720.0))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    // A grabbed, hidden cursor gives continuous mouse-look; not every
    // platform supports both grab modes.
    let grabbed = window
        .set_cursor_grab(CursorGrabMode::Confined)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
        .is_ok();
    if grabbed {
        window.set_cursor_visible(false);
    }

    let renderer = block_on(Renderer::new(Arc::clone(&window), asset_root))?;
    let mut app = App {
        renderer,
        scene,
        camera: FlyCamera::default(),
        input: InputState::new(),
        last_frame: Instant::now(),
        last_error: None,
    };

    event_loop.run_on_demand(|event, target| {
        target.set_control_flow(ControlFlow::Poll);
        if let Err(err) = app.process_event(&event, target) {
            app.last_error = Some(err);
            target.exit();
        }
    })?;

    if let Some(err) = app.last_error {
        return Err(err);
    }
    Ok(())
}

struct App {
    renderer: Renderer,
    scene: Scene,
    camera: FlyCamera,
    input: InputState,
    last_frame: Instant,
    last_error: Option<anyhow::Error>,
}

impl App {
    fn process_event(
        &mut self,
        event: &Event<()>,
        target: &EventLoopWindowTarget<()>,
    ) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } if *window_id == self.renderer.window_id() => {
                match event {
                    WindowEvent::CloseRequested => target.exit(),
                    WindowEvent::Resized(size) => self.renderer.resize(*size),
                    WindowEvent::KeyboardInput { event, .. } => {
                        self.handle_keyboard(event, target);
                    }
                    WindowEvent::MouseWheel { delta, .. } => {
                        self.input.add_scroll(scroll_lines(*delta));
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        self.input
                            .set_cursor_position(Vec2::new(position.x as f32, position.y as f32));
                    }
                    WindowEvent::RedrawRequested => self.redraw()?,
                    _ => {}
                }
            }
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta },
                ..
            } => {
                self.input
                    .add_mouse_delta(Vec2::new(delta.0 as f32, delta.1 as f32));
            }
            Event::AboutToWait => self.renderer.window().request_redraw(),
            _ => {}
        }
        Ok(())
    }

    fn handle_keyboard(&mut self, event: &KeyEvent, target: &EventLoopWindowTarget<()>) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        if code == WinitKey::Escape && event.state == ElementState::Pressed {
            target.exit();
            return;
        }
        let Some(key) = map_key(code) else {
            return;
        };
        match event.state {
            ElementState::Pressed => self.input.set_key_down(key),
            ElementState::Released => self.input.set_key_up(key),
        }
    }

    /// One frame: advance time, apply input, move the light, draw.
    fn redraw(&mut self) -> Result<()> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.apply_input(dt);
        self.scene.lights.advance(dt);

        let camera = CameraParams {
            view_proj: self.camera.projection_matrix(self.renderer.aspect())
                * self.camera.view_matrix(),
            position: self.camera.position,
        };
        self.renderer.update_globals(&camera, &self.scene.lights);

        if let Err(err) = self.renderer.render(&self.scene) {
            match err {
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                    let size = self.renderer.window().inner_size();
                    self.renderer.resize(size);
                }
                wgpu::SurfaceError::OutOfMemory => {
                    return Err(anyhow!("GPU is out of memory"));
                }
                wgpu::SurfaceError::Timeout => {
                    info!("Surface timeout; retrying next frame");
                }
                wgpu::SurfaceError::Other => {
                    return Err(anyhow!("surface error"));
                }
            }
        }
        Ok(())
    }

    fn apply_input(&mut self, dt: f32) {
        const BINDINGS: [(char, Movement); 4] = [
            ('W', Movement::Forward),
            ('S', Movement::Backward),
            ('A', Movement::Left),
            ('D', Movement::Right),
        ];
        for (key, movement) in BINDINGS {
            if self.input.is_character_down(key) {
                self.camera.process_keyboard(movement, dt);
            }
        }

        let delta = self.input.take_mouse_delta();
        if delta != Vec2::ZERO {
            self.camera.process_mouse(delta.x, delta.y);
        }
        let scroll = self.input.take_scroll();
        if scroll != 0.0 {
            self.camera.process_scroll(scroll);
        }
    }
}

fn scroll_lines(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, lines) => lines,
        MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => {
            y as f32 / PIXELS_PER_SCROLL_LINE
        }
    }
}

fn map_key(code: WinitKey) -> Option<KeyCode> {
    Some(match code {
        WinitKey::KeyW => KeyCode::Character('W'),
        WinitKey::KeyA => KeyCode::Character('A'),
        WinitKey::KeyS => KeyCode::Character('S'),
        WinitKey::KeyD => KeyCode::Character('D'),
        WinitKey::Space => KeyCode::Named(NamedKey::Space),
        WinitKey::ShiftLeft => KeyCode::Named(NamedKey::LeftShift),
        WinitKey::Escape => KeyCode::Named(NamedKey::Escape),
        _ => return None,
    })
}

/// Failure to bring up the event loop or window; callers fall back to
/// summary-only output when they see this.
#[derive(Debug)]
pub struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}
