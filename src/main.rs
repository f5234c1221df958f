use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use pollster::block_on;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::run_on_demand::EventLoopExtRunOnDemand;
use winit::window::WindowBuilder;

use pavilion::{
    InputSink, PointerButton, Session, SessionKey, TraceDevice, WgpuRenderer,
};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    if options.headless {
        return run_headless(options.frames);
    }
    match run_interactive() {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --headless mode (set DISPLAY or install X11 libs to enable rendering)."
                );
                run_headless(options.frames)
            } else {
                Err(err)
            }
        }
    }
}

/// Drives the scene against the recording device and prints per-frame draw
/// counts, so the frame schedule can be inspected without a GPU.
fn run_headless(frames: u32) -> Result<()> {
    let mut device = TraceDevice::new();
    let mut session = Session::new(&mut device, 1280, 720)?;
    for frame in 1..=frames {
        device.clear_events();
        session.render(&mut device)?;
        let count = |name: &str| {
            device
                .program_named(name)
                .map_or(0, |program| device.draw_count(program))
        };
        println!(
            "frame {frame}: lights={} main={} exterior={} skybox={}",
            count("lights"),
            count("main"),
            count("exterior"),
            count("skybox"),
        );
    }
    println!("Rendered {frames} frame(s) without a window");
    Ok(())
}

fn run_interactive() -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let mut event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;

    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Night Pavilion")
            .with_inner_size(LogicalSize::new(1280.0, 720.0))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let mut renderer = block_on(WgpuRenderer::new(Arc::clone(&window)))
        .map_err(|err| WindowInitError::from_error("renderer", err))?;
    let size = window.inner_size();
    let session = Session::new(&mut renderer, size.width, size.height)?;

    let mut app = AppState {
        renderer,
        session,
        last_error: None,
    };

    event_loop.run_on_demand(|event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        if let Err(err) = app.process_event(event, elwt) {
            app.last_error = Some(err);
            elwt.exit();
        }
    })?;

    if let Some(err) = app.last_error {
        return Err(err);
    }

    Ok(())
}

struct AppState {
    renderer: WgpuRenderer,
    session: Session,
    last_error: Option<anyhow::Error>,
}

impl AppState {
    fn process_event(
        &mut self,
        event: Event<()>,
        elwt: &EventLoopWindowTarget<()>,
    ) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } if window_id == self.renderer.window_id() => {
                match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::Resized(size) => {
                        self.renderer.resize(size);
                        self.session.surface_resized(size.width, size.height);
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.state == ElementState::Pressed {
                            if let PhysicalKey::Code(code) = event.physical_key {
                                if let Some(key) = map_key(code) {
                                    self.session.key_pressed(key);
                                }
                            }
                        }
                    }
                    WindowEvent::MouseInput { state, button, .. } => {
                        if let Some(button) = map_button(button) {
                            self.session
                                .pointer_button(button, state == ElementState::Pressed);
                        }
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        self.session.pointer_moved(position.x, position.y);
                    }
                    WindowEvent::RedrawRequested => {
                        self.session.render(&mut self.renderer)?;
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => self.renderer.window().request_redraw(),
            _ => {}
        }
        Ok(())
    }
}

fn map_key(code: KeyCode) -> Option<SessionKey> {
    Some(match code {
        KeyCode::KeyW => SessionKey::Forward,
        KeyCode::KeyS => SessionKey::Back,
        KeyCode::KeyA => SessionKey::StrafeLeft,
        KeyCode::KeyD => SessionKey::StrafeRight,
        KeyCode::ArrowUp => SessionKey::Ascend,
        KeyCode::ArrowDown => SessionKey::Descend,
        KeyCode::Digit1 => SessionKey::DirectionalOff,
        KeyCode::Digit2 => SessionKey::DirectionalOn,
        _ => return None,
    })
}

fn map_button(button: MouseButton) -> Option<PointerButton> {
    match button {
        MouseButton::Left => Some(PointerButton::Primary),
        MouseButton::Right => Some(PointerButton::Secondary),
        _ => None,
    }
}

#[derive(Debug)]
struct WindowInitError {
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

struct CliOptions {
    headless: bool,
    frames: u32,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut headless = false;
        let mut frames = 3;
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--headless" => headless = true,
                "--frames" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--frames expects a number"))?;
                    frames = value
                        .parse()
                        .map_err(|_| anyhow!("invalid frame count: {value}"))?;
                }
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Usage: pavilion [--headless] [--frames N]"
                    ));
                }
            }
        }
        Ok(Self { headless, frames })
    }
}
