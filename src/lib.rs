//! A small multi-pass renderer for a fixed night scene: a glass pavilion
//! with animated lights, a reflective exterior and a star cubemap, explored
//! with a free-flying camera.
//!
//! The scene logic is written against the [`device::RenderDevice`] surface
//! so it runs unchanged on the wgpu backend and on the recording device
//! used by the headless mode and the tests.

pub mod camera;
pub mod clock;
pub mod device;
pub mod lights;
pub mod mesh;
pub mod passes;
pub mod render;
pub mod session;
pub mod viewport;

pub use camera::{Camera, MoveKey, PointerButton};
pub use clock::FrameClock;
pub use device::{RenderDevice, TraceDevice, TraceEvent};
pub use lights::LightRig;
pub use passes::{FramePasses, FrameState};
pub use render::WgpuRenderer;
pub use session::{InputSink, Session, SessionKey};
pub use viewport::Viewport;
