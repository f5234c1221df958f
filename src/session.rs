use anyhow::Result;

use crate::camera::{Camera, MoveKey, PointerButton};
use crate::clock::FrameClock;
use crate::device::RenderDevice;
use crate::lights::LightRig;
use crate::passes::{FramePasses, FrameState};
use crate::viewport::Viewport;

/// Abstract keys the session reacts to. The host window loop owns the
/// mapping from physical keys to these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKey {
    Forward,
    Back,
    StrafeLeft,
    StrafeRight,
    Ascend,
    Descend,
    DirectionalOff,
    DirectionalOn,
}

/// Input capability of the running scene. The window loop talks to the
/// session only through this surface, so a host without a window (or a
/// test) can drive the same code path directly.
pub trait InputSink {
    fn pointer_moved(&mut self, x: f64, y: f64);
    fn pointer_button(&mut self, button: PointerButton, pressed: bool);
    fn key_pressed(&mut self, key: SessionKey);
    fn surface_resized(&mut self, width: u32, height: u32);
}

/// The live scene: camera, lights, clock, viewport and the pass schedule.
pub struct Session {
    camera: Camera,
    rig: LightRig,
    clock: FrameClock,
    viewport: Viewport,
    passes: FramePasses,
    // Delta of the most recent frame, reused to scale key movement.
    delta_seconds: f32,
}

impl Session {
    pub fn new<D: RenderDevice>(device: &mut D, width: u32, height: u32) -> Result<Self> {
        let rig = LightRig::night_pavilion();
        let passes = FramePasses::new(device, &rig)?;
        Ok(Self {
            camera: Camera::default(),
            rig,
            clock: FrameClock::new(),
            viewport: Viewport::new(width, height),
            passes,
            delta_seconds: 0.0,
        })
    }

    /// Advances the clock and draws one frame.
    pub fn render<D: RenderDevice>(&mut self, device: &mut D) -> Result<()> {
        self.delta_seconds = self.clock.tick();
        let frame = FrameState {
            view: self.camera.view_matrix(),
            projection: self.viewport.projection(self.camera.zoom()),
            eye: self.camera.position(),
            elapsed: self.clock.elapsed(),
        };
        self.passes.render(device, &frame, &self.rig)
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn lights(&self) -> &LightRig {
        &self.rig
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }
}

impl InputSink for Session {
    fn pointer_moved(&mut self, x: f64, y: f64) {
        self.camera.on_pointer_move(x, y);
    }

    fn pointer_button(&mut self, button: PointerButton, pressed: bool) {
        self.camera.on_pointer_button(button, pressed);
    }

    fn key_pressed(&mut self, key: SessionKey) {
        let movement = match key {
            SessionKey::Forward => Some(MoveKey::Forward),
            SessionKey::Back => Some(MoveKey::Back),
            SessionKey::StrafeLeft => Some(MoveKey::StrafeLeft),
            SessionKey::StrafeRight => Some(MoveKey::StrafeRight),
            SessionKey::Ascend => Some(MoveKey::Ascend),
            SessionKey::Descend => Some(MoveKey::Descend),
            SessionKey::DirectionalOff => {
                self.rig.set_directional_enabled(false);
                None
            }
            SessionKey::DirectionalOn => {
                self.rig.set_directional_enabled(true);
                None
            }
        };
        if let Some(movement) = movement {
            self.camera.on_key(movement, self.delta_seconds);
        }
    }

    fn surface_resized(&mut self, width: u32, height: u32) {
        self.viewport.resize(width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::TraceDevice;

    fn session(device: &mut TraceDevice) -> Session {
        Session::new(device, 1280, 720).unwrap()
    }

    #[test]
    fn directional_keys_toggle_the_fill_light() {
        let mut device = TraceDevice::new();
        let mut session = session(&mut device);
        assert!(session.lights().directional_enabled());
        session.key_pressed(SessionKey::DirectionalOff);
        assert!(!session.lights().directional_enabled());
        session.key_pressed(SessionKey::DirectionalOn);
        assert!(session.lights().directional_enabled());
    }

    #[test]
    fn resize_reaches_the_viewport() {
        let mut device = TraceDevice::new();
        let mut session = session(&mut device);
        session.surface_resized(640, 480);
        assert_eq!(session.viewport().size(), (640, 480));
    }

    #[test]
    fn pointer_events_reach_the_camera() {
        let mut device = TraceDevice::new();
        let mut session = session(&mut device);
        session.pointer_moved(100.0, 100.0);
        session.pointer_button(PointerButton::Primary, true);
        session.pointer_moved(140.0, 100.0);
        assert!((session.camera().yaw() - (-88.0)).abs() < 1e-4);
    }

    #[test]
    fn movement_scales_by_the_last_frame_delta() {
        let mut device = TraceDevice::new();
        let mut session = session(&mut device);
        // No frame rendered yet, so the stored delta is zero and movement
        // is a no-op.
        let before = session.camera().position();
        session.key_pressed(SessionKey::Forward);
        assert_eq!(session.camera().position(), before);

        session.render(&mut device).unwrap();
        session.key_pressed(SessionKey::Forward);
        assert!(session.camera().position().z <= before.z);
    }
}
