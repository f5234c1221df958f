use glam::Vec3;

use pavilion::device::{BlendMode, DepthCompare, ProgramId, TraceDevice, TraceEvent};
use pavilion::session::{InputSink, Session, SessionKey};

fn new_session(device: &mut TraceDevice) -> Session {
    Session::new(device, 1280, 720).expect("scene setup")
}

fn first_draw_index(device: &TraceDevice, program: ProgramId) -> usize {
    device
        .events()
        .iter()
        .position(|event| matches!(event, TraceEvent::Draw { program: p, .. } if *p == program))
        .expect("program drew nothing")
}

#[test]
fn passes_run_in_fixed_order() {
    let mut device = TraceDevice::new();
    let mut session = new_session(&mut device);
    device.clear_events();
    session.render(&mut device).unwrap();

    let lights = first_draw_index(&device, device.program_named("lights").unwrap());
    let main = first_draw_index(&device, device.program_named("main").unwrap());
    let exterior = first_draw_index(&device, device.program_named("exterior").unwrap());
    let skybox = first_draw_index(&device, device.program_named("skybox").unwrap());

    assert!(lights < main);
    assert!(main < exterior);
    assert!(exterior < skybox);
}

#[test]
fn depth_function_is_restored_after_the_skybox() {
    let mut device = TraceDevice::new();
    let mut session = new_session(&mut device);
    device.clear_events();
    session.render(&mut device).unwrap();

    assert_eq!(device.depth_compare(), DepthCompare::Less);

    let skybox = device.program_named("skybox").unwrap();
    let skybox_draw = first_draw_index(&device, skybox);
    let widened = device.events()[..skybox_draw]
        .iter()
        .rposition(|event| {
            matches!(event, TraceEvent::SetDepthCompare(DepthCompare::LessOrEqual))
        })
        .expect("skybox ran without widening the depth test");
    let restored = device.events()[skybox_draw..]
        .iter()
        .position(|event| matches!(event, TraceEvent::SetDepthCompare(DepthCompare::Less)));
    assert!(widened < skybox_draw);
    assert!(restored.is_some());
}

#[test]
fn main_pass_blend_modes_follow_the_category_order() {
    let mut device = TraceDevice::new();
    let mut session = new_session(&mut device);
    device.clear_events();
    session.render(&mut device).unwrap();

    let blends: Vec<BlendMode> = device
        .events()
        .iter()
        .filter_map(|event| match event {
            TraceEvent::SetBlend(mode) => Some(*mode),
            _ => None,
        })
        .collect();
    assert_eq!(
        blends,
        vec![
            BlendMode::Opaque,
            BlendMode::ScreenFilter,
            BlendMode::AlphaOver
        ]
    );
}

#[test]
fn skybox_view_carries_no_translation() {
    let mut device = TraceDevice::new();
    let mut session = new_session(&mut device);

    // Wander off-origin first so a leaked translation would show.
    session.render(&mut device).unwrap();
    session.key_pressed(SessionKey::Forward);
    session.key_pressed(SessionKey::StrafeRight);

    device.clear_events();
    session.render(&mut device).unwrap();

    let skybox = device.program_named("skybox").unwrap();
    let view = device
        .events()
        .iter()
        .find_map(|event| match event {
            TraceEvent::SetMat4 {
                program,
                name,
                value,
            } if *program == skybox && name == "view_matrix" => Some(*value),
            _ => None,
        })
        .expect("skybox view was not uploaded");
    assert_eq!(view.w_axis.x, 0.0);
    assert_eq!(view.w_axis.y, 0.0);
    assert_eq!(view.w_axis.z, 0.0);
}

#[test]
fn light_uniforms_are_uploaded_every_frame() {
    let mut device = TraceDevice::new();
    let mut session = new_session(&mut device);
    session.render(&mut device).unwrap();

    device.clear_events();
    session.render(&mut device).unwrap();

    let main = device.program_named("main").unwrap();
    for name in [
        "point_lights[0].diffuse",
        "point_lights[1].diffuse",
        "spot_lights[4].diffuse",
        "dir_light.diffuse",
    ] {
        assert!(
            device.events().iter().any(|event| matches!(
                event,
                TraceEvent::SetVec3 { program, name: n, .. } if *program == main && n == name
            )),
            "{name} was not re-uploaded"
        );
    }
}

#[test]
fn disabled_directional_light_uploads_zeroes() {
    let mut device = TraceDevice::new();
    let mut session = new_session(&mut device);
    session.key_pressed(SessionKey::DirectionalOff);
    device.clear_events();
    session.render(&mut device).unwrap();

    let main = device.program_named("main").unwrap();
    let diffuse = device
        .events()
        .iter()
        .find_map(|event| match event {
            TraceEvent::SetVec3 {
                program,
                name,
                value,
            } if *program == main && name == "dir_light.diffuse" => Some(*value),
            _ => None,
        })
        .expect("directional diffuse was dropped instead of zeroed");
    assert_eq!(diffuse, Vec3::ZERO);
}

#[test]
fn bulbs_track_their_emitters() {
    let mut device = TraceDevice::new();
    let mut session = new_session(&mut device);
    device.clear_events();
    session.render(&mut device).unwrap();

    let lights = device.program_named("lights").unwrap();
    let bulbs: Vec<&str> = device
        .events()
        .iter()
        .filter_map(|event| match event {
            TraceEvent::Draw { program, mesh } if *program == lights => {
                Some(device.mesh_name(*mesh))
            }
            _ => None,
        })
        .collect();
    // Two point-light spheres, four ceiling cubes; the screen spot has none.
    assert_eq!(bulbs.iter().filter(|name| **name == "sphere").count(), 2);
    assert_eq!(bulbs.iter().filter(|name| **name == "cube").count(), 4);
    assert_eq!(bulbs.len(), 6);
}

#[test]
fn every_frame_is_bracketed() {
    let mut device = TraceDevice::new();
    let mut session = new_session(&mut device);
    device.clear_events();
    session.render(&mut device).unwrap();
    session.render(&mut device).unwrap();

    let begins = device
        .events()
        .iter()
        .filter(|event| matches!(event, TraceEvent::BeginFrame))
        .count();
    let ends = device
        .events()
        .iter()
        .filter(|event| matches!(event, TraceEvent::EndFrame))
        .count();
    assert_eq!(begins, 2);
    assert_eq!(ends, 2);
}
