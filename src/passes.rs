use anyhow::{Context, Result};
use glam::{Mat3, Mat4, Vec3};

use crate::device::{
    BlendMode, DepthCompare, MeshId, ProgramId, RenderDevice, TextureId, UniformLocation,
};
use crate::lights::LightRig;

/// Fixed object set of the scene. Paths are relative to the working
/// directory; there is no asset pipeline behind them.
pub const INTERIOR_OBJ: &str = "assets/interior.obj";
pub const WINDOWS_OBJ: &str = "assets/windows.obj";
pub const SCREEN_OBJ: &str = "assets/screen.obj";
pub const EXTERIOR_OBJ: &str = "assets/exterior.obj";

/// Night-sky cubemap faces ordered {+X,-X,+Y,-Y,+Z,-Z}.
pub const CUBEMAP_FACES: [&str; 6] = [
    "assets/cubemap/nightsky_rt.tga",
    "assets/cubemap/nightsky_lt.tga",
    "assets/cubemap/nightsky_up.tga",
    "assets/cubemap/nightsky_dn.tga",
    "assets/cubemap/nightsky_ft.tga",
    "assets/cubemap/nightsky_bk.tga",
];

const POINT_BULB_SCALE: f32 = 4.0;
const SPOT_BULB_SCALE: f32 = 0.2;
const MATERIAL_SHININESS: f32 = 1.0;

/// Camera and timing state consumed read-only by every pass.
#[derive(Debug, Clone, Copy)]
pub struct FrameState {
    pub view: Mat4,
    pub projection: Mat4,
    pub eye: Vec3,
    pub elapsed: f32,
}

#[derive(Debug, Clone, Copy)]
struct MatrixLocs {
    model: UniformLocation,
    view: UniformLocation,
    projection: UniformLocation,
}

impl MatrixLocs {
    fn resolve<D: RenderDevice>(device: &mut D, program: ProgramId) -> Self {
        Self {
            model: device.uniform_location(program, "model_matrix"),
            view: device.uniform_location(program, "view_matrix"),
            projection: device.uniform_location(program, "projection_matrix"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PointLightLocs {
    position: UniformLocation,
    constant: UniformLocation,
    linear: UniformLocation,
    quadratic: UniformLocation,
    ambient: UniformLocation,
    diffuse: UniformLocation,
    specular: UniformLocation,
}

impl PointLightLocs {
    fn resolve<D: RenderDevice>(device: &mut D, program: ProgramId, index: usize) -> Self {
        let field = |device: &mut D, name: &str| {
            device.uniform_location(program, &format!("point_lights[{index}].{name}"))
        };
        Self {
            position: field(device, "position"),
            constant: field(device, "constant"),
            linear: field(device, "linear"),
            quadratic: field(device, "quadratic"),
            ambient: field(device, "ambient"),
            diffuse: field(device, "diffuse"),
            specular: field(device, "specular"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SpotLightLocs {
    position: UniformLocation,
    direction: UniformLocation,
    cut_off: UniformLocation,
    outer_cut_off: UniformLocation,
    constant: UniformLocation,
    linear: UniformLocation,
    quadratic: UniformLocation,
    ambient: UniformLocation,
    diffuse: UniformLocation,
    specular: UniformLocation,
}

impl SpotLightLocs {
    fn resolve<D: RenderDevice>(device: &mut D, program: ProgramId, index: usize) -> Self {
        let field = |device: &mut D, name: &str| {
            device.uniform_location(program, &format!("spot_lights[{index}].{name}"))
        };
        Self {
            position: field(device, "position"),
            direction: field(device, "direction"),
            cut_off: field(device, "cut_off"),
            outer_cut_off: field(device, "outer_cut_off"),
            constant: field(device, "constant"),
            linear: field(device, "linear"),
            quadratic: field(device, "quadratic"),
            ambient: field(device, "ambient"),
            diffuse: field(device, "diffuse"),
            specular: field(device, "specular"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DirLightLocs {
    direction: UniformLocation,
    ambient: UniformLocation,
    diffuse: UniformLocation,
    specular: UniformLocation,
}

#[derive(Debug)]
struct MainProgram {
    id: ProgramId,
    matrices: MatrixLocs,
    eye_pos: UniformLocation,
    points: Vec<PointLightLocs>,
    spots: Vec<SpotLightLocs>,
    dir: DirLightLocs,
    material_diffuse: UniformLocation,
    material_shininess: UniformLocation,
    objects: Vec<MeshId>,
    screens: Vec<MeshId>,
    windows: Vec<MeshId>,
}

#[derive(Debug)]
struct LightsProgram {
    id: ProgramId,
    matrices: MatrixLocs,
    bulb_color: UniformLocation,
    sphere: MeshId,
    cube: MeshId,
}

#[derive(Debug)]
struct ExteriorProgram {
    id: ProgramId,
    matrices: MatrixLocs,
    eye_pos: UniformLocation,
    skybox: UniformLocation,
    meshes: Vec<MeshId>,
}

#[derive(Debug)]
struct SkyboxProgram {
    id: ProgramId,
    view: UniformLocation,
    projection: UniformLocation,
    skybox: UniformLocation,
    cube: MeshId,
    cubemap: TextureId,
}

/// The four-pass frame schedule.
///
/// Programs, uniform locations, meshes and the cubemap are resolved once at
/// startup; a failure there is fatal. Per frame the passes execute in fixed
/// order with every uniform re-uploaded from scratch, so the pipeline state
/// is identical given identical inputs.
#[derive(Debug)]
pub struct FramePasses {
    lights: LightsProgram,
    main: MainProgram,
    exterior: ExteriorProgram,
    skybox: SkyboxProgram,
}

impl FramePasses {
    pub fn new<D: RenderDevice>(device: &mut D, rig: &LightRig) -> Result<Self> {
        let main = Self::init_main(device, rig).context("main program setup failed")?;
        let lights = Self::init_lights(device).context("lights program setup failed")?;
        let exterior = Self::init_exterior(device).context("exterior program setup failed")?;
        let skybox = Self::init_skybox(device).context("skybox program setup failed")?;
        Ok(Self {
            lights,
            main,
            exterior,
            skybox,
        })
    }

    fn init_main<D: RenderDevice>(device: &mut D, rig: &LightRig) -> Result<MainProgram> {
        let id = device.create_program("main")?;
        let points = (0..rig.points().count())
            .map(|index| PointLightLocs::resolve(device, id, index))
            .collect();
        let spots = (0..rig.spots().count())
            .map(|index| SpotLightLocs::resolve(device, id, index))
            .collect();
        let dir = DirLightLocs {
            direction: device.uniform_location(id, "dir_light.direction"),
            ambient: device.uniform_location(id, "dir_light.ambient"),
            diffuse: device.uniform_location(id, "dir_light.diffuse"),
            specular: device.uniform_location(id, "dir_light.specular"),
        };
        Ok(MainProgram {
            matrices: MatrixLocs::resolve(device, id),
            eye_pos: device.uniform_location(id, "eye_pos"),
            points,
            spots,
            dir,
            material_diffuse: device.uniform_location(id, "material.diffuse"),
            material_shininess: device.uniform_location(id, "material.shininess"),
            objects: device.load_meshes(INTERIOR_OBJ)?,
            screens: device.load_meshes(SCREEN_OBJ)?,
            windows: device.load_meshes(WINDOWS_OBJ)?,
            id,
        })
    }

    fn init_lights<D: RenderDevice>(device: &mut D) -> Result<LightsProgram> {
        let id = device.create_program("lights")?;
        Ok(LightsProgram {
            matrices: MatrixLocs::resolve(device, id),
            bulb_color: device.uniform_location(id, "bulb_color"),
            sphere: device.create_sphere(),
            cube: device.create_cube(),
            id,
        })
    }

    fn init_exterior<D: RenderDevice>(device: &mut D) -> Result<ExteriorProgram> {
        let id = device.create_program("exterior")?;
        Ok(ExteriorProgram {
            matrices: MatrixLocs::resolve(device, id),
            eye_pos: device.uniform_location(id, "eye_pos"),
            skybox: device.uniform_location(id, "skybox"),
            meshes: device.load_meshes(EXTERIOR_OBJ)?,
            id,
        })
    }

    fn init_skybox<D: RenderDevice>(device: &mut D) -> Result<SkyboxProgram> {
        let id = device.create_program("skybox")?;
        let faces = CUBEMAP_FACES.map(String::from);
        Ok(SkyboxProgram {
            view: device.uniform_location(id, "view_matrix"),
            projection: device.uniform_location(id, "projection_matrix"),
            skybox: device.uniform_location(id, "skybox"),
            cube: device.create_cube(),
            cubemap: device.load_cubemap(&faces),
            id,
        })
    }

    /// Draws one complete frame: lights, main, exterior, skybox.
    pub fn render<D: RenderDevice>(
        &self,
        device: &mut D,
        frame: &FrameState,
        rig: &LightRig,
    ) -> Result<()> {
        device.begin_frame();
        self.lights_pass(device, frame, rig);
        self.main_pass(device, frame, rig);
        self.exterior_pass(device, frame);
        self.skybox_pass(device, frame);
        device.end_frame()
    }

    /// Small stand-in meshes at each emitter: spheres for point lights,
    /// cubes for the ceiling spots. The screen spot has no bulb.
    fn lights_pass<D: RenderDevice>(&self, device: &mut D, frame: &FrameState, rig: &LightRig) {
        let pass = &self.lights;
        device.use_program(pass.id);
        device.set_mat4(pass.matrices.projection, frame.projection);
        device.set_mat4(pass.matrices.view, frame.view);

        for light in rig.points() {
            device.set_vec3(pass.bulb_color, light.bulb_color(frame.elapsed));
            let model = Mat4::from_translation(light.position)
                * Mat4::from_scale(Vec3::splat(POINT_BULB_SCALE));
            device.set_mat4(pass.matrices.model, model);
            device.draw(pass.sphere);
        }

        for light in rig.spots() {
            let Some(color) = light.bulb_color() else {
                continue;
            };
            device.set_vec3(pass.bulb_color, color);
            let model = Mat4::from_translation(light.position)
                * Mat4::from_scale(Vec3::splat(SPOT_BULB_SCALE));
            device.set_mat4(pass.matrices.model, model);
            device.draw(pass.cube);
        }
    }

    fn main_pass<D: RenderDevice>(&self, device: &mut D, frame: &FrameState, rig: &LightRig) {
        let pass = &self.main;
        device.use_program(pass.id);
        device.set_mat4(pass.matrices.projection, frame.projection);
        device.set_mat4(pass.matrices.view, frame.view);
        device.set_vec3(pass.eye_pos, frame.eye);

        self.upload_lights(device, frame, rig);

        device.set_blend(BlendMode::Opaque);
        for &mesh in &pass.objects {
            self.bind_material(device, mesh);
            device.set_mat4(pass.matrices.model, Mat4::IDENTITY);
            device.draw(mesh);
        }

        device.set_blend(BlendMode::ScreenFilter);
        for &mesh in &pass.screens {
            self.bind_material(device, mesh);
            device.set_mat4(pass.matrices.model, Mat4::IDENTITY);
            device.draw(mesh);
        }

        device.set_blend(BlendMode::AlphaOver);
        for &mesh in &pass.windows {
            self.bind_material(device, mesh);
            device.set_mat4(pass.matrices.model, Mat4::IDENTITY);
            device.draw(mesh);
        }
    }

    /// All light parameters are re-uploaded every frame; nothing is cached
    /// across frames, including the zeroed triple of a disabled
    /// directional light.
    fn upload_lights<D: RenderDevice>(&self, device: &mut D, frame: &FrameState, rig: &LightRig) {
        let pass = &self.main;

        for (light, locs) in rig.points().zip(&pass.points) {
            let phong = light.phong(frame.elapsed);
            device.set_vec3(locs.position, light.position);
            device.set_f32(locs.constant, light.attenuation.constant);
            device.set_f32(locs.linear, light.attenuation.linear);
            device.set_f32(locs.quadratic, light.attenuation.quadratic);
            device.set_vec3(locs.ambient, phong.ambient);
            device.set_vec3(locs.diffuse, phong.diffuse);
            device.set_vec3(locs.specular, phong.specular);
        }

        if let Some(light) = rig.directional() {
            let phong = light.phong();
            device.set_vec3(pass.dir.direction, light.direction);
            device.set_vec3(pass.dir.ambient, phong.ambient);
            device.set_vec3(pass.dir.diffuse, phong.diffuse);
            device.set_vec3(pass.dir.specular, phong.specular);
        }

        for (light, locs) in rig.spots().zip(&pass.spots) {
            let phong = light.phong(frame.elapsed);
            device.set_vec3(locs.position, light.position);
            device.set_vec3(locs.direction, light.direction);
            device.set_f32(locs.cut_off, light.inner_cutoff_deg.to_radians().cos());
            device.set_f32(locs.outer_cut_off, light.outer_cutoff_deg.to_radians().cos());
            device.set_f32(locs.constant, light.attenuation.constant);
            device.set_f32(locs.linear, light.attenuation.linear);
            device.set_f32(locs.quadratic, light.attenuation.quadratic);
            device.set_vec3(locs.ambient, phong.ambient);
            device.set_vec3(locs.diffuse, phong.diffuse);
            device.set_vec3(locs.specular, phong.specular);
        }
    }

    fn bind_material<D: RenderDevice>(&self, device: &mut D, mesh: MeshId) {
        let pass = &self.main;
        device.set_i32(pass.material_diffuse, 0);
        if let Some(texture) = device.mesh_texture(mesh) {
            device.bind_texture(0, texture);
        }
        device.set_f32(pass.material_shininess, MATERIAL_SHININESS);
    }

    fn exterior_pass<D: RenderDevice>(&self, device: &mut D, frame: &FrameState) {
        let pass = &self.exterior;
        device.use_program(pass.id);
        device.set_mat4(pass.matrices.projection, frame.projection);
        device.set_mat4(pass.matrices.view, frame.view);
        device.set_vec3(pass.eye_pos, frame.eye);

        for &mesh in &pass.meshes {
            device.set_i32(pass.skybox, 0);
            device.bind_cubemap(0, self.skybox.cubemap);
            device.set_mat4(pass.matrices.model, Mat4::IDENTITY);
            device.draw(mesh);
        }
    }

    /// The depth function widens to less-or-equal so the skybox survives
    /// the depth test at the far plane, and the view loses its translation
    /// so the box stays centered on the camera. Both are restored/irrelevant
    /// by the end of the pass; the depth restore is mandatory.
    fn skybox_pass<D: RenderDevice>(&self, device: &mut D, frame: &FrameState) {
        let pass = &self.skybox;
        device.set_depth_compare(DepthCompare::LessOrEqual);
        device.use_program(pass.id);

        device.set_mat4(pass.projection, frame.projection);
        let rotation_only = Mat4::from_mat3(Mat3::from_mat4(frame.view));
        device.set_mat4(pass.view, rotation_only);

        device.set_i32(pass.skybox, 0);
        device.bind_cubemap(0, pass.cubemap);
        device.draw(pass.cube);

        device.set_depth_compare(DepthCompare::Less);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::TraceDevice;

    fn frame() -> FrameState {
        FrameState {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            eye: Vec3::new(0.0, 5.0, 40.0),
            elapsed: 0.0,
        }
    }

    #[test]
    fn startup_resolves_all_programs() {
        let mut device = TraceDevice::new();
        let rig = LightRig::night_pavilion();
        assert!(FramePasses::new(&mut device, &rig).is_ok());
        for name in ["main", "lights", "exterior", "skybox"] {
            assert!(device.program_named(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn unresolved_locations_are_tolerated() {
        let mut device = TraceDevice::new();
        device.refuse_uniforms(&["eye_pos", "spot_lights[4].outer_cut_off", "material.diffuse"]);
        let rig = LightRig::night_pavilion();
        let passes = FramePasses::new(&mut device, &rig).unwrap();
        // Uploads to the refused locations are dropped, not errors.
        passes.render(&mut device, &frame(), &rig).unwrap();
    }

    #[test]
    fn bulb_pass_draws_two_spheres_and_four_cubes() {
        let mut device = TraceDevice::new();
        let rig = LightRig::night_pavilion();
        let passes = FramePasses::new(&mut device, &rig).unwrap();
        passes.render(&mut device, &frame(), &rig).unwrap();

        let lights = device.program_named("lights").unwrap();
        let draws: Vec<String> = device
            .events()
            .iter()
            .filter_map(|event| match event {
                crate::device::TraceEvent::Draw { program, mesh } if *program == lights => {
                    Some(device.mesh_name(*mesh).to_string())
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            draws.iter().filter(|name| name.as_str() == "sphere").count(),
            2
        );
        assert_eq!(
            draws.iter().filter(|name| name.as_str() == "cube").count(),
            4
        );
    }
}
