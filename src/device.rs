use std::collections::HashSet;

use anyhow::{anyhow, Result};
use glam::{Mat4, Vec3};

use crate::mesh::{self, MeshData};

/// Handle to a linked shading program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub usize);

/// Handle to an uploaded mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(pub usize);

/// Handle to an uploaded texture or cubemap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

/// Resolved uniform slot within a program.
///
/// The unresolved sentinel mirrors the graphics-API convention: uploads to
/// it are silently dropped, which is not an application error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(i32);

impl UniformLocation {
    pub const UNRESOLVED: Self = Self(-1);

    pub fn new(slot: i32) -> Self {
        Self(slot)
    }

    pub fn is_resolved(self) -> bool {
        self.0 >= 0
    }

    pub fn slot(self) -> i32 {
        self.0
    }
}

/// Blend state selected per object category inside the main pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Source replaces destination.
    Opaque,
    /// Constant-color source scaled by destination color; used by the
    /// translucent projection screen.
    ScreenFilter,
    /// Standard source-alpha over.
    AlphaOver,
}

/// Depth test function; the skybox pass flips to `LessOrEqual` so its far
/// plane fragments survive, then restores `Less`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthCompare {
    Less,
    LessOrEqual,
}

impl Default for DepthCompare {
    fn default() -> Self {
        DepthCompare::Less
    }
}

/// The collaborator surface the pass scheduler draws through: program and
/// uniform management, mesh and texture upload, and immediate-style frame
/// state. Implemented by the wgpu renderer and by [`TraceDevice`].
pub trait RenderDevice {
    /// Creates one of the built-in shading programs by name
    /// ("main", "lights", "exterior", "skybox"). Unknown names are fatal.
    fn create_program(&mut self, name: &str) -> Result<ProgramId>;

    /// Resolves a uniform by the `<array>[<index>].<field>` naming
    /// contract; returns [`UniformLocation::UNRESOLVED`] when the program
    /// does not expose the name. Called once at startup per name.
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> UniformLocation;

    /// Loads an OBJ file and returns its groups in file order.
    fn load_meshes(&mut self, path: &str) -> Result<Vec<MeshId>>;

    fn create_cube(&mut self) -> MeshId;
    fn create_sphere(&mut self) -> MeshId;

    /// Diffuse texture of a loaded mesh group, if its material had one.
    fn mesh_texture(&self, mesh: MeshId) -> Option<TextureId>;

    /// Loads a 2D texture; decode or IO failure logs a diagnostic and
    /// yields a placeholder handle, never an error.
    fn load_texture_2d(&mut self, path: &str) -> TextureId;

    /// Loads a cubemap from six faces ordered {+X,-X,+Y,-Y,+Z,-Z}; same
    /// fallback policy as [`Self::load_texture_2d`].
    fn load_cubemap(&mut self, faces: &[String; 6]) -> TextureId;

    fn begin_frame(&mut self);
    fn use_program(&mut self, program: ProgramId);
    fn set_mat4(&mut self, location: UniformLocation, value: Mat4);
    fn set_vec3(&mut self, location: UniformLocation, value: Vec3);
    fn set_f32(&mut self, location: UniformLocation, value: f32);
    fn set_i32(&mut self, location: UniformLocation, value: i32);
    fn bind_texture(&mut self, unit: u32, texture: TextureId);
    fn bind_cubemap(&mut self, unit: u32, texture: TextureId);
    fn set_blend(&mut self, mode: BlendMode);
    fn set_depth_compare(&mut self, compare: DepthCompare);
    fn draw(&mut self, mesh: MeshId);
    fn end_frame(&mut self) -> Result<()>;
}

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    BeginFrame,
    EndFrame,
    UseProgram(ProgramId),
    SetMat4 {
        program: ProgramId,
        name: String,
        value: Mat4,
    },
    SetVec3 {
        program: ProgramId,
        name: String,
        value: Vec3,
    },
    SetF32 {
        program: ProgramId,
        name: String,
        value: f32,
    },
    SetI32 {
        program: ProgramId,
        name: String,
        value: i32,
    },
    BindTexture {
        unit: u32,
        texture: TextureId,
    },
    BindCubemap {
        unit: u32,
        texture: TextureId,
    },
    SetBlend(BlendMode),
    SetDepthCompare(DepthCompare),
    Draw {
        program: ProgramId,
        mesh: MeshId,
    },
}

#[derive(Debug)]
struct TraceProgram {
    name: String,
    uniforms: Vec<String>,
}

/// Recording implementation of [`RenderDevice`].
///
/// Backs the headless mode of the binary and the integration tests: meshes
/// are parsed from disk for real (missing assets stay fatal), while every
/// frame call is appended to an event log that can be inspected afterward.
#[derive(Debug, Default)]
pub struct TraceDevice {
    programs: Vec<TraceProgram>,
    meshes: Vec<MeshData>,
    mesh_textures: Vec<Option<TextureId>>,
    texture_names: Vec<String>,
    unresolved: HashSet<String>,
    current_program: Option<ProgramId>,
    depth_compare: DepthCompare,
    events: Vec<TraceEvent>,
}

const PROGRAM_NAMES: [&str; 4] = ["main", "lights", "exterior", "skybox"];

impl TraceDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks uniform names the device should refuse to resolve, to exercise
    /// the tolerated-unresolved-location contract.
    pub fn refuse_uniforms(&mut self, names: &[&str]) {
        self.unresolved.extend(names.iter().map(|s| s.to_string()));
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn program_named(&self, name: &str) -> Option<ProgramId> {
        self.programs
            .iter()
            .position(|p| p.name == name)
            .map(ProgramId)
    }

    pub fn mesh_name(&self, mesh: MeshId) -> &str {
        &self.meshes[mesh.0].name
    }

    /// Current depth function; `Less` again once a frame fully unwinds.
    pub fn depth_compare(&self) -> DepthCompare {
        self.depth_compare
    }

    pub fn draw_count(&self, program: ProgramId) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, TraceEvent::Draw { program: p, .. } if *p == program))
            .count()
    }

    fn push_mesh(&mut self, data: MeshData, texture: Option<TextureId>) -> MeshId {
        self.meshes.push(data);
        self.mesh_textures.push(texture);
        MeshId(self.meshes.len() - 1)
    }

    fn record_texture(&mut self, name: String) -> TextureId {
        self.texture_names.push(name);
        TextureId(self.texture_names.len() - 1)
    }

    fn uniform_name(&self, program: ProgramId, location: UniformLocation) -> Option<String> {
        if !location.is_resolved() {
            return None;
        }
        self.programs
            .get(program.0)
            .and_then(|p| p.uniforms.get(location.slot() as usize))
            .cloned()
    }

    fn current(&self) -> ProgramId {
        self.current_program.unwrap_or(ProgramId(0))
    }
}

impl RenderDevice for TraceDevice {
    fn create_program(&mut self, name: &str) -> Result<ProgramId> {
        if !PROGRAM_NAMES.contains(&name) {
            return Err(anyhow!("unknown shading program {name}"));
        }
        self.programs.push(TraceProgram {
            name: name.to_string(),
            uniforms: Vec::new(),
        });
        Ok(ProgramId(self.programs.len() - 1))
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> UniformLocation {
        if self.unresolved.contains(name) {
            return UniformLocation::UNRESOLVED;
        }
        let uniforms = &mut self.programs[program.0].uniforms;
        if let Some(slot) = uniforms.iter().position(|existing| existing == name) {
            return UniformLocation::new(slot as i32);
        }
        uniforms.push(name.to_string());
        UniformLocation::new(uniforms.len() as i32 - 1)
    }

    fn load_meshes(&mut self, path: &str) -> Result<Vec<MeshId>> {
        let groups = mesh::load_obj(path)?;
        let mut ids = Vec::with_capacity(groups.len());
        for group in groups {
            let texture = group
                .texture
                .as_ref()
                .map(|p| p.display().to_string())
                .map(|name| self.record_texture(name));
            ids.push(self.push_mesh(group, texture));
        }
        Ok(ids)
    }

    fn create_cube(&mut self) -> MeshId {
        self.push_mesh(mesh::cube(), None)
    }

    fn create_sphere(&mut self) -> MeshId {
        self.push_mesh(mesh::sphere(), None)
    }

    fn mesh_texture(&self, mesh: MeshId) -> Option<TextureId> {
        self.mesh_textures[mesh.0]
    }

    fn load_texture_2d(&mut self, path: &str) -> TextureId {
        self.record_texture(path.to_string())
    }

    fn load_cubemap(&mut self, faces: &[String; 6]) -> TextureId {
        self.record_texture(format!("cubemap:{}", faces[0]))
    }

    fn begin_frame(&mut self) {
        self.events.push(TraceEvent::BeginFrame);
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
        self.events.push(TraceEvent::UseProgram(program));
    }

    fn set_mat4(&mut self, location: UniformLocation, value: Mat4) {
        let program = self.current();
        if let Some(name) = self.uniform_name(program, location) {
            self.events.push(TraceEvent::SetMat4 {
                program,
                name,
                value,
            });
        }
    }

    fn set_vec3(&mut self, location: UniformLocation, value: Vec3) {
        let program = self.current();
        if let Some(name) = self.uniform_name(program, location) {
            self.events.push(TraceEvent::SetVec3 {
                program,
                name,
                value,
            });
        }
    }

    fn set_f32(&mut self, location: UniformLocation, value: f32) {
        let program = self.current();
        if let Some(name) = self.uniform_name(program, location) {
            self.events.push(TraceEvent::SetF32 {
                program,
                name,
                value,
            });
        }
    }

    fn set_i32(&mut self, location: UniformLocation, value: i32) {
        let program = self.current();
        if let Some(name) = self.uniform_name(program, location) {
            self.events.push(TraceEvent::SetI32 {
                program,
                name,
                value,
            });
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.events.push(TraceEvent::BindTexture { unit, texture });
    }

    fn bind_cubemap(&mut self, unit: u32, texture: TextureId) {
        self.events.push(TraceEvent::BindCubemap { unit, texture });
    }

    fn set_blend(&mut self, mode: BlendMode) {
        self.events.push(TraceEvent::SetBlend(mode));
    }

    fn set_depth_compare(&mut self, compare: DepthCompare) {
        self.depth_compare = compare;
        self.events.push(TraceEvent::SetDepthCompare(compare));
    }

    fn draw(&mut self, mesh: MeshId) {
        let program = self.current();
        self.events.push(TraceEvent::Draw { program, mesh });
    }

    fn end_frame(&mut self) -> Result<()> {
        self.events.push(TraceEvent::EndFrame);
        Ok(())
    }
}
