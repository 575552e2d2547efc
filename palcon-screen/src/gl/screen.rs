use glow::HasContext;
use tracing::debug;

use crate::{
    GlslVersion,
    error::Error,
    gl::{context::GlState, program::ShaderProgram},
    handle::{BufferId, SlotTable, TextureId},
    palette::Palette,
    screen::{
        DrawMode, FLOATS_PER_VERTEX, FgColor, Screen, TexFilter, UsageHint,
        validate_vertex_count,
    },
};

/// Texture unit the palette texture stays bound to.
const PALETTE_UNIT: u32 = glow::TEXTURE0;
const PALETTE_UNIT_INDEX: i32 = 0;

/// Steady-state active texture unit; drawing-texture binds land here.
const DRAW_UNIT: u32 = glow::TEXTURE1;
const DRAW_UNIT_INDEX: i32 = 1;

/// Vertex attribute slot carrying the packed x/y/u/v coordinate.
const ATTRIB_COORD: u32 = 0;

const VERTEX_STRIDE: i32 = FLOATS_PER_VERTEX as i32 * size_of::<f32>() as i32;

#[derive(Debug)]
struct GlBuffer {
    buffer: glow::Buffer,
    /// Floats uploaded by the last update; draws may not read past it.
    len: usize,
}

#[derive(Debug)]
struct GlTexture {
    texture: glow::Texture,
    width: u32,
    height: u32,
    filter: TexFilter,
}

#[derive(Debug)]
struct ModeProgram {
    program: ShaderProgram,
    /// Foreground uniform; absent in the copy program.
    color_loc: Option<glow::UniformLocation>,
}

impl ModeProgram {
    fn create(
        gl: &glow::Context,
        vertex_source: &str,
        fragment_source: &str,
        has_foreground: bool,
    ) -> Result<Self, Error> {
        let program = ShaderProgram::create(gl, vertex_source, fragment_source)?;
        program.use_program(gl);

        // pin the samplers once; they never move
        let palette_loc = program.uniform_location(gl, "u_palette")?;
        let tex_loc = program.uniform_location(gl, "u_tex")?;
        unsafe {
            gl.uniform_1_i32(Some(&palette_loc), PALETTE_UNIT_INDEX);
            gl.uniform_1_i32(Some(&tex_loc), DRAW_UNIT_INDEX);
        }

        let color_loc = if has_foreground {
            Some(program.uniform_location(gl, "u_color")?)
        } else {
            None
        };

        Ok(Self { program, color_loc })
    }
}

/// The three precompiled programs, one per draw mode, sharing a vertex stage.
#[derive(Debug)]
struct ShaderSet {
    copy: ModeProgram,
    solid: ModeProgram,
    solid_transparent: ModeProgram,
}

impl ShaderSet {
    const VERTEX_GLSL: &'static str = include_str!("../shaders/screen.vert");
    const COPY_GLSL: &'static str = include_str!("../shaders/copy.frag");
    const SOLID_GLSL: &'static str = include_str!("../shaders/solid.frag");
    const SOLID_TRANSPARENT_GLSL: &'static str =
        include_str!("../shaders/solid_transparent.frag");

    fn new(gl: &glow::Context, glsl_version: GlslVersion) -> Result<Self, Error> {
        let vertex_source =
            format!("{}{}", glsl_version.vertex_preamble(), Self::VERTEX_GLSL);
        let fragment = |body: &str| format!("{}{}", glsl_version.fragment_preamble(), body);

        Ok(Self {
            copy: ModeProgram::create(gl, &vertex_source, &fragment(Self::COPY_GLSL), false)?,
            solid: ModeProgram::create(gl, &vertex_source, &fragment(Self::SOLID_GLSL), true)?,
            solid_transparent: ModeProgram::create(
                gl,
                &vertex_source,
                &fragment(Self::SOLID_TRANSPARENT_GLSL),
                true,
            )?,
        })
    }

    fn for_mode(&self, mode: DrawMode) -> &ModeProgram {
        match mode {
            DrawMode::Copy => &self.copy,
            DrawMode::Solid => &self.solid,
            DrawMode::SolidTransparent => &self.solid_transparent,
        }
    }

    fn delete(&self, gl: &glow::Context) {
        self.copy.program.delete(gl);
        self.solid.program.delete(gl);
        self.solid_transparent.program.delete(gl);
    }
}

/// GL-backed implementation of the screen contract.
///
/// Owns its `glow::Context` and every GPU resource the sandboxed module
/// allocates through it. Construction performs the one-time setup: unpack
/// alignment, palette texture, shader compilation, texture-unit selection.
#[derive(Debug)]
#[must_use = "call `delete()` before dropping to avoid GPU resource leaks"]
pub struct GlScreen {
    gl: glow::Context,
    state: GlState,
    vao: glow::VertexArray,
    palette_tex: glow::Texture,
    programs: ShaderSet,
    buffers: SlotTable<GlBuffer>,
    textures: SlotTable<GlTexture>,
    palette: Palette,
    fg: FgColor,
    width: u32,
    height: u32,
}

impl GlScreen {
    /// One-time screen setup on an already-current GL context.
    ///
    /// # Errors
    /// Shader compile/link failures are fatal and carry the driver's
    /// diagnostic log; resource creation may also fail.
    pub fn new(
        gl: glow::Context,
        width: u32,
        height: u32,
        glsl_version: GlslVersion,
    ) -> Result<Self, Error> {
        let mut state = GlState::new();
        let palette = Palette::new();

        // index textures are tightly packed single-channel rows
        unsafe { gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1) };

        // the palette texture parks on its own unit for the screen's lifetime
        state.active_texture(&gl, PALETTE_UNIT);
        let palette_tex =
            unsafe { gl.create_texture() }.map_err(Error::texture_creation_failed)?;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(palette_tex));
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::NEAREST as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::NEAREST as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
        }
        upload_palette_texture(&gl, palette.data());

        let programs = ShaderSet::new(&gl, glsl_version)?;

        let vao =
            unsafe { gl.create_vertex_array() }.map_err(Error::vertex_array_creation_failed)?;
        unsafe {
            gl.bind_vertex_array(Some(vao));
            gl.enable_vertex_attrib_array(ATTRIB_COORD);
            gl.bind_vertex_array(None);
        }

        state.viewport(&gl, 0, 0, width as i32, height as i32);
        // steady state: subsequent texture binds are drawing textures
        state.active_texture(&gl, DRAW_UNIT);

        debug!(width, height, ?glsl_version, "gl screen initialized");

        Ok(Self {
            gl,
            state,
            vao,
            palette_tex,
            programs,
            buffers: SlotTable::default(),
            textures: SlotTable::default(),
            palette,
            fg: FgColor::default(),
            width,
            height,
        })
    }

    /// The owned GL context, for embedder-side state queries.
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    /// Tracks a resized drawable surface.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.state.viewport(&self.gl, 0, 0, width as i32, height as i32);
    }

    /// Releases every GPU resource owned by the screen.
    pub fn delete(mut self) {
        for buf in self.buffers.drain_live() {
            unsafe { self.gl.delete_buffer(buf.buffer) };
        }
        for tex in self.textures.drain_live() {
            unsafe { self.gl.delete_texture(tex.texture) };
        }
        self.programs.delete(&self.gl);
        unsafe {
            self.gl.delete_vertex_array(self.vao);
            self.gl.delete_texture(self.palette_tex);
        }
        debug!("gl screen resources released");
    }
}

fn upload_palette_texture(gl: &glow::Context, data: &[u8]) {
    unsafe {
        gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            glow::RGB8 as i32,
            Palette::CAPACITY as i32,
            1,
            0,
            glow::RGB,
            glow::UNSIGNED_BYTE,
            glow::PixelUnpackData::Slice(Some(data)),
        );
    }
}

impl Screen for GlScreen {
    fn create_buffer(&mut self) -> Result<BufferId, Error> {
        let buffer =
            unsafe { self.gl.create_buffer() }.map_err(Error::buffer_creation_failed)?;
        Ok(BufferId(self.buffers.allocate(GlBuffer { buffer, len: 0 })))
    }

    fn delete_buffer(&mut self, buffer: BufferId) -> Result<(), Error> {
        let slot = self
            .buffers
            .free(buffer.0)
            .ok_or_else(|| Error::empty_buffer_slot(buffer.0))?;
        unsafe { self.gl.delete_buffer(slot.buffer) };
        Ok(())
    }

    fn update_buffer(
        &mut self,
        buffer: BufferId,
        data: &[f32],
        hint: UsageHint,
    ) -> Result<(), Error> {
        let slot = self
            .buffers
            .get_mut(buffer.0)
            .ok_or_else(|| Error::empty_buffer_slot(buffer.0))?;
        slot.len = data.len();

        let usage = match hint {
            UsageHint::Static => glow::STATIC_DRAW,
            UsageHint::Stream => glow::STREAM_DRAW,
        };

        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(slot.buffer));
            let bytes = std::slice::from_raw_parts(
                data.as_ptr() as *const u8,
                data.len() * size_of::<f32>(),
            );
            self.gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytes, usage);
        }
        Ok(())
    }

    fn create_texture(&mut self, width: u32, height: u32) -> Result<TextureId, Error> {
        if width == 0 || height == 0 {
            return Err(Error::zero_texture_size(width, height));
        }
        let filter = TexFilter::for_size(width, height);

        let texture =
            unsafe { self.gl.create_texture() }.map_err(Error::texture_creation_failed)?;
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            match filter {
                TexFilter::NearestRepeat => {
                    self.gl.tex_parameter_i32(
                        glow::TEXTURE_2D,
                        glow::TEXTURE_MIN_FILTER,
                        glow::NEAREST as i32,
                    );
                    self.gl.tex_parameter_i32(
                        glow::TEXTURE_2D,
                        glow::TEXTURE_MAG_FILTER,
                        glow::NEAREST as i32,
                    );
                },
                TexFilter::LinearClamp => {
                    self.gl.tex_parameter_i32(
                        glow::TEXTURE_2D,
                        glow::TEXTURE_WRAP_S,
                        glow::CLAMP_TO_EDGE as i32,
                    );
                    self.gl.tex_parameter_i32(
                        glow::TEXTURE_2D,
                        glow::TEXTURE_WRAP_T,
                        glow::CLAMP_TO_EDGE as i32,
                    );
                    self.gl.tex_parameter_i32(
                        glow::TEXTURE_2D,
                        glow::TEXTURE_MIN_FILTER,
                        glow::LINEAR as i32,
                    );
                    self.gl.tex_parameter_i32(
                        glow::TEXTURE_2D,
                        glow::TEXTURE_MAG_FILTER,
                        glow::LINEAR as i32,
                    );
                },
            }
        }

        let id = self
            .textures
            .allocate(GlTexture { texture, width, height, filter });
        Ok(TextureId(id))
    }

    fn delete_texture(&mut self, texture: TextureId) -> Result<(), Error> {
        let slot = self
            .textures
            .free(texture.0)
            .ok_or_else(|| Error::empty_texture_slot(texture.0))?;
        unsafe { self.gl.delete_texture(slot.texture) };
        Ok(())
    }

    fn update_texture(
        &mut self,
        texture: TextureId,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<(), Error> {
        let slot = self
            .textures
            .get(texture.0)
            .ok_or_else(|| Error::empty_texture_slot(texture.0))?;
        if (width, height) != (slot.width, slot.height) {
            return Err(Error::texture_size_mismatch(
                (slot.width, slot.height),
                (width, height),
            ));
        }
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(Error::texture_payload_mismatch(pixels.len(), expected));
        }

        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(slot.texture));
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::R8 as i32,
                width as i32,
                height as i32,
                0,
                glow::RED,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(pixels)),
            );
        }
        Ok(())
    }

    fn texture_filter(&self, texture: TextureId) -> Result<TexFilter, Error> {
        self.textures
            .get(texture.0)
            .map(|slot| slot.filter)
            .ok_or_else(|| Error::empty_texture_slot(texture.0))
    }

    fn set_palette(&mut self, entries: &[u8]) -> Result<(), Error> {
        self.palette.set(entries)?;

        self.state.active_texture(&self.gl, PALETTE_UNIT);
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(self.palette_tex));
        }
        upload_palette_texture(&self.gl, self.palette.data());
        self.state.active_texture(&self.gl, DRAW_UNIT);

        let [r, g, b] = self.palette.clear_color();
        self.state.clear_color(&self.gl, r, g, b, 1.0);
        Ok(())
    }

    fn set_color(&mut self, index: u8) {
        self.fg.stage(index);
    }

    fn clear(&mut self) {
        unsafe { self.gl.clear(glow::COLOR_BUFFER_BIT) };
    }

    fn draw(
        &mut self,
        texture: TextureId,
        buffer: BufferId,
        vertex_count: u32,
        mode: DrawMode,
    ) -> Result<(), Error> {
        validate_vertex_count(vertex_count)?;
        let tex = self
            .textures
            .get(texture.0)
            .ok_or_else(|| Error::empty_texture_slot(texture.0))?;
        let buf = self
            .buffers
            .get(buffer.0)
            .ok_or_else(|| Error::empty_buffer_slot(buffer.0))?;
        let needed = vertex_count as usize * FLOATS_PER_VERTEX as usize;
        if buf.len < needed {
            return Err(Error::buffer_underrun(needed, buf.len));
        }

        let program = self.programs.for_mode(mode);
        program.program.use_program(&self.gl);
        if let Some(color_loc) = &program.color_loc {
            // the uniform is the palette-texture x coordinate directly
            let entry = f32::from(self.fg.index()) / 255.0;
            unsafe { self.gl.uniform_1_f32(Some(color_loc), entry) };
        }

        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Some(tex.texture));
            self.gl.bind_vertex_array(Some(self.vao));
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buf.buffer));
            // re-issued per draw: the pointer is bound-buffer relative
            self.gl.vertex_attrib_pointer_f32(
                ATTRIB_COORD,
                FLOATS_PER_VERTEX as i32,
                glow::FLOAT,
                false,
                VERTEX_STRIDE,
                0,
            );
            self.gl.draw_arrays(glow::TRIANGLES, 0, vertex_count as i32);
            self.gl.bind_vertex_array(None);
        }
        Ok(())
    }

    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
