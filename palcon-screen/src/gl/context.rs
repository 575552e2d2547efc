use glow::HasContext;

/// Tracks the small set of GL state this pipeline touches, skipping
/// redundant state changes.
#[derive(Debug)]
pub struct GlState {
    // Viewport dimensions
    viewport: [i32; 4], // [x, y, width, height]

    // Clear color, driven by palette entry 0
    clear_color: [f32; 4],

    // Active texture unit
    active_texture_unit: u32,
}

impl GlState {
    /// Create a new GlState object with GL defaults.
    pub fn new() -> Self {
        Self {
            viewport: [0, 0, 0, 0],
            clear_color: [0.0, 0.0, 0.0, 0.0],
            active_texture_unit: glow::TEXTURE0,
        }
    }

    /// Set viewport dimensions.
    pub fn viewport(
        &mut self,
        gl: &glow::Context,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> &mut Self {
        let new_viewport = [x, y, width, height];
        if self.viewport != new_viewport {
            unsafe { gl.viewport(x, y, width, height) };
            self.viewport = new_viewport;
        }
        self
    }

    /// Set clear color.
    pub fn clear_color(&mut self, gl: &glow::Context, r: f32, g: f32, b: f32, a: f32) -> &mut Self {
        let new_color = [r, g, b, a];
        if self.clear_color != new_color {
            unsafe { gl.clear_color(r, g, b, a) };
            self.clear_color = new_color;
        }
        self
    }

    /// Set active texture unit.
    pub fn active_texture(&mut self, gl: &glow::Context, texture_unit: u32) -> &mut Self {
        if self.active_texture_unit != texture_unit {
            unsafe { gl.active_texture(texture_unit) };
            self.active_texture_unit = texture_unit;
        }
        self
    }
}

impl Default for GlState {
    fn default() -> Self {
        Self::new()
    }
}
