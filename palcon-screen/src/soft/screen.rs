use crate::{
    error::Error,
    handle::{BufferId, SlotTable, TextureId},
    palette::Palette,
    screen::{
        DrawMode, FLOATS_PER_VERTEX, FgColor, INDEX_EPSILON, Screen, TexFilter, UsageHint,
        validate_vertex_count,
    },
    soft::raster::{self, Vertex},
};

struct SoftTexture {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    filter: TexFilter,
}

impl SoftTexture {
    /// Nearest-texel lookup with the addressing mode of the filter class.
    /// A texture whose storage was never uploaded samples as index zero.
    fn sample(&self, u: f32, v: f32) -> u8 {
        if self.pixels.is_empty() {
            return 0;
        }
        let w = i64::from(self.width);
        let h = i64::from(self.height);
        let mut tx = (u * self.width as f32).floor() as i64;
        let mut ty = (v * self.height as f32).floor() as i64;
        match self.filter {
            TexFilter::NearestRepeat => {
                tx = tx.rem_euclid(w);
                ty = ty.rem_euclid(h);
            },
            TexFilter::LinearClamp => {
                tx = tx.clamp(0, w - 1);
                ty = ty.clamp(0, h - 1);
            },
        }
        self.pixels[(ty * w + tx) as usize]
    }
}

/// Software implementation of the screen contract.
///
/// Rasterizes into an RGBA8 frame in memory, resolving palette indices to
/// colors at draw time exactly as the GL shaders do. Backs headless runs
/// and pixel-exact tests; always samples nearest so indices stay integral.
pub struct SoftScreen {
    frame: Vec<u8>,
    width: u32,
    height: u32,
    buffers: SlotTable<Vec<f32>>,
    textures: SlotTable<SoftTexture>,
    palette: Palette,
    fg: FgColor,
}

impl SoftScreen {
    pub fn new(width: u32, height: u32) -> Self {
        let mut screen = Self {
            frame: vec![0; width as usize * height as usize * 4],
            width,
            height,
            buffers: SlotTable::default(),
            textures: SlotTable::default(),
            palette: Palette::new(),
            fg: FgColor::default(),
        };
        screen.clear();
        screen
    }

    /// The rendered frame as tightly packed RGBA8 rows, top row first.
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let at = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.frame[at],
            self.frame[at + 1],
            self.frame[at + 2],
            self.frame[at + 3],
        ]
    }
}

impl Screen for SoftScreen {
    fn create_buffer(&mut self) -> Result<BufferId, Error> {
        Ok(BufferId(self.buffers.allocate(Vec::new())))
    }

    fn delete_buffer(&mut self, buffer: BufferId) -> Result<(), Error> {
        self.buffers
            .free(buffer.0)
            .map(|_| ())
            .ok_or_else(|| Error::empty_buffer_slot(buffer.0))
    }

    fn update_buffer(
        &mut self,
        buffer: BufferId,
        data: &[f32],
        _hint: UsageHint,
    ) -> Result<(), Error> {
        let slot = self
            .buffers
            .get_mut(buffer.0)
            .ok_or_else(|| Error::empty_buffer_slot(buffer.0))?;
        slot.clear();
        slot.extend_from_slice(data);
        Ok(())
    }

    fn create_texture(&mut self, width: u32, height: u32) -> Result<TextureId, Error> {
        if width == 0 || height == 0 {
            return Err(Error::zero_texture_size(width, height));
        }
        let filter = TexFilter::for_size(width, height);
        let id = self.textures.allocate(SoftTexture {
            pixels: Vec::new(),
            width,
            height,
            filter,
        });
        Ok(TextureId(id))
    }

    fn delete_texture(&mut self, texture: TextureId) -> Result<(), Error> {
        self.textures
            .free(texture.0)
            .map(|_| ())
            .ok_or_else(|| Error::empty_texture_slot(texture.0))
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
            .get_mut(texture.0)
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
        slot.pixels.clear();
        slot.pixels.extend_from_slice(pixels);
        Ok(())
    }

    fn texture_filter(&self, texture: TextureId) -> Result<TexFilter, Error> {
        self.textures
            .get(texture.0)
            .map(|slot| slot.filter)
            .ok_or_else(|| Error::empty_texture_slot(texture.0))
    }

    fn set_palette(&mut self, entries: &[u8]) -> Result<(), Error> {
        self.palette.set(entries)
    }

    fn set_color(&mut self, index: u8) {
        self.fg.stage(index);
    }

    fn clear(&mut self) {
        let [r, g, b] = self.palette.entry(0);
        for pixel in self.frame.chunks_exact_mut(4) {
            pixel.copy_from_slice(&[r, g, b, 255]);
        }
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
        let data = self
            .buffers
            .get(buffer.0)
            .ok_or_else(|| Error::empty_buffer_slot(buffer.0))?;

        let needed = vertex_count as usize * FLOATS_PER_VERTEX as usize;
        if data.len() < needed {
            return Err(Error::buffer_underrun(needed, data.len()));
        }

        let palette = &self.palette;
        let frame = &mut self.frame;
        let width = self.width;
        let height = self.height;
        let fg_rgb = palette.entry(self.fg.index());
        let bg_rgb = palette.entry(0);

        let to_pixel = |x: f32, y: f32| {
            (
                (x + 1.0) * 0.5 * width as f32,
                (1.0 - y) * 0.5 * height as f32,
            )
        };

        for tri in data[..needed].chunks_exact(3 * FLOATS_PER_VERTEX as usize) {
            let corner = |i: usize| {
                let (x, y) = to_pixel(tri[i * 4], tri[i * 4 + 1]);
                Vertex { x, y, u: tri[i * 4 + 2], v: tri[i * 4 + 3] }
            };
            let triangle = [corner(0), corner(1), corner(2)];

            raster::fill_triangle(width, height, &triangle, |px, py, u, v| {
                let index = tex.sample(u, v);
                // same split the solid-mode shaders make on the normalized index
                let ink = f32::from(index) / 255.0 > INDEX_EPSILON;
                let rgb = match mode {
                    DrawMode::Copy => palette.entry(index),
                    DrawMode::Solid => {
                        if ink { fg_rgb } else { bg_rgb }
                    },
                    DrawMode::SolidTransparent => {
                        if !ink {
                            return;
                        }
                        fg_rgb
                    },
                };
                let at = (py as usize * width as usize + px as usize) * 4;
                frame[at..at + 3].copy_from_slice(&rgb);
                frame[at + 3] = 255;
            });
        }
        Ok(())
    }

    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two triangles covering the whole viewport, uv spanning [0,1].
    fn full_quad() -> Vec<f32> {
        vec![
            -1.0, 1.0, 0.0, 0.0, //
            -1.0, -1.0, 0.0, 1.0, //
            1.0, -1.0, 1.0, 1.0, //
            -1.0, 1.0, 0.0, 0.0, //
            1.0, -1.0, 1.0, 1.0, //
            1.0, 1.0, 1.0, 0.0,
        ]
    }

    /// Same quad with uv spanning [0,max_uv] to sample outside the texture.
    fn quad_with_uv(max_uv: f32) -> Vec<f32> {
        let m = max_uv;
        vec![
            -1.0, 1.0, 0.0, 0.0, //
            -1.0, -1.0, 0.0, m, //
            1.0, -1.0, m, m, //
            -1.0, 1.0, 0.0, 0.0, //
            1.0, -1.0, m, m, //
            1.0, 1.0, m, 0.0,
        ]
    }

    fn screen_with_quad(width: u32, height: u32, quad: &[f32]) -> (SoftScreen, BufferId) {
        let mut screen = SoftScreen::new(width, height);
        let buf = screen.create_buffer().unwrap();
        screen.update_buffer(buf, quad, UsageHint::Static).unwrap();
        (screen, buf)
    }

    #[test]
    fn copy_mode_resolves_palette_colors() {
        let (mut screen, buf) = screen_with_quad(2, 2, &full_quad());
        // entry 0 black, entry 1 red, entry 2 green
        screen.set_palette(&[0, 0, 0, 255, 0, 0, 0, 255, 0]).unwrap();

        let tex = screen.create_texture(2, 2).unwrap();
        screen.update_texture(tex, &[0, 1, 2, 1], 2, 2).unwrap();
        screen.draw(tex, buf, 6, DrawMode::Copy).unwrap();

        assert_eq!(screen.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(screen.pixel(1, 0), [255, 0, 0, 255]);
        assert_eq!(screen.pixel(0, 1), [0, 255, 0, 255]);
        assert_eq!(screen.pixel(1, 1), [255, 0, 0, 255]);
    }

    #[test]
    fn solid_mode_splits_on_zero_index() {
        let (mut screen, buf) = screen_with_quad(4, 1, &full_quad());
        screen
            .set_palette(&[10, 20, 30, 0, 0, 0, 200, 100, 50])
            .unwrap();
        screen.set_color(2);

        let tex = screen.create_texture(4, 1).unwrap();
        screen.update_texture(tex, &[0, 1, 128, 255], 4, 1).unwrap();
        screen.draw(tex, buf, 6, DrawMode::Solid).unwrap();

        // zero index paints the background entry, everything else the staged color
        assert_eq!(screen.pixel(0, 0), [10, 20, 30, 255]);
        assert_eq!(screen.pixel(1, 0), [200, 100, 50, 255]);
        assert_eq!(screen.pixel(2, 0), [200, 100, 50, 255]);
        assert_eq!(screen.pixel(3, 0), [200, 100, 50, 255]);
    }

    #[test]
    fn transparent_mode_leaves_zero_pixels_untouched() {
        let (mut screen, buf) = screen_with_quad(2, 1, &full_quad());
        screen
            .set_palette(&[0, 0, 99, 255, 255, 255, 40, 40, 40])
            .unwrap();

        // underpaint the whole frame with entry 1
        let under = screen.create_texture(2, 1).unwrap();
        screen.update_texture(under, &[1, 1], 2, 1).unwrap();
        screen.draw(under, buf, 6, DrawMode::Copy).unwrap();

        let overlay = screen.create_texture(2, 1).unwrap();
        screen.update_texture(overlay, &[0, 2], 2, 1).unwrap();
        screen.set_color(2);
        screen.draw(overlay, buf, 6, DrawMode::SolidTransparent).unwrap();

        // index 0 discarded, underpaint survives; index 2 painted
        assert_eq!(screen.pixel(0, 0), [255, 255, 255, 255]);
        assert_eq!(screen.pixel(1, 0), [40, 40, 40, 255]);
    }

    #[test]
    fn pot_textures_wrap_and_npot_textures_clamp() {
        let palette: Vec<u8> = (0..=255u8).flat_map(|i| [i, i, i]).collect();

        // 2-wide power-of-two texture sampled across uv [0,2]
        let (mut screen, buf) = screen_with_quad(4, 1, &quad_with_uv(2.0));
        screen.set_palette(&palette).unwrap();
        let pot = screen.create_texture(2, 1).unwrap();
        screen.update_texture(pot, &[7, 9], 2, 1).unwrap();
        assert_eq!(screen.texture_filter(pot).unwrap(), TexFilter::NearestRepeat);
        screen.draw(pot, buf, 6, DrawMode::Copy).unwrap();
        let wrapped: Vec<u8> = (0..4).map(|x| screen.pixel(x, 0)[0]).collect();
        assert_eq!(wrapped, [7, 9, 7, 9]);

        // 3-wide texture clamps to its last column instead
        let (mut screen, buf) = screen_with_quad(4, 1, &quad_with_uv(2.0));
        screen.set_palette(&palette).unwrap();
        let npot = screen.create_texture(3, 1).unwrap();
        screen.update_texture(npot, &[7, 8, 9], 3, 1).unwrap();
        assert_eq!(screen.texture_filter(npot).unwrap(), TexFilter::LinearClamp);
        screen.draw(npot, buf, 6, DrawMode::Copy).unwrap();
        let clamped: Vec<u8> = (0..4).map(|x| screen.pixel(x, 0)[0]).collect();
        assert_eq!(clamped, [7, 9, 9, 9]);
    }

    #[test]
    fn staged_color_persists_across_draws() {
        let (mut screen, buf) = screen_with_quad(1, 1, &full_quad());
        screen
            .set_palette(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 77, 77, 77])
            .unwrap();
        screen.set_color(3);

        let tex = screen.create_texture(1, 1).unwrap();
        screen.update_texture(tex, &[5], 1, 1).unwrap();

        screen.draw(tex, buf, 6, DrawMode::Solid).unwrap();
        assert_eq!(screen.pixel(0, 0), [77, 77, 77, 255]);

        screen.clear();
        screen.draw(tex, buf, 6, DrawMode::Solid).unwrap();
        assert_eq!(screen.pixel(0, 0), [77, 77, 77, 255]);
    }

    #[test]
    fn unset_color_paints_entry_zero() {
        let (mut screen, buf) = screen_with_quad(1, 1, &full_quad());
        screen.set_palette(&[31, 32, 33]).unwrap();

        let tex = screen.create_texture(1, 1).unwrap();
        screen.update_texture(tex, &[200], 1, 1).unwrap();
        screen.draw(tex, buf, 6, DrawMode::Solid).unwrap();

        assert_eq!(screen.pixel(0, 0), [31, 32, 33, 255]);
    }

    #[test]
    fn partial_palette_update_keeps_later_entries() {
        let (mut screen, buf) = screen_with_quad(1, 1, &full_quad());
        let full: Vec<u8> = (0..=255u8).flat_map(|i| [i, 0, 0]).collect();
        screen.set_palette(&full).unwrap();
        screen.set_palette(&[1, 1, 1, 2, 2, 2]).unwrap();

        let tex = screen.create_texture(1, 1).unwrap();
        screen.update_texture(tex, &[40], 1, 1).unwrap();
        screen.draw(tex, buf, 6, DrawMode::Copy).unwrap();

        assert_eq!(screen.pixel(0, 0), [40, 0, 0, 255]);
    }

    #[test]
    fn clear_uses_palette_entry_zero() {
        let mut screen = SoftScreen::new(2, 2);
        screen.set_palette(&[9, 8, 7]).unwrap();
        screen.clear();
        assert_eq!(screen.pixel(1, 1), [9, 8, 7, 255]);
    }

    #[test]
    fn freed_handles_are_reused_lowest_first() {
        let mut screen = SoftScreen::new(1, 1);
        let a = screen.create_buffer().unwrap();
        let b = screen.create_buffer().unwrap();
        screen.delete_buffer(a).unwrap();
        let c = screen.create_buffer().unwrap();
        assert_eq!(c.raw(), a.raw());
        assert_ne!(c.raw(), b.raw());

        let t0 = screen.create_texture(1, 1).unwrap();
        let t1 = screen.create_texture(1, 1).unwrap();
        screen.delete_texture(t0).unwrap();
        assert_eq!(screen.create_texture(2, 2).unwrap().raw(), t0.raw());
        screen.delete_texture(t1).unwrap();
    }

    #[test]
    fn dead_handles_are_rejected() {
        let mut screen = SoftScreen::new(1, 1);
        let buf = screen.create_buffer().unwrap();
        let tex = screen.create_texture(1, 1).unwrap();
        screen.delete_texture(tex).unwrap();

        assert!(matches!(
            screen.update_texture(tex, &[0], 1, 1),
            Err(Error::Handle(_))
        ));
        assert!(matches!(
            screen.draw(tex, buf, 3, DrawMode::Copy),
            Err(Error::Handle(_))
        ));
        assert!(matches!(screen.delete_texture(tex), Err(Error::Handle(_))));
    }

    #[test]
    fn draw_validates_arguments() {
        let (mut screen, buf) = screen_with_quad(1, 1, &full_quad());
        let tex = screen.create_texture(1, 1).unwrap();
        screen.update_texture(tex, &[0], 1, 1).unwrap();

        assert!(matches!(
            screen.draw(tex, buf, 0, DrawMode::Copy),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            screen.draw(tex, buf, 4, DrawMode::Copy),
            Err(Error::Validation(_))
        ));
        // quad holds 6 vertices; asking for 9 over-reads
        assert!(matches!(
            screen.draw(tex, buf, 9, DrawMode::Copy),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn texture_uploads_are_validated() {
        let mut screen = SoftScreen::new(1, 1);
        assert!(matches!(
            screen.create_texture(0, 4),
            Err(Error::Validation(_))
        ));

        let tex = screen.create_texture(2, 2).unwrap();
        assert!(matches!(
            screen.update_texture(tex, &[0; 4], 4, 1),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            screen.update_texture(tex, &[0; 3], 2, 2),
            Err(Error::Validation(_))
        ));
    }
}
