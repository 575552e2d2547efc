//! The screen contract shared by the GL and software backends.

use crate::{
    error::Error,
    handle::{BufferId, TextureId},
    memory::{GuestMemory, MemoryAccessError},
};

/// Floats per vertex: x, y in normalized device coordinates, then u, v.
pub const FLOATS_PER_VERTEX: u32 = 4;

/// Threshold separating "background" (index 0) from "ink" (index >= 1) in
/// normalized index space, used by the solid modes.
pub const INDEX_EPSILON: f32 = 0.5 / 255.0;

/// Color-resolution rule for a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    /// Every texel shown through the palette, index 0 included.
    Copy,
    /// Ink texels forced to the foreground entry, background texels to
    /// palette entry 0.
    Solid,
    /// Ink texels forced to the foreground entry, background texels
    /// discarded outright (no write, no blending).
    SolidTransparent,
}

impl DrawMode {
    /// Maps the wire encoding (0, 1, 2) to a mode.
    ///
    /// # Errors
    /// Any other value is a validation error.
    pub fn try_from_raw(raw: u32) -> Result<Self, Error> {
        match raw {
            0 => Ok(Self::Copy),
            1 => Ok(Self::Solid),
            2 => Ok(Self::SolidTransparent),
            _ => Err(Error::bad_draw_mode(raw)),
        }
    }

    /// Whether the mode reads the staged foreground index.
    pub fn uses_foreground(self) -> bool {
        matches!(self, Self::Solid | Self::SolidTransparent)
    }
}

/// GPU storage hint for buffer uploads; never affects correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageHint {
    /// Contents expected to be stable across many draws.
    Static,
    /// Contents expected to be replaced every frame.
    Stream,
}

impl UsageHint {
    /// Wire encoding: 0 is static, anything else streams.
    pub fn from_raw(raw: u32) -> Self {
        if raw == 0 { Self::Static } else { Self::Stream }
    }
}

/// Sampling configuration chosen once at texture creation and never
/// reconsidered, keyed on whether both dimensions are powers of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexFilter {
    /// Power-of-two sizes: nearest filtering, default (repeat) wrap.
    NearestRepeat,
    /// Everything else: linear filtering, clamp-to-edge wrap.
    LinearClamp,
}

impl TexFilter {
    /// Policy for a texture of the given size.
    pub fn for_size(width: u32, height: u32) -> Self {
        if width.is_power_of_two() && height.is_power_of_two() {
            Self::NearestRepeat
        } else {
            Self::LinearClamp
        }
    }
}

/// Foreground-index state machine.
///
/// Staged by `set_color`, read (not cleared) by solid-mode draws, so the
/// staged value persists until the next `set_color`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FgColor {
    /// Nothing staged; solid draws resolve to palette entry 0.
    #[default]
    Unset,
    /// Staged palette index.
    Set(u8),
}

impl FgColor {
    pub(crate) fn stage(&mut self, index: u8) {
        *self = Self::Set(index);
    }

    /// Palette index solid draws resolve the foreground to.
    pub fn index(self) -> u8 {
        match self {
            Self::Unset => 0,
            Self::Set(index) => index,
        }
    }
}

/// The handle-based drawing surface exposed to the sandboxed module.
///
/// Both backends implement the same observable rules; anything a guest can
/// notice through draw results must not differ between them.
pub trait Screen {
    /// Allocates a vertex buffer in the lowest empty slot.
    ///
    /// # Errors
    /// Fails if the backing resource cannot be created.
    fn create_buffer(&mut self) -> Result<BufferId, Error>;

    /// Releases a buffer and empties its slot; the table never shrinks.
    ///
    /// # Errors
    /// Fails on an empty or out-of-range slot.
    fn delete_buffer(&mut self, buffer: BufferId) -> Result<(), Error>;

    /// Replaces the buffer's entire contents and size.
    ///
    /// # Errors
    /// Fails on an empty or out-of-range slot.
    fn update_buffer(
        &mut self,
        buffer: BufferId,
        data: &[f32],
        hint: UsageHint,
    ) -> Result<(), Error>;

    /// Allocates a single-channel texture; sampling policy is fixed here.
    ///
    /// # Errors
    /// Fails on zero dimensions or resource-creation failure.
    fn create_texture(&mut self, width: u32, height: u32) -> Result<TextureId, Error>;

    /// Releases a texture and empties its slot; the table never shrinks.
    ///
    /// # Errors
    /// Fails on an empty or out-of-range slot.
    fn delete_texture(&mut self, texture: TextureId) -> Result<(), Error>;

    /// Replaces the texture's full contents; no sub-region updates.
    ///
    /// # Errors
    /// Fails if `width`/`height` differ from the creation dimensions, if
    /// `pixels` is not exactly `width * height` bytes, or on an empty slot.
    fn update_texture(
        &mut self,
        texture: TextureId,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<(), Error>;

    /// Sampling policy recorded for a texture at creation.
    ///
    /// # Errors
    /// Fails on an empty or out-of-range slot.
    fn texture_filter(&self, texture: TextureId) -> Result<TexFilter, Error>;

    /// Replaces the leading palette entries; the tail keeps prior contents.
    /// Also the only operation that sets the clear color (entry 0).
    ///
    /// # Errors
    /// Fails if `entries` is not whole RGB triplets or exceeds 256 entries.
    fn set_palette(&mut self, entries: &[u8]) -> Result<(), Error>;

    /// Stages the foreground palette index for solid-mode draws.
    fn set_color(&mut self, index: u8);

    /// Fills the frame with the current clear color.
    fn clear(&mut self);

    /// Triangle-list draw of `vertex_count` vertices from `buffer`,
    /// sampling `texture`, resolving colors per `mode`.
    ///
    /// # Errors
    /// Fails on empty slots or a vertex count that is not a nonzero
    /// multiple of 3.
    fn draw(
        &mut self,
        texture: TextureId,
        buffer: BufferId,
        vertex_count: u32,
        mode: DrawMode,
    ) -> Result<(), Error>;

    /// Frame dimensions in pixels.
    fn frame_size(&self) -> (u32, u32);

    /// Marshals `float_count` little-endian floats from guest memory, then
    /// updates the buffer.
    ///
    /// # Errors
    /// Fails on out-of-range guest memory or per [`Screen::update_buffer`].
    fn update_buffer_from<M: GuestMemory + ?Sized>(
        &mut self,
        mem: &M,
        buffer: BufferId,
        offset: u32,
        float_count: u32,
        hint: UsageHint,
    ) -> Result<(), Error> {
        let data = mem.read_f32s(offset, float_count)?;
        self.update_buffer(buffer, &data, hint)
    }

    /// Marshals `width * height` index bytes from guest memory, then updates
    /// the texture.
    ///
    /// # Errors
    /// Fails on out-of-range guest memory or per [`Screen::update_texture`].
    fn update_texture_from<M: GuestMemory + ?Sized>(
        &mut self,
        mem: &M,
        texture: TextureId,
        offset: u32,
        width: u32,
        height: u32,
    ) -> Result<(), Error> {
        let len = usize::try_from(u64::from(width) * u64::from(height))
            .map_err(|_| MemoryAccessError { offset, len: usize::MAX })?;
        let pixels = mem.read_vec(offset, len)?;
        self.update_texture(texture, &pixels, width, height)
    }

    /// Marshals `entry_count` RGB triplets from guest memory, then updates
    /// the palette.
    ///
    /// # Errors
    /// Fails on out-of-range guest memory or per [`Screen::set_palette`].
    fn set_palette_from<M: GuestMemory + ?Sized>(
        &mut self,
        mem: &M,
        offset: u32,
        entry_count: u32,
    ) -> Result<(), Error> {
        // reject before reading so a bogus count cannot trigger a huge copy
        if entry_count as usize > crate::palette::Palette::CAPACITY {
            return Err(Error::palette_overflow(entry_count));
        }
        let entries = mem.read_vec(offset, entry_count as usize * 3)?;
        self.set_palette(&entries)
    }
}

/// Shared draw-call argument validation.
pub(crate) fn validate_vertex_count(vertex_count: u32) -> Result<(), Error> {
    if vertex_count == 0 || vertex_count % 3 != 0 {
        return Err(Error::bad_vertex_count(vertex_count));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_mode_wire_mapping() {
        assert_eq!(DrawMode::try_from_raw(0).unwrap(), DrawMode::Copy);
        assert_eq!(DrawMode::try_from_raw(1).unwrap(), DrawMode::Solid);
        assert_eq!(
            DrawMode::try_from_raw(2).unwrap(),
            DrawMode::SolidTransparent
        );
        assert!(matches!(
            DrawMode::try_from_raw(3),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn usage_hint_zero_is_static() {
        assert_eq!(UsageHint::from_raw(0), UsageHint::Static);
        assert_eq!(UsageHint::from_raw(1), UsageHint::Stream);
        assert_eq!(UsageHint::from_raw(17), UsageHint::Stream);
    }

    #[test]
    fn filter_policy_requires_both_dimensions_pot() {
        assert_eq!(TexFilter::for_size(4, 4), TexFilter::NearestRepeat);
        assert_eq!(TexFilter::for_size(64, 16), TexFilter::NearestRepeat);
        assert_eq!(TexFilter::for_size(3, 5), TexFilter::LinearClamp);
        assert_eq!(TexFilter::for_size(4, 5), TexFilter::LinearClamp);
        assert_eq!(TexFilter::for_size(640, 400), TexFilter::LinearClamp);
    }

    #[test]
    fn foreground_defaults_to_entry_zero() {
        let mut fg = FgColor::default();
        assert_eq!(fg.index(), 0);

        fg.stage(42);
        assert_eq!(fg.index(), 42);

        // reading must not clear the staged value
        assert_eq!(fg.index(), 42);
    }

    #[test]
    fn vertex_count_must_be_nonzero_multiple_of_three() {
        assert!(validate_vertex_count(3).is_ok());
        assert!(validate_vertex_count(6).is_ok());
        assert!(validate_vertex_count(0).is_err());
        assert!(validate_vertex_count(4).is_err());
    }
}
