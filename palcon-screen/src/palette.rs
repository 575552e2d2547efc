//! The shared 256-entry RGB palette.

use crate::error::Error;

/// Host-side copy of the palette texture contents.
///
/// `set` replaces only the leading entries it is given; the tail keeps its
/// prior contents, so partial updates are history-dependent.
#[derive(Debug, Clone)]
pub struct Palette {
    rgb: [u8; Self::CAPACITY * 3],
}

impl Palette {
    /// Number of palette entries.
    pub const CAPACITY: usize = 256;

    pub(crate) fn new() -> Self {
        Self { rgb: [0; Self::CAPACITY * 3] }
    }

    /// Replaces entries `[0, entries.len() / 3)` with the given RGB triplets.
    pub(crate) fn set(&mut self, entries: &[u8]) -> Result<(), Error> {
        if entries.len() % 3 != 0 {
            return Err(Error::palette_not_rgb(entries.len()));
        }
        let count = entries.len() / 3;
        if count > Self::CAPACITY {
            return Err(Error::palette_overflow(count as u32));
        }

        self.rgb[..entries.len()].copy_from_slice(entries);
        Ok(())
    }

    /// RGB triplet of a single entry.
    pub fn entry(&self, index: u8) -> [u8; 3] {
        let at = index as usize * 3;
        [self.rgb[at], self.rgb[at + 1], self.rgb[at + 2]]
    }

    /// Entry 0 as normalized floats; the screen border/background color.
    pub fn clear_color(&self) -> [f32; 3] {
        let [r, g, b] = self.entry(0);
        [
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
        ]
    }

    /// Full 256*3 byte contents, ready for texture upload.
    pub(crate) fn data(&self) -> &[u8] {
        &self.rgb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_update_keeps_tail_entries() {
        let mut pal = Palette::new();
        pal.set(&[10, 11, 12, 20, 21, 22, 30, 31, 32]).unwrap();

        // shorter second update must leave entries 1.. untouched
        pal.set(&[1, 2, 3]).unwrap();

        assert_eq!(pal.entry(0), [1, 2, 3]);
        assert_eq!(pal.entry(1), [20, 21, 22]);
        assert_eq!(pal.entry(2), [30, 31, 32]);
    }

    #[test]
    fn full_update_replaces_every_entry() {
        let mut pal = Palette::new();
        let mut entries = [0u8; Palette::CAPACITY * 3];
        for (i, b) in entries.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        pal.set(&entries).unwrap();

        assert_eq!(pal.entry(255), [(765 % 251) as u8, (766 % 251) as u8, (767 % 251) as u8]);
    }

    #[test]
    fn oversized_update_is_rejected() {
        let mut pal = Palette::new();
        let entries = vec![0u8; (Palette::CAPACITY + 1) * 3];
        assert!(matches!(pal.set(&entries), Err(Error::Validation(_))));
    }

    #[test]
    fn non_triplet_update_is_rejected() {
        let mut pal = Palette::new();
        assert!(matches!(pal.set(&[1, 2, 3, 4]), Err(Error::Validation(_))));
    }

    #[test]
    fn clear_color_is_entry_zero_normalized() {
        let mut pal = Palette::new();
        pal.set(&[255, 0, 51]).unwrap();

        let [r, g, b] = pal.clear_color();
        assert_eq!(r, 1.0);
        assert_eq!(g, 0.0);
        assert!((b - 0.2).abs() < 1e-6);
    }
}
