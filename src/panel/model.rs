//! Panel model description types.

use serde::Serialize;

/// An RGB triple in sRGB space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const YELLOW: Rgb = Rgb::new(255, 255, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const ORANGE: Rgb = Rgb::new(255, 128, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Squared Euclidean distance to another color.
    ///
    /// Squared form avoids the sqrt without changing the ordering, so
    /// nearest-color comparisons stay exact integer arithmetic.
    pub fn distance_sq(self, other: Rgb) -> u32 {
        let dr = self.r as i32 - other.r as i32;
        let dg = self.g as i32 - other.g as i32;
        let db = self.b as i32 - other.b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }
}

/// One palette slot: the color the panel can show, plus the name the
/// info surface reports for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaletteEntry {
    pub name: &'static str,
    pub color: Rgb,
}

impl PaletteEntry {
    pub const fn new(name: &'static str, color: Rgb) -> Self {
        Self { name, color }
    }
}

/// One supported display model. Immutable; instances live in the static
/// registry for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PanelModel {
    /// Registry key, e.g. `"5in79g"`.
    pub key: &'static str,
    pub width: u32,
    pub height: u32,
    /// Fixed colors in declaration order; quantizer ties break toward the
    /// earliest entry.
    pub palette: &'static [PaletteEntry],
    /// Hardware command profile selector, e.g. `"epd5in79g"`.
    pub driver_id: &'static str,
}

impl PanelModel {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Palette color names for the info surface.
    pub fn color_names(&self) -> Vec<&'static str> {
        self.palette.iter().map(|entry| entry.name).collect()
    }

    /// Index of the palette's white entry, falling back to the first entry.
    /// Used as the letterbox background.
    pub fn background_index(&self) -> u8 {
        self.palette
            .iter()
            .position(|entry| entry.name == "white")
            .unwrap_or(0) as u8
    }

    /// The letterbox background color itself.
    pub fn background_color(&self) -> Rgb {
        self.palette
            .get(self.background_index() as usize)
            .map(|entry| entry.color)
            .unwrap_or(Rgb::WHITE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_zero_for_identical_colors() {
        assert_eq!(Rgb::RED.distance_sq(Rgb::RED), 0);
        assert_eq!(Rgb::new(12, 34, 56).distance_sq(Rgb::new(12, 34, 56)), 0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Rgb::new(200, 10, 99);
        let b = Rgb::new(0, 255, 31);
        assert_eq!(a.distance_sq(b), b.distance_sq(a));
    }

    #[test]
    fn background_prefers_white_entry() {
        const PALETTE: &[PaletteEntry] = &[
            PaletteEntry::new("black", Rgb::BLACK),
            PaletteEntry::new("white", Rgb::WHITE),
            PaletteEntry::new("red", Rgb::RED),
        ];
        let model = PanelModel {
            key: "test",
            width: 8,
            height: 8,
            palette: PALETTE,
            driver_id: "none",
        };
        assert_eq!(model.background_index(), 1);
        assert_eq!(model.background_color(), Rgb::WHITE);
    }
}
