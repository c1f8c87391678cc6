//! Static catalog of supported panel models.
//!
//! Adding a model means adding one entry here plus a command profile in the
//! display driver module; nothing is mutated after process start.

use super::{PaletteEntry, PanelModel, Rgb};
use crate::{RelayError, Result};

const PALETTE_BWYR: &[PaletteEntry] = &[
    PaletteEntry::new("black", Rgb::BLACK),
    PaletteEntry::new("white", Rgb::WHITE),
    PaletteEntry::new("yellow", Rgb::YELLOW),
    PaletteEntry::new("red", Rgb::RED),
];

const PALETTE_SPECTRA6: &[PaletteEntry] = &[
    PaletteEntry::new("black", Rgb::BLACK),
    PaletteEntry::new("white", Rgb::WHITE),
    PaletteEntry::new("yellow", Rgb::YELLOW),
    PaletteEntry::new("red", Rgb::RED),
    PaletteEntry::new("blue", Rgb::BLUE),
    PaletteEntry::new("green", Rgb::GREEN),
];

const PALETTE_ACEP7: &[PaletteEntry] = &[
    PaletteEntry::new("black", Rgb::BLACK),
    PaletteEntry::new("white", Rgb::WHITE),
    PaletteEntry::new("green", Rgb::GREEN),
    PaletteEntry::new("blue", Rgb::BLUE),
    PaletteEntry::new("red", Rgb::RED),
    PaletteEntry::new("yellow", Rgb::YELLOW),
    PaletteEntry::new("orange", Rgb::ORANGE),
];

static MODEL_5IN79G: PanelModel = PanelModel {
    key: "5in79g",
    width: 792,
    height: 272,
    palette: PALETTE_BWYR,
    driver_id: "epd5in79g",
};

static MODEL_7IN3SCE: PanelModel = PanelModel {
    key: "7in3sce",
    width: 800,
    height: 480,
    palette: PALETTE_SPECTRA6,
    driver_id: "epd7in3e",
};

static MODEL_4IN01E: PanelModel = PanelModel {
    key: "4in01e",
    width: 640,
    height: 400,
    palette: PALETTE_ACEP7,
    driver_id: "epd4in01f",
};

/// All supported models, in registry order. The first entry is the default.
pub static PANELS: &[&PanelModel] = &[&MODEL_5IN79G, &MODEL_7IN3SCE, &MODEL_4IN01E];

/// Look up a model by key.
pub fn lookup(key: &str) -> Result<&'static PanelModel> {
    PANELS
        .iter()
        .find(|model| model.key == key)
        .copied()
        .ok_or_else(|| RelayError::unsupported_model(key, model_keys()))
}

/// Valid registry keys, in registry order.
pub fn model_keys() -> Vec<&'static str> {
    PANELS.iter().map(|model| model.key).collect()
}

/// The model used when no key is configured.
pub fn default_model() -> &'static PanelModel {
    &MODEL_5IN79G
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_every_registered_key() {
        for key in model_keys() {
            let model = lookup(key).expect("registered key must resolve");
            assert_eq!(model.key, key);
            assert!(model.width > 0 && model.height > 0);
            assert!(!model.palette.is_empty());
        }
    }

    #[test]
    fn lookup_unknown_key_lists_valid_models() {
        let error = lookup("13in3k").expect_err("unknown key must fail");
        match &error {
            RelayError::UnsupportedModel { key, valid } => {
                assert_eq!(key, "13in3k");
                assert_eq!(valid, &model_keys());
            }
            other => panic!("expected UnsupportedModel, got {other:?}"),
        }
        assert!(!error.is_recoverable());
    }

    #[test]
    fn default_model_is_first_registry_entry() {
        assert_eq!(default_model().key, PANELS[0].key);
        assert_eq!(default_model().key, "5in79g");
        assert_eq!(default_model().width, 792);
        assert_eq!(default_model().height, 272);
    }

    #[test]
    fn palettes_have_unique_colors() {
        for model in PANELS {
            for (i, a) in model.palette.iter().enumerate() {
                for b in &model.palette[i + 1..] {
                    assert_ne!(a.color, b.color, "duplicate color in {}", model.key);
                }
            }
        }
    }

    #[test]
    fn every_palette_carries_black_and_white() {
        for model in PANELS {
            let names = model.color_names();
            assert!(names.contains(&"black"), "{} missing black", model.key);
            assert!(names.contains(&"white"), "{} missing white", model.key);
        }
    }
}
