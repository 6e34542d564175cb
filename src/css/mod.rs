//! CSS parsing, property maps, and WeChat-compatible fallbacks.

pub mod fallbacks;
pub mod property_map;
pub mod stylesheet;

pub use fallbacks::{apply_css_fallbacks, hsl_to_hex, simplify_calc};
pub use property_map::{PropertyMap, is_valid_style_value, normalize_color};
pub use stylesheet::{CssRule, Declaration, PseudoKind, Specificity, Stylesheet};
