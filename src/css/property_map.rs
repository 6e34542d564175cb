//! Ordered CSS property map for inline-style assembly.
//!
//! Declaration order is preserved (IndexMap), so later writes by the
//! adaptation stages serialize after earlier ones, matching how browsers
//! resolve duplicate properties in a `style` attribute.

use indexmap::IndexMap;

/// An ordered property → value map for one element's inline styles.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PropertyMap {
    props: IndexMap<String, String>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `style` attribute string. Malformed segments are skipped.
    /// `!important` suffixes are dropped; importance is re-decided when the
    /// map is serialized.
    pub fn parse(style: &str) -> Self {
        let mut map = Self::new();
        for decl in style.split(';') {
            let Some((prop, value)) = decl.split_once(':') else {
                continue;
            };
            let prop = prop.trim().to_lowercase();
            let value = value.trim().replace(" !important", "");
            if !prop.is_empty() && !value.is_empty() {
                map.props.insert(prop, value);
            }
        }
        map
    }

    pub fn get(&self, prop: &str) -> Option<&str> {
        self.props.get(prop).map(|s| s.as_str())
    }

    pub fn set(&mut self, prop: &str, value: &str) {
        self.props.insert(prop.to_string(), value.to_string());
    }

    pub fn remove(&mut self, prop: &str) -> Option<String> {
        self.props.shift_remove(prop)
    }

    pub fn contains(&self, prop: &str) -> bool {
        self.props.contains_key(prop)
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &str) -> bool,
    {
        self.props.retain(|k, v| keep(k, v));
    }

    /// Serialize back to a `style` attribute string.
    pub fn to_style_string(&self) -> String {
        self.props
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Serialize, marking properties selected by `needs_important` with
    /// `!important`.
    pub fn to_style_string_with<F>(&self, needs_important: F) -> String
    where
        F: Fn(&str) -> bool,
    {
        self.props
            .iter()
            .map(|(k, v)| {
                if needs_important(k) {
                    format!("{k}: {v} !important")
                } else {
                    format!("{k}: {v}")
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Expand `margin`, `padding`, and `border` shorthands into longhands.
    ///
    /// Box shorthands expand for 1, 2, and 4 value forms; any other arity
    /// drops the shorthand. Expansion is skipped when a longhand is already
    /// present. `border` splits into width/style/color only with three or
    /// more parts.
    pub fn expand_shorthands(&mut self) {
        for base in ["margin", "padding"] {
            let top = format!("{base}-top");
            if let Some(value) = self.props.get(base).cloned()
                && !self.props.contains_key(&top)
            {
                let parts: Vec<&str> = value.split_whitespace().collect();
                let sides = [
                    format!("{base}-top"),
                    format!("{base}-right"),
                    format!("{base}-bottom"),
                    format!("{base}-left"),
                ];
                match parts.len() {
                    1 => {
                        for side in &sides {
                            self.props.insert(side.clone(), parts[0].to_string());
                        }
                    }
                    2 => {
                        self.props.insert(sides[0].clone(), parts[0].to_string());
                        self.props.insert(sides[2].clone(), parts[0].to_string());
                        self.props.insert(sides[1].clone(), parts[1].to_string());
                        self.props.insert(sides[3].clone(), parts[1].to_string());
                    }
                    4 => {
                        for (side, part) in sides.iter().zip(&parts) {
                            self.props.insert(side.clone(), part.to_string());
                        }
                    }
                    _ => {}
                }
                self.props.shift_remove(base);
            }
        }

        if let Some(value) = self.props.get("border").cloned()
            && !self.props.contains_key("border-width")
        {
            let parts: Vec<&str> = value.split(' ').collect();
            if parts.len() >= 3 {
                self.props
                    .insert("border-width".to_string(), parts[0].to_string());
                self.props
                    .insert("border-style".to_string(), parts[1].to_string());
                self.props
                    .insert("border-color".to_string(), parts[2..].join(" "));
            }
            self.props.shift_remove("border");
        }
    }
}

/// Values that carry no styling information and are dropped before inlining.
pub fn is_valid_style_value(value: &str) -> bool {
    let invalid = ["initial", "inherit", "unset", "auto", "none", "", "0px 0px 0px 0px"];
    !invalid.contains(&value) && value != "0"
}

/// Normalize `rgb(r, g, b)` colors to `#rrggbb` hex form.
pub fn normalize_color(color: &str) -> String {
    if let Some(inner) = color
        .strip_prefix("rgb(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let components: Vec<Option<u8>> = inner
            .split(',')
            .map(|n| n.trim().parse::<u8>().ok())
            .collect();
        if let [Some(r), Some(g), Some(b)] = components[..] {
            return format!("#{r:02x}{g:02x}{b:02x}");
        }
    }
    color.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialize() {
        let map = PropertyMap::parse("color: red; margin: 0 auto;");
        assert_eq!(map.get("color"), Some("red"));
        assert_eq!(map.get("margin"), Some("0 auto"));
        assert_eq!(map.to_style_string(), "color: red; margin: 0 auto");
    }

    #[test]
    fn test_parse_strips_important() {
        let map = PropertyMap::parse("color: red !important; font-size: 14px");
        assert_eq!(map.get("color"), Some("red"));
    }

    #[test]
    fn test_expand_single_value() {
        let mut map = PropertyMap::parse("margin: 8px");
        map.expand_shorthands();
        assert_eq!(map.get("margin"), None);
        for side in ["top", "right", "bottom", "left"] {
            assert_eq!(map.get(&format!("margin-{side}")), Some("8px"));
        }
    }

    #[test]
    fn test_expand_two_values() {
        let mut map = PropertyMap::parse("padding: 1em 2em");
        map.expand_shorthands();
        assert_eq!(map.get("padding-top"), Some("1em"));
        assert_eq!(map.get("padding-bottom"), Some("1em"));
        assert_eq!(map.get("padding-left"), Some("2em"));
        assert_eq!(map.get("padding-right"), Some("2em"));
    }

    #[test]
    fn test_expand_four_values() {
        let mut map = PropertyMap::parse("margin: 1px 2px 3px 4px");
        map.expand_shorthands();
        assert_eq!(map.get("margin-top"), Some("1px"));
        assert_eq!(map.get("margin-right"), Some("2px"));
        assert_eq!(map.get("margin-bottom"), Some("3px"));
        assert_eq!(map.get("margin-left"), Some("4px"));
    }

    #[test]
    fn test_three_value_shorthand_dropped() {
        let mut map = PropertyMap::parse("margin: 1px 2px 3px");
        map.expand_shorthands();
        assert_eq!(map.get("margin"), None);
        assert_eq!(map.get("margin-top"), None);
    }

    #[test]
    fn test_longhand_presence_blocks_expansion() {
        let mut map = PropertyMap::parse("margin-top: 5px; margin: 8px");
        map.expand_shorthands();
        assert_eq!(map.get("margin-top"), Some("5px"));
        assert_eq!(map.get("margin"), Some("8px"));
    }

    #[test]
    fn test_expand_border() {
        let mut map = PropertyMap::parse("border: 1px solid #ddd");
        map.expand_shorthands();
        assert_eq!(map.get("border"), None);
        assert_eq!(map.get("border-width"), Some("1px"));
        assert_eq!(map.get("border-style"), Some("solid"));
        assert_eq!(map.get("border-color"), Some("#ddd"));
    }

    #[test]
    fn test_border_two_parts_dropped() {
        let mut map = PropertyMap::parse("border: 1px solid");
        map.expand_shorthands();
        assert_eq!(map.get("border"), None);
        assert_eq!(map.get("border-width"), None);
    }

    #[test]
    fn test_normalize_color() {
        assert_eq!(normalize_color("rgb(255, 0, 0)"), "#ff0000");
        assert_eq!(normalize_color("rgb(52, 152, 219)"), "#3498db");
        assert_eq!(normalize_color("#123456"), "#123456");
        assert_eq!(normalize_color("rgb(bogus)"), "rgb(bogus)");
    }

    #[test]
    fn test_invalid_values() {
        assert!(!is_valid_style_value("initial"));
        assert!(!is_valid_style_value("0"));
        assert!(!is_valid_style_value("0px 0px 0px 0px"));
        assert!(is_valid_style_value("16px"));
    }

    #[test]
    fn test_important_serialization() {
        let map = PropertyMap::parse("color: red; overflow: hidden");
        let s = map.to_style_string_with(|p| p == "color");
        assert_eq!(s, "color: red !important; overflow: hidden");
    }
}
