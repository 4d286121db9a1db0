//! Symbol-to-color assignment for classification rendering.
//!
//! Well-known symbols (yes/no, seasons, months, gradings) have fixed colors
//! so the same workflow always renders the same way; everything else draws
//! from a rotating palette and is memoized for the lifetime of the map.

use std::collections::HashMap;

pub const DEFAULT_COLORS: [&str; 30] = [
    "#3366cc", "#dc3912", "#ff9900", "#109618", "#990099", "#0099c6", "#dd4477",
    "#66aa00", "#b82e2e", "#316395", "#994499", "#22aa99", "#aaaa11", "#6633cc",
    "#e67300", "#0c5922", "#bea413", "#668d1c", "#2a778d", "#a9c413", "#9c5935",
    "#f4359e", "#b91383", "#16d620", "#b77322", "#3b3eac", "#5574a6", "#329262",
    "#651067", "#8b0707",
];

/// Five-step gradient for graded symbols (very low .. very high).
const GRADIENT_COLORS_5: [&str; 5] = [
    DEFAULT_COLORS[0],
    DEFAULT_COLORS[3],
    "#EEDB42",
    DEFAULT_COLORS[2],
    DEFAULT_COLORS[1],
];

const COLOR_YIN: &str = DEFAULT_COLORS[3];
const COLOR_YANG: &str = DEFAULT_COLORS[2];

pub const MISSING_COLOR: &str = "#ffffff";

#[derive(Debug)]
pub struct ColorMap {
    map: HashMap<String, &'static str>,
    color_index: usize,
}

impl Default for ColorMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorMap {
    pub fn new() -> Self {
        let mut map = HashMap::new();
        let fixed: &[(&str, &'static str)] = &[
            ("yes", COLOR_YIN),
            ("no", COLOR_YANG),
            ("ok", COLOR_YIN),
            ("nok", COLOR_YANG),
            ("fail", COLOR_YANG),
            ("plus", COLOR_YIN),
            ("minus", COLOR_YANG),
            ("good", COLOR_YIN),
            ("bad", COLOR_YANG),
            ("true", COLOR_YIN),
            ("false", COLOR_YANG),
            ("very low", GRADIENT_COLORS_5[0]),
            ("low", GRADIENT_COLORS_5[1]),
            ("average", GRADIENT_COLORS_5[2]),
            ("medium", GRADIENT_COLORS_5[2]),
            ("high", GRADIENT_COLORS_5[3]),
            ("very high", GRADIENT_COLORS_5[4]),
            ("very cold", GRADIENT_COLORS_5[0]),
            ("cold", GRADIENT_COLORS_5[1]),
            ("mild", GRADIENT_COLORS_5[2]),
            ("hot", GRADIENT_COLORS_5[3]),
            ("very hot", GRADIENT_COLORS_5[4]),
            ("warm", GRADIENT_COLORS_5[3]),
            ("very warm", GRADIENT_COLORS_5[4]),
            ("january", DEFAULT_COLORS[0]),
            ("february", DEFAULT_COLORS[1]),
            ("march", DEFAULT_COLORS[2]),
            ("april", DEFAULT_COLORS[3]),
            ("may", DEFAULT_COLORS[4]),
            ("june", DEFAULT_COLORS[5]),
            ("july", DEFAULT_COLORS[6]),
            ("august", DEFAULT_COLORS[7]),
            ("september", DEFAULT_COLORS[8]),
            ("october", DEFAULT_COLORS[9]),
            ("november", DEFAULT_COLORS[10]),
            ("december", DEFAULT_COLORS[11]),
            ("winter", DEFAULT_COLORS[0]),
            ("spring", DEFAULT_COLORS[3]),
            ("summer", DEFAULT_COLORS[1]),
            ("fall", DEFAULT_COLORS[2]),
            ("mid-season", DEFAULT_COLORS[3]),
            ("intra", DEFAULT_COLORS[3]),
            ("q1", DEFAULT_COLORS[0]),
            ("q2", DEFAULT_COLORS[3]),
            ("q3", DEFAULT_COLORS[1]),
            ("q4", DEFAULT_COLORS[2]),
            ("day", DEFAULT_COLORS[3]),
            ("night", DEFAULT_COLORS[0]),
            ("monday", DEFAULT_COLORS[0]),
            ("tuesday", DEFAULT_COLORS[1]),
            ("wednesday", DEFAULT_COLORS[2]),
            ("thursday", DEFAULT_COLORS[3]),
            ("friday", DEFAULT_COLORS[4]),
            ("saturday", DEFAULT_COLORS[5]),
            ("sunday", DEFAULT_COLORS[6]),
        ];
        for (symbol, color) in fixed {
            map.insert((*symbol).to_string(), *color);
        }
        Self {
            map,
            color_index: 0,
        }
    }

    /// Color for a symbol. Case-insensitive; unknown symbols get the next
    /// palette color and keep it for subsequent calls. `None` maps to white.
    pub fn color(&mut self, symbol: Option<&str>) -> &'static str {
        let symbol = match symbol {
            Some(s) if !s.is_empty() => s.to_lowercase(),
            _ => return MISSING_COLOR,
        };
        if let Some(color) = self.map.get(&symbol).copied() {
            return color;
        }
        let color = DEFAULT_COLORS[self.color_index % DEFAULT_COLORS.len()];
        self.color_index += 1;
        self.map.insert(symbol, color);
        color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_symbols_are_stable() {
        let mut colors = ColorMap::new();
        assert_eq!(colors.color(Some("yes")), "#109618");
        assert_eq!(colors.color(Some("NO")), "#ff9900");
        assert_eq!(colors.color(Some("winter")), "#3366cc");
    }

    #[test]
    fn unknown_symbols_rotate_and_memoize() {
        let mut colors = ColorMap::new();
        let first = colors.color(Some("FR"));
        let second = colors.color(Some("BE"));
        assert_eq!(first, DEFAULT_COLORS[0]);
        assert_eq!(second, DEFAULT_COLORS[1]);
        assert_eq!(colors.color(Some("fr")), first);
    }

    #[test]
    fn missing_symbol_is_white() {
        let mut colors = ColorMap::new();
        assert_eq!(colors.color(None), "#ffffff");
        assert_eq!(colors.color(Some("")), "#ffffff");
    }
}
