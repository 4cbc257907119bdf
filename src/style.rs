use std::fmt;

use palette::{Hsl, IntoColor, Srgb};
use serde::Serialize;

/// Matplotlib-style marker codes, in assignment order.
pub const MARKERS: [&str; 11] = ["o", "v", "P", "*", "D", "X", "p", "3", "s", "x", "h"];

/// Number of distinct colours in a [`StyleCycle`].
pub const CYCLE_COLORS: usize = 14;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours as `#rrggbb`, using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<String> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            let rgb: Srgb<u8> = rgb.into_format();
            format!("#{:02x}{:02x}{:02x}", rgb.red, rgb.green, rgb.blue)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Plot style cycle
// ---------------------------------------------------------------------------

/// Colour and marker for one object's points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlotStyle {
    pub color: String,
    pub marker: &'static str,
}

impl fmt::Display for PlotStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.color, self.marker)
    }
}

/// Endless sequence of distinct styles: every marker for the first colour,
/// then every marker for the next, wrapping after the last combination.
#[derive(Debug, Clone)]
pub struct StyleCycle {
    colors: Vec<String>,
    next: usize,
}

impl StyleCycle {
    pub fn new() -> Self {
        Self::with_colors(CYCLE_COLORS)
    }

    pub fn with_colors(n: usize) -> Self {
        Self {
            colors: generate_palette(n.max(1)),
            next: 0,
        }
    }

    /// Distinct styles before the cycle repeats.
    pub fn period(&self) -> usize {
        self.colors.len() * MARKERS.len()
    }
}

impl Default for StyleCycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for StyleCycle {
    type Item = PlotStyle;

    fn next(&mut self) -> Option<PlotStyle> {
        let k = self.next % self.period();
        self.next += 1;
        Some(PlotStyle {
            color: self.colors[k / MARKERS.len()].clone(),
            marker: MARKERS[k % MARKERS.len()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn palette_is_distinct_hex() {
        let colors = generate_palette(CYCLE_COLORS);
        assert_eq!(colors.len(), CYCLE_COLORS);
        assert!(colors.iter().all(|c| c.len() == 7 && c.starts_with('#')));
        let unique: HashSet<_> = colors.iter().collect();
        assert_eq!(unique.len(), CYCLE_COLORS);
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn palette_hues_map_to_known_hex() {
        // hsl(0, 75%, 55%) and hsl(180, 75%, 55%)
        assert_eq!(generate_palette(1), vec!["#e23636".to_string()]);
        assert_eq!(
            generate_palette(2),
            vec!["#e23636".to_string(), "#36e2e2".to_string()]
        );
    }

    #[test]
    fn cycle_walks_markers_before_colors() {
        let styles: Vec<PlotStyle> = StyleCycle::new().take(12).collect();
        assert!(styles[..11].iter().all(|s| s.color == styles[0].color));
        assert_eq!(styles[0].marker, "o");
        assert_eq!(styles[10].marker, "h");
        assert_ne!(styles[11].color, styles[0].color);
        assert_eq!(styles[11].marker, "o");
    }

    #[test]
    fn cycle_is_distinct_for_a_full_period_then_repeats() {
        let mut cycle = StyleCycle::new();
        let period = cycle.period();
        assert_eq!(period, 154);
        let first: Vec<PlotStyle> = cycle.by_ref().take(period).collect();
        let unique: HashSet<_> = first.iter().map(|s| (s.color.clone(), s.marker)).collect();
        assert_eq!(unique.len(), period);
        assert_eq!(cycle.next().unwrap(), first[0]);
    }
}
