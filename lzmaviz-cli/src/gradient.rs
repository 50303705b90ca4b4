//! Colour gradients and truecolor escape sequences.

use std::fmt::Write as _;

/// Reset all terminal attributes.
pub const RESET: &str = "\x1b[0m";

/// Truecolor foreground escape for an RGB triple in [0, 1].
pub fn fg(r: f32, g: f32, b: f32) -> String {
    format!(
        "\x1b[38;2;{};{};{}m",
        (r * 255.0) as u8,
        (g * 255.0) as u8,
        (b * 255.0) as u8
    )
}

/// Truecolor background escape for an RGB triple in [0, 1].
pub fn bg(r: f32, g: f32, b: f32) -> String {
    format!(
        "\x1b[48;2;{};{};{}m",
        (r * 255.0) as u8,
        (g * 255.0) as u8,
        (b * 255.0) as u8
    )
}

/// A colour stop along the gradient.
#[derive(Debug, Clone, Copy)]
struct ColorPoint {
    r: f32,
    g: f32,
    b: f32,
    /// Position along the gradient, in [0, 1].
    val: f32,
}

/// A piecewise-linear colour gradient over [0, 1].
#[derive(Debug, Clone)]
pub struct ColorGradient {
    points: Vec<ColorPoint>,
}

impl ColorGradient {
    /// Four-point viridis-style gradient (dark violet to yellow).
    pub fn viridis() -> Self {
        let p = |hex: u32, val: f32| ColorPoint {
            r: ((hex >> 16) & 0xFF) as f32 / 255.0,
            g: ((hex >> 8) & 0xFF) as f32 / 255.0,
            b: (hex & 0xFF) as f32 / 255.0,
            val,
        };
        Self {
            points: vec![
                p(0x440255, 0.0),
                p(0x2C708E, 0.33),
                p(0x3DBB74, 0.66),
                p(0xFAE622, 1.0),
            ],
        }
    }

    /// Five-point heatmap gradient (black, blue, green, yellow, red).
    pub fn jet() -> Self {
        let p = |r, g, b, val| ColorPoint { r, g, b, val };
        Self {
            points: vec![
                p(0.0, 0.0, 0.0, 0.0),
                p(0.0, 0.0, 1.0, 0.2),
                p(0.0, 1.0, 0.0, 0.5),
                p(1.0, 1.0, 0.0, 0.7),
                p(1.0, 0.0, 0.0, 0.9),
            ],
        }
    }

    /// Sample the gradient at `value`, clamping past the last stop.
    pub fn color_at(&self, value: f32) -> (f32, f32, f32) {
        for (i, curr) in self.points.iter().enumerate() {
            if value < curr.val {
                let prev = self.points[i.saturating_sub(1)];
                let span = prev.val - curr.val;
                let fract = if span == 0.0 {
                    0.0
                } else {
                    (value - curr.val) / span
                };
                return (
                    (prev.r - curr.r) * fract + curr.r,
                    (prev.g - curr.g) * fract + curr.g,
                    (prev.b - curr.b) * fract + curr.b,
                );
            }
        }
        let last = self.points[self.points.len() - 1];
        (last.r, last.g, last.b)
    }

    /// Paint escape for one cell: gradient background with a contrasting
    /// (inverted) foreground.
    pub fn paint(&self, value: f32) -> String {
        let (r, g, b) = self.color_at(value);
        format!("{}{}", bg(r, g, b), fg(1.0 - r, 1.0 - g, 1.0 - b))
    }

    /// A `width`-cell ruler sweeping the gradient left to right.
    pub fn ruler(&self, width: usize) -> String {
        let mut out = String::new();
        for i in 0..width {
            let (r, g, b) = self.color_at(i as f32 / width as f32);
            let _ = write!(out, "{}━", fg(r, g, b));
        }
        out.push_str(RESET);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let grad = ColorGradient::viridis();
        let (r, g, b) = grad.color_at(0.0);
        assert!((r - 0x44 as f32 / 255.0).abs() < 1e-6);
        assert!((g - 0x02 as f32 / 255.0).abs() < 1e-6);
        assert!((b - 0x55 as f32 / 255.0).abs() < 1e-6);

        // At and past the top the last stop wins.
        let top = grad.color_at(1.0);
        let past = grad.color_at(2.0);
        assert_eq!(top, past);
    }

    #[test]
    fn test_interpolation_is_monotone_in_green() {
        // The viridis ramp brightens monotonically in green.
        let grad = ColorGradient::viridis();
        let mut prev = -1.0f32;
        for i in 0..=10 {
            let (_, g, _) = grad.color_at(i as f32 / 10.0);
            assert!(g >= prev);
            prev = g;
        }
    }

    #[test]
    fn test_escape_format() {
        assert_eq!(fg(1.0, 0.0, 0.0), "\x1b[38;2;255;0;0m");
        assert_eq!(bg(0.0, 0.0, 0.0), "\x1b[48;2;0;0;0m");
    }
}
