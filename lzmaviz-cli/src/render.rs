//! Heat-map rendering of a traced decode.
//!
//! Pretty output paints each decoded byte on a gradient background scaled
//! by that byte's share of the stream's information, 64 bytes per row,
//! with per-row min/avg/max swatches and a periodic gradient ruler. Raw
//! output prints the normalised heat values one per line for piping into
//! other tools.

use crate::gradient::{ColorGradient, RESET};
use lzmaviz_lzma::DecodedStream;
use std::io::{self, Write};

/// Bytes per rendered row.
const ROW_WIDTH: usize = 64;

/// Rows between gradient rulers.
const RULER_EVERY: usize = 16;

/// Presentation switches, straight from the CLI flags.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Print normalised heat values instead of coloured text.
    pub raw: bool,
    /// Use the jet gradient instead of viridis.
    pub jet: bool,
    /// Colour by literal/copy origin instead of heat.
    pub literals: bool,
}

/// Render a traced decode to `out`.
pub fn render<W: Write>(out: &mut W, decoded: &DecodedStream, opts: &RenderOptions) -> io::Result<()> {
    let max_heat = decoded.max_heat().max(f32::MIN_POSITIVE);

    if opts.raw {
        for &h in &decoded.heat {
            writeln!(out, "{}", h / max_heat)?;
        }
        return Ok(());
    }

    let grad = if opts.jet {
        ColorGradient::jet()
    } else {
        ColorGradient::viridis()
    };

    let mut row_min = 1.0f32;
    let mut row_max = 0.0f32;
    let mut row_sum = 0.0f32;

    for (i, &byte) in decoded.data.iter().enumerate() {
        if i % ROW_WIDTH == 0 && (i / ROW_WIDTH) % RULER_EVERY == 0 {
            writeln!(out, "{}", grad.ruler(ROW_WIDTH))?;
        }

        // Square root stretches the low end, where most bytes live.
        let heat = (decoded.heat[i] / max_heat).sqrt();
        row_min = row_min.min(heat);
        row_max = row_max.max(heat);
        row_sum += heat;

        let shown = if opts.literals {
            if decoded.literals[i] { 1.0 } else { 0.0 }
        } else {
            heat
        };

        let ch = if byte.is_ascii_graphic() || byte == b' ' {
            byte as char
        } else {
            '.'
        };
        write!(out, "{}{}{}", grad.paint(shown), ch, RESET)?;

        if i % ROW_WIDTH == ROW_WIDTH - 1 {
            writeln!(
                out,
                " {} {} {} {}",
                grad.paint(row_min),
                grad.paint(row_sum / ROW_WIDTH as f32),
                grad.paint(row_max),
                RESET
            )?;
            row_min = 1.0;
            row_max = 0.0;
            row_sum = 0.0;
        }
    }
    writeln!(out)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lzmaviz_lzma::Termination;

    fn sample() -> DecodedStream {
        DecodedStream {
            data: b"Hi\x01".to_vec(),
            heat: vec![8.0, 2.0, 0.5],
            literals: vec![true, true, false],
            termination: Termination::WithMarker,
            corrupted: false,
        }
    }

    #[test]
    fn test_raw_mode_prints_normalised_values() {
        let mut out = Vec::new();
        let opts = RenderOptions {
            raw: true,
            jet: false,
            literals: false,
        };
        render(&mut out, &sample(), &opts).unwrap();

        let text = String::from_utf8(out).unwrap();
        let values: Vec<f32> = text.lines().map(|l| l.parse().unwrap()).collect();
        assert_eq!(values, vec![1.0, 0.25, 0.0625]);
    }

    #[test]
    fn test_pretty_mode_masks_unprintable_bytes() {
        let mut out = Vec::new();
        let opts = RenderOptions {
            raw: false,
            jet: false,
            literals: false,
        };
        render(&mut out, &sample(), &opts).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains('H'));
        assert!(text.contains('i'));
        assert!(text.contains('.'));
        assert!(!text.contains('\x01'));
        // One ruler up front.
        assert!(text.contains('━'));
    }

    #[test]
    fn test_empty_stream_renders_nothing_in_raw_mode() {
        let decoded = DecodedStream {
            data: Vec::new(),
            heat: Vec::new(),
            literals: Vec::new(),
            termination: Termination::WithoutMarker,
            corrupted: false,
        };
        let mut out = Vec::new();
        let opts = RenderOptions {
            raw: true,
            jet: true,
            literals: false,
        };
        render(&mut out, &decoded, &opts).unwrap();
        assert!(out.is_empty());
    }
}
