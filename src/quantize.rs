//! Nearest palette color search.

use core::ops::Range;

use enough::Stop;

use crate::error::BitmapError;
use crate::pixel::ColorRegister;

/// Weighted squared distance between two colors.
///
/// Red and blue weights shift with the mean red level, a cheap
/// approximation of perceived difference ("redmean").
#[inline]
pub fn color_distance(a: ColorRegister, b: ColorRegister) -> i32 {
    let (r, g, bl) = (i32::from(a.r), i32::from(a.g), i32::from(a.b));
    let rmean = (r + i32::from(b.r)) / 2;
    let dx = r - i32::from(b.r);
    let dy = g - i32::from(b.g);
    let dz = bl - i32::from(b.b);
    (512 + rmean) * dx * dx + 1024 * dy * dy + (767 - rmean) * dz * dz
}

/// Index of the palette entry closest to `color`, searching all entries.
///
/// Returns 0 for an empty palette.
#[inline]
pub fn nearest_color(palette: &[ColorRegister], color: ColorRegister) -> usize {
    nearest_color_in(palette, color, 0..palette.len())
}

/// Index of the closest entry within `range`.
///
/// Entries are scanned in ascending order. Ties keep the lower index, and an
/// exact match returns immediately. The range is clipped to the palette; if
/// nothing is left to scan, `range.start` is returned.
pub fn nearest_color_in(
    palette: &[ColorRegister],
    color: ColorRegister,
    range: Range<usize>,
) -> usize {
    let first = range.start;
    let end = range.end.min(palette.len());
    let mut best = first;
    let mut best_dist = i32::MAX;

    for (i, &entry) in palette.iter().enumerate().take(end).skip(first) {
        let dist = color_distance(color, entry);
        if dist < best_dist {
            if dist == 0 {
                return i;
            }
            best_dist = dist;
            best = i;
        }
    }
    best
}

/// Map RGBA pixels to palette indices with no error carried between pixels.
pub(crate) fn quantize_rgba(
    src: &[u8],
    dest: &mut [u8],
    width: usize,
    palette: &[ColorRegister],
    stop: &dyn Stop,
) -> Result<(), BitmapError> {
    for (row_idx, (src_row, dest_row)) in src
        .chunks_exact(width * 4)
        .zip(dest.chunks_exact_mut(width))
        .enumerate()
    {
        if row_idx % 16 == 0 {
            stop.check()?;
        }
        for (px, out) in src_row.chunks_exact(4).zip(dest_row.iter_mut()) {
            let color = ColorRegister::new(px[0], px[1], px[2]);
            *out = nearest_color(palette, color) as u8;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb(r: u8, g: u8, b: u8) -> ColorRegister {
        ColorRegister::new(r, g, b)
    }

    #[test]
    fn green_weighs_more_than_blue() {
        let black = rgb(0, 0, 0);
        assert!(color_distance(black, rgb(0, 10, 0)) > color_distance(black, rgb(0, 0, 10)));
    }

    #[test]
    fn distance_is_zero_for_identical() {
        let c = rgb(12, 200, 99);
        assert_eq!(color_distance(c, c), 0);
    }

    #[test]
    fn range_is_respected() {
        let pal = [rgb(10, 10, 10), rgb(200, 200, 200), rgb(100, 100, 100)];
        assert_eq!(nearest_color(&pal, rgb(10, 10, 10)), 0);
        assert_eq!(nearest_color_in(&pal, rgb(10, 10, 10), 1..3), 2);
    }

    #[test]
    fn empty_range_returns_start() {
        let pal = [rgb(1, 2, 3)];
        assert_eq!(nearest_color_in(&pal, rgb(0, 0, 0), 5..9), 5);
        assert_eq!(nearest_color(&[], rgb(0, 0, 0)), 0);
    }
}
