//! Error-diffusion dithering to a fixed palette.
//!
//! Quantization error is kept in 16.16 fixed point, so a kernel weight of
//! 65536 passes the whole residual on. Results are bit-exact across
//! platforms: all arithmetic is integer.

use alloc::vec::Vec;

use enough::Stop;

use crate::error::BitmapError;
use crate::pixel::ColorRegister;
use crate::quantize::nearest_color;

/// Rows of error the engine tracks: the current row and two ahead.
pub const ERROR_ROWS: usize = 3;

/// One weight of a diffusion kernel and every neighbor that receives it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Diffuser {
    /// Fraction of the residual in 16.16 fixed point.
    pub weight: i32,
    /// `(dx, dy)` offsets from the current pixel; `dy` is below `ERROR_ROWS`.
    pub targets: &'static [(i32, usize)],
}

const fn d(weight: i32, targets: &'static [(i32, usize)]) -> Diffuser {
    Diffuser { weight, targets }
}

/// ```text
///        X   7
///    3   5   1      (/16)
/// ```
pub const FLOYD_STEINBERG: &[Diffuser] = &[
    d(28672, &[(1, 0)]),
    d(12288, &[(-1, 1)]),
    d(20480, &[(0, 1)]),
    d(4096, &[(1, 1)]),
];

/// ```text
///            X   7   5
///    3   5   7   5   3
///    1   3   5   3   1  (/48)
/// ```
pub const JARVIS_JUDICE_NINKE: &[Diffuser] = &[
    d(9557, &[(1, 0), (0, 1)]),
    d(6826, &[(2, 0), (-1, 1), (1, 1), (0, 2)]),
    d(4096, &[(-2, 1), (2, 1), (-1, 2), (1, 2)]),
    d(1365, &[(-2, 2), (2, 2)]),
];

/// ```text
///            X   8   4
///    2   4   8   4   2
///    1   2   4   2   1  (/42)
/// ```
pub const STUCKI: &[Diffuser] = &[
    d(12483, &[(1, 0), (0, 1)]),
    d(6241, &[(2, 0), (-1, 1), (1, 1), (0, 2)]),
    d(3120, &[(-2, 1), (2, 1), (-1, 2), (1, 2)]),
    d(1560, &[(-2, 2), (2, 2)]),
];

/// Six neighbors at 1/8 each; a quarter of the error is dropped.
pub const ATKINSON: &[Diffuser] = &[d(
    8192,
    &[(1, 0), (2, 0), (-1, 1), (0, 1), (1, 1), (0, 2)],
)];

/// ```text
///            X   8   4
///    2   4   8   4   2  (/32)
/// ```
pub const BURKES: &[Diffuser] = &[
    d(16384, &[(1, 0), (0, 1)]),
    d(8192, &[(2, 0), (-1, 1), (1, 1)]),
    d(4096, &[(-2, 1), (2, 1)]),
];

/// ```text
///            X   5   3
///    2   4   5   4   2
///        2   3   2      (/32)
/// ```
pub const SIERRA3: &[Diffuser] = &[
    d(10240, &[(1, 0), (0, 1)]),
    d(8192, &[(-1, 1), (1, 1)]),
    d(6144, &[(2, 0), (0, 2)]),
    d(4096, &[(-2, 1), (2, 1), (-1, 2), (1, 2)]),
];

/// ```text
///            X   4   3
///    1   2   3   2   1  (/16)
/// ```
pub const SIERRA2: &[Diffuser] = &[
    d(16384, &[(1, 0)]),
    d(12288, &[(2, 0), (0, 1)]),
    d(8192, &[(-1, 1), (1, 1)]),
    d(4096, &[(-2, 1), (2, 1)]),
];

/// ```text
///        X   2
///    1   1          (/4)
/// ```
pub const SIERRA_LITE: &[Diffuser] = &[d(32768, &[(1, 0)]), d(16384, &[(-1, 1), (0, 1)])];

/// Named error-diffusion kernels, in dither-mode order.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DitherKernel {
    FloydSteinberg,
    JarvisJudiceNinke,
    Stucki,
    Atkinson,
    Burkes,
    Sierra3,
    Sierra2,
    SierraLite,
}

impl DitherKernel {
    /// Every kernel, indexed by `mode - 1`.
    pub const ALL: [DitherKernel; 8] = [
        Self::FloydSteinberg,
        Self::JarvisJudiceNinke,
        Self::Stucki,
        Self::Atkinson,
        Self::Burkes,
        Self::Sierra3,
        Self::Sierra2,
        Self::SierraLite,
    ];

    /// Kernel for a numeric dither mode.
    ///
    /// Mode 1 is Floyd-Steinberg. Zero, negative, and out-of-range modes
    /// mean no dithering and return `None`.
    pub fn from_mode(mode: i32) -> Option<Self> {
        if mode <= 0 {
            return None;
        }
        Self::ALL.get(mode as usize - 1).copied()
    }

    /// The numeric mode selecting this kernel.
    pub fn mode(self) -> i32 {
        Self::ALL
            .iter()
            .position(|&k| k == self)
            .map_or(0, |i| i as i32 + 1)
    }

    pub fn diffusers(self) -> &'static [Diffuser] {
        match self {
            Self::FloydSteinberg => FLOYD_STEINBERG,
            Self::JarvisJudiceNinke => JARVIS_JUDICE_NINKE,
            Self::Stucki => STUCKI,
            Self::Atkinson => ATKINSON,
            Self::Burkes => BURKES,
            Self::Sierra3 => SIERRA3,
            Self::Sierra2 => SIERRA2,
            Self::SierraLite => SIERRA_LITE,
        }
    }

    /// Total fixed-point weight handed out per pixel; at most 65536.
    pub fn total_weight(self) -> i32 {
        self.diffusers()
            .iter()
            .map(|e| e.weight * e.targets.len() as i32)
            .sum()
    }
}

type ErrorRow = Vec<[i32; 3]>;

/// Error accumulators for the current row and the two rows below it.
struct ErrorRows {
    rows: [ErrorRow; ERROR_ROWS],
}

impl ErrorRows {
    fn new(width: usize) -> Result<Self, BitmapError> {
        let alloc_row = || -> Result<ErrorRow, BitmapError> {
            let mut row = Vec::new();
            row.try_reserve_exact(width)
                .map_err(|_| BitmapError::AllocationFailed {
                    bytes: width * core::mem::size_of::<[i32; 3]>(),
                })?;
            row.resize(width, [0; 3]);
            Ok(row)
        };
        Ok(Self {
            rows: [alloc_row()?, alloc_row()?, alloc_row()?],
        })
    }

    /// Spread `residual` from column `x` using `kernel`. Columns outside
    /// the row are dropped.
    fn diffuse(&mut self, kernel: &[Diffuser], x: usize, residual: [i32; 3]) {
        let width = self.rows[0].len();
        for entry in kernel {
            let weighted = residual.map(|c| c * entry.weight);
            for &(dx, dy) in entry.targets {
                let Some(xx) = x.checked_add_signed(dx as isize) else {
                    continue;
                };
                if xx >= width {
                    continue;
                }
                let acc = &mut self.rows[dy][xx];
                acc[0] += weighted[0];
                acc[1] += weighted[1];
                acc[2] += weighted[2];
            }
        }
    }

    /// Row 1 becomes row 0, row 2 becomes row 1, and row 2 starts fresh.
    fn advance(&mut self) {
        self.rows.rotate_left(1);
        self.rows[ERROR_ROWS - 1].fill([0; 3]);
    }
}

/// Quantize RGBA pixels to `palette`, diffusing error with `kernel`.
///
/// `palette` must be non-empty.
pub(crate) fn diffuse_rgba(
    src: &[u8],
    dest: &mut [u8],
    width: usize,
    palette: &[ColorRegister],
    kernel: &[Diffuser],
    stop: &dyn Stop,
) -> Result<(), BitmapError> {
    let mut error = ErrorRows::new(width)?;

    for (row_idx, (src_row, dest_row)) in src
        .chunks_exact(width * 4)
        .zip(dest.chunks_exact_mut(width))
        .enumerate()
    {
        if row_idx % 16 == 0 {
            stop.check()?;
        }
        for (x, (px, out)) in src_row.chunks_exact(4).zip(dest_row.iter_mut()).enumerate() {
            // Clamp before quantizing so an over- or under-shot value cannot
            // feed its excess back into the neighbors.
            let acc = error.rows[0][x];
            let wanted = [
                (i32::from(px[0]) + acc[0] / 65536).clamp(0, 255),
                (i32::from(px[1]) + acc[1] / 65536).clamp(0, 255),
                (i32::from(px[2]) + acc[2] / 65536).clamp(0, 255),
            ];
            let color = ColorRegister::new(wanted[0] as u8, wanted[1] as u8, wanted[2] as u8);
            let index = nearest_color(palette, color);
            *out = index as u8;

            let got = palette[index];
            let residual = [
                wanted[0] - i32::from(got.r),
                wanted[1] - i32::from(got.g),
                wanted[2] - i32::from(got.b),
            ];
            error.diffuse(kernel, x, residual);
        }
        error.advance();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use enough::Unstoppable;

    #[test]
    fn weights_never_exceed_unity() {
        for kernel in DitherKernel::ALL {
            assert!(
                kernel.total_weight() <= 65536,
                "{kernel:?} hands out {}",
                kernel.total_weight()
            );
        }
        assert_eq!(DitherKernel::FloydSteinberg.total_weight(), 65536);
        assert_eq!(DitherKernel::Atkinson.total_weight(), 49152);
    }

    #[test]
    fn targets_stay_within_tracked_rows() {
        for kernel in DitherKernel::ALL {
            for entry in kernel.diffusers() {
                for &(dx, dy) in entry.targets {
                    assert!(dy < ERROR_ROWS);
                    assert!(dx != 0 || dy != 0, "{kernel:?} targets itself");
                    // Nothing may flow back to already-visited pixels.
                    assert!(dy > 0 || dx > 0);
                }
            }
        }
    }

    #[test]
    fn mode_mapping() {
        assert_eq!(DitherKernel::from_mode(0), None);
        assert_eq!(DitherKernel::from_mode(-3), None);
        assert_eq!(DitherKernel::from_mode(9), None);
        assert_eq!(
            DitherKernel::from_mode(1),
            Some(DitherKernel::FloydSteinberg)
        );
        assert_eq!(DitherKernel::from_mode(4), Some(DitherKernel::Atkinson));
        assert_eq!(DitherKernel::from_mode(5), Some(DitherKernel::Burkes));
        assert_eq!(DitherKernel::from_mode(8), Some(DitherKernel::SierraLite));
        for kernel in DitherKernel::ALL {
            assert_eq!(DitherKernel::from_mode(kernel.mode()), Some(kernel));
        }
    }

    #[test]
    fn edge_targets_are_dropped() {
        let mut rows = ErrorRows::new(2).unwrap();
        rows.diffuse(FLOYD_STEINBERG, 0, [16, 0, 0]);
        // (-1, 1) falls off the left edge; nothing wraps to column 1.
        assert_eq!(rows.rows[0][1][0], 16 * 28672);
        assert_eq!(rows.rows[1][0][0], 16 * 20480);
        assert_eq!(rows.rows[1][1][0], 16 * 4096);

        let mut rows = ErrorRows::new(2).unwrap();
        rows.diffuse(FLOYD_STEINBERG, 1, [16, 0, 0]);
        assert_eq!(rows.rows[0][0][0], 0);
        assert_eq!(rows.rows[1][0][0], 16 * 12288);
        assert_eq!(rows.rows[1][1][0], 16 * 20480);
        let delivered: i32 = rows.rows.iter().flatten().map(|c| c[0]).sum();
        assert!(delivered <= 16 * 65536);
    }

    #[test]
    fn advance_rotates_and_clears() {
        let mut rows = ErrorRows::new(1).unwrap();
        rows.rows[1][0] = [1, 2, 3];
        rows.rows[2][0] = [4, 5, 6];
        rows.advance();
        assert_eq!(rows.rows[0][0], [1, 2, 3]);
        assert_eq!(rows.rows[1][0], [4, 5, 6]);
        assert_eq!(rows.rows[2][0], [0, 0, 0]);
    }

    #[test]
    fn kernel_tables_spread_exact_weights() {
        // Unit red residual from the middle of a 5-wide row; columns are
        // dx = -2..=2, rows dy = 0..=2.
        let cases: [(DitherKernel, [[i32; 5]; 3]); 8] = [
            (
                DitherKernel::FloydSteinberg,
                [
                    [0, 0, 0, 28672, 0],
                    [0, 12288, 20480, 4096, 0],
                    [0; 5],
                ],
            ),
            (
                DitherKernel::JarvisJudiceNinke,
                [
                    [0, 0, 0, 9557, 6826],
                    [4096, 6826, 9557, 6826, 4096],
                    [1365, 4096, 6826, 4096, 1365],
                ],
            ),
            (
                DitherKernel::Stucki,
                [
                    [0, 0, 0, 12483, 6241],
                    [3120, 6241, 12483, 6241, 3120],
                    [1560, 3120, 6241, 3120, 1560],
                ],
            ),
            (
                DitherKernel::Atkinson,
                [
                    [0, 0, 0, 8192, 8192],
                    [0, 8192, 8192, 8192, 0],
                    [0, 0, 8192, 0, 0],
                ],
            ),
            (
                DitherKernel::Burkes,
                [
                    [0, 0, 0, 16384, 8192],
                    [4096, 8192, 16384, 8192, 4096],
                    [0; 5],
                ],
            ),
            (
                DitherKernel::Sierra3,
                [
                    [0, 0, 0, 10240, 6144],
                    [4096, 8192, 10240, 8192, 4096],
                    [0, 4096, 6144, 4096, 0],
                ],
            ),
            (
                DitherKernel::Sierra2,
                [
                    [0, 0, 0, 16384, 12288],
                    [4096, 8192, 12288, 8192, 4096],
                    [0; 5],
                ],
            ),
            (
                DitherKernel::SierraLite,
                [
                    [0, 0, 0, 32768, 0],
                    [0, 16384, 16384, 0, 0],
                    [0; 5],
                ],
            ),
        ];
        for (kernel, expected) in cases {
            let mut rows = ErrorRows::new(5).unwrap();
            rows.diffuse(kernel.diffusers(), 2, [1, 0, 0]);
            for (dy, want) in expected.iter().enumerate() {
                let red: Vec<i32> = rows.rows[dy].iter().map(|c| c[0]).collect();
                assert_eq!(red, want.to_vec(), "{kernel:?} row {dy}");
                assert!(rows.rows[dy].iter().all(|c| c[1] == 0 && c[2] == 0));
            }
        }
    }

    #[test]
    fn mid_gray_alternates_on_black_white() {
        let palette = [ColorRegister::new(0, 0, 0), ColorRegister::new(255, 255, 255)];
        let src = [128u8, 128, 128, 255].repeat(4);
        let mut dest = vec![0u8; 4];
        diffuse_rgba(&src, &mut dest, 4, &palette, SIERRA_LITE, &Unstoppable).unwrap();
        // 128 -> white (residual -127), next sees 128 - 63 = 65 -> black, ...
        assert_eq!(dest, vec![1, 0, 1, 0]);
    }
}
