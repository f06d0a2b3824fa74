use alloc::vec::Vec;

use enough::Stop;

use crate::chunky::ChunkyBitmap;
use crate::dither::DitherKernel;
use crate::error::BitmapError;
use crate::limits::Limits;
use crate::pixel::{ColorRegister, bytes_per_pixel_for_planes};
use crate::planar::PlanarBitmap;

/// Most colors an indexed output frame can reference.
pub const MAX_PALETTE_COLORS: usize = 256;

/// How the pixel values of a planar frame are interpreted.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Up to eight planes of palette indices.
    Indexed,
    /// Six-plane Hold-And-Modify.
    Ham6,
    /// Eight-plane Hold-And-Modify.
    Ham8,
    /// 24 or more planes of direct color, red in planes 0-7.
    Deep,
}

impl SourceKind {
    /// Classify a frame by its plane count and HAM flag.
    pub fn of(planar: &PlanarBitmap) -> Result<Self, BitmapError> {
        let planes = planar.num_planes();
        if planar.ham {
            return match planes {
                6 => Ok(Self::Ham6),
                8 => Ok(Self::Ham8),
                n => Err(BitmapError::UnsupportedVariant(alloc::format!(
                    "HAM with {n} bitplanes"
                ))),
            };
        }
        match planes {
            0..=8 => Ok(Self::Indexed),
            24.. => Ok(Self::Deep),
            n => Err(BitmapError::UnsupportedVariant(alloc::format!(
                "{n} bitplanes without HAM"
            ))),
        }
    }

    /// Whether the frame must be quantized down to a palette.
    pub fn is_true_color(self) -> bool {
        !matches!(self, Self::Indexed)
    }
}

/// A frame ready for a palette-based encoder.
#[derive(Clone, Debug)]
pub struct PalettedFrame {
    /// One byte per pixel, indices into `palette`.
    pub pixels: ChunkyBitmap,
    /// At most [`MAX_PALETTE_COLORS`] entries.
    pub palette: Vec<ColorRegister>,
    pub transparent_color: Option<u8>,
    pub delay: u32,
    pub rate: u32,
    /// How many frames back this frame's delta applies to, for disposal.
    pub interleave: u8,
    /// How the source frame was interpreted.
    pub source: SourceKind,
}

/// Builder for converting one planar frame to a paletted chunky frame.
///
/// ```
/// use zenplanar::{ConvertRequest, PlanarBitmap, Unstoppable};
///
/// let mut planar = PlanarBitmap::new(16, 8, 4)?;
/// planar.palette = vec![Default::default(); 16];
/// planar.fill_bitplane(1, true)?;
///
/// let frame = ConvertRequest::new(&planar)
///     .with_scale(2, 2)
///     .convert(Unstoppable)?;
/// assert_eq!(frame.pixels.width(), 32);
/// assert!(frame.pixels.pixels().iter().all(|&p| p == 2));
/// # Ok::<(), zenplanar::BitmapError>(())
/// ```
#[derive(Clone, Debug)]
pub struct ConvertRequest<'a> {
    planar: &'a PlanarBitmap,
    scale_x: u32,
    scale_y: u32,
    dither: Option<DitherKernel>,
    palette: Option<&'a [ColorRegister]>,
    limits: Option<&'a Limits>,
}

impl<'a> ConvertRequest<'a> {
    pub fn new(planar: &'a PlanarBitmap) -> Self {
        Self {
            planar,
            scale_x: 1,
            scale_y: 1,
            dither: None,
            palette: None,
            limits: None,
        }
    }

    /// Replicate each pixel into a `scale_x` x `scale_y` block.
    pub fn with_scale(mut self, scale_x: u32, scale_y: u32) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    /// Select a diffusion kernel by numeric mode; see
    /// [`DitherKernel::from_mode`].
    pub fn with_dither(mut self, mode: i32) -> Self {
        self.dither = DitherKernel::from_mode(mode);
        self
    }

    pub fn with_kernel(mut self, kernel: Option<DitherKernel>) -> Self {
        self.dither = kernel;
        self
    }

    /// Palette that true-color frames are quantized to. Defaults to the
    /// frame's own palette. Indexed frames always keep their palette.
    pub fn with_palette(mut self, palette: &'a [ColorRegister]) -> Self {
        self.palette = Some(palette);
        self
    }

    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Run the conversion.
    pub fn convert(self, stop: impl Stop) -> Result<PalettedFrame, BitmapError> {
        self.convert_dyn(&stop)
    }

    fn convert_dyn(self, stop: &dyn Stop) -> Result<PalettedFrame, BitmapError> {
        let planar = self.planar;
        let source = SourceKind::of(planar)?;
        self.check_limits(source)?;
        tracing::debug!(
            width = planar.width(),
            height = planar.height(),
            planes = planar.num_planes(),
            ?source,
            scale_x = self.scale_x,
            scale_y = self.scale_y,
            "converting frame"
        );

        stop.check()?;
        let chunky = ChunkyBitmap::from_planar(planar, self.scale_x, self.scale_y)?;
        stop.check()?;

        let rgba = match source {
            SourceKind::Indexed => {
                let palette = &planar.palette[..planar.palette.len().min(MAX_PALETTE_COLORS)];
                return Ok(PalettedFrame {
                    pixels: chunky,
                    palette: palette.to_vec(),
                    transparent_color: planar.transparent_color,
                    delay: planar.delay,
                    rate: planar.rate,
                    interleave: planar.interleave,
                    source,
                });
            }
            SourceKind::Ham6 => chunky.ham6_to_rgb(&planar.palette)?,
            SourceKind::Ham8 => chunky.ham8_to_rgb(&planar.palette)?,
            SourceKind::Deep => chunky.deep_to_rgb()?,
        };
        drop(chunky);
        stop.check()?;

        let target = self.palette.unwrap_or(&planar.palette[..]);
        tracing::debug!(
            colors = target.len(),
            dither = ?self.dither,
            "quantizing true-color frame"
        );
        let pixels = rgba.rgb_to_palette_dyn(target, self.dither, stop)?;
        Ok(PalettedFrame {
            pixels,
            palette: target.to_vec(),
            // Source transparency refers to HAM codes or direct colors, not
            // to entries of the quantized palette.
            transparent_color: None,
            delay: planar.delay,
            rate: planar.rate,
            interleave: planar.interleave,
            source,
        })
    }

    fn check_limits(&self, source: SourceKind) -> Result<(), BitmapError> {
        let Some(limits) = self.limits else {
            return Ok(());
        };
        let planar = self.planar;
        let too_large = || BitmapError::DimensionsTooLarge {
            width: planar.width(),
            height: planar.height(),
        };
        let width = planar.width().checked_mul(self.scale_x).ok_or_else(too_large)?;
        let height = planar
            .height()
            .checked_mul(self.scale_y)
            .ok_or_else(too_large)?;
        limits.check(width, height)?;

        let bpp = if source.is_true_color() {
            4
        } else {
            bytes_per_pixel_for_planes(planar.num_planes())
        };
        let largest = u64::from(width) * u64::from(height) * bpp as u64;
        limits.check_memory(largest)
    }
}
