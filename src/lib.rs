//! # zenplanar
//!
//! Amiga-style bitplane images to palette-indexed chunky pixels.
//!
//! ## Pipeline
//!
//! 1. A container parser (not part of this crate) fills a [`PlanarBitmap`]
//!    per frame: bitplanes, palette, HAM flag, timing.
//! 2. [`ChunkyBitmap::from_planar`] unpacks the planes into one value per
//!    pixel, optionally replicating pixels by integer X/Y factors.
//! 3. HAM6/HAM8 and deep (24-plane) frames are decoded to RGBA.
//! 4. RGBA frames are mapped back to a palette of at most 256 colors,
//!    either nearest-color or with one of eight error-diffusion kernels.
//!
//! [`ConvertRequest`] runs all four steps for a frame and returns a
//! [`PalettedFrame`] for a GIF-style encoder.
//!
//! ## Exactness
//!
//! Quantization uses integer arithmetic only. Error diffusion accumulates
//! in 16.16 fixed point, truncates toward zero when applying error, and
//! clamps before matching, so dither patterns are reproducible bit for bit.
//!
//! ## Non-Goals
//!
//! - Parsing IFF/ILBM/ANIM containers or writing GIF files
//! - General image processing (filtering, resampling beyond replication)
//! - Multi-threaded conversion
//!
//! ## Usage
//!
//! ```
//! use zenplanar::{ChunkyBitmap, ColorRegister, DitherKernel, PlanarBitmap, Unstoppable};
//!
//! // One row of HAM6: load color 1, then set red to 0xFF.
//! let mut planar = PlanarBitmap::new(2, 1, 6)?;
//! planar.plane_row_mut(0, 0).unwrap()[0] = 0b1100_0000; // bit 0 of both pixels
//! planar.plane_row_mut(1, 0).unwrap()[0] = 0b0100_0000;
//! planar.plane_row_mut(2, 0).unwrap()[0] = 0b0100_0000;
//! planar.plane_row_mut(3, 0).unwrap()[0] = 0b0100_0000;
//! planar.plane_row_mut(5, 0).unwrap()[0] = 0b0100_0000;
//!
//! let mut palette = vec![ColorRegister::new(0, 0, 0); 16];
//! palette[1] = ColorRegister::new(0, 0, 255);
//!
//! let codes = ChunkyBitmap::from_planar(&planar, 1, 1)?;
//! assert_eq!(codes.pixels(), &[0x01, 0x2F]);
//!
//! let rgba = codes.ham6_to_rgb(&palette)?;
//! assert_eq!(rgba.pixels(), &[0, 0, 255, 255, 255, 0, 255, 255]);
//!
//! let indexed = rgba.rgb_to_palette(&palette, Some(DitherKernel::FloydSteinberg), Unstoppable)?;
//! assert_eq!(indexed.pixels()[0], 1);
//! # Ok::<(), zenplanar::BitmapError>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

mod error;
mod limits;
mod pixel;

pub mod chunky;
pub mod dither;
pub mod planar;
pub mod quantize;

mod convert;

// Re-exports
pub use chunky::ChunkyBitmap;
pub use convert::{ConvertRequest, MAX_PALETTE_COLORS, PalettedFrame, SourceKind};
pub use dither::{Diffuser, DitherKernel};
pub use enough::{Stop, Unstoppable};
pub use error::BitmapError;
pub use limits::Limits;
pub use pixel::{ColorRegister, bytes_per_pixel_for_planes};
pub use planar::PlanarBitmap;
pub use quantize::{nearest_color, nearest_color_in};

/// Convert a frame with default options: no scaling, no dithering, no limits.
pub fn convert(planar: &PlanarBitmap, stop: impl Stop) -> Result<PalettedFrame, BitmapError> {
    ConvertRequest::new(planar).convert(stop)
}
