//! Packed-pixel bitmaps: scaling, solid fills, and colorspace transforms.

use alloc::vec::Vec;

use enough::Stop;
use rgb::AsPixels as _;

use crate::dither::{DitherKernel, diffuse_rgba};
use crate::error::BitmapError;
use crate::pixel::{
    ColorRegister, alloc_zeroed, bytes_per_pixel_for_planes, check_bytes_per_pixel, get_element,
    put_element,
};
use crate::planar::PlanarBitmap;
use crate::quantize::quantize_rgba;

/// Palette entries a HAM6 image addresses.
pub const HAM6_PALETTE_SIZE: usize = 16;
/// Palette entries a HAM8 image addresses.
pub const HAM8_PALETTE_SIZE: usize = 64;

/// A bitmap with every pixel stored contiguously in 1, 2, or 4 bytes.
///
/// Multi-byte pixels are native-endian integers, except after an RGB
/// transform where each pixel is R, G, B, A bytes in that order.
///
/// The default value is the empty bitmap: zero dimensions, no buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkyBitmap {
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
    pitch: usize,
    pixels: Vec<u8>,
}

enum HamOp {
    Load(usize),
    Blue(u8),
    Red(u8),
    Green(u8),
    Keep,
}

impl ChunkyBitmap {
    /// Allocate a zeroed `width` x `height` bitmap.
    pub fn new(width: u32, height: u32, bytes_per_pixel: usize) -> Result<Self, BitmapError> {
        if width == 0 || height == 0 {
            return Err(BitmapError::InvalidDimensions { width, height });
        }
        check_bytes_per_pixel(bytes_per_pixel)?;
        let pitch = (width as usize)
            .checked_mul(bytes_per_pixel)
            .ok_or(BitmapError::DimensionsTooLarge { width, height })?;
        let size = pitch
            .checked_mul(height as usize)
            .ok_or(BitmapError::DimensionsTooLarge { width, height })?;
        Ok(Self {
            width,
            height,
            bytes_per_pixel,
            pitch,
            pixels: alloc_zeroed(size)?,
        })
    }

    /// Unpack `planar`, replicating each pixel into a `scale_x` x `scale_y`
    /// block.
    pub fn from_planar(
        planar: &PlanarBitmap,
        scale_x: u32,
        scale_y: u32,
    ) -> Result<Self, BitmapError> {
        if scale_x == 0 || scale_y == 0 {
            return Err(BitmapError::InvalidScale { scale_x, scale_y });
        }
        let too_large = || BitmapError::DimensionsTooLarge {
            width: planar.width(),
            height: planar.height(),
        };
        let width = planar.width().checked_mul(scale_x).ok_or_else(too_large)?;
        let height = planar.height().checked_mul(scale_y).ok_or_else(too_large)?;
        let mut out = Self::new(
            width,
            height,
            bytes_per_pixel_for_planes(planar.num_planes()),
        )?;
        // The unscaled image goes in the top-left corner; expand() spreads
        // it over the rest of the buffer.
        planar.to_chunky(&mut out.pixels, (width - planar.width()) as usize)?;
        out.expand(scale_x, scale_y)?;
        Ok(out)
    }

    /// A bitmap the size and depth of `other` with every pixel set to `color`.
    pub fn filled_like(other: &ChunkyBitmap, color: u32) -> Result<Self, BitmapError> {
        let mut out = Self::new(other.width, other.height, other.bytes_per_pixel)?;
        out.set_solid_color(color);
        Ok(out)
    }

    /// Move the contents out, leaving `self` empty.
    pub fn take(&mut self) -> Self {
        core::mem::take(self)
    }

    /// Whether this bitmap has no buffer (default or taken from).
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }

    /// Bytes per row, `width * bytes_per_pixel`.
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Bytes of row `y`.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        Some(&self.pixels[y as usize * self.pitch..][..self.pitch])
    }

    /// Pixel value at `(x, y)` as an integer of `bytes_per_pixel` bytes.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width {
            return None;
        }
        let bpp = self.bytes_per_pixel;
        let row = self.row(y)?;
        Some(get_element(&row[x as usize * bpp..], bpp))
    }

    /// Set every pixel to the low `bytes_per_pixel` bytes of `color`.
    pub fn set_solid_color(&mut self, color: u32) {
        match self.bytes_per_pixel {
            1 => self.pixels.fill(color as u8),
            bpp @ (2 | 4) => {
                let mut element = [0u8; 4];
                put_element(&mut element, bpp, color);
                for px in self.pixels.chunks_exact_mut(bpp) {
                    px.copy_from_slice(&element[..bpp]);
                }
            }
            _ => {}
        }
    }

    /// Replicate every pixel into a `scale_x` x `scale_y` block, in place.
    ///
    /// The buffer must already have the expanded size, with the unscaled
    /// image in its top-left corner at the expanded pitch. Rows are handled
    /// bottom to top and right to left, so no source pixel is overwritten
    /// before it has been read. Each source row is widened once into the
    /// bottom row of its block, which is then copied up for the rest.
    pub fn expand(&mut self, scale_x: u32, scale_y: u32) -> Result<(), BitmapError> {
        if scale_x == 0
            || scale_y == 0
            || self.width % scale_x != 0
            || self.height % scale_y != 0
        {
            return Err(BitmapError::InvalidScale { scale_x, scale_y });
        }
        if scale_x == 1 && scale_y == 1 {
            return Ok(());
        }

        let bpp = self.bytes_per_pixel;
        let pitch = self.pitch;
        let src_width = (self.width / scale_x) as usize;
        let src_height = (self.height / scale_y) as usize;
        let buf = &mut self.pixels;
        // One past the last byte not yet written.
        let mut dest = self.height as usize * pitch;

        for sy in (0..src_height).rev() {
            let src = sy * pitch;
            let mut copies = scale_y;
            let row_src = if scale_x != 1 {
                let mut element = [0u8; 4];
                for sx in (0..src_width).rev() {
                    element[..bpp].copy_from_slice(&buf[src + sx * bpp..][..bpp]);
                    for _ in 0..scale_x {
                        dest -= bpp;
                        buf[dest..dest + bpp].copy_from_slice(&element[..bpp]);
                    }
                }
                copies -= 1;
                dest
            } else {
                src
            };
            for _ in 0..copies {
                buf.copy_within(row_src..row_src + pitch, dest - pitch);
                dest -= pitch;
            }
        }
        Ok(())
    }

    /// Decode six-plane Hold-And-Modify codes to RGBA.
    ///
    /// The top nibble selects the operation: 0 loads `palette[code]`, 1/2/3
    /// replace blue/red/green with the low nibble scaled to 8 bits. The
    /// decoded color carries over from one row to the next.
    pub fn ham6_to_rgb(&self, palette: &[ColorRegister]) -> Result<Self, BitmapError> {
        self.ham_to_rgb(palette, HAM6_PALETTE_SIZE, |code| {
            let v = code & 0x0F;
            let intensity = v | (v << 4);
            match code & 0xF0 {
                0x00 => HamOp::Load(usize::from(code)),
                0x10 => HamOp::Blue(intensity),
                0x20 => HamOp::Red(intensity),
                0x30 => HamOp::Green(intensity),
                _ => HamOp::Keep,
            }
        })
    }

    /// Decode eight-plane Hold-And-Modify codes to RGBA.
    ///
    /// Same as [`ham6_to_rgb`](Self::ham6_to_rgb) with a two-bit operation
    /// and a six-bit value.
    pub fn ham8_to_rgb(&self, palette: &[ColorRegister]) -> Result<Self, BitmapError> {
        self.ham_to_rgb(palette, HAM8_PALETTE_SIZE, |code| {
            let v = code & 0x3F;
            let intensity = (v << 2) | (v >> 4);
            match code & 0xC0 {
                0x00 => HamOp::Load(usize::from(code)),
                0x40 => HamOp::Blue(intensity),
                0x80 => HamOp::Red(intensity),
                _ => HamOp::Green(intensity),
            }
        })
    }

    fn ham_to_rgb(
        &self,
        palette: &[ColorRegister],
        palette_size: usize,
        op: impl Fn(u8) -> HamOp,
    ) -> Result<Self, BitmapError> {
        if palette.len() < palette_size {
            return Err(BitmapError::PaletteTooSmall {
                needed: palette_size,
                actual: palette.len(),
            });
        }
        self.expect_bytes_per_pixel(1)?;
        let mut out = Self::new(self.width, self.height, 4)?;
        let mut color = palette[0];

        for (&code, dest) in self.pixels.iter().zip(out.pixels.chunks_exact_mut(4)) {
            match op(code) {
                HamOp::Load(index) => color = palette[index],
                HamOp::Blue(v) => color.b = v,
                HamOp::Red(v) => color.r = v,
                HamOp::Green(v) => color.g = v,
                HamOp::Keep => {}
            }
            dest.copy_from_slice(&[color.r, color.g, color.b, 0xFF]);
        }
        Ok(out)
    }

    /// Split deep (24 or 32 plane) pixels into RGBA.
    ///
    /// Bits 0-7 are red, 8-15 green, 16-23 blue; alpha is opaque.
    pub fn deep_to_rgb(&self) -> Result<Self, BitmapError> {
        self.expect_bytes_per_pixel(4)?;
        let mut out = Self::new(self.width, self.height, 4)?;
        for (src, dest) in self
            .pixels
            .chunks_exact(4)
            .zip(out.pixels.chunks_exact_mut(4))
        {
            let v = get_element(src, 4);
            dest.copy_from_slice(&[v as u8, (v >> 8) as u8, (v >> 16) as u8, 0xFF]);
        }
        Ok(out)
    }

    /// Map RGBA pixels to indices into `palette`.
    ///
    /// With no kernel each pixel takes its nearest color independently;
    /// otherwise quantization error is diffused with the given kernel.
    /// `palette` must hold between 1 and 256 entries.
    pub fn rgb_to_palette(
        &self,
        palette: &[ColorRegister],
        dither: Option<DitherKernel>,
        stop: impl Stop,
    ) -> Result<Self, BitmapError> {
        self.rgb_to_palette_dyn(palette, dither, &stop)
    }

    pub(crate) fn rgb_to_palette_dyn(
        &self,
        palette: &[ColorRegister],
        dither: Option<DitherKernel>,
        stop: &dyn Stop,
    ) -> Result<Self, BitmapError> {
        self.expect_bytes_per_pixel(4)?;
        if palette.is_empty() {
            return Err(BitmapError::EmptyPalette);
        }
        if palette.len() > 256 {
            return Err(BitmapError::PaletteTooLarge(palette.len()));
        }
        let mut out = Self::new(self.width, self.height, 1)?;
        let width = self.width as usize;
        match dither {
            None => quantize_rgba(&self.pixels, &mut out.pixels, width, palette, stop)?,
            Some(kernel) => {
                tracing::trace!(?kernel, colors = palette.len(), "error diffusion");
                diffuse_rgba(
                    &self.pixels,
                    &mut out.pixels,
                    width,
                    palette,
                    kernel.diffusers(),
                    stop,
                )?
            }
        }
        Ok(out)
    }

    /// View a 4-byte bitmap as RGBA pixels.
    pub fn rgba_pixels(&self) -> Result<&[rgb::RGBA8], BitmapError> {
        self.expect_bytes_per_pixel(4)?;
        Ok(self.pixels[..].as_pixels())
    }

    /// Zero-copy [`imgref::ImgRef`] over a 1-byte (indexed) bitmap.
    #[cfg(feature = "imgref")]
    pub fn as_indexed_imgref(&self) -> Result<imgref::ImgRef<'_, u8>, BitmapError> {
        self.expect_bytes_per_pixel(1)?;
        Ok(imgref::ImgRef::new(
            &self.pixels[..],
            self.width as usize,
            self.height as usize,
        ))
    }

    /// Zero-copy [`imgref::ImgRef`] over a 4-byte RGBA bitmap.
    #[cfg(feature = "imgref")]
    pub fn as_rgba_imgref(&self) -> Result<imgref::ImgRef<'_, rgb::RGBA8>, BitmapError> {
        let pixels = self.rgba_pixels()?;
        Ok(imgref::ImgRef::new(
            pixels,
            self.width as usize,
            self.height as usize,
        ))
    }

    fn expect_bytes_per_pixel(&self, expected: usize) -> Result<(), BitmapError> {
        if self.bytes_per_pixel != expected {
            return Err(BitmapError::LayoutMismatch {
                expected,
                actual: self.bytes_per_pixel,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn bitmap(width: u32, height: u32, bpp: usize, data: &[u8]) -> ChunkyBitmap {
        let mut bm = ChunkyBitmap::new(width, height, bpp).unwrap();
        bm.pixels_mut()[..data.len()].copy_from_slice(data);
        bm
    }

    #[test]
    fn new_is_zeroed_and_sized() {
        let bm = ChunkyBitmap::new(3, 2, 2).unwrap();
        assert_eq!(bm.pitch(), 6);
        assert_eq!(bm.pixels(), &[0u8; 12]);
    }

    #[test]
    fn new_rejects_bad_params() {
        assert!(matches!(
            ChunkyBitmap::new(3, 2, 3),
            Err(BitmapError::UnsupportedBytesPerPixel(3))
        ));
        assert!(matches!(
            ChunkyBitmap::new(0, 2, 1),
            Err(BitmapError::InvalidDimensions {
                width: 0,
                height: 2
            })
        ));
    }

    #[test]
    fn take_leaves_empty() {
        let mut a = ChunkyBitmap::new(4, 4, 1).unwrap();
        let b = a.take();
        assert!(a.is_empty());
        assert_eq!((a.width(), a.height(), a.pitch(), a.bytes_per_pixel()), (0, 0, 0, 0));
        assert_eq!(b.width(), 4);
        assert_eq!(b.pixels().len(), 16);
    }

    #[test]
    fn clone_is_independent() {
        let a = bitmap(2, 1, 1, &[1, 2]);
        let mut b = a.clone();
        b.pixels_mut()[0] = 9;
        assert_eq!(a.pixels(), &[1, 2]);
    }

    #[test]
    fn expand_horizontal_only() {
        // 2x1 source in a 6x1 buffer.
        let mut bm = bitmap(6, 1, 1, &[7, 8]);
        bm.expand(3, 1).unwrap();
        assert_eq!(bm.pixels(), &[7, 7, 7, 8, 8, 8]);
    }

    #[test]
    fn expand_vertical_only() {
        // 2x2 source rows at pitch 2, buffer for 2x6.
        let mut bm = bitmap(2, 6, 1, &[1, 2, 3, 4]);
        bm.expand(1, 3).unwrap();
        assert_eq!(bm.pixels(), &[1, 2, 1, 2, 1, 2, 3, 4, 3, 4, 3, 4]);
    }

    #[test]
    fn expand_wide_pixels() {
        let mut bm = ChunkyBitmap::new(4, 2, 4).unwrap();
        bm.pixels_mut()[..4].copy_from_slice(&0xDEAD_BEEFu32.to_ne_bytes());
        bm.pixels_mut()[4..8].copy_from_slice(&0x0102_0304u32.to_ne_bytes());
        bm.expand(2, 2).unwrap();
        for y in 0..2 {
            assert_eq!(bm.pixel(0, y), Some(0xDEAD_BEEF));
            assert_eq!(bm.pixel(1, y), Some(0xDEAD_BEEF));
            assert_eq!(bm.pixel(2, y), Some(0x0102_0304));
            assert_eq!(bm.pixel(3, y), Some(0x0102_0304));
        }
    }

    #[test]
    fn expand_rejects_zero() {
        let mut bm = ChunkyBitmap::new(2, 2, 1).unwrap();
        assert!(matches!(
            bm.expand(0, 1),
            Err(BitmapError::InvalidScale { .. })
        ));
    }

    #[test]
    fn ham6_unknown_op_keeps_color() {
        let pal: Vec<ColorRegister> = (0..16u8).map(|i| ColorRegister::new(i, i, i)).collect();
        // 0x45 only occurs with seven or more planes; it holds the color.
        let bm = bitmap(2, 1, 1, &[0x03, 0x45]);
        let out = bm.ham6_to_rgb(&pal).unwrap();
        assert_eq!(out.pixels(), &[3, 3, 3, 255, 3, 3, 3, 255]);
    }

    #[test]
    fn ham_requires_byte_pixels() {
        let pal = vec![ColorRegister::default(); 64];
        let bm = ChunkyBitmap::new(2, 1, 2).unwrap();
        assert!(matches!(
            bm.ham8_to_rgb(&pal),
            Err(BitmapError::LayoutMismatch {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn deep_splits_channels() {
        let mut bm = ChunkyBitmap::new(1, 1, 4).unwrap();
        bm.pixels_mut()
            .copy_from_slice(&0x00_30_20_10u32.to_ne_bytes());
        let out = bm.deep_to_rgb().unwrap();
        assert_eq!(out.pixels(), &[0x10, 0x20, 0x30, 0xFF]);
        assert_eq!(
            out.rgba_pixels().unwrap(),
            &[rgb::RGBA8::new(0x10, 0x20, 0x30, 0xFF)]
        );
    }
}
