//! Interleaved-bitplane bitmaps and planar to chunky unpacking.

use alloc::vec::Vec;

use crate::error::BitmapError;
use crate::pixel::{ColorRegister, alloc_zeroed, bytes_per_pixel_for_planes, put_element};

/// Maximum number of plane slots; valid plane counts are `0..MAX_PLANES`.
pub const MAX_PLANES: usize = 32;

/// Storage is always allocated for at least this many planes so the
/// byte-wide unpacking path can read eight planes unconditionally.
const MIN_ALLOCATED_PLANES: usize = 8;

/// One frame of planar image data plus the metadata the frame source
/// attaches to it.
///
/// Each plane is a 1-bit bitmap of `pitch * height` bytes, MSB first.
/// Planes are stored back to back in one buffer.
#[derive(Clone, Debug)]
pub struct PlanarBitmap {
    width: u32,
    height: u32,
    pitch: usize,
    num_planes: usize,
    data: Vec<u8>,
    planes: [Option<usize>; MAX_PLANES],
    /// Frame palette as loaded from the container.
    pub palette: Vec<ColorRegister>,
    /// Palette index treated as transparent, if any.
    pub transparent_color: Option<u8>,
    /// How many frames back an animation delta applies to.
    pub interleave: u8,
    /// Frame delay in container ticks.
    pub delay: u32,
    /// Playback rate (ticks per second) the delay is measured in.
    pub rate: u32,
    /// Pixels are Hold-And-Modify codes rather than palette indices.
    pub ham: bool,
}

impl PlanarBitmap {
    /// Allocate a zeroed bitmap with `num_planes` bitplanes.
    pub fn new(width: u32, height: u32, num_planes: usize) -> Result<Self, BitmapError> {
        if num_planes >= MAX_PLANES {
            return Err(BitmapError::InvalidPlaneCount(num_planes));
        }
        let pitch = planar_pitch(width);
        let plane_size = pitch
            .checked_mul(height as usize)
            .ok_or(BitmapError::DimensionsTooLarge { width, height })?;
        let total = plane_size
            .checked_mul(num_planes.max(MIN_ALLOCATED_PLANES))
            .ok_or(BitmapError::DimensionsTooLarge { width, height })?;
        let data = alloc_zeroed(total)?;

        let mut planes = [None; MAX_PLANES];
        for (i, slot) in planes.iter_mut().enumerate().take(num_planes) {
            *slot = Some(plane_size * i);
        }

        Ok(Self {
            width,
            height,
            pitch,
            num_planes,
            data,
            planes,
            palette: Vec::new(),
            transparent_color: None,
            interleave: 0,
            delay: 0,
            rate: 0,
            ham: false,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per scanline of a single plane, always even.
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn num_planes(&self) -> usize {
        self.num_planes
    }

    fn plane_size(&self) -> usize {
        self.pitch * self.height as usize
    }

    /// Bitplane `plane`, or `None` if the bitmap has fewer planes.
    pub fn plane(&self, plane: usize) -> Option<&[u8]> {
        let start = (*self.planes.get(plane)?)?;
        let size = self.plane_size();
        Some(&self.data[start..start + size])
    }

    /// Mutable bitplane `plane`, or `None` if the bitmap has fewer planes.
    pub fn plane_mut(&mut self, plane: usize) -> Option<&mut [u8]> {
        let start = (*self.planes.get(plane)?)?;
        let size = self.plane_size();
        Some(&mut self.data[start..start + size])
    }

    /// One scanline of bitplane `plane`.
    pub fn plane_row_mut(&mut self, plane: usize, y: u32) -> Option<&mut [u8]> {
        if y >= self.height {
            return None;
        }
        let pitch = self.pitch;
        let row = self.plane_mut(plane)?;
        Some(&mut row[y as usize * pitch..][..pitch])
    }

    /// Set every bit of `plane` to `set`.
    pub fn fill_bitplane(&mut self, plane: usize, set: bool) -> Result<(), BitmapError> {
        let num_planes = self.num_planes;
        let bits = self
            .plane_mut(plane)
            .ok_or(BitmapError::PlaneOutOfRange { plane, num_planes })?;
        bits.fill(if set { 0xFF } else { 0x00 });
        Ok(())
    }

    /// Unpack the bitplanes into packed pixels.
    ///
    /// Element width follows [`bytes_per_pixel_for_planes`]; multi-byte
    /// elements are native endian. Plane 0 supplies the least significant
    /// bit. `dest_row_padding` elements are skipped after each row so the
    /// output can sit inside a wider buffer. A bitmap with no planes leaves
    /// `dest` untouched.
    pub fn to_chunky(&self, dest: &mut [u8], dest_row_padding: usize) -> Result<(), BitmapError> {
        if self.num_planes == 0 || self.width == 0 || self.height == 0 {
            return Ok(());
        }
        let bpp = bytes_per_pixel_for_planes(self.num_planes);
        let w = self.width as usize;
        let h = self.height as usize;
        let too_large = || BitmapError::DimensionsTooLarge {
            width: self.width,
            height: self.height,
        };
        let row_stride = w
            .checked_add(dest_row_padding)
            .and_then(|r| r.checked_mul(bpp))
            .ok_or_else(too_large)?;
        let needed = row_stride
            .checked_mul(h - 1)
            .and_then(|n| n.checked_add(w * bpp))
            .ok_or_else(too_large)?;
        if dest.len() < needed {
            return Err(BitmapError::BufferTooSmall {
                needed,
                actual: dest.len(),
            });
        }

        if bpp == 1 {
            self.unpack_bytes(dest, row_stride);
        } else {
            self.unpack_wide(dest, row_stride, bpp);
        }
        Ok(())
    }

    /// Up to eight planes: transpose eight columns at a time, then finish the
    /// row bit by bit.
    fn unpack_bytes(&self, dest: &mut [u8], row_stride: usize) {
        let w = self.width as usize;
        let plane_size = self.plane_size();
        let groups = w >> 3;

        for (y, out) in dest
            .chunks_mut(row_stride)
            .take(self.height as usize)
            .enumerate()
        {
            let row_start = y * self.pitch;
            for gx in 0..groups {
                // Highest plane in the top byte so the transpose lands
                // plane 0 in bit 0 of each output pixel.
                let mut rows = [0u8; MIN_ALLOCATED_PLANES];
                for (p, row) in rows.iter_mut().rev().enumerate() {
                    *row = self.data[p * plane_size + row_start + gx];
                }
                let pixels = transpose8(u64::from_be_bytes(rows)).to_be_bytes();
                out[gx * 8..gx * 8 + 8].copy_from_slice(&pixels);
            }
            for (x, px) in out.iter_mut().enumerate().take(w).skip(groups * 8) {
                *px = self.pixel_at(row_start, x) as u8;
            }
        }
    }

    fn unpack_wide(&self, dest: &mut [u8], row_stride: usize, bpp: usize) {
        let w = self.width as usize;
        for (y, out) in dest
            .chunks_mut(row_stride)
            .take(self.height as usize)
            .enumerate()
        {
            let row_start = y * self.pitch;
            for (x, px) in out.chunks_exact_mut(bpp).take(w).enumerate() {
                put_element(px, bpp, self.pixel_at(row_start, x));
            }
        }
    }

    /// Assemble the pixel at column `x` of the scanline starting at `row_start`.
    #[inline]
    fn pixel_at(&self, row_start: usize, x: usize) -> u32 {
        let byte = row_start + (x >> 3);
        let bit = 7 - (x & 7);
        self.planes[..self.num_planes]
            .iter()
            .rev()
            .flatten()
            .fold(0u32, |acc, &base| {
                (acc << 1) | u32::from((self.data[base + byte] >> bit) & 1)
            })
    }
}

/// Scanline width in bytes for `width` pixels, rounded up to a 16-bit word.
pub fn planar_pitch(width: u32) -> usize {
    (width as usize).div_ceil(16) * 2
}

/// Transpose an 8x8 bit matrix stored big-endian, one row per byte with
/// column 0 in the MSB.
#[inline]
fn transpose8(mut x: u64) -> u64 {
    let mut t = (x ^ (x >> 7)) & 0x00AA_00AA_00AA_00AA;
    x ^= t ^ (t << 7);
    t = (x ^ (x >> 14)) & 0x0000_CCCC_0000_CCCC;
    x ^= t ^ (t << 14);
    t = (x ^ (x >> 28)) & 0x0000_0000_F0F0_F0F0;
    x ^= t ^ (t << 28);
    x
}
