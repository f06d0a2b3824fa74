use alloc::vec::Vec;

use crate::error::BitmapError;

/// A palette entry: 8-bit red, green, and blue.
pub type ColorRegister = rgb::RGB8;

/// Chunky element width for a given bitplane count.
///
/// Up to 8 planes fit a byte, up to 16 a `u16`, anything deeper a `u32`.
pub fn bytes_per_pixel_for_planes(num_planes: usize) -> usize {
    if num_planes <= 8 {
        1
    } else if num_planes <= 16 {
        2
    } else {
        4
    }
}

pub(crate) fn check_bytes_per_pixel(bpp: usize) -> Result<(), BitmapError> {
    match bpp {
        1 | 2 | 4 => Ok(()),
        other => Err(BitmapError::UnsupportedBytesPerPixel(other)),
    }
}

/// Allocate a zeroed buffer, reporting allocation failure instead of aborting.
pub(crate) fn alloc_zeroed(bytes: usize) -> Result<Vec<u8>, BitmapError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes)
        .map_err(|_| BitmapError::AllocationFailed { bytes })?;
    buf.resize(bytes, 0);
    Ok(buf)
}

/// Write the low `bpp` bytes of `value` as a native-endian element.
#[inline]
pub(crate) fn put_element(out: &mut [u8], bpp: usize, value: u32) {
    match bpp {
        1 => out[0] = value as u8,
        2 => out[..2].copy_from_slice(&(value as u16).to_ne_bytes()),
        _ => out[..4].copy_from_slice(&value.to_ne_bytes()),
    }
}

/// Read a native-endian element of `bpp` bytes.
#[inline]
pub(crate) fn get_element(data: &[u8], bpp: usize) -> u32 {
    match bpp {
        1 => u32::from(data[0]),
        2 => u32::from(u16::from_ne_bytes([data[0], data[1]])),
        _ => u32::from_ne_bytes([data[0], data[1], data[2], data[3]]),
    }
}
