#![no_main]
use libfuzzer_sys::fuzz_target;
use zenplanar::{ColorRegister, ConvertRequest, Limits, PlanarBitmap};

fuzz_target!(|data: &[u8]| {
    // Header: width, height, planes | ham << 7, scale, dither mode, palette length.
    let [w, h, planes, scale, dither, pal_len, rest @ ..] = data else {
        return;
    };
    let Ok(mut planar) = PlanarBitmap::new(u32::from(*w), u32::from(*h), usize::from(planes & 0x1F))
    else {
        return;
    };
    planar.ham = planes & 0x80 != 0;

    let pal_bytes = usize::from(*pal_len) * 3;
    let (pal, bits) = rest.split_at(pal_bytes.min(rest.len()));
    planar.palette = pal
        .chunks_exact(3)
        .map(|c| ColorRegister::new(c[0], c[1], c[2]))
        .collect();

    let mut bits = bits.iter().copied();
    for p in 0..planar.num_planes() {
        if let Some(plane) = planar.plane_mut(p) {
            for byte in plane.iter_mut() {
                *byte = bits.next().unwrap_or(0);
            }
        }
    }

    let limits = Limits {
        max_pixels: Some(1 << 20),
        ..Default::default()
    };
    // Must never panic
    let _ = ConvertRequest::new(&planar)
        .with_scale(u32::from(scale & 7), u32::from((scale >> 3) & 7))
        .with_dither(i32::from(*dither as i8))
        .with_limits(&limits)
        .convert(enough::Unstoppable);
});
