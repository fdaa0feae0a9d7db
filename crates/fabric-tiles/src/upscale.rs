use fabric_core::{Raster, Rect};

/// Fills `dst`, which shows `dst_world`, with the matching piece of `src`, which shows `src_world`, by nearest-neighbor
/// duplication of whole pixels. Pixels of `dst` that fall outside `src_world` are left untouched.
///
/// Returns `false` (and writes nothing) if the two worlds do not overlap.
pub fn upscale_from_ancestor(src: &Raster, src_world: Rect, dst: &mut Raster, dst_world: Rect) -> bool {
    if src_world.intersection(&dst_world).is_none() || src.width() == 0 || src.height() == 0 {
        return false;
    }

    // Maps a destination pixel index to the source pixel index, sampling at pixel centers.
    let map_axis = |dst_len: u32, dst_min: i32, dst_span: i32, src_len: u32, src_min: i32, src_span: i32| {
        (0..dst_len)
            .map(|i| {
                let world = dst_min as f64 + (i as f64 + 0.5) * dst_span as f64 / dst_len as f64;
                let s = ((world - src_min as f64) * src_len as f64 / src_span.max(1) as f64).floor();
                (s >= 0.0 && s < src_len as f64).then(|| s as usize)
            })
            .collect::<Vec<_>>()
    };
    let cols = map_axis(
        dst.width(),
        dst_world.x,
        dst_world.width,
        src.width(),
        src_world.x,
        src_world.width,
    );
    let rows = map_axis(
        dst.height(),
        dst_world.y,
        dst_world.height,
        src.height(),
        src_world.y,
        src_world.height,
    );

    let src_stride = src.width() as usize;
    let dst_stride = dst.width() as usize;
    let src_pixels = src.pixels();
    let dst_pixels = dst.pixels_mut();
    for (dy, sy) in rows.iter().enumerate() {
        let sy = match sy {
            Some(sy) => *sy,
            None => continue,
        };
        let src_row = &src_pixels[sy * src_stride..(sy + 1) * src_stride];
        let dst_row = &mut dst_pixels[dy * dst_stride..(dy + 1) * dst_stride];
        for (d, sx) in dst_row.iter_mut().zip(cols.iter()) {
            if let Some(sx) = sx {
                *d = src_row[*sx];
            }
        }
    }
    true
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
