use crate::geometry::Dim;

use serde::{Deserialize, Serialize};

/// An 8-bit-per-channel color with straight (non-premultiplied) alpha.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Self = Self::opaque(255, 255, 255);
    pub const BLACK: Self = Self::opaque(0, 0, 0);
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self::new(self.r, self.g, self.b, a)
    }

    /// Packs as `0xAARRGGBB`.
    #[inline]
    pub const fn to_argb(self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    #[inline]
    pub const fn from_argb(argb: u32) -> Self {
        Self::new((argb >> 16) as u8, (argb >> 8) as u8, argb as u8, (argb >> 24) as u8)
    }

    /// Source-over compositing of `src` onto `self`.
    #[inline]
    pub fn blend(self, src: Rgba) -> Rgba {
        match src.a {
            0 => self,
            255 => src,
            a => {
                let lerp = |d: u8, s: u8| -> u8 {
                    let (d, s, a) = (d as i32, s as i32, a as i32);
                    (d + (((s - d) * a + 127) / 255)) as u8
                };
                let out_a = self.a as i32 + ((255 - self.a as i32) * a as i32 + 127) / 255;
                Rgba::new(lerp(self.r, src.r), lerp(self.g, src.g), lerp(self.b, src.b), out_a as u8)
            }
        }
    }
}

/// How the alpha byte of each pixel is interpreted.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum PixelFormat {
    /// Alpha is meaningful.
    Argb,
    /// Alpha is ignored; every pixel is opaque.
    Rgb,
}

/// A 2D pixel buffer, one packed `0xAARRGGBB` word per pixel, stored row-major.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Raster {
    dim: Dim,
    format: PixelFormat,
    pixels: Vec<u32>,
}

impl Raster {
    /// A raster with every pixel set to zero (transparent black).
    pub fn new(dim: Dim, format: PixelFormat) -> Self {
        Self {
            dim,
            format,
            pixels: vec![0; dim.num_pixels()],
        }
    }

    pub fn filled(dim: Dim, format: PixelFormat, color: Rgba) -> Self {
        Self {
            dim,
            format,
            pixels: vec![color.to_argb(); dim.num_pixels()],
        }
    }

    /// Wraps existing pixel data. Returns `None` if the length does not match `dim`.
    pub fn from_pixels(dim: Dim, format: PixelFormat, pixels: Vec<u32>) -> Option<Self> {
        (pixels.len() == dim.num_pixels()).then(|| Self { dim, format, pixels })
    }

    #[inline]
    pub fn dim(&self) -> Dim {
        self.dim
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.dim.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.dim.height
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> Vec<u32> {
        self.pixels
    }

    /// The backing buffer viewed as bytes (native endianness).
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.pixels)
    }

    /// Size of the uncompressed pixel data.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<u32>()
    }

    pub fn fill(&mut self, color: Rgba) {
        self.pixels.fill(color.to_argb());
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.dim.width || y >= self.dim.height {
            return None;
        }
        Some(Rgba::from_argb(self.pixels[self.linearize(x, y)]))
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, color: Rgba) {
        if x < self.dim.width && y < self.dim.height {
            let i = self.linearize(x, y);
            self.pixels[i] = self.stored(color);
        }
    }

    /// Composites `color` over the pixel at `(x, y)`. Out-of-bounds coordinates are ignored.
    #[inline]
    pub fn blend(&mut self, x: i32, y: i32, color: Rgba) {
        if x < 0 || y < 0 || x as u32 >= self.dim.width || y as u32 >= self.dim.height {
            return;
        }
        let i = self.linearize(x as u32, y as u32);
        let dst = Rgba::from_argb(self.pixels[i]);
        self.pixels[i] = self.stored(dst.blend(color));
    }

    /// Number of pixels whose color differs from `background`.
    pub fn count_pixels_not(&self, background: Rgba) -> usize {
        let bg = self.stored(background);
        self.pixels.iter().filter(|&&p| p != bg).count()
    }

    #[inline]
    fn linearize(&self, x: u32, y: u32) -> usize {
        y as usize * self.dim.width as usize + x as usize
    }

    #[inline]
    fn stored(&self, color: Rgba) -> u32 {
        match self.format {
            PixelFormat::Argb => color.to_argb(),
            PixelFormat::Rgb => color.with_alpha(255).to_argb(),
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn argb_packing_round_trips() {
        let c = Rgba::new(1, 2, 3, 4);
        assert_eq!(c.to_argb(), 0x0401_0203);
        assert_eq!(Rgba::from_argb(c.to_argb()), c);
    }

    #[test]
    fn blend_half_black_over_white() {
        let out = Rgba::WHITE.blend(Rgba::BLACK.with_alpha(128));
        assert!(out.r > 120 && out.r < 135, "{:?}", out);
        assert_eq!(out.a, 255);
        assert_eq!(Rgba::WHITE.blend(Rgba::TRANSPARENT), Rgba::WHITE);
    }

    #[test]
    fn rgb_rasters_store_opaque_pixels() {
        let mut raster = Raster::new(Dim::new(2, 2), PixelFormat::Rgb);
        raster.set(1, 1, Rgba::new(10, 20, 30, 0));
        assert_eq!(raster.get(1, 1), Some(Rgba::opaque(10, 20, 30)));
        assert_eq!(raster.get(2, 0), None);
        assert_eq!(raster.as_bytes().len(), raster.byte_len());
    }
}
