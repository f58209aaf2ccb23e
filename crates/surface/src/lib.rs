//! Caller-side pixel staging for window contents.
//!
//! A [`PixelSurface`] is a fixed-size grid of straight (not premultiplied)
//! RGBA8 pixels. Callers draw into it from any thread; the window loop reads
//! it when the window is flushed and clears it afterwards.

use geometry::{Extent, Point, Rect, ScreenPx};

/// An 8-bit-per-channel RGBA color.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    pub const RED: Self = Self::new(255, 0, 0, 255);
    pub const GREEN: Self = Self::new(0, 255, 0, 255);
    pub const BLUE: Self = Self::new(0, 0, 255, 255);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Packs the color as `0xAARRGGBB`.
    #[must_use]
    pub fn to_argb(self) -> u32 {
        u32::from_be_bytes([self.a, self.r, self.g, self.b])
    }
}

/// Number of bytes a pixel occupies in the RGBA8 byte layout.
pub const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("{len} bytes is not a whole number of {width}-pixel RGBA8 rows")]
    Misaligned { len: usize, width: u32 },
}

/// An owned rectangular buffer of pixels.
///
/// The dimensions are fixed when the surface is created. Resizing a window
/// does not resize its surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelSurface {
    width: u32,
    height: u32,
    pixels: Box<[Color]>,
}

impl PixelSurface {
    /// Creates a surface where every pixel is [`Color::TRANSPARENT`].
    #[must_use]
    pub fn new(extent: Extent<u32, ScreenPx>) -> Self {
        let count = extent.width as usize * extent.height as usize;
        Self {
            width: extent.width,
            height: extent.height,
            pixels: vec![Color::TRANSPARENT; count].into_boxed_slice(),
        }
    }

    /// Creates a surface from row-major RGBA8 bytes. The bytes are copied into
    /// the surface.
    pub fn from_rgba8(bytes: &[u8], width: u32) -> Result<Self, SurfaceError> {
        let row_stride = width as usize * BYTES_PER_PIXEL;
        if row_stride == 0 || bytes.len() % row_stride != 0 {
            return Err(SurfaceError::Misaligned {
                len: bytes.len(),
                width,
            });
        }

        let height = u32::try_from(bytes.len() / row_stride).map_err(|_| {
            SurfaceError::Misaligned {
                len: bytes.len(),
                width,
            }
        })?;

        let pixels = bytes
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|p| Color::new(p[0], p[1], p[2], p[3]))
            .collect();

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Creates a surface filled with a single color.
    #[must_use]
    pub fn filled(extent: Extent<u32, ScreenPx>, color: Color) -> Self {
        let mut surface = Self::new(extent);
        surface.pixels.fill(color);
        surface
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn extent(&self) -> Extent<u32, ScreenPx> {
        Extent::new(self.width, self.height)
    }

    #[inline]
    #[must_use]
    pub fn bounds(&self) -> Rect<u32, ScreenPx> {
        Rect::from_extent(self.extent())
    }

    #[inline]
    #[must_use]
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    #[inline]
    #[must_use]
    pub fn rows(&self) -> RowIter<'_> {
        RowIter {
            width: self.width as usize,
            cursor: 0,
            pixels: &self.pixels,
        }
    }

    /// Returns the pixel at `at`, or `None` if it lies outside the surface.
    #[must_use]
    pub fn pixel(&self, at: Point<u32, ScreenPx>) -> Option<Color> {
        self.index_of(at).map(|i| self.pixels[i])
    }

    /// Writes a single pixel. Writes outside the surface are ignored.
    ///
    /// ## Returns
    ///
    /// `true` if the pixel was written.
    pub fn set_pixel(&mut self, at: Point<u32, ScreenPx>, color: Color) -> bool {
        if let Some(i) = self.index_of(at) {
            self.pixels[i] = color;
            true
        } else {
            false
        }
    }

    /// Copies the top-left `region.extent()` pixels of `source` into this
    /// surface at `region.top_left()`.
    ///
    /// Pixels are overwritten, not blended. Anything that falls outside either
    /// surface is clipped.
    pub fn copy_region(&mut self, source: &PixelSurface, region: Rect<u32, ScreenPx>) {
        let origin = region.top_left();
        let extent = region.extent();

        let columns = extent
            .width
            .min(source.width)
            .min(self.width.saturating_sub(origin.x));
        let rows = extent
            .height
            .min(source.height)
            .min(self.height.saturating_sub(origin.y));

        if columns == 0 || rows == 0 {
            return;
        }

        let (columns, rows) = (columns as usize, rows as usize);
        let (origin_x, origin_y) = (origin.x as usize, origin.y as usize);
        let (source_width, width) = (source.width as usize, self.width as usize);

        for y in 0..rows {
            let from = y * source_width;
            let to = (origin_y + y) * width + origin_x;
            self.pixels[to..to + columns].copy_from_slice(&source.pixels[from..from + columns]);
        }
    }

    /// Resets every pixel to [`Color::TRANSPARENT`].
    pub fn clear(&mut self) {
        self.pixels.fill(Color::TRANSPARENT);
    }

    /// Returns the surface as row-major RGBA8 bytes.
    #[must_use]
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|c| [c.r, c.g, c.b, c.a])
            .collect()
    }

    #[inline]
    fn index_of(&self, at: Point<u32, ScreenPx>) -> Option<usize> {
        (at.x < self.width && at.y < self.height)
            .then(|| at.y as usize * self.width as usize + at.x as usize)
    }
}

pub struct RowIter<'a> {
    width: usize,
    cursor: usize,
    pixels: &'a [Color],
}

impl<'a> Iterator for RowIter<'a> {
    type Item = &'a [Color];

    fn next(&mut self) -> Option<Self::Item> {
        if self.width == 0 || self.cursor >= self.pixels.len() {
            return None;
        }

        let row = &self.pixels[self.cursor..self.cursor + self.width];
        self.cursor += self.width;
        Some(row)
    }
}
