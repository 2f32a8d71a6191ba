//! RGB frame buffers and clip rectangles.

/// Inclusive pixel rectangle, the way visible areas are quoted for arcade
/// monitors (`0..255 x 8..247`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-config", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Rect {
    pub const fn new(min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    pub fn width(&self) -> i32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> i32 {
        self.max_y - self.min_y + 1
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Intersection of two rectangles, `None` when they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect {
            min_x: self.min_x.max(other.min_x),
            max_x: self.max_x.min(other.max_x),
            min_y: self.min_y.max(other.min_y),
            max_y: self.max_y.min(other.max_y),
        };
        (r.min_x <= r.max_x && r.min_y <= r.max_y).then_some(r)
    }
}

/// A 24-bit RGB frame buffer, one `0x00RRGGBB` word per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl Bitmap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Whole-bitmap rectangle.
    pub fn bounds(&self) -> Rect {
        Rect::new(0, self.width as i32 - 1, 0, self.height as i32 - 1)
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * self.width + x]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: u32) {
        self.pixels[y * self.width + x] = rgb;
    }

    pub fn row(&self, y: usize) -> &[u32] {
        &self.pixels[y * self.width..(y + 1) * self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u32] {
        &mut self.pixels[y * self.width..(y + 1) * self.width]
    }

    pub fn fill(&mut self, rgb: u32) {
        self.pixels.fill(rgb);
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.pixels
    }

    /// Copy `area` out as packed RGB888 bytes, e.g. for a PPM dump.
    pub fn to_rgb_bytes(&self, area: &Rect) -> Vec<u8> {
        let mut out = Vec::with_capacity((area.width() * area.height() * 3) as usize);
        for y in area.min_y..=area.max_y {
            for x in area.min_x..=area.max_x {
                let rgb = self.pixel(x as usize, y as usize);
                out.push((rgb >> 16) as u8);
                out.push((rgb >> 8) as u8);
                out.push(rgb as u8);
            }
        }
        out
    }

    /// FNV-1a over the pixels inside `area`; handy for comparing frames.
    pub fn checksum(&self, area: &Rect) -> u64 {
        let mut hash = 0xcbf2_9ce4_8422_2325u64;
        for y in area.min_y..=area.max_y {
            for &px in &self.row(y as usize)[area.min_x as usize..=area.max_x as usize] {
                hash ^= px as u64;
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
        }
        hash
    }
}
