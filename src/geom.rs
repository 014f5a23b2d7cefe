use serde::Serialize;

/// Region in normalized image coordinates with a bottom-left origin:
/// `y` is the bottom edge and `y + h` the top edge, both in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl NormalizedRect {
    pub fn top(&self) -> f32 {
        self.y + self.h
    }

    pub fn union(&self, other: &NormalizedRect) -> NormalizedRect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.w).max(other.x + other.w);
        let y1 = self.top().max(other.top());
        NormalizedRect {
            x: x0,
            y: y0,
            w: x1 - x0,
            h: y1 - y0,
        }
    }

    /// Flips to a top-left origin while scaling to pixel units.
    pub fn to_pixels(&self, image_width: u32, image_height: u32) -> PixelRect {
        let width = image_width as f32;
        let height = image_height as f32;
        PixelRect {
            x: self.x * width,
            y: (1.0 - self.y - self.h) * height,
            w: self.w * width,
            h: self.h * height,
        }
    }
}

/// Region in pixel coordinates with the usual top-left image origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl PixelRect {
    pub fn full(image_width: u32, image_height: u32) -> PixelRect {
        PixelRect {
            x: 0.0,
            y: 0.0,
            w: image_width as f32,
            h: image_height as f32,
        }
    }

    pub fn expand(&self, pad_x: f32, pad_y: f32) -> PixelRect {
        PixelRect {
            x: self.x - pad_x,
            y: self.y - pad_y,
            w: self.w + pad_x * 2.0,
            h: self.h + pad_y * 2.0,
        }
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.w * 0.5
    }

    /// Integer bounds clamped to the image, or `None` when nothing overlaps.
    pub fn clip_to(&self, image_width: u32, image_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x.max(0.0) as u32;
        let y0 = self.y.max(0.0) as u32;
        let x1 = ((self.x + self.w).max(0.0) as u32).min(image_width);
        let y1 = ((self.y + self.h).max(0.0) as u32).min(image_height);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0, y0, x1, y1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_covers_both_boxes() {
        let a = NormalizedRect {
            x: 0.1,
            y: 0.5,
            w: 0.2,
            h: 0.1,
        };
        let b = NormalizedRect {
            x: 0.25,
            y: 0.3,
            w: 0.3,
            h: 0.1,
        };
        let merged = a.union(&b);
        assert_eq!(merged.x, 0.1);
        assert_eq!(merged.y, 0.3);
        assert!((merged.w - 0.45).abs() < 1e-6);
        assert!((merged.h - 0.3).abs() < 1e-6);
    }

    #[test]
    fn to_pixels_flips_the_vertical_axis() {
        let rect = NormalizedRect {
            x: 0.25,
            y: 0.6,
            w: 0.5,
            h: 0.2,
        };
        let px = rect.to_pixels(200, 100);
        assert_eq!(px.x, 50.0);
        // top edge at 0.8 normalized -> 20 px from the image top
        assert!((px.y - 20.0).abs() < 1e-4);
        assert_eq!(px.w, 100.0);
        assert!((px.h - 20.0).abs() < 1e-4);
    }

    #[test]
    fn expand_pads_every_side() {
        let rect = PixelRect {
            x: 50.0,
            y: 20.0,
            w: 100.0,
            h: 10.0,
        };
        let padded = rect.expand(8.0, 4.0);
        assert_eq!(padded.x, 42.0);
        assert_eq!(padded.y, 16.0);
        assert_eq!(padded.w, 116.0);
        assert_eq!(padded.h, 18.0);
    }

    #[test]
    fn clip_rejects_regions_outside_the_image() {
        let rect = PixelRect {
            x: 300.0,
            y: 10.0,
            w: 50.0,
            h: 50.0,
        };
        assert!(rect.clip_to(200, 100).is_none());

        let partial = PixelRect {
            x: 180.0,
            y: -10.0,
            w: 50.0,
            h: 50.0,
        };
        assert_eq!(partial.clip_to(200, 100), Some((180, 0, 200, 40)));
    }
}
