use image::RgbaImage;
use palette::Srgb;

use crate::geom::PixelRect;

/// Fallback bubble base when there is nothing to sample.
pub fn neutral_gray() -> Srgb<u8> {
    Srgb::new(128, 128, 128)
}

pub fn average_image_color(image: &RgbaImage) -> Option<Srgb<u8>> {
    average_color(image, &PixelRect::full(image.width(), image.height()))
}

/// Mean color over the region, clipped to the image. `None` when the clip
/// is empty. Alpha is ignored; photos are effectively opaque.
pub fn average_color(image: &RgbaImage, region: &PixelRect) -> Option<Srgb<u8>> {
    let (x0, y0, x1, y1) = region.clip_to(image.width(), image.height())?;
    let mut sum_r = 0u64;
    let mut sum_g = 0u64;
    let mut sum_b = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            let [r, g, b, _] = image.get_pixel(x, y).0;
            sum_r += u64::from(r);
            sum_g += u64::from(g);
            sum_b += u64::from(b);
        }
    }
    let count = u64::from(x1 - x0) * u64::from(y1 - y0);
    Some(Srgb::new(
        round_div(sum_r, count),
        round_div(sum_g, count),
        round_div(sum_b, count),
    ))
}

fn round_div(sum: u64, count: u64) -> u8 {
    ((sum + count / 2) / count).min(255) as u8
}
