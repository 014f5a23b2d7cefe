use palette::{FromColor, Hsv, Srgb};

const SATURATION_DROP: f32 = 0.4;
const MIN_SATURATION: f32 = 0.1;
const BRIGHTNESS_LIFT: f32 = 0.5;
const MAX_BRIGHTNESS: f32 = 0.95;

/// Lightened pastel version of the sampled color, used as the bubble fill.
/// Grayscale samples stay gray instead of picking up an arbitrary hue.
pub fn bubble_fill(sample: Srgb<u8>) -> Srgb<u8> {
    let rgb: Srgb<f32> = sample.into_format();
    let hsv = Hsv::from_color(rgb);
    let value = (hsv.value + BRIGHTNESS_LIFT).min(MAX_BRIGHTNESS);
    let lightened = if hsv.saturation <= f32::EPSILON {
        Hsv::new(hsv.hue, 0.0, value)
    } else {
        Hsv::new(
            hsv.hue,
            (hsv.saturation - SATURATION_DROP).max(MIN_SATURATION),
            value,
        )
    };
    Srgb::from_color(lightened).into_format()
}

/// Relative luminance in 0.0..=1.0 using the BT.601 weights.
pub fn luminance(color: Srgb<u8>) -> f32 {
    let rgb: Srgb<f32> = color.into_format();
    0.299 * rgb.red + 0.587 * rgb.green + 0.114 * rgb.blue
}

pub fn text_color_for(bubble: Srgb<u8>) -> Srgb<u8> {
    pick_text_color(luminance(bubble))
}

/// Black on light bubbles, white on dark ones. A tie at exactly 0.5 counts
/// as dark and keeps white text.
pub(crate) fn pick_text_color(luminance: f32) -> Srgb<u8> {
    if luminance > 0.5 {
        Srgb::new(0, 0, 0)
    } else {
        Srgb::new(255, 255, 255)
    }
}

pub fn to_hex(color: Srgb<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color.red, color.green, color.blue)
}
