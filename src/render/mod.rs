use anyhow::Result;
use image::RgbaImage;
use palette::Srgb;
use tracing::debug;

use crate::group::TextGroup;
use crate::ocr::TextObservation;
use crate::photo::Photo;
use crate::sampler;

mod color;
mod fit;
mod font;
mod svg;

pub use color::{bubble_fill, luminance, text_color_for, to_hex};
pub use font::{FontMetrics, ResolvedFont, resolve_font};

/// Everything needed to draw one bubble: the group it covers, the
/// translation, the shared palette and the fitted type size.
pub struct RenderPlan {
    pub group: TextGroup,
    pub translated_text: String,
    pub bubble_color: Srgb<u8>,
    pub text_color: Srgb<u8>,
    pub font_size: f32,
    pub(crate) lines: Vec<String>,
    pub(crate) line_height: f32,
}

/// Draws translated text bubbles over a photo. Works without font metrics
/// too, falling back to width heuristics for fitting.
#[derive(Clone)]
pub struct BubbleRenderer {
    font: Option<FontMetrics>,
    family: Option<String>,
}

impl BubbleRenderer {
    pub fn new(font: Option<ResolvedFont>) -> BubbleRenderer {
        match font {
            Some(resolved) => BubbleRenderer {
                font: Some(resolved.metrics),
                family: Some(resolved.family),
            },
            None => BubbleRenderer {
                font: None,
                family: None,
            },
        }
    }

    /// Composites the final image: photo base layer, then per-group bubbles.
    /// Groups without a matching translation are skipped.
    pub fn render(
        &self,
        photo: &Photo,
        groups: &[TextGroup],
        translations: &[String],
    ) -> Result<RgbaImage> {
        let plans = self.plan(photo, groups, translations);
        debug!(bubbles = plans.len(), "composing overlay");
        let svg = svg::compose_svg(photo, &plans, self.family.as_deref());
        svg::rasterize_svg(&svg, self.font.as_ref().map(FontMetrics::data))
    }

    pub fn plan(
        &self,
        photo: &Photo,
        groups: &[TextGroup],
        translations: &[String],
    ) -> Vec<RenderPlan> {
        let sampled = sampler::average_image_color(&photo.pixels)
            .unwrap_or_else(sampler::neutral_gray);
        let bubble_color = color::bubble_fill(sampled);
        let text_color = color::text_color_for(bubble_color);

        groups
            .iter()
            .zip(translations.iter())
            .map(|(group, translated)| {
                let rect = group.pixel_bounding_box;
                let fitted =
                    fit::fit_translated_text(translated, rect.w, rect.h, self.font.as_ref());
                RenderPlan {
                    group: group.clone(),
                    translated_text: translated.clone(),
                    bubble_color,
                    text_color,
                    font_size: fitted.font_size,
                    lines: fitted.lines,
                    line_height: fitted.line_height,
                }
            })
            .collect()
    }

    /// Detection-debug overlay as an SVG document.
    pub fn debug_overlay(&self, photo: &Photo, observations: &[TextObservation]) -> String {
        svg::detection_boxes_svg(photo, observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::PixelRect;
    use image::Rgba;

    fn group(x: f32, y: f32, w: f32, h: f32) -> TextGroup {
        TextGroup {
            combined_text: "source".to_string(),
            pixel_bounding_box: PixelRect { x, y, w, h },
        }
    }

    #[test]
    fn plan_pairs_groups_with_translations_in_order() {
        let photo = Photo::from_pixels(RgbaImage::from_pixel(
            100,
            100,
            Rgba([200, 200, 200, 255]),
        ))
        .expect("photo");
        let renderer = BubbleRenderer::new(None);
        let groups = vec![group(10.0, 10.0, 50.0, 20.0), group(10.0, 60.0, 50.0, 20.0)];
        let translations = vec!["first".to_string(), "second".to_string()];

        let plans = renderer.plan(&photo, &groups, &translations);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].translated_text, "first");
        assert_eq!(plans[1].translated_text, "second");
        assert_eq!(plans[0].bubble_color, plans[1].bubble_color);
        assert!(plans[0].font_size >= 5.0);
    }

    #[test]
    fn plan_skips_groups_without_translations() {
        let photo = Photo::from_pixels(RgbaImage::from_pixel(
            100,
            100,
            Rgba([20, 20, 20, 255]),
        ))
        .expect("photo");
        let renderer = BubbleRenderer::new(None);
        let groups = vec![group(10.0, 10.0, 50.0, 20.0), group(10.0, 60.0, 50.0, 20.0)];
        let translations = vec!["only one".to_string()];

        let plans = renderer.plan(&photo, &groups, &translations);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].translated_text, "only one");
    }

    #[test]
    fn render_keeps_photo_dimensions() {
        let photo = Photo::from_pixels(RgbaImage::from_pixel(
            64,
            48,
            Rgba([10, 60, 120, 255]),
        ))
        .expect("photo");
        let renderer = BubbleRenderer::new(None);
        let groups = vec![group(8.0, 8.0, 40.0, 16.0)];
        let translations = vec!["hello".to_string()];

        let rendered = renderer
            .render(&photo, &groups, &translations)
            .expect("render");
        assert_eq!(rendered.dimensions(), (64, 48));
    }

    #[test]
    fn dark_photos_still_get_readable_bubbles() {
        let photo = Photo::from_pixels(RgbaImage::from_pixel(
            32,
            32,
            Rgba([10, 10, 10, 255]),
        ))
        .expect("photo");
        let renderer = BubbleRenderer::new(None);
        let plans = renderer.plan(
            &photo,
            &[group(4.0, 4.0, 20.0, 10.0)],
            &["hi".to_string()],
        );
        // near-black lightens to a mid gray above the luminance threshold,
        // which flips the text to black
        assert!(luminance(plans[0].bubble_color) > 0.5);
        assert_eq!(plans[0].text_color, Srgb::new(0, 0, 0));
    }
}
