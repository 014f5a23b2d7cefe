use anyhow::{Context, Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::RgbaImage;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use crate::geom::PixelRect;
use crate::ocr::TextObservation;
use crate::photo::Photo;

use super::RenderPlan;
use super::color::to_hex;

pub(crate) const BUBBLE_PAD_X: f32 = 8.0;
pub(crate) const BUBBLE_PAD_Y: f32 = 4.0;
const BUBBLE_RADIUS: f32 = 8.0;

/// Builds the overlay document: the untouched photo as the base layer, then
/// one rounded rectangle and centered text block per plan.
pub(crate) fn compose_svg(photo: &Photo, plans: &[RenderPlan], font_family: Option<&str>) -> String {
    let width = photo.width();
    let height = photo.height();
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    ));

    let data_uri = format!("data:{};base64,{}", photo.mime, BASE64.encode(&photo.bytes));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{width}" height="{height}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
    ));

    for plan in plans {
        push_bubble(&mut svg, plan, font_family);
    }
    svg.push_str("</svg>");
    svg
}

fn push_bubble(svg: &mut String, plan: &RenderPlan, font_family: Option<&str>) {
    let rect = plan.group.pixel_bounding_box;
    let bubble = rect.expand(BUBBLE_PAD_X, BUBBLE_PAD_Y);
    svg.push_str(&format!(
        r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" rx="{radius}" fill="{fill}"/>"#,
        x = bubble.x,
        y = bubble.y,
        w = bubble.w,
        h = bubble.h,
        radius = BUBBLE_RADIUS,
        fill = to_hex(plan.bubble_color),
    ));

    if plan.lines.is_empty() {
        return;
    }
    let center_x = rect.center_x();
    let block_height = plan.lines.len() as f32 * plan.line_height;
    let first_baseline = rect.y + (rect.h - block_height) * 0.5 + plan.font_size;

    let family = font_family
        .map(|name| format!(r#" font-family="{}""#, escape_xml(name)))
        .unwrap_or_default();
    svg.push_str(&format!(
        r#"<text x="{x}" y="{y}" font-size="{size}" fill="{fill}" text-anchor="middle"{family}>"#,
        x = center_x,
        y = first_baseline,
        size = plan.font_size,
        fill = to_hex(plan.text_color),
    ));
    for (idx, line) in plan.lines.iter().enumerate() {
        if idx == 0 {
            svg.push_str(&escape_xml(line));
        } else {
            svg.push_str(&format!(
                r#"<tspan x="{x}" dy="{dy}">{text}</tspan>"#,
                x = center_x,
                dy = plan.line_height,
                text = escape_xml(line),
            ));
        }
    }
    svg.push_str("</text>");
}

/// Debug overlay: green boxes around every raw observation.
pub(crate) fn detection_boxes_svg(photo: &Photo, observations: &[TextObservation]) -> String {
    let width = photo.width();
    let height = photo.height();
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    ));
    let data_uri = format!("data:{};base64,{}", photo.mime, BASE64.encode(&photo.bytes));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{width}" height="{height}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
    ));
    for observation in observations {
        let PixelRect { x, y, w, h } = observation.bounding_box.to_pixels(width, height);
        svg.push_str(&format!(
            r##"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="#00c853" stroke-width="2"/>"##
        ));
    }
    svg.push_str("</svg>");
    svg
}

pub(crate) fn rasterize_svg(svg: &str, extra_font: Option<&[u8]>) -> Result<RgbaImage> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(data) = extra_font {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse overlay SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap = Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow!("overlay SVG has an empty size"))?;
    resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());
    RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to convert rendered overlay to an image"))
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
