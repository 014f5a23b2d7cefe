use crate::languages::is_cjk;

use super::font::{FontMetrics, measure_text_width_px};

pub(crate) const MIN_FONT_SIZE: f32 = 5.0;
const LINE_HEIGHT_FACTOR: f32 = 1.1;

pub(crate) struct FittedText {
    pub(crate) font_size: f32,
    pub(crate) lines: Vec<String>,
    pub(crate) line_height: f32,
}

/// Finds the largest whole-pixel font size whose wrapped text block fits the
/// box height, never going below `MIN_FONT_SIZE`. The starting guess divides
/// the box height across the source line count; horizontal overflow of a
/// single long word is tolerated and handled by centering.
pub(crate) fn fit_translated_text(
    text: &str,
    box_width: f32,
    box_height: f32,
    font: Option<&FontMetrics>,
) -> FittedText {
    let segments: Vec<&str> = text.split('\n').collect();
    let mut font_size = (box_height / segments.len().max(1) as f32)
        .floor()
        .max(MIN_FONT_SIZE);

    loop {
        let lines = wrap_segments(&segments, box_width, font_size, font);
        let line_height = font_size * LINE_HEIGHT_FACTOR;
        let block_height = lines.len() as f32 * line_height;
        if block_height <= box_height || font_size <= MIN_FONT_SIZE {
            return FittedText {
                font_size,
                lines,
                line_height,
            };
        }
        font_size -= 1.0;
    }
}

fn wrap_segments(
    segments: &[&str],
    max_width: f32,
    font_size: f32,
    font: Option<&FontMetrics>,
) -> Vec<String> {
    let mut lines = Vec::new();
    for segment in segments {
        wrap_segment(segment, max_width, font_size, font, &mut lines);
    }
    lines
}

/// Greedy wrap by measured token widths. Advances are additive per char, so
/// accumulating token widths matches measuring the whole line.
fn wrap_segment(
    segment: &str,
    max_width: f32,
    font_size: f32,
    font: Option<&FontMetrics>,
    out: &mut Vec<String>,
) {
    let space_width = measure_text_width_px(" ", font_size, font);
    let mut current = String::new();
    let mut width = 0.0f32;

    for token in tokenize(segment) {
        if token == " " {
            if !current.is_empty() && !current.ends_with(' ') {
                current.push(' ');
                width += space_width;
            }
            continue;
        }
        let token_width = measure_text_width_px(&token, font_size, font);
        if width + token_width > max_width && !current.trim().is_empty() {
            out.push(current.trim_end().to_string());
            current.clear();
            width = 0.0;
        }
        current.push_str(&token);
        width += token_width;
    }
    if !current.trim().is_empty() {
        out.push(current.trim_end().to_string());
    }
}

/// Splits into wrap candidates: whitespace markers, single CJK characters,
/// and runs of everything else.
fn tokenize(segment: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    for ch in segment.chars() {
        if ch.is_whitespace() {
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
            tokens.push(" ".to_string());
        } else if is_cjk(ch) {
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
            tokens.push(ch.to_string());
        } else {
            word.push(ch);
        }
    }
    if !word.is_empty() {
        tokens.push(word);
    }
    tokens
}
