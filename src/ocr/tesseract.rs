use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

use crate::geom::NormalizedRect;
use crate::languages::is_cjk;
use crate::photo::Photo;

use super::{TextDetector, TextObservation};

/// Text detector backed by the `tesseract` CLI. Recognition runs on the
/// blocking pool; the binary must be on PATH.
#[derive(Debug, Clone)]
pub struct TesseractDetector {
    languages: String,
    psm: u32,
}

impl TesseractDetector {
    pub fn new(languages: &str, psm: u32) -> Result<TesseractDetector> {
        probe_tesseract()?;
        let languages = normalize_languages(languages)?;
        Ok(TesseractDetector { languages, psm })
    }
}

#[async_trait]
impl TextDetector for TesseractDetector {
    async fn detect(&self, photo: &Photo) -> Result<Vec<TextObservation>> {
        let detector = self.clone();
        let pixels = photo.pixels.clone();
        tokio::task::spawn_blocking(move || detect_blocking(&detector, &pixels))
            .await
            .map_err(|err| anyhow!("ocr task panicked: {}", err))?
    }
}

fn detect_blocking(
    detector: &TesseractDetector,
    pixels: &image::RgbaImage,
) -> Result<Vec<TextObservation>> {
    let mut tmp = tempfile::Builder::new()
        .prefix("photo-translate-ocr-")
        .suffix(".png")
        .tempfile()
        .with_context(|| "failed to create temp image for OCR")?;
    image::DynamicImage::ImageRgba8(pixels.clone())
        .write_to(&mut tmp, image::ImageFormat::Png)
        .with_context(|| "failed to write temp image for OCR")?;

    let tsv = run_tesseract_tsv(tmp.path(), &detector.languages, detector.psm)?;
    let observations = parse_tsv_observations(&tsv, pixels.width(), pixels.height());
    debug!(lines = observations.len(), "tesseract recognition done");
    Ok(observations)
}

fn probe_tesseract() -> Result<()> {
    Command::new("tesseract")
        .arg("--version")
        .output()
        .map(|_| ())
        .map_err(|err| anyhow!("tesseract not found on PATH ({})", err))
}

fn run_tesseract_tsv(path: &Path, languages: &str, psm: u32) -> Result<String> {
    let output = Command::new("tesseract")
        .arg(path)
        .arg("stdout")
        .args(["-l", languages])
        .args(["--oem", "1"])
        .args(["--psm", &psm.to_string()])
        .args(["--dpi", "300"])
        .arg("tsv")
        .output()
        .with_context(|| "failed to run tesseract")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract failed: {}", stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Validates the '+'-joined pack list against `tesseract --list-langs`.
/// When the listing itself fails the request is passed through untouched.
fn normalize_languages(languages: &str) -> Result<String> {
    let requested: Vec<String> = languages
        .split('+')
        .map(|code| code.trim().to_lowercase())
        .filter(|code| !code.is_empty())
        .collect();
    if requested.is_empty() {
        return Err(anyhow!("no OCR languages configured"));
    }

    let Ok(available) = list_tesseract_languages() else {
        return Ok(requested.join("+"));
    };

    let mut kept = Vec::new();
    let mut missing = Vec::new();
    for code in requested {
        if available.iter().any(|pack| pack == &code) {
            kept.push(code);
        } else {
            missing.push(code);
        }
    }
    if !missing.is_empty() {
        warn!(
            "OCR language pack(s) not installed, skipping: {}",
            missing.join(", ")
        );
    }
    if kept.is_empty() {
        return Err(anyhow!(
            "none of the requested OCR languages are installed (available: {})",
            available.join(", ")
        ));
    }
    Ok(kept.join("+"))
}

fn list_tesseract_languages() -> Result<Vec<String>> {
    let output = Command::new("tesseract")
        .arg("--list-langs")
        .output()
        .with_context(|| "failed to list tesseract languages")?;
    if !output.status.success() {
        return Err(anyhow!("tesseract --list-langs failed"));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    // First line is the "List of available languages" banner.
    Ok(stdout
        .lines()
        .skip(1)
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}

struct WordToken {
    text: String,
    left: u32,
    top: u32,
    width: u32,
    height: u32,
    conf: f32,
}

/// One observation per TSV line record: level-5 words grouped by
/// (page, block, paragraph, line), joined left to right.
fn parse_tsv_observations(tsv: &str, image_width: u32, image_height: u32) -> Vec<TextObservation> {
    let mut lines: BTreeMap<(u32, u32, u32, u32), Vec<WordToken>> = BTreeMap::new();

    for (idx, row) in tsv.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let level = cols[0].trim().parse::<u32>().unwrap_or(0);
        if level != 5 {
            continue;
        }
        let key = (
            cols[1].trim().parse::<u32>().unwrap_or(0),
            cols[2].trim().parse::<u32>().unwrap_or(0),
            cols[3].trim().parse::<u32>().unwrap_or(0),
            cols[4].trim().parse::<u32>().unwrap_or(0),
        );
        let left = cols[6].trim().parse::<u32>().unwrap_or(0);
        let top = cols[7].trim().parse::<u32>().unwrap_or(0);
        let width = cols[8].trim().parse::<u32>().unwrap_or(0);
        let height = cols[9].trim().parse::<u32>().unwrap_or(0);
        let conf = cols[10].trim().parse::<f32>().unwrap_or(-1.0);
        if conf < 0.0 {
            continue;
        }
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }
        lines.entry(key).or_default().push(WordToken {
            text: text.to_string(),
            left,
            top,
            width,
            height,
            conf,
        });
    }

    lines
        .into_values()
        .filter_map(|words| build_observation(words, image_width, image_height))
        .collect()
}

fn build_observation(
    mut words: Vec<WordToken>,
    image_width: u32,
    image_height: u32,
) -> Option<TextObservation> {
    if words.is_empty() || image_width == 0 || image_height == 0 {
        return None;
    }
    words.sort_by_key(|word| word.left);

    let mut text = String::new();
    let mut weighted = 0.0f32;
    let mut weight = 0.0f32;
    let mut left = u32::MAX;
    let mut top = u32::MAX;
    let mut right = 0u32;
    let mut bottom = 0u32;

    for word in &words {
        if let Some(prev) = text.chars().last() {
            if let Some(next) = word.text.chars().next() {
                if needs_space(prev, next) {
                    text.push(' ');
                }
            }
        }
        text.push_str(&word.text);

        let len = word.text.chars().count() as f32;
        weighted += word.conf * len;
        weight += len;
        left = left.min(word.left);
        top = top.min(word.top);
        right = right.max(word.left + word.width);
        bottom = bottom.max(word.top + word.height);
    }
    if weight <= 0.0 || right <= left || bottom <= top {
        return None;
    }

    let width = image_width as f32;
    let height = image_height as f32;
    let box_height = (bottom - top) as f32 / height;
    Some(TextObservation {
        text,
        confidence: (weighted / weight / 100.0).clamp(0.0, 1.0),
        bounding_box: NormalizedRect {
            x: left as f32 / width,
            y: 1.0 - top as f32 / height - box_height,
            w: (right - left) as f32 / width,
            h: box_height,
        },
        detected_language: None,
    })
}

fn needs_space(prev: char, next: char) -> bool {
    !(is_cjk(prev) || is_cjk(next))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn parse_groups_words_into_line_observations() {
        let tsv = format!(
            "{HEADER}\n\
             4\t1\t1\t1\t1\t0\t100\t50\t200\t30\t-1\t\n\
             5\t1\t1\t1\t1\t1\t100\t50\t80\t30\t91.0\tROAD\n\
             5\t1\t1\t1\t1\t2\t190\t50\t110\t30\t87.0\tCLOSED\n\
             5\t1\t1\t1\t2\t1\t100\t100\t200\t40\t95.0\tAHEAD\n"
        );
        let observations = parse_tsv_observations(&tsv, 1000, 500);
        assert_eq!(observations.len(), 2);

        let first = &observations[0];
        assert_eq!(first.text, "ROAD CLOSED");
        // (91 * 4 + 87 * 6) / 10 = 88.6
        assert!((first.confidence - 0.886).abs() < 1e-4);
        assert!((first.bounding_box.x - 0.1).abs() < 1e-6);
        assert!((first.bounding_box.w - 0.2).abs() < 1e-6);
        assert!((first.bounding_box.h - 0.06).abs() < 1e-6);
        assert!((first.bounding_box.y - 0.84).abs() < 1e-6);

        let second = &observations[1];
        assert_eq!(second.text, "AHEAD");
        assert!((second.bounding_box.y - 0.72).abs() < 1e-6);
    }

    #[test]
    fn parse_sorts_words_by_horizontal_position() {
        let tsv = format!(
            "{HEADER}\n\
             5\t1\t1\t1\t1\t2\t190\t50\t110\t30\t90.0\tCLOSED\n\
             5\t1\t1\t1\t1\t1\t100\t50\t80\t30\t90.0\tROAD\n"
        );
        let observations = parse_tsv_observations(&tsv, 1000, 500);
        assert_eq!(observations[0].text, "ROAD CLOSED");
    }

    #[test]
    fn parse_joins_cjk_words_without_spaces() {
        let tsv = format!(
            "{HEADER}\n\
             5\t1\t1\t1\t1\t1\t100\t50\t60\t30\t90.0\t営業\n\
             5\t1\t1\t1\t1\t2\t160\t50\t30\t30\t90.0\t中\n"
        );
        let observations = parse_tsv_observations(&tsv, 1000, 500);
        assert_eq!(observations[0].text, "営業中");
    }

    #[test]
    fn parse_skips_malformed_and_low_confidence_rows() {
        let tsv = format!(
            "{HEADER}\n\
             5\t1\t1\t1\t1\t1\t100\t50\t80\n\
             5\t1\t1\t1\t1\t1\t100\t50\t80\t30\t-1\tghost\n\
             5\t1\t1\t1\t1\t2\t100\t50\t80\t30\t90.0\t   \n"
        );
        assert!(parse_tsv_observations(&tsv, 1000, 500).is_empty());
    }
}
