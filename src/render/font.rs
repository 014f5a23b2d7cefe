use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

/// Parsed font data plus the advance metrics the fitting loop needs.
#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    family: Option<String>,
    face_index: u32,
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }
}

pub struct ResolvedFont {
    pub metrics: FontMetrics,
    pub family: String,
}

#[cfg(target_os = "macos")]
fn fallback_families() -> &'static [&'static str] {
    &["NotoSans", "Hiragino Sans", "sans-serif"]
}

#[cfg(target_os = "windows")]
fn fallback_families() -> &'static [&'static str] {
    &["NotoSans", "Arial Unicode", "sans-serif"]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn fallback_families() -> &'static [&'static str] {
    &["NotoSans", "sans-serif"]
}

/// Picks the bubble font: an explicit file wins, then a named family from
/// the system database, then the platform fallback list.
pub fn resolve_font(font_path: Option<&Path>, font_family: Option<&str>) -> Result<ResolvedFont> {
    if let Some(path) = font_path {
        let metrics = load_metrics(path)?;
        let family = metrics
            .family()
            .map(str::to_string)
            .or_else(|| font_family.map(str::to_string))
            .unwrap_or_else(|| "sans-serif".to_string());
        return Ok(ResolvedFont { metrics, family });
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    if let Some(family) = font_family {
        return metrics_from_family(&db, family);
    }
    for candidate in fallback_families() {
        if let Ok(resolved) = metrics_from_family(&db, candidate) {
            return Ok(resolved);
        }
    }
    Err(anyhow!("no usable overlay font found"))
}

fn load_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    metrics_from_data(&data, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

fn metrics_from_data(data: &[u8], preferred_family: Option<&str>) -> Result<FontMetrics> {
    let mut first = None;
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    for index in 0..count {
        let Ok(face) = Face::parse(data, index) else {
            continue;
        };
        let family = family_name(&face);
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 2);
        let metrics = FontMetrics {
            data: Arc::new(data.to_vec()),
            units_per_em,
            space_advance,
            family: family.clone(),
            face_index: index,
        };
        if let (Some(preferred), Some(found)) = (preferred_family, &family) {
            if found.eq_ignore_ascii_case(preferred) {
                return Ok(metrics);
            }
        }
        if first.is_none() {
            first = Some(metrics);
        }
    }
    // A collection that never names the preferred family still came from a
    // database query for it, so the first parseable face is good enough.
    first.ok_or_else(|| anyhow!("failed to parse font data"))
}

fn metrics_from_family(db: &fontdb::Database, family: &str) -> Result<ResolvedFont> {
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let data = db
        .with_face_data(id, |data, _index| data.to_vec())
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    let metrics = metrics_from_data(&data, Some(family))?;
    let resolved_family = metrics
        .family()
        .map(str::to_string)
        .unwrap_or_else(|| family.to_string());
    Ok(ResolvedFont {
        metrics,
        family: resolved_family,
    })
}

fn family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

/// Advance-sum width of `text` at `font_size` pixels. Without metrics a
/// per-character width heuristic stands in, tuned for mixed Latin/CJK text.
pub(crate) fn measure_text_width_px(text: &str, font_size: f32, font: Option<&FontMetrics>) -> f32 {
    let Some(font) = font else {
        return estimate_width_units(text) * font_size;
    };
    let Ok(face) = Face::parse(&font.data, font.face_index) else {
        return estimate_width_units(text) * font_size;
    };
    let mut advance = 0u32;
    for ch in text.chars() {
        advance = advance.saturating_add(u32::from(char_advance(&face, font, ch)));
    }
    advance as f32 * (font_size / f32::from(font.units_per_em.max(1)))
}

fn char_advance(face: &Face<'_>, font: &FontMetrics, ch: char) -> u16 {
    if ch == '\n' {
        return 0;
    }
    if ch == ' ' {
        return font.space_advance;
    }
    face.glyph_index(ch)
        .and_then(|glyph| face.glyph_hor_advance(glyph))
        .unwrap_or(font.space_advance)
}

fn estimate_width_units(text: &str) -> f32 {
    text.chars().map(char_width_units).sum()
}

fn char_width_units(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if crate::languages::is_cjk(ch) {
        1.0
    } else {
        0.9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_width_scales_with_font_size() {
        // 4 alphanumerics + 1 space = 4 * 0.55 + 0.25 units
        let width = measure_text_width_px("ab cd", 10.0, None);
        assert!((width - 24.5).abs() < 1e-4);
        let doubled = measure_text_width_px("ab cd", 20.0, None);
        assert!((doubled - 49.0).abs() < 1e-4);
    }

    #[test]
    fn heuristic_counts_cjk_as_full_width() {
        let cjk = measure_text_width_px("日本語", 10.0, None);
        assert!((cjk - 30.0).abs() < 1e-4);
        let latin = measure_text_width_px("abc", 10.0, None);
        assert!(cjk > latin);
    }

    #[test]
    fn empty_text_measures_zero() {
        assert_eq!(measure_text_width_px("", 12.0, None), 0.0);
    }
}
