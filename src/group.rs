use tracing::debug;

use crate::error::PipelineError;
use crate::geom::PixelRect;
use crate::languages::{self, Language};
use crate::ocr::TextObservation;

/// Observations stacked into one speech-bubble-sized unit. `combined_text`
/// holds the member lines top to bottom, joined with newlines.
#[derive(Debug, Clone, PartialEq)]
pub struct TextGroup {
    pub combined_text: String,
    pub pixel_bounding_box: PixelRect,
}

/// Turns raw observations into renderable groups for the given target
/// language. Deterministic: the same observations and target always produce
/// the same groups.
pub fn group_observations(
    observations: &[TextObservation],
    target: &Language,
    image_width: u32,
    image_height: u32,
) -> Result<Vec<TextGroup>, PipelineError> {
    if observations.is_empty() {
        return Err(PipelineError::NoTextDetected);
    }

    let survivors = filter_translatable(observations, target);
    if survivors.is_empty() {
        return Err(PipelineError::NoTranslatableText);
    }
    debug!(
        kept = survivors.len(),
        dropped = observations.len() - survivors.len(),
        "language filter"
    );

    let groups: Vec<TextGroup> = cluster_by_vertical_gap(survivors)
        .into_iter()
        .filter_map(|cluster| materialize(&cluster, image_width, image_height))
        .collect();
    debug!(groups = groups.len(), "grouped observations");
    Ok(groups)
}

/// Drops observations whose identified language already matches the target,
/// comparing base codes so "en" covers "en-US". Unidentifiable text stays.
pub(crate) fn filter_translatable<'a>(
    observations: &'a [TextObservation],
    target: &Language,
) -> Vec<&'a TextObservation> {
    let target_base = languages::base_code(&target.code);
    observations
        .iter()
        .filter(|observation| {
            match languages::identify_language(
                &observation.text,
                observation.detected_language.as_deref(),
            ) {
                Some(code) => languages::base_code(&code) != target_base,
                None => true,
            }
        })
        .collect()
}

/// Greedy top-to-bottom pass. A line joins the open cluster when the gap to
/// the previous line is under half that line's height; otherwise it starts a
/// new cluster. Normalized y grows upward, so sorting by `y` descending
/// walks the image top to bottom.
fn cluster_by_vertical_gap(mut survivors: Vec<&TextObservation>) -> Vec<Vec<&TextObservation>> {
    survivors.sort_by(|a, b| {
        b.bounding_box
            .y
            .partial_cmp(&a.bounding_box.y)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut clusters: Vec<Vec<&TextObservation>> = Vec::new();
    for observation in survivors {
        let joins = clusters
            .last()
            .and_then(|cluster| cluster.last())
            .map(|prev| {
                let gap = prev.bounding_box.y - observation.bounding_box.top();
                gap < prev.bounding_box.h * 0.5
            })
            .unwrap_or(false);
        if joins {
            if let Some(cluster) = clusters.last_mut() {
                cluster.push(observation);
            }
        } else {
            clusters.push(vec![observation]);
        }
    }
    clusters
}

fn materialize(
    cluster: &[&TextObservation],
    image_width: u32,
    image_height: u32,
) -> Option<TextGroup> {
    let first = cluster.first()?;
    let mut bounds = first.bounding_box;
    for observation in &cluster[1..] {
        bounds = bounds.union(&observation.bounding_box);
    }
    let combined_text = cluster
        .iter()
        .map(|observation| observation.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    Some(TextGroup {
        combined_text,
        pixel_bounding_box: bounds.to_pixels(image_width, image_height),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::NormalizedRect;

    fn observation(text: &str, y: f32, h: f32, lang: Option<&str>) -> TextObservation {
        TextObservation {
            text: text.to_string(),
            confidence: 0.9,
            bounding_box: NormalizedRect {
                x: 0.25,
                y,
                w: 0.5,
                h,
            },
            detected_language: lang.map(str::to_string),
        }
    }

    fn target(code: &str) -> Language {
        Language {
            code: code.to_string(),
            display_name: code.to_uppercase(),
        }
    }

    #[test]
    fn stacked_sign_lines_become_one_group() {
        // Two stacked lines: gap 0.02, half height 0.03 -> same bubble.
        let observations = vec![
            observation("ROAD CLOSED", 0.82, 0.06, Some("fr")),
            observation("STOP", 0.9, 0.06, Some("fr")),
        ];
        let groups = group_observations(&observations, &target("en"), 1000, 500).expect("groups");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].combined_text, "STOP\nROAD CLOSED");

        let rect = groups[0].pixel_bounding_box;
        assert_eq!(rect.x, 250.0);
        // union spans y 0.82..0.96 -> top at 20 px in a 500 px image
        assert!((rect.y - 20.0).abs() < 1e-3);
        assert_eq!(rect.w, 500.0);
        assert!((rect.h - 70.0).abs() < 1e-3);
    }

    #[test]
    fn gap_of_exactly_half_height_splits() {
        // Exactly representable values: gap = 0.5 - 0.375 = 0.125, half
        // height = 0.125. The comparison is strict, so this splits.
        let observations = vec![
            observation("first", 0.5, 0.25, Some("fr")),
            observation("second", 0.125, 0.25, Some("fr")),
        ];
        let groups = group_observations(&observations, &target("en"), 100, 100).expect("groups");
        assert_eq!(groups.len(), 2);

        let close = vec![
            observation("first", 0.5, 0.25, Some("fr")),
            observation("second", 0.13, 0.25, Some("fr")),
        ];
        let groups = group_observations(&close, &target("en"), 100, 100).expect("groups");
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn overlapping_lines_always_join() {
        let observations = vec![
            observation("over", 0.5, 0.1, Some("fr")),
            observation("lap", 0.55, 0.1, Some("fr")),
        ];
        let groups = group_observations(&observations, &target("en"), 100, 100).expect("groups");
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn empty_input_is_no_text() {
        let err = group_observations(&[], &target("en"), 100, 100).unwrap_err();
        assert!(matches!(err, PipelineError::NoTextDetected));
    }

    #[test]
    fn all_lines_in_target_language_is_no_translatable_text() {
        let observations = vec![observation("HELLO", 0.8, 0.1, Some("en-US"))];
        let err = group_observations(&observations, &target("en"), 100, 100).unwrap_err();
        assert!(matches!(err, PipelineError::NoTranslatableText));
    }

    #[test]
    fn unidentifiable_text_is_kept() {
        let observations = vec![observation("12345", 0.8, 0.1, None)];
        let groups = group_observations(&observations, &target("en"), 100, 100).expect("groups");
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn filter_is_idempotent() {
        let observations = vec![
            observation("HELLO", 0.8, 0.1, Some("en")),
            observation("BONJOUR", 0.5, 0.1, Some("fr")),
            observation("???", 0.2, 0.1, None),
        ];
        let once: Vec<TextObservation> = filter_translatable(&observations, &target("en"))
            .into_iter()
            .cloned()
            .collect();
        let twice: Vec<TextObservation> = filter_translatable(&once, &target("en"))
            .into_iter()
            .cloned()
            .collect();
        assert_eq!(once.len(), 2);
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.text, b.text);
        }
    }

    #[test]
    fn grouping_is_deterministic_and_order_insensitive() {
        let observations = vec![
            observation("bottom", 0.1, 0.05, Some("fr")),
            observation("top", 0.9, 0.05, Some("fr")),
            observation("middle", 0.5, 0.05, Some("fr")),
        ];
        let shuffled = vec![
            observations[1].clone(),
            observations[2].clone(),
            observations[0].clone(),
        ];
        let a = group_observations(&observations, &target("en"), 640, 480).expect("groups");
        let b = group_observations(&shuffled, &target("en"), 640, 480).expect("groups");
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        assert_eq!(a[0].combined_text, "top");
    }

    #[test]
    fn script_identification_drops_matching_lines() {
        // Hiragana line dropped for a Japanese target even without a hint.
        let observations = vec![
            observation("いらっしゃいませ", 0.8, 0.1, None),
            observation("WELCOME", 0.5, 0.1, Some("en")),
        ];
        let groups = group_observations(&observations, &target("ja"), 100, 100).expect("groups");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].combined_text, "WELCOME");
    }
}
