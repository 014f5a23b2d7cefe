use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::geom::NormalizedRect;
use crate::photo::Photo;

mod tesseract;

pub use tesseract::TesseractDetector;

/// One recognized line of text. The bounding box is normalized with a
/// bottom-left origin, matching what vision frameworks report.
#[derive(Debug, Clone, Serialize)]
pub struct TextObservation {
    pub text: String,
    pub confidence: f32,
    pub bounding_box: NormalizedRect,
    pub detected_language: Option<String>,
}

#[async_trait]
pub trait TextDetector: Send + Sync {
    async fn detect(&self, photo: &Photo) -> Result<Vec<TextObservation>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_dump_shape() {
        let observation = TextObservation {
            text: "STOP".to_string(),
            confidence: 0.9,
            bounding_box: NormalizedRect {
                x: 0.1,
                y: 0.8,
                w: 0.5,
                h: 0.1,
            },
            detected_language: Some("fr".to_string()),
        };
        insta::assert_json_snapshot!(observation, @r###"
        {
          "text": "STOP",
          "confidence": 0.9,
          "bounding_box": {
            "x": 0.1,
            "y": 0.8,
            "w": 0.5,
            "h": 0.1
          },
          "detected_language": "fr"
        }
        "###);
    }
}
