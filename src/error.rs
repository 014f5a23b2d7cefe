use thiserror::Error;

/// Failures a pipeline run can end in. Apart from `UserCancelled`, each of
/// these surfaces to observers as `ProcessingState::Error` with the display
/// message below.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no image was provided")]
    ImageUnavailable,

    #[error("failed to decode image: {0}")]
    ImageDecodeFailed(String),

    #[error("no text detected in image")]
    NoTextDetected,

    #[error("no translatable text in image")]
    NoTranslatableText,

    #[error("text recognition failed: {0}")]
    OcrServiceFailed(String),

    #[error("translation failed: {0}")]
    TranslationServiceFailed(String),

    #[error("translation cancelled")]
    UserCancelled,
}
