use std::sync::Arc;

use image::RgbaImage;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::group;
use crate::languages::Language;
use crate::ocr::{TextDetector, TextObservation};
use crate::photo::Photo;
use crate::render::BubbleRenderer;
use crate::translate::{TranslationRequest, TranslationService};

/// Observable pipeline phase. `Finished` and `Error` are terminal for a
/// run; a language change re-enters at `RecognizingText`.
#[derive(Debug, Clone)]
pub enum ProcessingState {
    LoadingImage,
    RecognizingText,
    Translating,
    Rendering,
    Finished(Arc<RgbaImage>),
    Error(String),
}

impl ProcessingState {
    pub fn name(&self) -> &'static str {
        match self {
            ProcessingState::LoadingImage => "loading-image",
            ProcessingState::RecognizingText => "recognizing-text",
            ProcessingState::Translating => "translating",
            ProcessingState::Rendering => "rendering",
            ProcessingState::Finished(_) => "finished",
            ProcessingState::Error(_) => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessingState::Finished(_) | ProcessingState::Error(_)
        )
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ProcessingState::Error(message) => Some(message),
            _ => None,
        }
    }
}

struct PipelineInner {
    generation: u64,
    target: Language,
    photo: Option<Arc<Photo>>,
    observations: Option<Arc<Vec<TextObservation>>>,
}

/// Drives a photo through decode, recognition, grouping, translation and
/// rendering, publishing each phase on a watch channel.
///
/// Every stage result is fenced by a generation counter: `cancel` and
/// `retranslate` bump it, which turns the outputs of any still-running
/// older stage into no-ops. Decoded pixels and raw observations are kept
/// so a language change never repeats OCR.
pub struct TranslationPipeline<D, T> {
    detector: D,
    translator: T,
    renderer: BubbleRenderer,
    payload: Option<Vec<u8>>,
    state_tx: watch::Sender<ProcessingState>,
    inner: Mutex<PipelineInner>,
}

impl<D, T> TranslationPipeline<D, T>
where
    D: TextDetector,
    T: TranslationService,
{
    pub fn new(
        detector: D,
        translator: T,
        renderer: BubbleRenderer,
        payload: Option<Vec<u8>>,
        target: Language,
    ) -> TranslationPipeline<D, T> {
        let (state_tx, _) = watch::channel(ProcessingState::LoadingImage);
        TranslationPipeline {
            detector,
            translator,
            renderer,
            payload,
            state_tx,
            inner: Mutex::new(PipelineInner {
                generation: 0,
                target,
                photo: None,
                observations: None,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessingState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> ProcessingState {
        self.state_tx.borrow().clone()
    }

    pub async fn target_language(&self) -> Language {
        self.inner.lock().await.target.clone()
    }

    /// The final image, if the pipeline is in `Finished`.
    pub fn complete(&self) -> Option<Arc<RgbaImage>> {
        match &*self.state_tx.borrow() {
            ProcessingState::Finished(image) => Some(image.clone()),
            _ => None,
        }
    }

    /// Artifacts captured so far, for debug dumps.
    pub async fn captured(&self) -> (Option<Arc<Photo>>, Option<Arc<Vec<TextObservation>>>) {
        let inner = self.inner.lock().await;
        (inner.photo.clone(), inner.observations.clone())
    }

    /// Runs the full pipeline once. Terminal state afterwards is `Finished`
    /// or `Error`, unless a concurrent cancel or retranslate superseded the
    /// run, in which case this call stops touching the published state.
    pub async fn run(&self) {
        let (generation, target) = {
            let inner = self.inner.lock().await;
            (inner.generation, inner.target.clone())
        };
        self.run_from_decode(generation, target).await;
    }

    /// Invalidates the current run. Any in-flight stage keeps executing but
    /// can no longer publish state or store artifacts. Returning from this
    /// call is the acknowledgment; the published state stays where it was.
    pub async fn cancel(&self) {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        info!("translation run cancelled");
    }

    /// Switches the target language and re-runs from the earliest stage
    /// whose input is missing. With a finished run that means grouping
    /// onward: OCR is never repeated for a pure language change.
    pub async fn retranslate(&self, target: Language) {
        let (generation, photo, observations) = {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            inner.target = target.clone();
            (inner.generation, inner.photo.clone(), inner.observations.clone())
        };
        info!("retranslating into {}", target.code);

        match (photo, observations) {
            (Some(photo), Some(observations)) => {
                if !self.publish(generation, ProcessingState::RecognizingText).await {
                    return;
                }
                self.run_from_group(generation, target, photo, observations)
                    .await;
            }
            (Some(photo), None) => {
                if !self.publish(generation, ProcessingState::RecognizingText).await {
                    return;
                }
                self.run_from_detect(generation, target, photo).await;
            }
            _ => {
                if !self.publish(generation, ProcessingState::LoadingImage).await {
                    return;
                }
                self.run_from_decode(generation, target).await;
            }
        }
    }

    async fn run_from_decode(&self, generation: u64, target: Language) {
        let photo = match self.decode_payload().await {
            Ok(photo) => Arc::new(photo),
            Err(err) => {
                self.publish(generation, ProcessingState::Error(err.to_string()))
                    .await;
                return;
            }
        };
        {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                return;
            }
            inner.photo = Some(photo.clone());
            debug!(state = "recognizing-text", "state change");
            self.state_tx.send_replace(ProcessingState::RecognizingText);
        }
        info!("decoded image ({}x{})", photo.width(), photo.height());
        self.run_from_detect(generation, target, photo).await;
    }

    async fn run_from_detect(&self, generation: u64, target: Language, photo: Arc<Photo>) {
        let observations = match self.detector.detect(&photo).await {
            Ok(observations) => Arc::new(observations),
            Err(err) => {
                let err = PipelineError::OcrServiceFailed(err.to_string());
                self.publish(generation, ProcessingState::Error(err.to_string()))
                    .await;
                return;
            }
        };
        info!("recognized {} text line(s)", observations.len());
        {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                return;
            }
            inner.observations = Some(observations.clone());
        }
        self.run_from_group(generation, target, photo, observations)
            .await;
    }

    async fn run_from_group(
        &self,
        generation: u64,
        target: Language,
        photo: Arc<Photo>,
        observations: Arc<Vec<TextObservation>>,
    ) {
        let groups =
            match group::group_observations(&observations, &target, photo.width(), photo.height())
            {
                Ok(groups) => groups,
                Err(err) => {
                    self.publish(generation, ProcessingState::Error(err.to_string()))
                        .await;
                    return;
                }
            };
        if !self.publish(generation, ProcessingState::Translating).await {
            return;
        }

        let requests: Vec<TranslationRequest> = groups
            .iter()
            .map(|group| TranslationRequest {
                source_text: group.combined_text.clone(),
            })
            .collect();
        let translations = match self.translator.translate_batch(&requests, &target).await {
            Ok(translations) => translations,
            Err(err) => {
                let err = PipelineError::TranslationServiceFailed(err.to_string());
                self.publish(generation, ProcessingState::Error(err.to_string()))
                    .await;
                return;
            }
        };
        if translations.len() != groups.len() {
            let err = PipelineError::TranslationServiceFailed(format!(
                "expected {} translation(s), got {}",
                groups.len(),
                translations.len()
            ));
            self.publish(generation, ProcessingState::Error(err.to_string()))
                .await;
            return;
        }
        if !self.publish(generation, ProcessingState::Rendering).await {
            return;
        }

        let bubble_count = groups.len();
        let renderer = self.renderer.clone();
        let render_photo = photo.clone();
        let rendered = tokio::task::spawn_blocking(move || {
            renderer.render(&render_photo, &groups, &translations)
        })
        .await
        .map_err(|err| anyhow::anyhow!("render task panicked: {}", err))
        .and_then(|result| result);

        match rendered {
            Ok(image) => {
                info!("rendered {} bubble(s)", bubble_count);
                self.publish(generation, ProcessingState::Finished(Arc::new(image)))
                    .await;
            }
            Err(err) => {
                self.publish(generation, ProcessingState::Error(err.to_string()))
                    .await;
            }
        }
    }

    async fn decode_payload(&self) -> Result<Photo, PipelineError> {
        let Some(bytes) = self.payload.clone() else {
            return Err(PipelineError::ImageUnavailable);
        };
        tokio::task::spawn_blocking(move || Photo::decode(bytes))
            .await
            .map_err(|err| PipelineError::ImageDecodeFailed(err.to_string()))?
            .map_err(|err| PipelineError::ImageDecodeFailed(err.to_string()))
    }

    /// Publishes `state` unless the run was superseded. Returns whether the
    /// publish went through.
    async fn publish(&self, generation: u64, state: ProcessingState) -> bool {
        let inner = self.inner.lock().await;
        if inner.generation != generation {
            debug!(
                stale = generation,
                current = inner.generation,
                "dropping state from superseded run"
            );
            return false;
        }
        debug!(state = state.name(), "state change");
        self.state_tx.send_replace(state);
        true
    }
}
