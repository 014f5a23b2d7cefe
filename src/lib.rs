use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use tracing::warn;

pub mod error;
pub mod geom;
pub mod group;
pub mod languages;
pub mod logging;
pub mod ocr;
pub mod photo;
pub mod pipeline;
pub mod render;
pub mod sampler;
pub mod settings;
pub mod translate;

pub use error::PipelineError;
pub use pipeline::{ProcessingState, TranslationPipeline};

#[derive(Debug, Clone)]
pub struct Config {
    pub lang: String,
    pub output: Option<String>,
    pub model: Option<String>,
    pub key: Option<String>,
    pub font: Option<String>,
    pub settings_path: Option<String>,
    pub list_languages: bool,
    pub debug_boxes: bool,
}

pub async fn run(config: Config, image: Option<String>) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let registry = languages::LanguageRegistry::load()?;

    if config.list_languages {
        return Ok(format_language_catalog(
            &registry,
            &settings.system_languages,
        ));
    }

    let target = resolve_target_language(&config.lang, &registry)?;

    let payload = match image.as_deref() {
        Some(path) => Some(
            std::fs::read(path).with_context(|| format!("failed to read image: {}", path))?,
        ),
        None => None,
    };

    let detector = ocr::TesseractDetector::new(&settings.ocr_languages, settings.ocr_psm)?;
    let translator = build_translator(&config, &settings)?;
    let renderer = build_renderer(&config, &settings);

    let pipeline = TranslationPipeline::new(detector, translator, renderer, payload, target);

    tokio::select! {
        _ = pipeline.run() => {}
        _ = tokio::signal::ctrl_c() => {
            pipeline.cancel().await;
            return Err(PipelineError::UserCancelled.into());
        }
    }

    if config.debug_boxes {
        write_debug_artifacts(&pipeline, image.as_deref()).await?;
    }

    let state = pipeline.state();
    let Some(final_image) = pipeline.complete() else {
        if let Some(message) = state.error_message() {
            return Err(anyhow!("{}", message));
        }
        return Err(anyhow!("pipeline stopped while {}", state.name()));
    };

    let output_path = resolve_output_path(config.output.as_deref(), image.as_deref());
    let png = photo::encode_png(&final_image)?;
    std::fs::write(&output_path, png)
        .with_context(|| format!("failed to write output: {}", output_path.display()))?;

    Ok(format!(
        "saved translated image to {}",
        output_path.display()
    ))
}

fn resolve_target_language(
    code: &str,
    registry: &languages::LanguageRegistry,
) -> Result<languages::Language> {
    registry.language(code).ok_or_else(|| {
        anyhow!(
            "invalid target language code '{}' (expected an ISO 639 code such as en, ja, or pt-br)",
            code
        )
    })
}

fn format_language_catalog(registry: &languages::LanguageRegistry, restrict: &[String]) -> String {
    registry
        .supported_languages(restrict)
        .iter()
        .map(|language| format!("{}\t{}", language.code, language.display_name))
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_translator(
    config: &Config,
    settings: &settings::Settings,
) -> Result<translate::LlmTranslator> {
    let key = match config.key.as_deref() {
        Some(key) if !key.trim().is_empty() => key.to_string(),
        _ => std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("no API key found (set OPENAI_API_KEY or pass --key)"))?,
    };
    let mut translator = translate::LlmTranslator::new(key);
    if let Some(model) = config
        .model
        .as_deref()
        .or(settings.translate_model.as_deref())
    {
        translator = translator.with_model(model);
    }
    Ok(translator)
}

fn build_renderer(config: &Config, settings: &settings::Settings) -> render::BubbleRenderer {
    let font_path = config
        .font
        .as_deref()
        .or(settings.overlay_font_path.as_deref())
        .map(Path::new);
    let font_family = settings.overlay_font_family.as_deref();
    match render::resolve_font(font_path, font_family) {
        Ok(font) => render::BubbleRenderer::new(Some(font)),
        Err(error) => {
            warn!("no overlay font resolved, relying on system fonts: {:#}", error);
            render::BubbleRenderer::new(None)
        }
    }
}

async fn write_debug_artifacts<D, T>(
    pipeline: &TranslationPipeline<D, T>,
    image: Option<&str>,
) -> Result<()>
where
    D: ocr::TextDetector,
    T: translate::TranslationService,
{
    let (photo, observations) = pipeline.captured().await;
    let (Some(photo), Some(observations)) = (photo, observations) else {
        return Ok(());
    };

    let overlay = render::BubbleRenderer::new(None).debug_overlay(&photo, &observations);
    let svg_path = derived_output_path(image, "boxes.svg");
    std::fs::write(&svg_path, overlay)
        .with_context(|| format!("failed to write debug overlay: {}", svg_path.display()))?;

    let dump = serde_json::to_string_pretty(observations.as_ref())?;
    let json_path = derived_output_path(image, "observations.json");
    std::fs::write(&json_path, dump)
        .with_context(|| format!("failed to write observations: {}", json_path.display()))?;
    Ok(())
}

fn resolve_output_path(output: Option<&str>, image: Option<&str>) -> PathBuf {
    match output {
        Some(output) => PathBuf::from(output),
        None => derived_output_path(image, "translated.png"),
    }
}

/// Places `<stem>-<suffix>` next to the input image.
fn derived_output_path(image: Option<&str>, suffix: &str) -> PathBuf {
    let Some(image) = image else {
        return PathBuf::from(format!("photo-{}", suffix));
    };
    let path = Path::new(image);
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("photo");
    let file_name = format!("{}-{}", stem, suffix);
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(file_name),
        _ => PathBuf::from(file_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_lands_next_to_the_image() {
        let path = resolve_output_path(None, Some("photos/sign.jpg"));
        assert_eq!(path, PathBuf::from("photos/sign-translated.png"));

        let path = resolve_output_path(None, Some("sign.jpg"));
        assert_eq!(path, PathBuf::from("sign-translated.png"));
    }

    #[test]
    fn explicit_output_path_wins() {
        let path = resolve_output_path(Some("out/result.png"), Some("photos/sign.jpg"));
        assert_eq!(path, PathBuf::from("out/result.png"));
    }

    #[test]
    fn debug_artifacts_share_the_image_stem() {
        let path = derived_output_path(Some("photos/sign.jpg"), "boxes.svg");
        assert_eq!(path, PathBuf::from("photos/sign-boxes.svg"));

        let path = derived_output_path(None, "observations.json");
        assert_eq!(path, PathBuf::from("photo-observations.json"));
    }

    #[test]
    fn language_catalog_is_tab_separated() {
        let registry = languages::LanguageRegistry::load().expect("registry");
        let restrict = vec!["fr".to_string(), "en".to_string()];
        let catalog = format_language_catalog(&registry, &restrict);
        assert_eq!(catalog, "en\tEnglish\nfr\tFrench");
    }

    #[test]
    fn unknown_target_language_is_rejected() {
        let registry = languages::LanguageRegistry::load().expect("registry");
        let error = resolve_target_language("zz", &registry).unwrap_err();
        assert!(error.to_string().contains("invalid target language code"));
    }
}
