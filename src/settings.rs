use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub system_languages: Vec<String>,
    pub ocr_languages: String,
    pub ocr_psm: u32,
    pub overlay_font_family: Option<String>,
    pub overlay_font_path: Option<String>,
    pub translate_model: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            system_languages: Vec::new(),
            ocr_languages: "eng".to_string(),
            ocr_psm: 6,
            overlay_font_family: None,
            overlay_font_path: None,
            translate_model: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    system: Option<SystemSettings>,
    ocr: Option<OcrSettings>,
    render: Option<RenderSettings>,
    translate: Option<TranslateSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct SystemSettings {
    languages: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    languages: Option<String>,
    psm: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    font_family: Option<String>,
    font_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslateSettings {
    model: Option<String>,
}

/// Layered settings: defaults, then settings.toml and settings.local.toml
/// from the working directory and from ~/.photo-translator-rust, then an
/// optional explicit file. Later files win per key.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(system) = incoming.system {
            if let Some(languages) = system.languages {
                self.system_languages = languages;
            }
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(languages) = ocr.languages {
                if !languages.trim().is_empty() {
                    self.ocr_languages = languages;
                }
            }
            if let Some(psm) = ocr.psm {
                if psm > 0 {
                    self.ocr_psm = psm;
                }
            }
        }
        if let Some(render) = incoming.render {
            if let Some(family) = render.font_family {
                if !family.trim().is_empty() {
                    self.overlay_font_family = Some(family);
                }
            }
            if let Some(path) = render.font_path {
                if !path.trim().is_empty() {
                    self.overlay_font_path = Some(path);
                }
            }
        }
        if let Some(translate) = incoming.translate {
            if let Some(model) = translate.model {
                if !model.trim().is_empty() {
                    self.translate_model = Some(model);
                }
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".photo-translator-rust"))
        }
    })
}
