use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

mod script;

pub use script::is_cjk;

/// A resolved target or source language. `code` keeps any region suffix the
/// caller asked for ("pt-br"); `display_name` always names the base language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    pub code: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
struct IsoData {
    codes: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    codes: HashMap<String, String>,
}

impl LanguageRegistry {
    pub fn load() -> Result<LanguageRegistry> {
        let raw = include_str!("iso_639.json");
        let parsed: IsoData =
            serde_json::from_str(raw).with_context(|| "failed to parse ISO 639 language data")?;
        Ok(LanguageRegistry {
            codes: parsed.codes,
        })
    }

    /// Accepts two or three letter base codes, optionally with a region
    /// suffix after '-', as long as the base is in the catalog.
    pub fn is_valid_code(&self, code: &str) -> bool {
        let base = base_code(code);
        matches!(base.len(), 2 | 3) && self.codes.contains_key(&base)
    }

    pub fn display_name(&self, code: &str) -> Option<String> {
        self.codes.get(&base_code(code)).cloned()
    }

    pub fn language(&self, code: &str) -> Option<Language> {
        if !self.is_valid_code(code) {
            return None;
        }
        let normalized = normalize_code(code);
        let display_name = self.display_name(&normalized)?;
        Some(Language {
            code: normalized,
            display_name,
        })
    }

    /// Catalog for the language picker, sorted by display name and
    /// deduplicated by base code. `restrict` narrows it when non-empty.
    pub fn supported_languages(&self, restrict: &[String]) -> Vec<Language> {
        let restriction: HashSet<String> = restrict.iter().map(|code| base_code(code)).collect();
        let mut languages: Vec<Language> = self
            .codes
            .iter()
            .filter(|(code, _)| restriction.is_empty() || restriction.contains(*code))
            .map(|(code, name)| Language {
                code: code.clone(),
                display_name: name.clone(),
            })
            .collect();
        languages.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.code.cmp(&b.code))
        });
        let mut seen = HashSet::new();
        languages.retain(|language| seen.insert(base_code(&language.code)));
        languages
    }
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}

pub fn base_code(code: &str) -> String {
    normalize_code(code)
        .split('-')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Best-effort source language of a recognized string. The script of the
/// text decides for non-Latin writing systems; for Latin text the OCR hint
/// is all we have. `None` means "could not tell", which keeps the
/// observation in play rather than dropping it.
pub fn identify_language(text: &str, hint: Option<&str>) -> Option<String> {
    let hint_base = hint
        .map(|code| base_code(code))
        .filter(|base| !base.is_empty());
    if let Some(code) = script::identify_script_language(text, hint_base.as_deref()) {
        return Some(code);
    }
    hint_base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_loads_and_validates_codes() {
        let registry = LanguageRegistry::load().expect("registry");
        assert!(registry.is_valid_code("en"));
        assert!(registry.is_valid_code("PT-BR"));
        assert!(registry.is_valid_code("fil"));
        assert!(!registry.is_valid_code("xx"));
        assert!(!registry.is_valid_code(""));
        assert!(!registry.is_valid_code("-br"));
    }

    #[test]
    fn language_keeps_the_region_suffix() {
        let registry = LanguageRegistry::load().expect("registry");
        let language = registry.language("PT-BR").expect("language");
        assert_eq!(language.code, "pt-br");
        assert_eq!(language.display_name, "Portuguese");
        assert!(registry.language("zz-zz").is_none());
    }

    #[test]
    fn catalog_is_sorted_and_respects_restriction() {
        let registry = LanguageRegistry::load().expect("registry");
        let all = registry.supported_languages(&[]);
        assert!(all.len() > 50);
        let names: Vec<&str> = all
            .iter()
            .map(|language| language.display_name.as_str())
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);

        let restricted = registry.supported_languages(&[
            "fr".to_string(),
            "de".to_string(),
            "de-at".to_string(),
        ]);
        let codes: Vec<&str> = restricted
            .iter()
            .map(|language| language.code.as_str())
            .collect();
        assert_eq!(codes, vec!["fr", "de"]);
    }

    #[test]
    fn identify_prefers_script_over_hint() {
        assert_eq!(
            identify_language("営業中です", Some("en")).as_deref(),
            Some("ja")
        );
        assert_eq!(identify_language("Выход", None).as_deref(), Some("ru"));
    }

    #[test]
    fn identify_falls_back_to_the_hint_for_latin_text() {
        assert_eq!(identify_language("ARRÊT", Some("FR")).as_deref(), Some("fr"));
        assert_eq!(
            identify_language("STOP", Some("en-US")).as_deref(),
            Some("en")
        );
        assert_eq!(identify_language("STOP", None), None);
    }

    #[test]
    fn base_code_strips_region_and_case() {
        assert_eq!(base_code(" PT-BR "), "pt");
        assert_eq!(base_code("ja"), "ja");
        assert_eq!(base_code(""), "");
    }
}
