use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use tera::{Context as TeraContext, Tera};

use crate::languages::Language;

mod openai;

pub use openai::LlmTranslator;

pub(crate) const TOOL_NAME: &str = "deliver_translations";

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("prompts/translate_batch.tera");

#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub source_text: String,
}

/// Batch translator. One call per pipeline stage; implementations must
/// return exactly one string per request, in request order.
#[async_trait]
pub trait TranslationService: Send + Sync {
    async fn translate_batch(
        &self,
        requests: &[TranslationRequest],
        target: &Language,
    ) -> Result<Vec<String>>;
}

/// JSON schema for the forced tool call that carries the translations back.
pub(crate) fn tool_spec() -> Value {
    json!({
        "type": "object",
        "properties": {
            "translations": {
                "type": "array",
                "items": { "type": "string" }
            }
        },
        "required": ["translations"]
    })
}

pub(crate) fn render_system_prompt(target: &Language) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("target_name", &target.display_name);
    context.insert("target_lang", &target.code);
    context.insert("tool_name", TOOL_NAME);
    Tera::one_off(SYSTEM_PROMPT_TEMPLATE, &context, false)
        .with_context(|| "failed to render translation prompt")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn french() -> Language {
        Language {
            code: "fr".to_string(),
            display_name: "French".to_string(),
        }
    }

    #[test]
    fn prompt_names_the_target_language_and_tool() {
        let prompt = render_system_prompt(&french()).expect("prompt");
        assert!(prompt.contains("into French (fr)"));
        assert!(prompt.contains("deliver_translations"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn tool_spec_requires_the_translations_array() {
        let spec = tool_spec();
        assert_eq!(spec["type"], "object");
        assert_eq!(spec["properties"]["translations"]["type"], "array");
        assert_eq!(spec["required"][0], "translations");
    }
}
