#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Latin,
    Han,
    Kana,
    Hangul,
    Cyrillic,
    Arabic,
    Hebrew,
    Greek,
    Thai,
    Devanagari,
}

pub fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    )
}

fn script_of_char(ch: char) -> Option<Script> {
    if !ch.is_alphabetic() {
        return None;
    }
    let code = ch as u32;
    match code {
        0x3040..=0x30FF | 0x31F0..=0x31FF => Some(Script::Kana),
        0x4E00..=0x9FFF | 0x3400..=0x4DBF => Some(Script::Han),
        0xAC00..=0xD7AF | 0x1100..=0x11FF => Some(Script::Hangul),
        0x0400..=0x04FF | 0x0500..=0x052F => Some(Script::Cyrillic),
        0x0600..=0x06FF | 0x0750..=0x077F => Some(Script::Arabic),
        0x0590..=0x05FF => Some(Script::Hebrew),
        0x0370..=0x03FF => Some(Script::Greek),
        0x0E00..=0x0E7F => Some(Script::Thai),
        0x0900..=0x097F => Some(Script::Devanagari),
        _ if ch.is_ascii_alphabetic() || (0x00C0..=0x024F).contains(&code) => Some(Script::Latin),
        _ => None,
    }
}

/// Script class a base language code is usually written in. Only covers
/// languages the overlay pipeline can plausibly meet in photos.
fn script_of_code(base: &str) -> Option<Script> {
    match base {
        "ja" => Some(Script::Kana),
        "zh" => Some(Script::Han),
        "ko" => Some(Script::Hangul),
        "ru" | "uk" | "bg" | "sr" | "mk" | "be" | "kk" | "ky" | "mn" | "tg" | "tt" | "ba" => {
            Some(Script::Cyrillic)
        }
        "ar" | "fa" | "ur" | "ps" | "ug" | "sd" => Some(Script::Arabic),
        "he" | "yi" => Some(Script::Hebrew),
        "el" => Some(Script::Greek),
        "th" => Some(Script::Thai),
        "hi" | "mr" | "ne" => Some(Script::Devanagari),
        _ => None,
    }
}

fn default_code(script: Script) -> Option<&'static str> {
    match script {
        Script::Latin => None,
        Script::Han => Some("zh"),
        Script::Kana => Some("ja"),
        Script::Hangul => Some("ko"),
        Script::Cyrillic => Some("ru"),
        Script::Arabic => Some("ar"),
        Script::Hebrew => Some("he"),
        Script::Greek => Some("el"),
        Script::Thai => Some("th"),
        Script::Devanagari => Some("hi"),
    }
}

/// Decides a language from the dominant script of `text`, or `None` when the
/// script alone is not decisive (Latin, digits, symbols). Any kana at all
/// means Japanese; Han without kana leans Chinese unless the hint disagrees.
pub(crate) fn identify_script_language(text: &str, hint_base: Option<&str>) -> Option<String> {
    let mut counts: [usize; 10] = [0; 10];
    let mut kana = 0usize;
    for ch in text.chars() {
        if let Some(script) = script_of_char(ch) {
            counts[script as usize] += 1;
            if script == Script::Kana {
                kana += 1;
            }
        }
    }
    if kana > 0 {
        return Some("ja".to_string());
    }

    let dominant = [
        Script::Han,
        Script::Hangul,
        Script::Cyrillic,
        Script::Arabic,
        Script::Hebrew,
        Script::Greek,
        Script::Thai,
        Script::Devanagari,
        Script::Latin,
    ]
    .into_iter()
    .max_by_key(|script| counts[*script as usize])?;
    if counts[dominant as usize] == 0 || dominant == Script::Latin {
        return None;
    }

    if dominant == Script::Han && hint_base == Some("ja") {
        return Some("ja".to_string());
    }
    if let Some(base) = hint_base {
        if script_of_code(base) == Some(dominant) {
            return Some(base.to_string());
        }
    }
    default_code(dominant).map(str::to_string)
}
