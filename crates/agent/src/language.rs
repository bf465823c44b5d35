//! Script-based language hints for inbound messages.
//!
//! This is script detection, not language identification: every Cyrillic text
//! maps to Russian and every Devanagari text to Hindi. Latin script yields no
//! hint so the stored locale is left alone.

use std::ops::RangeInclusive;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Language {
    Hindi,
    Japanese,
    Chinese,
    Korean,
    Arabic,
    Russian,
    Thai,
    Bengali,
    Gujarati,
    Tamil,
    Telugu,
    Kannada,
    Malayalam,
    Punjabi,
    Amharic,
    Sinhala,
    Burmese,
    Tibetan,
}

impl Language {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Hindi => "hi",
            Self::Japanese => "ja",
            Self::Chinese => "zh",
            Self::Korean => "ko",
            Self::Arabic => "ar",
            Self::Russian => "ru",
            Self::Thai => "th",
            Self::Bengali => "bn",
            Self::Gujarati => "gu",
            Self::Tamil => "ta",
            Self::Telugu => "te",
            Self::Kannada => "kn",
            Self::Malayalam => "ml",
            Self::Punjabi => "pa",
            Self::Amharic => "am",
            Self::Sinhala => "si",
            Self::Burmese => "my",
            Self::Tibetan => "bo",
        }
    }

    pub fn english_name(&self) -> &'static str {
        match self {
            Self::Hindi => "Hindi",
            Self::Japanese => "Japanese",
            Self::Chinese => "Chinese",
            Self::Korean => "Korean",
            Self::Arabic => "Arabic",
            Self::Russian => "Russian",
            Self::Thai => "Thai",
            Self::Bengali => "Bengali",
            Self::Gujarati => "Gujarati",
            Self::Tamil => "Tamil",
            Self::Telugu => "Telugu",
            Self::Kannada => "Kannada",
            Self::Malayalam => "Malayalam",
            Self::Punjabi => "Punjabi",
            Self::Amharic => "Amharic",
            Self::Sinhala => "Sinhala",
            Self::Burmese => "Burmese",
            Self::Tibetan => "Tibetan",
        }
    }

    /// Display name for a stored locale tag; unknown tags fall back to the tag itself.
    pub fn display_name_for_tag(tag: &str) -> String {
        if tag.eq_ignore_ascii_case("en") {
            return "English".to_string();
        }
        SCRIPT_TABLE
            .iter()
            .map(|(language, _)| *language)
            .find(|language| language.tag().eq_ignore_ascii_case(tag))
            .map(|language| language.english_name().to_string())
            .unwrap_or_else(|| tag.to_string())
    }
}

/// Checked in order, first match wins. Kana precedes Han so Japanese text
/// mixing kanji and kana is not reported as Chinese.
const SCRIPT_TABLE: &[(Language, &[RangeInclusive<u32>])] = &[
    (Language::Hindi, &[0x0900..=0x097F]),
    (Language::Japanese, &[0x3040..=0x309F, 0x30A0..=0x30FF, 0x31F0..=0x31FF]),
    (Language::Chinese, &[0x4E00..=0x9FFF, 0x3400..=0x4DBF]),
    (Language::Korean, &[0xAC00..=0xD7AF, 0x1100..=0x11FF, 0x3130..=0x318F]),
    (Language::Arabic, &[0x0600..=0x06FF, 0x0750..=0x077F]),
    (Language::Russian, &[0x0400..=0x04FF]),
    (Language::Thai, &[0x0E00..=0x0E7F]),
    (Language::Bengali, &[0x0980..=0x09FF]),
    (Language::Gujarati, &[0x0A80..=0x0AFF]),
    (Language::Tamil, &[0x0B80..=0x0BFF]),
    (Language::Telugu, &[0x0C00..=0x0C7F]),
    (Language::Kannada, &[0x0C80..=0x0CFF]),
    (Language::Malayalam, &[0x0D00..=0x0D7F]),
    (Language::Punjabi, &[0x0A00..=0x0A7F]),
    (Language::Amharic, &[0x1200..=0x137F]),
    (Language::Sinhala, &[0x0D80..=0x0DFF]),
    (Language::Burmese, &[0x1000..=0x109F]),
    (Language::Tibetan, &[0x0F00..=0x0FFF]),
];

fn is_signal_char(c: char) -> bool {
    !(c.is_whitespace() || c.is_ascii_punctuation() || c.is_numeric() || is_symbol_or_mark(c))
}

/// General punctuation and CJK/fullwidth punctuation blocks, which carry no script signal.
fn is_symbol_or_mark(c: char) -> bool {
    matches!(u32::from(c), 0x2000..=0x206F | 0x3000..=0x303F | 0xFF00..=0xFF0F | 0x0964..=0x0965)
}

pub fn detect(text: &str) -> Option<Language> {
    let letters = text.chars().filter(|c| is_signal_char(*c)).collect::<Vec<_>>();
    if letters.is_empty() {
        return None;
    }

    SCRIPT_TABLE
        .iter()
        .find(|(_, ranges)| {
            letters.iter().any(|c| ranges.iter().any(|range| range.contains(&u32::from(*c))))
        })
        .map(|(language, _)| *language)
}
