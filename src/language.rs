//! Lightweight reply-language detection.
//!
//! Scores a message against per-language letters and stop-words.  Good
//! enough to pick the language of an apology or a system prompt hint; not a
//! general-purpose identifier.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Tr,
    En,
    De,
    Es,
    Fr,
}

const ALL: [Language; 5] = [
    Language::Tr,
    Language::En,
    Language::De,
    Language::Es,
    Language::Fr,
];

impl Language {
    pub fn tag(self) -> &'static str {
        match self {
            Language::Tr => "tr",
            Language::En => "en",
            Language::De => "de",
            Language::Es => "es",
            Language::Fr => "fr",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_lowercase();
        let primary = tag.split(['-', '_']).next().unwrap_or_default();
        ALL.into_iter().find(|l| l.tag() == primary)
    }

    /// English name, used inside prompts ("Reply in Turkish").
    pub fn name(self) -> &'static str {
        match self {
            Language::Tr => "Turkish",
            Language::En => "English",
            Language::De => "German",
            Language::Es => "Spanish",
            Language::Fr => "French",
        }
    }

    /// Generic apology returned in place of a failed answer.
    pub fn apology(self) -> &'static str {
        match self {
            Language::Tr => "Üzgünüm, şu anda yanıt veremiyorum. Lütfen tekrar deneyin.",
            Language::En => "Sorry, I cannot respond right now. Please try again.",
            Language::De => {
                "Entschuldigung, ich kann derzeit nicht antworten. Bitte versuchen Sie es erneut."
            }
            Language::Es => "Lo siento, no puedo responder ahora. Por favor, inténtalo de nuevo.",
            Language::Fr => "Désolé, je ne peux pas répondre maintenant. Veuillez réessayer.",
        }
    }

    fn distinctive_letters(self) -> &'static [char] {
        match self {
            Language::Tr => &['ı', 'ğ', 'ş', 'İ', 'Ğ', 'Ş'],
            Language::De => &['ß', 'ä'],
            Language::Es => &['ñ', '¿', '¡'],
            Language::Fr => &['è', 'ê', 'à', 'œ'],
            Language::En => &[],
        }
    }

    fn stop_words(self) -> &'static [&'static str] {
        match self {
            Language::Tr => &[
                "ve", "bir", "bu", "ne", "nedir", "kimdir", "mi", "mı", "için", "nasıl", "bugün",
                "hava", "merhaba", "var", "değil",
            ],
            Language::En => &[
                "the", "is", "what", "who", "how", "and", "of", "in", "today", "weather", "hello",
                "please", "you", "are",
            ],
            Language::De => &[
                "der", "die", "das", "und", "ist", "wie", "wetter", "heute", "nicht", "ich", "hallo",
            ],
            Language::Es => &[
                "el", "la", "los", "que", "es", "cómo", "qué", "tiempo", "hoy", "hola", "por",
            ],
            Language::Fr => &[
                "le", "les", "est", "quel", "quelle", "et", "météo", "aujourd'hui", "bonjour",
                "je", "vous",
            ],
        }
    }
}

/// Guess the language of `text`.  Returns `None` when no language scores.
/// Ties resolve in declaration order (Turkish first).
pub fn detect(text: &str) -> Option<Language> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .collect();

    let mut best: Option<(Language, usize)> = None;
    for lang in ALL {
        let letters = text
            .chars()
            .filter(|c| lang.distinctive_letters().contains(c))
            .count();
        let stops = words
            .iter()
            .filter(|w| lang.stop_words().contains(w))
            .count();
        let score = letters * 2 + stops;
        if score > 0 && best.is_none_or(|(_, s)| score > s) {
            best = Some((lang, score));
        }
    }
    best.map(|(lang, _)| lang)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_turkish() {
        assert_eq!(detect("Bugün hava nasıl?"), Some(Language::Tr));
        assert_eq!(detect("Atatürk kimdir"), Some(Language::Tr));
    }

    #[test]
    fn detects_english() {
        assert_eq!(detect("What is the weather like today?"), Some(Language::En));
    }

    #[test]
    fn detects_german_and_spanish() {
        assert_eq!(detect("Wie ist das Wetter heute?"), Some(Language::De));
        assert_eq!(detect("¿Qué tiempo hace hoy?"), Some(Language::Es));
    }

    #[test]
    fn no_signal_is_none() {
        assert_eq!(detect("2 + 2"), None);
        assert_eq!(detect(""), None);
    }

    #[test]
    fn from_tag_accepts_regions() {
        assert_eq!(Language::from_tag("en-US"), Some(Language::En));
        assert_eq!(Language::from_tag("TR"), Some(Language::Tr));
        assert_eq!(Language::from_tag("ja"), None);
    }

    #[test]
    fn every_language_has_an_apology() {
        for lang in ALL {
            assert!(!lang.apology().is_empty());
        }
    }
}
