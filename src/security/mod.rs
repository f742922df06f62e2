pub mod secrets;

use tracing::warn;

use crate::config::SafetyConfig;
use secrets::SecretScanner;

/// Outcome of inspecting one raw user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyVerdict {
    Safe,
    Blocked {
        /// User-facing text explaining the refusal.
        message: String,
        /// Short machine-readable cause.
        reason: String,
    },
}

impl SafetyVerdict {
    #[cfg(test)]
    pub fn is_safe(&self) -> bool {
        matches!(self, SafetyVerdict::Safe)
    }

    fn blocked(message: &str, reason: impl Into<String>) -> Self {
        SafetyVerdict::Blocked {
            message: message.to_string(),
            reason: reason.into(),
        }
    }
}

/// Content policy applied before any tool or model call is made.
pub trait SafetyFilter: Send + Sync {
    fn check(&self, message: &str) -> SafetyVerdict;
}

/// Default filter: size limits, operator-configured blocked terms and
/// secret detection.
pub struct PolicyFilter {
    max_message_chars: usize,
    blocked_terms: Vec<String>,
    block_secrets: bool,
}

impl PolicyFilter {
    pub fn new(config: &SafetyConfig) -> Self {
        Self {
            max_message_chars: config.max_message_chars,
            blocked_terms: config
                .blocked_terms
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            block_secrets: config.block_secrets,
        }
    }
}

impl SafetyFilter for PolicyFilter {
    fn check(&self, message: &str) -> SafetyVerdict {
        if message.trim().is_empty() {
            return SafetyVerdict::blocked("Lütfen bir mesaj yazın.", "empty_message");
        }

        let len = message.chars().count();
        if len > self.max_message_chars {
            warn!(len, limit = self.max_message_chars, "message too long");
            return SafetyVerdict::blocked(
                "Mesajınız çok uzun. Lütfen kısaltıp tekrar deneyin.",
                "message_too_long",
            );
        }

        let lower = message.to_lowercase();
        if let Some(term) = self.blocked_terms.iter().find(|t| lower.contains(t.as_str())) {
            warn!(term = %term, "blocked term in message");
            return SafetyVerdict::blocked(
                "Bu konuda yardımcı olamıyorum.",
                "blocked_content",
            );
        }

        if self.block_secrets {
            if let Some(kind) = SecretScanner::scan(message).first() {
                return SafetyVerdict::blocked(
                    "Mesajınız gizli bilgi içeriyor gibi görünüyor. Lütfen şifre, anahtar veya kart numarası paylaşmayın.",
                    format!("sensitive_data: {kind}"),
                );
            }
        }

        SafetyVerdict::Safe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(terms: &[&str]) -> PolicyFilter {
        PolicyFilter::new(&SafetyConfig {
            max_message_chars: 20,
            blocked_terms: terms.iter().map(|t| t.to_string()).collect(),
            block_secrets: true,
        })
    }

    fn reason(v: SafetyVerdict) -> String {
        match v {
            SafetyVerdict::Blocked { reason, .. } => reason,
            SafetyVerdict::Safe => panic!("expected block"),
        }
    }

    #[test]
    fn ordinary_message_is_safe() {
        assert!(filter(&[]).check("2 + 2").is_safe());
    }

    #[test]
    fn empty_message_is_blocked() {
        assert_eq!(reason(filter(&[]).check("  \n")), "empty_message");
    }

    #[test]
    fn long_message_is_blocked() {
        assert_eq!(
            reason(filter(&[]).check(&"a".repeat(21))),
            "message_too_long"
        );
    }

    #[test]
    fn blocked_term_is_case_insensitive() {
        assert_eq!(reason(filter(&["BadWord"]).check("a badword")), "blocked_content");
    }

    #[test]
    fn secrets_are_blocked() {
        let f = PolicyFilter::new(&SafetyConfig::default());
        assert_eq!(
            reason(f.check("my card 4111 1111 1111 1111")),
            "sensitive_data: card number"
        );
    }

    #[test]
    fn secret_detection_can_be_disabled() {
        let f = PolicyFilter::new(&SafetyConfig {
            block_secrets: false,
            ..SafetyConfig::default()
        });
        assert!(f.check("my card 4111 1111 1111 1111").is_safe());
    }
}
