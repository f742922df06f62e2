use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

static PRIVATE_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-----BEGIN (?:RSA |EC |OPENSSH )?PRIVATE KEY-----")
        .expect("private key regex is valid")
});
static AWS_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bAKIA[0-9A-Z]{16}\b").expect("aws key regex is valid"));
static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:sk|pk|rk|gsk|xoxb|xoxp)[-_][A-Za-z0-9_\-]{16,}")
        .expect("api key regex is valid")
});
static CARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{4}[ -]\d{4}[ -]\d{4}[ -]\d{4}\b").expect("card regex is valid")
});
static PASSWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:password|passwd|parola|şifre)\s*[=:]\s*[^\s"',]{4,}"#)
        .expect("password regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    PrivateKey,
    AwsKey,
    ApiKey,
    CardNumber,
    Password,
}

impl std::fmt::Display for SecretKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretKind::PrivateKey => write!(f, "private key"),
            SecretKind::AwsKey => write!(f, "AWS access key"),
            SecretKind::ApiKey => write!(f, "API key"),
            SecretKind::CardNumber => write!(f, "card number"),
            SecretKind::Password => write!(f, "password"),
        }
    }
}

/// Detects credentials and card numbers that must never be forwarded to a
/// third-party model or search engine.
pub struct SecretScanner;

impl SecretScanner {
    /// Kinds of secret found in `text`, in a fixed order, each at most once.
    pub fn scan(text: &str) -> Vec<SecretKind> {
        let checks: [(&LazyLock<Regex>, SecretKind); 5] = [
            (&PRIVATE_KEY_RE, SecretKind::PrivateKey),
            (&AWS_KEY_RE, SecretKind::AwsKey),
            (&API_KEY_RE, SecretKind::ApiKey),
            (&CARD_RE, SecretKind::CardNumber),
            (&PASSWORD_RE, SecretKind::Password),
        ];

        let found: Vec<SecretKind> = checks
            .iter()
            .filter(|(re, _)| re.is_match(text))
            .map(|(_, kind)| *kind)
            .collect();

        if !found.is_empty() {
            warn!(
                kinds = %found.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", "),
                "secret detected in message"
            );
        }
        found
    }
}
