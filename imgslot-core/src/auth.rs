use crate::error::{ImgSlotError, Result};
use sha2::{Digest, Sha256};

/// Secret used when the operator has not configured one. Anything guarded by
/// this value is effectively public.
pub const DEFAULT_API_KEY: &str = "development-insecure-key";

/// AccessGate checks bearer credentials against the configured secret before
/// a mutation is allowed through to the store.
#[derive(Debug, Clone)]
pub struct AccessGate {
    secret: String,
    insecure_default: bool,
}

impl AccessGate {
    pub fn new(secret: impl Into<String>) -> Self {
        let secret = secret.into();
        let insecure_default = secret == DEFAULT_API_KEY;
        Self {
            secret,
            insecure_default,
        }
    }

    /// Build a gate from an optional configured secret, falling back to
    /// [`DEFAULT_API_KEY`] with an error-level log when it is missing.
    pub fn from_configured(secret: Option<String>) -> Self {
        match secret.filter(|value| !value.trim().is_empty()) {
            Some(secret) => Self::new(secret),
            None => {
                tracing::error!(
                    "No API key configured, falling back to the insecure development key. \
                     Set IMGSLOT_API_KEY (or API_KEY) before exposing this service."
                );
                Self::new(DEFAULT_API_KEY)
            }
        }
    }

    pub fn uses_insecure_default(&self) -> bool {
        self.insecure_default
    }

    pub fn authorize(&self, presented: Option<&str>) -> Result<()> {
        match presented {
            Some(token) if secrets_match(token, &self.secret) => Ok(()),
            _ => Err(ImgSlotError::Unauthorized),
        }
    }
}

/// Exact-match comparison whose running time does not depend on where the
/// inputs first differ, or on their lengths. Both sides are hashed to fixed
/// width and the digests are folded without early exit.
fn secrets_match(presented: &str, secret: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let secret = Sha256::digest(secret.as_bytes());

    presented
        .iter()
        .zip(secret.iter())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

/// Extract the token from an `Authorization` header value of the form
/// `Bearer <token>`. The scheme is matched case-insensitively.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_exact_match_only() {
        let gate = AccessGate::new("s3cret");

        assert!(gate.authorize(Some("s3cret")).is_ok());
        assert!(matches!(
            gate.authorize(Some("s3cret ")),
            Err(ImgSlotError::Unauthorized)
        ));
        assert!(matches!(
            gate.authorize(Some("S3CRET")),
            Err(ImgSlotError::Unauthorized)
        ));
        assert!(matches!(
            gate.authorize(None),
            Err(ImgSlotError::Unauthorized)
        ));
    }

    #[test]
    fn test_secret_comparison_covers_prefixes_and_lengths() {
        let secret = "0123456789abcdef";
        assert!(secrets_match(secret, secret));
        assert!(!secrets_match("0123456789abcde", secret));
        assert!(!secrets_match("0123456789abcdef0", secret));
        assert!(!secrets_match("1123456789abcdef", secret));
        assert!(!secrets_match("0123456789abcdeF", secret));
        assert!(!secrets_match("", secret));
        assert!(secrets_match("", ""));
    }

    #[test]
    fn test_missing_secret_uses_default() {
        let gate = AccessGate::from_configured(None);
        assert!(gate.uses_insecure_default());
        assert!(gate.authorize(Some(DEFAULT_API_KEY)).is_ok());

        let gate = AccessGate::from_configured(Some("   ".to_string()));
        assert!(gate.uses_insecure_default());

        let gate = AccessGate::from_configured(Some("prod-key".to_string()));
        assert!(!gate.uses_insecure_default());
        assert!(gate.authorize(Some(DEFAULT_API_KEY)).is_err());
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("  BEARER   abc  "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer    "), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
