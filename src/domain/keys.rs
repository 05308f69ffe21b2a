//! Toggle key generation and validation.

use slug::slugify;
use uuid::Uuid;

use crate::domain::error::DomainError;

const MAX_KEY_LEN: usize = 160;
const FALLBACK_STEM: &str = "toggle";

/// Derive a globally unique key from a display name.
///
/// Format: `{slug(name)}-{8 hex chars of a v4 uuid}-{epoch millis}`.
pub fn generate_key(name: &str, epoch_millis: i128) -> String {
    let stem = slugify(name);
    let stem = if stem.is_empty() {
        FALLBACK_STEM
    } else {
        stem.as_str()
    };
    let nonce = Uuid::new_v4().simple().to_string();
    format!("{stem}-{}-{epoch_millis}", &nonce[..8])
}

/// Keys are immutable URL path segments: lowercase ASCII alphanumerics and hyphens.
pub fn validate_key(key: &str) -> Result<(), DomainError> {
    if key.is_empty() {
        return Err(DomainError::field("key", "key is required"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(DomainError::field(
            "key",
            format!("key must be at most {MAX_KEY_LEN} characters"),
        ));
    }
    if key.starts_with('-') {
        return Err(DomainError::field("key", "key must not start with a hyphen"));
    }
    if !key
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(DomainError::field(
            "key",
            "key may contain only lowercase letters, digits and hyphens",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_url_safe_and_unique() {
        let first = generate_key("Dark Mode!", 1_700_000_000_000);
        let second = generate_key("Dark Mode!", 1_700_000_000_000);

        assert!(first.starts_with("dark-mode-"));
        assert!(first.ends_with("-1700000000000"));
        assert_ne!(first, second);
        validate_key(&first).expect("generated key is valid");
    }

    #[test]
    fn empty_names_fall_back_to_stem() {
        let key = generate_key("!!!", 1);
        assert!(key.starts_with("toggle-"));
    }

    #[test]
    fn validate_rejects_unsafe_keys() {
        assert!(validate_key("").is_err());
        assert!(validate_key("Has Space").is_err());
        assert!(validate_key("../etc").is_err());
        assert!(validate_key("-lead").is_err());
        validate_key("checkout-v2").unwrap();
    }
}
