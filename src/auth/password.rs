use std::sync::LazyLock;

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;
use regex::Regex;

/// Hash a password using Argon2id (19MB memory, 2 iterations, parallelism 1).
pub fn hash(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let params = Params::new(19 * 1024, 2, 1, None).map_err(|e| format!("Invalid params: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| format!("Hashing failed: {e}"))
}

/// Verify a password against a hash.
pub fn verify(password: &str, hash: &str) -> Result<bool, String> {
    let parsed = PasswordHash::new(hash).map_err(|e| format!("Invalid hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

static PASSWORD_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z\d\S]{8,}$").expect("valid regex"));

/// At least 8 characters, no whitespace, with a lowercase letter, an
/// uppercase letter, a digit and a symbol.
pub fn is_strong(password: &str) -> bool {
    PASSWORD_CHARS.is_match(password)
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password
            .chars()
            .any(|c| !c.is_ascii_alphanumeric() && !c.is_whitespace())
}

/// Six-digit account activation code.
pub fn activation_code() -> i32 {
    rand::rng().random_range(100_000..=999_999)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let h = hash("Sup3r$ecret").unwrap();
        assert!(verify("Sup3r$ecret", &h).unwrap());
        assert!(!verify("wrong", &h).unwrap());
    }

    #[test]
    fn strength_rules() {
        assert!(is_strong("Sup3r$ecret"));
        assert!(!is_strong("Sh0rt$"));
        assert!(!is_strong("alllowercase1$"));
        assert!(!is_strong("ALLUPPERCASE1$"));
        assert!(!is_strong("NoDigitsHere$"));
        assert!(!is_strong("NoSymbols123"));
        assert!(!is_strong("Has Space1$"));
    }

    #[test]
    fn activation_code_has_six_digits() {
        for _ in 0..1000 {
            let code = activation_code();
            assert!((100_000..=999_999).contains(&code));
        }
    }
}
