//! Entity services.
//!
//! Each service is a module of async functions that take the caller's
//! connection. Handlers open a transaction with `pool.begin()` and pass
//! `&mut *tx`; the transaction commits when the handler succeeds and rolls
//! back when it is dropped after an error. Operations that must be atomic on
//! their own open a nested transaction (a savepoint) on the connection they
//! were given.

pub mod api_token;
pub mod bento;
pub mod bento_repository;
pub mod cluster;
pub mod deployment;
pub mod deployment_target;
pub mod image_builder;
pub mod kube_bento_deployment;
pub mod label;
pub mod model;
pub mod model_repository;
pub mod organization;
pub mod user;

use crate::error::{Error, Result};

/// Longest accepted resource name.
pub const MAX_NAME_LENGTH: usize = 63;

/// Check that `name` is a usable resource name: non-empty, at most
/// [`MAX_NAME_LENGTH`] characters, ASCII alphanumerics plus `-`, `_`, `.`,
/// starting with an alphanumeric.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "invalid {} name {:?}",
            kind, name
        )))
    }
}

/// Lowercase `input` and join its words with `-`.
///
/// Word boundaries are non-alphanumeric characters and lower-to-upper case
/// transitions, so `IrisClassifier_v1` becomes `iris-classifier-v1`. Dots are
/// kept.
pub fn kebab_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    let mut prev: Option<char> = None;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || c == '.' {
            let boundary = matches!(prev, Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit())
                && c.is_ascii_uppercase();
            if boundary && !out.ends_with('-') {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
        prev = Some(c);
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("repository", "iris_classifier").is_ok());
        assert!(validate_name("repository", "v1.2-rc").is_ok());
        assert!(validate_name("repository", "").is_err());
        assert!(validate_name("repository", "-leading").is_err());
        assert!(validate_name("repository", "has space").is_err());
        assert!(validate_name("repository", &"a".repeat(64)).is_err());
    }

    #[test]
    fn test_kebab_case() {
        assert_eq!(kebab_case("IrisClassifier_v1"), "iris-classifier-v1");
        assert_eq!(kebab_case("acme  corp__x"), "acme-corp-x");
        assert_eq!(kebab_case("v1.2.0"), "v1.2.0");
        assert_eq!(kebab_case("trailing_"), "trailing");
    }
}
