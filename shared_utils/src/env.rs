use std::path::PathBuf;

use thiserror::Error;

/// An environment variable required by the application is not set.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Reads an environment variable, returning a structured error if it's missing.
///
/// This is a thin wrapper around `std::env::var` that provides a more
/// ergonomic and specific error type for missing variables. A variable that is
/// set but blank counts as missing.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(MissingEnvVarError(name.to_string())),
    }
}

/// Reads an optional path from the environment.
///
/// Returns `None` when the variable is unset or blank, so callers can fall back
/// to a default location.
pub fn env_path(name: &str) -> Option<PathBuf> {
    get_env_var(name).ok().map(|v| PathBuf::from(v.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNSET: &str = "SHARED_UTILS_TEST_SURELY_UNSET_VAR";

    #[test]
    fn missing_var_names_the_variable() {
        let err = get_env_var(UNSET).unwrap_err();
        assert_eq!(err.0, UNSET);
        assert!(err.to_string().contains(UNSET));
    }

    #[test]
    fn missing_path_is_none() {
        assert!(env_path(UNSET).is_none());
    }

    #[test]
    fn present_var_is_returned() {
        // PATH is set in every test environment we run in
        let path = get_env_var("PATH").unwrap();
        assert!(!path.is_empty());
    }
}
