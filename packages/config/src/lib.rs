// ABOUTME: Shared configuration primitives for Kubexec crates
// ABOUTME: Exposes environment variable names, defaults, and a helper for reading them

pub mod constants;

pub use constants::*;

/// Read an environment variable, treating unset and blank values the same way.
///
/// Surrounding whitespace is trimmed so `KUBEXEC_IMAGE=" python:3.12 "` in a
/// `.env` file behaves like the unquoted value.
pub fn read_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => {
            tracing::debug!(variable = name, "using value from environment");
            Some(value.trim().to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_var_missing_and_blank() {
        std::env::remove_var("KUBEXEC_TEST_READ_VAR_MISSING");
        assert_eq!(read_var("KUBEXEC_TEST_READ_VAR_MISSING"), None);

        std::env::set_var("KUBEXEC_TEST_READ_VAR_BLANK", "   ");
        assert_eq!(read_var("KUBEXEC_TEST_READ_VAR_BLANK"), None);
    }

    #[test]
    fn test_read_var_trims_value() {
        std::env::set_var("KUBEXEC_TEST_READ_VAR_TRIM", "  kube-jobs ");
        assert_eq!(
            read_var("KUBEXEC_TEST_READ_VAR_TRIM"),
            Some("kube-jobs".to_string())
        );
    }
}
