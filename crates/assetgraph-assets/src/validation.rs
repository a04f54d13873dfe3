//! Field-level validation errors

/// Accumulated validation failures, reported together
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("{}", .errors.join("; "))]
pub struct FieldErrors {
    errors: Vec<String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A required field is missing or empty
    pub fn required(&mut self, path: &str, detail: impl std::fmt::Display) {
        self.errors.push(format!("{path}: Required value: {detail}"));
    }

    /// A field holds an unacceptable value
    pub fn invalid(&mut self, path: &str, value: impl std::fmt::Display, detail: impl std::fmt::Display) {
        self.errors
            .push(format!("{path}: Invalid value: \"{value}\": {detail}"));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `Ok` if nothing was recorded
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_joined() {
        let mut errors = FieldErrors::new();
        errors.required("metadata.name", "cluster name must be set");
        errors.invalid("controlPlane.replicas", 0, "must be at least 1");

        let err = errors.into_result().unwrap_err();
        assert_eq!(err.len(), 2);
        assert_eq!(
            err.to_string(),
            "metadata.name: Required value: cluster name must be set; \
             controlPlane.replicas: Invalid value: \"0\": must be at least 1"
        );
    }

    #[test]
    fn empty_is_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
    }
}
