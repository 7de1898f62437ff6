//! Garde validation utilities.

use crate::domain::PipelineError;
use garde::{Report, Validate};

/// Convert a garde validation report to a pipeline validation error.
pub fn validate_struct<T>(value: &T) -> Result<(), PipelineError>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| PipelineError::Validation(format_validation_errors(&report)))
}

fn format_validation_errors(report: &Report) -> String {
    report
        .iter()
        .map(|(path, error)| {
            if path.to_string().is_empty() {
                error.message().to_string()
            } else {
                format!("{}: {}", path, error.message())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use garde::Validate;

    #[derive(Validate)]
    struct TestRequest {
        #[garde(length(min = 1))]
        field: String,
    }

    #[test]
    fn test_validate_success() {
        let request = TestRequest {
            field: "value".to_string(),
        };
        assert!(validate_struct(&request).is_ok());
    }

    #[test]
    fn test_validate_failure_names_the_field() {
        let request = TestRequest {
            field: "".to_string(),
        };
        match validate_struct(&request) {
            Err(PipelineError::Validation(msg)) => assert!(msg.contains("field")),
            other => panic!("expected validation error, got {:?}", other.err()),
        }
    }
}
