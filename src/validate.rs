use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Field-scoped failures collected from one validation pass, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{count} field(s) failed validation", count = .errors.len())]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// First message reported for `field`, if any.
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

/// Accumulates at most one error per field; later checks on a field that
/// already failed are skipped.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn failed(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        if !self.failed(field) {
            self.errors.push(FieldError {
                field,
                message: message.into(),
            });
        }
    }

    /// Bounded text with the standard "at least"/"must not exceed" messages.
    pub fn text_length(
        &mut self,
        field: &'static str,
        label: &str,
        value: &str,
        min: usize,
        max: usize,
    ) -> &mut Self {
        let len = value.chars().count();
        if len < min {
            self.push(field, format!("{label} must be at least {min} characters"));
        } else if len > max {
            self.push(field, format!("{label} must not exceed {max} characters"));
        }
        self
    }

    pub fn min_chars(
        &mut self,
        field: &'static str,
        value: &str,
        min: usize,
        message: &str,
    ) -> &mut Self {
        if value.chars().count() < min {
            self.push(field, message);
        }
        self
    }

    pub fn required(&mut self, field: &'static str, value: &str, message: &str) -> &mut Self {
        self.min_chars(field, value, 1, message)
    }

    pub fn range(
        &mut self,
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
        message: &str,
    ) -> &mut Self {
        if value < min || value > max {
            self.push(field, message);
        }
        self
    }

    pub fn non_empty<T>(&mut self, field: &'static str, items: &[T], message: &str) -> &mut Self {
        if items.is_empty() {
            self.push(field, message);
        }
        self
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors {
                errors: self.errors,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_title_reports_minimum() {
        let mut v = Validator::new();
        v.text_length("title", "Title", "abcd", 5, 100);
        let errors = v.finish().unwrap_err();
        assert_eq!(
            errors.message_for("title"),
            Some("Title must be at least 5 characters")
        );
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let mut v = Validator::new();
        v.text_length("title", "Title", "ééééé", 5, 5);
        assert!(v.finish().is_ok());
    }

    #[test]
    fn keeps_first_error_per_field_in_order() {
        let mut v = Validator::new();
        v.required("category", "", "Please select a category")
            .min_chars("category", "", 3, "other")
            .range("progressPercent", 101, 0, 100, "out of range");
        let errors = v.finish().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["category", "progressPercent"]);
        assert_eq!(
            errors.message_for("category"),
            Some("Please select a category")
        );
        assert_eq!(errors.to_string(), "2 field(s) failed validation");
    }
}
