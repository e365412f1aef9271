//! Field validation shared by the command types.

use thiserror::Error;

/// A command field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// An identifier was zero or negative.
    #[error("Invalid {field}: {value} (must be greater than 0)")]
    NonPositiveId { field: &'static str, value: i64 },

    /// An order quantity was zero or negative.
    #[error("Invalid quantity: {0} (must be greater than 0)")]
    NonPositiveQuantity(i32),

    /// A stock level was negative.
    #[error("Invalid stock: {0} (must not be negative)")]
    NegativeStock(i32),

    /// A required text field was empty or whitespace.
    #[error("{field} is required")]
    Blank { field: &'static str },
}

pub(crate) fn positive_id(field: &'static str, value: i64) -> Result<(), ValidationError> {
    if value <= 0 {
        return Err(ValidationError::NonPositiveId { field, value });
    }
    Ok(())
}

pub(crate) fn positive_quantity(quantity: i32) -> Result<(), ValidationError> {
    if quantity <= 0 {
        return Err(ValidationError::NonPositiveQuantity(quantity));
    }
    Ok(())
}

pub(crate) fn non_negative_stock(stock: i32) -> Result<(), ValidationError> {
    if stock < 0 {
        return Err(ValidationError::NegativeStock(stock));
    }
    Ok(())
}

pub(crate) fn required_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Blank { field });
    }
    Ok(())
}
