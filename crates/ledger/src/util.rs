//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API.

use uuid::Uuid;

use crate::{EngineError, Money, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| EngineError::IntegrityViolation(format!("invalid {label} id: {value}")))
}

pub(crate) fn parse_optional_uuid(value: Option<&str>, label: &str) -> ResultEngine<Option<Uuid>> {
    value.map(|v| parse_uuid(v, label)).transpose()
}

/// Canonical cents of a stored monetary column.
///
/// The cents mirror wins; rows written before the mirror existed fall back to
/// the legacy decimal text.
pub(crate) fn stored_money(
    decimal: Option<&str>,
    cents: Option<i64>,
    column: &str,
) -> ResultEngine<Money> {
    if let Some(cents) = cents {
        return Ok(Money::new(cents));
    }
    match decimal {
        Some(text) => text.parse::<Money>().map_err(|_| {
            EngineError::IntegrityViolation(format!("unparseable {column}: {text:?}"))
        }),
        None => Err(EngineError::IntegrityViolation(format!(
            "{column} has neither decimal nor cents value"
        ))),
    }
}

pub(crate) fn stored_optional_money(
    decimal: Option<&str>,
    cents: Option<i64>,
    column: &str,
) -> ResultEngine<Option<Money>> {
    if decimal.is_none() && cents.is_none() {
        return Ok(None);
    }
    stored_money(decimal, cents, column).map(Some)
}

pub(crate) fn require_positive(amount: Money, label: &str) -> ResultEngine<()> {
    if !amount.is_positive() {
        return Err(EngineError::Validation(format!("{label} must be > 0")));
    }
    Ok(())
}

pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_mirror_wins_over_decimal() {
        assert_eq!(
            stored_money(Some("1.00"), Some(250), "amount").unwrap(),
            Money::new(250)
        );
        assert_eq!(
            stored_money(Some("1.00"), None, "amount").unwrap(),
            Money::new(100)
        );
        assert!(stored_money(None, None, "amount").is_err());
        assert_eq!(stored_optional_money(None, None, "fees").unwrap(), None);
    }
}
