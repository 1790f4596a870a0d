//! Exact decimal quantities (m², kg, pairs, units).

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

/// A counted, expected, billed or defective quantity.
///
/// Backed by `rust_decimal` so that `0.1 + 0.2` kg compares equal to `0.3` kg
/// during reconciliation. Scale is ignored by equality (`100` == `100.00`).
///
/// Serialized as a decimal string; deserialized from JSON numbers or strings.
///
/// Accepted values carry at most [`Quantity::MAX_SCALE`] decimal places and never
/// exceed [`Quantity::MAX`]; the `ensure_*` guards enforce this at every entry
/// point. Arithmetic is checked or saturating, never panicking.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(Decimal);

impl ValueObject for Quantity {}

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);

    /// Decimal places kept for any stored quantity.
    pub const MAX_SCALE: u32 = 2;

    /// Largest stored quantity: ten significant digits, two of them decimals.
    pub const MAX: Quantity = Quantity(Decimal::from_parts(999_999_999, 0, 0, false, 2));

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn from_units(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    pub fn checked_add(self, other: Quantity) -> Option<Quantity> {
        self.0.checked_add(other.0).map(Quantity)
    }

    pub fn checked_sub(self, other: Quantity) -> Option<Quantity> {
        self.0.checked_sub(other.0).map(Quantity)
    }

    pub fn saturating_add(self, other: Quantity) -> Quantity {
        Quantity(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Quantity) -> Quantity {
        Quantity(self.0.saturating_sub(other.0))
    }

    /// Sum of `parts`, or `None` once the total leaves the `Decimal` range.
    pub fn checked_sum<I>(parts: I) -> Option<Quantity>
    where
        I: IntoIterator<Item = Quantity>,
    {
        parts
            .into_iter()
            .try_fold(Quantity::ZERO, |acc, q| acc.checked_add(q))
    }

    /// Zero or positive and within the stored range, otherwise a field error
    /// naming `field`.
    pub fn ensure_non_negative(self, field: &str) -> Result<Self, DomainError> {
        if self.is_negative() {
            return Err(DomainError::invalid_field(field, "must not be negative"));
        }
        self.ensure_in_range(field)
    }

    /// Strictly positive and within the stored range, otherwise a field error
    /// naming `field`.
    pub fn ensure_positive(self, field: &str) -> Result<Self, DomainError> {
        if !self.is_positive() {
            return Err(DomainError::invalid_field(field, "must be greater than zero"));
        }
        self.ensure_in_range(field)
    }

    fn ensure_in_range(self, field: &str) -> Result<Self, DomainError> {
        if self.0.abs() > Self::MAX.0 {
            return Err(DomainError::invalid_field(
                field,
                format!("must not exceed {}", Self::MAX),
            ));
        }
        if self.0.normalize().scale() > Self::MAX_SCALE {
            return Err(DomainError::invalid_field(
                field,
                format!("must have at most {} decimal places", Self::MAX_SCALE),
            ));
        }
        Ok(self)
    }
}

impl From<i64> for Quantity {
    fn from(value: i64) -> Self {
        Self::from_units(value)
    }
}

impl From<Decimal> for Quantity {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl FromStr for Quantity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Self)
            .map_err(|e| DomainError::invalid_field("quantity", e.to_string()))
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0.normalize(), f)
    }
}
