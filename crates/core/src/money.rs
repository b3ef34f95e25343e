//! # Money Module
//!
//! Currency and Money on top of `rust_decimal` so wallet arithmetic never
//! touches floating point.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// A currency with a fixed number of minor-unit decimals.
///
/// # Examples
/// ```
/// use palmpay_core::Currency;
///
/// let inr = Currency::inr();
/// assert_eq!(inr.decimals, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    /// ISO 4217 code
    pub code: String,
    /// Minor-unit digits (INR = 2)
    pub decimals: u8,
    /// Display symbol
    pub symbol: String,
}

impl Currency {
    pub fn new(code: &str, decimals: u8, symbol: &str) -> Self {
        Self {
            code: code.to_uppercase(),
            decimals,
            symbol: symbol.to_string(),
        }
    }

    /// Indian Rupee, the wallet currency of the demo app
    pub fn inr() -> Self {
        Self::new("INR", 2, "₹")
    }

    /// US Dollar
    pub fn usd() -> Self {
        Self::new("USD", 2, "$")
    }

    /// Checks that `amount` is a valid payment amount in this currency:
    /// strictly positive and with no more fractional digits than the
    /// currency allows.
    pub fn validate_payment(&self, amount: Decimal) -> CoreResult<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(CoreError::InvalidAmount(format!(
                "payment amount must be positive: {}",
                amount
            )));
        }
        if amount.normalize().scale() > u32::from(self.decimals) {
            return Err(CoreError::InvalidAmount(format!(
                "{} allows at most {} decimals: {}",
                self.code, self.decimals, amount
            )));
        }
        Ok(amount)
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::inr()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

/// An amount tagged with its currency.
///
/// # Examples
/// ```
/// use palmpay_core::{Currency, Money};
/// use rust_decimal_macros::dec;
///
/// let paid = Money::new(dec!(150), Currency::inr());
/// assert_eq!(paid.to_string(), "₹150.00");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Amount rounded to the currency's minor units
    pub fn rounded(&self) -> Decimal {
        self.amount.round_dp(u32::from(self.currency.decimals))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut shown = self.rounded();
        shown.rescale(u32::from(self.currency.decimals));
        if shown.is_sign_negative() && !shown.is_zero() {
            write!(f, "-{}{}", self.currency.symbol, shown.abs())
        } else {
            write!(f, "{}{}", self.currency.symbol, shown)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_payment() {
        let inr = Currency::inr();
        assert_eq!(inr.validate_payment(dec!(150.00)).unwrap(), dec!(150.00));
        assert!(inr.validate_payment(dec!(0)).is_err());
        assert!(inr.validate_payment(dec!(-5)).is_err());
        assert!(inr.validate_payment(dec!(1.005)).is_err());
        // Trailing zeros are not extra precision
        assert!(inr.validate_payment(dec!(1.5000)).is_ok());
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::new(dec!(1250), Currency::inr()).to_string(), "₹1250.00");
        assert_eq!(Money::new(dec!(-30.5), Currency::usd()).to_string(), "-$30.50");
        assert_eq!(Money::zero(Currency::inr()).to_string(), "₹0.00");
    }

    #[test]
    fn test_money_checks() {
        let m = Money::new(dec!(0.01), Currency::inr());
        assert!(m.is_positive());
        assert!(!m.is_zero());
    }
}
