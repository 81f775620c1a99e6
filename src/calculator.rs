// ⚖️ Reconciliation Calculator - Tank vs System
//
// Following the formula:
//   difference_lt    = tank_quantity_lt - system_quantity_lt
//   error_margin_pct = difference_lt / tank_quantity_lt * 100
//
// An empty tank has a margin of 0.0. That is a policy branch, not an error.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// RECONCILIATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Signed liter gap. Positive = surplus in tank, negative = surplus in system
    pub difference_lt: f64,

    /// Signed percent discrepancy relative to the tank quantity
    pub error_margin_pct: f64,
}

impl Reconciliation {
    pub fn is_surplus_in_tank(&self) -> bool {
        self.difference_lt > 0.0
    }

    pub fn is_surplus_in_system(&self) -> bool {
        self.difference_lt < 0.0
    }
}

/// Compute difference and error margin for one day's measurements.
///
/// Inputs are expected to be validated already (see [`validate_quantity`]).
/// A tiny non-zero tank against a large system reading can still overflow
/// the margin to infinity; callers that store results must check for that.
///
/// Example:
/// ```
/// use diesel_control::calculator::reconcile;
///
/// let rec = reconcile(95.0, 100.0);
/// assert_eq!(rec.difference_lt, 5.0);
/// assert_eq!(rec.error_margin_pct, 5.0);
/// ```
pub fn reconcile(system_quantity_lt: f64, tank_quantity_lt: f64) -> Reconciliation {
    let difference_lt = tank_quantity_lt - system_quantity_lt;

    let error_margin_pct = if tank_quantity_lt == 0.0 {
        0.0
    } else {
        difference_lt / tank_quantity_lt * 100.0
    };

    Reconciliation {
        difference_lt,
        error_margin_pct,
    }
}

/// Reject negative and non-finite quantities before they reach [`reconcile`].
pub fn validate_quantity(field: &str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(Error::invalid(field, format!("{} is not a finite number", value)));
    }
    if value < 0.0 {
        return Err(Error::invalid(field, format!("{} must not be negative", value)));
    }
    Ok(value)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_surplus_in_tank() {
        let rec = reconcile(95.0, 100.0);

        assert_eq!(rec.difference_lt, 5.0);
        assert_eq!(rec.error_margin_pct, 5.0);
        assert!(rec.is_surplus_in_tank());
    }

    #[test]
    fn test_surplus_in_system() {
        let rec = reconcile(110.0, 100.0);

        assert_eq!(rec.difference_lt, -10.0);
        assert_eq!(rec.error_margin_pct, -10.0);
        assert!(rec.is_surplus_in_system());
    }

    #[test]
    fn test_empty_tank_is_zero_margin_not_error() {
        let rec = reconcile(50.0, 0.0);

        assert_eq!(rec.difference_lt, -50.0);
        assert_eq!(rec.error_margin_pct, 0.0);
        assert!(rec.error_margin_pct.is_finite());
    }

    #[test]
    fn test_tiny_tank_overflows_margin() {
        let rec = reconcile(1e10, 1e-300);
        assert!(rec.difference_lt.is_finite());
        assert!(!rec.error_margin_pct.is_finite());
    }

    #[test]
    fn test_both_zero() {
        let rec = reconcile(0.0, 0.0);
        assert_eq!(rec.difference_lt, 0.0);
        assert_eq!(rec.error_margin_pct, 0.0);
    }

    #[test]
    fn test_validate_quantity() {
        assert_eq!(validate_quantity("tank_quantity_lt", 12.5).unwrap(), 12.5);
        assert_eq!(validate_quantity("tank_quantity_lt", 0.0).unwrap(), 0.0);

        let err = validate_quantity("tank_quantity_lt", -0.01).unwrap_err();
        assert!(err.is_invalid_input());
        assert!(err.to_string().contains("tank_quantity_lt"));

        assert!(validate_quantity("inflow_lt", f64::NAN).is_err());
        assert!(validate_quantity("inflow_lt", f64::INFINITY).is_err());
    }

    proptest! {
        #[test]
        fn prop_margin_formula_for_positive_tank(
            system in 0.0f64..1_000_000.0,
            tank in 0.001f64..1_000_000.0,
        ) {
            let rec = reconcile(system, tank);
            prop_assert_eq!(rec.error_margin_pct, (tank - system) / tank * 100.0);
        }

        #[test]
        fn prop_zero_tank_always_zero_margin(system in 0.0f64..1_000_000.0) {
            let rec = reconcile(system, 0.0);
            prop_assert_eq!(rec.error_margin_pct, 0.0);
            prop_assert_eq!(rec.difference_lt, -system);
        }

        #[test]
        fn prop_more_in_tank_means_positive_difference(
            system in 0.0f64..1_000_000.0,
            extra in 0.001f64..1_000.0,
        ) {
            let rec = reconcile(system, system + extra);
            prop_assert!(rec.difference_lt > 0.0);
        }
    }
}
