//! Workshop configuration.
//!
//! One logical settings row, passed explicitly into the engines. The store
//! is responsible for enforcing single-row persistence; the domain logic
//! only ever sees this struct.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Global workshop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GarageConfig {
    /// Labor rate in currency units per hour
    pub hourly_rate: Decimal,

    /// VAT rate as a fraction (0.20 for 20%)
    pub vat_rate: Decimal,

    /// Days a quote stays acceptable after issuance
    pub quote_validity_days: u32,

    /// Minimum hours of notice to modify or cancel an appointment
    pub cancel_window_hours: u32,

    /// Quote variation fraction above which the notifier flags a revision
    pub quote_variation_threshold: Decimal,
}

impl Default for GarageConfig {
    fn default() -> Self {
        Self {
            hourly_rate: Decimal::new(6000, 2),
            vat_rate: Decimal::new(20, 2),
            quote_validity_days: 15,
            cancel_window_hours: 24,
            quote_variation_threshold: Decimal::new(10, 2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GarageConfig::default();
        assert_eq!(config.hourly_rate, Decimal::new(60, 0));
        assert_eq!(config.vat_rate, Decimal::new(2, 1));
        assert_eq!(config.quote_validity_days, 15);
        assert_eq!(config.cancel_window_hours, 24);
    }
}
