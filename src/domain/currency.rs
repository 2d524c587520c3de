//! Currency code canonicalization and minor-unit rescaling.
//!
//! GBX (pence) quotations are rescaled to GBP. The same rescaling must be applied
//! to cash amounts and to prices embedded in trade descriptions, otherwise cost
//! basis and dividend totals drift apart.

/// Minor-unit codes and the (major code, divisor) they map to.
const MINOR_UNITS: &[(&str, &str, f64)] = &[("GBX", "GBP", 100.0)];

pub const DEFAULT_CURRENCY: &str = "EUR";

/// Uppercase and map minor-unit codes to their major currency.
pub fn normalize_currency_code(code: &str) -> String {
    let upper = code.trim().to_uppercase();
    match MINOR_UNITS.iter().find(|(minor, _, _)| *minor == upper) {
        Some((_, major, _)) => (*major).to_string(),
        None => upper,
    }
}

/// Rescale an amount quoted in a minor unit and return the major currency code.
///
/// Codes other than minor units pass through unchanged apart from case.
pub fn normalize_currency_amount(code: &str, amount: f64) -> (String, f64) {
    let upper = code.trim().to_uppercase();
    match MINOR_UNITS.iter().find(|(minor, _, _)| *minor == upper) {
        Some((_, major, divisor)) => ((*major).to_string(), amount / divisor),
        None => (upper, amount),
    }
}

/// True when `code` looks like an ISO 4217 code (three ASCII letters).
pub fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_uppercased() {
        assert_eq!(normalize_currency_code("usd"), "USD");
        assert_eq!(normalize_currency_code(" eur "), "EUR");
    }

    #[test]
    fn gbx_maps_to_gbp() {
        assert_eq!(normalize_currency_code("GBX"), "GBP");
        assert_eq!(normalize_currency_code("gbx"), "GBP");
    }

    #[test]
    fn gbx_amount_is_rescaled() {
        let (code, amount) = normalize_currency_amount("GBX", 12345.0);
        assert_eq!(code, "GBP");
        assert!((amount - 123.45).abs() < 1e-9);
    }

    #[test]
    fn other_amounts_pass_through() {
        let (code, amount) = normalize_currency_amount("usd", 12345.0);
        assert_eq!(code, "USD");
        assert_eq!(amount, 12345.0);
    }

    #[test]
    fn empty_code_stays_empty() {
        let (code, amount) = normalize_currency_amount("", 5.0);
        assert_eq!(code, "");
        assert_eq!(amount, 5.0);
    }

    #[test]
    fn currency_code_shape() {
        assert!(is_currency_code("EUR"));
        assert!(!is_currency_code("EURO"));
        assert!(!is_currency_code("E1R"));
    }
}
