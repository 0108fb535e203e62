use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

const FALLBACK_SEPARATOR: char = ',';

/// Renders amounts as whole currency units with grouped thousands, e.g. `$36,563`.
///
/// This is the single place where amounts are rounded (half-up to the unit).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CurrencyFormatter {
    symbol: String,
    separator: char,
}

impl Default for CurrencyFormatter {
    fn default() -> Self {
        Self::new("$", FALLBACK_SEPARATOR)
    }
}

impl CurrencyFormatter {
    pub fn new(symbol: impl Into<String>, separator: char) -> Self {
        Self { symbol: symbol.into(), separator }
    }

    /// Unknown locale tags fall back to `,` grouping rather than failing.
    pub fn for_locale(locale: &str, symbol: impl Into<String>) -> Self {
        let separator = match locale.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "en" | "en-us" | "en-gb" | "es-mx" => ',',
            "es" | "es-cl" | "es-ar" | "es-es" | "es-co" | "de" | "de-de" | "pt-br" | "it" => '.',
            "fr" | "fr-fr" => ' ',
            other => {
                warn!(
                    event_name = "quotation.format.unknown_locale",
                    locale = %other,
                    "unknown currency locale, using plain `,` grouping"
                );
                FALLBACK_SEPARATOR
            }
        };
        Self::new(symbol, separator)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    pub fn format(&self, amount: Decimal) -> String {
        let rounded = round_half_up(amount);
        let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
        let digits = rounded.abs().trunc().to_string();
        let integral = digits.split('.').next().unwrap_or("0");

        format!("{sign}{}{}", self.symbol, group_thousands(integral, self.separator))
    }
}

/// `floor(amount + 0.5)`.
pub fn round_half_up(amount: Decimal) -> Decimal {
    match amount.checked_add(Decimal::new(5, 1)) {
        Some(shifted) => shifted.floor(),
        None => amount.trunc(),
    }
}

fn group_thousands(digits: &str, separator: char) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(digit);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{round_half_up, CurrencyFormatter};

    #[test]
    fn rounds_half_up_exactly_once() {
        let formatter = CurrencyFormatter::default();

        assert_eq!(formatter.format(Decimal::new(365_625, 1)), "$36,563");
        assert_eq!(formatter.format(Decimal::new(365_624_999, 4)), "$36,562");
        assert_eq!(formatter.format(Decimal::from(39_000)), "$39,000");
    }

    #[test]
    fn half_up_rounds_negative_midpoints_toward_positive() {
        assert_eq!(round_half_up(Decimal::new(-25, 1)), Decimal::from(-2));
        assert_eq!(round_half_up(Decimal::new(25, 1)), Decimal::from(3));
    }

    #[test]
    fn groups_thousands_for_large_and_small_amounts() {
        let formatter = CurrencyFormatter::default();

        assert_eq!(formatter.format(Decimal::ZERO), "$0");
        assert_eq!(formatter.format(Decimal::from(950)), "$950");
        assert_eq!(formatter.format(Decimal::from(1_000)), "$1,000");
        assert_eq!(formatter.format(Decimal::from(1_234_567)), "$1,234,567");
        assert_eq!(formatter.format(Decimal::from(-1_125)), "-$1,125");
    }

    #[test]
    fn locale_selects_separator() {
        assert_eq!(CurrencyFormatter::for_locale("es-CL", "$").format(Decimal::from(30_000)), "$30.000");
        assert_eq!(CurrencyFormatter::for_locale("en_US", "$").format(Decimal::from(30_000)), "$30,000");
        assert_eq!(CurrencyFormatter::for_locale("fr-FR", "€").format(Decimal::from(30_000)), "€30 000");
    }

    #[test]
    fn unknown_locale_falls_back_to_plain_grouping() {
        let formatter = CurrencyFormatter::for_locale("xx-unknown", "CLP ");

        assert_eq!(formatter.separator(), ',');
        assert_eq!(formatter.format(Decimal::new(98_547_396, 4)), "CLP 9,855");
    }

    #[test]
    fn extreme_amounts_do_not_panic() {
        let formatter = CurrencyFormatter::default();

        assert!(formatter.format(Decimal::MAX).starts_with("$79,228"));
        assert!(formatter.format(Decimal::MIN).starts_with("-$79,228"));
    }
}
