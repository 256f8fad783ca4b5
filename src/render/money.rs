/// Money formatting and currency conversion
///
/// `format_money` never fails: known currencies get locale-correct
/// placement, anything else falls back to a plain two-decimal string.
/// The symbol table is deliberately small and explicit.

/// Static conversion table keyed by (from, to)
const STATIC_RATES: &[(&str, &str, f64)] = &[
    ("EUR", "USD", 1.07),
    ("USD", "EUR", 0.93),
    ("EUR", "GBP", 0.85),
    ("GBP", "EUR", 1.17),
];

/// Best-effort currency symbol
pub fn symbol(currency: &str) -> Option<&'static str> {
    match currency {
        "EUR" => Some("€"),
        "USD" => Some("$"),
        "GBP" => Some("£"),
        _ => None,
    }
}

/// Resolve a conversion rate. A positive caller override wins over the
/// static table; identical currencies convert at 1. `None` means the
/// conversion line is silently omitted.
pub fn conversion_rate(from: &str, to: &str, rate_override: Option<f64>) -> Option<f64> {
    if from == to {
        return Some(1.0);
    }
    if let Some(rate) = rate_override {
        if rate > 0.0 {
            return Some(rate);
        }
    }
    STATIC_RATES
        .iter()
        .find(|(f, t, _)| *f == from && *t == to)
        .map(|(_, _, rate)| *rate)
}

/// Format an amount in the given currency
pub fn format_money(amount: f64, currency: &str) -> String {
    match currency {
        // it-IT placement: thousands '.', decimals ',', symbol after
        "EUR" => format!("{} €", grouped(amount, '.', ',')),
        "USD" => prefixed(amount, "$"),
        "GBP" => prefixed(amount, "£"),
        _ => format!("{:.2}", amount),
    }
}

fn prefixed(amount: f64, sym: &str) -> String {
    if amount < 0.0 {
        format!("-{}{}", sym, grouped(amount.abs(), ',', '.'))
    } else {
        format!("{}{}", sym, grouped(amount, ',', '.'))
    }
}

fn grouped(amount: f64, thousands: char, decimal: char) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let units = cents / 100;
    let frac = cents % 100;

    let digits = units.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(thousands);
        }
        grouped.push(c);
    }

    format!(
        "{}{}{}{:02}",
        if negative { "-" } else { "" },
        grouped,
        decimal,
        frac
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_eur_italian_style() {
        assert_eq!(format_money(1234.5, "EUR"), "1.234,50 €");
        assert_eq!(format_money(0.0, "EUR"), "0,00 €");
        assert_eq!(format_money(1000000.0, "EUR"), "1.000.000,00 €");
    }

    #[test]
    fn formats_usd_and_gbp() {
        assert_eq!(format_money(1234.5, "USD"), "$1,234.50");
        assert_eq!(format_money(1234.5, "GBP"), "£1,234.50");
        assert_eq!(format_money(-12.0, "USD"), "-$12.00");
    }

    #[test]
    fn unknown_currency_falls_back_to_plain_decimals() {
        assert_eq!(format_money(1234.561, "CHF"), "1234.56");
    }

    #[test]
    fn rounding_happens_at_the_formatting_boundary() {
        assert_eq!(format_money(158.599999, "EUR"), "158,60 €");
    }

    #[test]
    fn override_wins_when_positive() {
        assert_eq!(conversion_rate("EUR", "USD", Some(1.25)), Some(1.25));
        // Non-positive overrides are ignored
        assert_eq!(conversion_rate("EUR", "USD", Some(0.0)), Some(1.07));
        assert_eq!(conversion_rate("EUR", "USD", Some(-2.0)), Some(1.07));
    }

    #[test]
    fn static_table_and_identity() {
        assert_eq!(conversion_rate("EUR", "USD", None), Some(1.07));
        assert_eq!(conversion_rate("GBP", "EUR", None), Some(1.17));
        assert_eq!(conversion_rate("EUR", "EUR", None), Some(1.0));
        assert_eq!(conversion_rate("EUR", "JPY", None), None);
    }
}
