//! Display formatting for finance widgets.

/// Format `amount` in German notation with the currency symbol as suffix,
/// e.g. `1234.5, "EUR"` -> `"1.234,50 €"`. Unknown currency codes are printed
/// as-is in place of the symbol.
pub fn format_currency(amount: f64, currency: &str) -> String {
    let cents = to_cents(amount);
    let negative = cents < 0;
    let cents = cents.unsigned_abs();
    let whole = group_thousands(cents / 100);
    let frac = cents % 100;
    let sign = if negative { "-" } else { "" };
    format!("{sign}{whole},{frac:02} {}", currency_symbol(currency))
}

/// Round to whole cents, half away from zero, on the shortest decimal
/// representation of `amount` rather than its binary value (`1.005` -> 101).
fn to_cents(amount: f64) -> i64 {
    let fallback = (amount * 100.0).round() as i64;
    if !amount.is_finite() {
        return fallback;
    }
    // f64 Display never uses exponent notation
    let repr = amount.abs().to_string();
    let (int_part, frac_part) = repr.split_once('.').unwrap_or((repr.as_str(), ""));
    let Ok(whole) = int_part.parse::<i64>() else { return fallback };
    let mut digits = frac_part.bytes().map(|b| i64::from(b - b'0'));
    let tenths = digits.next().unwrap_or(0);
    let hundredths = digits.next().unwrap_or(0);
    let round_up = digits.next().map_or(false, |d| d >= 5);
    let cents = whole
        .checked_mul(100)
        .and_then(|c| c.checked_add(tenths * 10 + hundredths + i64::from(round_up)));
    match cents {
        Some(c) if amount < 0.0 => -c,
        Some(c) => c,
        None => fallback,
    }
}

pub fn currency_symbol(code: &str) -> &str {
    match code.trim().to_ascii_uppercase().as_str() {
        "EUR" => "€",
        "USD" => "$",
        "GBP" => "£",
        "CHF" => "CHF",
        _ => code.trim(),
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}
