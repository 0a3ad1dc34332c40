/// Format a float with two decimals and thousands separators: 1,234.56
pub fn amount(val: f64) -> String {
    let rounded = format!("{:.2}", val.abs());
    let (int_part, dec_part) = rounded.split_once('.').unwrap_or((&rounded, "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    // -0.004 rounds to 0.00 and must not print as "-0.00"
    if val < 0.0 && rounded != "0.00" {
        format!("-{with_commas}.{dec_part}")
    } else {
        format!("{with_commas}.{dec_part}")
    }
}

/// Amount followed by a currency code: 1,234.56 EGP
pub fn money(val: f64, currency: &str) -> String {
    if currency.is_empty() {
        amount(val)
    } else {
        format!("{} {currency}", amount(val))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_formatting() {
        assert_eq!(amount(1234.56), "1,234.56");
        assert_eq!(amount(-500.00), "-500.00");
        assert_eq!(amount(0.0), "0.00");
        assert_eq!(amount(1000000.99), "1,000,000.99");
        assert_eq!(amount(42.10), "42.10");
        assert_eq!(amount(999.999), "1,000.00");
    }

    #[test]
    fn test_amount_negative_zero() {
        assert_eq!(amount(-0.001), "0.00");
        assert_eq!(amount(-0.0), "0.00");
    }

    #[test]
    fn test_money_with_currency() {
        assert_eq!(money(60.0, "EGP"), "60.00 EGP");
        assert_eq!(money(-1234.5, ""), "-1,234.50");
    }
}
