/// Dollar amount rounded to the cent, grouped by thousands: `-$1,234.56`.
/// Amounts that round to zero carry no sign.
pub fn money(val: f64) -> String {
    let cents = (val.abs() * 100.0).round() as u64;
    let dollars = (cents / 100).to_string();
    let grouped: String = dollars
        .char_indices()
        .flat_map(|(i, d)| {
            let sep = (i > 0 && (dollars.len() - i) % 3 == 0).then_some(',');
            sep.into_iter().chain(std::iter::once(d))
        })
        .collect();
    let sign = if val < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}

/// Row label plus its amount, for summary tables.
pub fn line(label: &str, val: f64) -> [String; 2] {
    [label.to_string(), money(val)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(1234.56), "$1,234.56");
        assert_eq!(money(-500.00), "-$500.00");
        assert_eq!(money(0.0), "$0.00");
        assert_eq!(money(1000000.99), "$1,000,000.99");
        assert_eq!(money(121963.0 * 12.0), "$1,463,556.00");
        assert_eq!(money(999.999), "$1,000.00");
    }

    #[test]
    fn test_money_rounding_to_zero_drops_sign() {
        assert_eq!(money(-0.001), "$0.00");
        assert_eq!(money(-0.005), "-$0.01");
    }

    #[test]
    fn test_line() {
        assert_eq!(line("rental income", 1500.0), ["rental income".to_string(), "$1,500.00".to_string()]);
    }
}
