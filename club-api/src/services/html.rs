//! HTML helpers shared by email and PDF templates

/// Escape text for HTML element content and quoted attribute values
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Format integer cents as `12.50 EUR`
pub fn format_money(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}{}.{:02} {}", sign, abs / 100, abs % 100, currency.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape("<script>alert('x') & \"y\"</script>"),
            "&lt;script&gt;alert(&#39;x&#39;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
        assert_eq!(escape("Žalgiris"), "Žalgiris");
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(1250, "eur"), "12.50 EUR");
        assert_eq!(format_money(5, "eur"), "0.05 EUR");
        assert_eq!(format_money(0, "usd"), "0.00 USD");
        assert_eq!(format_money(-300, "eur"), "-3.00 EUR");
    }
}
