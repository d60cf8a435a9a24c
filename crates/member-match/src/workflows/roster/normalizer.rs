pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

pub(crate) fn normalize_header(value: &str) -> String {
    value.replace(['\u{feff}', '\u{200b}'], "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ann.Lee@Example.COM \t"), "ann.lee@example.com");
    }

    #[test]
    fn email_normalization_is_idempotent() {
        for raw in ["A@x.com", "  b@X.com", "", "   ", "ÉLODIE@exemple.fr"] {
            let once = normalize_email(raw);
            assert_eq!(normalize_email(&once), once);
        }
    }

    #[test]
    fn header_strips_byte_order_mark() {
        assert_eq!(normalize_header("\u{feff}Email "), "Email");
    }
}
