//! Input masks for the card fields.
//!
//! Each function rebuilds the masked value from the raw characters, so
//! applying one to its own output changes nothing.

const CARD_MAX_FORMATTED_LEN: usize = 19;
const CVV_MAX_LEN: usize = 4;

fn digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// `"4111111111111111"` -> `"4111 1111 1111 1111"`.
pub fn format_card_number(value: &str) -> String {
    let digits = digits(value);
    let grouped = digits
        .as_bytes()
        .chunks(4)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" ");
    grouped.chars().take(CARD_MAX_FORMATTED_LEN).collect()
}

/// `"1225"` -> `"12/25"`. The slash appears once two digits are present.
pub fn format_expiry(value: &str) -> String {
    let digits = digits(value);
    if digits.len() < 2 {
        return digits;
    }
    let year_end = digits.len().min(4);
    format!("{}/{}", &digits[..2], &digits[2..year_end])
}

pub fn format_cvv(value: &str) -> String {
    digits(value).chars().take(CVV_MAX_LEN).collect()
}

/// Applies the mask registered for `field`, if any.
pub fn format_field(field: &str, value: &str) -> Option<String> {
    match field {
        "cardNumber" => Some(format_card_number(value)),
        "expiryDate" => Some(format_expiry(value)),
        "cvv" => Some(format_cvv(value)),
        _ => None,
    }
}
