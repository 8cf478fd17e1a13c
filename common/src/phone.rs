//! Israeli phone number handling: strict E.164 normalization for the
//! SMS gateway, and a looser validity check for checkout input.

/// Strip whitespace and common separators, keeping digits and `+`.
fn compact(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect()
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Normalize to `+972` E.164 form, or `None` when the input cannot be
/// a deliverable Israeli number.
///
/// Accepted shapes (after separator stripping, `00` treated as `+`):
/// `+972xxxxxxxxx`, `972xxxxxxxxx`, and domestic `0xxxxxxxxx`, each
/// with exactly nine digits after the prefix.
pub fn normalize(raw: &str) -> Option<String> {
    let mut s = compact(raw);
    if let Some(rest) = s.strip_prefix("00") {
        s = format!("+{rest}");
    }
    if let Some(rest) = s.strip_prefix("+972") {
        return (rest.len() == 9 && all_digits(rest)).then(|| s.clone());
    }
    if let Some(rest) = s.strip_prefix("972") {
        return (rest.len() == 9 && all_digits(rest)).then(|| format!("+{s}"));
    }
    if let Some(rest) = s.strip_prefix('0') {
        return (rest.len() == 9 && all_digits(rest)).then(|| format!("+972{rest}"));
    }
    None
}

/// Checkout-form validity: mobile numbers (`5` + eight digits after
/// the trunk prefix) and landlines (area code 2, 3, 4, 8 or 9 plus
/// seven digits). More permissive than [`normalize`], which is the
/// gate for actually sending.
pub fn is_valid_customer_phone(raw: &str) -> bool {
    let mut s = compact(raw);
    if let Some(rest) = s.strip_prefix("00") {
        s = format!("+{rest}");
    }
    let national = if let Some(rest) = s.strip_prefix("+972") {
        rest
    } else if let Some(rest) = s.strip_prefix("972") {
        rest
    } else if let Some(rest) = s.strip_prefix('0') {
        rest
    } else {
        return false;
    };
    if !all_digits(national) {
        return false;
    }
    match national.as_bytes()[0] {
        b'5' => national.len() == 9,
        b'2'..=b'4' | b'8' | b'9' => national.len() == 8,
        _ => false,
    }
}
