use regex::Regex;

/// Canonicalize a free-form phone string to digits only.
///
/// Strips every non-digit character and rewrites the domestic `8` prefix to
/// the international `7` when the number is exactly 11 digits long (Russian
/// mobile convention). Returns an empty string when the input carries no
/// digits at all — absence is never an error here.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return String::new();
    }
    if digits.len() == 11 && digits.starts_with('8') {
        return format!("7{}", &digits[1..]);
    }
    digits
}

/// Pull the first phone-looking substring out of free text.
///
/// Matches things like "Дмитрий, тел +7 961 111-22-33": an optional `+`,
/// a digit, then at least nine characters of digits/dashes/spaces/parens,
/// ending on a digit. The match is normalized before returning; no match
/// yields an empty string.
pub fn extract_phone(text: &str) -> String {
    let re = Regex::new(r"\+?\d[\d\-\s()]{9,}\d").expect("phone pattern is valid");
    match re.find(text) {
        Some(m) => normalize_phone(m.as_str()),
        None => String::new(),
    }
}
