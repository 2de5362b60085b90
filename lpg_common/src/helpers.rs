use std::str::FromStr;

/// Interprets an optional environment value as a switch. Missing or unrecognised values yield `default`.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let Some(value) = value else { return default };
    if ["1", "true", "yes", "on"].iter().any(|t| value.trim().eq_ignore_ascii_case(t)) {
        true
    } else if ["0", "false", "no", "off"].iter().any(|f| value.trim().eq_ignore_ascii_case(f)) {
        false
    } else {
        default
    }
}

/// Parse a strictly positive number from a string value. Zero, negative and unparseable values yield `None`.
pub fn parse_positive<T>(value: &str) -> Option<T>
where T: FromStr + PartialOrd + Default {
    value.trim().parse::<T>().ok().filter(|v| *v > T::default())
}
