//! Implicit resolution of plain scalars under the core schema.
//!
//! The engine never converts scalar text to native values; it only needs
//! to know which type a plain rendering *would* resolve to, so that
//! implicit-tag flags and emitter quoting decisions stay faithful. A
//! quoted `"true"` must not round-trip into a plain `true`.

/// The type a plain scalar resolves to under the core schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Null,
    Bool,
    Int,
    Float,
    Str,
}

/// Resolve the plain rendering of `text`.
pub fn resolve_plain(text: &str) -> Resolved {
    match text {
        "" | "~" | "null" | "Null" | "NULL" => return Resolved::Null,
        "true" | "True" | "TRUE" | "false" | "False" | "FALSE" => return Resolved::Bool,
        ".nan" | ".NaN" | ".NAN" => return Resolved::Float,
        _ => {}
    }
    let unsigned = text
        .strip_prefix('-')
        .or_else(|| text.strip_prefix('+'))
        .unwrap_or(text);
    if matches!(unsigned, ".inf" | ".Inf" | ".INF") {
        return Resolved::Float;
    }
    if is_integer_pattern(unsigned) {
        return Resolved::Int;
    }
    if is_float_pattern(unsigned) {
        return Resolved::Float;
    }
    Resolved::Str
}

/// Decimal (`\d+`), hex (`0x...`), or octal (`0o...`) integer pattern.
fn is_integer_pattern(s: &str) -> bool {
    if let Some(hex) = s.strip_prefix("0x") {
        return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    if let Some(oct) = s.strip_prefix("0o") {
        return !oct.is_empty() && oct.chars().all(|c| ('0'..='7').contains(&c));
    }
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Float pattern: digits with a decimal point and/or an exponent.
fn is_float_pattern(s: &str) -> bool {
    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(pos) => (&s[..pos], Some(&s[pos + 1..])),
        None => (s, None),
    };

    if let Some(exp) = exponent {
        let exp = exp
            .strip_prefix('+')
            .or_else(|| exp.strip_prefix('-'))
            .unwrap_or(exp);
        if exp.is_empty() || !exp.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
    }

    match mantissa.split_once('.') {
        Some((before, after)) => {
            let digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
            // ".", with neither side populated, is not a number.
            (!before.is_empty() || !after.is_empty()) && digits(before) && digits(after)
        }
        // No decimal point: only a float if an exponent is present.
        None => {
            exponent.is_some()
                && !mantissa.is_empty()
                && mantissa.chars().all(|c| c.is_ascii_digit())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_forms() {
        assert_eq!(resolve_plain(""), Resolved::Null);
        assert_eq!(resolve_plain("~"), Resolved::Null);
        assert_eq!(resolve_plain("null"), Resolved::Null);
        assert_eq!(resolve_plain("NULL"), Resolved::Null);
    }

    #[test]
    fn test_bool_forms() {
        assert_eq!(resolve_plain("true"), Resolved::Bool);
        assert_eq!(resolve_plain("False"), Resolved::Bool);
        assert_eq!(resolve_plain("yes"), Resolved::Str);
    }

    #[test]
    fn test_integers() {
        assert_eq!(resolve_plain("0"), Resolved::Int);
        assert_eq!(resolve_plain("-42"), Resolved::Int);
        assert_eq!(resolve_plain("+42"), Resolved::Int);
        assert_eq!(resolve_plain("0x1F"), Resolved::Int);
        assert_eq!(resolve_plain("0o755"), Resolved::Int);
        assert_eq!(resolve_plain("12345678901234567890123"), Resolved::Int);
        assert_eq!(resolve_plain("1 000"), Resolved::Str);
    }

    #[test]
    fn test_floats() {
        assert_eq!(resolve_plain("1.5"), Resolved::Float);
        assert_eq!(resolve_plain("-.5"), Resolved::Float);
        assert_eq!(resolve_plain("1."), Resolved::Float);
        assert_eq!(resolve_plain("1e10"), Resolved::Float);
        assert_eq!(resolve_plain("1.5e-3"), Resolved::Float);
        assert_eq!(resolve_plain(".inf"), Resolved::Float);
        assert_eq!(resolve_plain("-.inf"), Resolved::Float);
        assert_eq!(resolve_plain(".nan"), Resolved::Float);
        assert_eq!(resolve_plain("."), Resolved::Str);
        assert_eq!(resolve_plain("1e"), Resolved::Str);
    }

    #[test]
    fn test_strings() {
        assert_eq!(resolve_plain("hello"), Resolved::Str);
        assert_eq!(resolve_plain("0x"), Resolved::Str);
        assert_eq!(resolve_plain("1.2.3"), Resolved::Str);
        assert_eq!(resolve_plain("-"), Resolved::Str);
    }
}
