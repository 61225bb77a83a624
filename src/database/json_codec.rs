// JSON helpers for JSONB payloads
//
// PostgreSQL rejects the bare Infinity/NaN tokens inside json columns, so
// non-finite floats round-trip as their string spellings.

use serde_json::{Number, Value};

/// Encode an `f64` for a JSONB payload. Finite values become plain JSON
/// numbers; non-finite values become the strings `"Infinity"`,
/// `"-Infinity"` and `"NaN"`.
pub fn float_to_json(value: f64) -> Value {
    match Number::from_f64(value) {
        Some(number) => Value::Number(number),
        None if value.is_nan() => Value::String("NaN".to_string()),
        None if value.is_sign_positive() => Value::String("Infinity".to_string()),
        None => Value::String("-Infinity".to_string()),
    }
}

/// Inverse of [`float_to_json`]: accepts JSON numbers and the string
/// spellings of the non-finite values.
pub fn float_from_json(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => match text.as_str() {
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            "NaN" => Some(f64::NAN),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finite_floats_stay_numbers() {
        assert_eq!(float_to_json(1.5), json!(1.5));
        assert_eq!(float_from_json(&json!(1.5)), Some(1.5));
        assert_eq!(float_from_json(&json!(3)), Some(3.0));
    }

    #[test]
    fn non_finite_floats_round_trip_as_strings() {
        assert_eq!(float_to_json(f64::INFINITY), json!("Infinity"));
        assert_eq!(float_to_json(f64::NEG_INFINITY), json!("-Infinity"));
        assert_eq!(float_to_json(f64::NAN), json!("NaN"));

        assert_eq!(float_from_json(&json!("Infinity")), Some(f64::INFINITY));
        assert_eq!(float_from_json(&json!("-Infinity")), Some(f64::NEG_INFINITY));
        assert!(float_from_json(&json!("NaN")).unwrap().is_nan());
    }

    #[test]
    fn other_values_do_not_decode() {
        assert_eq!(float_from_json(&json!("not a number")), None);
        assert_eq!(float_from_json(&json!(null)), None);
        assert_eq!(float_from_json(&json!([1.0])), None);
    }
}
