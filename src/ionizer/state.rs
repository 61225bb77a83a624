// Serialized attribute model shared between the host service and Ionizer
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::database::json_codec;
use crate::ionizer::StateError;

/// One parameter of a serialized method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodParam {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

/// Serialized attribute tree of a service object.
///
/// `Group` is a nested service component. `Slider` is a bounded numeric
/// control whose inner value may be a plain float or a [`AttrValue::Quantity`];
/// Ionizer is not told about its internals (see the flattening and update
/// translation rules).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Quantity {
        magnitude: f64,
        unit: String,
    },
    Enum {
        value: String,
        variants: Vec<String>,
    },
    Slider {
        value: Box<AttrValue>,
        min: f64,
        max: f64,
        step_size: f64,
    },
    Method {
        parameters: Vec<MethodParam>,
    },
    List(Vec<AttrValue>),
    Dict(BTreeMap<String, AttrValue>),
    Group(BTreeMap<String, AttrValue>),
}

/// One segment of a full access path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPart {
    Attr(String),
    Index(usize),
    Key(String),
}

/// Split a full access path like `device.channels[0].gains["rf"]` into its
/// segments. Subscripts take a decimal index or a quoted key.
pub fn parse_access_path(path: &str) -> Result<Vec<PathPart>, StateError> {
    let invalid = |reason: &str| StateError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let mut parts = Vec::new();
    let mut chars = path.chars().peekable();
    let mut expect_attr = true;

    while let Some(&c) = chars.peek() {
        match c {
            '.' => {
                chars.next();
                if expect_attr {
                    return Err(invalid("empty path segment"));
                }
                expect_attr = true;
            }
            '[' => {
                if expect_attr {
                    return Err(invalid("subscript without attribute"));
                }
                chars.next();
                match chars.peek() {
                    Some(&quote @ ('"' | '\'')) => {
                        chars.next();
                        let mut key = String::new();
                        loop {
                            match chars.next() {
                                Some(c) if c == quote => break,
                                Some(c) => key.push(c),
                                None => return Err(invalid("unterminated key subscript")),
                            }
                        }
                        parts.push(PathPart::Key(key));
                    }
                    Some(d) if d.is_ascii_digit() => {
                        let mut digits = String::new();
                        while let Some(&d) = chars.peek() {
                            if d.is_ascii_digit() {
                                digits.push(d);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        let index = digits
                            .parse()
                            .map_err(|_| invalid("index subscript out of range"))?;
                        parts.push(PathPart::Index(index));
                    }
                    _ => return Err(invalid("unsupported subscript")),
                }
                if chars.next() != Some(']') {
                    return Err(invalid("unterminated subscript"));
                }
            }
            _ => {
                if !expect_attr {
                    return Err(invalid("missing '.' between segments"));
                }
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '.' || c == '[' {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                parts.push(PathPart::Attr(name));
                expect_attr = false;
            }
        }
    }

    if expect_attr {
        // empty input or trailing '.'
        return Err(invalid("empty path segment"));
    }
    Ok(parts)
}

/// Resolve a node in an attribute tree. A slider exposes its inner value
/// under the implicit `value` attribute.
pub fn lookup<'a>(root: &'a AttrValue, parts: &[PathPart]) -> Option<&'a AttrValue> {
    let mut node = root;
    for part in parts {
        node = match (part, node) {
            (PathPart::Attr(name), AttrValue::Group(map)) => map.get(name)?,
            (PathPart::Attr(name), AttrValue::Slider { value, .. }) if name == "value" => value,
            (PathPart::Index(index), AttrValue::List(items)) => items.get(*index)?,
            (PathPart::Key(key), AttrValue::Dict(map)) => map.get(key)?,
            _ => return None,
        };
    }
    Some(node)
}

/// Flatten container attributes for Ionizer, which cannot display nested
/// lists and dicts: their elements are promoted to individually
/// addressable entries (`key[0]`, `key["name"]`), recursively. Groups keep
/// their structure with flattened contents.
pub fn flatten_value(map: &BTreeMap<String, AttrValue>) -> BTreeMap<String, AttrValue> {
    let mut flattened = BTreeMap::new();
    for (key, value) in map {
        match value {
            AttrValue::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    flattened.insert(format!("{key}[{index}]"), flatten_node(item));
                }
            }
            AttrValue::Dict(entries) => {
                for (entry_key, entry) in entries {
                    flattened.insert(format!("{key}[\"{entry_key}\"]"), flatten_node(entry));
                }
            }
            other => {
                flattened.insert(key.clone(), flatten_node(other));
            }
        }
    }
    flattened
}

fn flatten_node(value: &AttrValue) -> AttrValue {
    match value {
        AttrValue::Group(map) => AttrValue::Group(flatten_value(map)),
        AttrValue::List(items) => AttrValue::List(items.iter().map(flatten_node).collect()),
        AttrValue::Dict(map) => AttrValue::Dict(
            map.iter()
                .map(|(key, value)| (key.clone(), flatten_node(value)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Map an attribute to the plain JSON value Ionizer expects: quantities
/// collapse to their magnitude, enums to their variant name, sliders to
/// their inner value. Methods are handled by the caller (they render as a
/// signature string, which needs the attribute name).
pub fn to_wire(value: &AttrValue) -> Value {
    match value {
        AttrValue::Null | AttrValue::Method { .. } => Value::Null,
        AttrValue::Bool(b) => json!(b),
        AttrValue::Int(i) => json!(i),
        AttrValue::Float(f) => json_codec::float_to_json(*f),
        AttrValue::Str(s) => json!(s),
        AttrValue::Quantity { magnitude, .. } => json_codec::float_to_json(*magnitude),
        AttrValue::Enum { value, .. } => json!(value),
        AttrValue::Slider { value, .. } => to_wire(value),
        AttrValue::List(items) => Value::Array(items.iter().map(to_wire).collect()),
        AttrValue::Dict(map) | AttrValue::Group(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), to_wire(value)))
                .collect(),
        ),
    }
}

/// Render the call signature Ionizer displays for a method attribute.
pub fn method_signature(name: &str, parameters: &[MethodParam]) -> String {
    let args: Vec<&str> = parameters.iter().map(|p| p.name.as_str()).collect();
    format!("{name}({})", args.join(", "))
}

/// Convert an incoming wire value into an [`AttrValue`] matching the type
/// of the current node. Enums accept a variant name or its definition-order
/// index (Ionizer sets enums by position); quantities accept a bare
/// magnitude and keep their unit.
pub fn coerce(path: &str, current: &AttrValue, incoming: &Value) -> Result<AttrValue, StateError> {
    let mismatch = |expected: &'static str| StateError::TypeMismatch {
        path: path.to_string(),
        expected,
    };

    match current {
        AttrValue::Bool(_) => incoming
            .as_bool()
            .map(AttrValue::Bool)
            .ok_or_else(|| mismatch("bool")),
        AttrValue::Int(_) => incoming
            .as_i64()
            .map(AttrValue::Int)
            .ok_or_else(|| mismatch("int")),
        AttrValue::Float(_) => json_codec::float_from_json(incoming)
            .map(AttrValue::Float)
            .ok_or_else(|| mismatch("float")),
        AttrValue::Str(_) => incoming
            .as_str()
            .map(|s| AttrValue::Str(s.to_string()))
            .ok_or_else(|| mismatch("string")),
        AttrValue::Quantity { unit, .. } => json_codec::float_from_json(incoming)
            .map(|magnitude| AttrValue::Quantity {
                magnitude,
                unit: unit.clone(),
            })
            .ok_or_else(|| mismatch("number")),
        AttrValue::Enum { variants, .. } => {
            if let Some(index) = incoming.as_u64() {
                let index = index as usize;
                let value = variants
                    .get(index)
                    .cloned()
                    .ok_or(StateError::EnumOutOfRange {
                        path: path.to_string(),
                        index,
                    })?;
                Ok(AttrValue::Enum {
                    value,
                    variants: variants.clone(),
                })
            } else if let Some(name) = incoming.as_str() {
                if variants.iter().any(|v| v == name) {
                    Ok(AttrValue::Enum {
                        value: name.to_string(),
                        variants: variants.clone(),
                    })
                } else {
                    Err(mismatch("known enum variant"))
                }
            } else {
                Err(mismatch("enum index or variant name"))
            }
        }
        AttrValue::Null => Ok(from_wire(incoming)),
        AttrValue::Slider { .. }
        | AttrValue::Method { .. }
        | AttrValue::List(_)
        | AttrValue::Dict(_)
        | AttrValue::Group(_) => Err(mismatch("scalar attribute")),
    }
}

fn from_wire(incoming: &Value) -> AttrValue {
    match incoming {
        Value::Null => AttrValue::Null,
        Value::Bool(b) => AttrValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AttrValue::Int(i),
            None => AttrValue::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => AttrValue::Str(s.clone()),
        Value::Array(items) => AttrValue::List(items.iter().map(from_wire).collect()),
        Value::Object(map) => AttrValue::Dict(
            map.iter()
                .map(|(key, value)| (key.clone(), from_wire(value)))
                .collect(),
        ),
    }
}

/// Resolve a `set_param` request against the current tree: returns the
/// effective target path and the coerced value. Setting a slider extends
/// the path onto its inner `value` (keeping the unit when the inner value
/// is a quantity).
pub fn resolve_set_target(
    root: &AttrValue,
    path: &str,
    incoming: &Value,
) -> Result<(String, AttrValue), StateError> {
    let parts = parse_access_path(path)?;
    let current = lookup(root, &parts).ok_or_else(|| StateError::NotFound(path.to_string()))?;

    match current {
        AttrValue::Slider { value, .. } => {
            let inner_path = format!("{path}.value");
            let coerced = coerce(&inner_path, value, incoming)?;
            Ok((inner_path, coerced))
        }
        other => Ok((path.to_string(), coerce(path, other, incoming)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(entries: Vec<(&str, AttrValue)>) -> AttrValue {
        AttrValue::Group(
            entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        )
    }

    fn sample_tree() -> AttrValue {
        group(vec![
            (
                "laser",
                group(vec![
                    (
                        "wavelength",
                        AttrValue::Quantity {
                            magnitude: 729.0,
                            unit: "nm".to_string(),
                        },
                    ),
                    (
                        "channels",
                        AttrValue::List(vec![AttrValue::Float(0.1), AttrValue::Float(0.2)]),
                    ),
                ]),
            ),
            (
                "mode",
                AttrValue::Enum {
                    value: "idle".to_string(),
                    variants: vec!["idle".to_string(), "cooling".to_string()],
                },
            ),
            (
                "power",
                AttrValue::Slider {
                    value: Box::new(AttrValue::Float(0.5)),
                    min: 0.0,
                    max: 1.0,
                    step_size: 0.01,
                },
            ),
            (
                "gains",
                AttrValue::Dict(
                    [("rf".to_string(), AttrValue::Int(3))].into_iter().collect(),
                ),
            ),
        ])
    }

    #[test]
    fn parses_plain_attribute_paths() {
        let parts = parse_access_path("laser.wavelength").unwrap();
        assert_eq!(
            parts,
            vec![
                PathPart::Attr("laser".to_string()),
                PathPart::Attr("wavelength".to_string()),
            ]
        );
    }

    #[test]
    fn parses_subscripts() {
        let parts = parse_access_path("laser.channels[1]").unwrap();
        assert_eq!(parts[2], PathPart::Index(1));

        let parts = parse_access_path("gains[\"rf\"]").unwrap();
        assert_eq!(parts[1], PathPart::Key("rf".to_string()));

        let parts = parse_access_path("gains['rf.low']").unwrap();
        assert_eq!(parts[1], PathPart::Key("rf.low".to_string()));
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(parse_access_path("").is_err());
        assert!(parse_access_path("a..b").is_err());
        assert!(parse_access_path("a.").is_err());
        assert!(parse_access_path("a[").is_err());
        assert!(parse_access_path("a[1").is_err());
        assert!(parse_access_path("a[\"x]").is_err());
        assert!(parse_access_path("[0]").is_err());
        assert!(parse_access_path("a[x]").is_err());
        assert!(parse_access_path("a[0]b").is_err());
    }

    #[test]
    fn lookup_walks_groups_lists_and_dicts() {
        let tree = sample_tree();
        let parts = parse_access_path("laser.channels[1]").unwrap();
        assert_eq!(lookup(&tree, &parts), Some(&AttrValue::Float(0.2)));

        let parts = parse_access_path("gains[\"rf\"]").unwrap();
        assert_eq!(lookup(&tree, &parts), Some(&AttrValue::Int(3)));

        let parts = parse_access_path("laser.missing").unwrap();
        assert_eq!(lookup(&tree, &parts), None);
    }

    #[test]
    fn lookup_exposes_slider_value() {
        let tree = sample_tree();
        let parts = parse_access_path("power.value").unwrap();
        assert_eq!(lookup(&tree, &parts), Some(&AttrValue::Float(0.5)));
    }

    #[test]
    fn flatten_promotes_lists_and_dicts() {
        let AttrValue::Group(map) = sample_tree() else {
            unreachable!()
        };
        let flattened = flatten_value(&map);
        assert!(flattened.contains_key("gains[\"rf\"]"));
        assert!(!flattened.contains_key("gains"));

        let AttrValue::Group(laser) = &flattened["laser"] else {
            panic!("laser should stay a group")
        };
        assert!(laser.contains_key("channels[0]"));
        assert!(laser.contains_key("channels[1]"));
        assert!(!laser.contains_key("channels"));
    }

    #[test]
    fn wire_values_collapse_quantities_and_enums() {
        let quantity = AttrValue::Quantity {
            magnitude: 729.0,
            unit: "nm".to_string(),
        };
        assert_eq!(to_wire(&quantity), serde_json::json!(729.0));

        let mode = AttrValue::Enum {
            value: "idle".to_string(),
            variants: vec!["idle".to_string()],
        };
        assert_eq!(to_wire(&mode), serde_json::json!("idle"));

        let slider = AttrValue::Slider {
            value: Box::new(quantity),
            min: 0.0,
            max: 1000.0,
            step_size: 1.0,
        };
        assert_eq!(to_wire(&slider), serde_json::json!(729.0));
    }

    #[test]
    fn method_signature_lists_parameter_names() {
        let parameters = vec![
            MethodParam {
                name: "duration".to_string(),
                type_name: Some("float".to_string()),
            },
            MethodParam {
                name: "repeats".to_string(),
                type_name: Some("int".to_string()),
            },
        ];
        assert_eq!(method_signature("scan", &parameters), "scan(duration, repeats)");
        assert_eq!(method_signature("stop", &[]), "stop()");
    }

    #[test]
    fn coerce_picks_enum_variant_by_index() {
        let tree = sample_tree();
        let parts = parse_access_path("mode").unwrap();
        let current = lookup(&tree, &parts).unwrap();

        let coerced = coerce("mode", current, &serde_json::json!(1)).unwrap();
        assert!(matches!(coerced, AttrValue::Enum { ref value, .. } if value == "cooling"));

        let err = coerce("mode", current, &serde_json::json!(7)).unwrap_err();
        assert!(matches!(err, StateError::EnumOutOfRange { index: 7, .. }));
    }

    #[test]
    fn coerce_accepts_enum_variant_names() {
        let tree = sample_tree();
        let parts = parse_access_path("mode").unwrap();
        let current = lookup(&tree, &parts).unwrap();

        let coerced = coerce("mode", current, &serde_json::json!("cooling")).unwrap();
        assert!(matches!(coerced, AttrValue::Enum { ref value, .. } if value == "cooling"));
        assert!(coerce("mode", current, &serde_json::json!("warp")).is_err());
    }

    #[test]
    fn coerce_keeps_quantity_unit() {
        let current = AttrValue::Quantity {
            magnitude: 729.0,
            unit: "nm".to_string(),
        };
        let coerced = coerce("laser.wavelength", &current, &serde_json::json!(854)).unwrap();
        assert_eq!(
            coerced,
            AttrValue::Quantity {
                magnitude: 854.0,
                unit: "nm".to_string(),
            }
        );
    }

    #[test]
    fn coerce_rejects_wrong_scalar_types() {
        let err = coerce("x", &AttrValue::Int(1), &serde_json::json!("three")).unwrap_err();
        assert!(matches!(err, StateError::TypeMismatch { .. }));
    }

    #[test]
    fn set_target_extends_slider_paths() {
        let tree = sample_tree();
        let (path, value) =
            resolve_set_target(&tree, "power", &serde_json::json!(0.8)).unwrap();
        assert_eq!(path, "power.value");
        assert_eq!(value, AttrValue::Float(0.8));
    }

    #[test]
    fn set_target_keeps_unit_of_quantified_slider() {
        let tree = group(vec![(
            "detuning",
            AttrValue::Slider {
                value: Box::new(AttrValue::Quantity {
                    magnitude: 1.0,
                    unit: "MHz".to_string(),
                }),
                min: -10.0,
                max: 10.0,
                step_size: 0.1,
            },
        )]);
        let (path, value) =
            resolve_set_target(&tree, "detuning", &serde_json::json!(2.5)).unwrap();
        assert_eq!(path, "detuning.value");
        assert_eq!(
            value,
            AttrValue::Quantity {
                magnitude: 2.5,
                unit: "MHz".to_string(),
            }
        );
    }

    #[test]
    fn set_target_reports_unknown_paths() {
        let tree = sample_tree();
        let err = resolve_set_target(&tree, "missing", &serde_json::json!(1)).unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
    }
}
