//! Token-based path algebra
//!
//! Dotted field paths are parsed once into tokens; a segment made solely of
//! ASCII digits is a positional index, every other segment is a key. All
//! resolution and data access walk tokens, never re-split strings.

use std::collections::BTreeMap;

use crate::value::Value;

/// One segment of a dotted field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    /// Named segment, descends through objects
    Key(String),
    /// Positional segment, descends through arrays
    Index(usize),
}

/// Classification of a path relative to a compiled schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    /// A declared field, exact or positionally resolved
    Real,
    /// A computed, non-stored field
    Virtual,
    /// A known object-container prefix
    Nested,
    /// Anything else
    AdhocOrUndefined,
}

/// Parses a dotted path into tokens.
pub fn parse(path: &str) -> Vec<PathToken> {
    path.split('.')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                match segment.parse::<usize>() {
                    Ok(index) => PathToken::Index(index),
                    Err(_) => PathToken::Key(segment.to_string()),
                }
            } else {
                PathToken::Key(segment.to_string())
            }
        })
        .collect()
}

/// Returns true when any token is positional.
pub fn has_index(tokens: &[PathToken]) -> bool {
    tokens.iter().any(|t| matches!(t, PathToken::Index(_)))
}

/// Reads the value at a token path; any missing intermediate yields `None`.
pub fn get<'a>(data: &'a Value, tokens: &[PathToken]) -> Option<&'a Value> {
    let mut current = data;
    for token in tokens {
        current = match (token, current) {
            (PathToken::Key(key), Value::Object(map)) => map.get(key)?,
            (PathToken::Index(index), Value::Array(items)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Writes a value at a token path, materializing intermediates.
///
/// A key token materializes an object, an index token materializes an array
/// padded with nulls up to the index; mismatched intermediates are replaced.
pub fn set(data: &mut Value, tokens: &[PathToken], value: Value) {
    match tokens.split_first() {
        None => *data = value,
        Some((PathToken::Key(key), rest)) => {
            if !matches!(data, Value::Object(_)) {
                *data = Value::Object(BTreeMap::new());
            }
            if let Value::Object(map) = data {
                let slot = map.entry(key.clone()).or_insert(Value::Null);
                set(slot, rest, value);
            }
        }
        Some((PathToken::Index(index), rest)) => {
            if !matches!(data, Value::Array(_)) {
                *data = Value::Array(Vec::new());
            }
            if let Value::Array(items) = data {
                if items.len() <= *index {
                    items.resize(index + 1, Value::Null);
                }
                set(&mut items[*index], rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tokens() {
        assert_eq!(
            parse("a.0.b"),
            vec![
                PathToken::Key("a".into()),
                PathToken::Index(0),
                PathToken::Key("b".into()),
            ]
        );
        assert_eq!(parse("name"), vec![PathToken::Key("name".into())]);
    }

    #[test]
    fn test_mixed_digit_segment_is_a_key() {
        assert_eq!(parse("a.1b"), vec![
            PathToken::Key("a".into()),
            PathToken::Key("1b".into()),
        ]);
    }

    #[test]
    fn test_get_walks_objects_and_arrays() {
        let mut data = Value::Object(Default::default());
        set(&mut data, &parse("user.tags.1"), Value::String("x".into()));
        assert_eq!(
            get(&data, &parse("user.tags.1")),
            Some(&Value::String("x".into()))
        );
        assert_eq!(get(&data, &parse("user.tags.0")), Some(&Value::Null));
        assert_eq!(get(&data, &parse("user.missing.deep")), None);
    }

    #[test]
    fn test_set_materializes_intermediates() {
        let mut data = Value::Object(Default::default());
        set(&mut data, &parse("a.b.c"), Value::Number(1.0));
        assert_eq!(get(&data, &parse("a.b.c")), Some(&Value::Number(1.0)));

        set(&mut data, &parse("a.b.c"), Value::Number(2.0));
        assert_eq!(get(&data, &parse("a.b.c")), Some(&Value::Number(2.0)));
    }

    #[test]
    fn test_index_set_pads_with_nulls() {
        let mut data = Value::Object(Default::default());
        set(&mut data, &parse("tags.2"), Value::String("c".into()));
        let tags = get(&data, &parse("tags")).and_then(Value::as_array).unwrap();
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[0], Value::Null);
        assert_eq!(tags[2], Value::String("c".into()));
    }
}
