//! Nullable-list mapping and the JSON-typed column used for extension points
//! (props, links and other semi-structured bags) that are stored inline
//! rather than normalised into join tables.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{FieldPath, MappingError, Result};

/// Maps an optional list element-wise. `None` stays `None` and `Some(vec![])`
/// stays `Some(vec![])`.
pub fn map_opt<T, U>(src: &Option<Vec<T>>, f: impl FnMut(&T) -> U) -> Option<Vec<U>> {
    src.as_ref().map(|items| items.iter().map(f).collect())
}

/// Fallible variant of [`map_opt`]; the closure also receives the element
/// index so errors can name the offending item.
pub fn try_map_opt<T, U, E>(
    src: &Option<Vec<T>>,
    mut f: impl FnMut(usize, &T) -> std::result::Result<U, E>,
) -> std::result::Result<Option<Vec<U>>, E> {
    match src {
        None => Ok(None),
        Some(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(f(i, item)?);
            }
            Ok(Some(out))
        }
    }
}

pub fn try_map_vec<T, U, E>(
    src: &[T],
    mut f: impl FnMut(usize, &T) -> std::result::Result<U, E>,
) -> std::result::Result<Vec<U>, E> {
    let mut out = Vec::with_capacity(src.len());
    for (i, item) in src.iter().enumerate() {
        out.push(f(i, item)?);
    }
    Ok(out)
}

/// Decode/encode pair between an external wire value and its internal form.
///
/// Decode is fallible (identifiers and dates are checked); encode of a
/// well-formed internal value never fails.
pub trait Codec: Sized {
    type External;

    fn decode(ext: &Self::External, path: &FieldPath) -> Result<Self>;
    fn encode(&self) -> Self::External;
}

pub fn decode_list<C: Codec>(src: &Option<Vec<C::External>>, path: &FieldPath) -> Result<Option<Vec<C>>> {
    try_map_opt(src, |i, ext| C::decode(ext, &path.index(i)))
}

pub fn encode_list<C: Codec>(src: &Option<Vec<C>>) -> Option<Vec<C::External>> {
    map_opt(src, C::encode)
}

pub fn decode_vec<C: Codec>(src: &[C::External], path: &FieldPath) -> Result<Vec<C>> {
    try_map_vec(src, |i, ext| C::decode(ext, &path.index(i)))
}

pub fn encode_vec<C: Codec>(src: &[C]) -> Vec<C::External> {
    src.iter().map(C::encode).collect()
}

pub fn decode_opt<C: Codec>(src: &Option<C::External>, path: &FieldPath) -> Result<Option<C>> {
    src.as_ref().map(|ext| C::decode(ext, path)).transpose()
}

pub fn encode_opt<C: Codec>(src: &Option<C>) -> Option<C::External> {
    src.as_ref().map(C::encode)
}

/// A value stored as one serialized JSON column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonColumn<T>(pub T);

impl<T> JsonColumn<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Serialize> JsonColumn<T> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.0)
    }
}

impl<T: DeserializeOwned> JsonColumn<T> {
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s).map(JsonColumn)
    }
}

impl<C: Codec> Codec for JsonColumn<Option<Vec<C>>> {
    type External = Option<Vec<C::External>>;

    fn decode(ext: &Self::External, path: &FieldPath) -> Result<Self> {
        Ok(JsonColumn(decode_list(ext, path)?))
    }

    fn encode(&self) -> Self::External {
        encode_list(&self.0)
    }
}

impl JsonColumn<serde_json::Value> {
    pub fn decode_as<T: DeserializeOwned>(&self, kind: &'static str, id: uuid::Uuid) -> Result<T> {
        T::deserialize(&self.0).map_err(|source| MappingError::RowCodec { kind, id, source })
    }
}

#[cfg(feature = "sqlite")]
mod sqlite {
    use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
    use serde::de::DeserializeOwned;
    use serde::Serialize;

    use super::JsonColumn;

    impl<T: Serialize> ToSql for JsonColumn<T> {
        fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
            let text = self
                .to_json()
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            Ok(ToSqlOutput::from(text))
        }
    }

    impl<T: DeserializeOwned> FromSql for JsonColumn<T> {
        fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
            let text = value.as_str()?;
            JsonColumn::from_json(text).map_err(|e| FromSqlError::Other(Box::new(e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_opt_keeps_absent_and_empty_apart() {
        let absent: Option<Vec<i32>> = None;
        let empty: Option<Vec<i32>> = Some(vec![]);
        assert_eq!(map_opt(&absent, |x| x * 2), None);
        assert_eq!(map_opt(&empty, |x| x * 2), Some(vec![]));
        assert_eq!(map_opt(&Some(vec![1, 2]), |x| x * 2), Some(vec![2, 4]));
    }

    #[test]
    fn try_map_opt_stops_at_first_error() {
        let src = Some(vec![1, -1, 2]);
        let mut seen = Vec::new();
        let res: std::result::Result<Option<Vec<i32>>, usize> = try_map_opt(&src, |i, x| {
            seen.push(i);
            if *x < 0 { Err(i) } else { Ok(*x) }
        });
        assert_eq!(res, Err(1));
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn json_column_is_transparent() {
        let col = JsonColumn(Some(vec!["a".to_string()]));
        assert_eq!(col.to_json().unwrap(), r#"["a"]"#);
        let back: JsonColumn<Option<Vec<String>>> = JsonColumn::from_json("null").unwrap();
        assert_eq!(back.0, None);
    }
}
