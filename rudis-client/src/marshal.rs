//! Structural marshaling between records and flat field lists.
//!
//! Hash-shaped server data travels as a flat alternating name/value token
//! sequence. [`Record`] maps that sequence onto either a string-keyed map
//! or a fixed-shape struct whose fields were registered once with
//! [`impl_record!`](crate::impl_record). Scalars cross the wire per
//! [`Scalar`]: booleans as `true`/`false`, integers in decimal, floats in
//! their shortest round-tripping decimal form, byte strings verbatim.

use std::collections::HashMap;
use thiserror::Error;

pub use bytes::Bytes;

/// Marshaling failures, attributed to the offending field.
#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("field {field}: cannot decode value as {target}")]
    Coerce {
        field: String,
        target: &'static str,
    },

    #[error("field {field}: value is absent")]
    AbsentValue { field: String },

    #[error("field list has an odd number of tokens")]
    OddPairs,

    #[error("field name is not valid UTF-8")]
    FieldName,
}

/// A scalar that can cross the wire as one field value.
pub trait Scalar: Sized {
    /// Name used in coercion diagnostics.
    const TYPE_NAME: &'static str;

    /// Encodes the value as wire bytes.
    fn encode(&self) -> Bytes;

    /// Decodes wire bytes; `None` when the bytes do not parse as `Self`.
    fn decode(raw: &[u8]) -> Option<Self>;
}

impl Scalar for bool {
    const TYPE_NAME: &'static str = "bool";

    fn encode(&self) -> Bytes {
        if *self {
            Bytes::from_static(b"true")
        } else {
            Bytes::from_static(b"false")
        }
    }

    fn decode(raw: &[u8]) -> Option<Self> {
        match raw {
            b"true" => Some(true),
            b"false" => Some(false),
            _ => None,
        }
    }
}

macro_rules! numeric_scalar {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Scalar for $ty {
                const TYPE_NAME: &'static str = stringify!($ty);

                fn encode(&self) -> Bytes {
                    Bytes::from(self.to_string())
                }

                fn decode(raw: &[u8]) -> Option<Self> {
                    std::str::from_utf8(raw).ok()?.parse().ok()
                }
            }
        )+
    };
}

numeric_scalar!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl Scalar for String {
    const TYPE_NAME: &'static str = "string";

    fn encode(&self) -> Bytes {
        Bytes::from(self.clone())
    }

    fn decode(raw: &[u8]) -> Option<Self> {
        std::str::from_utf8(raw).map(str::to_owned).ok()
    }
}

impl Scalar for Bytes {
    const TYPE_NAME: &'static str = "bytes";

    fn encode(&self) -> Bytes {
        self.clone()
    }

    fn decode(raw: &[u8]) -> Option<Self> {
        Some(Bytes::copy_from_slice(raw))
    }
}

impl Scalar for Vec<u8> {
    const TYPE_NAME: &'static str = "bytes";

    fn encode(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }

    fn decode(raw: &[u8]) -> Option<Self> {
        Some(raw.to_vec())
    }
}

/// A record that flattens to and from alternating name/value field pairs.
pub trait Record: Sized {
    /// Field names and encoded values, one pair per field, in declaration
    /// (or insertion) order.
    fn flatten(&self) -> Vec<(String, Bytes)>;

    /// Rebuilds a record from decoded field pairs.
    ///
    /// Pairs naming a field the record does not declare are skipped; record
    /// fields missing from `pairs` keep their default value.
    fn unflatten(pairs: &[(Bytes, Bytes)]) -> Result<Self, MarshalError>;
}

impl<V: Scalar> Record for HashMap<String, V> {
    fn flatten(&self) -> Vec<(String, Bytes)> {
        self.iter().map(|(k, v)| (k.clone(), v.encode())).collect()
    }

    fn unflatten(pairs: &[(Bytes, Bytes)]) -> Result<Self, MarshalError> {
        let mut map = HashMap::with_capacity(pairs.len());
        for (name, raw) in pairs {
            let name = std::str::from_utf8(name).map_err(|_| MarshalError::FieldName)?;
            map.insert(name.to_owned(), decode_field(name, raw)?);
        }
        Ok(map)
    }
}

/// Decodes one field value, attributing a failure to `field`.
pub fn decode_field<T: Scalar>(field: &str, raw: &[u8]) -> Result<T, MarshalError> {
    T::decode(raw).ok_or_else(|| MarshalError::Coerce {
        field: field.to_owned(),
        target: T::TYPE_NAME,
    })
}

/// Re-shapes a flat element sequence into (name, value) pairs.
///
/// An absent member is an error here: field lists carry every token
/// explicitly, and collapsing an absent value into empty bytes would forge
/// a field the server never sent.
pub fn pairs(elements: Vec<Option<Bytes>>) -> Result<Vec<(Bytes, Bytes)>, MarshalError> {
    if elements.len() % 2 != 0 {
        return Err(MarshalError::OddPairs);
    }

    let mut out = Vec::with_capacity(elements.len() / 2);
    let mut iter = elements.into_iter();
    while let (Some(name), Some(value)) = (iter.next(), iter.next()) {
        let name = name.ok_or(MarshalError::FieldName)?;
        let value = value.ok_or_else(|| MarshalError::AbsentValue {
            field: String::from_utf8_lossy(&name).into_owned(),
        })?;
        out.push((name, value));
    }
    Ok(out)
}

/// Registers a fixed-shape struct as a [`Record`].
///
/// Each field is listed once; `flatten` emits the pairs in the listed
/// order, and `unflatten` starts from `Default::default()`, so the struct
/// must implement [`Default`]. Wire fields that are not listed are
/// dropped; a value that does not parse as its field's type is a per-field
/// [`MarshalError::Coerce`].
///
/// ```
/// use rudis_client::impl_record;
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Account {
///     name: String,
///     balance: i64,
///     active: bool,
/// }
///
/// impl_record!(Account { name, balance, active });
/// ```
#[macro_export]
macro_rules! impl_record {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::marshal::Record for $ty {
            fn flatten(&self) -> ::std::vec::Vec<(::std::string::String, $crate::marshal::Bytes)> {
                ::std::vec![
                    $((
                        ::std::string::String::from(stringify!($field)),
                        $crate::marshal::Scalar::encode(&self.$field),
                    )),+
                ]
            }

            fn unflatten(
                pairs: &[($crate::marshal::Bytes, $crate::marshal::Bytes)],
            ) -> ::std::result::Result<Self, $crate::marshal::MarshalError> {
                let mut record = <$ty as ::std::default::Default>::default();
                for (name, raw) in pairs {
                    $(
                        if name.as_ref() == stringify!($field).as_bytes() {
                            record.$field = $crate::marshal::decode_field(
                                stringify!($field),
                                raw.as_ref(),
                            )?;
                            continue;
                        }
                    )+
                    // Wire field unknown to this record: dropped.
                }
                ::std::result::Result::Ok(record)
            }
        }
    };
}
