//! Typed payloads stored in indexed container files

/// Data held by one file entry of an indexed container.
///
/// Scalars and arrays are distinct kinds: an entry written as `F32` will not
/// read back as `F32Array`.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryData {
    /// Single byte
    U8(u8),
    /// Byte array
    U8Array(Vec<u8>),
    /// Signed 32-bit integer
    I32(i32),
    /// Signed 32-bit integer array
    I32Array(Vec<i32>),
    /// Unsigned 32-bit integer
    U32(u32),
    /// Unsigned 32-bit integer array
    U32Array(Vec<u32>),
    /// 32-bit float
    F32(f32),
    /// 32-bit float array
    F32Array(Vec<f32>),
    /// 64-bit float
    F64(f64),
    /// 64-bit float array
    F64Array(Vec<f64>),
    /// UTF-8 string
    Str(String),
    /// UTF-8 string array
    StrArray(Vec<String>),
}

impl EntryData {
    /// Wire tag used by the serialized container
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::U8(_) => 0x01,
            Self::U8Array(_) => 0x02,
            Self::I32(_) => 0x03,
            Self::I32Array(_) => 0x04,
            Self::U32(_) => 0x05,
            Self::U32Array(_) => 0x06,
            Self::F32(_) => 0x07,
            Self::F32Array(_) => 0x08,
            Self::F64(_) => 0x09,
            Self::F64Array(_) => 0x0A,
            Self::Str(_) => 0x0B,
            Self::StrArray(_) => 0x0C,
        }
    }

    /// Human readable kind name, used in error messages
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::U8(_) => "u8",
            Self::U8Array(_) => "u8[]",
            Self::I32(_) => "i32",
            Self::I32Array(_) => "i32[]",
            Self::U32(_) => "u32",
            Self::U32Array(_) => "u32[]",
            Self::F32(_) => "f32",
            Self::F32Array(_) => "f32[]",
            Self::F64(_) => "f64",
            Self::F64Array(_) => "f64[]",
            Self::Str(_) => "string",
            Self::StrArray(_) => "string[]",
        }
    }

    /// Bytes of element storage held by this entry
    #[must_use]
    pub fn payload_len(&self) -> usize {
        match self {
            Self::U8(_) => 1,
            Self::U8Array(v) => v.len(),
            Self::I32(_) | Self::U32(_) | Self::F32(_) => 4,
            Self::I32Array(v) => v.len() * 4,
            Self::U32Array(v) => v.len() * 4,
            Self::F32Array(v) => v.len() * 4,
            Self::F64(_) => 8,
            Self::F64Array(v) => v.len() * 8,
            Self::Str(s) => s.len(),
            Self::StrArray(v) => v.iter().map(String::len).sum(),
        }
    }
}

/// Conversion between Rust values and [`EntryData`].
pub trait EntryValue: Sized {
    /// Kind name reported when a stored entry has a different kind
    const KIND: &'static str;

    /// Wrap the value for storage
    fn into_entry(self) -> EntryData;

    /// Extract a value from stored data of the matching kind
    fn from_entry(entry: &EntryData) -> Option<Self>;
}

macro_rules! entry_value {
    ($ty:ty, $variant:ident, $kind:literal) => {
        impl EntryValue for $ty {
            const KIND: &'static str = $kind;

            fn into_entry(self) -> EntryData {
                EntryData::$variant(self)
            }

            fn from_entry(entry: &EntryData) -> Option<Self> {
                match entry {
                    EntryData::$variant(value) => Some(value.clone()),
                    _ => None,
                }
            }
        }
    };
}

entry_value!(u8, U8, "u8");
entry_value!(Vec<u8>, U8Array, "u8[]");
entry_value!(i32, I32, "i32");
entry_value!(Vec<i32>, I32Array, "i32[]");
entry_value!(u32, U32, "u32");
entry_value!(Vec<u32>, U32Array, "u32[]");
entry_value!(f32, F32, "f32");
entry_value!(Vec<f32>, F32Array, "f32[]");
entry_value!(f64, F64, "f64");
entry_value!(Vec<f64>, F64Array, "f64[]");
entry_value!(String, Str, "string");
entry_value!(Vec<String>, StrArray, "string[]");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_and_array_kinds_are_distinct() {
        let scalar = 1.5f32.into_entry();
        assert_eq!(f32::from_entry(&scalar), Some(1.5));
        assert_eq!(Vec::<f32>::from_entry(&scalar), None);

        let array = vec![1.5f32].into_entry();
        assert_eq!(f32::from_entry(&array), None);
        assert_ne!(scalar.tag(), array.tag());
    }

    #[test]
    fn test_payload_len() {
        assert_eq!(vec![0f64; 3].into_entry().payload_len(), 24);
        assert_eq!(
            vec!["ab".to_string(), "c".to_string()]
                .into_entry()
                .payload_len(),
            3
        );
    }
}
