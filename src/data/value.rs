//! Closed set of typed values and their object-level persistence
//!
//! A persisted object occupies one directory:
//!
//! ```text
//! <name>/
//!     typeName : string      registry name, selects the constructor
//!     data/                  raw container the typed value writes into
//!         value : ...
//! ```

use std::collections::BTreeMap;
use std::slice;

use crate::indexed_io::{EntryKind, IndexedIo, IndexedIoExt};

use super::typed::VALUE_ENTRY;
use super::{
    BaseView, BaseViewMut, Box2i, Color3f, DataError, M44f, MemoryAccumulator, Result, TypeTag,
    TypedData, V2f, V2i, V3f, ValueType, registry,
};

/// Entry holding the registry name of a persisted object
pub const TYPE_NAME_ENTRY: &str = "typeName";

/// Directory holding the payload of a persisted object
pub const DATA_DIRECTORY: &str = "data";

/// Directory holding the members of a persisted compound
pub const MEMBERS_DIRECTORY: &str = "members";

/// Named members of a [`CompoundData`], ordered by name
pub type CompoundMap = BTreeMap<String, Data>;

/// `bool` typed value
pub type BoolData = TypedData<bool>;
/// `i32` typed value
pub type IntData = TypedData<i32>;
/// `u32` typed value
pub type UIntData = TypedData<u32>;
/// `f32` typed value
pub type FloatData = TypedData<f32>;
/// `f64` typed value
pub type DoubleData = TypedData<f64>;
/// `String` typed value
pub type StringData = TypedData<String>;
/// [`V2i`] typed value
pub type V2iData = TypedData<V2i>;
/// [`V2f`] typed value
pub type V2fData = TypedData<V2f>;
/// [`V3f`] typed value
pub type V3fData = TypedData<V3f>;
/// [`Color3f`] typed value
pub type Color3fData = TypedData<Color3f>;
/// [`Box2i`] typed value
pub type Box2iData = TypedData<Box2i>;
/// [`M44f`] typed value
pub type M44fData = TypedData<M44f>;
/// `Vec<u8>` typed value
pub type CharVectorData = TypedData<Vec<u8>>;
/// `Vec<i32>` typed value
pub type IntVectorData = TypedData<Vec<i32>>;
/// `Vec<f32>` typed value
pub type FloatVectorData = TypedData<Vec<f32>>;
/// `Vec<f64>` typed value
pub type DoubleVectorData = TypedData<Vec<f64>>;
/// `Vec<String>` typed value
pub type StringVectorData = TypedData<Vec<String>>;
/// [`CompoundMap`] typed value
pub type CompoundData = TypedData<CompoundMap>;

/// Any supported typed value.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum Data {
    Bool(BoolData),
    Int(IntData),
    UInt(UIntData),
    Float(FloatData),
    Double(DoubleData),
    String(StringData),
    V2i(V2iData),
    V2f(V2fData),
    V3f(V3fData),
    Color3f(Color3fData),
    Box2i(Box2iData),
    M44f(M44fData),
    CharVector(CharVectorData),
    IntVector(IntVectorData),
    FloatVector(FloatVectorData),
    DoubleVector(DoubleVectorData),
    StringVector(StringVectorData),
    Compound(CompoundData),
}

macro_rules! with_typed {
    ($data:expr, $typed:ident => $body:expr) => {
        match $data {
            Data::Bool($typed) => $body,
            Data::Int($typed) => $body,
            Data::UInt($typed) => $body,
            Data::Float($typed) => $body,
            Data::Double($typed) => $body,
            Data::String($typed) => $body,
            Data::V2i($typed) => $body,
            Data::V2f($typed) => $body,
            Data::V3f($typed) => $body,
            Data::Color3f($typed) => $body,
            Data::Box2i($typed) => $body,
            Data::M44f($typed) => $body,
            Data::CharVector($typed) => $body,
            Data::IntVector($typed) => $body,
            Data::FloatVector($typed) => $body,
            Data::DoubleVector($typed) => $body,
            Data::StringVector($typed) => $body,
            Data::Compound($typed) => $body,
        }
    };
}

impl Data {
    /// Stable tag of the wrapped type
    #[must_use]
    pub fn type_tag(&self) -> TypeTag {
        with_typed!(self, typed => tag_of(typed))
    }

    /// Registry name of the wrapped type
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_tag().name()
    }

    /// Persist as an object directory called `name` in the current directory
    pub fn save(&self, io: &mut dyn IndexedIo, name: &str) -> Result<()> {
        if io.exists(name) {
            io.remove(name)?;
        }
        io.with_new_directory(name, |io| {
            io.write(TYPE_NAME_ENTRY, self.type_name().to_string())?;
            io.with_new_directory(DATA_DIRECTORY, |io| self.save_value(io))
        })
    }

    /// Reconstruct the object stored in directory `name`
    pub fn load(io: &mut dyn IndexedIo, name: &str) -> Result<Self> {
        io.with_directory(name, |io| {
            let type_name: String = io.read(TYPE_NAME_ENTRY)?;
            let mut data = registry::create_by_name(&type_name)?;
            io.with_directory(DATA_DIRECTORY, |io| data.load_value(io))?;
            Ok(data)
        })
    }

    /// Write the payload into the current directory
    pub fn save_value(&self, io: &mut dyn IndexedIo) -> Result<()> {
        with_typed!(self, typed => typed.save(io))
    }

    /// Replace the payload with one read from the current directory
    pub fn load_value(&mut self, io: &mut dyn IndexedIo) -> Result<()> {
        with_typed!(self, typed => typed.load(io))
    }

    /// New value sharing storage with this one
    #[must_use]
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Identity comparison first, deep comparison otherwise
    #[must_use]
    pub fn is_equal_to(&self, other: &Self) -> bool {
        self == other
    }

    /// Add the footprint of the value, and of compound members
    pub fn memory_usage(&self, accumulator: &mut MemoryAccumulator) {
        with_typed!(self, typed => typed.memory_usage(accumulator));
        if let Self::Compound(compound) = self {
            for member in compound.readable().values() {
                member.memory_usage(accumulator);
            }
        }
    }

    /// Flat numeric view, when the wrapped type has one
    pub fn base_readable(&self) -> Result<BaseView<'_>> {
        with_typed!(self, typed => typed.base_readable())
    }

    /// Number of base elements
    pub fn base_size(&self) -> Result<usize> {
        with_typed!(self, typed => typed.base_size())
    }

    /// Borrow the typed container when it wraps `T`
    #[must_use]
    pub fn typed<T: ValueType>(&self) -> Option<&TypedData<T>> {
        T::from_data(self)
    }

    /// Borrow the wrapped value, failing when it is not a `T`
    pub fn value<T: ValueType>(&self) -> Result<&T> {
        self.typed::<T>()
            .map(TypedData::readable)
            .ok_or(DataError::TypeMismatch {
                expected: T::TYPE_TAG.name(),
                found: self.type_name(),
            })
    }

    /// Take the wrapped value out, failing when it is not a `T`
    pub fn into_value<T: ValueType>(self) -> Result<T> {
        let found = self.type_name();
        T::take_data(self)
            .map(TypedData::into_value)
            .map_err(|_| DataError::TypeMismatch {
                expected: T::TYPE_TAG.name(),
                found,
            })
    }

    /// Wrapped string, if this is a [`StringData`]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.readable()),
            _ => None,
        }
    }
}

fn tag_of<T: ValueType>(_: &TypedData<T>) -> TypeTag {
    T::TYPE_TAG
}

impl<T: ValueType> From<TypedData<T>> for Data {
    fn from(typed: TypedData<T>) -> Self {
        T::into_data(typed)
    }
}

macro_rules! data_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Data {
                fn from(value: $ty) -> Self {
                    <$ty as ValueType>::into_data(TypedData::from_value(value))
                }
            }
        )*
    };
}

data_from_value!(
    bool,
    i32,
    u32,
    f32,
    f64,
    String,
    V2i,
    V2f,
    V3f,
    Color3f,
    Box2i,
    M44f,
    Vec<u8>,
    Vec<i32>,
    Vec<f32>,
    Vec<f64>,
    Vec<String>,
    CompoundMap,
);

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

macro_rules! variant_conversions {
    ($ty:ty, $variant:ident) => {
        fn into_data(data: TypedData<Self>) -> Data {
            Data::$variant(data)
        }

        fn from_data(data: &Data) -> Option<&TypedData<Self>> {
            match data {
                Data::$variant(typed) => Some(typed),
                _ => None,
            }
        }

        fn take_data(data: Data) -> std::result::Result<TypedData<Self>, Data> {
            match data {
                Data::$variant(typed) => Ok(typed),
                other => Err(other),
            }
        }
    };
}

/// Scalars stored as a single entry, viewed as a one-element slice
macro_rules! numeric_scalar {
    ($ty:ty, $tag:ident, $variant:ident, $view:ident) => {
        impl ValueType for $ty {
            const TYPE_TAG: TypeTag = TypeTag::$tag;

            fn save_value(&self, io: &mut dyn IndexedIo) -> Result<()> {
                Ok(io.write(VALUE_ENTRY, *self)?)
            }

            fn load_value(io: &mut dyn IndexedIo) -> Result<Self> {
                Ok(io.read(VALUE_ENTRY)?)
            }

            fn base(&self) -> Option<BaseView<'_>> {
                Some(BaseView::$view(slice::from_ref(self)))
            }

            fn base_mut(&mut self) -> Option<BaseViewMut<'_>> {
                Some(BaseViewMut::$view(slice::from_mut(self)))
            }

            variant_conversions!($ty, $variant);
        }
    };
}

/// Fixed-size aggregates stored through their base view
macro_rules! numeric_aggregate {
    ($ty:ident, $tag:ident, $variant:ident, $view:ident, $element:ty) => {
        impl ValueType for $ty {
            const TYPE_TAG: TypeTag = TypeTag::$tag;

            fn save_value(&self, io: &mut dyn IndexedIo) -> Result<()> {
                Ok(io.write(VALUE_ENTRY, self.0.to_vec())?)
            }

            fn load_value(io: &mut dyn IndexedIo) -> Result<Self> {
                let elements: Vec<$element> = io.read(VALUE_ENTRY)?;
                let found = elements.len();
                elements
                    .try_into()
                    .map($ty)
                    .map_err(|_| DataError::ElementCount {
                        type_name: Self::TYPE_TAG.name(),
                        expected: std::mem::size_of::<$ty>() / std::mem::size_of::<$element>(),
                        found,
                    })
            }

            fn base(&self) -> Option<BaseView<'_>> {
                Some(BaseView::$view(&self.0))
            }

            fn base_mut(&mut self) -> Option<BaseViewMut<'_>> {
                Some(BaseViewMut::$view(&mut self.0))
            }

            variant_conversions!($ty, $variant);
        }
    };
}

/// Numeric vectors, viewed as themselves
macro_rules! numeric_vector {
    ($element:ty, $tag:ident, $variant:ident, $view:ident) => {
        impl ValueType for Vec<$element> {
            const TYPE_TAG: TypeTag = TypeTag::$tag;

            fn save_value(&self, io: &mut dyn IndexedIo) -> Result<()> {
                Ok(io.write(VALUE_ENTRY, self.clone())?)
            }

            fn load_value(io: &mut dyn IndexedIo) -> Result<Self> {
                Ok(io.read(VALUE_ENTRY)?)
            }

            fn base(&self) -> Option<BaseView<'_>> {
                Some(BaseView::$view(self))
            }

            fn base_mut(&mut self) -> Option<BaseViewMut<'_>> {
                Some(BaseViewMut::$view(self))
            }

            fn heap_bytes(&self) -> usize {
                self.capacity() * std::mem::size_of::<$element>()
            }

            variant_conversions!(Vec<$element>, $variant);
        }
    };
}

numeric_scalar!(i32, IntData, Int, I32);
numeric_scalar!(u32, UIntData, UInt, U32);
numeric_scalar!(f32, FloatData, Float, F32);
numeric_scalar!(f64, DoubleData, Double, F64);

numeric_aggregate!(V2i, V2iData, V2i, I32, i32);
numeric_aggregate!(V2f, V2fData, V2f, F32, f32);
numeric_aggregate!(V3f, V3fData, V3f, F32, f32);
numeric_aggregate!(Color3f, Color3fData, Color3f, F32, f32);
numeric_aggregate!(Box2i, Box2iData, Box2i, I32, i32);
numeric_aggregate!(M44f, M44fData, M44f, F32, f32);

numeric_vector!(u8, CharVectorData, CharVector, U8);
numeric_vector!(i32, IntVectorData, IntVector, I32);
numeric_vector!(f32, FloatVectorData, FloatVector, F32);
numeric_vector!(f64, DoubleVectorData, DoubleVector, F64);

impl ValueType for bool {
    const TYPE_TAG: TypeTag = TypeTag::BoolData;

    fn save_value(&self, io: &mut dyn IndexedIo) -> Result<()> {
        Ok(io.write(VALUE_ENTRY, u8::from(*self))?)
    }

    fn load_value(io: &mut dyn IndexedIo) -> Result<Self> {
        Ok(io.read::<u8>(VALUE_ENTRY)? != 0)
    }

    variant_conversions!(bool, Bool);
}

impl ValueType for String {
    const TYPE_TAG: TypeTag = TypeTag::StringData;

    fn save_value(&self, io: &mut dyn IndexedIo) -> Result<()> {
        Ok(io.write(VALUE_ENTRY, self.clone())?)
    }

    fn load_value(io: &mut dyn IndexedIo) -> Result<Self> {
        Ok(io.read(VALUE_ENTRY)?)
    }

    fn heap_bytes(&self) -> usize {
        self.capacity()
    }

    variant_conversions!(String, String);
}

impl ValueType for Vec<String> {
    const TYPE_TAG: TypeTag = TypeTag::StringVectorData;

    fn save_value(&self, io: &mut dyn IndexedIo) -> Result<()> {
        Ok(io.write(VALUE_ENTRY, self.clone())?)
    }

    fn load_value(io: &mut dyn IndexedIo) -> Result<Self> {
        Ok(io.read(VALUE_ENTRY)?)
    }

    fn heap_bytes(&self) -> usize {
        self.capacity() * std::mem::size_of::<String>()
            + self.iter().map(String::capacity).sum::<usize>()
    }

    variant_conversions!(Vec<String>, StringVector);
}

impl ValueType for CompoundMap {
    const TYPE_TAG: TypeTag = TypeTag::CompoundData;

    fn save_value(&self, io: &mut dyn IndexedIo) -> Result<()> {
        io.with_new_directory(MEMBERS_DIRECTORY, |io| {
            self.iter()
                .try_for_each(|(name, member)| member.save(io, name))
        })
    }

    fn load_value(io: &mut dyn IndexedIo) -> Result<Self> {
        io.with_directory(MEMBERS_DIRECTORY, |io| {
            let mut members = CompoundMap::new();
            for entry in io.entries()? {
                if entry.kind == EntryKind::Directory {
                    let member = Data::load(io, &entry.name)?;
                    members.insert(entry.name, member);
                }
            }
            Ok(members)
        })
    }

    // member footprints are added by Data::memory_usage
    fn heap_bytes(&self) -> usize {
        self.keys().map(String::capacity).sum()
    }

    variant_conversions!(CompoundMap, Compound);
}
