//! Stable type tags and the registry of concrete typed values

use std::fmt;

use super::{
    Box2i, Color3f, CompoundMap, Data, DataError, M44f, Result, TypedData, V2f, V2i, V3f,
    ValueType,
};

/// Stable numeric tag of every concrete typed value.
///
/// Tags are part of the persistence contract and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum TypeTag {
    /// `bool`
    BoolData = 1,
    /// `i32`
    IntData = 2,
    /// `u32`
    UIntData = 3,
    /// `f32`
    FloatData = 4,
    /// `f64`
    DoubleData = 5,
    /// `String`
    StringData = 6,
    /// [`V2i`]
    V2iData = 10,
    /// [`V2f`]
    V2fData = 11,
    /// [`V3f`]
    V3fData = 12,
    /// [`Color3f`]
    Color3fData = 13,
    /// [`Box2i`]
    Box2iData = 14,
    /// [`M44f`]
    M44fData = 15,
    /// `Vec<u8>`
    CharVectorData = 20,
    /// `Vec<i32>`
    IntVectorData = 21,
    /// `Vec<f32>`
    FloatVectorData = 22,
    /// `Vec<f64>`
    DoubleVectorData = 23,
    /// `Vec<String>`
    StringVectorData = 24,
    /// [`CompoundMap`]
    CompoundData = 30,
}

impl TypeTag {
    /// Registry name, also written into persisted objects
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BoolData => "BoolData",
            Self::IntData => "IntData",
            Self::UIntData => "UIntData",
            Self::FloatData => "FloatData",
            Self::DoubleData => "DoubleData",
            Self::StringData => "StringData",
            Self::V2iData => "V2iData",
            Self::V2fData => "V2fData",
            Self::V3fData => "V3fData",
            Self::Color3fData => "Color3fData",
            Self::Box2iData => "Box2iData",
            Self::M44fData => "M44fData",
            Self::CharVectorData => "CharVectorData",
            Self::IntVectorData => "IntVectorData",
            Self::FloatVectorData => "FloatVectorData",
            Self::DoubleVectorData => "DoubleVectorData",
            Self::StringVectorData => "StringVectorData",
            Self::CompoundData => "CompoundData",
        }
    }

    /// Numeric tag
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Look up a tag by number
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        REGISTRY
            .iter()
            .find(|description| description.tag.as_u16() == value)
            .map(|description| description.tag)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Registry row: tag, name and default constructor of one typed value
#[derive(Debug, Clone, Copy)]
pub struct TypeDescription {
    /// Stable tag
    pub tag: TypeTag,
    /// Registry name
    pub name: &'static str,
    create: fn() -> Data,
}

impl TypeDescription {
    const fn of<T: ValueType>() -> Self {
        Self {
            tag: T::TYPE_TAG,
            name: T::TYPE_TAG.name(),
            create: create::<T>,
        }
    }

    /// Construct a default-valued instance
    #[must_use]
    pub fn create(&self) -> Data {
        (self.create)()
    }
}

fn create<T: ValueType>() -> Data {
    T::into_data(TypedData::<T>::default())
}

static REGISTRY: [TypeDescription; 18] = [
    TypeDescription::of::<bool>(),
    TypeDescription::of::<i32>(),
    TypeDescription::of::<u32>(),
    TypeDescription::of::<f32>(),
    TypeDescription::of::<f64>(),
    TypeDescription::of::<String>(),
    TypeDescription::of::<V2i>(),
    TypeDescription::of::<V2f>(),
    TypeDescription::of::<V3f>(),
    TypeDescription::of::<Color3f>(),
    TypeDescription::of::<Box2i>(),
    TypeDescription::of::<M44f>(),
    TypeDescription::of::<Vec<u8>>(),
    TypeDescription::of::<Vec<i32>>(),
    TypeDescription::of::<Vec<f32>>(),
    TypeDescription::of::<Vec<f64>>(),
    TypeDescription::of::<Vec<String>>(),
    TypeDescription::of::<CompoundMap>(),
];

/// Every registered typed value
#[must_use]
pub fn registered_types() -> &'static [TypeDescription] {
    &REGISTRY
}

/// Find a registry row by name
#[must_use]
pub fn lookup_name(name: &str) -> Option<&'static TypeDescription> {
    REGISTRY.iter().find(|description| description.name == name)
}

/// Find a registry row by tag
#[must_use]
pub fn lookup_tag(tag: TypeTag) -> Option<&'static TypeDescription> {
    REGISTRY.iter().find(|description| description.tag == tag)
}

/// Construct a default-valued instance by registry name
pub fn create_by_name(name: &str) -> Result<Data> {
    lookup_name(name)
        .map(TypeDescription::create)
        .ok_or_else(|| DataError::UnknownTypeName(name.to_string()))
}

/// Construct a default-valued instance by numeric tag
pub fn create_by_tag(tag: u16) -> Result<Data> {
    TypeTag::from_u16(tag)
        .and_then(lookup_tag)
        .map(TypeDescription::create)
        .ok_or(DataError::UnknownTypeTag(tag))
}
