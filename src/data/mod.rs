//! Typed values with shared copy-on-write storage
//!
//! Every value is a [`TypedData<T>`] for one of a closed set of `T`s, and is
//! reachable type-erased through [`Data`]. The registry maps stable
//! [`TypeTag`]s and names to default constructors so persisted objects can be
//! rebuilt from their stored type name.

mod error;
mod registry;
mod typed;
mod types;
mod value;

pub use error::{DataError, Result};
pub use registry::{
    TypeDescription, TypeTag, create_by_name, create_by_tag, lookup_name, lookup_tag,
    registered_types,
};
pub use typed::{
    BaseView, BaseViewMut, IO_VERSION_ENTRY, LEGACY_IO_VERSION, MemoryAccumulator, TypedData,
    VALUE_ENTRY, ValueType,
};
pub use types::{Box2i, Color3f, M44f, V2f, V2i, V3f};
pub use value::{
    BoolData, Box2iData, CharVectorData, Color3fData, CompoundData, CompoundMap, DATA_DIRECTORY,
    Data, DoubleData, DoubleVectorData, FloatData, FloatVectorData, IntData, IntVectorData,
    M44fData, MEMBERS_DIRECTORY, StringData, StringVectorData, TYPE_NAME_ENTRY, UIntData,
    V2fData, V2iData, V3fData,
};
