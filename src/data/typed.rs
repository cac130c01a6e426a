//! Copy-on-write typed value container

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::indexed_io::{IndexedIo, IndexedIoExt};

use super::{Data, DataError, Result, TypeTag};

/// Entry a typed value writes its payload under
pub const VALUE_ENTRY: &str = "value";

/// Entry holding the io version in the legacy layout
pub const IO_VERSION_ENTRY: &str = "ioVersion";

/// Newest legacy io version understood by [`TypedData::load`]
pub const LEGACY_IO_VERSION: u32 = 0;

/// Flat read-only numeric view of a value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BaseView<'a> {
    /// Byte elements
    U8(&'a [u8]),
    /// Signed integer elements
    I32(&'a [i32]),
    /// Unsigned integer elements
    U32(&'a [u32]),
    /// Single precision elements
    F32(&'a [f32]),
    /// Double precision elements
    F64(&'a [f64]),
}

impl BaseView<'_> {
    /// Number of base elements
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    /// Whether the view holds no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Flat mutable numeric view of a value
#[derive(Debug, PartialEq)]
pub enum BaseViewMut<'a> {
    /// Byte elements
    U8(&'a mut [u8]),
    /// Signed integer elements
    I32(&'a mut [i32]),
    /// Unsigned integer elements
    U32(&'a mut [u32]),
    /// Single precision elements
    F32(&'a mut [f32]),
    /// Double precision elements
    F64(&'a mut [f64]),
}

impl BaseViewMut<'_> {
    /// Number of base elements
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    /// Whether the view holds no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A concrete type that can live inside a [`TypedData`].
pub trait ValueType: Clone + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Registry tag of `TypedData<Self>`
    const TYPE_TAG: TypeTag;

    /// Write the value into the current directory
    fn save_value(&self, io: &mut dyn IndexedIo) -> Result<()>;

    /// Read a value from the current directory
    fn load_value(io: &mut dyn IndexedIo) -> Result<Self>;

    /// Flat numeric view, `None` for types without one
    fn base(&self) -> Option<BaseView<'_>> {
        None
    }

    /// Mutable flat numeric view, `None` for types without one
    fn base_mut(&mut self) -> Option<BaseViewMut<'_>> {
        None
    }

    /// Heap bytes owned by the value beyond `size_of::<Self>()`
    fn heap_bytes(&self) -> usize {
        0
    }

    /// Wrap into the tagged value enum
    fn into_data(data: TypedData<Self>) -> Data;

    /// Borrow from the tagged value enum when the variant matches
    fn from_data(data: &Data) -> Option<&TypedData<Self>>;

    /// Take out of the tagged value enum, handing it back on a mismatch
    fn take_data(data: Data) -> std::result::Result<TypedData<Self>, Data>;
}

/// Uniform wrapper around one value with shared, copy-on-write storage.
///
/// Cloning (or [`TypedData::copy`]) shares the storage; the first
/// [`TypedData::writable`] call on a shared container duplicates it, so
/// writes are never visible through other holders.
#[derive(Clone, Default)]
pub struct TypedData<T: ValueType> {
    data: Arc<T>,
}

impl<T: ValueType> TypedData<T> {
    /// Container holding `T::default()`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Container holding `value`
    #[must_use]
    pub fn from_value(value: T) -> Self {
        Self {
            data: Arc::new(value),
        }
    }

    /// Registry name of this typed value
    #[must_use]
    pub fn type_name() -> &'static str {
        T::TYPE_TAG.name()
    }

    /// Immutable access, never copies
    #[must_use]
    pub fn readable(&self) -> &T {
        &self.data
    }

    /// Mutable access, duplicating the storage first if it is shared
    pub fn writable(&mut self) -> &mut T {
        Arc::make_mut(&mut self.data)
    }

    /// Unwrap the value, cloning it only if the storage is shared
    #[must_use]
    pub fn into_value(self) -> T {
        Arc::try_unwrap(self.data).unwrap_or_else(|shared| (*shared).clone())
    }

    /// Replace the value without duplicating storage that is about to be
    /// overwritten
    pub fn set(&mut self, value: T) {
        match Arc::get_mut(&mut self.data) {
            Some(slot) => *slot = value,
            None => self.data = Arc::new(value),
        }
    }

    /// New container sharing this one's storage until either is written
    #[must_use]
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Whether another container currently shares the storage
    #[must_use]
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.data) > 1
    }

    /// Whether both containers point at the same storage
    #[must_use]
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Identity comparison first, deep comparison otherwise
    #[must_use]
    pub fn is_equal_to(&self, other: &Self) -> bool {
        // same storage is trivially equal, and cheap
        Arc::ptr_eq(&self.data, &other.data) || *self.data == *other.data
    }

    /// Write the value under [`VALUE_ENTRY`] in the current directory
    pub fn save(&self, io: &mut dyn IndexedIo) -> Result<()> {
        self.data.save_value(io)
    }

    /// Load from the current directory.
    ///
    /// Tries the current layout first and silently falls back to the legacy
    /// layout (`<TypeName>/ioVersion`, `<TypeName>/value`). Only the legacy
    /// error is reported when both fail.
    pub fn load(&mut self, io: &mut dyn IndexedIo) -> Result<()> {
        let value = match T::load_value(io) {
            Ok(value) => value,
            Err(_) => Self::load_legacy(io)?,
        };
        self.set(value);
        Ok(())
    }

    fn load_legacy(io: &mut dyn IndexedIo) -> Result<T> {
        let type_name = Self::type_name();
        io.with_directory(type_name, |io| {
            let version: u32 = io.read(IO_VERSION_ENTRY)?;
            if version > LEGACY_IO_VERSION {
                return Err(DataError::UnsupportedIoVersion {
                    type_name,
                    found: version,
                    max: LEGACY_IO_VERSION,
                });
            }
            T::load_value(io)
        })
    }

    /// Add this value's footprint, counting shared storage once per
    /// accumulator
    pub fn memory_usage(&self, accumulator: &mut MemoryAccumulator) {
        let bytes = std::mem::size_of::<T>() + self.data.heap_bytes();
        accumulator.accumulate(Arc::as_ptr(&self.data).cast::<()>(), bytes);
    }

    /// Whether the value exposes a flat numeric view
    #[must_use]
    pub fn has_base(&self) -> bool {
        self.data.base().is_some()
    }

    /// Flat numeric view of the value
    pub fn base_readable(&self) -> Result<BaseView<'_>> {
        self.data.base().ok_or(DataError::NoBaseType {
            type_name: Self::type_name(),
        })
    }

    /// Mutable flat numeric view; duplicates shared storage like
    /// [`TypedData::writable`]
    pub fn base_writable(&mut self) -> Result<BaseViewMut<'_>> {
        if !self.has_base() {
            return Err(DataError::NoBaseType {
                type_name: Self::type_name(),
            });
        }
        self.writable().base_mut().ok_or(DataError::NoBaseType {
            type_name: Self::type_name(),
        })
    }

    /// Number of base elements in the flat numeric view
    pub fn base_size(&self) -> Result<usize> {
        self.base_readable().map(|view| view.len())
    }
}

impl<T: ValueType> PartialEq for TypedData<T> {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal_to(other)
    }
}

impl<T: ValueType> fmt::Debug for TypedData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(Self::type_name()).field(&*self.data).finish()
    }
}

impl<T: ValueType> From<T> for TypedData<T> {
    fn from(value: T) -> Self {
        Self::from_value(value)
    }
}

/// Running total of memory used by a set of values.
///
/// Storage reached through several holders is counted once.
#[derive(Debug, Default)]
pub struct MemoryAccumulator {
    seen: HashSet<usize>,
    total: usize,
}

impl MemoryAccumulator {
    /// Empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count `bytes` for the storage at `ptr` unless it was already counted
    pub fn accumulate(&mut self, ptr: *const (), bytes: usize) {
        if self.seen.insert(ptr as usize) {
            self.total += bytes;
        }
    }

    /// Total bytes accumulated
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }
}
