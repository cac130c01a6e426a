//! In-memory indexed container and its serialized form
//!
//! # Wire Format
//!
//! ```text
//! [MAGIC "IEIO" (4)] [VERSION u16 LE] [ROOT NODE] [XXH3-64 CHECKSUM u64 LE]
//!
//! node      := [KIND u8] [NAME] (directory | file)
//! directory := [CHILD COUNT u32 LE] node*
//! file      := [DATA TAG u8] payload
//! NAME      := [LEN u32 LE] [UTF-8 bytes]
//! ```
//!
//! Scalars are stored little-endian, arrays as `[COUNT u32 LE]` followed by
//! the elements, strings as length-prefixed UTF-8. The checksum covers every
//! byte before it.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use xxhash_rust::xxh3::xxh3_64;

use super::{
    EntryData, EntryInfo, EntryKind, IndexedIo, IndexedIoError, PARENT_DIRECTORY, ROOT_DIRECTORY,
    Result, join_path,
};

/// Container magic: "IEIO" in ASCII
pub const CONTAINER_MAGIC: [u8; 4] = *b"IEIO";

/// Newest container format version written by this build
pub const CONTAINER_VERSION: u16 = 1;

/// Directory nesting accepted by the decoder
pub const MAX_DIRECTORY_DEPTH: usize = 64;

const NODE_DIRECTORY: u8 = 0x00;
const NODE_FILE: u8 = 0x01;
const CHECKSUM_SIZE: usize = 8;
const PREFIX_SIZE: usize = CONTAINER_MAGIC.len() + 2;

#[derive(Debug, Clone, Default, PartialEq)]
struct Directory {
    entries: BTreeMap<String, Node>,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Directory(Directory),
    File(EntryData),
}

/// Indexed container kept entirely in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryIndexedIo {
    root: Directory,
    cwd: Vec<String>,
}

impl MemoryIndexedIo {
    /// Create an empty container positioned at the root
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a serialized container, positioned at the root
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PREFIX_SIZE + CHECKSUM_SIZE {
            return Err(IndexedIoError::Truncated {
                needed: PREFIX_SIZE + CHECKSUM_SIZE,
                got: bytes.len(),
            });
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != CONTAINER_MAGIC {
            return Err(IndexedIoError::InvalidMagic { found: magic });
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version > CONTAINER_VERSION {
            return Err(IndexedIoError::UnsupportedVersion {
                found: version,
                max: CONTAINER_VERSION,
            });
        }

        let checksum_offset = bytes.len() - CHECKSUM_SIZE;
        let mut stored = &bytes[checksum_offset..];
        let stored_checksum = stored.get_u64_le();
        let calculated_checksum = xxh3_64(&bytes[..checksum_offset]);
        if stored_checksum != calculated_checksum {
            return Err(IndexedIoError::ChecksumMismatch {
                expected: calculated_checksum,
                found: stored_checksum,
            });
        }

        let mut body = &bytes[PREFIX_SIZE..checksum_offset];
        let kind = get_u8(&mut body)?;
        if kind != NODE_DIRECTORY {
            return Err(IndexedIoError::InvalidNodeKind(kind));
        }
        let _root_name = get_string(&mut body)?;
        let root = decode_directory(&mut body, 0)?;

        if body.has_remaining() {
            return Err(IndexedIoError::TrailingBytes {
                count: body.remaining(),
            });
        }

        Ok(Self {
            root,
            cwd: Vec::new(),
        })
    }

    /// Serialize the whole tree, independent of the current directory
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(PREFIX_SIZE + self.encoded_hint() + CHECKSUM_SIZE);
        buf.put_slice(&CONTAINER_MAGIC);
        buf.put_u16_le(CONTAINER_VERSION);
        buf.put_u8(NODE_DIRECTORY);
        put_string(&mut buf, "");
        encode_directory(&mut buf, &self.root);

        let checksum = xxh3_64(&buf);
        buf.put_u64_le(checksum);
        buf.freeze()
    }

    fn encoded_hint(&self) -> usize {
        fn walk(directory: &Directory) -> usize {
            directory
                .entries
                .iter()
                .map(|(name, node)| {
                    16 + name.len()
                        + match node {
                            Node::Directory(child) => walk(child),
                            Node::File(data) => data.payload_len(),
                        }
                })
                .sum()
        }
        walk(&self.root)
    }

    fn current(&self) -> Result<&Directory> {
        let mut directory = &self.root;
        for name in &self.cwd {
            directory = match directory.entries.get(name) {
                Some(Node::Directory(child)) => child,
                _ => {
                    return Err(IndexedIoError::NotFound {
                        path: self.current_path(),
                    });
                }
            };
        }
        Ok(directory)
    }

    fn current_mut(&mut self) -> Result<&mut Directory> {
        let path = self.current_path();
        let mut directory = &mut self.root;
        for name in &self.cwd {
            directory = match directory.entries.get_mut(name) {
                Some(Node::Directory(child)) => child,
                _ => return Err(IndexedIoError::NotFound { path }),
            };
        }
        Ok(directory)
    }

    fn path_of(&self, name: &str) -> String {
        join_path(&self.current_path(), name)
    }
}

impl IndexedIo for MemoryIndexedIo {
    fn write_entry(&mut self, name: &str, data: EntryData) -> Result<()> {
        validate_name(name)?;
        let path = self.path_of(name);
        let directory = self.current_mut()?;
        if let Some(Node::Directory(_)) = directory.entries.get(name) {
            return Err(IndexedIoError::IsADirectory { path });
        }
        directory.entries.insert(name.to_string(), Node::File(data));
        Ok(())
    }

    fn read_entry(&self, name: &str) -> Result<&EntryData> {
        match self.current()?.entries.get(name) {
            Some(Node::File(data)) => Ok(data),
            Some(Node::Directory(_)) => Err(IndexedIoError::IsADirectory {
                path: self.path_of(name),
            }),
            None => Err(IndexedIoError::NotFound {
                path: self.path_of(name),
            }),
        }
    }

    fn create_directory(&mut self, name: &str) -> Result<()> {
        validate_name(name)?;
        let path = self.path_of(name);
        let directory = self.current_mut()?;
        match directory.entries.get(name) {
            Some(Node::Directory(_)) => Ok(()),
            Some(Node::File(_)) => Err(IndexedIoError::NotADirectory { path }),
            None => {
                directory
                    .entries
                    .insert(name.to_string(), Node::Directory(Directory::default()));
                Ok(())
            }
        }
    }

    fn change_directory(&mut self, name: &str) -> Result<()> {
        match name {
            PARENT_DIRECTORY => {
                self.cwd.pop().ok_or(IndexedIoError::AtRoot)?;
                Ok(())
            }
            ROOT_DIRECTORY => {
                self.cwd.clear();
                Ok(())
            }
            _ => {
                let is_directory = self
                    .current()?
                    .entries
                    .get(name)
                    .map(|node| matches!(node, Node::Directory(_)));
                match is_directory {
                    Some(true) => {
                        self.cwd.push(name.to_string());
                        Ok(())
                    }
                    Some(false) => Err(IndexedIoError::NotADirectory {
                        path: self.path_of(name),
                    }),
                    None => Err(IndexedIoError::NotFound {
                        path: self.path_of(name),
                    }),
                }
            }
        }
    }

    fn entries(&self) -> Result<Vec<EntryInfo>> {
        Ok(self
            .current()?
            .entries
            .iter()
            .map(|(name, node)| EntryInfo {
                name: name.clone(),
                kind: match node {
                    Node::Directory(_) => EntryKind::Directory,
                    Node::File(_) => EntryKind::File,
                },
            })
            .collect())
    }

    fn remove(&mut self, name: &str) -> Result<()> {
        let path = self.path_of(name);
        self.current_mut()?
            .entries
            .remove(name)
            .map(|_| ())
            .ok_or(IndexedIoError::NotFound { path })
    }

    fn exists(&self, name: &str) -> bool {
        self.current()
            .is_ok_and(|directory| directory.entries.contains_key(name))
    }

    fn current_path(&self) -> String {
        if self.cwd.is_empty() {
            ROOT_DIRECTORY.to_string()
        } else {
            format!("/{}", self.cwd.join("/"))
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name == "." || name == PARENT_DIRECTORY {
        return Err(IndexedIoError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn encode_directory(buf: &mut BytesMut, directory: &Directory) {
    buf.put_u32_le(directory.entries.len() as u32);
    for (name, node) in &directory.entries {
        match node {
            Node::Directory(child) => {
                buf.put_u8(NODE_DIRECTORY);
                put_string(buf, name);
                encode_directory(buf, child);
            }
            Node::File(data) => {
                buf.put_u8(NODE_FILE);
                put_string(buf, name);
                encode_entry(buf, data);
            }
        }
    }
}

fn encode_entry(buf: &mut BytesMut, data: &EntryData) {
    buf.put_u8(data.tag());
    match data {
        EntryData::U8(v) => buf.put_u8(*v),
        EntryData::U8Array(v) => {
            buf.put_u32_le(v.len() as u32);
            buf.put_slice(v);
        }
        EntryData::I32(v) => buf.put_i32_le(*v),
        EntryData::I32Array(v) => {
            buf.put_u32_le(v.len() as u32);
            v.iter().for_each(|x| buf.put_i32_le(*x));
        }
        EntryData::U32(v) => buf.put_u32_le(*v),
        EntryData::U32Array(v) => {
            buf.put_u32_le(v.len() as u32);
            v.iter().for_each(|x| buf.put_u32_le(*x));
        }
        EntryData::F32(v) => buf.put_f32_le(*v),
        EntryData::F32Array(v) => {
            buf.put_u32_le(v.len() as u32);
            v.iter().for_each(|x| buf.put_f32_le(*x));
        }
        EntryData::F64(v) => buf.put_f64_le(*v),
        EntryData::F64Array(v) => {
            buf.put_u32_le(v.len() as u32);
            v.iter().for_each(|x| buf.put_f64_le(*x));
        }
        EntryData::Str(v) => put_string(buf, v),
        EntryData::StrArray(v) => {
            buf.put_u32_le(v.len() as u32);
            v.iter().for_each(|s| put_string(buf, s));
        }
    }
}

fn put_string(buf: &mut BytesMut, value: &str) {
    buf.put_u32_le(value.len() as u32);
    buf.put_slice(value.as_bytes());
}

fn decode_directory(buf: &mut &[u8], depth: usize) -> Result<Directory> {
    if depth >= MAX_DIRECTORY_DEPTH {
        return Err(IndexedIoError::TooDeep {
            max: MAX_DIRECTORY_DEPTH,
        });
    }

    let count = get_u32(buf)? as usize;
    let mut directory = Directory::default();
    for _ in 0..count {
        let kind = get_u8(buf)?;
        let name = get_string(buf)?;
        validate_name(&name)?;
        let node = match kind {
            NODE_DIRECTORY => Node::Directory(decode_directory(buf, depth + 1)?),
            NODE_FILE => Node::File(decode_entry(buf)?),
            other => return Err(IndexedIoError::InvalidNodeKind(other)),
        };
        directory.entries.insert(name, node);
    }
    Ok(directory)
}

fn decode_entry(buf: &mut &[u8]) -> Result<EntryData> {
    let tag = get_u8(buf)?;
    let data = match tag {
        0x01 => EntryData::U8(get_u8(buf)?),
        0x02 => {
            let count = array_len(buf, 1)?;
            let values = buf[..count].to_vec();
            buf.advance(count);
            EntryData::U8Array(values)
        }
        0x03 => {
            ensure(buf, 4)?;
            EntryData::I32(buf.get_i32_le())
        }
        0x04 => {
            let count = array_len(buf, 4)?;
            EntryData::I32Array((0..count).map(|_| buf.get_i32_le()).collect())
        }
        0x05 => EntryData::U32(get_u32(buf)?),
        0x06 => {
            let count = array_len(buf, 4)?;
            EntryData::U32Array((0..count).map(|_| buf.get_u32_le()).collect())
        }
        0x07 => {
            ensure(buf, 4)?;
            EntryData::F32(buf.get_f32_le())
        }
        0x08 => {
            let count = array_len(buf, 4)?;
            EntryData::F32Array((0..count).map(|_| buf.get_f32_le()).collect())
        }
        0x09 => {
            ensure(buf, 8)?;
            EntryData::F64(buf.get_f64_le())
        }
        0x0A => {
            let count = array_len(buf, 8)?;
            EntryData::F64Array((0..count).map(|_| buf.get_f64_le()).collect())
        }
        0x0B => EntryData::Str(get_string(buf)?),
        0x0C => {
            // every string carries at least its 4-byte length
            let count = array_len(buf, 4)?;
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(get_string(buf)?);
            }
            EntryData::StrArray(values)
        }
        other => return Err(IndexedIoError::InvalidDataTag(other)),
    };
    Ok(data)
}

fn ensure(buf: &[u8], needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(IndexedIoError::Truncated {
            needed,
            got: buf.remaining(),
        });
    }
    Ok(())
}

fn array_len(buf: &mut &[u8], element_size: usize) -> Result<usize> {
    let count = get_u32(buf)? as usize;
    ensure(buf, count.saturating_mul(element_size))?;
    Ok(count)
}

fn get_u8(buf: &mut &[u8]) -> Result<u8> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

fn get_u32(buf: &mut &[u8]) -> Result<u32> {
    ensure(buf, 4)?;
    Ok(buf.get_u32_le())
}

fn get_string(buf: &mut &[u8]) -> Result<String> {
    let len = array_len(buf, 1)?;
    let bytes = buf[..len].to_vec();
    buf.advance(len);
    Ok(String::from_utf8(bytes)?)
}
