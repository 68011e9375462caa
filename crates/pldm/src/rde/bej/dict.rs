// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binary schema dictionary parser (DSP0218 Sec.7.2.3).
//!
//! ```text
//! +------------------------------------------------------------+
//! | VersionTag (1) | Flags (1) | EntryCount (2)                |
//! | SchemaVersion (4) | DictionarySize (4)                     |
//! +------------------------------------------------------------+
//! | Entry[EntryCount], 10 bytes each:                          |
//! |   Format (1) | Sequence (2) | ChildPointerOffset (2)       |
//! |   ChildCount (2) | NameLength (1) | NameOffset (2)         |
//! +------------------------------------------------------------+
//! | Name strings (null-terminated, pointed into by entries)    |
//! +------------------------------------------------------------+
//! ```
//!
//! Entry 0 is the schema root; `ChildPointerOffset` is a byte offset
//! from the start of the dictionary to the first child entry, so
//! children of an entry are always contiguous.

use crate::error::{Error, Result};

/// Fixed dictionary header size.
pub const DICT_HEADER_SIZE: usize = 12;
/// Fixed size of one dictionary entry.
pub const DICT_ENTRY_SIZE: usize = 10;

/// One parsed dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictEntry {
    pub format: u8,
    pub sequence: u16,
    pub child_offset: u16,
    pub child_count: u16,
    pub name: String,
}

/// A parsed schema dictionary.
#[derive(Debug, Clone)]
pub struct BejDictionary {
    pub flags: u8,
    pub schema_version: u32,
    entries: Vec<DictEntry>,
}

impl BejDictionary {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < DICT_HEADER_SIZE {
            return Err(Error::DecodeError(format!(
                "dictionary shorter than header: {} bytes",
                bytes.len()
            )));
        }
        let _version_tag = bytes[0];
        let flags = bytes[1];
        let entry_count = usize::from(u16::from_le_bytes([bytes[2], bytes[3]]));
        let schema_version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

        let entries_end = DICT_HEADER_SIZE + entry_count * DICT_ENTRY_SIZE;
        if bytes.len() < entries_end {
            return Err(Error::DecodeError(format!(
                "dictionary truncated: {} entries need {} bytes, have {}",
                entry_count,
                entries_end,
                bytes.len()
            )));
        }

        let mut entries = Vec::with_capacity(entry_count);
        for i in 0..entry_count {
            let at = DICT_HEADER_SIZE + i * DICT_ENTRY_SIZE;
            let e = &bytes[at..at + DICT_ENTRY_SIZE];
            let name_length = usize::from(e[7]);
            let name_offset = usize::from(u16::from_le_bytes([e[8], e[9]]));
            let name = if name_length == 0 {
                String::new()
            } else {
                let end = name_offset + name_length;
                if bytes.len() < end {
                    return Err(Error::DecodeError(format!(
                        "dictionary entry {} name out of bounds",
                        i
                    )));
                }
                // NameLength counts the terminating null.
                let raw = &bytes[name_offset..end - 1];
                String::from_utf8(raw.to_vec())
                    .map_err(|_| Error::DecodeError("dictionary name not UTF-8".into()))?
            };
            entries.push(DictEntry {
                format: e[0],
                sequence: u16::from_le_bytes([e[1], e[2]]),
                child_offset: u16::from_le_bytes([e[3], e[4]]),
                child_count: u16::from_le_bytes([e[5], e[6]]),
                name,
            });
        }

        Ok(Self {
            flags,
            schema_version,
            entries,
        })
    }

    /// The schema root entry.
    pub fn root(&self) -> Result<&DictEntry> {
        self.entries
            .first()
            .ok_or_else(|| Error::DecodeError("empty dictionary".into()))
    }

    pub fn entry(&self, index: usize) -> Option<&DictEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index range of an entry's children.
    fn child_range(&self, entry: &DictEntry) -> Result<std::ops::Range<usize>> {
        if entry.child_count == 0 {
            return Ok(0..0);
        }
        let offset = usize::from(entry.child_offset);
        if offset < DICT_HEADER_SIZE || (offset - DICT_HEADER_SIZE) % DICT_ENTRY_SIZE != 0 {
            return Err(Error::DecodeError(format!(
                "misaligned child pointer offset {}",
                offset
            )));
        }
        let start = (offset - DICT_HEADER_SIZE) / DICT_ENTRY_SIZE;
        let end = start + usize::from(entry.child_count);
        if end > self.entries.len() {
            return Err(Error::DecodeError(format!(
                "child range {}..{} exceeds {} entries",
                start,
                end,
                self.entries.len()
            )));
        }
        Ok(start..end)
    }

    /// Child entry with a given dictionary sequence number; returns the
    /// entry's absolute index for use as a nested context.
    pub fn child_by_seq(&self, parent: &DictEntry, seq: u16) -> Result<(usize, &DictEntry)> {
        let range = self.child_range(parent)?;
        self.entries[range.clone()]
            .iter()
            .enumerate()
            .find(|(_, e)| e.sequence == seq)
            .map(|(i, e)| (range.start + i, e))
            .ok_or_else(|| {
                Error::DecodeError(format!(
                    "sequence {} not among children of '{}'",
                    seq, parent.name
                ))
            })
    }

    /// Child entry by property name.
    pub fn child_by_name(&self, parent: &DictEntry, name: &str) -> Result<(usize, &DictEntry)> {
        let range = self.child_range(parent)?;
        self.entries[range.clone()]
            .iter()
            .enumerate()
            .find(|(_, e)| e.name == name)
            .map(|(i, e)| (range.start + i, e))
            .ok_or_else(|| {
                Error::EncodeError(format!(
                    "property '{}' not among children of '{}'",
                    name, parent.name
                ))
            })
    }

    /// First child (array element type descriptor).
    pub fn first_child(&self, parent: &DictEntry) -> Result<(usize, &DictEntry)> {
        let range = self.child_range(parent)?;
        if range.is_empty() {
            return Err(Error::DecodeError(format!(
                "entry '{}' has no children",
                parent.name
            )));
        }
        Ok((range.start, &self.entries[range.start]))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::rde::bej::{BEJ_INTEGER, BEJ_SET, BEJ_STRING};

    /// Hand-assembled dictionary: root set with children Id (string,
    /// seq 0) and Count (integer, seq 1).
    fn tiny_dictionary() -> Vec<u8> {
        let entry_count = 3u16;
        let names_base = DICT_HEADER_SIZE + entry_count as usize * DICT_ENTRY_SIZE;
        let mut names: Vec<u8> = Vec::new();
        let mut name_refs: Vec<(u8, u16)> = Vec::new();
        for name in ["Dummy", "Id", "Count"] {
            name_refs.push((name.len() as u8 + 1, (names_base + names.len()) as u16));
            names.extend_from_slice(name.as_bytes());
            names.push(0);
        }

        let mut out = Vec::new();
        out.push(0x00); // version tag
        out.push(0x00); // flags
        out.extend_from_slice(&entry_count.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes()); // schema version
        out.extend_from_slice(&0u32.to_le_bytes()); // size, unused here

        let child_offset = (DICT_HEADER_SIZE + DICT_ENTRY_SIZE) as u16;
        // Root: set, seq 0, two children at entry index 1.
        out.push(BEJ_SET);
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&child_offset.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.push(name_refs[0].0);
        out.extend_from_slice(&name_refs[0].1.to_le_bytes());
        // Id: string, seq 0.
        out.push(BEJ_STRING);
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.push(name_refs[1].0);
        out.extend_from_slice(&name_refs[1].1.to_le_bytes());
        // Count: integer, seq 1.
        out.push(BEJ_INTEGER);
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.push(name_refs[2].0);
        out.extend_from_slice(&name_refs[2].1.to_le_bytes());

        out.extend_from_slice(&names);
        out
    }

    #[test]
    fn test_parse_and_walk() {
        let dict = BejDictionary::parse(&tiny_dictionary()).unwrap();
        assert_eq!(dict.len(), 3);
        let root = dict.root().unwrap();
        assert_eq!(root.name, "Dummy");
        let (_, id) = dict.child_by_name(root, "Id").unwrap();
        assert_eq!(id.sequence, 0);
        let (_, count) = dict.child_by_seq(root, 1).unwrap();
        assert_eq!(count.name, "Count");
    }

    #[test]
    fn test_unknown_child_is_error() {
        let dict = BejDictionary::parse(&tiny_dictionary()).unwrap();
        let root = dict.root().unwrap();
        assert!(dict.child_by_name(root, "Nope").is_err());
        assert!(dict.child_by_seq(root, 9).is_err());
    }

    #[test]
    fn test_truncated_dictionary_rejected() {
        let bytes = tiny_dictionary();
        assert!(BejDictionary::parse(&bytes[..DICT_HEADER_SIZE + 5]).is_err());
        assert!(BejDictionary::parse(&[0x00]).is_err());
    }
}
