use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::section::write_section;

/// Every instruction address that embeds one interned identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentEntry {
    /// Offset of the identifier in the global string pool.
    pub offset: u32,
    /// Addresses in the order they were recorded.
    pub addresses: Vec<u32>,
}

/// Identifier references left for the loader to patch.
///
/// Only populated when compiling for storage; immediate compiles write
/// identifier handles straight into the stream.
#[derive(Debug, Clone, Default)]
pub struct IdentTable {
    /// Creation order; iteration is most-recently-created first.
    entries: Vec<IdentEntry>,
    by_offset: HashMap<u32, usize>,
}

impl IdentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, offset: u32, address: u32) {
        match self.by_offset.get(&offset) {
            Some(&idx) => self.entries[idx].addresses.push(address),
            None => {
                self.by_offset.insert(offset, self.entries.len());
                self.entries.push(IdentEntry {
                    offset,
                    addresses: vec![address],
                });
            }
        }
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.by_offset.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &IdentEntry> {
        self.entries.iter().rev()
    }

    pub fn to_entries(&self) -> Vec<IdentEntry> {
        self.iter().cloned().collect()
    }

    /// Entry count, then per entry: offset, address count, addresses.
    pub fn serialize(&self, sink: &mut Vec<u8>) -> Result<(), CompileError> {
        let ordered: Vec<&IdentEntry> = self.iter().collect();
        write_section("identifier table", &ordered, sink)
    }
}
