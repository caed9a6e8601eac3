//! Deduplicating constant pools for string and float literals.
//!
//! Both pools are append-only for the lifetime of a compilation unit. The
//! first time a value is seen defines its offset (strings) or index (floats);
//! later lookups that compare equal return that first entry.

use std::collections::HashMap;

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::section::write_section;

/// Bytes reserved for a tagged string so it can later be overwritten in
/// place by a numeric tag: one tag marker, five digits, one nul.
pub const TAGGED_MIN_LEN: u32 = 7;

#[derive(Debug, Clone)]
struct StringEntry {
    text: String,
    start: u32,
    len: u32,
    tagged: bool,
}

/// Pool of nul-terminated string literals addressed by byte offset.
#[derive(Debug, Clone, Default)]
pub struct StringPool {
    entries: Vec<StringEntry>,
    /// First entry per exact text, indexed by tag flag.
    exact: [HashMap<String, usize>; 2],
    /// First entry per ASCII-folded text, indexed by tag flag.
    folded: [HashMap<String, usize>; 2],
    total_len: u32,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `text`, returning its byte offset in the finalized pool.
    ///
    /// Case-insensitive lookups fold ASCII letters only. Tagged and untagged
    /// entries never match each other. Text past an embedded nul is
    /// dropped, since the pool stores nul-terminated strings.
    pub fn intern(&mut self, text: &str, case_sensitive: bool, tagged: bool) -> u32 {
        let text = text.find('\0').map_or(text, |end| &text[..end]);
        let tag = tagged as usize;
        let folded = text.to_ascii_lowercase();

        let hit = if case_sensitive {
            self.exact[tag].get(text)
        } else {
            self.folded[tag].get(&folded)
        };
        if let Some(&idx) = hit {
            return self.entries[idx].start;
        }

        let mut len = text.len() as u32 + 1;
        if tagged && len < TAGGED_MIN_LEN {
            len = TAGGED_MIN_LEN;
        }

        let start = self.total_len;
        let idx = self.entries.len();
        self.entries.push(StringEntry {
            text: text.to_string(),
            start,
            len,
            tagged,
        });
        self.exact[tag].entry(text.to_string()).or_insert(idx);
        self.folded[tag].entry(folded).or_insert(idx);
        self.total_len += len;

        tracing::trace!(offset = start, len, tagged, "interned string {:?}", text);
        start
    }

    /// Intern the decimal rendering of `value`.
    pub fn add_int_string(&mut self, value: i32) -> u32 {
        self.intern(&value.to_string(), true, false)
    }

    /// Intern the `%g` rendering of `value`.
    pub fn add_float_string(&mut self, value: f64) -> u32 {
        self.intern(&format_g(value), true, false)
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        for map in self.exact.iter_mut().chain(self.folded.iter_mut()) {
            map.clear();
        }
        self.total_len = 0;
    }

    /// Total bytes of the finalized pool, padding included.
    pub fn total_len(&self) -> u32 {
        self.total_len
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Allocated size of the entry starting at `offset`.
    pub fn entry_len(&self, offset: u32) -> Option<u32> {
        self.find(offset).map(|e| e.len)
    }

    /// Text of the entry starting at `offset`.
    pub fn get(&self, offset: u32) -> Option<&str> {
        self.find(offset).map(|e| e.text.as_str())
    }

    fn find(&self, offset: u32) -> Option<&StringEntry> {
        self.entries
            .binary_search_by_key(&offset, |e| e.start)
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Entries as `(offset, text, tagged)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str, bool)> {
        self.entries
            .iter()
            .map(|e| (e.start, e.text.as_str(), e.tagged))
    }

    /// Lay every entry out at its offset in one zero-filled buffer.
    pub fn finalize(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.total_len as usize];
        for e in &self.entries {
            let start = e.start as usize;
            let bytes = e.text.as_bytes();
            let n = bytes.len().min(e.len as usize - 1);
            out[start..start + n].copy_from_slice(&bytes[..n]);
        }
        out
    }

    /// Write the total length followed by the pool bytes.
    pub fn serialize(&self, sink: &mut Vec<u8>) -> Result<(), CompileError> {
        write_section("string pool", self.finalize().as_slice(), sink)
    }
}

/// Pool of float literals addressed by dense index.
#[derive(Debug, Clone, Default)]
pub struct FloatPool {
    values: Vec<f64>,
    index: HashMap<u64, u32>,
}

impl FloatPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `value`, returning its index. Equality is IEEE `==`.
    pub fn intern(&mut self, value: f64) -> u32 {
        let key = float_key(value);
        if let Some(idx) = key.and_then(|k| self.index.get(&k)) {
            return *idx;
        }

        let idx = self.values.len() as u32;
        self.values.push(value);
        if let Some(k) = key {
            self.index.insert(k, idx);
        }

        tracing::trace!(index = idx, "interned float {}", value);
        idx
    }

    pub fn reset(&mut self) {
        self.values.clear();
        self.index.clear();
    }

    pub fn count(&self) -> u32 {
        self.values.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<f64> {
        self.values.get(index as usize).copied()
    }

    pub fn finalize(&self) -> Vec<f64> {
        self.values.clone()
    }

    /// Write the count followed by every value in index order.
    pub fn serialize(&self, sink: &mut Vec<u8>) -> Result<(), CompileError> {
        write_section("float pool", self.values.as_slice(), sink)
    }
}

/// Hash key that agrees with `==`: both zeros share a key, NaN has none.
fn float_key(value: f64) -> Option<u64> {
    if value.is_nan() {
        None
    } else if value == 0.0 {
        Some(0)
    } else {
        Some(value.to_bits())
    }
}

/// Render `value` the way C's `%g` does (six significant digits).
pub fn format_g(value: f64) -> String {
    const PRECISION: i32 = 6;

    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // The exponent is taken after rounding to the target precision.
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= PRECISION {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", strip_zeros(mantissa), sign, exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp) as usize;
        strip_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
