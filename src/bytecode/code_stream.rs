//! Chunked instruction buffer.
//!
//! Words are written into fixed-capacity chunks held in an arena; a chunk is
//! never moved once allocated, so a [`Span`] handed out earlier stays valid
//! for the life of the stream. Forward references are recorded as patches
//! and only applied to the flattened copy produced by [`CodeStream::flatten`].

use crate::bytecode::compile_error::CompileError;

/// Default chunk capacity, in instruction words.
pub const DEFAULT_CHUNK_WORDS: usize = 4096;

/// Which loop target a placeholder word is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixKind {
    LoopBlockStart,
    Break,
    Continue,
}

impl FixKind {
    /// Placeholder value written into the stream until the fixup resolves.
    pub fn placeholder(self) -> u32 {
        match self {
            FixKind::LoopBlockStart => 0,
            FixKind::Break => 1,
            FixKind::Continue => 2,
        }
    }
}

/// A reserved run of words: `len` words starting at `offset` of chunk
/// `chunk`, located at logical `address` in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub chunk: usize,
    pub offset: usize,
    pub len: usize,
    pub address: u32,
}

#[derive(Debug, Clone)]
struct Chunk {
    words: Box<[u32]>,
    used: usize,
}

impl Chunk {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity].into_boxed_slice(),
            used: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.words.len() - self.used
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Patch {
    address: u32,
    value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LoopFixup {
    kind: FixKind,
    address: u32,
}

/// Flattened stream: code words followed by the line-break table in one
/// buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatCode {
    buffer: Vec<u32>,
    code_len: usize,
}

impl FlatCode {
    pub fn from_parts(code: Vec<u32>, line_breaks: Vec<u32>) -> Self {
        let code_len = code.len();
        let mut buffer = code;
        buffer.extend(line_breaks);
        Self { buffer, code_len }
    }

    pub fn code(&self) -> &[u32] {
        &self.buffer[..self.code_len]
    }

    pub fn code_mut(&mut self) -> &mut [u32] {
        &mut self.buffer[..self.code_len]
    }

    /// `(line, address)` pairs, flattened.
    pub fn line_breaks(&self) -> &[u32] {
        &self.buffer[self.code_len..]
    }

    pub fn line_break_pairs(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.line_breaks().chunks_exact(2).map(|p| (p[0], p[1]))
    }

    pub fn into_parts(mut self) -> (Vec<u32>, Vec<u32>) {
        let line_breaks = self.buffer.split_off(self.code_len);
        (self.buffer, line_breaks)
    }
}

#[derive(Debug, Clone)]
pub struct CodeStream {
    chunks: Vec<Chunk>,
    chunk_words: usize,
    code_pos: u32,
    patches: Vec<Patch>,
    fixups: Vec<LoopFixup>,
    /// Start of each open loop scope within `fixups`; innermost last.
    fix_stack: Vec<usize>,
    /// `line, address` pairs.
    break_lines: Vec<u32>,
}

impl Default for CodeStream {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeStream {
    pub fn new() -> Self {
        Self::with_chunk_words(DEFAULT_CHUNK_WORDS)
    }

    pub fn with_chunk_words(chunk_words: usize) -> Self {
        Self {
            chunks: Vec::new(),
            chunk_words: chunk_words.max(1),
            code_pos: 0,
            patches: Vec::new(),
            fixups: Vec::new(),
            fix_stack: Vec::new(),
            break_lines: Vec::new(),
        }
    }

    /// Reserve `size` words at the current position.
    ///
    /// Uses the tail chunk when it has room, otherwise starts a new chunk
    /// (larger than the default if a single request needs it).
    pub fn allocate(&mut self, size: usize) -> Span {
        let fits = self.chunks.last().is_some_and(|c| c.remaining() >= size);
        if !fits {
            self.chunks
                .push(Chunk::with_capacity(self.chunk_words.max(size)));
            tracing::trace!(chunk = self.chunks.len() - 1, "new code chunk");
        }

        let chunk = self.chunks.len() - 1;
        let tail = &mut self.chunks[chunk];
        let span = Span {
            chunk,
            offset: tail.used,
            len: size,
            address: self.code_pos,
        };
        tail.used += size;
        self.code_pos += size as u32;
        span
    }

    pub fn span(&self, span: Span) -> &[u32] {
        &self.chunks[span.chunk].words[span.offset..span.offset + span.len]
    }

    pub fn span_mut(&mut self, span: Span) -> &mut [u32] {
        &mut self.chunks[span.chunk].words[span.offset..span.offset + span.len]
    }

    /// Append one word, returning its address.
    pub fn emit(&mut self, word: u32) -> u32 {
        let span = self.allocate(1);
        self.span_mut(span)[0] = word;
        span.address
    }

    /// Append several words, returning the address of the first.
    pub fn emit_words(&mut self, words: &[u32]) -> u32 {
        let span = self.allocate(words.len());
        self.span_mut(span).copy_from_slice(words);
        span.address
    }

    /// Address the next word will be written at.
    pub fn tell(&self) -> u32 {
        self.code_pos
    }

    /// Word at `address` as written, without pending patches.
    pub fn read(&self, address: u32) -> Option<u32> {
        let mut remaining = address as usize;
        for chunk in &self.chunks {
            if remaining < chunk.used {
                return Some(chunk.words[remaining]);
            }
            remaining -= chunk.used;
        }
        None
    }

    /// Overwrite `address` with `value` when the stream is flattened.
    pub fn patch(&mut self, address: u32, value: u32) {
        self.patches.push(Patch { address, value });
    }

    pub fn add_break_line(&mut self, line: u32, address: u32) {
        self.break_lines.push(line);
        self.break_lines.push(address);
    }

    pub fn num_line_breaks(&self) -> usize {
        self.break_lines.len() / 2
    }

    /// Open a loop scope; fixups added from now on belong to it.
    pub fn mark_loop_fixup_scope(&mut self) {
        self.fix_stack.push(self.fixups.len());
    }

    pub fn in_loop(&self) -> bool {
        !self.fix_stack.is_empty()
    }

    pub fn add_loop_fixup(&mut self, kind: FixKind, address: u32) {
        self.fixups.push(LoopFixup { kind, address });
    }

    /// Emit a placeholder word for `kind` and queue its fixup.
    pub fn emit_fix(&mut self, kind: FixKind) -> u32 {
        let address = self.emit(kind.placeholder());
        self.add_loop_fixup(kind, address);
        address
    }

    /// Patch every fixup of the innermost loop scope with its target and
    /// close the scope. Outer scopes' fixups are left pending.
    pub fn resolve_loop_fixups(
        &mut self,
        loop_start: u32,
        break_point: u32,
        continue_point: u32,
    ) -> Result<(), CompileError> {
        let start = self
            .fix_stack
            .pop()
            .ok_or_else(|| CompileError::internal("loop fixup resolved with no open scope"))?;

        for fix in self.fixups.drain(start..) {
            let value = match fix.kind {
                FixKind::LoopBlockStart => loop_start,
                FixKind::Break => break_point,
                FixKind::Continue => continue_point,
            };
            self.patches.push(Patch {
                address: fix.address,
                value,
            });
        }
        Ok(())
    }

    /// Fixups still waiting for their loop to resolve.
    pub fn pending_fixups(&self) -> usize {
        self.fixups.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Copy every chunk into one buffer, append the line-break table, then
    /// apply all recorded patches.
    pub fn flatten(&self) -> Result<FlatCode, CompileError> {
        let code_len = self.code_pos as usize;
        let mut buffer = Vec::with_capacity(code_len + self.break_lines.len());
        for chunk in &self.chunks {
            buffer.extend_from_slice(&chunk.words[..chunk.used]);
        }
        buffer.truncate(code_len);
        buffer.extend_from_slice(&self.break_lines);

        for p in &self.patches {
            let slot = buffer
                .get_mut(..code_len)
                .and_then(|code| code.get_mut(p.address as usize))
                .ok_or_else(|| {
                    CompileError::internal(format!(
                        "patch address {} outside code of length {}",
                        p.address, code_len
                    ))
                })?;
            *slot = p.value;
        }

        tracing::debug!(
            words = code_len,
            chunks = self.chunks.len(),
            patches = self.patches.len(),
            line_breaks = self.num_line_breaks(),
            "flattened code stream"
        );
        Ok(FlatCode { buffer, code_len })
    }

    /// Empty the stream, keeping the first chunk's storage.
    pub fn reset(&mut self) {
        self.code_pos = 0;
        self.patches.clear();
        self.fixups.clear();
        self.fix_stack.clear();
        self.break_lines.clear();

        self.chunks.truncate(1);
        if let Some(first) = self.chunks.first_mut() {
            first.used = 0;
        }
    }
}
