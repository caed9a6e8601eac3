use serde::{Deserialize, Serialize};

use crate::bytecode::code_stream::FlatCode;
use crate::bytecode::compile_error::CompileError;
use crate::bytecode::context::ResolveMode;
use crate::bytecode::ident_table::IdentEntry;
use crate::bytecode::local_vars::{FunctionLocals, LocalVarTable};
use crate::bytecode::section::read_section;

pub const IMAGE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHeader {
    pub version: u32,
    pub mode: ResolveMode,
}

/// A compiled unit: constant pools, identifier references, local layout and
/// the flattened code.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeImage {
    pub mode: ResolveMode,
    pub global_strings: Vec<u8>,
    pub function_strings: Vec<u8>,
    pub global_floats: Vec<f64>,
    pub function_floats: Vec<f64>,
    /// Newest entry first; empty unless `mode` is deferred.
    pub idents: Vec<IdentEntry>,
    pub locals: LocalVarTable,
    pub code: FlatCode,
}

impl CodeImage {
    /// Decode an image written by
    /// [`CompileContext::write_image`](crate::bytecode::context::CompileContext::write_image).
    pub fn read(bytes: &[u8]) -> Result<Self, CompileError> {
        let (header, rest) = read_section::<ImageHeader>("header", bytes)?;
        if header.version != IMAGE_VERSION {
            return Err(CompileError::ImageVersion {
                found: header.version,
                expected: IMAGE_VERSION,
            });
        }

        let (global_strings, rest) = read_section::<Vec<u8>>("string pool", rest)?;
        let (function_strings, rest) = read_section::<Vec<u8>>("string pool", rest)?;
        let (global_floats, rest) = read_section::<Vec<f64>>("float pool", rest)?;
        let (function_floats, rest) = read_section::<Vec<f64>>("float pool", rest)?;
        let (idents, rest) = match header.mode {
            ResolveMode::Deferred => read_section::<Vec<IdentEntry>>("identifier table", rest)?,
            ResolveMode::Immediate => (Vec::new(), rest),
        };
        let (locals, rest) = read_section::<Vec<FunctionLocals>>("local variable table", rest)?;
        let (code, rest) = read_section::<Vec<u32>>("code", rest)?;
        let (line_breaks, rest) = read_section::<Vec<u32>>("line breaks", rest)?;

        if !rest.is_empty() {
            return Err(CompileError::internal(format!(
                "{} trailing bytes after compiled image",
                rest.len()
            )));
        }

        Ok(Self {
            mode: header.mode,
            global_strings,
            function_strings,
            global_floats,
            function_floats,
            idents,
            locals: LocalVarTable::from_functions(locals),
            code: FlatCode::from_parts(code, line_breaks),
        })
    }

    /// Nul-terminated string at `offset` of the global pool.
    pub fn global_string(&self, offset: u32) -> Option<&str> {
        string_at(&self.global_strings, offset)
    }

    pub fn function_string(&self, offset: u32) -> Option<&str> {
        string_at(&self.function_strings, offset)
    }

    /// Patch every deferred identifier reference with the handle `intern`
    /// returns for its name, turning the image into an immediate one.
    pub fn resolve_identifiers<F>(&mut self, mut intern: F) -> Result<(), CompileError>
    where
        F: FnMut(&str) -> u64,
    {
        if self.mode == ResolveMode::Immediate {
            return Ok(());
        }

        let code_len = self.code.code().len();
        let mut handles = Vec::with_capacity(self.idents.len());
        for entry in &self.idents {
            let name = string_at(&self.global_strings, entry.offset).ok_or_else(|| {
                CompileError::internal(format!("identifier offset {} outside string pool", entry.offset))
            })?;
            if let Some(address) = entry.addresses.iter().find(|&&a| a as usize + 2 > code_len) {
                return Err(CompileError::internal(format!(
                    "identifier reference at {} outside code",
                    address
                )));
            }
            handles.push(intern(name));
        }

        let code = self.code.code_mut();
        for (entry, handle) in self.idents.iter().zip(handles) {
            for &address in &entry.addresses {
                let at = address as usize;
                code[at] = handle as u32;
                code[at + 1] = (handle >> 32) as u32;
            }
            tracing::trace!(offset = entry.offset, refs = entry.addresses.len(), "resolved identifier");
        }

        self.idents.clear();
        self.mode = ResolveMode::Immediate;
        Ok(())
    }
}

fn string_at(pool: &[u8], offset: u32) -> Option<&str> {
    let tail = pool.get(offset as usize..)?;
    let end = tail.iter().position(|&b| b == 0)?;
    std::str::from_utf8(&tail[..end]).ok()
}
