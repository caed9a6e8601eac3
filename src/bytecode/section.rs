use serde::{Deserialize, Serialize};

use crate::bytecode::compile_error::CompileError;

/// Append one postcard-encoded section to `sink`.
pub fn write_section<T>(section: &'static str, value: &T, sink: &mut Vec<u8>) -> Result<(), CompileError>
where
    T: Serialize + ?Sized,
{
    let bytes = postcard::to_allocvec(value).map_err(|e| CompileError::encode(section, e))?;
    sink.extend_from_slice(&bytes);
    Ok(())
}

/// Decode one section from the front of `bytes`, returning the rest.
pub fn read_section<'a, T>(section: &'static str, bytes: &'a [u8]) -> Result<(T, &'a [u8]), CompileError>
where
    T: Deserialize<'a>,
{
    postcard::take_from_bytes(bytes).map_err(|e| CompileError::decode(section, e))
}
