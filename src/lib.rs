//! # Cinder
//!
//! Code-generation backend for a dynamically typed scripting language. The
//! front end walks its AST and drives a [`bytecode::CompileContext`]:
//! literals go into deduplicating constant pools, variables get register
//! slots, and instruction words go into a chunked code stream with deferred
//! patches for forward jumps and loop exits.
//!
//! A unit is either finished into an in-memory [`bytecode::CodeImage`] for
//! immediate execution, or written as a relocatable image whose identifier
//! references a loader patches later.

pub mod bytecode;
pub mod config;
