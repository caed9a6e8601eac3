pub mod code_stream;
pub mod compile_error;
pub mod const_pool;
pub mod context;
pub mod diagnostics;
pub mod disasm;
pub mod func_vars;
pub mod ident_table;
pub mod image;
pub mod local_vars;
pub mod section;

pub use code_stream::{CodeStream, FixKind, FlatCode, Span};
pub use compile_error::CompileError;
pub use const_pool::{FloatPool, StringPool};
pub use context::{CompileContext, CompilerOptions, Ident, ResolveMode, string_to_number};
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, Diagnostics, SourceLocation};
pub use func_vars::{FuncVars, TypeClass};
pub use ident_table::{IdentEntry, IdentTable};
pub use image::CodeImage;
pub use local_vars::LocalVarTable;
