//! Per-compilation state.
//!
//! A [`CompileContext`] owns everything one compilation unit touches: the
//! global and function constant pools, the variable scopes, the identifier
//! and local-variable tables and the code stream. Contexts share nothing, so
//! independent scripts can be compiled one after another on the same context
//! or side by side on separate ones.

use serde::{Deserialize, Serialize};

use crate::bytecode::code_stream::{CodeStream, DEFAULT_CHUNK_WORDS};
use crate::bytecode::compile_error::CompileError;
use crate::bytecode::const_pool::{FloatPool, StringPool};
use crate::bytecode::diagnostics::{
    Diagnostic, DiagnosticKind, DiagnosticSink, Diagnostics, SourceLocation, TracingSink,
};
use crate::bytecode::func_vars::{FuncVars, TypeClass};
use crate::bytecode::ident_table::IdentTable;
use crate::bytecode::image::{CodeImage, IMAGE_VERSION, ImageHeader};
use crate::bytecode::local_vars::LocalVarTable;
use crate::bytecode::section::write_section;

/// How identifier references are written into the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveMode {
    /// Code runs in this process: identifiers are written as host handles.
    #[default]
    Immediate,
    /// Code is written to a compiled-script file: identifiers are zeroed and
    /// listed in the identifier table for the loader to patch.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    pub mode: ResolveMode,
    /// Abort on the first diagnostic instead of reporting and continuing.
    pub warnings_as_errors: bool,
    /// Capacity of each code-stream chunk, in words.
    pub chunk_words: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            mode: ResolveMode::Immediate,
            warnings_as_errors: false,
            chunk_words: DEFAULT_CHUNK_WORDS,
        }
    }
}

/// An identifier as interned by the host console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    /// Host handle written into immediate-mode code.
    pub handle: u64,
}

impl Ident {
    pub fn new(name: impl Into<String>, handle: u64) -> Self {
        Self {
            name: name.into(),
            handle,
        }
    }
}

/// Which pair of constant pools literals go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolScope {
    Global,
    Function,
}

#[derive(Debug)]
pub struct CompileContext {
    options: CompilerOptions,
    diags: Diagnostics,

    global_strings: StringPool,
    function_strings: StringPool,
    global_floats: FloatPool,
    function_floats: FloatPool,
    pool_scope: PoolScope,

    idents: IdentTable,
    locals: LocalVarTable,

    /// Top-level scope of a script compiled for storage.
    global_vars: FuncVars,
    /// Top-level scope of immediately evaluated code; survives between units.
    eval_vars: FuncVars,
    function_vars: FuncVars,

    stream: CodeStream,
}

impl Default for CompileContext {
    fn default() -> Self {
        Self::new(CompilerOptions::default())
    }
}

impl CompileContext {
    pub fn new(options: CompilerOptions) -> Self {
        Self::with_sink(options, Box::new(TracingSink))
    }

    pub fn with_sink(options: CompilerOptions, sink: Box<dyn DiagnosticSink>) -> Self {
        Self {
            diags: Diagnostics::new(sink, options.warnings_as_errors),
            global_strings: StringPool::new(),
            function_strings: StringPool::new(),
            global_floats: FloatPool::new(),
            function_floats: FloatPool::new(),
            pool_scope: PoolScope::Global,
            idents: IdentTable::new(),
            locals: LocalVarTable::new(),
            global_vars: FuncVars::new(),
            eval_vars: FuncVars::new(),
            function_vars: FuncVars::new(),
            stream: CodeStream::with_chunk_words(options.chunk_words),
            options,
        }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn mode(&self) -> ResolveMode {
        self.options.mode
    }

    /// Switch resolution strategy. Changing it drops both top-level scopes,
    /// since register layouts are not shared between the two.
    pub fn set_mode(&mut self, mode: ResolveMode) {
        if mode != self.options.mode {
            tracing::debug!(from = ?self.options.mode, to = ?mode, "switching resolve mode");
            self.options.mode = mode;
            self.global_vars.clear();
            self.eval_vars.clear();
        }
    }

    /// Toggle escalation for both the options and the live diagnostics.
    pub fn set_warnings_as_errors(&mut self, enabled: bool) {
        self.options.warnings_as_errors = enabled;
        self.diags.set_warnings_as_errors(enabled);
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diags
    }

    pub fn set_current_file(&mut self, file: Option<&str>) {
        self.diags.set_current_file(file.map(str::to_string));
    }

    /// Start a new compilation unit: reset every table and the stream.
    pub fn begin_unit(&mut self, file: Option<&str>) {
        tracing::debug!(file = file.unwrap_or("<eval>"), mode = ?self.options.mode, "begin unit");
        self.set_current_file(file);
        self.reset_tables();
        self.stream.reset();
    }

    /// Reset pools, identifier and local-variable tables and the global
    /// scope; interning goes back to the global pools.
    pub fn reset_tables(&mut self) {
        self.pool_scope = PoolScope::Global;
        self.global_strings.reset();
        self.function_strings.reset();
        self.global_floats.reset();
        self.function_floats.reset();
        self.idents.reset();
        self.locals.reset();
        self.global_vars.clear();
        self.function_vars.clear();
    }

    /// Enter a function body: literals go to the function pools and
    /// variables to a fresh scope.
    pub fn begin_function(&mut self) {
        self.pool_scope = PoolScope::Function;
        self.function_vars.clear();
    }

    /// Leave a function body, persisting its locals under
    /// `namespace::function`.
    pub fn end_function(&mut self, namespace: &str, function: &str) {
        self.persist_function_locals(namespace, function);
        tracing::debug!(namespace, function, locals = self.function_vars.count(), "end function");
        self.function_vars.clear();
        self.pool_scope = PoolScope::Global;
    }

    pub fn pool_scope(&self) -> PoolScope {
        self.pool_scope
    }

    /// Record the active scope's variables in register order.
    pub fn persist_function_locals(&mut self, namespace: &str, function: &str) {
        let scope = match self.pool_scope {
            PoolScope::Function => &self.function_vars,
            PoolScope::Global => match self.options.mode {
                ResolveMode::Immediate => &self.eval_vars,
                ResolveMode::Deferred => &self.global_vars,
            },
        };
        for var in scope.iter() {
            self.locals.record(function, namespace, &var.name);
        }
    }

    pub fn strings(&self) -> &StringPool {
        match self.pool_scope {
            PoolScope::Global => &self.global_strings,
            PoolScope::Function => &self.function_strings,
        }
    }

    pub fn strings_mut(&mut self) -> &mut StringPool {
        match self.pool_scope {
            PoolScope::Global => &mut self.global_strings,
            PoolScope::Function => &mut self.function_strings,
        }
    }

    pub fn floats(&self) -> &FloatPool {
        match self.pool_scope {
            PoolScope::Global => &self.global_floats,
            PoolScope::Function => &self.function_floats,
        }
    }

    pub fn floats_mut(&mut self) -> &mut FloatPool {
        match self.pool_scope {
            PoolScope::Global => &mut self.global_floats,
            PoolScope::Function => &mut self.function_floats,
        }
    }

    pub fn global_strings(&self) -> &StringPool {
        &self.global_strings
    }

    pub fn intern_string(&mut self, text: &str, case_sensitive: bool, tagged: bool) -> u32 {
        self.strings_mut().intern(text, case_sensitive, tagged)
    }

    pub fn intern_float(&mut self, value: f64) -> u32 {
        self.floats_mut().intern(value)
    }

    /// Pre-intern an identifier in the global string pool.
    pub fn precompile_ident(&mut self, name: Option<&str>) {
        if let Some(name) = name {
            self.global_strings.intern(name, true, false);
        }
    }

    pub fn idents(&self) -> &IdentTable {
        &self.idents
    }

    pub fn locals(&self) -> &LocalVarTable {
        &self.locals
    }

    pub fn stream(&self) -> &CodeStream {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut CodeStream {
        &mut self.stream
    }

    /// The scope variable references resolve against right now.
    pub fn vars(&self) -> &FuncVars {
        match (self.pool_scope, self.options.mode) {
            (PoolScope::Function, _) => &self.function_vars,
            (PoolScope::Global, ResolveMode::Immediate) => &self.eval_vars,
            (PoolScope::Global, ResolveMode::Deferred) => &self.global_vars,
        }
    }

    fn vars_and_diags(&mut self) -> (&mut FuncVars, &mut Diagnostics) {
        let vars = match (self.pool_scope, self.options.mode) {
            (PoolScope::Function, _) => &mut self.function_vars,
            (PoolScope::Global, ResolveMode::Immediate) => &mut self.eval_vars,
            (PoolScope::Global, ResolveMode::Deferred) => &mut self.global_vars,
        };
        (vars, &mut self.diags)
    }

    pub fn assign_var(
        &mut self,
        name: &str,
        ty: TypeClass,
        is_constant: bool,
        line: u32,
    ) -> Result<u32, CompileError> {
        let (vars, diags) = self.vars_and_diags();
        vars.assign(name, ty, is_constant, line, diags)
    }

    pub fn lookup_var(&mut self, name: &str, line: u32) -> Result<u32, CompileError> {
        let (vars, diags) = self.vars_and_diags();
        vars.lookup(name, line, diags)
    }

    pub fn lookup_var_type(&mut self, name: &str, line: u32) -> Result<TypeClass, CompileError> {
        let (vars, diags) = self.vars_and_diags();
        vars.lookup_type(name, line, diags)
    }

    /// Slot of a persisted local; a miss is reported and yields `None`.
    pub fn lookup_local(
        &mut self,
        namespace: &str,
        function: &str,
        var: &str,
    ) -> Result<Option<usize>, CompileError> {
        self.locals.lookup(namespace, function, var, &mut self.diags)
    }

    /// Emit a two-word identifier reference, returning its address.
    ///
    /// Immediate mode writes the host handle (low word first). Deferred mode
    /// writes zeros and records the address against the identifier's offset
    /// in the global string pool.
    pub fn emit_ident(&mut self, ident: Option<&Ident>) -> u32 {
        let address = self.stream.tell();
        let words = match (self.options.mode, ident) {
            (ResolveMode::Immediate, Some(ident)) => {
                [ident.handle as u32, (ident.handle >> 32) as u32]
            }
            (ResolveMode::Deferred, Some(ident)) => {
                let offset = self.global_strings.intern(&ident.name, false, false);
                self.idents.record(offset, address);
                [0, 0]
            }
            (_, None) => [0, 0],
        };
        self.stream.emit_words(&words)
    }

    /// Fold a literal to a number; see [`string_to_number`].
    pub fn string_to_number(&mut self, text: &str, line: Option<u32>) -> Result<f64, CompileError> {
        let location = line.and_then(|l| self.diags.location(l));
        string_to_number(text, location, &mut self.diags)
    }

    /// Flatten the unit into an in-memory image.
    pub fn finish(&self) -> Result<CodeImage, CompileError> {
        let idents = match self.options.mode {
            ResolveMode::Immediate => Vec::new(),
            ResolveMode::Deferred => self.idents.to_entries(),
        };
        Ok(CodeImage {
            mode: self.options.mode,
            global_strings: self.global_strings.finalize(),
            function_strings: self.function_strings.finalize(),
            global_floats: self.global_floats.finalize(),
            function_floats: self.function_floats.finalize(),
            idents,
            locals: self.locals.copy(),
            code: self.stream.flatten()?,
        })
    }

    /// Write the unit as a compiled-script image: header, string pools,
    /// float pools, identifier table (deferred only), local variables,
    /// code and line breaks.
    pub fn write_image(&self, sink: &mut Vec<u8>) -> Result<(), CompileError> {
        let header = ImageHeader {
            version: IMAGE_VERSION,
            mode: self.options.mode,
        };
        write_section("header", &header, sink)?;

        self.global_strings.serialize(sink)?;
        self.function_strings.serialize(sink)?;
        self.global_floats.serialize(sink)?;
        self.function_floats.serialize(sink)?;
        if self.options.mode == ResolveMode::Deferred {
            self.idents.serialize(sink)?;
        }
        self.locals.serialize(sink)?;

        let (code, line_breaks) = self.stream.flatten()?.into_parts();
        write_section("code", &code, sink)?;
        write_section("line breaks", &line_breaks, sink)?;

        tracing::debug!(bytes = sink.len(), words = code.len(), "wrote compiled image");
        Ok(())
    }
}

/// Convert a literal to a number for constant folding.
///
/// The leading numeric prefix is parsed the way C's `atof` does. A zero
/// result falls back to `true` (1) and `false` (0), compared ignoring ASCII
/// case; anything else is zero and, when `location` is known, reported as
/// [`DiagnosticKind::AlwaysZeroLiteral`].
pub fn string_to_number(
    text: &str,
    location: Option<SourceLocation>,
    diags: &mut Diagnostics,
) -> Result<f64, CompileError> {
    let value = parse_leading_float(text);
    if value != 0.0 {
        return Ok(value);
    }
    if text.eq_ignore_ascii_case("true") {
        return Ok(1.0);
    }
    if text.eq_ignore_ascii_case("false") {
        return Ok(0.0);
    }
    if let Some(loc) = location {
        diags.report(
            Diagnostic::new(DiagnosticKind::AlwaysZeroLiteral, "string always evaluates to 0.")
                .at(Some(loc)),
        )?;
    }
    Ok(0.0)
}

fn parse_leading_float(text: &str) -> f64 {
    let s = text.trim_start();
    let b = s.as_bytes();
    let mut i = 0;

    let negative = b.first() == Some(&b'-');
    if matches!(b.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    for word in ["infinity", "inf", "nan"] {
        let matched = s
            .get(i..i + word.len())
            .is_some_and(|w| w.eq_ignore_ascii_case(word));
        if matched {
            let v = if word == "nan" { f64::NAN } else { f64::INFINITY };
            return if negative { -v } else { v };
        }
    }

    if b.len() > i + 1 && b[i] == b'0' && (b[i + 1] == b'x' || b[i + 1] == b'X') {
        let v = parse_hex_float(&b[i + 2..]);
        return if negative { -v } else { v };
    }

    let int_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    if i < b.len() && b[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        digits += i - frac_start;
    }
    if digits == 0 {
        return 0.0;
    }

    let mut end = i;
    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        let mut j = i + 1;
        if j < b.len() && (b[j] == b'+' || b[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            end = j;
        }
    }

    s[..end].parse().unwrap_or(0.0)
}

/// Hex digits after `0x`: optional `.` fraction, optional binary `p`
/// exponent. No digits at all reads as the bare `0`.
fn parse_hex_float(b: &[u8]) -> f64 {
    let mut i = 0;
    let mut mantissa = 0.0f64;
    let mut scale = 0i32;
    let mut digits = 0;

    while let Some(d) = b.get(i).and_then(|c| (*c as char).to_digit(16)) {
        mantissa = mantissa * 16.0 + d as f64;
        digits += 1;
        i += 1;
    }
    if b.get(i) == Some(&b'.') {
        i += 1;
        while let Some(d) = b.get(i).and_then(|c| (*c as char).to_digit(16)) {
            mantissa = mantissa * 16.0 + d as f64;
            scale -= 4;
            digits += 1;
            i += 1;
        }
    }
    if digits == 0 {
        return 0.0;
    }

    if matches!(b.get(i), Some(b'p' | b'P')) {
        let mut j = i + 1;
        let exp_negative = b.get(j) == Some(&b'-');
        if matches!(b.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let mut exp = 0i32;
        let exp_start = j;
        while let Some(d) = b.get(j).filter(|c| c.is_ascii_digit()) {
            exp = exp.saturating_mul(10).saturating_add((d - b'0') as i32);
            j += 1;
        }
        if j > exp_start {
            scale = scale.saturating_add(if exp_negative { -exp } else { exp });
        }
    }

    mantissa * 2f64.powi(scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::diagnostics::test_support::{SharedSink, collecting};

    fn context(mode: ResolveMode) -> (CompileContext, SharedSink) {
        let sink = SharedSink::default();
        let options = CompilerOptions {
            mode,
            ..CompilerOptions::default()
        };
        (
            CompileContext::with_sink(options, Box::new(sink.clone())),
            sink,
        )
    }

    #[test]
    fn test_string_to_number_parses_prefix() {
        let (mut diags, sink) = collecting(false);
        assert_eq!(string_to_number("3.5", None, &mut diags).unwrap(), 3.5);
        assert_eq!(string_to_number("  12abc", None, &mut diags).unwrap(), 12.0);
        assert_eq!(string_to_number("-1e3x", None, &mut diags).unwrap(), -1000.0);
        assert_eq!(string_to_number(".25", None, &mut diags).unwrap(), 0.25);
        assert_eq!(string_to_number("7e", None, &mut diags).unwrap(), 7.0);
        assert!(sink.kinds().is_empty());
    }

    #[test]
    fn test_string_to_number_hex_literals() {
        let (mut diags, sink) = collecting(false);
        let loc = Some(SourceLocation::new("hex.cs", 4));
        assert_eq!(string_to_number("0x10", loc.clone(), &mut diags).unwrap(), 16.0);
        assert_eq!(string_to_number("-0XfF", None, &mut diags).unwrap(), -255.0);
        assert_eq!(string_to_number("0x1.8p1", None, &mut diags).unwrap(), 3.0);
        assert_eq!(string_to_number("0x10p-2g", None, &mut diags).unwrap(), 4.0);
        assert!(sink.kinds().is_empty());

        assert_eq!(string_to_number("0x", loc, &mut diags).unwrap(), 0.0);
        assert_eq!(sink.kinds(), vec![DiagnosticKind::AlwaysZeroLiteral]);
    }

    #[test]
    fn test_string_to_number_booleans() {
        let (mut diags, sink) = collecting(false);
        let loc = Some(SourceLocation::new("a.cs", 1));
        assert_eq!(string_to_number("TRUE", loc.clone(), &mut diags).unwrap(), 1.0);
        assert_eq!(string_to_number("False", loc, &mut diags).unwrap(), 0.0);
        assert!(sink.kinds().is_empty());
    }

    #[test]
    fn test_string_to_number_zero_warns_only_with_location() {
        let (mut diags, sink) = collecting(false);
        assert_eq!(string_to_number("banana", None, &mut diags).unwrap(), 0.0);
        assert!(sink.kinds().is_empty());

        let loc = Some(SourceLocation::new("a.cs", 4));
        assert_eq!(string_to_number("banana", loc, &mut diags).unwrap(), 0.0);
        assert_eq!(sink.kinds(), vec![DiagnosticKind::AlwaysZeroLiteral]);
        assert_eq!(sink.messages()[0], "a.cs (4): string always evaluates to 0.");
    }

    #[test]
    fn test_string_to_number_numeric_zero_still_warns() {
        let (mut diags, sink) = collecting(false);
        let loc = Some(SourceLocation::new("a.cs", 4));
        assert_eq!(string_to_number("0", loc, &mut diags).unwrap(), 0.0);
        assert_eq!(sink.kinds().len(), 1);
    }

    #[test]
    fn test_string_to_number_escalates() {
        let (mut diags, _) = collecting(true);
        let loc = Some(SourceLocation::new("a.cs", 4));
        assert!(string_to_number("x", loc, &mut diags).is_err());
    }

    #[test]
    fn test_context_string_to_number_uses_current_file() {
        let (mut ctx, sink) = context(ResolveMode::Immediate);
        assert_eq!(ctx.string_to_number("nope", Some(2)).unwrap(), 0.0);
        assert!(sink.kinds().is_empty());

        ctx.set_current_file(Some("main.cs"));
        ctx.string_to_number("nope", Some(2)).unwrap();
        assert_eq!(sink.messages(), vec!["main.cs (2): string always evaluates to 0.".to_string()]);
    }

    #[test]
    fn test_immediate_ident_writes_handle() {
        let (mut ctx, _) = context(ResolveMode::Immediate);
        ctx.stream_mut().emit(99);
        let addr = ctx.emit_ident(Some(&Ident::new("player", 0x0000_0001_0000_0002)));

        assert_eq!(addr, 1);
        assert!(ctx.idents().is_empty());
        let image = ctx.finish().unwrap();
        assert_eq!(image.code.code(), &[99, 2, 1]);
    }

    #[test]
    fn test_deferred_ident_records_reference() {
        let (mut ctx, _) = context(ResolveMode::Deferred);
        let a = ctx.emit_ident(Some(&Ident::new("Player", 7)));
        ctx.stream_mut().emit(5);
        let b = ctx.emit_ident(Some(&Ident::new("player", 7)));

        assert_eq!((a, b), (0, 3));
        let entries = ctx.idents().to_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].addresses, vec![0, 3]);
        assert_eq!(ctx.global_strings().get(entries[0].offset), Some("Player"));

        let image = ctx.finish().unwrap();
        assert_eq!(image.code.code(), &[0, 0, 5, 0, 0]);
    }

    #[test]
    fn test_missing_ident_writes_zeros() {
        let (mut ctx, _) = context(ResolveMode::Deferred);
        ctx.emit_ident(None);
        assert!(ctx.idents().is_empty());
        assert_eq!(ctx.stream().tell(), 2);
    }

    #[test]
    fn test_function_scope_uses_function_pools_and_vars() {
        let (mut ctx, _) = context(ResolveMode::Deferred);
        assert_eq!(ctx.intern_string("top", true, false), 0);
        ctx.assign_var("g", TypeClass::UInt, false, 1).unwrap();

        ctx.begin_function();
        assert_eq!(ctx.pool_scope(), PoolScope::Function);
        assert_eq!(ctx.intern_string("inner", true, false), 0);
        assert_eq!(ctx.intern_float(2.0), 0);
        assert_eq!(ctx.assign_var("a", TypeClass::Float, false, 2).unwrap(), 0);
        assert_eq!(ctx.assign_var("b", TypeClass::Float, false, 2).unwrap(), 1);
        ctx.end_function("Game", "tick");

        assert_eq!(ctx.pool_scope(), PoolScope::Global);
        assert_eq!(ctx.strings().get(0), Some("top"));
        assert_eq!(ctx.vars().get("g").unwrap().reg, 0);
        assert_eq!(ctx.lookup_local("Game", "tick", "b").unwrap(), Some(1));
    }

    #[test]
    fn test_functions_in_one_unit_share_function_pools() {
        let (mut ctx, _) = context(ResolveMode::Deferred);

        ctx.begin_function();
        assert_eq!(ctx.intern_string("inner", true, false), 0);
        assert_eq!(ctx.intern_float(1.5), 0);
        ctx.end_function("Game", "first");

        ctx.begin_function();
        assert_eq!(ctx.intern_string("inner", true, false), 0);
        assert_eq!(ctx.intern_string("second", true, false), 6);
        assert_eq!(ctx.intern_float(1.5), 0);
        ctx.end_function("Game", "second");

        let image = ctx.finish().unwrap();
        assert_eq!(image.function_strings.len(), 6 + 7);
        assert_eq!(image.function_string(0), Some("inner"));
        assert_eq!(image.function_string(6), Some("second"));
        assert_eq!(image.function_floats, vec![1.5]);
        assert!(image.global_strings.is_empty());
    }

    #[test]
    fn test_begin_unit_resets_everything() {
        let (mut ctx, _) = context(ResolveMode::Deferred);
        ctx.intern_string("a", true, false);
        ctx.intern_float(1.0);
        ctx.emit_ident(Some(&Ident::new("x", 1)));
        ctx.assign_var("v", TypeClass::UInt, false, 1).unwrap();

        ctx.begin_unit(Some("next.cs"));
        assert_eq!(ctx.strings().total_len(), 0);
        assert_eq!(ctx.floats().count(), 0);
        assert!(ctx.idents().is_empty());
        assert!(ctx.vars().is_empty());
        assert_eq!(ctx.stream().tell(), 0);
        assert_eq!(ctx.diagnostics().current_file(), Some("next.cs"));
    }

    #[test]
    fn test_eval_scope_survives_units_until_mode_switch() {
        let (mut ctx, _) = context(ResolveMode::Immediate);
        ctx.assign_var("x", TypeClass::UInt, false, 1).unwrap();
        ctx.begin_unit(None);
        assert_eq!(ctx.vars().count(), 1);

        ctx.set_mode(ResolveMode::Deferred);
        assert!(ctx.vars().is_empty());
        ctx.set_mode(ResolveMode::Immediate);
        assert!(ctx.vars().is_empty());
    }

    #[test]
    fn test_undeclared_use_through_context() {
        let (mut ctx, sink) = context(ResolveMode::Immediate);
        let reg = ctx.lookup_var("y", 3).unwrap();
        assert_eq!(ctx.lookup_var_type("y", 4).unwrap(), TypeClass::String);
        assert_eq!(reg, 0);
        assert_eq!(sink.kinds(), vec![DiagnosticKind::UndeclaredVariableUse]);
    }

    #[test]
    fn test_warnings_as_errors_option() {
        let options = CompilerOptions {
            warnings_as_errors: true,
            ..CompilerOptions::default()
        };
        let mut ctx = CompileContext::with_sink(options, Box::new(SharedSink::default()));
        assert!(matches!(
            ctx.lookup_var("y", 1),
            Err(CompileError::Escalated(_))
        ));
    }

    #[test]
    fn test_set_warnings_as_errors_keeps_options_in_step() {
        let (mut ctx, sink) = context(ResolveMode::Immediate);
        ctx.set_warnings_as_errors(true);
        assert!(ctx.options().warnings_as_errors);
        assert!(ctx.diagnostics().warnings_as_errors());
        assert!(ctx.lookup_var("y", 1).is_err());

        ctx.set_warnings_as_errors(false);
        assert!(!ctx.options().warnings_as_errors);
        assert!(ctx.lookup_var("z", 2).is_ok());
        assert_eq!(sink.kinds().len(), 2);
    }

    #[test]
    fn test_precompile_ident() {
        let (mut ctx, _) = context(ResolveMode::Deferred);
        ctx.precompile_ident(Some("schedule"));
        ctx.precompile_ident(None);
        assert_eq!(ctx.global_strings().len(), 1);
    }

    #[test]
    fn test_context_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CompileContext>();
    }
}
