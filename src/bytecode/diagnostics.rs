//! Compiler diagnostics.
//!
//! Problems found while generating code do not unwind compilation: they are
//! reported through a [`DiagnosticSink`] and the compiler keeps producing
//! output (possibly with degraded typing or placeholder registers). The one
//! exception is warnings-as-errors mode, where [`Diagnostics::report`] turns
//! the first diagnostic into [`CompileError::Escalated`].

use std::fmt;

use crate::bytecode::compile_error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A literal folded to a number is zero and is not `true`/`false`.
    AlwaysZeroLiteral,
    /// `assign` targeted a name already marked constant.
    ConstantReassignment,
    /// A variable was read before any assignment in its scope.
    UndeclaredVariableUse,
    /// The persisted local-variable table has no slot for a name.
    UnresolvedLocalVariable,
}

impl DiagnosticKind {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::UnresolvedLocalVariable => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.file, self.line)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: Option<SourceLocation>) -> Self {
        self.location = location;
        self
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl fmt::Display for Diagnostic {
    /// Formats as `file (line): message` when a location is known.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{}: {}", loc, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Receiver for diagnostics.
pub trait DiagnosticSink: Send {
    fn report(&mut self, diagnostic: &Diagnostic);
}

/// Default sink: forwards every diagnostic to `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diagnostic: &Diagnostic) {
        match diagnostic.severity() {
            Severity::Warning => {
                tracing::warn!(target: "cinder::diagnostics", kind = ?diagnostic.kind, "{}", diagnostic)
            }
            Severity::Error => {
                tracing::error!(target: "cinder::diagnostics", kind = ?diagnostic.kind, "{}", diagnostic)
            }
        }
    }
}

/// Sink that keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, diagnostic: &Diagnostic) {
        self.diagnostics.push(diagnostic.clone());
    }
}

/// Diagnostic reporter shared by every table of a compilation context.
pub struct Diagnostics {
    sink: Box<dyn DiagnosticSink>,
    warnings_as_errors: bool,
    current_file: Option<String>,
    reported: usize,
}

impl Diagnostics {
    pub fn new(sink: Box<dyn DiagnosticSink>, warnings_as_errors: bool) -> Self {
        Self {
            sink,
            warnings_as_errors,
            current_file: None,
            reported: 0,
        }
    }

    pub fn set_warnings_as_errors(&mut self, on: bool) {
        self.warnings_as_errors = on;
    }

    pub fn warnings_as_errors(&self) -> bool {
        self.warnings_as_errors
    }

    /// File name used to locate subsequent diagnostics.
    pub fn set_current_file(&mut self, file: Option<String>) {
        self.current_file = file;
    }

    pub fn current_file(&self) -> Option<&str> {
        self.current_file.as_deref()
    }

    /// Location in the current file, if one is set.
    pub fn location(&self, line: u32) -> Option<SourceLocation> {
        self.current_file
            .as_ref()
            .map(|file| SourceLocation::new(file.clone(), line))
    }

    /// Number of diagnostics delivered so far.
    pub fn reported(&self) -> usize {
        self.reported
    }

    /// Deliver a diagnostic. Always reaches the sink; fails only in
    /// warnings-as-errors mode.
    pub fn report(&mut self, diagnostic: Diagnostic) -> Result<(), CompileError> {
        self.reported += 1;
        self.sink.report(&diagnostic);

        if self.warnings_as_errors {
            return Err(CompileError::escalated(diagnostic));
        }
        Ok(())
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(Box::new(TracingSink), false)
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("warnings_as_errors", &self.warnings_as_errors)
            .field("current_file", &self.current_file)
            .field("reported", &self.reported)
            .finish()
    }
}
