use crate::bytecode::diagnostics::Diagnostic;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    /// A diagnostic that was promoted to a hard failure because
    /// warnings-as-errors is on
    #[error("compile error: {0}")]
    Escalated(Diagnostic),

    /// A compiled image section could not be encoded or decoded
    #[error("compile error: cannot {action} {section}: {source}")]
    Codec {
        action: &'static str,
        section: &'static str,
        #[source]
        source: postcard::Error,
    },

    /// A compiled image was produced by an incompatible writer
    #[error("compile error: unsupported image version {found} (expected {expected})")]
    ImageVersion { found: u32, expected: u32 },

    /// Internal compiler error (shouldn't happen in normal use)
    #[error("compile error: internal error: {0}")]
    Internal(String),
}

impl CompileError {
    /// Promote a diagnostic to a fatal error
    pub fn escalated(diagnostic: Diagnostic) -> Self {
        CompileError::Escalated(diagnostic)
    }

    /// Create an error for a section that failed to serialize
    pub fn encode(section: &'static str, source: postcard::Error) -> Self {
        CompileError::Codec {
            action: "encode",
            section,
            source,
        }
    }

    /// Create an error for a section that failed to deserialize
    pub fn decode(section: &'static str, source: postcard::Error) -> Self {
        CompileError::Codec {
            action: "decode",
            section,
            source,
        }
    }

    /// Create an internal compiler error
    pub fn internal(msg: impl Into<String>) -> Self {
        CompileError::Internal(msg.into())
    }
}
