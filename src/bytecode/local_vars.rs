use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::bytecode::section::write_section;

/// Persisted slot order of one function's locals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionLocals {
    /// `namespace::function`
    pub key: String,
    pub vars: Vec<String>,
}

/// Local variable layout of every compiled function, keyed by
/// `namespace::function`.
///
/// Unlike [`FuncVars`](crate::bytecode::func_vars::FuncVars) this survives
/// from one function body to the next and is written into the compiled
/// image for debuggers and the loader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalVarTable {
    /// Folded key → locals, so output order is stable.
    functions: BTreeMap<String, FunctionLocals>,
}

impl LocalVarTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_functions(functions: Vec<FunctionLocals>) -> Self {
        let mut table = Self::new();
        for f in functions {
            table.functions.insert(f.key.to_ascii_lowercase(), f);
        }
        table
    }

    /// Append `var` to the slot list of `namespace::function`.
    pub fn record(&mut self, function: &str, namespace: &str, var: &str) {
        let key = function_key(namespace, function);
        self.functions
            .entry(key.to_ascii_lowercase())
            .or_insert_with(|| FunctionLocals {
                key,
                vars: Vec::new(),
            })
            .vars
            .push(var.to_string());
    }

    /// Slot of `var` in `namespace::function`. A miss is reported and
    /// yields `None`.
    pub fn lookup(
        &self,
        namespace: &str,
        function: &str,
        var: &str,
        diags: &mut Diagnostics,
    ) -> Result<Option<usize>, CompileError> {
        let key = function_key(namespace, function);
        let slot = self.slot(&key, var);

        if slot.is_none() {
            let msg = format!("Unable to find local variable {} in function name {}", var, key);
            diags.report(Diagnostic::new(DiagnosticKind::UnresolvedLocalVariable, msg))?;
        }
        Ok(slot)
    }

    fn slot(&self, key: &str, var: &str) -> Option<usize> {
        self.functions
            .get(&key.to_ascii_lowercase())?
            .vars
            .iter()
            .position(|v| v.eq_ignore_ascii_case(var))
    }

    /// Independent copy of the whole table.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub fn reset(&mut self) {
        self.functions.clear();
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionLocals> {
        self.functions.values()
    }

    /// Function count; per function: key, variable count, names.
    pub fn serialize(&self, sink: &mut Vec<u8>) -> Result<(), CompileError> {
        let functions: Vec<&FunctionLocals> = self.functions().collect();
        write_section("local variable table", &functions, sink)
    }
}

fn function_key(namespace: &str, function: &str) -> String {
    format!("{}::{}", namespace, function)
}
