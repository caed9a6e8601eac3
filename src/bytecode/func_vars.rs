use std::collections::HashMap;

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};

/// Best-effort static type of a local, used to pick typed load/store forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    /// Usage was inconsistent; always load the generic representation.
    Unconstrained,
    UInt,
    Float,
    String,
}

/// A local variable bound to a register slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Var {
    pub reg: u32,
    pub ty: TypeClass,
    pub name: String,
    pub is_constant: bool,
}

/// Name → register mapping for the function body being compiled.
///
/// Names compare ASCII-case-insensitively, matching how the host interns
/// identifiers. Registers are handed out from 0 in first-reference order
/// and never change for the lifetime of the scope.
#[derive(Debug, Clone, Default)]
pub struct FuncVars {
    vars: HashMap<String, Var>,
    /// Folded names by register.
    by_reg: Vec<String>,
}

impl FuncVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a register, creating it on first use.
    ///
    /// Re-assigning with a different type degrades the variable to
    /// [`TypeClass::Unconstrained`]. Re-assigning a constant is reported
    /// but still yields the existing register.
    pub fn assign(
        &mut self,
        name: &str,
        ty: TypeClass,
        is_constant: bool,
        line: u32,
        diags: &mut Diagnostics,
    ) -> Result<u32, CompileError> {
        let key = name.to_ascii_lowercase();

        if let Some(var) = self.vars.get_mut(&key) {
            if ty != var.ty && var.ty != TypeClass::Unconstrained {
                tracing::trace!(var = name, from = ?var.ty, to = ?ty, "type conflict, degrading");
                var.ty = TypeClass::Unconstrained;
            }

            let reg = var.reg;
            if var.is_constant {
                let msg = format!("Reassigning variable {} when it is a constant.", name);
                diags.report(
                    Diagnostic::new(DiagnosticKind::ConstantReassignment, msg)
                        .at(diags.location(line)),
                )?;
            }
            return Ok(reg);
        }

        let reg = self.by_reg.len() as u32;
        self.vars.insert(
            key.clone(),
            Var {
                reg,
                ty,
                name: name.to_string(),
                is_constant,
            },
        );
        self.by_reg.push(key);
        Ok(reg)
    }

    /// Register of `name`; unseen names are reported and declared as
    /// non-constant strings.
    pub fn lookup(&mut self, name: &str, line: u32, diags: &mut Diagnostics) -> Result<u32, CompileError> {
        Ok(self.resolve(name, line, diags)?.reg)
    }

    /// Static type of `name`, with the same fallback as [`FuncVars::lookup`].
    pub fn lookup_type(
        &mut self,
        name: &str,
        line: u32,
        diags: &mut Diagnostics,
    ) -> Result<TypeClass, CompileError> {
        Ok(self.resolve(name, line, diags)?.ty)
    }

    fn resolve(&mut self, name: &str, line: u32, diags: &mut Diagnostics) -> Result<&Var, CompileError> {
        let key = name.to_ascii_lowercase();

        if !self.vars.contains_key(&key) {
            let msg = format!("Variable {} referenced before used when compiling script.", name);
            diags.report(
                Diagnostic::new(DiagnosticKind::UndeclaredVariableUse, msg).at(diags.location(line)),
            )?;
            self.assign(name, TypeClass::String, false, line, diags)?;
        }

        self.vars
            .get(&key)
            .ok_or_else(|| CompileError::internal(format!("variable '{}' vanished after declaration", name)))
    }

    pub fn get(&self, name: &str) -> Option<&Var> {
        self.vars.get(&name.to_ascii_lowercase())
    }

    /// Variable bound to `reg`.
    pub fn by_register(&self, reg: u32) -> Option<&Var> {
        self.by_reg
            .get(reg as usize)
            .and_then(|key| self.vars.get(key))
    }

    /// Variables in register order.
    pub fn iter(&self) -> impl Iterator<Item = &Var> {
        self.by_reg.iter().filter_map(|key| self.vars.get(key))
    }

    /// Number of registers handed out.
    pub fn count(&self) -> u32 {
        self.by_reg.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.by_reg.is_empty()
    }

    pub fn clear(&mut self) {
        self.vars.clear();
        self.by_reg.clear();
    }
}
