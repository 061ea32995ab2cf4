//! The code-generation symbol table
//!
//! The emitter's counterpart of the front-end scope stack: the same shape,
//! but names map to backend handles instead of types. Variables map to
//! [`Storage`] (an address plus the type stored there, since pointers are
//! opaque), labels map to basic blocks and functions to [`FunctionDef`]
//! records. Library functions live in a separate map below the stack, like
//! the runtime itself lives below the program.

use std::collections::HashMap;

use inkwell::basic_block::BasicBlock;
use inkwell::types::BasicTypeEnum;
use inkwell::values::{FunctionValue, PointerValue};

use crate::symbol_table::VarInfo;
use crate::Type;

/// Address of a value together with the type stored at that address
#[derive(Debug, Clone, Copy)]
pub struct Storage<'ctx> {
    pub ptr: PointerValue<'ctx>,
    pub pointee: BasicTypeEnum<'ctx>,
}

/// Everything the emitter needs to know about a declared function
#[derive(Debug, Clone)]
pub struct FunctionDef<'ctx> {
    pub function: FunctionValue<'ctx>,
    pub return_type: Option<Type>,
    /// Flat parameter list as (pass-by-reference, type) pairs
    pub parameters: Vec<(bool, Type)>,
    /// Outer variables the function expects in its frame chain
    pub prev_scope_vars: Vec<VarInfo>,
    pub nesting_level: usize,
    pub is_library: bool,
}

#[derive(Debug, Default)]
struct Scope<'ctx> {
    vars: HashMap<String, Storage<'ctx>>,
    labels: HashMap<String, BasicBlock<'ctx>>,
    functions: HashMap<String, FunctionDef<'ctx>>,
    /// The incoming static link of the function that opened this scope
    frame: Option<PointerValue<'ctx>>,
    /// The slot `result` and `return` read from, if the function has one
    result: Option<Storage<'ctx>>,
}

/// The emitter's scope stack; depth mirrors the lexical nesting level
#[derive(Debug, Default)]
pub struct CodegenTable<'ctx> {
    scopes: Vec<Scope<'ctx>>,
    library: HashMap<String, FunctionDef<'ctx>>,
}

impl<'ctx> CodegenTable<'ctx> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nesting_level(&self) -> usize {
        self.scopes.len()
    }

    pub fn open_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn close_scope(&mut self) {
        self.scopes.pop();
    }

    fn current(&mut self) -> &mut Scope<'ctx> {
        self.scopes.last_mut().expect("no open scope")
    }

    pub fn set_frame(&mut self, frame: PointerValue<'ctx>) {
        self.current().frame = Some(frame);
    }

    /// The current function's incoming static link
    pub fn frame(&self) -> Option<PointerValue<'ctx>> {
        self.scopes.last().and_then(|s| s.frame)
    }

    pub fn set_result(&mut self, result: Storage<'ctx>) {
        self.current().result = Some(result);
    }

    /// The current function's result slot, absent in procedures
    pub fn result(&self) -> Option<Storage<'ctx>> {
        self.scopes.last().and_then(|s| s.result)
    }

    pub fn insert_var(&mut self, name: &str, storage: Storage<'ctx>) {
        self.current().vars.insert(name.to_string(), storage);
    }

    /// Whether the current scope already holds a handle for `name`
    ///
    /// The frame walk uses this to skip outer variables that are shadowed by
    /// a formal parameter or an earlier (inner) frame slot.
    pub fn current_scope_has_var(&self, name: &str) -> bool {
        self.scopes
            .last()
            .is_some_and(|s| s.vars.contains_key(name))
    }

    /// Innermost handle for `name`
    pub fn lookup_var(&self, name: &str) -> Option<Storage<'ctx>> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.vars.get(name).copied())
    }

    pub fn insert_label(&mut self, name: &str, block: BasicBlock<'ctx>) {
        self.current().labels.insert(name.to_string(), block);
    }

    /// Labels are only meaningful within the function that declared them
    pub fn lookup_label(&self, name: &str) -> Option<BasicBlock<'ctx>> {
        self.scopes.last().and_then(|s| s.labels.get(name).copied())
    }

    pub fn insert_fun(&mut self, name: &str, def: FunctionDef<'ctx>) {
        self.current().functions.insert(name.to_string(), def);
    }

    pub fn insert_library_fun(&mut self, name: &str, def: FunctionDef<'ctx>) {
        self.library.insert(name.to_string(), def);
    }

    pub fn lookup_fun(&self, name: &str) -> Option<FunctionDef<'ctx>> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.functions.get(name).cloned())
            .or_else(|| self.library.get(name).cloned())
    }

    pub fn current_scope_lookup_fun(&self, name: &str) -> Option<FunctionDef<'ctx>> {
        self.scopes
            .last()
            .and_then(|s| s.functions.get(name).cloned())
    }

    /// Fill in the nesting record once the defining declaration is seen
    ///
    /// A forward declaration registers the function with an empty record;
    /// the body of that function carries the real one.
    pub fn set_fun_frame(
        &mut self,
        name: &str,
        nesting_level: usize,
        prev_scope_vars: Vec<VarInfo>,
    ) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(def) = scope.functions.get_mut(name) {
                def.nesting_level = nesting_level;
                def.prev_scope_vars = prev_scope_vars;
                return;
            }
        }
    }

    /// The name under which a backend function was registered
    ///
    /// The frame-building logic uses this to find the caller's own record
    /// when emitting a call between functions of the same depth.
    pub fn reverse_lookup_fun(&self, function: FunctionValue<'ctx>) -> Option<String> {
        self.scopes.iter().rev().find_map(|scope| {
            scope
                .functions
                .iter()
                .find(|(_, def)| def.function == function)
                .map(|(name, _)| name.clone())
        })
    }
}
