//! The front-end symbol table
//!
//! A stack of lexical scopes used by the semantic analyzer. Scopes hold
//! variable and function entries plus the label names declared directly in
//! them, and remember the order in which variables were declared so that
//! [`SymbolTable::prev_scope_vars`] can describe what a nested function is
//! allowed to see.

use std::collections::{BTreeMap, BTreeSet};

use crate::Type;

/// Basic facts about a variable visible from an inner scope
#[derive(Debug, Clone, PartialEq)]
pub struct VarInfo {
    pub name: String,
    pub nesting_level: usize,
    pub typ: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableEntry {
    pub typ: Type,
}

/// A function or procedure signature
///
/// Each parameter pairs its pass-by-reference flag with the entry holding
/// its type. Procedures have no `return_type`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionEntry {
    pub is_forward: bool,
    pub return_type: Option<Type>,
    pub parameters: Vec<(bool, VariableEntry)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Variable(VariableEntry),
    Function(FunctionEntry),
}

#[derive(Debug, Default)]
struct Scope {
    entries: BTreeMap<String, Entry>,
    labels: BTreeSet<String>,
    /// Variable names in declaration order
    vars: Vec<String>,
    /// Return type of the function that opened this scope; `None` for
    /// procedures and the program body, where `result` does not resolve
    result_type: Option<Type>,
}

/// The scope stack; its depth is the current lexical nesting level
#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Depth of the scope stack
    pub fn nesting_level(&self) -> usize {
        self.scopes.len()
    }

    pub fn open_scope(&mut self, result_type: Option<Type>) {
        self.scopes.push(Scope {
            result_type,
            ..Scope::default()
        });
    }

    pub fn close_scope(&mut self) {
        self.scopes.pop();
    }

    /// The return type `result` refers to in the current scope, if any
    pub fn result_type(&self) -> Option<Type> {
        self.scopes.last().and_then(|s| s.result_type.clone())
    }

    /// Insert into the current scope; `false` if the name is already taken
    pub fn insert_name(&mut self, name: &str, entry: Entry) -> bool {
        let scope = self.scopes.last_mut().expect("no open scope");
        if scope.entries.contains_key(name) {
            return false;
        }
        if matches!(entry, Entry::Variable(_)) {
            scope.vars.push(name.to_string());
        }
        scope.entries.insert(name.to_string(), entry);
        true
    }

    /// Overwrite an existing entry in the current scope
    ///
    /// Used when a body arrives for a name that was forward-declared.
    pub fn replace_name(&mut self, name: &str, entry: Entry) {
        let scope = self.scopes.last_mut().expect("no open scope");
        scope.entries.insert(name.to_string(), entry);
    }

    /// Labels live in the current scope only; `false` on duplicates
    pub fn add_label(&mut self, label: &str) -> bool {
        let scope = self.scopes.last_mut().expect("no open scope");
        scope.labels.insert(label.to_string())
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.scopes
            .last()
            .is_some_and(|s| s.labels.contains(label))
    }

    /// Search all open scopes, innermost first
    pub fn lookup(&self, name: &str) -> Option<Entry> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.entries.get(name).cloned())
    }

    pub fn current_scope_lookup(&self, name: &str) -> Option<Entry> {
        self.scopes
            .last()
            .and_then(|scope| scope.entries.get(name).cloned())
    }

    /// The variables of all currently open scopes, innermost scope first,
    /// each in declaration order and tagged with the level it lives at
    ///
    /// This is the record a nested function declared right now would need to
    /// reach its outer variables.
    pub fn prev_scope_vars(&self) -> Vec<VarInfo> {
        let mut vars = Vec::new();
        for (level, scope) in self.scopes.iter().enumerate().rev() {
            for name in &scope.vars {
                let typ = match &scope.entries[name] {
                    Entry::Variable(entry) => entry.typ.clone(),
                    Entry::Function(_) => unreachable!("vars holds variables only"),
                };
                vars.push(VarInfo {
                    name: name.clone(),
                    nesting_level: level + 1,
                    typ,
                });
            }
        }
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(typ: Type) -> Entry {
        Entry::Variable(VariableEntry { typ })
    }

    #[test]
    fn insert_rejects_duplicates_in_same_scope_only() {
        let mut table = SymbolTable::new();
        table.open_scope(None);
        assert!(table.insert_name("x", var(Type::Integer)));
        assert!(!table.insert_name("x", var(Type::Real)));

        table.open_scope(None);
        assert!(table.insert_name("x", var(Type::Real)));

        // the inner declaration shadows the outer one
        match table.lookup("x") {
            Some(Entry::Variable(entry)) => assert_eq!(entry.typ, Type::Real),
            other => panic!("unexpected entry: {other:?}"),
        }

        table.close_scope();
        match table.lookup("x") {
            Some(Entry::Variable(entry)) => assert_eq!(entry.typ, Type::Integer),
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    #[test]
    fn labels_do_not_nest() {
        let mut table = SymbolTable::new();
        table.open_scope(None);
        assert!(table.add_label("out"));
        assert!(!table.add_label("out"));

        table.open_scope(None);
        assert!(!table.has_label("out"));
        assert!(table.add_label("out"));
        table.close_scope();

        assert!(table.has_label("out"));
    }

    #[test]
    fn prev_scope_vars_lists_innermost_scope_first() {
        let mut table = SymbolTable::new();
        table.open_scope(None);
        table.insert_name("a", var(Type::Integer));
        table.insert_name("b", var(Type::Real));

        table.open_scope(Some(Type::Integer));
        table.insert_name("c", var(Type::Char));

        let vars = table.prev_scope_vars();
        let summary: Vec<(&str, usize)> = vars
            .iter()
            .map(|v| (v.name.as_str(), v.nesting_level))
            .collect();
        assert_eq!(summary, vec![("c", 2), ("a", 1), ("b", 1)]);
    }

    #[test]
    fn result_type_is_per_scope() {
        let mut table = SymbolTable::new();
        table.open_scope(None);
        assert_eq!(table.result_type(), None);

        table.open_scope(Some(Type::Real));
        assert_eq!(table.result_type(), Some(Type::Real));

        // a procedure scope masks the enclosing function's result
        table.open_scope(None);
        assert_eq!(table.result_type(), None);
    }

    #[test]
    fn nesting_level_tracks_stack_depth() {
        let mut table = SymbolTable::new();
        assert_eq!(table.nesting_level(), 0);
        table.open_scope(None);
        table.open_scope(None);
        assert_eq!(table.nesting_level(), 2);
        table.close_scope();
        assert_eq!(table.nesting_level(), 1);
    }
}
