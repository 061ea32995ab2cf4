//! Semantic analysis
//!
//! A single post-order pass over the tree that resolves every name against
//! the scope stack, checks every contextual rule of the language and
//! produces the typed tree the code generator consumes. Analysis also
//! records, on every function, the nesting level it will occupy and the
//! outer variables visible to it; the backend builds static links from
//! exactly that record.
//!
//! The first violation aborts the pass. The main interface is [`analyze`].

use miette::Diagnostic;
use thiserror::Error;

use crate::ast::{
    BinOp, Body, Call, Expr, ExprKind, Formal, FrameInfo, Function, Local, Program, Stmt,
    StmtKind, Typed, UnOp, Untyped, UntypedProgram, TypedProgram, VarNames,
};
use crate::builtin;
use crate::symbol_table::{Entry, FunctionEntry, SymbolTable, VariableEntry};
use crate::{compatible, same_type, Span, Type};

#[derive(Debug, Error, Diagnostic)]
pub enum SemanticError {
    #[error("Identifier {name} hasn't been declared")]
    UndeclaredIdentifier {
        name: String,
        #[label("unknown name")]
        span: Span,
    },

    #[error("Name \"{name}\" has already been declared and is not a variable")]
    NotAVariable {
        name: String,
        #[label("here")]
        span: Span,
    },

    #[error("Variable is not of array type")]
    NotAnArray {
        #[label("indexed here")]
        span: Span,
    },

    #[error("Array index is not of integer type")]
    IndexNotInteger {
        #[label("this index")]
        span: Span,
    },

    #[error("Variable is not of pointer type")]
    NotAPointer {
        #[label("dereferenced here")]
        span: Span,
    },

    #[error("Cannot dereference nil")]
    DerefNil {
        #[label("here")]
        span: Span,
    },

    #[error("Address of operator requires an l-value")]
    AddressOfNotLvalue {
        #[label("this operand")]
        span: Span,
    },

    #[error("Name of function {name} not found")]
    UnknownFunction {
        name: String,
        #[label("this call")]
        span: Span,
    },

    #[error("Name \"{name}\" has already been used and is not a function")]
    NotAFunction {
        name: String,
        #[label("this call")]
        span: Span,
    },

    #[error("Not enough arguments provided for the call of function \"{name}\"")]
    NotEnoughArguments {
        name: String,
        #[label("this call")]
        span: Span,
    },

    #[error("Too many arguments provided for the call of function \"{name}\"")]
    TooManyArguments {
        name: String,
        #[label("this call")]
        span: Span,
    },

    #[error("Pass by reference requires an l-value")]
    ByReferenceNotLvalue {
        #[label("this argument")]
        span: Span,
    },

    #[error("Arrays cannot be passed by value")]
    ArrayPassedByValue {
        #[label("this argument")]
        span: Span,
    },

    #[error("Type of argument in function call does not match function definition")]
    ArgumentTypeMismatch {
        #[label("this argument")]
        span: Span,
    },

    #[error("Procedure \"{name}\" does not return a value")]
    CallHasNoValue {
        name: String,
        #[label("used as an expression here")]
        span: Span,
    },

    #[error("\"result\" variable not used within the body of a function that returns a result")]
    ResultOutsideFunction {
        #[label("here")]
        span: Span,
    },

    #[error("{op} operands need to be either of real or integer type")]
    ArithmeticOperands {
        op: BinOp,
        #[label("in this expression")]
        span: Span,
    },

    #[error("{op} operands need to be of integer type")]
    IntegerOperands {
        op: BinOp,
        #[label("in this expression")]
        span: Span,
    },

    #[error("{op} needs either arithmetic types or variables of the same type but not arrays")]
    EqualityOperands {
        op: BinOp,
        #[label("in this expression")]
        span: Span,
    },

    #[error("{op} needs arithmetic types")]
    ComparisonOperands {
        op: BinOp,
        #[label("in this expression")]
        span: Span,
    },

    #[error("{op} operands need to be of boolean type")]
    BooleanOperands {
        op: BinOp,
        #[label("in this expression")]
        span: Span,
    },

    #[error("{op} operand needs to be integer or real")]
    UnaryArithmeticOperand {
        op: UnOp,
        #[label("in this expression")]
        span: Span,
    },

    #[error("not operand needs to be boolean")]
    UnaryBooleanOperand {
        #[label("in this expression")]
        span: Span,
    },

    #[error("Variable name {name} has already been declared")]
    DuplicateVariable {
        name: String,
        #[label("in this declaration")]
        span: Span,
    },

    #[error("Label {name} has already been declared")]
    DuplicateLabel {
        name: String,
        #[label("in this declaration")]
        span: Span,
    },

    #[error("Label \"{name}\" hasn't been declared")]
    UndeclaredLabel {
        name: String,
        #[label("here")]
        span: Span,
    },

    #[error("Arrays cannot be assigned to directly")]
    AssignToArray {
        #[label("this assignment")]
        span: Span,
    },

    #[error("Value cannot be assigned due to type mismatch")]
    AssignTypeMismatch {
        #[label("this assignment")]
        span: Span,
    },

    #[error("Condition of {statement} statement is not a boolean expression")]
    ConditionNotBoolean {
        statement: &'static str,
        #[label("this condition")]
        span: Span,
    },

    #[error("{name} has already been declared and is not a function")]
    DeclaredNotAFunction {
        name: String,
        #[label("this declaration")]
        span: Span,
    },

    #[error("Redeclaration of function is not permitted")]
    FunctionRedeclaration {
        name: String,
        #[label("this declaration")]
        span: Span,
    },

    #[error("Body of function {name} does not match its forward declaration")]
    #[diagnostic(help("The parameter list and the return type must be identical"))]
    ForwardSignatureMismatch {
        name: String,
        #[label("this declaration")]
        span: Span,
    },

    #[error("New requires an l value of pointer type")]
    NewNotPointer {
        #[label("here")]
        span: Span,
    },

    #[error("New with a size argument requires a pointer to array type")]
    NewSizeOnCompleteType {
        #[label("here")]
        span: Span,
    },

    #[error("Expression within brackets needs to be of integer type")]
    NewSizeNotInteger {
        #[label("this size")]
        span: Span,
    },

    #[error("New without a size argument requires a complete type")]
    NewIncompleteType {
        #[label("here")]
        span: Span,
    },

    #[error("Dispose requires an l value of pointer type")]
    DisposeNotPointer {
        #[label("here")]
        span: Span,
    },

    #[error("Dispose with brackets requires a pointer to array type")]
    DisposeBracketsOnCompleteType {
        #[label("here")]
        span: Span,
    },

    #[error("Dispose without brackets requires a complete type")]
    DisposeIncompleteType {
        #[label("here")]
        span: Span,
    },
}

impl SemanticError {
    /// The position the error points at
    pub fn span(&self) -> Span {
        use SemanticError::*;
        match self {
            UndeclaredIdentifier { span, .. }
            | NotAVariable { span, .. }
            | NotAnArray { span }
            | IndexNotInteger { span }
            | NotAPointer { span }
            | DerefNil { span }
            | AddressOfNotLvalue { span }
            | UnknownFunction { span, .. }
            | NotAFunction { span, .. }
            | NotEnoughArguments { span, .. }
            | TooManyArguments { span, .. }
            | ByReferenceNotLvalue { span }
            | ArrayPassedByValue { span }
            | ArgumentTypeMismatch { span }
            | CallHasNoValue { span, .. }
            | ResultOutsideFunction { span }
            | ArithmeticOperands { span, .. }
            | IntegerOperands { span, .. }
            | EqualityOperands { span, .. }
            | ComparisonOperands { span, .. }
            | BooleanOperands { span, .. }
            | UnaryArithmeticOperand { span, .. }
            | UnaryBooleanOperand { span }
            | DuplicateVariable { span, .. }
            | DuplicateLabel { span, .. }
            | UndeclaredLabel { span, .. }
            | AssignToArray { span }
            | AssignTypeMismatch { span }
            | ConditionNotBoolean { span, .. }
            | DeclaredNotAFunction { span, .. }
            | FunctionRedeclaration { span, .. }
            | ForwardSignatureMismatch { span, .. }
            | NewNotPointer { span }
            | NewSizeOnCompleteType { span }
            | NewSizeNotInteger { span }
            | NewIncompleteType { span }
            | DisposeNotPointer { span }
            | DisposeBracketsOnCompleteType { span }
            | DisposeIncompleteType { span } => *span,
        }
    }
}

type Result<T> = std::result::Result<T, SemanticError>;

/// Analyze a program, turning the untyped tree into a typed one
pub fn analyze(program: UntypedProgram) -> Result<TypedProgram> {
    let mut analyzer = Analyzer {
        table: SymbolTable::new(),
    };

    analyzer.table.open_scope(None);
    analyzer.seed_library();

    let body = analyzer.analyze_body(program.body)?;

    analyzer.table.close_scope();
    debug_assert_eq!(analyzer.table.nesting_level(), 0);

    Ok(Program {
        name: program.name,
        body,
        span: program.span,
    })
}

struct Analyzer {
    table: SymbolTable,
}

impl Analyzer {
    /// Make the runtime library visible in the outermost scope
    fn seed_library(&mut self) {
        for lib in builtin::library_functions() {
            let entry = FunctionEntry {
                is_forward: false,
                return_type: lib.return_type.clone(),
                parameters: lib
                    .parameters
                    .iter()
                    .map(|(by_ref, typ)| (*by_ref, VariableEntry { typ: typ.clone() }))
                    .collect(),
            };
            self.table.insert_name(lib.name, Entry::Function(entry));
        }
    }

    fn analyze_body(&mut self, body: Body<Untyped>) -> Result<Body<Typed>> {
        let mut locals = Vec::with_capacity(body.locals.len());
        for local in body.locals {
            locals.push(self.analyze_local(local)?);
        }

        let block = self.analyze_stmt(body.block)?;

        Ok(Body { locals, block })
    }

    fn analyze_local(&mut self, local: Local<Untyped>) -> Result<Local<Typed>> {
        match local {
            Local::Vars(groups) => {
                for group in &groups {
                    self.declare_variables(group)?;
                }
                Ok(Local::Vars(groups))
            }
            Local::Labels { names, span } => {
                for name in &names {
                    if !self.table.add_label(name) {
                        return Err(SemanticError::DuplicateLabel {
                            name: name.clone(),
                            span,
                        });
                    }
                }
                Ok(Local::Labels { names, span })
            }
            Local::Fun(fun) => Ok(Local::Fun(self.analyze_function(fun)?)),
        }
    }

    fn declare_variables(&mut self, group: &VarNames) -> Result<()> {
        for name in &group.names {
            let entry = Entry::Variable(VariableEntry {
                typ: group.typ.clone(),
            });
            if !self.table.insert_name(name, entry) {
                return Err(SemanticError::DuplicateVariable {
                    name: name.clone(),
                    span: group.span,
                });
            }
        }
        Ok(())
    }

    fn analyze_function(&mut self, fun: Function<Untyped>) -> Result<Function<Typed>> {
        let entry = FunctionEntry {
            is_forward: fun.is_forward(),
            return_type: fun.return_type.clone(),
            parameters: fun
                .formals
                .iter()
                .flat_map(|formal| {
                    formal.names.iter().map(|_| {
                        (
                            formal.by_reference,
                            VariableEntry {
                                typ: formal.typ.clone(),
                            },
                        )
                    })
                })
                .collect(),
        };

        // a second declaration is only allowed as the body of a forward one
        match self.table.current_scope_lookup(&fun.name) {
            None => {
                self.table
                    .insert_name(&fun.name, Entry::Function(entry));
            }
            Some(Entry::Variable(_)) => {
                return Err(SemanticError::DeclaredNotAFunction {
                    name: fun.name,
                    span: fun.span,
                });
            }
            Some(Entry::Function(prior)) => {
                if fun.is_forward() || !prior.is_forward {
                    return Err(SemanticError::FunctionRedeclaration {
                        name: fun.name,
                        span: fun.span,
                    });
                }
                if prior.return_type != entry.return_type
                    || prior.parameters != entry.parameters
                {
                    return Err(SemanticError::ForwardSignatureMismatch {
                        name: fun.name,
                        span: fun.span,
                    });
                }
                self.table.replace_name(&fun.name, Entry::Function(entry));
            }
        }

        let Some(body) = fun.body else {
            return Ok(Function {
                name: fun.name,
                return_type: fun.return_type,
                formals: fun.formals,
                body: None,
                span: fun.span,
                frame: FrameInfo::default(),
            });
        };

        // snapshot what the function may see before entering its own scope
        let prev_scope_vars = self.table.prev_scope_vars();

        self.table.open_scope(fun.return_type.clone());
        let nesting_level = self.table.nesting_level();

        for formal in &fun.formals {
            self.declare_formals(formal)?;
        }

        let body = self.analyze_body(body)?;

        self.table.close_scope();

        Ok(Function {
            name: fun.name,
            return_type: fun.return_type,
            formals: fun.formals,
            body: Some(body),
            span: fun.span,
            frame: FrameInfo {
                nesting_level,
                prev_scope_vars,
            },
        })
    }

    fn declare_formals(&mut self, formal: &Formal) -> Result<()> {
        for name in &formal.names {
            let entry = Entry::Variable(VariableEntry {
                typ: formal.typ.clone(),
            });
            if !self.table.insert_name(name, entry) {
                return Err(SemanticError::DuplicateVariable {
                    name: name.clone(),
                    span: formal.span,
                });
            }
        }
        Ok(())
    }

    fn analyze_stmt(&mut self, stmt: Stmt<Untyped>) -> Result<Stmt<Typed>> {
        let span = stmt.span;
        let kind = match stmt.kind {
            StmtKind::Empty => StmtKind::Empty,

            StmtKind::Block(stmts) => {
                let mut analyzed = Vec::with_capacity(stmts.len());
                for stmt in stmts {
                    analyzed.push(self.analyze_stmt(stmt)?);
                }
                StmtKind::Block(analyzed)
            }

            StmtKind::Assign { left, right } => {
                // right before left
                let mut right = self.analyze_expr(right)?;
                let mut left = self.analyze_expr(left)?;

                if left.typ.is_array() || right.typ.is_array() {
                    return Err(SemanticError::AssignToArray { span });
                }
                if !compatible(&mut left.typ, &mut right.typ) {
                    return Err(SemanticError::AssignTypeMismatch { span });
                }

                StmtKind::Assign { left, right }
            }

            StmtKind::Goto(label) => {
                if !self.table.has_label(&label) {
                    return Err(SemanticError::UndeclaredLabel { name: label, span });
                }
                StmtKind::Goto(label)
            }

            StmtKind::Label { label, stmt } => {
                if !self.table.has_label(&label) {
                    return Err(SemanticError::UndeclaredLabel { name: label, span });
                }
                let stmt = Box::new(self.analyze_stmt(*stmt)?);
                StmtKind::Label { label, stmt }
            }

            StmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                let cond = self.analyze_expr(cond)?;
                if cond.typ != Type::Boolean {
                    return Err(SemanticError::ConditionNotBoolean {
                        statement: "if",
                        span: cond.span,
                    });
                }

                let then_stmt = Box::new(self.analyze_stmt(*then_stmt)?);
                let else_stmt = match else_stmt {
                    Some(stmt) => Some(Box::new(self.analyze_stmt(*stmt)?)),
                    None => None,
                };

                StmtKind::If {
                    cond,
                    then_stmt,
                    else_stmt,
                }
            }

            StmtKind::While { cond, body } => {
                let cond = self.analyze_expr(cond)?;
                if cond.typ != Type::Boolean {
                    return Err(SemanticError::ConditionNotBoolean {
                        statement: "while",
                        span: cond.span,
                    });
                }

                let body = Box::new(self.analyze_stmt(*body)?);
                StmtKind::While { cond, body }
            }

            StmtKind::Call(call) => {
                let (call, _) = self.analyze_call(call, span)?;
                StmtKind::Call(call)
            }

            StmtKind::Return => StmtKind::Return,

            StmtKind::New { size, target } => {
                let size = match size {
                    Some(size) => Some(self.analyze_expr(size)?),
                    None => None,
                };
                let target = self.analyze_expr(target)?;

                let Type::Pointer { target: pointee } = &target.typ else {
                    return Err(SemanticError::NewNotPointer { span });
                };
                let Some(pointee) = pointee else {
                    return Err(SemanticError::NewNotPointer { span });
                };

                match &size {
                    Some(size) => {
                        if !matches!(**pointee, Type::IArray { .. }) {
                            return Err(SemanticError::NewSizeOnCompleteType { span });
                        }
                        if size.typ != Type::Integer {
                            return Err(SemanticError::NewSizeNotInteger { span: size.span });
                        }
                    }
                    None => {
                        if !pointee.is_complete() {
                            return Err(SemanticError::NewIncompleteType { span });
                        }
                    }
                }

                StmtKind::New { size, target }
            }

            StmtKind::Dispose { brackets, target } => {
                let target = self.analyze_expr(target)?;

                let Type::Pointer { target: pointee } = &target.typ else {
                    return Err(SemanticError::DisposeNotPointer { span });
                };
                let Some(pointee) = pointee else {
                    return Err(SemanticError::DisposeNotPointer { span });
                };

                if brackets {
                    if !matches!(**pointee, Type::IArray { .. }) {
                        return Err(SemanticError::DisposeBracketsOnCompleteType { span });
                    }
                } else if !pointee.is_complete() {
                    return Err(SemanticError::DisposeIncompleteType { span });
                }

                StmtKind::Dispose { brackets, target }
            }
        };

        Ok(Stmt { kind, span })
    }

    fn analyze_expr(&mut self, expr: Expr<Untyped>) -> Result<Expr<Typed>> {
        let span = expr.span;
        let (kind, typ) = match expr.kind {
            ExprKind::Boolean(val) => (ExprKind::Boolean(val), Type::Boolean),
            ExprKind::Char(val) => (ExprKind::Char(val), Type::Char),
            ExprKind::Integer(val) => (ExprKind::Integer(val), Type::Integer),
            ExprKind::Real(val) => (ExprKind::Real(val), Type::Real),
            ExprKind::Nil => (ExprKind::Nil, Type::nil()),

            ExprKind::Str(val) => {
                let typ = Type::array(val.len(), Type::Char);
                (ExprKind::Str(val), typ)
            }

            ExprKind::Variable(name) => match self.table.lookup(&name) {
                Some(Entry::Variable(entry)) => (ExprKind::Variable(name), entry.typ),
                Some(Entry::Function(_)) => {
                    return Err(SemanticError::NotAVariable { name, span });
                }
                None => {
                    return Err(SemanticError::UndeclaredIdentifier { name, span });
                }
            },

            ExprKind::Index { array, index } => {
                let array = self.analyze_expr(*array)?;
                let elem = match &array.typ {
                    Type::Array { elem, .. } | Type::IArray { elem } => (**elem).clone(),
                    _ => return Err(SemanticError::NotAnArray { span }),
                };

                let index = self.analyze_expr(*index)?;
                if index.typ != Type::Integer {
                    return Err(SemanticError::IndexNotInteger { span: index.span });
                }

                (
                    ExprKind::Index {
                        array: Box::new(array),
                        index: Box::new(index),
                    },
                    elem,
                )
            }

            ExprKind::Deref(ptr) => {
                let ptr = self.analyze_expr(*ptr)?;
                let pointee = match &ptr.typ {
                    Type::Pointer { target: Some(t) } => (**t).clone(),
                    Type::Pointer { target: None } => {
                        return Err(SemanticError::DerefNil { span });
                    }
                    _ => return Err(SemanticError::NotAPointer { span }),
                };
                (ExprKind::Deref(Box::new(ptr)), pointee)
            }

            ExprKind::AddressOf(var) => {
                if !var.kind.is_lvalue() {
                    return Err(SemanticError::AddressOfNotLvalue { span: var.span });
                }
                let var = self.analyze_expr(*var)?;
                let typ = Type::pointer(var.typ.clone());
                (ExprKind::AddressOf(Box::new(var)), typ)
            }

            ExprKind::Call(call) => {
                let name = call.name.clone();
                let (call, return_type) = self.analyze_call(call, span)?;
                let Some(typ) = return_type else {
                    return Err(SemanticError::CallHasNoValue { name, span });
                };
                (ExprKind::Call(call), typ)
            }

            ExprKind::Result => match self.table.result_type() {
                Some(typ) => (ExprKind::Result, typ),
                None => return Err(SemanticError::ResultOutsideFunction { span }),
            },

            ExprKind::Binary { op, left, right } => {
                let mut left = self.analyze_expr(*left)?;
                let mut right = self.analyze_expr(*right)?;

                let typ = match op {
                    BinOp::Add | BinOp::Sub | BinOp::Mul => {
                        if !left.typ.is_arithmetic() || !right.typ.is_arithmetic() {
                            return Err(SemanticError::ArithmeticOperands { op, span });
                        }
                        if left.typ == Type::Real || right.typ == Type::Real {
                            Type::Real
                        } else {
                            Type::Integer
                        }
                    }

                    BinOp::Div => {
                        if !left.typ.is_arithmetic() || !right.typ.is_arithmetic() {
                            return Err(SemanticError::ArithmeticOperands { op, span });
                        }
                        Type::Real
                    }

                    BinOp::IntDiv | BinOp::Mod => {
                        if left.typ != Type::Integer || right.typ != Type::Integer {
                            return Err(SemanticError::IntegerOperands { op, span });
                        }
                        Type::Integer
                    }

                    BinOp::Eq | BinOp::Neq => {
                        let arithmetic =
                            left.typ.is_arithmetic() && right.typ.is_arithmetic();
                        let array = left.typ.is_array() || right.typ.is_array();

                        if !arithmetic
                            && (array || !same_type(&mut left.typ, &mut right.typ))
                        {
                            return Err(SemanticError::EqualityOperands { op, span });
                        }
                        Type::Boolean
                    }

                    BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                        if !left.typ.is_arithmetic() || !right.typ.is_arithmetic() {
                            return Err(SemanticError::ComparisonOperands { op, span });
                        }
                        Type::Boolean
                    }

                    BinOp::And | BinOp::Or => {
                        if left.typ != Type::Boolean || right.typ != Type::Boolean {
                            return Err(SemanticError::BooleanOperands { op, span });
                        }
                        Type::Boolean
                    }
                };

                (
                    ExprKind::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    typ,
                )
            }

            ExprKind::Unary { op, operand } => {
                let operand = self.analyze_expr(*operand)?;

                let typ = match op {
                    UnOp::Plus | UnOp::Minus => {
                        if !operand.typ.is_arithmetic() {
                            return Err(SemanticError::UnaryArithmeticOperand { op, span });
                        }
                        operand.typ.clone()
                    }
                    UnOp::Not => {
                        if operand.typ != Type::Boolean {
                            return Err(SemanticError::UnaryBooleanOperand { span });
                        }
                        Type::Boolean
                    }
                };

                (
                    ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    typ,
                )
            }
        };

        Ok(Expr { kind, span, typ })
    }

    fn analyze_call(
        &mut self,
        call: Call<Untyped>,
        span: Span,
    ) -> Result<(Call<Typed>, Option<Type>)> {
        let entry = match self.table.lookup(&call.name) {
            Some(Entry::Function(entry)) => entry,
            Some(Entry::Variable(_)) => {
                return Err(SemanticError::NotAFunction {
                    name: call.name,
                    span,
                });
            }
            None => {
                return Err(SemanticError::UnknownFunction {
                    name: call.name,
                    span,
                });
            }
        };

        if call.args.len() < entry.parameters.len() {
            return Err(SemanticError::NotEnoughArguments {
                name: call.name,
                span,
            });
        }
        if call.args.len() > entry.parameters.len() {
            return Err(SemanticError::TooManyArguments {
                name: call.name,
                span,
            });
        }

        let mut args = Vec::with_capacity(call.args.len());
        for (arg, (by_reference, param)) in call.args.into_iter().zip(&entry.parameters) {
            if *by_reference && !arg.kind.is_lvalue() {
                return Err(SemanticError::ByReferenceNotLvalue { span: arg.span });
            }

            let mut arg = self.analyze_expr(arg)?;

            if (arg.typ.is_array() || param.typ.is_array()) && !by_reference {
                return Err(SemanticError::ArrayPassedByValue { span: arg.span });
            }

            // check against a copy of the parameter type; a nil argument is
            // resolved in place, the signature itself must stay untouched
            let mut param_typ = param.typ.clone();
            if !compatible(&mut param_typ, &mut arg.typ) {
                return Err(SemanticError::ArgumentTypeMismatch { span: arg.span });
            }

            args.push(arg);
        }

        Ok((
            Call {
                name: call.name,
                args,
            },
            entry.return_type,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn analyze_source(source: &str) -> Result<TypedProgram> {
        analyze(parse(source).expect("test program must parse"))
    }

    #[test]
    fn undeclared_variable() {
        let err = analyze_source("program p; begin x := 1 end.").unwrap_err();
        assert!(matches!(err, SemanticError::UndeclaredIdentifier { .. }));
    }

    #[test]
    fn duplicate_variable() {
        let err =
            analyze_source("program p; var x : integer; x : real; begin end.").unwrap_err();
        assert!(matches!(err, SemanticError::DuplicateVariable { .. }));
    }

    #[test]
    fn assignment_promotes_integer_to_real() {
        analyze_source("program p; var r : real; begin r := 2 end.").unwrap();
    }

    #[test]
    fn assignment_rejects_real_into_integer() {
        let err =
            analyze_source("program p; var i : integer; begin i := 2.5 end.").unwrap_err();
        assert!(matches!(err, SemanticError::AssignTypeMismatch { .. }));
    }

    #[test]
    fn arrays_cannot_be_assigned() {
        let err = analyze_source(
            "program p; \
             var a : array [3] of integer; b : array [3] of integer; \
             begin a := b end.",
        )
        .unwrap_err();
        assert!(matches!(err, SemanticError::AssignToArray { .. }));
    }

    #[test]
    fn goto_to_undeclared_label() {
        let err = analyze_source("program p; begin goto somewhere end.").unwrap_err();
        assert!(matches!(err, SemanticError::UndeclaredLabel { .. }));
    }

    #[test]
    fn labels_must_be_declared_before_definition() {
        analyze_source("program p; label l; begin l : writeInteger(1) end.").unwrap();

        let err = analyze_source("program p; begin l : writeInteger(1) end.").unwrap_err();
        assert!(matches!(err, SemanticError::UndeclaredLabel { .. }));
    }

    #[test]
    fn if_condition_must_be_boolean() {
        let err = analyze_source("program p; begin if 1 then writeInteger(1) end.")
            .unwrap_err();
        assert!(matches!(
            err,
            SemanticError::ConditionNotBoolean { statement: "if", .. }
        ));
    }

    #[test]
    fn result_is_rejected_in_procedures() {
        let err = analyze_source(
            "program p; procedure q; begin result := 1 end; begin q end.",
        )
        .unwrap_err();
        assert!(matches!(err, SemanticError::ResultOutsideFunction { .. }));
    }

    #[test]
    fn result_resolves_in_functions() {
        analyze_source(
            "program p; function f : integer; begin result := 41 + 1 end; \
             begin writeInteger(f()) end.",
        )
        .unwrap();
    }

    #[test]
    fn second_body_after_forward_body_is_rejected() {
        let err = analyze_source(
            "program p; \
             function f : integer; forward; \
             function f : integer; begin result := 1 end; \
             function f : integer; begin result := 2 end; \
             begin end.",
        )
        .unwrap_err();
        assert!(matches!(err, SemanticError::FunctionRedeclaration { .. }));
    }

    #[test]
    fn forward_body_signature_must_match() {
        let err = analyze_source(
            "program p; \
             function f (n : integer) : integer; forward; \
             function f (n : real) : integer; begin result := 1 end; \
             begin end.",
        )
        .unwrap_err();
        assert!(matches!(err, SemanticError::ForwardSignatureMismatch { .. }));
    }

    #[test]
    fn calls_check_arity_and_types() {
        let err = analyze_source("program p; begin writeInteger() end.").unwrap_err();
        assert!(matches!(err, SemanticError::NotEnoughArguments { .. }));

        let err = analyze_source("program p; begin writeInteger(1, 2) end.").unwrap_err();
        assert!(matches!(err, SemanticError::TooManyArguments { .. }));

        let err = analyze_source("program p; begin writeInteger(true) end.").unwrap_err();
        assert!(matches!(err, SemanticError::ArgumentTypeMismatch { .. }));
    }

    #[test]
    fn by_reference_arguments_must_be_lvalues() {
        let err = analyze_source(
            "program p; \
             procedure q (var n : integer); begin n := 0 end; \
             begin q(1 + 2) end.",
        )
        .unwrap_err();
        assert!(matches!(err, SemanticError::ByReferenceNotLvalue { .. }));
    }

    #[test]
    fn arrays_cannot_be_passed_by_value() {
        let err = analyze_source(
            "program p; \
             var a : array [2] of char; \
             procedure q (s : array of char); begin end; \
             begin q(a) end.",
        )
        .unwrap_err();
        assert!(matches!(err, SemanticError::ArrayPassedByValue { .. }));
    }

    #[test]
    fn string_literal_passes_as_open_char_array() {
        analyze_source("program p; begin writeString('hello') end.").unwrap();
    }

    #[test]
    fn nil_assignment_resolves_pointer_target() {
        analyze_source(
            "program p; var q : ^integer; begin q := nil; if q = nil then q := nil end.",
        )
        .unwrap();
    }

    #[test]
    fn new_requires_matching_shape() {
        analyze_source("program p; var q : ^integer; begin new(q) end.").unwrap();
        analyze_source(
            "program p; var q : ^array of integer; begin new[10](q) end.",
        )
        .unwrap();

        let err = analyze_source(
            "program p; var q : ^array of integer; begin new(q) end.",
        )
        .unwrap_err();
        assert!(matches!(err, SemanticError::NewIncompleteType { .. }));

        let err = analyze_source("program p; var q : ^integer; begin new[10](q) end.")
            .unwrap_err();
        assert!(matches!(err, SemanticError::NewSizeOnCompleteType { .. }));
    }

    #[test]
    fn dispose_requires_matching_shape() {
        let err = analyze_source(
            "program p; var q : ^integer; begin new(q); dispose [] (q) end.",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SemanticError::DisposeBracketsOnCompleteType { .. }
        ));
    }

    #[test]
    fn division_always_yields_real() {
        let err = analyze_source("program p; var i : integer; begin i := 4 / 2 end.")
            .unwrap_err();
        assert!(matches!(err, SemanticError::AssignTypeMismatch { .. }));
    }

    #[test]
    fn div_and_mod_require_integers() {
        let err = analyze_source(
            "program p; var r : real; begin r := 4.0 div 2 end.",
        )
        .unwrap_err();
        assert!(matches!(err, SemanticError::IntegerOperands { .. }));
    }

    #[test]
    fn nested_functions_record_their_frame() {
        let program = analyze_source(
            "program p; \
             var x : integer; \
             procedure outer; \
               var y : integer; \
               procedure inner; begin y := x end; \
             begin inner end; \
             begin outer end.",
        )
        .unwrap();

        let Local::Fun(outer) = &program.body.locals[1] else {
            panic!("expected outer");
        };
        assert_eq!(outer.frame.nesting_level, 2);
        let outer_sees: Vec<(&str, usize)> = outer
            .frame
            .prev_scope_vars
            .iter()
            .map(|v| (v.name.as_str(), v.nesting_level))
            .collect();
        assert_eq!(outer_sees, vec![("x", 1)]);

        let Local::Fun(inner) = &outer.body.as_ref().unwrap().locals[1] else {
            panic!("expected inner");
        };
        assert_eq!(inner.frame.nesting_level, 3);
        let inner_sees: Vec<(&str, usize)> = inner
            .frame
            .prev_scope_vars
            .iter()
            .map(|v| (v.name.as_str(), v.nesting_level))
            .collect();
        assert_eq!(inner_sees, vec![("y", 2), ("x", 1)]);
    }
}
