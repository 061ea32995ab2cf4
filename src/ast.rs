//! The abstract syntax tree
//!
//! The tree is generic over an analysis [`Context`]: the parser produces an
//! [`Untyped`] tree and the semantic analyzer turns it into a [`Typed`] one
//! where every expression carries its PCL [`Type`] and every function the
//! [`FrameInfo`] record the code generator needs for static links.
//!
//! Besides analysis and emission the tree supports exactly one read-only
//! operation: a deterministic structural pretty-print, one node per line,
//! indented proportionally to its depth.

use std::fmt;
use std::io::{self, Write};

use crate::symbol_table::VarInfo;
use crate::{Span, Type};

/// How much analysis information the tree carries
pub trait Context {
    /// Attached to every expression: `()` before analysis, [`Type`] after
    type TypeInfo: Clone + fmt::Debug;
    /// Attached to every function: `()` before analysis, [`FrameInfo`] after
    type FrameInfo: Clone + fmt::Debug;
}

/// Context of a tree fresh out of the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Untyped;

/// Context of a tree that passed semantic analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Typed;

impl Context for Untyped {
    type TypeInfo = ();
    type FrameInfo = ();
}

impl Context for Typed {
    type TypeInfo = Type;
    type FrameInfo = FrameInfo;
}

/// Where a function will live, recorded during semantic analysis
///
/// `prev_scope_vars` lists the outer variables visible to the function,
/// innermost enclosing scope first, in declaration order within each scope.
/// The code generator lays frames out in exactly this order.
#[derive(Debug, Clone, Default)]
pub struct FrameInfo {
    pub nesting_level: usize,
    pub prev_scope_vars: Vec<VarInfo>,
}

pub type UntypedProgram = Program<Untyped>;
pub type TypedProgram = Program<Typed>;

#[derive(Debug, Clone)]
pub struct Program<C: Context> {
    pub name: String,
    pub body: Body<C>,
    pub span: Span,
}

/// Declarations followed by a `begin .. end` block
#[derive(Debug, Clone)]
pub struct Body<C: Context> {
    pub locals: Vec<Local<C>>,
    pub block: Stmt<C>,
}

#[derive(Debug, Clone)]
pub enum Local<C: Context> {
    Vars(Vec<VarNames>),
    Labels { names: Vec<String>, span: Span },
    Fun(Function<C>),
}

/// Names declared with one shared type, e.g. `i, j : integer`
#[derive(Debug, Clone)]
pub struct VarNames {
    pub names: Vec<String>,
    pub typ: Type,
    pub span: Span,
}

/// A formal parameter group; `by_reference` corresponds to a `var` prefix
#[derive(Debug, Clone)]
pub struct Formal {
    pub by_reference: bool,
    pub names: Vec<String>,
    pub typ: Type,
    pub span: Span,
}

/// A function or procedure declaration
///
/// Procedures have no `return_type`. A forward declaration has no `body`;
/// the matching definition later in the same scope fills it in.
#[derive(Debug, Clone)]
pub struct Function<C: Context> {
    pub name: String,
    pub return_type: Option<Type>,
    pub formals: Vec<Formal>,
    pub body: Option<Body<C>>,
    pub span: Span,
    pub frame: C::FrameInfo,
}

impl<C: Context> Function<C> {
    pub fn is_forward(&self) -> bool {
        self.body.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Stmt<C: Context> {
    pub kind: StmtKind<C>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind<C: Context> {
    Empty,
    Block(Vec<Stmt<C>>),
    Assign {
        left: Expr<C>,
        right: Expr<C>,
    },
    Goto(String),
    Label {
        label: String,
        stmt: Box<Stmt<C>>,
    },
    If {
        cond: Expr<C>,
        then_stmt: Box<Stmt<C>>,
        else_stmt: Option<Box<Stmt<C>>>,
    },
    While {
        cond: Expr<C>,
        body: Box<Stmt<C>>,
    },
    Call(Call<C>),
    Return,
    New {
        size: Option<Expr<C>>,
        target: Expr<C>,
    },
    Dispose {
        brackets: bool,
        target: Expr<C>,
    },
}

#[derive(Debug, Clone)]
pub struct Expr<C: Context> {
    pub kind: ExprKind<C>,
    pub span: Span,
    pub typ: C::TypeInfo,
}

#[derive(Debug, Clone)]
pub enum ExprKind<C: Context> {
    Boolean(bool),
    Char(u8),
    Integer(i32),
    Real(f64),
    Str(String),
    Nil,
    Variable(String),
    /// `arr[index]`
    Index {
        array: Box<Expr<C>>,
        index: Box<Expr<C>>,
    },
    /// `ptr^`
    Deref(Box<Expr<C>>),
    /// `@lvalue`
    AddressOf(Box<Expr<C>>),
    Call(Call<C>),
    /// The implicit return-value variable of the enclosing function
    Result,
    Binary {
        op: BinOp,
        left: Box<Expr<C>>,
        right: Box<Expr<C>>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr<C>>,
    },
}

impl Expr<Untyped> {
    pub fn new(kind: ExprKind<Untyped>, span: Span) -> Self {
        Self {
            kind,
            span,
            typ: (),
        }
    }
}

impl<C: Context> ExprKind<C> {
    /// Whether this form denotes storage
    ///
    /// String literals count: they live in a constant and may be passed to a
    /// by-reference open array of characters.
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self,
            ExprKind::Variable(_)
                | ExprKind::Index { .. }
                | ExprKind::Deref(_)
                | ExprKind::Result
                | ExprKind::Str(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct Call<C: Context> {
    pub name: String,
    pub args: Vec<Expr<C>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Plus,
    Minus,
    Not,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::IntDiv => "div",
            BinOp::Mod => "mod",
            BinOp::Eq => "=",
            BinOp::Neq => "<>",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnOp::Plus => "+",
            UnOp::Minus => "-",
            UnOp::Not => "not",
        };
        write!(f, "{s}")
    }
}

fn print_level<W: Write>(out: &mut W, level: usize) -> io::Result<()> {
    for _ in 0..level {
        write!(out, "  |")?;
    }
    write!(out, "--")
}

impl<C: Context> Program<C> {
    pub fn pretty_print<W: Write>(&self, out: &mut W) -> io::Result<()> {
        print_level(out, 0)?;
        writeln!(out, "Program(name: {}, body):", self.name)?;
        self.body.pretty_print(out, 1)
    }
}

impl<C: Context> Body<C> {
    fn pretty_print<W: Write>(&self, out: &mut W, level: usize) -> io::Result<()> {
        print_level(out, level)?;
        writeln!(out, "Body(local_decls, block):")?;
        for local in &self.locals {
            local.pretty_print(out, level + 1)?;
        }
        self.block.pretty_print(out, level + 1)
    }
}

impl<C: Context> Local<C> {
    fn pretty_print<W: Write>(&self, out: &mut W, level: usize) -> io::Result<()> {
        match self {
            Local::Vars(groups) => {
                print_level(out, level)?;
                writeln!(out, "VarDecl(var_names):")?;
                for group in groups {
                    group.pretty_print(out, level + 1)?;
                }
            }
            Local::Labels { names, .. } => {
                print_level(out, level)?;
                writeln!(out, "LabelDecl(names):")?;
                for name in names {
                    print_level(out, level + 1)?;
                    writeln!(out, "{name}")?;
                }
            }
            Local::Fun(fun) => fun.pretty_print(out, level)?,
        }
        Ok(())
    }
}

impl VarNames {
    fn pretty_print<W: Write>(&self, out: &mut W, level: usize) -> io::Result<()> {
        print_level(out, level)?;
        writeln!(out, "VarNames(type: {}, names):", self.typ)?;
        for name in &self.names {
            print_level(out, level + 1)?;
            writeln!(out, "{name}")?;
        }
        Ok(())
    }
}

impl Formal {
    fn pretty_print<W: Write>(&self, out: &mut W, level: usize) -> io::Result<()> {
        print_level(out, level)?;
        writeln!(
            out,
            "Formal(pass_by_reference: {}, names, type: {}):",
            self.by_reference, self.typ
        )?;
        for name in &self.names {
            print_level(out, level + 1)?;
            writeln!(out, "{name}")?;
        }
        Ok(())
    }
}

impl<C: Context> Function<C> {
    fn pretty_print<W: Write>(&self, out: &mut W, level: usize) -> io::Result<()> {
        print_level(out, level)?;
        write!(out, "Fun(fun_name: {}, ", self.name)?;
        if let Some(return_type) = &self.return_type {
            write!(out, "type: {return_type}, ")?;
        }
        writeln!(
            out,
            "formal_parameters, body, forward_declaration: {}):",
            self.is_forward()
        )?;
        for formal in &self.formals {
            formal.pretty_print(out, level + 1)?;
        }
        if let Some(body) = &self.body {
            body.pretty_print(out, level + 1)?;
        }
        Ok(())
    }
}

impl<C: Context> Stmt<C> {
    fn pretty_print<W: Write>(&self, out: &mut W, level: usize) -> io::Result<()> {
        match &self.kind {
            StmtKind::Empty => {
                print_level(out, level)?;
                writeln!(out, "Empty()")
            }
            StmtKind::Block(stmts) => {
                print_level(out, level)?;
                writeln!(out, "Block(stmt_list):")?;
                for stmt in stmts {
                    stmt.pretty_print(out, level + 1)?;
                }
                Ok(())
            }
            StmtKind::Assign { left, right } => {
                print_level(out, level)?;
                writeln!(out, "Assign(left, right):")?;
                left.pretty_print(out, level + 1)?;
                right.pretty_print(out, level + 1)
            }
            StmtKind::Goto(label) => {
                print_level(out, level)?;
                writeln!(out, "Goto(label: {label})")
            }
            StmtKind::Label { label, stmt } => {
                print_level(out, level)?;
                writeln!(out, "Label(label: {label}, stmt):")?;
                stmt.pretty_print(out, level + 1)
            }
            StmtKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                print_level(out, level)?;
                writeln!(out, "If(cond, if_stmt, else_stmt):")?;
                cond.pretty_print(out, level + 1)?;
                then_stmt.pretty_print(out, level + 1)?;
                if let Some(else_stmt) = else_stmt {
                    else_stmt.pretty_print(out, level + 1)?;
                }
                Ok(())
            }
            StmtKind::While { cond, body } => {
                print_level(out, level)?;
                writeln!(out, "While(cond, body):")?;
                cond.pretty_print(out, level + 1)?;
                body.pretty_print(out, level + 1)
            }
            StmtKind::Call(call) => {
                print_level(out, level)?;
                writeln!(out, "CallStmt(fun_name: {}, parameters):", call.name)?;
                for arg in &call.args {
                    arg.pretty_print(out, level + 1)?;
                }
                Ok(())
            }
            StmtKind::Return => {
                print_level(out, level)?;
                writeln!(out, "Return()")
            }
            StmtKind::New { size, target } => {
                print_level(out, level)?;
                writeln!(out, "New(size, l_value):")?;
                if let Some(size) = size {
                    size.pretty_print(out, level + 1)?;
                }
                target.pretty_print(out, level + 1)
            }
            StmtKind::Dispose { brackets, target } => {
                print_level(out, level)?;
                writeln!(out, "Dispose(has_brackets: {brackets}, l_value):")?;
                target.pretty_print(out, level + 1)
            }
        }
    }
}

impl<C: Context> Expr<C> {
    fn pretty_print<W: Write>(&self, out: &mut W, level: usize) -> io::Result<()> {
        print_level(out, level)?;
        match &self.kind {
            ExprKind::Boolean(val) => writeln!(out, "Boolean({val})"),
            ExprKind::Char(val) => writeln!(out, "Char({})", *val as char),
            ExprKind::Integer(val) => writeln!(out, "Integer({val})"),
            ExprKind::Real(val) => writeln!(out, "Real({val})"),
            ExprKind::Str(val) => writeln!(out, "String({val})"),
            ExprKind::Nil => writeln!(out, "Nil()"),
            ExprKind::Variable(name) => writeln!(out, "Variable(name: {name})"),
            ExprKind::Index { array, index } => {
                writeln!(out, "Array(arr, index):")?;
                array.pretty_print(out, level + 1)?;
                index.pretty_print(out, level + 1)
            }
            ExprKind::Deref(ptr) => {
                writeln!(out, "Deref(ptr):")?;
                ptr.pretty_print(out, level + 1)
            }
            ExprKind::AddressOf(var) => {
                writeln!(out, "AddressOf(var):")?;
                var.pretty_print(out, level + 1)
            }
            ExprKind::Call(call) => {
                writeln!(out, "CallExpr(fun_name: {}, parameters):", call.name)?;
                for arg in &call.args {
                    arg.pretty_print(out, level + 1)?;
                }
                Ok(())
            }
            ExprKind::Result => writeln!(out, "Result()"),
            ExprKind::Binary { op, left, right } => {
                writeln!(out, "BinaryExpr(op: {op}, left, right):")?;
                left.pretty_print(out, level + 1)?;
                right.pretty_print(out, level + 1)
            }
            ExprKind::Unary { op, operand } => {
                writeln!(out, "UnaryExpr(op: {op}, operand):")?;
                operand.pretty_print(out, level + 1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(kind: ExprKind<Untyped>) -> Expr<Untyped> {
        Expr {
            kind,
            span: Span::marker(0),
            typ: (),
        }
    }

    #[test]
    fn pretty_print_is_indented_per_depth() {
        let program = Program {
            name: String::from("p"),
            body: Body {
                locals: vec![Local::Vars(vec![VarNames {
                    names: vec![String::from("x")],
                    typ: Type::Integer,
                    span: Span::marker(0),
                }])],
                block: Stmt {
                    kind: StmtKind::Block(vec![Stmt {
                        kind: StmtKind::Assign {
                            left: expr(ExprKind::Variable(String::from("x"))),
                            right: expr(ExprKind::Integer(1)),
                        },
                        span: Span::marker(0),
                    }]),
                    span: Span::marker(0),
                },
            },
            span: Span::marker(0),
        };

        let mut out = Vec::new();
        program.pretty_print(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let expected = "\
--Program(name: p, body):
  |--Body(local_decls, block):
  |  |--VarDecl(var_names):
  |  |  |--VarNames(type: Integer, names):
  |  |  |  |--x
  |  |--Block(stmt_list):
  |  |  |--Assign(left, right):
  |  |  |  |--Variable(name: x)
  |  |  |  |--Integer(1)
";
        assert_eq!(text, expected);
    }
}
