//! Parser
//!
//! This submodule generates the untyped AST from the token stream produced
//! by the [lexer](super::lexer). The [parser] parser is its main interface.

use chumsky::prelude::*;

use super::lexer::Token;
use super::ParseErr;

use crate::ast::{
    BinOp, Body, Call, Expr, ExprKind, Formal, Function, Local, Program, Stmt, StmtKind, UnOp,
    Untyped, UntypedProgram, VarNames,
};
use crate::{Span, Type};

/// Postfix operators that may follow a primary expression
#[derive(Clone)]
enum Suffix {
    Index(Expr<Untyped>),
    Deref,
}

/// Prefix operators
#[derive(Clone, Copy)]
enum Prefix {
    Op(UnOp),
    AddressOf,
}

fn fold_binary(lhs: Expr<Untyped>, rhs: (BinOp, Expr<Untyped>)) -> Expr<Untyped> {
    let (op, rhs) = rhs;
    let span = lhs.span.merge(rhs.span);
    Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(lhs),
            right: Box::new(rhs),
        },
        span,
    )
}

/// A `begin .. end` block; omitted statements between separators are empty
fn block(
    stmt: impl Parser<Token, Stmt<Untyped>, Error = ParseErr<Token>> + Clone,
) -> impl Parser<Token, Stmt<Untyped>, Error = ParseErr<Token>> + Clone {
    let item = stmt.or_not().map_with_span(|stmt, span: Span| {
        stmt.unwrap_or(Stmt {
            kind: StmtKind::Empty,
            span,
        })
    });

    just(Token::KwBegin)
        .ignore_then(item.separated_by(just(Token::Semicolon)))
        .then_ignore(just(Token::KwEnd))
        .map_with_span(|stmts, span| Stmt {
            kind: StmtKind::Block(stmts),
            span,
        })
}

pub fn parser() -> impl Parser<Token, UntypedProgram, Error = ParseErr<Token>> {
    let ident = select! { Token::Ident(ident) => ident }.labelled("identifier");

    let integer = select! { Token::Integer(digits) => digits }
        .try_map(|digits: String, span| {
            digits
                .parse::<i32>()
                .map_err(|_| Simple::custom(span, "integer literal is too large"))
        })
        .labelled("integer");

    let array_size = integer.clone();
    let typ = recursive(|typ| {
        choice((
            just(Token::KwInteger).to(Type::Integer),
            just(Token::KwReal).to(Type::Real),
            just(Token::KwBoolean).to(Type::Boolean),
            just(Token::KwChar).to(Type::Char),
            just(Token::KwArray)
                .ignore_then(
                    array_size
                        .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
                        .or_not(),
                )
                .then_ignore(just(Token::KwOf))
                .then(typ.clone())
                .map(|(size, elem)| match size {
                    Some(size) => Type::array(size as usize, elem),
                    None => Type::iarray(elem),
                }),
            just(Token::Caret).ignore_then(typ).map(Type::pointer),
        ))
        .labelled("type")
    });

    let expr = recursive(|expr| {
        let real = select! { Token::Real(digits) => digits }.try_map(|digits: String, span| {
            digits
                .parse::<f64>()
                .map(ExprKind::Real)
                .map_err(|_| Simple::custom(span, "malformed real literal"))
        });

        let literal = select! {
            Token::Bool(val) => ExprKind::Boolean(val),
            Token::Char(val) => ExprKind::Char(val),
            Token::Str(val) => ExprKind::Str(val),
            Token::KwNil => ExprKind::Nil,
            Token::KwResult => ExprKind::Result,
        }
        .or(integer.map(ExprKind::Integer))
        .or(real)
        .labelled("value");

        let args = expr
            .clone()
            .separated_by(just(Token::Comma))
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

        let call = ident
            .then(args)
            .map(|(name, args)| ExprKind::Call(Call { name, args }));

        let atom = literal
            .or(call)
            .or(ident.map(ExprKind::Variable))
            .map_with_span(Expr::new)
            .or(expr
                .clone()
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)));

        let suffix = choice((
            expr.clone()
                .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
                .map(Suffix::Index),
            just(Token::Caret).to(Suffix::Deref),
        ))
        .map_with_span(|suffix, span: Span| (suffix, span));

        let postfix = atom.then(suffix.repeated()).foldl(|inner, (suffix, span)| {
            let span = inner.span.merge(span);
            let kind = match suffix {
                Suffix::Index(index) => ExprKind::Index {
                    array: Box::new(inner),
                    index: Box::new(index),
                },
                Suffix::Deref => ExprKind::Deref(Box::new(inner)),
            };
            Expr::new(kind, span)
        });

        let prefix = choice((
            just(Token::KwNot).to(Prefix::Op(UnOp::Not)),
            just(Token::Plus).to(Prefix::Op(UnOp::Plus)),
            just(Token::Minus).to(Prefix::Op(UnOp::Minus)),
            just(Token::At).to(Prefix::AddressOf),
        ))
        .map_with_span(|prefix, span: Span| (prefix, span));

        let unary = prefix.repeated().then(postfix).foldr(|(prefix, span), operand| {
            let span = span.merge(operand.span);
            let kind = match prefix {
                Prefix::Op(op) => ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                Prefix::AddressOf => ExprKind::AddressOf(Box::new(operand)),
            };
            Expr::new(kind, span)
        });

        let product = unary
            .clone()
            .then(
                choice((
                    just(Token::Star).to(BinOp::Mul),
                    just(Token::Slash).to(BinOp::Div),
                    just(Token::KwDiv).to(BinOp::IntDiv),
                    just(Token::KwMod).to(BinOp::Mod),
                    just(Token::KwAnd).to(BinOp::And),
                ))
                .then(unary)
                .repeated(),
            )
            .foldl(fold_binary);

        let sum = product
            .clone()
            .then(
                choice((
                    just(Token::Plus).to(BinOp::Add),
                    just(Token::Minus).to(BinOp::Sub),
                    just(Token::KwOr).to(BinOp::Or),
                ))
                .then(product)
                .repeated(),
            )
            .foldl(fold_binary);

        sum.clone()
            .then(
                choice((
                    just(Token::Equals).to(BinOp::Eq),
                    just(Token::NotEquals).to(BinOp::Neq),
                    just(Token::LessEq).to(BinOp::Le),
                    just(Token::GreaterEq).to(BinOp::Ge),
                    just(Token::Less).to(BinOp::Lt),
                    just(Token::Greater).to(BinOp::Gt),
                ))
                .then(sum)
                .repeated(),
            )
            .foldl(fold_binary)
    });

    // assignment targets and allocation operands must denote storage
    let lvalue = expr.clone().try_map(|expr: Expr<Untyped>, span| {
        if expr.kind.is_lvalue() {
            Ok(expr)
        } else {
            Err(Simple::custom(span, "expected an l-value"))
        }
    });

    let call_args = expr
        .clone()
        .separated_by(just(Token::Comma))
        .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

    let stmt = recursive(|stmt| {
        let block_stmt = block(stmt.clone());

        let assignment = lvalue
            .clone()
            .then_ignore(just(Token::Assign))
            .then(expr.clone())
            .map_with_span(|(left, right), span| Stmt {
                kind: StmtKind::Assign { left, right },
                span,
            });

        let labeled = ident
            .then_ignore(just(Token::Colon))
            .then(stmt.clone())
            .map_with_span(|(label, stmt), span| Stmt {
                kind: StmtKind::Label {
                    label,
                    stmt: Box::new(stmt),
                },
                span,
            });

        let call_stmt = ident
            .then(call_args.clone())
            .map_with_span(|(name, args), span| Stmt {
                kind: StmtKind::Call(Call { name, args }),
                span,
            });

        // a bare identifier calls a parameterless procedure
        let bare_call = ident.map_with_span(|name, span| Stmt {
            kind: StmtKind::Call(Call {
                name,
                args: Vec::new(),
            }),
            span,
        });

        let if_stmt = just(Token::KwIf)
            .ignore_then(expr.clone())
            .then_ignore(just(Token::KwThen))
            .then(stmt.clone())
            .then(just(Token::KwElse).ignore_then(stmt.clone()).or_not())
            .map_with_span(|((cond, then_stmt), else_stmt), span| Stmt {
                kind: StmtKind::If {
                    cond,
                    then_stmt: Box::new(then_stmt),
                    else_stmt: else_stmt.map(Box::new),
                },
                span,
            });

        let while_stmt = just(Token::KwWhile)
            .ignore_then(expr.clone())
            .then_ignore(just(Token::KwDo))
            .then(stmt.clone())
            .map_with_span(|(cond, body), span| Stmt {
                kind: StmtKind::While {
                    cond,
                    body: Box::new(body),
                },
                span,
            });

        let goto_stmt = just(Token::KwGoto)
            .ignore_then(ident)
            .map_with_span(|label, span| Stmt {
                kind: StmtKind::Goto(label),
                span,
            });

        let return_stmt = just(Token::KwReturn).map_with_span(|_, span| Stmt {
            kind: StmtKind::Return,
            span,
        });

        let new_stmt = just(Token::KwNew)
            .ignore_then(
                expr.clone()
                    .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
                    .or_not(),
            )
            .then(lvalue.clone())
            .map_with_span(|(size, target), span| Stmt {
                kind: StmtKind::New { size, target },
                span,
            });

        let dispose_stmt = just(Token::KwDispose)
            .ignore_then(
                just(Token::BracketOpen)
                    .then(just(Token::BracketClose))
                    .or_not()
                    .map(|brackets| brackets.is_some()),
            )
            .then(lvalue.clone())
            .map_with_span(|(brackets, target), span| Stmt {
                kind: StmtKind::Dispose { brackets, target },
                span,
            });

        choice((
            block_stmt,
            if_stmt,
            while_stmt,
            goto_stmt,
            return_stmt,
            new_stmt,
            dispose_stmt,
            labeled,
            assignment,
            call_stmt,
            bare_call,
        ))
        .labelled("statement")
    });

    let var_group = ident
        .separated_by(just(Token::Comma))
        .at_least(1)
        .then_ignore(just(Token::Colon))
        .then(typ.clone())
        .then_ignore(just(Token::Semicolon))
        .map_with_span(|(names, typ), span| VarNames { names, typ, span });

    let var_decl = just(Token::KwVar)
        .ignore_then(var_group.repeated().at_least(1))
        .map(Local::Vars);

    let label_decl = just(Token::KwLabel)
        .ignore_then(ident.separated_by(just(Token::Comma)).at_least(1))
        .then_ignore(just(Token::Semicolon))
        .map_with_span(|names, span| Local::Labels { names, span });

    let formal = just(Token::KwVar)
        .or_not()
        .then(ident.separated_by(just(Token::Comma)).at_least(1))
        .then_ignore(just(Token::Colon))
        .then(typ.clone())
        .map_with_span(|((reference, names), typ), span| Formal {
            by_reference: reference.is_some(),
            names,
            typ,
            span,
        });

    let formals = formal
        .separated_by(just(Token::Semicolon))
        .delimited_by(just(Token::ParenOpen), just(Token::ParenClose))
        .or_not()
        .map(Option::unwrap_or_default);

    let header = choice((
        just(Token::KwFunction)
            .ignore_then(ident)
            .then(formals.clone())
            .then_ignore(just(Token::Colon))
            .then(typ.clone())
            .map(|((name, formals), return_type)| (name, formals, Some(return_type))),
        just(Token::KwProcedure)
            .ignore_then(ident)
            .then(formals)
            .map(|(name, formals)| (name, formals, None)),
    ));

    let body = recursive(|body| {
        let fun_decl = header
            .then_ignore(just(Token::Semicolon))
            .then(choice((
                just(Token::KwForward)
                    .then_ignore(just(Token::Semicolon))
                    .to(None),
                body.then_ignore(just(Token::Semicolon)).map(Some),
            )))
            .map_with_span(|((name, formals, return_type), body), span| {
                Local::Fun(Function {
                    name,
                    return_type,
                    formals,
                    body,
                    span,
                    frame: (),
                })
            });

        choice((var_decl, label_decl, fun_decl))
            .repeated()
            .then(block(stmt))
            .map(|(locals, block)| Body { locals, block })
    });

    just(Token::KwProgram)
        .ignore_then(ident)
        .then_ignore(just(Token::Semicolon))
        .then(body)
        .then_ignore(just(Token::Dot))
        .map_with_span(|(name, body), span| Program { name, body, span })
        .then_ignore(end())
}
