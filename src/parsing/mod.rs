//! Parsing
//!
//! This module is responsible for turning the source code from its string
//! form into an AST. The main interface is [parse] which takes a string and
//! generates an [`ast::UntypedProgram`](crate::ast::UntypedProgram).
//!
//! Internally, parsing works in two phases:
//! - the [lexer] scans the source text and turns it into a stream of tokens
//! - the [parser] generates the AST from these tokens
//!
//! The module relies heavily on the [chumsky] crate for lexing and parsing.

use miette::Diagnostic;
use thiserror::Error;

use chumsky::error::SimpleReason;
use chumsky::{prelude::*, Stream};

use crate::ast::UntypedProgram;
use crate::Span;

mod lexer;
mod parser;

type ParseErr<T> = Simple<T, Span>;

#[derive(Debug, Error, Diagnostic)]
pub enum ParsingError {
    #[error("Found an unclosed delimiter: {delimiter}")]
    #[diagnostic(help("Must be closed before: {must_close_before}"))]
    UnclosedDelimiter {
        delimiter: String,
        must_close_before: String,

        #[label("unclosed delimiter")]
        span: Span,
    },

    #[error("Encountered unexpected input: {token}")]
    UnexpectedInput {
        token: String,

        #[help]
        expected: Option<String>,

        #[label("here")]
        span: Span,
    },

    #[error("{msg}")]
    Custom {
        msg: String,

        #[label("here")]
        span: Span,
    },
}

impl ParsingError {
    /// The position the error points at
    pub fn span(&self) -> Span {
        match self {
            ParsingError::UnclosedDelimiter { span, .. }
            | ParsingError::UnexpectedInput { span, .. }
            | ParsingError::Custom { span, .. } => *span,
        }
    }
}

/// Parse PCL source code into an AST
pub fn parse(source: &str) -> Result<UntypedProgram, Vec<ParsingError>> {
    let end_of_input = Span::marker(source.chars().count());

    let char_iter = source
        .chars()
        .enumerate()
        .map(|(i, c)| (c, Span::single(i)));

    let (tokens, lex_errs) =
        lexer::lex().parse_recovery(Stream::from_iter(end_of_input, char_iter));

    let parse_errs = if let Some(tokens) = tokens {
        let (program, parse_errs) =
            parser::parser().parse_recovery(Stream::from_iter(end_of_input, tokens.into_iter()));

        if let Some(program) = program.filter(|_| lex_errs.len() + parse_errs.len() == 0) {
            return Ok(program);
        }

        parse_errs
    } else {
        Vec::new()
    };

    let errors = lex_errs
        .into_iter()
        .map(|e| e.map(|c| c.to_string()))
        .chain(parse_errs.into_iter().map(|e| e.map(|tok| tok.to_string())))
        .map(build_error)
        .collect();

    Err(errors)
}

/// Turn a chumsky error into our error type
fn build_error(err: ParseErr<String>) -> ParsingError {
    let eof = String::from("end of file");
    match err.reason() {
        SimpleReason::Unexpected => {
            let token = err.found().unwrap_or(&eof);
            let expected = if err.expected().len() == 0 {
                None
            } else {
                let toks: Vec<_> = err
                    .expected()
                    .map(|tok| match tok {
                        Some(tok) => tok.to_string(),
                        None => eof.clone(),
                    })
                    .collect();

                let mut help_string = toks.join(", ");
                help_string.insert_str(0, "Expected one of: ");

                Some(help_string)
            };

            ParsingError::UnexpectedInput {
                token: token.clone(),
                expected,
                span: err.span(),
            }
        }
        SimpleReason::Unclosed { span, delimiter } => {
            let must_close_before = err.found().unwrap_or(&eof);
            ParsingError::UnclosedDelimiter {
                delimiter: delimiter.clone(),
                must_close_before: must_close_before.clone(),
                span: *span,
            }
        }
        SimpleReason::Custom(msg) => ParsingError::Custom {
            msg: msg.clone(),
            span: err.span(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExprKind, Local, StmtKind};

    #[test]
    fn minimal_program() {
        let program = parse("program hello; begin writeString('hi') end.").unwrap();
        assert_eq!(program.name, "hello");

        let StmtKind::Block(stmts) = &program.body.block.kind else {
            panic!("body is a block");
        };
        assert!(matches!(stmts[0].kind, StmtKind::Call(_)));
    }

    #[test]
    fn declarations_and_statements() {
        let program = parse(
            "program p; \
             var i, j : integer; r : real; \
             label somewhere; \
             begin \
               i := 1; \
               somewhere : while i < 10 do i := i + 1; \
               if i = 10 then j := i else goto somewhere \
             end.",
        )
        .unwrap();

        assert_eq!(program.body.locals.len(), 2);
        let Local::Vars(groups) = &program.body.locals[0] else {
            panic!("first local is a var declaration");
        };
        assert_eq!(groups[0].names, vec!["i", "j"]);
    }

    #[test]
    fn types_and_pointers() {
        let program = parse(
            "program p; \
             var a : array [10] of integer; \
                 s : array of char; \
                 q : ^array of real; \
             begin q^[0] := 1.0 end.",
        )
        .unwrap();

        let Local::Vars(groups) = &program.body.locals[0] else {
            panic!("var declaration");
        };
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn nested_functions() {
        let program = parse(
            "program p; \
             function fact (n : integer) : integer; \
             begin \
               if n <= 1 then result := 1 else result := n * fact(n - 1) \
             end; \
             begin writeInteger(fact(5)) end.",
        )
        .unwrap();

        let Local::Fun(fact) = &program.body.locals[0] else {
            panic!("function declaration");
        };
        assert_eq!(fact.name, "fact");
        assert!(!fact.is_forward());
        assert_eq!(fact.formals.len(), 1);
    }

    #[test]
    fn forward_declaration() {
        let program = parse(
            "program p; \
             procedure q (var n : integer); forward; \
             procedure q (var n : integer); begin n := 0 end; \
             begin end.",
        )
        .unwrap();

        let Local::Fun(forward) = &program.body.locals[0] else {
            panic!("forward declaration");
        };
        assert!(forward.is_forward());

        let Local::Fun(body) = &program.body.locals[1] else {
            panic!("body declaration");
        };
        assert!(!body.is_forward());
        assert!(body.formals[0].by_reference);
    }

    #[test]
    fn operator_precedence() {
        let program = parse("program p; begin x := 1 + 2 * 3 end.").unwrap();

        let StmtKind::Block(stmts) = &program.body.block.kind else {
            panic!("body is a block");
        };
        let StmtKind::Assign { right, .. } = &stmts[0].kind else {
            panic!("assignment");
        };
        let ExprKind::Binary { op, .. } = &right.kind else {
            panic!("binary expression");
        };
        assert_eq!(op.to_string(), "+");
    }

    #[test]
    fn assignment_needs_an_lvalue() {
        assert!(parse("program p; begin 1 := 2 end.").is_err());
    }

    #[test]
    fn unclosed_block() {
        assert!(parse("program p; begin x := 1 .").is_err());
    }
}
