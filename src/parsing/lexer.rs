//! Lexer
//!
//! This submodule prepares source code for parsing by splitting the text into
//! easy-to-work-with tokens. The [lex] parser is its main interface.
//!
//! A quoted literal of length one is a character, anything longer is a
//! string; double-quoted literals are always strings.

use std::fmt;

use chumsky::prelude::*;

use crate::Span;

use super::ParseErr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Integer(String),
    Real(String),
    Char(u8),
    Str(String),
    Bool(bool),

    Ident(String),

    KwInteger,
    KwReal,
    KwBoolean,
    KwChar,
    KwArray,
    KwOf,

    KwProgram,
    KwBegin,
    KwEnd,
    KwVar,
    KwLabel,
    KwFunction,
    KwProcedure,
    KwForward,
    KwIf,
    KwThen,
    KwElse,
    KwWhile,
    KwDo,
    KwGoto,
    KwReturn,
    KwNew,
    KwDispose,
    KwNil,
    KwResult,
    KwAnd,
    KwOr,
    KwNot,
    KwDiv,
    KwMod,

    Assign,
    Equals,
    NotEquals,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    At,

    ParenOpen,
    ParenClose,
    BracketOpen,
    BracketClose,
    Comma,
    Semicolon,
    Colon,
    Dot,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Integer(digits) => write!(f, "{digits}"),
            Token::Real(digits) => write!(f, "{digits}"),
            Token::Char(c) => write!(f, "'{}'", *c as char),
            Token::Str(s) => write!(f, "'{s}'"),
            Token::Bool(b) => write!(f, "{b}"),
            Token::Ident(ident) => write!(f, "{ident}"),
            Token::KwInteger => write!(f, "integer"),
            Token::KwReal => write!(f, "real"),
            Token::KwBoolean => write!(f, "boolean"),
            Token::KwChar => write!(f, "char"),
            Token::KwArray => write!(f, "array"),
            Token::KwOf => write!(f, "of"),
            Token::KwProgram => write!(f, "program"),
            Token::KwBegin => write!(f, "begin"),
            Token::KwEnd => write!(f, "end"),
            Token::KwVar => write!(f, "var"),
            Token::KwLabel => write!(f, "label"),
            Token::KwFunction => write!(f, "function"),
            Token::KwProcedure => write!(f, "procedure"),
            Token::KwForward => write!(f, "forward"),
            Token::KwIf => write!(f, "if"),
            Token::KwThen => write!(f, "then"),
            Token::KwElse => write!(f, "else"),
            Token::KwWhile => write!(f, "while"),
            Token::KwDo => write!(f, "do"),
            Token::KwGoto => write!(f, "goto"),
            Token::KwReturn => write!(f, "return"),
            Token::KwNew => write!(f, "new"),
            Token::KwDispose => write!(f, "dispose"),
            Token::KwNil => write!(f, "nil"),
            Token::KwResult => write!(f, "result"),
            Token::KwAnd => write!(f, "and"),
            Token::KwOr => write!(f, "or"),
            Token::KwNot => write!(f, "not"),
            Token::KwDiv => write!(f, "div"),
            Token::KwMod => write!(f, "mod"),
            Token::Assign => write!(f, ":="),
            Token::Equals => write!(f, "="),
            Token::NotEquals => write!(f, "<>"),
            Token::Less => write!(f, "<"),
            Token::LessEq => write!(f, "<="),
            Token::Greater => write!(f, ">"),
            Token::GreaterEq => write!(f, ">="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Caret => write!(f, "^"),
            Token::At => write!(f, "@"),
            Token::ParenOpen => write!(f, "("),
            Token::ParenClose => write!(f, ")"),
            Token::BracketOpen => write!(f, "["),
            Token::BracketClose => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Semicolon => write!(f, ";"),
            Token::Colon => write!(f, ":"),
            Token::Dot => write!(f, "."),
        }
    }
}

/// Tokenize source code
pub fn lex() -> impl Parser<char, Vec<(Token, Span)>, Error = ParseErr<char>> {
    let integer = text::int(10).map(Token::Integer);

    let real = text::int(10)
        .chain::<char, _, _>(just('.').chain(text::digits(10)))
        .collect::<String>()
        .map(Token::Real);

    let escape = just('\\').ignore_then(choice((
        just('n').to('\n'),
        just('t').to('\t'),
        just('r').to('\r'),
        just('0').to('\0'),
        just('\\').to('\\'),
        just('\'').to('\''),
        just('"').to('"'),
    )));

    let single_quoted = just('\'')
        .ignore_then(
            filter(|c: &char| *c != '\'' && *c != '\\' && *c != '\n')
                .or(escape)
                .repeated(),
        )
        .then_ignore(just('\''))
        .map(|chars: Vec<char>| {
            if chars.len() == 1 {
                Token::Char(chars[0] as u8)
            } else {
                Token::Str(chars.into_iter().collect())
            }
        });

    let double_quoted = just('"')
        .ignore_then(
            filter(|c: &char| *c != '"' && *c != '\\' && *c != '\n')
                .or(escape)
                .repeated(),
        )
        .then_ignore(just('"'))
        .map(|chars: Vec<char>| Token::Str(chars.into_iter().collect()));

    let symbol = choice((
        just(":=").to(Token::Assign),
        just("<>").to(Token::NotEquals),
        just("<=").to(Token::LessEq),
        just(">=").to(Token::GreaterEq),
        one_of("=<>+-*/^@()[],;:.").map(|symb: char| match symb {
            '=' => Token::Equals,
            '<' => Token::Less,
            '>' => Token::Greater,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '@' => Token::At,
            '(' => Token::ParenOpen,
            ')' => Token::ParenClose,
            '[' => Token::BracketOpen,
            ']' => Token::BracketClose,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            ':' => Token::Colon,
            '.' => Token::Dot,
            _ => unreachable!(),
        }),
    ));

    let kw_or_ident = text::ident().map(|ident: String| match ident.as_str() {
        "integer" => Token::KwInteger,
        "real" => Token::KwReal,
        "boolean" => Token::KwBoolean,
        "char" => Token::KwChar,
        "array" => Token::KwArray,
        "of" => Token::KwOf,
        "program" => Token::KwProgram,
        "begin" => Token::KwBegin,
        "end" => Token::KwEnd,
        "var" => Token::KwVar,
        "label" => Token::KwLabel,
        "function" => Token::KwFunction,
        "procedure" => Token::KwProcedure,
        "forward" => Token::KwForward,
        "if" => Token::KwIf,
        "then" => Token::KwThen,
        "else" => Token::KwElse,
        "while" => Token::KwWhile,
        "do" => Token::KwDo,
        "goto" => Token::KwGoto,
        "return" => Token::KwReturn,
        "new" => Token::KwNew,
        "dispose" => Token::KwDispose,
        "nil" => Token::KwNil,
        "result" => Token::KwResult,
        "and" => Token::KwAnd,
        "or" => Token::KwOr,
        "not" => Token::KwNot,
        "div" => Token::KwDiv,
        "mod" => Token::KwMod,
        "true" => Token::Bool(true),
        "false" => Token::Bool(false),
        _ => Token::Ident(ident),
    });

    let token = real
        .or(integer)
        .or(single_quoted)
        .or(double_quoted)
        .or(symbol)
        .or(kw_or_ident);

    let comment = just("(*").then(take_until(just("*)"))).padded();

    token
        .map_with_span(|tok, span| (tok, span))
        .padded_by(comment.repeated())
        .padded()
        .repeated()
        .then_ignore(end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(src: &str) -> Vec<(Token, Span)> {
        let eoi = Span::marker(src.chars().count());
        let chars = src.chars().enumerate().map(|(i, c)| (c, Span::single(i)));
        lex().parse(chumsky::Stream::from_iter(eoi, chars)).unwrap()
    }

    fn tokenize_without_spans(src: &str) -> Vec<Token> {
        tokenize(src).into_iter().map(|(tok, _)| tok).collect()
    }

    #[test]
    fn numbers() {
        assert_eq!(
            tokenize_without_spans("0 42 1.5 123.25"),
            vec![
                Token::Integer(String::from("0")),
                Token::Integer(String::from("42")),
                Token::Real(String::from("1.5")),
                Token::Real(String::from("123.25")),
            ]
        );
    }

    #[test]
    fn quoted_literals() {
        assert_eq!(
            tokenize_without_spans(r#"'a' '\n' 'hi' "x" """#),
            vec![
                Token::Char(b'a'),
                Token::Char(b'\n'),
                Token::Str(String::from("hi")),
                Token::Str(String::from("x")),
                Token::Str(String::new()),
            ]
        );
    }

    #[test]
    fn assignment_vs_colon() {
        assert_eq!(
            tokenize_without_spans("x := 1; L : y"),
            vec![
                Token::Ident(String::from("x")),
                Token::Assign,
                Token::Integer(String::from("1")),
                Token::Semicolon,
                Token::Ident(String::from("L")),
                Token::Colon,
                Token::Ident(String::from("y")),
            ]
        );
    }

    #[test]
    fn keywords_and_idents() {
        assert_eq!(
            tokenize_without_spans("program prog; begin end."),
            vec![
                Token::KwProgram,
                Token::Ident(String::from("prog")),
                Token::Semicolon,
                Token::KwBegin,
                Token::KwEnd,
                Token::Dot,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            tokenize_without_spans("1 (* a comment\nover two lines *) 2"),
            vec![
                Token::Integer(String::from("1")),
                Token::Integer(String::from("2")),
            ]
        );
    }

    #[test]
    fn pointer_operators() {
        assert_eq!(
            tokenize_without_spans("p^ := @x"),
            vec![
                Token::Ident(String::from("p")),
                Token::Caret,
                Token::Assign,
                Token::At,
                Token::Ident(String::from("x")),
            ]
        );
    }

    #[test]
    #[should_panic]
    fn unknown_symbol() {
        let _ = tokenize("#");
    }
}
