// Tokenizer for the box notation, generated by `logos`.
//
// Numbers come out unsigned; the parser owns unary minus. An unknown
// character is reported and skipped, so one pass yields every error.

use logos::Logos;
use std::fmt;

/// Half-open byte range into the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Everything `lex` produced; `errors` does not stop tokenization.
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Notation token types.
///
/// Identifiers carry no value; use the span to retrieve the text from the
/// source.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+|//[^\n]*")]
pub enum Token {
    // ── Keywords ──
    #[token("waveform")]
    Waveform,
    #[token("environment")]
    Environment,
    #[token("ffunction")]
    Ffunction,
    #[token("fconst")]
    Fconst,
    #[token("fvar")]
    Fvar,

    // ── Wiring ──
    #[token("_", priority = 3)]
    Wire,
    #[token("!")]
    Cut,

    // ── Composition ──
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("<:")]
    SplitOp,
    #[token(":>")]
    MergeOp,
    #[token("~")]
    Tilde,

    // ── Operators ──
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("==")]
    EqEq,
    #[token("!=")]
    Ne,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("@")]
    At,
    #[token("'")]
    Prime,

    // ── Punctuation ──
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("\\")]
    Backslash,
    #[token(".")]
    Dot,
    #[token("=")]
    Equals,
    #[token(";")]
    Semi,

    // ── Literals ──
    /// Real literal: has a fraction or an exponent.
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", parse_real)]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", parse_real)]
    Real(f64),

    /// Unsigned integer literal.
    #[regex(r"[0-9]+", parse_int)]
    Int(i64),

    /// Quoted label; backslash escapes the next character.
    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    StringLit(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Token::Waveform => "waveform",
            Token::Environment => "environment",
            Token::Ffunction => "ffunction",
            Token::Fconst => "fconst",
            Token::Fvar => "fvar",
            Token::Wire => "_",
            Token::Cut => "!",
            Token::Colon => ":",
            Token::Comma => ",",
            Token::SplitOp => "<:",
            Token::MergeOp => ":>",
            Token::Tilde => "~",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Shl => "<<",
            Token::Shr => ">>",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Le => "<=",
            Token::Ge => ">=",
            Token::EqEq => "==",
            Token::Ne => "!=",
            Token::Amp => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::At => "@",
            Token::Prime => "'",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Backslash => "\\",
            Token::Dot => ".",
            Token::Equals => "=",
            Token::Semi => ";",
            Token::Real(v) => return write!(f, "{v}"),
            Token::Int(v) => return write!(f, "{v}"),
            Token::StringLit(s) => return write!(f, "\"{s}\""),
            Token::Ident => "identifier",
        };
        f.write_str(s)
    }
}

fn parse_real(lex: &mut logos::Lexer<'_, Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Option<i64> {
    lex.slice().parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let raw = lex.slice();
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Lex a notation source string into tokens.
///
/// Lexing is non-fatal: errors are collected and the lexer continues past
/// bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_ok(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(
            result.errors.is_empty(),
            "unexpected lex errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn composition_operators() {
        assert_eq!(
            lex_ok(": , <: :> ~"),
            vec![
                Token::Colon,
                Token::Comma,
                Token::SplitOp,
                Token::MergeOp,
                Token::Tilde
            ]
        );
    }

    #[test]
    fn longest_operator_wins() {
        assert_eq!(
            lex_ok("< <= << <: ! !="),
            vec![
                Token::Lt,
                Token::Le,
                Token::Shl,
                Token::SplitOp,
                Token::Cut,
                Token::Ne
            ]
        );
    }

    #[test]
    fn wire_vs_ident() {
        assert_eq!(lex_ok("_ _x"), vec![Token::Wire, Token::Ident]);
    }

    #[test]
    fn keyword_vs_ident() {
        assert_eq!(
            lex_ok("waveform waveforms"),
            vec![Token::Waveform, Token::Ident]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            lex_ok("42 0.5 1. 2e3"),
            vec![
                Token::Int(42),
                Token::Real(0.5),
                Token::Real(1.0),
                Token::Real(2000.0)
            ]
        );
    }

    #[test]
    fn negative_number_is_two_tokens() {
        assert_eq!(lex_ok("-3"), vec![Token::Minus, Token::Int(3)]);
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            lex_ok(r#""h:main/\"gain\"""#),
            vec![Token::StringLit("h:main/\"gain\"".into())]
        );
    }

    #[test]
    fn comments_and_newlines_are_skipped() {
        assert_eq!(
            lex_ok("process = _; // identity\n"),
            vec![Token::Ident, Token::Equals, Token::Wire, Token::Semi]
        );
    }

    #[test]
    fn lambda_tokens() {
        assert_eq!(
            lex_ok(r"\(x).(x')"),
            vec![
                Token::Backslash,
                Token::LParen,
                Token::Ident,
                Token::RParen,
                Token::Dot,
                Token::LParen,
                Token::Ident,
                Token::Prime,
                Token::RParen
            ]
        );
    }

    #[test]
    fn unknown_character_is_reported_and_skipped() {
        let result = lex("_ $ _");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].span, Span { start: 2, end: 3 });
        assert_eq!(result.tokens.len(), 2);
    }
}
