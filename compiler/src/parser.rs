// Parser for the box notation.
//
// Parses a token stream (from the lexer) into a `Program` of definitions.
// Uses chumsky combinators. Precedence, loosest first:
//
//   `<:` `:>`  <  `:`  <  `,`  <  `~`  <  comparisons  <  `+ - |`
//   <  `* / % & ^ << >>`  <  `@`  <  postfix `'`  <  calls
//
// Call arguments are parsed without `,` so that `f(a : b, c)` has two
// arguments.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns an AST plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::diag::{codes, Diagnostic};
use crate::lexer::Token;
use crate::signal::BinOp;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub program: Option<Program>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

impl ParseResult {
    /// The program, or every lex and parse error as a diagnostic.
    pub fn into_result(self) -> Result<Program, Vec<Diagnostic>> {
        if !self.errors.is_empty() {
            return Err(self
                .errors
                .iter()
                .map(|e| {
                    Diagnostic::error(codes::E0404, e.to_string()).with_span(*e.span())
                })
                .collect());
        }
        self.program.ok_or_else(|| {
            vec![Diagnostic::error(codes::E0404, "empty parse result")]
        })
    }
}

/// Parse a notation source string. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = program_parser(source);
    let (program, parse_errors) = parser.parse(stream).into_output_errors();

    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        program,
        errors: all_errors,
    }
}

fn node(kind: ExprKind, span: Span) -> Expr {
    Expr { kind, span }
}

fn infix(op: Operator, l: Expr, r: Expr, span: Span) -> Expr {
    node(ExprKind::Infix(op, Box::new(l), Box::new(r)), span)
}

fn compose(c: Composition, l: Expr, r: Expr, span: Span) -> Expr {
    node(ExprKind::Compose(c, Box::new(l), Box::new(r)), span)
}

// ── Main parser builder ──

fn program_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Program, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    // ── Identifier ──

    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    let string = select! { Token::StringLit(s) => s };

    let idents = ident
        .clone()
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    // ── Numbers (optionally negated) ──

    let number = select! {
        Token::Int(n) => ExprKind::Int(n),
        Token::Real(v) => ExprKind::Real(v),
    };
    let signed_number = just(Token::Minus)
        .or_not()
        .then(number)
        .map_with(|(neg, kind), e| {
            let kind = match (neg.is_some(), kind) {
                (true, ExprKind::Int(n)) => ExprKind::Int(-n),
                (true, ExprKind::Real(v)) => ExprKind::Real(-v),
                (_, k) => k,
            };
            node(kind, e.span())
        });

    // ── Operator symbols ──

    let mul_op = select! {
        Token::Star => BinOp::Mul,
        Token::Slash => BinOp::Div,
        Token::Percent => BinOp::Rem,
        Token::Amp => BinOp::And,
        Token::Caret => BinOp::Xor,
        Token::Shl => BinOp::Lsh,
        Token::Shr => BinOp::ARsh,
    };
    let add_op = select! {
        Token::Plus => BinOp::Add,
        Token::Minus => BinOp::Sub,
        Token::Pipe => BinOp::Or,
    };
    let cmp_op = select! {
        Token::Lt => BinOp::Lt,
        Token::Gt => BinOp::Gt,
        Token::Le => BinOp::Le,
        Token::Ge => BinOp::Ge,
        Token::EqEq => BinOp::Eq,
        Token::Ne => BinOp::Ne,
    };
    let op_box = mul_op
        .clone()
        .or(add_op.clone())
        .or(cmp_op.clone())
        .map(Operator::Bin)
        .or(just(Token::At).to(Operator::Delay))
        .map_with(|op, e| node(ExprKind::OpBox(op), e.span()));

    // ── Foreign declarations ──

    let ffunction = just(Token::Ffunction)
        .ignore_then(
            ident
                .clone()
                .then(ident.clone())
                .then(idents.clone())
                .then_ignore(just(Token::Comma))
                .then(string.clone())
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .map(|(((result, name), args), file)| ForeignDecl {
            kind: ForeignKind::Function,
            result,
            name,
            args,
            file,
        });
    let foreign_value = just(Token::Fconst)
        .to(ForeignKind::Const)
        .or(just(Token::Fvar).to(ForeignKind::Var))
        .then(
            ident
                .clone()
                .then(ident.clone())
                .then_ignore(just(Token::Comma))
                .then(string.clone())
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .map(|(kind, ((result, name), file))| ForeignDecl {
            kind,
            result,
            name,
            args: Vec::new(),
            file,
        });
    let foreign = ffunction
        .or(foreign_value)
        .map_with(|decl, e| node(ExprKind::Foreign(decl), e.span()));

    // ── Expressions ──
    //
    // `expr` is the full grammar; `arg` is the grammar of one call argument,
    // which has every level except `,`.

    let mut expr = Recursive::declare();
    let mut arg = Recursive::declare();

    let waveform = just(Token::Waveform)
        .ignore_then(
            signed_number
                .clone()
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
        )
        .map_with(|values, e| node(ExprKind::Waveform(values), e.span()));

    let environment = just(Token::Environment)
        .then(just(Token::LBrace))
        .then(just(Token::RBrace))
        .map_with(|_, e| node(ExprKind::Environment, e.span()));

    let lambda = just(Token::Backslash)
        .ignore_then(idents.clone())
        .then_ignore(just(Token::Dot))
        .then(
            expr.clone()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .map_with(|(params, body), e| node(ExprKind::Lambda(params, Box::new(body)), e.span()));

    let simple = select! {
        Token::Wire => ExprKind::Wire,
        Token::Cut => ExprKind::Cut,
        Token::StringLit(s) => ExprKind::Str(s),
    }
    .map_with(|kind, e| node(kind, e.span()));

    let name = ident
        .clone()
        .map(|id| node(ExprKind::Ident(id.name), id.span));

    let parens = expr
        .clone()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let atom = choice((
        signed_number.clone(),
        simple,
        waveform,
        environment,
        foreign,
        lambda,
        name,
        op_box,
        parens,
    ));

    let call_args = arg
        .clone()
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let call = atom.foldl_with(call_args.repeated(), |f, args, e| {
        node(ExprKind::Call(Box::new(f), args), e.span())
    });

    let postfix = call.foldl_with(just(Token::Prime).repeated(), |x, _, e| {
        node(ExprKind::Mem(Box::new(x)), e.span())
    });

    let delay = postfix.clone().foldl_with(
        just(Token::At).ignore_then(postfix).repeated(),
        |l, r, e| infix(Operator::Delay, l, r, e.span()),
    );

    let mul = delay
        .clone()
        .foldl_with(mul_op.then(delay).repeated(), |l, (op, r), e| {
            infix(Operator::Bin(op), l, r, e.span())
        });

    let add = mul
        .clone()
        .foldl_with(add_op.then(mul).repeated(), |l, (op, r), e| {
            infix(Operator::Bin(op), l, r, e.span())
        });

    let cmp = add
        .clone()
        .foldl_with(cmp_op.then(add).repeated(), |l, (op, r), e| {
            infix(Operator::Bin(op), l, r, e.span())
        });

    let rec = cmp
        .clone()
        .foldl_with(just(Token::Tilde).ignore_then(cmp).repeated(), |l, r, e| {
            compose(Composition::Rec, l, r, e.span())
        })
        .boxed();

    let serial_op = select! {
        Token::Colon => Composition::Seq,
        Token::SplitOp => Composition::Split,
        Token::MergeOp => Composition::Merge,
    };
    arg.define(
        rec.clone()
            .foldl_with(serial_op.then(rec.clone()).repeated(), |l, (c, r), e| {
                compose(c, l, r, e.span())
            }),
    );

    let par = rec
        .clone()
        .foldl_with(just(Token::Comma).ignore_then(rec).repeated(), |l, r, e| {
            compose(Composition::Par, l, r, e.span())
        });

    let seq = par
        .clone()
        .foldl_with(just(Token::Colon).ignore_then(par).repeated(), |l, r, e| {
            compose(Composition::Seq, l, r, e.span())
        });

    let split_op = select! {
        Token::SplitOp => Composition::Split,
        Token::MergeOp => Composition::Merge,
    };
    expr.define(
        seq.clone()
            .foldl_with(split_op.then(seq).repeated(), |l, (c, r), e| {
                compose(c, l, r, e.span())
            }),
    );

    // ── Definitions ──

    let definition = ident
        .clone()
        .then(idents.or_not())
        .then_ignore(just(Token::Equals))
        .then(expr)
        .then_ignore(just(Token::Semi))
        .map_with(|((name, params), body), e| Definition {
            name,
            params: params.unwrap_or_default(),
            body,
            span: e.span(),
        });

    definition
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
        .map_with(|definitions, e| Program {
            definitions,
            span: e.span(),
        })
}

// ── Tests ──
