// AST node types for the box notation.
//
// A notation source is a list of definitions `name(params) = expr;`; the
// definition named `process` is the diagram to compile. Every node carries
// a `SimpleSpan` so lowering can point at the offending text.
//
// Preconditions: produced by the parser from a valid or partially-valid token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

use crate::signal::BinOp;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

// ── Root ──

/// A complete notation source: a sequence of definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub definitions: Vec<Definition>,
    pub span: Span,
}

/// `name = expr;` or `name(x, y) = expr;` (sugar for a lambda).
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

// ── Expressions ──

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// The five block-diagram composition operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composition {
    /// `a : b`
    Seq,
    /// `a , b`
    Par,
    /// `a <: b`
    Split,
    /// `a :> b`
    Merge,
    /// `a ~ b`
    Rec,
}

/// A primitive written with an operator symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Bin(BinOp),
    /// `@`
    Delay,
}

/// Which kind of foreign declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKind {
    Function,
    Const,
    Var,
}

/// `ffunction(real sin(real), "math.h")`, `fconst(int SR, "dsp.h")`,
/// `fvar(int count, "dsp.h")`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignDecl {
    pub kind: ForeignKind,
    pub result: Ident,
    pub name: Ident,
    pub args: Vec<Ident>,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Real(f64),
    Str(String),
    /// `_`
    Wire,
    /// `!`
    Cut,
    Ident(String),
    /// An operator symbol used as a box, e.g. `+`.
    OpBox(Operator),
    Compose(Composition, Box<Expr>, Box<Expr>),
    /// `a + b`, i.e. `(a, b) : +`.
    Infix(Operator, Box<Expr>, Box<Expr>),
    /// Postfix `'`, i.e. `a : mem`.
    Mem(Box<Expr>),
    /// `f(a, b)`
    Call(Box<Expr>, Vec<Expr>),
    /// `\(x, y).(body)`
    Lambda(Vec<Ident>, Box<Expr>),
    /// `waveform{1, 2, 3}`
    Waveform(Vec<Expr>),
    /// `environment{}`
    Environment,
    Foreign(ForeignDecl),
}
