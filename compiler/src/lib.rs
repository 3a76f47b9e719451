// bdc — block-diagram compiler core
//
// Library root: the type algebra, the box and signal layers, propagation,
// recursion symbolization, type inference and its fixpoint, plus the
// notation front end and the pipeline driver.

pub mod ast;
pub mod boxes;
pub mod config;
pub mod debruijn;
pub mod diag;
pub mod dot;
pub mod env;
pub mod fixpoint;
pub mod id;
pub mod intern;
pub mod interval;
pub mod lexer;
pub mod lower;
pub mod parser;
pub mod pass;
pub mod pipeline;
pub mod print;
pub mod propagate;
pub mod registry;
pub mod session;
pub mod signal;
pub mod type_infer;
pub mod types;
