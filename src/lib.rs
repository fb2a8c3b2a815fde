pub mod ast;
pub mod callable;
pub mod class;
pub mod diagnostics;
pub mod environment;
pub mod instance;
pub mod interpreter;
pub mod lox;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

pub use crate::lox::{Lox, Outcome};
