//! Parsing ports

mod parser;

pub use parser::Parser;
