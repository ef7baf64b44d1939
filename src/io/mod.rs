pub mod parser;
pub mod writer;
