pub mod database;
pub mod elements;
pub mod matching;
