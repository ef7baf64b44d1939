pub mod databases;
pub mod remote;
pub mod resolver;
