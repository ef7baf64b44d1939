pub mod engine;
pub mod family;
pub mod generators;
pub mod supercell;
