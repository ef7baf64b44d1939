pub mod extractor;
pub mod providers;
