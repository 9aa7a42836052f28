// Record processing: contact extraction and scoring

pub mod evaluator;
pub mod extractor;

pub use evaluator::{evaluate, evaluate_all, usable_email};
pub use extractor::{extract, extract_batch};
