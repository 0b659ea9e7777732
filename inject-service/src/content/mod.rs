pub mod filename;
pub mod validator;

pub use filename::{filename_from_label, sanitize_filename, slugify, unique_filename, unique_id};
pub use validator::{ContentValidator, ValidatedContent};
