pub mod json;
mod summary;

pub use json::{print_json, write_json};
pub use summary::print_summary;
