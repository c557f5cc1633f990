pub mod file;

pub use file::{FileKind, FilePage, FileRecord};
