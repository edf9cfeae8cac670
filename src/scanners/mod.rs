pub mod japscan;

pub use japscan::MangaWalker;
