pub mod chapter;
pub mod page;

pub use chapter::JapscanDownloader;
