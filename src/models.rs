use crate::error::{JapscanError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Number of trailing URL path components the site uses as its storage key
/// (`<dir>/<dir>/<file>`).
pub const STORAGE_PATH_SEGMENTS: usize = 3;

const MANGA_NAME_SEGMENT: usize = 4;
const CHAPTER_NUMBER_SEGMENT: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Keep the downloaded page images as they are
    #[default]
    Jpg,
    /// One PDF per chapter
    Pdf,
    /// One CBZ (zip) per chapter
    Cbz,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpg => "jpg",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Cbz => "cbz",
        }
    }

    pub fn is_archive(&self) -> bool {
        !matches!(self, OutputFormat::Jpg)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Manga and chapter identifiers recovered from a chapter URL such as
/// `https://www.japscan.to/lecture-en-ligne/one-piece/1000/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterLocation {
    pub manga_name: String,
    pub chapter_number: String,
}

impl ChapterLocation {
    pub fn parse(chapter_url: &str) -> Result<Self> {
        let segments: Vec<&str> = chapter_url.split('/').collect();

        let segment = |index: usize| {
            segments
                .get(index)
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    JapscanError::structure(format!(
                        "chapter URL has no path segment #{}: {}",
                        index + 1,
                        chapter_url
                    ))
                })
        };

        Ok(Self {
            manga_name: segment(MANGA_NAME_SEGMENT)?,
            chapter_number: segment(CHAPTER_NUMBER_SEGMENT)?,
        })
    }

    pub fn chapter_dir(&self, destination_root: &Path) -> PathBuf {
        destination_root
            .join(&self.manga_name)
            .join(&self.chapter_number)
    }
}

/// Storage key of an image on the CDN: at most the last `STORAGE_PATH_SEGMENTS`
/// components of the URL path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDestination {
    pub directory: String,
    pub file_name: String,
}

impl ImageDestination {
    pub fn from_url(image_url: &str) -> Result<Self> {
        let url = url::Url::parse(image_url)?;
        let components: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();

        let kept = &components[components.len().saturating_sub(STORAGE_PATH_SEGMENTS)..];
        let (file_name, directory) = match kept.split_last() {
            Some((file_name, directory)) if !file_name.is_empty() => (file_name, directory),
            _ => {
                return Err(JapscanError::structure(format!(
                    "image URL has no file name: {}",
                    image_url
                )))
            }
        };

        Ok(Self {
            directory: directory.join("/"),
            file_name: file_name.to_string(),
        })
    }

    pub fn relative_path(&self) -> String {
        if self.directory.is_empty() {
            return self.file_name.clone();
        }
        format!("{}/{}", self.directory, self.file_name)
    }
}

/// Flags shared by the chapter and page stages.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub destination_path: PathBuf,
    pub format: OutputFormat,
    pub reverse: bool,
    pub keep: bool,
    pub unscramble: bool,
}

impl DownloadOptions {
    /// Images are removed once archived, unless the user asked to keep them.
    pub fn removes_images(&self) -> bool {
        self.format.is_archive() && !self.keep
    }
}

#[derive(Debug, Clone)]
pub struct ChapterReport {
    pub location: ChapterLocation,
    pub files: Vec<PathBuf>,
    pub skipped_pages: usize,
    pub archive: Option<PathBuf>,
    pub images_removed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub chapters: usize,
    pub pages: usize,
    pub skipped_pages: usize,
}

impl WalkSummary {
    pub fn record(&mut self, report: &ChapterReport) {
        self.chapters += 1;
        self.pages += report.files.len();
        self.skipped_pages += report.skipped_pages;
    }
}
