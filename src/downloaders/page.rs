use crate::config::SiteProfile;
use crate::error::{JapscanError, Result};
use crate::models::ImageDestination;
use crate::storage::ensure_dir;
use crate::traits::PageSource;
use crate::unscramble::{is_scrambled, unscramble};
use scraper::Html;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const SCRAMBLED_SUFFIX: &str = "_scrambled";

/// Downloads the image behind a single reader page.
pub struct PageFetcher {
    source: Arc<dyn PageSource>,
    site: Arc<SiteProfile>,
    force_unscramble: bool,
}

/// What the reader page tells us about its image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderPage {
    pub image_url: String,
    pub scrambled: bool,
}

impl PageFetcher {
    pub fn new(source: Arc<dyn PageSource>, site: Arc<SiteProfile>, force_unscramble: bool) -> Self {
        Self {
            source,
            site,
            force_unscramble,
        }
    }

    /// Returns the written image path, or `None` when the image could not
    /// be fetched.
    pub async fn fetch_page(&self, chapter_path: &Path, page_url: &str) -> Result<Option<PathBuf>> {
        debug!("page_url: {}", page_url);

        let page = self.source.get(page_url).await?;
        let reader = self.parse_reader_page(&page.text(), page.status, page_url)?;

        let image = self.source.get(&reader.image_url).await?;
        if !image.is_success() {
            let failure = JapscanError::fetch_failure(&reader.image_url, image.status);
            warn!("Skipping page {}: {}", page_url, failure);
            return Ok(None);
        }

        let destination = ImageDestination::from_url(&reader.image_url)?;
        let unscramble_image = self.force_unscramble || reader.scrambled;
        let image_full_path = chapter_path.join(&destination.file_name);

        debug!("image_url: {}", reader.image_url);
        debug!("image_path: {}", destination.relative_path());
        debug!("image_full_path: {:?}", image_full_path);
        debug!("unscramble: {}", unscramble_image);

        ensure_dir(chapter_path).await?;

        if unscramble_image {
            let scrambled_path = with_suffix(&image_full_path, SCRAMBLED_SUFFIX);
            tokio::fs::write(&scrambled_path, &image.body).await?;
            let (input, output) = (scrambled_path.clone(), image_full_path.clone());
            tokio::task::spawn_blocking(move || unscramble(&input, &output)).await??;
            tokio::fs::remove_file(&scrambled_path).await?;
        } else {
            tokio::fs::write(&image_full_path, &image.body).await?;
        }

        Ok(Some(image_full_path))
    }

    pub fn parse_reader_page(&self, html: &str, status: u16, page_url: &str) -> Result<ReaderPage> {
        let document = Html::parse_document(html);
        let selectors = &self.site.selectors;

        let image_url = document
            .select(&selectors.image_container)
            .find_map(|el| el.value().attr(&selectors.image_attribute))
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                JapscanError::structure(format!(
                    "no image `{}` attribute on {} (HTTP {})",
                    selectors.image_attribute, page_url, status
                ))
            })?;

        Ok(ReaderPage {
            image_url: self.site.absolute_url(image_url.trim()),
            scrambled: is_scrambled(&document, &selectors.scramble_marker),
        })
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}
