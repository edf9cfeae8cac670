use crate::config::SiteProfile;
use crate::downloaders::page::PageFetcher;
use crate::error::{JapscanError, Result};
use crate::models::{ChapterLocation, ChapterReport, DownloadOptions};
use crate::storage::{ensure_dir, StorageManager};
use crate::traits::{ChapterDownloader, PageSource, ProgressObserver, ProgressScope};
use futures::stream::{self, StreamExt};
use scraper::Html;
use std::sync::Arc;
use tracing::{debug, info};

pub struct JapscanDownloader {
    source: Arc<dyn PageSource>,
    site: Arc<SiteProfile>,
    pages: PageFetcher,
    storage: StorageManager,
    options: DownloadOptions,
    progress: Arc<dyn ProgressObserver>,
}

impl JapscanDownloader {
    pub fn new(
        source: Arc<dyn PageSource>,
        site: Arc<SiteProfile>,
        options: DownloadOptions,
        progress: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self {
            pages: PageFetcher::new(source.clone(), site.clone(), options.unscramble),
            storage: StorageManager::new(&options.destination_path),
            source,
            site,
            options,
            progress,
        }
    }

    /// Page URLs listed in the chapter's page selector, in document order.
    pub fn parse_page_urls(&self, html: &str, chapter_url: &str) -> Result<Vec<String>> {
        let document = Html::parse_document(html);
        let selectors = &self.site.selectors;

        let pages = document
            .select(&selectors.page_list)
            .next()
            .ok_or_else(|| JapscanError::structure(format!("can't read pages of {}", chapter_url)))?;

        Ok(pages
            .select(&selectors.page_option)
            .filter_map(|option| option.value().attr("value"))
            .map(|value| self.site.absolute_url(value))
            .collect())
    }
}

#[async_trait::async_trait]
impl ChapterDownloader for JapscanDownloader {
    async fn download_chapter(&self, chapter_url: &str) -> Result<ChapterReport> {
        info!("Downloading chapter: {}", chapter_url);

        let html = self.source.get(chapter_url).await?.text();
        let page_urls = self.parse_page_urls(&html, chapter_url)?;

        let location = ChapterLocation::parse(chapter_url)?;
        let chapter_path = self.storage.chapter_path(&location);
        debug!("chapter_path: {:?}", chapter_path);

        let total = page_urls.len();
        self.progress.start(ProgressScope::Pages, total);

        // `buffered` yields in page order whatever the completion order.
        let fetches: Vec<_> = page_urls
            .iter()
            .map(|page_url| self.pages.fetch_page(&chapter_path, page_url))
            .collect();
        let mut results = stream::iter(fetches).buffered(self.site.page_concurrency);

        let mut files = Vec::with_capacity(total);
        let mut skipped_pages = 0;
        let mut completed = 0;
        while let Some(result) = results.next().await {
            match result? {
                Some(file) => files.push(file),
                None => skipped_pages += 1,
            }
            completed += 1;
            self.progress.advance(ProgressScope::Pages, completed, total);
        }
        self.progress.finish(ProgressScope::Pages);

        // Pages create the directory lazily and every page may have been skipped.
        if self.options.format.is_archive() {
            ensure_dir(&chapter_path).await?;
        }
        let archive = self.storage.create_archive(&location, self.options.format, &files)?;

        let images_removed = self.options.removes_images();
        if images_removed {
            self.storage.remove_images(&files).await?;
        }

        info!(
            "Chapter {} of {}: {} pages, {} skipped",
            location.chapter_number,
            location.manga_name,
            files.len(),
            skipped_pages
        );

        Ok(ChapterReport {
            location,
            files,
            skipped_pages,
            archive,
            images_removed,
        })
    }
}
