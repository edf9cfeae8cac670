use crate::config::{SiteProfile, TargetItem};
use crate::error::{JapscanError, Result};
use crate::models::WalkSummary;
use crate::traits::{ChapterDownloader, PageSource, ProgressObserver, ProgressScope};
use scraper::Html;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Turns a configured target into chapter URLs and downloads them one
/// after the other.
pub struct MangaWalker {
    source: Arc<dyn PageSource>,
    site: Arc<SiteProfile>,
    reverse: bool,
    progress: Arc<dyn ProgressObserver>,
}

impl MangaWalker {
    pub fn new(
        source: Arc<dyn PageSource>,
        site: Arc<SiteProfile>,
        reverse: bool,
        progress: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self {
            source,
            site,
            reverse,
            progress,
        }
    }

    pub async fn walk(&self, target: &TargetItem, chapters: &dyn ChapterDownloader) -> Result<WalkSummary> {
        let chapter_urls = self.chapter_urls(target).await?;
        let total = chapter_urls.len();
        let mut summary = WalkSummary::default();

        self.progress.start(ProgressScope::Chapters, total);
        for (index, chapter_url) in chapter_urls.iter().enumerate() {
            debug!("chapter_url: {}", chapter_url);
            let report = chapters.download_chapter(chapter_url).await?;
            if let Some(archive) = &report.archive {
                info!("Chapter {} packed into {:?}", report.location.chapter_number, archive);
            }
            if report.images_removed {
                debug!("Removed {} page images", report.files.len());
            }
            summary.record(&report);
            self.progress.advance(ProgressScope::Chapters, index + 1, total);
        }
        self.progress.finish(ProgressScope::Chapters);

        Ok(summary)
    }

    pub async fn chapter_urls(&self, target: &TargetItem) -> Result<Vec<String>> {
        match target {
            TargetItem::Manga { url } => self.list_chapters(url).await,
            TargetItem::Chapters {
                url,
                chapter_min,
                chapter_max,
            } => Ok((*chapter_min..=*chapter_max)
                .map(|number| format!("{}{}/", url, number))
                .collect()),
            TargetItem::Chapter { url } => Ok(vec![url.clone()]),
        }
    }

    async fn list_chapters(&self, manga_url: &str) -> Result<Vec<String>> {
        info!("Scanning manga from: {}", manga_url);

        let html = self.source.get(manga_url).await?.text();
        let mut chapter_urls = self.parse_chapter_links(&html, manga_url)?;

        if chapter_urls.is_empty() {
            warn!("No chapters listed on {}", manga_url);
        }
        if self.reverse {
            chapter_urls.reverse();
        }

        info!("Found {} chapters on {}", chapter_urls.len(), manga_url);
        Ok(chapter_urls)
    }

    /// Chapter links in document order, made absolute.
    pub fn parse_chapter_links(&self, html: &str, manga_url: &str) -> Result<Vec<String>> {
        let document = Html::parse_document(html);
        let selectors = &self.site.selectors;

        document
            .select(&selectors.chapter_list)
            .map(|entry| {
                let link = entry
                    .select(&selectors.chapter_link)
                    .next()
                    .and_then(|a| a.value().attr("href").map(|href| (a, href)));

                let (link, href) = link.ok_or_else(|| {
                    JapscanError::structure(format!("chapter entry without link on {}", manga_url))
                })?;

                let chapter_name: String = link
                    .text()
                    .collect::<String>()
                    .chars()
                    .filter(|c| *c != '\t' && *c != '\n')
                    .collect();
                debug!("chapter_name: {}", chapter_name);

                Ok(self.site.absolute_url(href))
            })
            .collect()
    }
}
