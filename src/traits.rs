use crate::error::Result;
use crate::models::ChapterReport;

/// Raw answer of a GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Where pages and images come from. Cookies and anti-bot handling live
/// behind this seam.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// Trait for chapter downloaders invoked by the manga walker
#[async_trait::async_trait]
pub trait ChapterDownloader: Send + Sync {
    /// Download every page of a chapter and package it
    async fn download_chapter(&self, chapter_url: &str) -> Result<ChapterReport>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressScope {
    Chapters,
    Pages,
}

/// Receives `(completed, total)` after each chapter or page.
pub trait ProgressObserver: Send + Sync {
    fn start(&self, scope: ProgressScope, total: usize);

    fn advance(&self, scope: ProgressScope, completed: usize, total: usize);

    fn finish(&self, scope: ProgressScope);
}
