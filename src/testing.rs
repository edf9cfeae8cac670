//! In-memory site used by the walker tests.

use crate::config::{SiteConfig, SiteProfile};
use crate::error::Result;
use crate::traits::{HttpResponse, PageSource, ProgressObserver, ProgressScope};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

pub const BASE_URL: &str = "https://site.test";

#[derive(Default)]
pub struct FakeSite {
    responses: HashMap<String, HttpResponse>,
    requests: Mutex<Vec<String>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(&mut self, url: impl Into<String>, html: impl Into<String>) -> &mut Self {
        self.respond(url, 200, html.into().into_bytes())
    }

    pub fn respond(&mut self, url: impl Into<String>, status: u16, body: Vec<u8>) -> &mut Self {
        self.responses.insert(url.into(), HttpResponse { status, body });
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PageSource for FakeSite {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(url.to_string());
        Ok(self.responses.get(url).cloned().unwrap_or(HttpResponse {
            status: 404,
            body: b"not found".to_vec(),
        }))
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<(ProgressScope, usize, usize)>>,
}

impl RecordingProgress {
    pub fn advances(&self, scope: ProgressScope) -> Vec<(usize, usize)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _, _)| *s == scope)
            .map(|(_, done, total)| (*done, *total))
            .collect()
    }
}

impl ProgressObserver for RecordingProgress {
    fn start(&self, _scope: ProgressScope, _total: usize) {}

    fn advance(&self, scope: ProgressScope, completed: usize, total: usize) {
        self.events.lock().unwrap().push((scope, completed, total));
    }

    fn finish(&self, _scope: ProgressScope) {}
}

pub fn profile() -> SiteProfile {
    let mut site = SiteConfig::default();
    site.base_url = BASE_URL.to_string();
    SiteProfile::compile(&site).unwrap()
}

pub fn png_bytes(width: u32, height: u32, seed: u8) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, seed])
    });
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

pub fn reader_page(image_url: &str, scrambled: bool) -> String {
    let marker = if scrambled {
        r#"<script src="/zjs/reader.js"></script>"#
    } else {
        ""
    };
    format!(
        r#"<html><head>{}</head><body><div id="image" data-src="{}"></div></body></html>"#,
        marker, image_url
    )
}

pub fn chapter_page(page_paths: &[String]) -> String {
    let options: String = page_paths
        .iter()
        .enumerate()
        .map(|(i, path)| format!(r#"<option value="{}">Page {}</option>"#, path, i + 1))
        .collect();
    format!(
        r#"<html><body><div class="header">Lecture</div><select id="pages">{}</select></body></html>"#,
        options
    )
}
