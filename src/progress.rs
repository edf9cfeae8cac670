use crate::traits::{ProgressObserver, ProgressScope};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Two stacked bars, chapters on top and pages of the current chapter below.
pub struct IndicatifProgress {
    chapters: ProgressBar,
    pages: ProgressBar,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        let chapters = multi.add(ProgressBar::new(0));
        chapters.set_style(bar_style("chapters"));
        let pages = multi.add(ProgressBar::new(0));
        pages.set_style(bar_style("pages"));

        Self { chapters, pages }
    }

    fn bar(&self, scope: ProgressScope) -> &ProgressBar {
        match scope {
            ProgressScope::Chapters => &self.chapters,
            ProgressScope::Pages => &self.pages,
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

fn bar_style(unit: &str) -> ProgressStyle {
    ProgressStyle::with_template(&format!("[{{bar:40.cyan/blue}}] - [{{pos}}/{{len}}] - [{}]", unit))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

impl ProgressObserver for IndicatifProgress {
    fn start(&self, scope: ProgressScope, total: usize) {
        let bar = self.bar(scope);
        bar.reset();
        bar.set_length(total as u64);
    }

    fn advance(&self, scope: ProgressScope, completed: usize, total: usize) {
        let bar = self.bar(scope);
        bar.set_length(total as u64);
        bar.set_position(completed as u64);
    }

    fn finish(&self, scope: ProgressScope) {
        self.bar(scope).finish();
    }
}
