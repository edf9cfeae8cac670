use crate::error::{JapscanError, Result};
use crate::models::OutputFormat;
use ::config::builder::DefaultState;
use ::config::{ConfigBuilder, Environment, File, FileFormat};
use scraper::Selector;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "./config.yml";
pub const DEFAULT_DESTINATION_PATH: &str = "./mangas";
pub const JAPSCAN_URL: &str = "https://www.japscan.to";

const ENV_PREFIX: &str = "JAPSCAN";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub destination_path: String,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub mangas: Vec<TargetItem>,
    #[serde(default)]
    pub site: SiteConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub user_agent: Option<String>,
    pub headers: Option<HashMap<String, String>>,
    /// Pages of one chapter fetched at the same time. 1 means sequential.
    pub page_concurrency: usize,
    pub selectors: SelectorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorsConfig {
    pub chapter_list: String,
    pub chapter_link: String,
    pub page_list: String,
    pub page_option: String,
    pub image_container: String,
    pub image_attribute: String,
    pub scramble_marker: String,
}

/// One entry of the `mangas` list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawTargetItem")]
pub enum TargetItem {
    /// Every chapter listed on a manga page.
    Manga { url: String },
    /// Chapters `chapter_min..=chapter_max`, addressed as `<url><n>/`.
    Chapters {
        url: String,
        chapter_min: u32,
        chapter_max: u32,
    },
    /// A single chapter page.
    Chapter { url: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTargetItem {
    url: Option<String>,
    chapters: Option<RawChapterRange>,
    chapter: Option<RawChapter>,
}

#[derive(Debug, Deserialize)]
struct RawChapterRange {
    url: String,
    chapter_min: u32,
    chapter_max: u32,
}

#[derive(Debug, Deserialize)]
struct RawChapter {
    url: String,
}

impl TryFrom<RawTargetItem> for TargetItem {
    type Error = String;

    fn try_from(raw: RawTargetItem) -> std::result::Result<Self, Self::Error> {
        match (raw.url, raw.chapters, raw.chapter) {
            (Some(url), None, None) => Ok(TargetItem::Manga { url }),
            (None, Some(range), None) => {
                if range.chapter_max < range.chapter_min {
                    return Err(format!(
                        "chapter_max ({}) is lower than chapter_min ({}) for {}",
                        range.chapter_max, range.chapter_min, range.url
                    ));
                }
                Ok(TargetItem::Chapters {
                    url: range.url,
                    chapter_min: range.chapter_min,
                    chapter_max: range.chapter_max,
                })
            }
            (None, None, Some(chapter)) => Ok(TargetItem::Chapter { url: chapter.url }),
            (None, None, None) => {
                Err("manga entry needs one of `url`, `chapters` or `chapter`".to_string())
            }
            _ => Err("manga entry must set only one of `url`, `chapters` or `chapter`".to_string()),
        }
    }
}

impl Config {
    /// Loads a YAML file, then applies `JAPSCAN_*` environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let builder = Self::builder()?
            .add_source(File::from(path.as_ref()).format(FileFormat::Yaml))
            .add_source(environment());
        Self::build(builder)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let builder = Self::builder()?.add_source(File::from_str(content, FileFormat::Yaml));
        Self::build(builder)
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>> {
        Ok(::config::Config::builder()
            .set_default("destination_path", DEFAULT_DESTINATION_PATH)?
            .set_default("format", OutputFormat::default().extension())?)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: Config = builder.build()?.try_deserialize()?;
        if config.site.page_concurrency == 0 {
            return Err(JapscanError::invalid_config("site.page_concurrency must be at least 1"));
        }
        Ok(config)
    }
}

/// `JAPSCAN_FORMAT=cbz`, `JAPSCAN_SITE__PAGE_CONCURRENCY=4`
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: JAPSCAN_URL.to_string(),
            user_agent: Some("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()),
            headers: None,
            page_concurrency: 1,
            selectors: SelectorsConfig::default(),
        }
    }
}

impl Default for SelectorsConfig {
    fn default() -> Self {
        Self {
            chapter_list: "div.chapters_list.text-truncate".to_string(),
            chapter_link: "a[href]".to_string(),
            page_list: "select#pages".to_string(),
            page_option: "option[value]".to_string(),
            image_container: "div#image".to_string(),
            image_attribute: "data-src".to_string(),
            scramble_marker: "script[src*=\"/zjs/\"]".to_string(),
        }
    }
}

/// Site settings with every selector compiled, built once at startup.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub base_url: String,
    pub page_concurrency: usize,
    pub selectors: SiteSelectors,
}

#[derive(Debug, Clone)]
pub struct SiteSelectors {
    pub chapter_list: Selector,
    pub chapter_link: Selector,
    pub page_list: Selector,
    pub page_option: Selector,
    pub image_container: Selector,
    pub image_attribute: String,
    pub scramble_marker: Selector,
}

impl SiteProfile {
    pub fn compile(site: &SiteConfig) -> Result<Self> {
        let s = &site.selectors;
        Ok(Self {
            base_url: site.base_url.trim_end_matches('/').to_string(),
            page_concurrency: site.page_concurrency.max(1),
            selectors: SiteSelectors {
                chapter_list: parse_selector(&s.chapter_list)?,
                chapter_link: parse_selector(&s.chapter_link)?,
                page_list: parse_selector(&s.page_list)?,
                page_option: parse_selector(&s.page_option)?,
                image_container: parse_selector(&s.image_container)?,
                image_attribute: s.image_attribute.clone(),
                scramble_marker: parse_selector(&s.scramble_marker)?,
            },
        })
    }

    /// Joins a site-relative path (`/lecture-en-ligne/...`) onto the base URL.
    pub fn absolute_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn parse_selector(raw: &str) -> Result<Selector> {
    Selector::parse(raw)
        .map_err(|e| JapscanError::invalid_config(format!("invalid selector `{}`: {:?}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
destination_path: /tmp/mangas
format: cbz
mangas:
  - url: https://www.japscan.to/manga/one-piece/
  - chapters:
      url: https://www.japscan.to/lecture-en-ligne/one-piece/
      chapter_min: 5
      chapter_max: 7
  - chapter:
      url: https://www.japscan.to/lecture-en-ligne/one-piece/1000/
"#;

    #[test]
    fn parses_all_target_variants() {
        let config = Config::from_yaml(SAMPLE).unwrap();

        assert_eq!(config.destination_path, "/tmp/mangas");
        assert_eq!(config.format, OutputFormat::Cbz);
        assert_eq!(
            config.mangas,
            vec![
                TargetItem::Manga {
                    url: "https://www.japscan.to/manga/one-piece/".to_string()
                },
                TargetItem::Chapters {
                    url: "https://www.japscan.to/lecture-en-ligne/one-piece/".to_string(),
                    chapter_min: 5,
                    chapter_max: 7,
                },
                TargetItem::Chapter {
                    url: "https://www.japscan.to/lecture-en-ligne/one-piece/1000/".to_string()
                },
            ]
        );
    }

    #[test]
    fn applies_defaults() {
        let config = Config::from_yaml("mangas: []").unwrap();

        assert_eq!(config.destination_path, DEFAULT_DESTINATION_PATH);
        assert_eq!(config.format, OutputFormat::Jpg);
        assert_eq!(config.site.base_url, JAPSCAN_URL);
        assert_eq!(config.site.page_concurrency, 1);
    }

    #[test]
    fn rejects_inverted_range() {
        let yaml = r#"
mangas:
  - chapters:
      url: https://www.japscan.to/lecture-en-ligne/one-piece/
      chapter_min: 9
      chapter_max: 3
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn rejects_ambiguous_item() {
        let yaml = r#"
mangas:
  - url: https://www.japscan.to/manga/one-piece/
    chapter:
      url: https://www.japscan.to/lecture-en-ligne/one-piece/1000/
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn rejects_empty_item() {
        assert!(Config::from_yaml("mangas:\n  - {}\n").is_err());
    }

    #[test]
    fn rejects_zero_page_concurrency() {
        let err = Config::from_yaml("site:\n  page_concurrency: 0\n").unwrap_err();
        assert!(matches!(err, JapscanError::InvalidConfig(_)));
    }

    #[test]
    fn environment_overrides_nested_keys() {
        let vars = [
            ("JAPSCAN_FORMAT", "pdf"),
            ("JAPSCAN_DESTINATION_PATH", "/srv/mangas"),
            ("JAPSCAN_SITE__PAGE_CONCURRENCY", "4"),
        ];
        let builder = Config::builder()
            .unwrap()
            .add_source(File::from_str("format: cbz\n", FileFormat::Yaml))
            .add_source(environment().source(Some(
                vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            )));

        let config = Config::build(builder).unwrap();
        assert_eq!(config.format, OutputFormat::Pdf);
        assert_eq!(config.destination_path, "/srv/mangas");
        assert_eq!(config.site.page_concurrency, 4);
        assert_eq!(config.site.base_url, JAPSCAN_URL);
    }

    #[test]
    fn compiles_default_selectors() {
        let profile = SiteProfile::compile(&SiteConfig::default()).unwrap();
        assert_eq!(profile.base_url, JAPSCAN_URL);
        assert_eq!(profile.selectors.image_attribute, "data-src");
    }

    #[test]
    fn rejects_broken_selector() {
        let mut site = SiteConfig::default();
        site.selectors.page_list = "select[".to_string();
        let err = SiteProfile::compile(&site).unwrap_err();
        assert!(matches!(err, JapscanError::InvalidConfig(_)));
    }

    #[test]
    fn joins_relative_paths() {
        let mut site = SiteConfig::default();
        site.base_url = "https://site.test/".to_string();
        let profile = SiteProfile::compile(&site).unwrap();

        assert_eq!(profile.absolute_url("/lecture-en-ligne/x/1/"), "https://site.test/lecture-en-ligne/x/1/");
        assert_eq!(profile.absolute_url("x/1/"), "https://site.test/x/1/");
        assert_eq!(profile.absolute_url("https://cdn.test/a"), "https://cdn.test/a");
    }
}
