//! Optional config file loading. Search order: ./web2reader.toml, then
//! $XDG_CONFIG_HOME/web2reader/config.toml (or ~/.config/web2reader/config.toml).

use crate::pdf::PageSize;
use crate::scraper::EmptyChapterBehavior;
use serde::Deserialize;
use std::path::PathBuf;

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Where deliverables are copied when -o is not set. Paths are relative to CWD.
    pub output_dir: Option<PathBuf>,
    /// Root for per-job scratch directories. Defaults to the system temp dir.
    pub scratch_dir: Option<PathBuf>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Delay in seconds between requests.
    pub request_delay_secs: Option<u64>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Number of HTTP attempts (default 1: no retries).
    pub retry_count: Option<u32>,
    /// Delay in seconds before each retry (e.g. [1, 2, 4]).
    pub retry_backoff_secs: Option<Vec<u64>>,
    /// Chapters with no extractable content: keep (default) or skip.
    pub empty_chapters: Option<String>,
    /// a4 (default) or letter.
    pub page_size: Option<String>,
    /// Page margin in points.
    pub margin_pt: Option<f64>,
}

impl Config {
    pub fn empty_chapter_behavior(&self) -> Result<Option<EmptyChapterBehavior>, String> {
        self.empty_chapters
            .as_deref()
            .map(parse_empty_chapter_behavior)
            .transpose()
    }

    pub fn page_size(&self) -> Result<Option<PageSize>, String> {
        self.page_size.as_deref().map(parse_page_size).transpose()
    }
}

pub fn parse_empty_chapter_behavior(s: &str) -> Result<EmptyChapterBehavior, String> {
    match s.trim().to_lowercase().as_str() {
        "keep" => Ok(EmptyChapterBehavior::Keep),
        "skip" => Ok(EmptyChapterBehavior::Skip),
        _ => Err(format!(
            "Invalid empty_chapters value: '{}'. Use keep or skip.",
            s
        )),
    }
}

pub fn parse_page_size(s: &str) -> Result<PageSize, String> {
    match s.trim().to_lowercase().as_str() {
        "a4" => Ok(PageSize::A4),
        "letter" => Ok(PageSize::Letter),
        _ => Err(format!("Invalid page_size value: '{}'. Use a4 or letter.", s)),
    }
}

/// Search order: (1) ./web2reader.toml, (2) $XDG_CONFIG_HOME/web2reader/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("web2reader.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("web2reader").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
            let config: Config = toml::from_str(&s)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
            tracing::debug!(path = %path.display(), "config loaded");
            return Ok(Some(config));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config() {
        let c: Config = toml::from_str("").unwrap();
        assert!(c.output_dir.is_none());
        assert!(c.scratch_dir.is_none());
        assert!(c.user_agent.is_none());
        assert!(c.retry_count.is_none());
        assert_eq!(c.empty_chapter_behavior(), Ok(None));
        assert_eq!(c.page_size(), Ok(None));
        assert!(c.margin_pt.is_none());
    }

    #[test]
    fn parse_full_config() {
        let s = r#"
            output_dir = "out"
            scratch_dir = "/tmp/w2r"
            user_agent = "Custom/1.0"
            request_delay_secs = 3
            timeout_secs = 60
            retry_count = 3
            retry_backoff_secs = [1, 2]
            empty_chapters = "skip"
            page_size = "Letter"
            margin_pt = 36.0
        "#;
        let c: Config = toml::from_str(s).unwrap();
        assert_eq!(c.output_dir.as_deref(), Some(std::path::Path::new("out")));
        assert_eq!(c.scratch_dir.as_deref(), Some(std::path::Path::new("/tmp/w2r")));
        assert_eq!(c.user_agent.as_deref(), Some("Custom/1.0"));
        assert_eq!(c.request_delay_secs, Some(3));
        assert_eq!(c.timeout_secs, Some(60));
        assert_eq!(c.retry_count, Some(3));
        assert_eq!(c.retry_backoff_secs.as_deref(), Some([1, 2].as_slice()));
        assert_eq!(c.empty_chapter_behavior(), Ok(Some(EmptyChapterBehavior::Skip)));
        assert_eq!(c.page_size(), Ok(Some(PageSize::Letter)));
        assert_eq!(c.margin_pt, Some(36.0));
    }

    #[test]
    fn bad_enum_values_are_reported() {
        let c: Config = toml::from_str(r#"empty_chapters = "fail""#).unwrap();
        assert!(c.empty_chapter_behavior().is_err());
        let c: Config = toml::from_str(r#"page_size = "a3""#).unwrap();
        assert!(c.page_size().unwrap_err().contains("a3"));
    }

    #[test]
    fn invalid_toml_errors() {
        assert!(toml::from_str::<Config>("output_dir = [").is_err());
    }
}
