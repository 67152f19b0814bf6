//! Data model shared by the extractors, the PDF composer and the packager.
//!
//! Volumes and chapter references come out of the listing page; resolved chapters
//! carry the bucketed content pulled from each chapter page.

use reqwest::Url;
use serde::{Deserialize, Serialize};

/// One top-level grouping of chapters on the listing page (e.g. "Volume 3").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub title: String,
    /// Document order of the links under the volume heading.
    pub chapters: Vec<ChapterRef>,
}

impl Volume {
    /// Number parsed from the title: the first run of ASCII digits ("Volume 3" -> 3).
    pub fn number(&self) -> Option<u32> {
        first_number(&self.title)
    }
}

/// First run of ASCII digits in `s`, if any.
pub fn first_number(s: &str) -> Option<u32> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let digits: String = s[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// A chapter link with its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRef {
    pub name: String,
    pub url: String,
}

/// Text chapters are rendered as prose; illustrations chapters are image galleries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChapterKind {
    Text,
    Illustrations,
}

impl ChapterRef {
    /// Classify by URL shape: an `illustrations` path segment or a `-illustrations/` suffix.
    pub fn kind(&self) -> ChapterKind {
        let path = match Url::parse(&self.url) {
            Ok(u) => u.path().to_string(),
            Err(_) => self
                .url
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        };
        let has_segment = path.split('/').any(|seg| seg == "illustrations");
        if has_segment || path.ends_with("-illustrations/") {
            ChapterKind::Illustrations
        } else {
            ChapterKind::Text
        }
    }
}

/// An image referenced from a chapter page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub caption: String,
}

/// Rectangular cell matrix. Line breaks inside a cell are kept as `\n`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, padding short rows with empty cells so every row has the same width.
    pub fn from_rows(mut rows: Vec<Vec<String>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, String::new());
        }
        Table { rows }
    }

    pub fn columns(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }
}

/// Bucketed chapter content. Each bucket keeps document order; buckets are not interleaved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredContent {
    pub paragraphs: Vec<String>,
    pub inline_images: Vec<ImageRef>,
    pub tables: Vec<Table>,
}

impl StructuredContent {
    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty() && self.inline_images.is_empty() && self.tables.is_empty()
    }
}

/// Extracted body of one chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChapterBody {
    Text { content: StructuredContent },
    Illustrations { images: Vec<ImageRef> },
}

/// A chapter after its page has been fetched and extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedChapter {
    /// Sequential per volume, text chapters only.
    pub chapter_num: Option<u32>,
    pub name: String,
    pub url: String,
    #[serde(flatten)]
    pub body: ChapterBody,
}

impl ResolvedChapter {
    pub fn kind(&self) -> ChapterKind {
        match self.body {
            ChapterBody::Text { .. } => ChapterKind::Text,
            ChapterBody::Illustrations { .. } => ChapterKind::Illustrations,
        }
    }

    /// Heading shown in the document: the display name, else a kind-specific fallback.
    pub fn heading(&self) -> String {
        let name = self.name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
        match (&self.body, self.chapter_num) {
            (ChapterBody::Illustrations { .. }, _) => "Illustrations".to_string(),
            (ChapterBody::Text { .. }, n) => format!("Chapter {}", n.unwrap_or(1)),
        }
    }
}

/// A chapter that was left out of a volume, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedChapter {
    pub name: String,
    pub url: String,
    pub reason: String,
}

/// A volume with every reachable chapter resolved.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedVolume {
    pub title: String,
    pub chapters: Vec<ResolvedChapter>,
    pub skipped: Vec<SkippedChapter>,
}

/// Result of a recoverable per-item step. Fatal failures are returned as `Err` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Done(T),
    Skipped { reason: String },
}

impl<T> Outcome<T> {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Done(v) => Some(v),
            Outcome::Skipped { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn chapter(url: &str) -> ChapterRef {
        ChapterRef {
            name: "x".to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn illustrations_segment_is_detected() {
        assert_eq!(
            chapter("https://example.com/novel/illustrations/").kind(),
            ChapterKind::Illustrations
        );
        assert_eq!(
            chapter("https://example.com/illustrations").kind(),
            ChapterKind::Illustrations
        );
    }

    #[test]
    fn illustrations_suffix_is_detected() {
        assert_eq!(
            chapter("https://example.com/volume-2-illustrations/").kind(),
            ChapterKind::Illustrations
        );
    }

    #[test]
    fn text_chapter_urls_stay_text() {
        assert_eq!(
            chapter("https://example.com/volume-2-chapter-1/").kind(),
            ChapterKind::Text
        );
        // Only the path counts, not the query string.
        assert_eq!(
            chapter("https://example.com/ch-1/?from=illustrations").kind(),
            ChapterKind::Text
        );
        assert_eq!(
            chapter("https://example.com/my-illustrations-notes/").kind(),
            ChapterKind::Text
        );
    }

    #[test]
    fn relative_urls_are_classified_by_path() {
        assert_eq!(
            chapter("/v1-illustrations/").kind(),
            ChapterKind::Illustrations
        );
        assert_eq!(chapter("/v1-prologue/").kind(), ChapterKind::Text);
    }

    #[test]
    fn volume_number_is_first_digit_run() {
        let v = Volume {
            title: "Volume 12 (Web)".to_string(),
            chapters: vec![],
        };
        assert_eq!(v.number(), Some(12));
        assert_eq!(first_number("Side Stories"), None);
        assert_eq!(first_number("3"), Some(3));
    }

    #[test]
    fn table_rows_are_padded_to_rectangle() {
        let t = Table::from_rows(vec![
            vec!["a".into(), "b".into(), "c".into()],
            vec!["d".into()],
        ]);
        assert_eq!(t.columns(), 3);
        assert_eq!(t.rows[1], vec!["d".to_string(), String::new(), String::new()]);
    }

    #[test]
    fn heading_falls_back_by_kind() {
        let text = ResolvedChapter {
            chapter_num: Some(4),
            name: "  ".to_string(),
            url: String::new(),
            body: ChapterBody::Text {
                content: StructuredContent::default(),
            },
        };
        assert_eq!(text.heading(), "Chapter 4");
        let unnumbered = ResolvedChapter {
            chapter_num: None,
            ..text.clone()
        };
        assert_eq!(unnumbered.heading(), "Chapter 1");
        let gallery = ResolvedChapter {
            chapter_num: None,
            name: String::new(),
            url: String::new(),
            body: ChapterBody::Illustrations { images: vec![] },
        };
        assert_eq!(gallery.heading(), "Illustrations");
        assert_eq!(gallery.kind(), ChapterKind::Illustrations);
    }

    #[test]
    fn resolved_chapter_serializes_kind_tag() -> Result<(), Box<dyn Error>> {
        let ch = ResolvedChapter {
            chapter_num: None,
            name: "Illustrations".to_string(),
            url: "https://example.com/v1-illustrations/".to_string(),
            body: ChapterBody::Illustrations {
                images: vec![ImageRef {
                    src: "a.png".to_string(),
                    ..ImageRef::default()
                }],
            },
        };
        let value: serde_json::Value = serde_json::to_value(&ch)?;
        assert_eq!(value["kind"].as_str(), Some("illustrations"));
        assert!(value["chapter_num"].is_null());
        assert_eq!(value["images"][0]["src"].as_str(), Some("a.png"));
        Ok(())
    }
}
