//! Output formats and deliverable file naming.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Requested document format. EPUB is accepted but not produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pdf,
    Epub,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Epub => "epub",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Epub => "application/epub+zip",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    /// Case-insensitive: `pdf`, `PDF`, `Epub`, ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Ok(OutputFormat::Pdf),
            "epub" => Ok(OutputFormat::Epub),
            _ => Err(format!("Unsupported format: {}", s.trim())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Pdf => f.write_str("PDF"),
            OutputFormat::Epub => f.write_str("EPUB"),
        }
    }
}

/// Sanitize a title to a safe filename: lowercase, replace spaces/special with `-`.
pub fn sanitize_title(title: &str) -> String {
    let mut s = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>();
    while s.contains("--") {
        s = s.replace("--", "-");
    }
    s = s.trim_matches('-').to_string();
    if s.is_empty() {
        s = "volume".to_string();
    }
    s
}

/// Timestamp component of deliverable names.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// `{slug}_{timestamp}.{ext}`, e.g. `volume-3_20240101_120000.pdf`.
pub fn timestamped_file_name(stem: &str, at: DateTime<Utc>, ext: &str) -> String {
    format!("{}_{}.{}", sanitize_title(stem), timestamp(at), ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_format_is_case_insensitive() {
        assert_eq!("PDF".parse::<OutputFormat>(), Ok(OutputFormat::Pdf));
        assert_eq!("pdf".parse::<OutputFormat>(), Ok(OutputFormat::Pdf));
        assert_eq!(" Epub ".parse::<OutputFormat>(), Ok(OutputFormat::Epub));
    }

    #[test]
    fn parse_format_rejects_unknown() {
        assert_eq!(
            "docx".parse::<OutputFormat>(),
            Err("Unsupported format: docx".to_string())
        );
    }

    #[test]
    fn sanitize_title_examples() {
        assert_eq!(sanitize_title(""), "volume");
        assert_eq!(sanitize_title("Volume 3"), "volume-3");
        assert_eq!(sanitize_title("  --  a  --  b  --  "), "a-b");
        assert_eq!(sanitize_title("Volume 1: The Start!"), "volume-1-the-start");
    }

    #[test]
    fn timestamped_names_are_deterministic() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            timestamped_file_name("Volume 2", at, "pdf"),
            "volume-2_20240309_070501.pdf"
        );
        assert_eq!(timestamp(at), "20240309_070501");
    }
}
