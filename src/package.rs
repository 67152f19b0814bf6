//! Batch packaging: select volumes by number, resolve and compose each, and hand back either
//! the single document or a zip archive of all of them.

use crate::formats::{timestamp, timestamped_file_name, OutputFormat};
use crate::job::Job;
use crate::model::{first_number, Volume};
use crate::pdf::{compose, PageGeometry};
use crate::scraper::{resolve_volume, EmptyChapterBehavior, Fetch, ResolveOptions};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("{format} format is not implemented")]
    UnsupportedFormat { format: OutputFormat },

    #[error("No valid books found for the selection")]
    NoValidBooks,

    #[error("No documents were created")]
    NoDocumentsCreated,

    #[error("Failed to write archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PackageError {
    /// Errors caused by the request rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PackageError::NoValidBooks)
    }
}

/// One entry of a volume selection: `3` or `"Volume 3"` both select volume 3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectionToken {
    Number(u64),
    Text(String),
}

impl SelectionToken {
    /// The volume number the token names, if any.
    pub fn number(&self) -> Option<u32> {
        match self {
            SelectionToken::Number(n) => u32::try_from(*n).ok(),
            SelectionToken::Text(s) => first_number(s),
        }
    }
}

/// Volume numbers named by `tokens`; tokens without a number are ignored.
pub fn selection_numbers(tokens: &[SelectionToken]) -> Vec<u32> {
    tokens.iter().filter_map(SelectionToken::number).collect()
}

/// Volumes whose title number is in `selection`, in listing order.
pub fn select_volumes<'v>(volumes: &'v [Volume], selection: &[u32]) -> Vec<&'v Volume> {
    volumes
        .iter()
        .filter(|v| v.number().is_some_and(|n| selection.contains(&n)))
        .collect()
}

/// Knobs for one packaging pass.
#[derive(Default)]
pub struct PackageOptions<'a> {
    /// Called with the volume title before it is resolved.
    pub on_volume: Option<&'a dyn Fn(&str)>,
    /// Called with (chapters done, chapters total) while a volume resolves.
    pub progress: Option<&'a dyn Fn(u32, u32)>,
    pub empty_chapters: EmptyChapterBehavior,
    pub geometry: PageGeometry,
}

/// The file handed back to the caller. Lives in the job's downloads directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deliverable {
    pub path: PathBuf,
    pub file_name: String,
    pub content_type: &'static str,
}

/// Produce the deliverable for `selection` out of `volumes`.
///
/// Volumes that fail to compose are logged and dropped. The image cache is cleared
/// whatever the outcome.
pub fn package(
    client: &mut dyn Fetch,
    job: &Job,
    volumes: &[Volume],
    selection: &[u32],
    format: OutputFormat,
    options: &PackageOptions<'_>,
) -> Result<Deliverable, PackageError> {
    let result = build(client, job, volumes, selection, format, options);
    job.clear_images();
    result
}

fn build(
    client: &mut dyn Fetch,
    job: &Job,
    volumes: &[Volume],
    selection: &[u32],
    format: OutputFormat,
    options: &PackageOptions<'_>,
) -> Result<Deliverable, PackageError> {
    if format == OutputFormat::Epub {
        return Err(PackageError::UnsupportedFormat { format });
    }
    let selected = select_volumes(volumes, selection);
    if selected.is_empty() {
        return Err(PackageError::NoValidBooks);
    }
    info!(job = %job.id(), volumes = selected.len(), "packaging started");

    let resolve_options = ResolveOptions {
        progress: options.progress,
        empty_chapters: options.empty_chapters,
    };
    let mut documents = Vec::new();
    for volume in selected {
        if let Some(on_volume) = options.on_volume {
            on_volume(&volume.title);
        }
        let resolved = resolve_volume(client, volume, &resolve_options);
        match compose(client, job, &resolved, &options.geometry) {
            Ok(path) => documents.push((volume.title.clone(), path)),
            Err(e) => warn!(volume = %volume.title, error = %e, "volume dropped"),
        }
    }

    let now = Utc::now();
    match documents.len() {
        0 => Err(PackageError::NoDocumentsCreated),
        1 => {
            let (title, path) = documents.remove(0);
            let file_name = timestamped_file_name(&title, now, format.extension());
            let target = job.downloads_dir().join(&file_name);
            std::fs::rename(&path, &target).map_err(|e| PackageError::Io {
                path: target.clone(),
                source: e,
            })?;
            info!(path = %target.display(), "single document ready");
            Ok(Deliverable {
                path: target,
                file_name,
                content_type: format.content_type(),
            })
        }
        _ => {
            let file_name = format!("volumes_{}.zip", timestamp(now));
            let target = job.downloads_dir().join(&file_name);
            let paths: Vec<PathBuf> = documents.into_iter().map(|(_, p)| p).collect();
            write_archive(&target, &paths)?;
            for path in &paths {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "could not remove packaged document");
                }
            }
            info!(path = %target.display(), documents = paths.len(), "archive ready");
            Ok(Deliverable {
                path: target,
                file_name,
                content_type: ARCHIVE_CONTENT_TYPE,
            })
        }
    }
}

/// Deflated zip with one entry per document, named by the document's file name.
fn write_archive(target: &Path, documents: &[PathBuf]) -> Result<(), PackageError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |e: std::io::Error| PackageError::Io { path, source: e }
    };
    let file = File::create(target).map_err(io_err(target))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);
    for path in documents {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        let data = std::fs::read(path).map_err(io_err(path.as_path()))?;
        zip.start_file(name, options)?;
        zip.write_all(&data).map_err(io_err(target))?;
    }
    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChapterRef;
    use crate::scraper::testing::MapFetcher;
    use tempfile::TempDir;
    use zip::ZipArchive;

    const CHAPTER_HTML: &str = r#"<html><body>
        <div class="entry-content wp-block-post-content"><p>Once upon a time.</p></div>
    </body></html>"#;

    fn volume(title: &str, urls: &[&str]) -> Volume {
        Volume {
            title: title.to_string(),
            chapters: urls
                .iter()
                .enumerate()
                .map(|(i, u)| ChapterRef {
                    name: format!("Chapter {}", i + 1),
                    url: u.to_string(),
                })
                .collect(),
        }
    }

    fn fixture() -> (MapFetcher, Vec<Volume>) {
        let client = MapFetcher::new()
            .page("https://example.com/v1c1/", CHAPTER_HTML)
            .page("https://example.com/v2c1/", CHAPTER_HTML)
            .page("https://example.com/v3c1/", CHAPTER_HTML);
        let volumes = vec![
            volume("Volume 1", &["https://example.com/v1c1/"]),
            volume("Volume 2", &["https://example.com/v2c1/"]),
            volume("Volume 3", &["https://example.com/v3c1/"]),
        ];
        (client, volumes)
    }

    #[test]
    fn selection_tokens_accept_numbers_and_strings() -> Result<(), serde_json::Error> {
        let tokens: Vec<SelectionToken> = serde_json::from_str(r#"[1, "3", "Volume 4", "x"]"#)?;
        assert_eq!(selection_numbers(&tokens), vec![1, 3, 4]);
        Ok(())
    }

    #[test]
    fn select_volumes_filters_by_title_number() {
        let (_, volumes) = fixture();
        let titles: Vec<&str> = select_volumes(&volumes, &[3, 1, 9])
            .iter()
            .map(|v| v.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Volume 1", "Volume 3"]);
    }

    #[test]
    fn single_selection_returns_one_pdf() -> Result<(), Box<dyn std::error::Error>> {
        let scratch = TempDir::new()?;
        let job = Job::create(scratch.path())?;
        let (mut client, volumes) = fixture();
        let deliverable = package(
            &mut client,
            &job,
            &volumes,
            &[2],
            OutputFormat::Pdf,
            &PackageOptions::default(),
        )?;
        assert_eq!(deliverable.content_type, "application/pdf");
        assert!(deliverable.file_name.starts_with("volume-2_"));
        assert!(deliverable.file_name.ends_with(".pdf"));
        assert!(std::fs::read(&deliverable.path)?.starts_with(b"%PDF-"));
        assert!(!job.images_dir().exists());
        Ok(())
    }

    #[test]
    fn several_selections_return_archive() -> Result<(), Box<dyn std::error::Error>> {
        let scratch = TempDir::new()?;
        let job = Job::create(scratch.path())?;
        let (mut client, volumes) = fixture();
        let deliverable = package(
            &mut client,
            &job,
            &volumes,
            &[1, 3],
            OutputFormat::Pdf,
            &PackageOptions::default(),
        )?;
        assert_eq!(deliverable.content_type, "application/zip");
        assert!(deliverable.file_name.starts_with("volumes_"));
        let mut archive = ZipArchive::new(File::open(&deliverable.path)?)?;
        let mut names: Vec<String> = archive.file_names().map(String::from).collect();
        names.sort();
        assert_eq!(names, vec!["volume-1.pdf", "volume-3.pdf"]);
        assert!(archive.by_name("volume-1.pdf").is_ok());
        assert!(!job.downloads_dir().join("volume-1.pdf").exists());
        Ok(())
    }

    #[test]
    fn titles_with_equal_slugs_both_reach_the_archive() -> Result<(), Box<dyn std::error::Error>> {
        let scratch = TempDir::new()?;
        let job = Job::create(scratch.path())?;
        let (mut client, _) = fixture();
        let volumes = vec![
            volume("Volume 1: Part 1", &["https://example.com/v1c1/"]),
            volume("Volume 1 (Part 1)", &["https://example.com/v2c1/"]),
        ];
        let deliverable = package(
            &mut client,
            &job,
            &volumes,
            &[1],
            OutputFormat::Pdf,
            &PackageOptions::default(),
        )?;
        let archive = ZipArchive::new(File::open(&deliverable.path)?)?;
        let mut names: Vec<String> = archive.file_names().map(String::from).collect();
        names.sort();
        assert_eq!(names, vec!["volume-1-part-1-2.pdf", "volume-1-part-1.pdf"]);
        Ok(())
    }

    #[test]
    fn epub_is_unsupported() -> Result<(), Box<dyn std::error::Error>> {
        let scratch = TempDir::new()?;
        let job = Job::create(scratch.path())?;
        let (mut client, volumes) = fixture();
        let result = package(
            &mut client,
            &job,
            &volumes,
            &[1],
            OutputFormat::Epub,
            &PackageOptions::default(),
        );
        assert!(matches!(result, Err(PackageError::UnsupportedFormat { .. })));
        assert!(client.requests.is_empty());
        Ok(())
    }

    #[test]
    fn unmatched_selection_is_no_valid_books() -> Result<(), Box<dyn std::error::Error>> {
        let scratch = TempDir::new()?;
        let job = Job::create(scratch.path())?;
        let (mut client, volumes) = fixture();
        let result = package(
            &mut client,
            &job,
            &volumes,
            &[7],
            OutputFormat::Pdf,
            &PackageOptions::default(),
        );
        let err = result.err().ok_or("expected an error")?;
        assert!(matches!(err, PackageError::NoValidBooks));
        assert!(err.is_client_error());
        Ok(())
    }

    #[test]
    fn volumes_that_resolve_to_nothing_are_dropped() -> Result<(), Box<dyn std::error::Error>> {
        let scratch = TempDir::new()?;
        let job = Job::create(scratch.path())?;
        let mut client = MapFetcher::new();
        let volumes = vec![volume("Volume 1", &["https://example.com/gone/"])];
        let result = package(
            &mut client,
            &job,
            &volumes,
            &[1],
            OutputFormat::Pdf,
            &PackageOptions::default(),
        );
        assert!(matches!(result, Err(PackageError::NoDocumentsCreated)));
        Ok(())
    }
}
