//! Request/response contracts for the two public operations: listing the volumes of a
//! publication and producing documents for a selection of them.
//!
//! Errors carry an HTTP-style status and serialize to `{"error": "..."}` so any transport
//! can hand them back unchanged.

use crate::formats::OutputFormat;
use crate::job::Job;
use crate::package::{package, selection_numbers, Deliverable, PackageError, PackageOptions, SelectionToken};
use crate::scraper::{fetch_listing, validate_url, Fetch, ScraperError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const INVALID_URL: &str = "Invalid url";
const NO_BOOKS: &str = "No books selected";
const NO_FORMAT: &str = "No format selected";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListVolumesRequest {
    pub url: Option<String>,
}

/// One listed volume. `id` is the 1-based position on the listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSummary {
    pub id: usize,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: Option<String>,
    #[serde(rename = "selectedBooks")]
    pub selected_books: Option<Vec<SelectionToken>>,
    pub format: Option<String>,
}

/// JSON error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or incomplete request.
    #[error("{0}")]
    Invalid(String),

    #[error("Failed to fetch or parse the webpage")]
    Upstream {
        #[source]
        source: ScraperError,
    },

    #[error("{0}")]
    Package(#[from] PackageError),

    #[error("Failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ServiceError {
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }

    pub fn is_client_error(&self) -> bool {
        match self {
            ServiceError::Invalid(_) => true,
            ServiceError::Package(e) => e.is_client_error(),
            ServiceError::Upstream { .. } | ServiceError::Io { .. } => false,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
        }
    }
}

fn require_url(url: Option<&str>) -> Result<String, ServiceError> {
    let raw = url.ok_or_else(|| ServiceError::Invalid(INVALID_URL.to_string()))?;
    validate_url(raw)
        .map(|u| u.to_string())
        .map_err(|_| ServiceError::Invalid(INVALID_URL.to_string()))
}

/// List the volumes on the page at `request.url`.
pub fn list_volumes(
    client: &mut dyn Fetch,
    request: &ListVolumesRequest,
) -> Result<Vec<VolumeSummary>, ServiceError> {
    let url = require_url(request.url.as_deref())?;
    let volumes = fetch_listing(client, &url).map_err(|source| ServiceError::Upstream { source })?;
    Ok(volumes
        .into_iter()
        .enumerate()
        .map(|(i, v)| VolumeSummary {
            id: i + 1,
            title: v.title,
        })
        .collect())
}

/// Produce the document or archive for `request` and copy it into `dest_dir`.
///
/// The request is checked before any network access: books, then format, then url. Work
/// happens in a fresh job under `scratch_root`, which is gone when this returns.
pub fn produce_documents(
    client: &mut dyn Fetch,
    scratch_root: &Path,
    request: &DownloadRequest,
    options: &PackageOptions<'_>,
    dest_dir: &Path,
) -> Result<Deliverable, ServiceError> {
    let tokens = match &request.selected_books {
        Some(tokens) if !tokens.is_empty() => tokens,
        _ => return Err(ServiceError::Invalid(NO_BOOKS.to_string())),
    };
    let format = request
        .format
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ServiceError::Invalid(NO_FORMAT.to_string()))?;
    let url = require_url(request.url.as_deref())?;
    let format: OutputFormat = format.parse().map_err(ServiceError::Invalid)?;
    if format == OutputFormat::Epub {
        return Err(PackageError::UnsupportedFormat { format }.into());
    }

    let volumes = fetch_listing(client, &url).map_err(|source| ServiceError::Upstream { source })?;
    let selection = selection_numbers(tokens);
    let job = Job::create(scratch_root).map_err(|e| ServiceError::Io {
        path: scratch_root.to_path_buf(),
        source: e,
    })?;
    let deliverable = package(client, &job, &volumes, &selection, format, options)?;

    std::fs::create_dir_all(dest_dir).map_err(|e| ServiceError::Io {
        path: dest_dir.to_path_buf(),
        source: e,
    })?;
    let target = dest_dir.join(&deliverable.file_name);
    std::fs::copy(&deliverable.path, &target).map_err(|e| ServiceError::Io {
        path: target.clone(),
        source: e,
    })?;
    info!(job = %job.id(), path = %target.display(), "deliverable copied");
    Ok(Deliverable {
        path: target,
        ..deliverable
    })
}
