//! web2reader: list the volumes of a serialized web novel and render selected volumes to PDF.

pub mod cli;
pub mod config;
pub mod formats;
pub mod images;
pub mod job;
pub mod model;
pub mod package;
pub mod pdf;
pub mod scraper;
pub mod service;

// Re-exports for CLI and consumers.
pub use formats::OutputFormat;
pub use job::Job;
pub use package::{package, Deliverable, PackageError, PackageOptions, SelectionToken};
pub use pdf::{compose, ComposeError, PageGeometry, PageSize};
pub use scraper::{
    fetch_listing, resolve_volume, EmptyChapterBehavior, Fetch, PoliteClient, PoliteClientBuilder,
    ResolveOptions, ScraperError,
};
pub use service::{list_volumes, produce_documents, DownloadRequest, ListVolumesRequest, ServiceError};
