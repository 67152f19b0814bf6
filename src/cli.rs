//! CLI parsing and orchestration. `list` prints the volumes of a publication; `download`
//! packages selected volumes and copies the result to the output directory. Maps errors to
//! exit codes.

use crate::config::{self, parse_empty_chapter_behavior, parse_page_size, Config};
use crate::package::{PackageOptions, SelectionToken};
use crate::pdf::layout::DEFAULT_MARGIN;
use crate::pdf::{PageGeometry, PageSize};
use crate::scraper::{EmptyChapterBehavior, PoliteClient};
use crate::service::{list_volumes, produce_documents, DownloadRequest, ListVolumesRequest, ServiceError};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_RETRY_BACKOFF_SECS: [u64; 3] = [1, 2, 4];

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("{0}")]
    Output(String),
}

impl CliRunError {
    /// 1 for bad input, 2 for upstream fetch/parse failures, 3 for output failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Service(e) if e.is_client_error() => 1,
            CliRunError::Service(ServiceError::Upstream { .. }) => 2,
            CliRunError::Service(_) | CliRunError::Output(_) => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "web2reader")]
#[command(about = "List the volumes of a serialized web novel and render selected volumes to PDF")]
#[command(
    after_help = "Config file keys (output_dir, scratch_dir, user_agent, request_delay_secs, timeout_secs, retry_count, retry_backoff_secs, empty_chapters, page_size, margin_pt) are read from ./web2reader.toml or the user config dir. CLI flags override config."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Errors only: no progress bar, log level error.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log at info level and print the full error chain.
    #[arg(long, global = true)]
    pub verbose: bool,

    /// HTTP User-Agent (overrides config).
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Delay between requests in seconds (overrides config; default 1).
    #[arg(long, global = true)]
    pub delay: Option<u64>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Root directory for per-job scratch files (overrides config; default: system temp dir).
    #[arg(long, global = true)]
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the volumes found on a listing page.
    List {
        /// Listing page URL.
        url: String,

        /// Print the JSON payload instead of `id. title` lines.
        #[arg(long)]
        json: bool,
    },
    /// Render selected volumes to a document, or a zip when several are selected.
    Download {
        /// Listing page URL.
        url: String,

        /// Volume numbers, comma-separated (e.g. 1,3 or "Volume 2").
        #[arg(short, long, value_delimiter = ',')]
        books: Vec<String>,

        /// Output format: pdf (epub is accepted but not implemented).
        #[arg(long, default_value = "pdf")]
        format: String,

        /// Output directory. Default: output_dir from config, else the current directory.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Chapters with no extractable content: keep or skip (overrides config).
        #[arg(long, value_parser = parse_empty_chapter_behavior)]
        empty_chapters: Option<EmptyChapterBehavior>,

        /// Page size: a4 or letter (overrides config).
        #[arg(long, value_parser = parse_page_size)]
        page_size: Option<PageSize>,

        /// Page margin in points (overrides config).
        #[arg(long)]
        margin: Option<f64>,
    },
}

/// Default log filter for the flags given: error when quiet, info when verbose, else warn.
pub fn default_log_level(args: &Args) -> &'static str {
    if args.quiet {
        "error"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    }
}

fn build_client(args: &Args, config: Option<&Config>) -> Result<PoliteClient, CliRunError> {
    let mut builder = PoliteClient::builder();
    if let Some(delay) = args.delay.or_else(|| config.and_then(|c| c.request_delay_secs)) {
        builder = builder.delay_secs(delay);
    }
    if let Some(timeout) = args.timeout.or_else(|| config.and_then(|c| c.timeout_secs)) {
        builder = builder.timeout_secs(timeout);
    }
    if let Some(count) = config.and_then(|c| c.retry_count) {
        builder = builder.retry_count(count.max(1));
    }
    let backoff = config
        .and_then(|c| c.retry_backoff_secs.clone())
        .unwrap_or_else(|| DEFAULT_RETRY_BACKOFF_SECS.to_vec());
    builder = builder.retry_backoff_secs(backoff);
    if let Some(ua) = args
        .user_agent
        .clone()
        .or_else(|| config.and_then(|c| c.user_agent.clone()))
    {
        builder = builder.user_agent(ua);
    }
    builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))
}

fn scratch_root(args: &Args, config: Option<&Config>) -> PathBuf {
    args.scratch_dir
        .clone()
        .or_else(|| config.and_then(|c| c.scratch_dir.clone()))
        .unwrap_or_else(|| std::env::temp_dir().join("web2reader"))
}

/// Destination directory must exist or be creatable under an existing parent.
fn validate_output_dir(dir: &Path) -> Result<(), CliRunError> {
    if dir.exists() && !dir.is_dir() {
        return Err(CliRunError::InvalidInput(format!(
            "Cannot write output: {} is not a directory.",
            dir.display()
        )));
    }
    if let Some(parent) = dir.parent() {
        if !dir.exists() && !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(CliRunError::InvalidInput(format!(
                "Cannot write output: {}: parent directory does not exist.",
                dir.display()
            )));
        }
    }
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
        .map(|s| {
            s.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .progress_chars("█▉▊▋▌▍▎▏ ")
        })
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let config = config::load_config().map_err(CliRunError::InvalidInput)?;
    let config = config.as_ref();
    let mut client = build_client(args, config)?;

    match &args.command {
        Command::List { url, json } => {
            let summaries = list_volumes(
                &mut client,
                &ListVolumesRequest {
                    url: Some(url.clone()),
                },
            )?;
            if *json {
                let payload = serde_json::to_string_pretty(&summaries)
                    .map_err(|e| CliRunError::Output(format!("Failed to write JSON: {}", e)))?;
                println!("{}", payload);
            } else {
                for volume in &summaries {
                    println!("{}. {}", volume.id, volume.title);
                }
            }
            Ok(())
        }
        Command::Download {
            url,
            books,
            format,
            output,
            empty_chapters,
            page_size,
            margin,
        } => {
            let dest_dir = output
                .clone()
                .or_else(|| config.and_then(|c| c.output_dir.clone()))
                .unwrap_or_else(|| PathBuf::from("."));
            validate_output_dir(&dest_dir)?;

            let empty_chapters = match empty_chapters {
                Some(b) => *b,
                None => config
                    .map(Config::empty_chapter_behavior)
                    .transpose()
                    .map_err(CliRunError::InvalidInput)?
                    .flatten()
                    .unwrap_or_default(),
            };
            let page_size = match page_size {
                Some(p) => *p,
                None => config
                    .map(Config::page_size)
                    .transpose()
                    .map_err(CliRunError::InvalidInput)?
                    .flatten()
                    .unwrap_or_default(),
            };
            let margin = margin
                .or_else(|| config.and_then(|c| c.margin_pt))
                .unwrap_or(DEFAULT_MARGIN);

            let request = DownloadRequest {
                url: Some(url.clone()),
                selected_books: Some(
                    books
                        .iter()
                        .map(|b| b.trim())
                        .filter(|b| !b.is_empty())
                        .map(|b| SelectionToken::Text(b.to_string()))
                        .collect(),
                ),
                format: Some(format.clone()),
            };

            let bar: RefCell<Option<ProgressBar>> = RefCell::new(None);
            let current = RefCell::new(String::new());
            let on_volume = |title: &str| {
                *current.borrow_mut() = title.to_string();
                if let Some(pb) = bar.borrow().as_ref() {
                    pb.set_position(0);
                }
            };
            let progress_cb = |n: u32, total: u32| {
                if total == 0 {
                    return;
                }
                let mut state = bar.borrow_mut();
                let pb = state.get_or_insert_with(progress_bar);
                pb.set_length(total as u64);
                pb.set_position(n as u64);
                pb.set_message(format!("{}: chapter {}/{}", current.borrow(), n, total));
            };
            let on_volume: Option<&dyn Fn(&str)> = if args.quiet { None } else { Some(&on_volume) };
            let progress: Option<&dyn Fn(u32, u32)> =
                if args.quiet { None } else { Some(&progress_cb) };
            let options = PackageOptions {
                on_volume,
                progress,
                empty_chapters,
                geometry: PageGeometry::new(page_size, margin),
            };

            let result = produce_documents(
                &mut client,
                &scratch_root(args, config),
                &request,
                &options,
                &dest_dir,
            );
            if let Some(pb) = bar.borrow_mut().take() {
                pb.disable_steady_tick();
                pb.finish_and_clear();
            }
            let deliverable = result?;
            if !args.quiet {
                eprintln!("Wrote {}", deliverable.path.display());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageError;
    use crate::scraper::ScraperError;

    #[test]
    fn parse_download_arguments() {
        let args = Args::try_parse_from([
            "web2reader",
            "--quiet",
            "download",
            "https://example.com/novel/",
            "--books",
            "1,3",
            "--page-size",
            "letter",
            "-o",
            "out",
        ])
        .unwrap();
        assert!(args.quiet);
        match args.command {
            Command::Download {
                url,
                books,
                format,
                output,
                page_size,
                empty_chapters,
                ..
            } => {
                assert_eq!(url, "https://example.com/novel/");
                assert_eq!(books, vec!["1", "3"]);
                assert_eq!(format, "pdf");
                assert_eq!(output, Some(PathBuf::from("out")));
                assert_eq!(page_size, Some(PageSize::Letter));
                assert_eq!(empty_chapters, None);
            }
            other => panic!("expected download, got {:?}", other),
        }
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let args =
            Args::try_parse_from(["web2reader", "list", "https://example.com/", "--json", "--verbose"])
                .unwrap();
        assert!(args.verbose);
        assert!(matches!(args.command, Command::List { json: true, .. }));
        assert_eq!(default_log_level(&args), "info");
    }

    #[test]
    fn invalid_page_size_is_rejected_by_parser() {
        let result = Args::try_parse_from([
            "web2reader",
            "download",
            "https://example.com/",
            "--page-size",
            "a3",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn default_log_levels() {
        let quiet = Args::try_parse_from(["web2reader", "-q", "list", "https://example.com/"]).unwrap();
        assert_eq!(default_log_level(&quiet), "error");
        let plain = Args::try_parse_from(["web2reader", "list", "https://example.com/"]).unwrap();
        assert_eq!(default_log_level(&plain), "warn");
    }

    #[test]
    fn validate_output_dir_parent_missing() {
        let path = PathBuf::from("/nonexistent_dir_web2reader_xyz/out");
        let result = validate_output_dir(&path);
        assert!(matches!(result, Err(CliRunError::InvalidInput(ref msg)) if msg.contains("parent directory does not exist")));
        assert!(validate_output_dir(&std::env::temp_dir()).is_ok());
    }

    #[test]
    fn cli_run_error_exit_codes() {
        assert_eq!(CliRunError::InvalidInput("x".into()).exit_code(), 1);
        assert_eq!(
            CliRunError::Service(ServiceError::Invalid("No books selected".into())).exit_code(),
            1
        );
        assert_eq!(
            CliRunError::Service(PackageError::NoValidBooks.into()).exit_code(),
            1
        );
        assert_eq!(
            CliRunError::Service(ServiceError::Upstream {
                source: ScraperError::NoVolumes
            })
            .exit_code(),
            2
        );
        assert_eq!(
            CliRunError::Service(PackageError::NoDocumentsCreated.into()).exit_code(),
            3
        );
        assert_eq!(CliRunError::Output("x".into()).exit_code(), 3);
    }

    #[test]
    fn scratch_root_prefers_flag_then_config() {
        let args = Args::try_parse_from([
            "web2reader",
            "--scratch-dir",
            "/tmp/flag",
            "list",
            "https://example.com/",
        ])
        .unwrap();
        let config = Config {
            scratch_dir: Some(PathBuf::from("/tmp/config")),
            ..Config::default()
        };
        assert_eq!(scratch_root(&args, Some(&config)), PathBuf::from("/tmp/flag"));
        let args = Args::try_parse_from(["web2reader", "list", "https://example.com/"]).unwrap();
        assert_eq!(scratch_root(&args, Some(&config)), PathBuf::from("/tmp/config"));
    }
}
