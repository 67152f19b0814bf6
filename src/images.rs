//! Image acquisition: resolve an image URL, download it into scratch storage under a
//! deterministic name, and report failures as values instead of errors.

use crate::model::ImageRef;
use crate::scraper::Fetch;
use reqwest::Url;
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_EXTENSION: &str = ".jpg";

/// Result of acquiring one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquired {
    Local(PathBuf),
    Unavailable { reason: String },
}

impl Acquired {
    fn unavailable(reason: impl Into<String>) -> Self {
        Acquired::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Extension (with the dot) taken from the URL path, `.jpg` when absent or implausible.
pub fn image_extension(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(u) => u.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    Path::new(&path)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Deterministic scratch name for image `image_index` of chapter `chapter_index` in a volume.
pub fn image_base_name(volume_slug: &str, chapter_index: usize, image_index: usize) -> String {
    format!("{}_c{:03}_i{:03}", volume_slug, chapter_index, image_index)
}

/// Download `image` to `{scratch_dir}/{base_name}{ext}`.
///
/// Relative sources are resolved against `base_url` (the chapter page). Any network or
/// filesystem failure yields [Acquired::Unavailable]; nothing is propagated.
pub fn acquire(
    client: &mut dyn Fetch,
    image: &ImageRef,
    base_url: Option<&str>,
    scratch_dir: &Path,
    base_name: &str,
) -> Acquired {
    let src = image.src.trim();
    if src.is_empty() {
        return Acquired::unavailable("image has no source");
    }
    let url = match Url::parse(src) {
        Ok(u) => u,
        Err(_) => {
            let joined = base_url
                .and_then(|b| Url::parse(b).ok())
                .and_then(|b| b.join(src).ok());
            match joined {
                Some(u) => u,
                None => return Acquired::unavailable(format!("cannot resolve image URL '{}'", src)),
            }
        }
    };

    if let Err(e) = std::fs::create_dir_all(scratch_dir) {
        return Acquired::unavailable(format!(
            "cannot create {}: {}",
            scratch_dir.display(),
            e
        ));
    }
    let bytes = match client.fetch_bytes(url.as_str()) {
        Ok(b) => b,
        Err(e) => return Acquired::unavailable(e.to_string()),
    };
    let path = scratch_dir.join(format!("{}{}", base_name, image_extension(url.as_str())));
    if let Err(e) = std::fs::write(&path, &bytes) {
        return Acquired::unavailable(format!("cannot write {}: {}", path.display(), e));
    }
    debug!(url = %url, path = %path.display(), bytes = bytes.len(), "image downloaded");
    Acquired::Local(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::testing::MapFetcher;
    use tempfile::TempDir;

    #[test]
    fn extension_comes_from_url_path() {
        assert_eq!(image_extension("https://cdn.example.com/a/b.PNG?w=300"), ".png");
        assert_eq!(image_extension("https://cdn.example.com/a/b.webp"), ".webp");
        assert_eq!(image_extension("https://cdn.example.com/a/image"), ".jpg");
        assert_eq!(image_extension("https://cdn.example.com/a.b/image"), ".jpg");
        assert_eq!(image_extension("/local/pic.gif#x"), ".gif");
    }

    #[test]
    fn base_name_is_deterministic() {
        assert_eq!(image_base_name("volume-2", 3, 0), "volume-2_c003_i000");
        assert_eq!(image_base_name("volume-2", 3, 0), image_base_name("volume-2", 3, 0));
    }

    #[test]
    fn acquire_downloads_relative_source_into_scratch() -> std::io::Result<()> {
        let scratch = TempDir::new()?;
        let dir = scratch.path().join("images");
        let mut client =
            MapFetcher::new().bytes("https://example.com/wp-content/map.png", vec![1, 2, 3]);
        let image = ImageRef {
            src: "/wp-content/map.png".to_string(),
            ..ImageRef::default()
        };
        let result = acquire(
            &mut client,
            &image,
            Some("https://example.com/v1-chapter-1/"),
            &dir,
            "volume-1_c001_i000",
        );
        let expected = dir.join("volume-1_c001_i000.png");
        assert_eq!(result, Acquired::Local(expected.clone()));
        assert_eq!(std::fs::read(expected)?, vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn acquire_reports_failures_as_unavailable() -> std::io::Result<()> {
        let scratch = TempDir::new()?;
        let mut client = MapFetcher::new();
        let missing = ImageRef {
            src: "https://example.com/missing.jpg".to_string(),
            ..ImageRef::default()
        };
        let result = acquire(&mut client, &missing, None, scratch.path(), "x");
        assert!(matches!(result, Acquired::Unavailable { ref reason } if reason.contains("404")));

        let relative = ImageRef {
            src: "pic.jpg".to_string(),
            ..ImageRef::default()
        };
        let result = acquire(&mut client, &relative, None, scratch.path(), "y");
        assert!(matches!(result, Acquired::Unavailable { .. }));
        Ok(())
    }
}
