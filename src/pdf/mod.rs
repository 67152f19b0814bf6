//! PDF composer. Lays out one resolved volume (title page, then each chapter followed by a
//! page break) and writes it to the job's downloads directory.

mod fonts;
pub mod layout;
mod render;

pub use layout::{scale_to_fit, PageGeometry, PageSize};

use crate::formats::sanitize_title;
use crate::images::{acquire, image_base_name, Acquired};
use crate::job::Job;
use crate::model::{ChapterBody, ImageRef, ResolvedChapter, ResolvedVolume, StructuredContent};
use crate::scraper::Fetch;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use layout::{Layout, TextStyle};
use render::{render_pdf, PreparedImage};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Inline images are bounded to this share of the content width and height.
const INLINE_WIDTH_SHARE: f64 = 0.6;
const INLINE_HEIGHT_SHARE: f64 = 0.4;

const TITLE_SPACER: f64 = 24.0;
const HEADING_SPACER: f64 = 12.0;
const PARAGRAPH_SPACER: f64 = 6.0;
const BLOCK_SPACER: f64 = 8.0;
/// Below this share of the content height, the first illustration goes to a fresh page at
/// full size instead of being squeezed under the heading.
const MIN_FIRST_IMAGE_SHARE: f64 = 0.25;

/// Errors from composing a volume.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("Cannot compose '{title}': volume has no chapters.")]
    NoChapters { title: String },

    #[error("Failed to write document: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Lay out `volume` and write `{downloads}/{sanitized title}.pdf`. A title whose slug is
/// already taken in the job gets a `-2`, `-3`, ... suffix.
///
/// Images are downloaded into the job's image directory as they are placed. An image that
/// cannot be fetched or decoded is replaced by a one-line placeholder; it never fails the
/// volume.
pub fn compose(
    client: &mut dyn Fetch,
    job: &Job,
    volume: &ResolvedVolume,
    geometry: &PageGeometry,
) -> Result<PathBuf, ComposeError> {
    if volume.chapters.is_empty() {
        return Err(ComposeError::NoChapters {
            title: volume.title.clone(),
        });
    }

    let slug = unique_stem(job.downloads_dir(), &sanitize_title(&volume.title));
    let mut composer = Composer {
        client,
        images_dir: job.images_dir(),
        slug: &slug,
        layout: Layout::new(*geometry),
        images: Vec::new(),
    };
    composer.title_page(&volume.title);
    for (index, chapter) in volume.chapters.iter().enumerate() {
        composer.chapter(index, chapter);
        composer.layout.page_break();
    }

    let image_count = composer.images.len();
    let images = composer.images;
    let pages = composer.layout.finish();
    let bytes = render_pdf(&volume.title, geometry, &pages, &images);

    let path = job.downloads_dir().join(format!("{}.pdf", slug));
    std::fs::write(&path, bytes).map_err(|e| ComposeError::Io {
        path: path.clone(),
        source: e,
    })?;
    info!(
        volume = %volume.title,
        pages = pages.len(),
        images = image_count,
        path = %path.display(),
        "document written"
    );
    Ok(path)
}

/// `stem`, or `stem-N` for the first N from 2 whose PDF does not exist yet in `dir`.
fn unique_stem(dir: &Path, stem: &str) -> String {
    let mut candidate = stem.to_string();
    let mut n = 1;
    while dir.join(format!("{}.pdf", candidate)).exists() {
        n += 1;
        candidate = format!("{}-{}", stem, n);
    }
    candidate
}

struct Composer<'a> {
    client: &'a mut dyn Fetch,
    images_dir: &'a Path,
    slug: &'a str,
    layout: Layout,
    images: Vec<PreparedImage>,
}

impl Composer<'_> {
    fn title_page(&mut self, title: &str) {
        self.layout.text(title, TextStyle::TITLE);
        self.layout.spacer(TITLE_SPACER);
    }

    fn chapter(&mut self, index: usize, chapter: &ResolvedChapter) {
        let heading = chapter.heading();
        match &chapter.body {
            ChapterBody::Text { content } => self.text_chapter(index, chapter, &heading, content),
            ChapterBody::Illustrations { images } => {
                self.illustrations_chapter(index, chapter, &heading, images)
            }
        }
    }

    /// Paragraphs, then inline images, then tables.
    fn text_chapter(
        &mut self,
        index: usize,
        chapter: &ResolvedChapter,
        heading: &str,
        content: &StructuredContent,
    ) {
        self.heading(heading);
        for paragraph in &content.paragraphs {
            if paragraph.trim().is_empty() {
                continue;
            }
            self.layout.text(paragraph, TextStyle::BODY);
            self.layout.spacer(PARAGRAPH_SPACER);
        }

        let geometry = *self.layout.geometry();
        let max_w = geometry.content_width() * INLINE_WIDTH_SHARE;
        let max_h = geometry.content_height() * INLINE_HEIGHT_SHARE;
        for (image_index, image) in content.inline_images.iter().enumerate() {
            self.place_image(index, image_index, image, &chapter.url, max_w, max_h);
            self.layout.spacer(BLOCK_SPACER);
        }

        for table in &content.tables {
            self.layout.table(table);
            self.layout.spacer(BLOCK_SPACER);
        }
    }

    /// Images one after another at full content size. The first image is bounded by what
    /// is left below the heading so it shares the heading's page.
    fn illustrations_chapter(
        &mut self,
        index: usize,
        chapter: &ResolvedChapter,
        heading: &str,
        images: &[ImageRef],
    ) {
        self.heading(heading);
        let geometry = *self.layout.geometry();
        let max_w = geometry.content_width();
        let below_heading = self.layout.remaining();
        let room_for_first = below_heading >= geometry.content_height() * MIN_FIRST_IMAGE_SHARE;
        for (image_index, image) in images.iter().enumerate() {
            let max_h = if image_index == 0 && room_for_first {
                below_heading
            } else {
                geometry.content_height()
            };
            self.place_image(index, image_index, image, &chapter.url, max_w, max_h);
        }
    }

    fn heading(&mut self, text: &str) {
        self.layout.text(text, TextStyle::HEADING);
        self.layout.spacer(HEADING_SPACER);
    }

    fn place_image(
        &mut self,
        chapter_index: usize,
        image_index: usize,
        image: &ImageRef,
        base_url: &str,
        max_w: f64,
        max_h: f64,
    ) {
        let base_name = image_base_name(self.slug, chapter_index, image_index);
        let prepared = match acquire(
            self.client,
            image,
            Some(base_url),
            self.images_dir,
            &base_name,
        ) {
            Acquired::Local(path) => prepare_image(&path),
            Acquired::Unavailable { reason } => Err(reason),
        };
        let scaled = prepared.and_then(|p| {
            scale_to_fit(p.width as f64, p.height as f64, max_w, max_h)
                .map(|dims| (p, dims))
                .ok_or_else(|| "image has no size".to_string())
        });
        match scaled {
            Ok((prepared, (width, height))) => {
                debug!(src = %image.src, width, height, "placing image");
                let slot = self.images.len();
                self.images.push(prepared);
                self.layout.image(slot, width, height);
                if !image.caption.trim().is_empty() {
                    self.layout.text(image.caption.trim(), TextStyle::CAPTION);
                }
            }
            Err(reason) => {
                warn!(src = %image.src, %reason, "image unavailable, using placeholder");
                self.layout.text(&placeholder_text(image), TextStyle::BODY);
            }
        }
    }
}

/// `[Image: {alt}]`, or a generic description when there is no alt text.
pub fn placeholder_text(image: &ImageRef) -> String {
    let alt = image.alt.trim();
    if alt.is_empty() {
        "[Image: no description]".to_string()
    } else {
        format!("[Image: {}]", alt)
    }
}

/// Decode an image file and compress its RGB samples for embedding.
fn prepare_image(path: &Path) -> Result<PreparedImage, String> {
    let decoded = image::open(path).map_err(|e| format!("cannot decode {}: {}", path.display(), e))?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(rgb.as_raw())
        .map_err(|e| format!("cannot compress {}: {}", path.display(), e))?;
    let data = encoder
        .finish()
        .map_err(|e| format!("cannot compress {}: {}", path.display(), e))?;
    Ok(PreparedImage {
        width,
        height,
        data,
    })
}
