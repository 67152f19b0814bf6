//! Chapter page extraction.
//!
//! Text chapters are reduced to three buckets (paragraphs, inline images, tables) taken from
//! the direct children of the post content container, after comment sections and the
//! centered "end of chapter" markers around them are removed. Illustrations chapters are
//! reduced to the ordered list of figure images.

use crate::model::{
    ChapterBody, ChapterKind, ChapterRef, ImageRef, Outcome, ResolvedChapter, ResolvedVolume,
    SkippedChapter, StructuredContent, Table, Volume,
};
use crate::scraper::{parse_selector, Fetch, ScraperError};
use scraper::node::Node;
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

/// Primary content container of a chapter page.
const CONTENT_SELECTOR: &str = "div.entry-content.wp-block-post-content";
/// Discussion sections embedded in the content container.
const COMMENTS_SELECTOR: &str = ".wp-block-comments, #comments, .comments-area";

/// How to treat chapters whose page has no content container or nothing extractable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyChapterBehavior {
    /// Keep the chapter; it renders as a heading with no body (default).
    #[default]
    Keep,
    /// Leave the chapter out of the volume and record why.
    Skip,
}

/// Options for resolving a volume: progress callback and empty-chapter handling.
#[derive(Default)]
pub struct ResolveOptions<'a> {
    /// Called with (chapters done, chapters total) before each chapter is fetched.
    pub progress: Option<&'a dyn Fn(u32, u32)>,
    pub empty_chapters: EmptyChapterBehavior,
}

/// Parse chapter HTML into structured content. Returns `Ok(None)` when the page has no
/// content container.
pub fn parse_chapter_html(html: &str) -> Result<Option<StructuredContent>, ScraperError> {
    let mut doc = Html::parse_document(html);
    let container_sel = parse_selector(CONTENT_SELECTOR)?;
    let Some(container_id) = doc.select(&container_sel).next().map(|e| e.id()) else {
        return Ok(None);
    };

    strip_comment_blocks(&mut doc, container_id)?;

    let Some(container) = doc.tree.get(container_id).and_then(ElementRef::wrap) else {
        return Ok(None);
    };
    let img_sel = parse_selector("img")?;
    let table_sel = parse_selector("table")?;
    let caption_sel = parse_selector("figcaption")?;
    let row_sel = parse_selector("tr")?;

    let mut content = StructuredContent::default();
    for child in container.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "p" => {
                let text = text_with_breaks(child);
                if !text.is_empty() {
                    content.paragraphs.push(text);
                }
            }
            "figure" => {
                let classes: Vec<&str> = child.value().classes().collect();
                let is_table = classes.contains(&"wp-block-table")
                    || child.select(&table_sel).next().is_some();
                if is_table {
                    let table = parse_table(child, &row_sel);
                    if !table.rows.is_empty() {
                        content.tables.push(table);
                    }
                } else {
                    content
                        .inline_images
                        .extend(figure_images(child, &img_sel, &caption_sel));
                }
            }
            "img" => {
                if let Some(image) = image_ref(child, String::new()) {
                    content.inline_images.push(image);
                }
            }
            _ => {}
        }
    }
    Ok(Some(content))
}

/// Parse an illustrations page: every figure image in the content container, in document order.
/// A page without the container yields no images.
pub fn parse_illustrations_html(html: &str) -> Result<Vec<ImageRef>, ScraperError> {
    let doc = Html::parse_document(html);
    let container_sel = parse_selector(CONTENT_SELECTOR)?;
    let img_sel = parse_selector("img")?;
    let caption_sel = parse_selector("figcaption")?;

    let Some(container) = doc.select(&container_sel).next() else {
        return Ok(Vec::new());
    };
    Ok(figure_images(container, &img_sel, &caption_sel))
}

/// Fetch a text chapter and extract its content. Fetch failures propagate; a missing
/// content container is `Ok(None)`.
pub fn extract_chapter(
    client: &mut dyn Fetch,
    url: &str,
) -> Result<Option<StructuredContent>, ScraperError> {
    let html = client.fetch_text(url, "chapter page")?;
    parse_chapter_html(&html)
}

/// Fetch an illustrations chapter and extract its gallery.
pub fn extract_illustrations(
    client: &mut dyn Fetch,
    url: &str,
) -> Result<Vec<ImageRef>, ScraperError> {
    let html = client.fetch_text(url, "illustrations page")?;
    parse_illustrations_html(&html)
}

/// Fetch and extract every chapter of a volume.
///
/// Chapters that fail to fetch (or come back empty under [EmptyChapterBehavior::Skip]) are
/// recorded in `skipped` and do not consume a chapter number. Text chapters that survive are
/// numbered 1..N in order; illustrations chapters keep their position without a number.
pub fn resolve_volume(
    client: &mut dyn Fetch,
    volume: &Volume,
    options: &ResolveOptions<'_>,
) -> ResolvedVolume {
    let total = volume.chapters.len() as u32;
    let mut chapters = Vec::with_capacity(volume.chapters.len());
    let mut skipped = Vec::new();
    let mut next_num = 1u32;

    for (i, chapter) in volume.chapters.iter().enumerate() {
        if let Some(progress) = options.progress {
            progress(i as u32 + 1, total);
        }
        match resolve_chapter(client, chapter, options.empty_chapters) {
            Outcome::Done(body) => {
                let chapter_num = match body {
                    ChapterBody::Text { .. } => {
                        next_num += 1;
                        Some(next_num - 1)
                    }
                    ChapterBody::Illustrations { .. } => None,
                };
                chapters.push(ResolvedChapter {
                    chapter_num,
                    name: chapter.name.clone(),
                    url: chapter.url.clone(),
                    body,
                });
            }
            Outcome::Skipped { reason } => {
                warn!(volume = %volume.title, chapter = %chapter.name, url = %chapter.url, %reason, "chapter skipped");
                skipped.push(SkippedChapter {
                    name: chapter.name.clone(),
                    url: chapter.url.clone(),
                    reason,
                });
            }
        }
    }

    debug!(
        volume = %volume.title,
        resolved = chapters.len(),
        skipped = skipped.len(),
        "volume resolved"
    );
    ResolvedVolume {
        title: volume.title.clone(),
        chapters,
        skipped,
    }
}

fn resolve_chapter(
    client: &mut dyn Fetch,
    chapter: &ChapterRef,
    empty: EmptyChapterBehavior,
) -> Outcome<ChapterBody> {
    match chapter.kind() {
        ChapterKind::Illustrations => match extract_illustrations(client, &chapter.url) {
            Ok(images) if images.is_empty() && empty == EmptyChapterBehavior::Skip => {
                Outcome::skipped("illustrations page has no images")
            }
            Ok(images) => Outcome::Done(ChapterBody::Illustrations { images }),
            Err(e) => Outcome::skipped(e.to_string()),
        },
        ChapterKind::Text => match extract_chapter(client, &chapter.url) {
            Ok(Some(content)) if content.is_empty() && empty == EmptyChapterBehavior::Skip => {
                Outcome::skipped("chapter has no content")
            }
            Ok(Some(content)) => Outcome::Done(ChapterBody::Text { content }),
            Ok(None) => {
                if empty == EmptyChapterBehavior::Skip {
                    return Outcome::skipped("missing content container");
                }
                warn!(url = %chapter.url, "missing content container, keeping empty chapter");
                Outcome::Done(ChapterBody::Text {
                    content: StructuredContent::default(),
                })
            }
            Err(e) => Outcome::skipped(e.to_string()),
        },
    }
}

/// Remove comment blocks inside the container together with the nearest centered paragraph
/// on each side. The sibling scan only crosses paragraphs and divs.
fn strip_comment_blocks(
    doc: &mut Html,
    container_id: ego_tree::NodeId,
) -> Result<(), ScraperError> {
    let comments_sel = parse_selector(COMMENTS_SELECTOR)?;
    let mut doomed = Vec::new();
    if let Some(container) = doc.tree.get(container_id).and_then(ElementRef::wrap) {
        for block in container.select(&comments_sel) {
            if let Some(p) = find_centered(block.prev_siblings().filter_map(ElementRef::wrap)) {
                doomed.push(p.id());
            }
            if let Some(p) = find_centered(block.next_siblings().filter_map(ElementRef::wrap)) {
                doomed.push(p.id());
            }
            doomed.push(block.id());
        }
    }
    for id in doomed {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
    Ok(())
}

fn find_centered<'a>(siblings: impl Iterator<Item = ElementRef<'a>>) -> Option<ElementRef<'a>> {
    for sibling in siblings {
        match sibling.value().name() {
            "p" if is_centered(sibling) => return Some(sibling),
            "p" | "div" => continue,
            _ => return None,
        }
    }
    None
}

fn is_centered(p: ElementRef<'_>) -> bool {
    let el = p.value();
    if el.classes().any(|c| c == "has-text-align-center") {
        return true;
    }
    if el.attr("align").map(|a| a.eq_ignore_ascii_case("center")) == Some(true) {
        return true;
    }
    el.attr("style")
        .map(|s| {
            let compact: String = s
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            compact.contains("text-align:center")
        })
        .unwrap_or(false)
}

/// One image per innermost figure under `root` (itself included), in document order.
/// Galleries nest figures inside a wrapping figure; only the inner ones carry images.
fn figure_images(
    root: ElementRef<'_>,
    img_sel: &scraper::Selector,
    caption_sel: &scraper::Selector,
) -> Vec<ImageRef> {
    root.descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "figure" && !has_nested_figure(*e))
        .filter_map(|figure| {
            let img = figure.select(img_sel).next()?;
            let caption = figure
                .select(caption_sel)
                .next()
                .map(|c| c.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            image_ref(img, caption)
        })
        .collect()
}

fn has_nested_figure(figure: ElementRef<'_>) -> bool {
    figure
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|e| e.value().name() == "figure")
}

fn image_ref(img: ElementRef<'_>, caption: String) -> Option<ImageRef> {
    let el = img.value();
    let src = ["src", "data-src", "data-lazy-src"]
        .iter()
        .filter_map(|attr| el.attr(attr))
        .map(str::trim)
        .find(|s| !s.is_empty() && !s.starts_with("data:"))?;
    Some(ImageRef {
        src: src.to_string(),
        alt: el.attr("alt").unwrap_or_default().trim().to_string(),
        caption,
    })
}

fn parse_table(figure: ElementRef<'_>, row_sel: &scraper::Selector) -> Table {
    let rows = figure
        .select(row_sel)
        .map(|tr| {
            tr.children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "td" | "th"))
                .map(text_with_breaks)
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();
    Table::from_rows(rows)
}

/// Element text with `<br>` kept as `\n`; whitespace inside each line is collapsed.
fn text_with_breaks(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(t) => raw.push_str(t),
            Node::Element(e) if e.name() == "br" => raw.push('\n'),
            _ => {}
        }
    }
    raw.split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}
