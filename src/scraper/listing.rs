//! Listing page extraction: volume headings and the chapter links grouped under each.

use crate::model::{ChapterRef, Volume};
use crate::scraper::{parse_selector, resolve_href, validate_url, Fetch, ScraperError};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, info};

fn volume_heading_re() -> Result<&'static Regex, ScraperError> {
    static RE: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = RE.get() {
        return Ok(re);
    }
    let re = Regex::new(r"^Volume\s+\d+").map_err(|e| ScraperError::Parse {
        message: e.to_string(),
    })?;
    Ok(RE.get_or_init(|| re))
}

/// Extract volumes from listing page HTML, in heading order.
///
/// A heading whose trimmed text starts with `Volume <digits>` opens a volume. Its links are
/// the `a[href]` elements inside paragraphs of the first `div` nested in the heading's next
/// sibling `div`. Volumes without that structure or without links are left out. A repeated
/// title replaces the earlier entry's chapters but keeps its position.
///
/// Hrefs are returned as written; [fetch_listing] resolves them against the page URL.
pub fn extract_listing(html: &str) -> Result<Vec<Volume>, ScraperError> {
    let doc = Html::parse_document(html);
    let heading_sel = parse_selector("h1, h2, h3, h4, h5, h6")?;
    let div_sel = parse_selector("div")?;
    let p_sel = parse_selector("p")?;
    let link_sel = parse_selector("a[href]")?;
    let re = volume_heading_re()?;

    let mut volumes: Vec<Volume> = Vec::new();
    for heading in doc.select(&heading_sel) {
        let title = heading.text().collect::<String>().trim().to_string();
        if !re.is_match(&title) {
            continue;
        }
        let container = heading
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "div");
        let Some(inner) = container.and_then(|c| c.select(&div_sel).next()) else {
            debug!(title = %title, "volume heading has no link container");
            continue;
        };

        let mut seen = HashSet::new();
        let mut chapters = Vec::new();
        for p in inner.select(&p_sel) {
            for a in p.select(&link_sel) {
                // Nested paragraphs would otherwise yield the same link twice.
                if !seen.insert(a.id()) {
                    continue;
                }
                let Some(href) = a.value().attr("href") else {
                    continue;
                };
                chapters.push(ChapterRef {
                    name: a.text().collect::<String>().trim().to_string(),
                    url: href.trim().to_string(),
                });
            }
        }
        if chapters.is_empty() {
            debug!(title = %title, "volume heading has no chapter links");
            continue;
        }

        match volumes.iter_mut().find(|v| v.title == title) {
            Some(existing) => existing.chapters = chapters,
            None => volumes.push(Volume { title, chapters }),
        }
    }

    if volumes.is_empty() {
        return Err(ScraperError::NoVolumes);
    }
    Ok(volumes)
}

/// Fetch the listing page at `url`, extract its volumes and make every chapter URL absolute.
pub fn fetch_listing(client: &mut dyn Fetch, url: &str) -> Result<Vec<Volume>, ScraperError> {
    let base = validate_url(url)?;
    let html = client.fetch_text(base.as_str(), "listing page")?;
    let mut volumes = extract_listing(&html)?;
    for volume in &mut volumes {
        for chapter in &mut volume.chapters {
            chapter.url = resolve_href(Some(&base), &chapter.url);
        }
    }
    info!(
        url,
        volumes = volumes.len(),
        chapters = volumes.iter().map(|v| v.chapters.len()).sum::<usize>(),
        "listing extracted"
    );
    Ok(volumes)
}
