//! Serialize laid-out pages to PDF bytes.

use super::fonts::{encode_win_ansi, Face};
use super::layout::{Op, Page, PageGeometry};
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, Str, TextStr};

/// Decoded image ready for embedding: zlib-compressed 8-bit RGB samples.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

fn image_name(index: usize) -> String {
    format!("Im{}", index)
}

/// Write a complete PDF with one page per laid-out page. Fonts are the standard Helvetica
/// faces; each image is embedded once and referenced from the pages that draw it.
pub fn render_pdf(
    title: &str,
    geometry: &PageGeometry,
    pages: &[Page],
    images: &[PreparedImage],
) -> Vec<u8> {
    let mut alloc = Ref::new(1);
    let catalog_id = alloc.bump();
    let tree_id = alloc.bump();
    let info_id = alloc.bump();
    let font_ids: Vec<(Face, Ref)> = Face::ALL.iter().map(|f| (*f, alloc.bump())).collect();
    let image_ids: Vec<Ref> = images.iter().map(|_| alloc.bump()).collect();
    let page_ids: Vec<(Ref, Ref)> = pages.iter().map(|_| (alloc.bump(), alloc.bump())).collect();

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(tree_id);
    pdf.pages(tree_id)
        .kids(page_ids.iter().map(|(page, _)| *page))
        .count(pages.len() as i32);
    pdf.document_info(info_id)
        .title(TextStr(title))
        .producer(TextStr("web2reader"));

    for (face, id) in &font_ids {
        pdf.type1_font(*id)
            .base_font(Name(face.base_font()))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
    }

    for (image, id) in images.iter().zip(&image_ids) {
        let mut xobject = pdf.image_xobject(*id, &image.data);
        xobject.filter(Filter::FlateDecode);
        xobject.width(image.width as i32);
        xobject.height(image.height as i32);
        xobject.color_space().device_rgb();
        xobject.bits_per_component(8);
        xobject.finish();
    }

    let media_box = Rect::new(0.0, 0.0, geometry.width as f32, geometry.height as f32);
    for (page, (page_id, content_id)) in pages.iter().zip(&page_ids) {
        let mut page_writer = pdf.page(*page_id);
        page_writer.media_box(media_box);
        page_writer.parent(tree_id);
        page_writer.contents(*content_id);
        {
            let mut resources = page_writer.resources();
            {
                let mut fonts = resources.fonts();
                for (face, id) in &font_ids {
                    fonts.pair(Name(face.resource_name()), *id);
                }
            }
            let mut used: Vec<usize> = page.image_indices().collect();
            used.sort_unstable();
            used.dedup();
            if !used.is_empty() {
                let mut xobjects = resources.x_objects();
                for index in used {
                    if let Some(id) = image_ids.get(index) {
                        let name = image_name(index);
                        xobjects.pair(Name(name.as_bytes()), *id);
                    }
                }
            }
        }
        page_writer.finish();

        let content = page_content(page);
        pdf.stream(*content_id, &content);
    }

    pdf.finish()
}

fn page_content(page: &Page) -> Vec<u8> {
    let mut content = Content::new();
    for op in &page.ops {
        match op {
            Op::Text {
                x,
                y,
                face,
                size,
                gray,
                text,
            } => {
                content.set_fill_gray(*gray as f32);
                content.begin_text();
                content.set_font(Name(face.resource_name()), *size as f32);
                content.next_line(*x as f32, *y as f32);
                content.show(Str(&encode_win_ansi(text)));
                content.end_text();
            }
            Op::Rect {
                x,
                y,
                w,
                h,
                fill,
                stroke,
            } => {
                if let Some(gray) = fill {
                    content.set_fill_gray(*gray as f32);
                    content.rect(*x as f32, *y as f32, *w as f32, *h as f32);
                    content.fill_nonzero();
                }
                if let Some(gray) = stroke {
                    content.set_stroke_gray(*gray as f32);
                    content.set_line_width(0.5);
                    content.rect(*x as f32, *y as f32, *w as f32, *h as f32);
                    content.stroke();
                }
            }
            Op::Image { index, x, y, w, h } => {
                let name = image_name(*index);
                content.save_state();
                content.transform([*w as f32, 0.0, 0.0, *h as f32, *x as f32, *y as f32]);
                content.x_object(Name(name.as_bytes()));
                content.restore_state();
            }
        }
    }
    content.finish().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::layout::{Layout, TextStyle};

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn renders_pages_fonts_and_text() {
        let geometry = PageGeometry::default();
        let mut layout = Layout::new(geometry);
        layout.text("Volume 1", TextStyle::TITLE);
        layout.page_break();
        layout.text("Body text", TextStyle::BODY);
        let pages = layout.finish();
        let bytes = render_pdf("Volume 1", &geometry, &pages, &[]);
        assert!(bytes.starts_with(b"%PDF-"));
        assert!(contains(&bytes, b"/Helvetica-Bold"));
        assert!(contains(&bytes, b"/WinAnsiEncoding"));
        assert!(contains(&bytes, b"(Body text)"));
        assert!(contains(&bytes, b"/Count 2"));
    }

    #[test]
    fn images_are_embedded_once_and_referenced() {
        let geometry = PageGeometry::default();
        let mut layout = Layout::new(geometry);
        layout.image(0, 100.0, 50.0);
        let pages = layout.finish();
        let image = PreparedImage {
            width: 2,
            height: 1,
            data: vec![0x78, 0x9c, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01],
        };
        let bytes = render_pdf("t", &geometry, &pages, &[image]);
        assert!(contains(&bytes, b"/Im0"));
        assert!(contains(&bytes, b"/FlateDecode"));
        assert!(contains(&bytes, b"/DeviceRGB"));
    }
}
