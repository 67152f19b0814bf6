//! Page layout: geometry, image scaling, text wrapping and a top-down flow cursor that
//! emits positioned drawing operations page by page.

use super::fonts::{text_width, Face};
use crate::model::Table;

/// Physical page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    #[default]
    A4,
    Letter,
}

impl PageSize {
    /// Width and height in points.
    pub fn dimensions(self) -> (f64, f64) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::Letter => (612.0, 792.0),
        }
    }
}

/// Page size and margins. The content box is the page minus the margin on every side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
}

pub const DEFAULT_MARGIN: f64 = 56.0;

impl Default for PageGeometry {
    fn default() -> Self {
        Self::new(PageSize::A4, DEFAULT_MARGIN)
    }
}

impl PageGeometry {
    pub fn new(size: PageSize, margin: f64) -> Self {
        let (width, height) = size.dimensions();
        let margin = margin.clamp(0.0, width.min(height) / 4.0);
        Self {
            width,
            height,
            margin,
        }
    }

    /// Content width `W`.
    pub fn content_width(&self) -> f64 {
        self.width - 2.0 * self.margin
    }

    /// Content height `H`.
    pub fn content_height(&self) -> f64 {
        self.height - 2.0 * self.margin
    }
}

/// Scale `(w0, h0)` into `(max_w, max_h)` keeping the aspect ratio.
///
/// Landscape images are fitted by width first, portrait and square ones by height first;
/// the other dimension is then checked and the image shrunk again if it still overflows.
/// Images are never enlarged. Returns `None` for degenerate sizes.
pub fn scale_to_fit(w0: f64, h0: f64, max_w: f64, max_h: f64) -> Option<(f64, f64)> {
    if !(w0 > 0.0 && h0 > 0.0 && max_w > 0.0 && max_h > 0.0) {
        return None;
    }
    let ratio = w0 / h0;
    let (mut width, mut height);
    if w0 > h0 {
        width = max_w.min(w0);
        height = width / ratio;
        if height > max_h {
            height = max_h;
            width = height * ratio;
        }
    } else {
        height = max_h.min(h0);
        width = height * ratio;
        if width > max_w {
            width = max_w;
            height = width / ratio;
        }
    }
    Some((width.min(max_w), height.min(max_h)))
}

/// Break `text` into lines no wider than `max_width`. `\n` forces a break; words longer
/// than a line are split by character.
pub fn wrap_text(text: &str, face: Face, size: f64, max_width: f64) -> Vec<String> {
    let mut lines = Vec::new();
    for hard_line in text.split('\n') {
        let mut current = String::new();
        for word in hard_line.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if text_width(&candidate, face, size) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if text_width(word, face, size) <= max_width {
                current = word.to_string();
            } else {
                for c in word.chars() {
                    let mut next = current.clone();
                    next.push(c);
                    if !current.is_empty() && text_width(&next, face, size) > max_width {
                        lines.push(std::mem::replace(&mut current, c.to_string()));
                    } else {
                        current = next;
                    }
                }
            }
        }
        lines.push(current);
    }
    lines
}

/// Text appearance for a block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub face: Face,
    pub size: f64,
    pub leading: f64,
    /// Fill gray level, 0 black to 1 white.
    pub gray: f64,
    pub centered: bool,
}

impl TextStyle {
    pub const TITLE: TextStyle = TextStyle {
        face: Face::Bold,
        size: 24.0,
        leading: 30.0,
        gray: 0.0,
        centered: true,
    };
    pub const HEADING: TextStyle = TextStyle {
        face: Face::Bold,
        size: 18.0,
        leading: 22.0,
        gray: 0.0,
        centered: false,
    };
    pub const BODY: TextStyle = TextStyle {
        face: Face::Regular,
        size: 11.0,
        leading: 15.0,
        gray: 0.0,
        centered: false,
    };
    pub const CAPTION: TextStyle = TextStyle {
        face: Face::Oblique,
        size: 9.0,
        leading: 12.0,
        gray: 0.4,
        centered: true,
    };
    pub const TABLE: TextStyle = TextStyle {
        face: Face::Regular,
        size: 9.0,
        leading: 11.0,
        gray: 0.0,
        centered: false,
    };
}

/// One positioned drawing operation in PDF user space (origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Text {
        x: f64,
        /// Baseline.
        y: f64,
        face: Face,
        size: f64,
        gray: f64,
        text: String,
    },
    Rect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        fill: Option<f64>,
        stroke: Option<f64>,
    },
    Image {
        index: usize,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<Op>,
}

impl Page {
    pub fn image_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.ops.iter().filter_map(|op| match op {
            Op::Image { index, .. } => Some(*index),
            _ => None,
        })
    }
}

const CELL_PADDING: f64 = 4.0;
const HEADER_FILL: f64 = 0.82;
const STRIPE_FILL: f64 = 0.94;
const GRID_STROKE: f64 = 0.5;

/// Top-down flow over pages of fixed geometry.
#[derive(Debug)]
pub struct Layout {
    geometry: PageGeometry,
    pages: Vec<Page>,
    /// Height used on the current page, measured down from the top of the content box.
    cursor: f64,
}

impl Layout {
    pub fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            pages: vec![Page::default()],
            cursor: 0.0,
        }
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn remaining(&self) -> f64 {
        self.geometry.content_height() - self.cursor
    }

    fn current_is_empty(&self) -> bool {
        self.pages.last().map(|p| p.ops.is_empty()).unwrap_or(true)
    }

    fn push(&mut self, op: Op) {
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.cursor = 0.0;
    }

    /// Start a new page unless the current one is still empty.
    pub fn page_break(&mut self) {
        if !self.current_is_empty() {
            self.new_page();
        }
    }

    /// Move to a new page when `height` does not fit in what is left of this one.
    fn ensure(&mut self, height: f64) {
        if height > self.remaining() && !self.current_is_empty() {
            self.new_page();
        }
    }

    /// Vertical gap; never carries over to the next page.
    pub fn spacer(&mut self, height: f64) {
        self.cursor = (self.cursor + height).min(self.geometry.content_height());
    }

    /// PDF y coordinate for a distance below the top of the content box.
    fn to_pdf_y(&self, offset: f64) -> f64 {
        self.geometry.height - self.geometry.margin - offset
    }

    /// Wrapped text, one line at a time so long blocks flow across pages.
    pub fn text(&mut self, text: &str, style: TextStyle) {
        let width = self.geometry.content_width();
        for line in wrap_text(text, style.face, style.size, width) {
            self.ensure(style.leading);
            let baseline = self.cursor + style.leading - (style.leading - style.size) / 2.0
                - style.size * 0.2;
            let x = if style.centered {
                let w = text_width(&line, style.face, style.size);
                self.geometry.margin + ((width - w) / 2.0).max(0.0)
            } else {
                self.geometry.margin
            };
            if !line.is_empty() {
                let y = self.to_pdf_y(baseline);
                self.push(Op::Text {
                    x,
                    y,
                    face: style.face,
                    size: style.size,
                    gray: style.gray,
                    text: line,
                });
            }
            self.cursor += style.leading;
        }
    }

    /// Horizontally centered image of the given display size.
    pub fn image(&mut self, index: usize, width: f64, height: f64) {
        self.ensure(height);
        let x = self.geometry.margin + ((self.geometry.content_width() - width) / 2.0).max(0.0);
        let y = self.to_pdf_y(self.cursor + height);
        self.push(Op::Image {
            index,
            x,
            y,
            w: width,
            h: height,
        });
        self.cursor += height;
    }

    /// Equal-width grid. The first row is the header: bold on a shaded background. Body rows
    /// alternate shading. Cells wrap; `\n` in a cell is a hard break. A row taller than the
    /// space left is continued line by line on the following pages.
    pub fn table(&mut self, table: &Table) {
        let columns = table.columns();
        if columns == 0 {
            return;
        }
        let col_width = self.geometry.content_width() / columns as f64;
        let inner_width = (col_width - 2.0 * CELL_PADDING).max(1.0);
        let style = TextStyle::TABLE;

        for (row_index, row) in table.rows.iter().enumerate() {
            let is_header = row_index == 0;
            let face = if is_header { Face::Bold } else { style.face };
            let cells: Vec<Vec<String>> = row
                .iter()
                .map(|cell| wrap_text(cell, face, style.size, inner_width))
                .collect();
            let line_count = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
            let fill = if is_header {
                Some(HEADER_FILL)
            } else if row_index % 2 == 0 {
                Some(STRIPE_FILL)
            } else {
                None
            };

            let mut start = 0;
            while start < line_count {
                let rest = line_count - start;
                let needed = rest as f64 * style.leading + 2.0 * CELL_PADDING;
                let fits_fresh_page = needed <= self.geometry.content_height();
                let room = self.remaining() - 2.0 * CELL_PADDING;
                if !self.current_is_empty()
                    && needed > self.remaining()
                    && (fits_fresh_page || room < style.leading)
                {
                    self.new_page();
                    continue;
                }
                let capacity = ((self.remaining() - 2.0 * CELL_PADDING) / style.leading).floor();
                let chunk = rest.min(capacity.max(1.0) as usize);
                self.table_row_slice(&cells, start..start + chunk, col_width, face, fill);
                start += chunk;
                if start < line_count {
                    self.new_page();
                }
            }
        }
    }

    /// Draw lines `lines` of every cell of one row as a band of boxes at the cursor.
    fn table_row_slice(
        &mut self,
        cells: &[Vec<String>],
        lines: std::ops::Range<usize>,
        col_width: f64,
        face: Face,
        fill: Option<f64>,
    ) {
        let style = TextStyle::TABLE;
        let band_height = lines.len() as f64 * style.leading + 2.0 * CELL_PADDING;
        let top = self.cursor;
        let bottom_y = self.to_pdf_y(top + band_height);
        for (col, cell) in cells.iter().enumerate() {
            let x = self.geometry.margin + col as f64 * col_width;
            self.push(Op::Rect {
                x,
                y: bottom_y,
                w: col_width,
                h: band_height,
                fill,
                stroke: Some(GRID_STROKE),
            });
            let end = lines.end.min(cell.len());
            let begin = lines.start.min(end);
            for (i, line) in cell[begin..end].iter().enumerate() {
                if line.is_empty() {
                    continue;
                }
                let baseline = top + CELL_PADDING + (i as f64 + 1.0) * style.leading
                    - (style.leading - style.size)
                    - style.size * 0.2;
                let y = self.to_pdf_y(baseline);
                self.push(Op::Text {
                    x: x + CELL_PADDING,
                    y,
                    face,
                    size: style.size,
                    gray: style.gray,
                    text: line.clone(),
                });
            }
        }
        self.cursor += band_height;
    }

    /// Pages laid out so far; a trailing empty page is dropped.
    pub fn finish(mut self) -> Vec<Page> {
        if self.pages.len() > 1 && self.current_is_empty() {
            self.pages.pop();
        }
        self.pages
    }
}
