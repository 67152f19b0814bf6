//! Base-14 Helvetica faces: advance widths and WinAnsi encoding.

/// Font faces used by the composer. All are standard PDF fonts, so nothing is embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Regular,
    Bold,
    Oblique,
}

impl Face {
    pub const ALL: [Face; 3] = [Face::Regular, Face::Bold, Face::Oblique];

    pub fn base_font(self) -> &'static [u8] {
        match self {
            Face::Regular => b"Helvetica",
            Face::Bold => b"Helvetica-Bold",
            Face::Oblique => b"Helvetica-Oblique",
        }
    }

    /// Resource name used inside page content streams.
    pub fn resource_name(self) -> &'static [u8] {
        match self {
            Face::Regular => b"F1",
            Face::Bold => b"F2",
            Face::Oblique => b"F3",
        }
    }
}

// Advance widths in 1/1000 em for ASCII 32..=126, from the Adobe AFM files.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

const FALLBACK_WIDTH: u16 = 556;

fn char_width(c: char, face: Face) -> u16 {
    let table = match face {
        Face::Bold => &HELVETICA_BOLD,
        Face::Regular | Face::Oblique => &HELVETICA,
    };
    let code = c as u32;
    if (32..=126).contains(&code) {
        return table[(code - 32) as usize];
    }
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' => 222,
        '\u{201C}' | '\u{201D}' | '\u{201E}' => 333,
        '\u{2013}' => 556,
        '\u{2014}' => 1000,
        '\u{2026}' => 1000,
        '\u{2022}' => 350,
        '\u{00A0}' => 278,
        _ => FALLBACK_WIDTH,
    }
}

/// Width of `text` in points at `size`.
pub fn text_width(text: &str, face: Face, size: f64) -> f64 {
    let units: u32 = text.chars().map(|c| char_width(c, face) as u32).sum();
    units as f64 * size / 1000.0
}

/// Encode text as WinAnsi bytes for a standard-font string. Unmappable characters become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => match c {
                '\u{20AC}' => 0x80,
                '\u{201A}' => 0x82,
                '\u{201E}' => 0x84,
                '\u{2026}' => 0x85,
                '\u{2020}' => 0x86,
                '\u{2021}' => 0x87,
                '\u{2030}' => 0x89,
                '\u{2039}' => 0x8B,
                '\u{2018}' => 0x91,
                '\u{2019}' => 0x92,
                '\u{201C}' => 0x93,
                '\u{201D}' => 0x94,
                '\u{2022}' => 0x95,
                '\u{2013}' => 0x96,
                '\u{2014}' => 0x97,
                '\u{2122}' => 0x99,
                '\u{203A}' => 0x9B,
                '\t' => b' ',
                _ => b'?',
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_follow_face() {
        assert_eq!(text_width("i", Face::Regular, 1000.0), 222.0);
        assert_eq!(text_width("i", Face::Bold, 1000.0), 278.0);
        assert_eq!(text_width("i", Face::Oblique, 1000.0), 222.0);
        assert!((text_width("Hello", Face::Regular, 12.0) - 27.336).abs() < 1e-9);
    }

    #[test]
    fn win_ansi_maps_typographic_punctuation() {
        assert_eq!(encode_win_ansi("A\u{2019}s \u{2014} \u{201C}x\u{201D}"), vec![
            b'A', 0x92, b's', b' ', 0x97, b' ', 0x93, b'x', 0x94
        ]);
        assert_eq!(encode_win_ansi("caf\u{e9}"), b"caf\xe9".to_vec());
        assert_eq!(encode_win_ansi("\u{65e5}"), b"?".to_vec());
    }
}
