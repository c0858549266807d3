//! Static font-metric tables for the PDF base-14 fonts used by the text export.
//!
//! Widths come from the standard Adobe AFM files and are stored in thousandths of an em,
//! covering ASCII 0x20..=0x7E (95 printable characters, index = `(c as usize) - 32`).
//! The few WinAnsi punctuation marks a résumé typically contains have their own entries;
//! anything else falls back to the table's average width, which only affects where a
//! line wraps.

use crate::cv::schema::{Customization, FontFamily, FontSize, Spacing};

// ────────────────────────────────────────────────────────────────────────────
// Faces
// ────────────────────────────────────────────────────────────────────────────

/// Base-14 family a customization font maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    Sans,
    Serif,
}

impl From<FontFamily> for Face {
    fn from(family: FontFamily) -> Self {
        match family {
            FontFamily::Inter | FontFamily::Roboto => Face::Sans,
            FontFamily::Merriweather | FontFamily::Playfair => Face::Serif,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Weight {
    Regular,
    Bold,
}

// ────────────────────────────────────────────────────────────────────────────
// Page configuration
// ────────────────────────────────────────────────────────────────────────────

/// A4 portrait in points.
pub const A4_WIDTH_PT: f32 = 595.28;
pub const A4_HEIGHT_PT: f32 = 841.89;

/// 18 mm.
pub const MARGIN_PT: f32 = 51.02;

/// Layout parameters for the text export, derived from the customization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageConfig {
    pub face: Face,
    pub font_size_pt: f32,
    /// Baseline-to-baseline distance as a multiple of the font size.
    pub line_height: f32,
    pub margin_pt: f32,
    pub page_width_pt: f32,
    pub page_height_pt: f32,
}

impl PageConfig {
    pub fn from_customization(customization: &Customization) -> Self {
        let font_size_pt = match customization.font_size {
            FontSize::Small => 9.5,
            FontSize::Medium => 10.5,
            FontSize::Large => 11.5,
        };
        let line_height = match customization.spacing {
            Spacing::Compact => 1.15,
            Spacing::Normal => 1.3,
            Spacing::Relaxed => 1.45,
        };
        Self {
            face: customization.font_family.into(),
            font_size_pt,
            line_height,
            margin_pt: MARGIN_PT,
            page_width_pt: A4_WIDTH_PT,
            page_height_pt: A4_HEIGHT_PT,
        }
    }

    /// Usable line width between the side margins.
    pub fn text_width_pt(&self) -> f32 {
        self.page_width_pt - 2.0 * self.margin_pt
    }

    pub fn leading(&self, size_pt: f32) -> f32 {
        size_pt * self.line_height
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Font metric table
// ────────────────────────────────────────────────────────────────────────────

/// Static character-width table for one base-14 font.
pub struct FontMetricTable {
    /// PostScript name written into the PDF font dictionary.
    pub base_font: &'static str,
    widths: [u16; 95],
    /// Fallback for characters outside the table.
    pub average_width: u16,
    bullet_width: u16,
    dash_width: u16,
}

impl FontMetricTable {
    /// Width of one character in thousandths of an em.
    pub fn char_width(&self, c: char) -> u16 {
        let code = c as usize;
        if (32..=126).contains(&code) {
            return self.widths[code - 32];
        }
        match c {
            '\u{2022}' => self.bullet_width,
            '\u{2013}' => self.dash_width,
            '\u{2014}' => 1000,
            '\u{2018}' | '\u{2019}' => self.widths[(b'\'' - 32) as usize].max(222),
            '\u{2026}' => 1000,
            '\u{00A0}' => self.widths[0],
            _ => self.average_width,
        }
    }

    /// Rendered width of `s` in points at `size_pt`.
    pub fn measure_str(&self, s: &str, size_pt: f32) -> f32 {
        let units: u32 = s.chars().map(|c| u32::from(self.char_width(c))).sum();
        units as f32 * size_pt / 1000.0
    }
}

static HELVETICA: FontMetricTable = FontMetricTable {
    base_font: "Helvetica",
    widths: [
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
        1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
        667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
        333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
        556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
    ],
    average_width: 556,
    bullet_width: 350,
    dash_width: 556,
};

static HELVETICA_BOLD: FontMetricTable = FontMetricTable {
    base_font: "Helvetica-Bold",
    widths: [
        278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
        975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
        667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
        333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
        611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
    ],
    average_width: 611,
    bullet_width: 350,
    dash_width: 556,
};

static TIMES: FontMetricTable = FontMetricTable {
    base_font: "Times-Roman",
    widths: [
        250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
        500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
        921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
        556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
        333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
        500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
    ],
    average_width: 500,
    bullet_width: 350,
    dash_width: 500,
};

static TIMES_BOLD: FontMetricTable = FontMetricTable {
    base_font: "Times-Bold",
    widths: [
        250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
        500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
        930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
        611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
        333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
        556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
    ],
    average_width: 556,
    bullet_width: 350,
    dash_width: 500,
};

/// Returns the static metric table for a face and weight.
pub fn get_metrics(face: Face, weight: Weight) -> &'static FontMetricTable {
    match (face, weight) {
        (Face::Sans, Weight::Regular) => &HELVETICA,
        (Face::Sans, Weight::Bold) => &HELVETICA_BOLD,
        (Face::Serif, Weight::Regular) => &TIMES,
        (Face::Serif, Weight::Bold) => &TIMES_BOLD,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Line breaking
// ────────────────────────────────────────────────────────────────────────────

/// Greedy word wrap of `text` into lines no wider than `max_width_pt`.
///
/// Words wider than a whole line are split between characters. Empty or all-whitespace
/// input yields no lines.
pub fn wrap_lines(text: &str, table: &FontMetricTable, size_pt: f32, max_width_pt: f32) -> Vec<String> {
    let space = table.measure_str(" ", size_pt);
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_width = 0.0_f32;

    for word in text.split_whitespace() {
        let word_width = table.measure_str(word, size_pt);

        if word_width > max_width_pt {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
                line_width = 0.0;
            }
            for c in word.chars() {
                let w = table.measure_str(c.encode_utf8(&mut [0; 4]), size_pt);
                if line_width + w > max_width_pt && !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                    line_width = 0.0;
                }
                line.push(c);
                line_width += w;
            }
            continue;
        }

        if line.is_empty() {
            line.push_str(word);
            line_width = word_width;
        } else if line_width + space + word_width <= max_width_pt {
            line.push(' ');
            line.push_str(word);
            line_width += space + word_width;
        } else {
            lines.push(std::mem::take(&mut line));
            line.push_str(word);
            line_width = word_width;
        }
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
