use std::collections::HashMap;

use codestack_core::FrameId;

/// Horizontal advance of each glyph in the font a line is rendered with.
pub trait GlyphMetrics: Send + Sync {
    fn advance(&self, ch: char) -> f32;
}

#[derive(Debug, Clone, Copy)]
pub struct MonospaceMetrics {
    pub cell_width: f32,
}

impl GlyphMetrics for MonospaceMetrics {
    fn advance(&self, _ch: char) -> f32 {
        self.cell_width
    }
}

/// Measured widths with a fallback for glyphs that were not measured.
#[derive(Debug, Clone)]
pub struct TableMetrics {
    widths: HashMap<char, f32>,
    fallback: f32,
}

impl TableMetrics {
    pub fn new(fallback: f32) -> Self {
        Self {
            widths: HashMap::new(),
            fallback,
        }
    }

    pub fn with_width(mut self, ch: char, width: f32) -> Self {
        self.widths.insert(ch, width);
        self
    }
}

impl GlyphMetrics for TableMetrics {
    fn advance(&self, ch: char) -> f32 {
        self.widths.get(&ch).copied().unwrap_or(self.fallback)
    }
}

/// Character index nearest to a click `x` pixels from the line's left edge.
pub fn char_at_offset(text: &str, metrics: &dyn GlyphMetrics, x: f32) -> usize {
    let mut accumulated = 0.0;
    for (index, ch) in text.chars().enumerate() {
        let width = metrics.advance(ch);
        if accumulated + width / 2.0 > x {
            return index;
        }
        accumulated += width;
    }
    text.chars().count()
}

/// Pixel offset of the boundary before character `index`.
pub fn offset_of_char(text: &str, metrics: &dyn GlyphMetrics, index: usize) -> f32 {
    text.chars().take(index).map(|ch| metrics.advance(ch)).sum()
}

const CARET_EPSILON: f32 = 1e-3;

/// Re-derives a character index from a caret that was planted earlier.
pub fn char_at_caret(text: &str, metrics: &dyn GlyphMetrics, caret_x: f32) -> usize {
    let mut accumulated = 0.0;
    for (index, ch) in text.chars().enumerate() {
        if accumulated + CARET_EPSILON >= caret_x {
            return index;
        }
        accumulated += metrics.advance(ch);
    }
    text.chars().count()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Caret {
    pub frame: FrameId,
    pub line: usize,
    pub x: f32,
    pub character: usize,
}

impl Caret {
    pub fn plant(
        frame: FrameId,
        line: usize,
        text: &str,
        metrics: &dyn GlyphMetrics,
        click_x: f32,
    ) -> Self {
        let character = char_at_offset(text, metrics, click_x);
        Self {
            frame,
            line,
            x: offset_of_char(text, metrics, character),
            character,
        }
    }
}
