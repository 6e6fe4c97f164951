//! Text segmentation and layout queries.
//!
//! Commands never hardcode what a word or a line is. They ask a [`Segmenter`]
//! for boundaries, and hosts plug in whatever segmentation and layout they
//! use. [`TextSegmenter`] is the default: words are runs of word characters,
//! paragraphs are rope lines and visual lines are paragraphs cut into chunks
//! of a fixed soft-wrap width.
//!
//! Every query returns `None` rather than failing when there is nowhere left
//! to go.

use std::num::NonZeroUsize;

use ropey::RopeSlice;
use the_core::{
  chars::char_is_word,
  line_ending::line_end_char_index,
};

use crate::selection::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
  Word,
  Paragraph,
  VisualLine,
}

pub trait Segmenter {
  /// Nearest `unit` boundary strictly before `offset`.
  fn boundary_before(&self, text: RopeSlice, offset: usize, unit: Unit) -> Option<usize>;

  /// Nearest `unit` boundary strictly after `offset`.
  fn boundary_after(&self, text: RopeSlice, offset: usize, unit: Unit) -> Option<usize>;

  /// The `unit` containing `offset`. For words this is a caret at `offset`
  /// when no word touches it.
  fn enclosing(&self, text: RopeSlice, offset: usize, unit: Unit) -> Range;

  /// Offset on the visual line above at the same horizontal position.
  fn offset_above(&self, text: RopeSlice, offset: usize) -> Option<usize>;

  /// Offset on the visual line below at the same horizontal position.
  fn offset_below(&self, text: RopeSlice, offset: usize) -> Option<usize>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextSegmenter {
  pub soft_wrap: Option<NonZeroUsize>,
}

/// One visual line: the paragraph it belongs to, its index within that
/// paragraph and the chars it covers (line ending excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VisualLine {
  paragraph: usize,
  index:     usize,
  count:     usize,
  range:     Range,
}

impl VisualLine {
  #[inline]
  fn is_last(&self) -> bool {
    self.index + 1 == self.count
  }

  /// Puts `column` on this line. A wrapped line's end offset belongs to the
  /// next visual line, so it is excluded.
  fn column_offset(&self, column: usize) -> usize {
    let max = if self.is_last() {
      self.range.end
    } else {
      self.range.end - 1
    };
    (self.range.start + column).min(max)
  }
}

impl TextSegmenter {
  pub fn new(soft_wrap: Option<NonZeroUsize>) -> Self {
    Self { soft_wrap }
  }

  fn paragraph(text: RopeSlice, line: usize) -> Range {
    Range::new(text.line_to_char(line), line_end_char_index(&text, line))
  }

  fn visual_line(&self, text: RopeSlice, paragraph: usize, index: usize) -> VisualLine {
    let para = Self::paragraph(text, paragraph);
    let Some(width) = self.soft_wrap.map(NonZeroUsize::get) else {
      return VisualLine {
        paragraph,
        index: 0,
        count: 1,
        range: para,
      };
    };
    let count = para.len().div_ceil(width).max(1);
    let index = index.min(count - 1);
    let start = para.start + index * width;
    VisualLine {
      paragraph,
      index,
      count,
      range: Range::new(start, (start + width).min(para.end)),
    }
  }

  fn visual_line_at(&self, text: RopeSlice, offset: usize) -> VisualLine {
    let paragraph = text.char_to_line(offset);
    let start = text.line_to_char(paragraph);
    let index = match self.soft_wrap {
      Some(width) => (offset - start) / width.get(),
      None => 0,
    };
    self.visual_line(text, paragraph, index)
  }

  fn prev_visual_line(&self, text: RopeSlice, line: &VisualLine) -> Option<VisualLine> {
    if line.index > 0 {
      Some(self.visual_line(text, line.paragraph, line.index - 1))
    } else if line.paragraph > 0 {
      Some(self.visual_line(text, line.paragraph - 1, usize::MAX))
    } else {
      None
    }
  }

  fn next_visual_line(&self, text: RopeSlice, line: &VisualLine) -> Option<VisualLine> {
    if !line.is_last() {
      Some(self.visual_line(text, line.paragraph, line.index + 1))
    } else if line.paragraph + 1 < text.len_lines() {
      Some(self.visual_line(text, line.paragraph + 1, 0))
    } else {
      None
    }
  }

  fn word_before(text: RopeSlice, offset: usize) -> Option<usize> {
    if offset == 0 {
      return None;
    }
    let mut pos = offset;
    let mut chars = text.chars_at(offset);
    let mut in_word = false;
    while let Some(ch) = chars.prev() {
      let is_word = char_is_word(ch);
      if in_word && !is_word {
        break;
      }
      in_word |= is_word;
      pos -= 1;
    }
    Some(pos)
  }

  fn word_after(text: RopeSlice, offset: usize) -> Option<usize> {
    if offset >= text.len_chars() {
      return None;
    }
    let mut pos = offset;
    let mut in_word = false;
    for ch in text.chars_at(offset) {
      let is_word = char_is_word(ch);
      if in_word && !is_word {
        break;
      }
      in_word |= is_word;
      pos += 1;
    }
    Some(pos)
  }

  fn word_at(text: RopeSlice, offset: usize) -> Range {
    let mut start = offset;
    let mut chars = text.chars_at(offset);
    while chars.prev().is_some_and(char_is_word) {
      start -= 1;
    }
    let end = offset + text.chars_at(offset).take_while(|&ch| char_is_word(ch)).count();
    Range::new(start, end)
  }
}

impl Segmenter for TextSegmenter {
  fn boundary_before(&self, text: RopeSlice, offset: usize, unit: Unit) -> Option<usize> {
    match unit {
      Unit::Word => Self::word_before(text, offset),
      Unit::Paragraph => {
        let line = text.char_to_line(offset);
        let start = text.line_to_char(line);
        if start < offset {
          Some(start)
        } else {
          line.checked_sub(1).map(|prev| text.line_to_char(prev))
        }
      },
      Unit::VisualLine => {
        let line = self.visual_line_at(text, offset);
        if line.range.start < offset {
          Some(line.range.start)
        } else {
          self
            .prev_visual_line(text, &line)
            .map(|prev| prev.range.start)
        }
      },
    }
  }

  fn boundary_after(&self, text: RopeSlice, offset: usize, unit: Unit) -> Option<usize> {
    match unit {
      Unit::Word => Self::word_after(text, offset),
      Unit::Paragraph => {
        let line = text.char_to_line(offset);
        let end = line_end_char_index(&text, line);
        if end > offset {
          Some(end)
        } else if line + 1 < text.len_lines() {
          Some(line_end_char_index(&text, line + 1))
        } else {
          None
        }
      },
      Unit::VisualLine => {
        let line = self.visual_line_at(text, offset);
        if line.range.end > offset {
          Some(line.range.end)
        } else {
          self.next_visual_line(text, &line).map(|next| next.range.end)
        }
      },
    }
  }

  fn enclosing(&self, text: RopeSlice, offset: usize, unit: Unit) -> Range {
    match unit {
      Unit::Word => Self::word_at(text, offset),
      Unit::Paragraph => Self::paragraph(text, text.char_to_line(offset)),
      Unit::VisualLine => self.visual_line_at(text, offset).range,
    }
  }

  fn offset_above(&self, text: RopeSlice, offset: usize) -> Option<usize> {
    let line = self.visual_line_at(text, offset);
    let column = offset - line.range.start;
    self
      .prev_visual_line(text, &line)
      .map(|prev| prev.column_offset(column))
  }

  fn offset_below(&self, text: RopeSlice, offset: usize) -> Option<usize> {
    let line = self.visual_line_at(text, offset);
    let column = offset - line.range.start;
    self
      .next_visual_line(text, &line)
      .map(|next| next.column_offset(column))
  }
}
