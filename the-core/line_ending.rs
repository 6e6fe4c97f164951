//! Line ending detection over rope slices.
//!
//! The set of recognised endings matches ropey's default `unicode_lines`
//! behaviour, so that a "paragraph" here is exactly a rope line.

use ropey::RopeSlice;

#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum LineEnding {
  /// CarriageReturn followed by LineFeed.
  Crlf,
  /// U+000A -- LineFeed
  LF,
  /// U+000B -- VerticalTab
  VT,
  /// U+000C -- FormFeed
  FF,
  /// U+000D -- CarriageReturn
  CR,
  /// U+0085 -- NextLine
  Nel,
  /// U+2028 -- Line Separator
  LS,
  /// U+2029 -- ParagraphSeparator
  PS,
}

impl LineEnding {
  #[inline]
  pub const fn len_chars(&self) -> usize {
    match self {
      Self::Crlf => 2,
      _ => 1,
    }
  }

  #[inline]
  pub const fn as_str(&self) -> &'static str {
    match self {
      Self::Crlf => "\u{000D}\u{000A}",
      Self::LF => "\u{000A}",
      Self::VT => "\u{000B}",
      Self::FF => "\u{000C}",
      Self::CR => "\u{000D}",
      Self::Nel => "\u{0085}",
      Self::LS => "\u{2028}",
      Self::PS => "\u{2029}",
    }
  }

  #[inline]
  pub const fn from_char(ch: char) -> Option<LineEnding> {
    match ch {
      '\u{000A}' => Some(LineEnding::LF),
      '\u{000B}' => Some(LineEnding::VT),
      '\u{000C}' => Some(LineEnding::FF),
      '\u{000D}' => Some(LineEnding::CR),
      '\u{0085}' => Some(LineEnding::Nel),
      '\u{2028}' => Some(LineEnding::LS),
      '\u{2029}' => Some(LineEnding::PS),
      _ => None,
    }
  }
}

/// Returns the line ending that terminates `line`, if any.
pub fn get_line_ending(line: &RopeSlice) -> Option<LineEnding> {
  let len = line.len_chars();
  if len == 0 {
    return None;
  }

  let last = line.char(len - 1);
  if last == '\u{000A}' && len >= 2 && line.char(len - 2) == '\u{000D}' {
    return Some(LineEnding::Crlf);
  }
  LineEnding::from_char(last)
}

/// Returns the char index of the end of the given line, not including its line
/// ending.
pub fn line_end_char_index(slice: &RopeSlice, line: usize) -> usize {
  slice.line_to_char(line + 1)
    - get_line_ending(&slice.line(line))
      .map(|le| le.len_chars())
      .unwrap_or(0)
}

/// Number of lines a string spans when split on `\n`. An empty string is one
/// line.
pub fn count_lf_lines(text: &str) -> usize {
  text.bytes().filter(|&b| b == b'\n').count() + 1
}

#[cfg(test)]
mod test {
  use ropey::Rope;

  use super::*;

  #[test]
  fn detects_endings() {
    let rope = Rope::from_str("a\r\nb\nc\u{2029}d");
    let text = rope.slice(..);
    assert_eq!(get_line_ending(&text.line(0)), Some(LineEnding::Crlf));
    assert_eq!(get_line_ending(&text.line(1)), Some(LineEnding::LF));
    assert_eq!(get_line_ending(&text.line(2)), Some(LineEnding::PS));
    assert_eq!(get_line_ending(&text.line(3)), None);
  }

  #[test]
  fn line_end_excludes_ending() {
    let rope = Rope::from_str("ab\r\ncd\nef");
    let text = rope.slice(..);
    assert_eq!(line_end_char_index(&text, 0), 2);
    assert_eq!(line_end_char_index(&text, 1), 6);
    assert_eq!(line_end_char_index(&text, 2), 9);
  }

  #[test]
  fn lf_line_count() {
    assert_eq!(count_lf_lines(""), 1);
    assert_eq!(count_lf_lines("abc"), 1);
    assert_eq!(count_lf_lines("a\nb"), 2);
    assert_eq!(count_lf_lines("a\n"), 2);
    assert_eq!(count_lf_lines("a\r\nb\n\n"), 4);
  }
}
