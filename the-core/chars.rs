//! Character classification used by word segmentation.

use crate::line_ending::LineEnding;

#[inline]
pub fn char_is_line_ending(ch: char) -> bool {
  LineEnding::from_char(ch).is_some()
}

/// Word characters: alphanumerics and `_`.
#[inline]
pub fn char_is_word(ch: char) -> bool {
  ch.is_alphanumeric() || ch == '_'
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn word_chars() {
    for ch in ['a', 'Z', '_', 'é', '9', 'ß'] {
      assert!(char_is_word(ch), "{ch:?}");
    }
    for ch in [' ', '-', '.', '\n', '+'] {
      assert!(!char_is_word(ch), "{ch:?}");
    }
  }

  #[test]
  fn line_endings() {
    assert!(char_is_line_ending('\n'));
    assert!(char_is_line_ending('\r'));
    assert!(char_is_line_ending('\u{2029}'));
    assert!(!char_is_line_ending(' '));
  }
}
