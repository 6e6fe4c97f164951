//! Multi-selection clipboard payloads.
//!
//! Copying a cursor set joins the text of every range with `\n` and records
//! how many `\n`-separated lines each range contributed:
//!
//! ```text
//! ranges:  "foo"  "a\nb"  ""
//! text:    "foo\na\nb\n"
//! counts:  [1, 2, 1]
//! ```
//!
//! Pasting splits the text back along those counts and hands one group to
//! each cursor. A payload without counts is plain text and is inserted at
//! every cursor. A payload whose counts don't add up is treated the same way.

use std::borrow::Cow;

use parking_lot::Mutex;
use ropey::RopeSlice;
use serde::{
  Deserialize,
  Serialize,
};
use the_core::line_ending::count_lf_lines;
use thiserror::Error;
use tracing::{
  debug,
  warn,
};

use crate::{
  buffer::Buffer,
  config::EngineConfig,
  edit::{
    EditError,
    insert,
    replace_tracked,
  },
  segment::Segmenter,
  selection::{
    Cursors,
    Range,
    SelectionMode,
  },
};

pub type Result<T> = std::result::Result<T, ClipboardError>;

#[derive(Debug, Error)]
pub enum ClipboardError {
  #[error("clipboard groups cover {expected} lines but the text has {actual}")]
  MalformedPayload { expected: usize, actual: usize },
  #[error("clipboard group {index} has no lines")]
  EmptyGroup { index: usize },
  #[error("could not decode clipboard payload: {0}")]
  Json(#[from] serde_json::Error),
  #[error(transparent)]
  Edit(#[from] EditError),
  #[error("clipboard provider does not support reading")]
  ReadingNotSupported,
  #[error("clipboard is empty")]
  Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardPayload {
  pub text:              String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub group_line_counts: Option<Vec<usize>>,
}

impl ClipboardPayload {
  pub fn plain(text: impl Into<String>) -> Self {
    Self {
      text:              text.into(),
      group_line_counts: None,
    }
  }

  pub fn grouped<'a>(groups: impl IntoIterator<Item = &'a str>) -> Self {
    let mut text = String::new();
    let mut counts = Vec::new();
    for (i, group) in groups.into_iter().enumerate() {
      if i > 0 {
        text.push('\n');
      }
      text.push_str(group);
      counts.push(count_lf_lines(group));
    }
    Self {
      text,
      group_line_counts: Some(counts),
    }
  }

  #[inline]
  pub fn is_grouped(&self) -> bool {
    self.group_line_counts.is_some()
  }

  /// Splits the text into its groups. A plain payload is a single group.
  pub fn groups(&self) -> Result<Vec<&str>> {
    let Some(counts) = &self.group_line_counts else {
      return Ok(vec![self.text.as_str()]);
    };
    if let Some(index) = counts.iter().position(|&count| count == 0) {
      return Err(ClipboardError::EmptyGroup { index });
    }
    let actual = count_lf_lines(&self.text);
    let Some(expected) = counts
      .iter()
      .try_fold(0usize, |total, &count| total.checked_add(count))
    else {
      return Err(ClipboardError::MalformedPayload {
        expected: usize::MAX,
        actual,
      });
    };
    if counts.is_empty() || expected != actual {
      return Err(ClipboardError::MalformedPayload { expected, actual });
    }

    let mut groups = Vec::with_capacity(counts.len());
    let mut rest = self.text.as_str();
    for &count in &counts[..counts.len() - 1] {
      let Some((split, _)) = rest.match_indices('\n').nth(count - 1) else {
        return Err(ClipboardError::MalformedPayload { expected, actual });
      };
      groups.push(&rest[..split]);
      rest = &rest[split + 1..];
    }
    groups.push(rest);
    Ok(groups)
  }

  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string(self)?)
  }

  pub fn from_json(json: &str) -> Result<Self> {
    Ok(serde_json::from_str(json)?)
  }
}

/// Captures the text of every range. A single selection produces a plain
/// payload.
pub fn copy(text: RopeSlice, selection: &SelectionMode) -> ClipboardPayload {
  match selection {
    SelectionMode::Single(range) => ClipboardPayload::plain(range.fragment(text)),
    SelectionMode::Multi(_) => {
      let fragments: Vec<_> = selection.fragments(text).collect();
      ClipboardPayload::grouped(fragments.iter().map(|fragment| &**fragment))
    },
  }
}

/// Pastes `payload` at every cursor, creating new carets below the last
/// cursor when there are more groups than cursors.
pub fn paste(
  buffer: &mut dyn Buffer,
  segmenter: &dyn Segmenter,
  selection: &SelectionMode,
  payload: &ClipboardPayload,
  config: &EngineConfig,
) -> Result<SelectionMode> {
  if !payload.is_grouped() {
    return Ok(insert(buffer, selection, &payload.text)?);
  }
  let groups = match payload.groups() {
    Ok(groups) => groups,
    Err(err) => {
      warn!(%err, "rejecting multi-selection clipboard payload, pasting as plain text");
      return Ok(insert(buffer, selection, &payload.text)?);
    },
  };
  debug!(
    groups = groups.len(),
    cursors = selection.len(),
    "pasting clipboard groups"
  );

  let mut cursors = Cursors::from(selection);
  let mut groups = groups.into_iter();
  for id in cursors.ids() {
    let Some(range) = cursors.get(id) else {
      continue;
    };
    let Some(group) = groups.next() else {
      cursors.set(id, Range::point(range.start));
      continue;
    };
    if replace_tracked(buffer, &mut cursors, range, group)?.is_applied() {
      cursors.set(id, Range::point(range.start + group.chars().count()));
    }
  }

  cursors.normalize();
  let mut anchor = cursors.ranges().last().map_or(0, |range| range.end);
  let mut remaining = groups.len();
  for group in groups {
    if cursors.len() >= config.max_cursors {
      warn!(
        dropped = remaining,
        max_cursors = config.max_cursors,
        "cursor limit reached, dropping clipboard groups"
      );
      break;
    }
    remaining -= 1;

    let (at, text): (usize, Cow<str>) = match segmenter.offset_below(buffer.text(), anchor) {
      Some(below) => (below, Cow::Borrowed(group)),
      None => {
        let ending = config.line_ending();
        (
          buffer.len_chars(),
          Cow::Owned(format!("{}{group}", ending.as_str())),
        )
      },
    };
    if !replace_tracked(buffer, &mut cursors, Range::point(at), &text)?.is_applied() {
      break;
    }
    anchor = at + text.chars().count();
    cursors.push(Range::point(anchor));
  }

  Ok(cursors.into_mode().map_err(EditError::from)?)
}

pub trait ClipboardProvider: Send + Sync {
  fn name(&self) -> Cow<'_, str>;
  fn get_payload(&self) -> Result<ClipboardPayload>;
  fn set_payload(&self, payload: &ClipboardPayload) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct NoClipboard;

impl ClipboardProvider for NoClipboard {
  fn name(&self) -> Cow<'_, str> {
    "none".into()
  }

  fn get_payload(&self) -> Result<ClipboardPayload> {
    Err(ClipboardError::ReadingNotSupported)
  }

  fn set_payload(&self, _payload: &ClipboardPayload) -> Result<()> {
    Ok(())
  }
}

/// In-process clipboard. Payloads are stored as JSON, the way a host would
/// keep them under a private pasteboard type.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
  contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
  pub fn new() -> Self {
    Self::default()
  }

  /// Stores raw clipboard contents as another application would.
  pub fn set_raw(&self, json: impl Into<String>) {
    *self.contents.lock() = Some(json.into());
  }
}

impl ClipboardProvider for MemoryClipboard {
  fn name(&self) -> Cow<'_, str> {
    "memory".into()
  }

  fn get_payload(&self) -> Result<ClipboardPayload> {
    let contents = self.contents.lock();
    let json = contents.as_deref().ok_or(ClipboardError::Empty)?;
    ClipboardPayload::from_json(json)
  }

  fn set_payload(&self, payload: &ClipboardPayload) -> Result<()> {
    let json = payload.to_json()?;
    *self.contents.lock() = Some(json);
    Ok(())
  }
}

#[cfg(test)]
mod test {
  use quickcheck::quickcheck;
  use ropey::Rope;

  use super::*;
  use crate::{
    buffer::TextBuffer,
    segment::TextSegmenter,
  };

  fn carets(positions: &[usize]) -> SelectionMode {
    SelectionMode::new(positions.iter().map(|&pos| Range::point(pos))).unwrap()
  }

  fn spans(selection: &SelectionMode) -> Vec<(usize, usize)> {
    selection.iter().map(|r| (r.start, r.end)).collect()
  }

  #[test]
  fn test_copy_groups() {
    let rope = Rope::from("foo\nbar baz");
    let selection =
      SelectionMode::new([Range::new(0, 3), Range::new(2, 5), Range::point(11)]).unwrap();
    // [0, 3) and [2, 5) merge into "foo\nb".
    let payload = copy(rope.slice(..), &selection);
    assert_eq!(payload.text, "foo\nb\n");
    assert_eq!(payload.group_line_counts, Some(vec![2, 1]));
    assert_eq!(payload.groups().unwrap(), vec!["foo\nb", ""]);

    let single = copy(rope.slice(..), &SelectionMode::Single(Range::new(4, 7)));
    assert_eq!(single, ClipboardPayload::plain("bar"));
  }

  #[test]
  fn test_groups_validation() {
    let payload = ClipboardPayload {
      text:              "a\nb".into(),
      group_line_counts: Some(vec![1, 2]),
    };
    assert!(matches!(
      payload.groups(),
      Err(ClipboardError::MalformedPayload {
        expected: 3,
        actual:   2,
      })
    ));

    let payload = ClipboardPayload {
      text:              "a\nb".into(),
      group_line_counts: Some(vec![0, 2]),
    };
    assert!(matches!(
      payload.groups(),
      Err(ClipboardError::EmptyGroup { index: 0 })
    ));
  }

  #[test]
  fn test_paste_creates_cursor_at_buffer_end() {
    let mut buffer = TextBuffer::new("ab\ncd");
    let seg = TextSegmenter::default();
    let payload = ClipboardPayload::grouped(["X", "Y", "Z"]);
    let result = paste(
      &mut buffer,
      &seg,
      &carets(&[1, 4]),
      &payload,
      &EngineConfig::default(),
    )
    .unwrap();
    assert_eq!(buffer.rope(), "aXb\ncYd\nZ");
    assert_eq!(spans(&result), vec![(2, 2), (6, 6), (9, 9)]);
  }

  #[test]
  fn test_paste_extra_groups_on_lines_below() {
    let mut buffer = TextBuffer::new("ab\ncd\nef\ngh");
    let seg = TextSegmenter::default();
    let payload = ClipboardPayload::grouped(["1", "2", "3"]);
    let result = paste(
      &mut buffer,
      &seg,
      &SelectionMode::point(1),
      &payload,
      &EngineConfig::default(),
    )
    .unwrap();
    // Each new caret keeps the column of the one above it.
    assert_eq!(buffer.rope(), "a1b\ncd2\nef3\ngh");
    assert_eq!(spans(&result), vec![(2, 2), (7, 7), (11, 11)]);
  }

  #[test]
  fn test_paste_more_cursors_than_groups() {
    let mut buffer = TextBuffer::new("one two three");
    let seg = TextSegmenter::default();
    let selection =
      SelectionMode::new([Range::new(0, 3), Range::new(4, 7), Range::new(8, 13)]).unwrap();
    let payload = ClipboardPayload::grouped(["1", "2"]);
    let result = paste(
      &mut buffer,
      &seg,
      &selection,
      &payload,
      &EngineConfig::default(),
    )
    .unwrap();
    assert_eq!(buffer.rope(), "1 2 three");
    assert_eq!(spans(&result), vec![(1, 1), (3, 3), (4, 4)]);
  }

  #[test]
  fn test_malformed_payload_falls_back_to_plain() {
    let mut buffer = TextBuffer::new("ab");
    let seg = TextSegmenter::default();
    let payload = ClipboardPayload {
      text:              "x\ny".into(),
      group_line_counts: Some(vec![1, 1, 1]),
    };
    let result = paste(
      &mut buffer,
      &seg,
      &carets(&[0, 2]),
      &payload,
      &EngineConfig::default(),
    )
    .unwrap();
    assert_eq!(buffer.rope(), "x\nyabx\ny");
    assert_eq!(spans(&result), vec![(3, 3), (8, 8)]);
  }

  #[test]
  fn test_overflowing_line_counts_fall_back_to_plain() {
    let json = format!(r#"{{"text":"x\ny","groupLineCounts":[{},3]}}"#, usize::MAX);
    let payload = ClipboardPayload::from_json(&json).unwrap();
    assert!(matches!(
      payload.groups(),
      Err(ClipboardError::MalformedPayload { .. })
    ));

    let mut buffer = TextBuffer::new("ab");
    let seg = TextSegmenter::default();
    let result = paste(
      &mut buffer,
      &seg,
      &carets(&[0, 2]),
      &payload,
      &EngineConfig::default(),
    )
    .unwrap();
    assert_eq!(buffer.rope(), "x\nyabx\ny");
    assert_eq!(spans(&result), vec![(3, 3), (8, 8)]);
  }

  #[test]
  fn test_paste_respects_cursor_limit() {
    let mut buffer = TextBuffer::new("ab");
    let seg = TextSegmenter::default();
    let config = EngineConfig {
      max_cursors: 2,
      ..EngineConfig::default()
    };
    let payload = ClipboardPayload::grouped(["1", "2", "3"]);
    let result = paste(&mut buffer, &seg, &SelectionMode::point(0), &payload, &config).unwrap();
    assert_eq!(buffer.rope(), "1ab\n2");
    assert_eq!(spans(&result), vec![(1, 1), (5, 5)]);
  }

  #[test]
  fn test_crlf_line_ending_for_appended_groups() {
    let mut buffer = TextBuffer::new("a");
    let seg = TextSegmenter::default();
    let config = EngineConfig::from_toml_str(r#"line-ending = "crlf""#).unwrap();
    let payload = ClipboardPayload::grouped(["1", "2"]);
    paste(&mut buffer, &seg, &SelectionMode::point(1), &payload, &config).unwrap();
    assert_eq!(buffer.rope(), "a1\r\n2");
  }

  #[test]
  fn test_json_wire_format() {
    let payload = ClipboardPayload::grouped(["a", "b\nc"]);
    let json = payload.to_json().unwrap();
    assert_eq!(json, r#"{"text":"a\nb\nc","groupLineCounts":[1,2]}"#);
    assert_eq!(ClipboardPayload::from_json(&json).unwrap(), payload);

    let plain = ClipboardPayload::from_json(r#"{"text":"hi"}"#).unwrap();
    assert!(!plain.is_grouped());
  }

  #[test]
  fn test_providers() {
    assert!(matches!(
      NoClipboard.get_payload(),
      Err(ClipboardError::ReadingNotSupported)
    ));

    let clipboard = MemoryClipboard::new();
    assert!(matches!(clipboard.get_payload(), Err(ClipboardError::Empty)));

    let payload = ClipboardPayload::grouped(["x", "y"]);
    clipboard.set_payload(&payload).unwrap();
    assert_eq!(clipboard.get_payload().unwrap(), payload);

    clipboard.set_raw("not json");
    assert!(matches!(clipboard.get_payload(), Err(ClipboardError::Json(_))));
  }

  quickcheck! {
    fn copy_paste_round_trip(text: String, raw: Vec<(u8, u8)>) -> bool {
      let mut buffer = TextBuffer::new(&text);
      let len = buffer.len_chars();
      let ranges = raw.into_iter().map(|(a, b)| {
        let (a, b) = ((a as usize) % (len + 1), (b as usize) % (len + 1));
        Range::new(a.min(b), a.max(b))
      });
      let Ok(selection) = SelectionMode::new(ranges) else {
        return true;
      };

      let payload = copy(buffer.text(), &selection);
      let copied: Vec<String> = selection.fragments(buffer.text()).map(String::from).collect();
      let Ok(groups) = payload.groups() else {
        return false;
      };
      if selection.is_multi() && groups != copied {
        return false;
      }

      let seg = TextSegmenter::default();
      paste(&mut buffer, &seg, &selection, &payload, &EngineConfig::default()).is_ok()
        && buffer.rope() == text.as_str()
    }
  }
}
