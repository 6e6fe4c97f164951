//! Undo groups.
//!
//! The engine wraps each editing command in one group: [`UndoRecorder::begin_group`]
//! with the selection before the command, one [`UndoRecorder::record_change`]
//! per applied replacement, and [`UndoRecorder::end_group`] with the selection
//! after. Hosts with their own undo manager implement [`UndoRecorder`];
//! [`History`] is a complete linear undo/redo stack built on the same calls.

use thiserror::Error;
use tracing::debug;

use crate::{
  Tendril,
  buffer::{
    Buffer,
    BufferError,
    validate,
  },
  selection::{
    Range,
    SelectionMode,
  },
};

pub type Result<T> = std::result::Result<T, HistoryError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
  #[error("history no longer matches the buffer: {0}")]
  Buffer(#[from] BufferError),
  #[error("cannot undo or redo while an undo group is open")]
  GroupOpen,
}

/// One applied replacement: `removed` at `start` became `inserted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedChange {
  pub start:    usize,
  pub removed:  Tendril,
  pub inserted: Tendril,
}

impl RecordedChange {
  fn inserted_range(&self) -> Range {
    Range::new(self.start, self.start + self.inserted.chars().count())
  }

  fn removed_range(&self) -> Range {
    Range::new(self.start, self.start + self.removed.chars().count())
  }
}

pub trait UndoRecorder {
  fn begin_group(&mut self, before: &SelectionMode);
  fn record_change(&mut self, change: RecordedChange);
  fn end_group(&mut self, after: &SelectionMode);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUndo;

impl UndoRecorder for NoUndo {
  fn begin_group(&mut self, _before: &SelectionMode) {}

  fn record_change(&mut self, _change: RecordedChange) {}

  fn end_group(&mut self, _after: &SelectionMode) {}
}

#[derive(Debug, Clone)]
struct Revision {
  before:  SelectionMode,
  after:   SelectionMode,
  changes: Vec<RecordedChange>,
}

#[derive(Debug, Clone)]
struct OpenGroup {
  before:  SelectionMode,
  changes: Vec<RecordedChange>,
  depth:   usize,
}

/// Linear undo/redo stacks. Recording a new group clears the redo stack.
#[derive(Debug, Default)]
pub struct History {
  undo: Vec<Revision>,
  redo: Vec<Revision>,
  open: Option<OpenGroup>,
}

impl History {
  pub fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub fn can_undo(&self) -> bool {
    !self.undo.is_empty()
  }

  #[inline]
  pub fn can_redo(&self) -> bool {
    !self.redo.is_empty()
  }

  /// Number of groups that can be undone.
  #[inline]
  pub fn len(&self) -> usize {
    self.undo.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.undo.is_empty()
  }

  /// Reverts the last group and returns the selection from before it.
  pub fn undo(&mut self, buffer: &mut dyn Buffer) -> Result<Option<SelectionMode>> {
    if self.open.is_some() {
      return Err(HistoryError::GroupOpen);
    }
    let Some(revision) = self.undo.pop() else {
      return Ok(None);
    };

    let replayed = {
      let inverse: Vec<(Range, &str)> = revision
        .changes
        .iter()
        .rev()
        .map(|change| (change.inserted_range(), change.removed.as_str()))
        .collect();
      replay(buffer, &inverse)
    };
    if let Err(err) = replayed {
      self.undo.push(revision);
      return Err(err);
    }

    debug!(changes = revision.changes.len(), "undo");
    let selection = revision.before.clone();
    self.redo.push(revision);
    Ok(Some(selection))
  }

  /// Re-applies the last undone group and returns the selection from after it.
  pub fn redo(&mut self, buffer: &mut dyn Buffer) -> Result<Option<SelectionMode>> {
    if self.open.is_some() {
      return Err(HistoryError::GroupOpen);
    }
    let Some(revision) = self.redo.pop() else {
      return Ok(None);
    };

    let replayed = {
      let forward: Vec<(Range, &str)> = revision
        .changes
        .iter()
        .map(|change| (change.removed_range(), change.inserted.as_str()))
        .collect();
      replay(buffer, &forward)
    };
    if let Err(err) = replayed {
      self.redo.push(revision);
      return Err(err);
    }

    debug!(changes = revision.changes.len(), "redo");
    let selection = revision.after.clone();
    self.undo.push(revision);
    Ok(Some(selection))
  }
}

/// Applies `changes` in order, bypassing the host veto. Every range is checked
/// against the buffer length it will see before anything is touched.
fn replay(buffer: &mut dyn Buffer, changes: &[(Range, &str)]) -> Result<()> {
  let mut len = buffer.len_chars();
  for (range, text) in changes {
    validate(*range, len)?;
    len = len - range.len() + text.chars().count();
  }
  for (range, text) in changes {
    buffer.apply(*range, text);
  }
  Ok(())
}

impl UndoRecorder for History {
  fn begin_group(&mut self, before: &SelectionMode) {
    match &mut self.open {
      Some(group) => group.depth += 1,
      None => {
        self.open = Some(OpenGroup {
          before:  before.clone(),
          changes: Vec::new(),
          depth:   1,
        });
      },
    }
  }

  fn record_change(&mut self, change: RecordedChange) {
    if let Some(group) = &mut self.open {
      group.changes.push(change);
    }
  }

  fn end_group(&mut self, after: &SelectionMode) {
    let Some(group) = &mut self.open else {
      return;
    };
    group.depth -= 1;
    if group.depth > 0 {
      return;
    }
    let Some(group) = self.open.take() else {
      return;
    };
    if group.changes.is_empty() {
      return;
    }
    self.redo.clear();
    self.undo.push(Revision {
      before:  group.before,
      after:   after.clone(),
      changes: group.changes,
    });
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{
    buffer::{
      RecordingBuffer,
      TextBuffer,
    },
    edit::insert,
  };

  fn carets(positions: &[usize]) -> SelectionMode {
    SelectionMode::new(positions.iter().map(|&pos| Range::point(pos))).unwrap()
  }

  #[test]
  fn test_undo_redo_multi_cursor_insert() {
    let mut buffer = TextBuffer::new("ab\ncd");
    let mut history = History::new();
    let before = carets(&[1, 4]);

    history.begin_group(&before);
    let after = {
      let mut recording = RecordingBuffer::new(&mut buffer, &mut history);
      insert(&mut recording, &before, "xyz").unwrap()
    };
    history.end_group(&after);
    assert_eq!(buffer.rope(), "axyzb\ncxyzd");
    assert_eq!(history.len(), 1);

    assert_eq!(history.undo(&mut buffer).unwrap(), Some(before.clone()));
    assert_eq!(buffer.rope(), "ab\ncd");
    assert!(history.can_redo());

    assert_eq!(history.redo(&mut buffer).unwrap(), Some(after));
    assert_eq!(buffer.rope(), "axyzb\ncxyzd");
    assert!(!history.can_redo());
  }

  #[test]
  fn test_empty_group_is_discarded() {
    let mut history = History::new();
    let selection = SelectionMode::point(0);
    history.begin_group(&selection);
    history.end_group(&selection);
    assert!(history.is_empty());

    let mut buffer = TextBuffer::new("abc");
    assert_eq!(history.undo(&mut buffer).unwrap(), None);
  }

  #[test]
  fn test_nested_groups_merge() {
    let mut history = History::new();
    let selection = SelectionMode::point(0);
    history.begin_group(&selection);
    history.begin_group(&selection);
    history.record_change(RecordedChange {
      start:    0,
      removed:  Tendril::new(),
      inserted: Tendril::from("a"),
    });
    history.end_group(&selection);
    assert!(history.is_empty());

    let mut buffer = TextBuffer::new("a");
    assert_eq!(history.undo(&mut buffer), Err(HistoryError::GroupOpen));

    history.end_group(&SelectionMode::point(1));
    assert_eq!(history.len(), 1);
    assert_eq!(history.undo(&mut buffer).unwrap(), Some(selection));
    assert_eq!(buffer.rope(), "");
  }

  #[test]
  fn test_new_group_clears_redo() {
    let mut buffer = TextBuffer::new("");
    let mut history = History::new();
    let record = |history: &mut History, start: usize, text: &str| {
      history.begin_group(&SelectionMode::point(start));
      history.record_change(RecordedChange {
        start,
        removed: Tendril::new(),
        inserted: Tendril::from(text),
      });
      history.end_group(&SelectionMode::point(start + 1));
    };

    buffer.apply(Range::point(0), "a");
    record(&mut history, 0, "a");
    history.undo(&mut buffer).unwrap();
    assert!(history.can_redo());

    buffer.apply(Range::point(0), "b");
    record(&mut history, 0, "b");
    assert!(!history.can_redo());
  }

  #[test]
  fn test_mismatched_buffer_is_rejected() {
    let mut history = History::new();
    history.begin_group(&SelectionMode::point(0));
    history.record_change(RecordedChange {
      start:    4,
      removed:  Tendril::new(),
      inserted: Tendril::from("xyz"),
    });
    history.end_group(&SelectionMode::point(7));

    let mut buffer = TextBuffer::new("ab");
    assert!(matches!(
      history.undo(&mut buffer),
      Err(HistoryError::Buffer(BufferError::RangeOutOfBounds { .. }))
    ));
    assert_eq!(buffer.rope(), "ab");
    assert!(history.can_undo());
  }
}
