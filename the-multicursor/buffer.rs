//! The text buffer the engine edits.
//!
//! The host owns the buffer. The engine only reads it through a
//! [`RopeSlice`] and mutates it through [`Buffer::replace`], which checks the
//! range and asks the host's veto hook before anything changes.

use std::fmt;

use ropey::{
  Rope,
  RopeSlice,
};
use thiserror::Error;
use tracing::trace;

use crate::{
  Tendril,
  history::{
    RecordedChange,
    UndoRecorder,
  },
  selection::Range,
};

pub type Result<T> = std::result::Result<T, BufferError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
  #[error("invalid range {start}..{end}: start is after end")]
  InvalidRange { start: usize, end: usize },
  #[error("range {start}..{end} is out of bounds for buffer length {len}")]
  RangeOutOfBounds {
    start: usize,
    end:   usize,
    len:   usize,
  },
}

/// Whether a replacement went through. A veto is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum EditOutcome {
  Applied,
  Vetoed,
}

impl EditOutcome {
  #[inline]
  pub fn is_applied(self) -> bool {
    self == EditOutcome::Applied
  }
}

/// Checks that `range` can be replaced in a buffer of `len` chars.
pub fn validate(range: Range, len: usize) -> Result<()> {
  if range.start > range.end {
    return Err(BufferError::InvalidRange {
      start: range.start,
      end:   range.end,
    });
  }
  if range.end > len {
    return Err(BufferError::RangeOutOfBounds {
      start: range.start,
      end: range.end,
      len,
    });
  }
  Ok(())
}

pub trait Buffer {
  fn text(&self) -> RopeSlice<'_>;

  fn len_chars(&self) -> usize {
    self.text().len_chars()
  }

  fn substring(&self, range: Range) -> Result<Tendril> {
    validate(range, self.len_chars())?;
    Ok(Tendril::from(range.fragment(self.text()).as_ref()))
  }

  /// Host veto hook, asked before every replacement.
  fn may_change(&self, _range: Range, _text: &str) -> bool {
    true
  }

  /// Performs the replacement unconditionally. `range` has already been
  /// validated.
  fn apply(&mut self, range: Range, text: &str);

  fn replace(&mut self, range: Range, text: &str) -> Result<EditOutcome> {
    validate(range, self.len_chars())?;
    if !self.may_change(range, text) {
      trace!(start = range.start, end = range.end, "edit vetoed by host");
      return Ok(EditOutcome::Vetoed);
    }
    trace!(
      start = range.start,
      end = range.end,
      inserted = text.len(),
      "replacing text"
    );
    self.apply(range, text);
    Ok(EditOutcome::Applied)
  }
}

impl Buffer for Rope {
  fn text(&self) -> RopeSlice<'_> {
    self.slice(..)
  }

  fn len_chars(&self) -> usize {
    Rope::len_chars(self)
  }

  fn apply(&mut self, range: Range, text: &str) {
    if !range.is_empty() {
      self.remove(range.start..range.end);
    }
    if !text.is_empty() {
      self.insert(range.start, text);
    }
  }
}

type Veto = Box<dyn Fn(Range, &str) -> bool + Send + Sync>;

/// A rope with an optional veto hook.
#[derive(Default)]
pub struct TextBuffer {
  text: Rope,
  veto: Option<Veto>,
}

impl fmt::Debug for TextBuffer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TextBuffer")
      .field("text", &self.text)
      .field("veto", &self.veto.is_some())
      .finish()
  }
}

impl TextBuffer {
  pub fn new(text: &str) -> Self {
    Self {
      text: Rope::from_str(text),
      veto: None,
    }
  }

  /// Installs a hook that returns `false` for edits the host refuses.
  pub fn with_veto<F>(mut self, veto: F) -> Self
  where
    F: Fn(Range, &str) -> bool + Send + Sync + 'static,
  {
    self.veto = Some(Box::new(veto));
    self
  }

  pub fn rope(&self) -> &Rope {
    &self.text
  }

  pub fn into_rope(self) -> Rope {
    self.text
  }
}

impl From<Rope> for TextBuffer {
  fn from(text: Rope) -> Self {
    Self { text, veto: None }
  }
}

impl Buffer for TextBuffer {
  fn text(&self) -> RopeSlice<'_> {
    self.text.slice(..)
  }

  fn may_change(&self, range: Range, text: &str) -> bool {
    self.veto.as_ref().is_none_or(|veto| veto(range, text))
  }

  fn apply(&mut self, range: Range, text: &str) {
    self.text.apply(range, text);
  }
}

/// Forwards every applied replacement to an [`UndoRecorder`].
pub struct RecordingBuffer<'a> {
  inner:    &'a mut dyn Buffer,
  recorder: &'a mut dyn UndoRecorder,
}

impl<'a> RecordingBuffer<'a> {
  pub fn new(inner: &'a mut dyn Buffer, recorder: &'a mut dyn UndoRecorder) -> Self {
    Self { inner, recorder }
  }
}

impl Buffer for RecordingBuffer<'_> {
  fn text(&self) -> RopeSlice<'_> {
    self.inner.text()
  }

  fn len_chars(&self) -> usize {
    self.inner.len_chars()
  }

  fn may_change(&self, range: Range, text: &str) -> bool {
    self.inner.may_change(range, text)
  }

  fn apply(&mut self, range: Range, text: &str) {
    if range.is_empty() && text.is_empty() {
      return;
    }
    let removed = Tendril::from(range.fragment(self.inner.text()).as_ref());
    self.inner.apply(range, text);
    self.recorder.record_change(RecordedChange {
      start: range.start,
      removed,
      inserted: Tendril::from(text),
    });
  }
}
