//! Re-mapping cursors after a single buffer mutation.
//!
//! A mutation replaces `[start, end)` with `new_len` chars. Every cursor range
//! falls into exactly one [`Overlap`] case relative to that edit, checked in
//! declaration order:
//!
//! ```text
//!            start      end
//! buffer:  ----[=========)------
//! Before:  [--)                      unchanged
//! EndsIn:     [-----)                end clamped to start+new_len
//! Spans:    [-------------)          end shifted by delta
//! Inside:         [--)               clamped into the new text, may vanish
//! StartsIn:       [---------)        start clamped, end shifted
//! After:                [---)        shifted by delta
//! ```
//!
//! Mutations in a batch are applied one at a time, and the adjustment for each
//! runs before the offsets of the next mutation are computed.

use tracing::trace;

use crate::selection::{
  Cursors,
  Pairs,
  Range,
  SelectionMode,
  coalesce_pairs,
};

/// One replacement: `[start, end)` became `new_len` chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
  pub start:   usize,
  pub end:     usize,
  pub new_len: usize,
}

impl Edit {
  pub fn new(start: usize, end: usize, new_len: usize) -> Self {
    assert!(start <= end, "invalid edit: {start} > {end}");
    Self {
      start,
      end,
      new_len,
    }
  }

  pub fn replacement(range: Range, text: &str) -> Self {
    Self::new(range.start, range.end, text.chars().count())
  }

  #[inline]
  pub fn removed_len(&self) -> usize {
    self.end - self.start
  }

  /// Length change of the buffer.
  #[inline]
  pub fn delta(&self) -> isize {
    self.new_len as isize - self.removed_len() as isize
  }

  /// Where the replacement text ends.
  #[inline]
  pub fn new_end(&self) -> usize {
    self.start + self.new_len
  }

  #[inline]
  fn shift(&self, pos: usize) -> usize {
    (pos as isize + self.delta()) as usize
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
  Before,
  EndsInside,
  Spans,
  Inside,
  StartsInside,
  After,
}

pub fn classify(range: Range, edit: &Edit) -> Overlap {
  let (s, e) = (edit.start, edit.end);
  if range.end <= s {
    Overlap::Before
  } else if range.start <= s && range.end <= e {
    Overlap::EndsInside
  } else if range.start <= s {
    Overlap::Spans
  } else if range.end <= e {
    Overlap::Inside
  } else if range.start < e {
    Overlap::StartsInside
  } else {
    Overlap::After
  }
}

/// Maps `range` across `edit`. Returns `None` when a non-empty range lay
/// entirely inside the replaced text and was consumed by it.
pub fn adjust_range(range: Range, edit: &Edit) -> Option<Range> {
  let new_end = edit.new_end();
  let adjusted = match classify(range, edit) {
    Overlap::Before => range,
    Overlap::EndsInside => Range::new(range.start, range.end.min(new_end)),
    Overlap::Spans => Range::new(range.start, edit.shift(range.end)),
    Overlap::Inside => {
      let adjusted = Range::new(range.start.min(new_end), range.end.min(new_end));
      if adjusted.is_empty() && !range.is_empty() {
        return None;
      }
      adjusted
    },
    Overlap::StartsInside => Range::new(range.start.min(new_end), edit.shift(range.end)),
    Overlap::After => Range::new(edit.shift(range.start), edit.shift(range.end)),
  };
  Some(adjusted)
}

/// Maps every pair across `edit`, dropping consumed ranges. The result may
/// overlap; callers coalesce when they are ready to.
fn map_pairs(pairs: Pairs, edit: &Edit) -> Pairs {
  let before = pairs.len();
  let pairs: Pairs = pairs
    .into_iter()
    .filter_map(|(range, id)| adjust_range(range, edit).map(|range| (range, id)))
    .collect();
  trace!(
    start = edit.start,
    end = edit.end,
    new_len = edit.new_len,
    consumed = before - pairs.len(),
    remaining = pairs.len(),
    "adjusted cursors"
  );
  pairs
}

impl Cursors {
  /// Runs one adjustment pass for `edit`, then coalesces.
  pub fn apply_edit(&mut self, edit: &Edit) {
    let pairs = std::mem::take(&mut self.pairs);
    self.pairs = coalesce_pairs(map_pairs(pairs, edit));
  }

  /// Runs one adjustment pass for `edit` without merging cursors that now
  /// touch. Batch commands use this so every cursor captured at the start of
  /// the command still gets its own turn; only a cursor consumed by the edit
  /// drops out.
  pub(crate) fn track_edit(&mut self, edit: &Edit) {
    let pairs = std::mem::take(&mut self.pairs);
    self.pairs = map_pairs(pairs, edit);
  }
}

impl SelectionMode {
  /// Maps the selection across `edit`. When every range was consumed the
  /// result is a caret after the replacement text.
  #[must_use]
  pub fn map_edit(&self, edit: &Edit) -> SelectionMode {
    let mut cursors = Cursors::from(self);
    cursors.apply_edit(edit);
    cursors
      .into_mode()
      .unwrap_or_else(|_| SelectionMode::point(edit.new_end()))
  }
}
