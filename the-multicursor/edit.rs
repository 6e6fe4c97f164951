//! Batch editing commands: delete, insert, transpose, case change and
//! indentation.
//!
//! Every command walks the cursor ids captured when it starts. Each mutation
//! goes through [`Buffer::replace`] and, when the host lets it through, is
//! immediately followed by an adjustment pass over the remaining cursors, so
//! the next cursor's offsets are always in the current coordinate space.
//! Cursors an edit pushes together are merged only when the command finishes,
//! so each one still performs its own edit. A vetoed replacement leaves its
//! cursor alone and the batch carries on.
//!
//! Outdent is the exception: its deletions are folded against the original
//! cursor ranges in one pass (see [`fold_deletions`]).

use std::collections::BTreeSet;

use ropey::RopeSlice;
use the_core::grapheme::{
  next_grapheme_boundary,
  prev_grapheme_boundary,
};
use thiserror::Error;
use tracing::{
  debug,
  trace,
};

use crate::{
  Tendril,
  adjust::Edit,
  buffer::{
    Buffer,
    BufferError,
    EditOutcome,
  },
  case_convention::CaseTransform,
  movement::Direction,
  segment::{
    Segmenter,
    Unit,
  },
  selection::{
    Cursors,
    Pairs,
    Range,
    SelectionError,
    SelectionMode,
  },
};

pub type Result<T> = std::result::Result<T, EditError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
  #[error(transparent)]
  Buffer(#[from] BufferError),
  #[error(transparent)]
  Selection(#[from] SelectionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteUnit {
  Char,
  Word,
  /// To the start or end of the visual line.
  LineBoundary,
  /// To the start or end of the paragraph.
  Paragraph,
}

/// Replaces `range` and runs the adjustment pass if the edit went through.
/// Cursors are not merged until the command finishes.
pub(crate) fn replace_tracked(
  buffer: &mut dyn Buffer,
  cursors: &mut Cursors,
  range: Range,
  text: &str,
) -> Result<EditOutcome> {
  let outcome = buffer.replace(range, text)?;
  if outcome.is_applied() {
    cursors.track_edit(&Edit::replacement(range, text));
  }
  Ok(outcome)
}

/// The span a caret at `pos` deletes. Empty at buffer edges.
fn deletion_span(
  text: RopeSlice,
  segmenter: &dyn Segmenter,
  pos: usize,
  unit: DeleteUnit,
  direction: Direction,
) -> Range {
  match (unit, direction) {
    (DeleteUnit::Char, Direction::Backward) => Range::new(prev_grapheme_boundary(text, pos), pos),
    (DeleteUnit::Char, Direction::Forward) => Range::new(pos, next_grapheme_boundary(text, pos)),
    (DeleteUnit::Word, Direction::Backward) => {
      let start = segmenter.boundary_before(text, pos, Unit::Word).unwrap_or(pos);
      Range::new(start, pos)
    },
    (DeleteUnit::Word, Direction::Forward) => {
      let end = segmenter.boundary_after(text, pos, Unit::Word).unwrap_or(pos);
      Range::new(pos, end)
    },
    (DeleteUnit::LineBoundary, Direction::Backward) => {
      Range::new(segmenter.enclosing(text, pos, Unit::VisualLine).start.min(pos), pos)
    },
    (DeleteUnit::LineBoundary, Direction::Forward) => {
      Range::new(pos, segmenter.enclosing(text, pos, Unit::VisualLine).end.max(pos))
    },
    (DeleteUnit::Paragraph, Direction::Backward) => {
      let start = segmenter
        .boundary_before(text, pos, Unit::Paragraph)
        .unwrap_or(pos);
      Range::new(start, pos)
    },
    (DeleteUnit::Paragraph, Direction::Forward) => {
      let end = segmenter
        .boundary_after(text, pos, Unit::Paragraph)
        .unwrap_or(pos);
      Range::new(pos, end)
    },
  }
}

/// Deletes at every cursor in ascending order. A selection deletes itself, a
/// caret deletes one `unit` in `direction`. Cursors end as carets at the
/// deletion point.
pub fn delete(
  buffer: &mut dyn Buffer,
  segmenter: &dyn Segmenter,
  selection: &SelectionMode,
  unit: DeleteUnit,
  direction: Direction,
) -> Result<SelectionMode> {
  let mut cursors = Cursors::from(selection);
  for id in cursors.ids() {
    let Some(range) = cursors.get(id) else {
      continue;
    };
    let span = if range.is_empty() {
      deletion_span(buffer.text(), segmenter, range.start, unit, direction)
    } else {
      range
    };
    if span.is_empty() {
      continue;
    }
    if replace_tracked(buffer, &mut cursors, span, "")?.is_applied() {
      cursors.set(id, Range::point(span.start));
    }
  }
  Ok(cursors.into_mode()?)
}

/// Replaces every cursor's range with `text`, left to right, leaving a caret
/// after each insertion.
pub fn insert(
  buffer: &mut dyn Buffer,
  selection: &SelectionMode,
  text: &str,
) -> Result<SelectionMode> {
  let len = text.chars().count();
  let mut cursors = Cursors::from(selection);
  for id in cursors.ids() {
    let Some(range) = cursors.get(id) else {
      continue;
    };
    if replace_tracked(buffer, &mut cursors, range, text)?.is_applied() {
      cursors.set(id, Range::point(range.start + len));
    }
  }
  Ok(cursors.into_mode()?)
}

/// Swaps the chars around each caret, right to left. Selections are skipped.
///
/// At the end of the buffer the two chars before the caret are swapped and
/// the caret stays. Anywhere else the caret moves past the swapped pair.
pub fn transpose(buffer: &mut dyn Buffer, selection: &SelectionMode) -> Result<SelectionMode> {
  let mut cursors = Cursors::from(selection);
  for id in cursors.ids().into_iter().rev() {
    let Some(range) = cursors.get(id) else {
      continue;
    };
    let len = buffer.len_chars();
    let pos = range.start;
    if !range.is_empty() || pos == 0 || len < 2 {
      continue;
    }

    let (start, caret) = if pos == len {
      (pos - 2, pos)
    } else {
      (pos - 1, pos + 1)
    };
    let span = Range::new(start, start + 2);
    let text = buffer.text();
    let swapped: Tendril = [text.char(start + 1), text.char(start)]
      .into_iter()
      .collect();

    if replace_tracked(buffer, &mut cursors, span, &swapped)?.is_applied() {
      cursors.set(id, Range::point(caret));
    }
  }
  Ok(cursors.into_mode()?)
}

/// Extends each cursor to the enclosing word boundaries, rewrites that text
/// with `transform` and selects the result.
pub fn change_case(
  buffer: &mut dyn Buffer,
  segmenter: &dyn Segmenter,
  selection: &SelectionMode,
  transform: CaseTransform,
) -> Result<SelectionMode> {
  let mut cursors = Cursors::from(selection);
  for id in cursors.ids() {
    let Some(range) = cursors.get(id) else {
      continue;
    };
    let text = buffer.text();
    let word = Range::new(
      segmenter.enclosing(text, range.start, Unit::Word).start,
      segmenter.enclosing(text, range.end, Unit::Word).end,
    );
    if word.is_empty() {
      continue;
    }

    let original = word.fragment(text);
    let replaced = transform.apply(&original);
    if replaced.as_str() == original {
      cursors.set(id, word);
      continue;
    }
    drop(original);

    if replace_tracked(buffer, &mut cursors, word, &replaced)?.is_applied() {
      let len = replaced.chars().count();
      cursors.set(id, Range::new(word.start, word.start + len));
    }
  }
  Ok(cursors.into_mode()?)
}

/// Start offsets of every paragraph any cursor touches.
fn paragraph_starts(
  text: RopeSlice,
  segmenter: &dyn Segmenter,
  selection: &SelectionMode,
) -> BTreeSet<usize> {
  let mut starts = BTreeSet::new();
  for range in selection.iter() {
    let mut paragraph = segmenter.enclosing(text, range.start, Unit::Paragraph);
    loop {
      starts.insert(paragraph.start);
      if paragraph.end >= range.end {
        break;
      }
      let Some(next_end) = segmenter.boundary_after(text, paragraph.end, Unit::Paragraph) else {
        break;
      };
      paragraph = segmenter.enclosing(text, next_end, Unit::Paragraph);
    }
  }
  starts
}

/// Inserts `indent` at the start of every touched paragraph, last paragraph
/// first.
pub fn indent(
  buffer: &mut dyn Buffer,
  segmenter: &dyn Segmenter,
  selection: &SelectionMode,
  indent: &str,
) -> Result<SelectionMode> {
  let starts = paragraph_starts(buffer.text(), segmenter, selection);
  debug!(paragraphs = starts.len(), "indenting");

  let mut cursors = Cursors::from(selection);
  for start in starts.into_iter().rev() {
    replace_tracked(buffer, &mut cursors, Range::point(start), indent)?;
  }
  Ok(cursors.into_mode()?)
}

/// Removes one `indent` from the start of every touched paragraph that begins
/// with it, first paragraph first.
pub fn outdent(
  buffer: &mut dyn Buffer,
  segmenter: &dyn Segmenter,
  selection: &SelectionMode,
  indent: &str,
) -> Result<SelectionMode> {
  let indent_len = indent.chars().count();
  if indent_len == 0 {
    return Ok(selection.clone());
  }
  let starts = paragraph_starts(buffer.text(), segmenter, selection);

  // Deleted spans in the coordinates of the original buffer.
  let mut deleted: Vec<Range> = Vec::with_capacity(starts.len());
  let mut removed = 0;
  for start in starts {
    let current = Range::new(start - removed, start - removed + indent_len);
    let text = buffer.text();
    if current.end > text.len_chars() || current.slice(text) != indent {
      continue;
    }
    if buffer.replace(current, "")?.is_applied() {
      deleted.push(Range::new(start, start + indent_len));
      removed += indent_len;
    }
  }
  debug!(paragraphs = deleted.len(), "outdented");

  let cursors = Cursors::from(selection);
  let mut cursors = Cursors {
    pairs: fold_deletions(cursors.pairs, &deleted),
  };
  if cursors.is_empty() {
    // Every range sat inside a removed indent: keep carets where they began.
    let carets = Cursors::from(selection)
      .pairs
      .into_iter()
      .map(|(range, id)| (Range::point(range.start), id))
      .collect();
    cursors.pairs = fold_deletions(carets, &deleted);
  }
  cursors.normalize();
  Ok(cursors.into_mode()?)
}

/// Maps cursor ranges across several deletions at once. `deleted` holds the
/// deleted spans in the original coordinates, sorted and disjoint.
///
/// Each endpoint moves left by the number of deleted chars before it, so a
/// range overlapping a span shrinks by the intersection and everything after
/// shifts by the full amount. A non-empty range lying strictly inside a span
/// is dropped, which is what one adjustment pass per deletion would do.
pub(crate) fn fold_deletions(pairs: Pairs, deleted: &[Range]) -> Pairs {
  let map = |pos: usize| {
    pos
      - deleted
        .iter()
        .map(|span| pos.clamp(span.start, span.end) - span.start)
        .sum::<usize>()
  };

  pairs
    .into_iter()
    .filter_map(|(range, id)| {
      let mapped = Range::new(map(range.start), map(range.end));
      let consumed = mapped.is_empty()
        && !range.is_empty()
        && deleted
          .iter()
          .any(|span| span.start < range.start && range.end <= span.end);
      if consumed {
        trace!(start = range.start, end = range.end, "cursor consumed by outdent");
        return None;
      }
      Some((mapped, id))
    })
    .collect()
}
