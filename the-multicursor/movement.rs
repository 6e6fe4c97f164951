//! Cursor movement and selection extension.
//!
//! A movement maps every range through a pure per-range transform and then
//! re-normalizes the set, so cursors that run into each other merge.
//!
//! ```ignore
//! use the_multicursor::movement::{Direction, Motion, Movement, move_selection};
//!
//! // "foo bar baz" with carets at 1 and 5, word right:
//! let moved = move_selection(text, &seg, &sel, Motion::Word, Direction::Forward, Movement::Move);
//! // carets at 3 and 7
//! ```
//!
//! [`Movement::Extend`] keeps the endpoint opposite to the direction fixed and
//! moves only the other one. [`Movement::Move`] collapses to a caret.

use ropey::RopeSlice;
use the_core::grapheme::{
  next_grapheme_boundary,
  prev_grapheme_boundary,
};
use tracing::debug;

use crate::{
  segment::{
    Segmenter,
    Unit,
  },
  selection::{
    Range,
    SelectionError,
    SelectionMode,
  },
};

/// The direction of cursor movement or selection extension.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
  /// Toward the end of the buffer.
  Forward,
  /// Toward the start of the buffer.
  Backward,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Movement {
  Move,
  Extend,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Motion {
  /// One grapheme.
  Char,
  Word,
  Paragraph,
  /// Start or end of the visual line.
  LineBoundary,
  /// Up or down one visual line.
  Line,
}

fn place(range: Range, pos: usize, direction: Direction, movement: Movement) -> Range {
  match (movement, direction) {
    (Movement::Move, _) => Range::point(pos),
    (Movement::Extend, Direction::Backward) => Range::new(pos.min(range.end), range.end),
    (Movement::Extend, Direction::Forward) => Range::new(range.start, pos.max(range.start)),
  }
}

/// Maps a single range. `None` means this cursor cannot move any further.
pub fn move_range(
  text: RopeSlice,
  segmenter: &dyn Segmenter,
  range: Range,
  motion: Motion,
  direction: Direction,
  movement: Movement,
) -> Option<Range> {
  let pos = match (motion, direction) {
    (Motion::Char, Direction::Backward) => {
      if movement == Movement::Move && !range.is_empty() {
        return Some(Range::point(range.start));
      }
      prev_grapheme_boundary(text, range.start)
    },
    (Motion::Char, Direction::Forward) => {
      if movement == Movement::Move && !range.is_empty() {
        return Some(Range::point(range.end));
      }
      next_grapheme_boundary(text, range.end)
    },
    (Motion::Word, Direction::Backward) => {
      segmenter.boundary_before(text, range.start, Unit::Word)?
    },
    (Motion::Word, Direction::Forward) => segmenter.boundary_after(text, range.end, Unit::Word)?,
    (Motion::Paragraph, Direction::Backward) => {
      segmenter.boundary_before(text, range.start, Unit::Paragraph)?
    },
    (Motion::Paragraph, Direction::Forward) => {
      segmenter.boundary_after(text, range.end, Unit::Paragraph)?
    },
    (Motion::LineBoundary, Direction::Backward) => {
      segmenter
        .enclosing(text, range.start, Unit::VisualLine)
        .start
    },
    (Motion::LineBoundary, Direction::Forward) => {
      segmenter.enclosing(text, range.end, Unit::VisualLine).end
    },
    (Motion::Line, Direction::Backward) => segmenter.offset_above(text, range.start)?,
    (Motion::Line, Direction::Forward) => segmenter.offset_below(text, range.end)?,
  };
  Some(place(range, pos, direction, movement))
}

/// Moves every cursor. Cursors that cannot move are left out of the result;
/// if none can move the selection is returned unchanged.
pub fn move_selection(
  text: RopeSlice,
  segmenter: &dyn Segmenter,
  selection: &SelectionMode,
  motion: Motion,
  direction: Direction,
  movement: Movement,
) -> SelectionMode {
  let moved = selection
    .transform(|range| move_range(text, segmenter, range, motion, direction, movement));
  match moved {
    Ok(moved) => {
      if moved.len() < selection.len() {
        debug!(
          ?motion,
          ?direction,
          before = selection.len(),
          after = moved.len(),
          "movement merged or dropped cursors"
        );
      }
      moved
    },
    Err(SelectionError::NoRanges) => {
      debug!(?motion, ?direction, "no cursor can move");
      selection.clone()
    },
    Err(err) => {
      debug!(%err, "movement failed");
      selection.clone()
    },
  }
}
