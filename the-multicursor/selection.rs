//! Cursor ranges and multi-cursor selections.
//!
//! This module provides [`Range`] for a single caret or selection, the
//! [`CursorSet`] holding two or more of them, and [`SelectionMode`], the sum
//! type the engine publishes.
//!
//! # Range Model
//!
//! A [`Range`] is a half-open interval `[start, end)` over char offsets. A
//! zero-length range is a caret, anything longer is a selection.
//!
//! ```text
//! start=2, end=7: "he[llo w)orld"  (selection)
//! start=5, end=5: "hello|world"    (caret)
//! ```
//!
//! # Normalization
//!
//! Every published set of ranges is:
//!
//! - sorted by `start`
//! - free of overlapping or touching ranges (those are merged into their union)
//! - free of duplicates
//!
//! A [`CursorSet`] always holds at least two ranges. Anything that would leave
//! one range (or none) collapses to [`SelectionMode::Single`], which is the
//! host's ordinary single-selection behaviour.
//!
//! ```ignore
//! use the_multicursor::selection::{Range, SelectionMode};
//!
//! let mode = SelectionMode::new([Range::point(5), Range::new(3, 5)])?;
//! // Touching ranges merge, so only one range is left.
//! assert_eq!(mode, SelectionMode::Single(Range::new(3, 5)));
//! ```
//!
//! # Cursor Identity
//!
//! Each range in a [`CursorSet`] carries a stable [`CursorId`]. When ranges are
//! merged the leftmost participant keeps its id. Batch commands walk the ids
//! captured when they start and skip the ones that were merged away, so a
//! cursor is never processed twice.

use std::{
  borrow::Cow,
  num::NonZeroU64,
  sync::atomic::{
    AtomicU64,
    Ordering,
  },
};

use ropey::RopeSlice;
use smallvec::{
  SmallVec,
  smallvec,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SelectionError>;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectionError {
  #[error("selection must contain at least one range")]
  EmptySelection,
  #[error("range {start}..{end} is out of bounds for buffer length {len}")]
  RangeOutOfBounds {
    start: usize,
    end:   usize,
    len:   usize,
  },
  #[error("cursor id {id} not found in selection")]
  CursorIdNotFound { id: u64 },
  #[error("selection transform produced no ranges")]
  NoRanges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CursorId(NonZeroU64);

impl CursorId {
  pub fn new(id: NonZeroU64) -> Self {
    Self(id)
  }

  pub fn fresh() -> Self {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed).max(1);
    Self(NonZeroU64::new(id).unwrap_or(NonZeroU64::MIN))
  }

  pub fn get(self) -> u64 {
    self.0.get()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
  pub start: usize,
  pub end:   usize,
}

impl Range {
  /// Panics when `start > end`: an inverted range is a coordinate mapping bug
  /// and must not be clamped into something plausible.
  #[inline]
  pub fn new(start: usize, end: usize) -> Self {
    assert!(start <= end, "invalid range: {start} > {end}");
    Self { start, end }
  }

  #[inline]
  pub fn point(pos: usize) -> Self {
    Self {
      start: pos,
      end:   pos,
    }
  }

  #[inline]
  #[must_use]
  pub fn len(&self) -> usize {
    self.end - self.start
  }

  /// A zero-length range is a caret.
  #[inline]
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.start == self.end
  }

  #[inline]
  pub fn contains(&self, pos: usize) -> bool {
    self.start <= pos && pos < self.end
  }

  /// Whether the two ranges overlap or share an endpoint.
  #[inline]
  pub fn touches(&self, other: &Self) -> bool {
    self.start <= other.end && other.start <= self.end
  }

  #[inline]
  #[must_use]
  pub fn union(&self, other: Self) -> Self {
    Self {
      start: self.start.min(other.start),
      end:   self.end.max(other.end),
    }
  }

  /// Number of offsets shared by both ranges.
  #[inline]
  pub fn intersection_len(&self, other: &Self) -> usize {
    let start = self.start.max(other.start);
    let end = self.end.min(other.end);
    end.saturating_sub(start)
  }

  #[inline]
  pub fn is_within(&self, len: usize) -> bool {
    self.start <= self.end && self.end <= len
  }

  /// Returns the text inside this range. Never copies.
  #[inline]
  pub fn slice<'a>(&self, text: RopeSlice<'a>) -> RopeSlice<'a> {
    text.slice(self.start..self.end)
  }

  /// Returns the text inside this range, borrowed when it lives in a single
  /// rope chunk.
  #[inline]
  pub fn fragment<'a>(&self, text: RopeSlice<'a>) -> Cow<'a, str> {
    self.slice(text).into()
  }
}

impl From<std::ops::Range<usize>> for Range {
  fn from(value: std::ops::Range<usize>) -> Self {
    Self::new(value.start, value.end)
  }
}

/// Sorts and merges `ranges`: touching or overlapping ranges become their
/// union and exact duplicates contribute nothing.
pub fn coalesce(ranges: impl IntoIterator<Item = Range>) -> SmallVec<[Range; 2]> {
  let pairs = ranges
    .into_iter()
    .map(|range| (range, CursorId::fresh()))
    .collect();
  coalesce_pairs(pairs)
    .into_iter()
    .map(|(range, _)| range)
    .collect()
}

pub(crate) type Pairs = SmallVec<[(Range, CursorId); 2]>;

pub(crate) fn coalesce_pairs(mut pairs: Pairs) -> Pairs {
  if pairs.len() < 2 {
    return pairs;
  }
  // Stable, so among equal starts the earlier cursor keeps its id.
  pairs.sort_by_key(|(range, _)| range.start);

  let mut merged: Pairs = SmallVec::with_capacity(pairs.len());
  for (range, id) in pairs {
    if let Some((last, _)) = merged.last_mut() {
      if last.touches(&range) {
        *last = last.union(range);
        continue;
      }
    }
    merged.push((range, id));
  }
  merged
}

/// Two or more normalized ranges.
///
/// INVARIANT: never fewer than two ranges; sorted, disjoint and non-touching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorSet {
  ranges:     SmallVec<[Range; 2]>,
  cursor_ids: SmallVec<[CursorId; 2]>,
}

impl CursorSet {
  pub fn ranges(&self) -> &[Range] {
    &self.ranges
  }

  pub fn cursor_ids(&self) -> &[CursorId] {
    &self.cursor_ids
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.ranges.len()
  }

  /// Always false, kept for symmetry with `len`.
  #[inline]
  pub fn is_empty(&self) -> bool {
    false
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Range> {
    self.ranges.iter()
  }

  pub fn iter_with_ids(&self) -> impl Iterator<Item = (CursorId, Range)> + '_ {
    self
      .cursor_ids
      .iter()
      .copied()
      .zip(self.ranges.iter().copied())
  }

  pub fn index_of(&self, id: CursorId) -> Option<usize> {
    self.cursor_ids.iter().position(|cursor_id| *cursor_id == id)
  }

  pub fn range_by_id(&self, id: CursorId) -> Option<Range> {
    self.index_of(id).map(|idx| self.ranges[idx])
  }
}

/// What the engine publishes: either the host's ordinary single selection or
/// a multi-cursor set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMode {
  Single(Range),
  Multi(CursorSet),
}

impl Default for SelectionMode {
  fn default() -> Self {
    SelectionMode::point(0)
  }
}

impl From<Range> for SelectionMode {
  fn from(range: Range) -> Self {
    SelectionMode::Single(range)
  }
}

impl SelectionMode {
  /// Normalizes `ranges` and picks the mode by the number that survive.
  pub fn new(ranges: impl IntoIterator<Item = Range>) -> Result<Self> {
    let pairs = ranges
      .into_iter()
      .map(|range| (range, CursorId::fresh()))
      .collect();
    Self::from_pairs(pairs)
  }

  pub(crate) fn from_pairs(pairs: Pairs) -> Result<Self> {
    let mut pairs = coalesce_pairs(pairs);
    match pairs.len() {
      0 => Err(SelectionError::EmptySelection),
      1 => Ok(SelectionMode::Single(pairs[0].0)),
      _ => {
        let (ranges, cursor_ids) = pairs.drain(..).unzip();
        Ok(SelectionMode::Multi(CursorSet { ranges, cursor_ids }))
      },
    }
  }

  #[inline]
  pub fn point(pos: usize) -> Self {
    SelectionMode::Single(Range::point(pos))
  }

  #[inline]
  pub fn is_multi(&self) -> bool {
    matches!(self, SelectionMode::Multi(_))
  }

  pub fn ranges(&self) -> &[Range] {
    match self {
      SelectionMode::Single(range) => std::slice::from_ref(range),
      SelectionMode::Multi(set) => set.ranges(),
    }
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.ranges().len()
  }

  /// A selection always holds at least one range.
  #[inline]
  pub fn is_empty(&self) -> bool {
    false
  }

  /// The first range; what survives a collapse to single-selection mode.
  pub fn primary(&self) -> Range {
    self.ranges()[0]
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Range> {
    self.ranges().iter()
  }

  /// Fails when any range lies outside `[0, len]`.
  pub fn ensure_within(&self, len: usize) -> Result<()> {
    match self.iter().find(|range| !range.is_within(len)) {
      Some(range) => {
        Err(SelectionError::RangeOutOfBounds {
          start: range.start,
          end: range.end,
          len,
        })
      },
      None => Ok(()),
    }
  }

  pub fn fragments<'a>(&'a self, text: RopeSlice<'a>) -> impl Iterator<Item = Cow<'a, str>> + 'a {
    self.iter().map(move |range| range.fragment(text))
  }

  /// Maps every range through `f`. Ranges for which `f` returns `None` are
  /// omitted; if none are left the transform fails with
  /// [`SelectionError::NoRanges`].
  pub fn transform<F>(&self, mut f: F) -> Result<Self>
  where
    F: FnMut(Range) -> Option<Range>,
  {
    let pairs: Pairs = Cursors::from(self)
      .pairs
      .into_iter()
      .filter_map(|(range, id)| f(range).map(|range| (range, id)))
      .collect();
    if pairs.is_empty() {
      return Err(SelectionError::NoRanges);
    }
    Self::from_pairs(pairs)
  }

  /// Adds a range, promoting a single selection to a cursor set.
  #[must_use]
  pub fn push(&self, range: Range) -> Self {
    let mut cursors = Cursors::from(self);
    cursors.push(range);
    cursors.into_mode().unwrap_or_else(|_| SelectionMode::Single(range))
  }

  pub fn remove(&self, id: CursorId) -> Result<Self> {
    let SelectionMode::Multi(set) = self else {
      return Err(SelectionError::CursorIdNotFound { id: id.get() });
    };
    let idx = set
      .index_of(id)
      .ok_or(SelectionError::CursorIdNotFound { id: id.get() })?;
    let pairs = set
      .iter_with_ids()
      .enumerate()
      .filter(|(i, _)| *i != idx)
      .map(|(_, (id, range))| (range, id))
      .collect();
    Self::from_pairs(pairs)
  }

  #[must_use]
  pub fn collapse_to_primary(&self) -> Self {
    SelectionMode::Single(self.primary())
  }
}

/// Working list of cursors while a command runs.
///
/// Unlike [`SelectionMode`] it may be empty, and it keeps ids for single
/// selections too so that batch commands can track every cursor the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursors {
  pub(crate) pairs: Pairs,
}

impl From<&SelectionMode> for Cursors {
  fn from(mode: &SelectionMode) -> Self {
    let pairs = match mode {
      SelectionMode::Single(range) => smallvec![(*range, CursorId::fresh())],
      SelectionMode::Multi(set) => {
        set
          .iter_with_ids()
          .map(|(id, range)| (range, id))
          .collect()
      },
    };
    Self { pairs }
  }
}

impl Cursors {
  pub fn len(&self) -> usize {
    self.pairs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.pairs.is_empty()
  }

  /// Snapshot of the ids in ascending offset order.
  pub fn ids(&self) -> SmallVec<[CursorId; 4]> {
    self.pairs.iter().map(|(_, id)| *id).collect()
  }

  pub fn ranges(&self) -> impl Iterator<Item = Range> + '_ {
    self.pairs.iter().map(|(range, _)| *range)
  }

  pub fn get(&self, id: CursorId) -> Option<Range> {
    self
      .pairs
      .iter()
      .find(|(_, cursor_id)| *cursor_id == id)
      .map(|(range, _)| *range)
  }

  /// Replaces the range of `id`, re-adding it if an edit consumed it.
  ///
  /// Nothing is merged here: a cursor moved onto its neighbour keeps its own
  /// id until [`Cursors::normalize`] or [`Cursors::into_mode`] runs.
  pub fn set(&mut self, id: CursorId, range: Range) {
    match self.pairs.iter_mut().find(|(_, cursor_id)| *cursor_id == id) {
      Some(pair) => pair.0 = range,
      None => self.pairs.push((range, id)),
    }
  }

  pub fn push(&mut self, range: Range) -> CursorId {
    let id = CursorId::fresh();
    self.pairs.push((range, id));
    self.normalize();
    id
  }

  pub(crate) fn normalize(&mut self) {
    let pairs = std::mem::take(&mut self.pairs);
    self.pairs = coalesce_pairs(pairs);
  }

  pub fn into_mode(self) -> Result<SelectionMode> {
    SelectionMode::from_pairs(self.pairs)
  }
}
