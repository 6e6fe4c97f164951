//! Command dispatch and selection publication.
//!
//! The [`Engine`] owns the current [`SelectionMode`]. Each call to
//! [`Engine::execute`] runs one command to completion against the host's
//! buffer, wraps editing commands in a single undo group and publishes the
//! resulting selection as a [`SelectionUpdate`] tagged with
//! [`UpdateSource::Engine`].
//!
//! Hosts echo every selection change they observe back through
//! [`Engine::selection_changed`]. Updates the engine published itself are
//! ignored; anything else came from outside (a mouse click, a programmatic
//! selection) and drops the engine back to a single selection.

use ropey::RopeSlice;
use thiserror::Error;
use tracing::{
  debug,
  trace,
  warn,
};

use crate::{
  Tendril,
  buffer::{
    Buffer,
    RecordingBuffer,
  },
  case_convention::CaseTransform,
  clipboard::{
    self,
    ClipboardError,
    ClipboardPayload,
  },
  config::EngineConfig,
  edit::{
    self,
    DeleteUnit,
    EditError,
  },
  history::{
    History,
    HistoryError,
    UndoRecorder,
  },
  movement::{
    Direction,
    Motion,
    Movement,
    move_selection,
  },
  segment::Segmenter,
  selection::{
    CursorId,
    Cursors,
    Range,
    SelectionError,
    SelectionMode,
  },
};

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error(transparent)]
  Selection(#[from] SelectionError),
  #[error(transparent)]
  Edit(#[from] EditError),
  #[error(transparent)]
  Clipboard(#[from] ClipboardError),
  #[error(transparent)]
  History(#[from] HistoryError),
}

/// Who wrote a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
  Engine,
  External,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionUpdate {
  pub source:    UpdateSource,
  pub selection: SelectionMode,
}

impl SelectionUpdate {
  pub fn external(selection: impl Into<SelectionMode>) -> Self {
    Self {
      source:    UpdateSource::External,
      selection: selection.into(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Move {
    motion:    Motion,
    direction: Direction,
    movement:  Movement,
  },
  Delete {
    unit:      DeleteUnit,
    direction: Direction,
  },
  /// Deletes selected text only. Carets are left alone.
  DeleteSelection,
  Insert(Tendril),
  Transpose,
  ChangeCase(CaseTransform),
  Indent,
  Outdent,
  Paste(ClipboardPayload),
  AddCursor(Range),
  AddCursorAbove,
  AddCursorBelow,
  RemoveCursor(CursorId),
  CollapseToPrimary,
  SelectAll,
}

impl Command {
  /// Whether the command can change the buffer.
  pub fn is_edit(&self) -> bool {
    matches!(
      self,
      Command::Delete { .. }
        | Command::DeleteSelection
        | Command::Insert(_)
        | Command::Transpose
        | Command::ChangeCase(_)
        | Command::Indent
        | Command::Outdent
        | Command::Paste(_)
    )
  }
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
  config:    EngineConfig,
  selection: SelectionMode,
}

impl Engine {
  pub fn new(config: EngineConfig) -> Self {
    Self {
      config,
      selection: SelectionMode::default(),
    }
  }

  pub fn with_selection(mut self, selection: SelectionMode) -> Self {
    self.selection = selection;
    self
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn selection(&self) -> &SelectionMode {
    &self.selection
  }

  #[inline]
  pub fn is_multi(&self) -> bool {
    self.selection.is_multi()
  }

  /// Runs `command` and publishes the new selection.
  pub fn execute(
    &mut self,
    buffer: &mut dyn Buffer,
    segmenter: &dyn Segmenter,
    undo: &mut dyn UndoRecorder,
    command: Command,
  ) -> Result<SelectionUpdate> {
    self.selection.ensure_within(buffer.len_chars())?;
    debug!(?command, cursors = self.selection.len(), "executing command");

    let next = if command.is_edit() {
      let before = self.selection.clone();
      undo.begin_group(&before);
      let result = {
        let mut recording = RecordingBuffer::new(buffer, undo);
        self.run_edit(&mut recording, segmenter, command)
      };
      undo.end_group(result.as_ref().unwrap_or(&before));
      result?
    } else {
      self.run_selection(buffer, segmenter, command)?
    };
    Ok(self.publish(next))
  }

  fn run_edit(
    &self,
    buffer: &mut dyn Buffer,
    segmenter: &dyn Segmenter,
    command: Command,
  ) -> Result<SelectionMode> {
    let selection = &self.selection;
    let next = match command {
      Command::Delete { unit, direction } => {
        edit::delete(buffer, segmenter, selection, unit, direction)?
      },
      Command::DeleteSelection => edit::insert(buffer, selection, "")?,
      Command::Insert(text) => edit::insert(buffer, selection, &text)?,
      Command::Transpose => edit::transpose(buffer, selection)?,
      Command::ChangeCase(transform) => {
        edit::change_case(buffer, segmenter, selection, transform)?
      },
      Command::Indent => {
        edit::indent(buffer, segmenter, selection, self.config.indent_string())?
      },
      Command::Outdent => {
        edit::outdent(buffer, segmenter, selection, self.config.indent_string())?
      },
      Command::Paste(payload) => {
        clipboard::paste(buffer, segmenter, selection, &payload, &self.config)?
      },
      command => self.run_selection(buffer, segmenter, command)?,
    };
    Ok(next)
  }

  fn run_selection(
    &self,
    buffer: &dyn Buffer,
    segmenter: &dyn Segmenter,
    command: Command,
  ) -> Result<SelectionMode> {
    let text = buffer.text();
    let selection = &self.selection;
    let next = match command {
      Command::Move {
        motion,
        direction,
        movement,
      } => move_selection(text, segmenter, selection, motion, direction, movement),
      Command::AddCursor(range) => {
        if !range.is_within(text.len_chars()) {
          return Err(
            SelectionError::RangeOutOfBounds {
              start: range.start,
              end:   range.end,
              len:   text.len_chars(),
            }
            .into(),
          );
        }
        if selection.len() >= self.config.max_cursors {
          warn!(max_cursors = self.config.max_cursors, "cursor limit reached");
          selection.clone()
        } else {
          selection.push(range)
        }
      },
      Command::AddCursorAbove => self.add_vertical(text, segmenter, Direction::Backward)?,
      Command::AddCursorBelow => self.add_vertical(text, segmenter, Direction::Forward)?,
      Command::RemoveCursor(id) => selection.remove(id)?,
      Command::CollapseToPrimary => selection.collapse_to_primary(),
      Command::SelectAll => SelectionMode::Single(Range::new(0, text.len_chars())),
      command => {
        trace!(?command, "editing command reached selection dispatch");
        selection.clone()
      },
    };
    Ok(next)
  }

  /// Adds a caret one visual line above (`Backward`) or below (`Forward`)
  /// every cursor.
  fn add_vertical(
    &self,
    text: RopeSlice,
    segmenter: &dyn Segmenter,
    direction: Direction,
  ) -> Result<SelectionMode> {
    let targets: Vec<usize> = self
      .selection
      .iter()
      .filter_map(|range| {
        match direction {
          Direction::Backward => segmenter.offset_above(text, range.start),
          Direction::Forward => segmenter.offset_below(text, range.end),
        }
      })
      .collect();

    let mut cursors = Cursors::from(&self.selection);
    for pos in targets {
      if cursors.len() >= self.config.max_cursors {
        warn!(max_cursors = self.config.max_cursors, "cursor limit reached");
        break;
      }
      cursors.push(Range::point(pos));
    }
    Ok(cursors.into_mode()?)
  }

  fn publish(&mut self, selection: SelectionMode) -> SelectionUpdate {
    match (self.selection.is_multi(), selection.is_multi()) {
      (false, true) => debug!(cursors = selection.len(), "entering multi-cursor mode"),
      (true, false) => debug!("leaving multi-cursor mode"),
      _ => {},
    }
    self.selection = selection.clone();
    SelectionUpdate {
      source: UpdateSource::Engine,
      selection,
    }
  }

  /// The clipboard payload for the current selection.
  pub fn copy(&self, buffer: &dyn Buffer) -> ClipboardPayload {
    clipboard::copy(buffer.text(), &self.selection)
  }

  /// Copies the current selection, then deletes the selected text.
  pub fn cut(
    &mut self,
    buffer: &mut dyn Buffer,
    segmenter: &dyn Segmenter,
    undo: &mut dyn UndoRecorder,
  ) -> Result<(ClipboardPayload, SelectionUpdate)> {
    let payload = self.copy(buffer);
    let update = self.execute(buffer, segmenter, undo, Command::DeleteSelection)?;
    Ok((payload, update))
  }

  /// Reverts the last undo group and restores the selection from before it.
  pub fn undo(
    &mut self,
    buffer: &mut dyn Buffer,
    history: &mut History,
  ) -> Result<Option<SelectionUpdate>> {
    let Some(selection) = history.undo(buffer)? else {
      return Ok(None);
    };
    Ok(Some(self.publish(selection)))
  }

  pub fn redo(
    &mut self,
    buffer: &mut dyn Buffer,
    history: &mut History,
  ) -> Result<Option<SelectionUpdate>> {
    let Some(selection) = history.redo(buffer)? else {
      return Ok(None);
    };
    Ok(Some(self.publish(selection)))
  }

  /// Feeds back a selection change the host observed. Returns whether the
  /// engine's selection changed.
  pub fn selection_changed(&mut self, update: &SelectionUpdate) -> bool {
    match update.source {
      UpdateSource::Engine => {
        trace!("ignoring selection update published by the engine");
        false
      },
      UpdateSource::External => {
        let next = SelectionMode::Single(update.selection.primary());
        if self.selection.is_multi() {
          debug!("external selection change, leaving multi-cursor mode");
        }
        let changed = next != self.selection;
        self.selection = next;
        changed
      },
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{
    buffer::TextBuffer,
    history::NoUndo,
    segment::TextSegmenter,
  };

  fn carets(positions: &[usize]) -> SelectionMode {
    SelectionMode::new(positions.iter().map(|&pos| Range::point(pos))).unwrap()
  }

  fn spans(selection: &SelectionMode) -> Vec<(usize, usize)> {
    selection.iter().map(|r| (r.start, r.end)).collect()
  }

  fn insert(text: &str) -> Command {
    Command::Insert(Tendril::from(text))
  }

  #[test]
  fn test_edit_and_undo_restore_text_and_cursors() {
    let mut buffer = TextBuffer::new("one\ntwo\nthree");
    let seg = TextSegmenter::default();
    let mut history = History::new();
    let mut engine = Engine::default().with_selection(carets(&[0, 4, 8]));

    let update = engine
      .execute(&mut buffer, &seg, &mut history, insert("> "))
      .unwrap();
    assert_eq!(update.source, UpdateSource::Engine);
    assert_eq!(buffer.rope(), "> one\n> two\n> three");
    assert_eq!(spans(&update.selection), vec![(2, 2), (8, 8), (14, 14)]);

    let undone = engine.undo(&mut buffer, &mut history).unwrap().unwrap();
    assert_eq!(buffer.rope(), "one\ntwo\nthree");
    assert_eq!(spans(&undone.selection), vec![(0, 0), (4, 4), (8, 8)]);

    let redone = engine.redo(&mut buffer, &mut history).unwrap().unwrap();
    assert_eq!(buffer.rope(), "> one\n> two\n> three");
    assert_eq!(redone.selection, update.selection);
    assert_eq!(engine.selection(), &update.selection);
  }

  #[test]
  fn test_movement_does_not_record_undo() {
    let mut buffer = TextBuffer::new("abc");
    let seg = TextSegmenter::default();
    let mut history = History::new();
    let mut engine = Engine::default();
    engine
      .execute(&mut buffer, &seg, &mut history, Command::Move {
        motion:    Motion::Char,
        direction: Direction::Forward,
        movement:  Movement::Extend,
      })
      .unwrap();
    assert_eq!(engine.selection(), &SelectionMode::Single(Range::new(0, 1)));
    assert!(history.is_empty());
  }

  #[test]
  fn test_vetoed_command_records_nothing() {
    let mut buffer = TextBuffer::new("abc").with_veto(|_, _| false);
    let seg = TextSegmenter::default();
    let mut history = History::new();
    let mut engine = Engine::default().with_selection(carets(&[1, 2]));
    let update = engine
      .execute(&mut buffer, &seg, &mut history, insert("x"))
      .unwrap();
    assert_eq!(buffer.rope(), "abc");
    assert_eq!(spans(&update.selection), vec![(1, 1), (2, 2)]);
    assert!(history.is_empty());
  }

  #[test]
  fn test_collapse_to_single_mode() {
    let mut buffer = TextBuffer::new("abcdef");
    let seg = TextSegmenter::default();
    let mut engine = Engine::default().with_selection(carets(&[2, 4]));
    assert!(engine.is_multi());

    let update = engine
      .execute(&mut buffer, &seg, &mut NoUndo, Command::Delete {
        unit:      DeleteUnit::LineBoundary,
        direction: Direction::Backward,
      })
      .unwrap();
    assert_eq!(update.selection, SelectionMode::point(0));
    assert!(!engine.is_multi());

    // Later commands act on the single caret only.
    engine
      .execute(&mut buffer, &seg, &mut NoUndo, insert("z"))
      .unwrap();
    assert_eq!(buffer.rope(), "zef");
    assert_eq!(engine.selection(), &SelectionMode::point(1));
  }

  #[test]
  fn test_external_change_leaves_multi_mode() {
    let mut engine = Engine::default().with_selection(carets(&[1, 5]));
    let published = SelectionUpdate {
      source:    UpdateSource::Engine,
      selection: SelectionMode::point(3),
    };
    assert!(!engine.selection_changed(&published));
    assert!(engine.is_multi());

    assert!(engine.selection_changed(&SelectionUpdate::external(Range::new(2, 4))));
    assert_eq!(engine.selection(), &SelectionMode::Single(Range::new(2, 4)));
  }

  #[test]
  fn test_cursor_management() {
    let mut buffer = TextBuffer::new("abc\ndef\nghi");
    let seg = TextSegmenter::default();
    let mut engine = Engine::default().with_selection(SelectionMode::point(5));

    let update = engine
      .execute(&mut buffer, &seg, &mut NoUndo, Command::AddCursorAbove)
      .unwrap();
    assert_eq!(spans(&update.selection), vec![(1, 1), (5, 5)]);

    let update = engine
      .execute(&mut buffer, &seg, &mut NoUndo, Command::AddCursorBelow)
      .unwrap();
    assert_eq!(spans(&update.selection), vec![(1, 1), (5, 5), (9, 9)]);

    let update = engine
      .execute(
        &mut buffer,
        &seg,
        &mut NoUndo,
        Command::AddCursor(Range::new(9, 11)),
      )
      .unwrap();
    assert_eq!(spans(&update.selection), vec![(1, 1), (5, 5), (9, 11)]);

    let SelectionMode::Multi(set) = &update.selection else {
      panic!("expected a cursor set");
    };
    let middle = set.cursor_ids()[1];
    let update = engine
      .execute(&mut buffer, &seg, &mut NoUndo, Command::RemoveCursor(middle))
      .unwrap();
    assert_eq!(spans(&update.selection), vec![(1, 1), (9, 11)]);

    let update = engine
      .execute(&mut buffer, &seg, &mut NoUndo, Command::CollapseToPrimary)
      .unwrap();
    assert_eq!(update.selection, SelectionMode::point(1));

    let update = engine
      .execute(&mut buffer, &seg, &mut NoUndo, Command::SelectAll)
      .unwrap();
    assert_eq!(update.selection, SelectionMode::Single(Range::new(0, 11)));
  }

  #[test]
  fn test_add_cursor_out_of_bounds() {
    let mut buffer = TextBuffer::new("abc");
    let seg = TextSegmenter::default();
    let mut engine = Engine::default();
    let err = engine
      .execute(
        &mut buffer,
        &seg,
        &mut NoUndo,
        Command::AddCursor(Range::point(7)),
      )
      .unwrap_err();
    assert!(matches!(
      err,
      EngineError::Selection(SelectionError::RangeOutOfBounds { .. })
    ));
  }

  #[test]
  fn test_stale_selection_is_rejected() {
    let mut buffer = TextBuffer::new("ab");
    let seg = TextSegmenter::default();
    let mut engine = Engine::default().with_selection(carets(&[1, 9]));
    let err = engine
      .execute(&mut buffer, &seg, &mut NoUndo, insert("x"))
      .unwrap_err();
    assert!(matches!(err, EngineError::Selection(_)));
    assert_eq!(buffer.rope(), "ab");
  }

  #[test]
  fn test_cut_and_paste_between_cursor_sets() {
    let mut buffer = TextBuffer::new("foo bar\nbaz qux");
    let seg = TextSegmenter::default();
    let mut history = History::new();
    let selection = SelectionMode::new([Range::new(0, 3), Range::new(8, 11)]).unwrap();
    let mut engine = Engine::default().with_selection(selection);

    let (payload, update) = engine.cut(&mut buffer, &seg, &mut history).unwrap();
    assert_eq!(payload, ClipboardPayload::grouped(["foo", "baz"]));
    assert_eq!(buffer.rope(), " bar\n qux");
    assert_eq!(spans(&update.selection), vec![(0, 0), (5, 5)]);

    let update = engine
      .execute(&mut buffer, &seg, &mut history, Command::Paste(payload))
      .unwrap();
    assert_eq!(buffer.rope(), "foo bar\nbaz qux");
    assert_eq!(spans(&update.selection), vec![(3, 3), (11, 11)]);

    assert_eq!(history.len(), 2);
  }

  #[test]
  fn test_indent_uses_configured_unit() {
    let config = EngineConfig::from_toml_str(r#"indent-unit = "tabs""#).unwrap();
    let mut buffer = TextBuffer::new("a\nb");
    let seg = config.segmenter();
    let mut engine = Engine::new(config).with_selection(carets(&[0, 2]));

    engine
      .execute(&mut buffer, &seg, &mut NoUndo, Command::Indent)
      .unwrap();
    assert_eq!(buffer.rope(), "\ta\n\tb");
    engine
      .execute(&mut buffer, &seg, &mut NoUndo, Command::Outdent)
      .unwrap();
    assert_eq!(buffer.rope(), "a\nb");
    assert_eq!(spans(engine.selection()), vec![(0, 0), (2, 2)]);
  }

  #[test]
  fn test_change_case_command() {
    let mut buffer = TextBuffer::new("hello world");
    let seg = TextSegmenter::default();
    let mut engine = Engine::default().with_selection(carets(&[2, 8]));
    let update = engine
      .execute(
        &mut buffer,
        &seg,
        &mut NoUndo,
        Command::ChangeCase(CaseTransform::Capitalize),
      )
      .unwrap();
    assert_eq!(buffer.rope(), "Hello World");
    assert_eq!(spans(&update.selection), vec![(0, 5), (6, 11)]);
  }

  const ALPHABET: [char; 5] = ['a', 'b', '_', ' ', '\n'];

  fn build_text(raw: &[u8]) -> String {
    raw
      .iter()
      .take(48)
      .map(|&b| ALPHABET[b as usize % ALPHABET.len()])
      .collect()
  }

  fn build_carets(raw: &[u8], len: usize) -> SelectionMode {
    let positions = raw
      .iter()
      .take(8)
      .map(|&b| Range::point(b as usize % (len + 1)));
    SelectionMode::new(positions).unwrap_or_default()
  }

  fn build_command(seed: u8) -> Command {
    let moving = |motion, direction, movement| {
      Command::Move {
        motion,
        direction,
        movement,
      }
    };
    let deleting = |unit, direction| Command::Delete { unit, direction };
    match seed % 21 {
      0 => moving(Motion::Char, Direction::Forward, Movement::Move),
      1 => moving(Motion::Char, Direction::Backward, Movement::Extend),
      2 => moving(Motion::Word, Direction::Forward, Movement::Extend),
      3 => moving(Motion::Line, Direction::Backward, Movement::Move),
      4 => moving(Motion::Paragraph, Direction::Forward, Movement::Move),
      5 => moving(Motion::LineBoundary, Direction::Forward, Movement::Extend),
      6 => deleting(DeleteUnit::Char, Direction::Backward),
      7 => deleting(DeleteUnit::Char, Direction::Forward),
      8 => deleting(DeleteUnit::Word, Direction::Forward),
      9 => deleting(DeleteUnit::LineBoundary, Direction::Backward),
      10 => deleting(DeleteUnit::Paragraph, Direction::Forward),
      11 => Command::DeleteSelection,
      12 => insert("x"),
      13 => insert("\n"),
      14 => Command::Transpose,
      15 => Command::ChangeCase(CaseTransform::Upper),
      16 => Command::ChangeCase(CaseTransform::Camel),
      17 => Command::Indent,
      18 => Command::Outdent,
      19 => Command::AddCursorBelow,
      _ => Command::Paste(ClipboardPayload::grouped(["p", "q\nr", ""])),
    }
  }

  fn is_well_formed(selection: &SelectionMode, len: usize) -> bool {
    let ranges = selection.ranges();
    let sized = match selection {
      SelectionMode::Single(_) => ranges.len() == 1,
      SelectionMode::Multi(_) => ranges.len() >= 2,
    };
    sized
      && ranges.iter().all(|range| range.end <= len)
      && ranges.windows(2).all(|pair| pair[0].end < pair[1].start)
  }

  quickcheck::quickcheck! {
    fn command_sequences_keep_selection_well_formed(
      text: Vec<u8>,
      carets: Vec<u8>,
      commands: Vec<u8>
    ) -> bool {
      let text = build_text(&text);
      let mut buffer = TextBuffer::new(&text);
      let seg = TextSegmenter::default();
      let mut history = History::new();
      let selection = build_carets(&carets, text.chars().count());
      let mut engine = Engine::default().with_selection(selection);

      for seed in commands.into_iter().take(24) {
        let Ok(update) = engine.execute(&mut buffer, &seg, &mut history, build_command(seed))
        else {
          return false;
        };
        if update.selection != *engine.selection()
          || !is_well_formed(&update.selection, buffer.len_chars())
        {
          return false;
        }
      }
      true
    }

    fn char_delete_removes_one_char_per_caret(
      text: Vec<u8>,
      carets: Vec<u8>,
      forward: bool
    ) -> bool {
      let text = build_text(&text);
      let len = text.chars().count();
      let selection = build_carets(&carets, len);
      let (direction, edge) = if forward {
        (Direction::Forward, len)
      } else {
        (Direction::Backward, 0)
      };
      let expected = selection.iter().filter(|range| range.start != edge).count();

      let mut buffer = TextBuffer::new(&text);
      let seg = TextSegmenter::default();
      let mut engine = Engine::default().with_selection(selection);
      let command = Command::Delete {
        unit: DeleteUnit::Char,
        direction,
      };
      engine.execute(&mut buffer, &seg, &mut NoUndo, command).is_ok()
        && buffer.len_chars() + expected == len
    }
  }
}
