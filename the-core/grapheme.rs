//! Grapheme cluster boundaries over a `Rope`'s text.
//!
//! A caret step moves by one grapheme so that `\r\n` and combined sequences
//! are never split by a single left/right command.

use ropey::{
  RopeSlice,
  str_utils::byte_to_char_idx,
};
use unicode_segmentation::{
  GraphemeCursor,
  GraphemeIncomplete,
};

/// Finds the grapheme boundary after `char_idx`, or the end of the slice.
#[must_use]
pub fn next_grapheme_boundary(slice: RopeSlice, char_idx: usize) -> usize {
  assert!(char_idx <= slice.len_chars());

  let byte_idx = slice.char_to_byte(char_idx);
  let (mut chunk, mut chunk_byte_idx, mut chunk_char_idx, _) = slice.chunk_at_byte(byte_idx);
  let mut cursor = GraphemeCursor::new(byte_idx, slice.len_bytes(), true);

  loop {
    match cursor.next_boundary(chunk, chunk_byte_idx) {
      Ok(None) => return slice.len_chars(),
      Ok(Some(boundary)) => {
        return chunk_char_idx + byte_to_char_idx(chunk, boundary - chunk_byte_idx);
      },
      Err(GraphemeIncomplete::NextChunk) => {
        chunk_byte_idx += chunk.len();
        let (next, _, next_char_idx, _) = slice.chunk_at_byte(chunk_byte_idx);
        chunk = next;
        chunk_char_idx = next_char_idx;
      },
      Err(GraphemeIncomplete::PreContext(n)) => {
        let context = slice.chunk_at_byte(n - 1).0;
        cursor.provide_context(context, n - context.len());
      },
      Err(_) => unreachable!("grapheme cursor requested unsupported context"),
    }
  }
}

/// Finds the grapheme boundary before `char_idx`, or zero.
#[must_use]
pub fn prev_grapheme_boundary(slice: RopeSlice, char_idx: usize) -> usize {
  assert!(char_idx <= slice.len_chars());

  let byte_idx = slice.char_to_byte(char_idx);
  let (mut chunk, mut chunk_byte_idx, mut chunk_char_idx, _) = slice.chunk_at_byte(byte_idx);
  let mut cursor = GraphemeCursor::new(byte_idx, slice.len_bytes(), true);

  loop {
    match cursor.prev_boundary(chunk, chunk_byte_idx) {
      Ok(None) => return 0,
      Ok(Some(boundary)) => {
        return chunk_char_idx + byte_to_char_idx(chunk, boundary - chunk_byte_idx);
      },
      Err(GraphemeIncomplete::PrevChunk) => {
        let (prev, prev_byte_idx, prev_char_idx, _) = slice.chunk_at_byte(chunk_byte_idx - 1);
        chunk = prev;
        chunk_byte_idx = prev_byte_idx;
        chunk_char_idx = prev_char_idx;
      },
      Err(GraphemeIncomplete::PreContext(n)) => {
        let context = slice.chunk_at_byte(n - 1).0;
        cursor.provide_context(context, n - context.len());
      },
      Err(_) => unreachable!("grapheme cursor requested unsupported context"),
    }
  }
}
