//! Text primitives shared by the cursor engine: character classes, line
//! endings and grapheme cluster boundaries over [`ropey::RopeSlice`].

pub mod chars;
pub mod grapheme;
pub mod line_ending;
