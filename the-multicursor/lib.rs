//! Multi-cursor selection engine.
//!
//! Every editing command runs over an ordered set of cursor ranges. After each
//! buffer mutation the surviving cursors are re-mapped ([`adjust`]), then the
//! set is re-normalized and published as a [`selection::SelectionMode`].

use smartstring::{
  LazyCompact,
  SmartString,
};

pub mod adjust;
pub mod buffer;
pub mod case_convention;
pub mod clipboard;
pub mod config;
pub mod edit;
pub mod engine;
pub mod history;
pub mod movement;
pub mod segment;
pub mod selection;

pub type Tendril = SmartString<LazyCompact>;
