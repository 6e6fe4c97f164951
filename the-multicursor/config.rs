//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! indent-unit = { spaces = 2 }
//! line-ending = "crlf"
//! soft-wrap = 80
//! max-cursors = 512
//! ```

use std::num::NonZeroUsize;

use serde::{
  Deserialize,
  Serialize,
};
use the_core::line_ending::LineEnding;
use thiserror::Error;

use crate::segment::TextSegmenter;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to parse engine config: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("indent width must be between 1 and 16, got {0}")]
  InvalidIndentWidth(u8),
  #[error("max-cursors must be at least 1")]
  ZeroMaxCursors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndentUnit {
  Tabs,
  Spaces(u8),
}

impl Default for IndentUnit {
  fn default() -> Self {
    IndentUnit::Spaces(4)
  }
}

impl IndentUnit {
  pub fn as_str(&self) -> &'static str {
    const SPACES: &str = "                ";
    match *self {
      IndentUnit::Tabs => "\t",
      IndentUnit::Spaces(n) => &SPACES[..(n as usize).min(SPACES.len())],
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineEndingConfig {
  #[default]
  Lf,
  Crlf,
}

impl From<LineEndingConfig> for LineEnding {
  fn from(config: LineEndingConfig) -> Self {
    match config {
      LineEndingConfig::Lf => LineEnding::LF,
      LineEndingConfig::Crlf => LineEnding::Crlf,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct EngineConfig {
  /// Inserted by indent and removed by outdent.
  pub indent_unit: IndentUnit,
  /// Used when paste has to start a new line at the end of the buffer.
  pub line_ending: LineEndingConfig,
  /// Wrap width of the default segmenter's visual lines.
  pub soft_wrap:   Option<NonZeroUsize>,
  /// Upper bound on the cursors a paste or add-cursor command may create.
  pub max_cursors: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      indent_unit: IndentUnit::default(),
      line_ending: LineEndingConfig::default(),
      soft_wrap:   None,
      max_cursors: 10_000,
    }
  }
}

impl EngineConfig {
  pub fn from_toml_str(source: &str) -> Result<Self> {
    let config: EngineConfig = toml::from_str(source)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<()> {
    if let IndentUnit::Spaces(n) = self.indent_unit {
      if n == 0 || n > 16 {
        return Err(ConfigError::InvalidIndentWidth(n));
      }
    }
    if self.max_cursors == 0 {
      return Err(ConfigError::ZeroMaxCursors);
    }
    Ok(())
  }

  #[inline]
  pub fn indent_string(&self) -> &'static str {
    self.indent_unit.as_str()
  }

  #[inline]
  pub fn line_ending(&self) -> LineEnding {
    self.line_ending.into()
  }

  pub fn segmenter(&self) -> TextSegmenter {
    TextSegmenter::new(self.soft_wrap)
  }
}
