//! Case conversions applied to the word under each cursor.
//!
//! The identifier conventions split their input into words first:
//!
//! ```text
//! "xmlHTTPRequest_v2" -> ["xml", "HTTP", "Request", "v2"]
//! ```
//!
//! A word ends at any non-alphanumeric char, before an uppercase letter that
//! follows a lowercase letter or digit, and before the last capital of an
//! uppercase run that continues in lowercase.

use serde::{
  Deserialize,
  Serialize,
};

use crate::Tendril;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseTransform {
  Upper,
  Lower,
  /// First letter of every word upper, the rest lower. Separators are kept.
  Capitalize,
  Snake,
  Kebab,
  Camel,
  Pascal,
}

impl CaseTransform {
  pub fn apply(self, text: &str) -> Tendril {
    match self {
      CaseTransform::Upper => text.chars().flat_map(char::to_uppercase).collect(),
      CaseTransform::Lower => text.chars().flat_map(char::to_lowercase).collect(),
      CaseTransform::Capitalize => capitalize(text),
      CaseTransform::Snake => join_words(text, Some('_'), false, false),
      CaseTransform::Kebab => join_words(text, Some('-'), false, false),
      CaseTransform::Camel => join_words(text, None, false, true),
      CaseTransform::Pascal => join_words(text, None, true, true),
    }
  }
}

fn push_cased(out: &mut Tendril, ch: char, upper: bool) {
  if upper {
    out.extend(ch.to_uppercase());
  } else {
    out.extend(ch.to_lowercase());
  }
}

fn capitalize(text: &str) -> Tendril {
  let mut out = Tendril::new();
  let mut word_start = true;
  for ch in text.chars() {
    if ch.is_alphanumeric() {
      push_cased(&mut out, ch, word_start);
      word_start = false;
    } else {
      out.push(ch);
      word_start = true;
    }
  }
  out
}

fn words(text: &str) -> Vec<&str> {
  let chars: Vec<(usize, char)> = text.char_indices().collect();
  let mut words = Vec::new();
  let mut start = None;

  for (i, &(idx, ch)) in chars.iter().enumerate() {
    if !ch.is_alphanumeric() {
      if let Some(start) = start.take() {
        words.push(&text[start..idx]);
      }
      continue;
    }
    let Some(word_start) = start else {
      start = Some(idx);
      continue;
    };

    let prev = chars[i - 1].1;
    let next_is_lower = chars.get(i + 1).is_some_and(|&(_, next)| next.is_lowercase());
    let boundary =
      ch.is_uppercase() && (!prev.is_uppercase() || next_is_lower);
    if boundary {
      words.push(&text[word_start..idx]);
      start = Some(idx);
    }
  }
  if let Some(start) = start {
    words.push(&text[start..]);
  }
  words
}

fn join_words(text: &str, sep: Option<char>, upper_first: bool, upper_rest: bool) -> Tendril {
  let mut out = Tendril::new();
  for (i, word) in words(text).into_iter().enumerate() {
    if i > 0 {
      if let Some(sep) = sep {
        out.push(sep);
      }
    }
    let mut chars = word.chars();
    if let Some(first) = chars.next() {
      push_cased(&mut out, first, if i == 0 { upper_first } else { upper_rest });
    }
    out.extend(chars.flat_map(char::to_lowercase));
  }
  out
}
