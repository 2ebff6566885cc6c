//! Decoding of Maxima's bracketed list output, e.g. `[a,[b,c],f(x,y)]`.

use log::warn;

/// Splits a bracketed list into its top-level fields.
///
/// Fields come back as raw text, untrimmed. Nested lists stay intact inside
/// their field; run `parse_list` on the field again to decode them.
/// Malformed input yields an empty list.
pub fn parse_list(text: &str) -> Vec<String> {
  match split_fields(text.trim()) {
    Some(fields) => fields,
    None => {
      warn!("unparseable list output: {text}");
      Vec::new()
    }
  }
}

/// A two-element list, e.g. `[true,false]`.
pub fn parse_pair(text: &str) -> Option<(String, String)> {
  let mut fields = parse_list(text).into_iter();
  match (fields.next(), fields.next(), fields.next()) {
    (Some(first), Some(second), None) => Some((first, second)),
    _ => None,
  }
}

fn split_fields(s: &str) -> Option<Vec<String>> {
  if !(s.starts_with('[') && s.ends_with(']')) || s.len() < 2 {
    return None;
  }
  let inner = &s[1..s.len() - 1];
  if inner.is_empty() {
    return Some(Vec::new());
  }

  let mut fields = Vec::new();
  let mut current = String::new();
  let mut open: Vec<char> = Vec::new();
  let mut escaped = false;

  for c in inner.chars() {
    if escaped {
      current.push(c);
      escaped = false;
      continue;
    }
    match c {
      '\\' => {
        escaped = true;
        current.push(c);
      }
      '[' | '(' => {
        open.push(c);
        current.push(c);
      }
      ']' | ')' => {
        let expected = if c == ']' { '[' } else { '(' };
        if open.pop() != Some(expected) {
          return None;
        }
        current.push(c);
      }
      ',' if open.is_empty() => {
        fields.push(std::mem::take(&mut current));
      }
      _ => current.push(c),
    }
  }
  if !open.is_empty() {
    return None;
  }
  fields.push(current);
  Some(fields)
}
