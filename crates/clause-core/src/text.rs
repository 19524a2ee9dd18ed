//! Text normalisation, hashing and lenient number parsing shared by the
//! document decoder, identity resolver and rule evaluation.

use sha2::{Digest, Sha256};

// ─── Normalisation ───────────────────────────────────────────────────────────

/// Case-fold and collapse runs of whitespace.
pub(crate) fn normalize(s: &str) -> String {
  s.split_whitespace()
    .map(str::to_lowercase)
    .collect::<Vec<_>>()
    .join(" ")
}

/// Lowercase ASCII alphanumerics only: `"PCI-DSS"` and `"pci dss"` fold to the
/// same key.
pub(crate) fn fold(s: &str) -> String {
  s.chars()
    .filter(char::is_ascii_alphanumeric)
    .map(|c| c.to_ascii_lowercase())
    .collect()
}

/// `true` when `observed` mentions `required`, ignoring case and punctuation.
pub(crate) fn mentions(observed: &str, required: &str) -> bool {
  let required = fold(required);
  !required.is_empty() && fold(observed).contains(&required)
}

// ─── Hashing ─────────────────────────────────────────────────────────────────

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
  hex::encode(Sha256::digest(bytes))
}

/// A 16-hex-digit digest over `parts`, separated by a unit separator so that
/// `["ab", "c"]` and `["a", "bc"]` differ.
pub(crate) fn short_hash(parts: &[&str]) -> String {
  let mut hasher = Sha256::new();
  for (i, part) in parts.iter().enumerate() {
    if i > 0 {
      hasher.update([0x1f]);
    }
    hasher.update(part.as_bytes());
  }
  let mut digest = hex::encode(hasher.finalize());
  digest.truncate(16);
  digest
}

// ─── Lenient parsing ─────────────────────────────────────────────────────────

/// Parse a monetary amount written by an extraction model.
///
/// Accepts `"5000000"`, `"$5,000,000"`, `"USD 5,000,000"`, `"5 million"`,
/// `"2.5m"` and `"250k"`. Returns `None` for anything else (e.g.
/// `"fees paid in the prior 12 months"`).
pub(crate) fn parse_amount(raw: &str) -> Option<f64> {
  let lower = raw.trim().to_lowercase();
  let mut multiplier = 1.0;
  let mut number = String::new();

  for token in lower.split_whitespace() {
    match token {
      "usd" | "eur" | "gbp" | "jpy" | "chf" | "cad" | "aud" | "dollars"
      | "euros" | "pounds" => {}
      "thousand" => multiplier *= 1e3,
      "million" | "mm" => multiplier *= 1e6,
      "billion" | "bn" => multiplier *= 1e9,
      other => number.push_str(other),
    }
  }

  let mut cleaned: String = number
    .chars()
    .filter(|c| !matches!(c, ',' | '_' | '$' | '€' | '£' | '¥'))
    .collect();

  let compact = [("bn", 1e9), ("m", 1e6), ("k", 1e3)]
    .into_iter()
    .find(|(suffix, _)| cleaned.len() > suffix.len() && cleaned.ends_with(suffix));
  if let Some((suffix, factor)) = compact {
    cleaned.truncate(cleaned.len() - suffix.len());
    multiplier *= factor;
  }

  cleaned
    .parse::<f64>()
    .ok()
    .map(|v| v * multiplier)
    .filter(|v| v.is_finite())
}

/// Parse a yes/no style flag.
pub(crate) fn parse_flag(raw: &str) -> Option<bool> {
  match raw.trim().to_lowercase().as_str() {
    "true" | "yes" | "y" | "1" | "required" => Some(true),
    "false" | "no" | "n" | "0" | "not required" => Some(false),
    _ => None,
  }
}

/// Convert a period such as `"72 hours"`, `"within 24h"`, `"3 business days"`
/// or `"72 (seventy-two) hours"` to hours.
pub(crate) fn parse_hours(raw: &str) -> Option<f64> {
  let lower = raw.to_lowercase();
  let chars: Vec<char> = lower.chars().collect();
  let mut i = 0;

  while i < chars.len() {
    if !chars[i].is_ascii_digit() {
      i += 1;
      continue;
    }
    let start = i;
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
      i += 1;
    }
    let Ok(value) = chars[start..i].iter().collect::<String>().parse::<f64>()
    else {
      continue;
    };

    let rest: String = chars[i..].iter().collect();
    let unit = rest
      .split(|c: char| !c.is_ascii_alphabetic())
      .filter(|w| !w.is_empty())
      .take(3)
      .find_map(hours_per_unit);
    if let Some(factor) = unit {
      return Some(value * factor);
    }
  }
  None
}

fn hours_per_unit(word: &str) -> Option<f64> {
  match word {
    "h" | "hr" | "hrs" | "hour" | "hours" => Some(1.0),
    "day" | "days" => Some(24.0),
    "week" | "weeks" => Some(168.0),
    "min" | "mins" | "minute" | "minutes" => Some(1.0 / 60.0),
    _ => None,
  }
}

/// Every number directly followed by `%` or the word `percent`.
pub(crate) fn percentages(raw: &str) -> Vec<f64> {
  let lower = raw.to_lowercase();
  let chars: Vec<char> = lower.chars().collect();
  let mut found = Vec::new();
  let mut i = 0;

  while i < chars.len() {
    if !chars[i].is_ascii_digit() {
      i += 1;
      continue;
    }
    let start = i;
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
      i += 1;
    }
    let rest: String = chars[i..].iter().collect();
    let rest = rest.trim_start();
    if (rest.starts_with('%') || rest.starts_with("percent"))
      && let Ok(value) = chars[start..i].iter().collect::<String>().parse::<f64>()
    {
      found.push(value);
    }
  }
  found
}

// ─── Formatting ──────────────────────────────────────────────────────────────

/// `6000000.0` → `"6,000,000"`, `1234.5` → `"1,234.50"`.
pub(crate) fn format_amount(value: f64) -> String {
  if value.is_infinite() {
    return "unlimited".to_owned();
  }
  let total_cents = (value.abs() * 100.0).round() as u64;
  let negative = value < 0.0 && total_cents > 0;
  let whole = total_cents / 100;
  let cents = total_cents % 100;

  let digits = whole.to_string();
  let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
  for (i, c) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(c);
  }

  let sign = if negative { "-" } else { "" };
  if cents == 0 {
    format!("{sign}{grouped}")
  } else {
    format!("{sign}{grouped}.{cents:02}")
  }
}
