//! Field-level validation shared by every draft and payload type.
//!
//! Structural parsing is the presentation layer's job. What remains here are
//! the domain rules: required fields, length limits, slug shape and URL shape.

use std::{collections::BTreeMap, fmt};

use serde::Serialize;
use url::{Host, Url};

/// Maximum length of subject, course and module titles and of slugs.
pub const TITLE_MAX: usize = 200;
/// Maximum length of content item titles.
pub const ITEM_TITLE_MAX: usize = 250;

/// Field-level validation failures, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
  fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
  pub fn new() -> Self { Self::default() }

  pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
    self.fields.entry(field.into()).or_default().push(message.into());
  }

  /// Convenience constructor for a single failing field.
  pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
    let mut errors = Self::new();
    errors.add(field, message);
    errors
  }

  /// Merge `other` under `prefix`, e.g. `modules[2]` + `title` becomes
  /// `modules[2].title`.
  pub fn nest(&mut self, prefix: &str, other: ValidationErrors) {
    for (field, messages) in other.fields {
      self
        .fields
        .entry(format!("{prefix}.{field}"))
        .or_default()
        .extend(messages);
    }
  }

  pub fn is_empty(&self) -> bool { self.fields.is_empty() }

  pub fn contains(&self, field: &str) -> bool { self.fields.contains_key(field) }

  pub fn get(&self, field: &str) -> Option<&[String]> {
    self.fields.get(field).map(Vec::as_slice)
  }

  pub fn fields(&self) -> impl Iterator<Item = &str> {
    self.fields.keys().map(String::as_str)
  }

  /// `Ok(value)` when no errors were collected.
  pub fn finish<T>(self, value: T) -> Result<T, Self> {
    if self.is_empty() { Ok(value) } else { Err(self) }
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for (field, messages) in &self.fields {
      for message in messages {
        if !first {
          f.write_str("; ")?;
        }
        write!(f, "{field}: {message}")?;
        first = false;
      }
    }
    Ok(())
  }
}

// ─── Field checks ────────────────────────────────────────────────────────────

/// Trim `value` and require it to be non-empty and at most `max` characters.
pub fn required(
  errors: &mut ValidationErrors,
  field: &str,
  value: &str,
  max: usize,
) -> String {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    errors.add(field, "this field is required");
  } else if trimmed.chars().count() > max {
    errors.add(field, format!("ensure this value has at most {max} characters"));
  }
  trimmed.to_owned()
}

/// Like [`required`] but allows the empty string.
pub fn optional(
  errors: &mut ValidationErrors,
  field: &str,
  value: &str,
  max: Option<usize>,
) -> String {
  let trimmed = value.trim();
  if let Some(max) = max
    && trimmed.chars().count() > max
  {
    errors.add(field, format!("ensure this value has at most {max} characters"));
  }
  trimmed.to_owned()
}

pub fn is_slug(s: &str) -> bool {
  !s.is_empty()
    && s
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Use `explicit` when given, otherwise derive a slug from `title`.
pub fn slug_field(
  errors: &mut ValidationErrors,
  explicit: Option<&str>,
  title: &str,
) -> String {
  let slug = match explicit.map(str::trim).filter(|s| !s.is_empty()) {
    Some(s) => s.to_owned(),
    None => slugify(title),
  };
  if !is_slug(&slug) {
    errors.add(
      "slug",
      "enter a valid slug consisting of letters, numbers, underscores or hyphens",
    );
  } else if slug.len() > TITLE_MAX {
    errors.add(
      "slug",
      format!("ensure this value has at most {TITLE_MAX} characters"),
    );
  }
  slug
}

/// Lower-case ASCII slug: runs of anything else collapse into one hyphen.
pub fn slugify(title: &str) -> String {
  let mut slug = String::with_capacity(title.len());
  let mut pending_dash = false;
  for c in title.chars() {
    if c.is_ascii_alphanumeric() || c == '_' {
      if pending_dash && !slug.is_empty() {
        slug.push('-');
      }
      pending_dash = false;
      slug.push(c.to_ascii_lowercase());
    } else {
      pending_dash = true;
    }
  }
  slug
}

/// Absolute URL with one of the schemes accepted for video links and a
/// well-formed host.
pub fn is_url(s: &str) -> bool {
  if s.chars().any(char::is_whitespace) {
    return false;
  }
  // `https:///x` would otherwise parse with `x` as the host.
  match s.split_once("://") {
    Some((_, rest)) if !rest.starts_with(['/', '\\']) => {}
    _ => return false,
  }
  let Ok(url) = Url::parse(s) else {
    return false;
  };
  if !matches!(url.scheme(), "http" | "https" | "ftp" | "ftps") {
    return false;
  }
  match url.host() {
    Some(Host::Domain(domain)) => is_hostname(domain),
    Some(Host::Ipv4(_) | Host::Ipv6(_)) => true,
    None => false,
  }
}

/// Dot-separated labels of ASCII letters, digits and inner hyphens. One
/// trailing dot is allowed.
fn is_hostname(domain: &str) -> bool {
  let domain = domain.strip_suffix('.').unwrap_or(domain);
  !domain.is_empty()
    && domain.split('.').all(|label| {
      !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
