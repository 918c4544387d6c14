//! Field labels: a static override dictionary with an un-slugify
//! fallback for everything it doesn't cover.

use std::collections::HashMap;

/// Resolves machine field names to display labels.
#[derive(Debug, Clone, Default)]
pub struct Labels {
  overrides: HashMap<String, String>,
}

impl Labels {
  pub fn new() -> Self { Self::default() }

  /// Builder-style override for one field.
  pub fn with_label(mut self, field: impl Into<String>, label: impl Into<String>) -> Self {
    self.overrides.insert(field.into(), label.into());
    self
  }

  /// The display label for `field`: the configured override, or the
  /// un-slugified machine name.
  pub fn resolve(&self, field: &str) -> String {
    self
      .overrides
      .get(field)
      .cloned()
      .unwrap_or_else(|| humanize(field))
  }
}

impl FromIterator<(String, String)> for Labels {
  fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
    Self { overrides: iter.into_iter().collect() }
  }
}

/// Turn a machine field name into a title-cased label:
/// `unit_price` → `Unit Price`.
pub fn humanize(field: &str) -> String {
  field
    .split(['_', '-'])
    .filter(|word| !word.is_empty())
    .map(|word| {
      let mut chars = word.chars();
      match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
      }
    })
    .collect::<Vec<_>>()
    .join(" ")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn humanize_un_slugifies() {
    assert_eq!(humanize("unit_price"), "Unit Price");
    assert_eq!(humanize("status"), "Status");
    assert_eq!(humanize("created_at"), "Created At");
    assert_eq!(humanize("__odd__"), "Odd");
  }

  #[test]
  fn overrides_win_over_fallback() {
    let labels = Labels::new().with_label("qty", "Quantity");
    assert_eq!(labels.resolve("qty"), "Quantity");
    assert_eq!(labels.resolve("unit_price"), "Unit Price");
  }
}
