//! URI fragment identifiers derived from free-form labels.
//!
//! [`normalize()`] turns a label such as `Has "quotes" inside` into a
//! camelCase fragment (`hasQuotesInside`). [`FragmentMap`] applies it across
//! the HTML and Turtle artifacts of a single vocabulary so that both end up
//! using the same identifiers, and refuses to let two different labels claim
//! the same one.

use rustc_hash::FxHashMap;

use crate::error::{Kind, Result};

/// Derives a URI-fragment-safe identifier from `label`.
///
/// With `enabled`, every character that is neither alphanumeric nor
/// whitespace is dropped, whitespace runs collapse, and the remaining words
/// are joined in camelCase: the first word lower-cased, every other word
/// capitalized. A label with no word left is returned unmodified. Without
/// `enabled`, `label` is returned as is.
///
/// ```
/// use ontopages::fragment::normalize;
///
/// assert_eq!(normalize("Test One", true), "testOne");
/// assert_eq!(normalize("Multiple,  spaces", true), "multipleSpaces");
/// assert_eq!(normalize("Test One", false), "Test One");
/// assert_eq!(normalize("?!", true), "?!");
/// ```
pub fn normalize(label: &str, enabled: bool) -> String {
    if !enabled {
        return label.to_string();
    }

    let cleaned: String = label.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    let mut words = cleaned.split_whitespace();
    let Some(first) = words.next() else {
        return label.to_string();
    };

    let mut output = first.to_lowercase();
    for word in words {
        let mut chars = word.chars();
        if let Some(head) = chars.next() {
            output.extend(head.to_uppercase());
            output.push_str(&chars.as_str().to_lowercase());
        }
    }

    output
}

/// The part of `iri` after its last `#`, or all of it if there is none.
pub fn fragment_of(iri: &str) -> &str {
    iri.rsplit_once('#').map_or(iri, |(_, fragment)| fragment)
}

/// Label to identifier mapping for one vocabulary's artifact pair.
///
/// The mapping is injective: resolving a second, different label to an
/// identifier that is already taken fails with a [`Kind::Validation`] error.
#[derive(Debug, Default, Clone)]
pub struct FragmentMap {
    enabled: bool,
    labels: FxHashMap<String, String>,
    owners: FxHashMap<String, String>,
}

impl FragmentMap {
    pub fn new(enabled: bool) -> Self {
        FragmentMap { enabled, ..Default::default() }
    }

    /// The identifier for `label`, normalizing it on first sight.
    pub fn resolve(&mut self, label: &str) -> Result<&str> {
        if !self.labels.contains_key(label) {
            let id = normalize(label, self.enabled);
            if let Some(owner) = self.owners.get(&id) {
                return err! {
                    Kind::Validation; "two labels normalize to the same identifier",
                    "identifier" => id,
                    "first label" => owner,
                    "second label" => label,
                };
            }

            self.owners.insert(id.clone(), label.to_string());
            self.labels.insert(label.to_string(), id);
        }

        Ok(&self.labels[label])
    }

    /// The identifier `label` resolved to, if it was resolved before.
    pub fn get(&self, label: &str) -> Option<&str> {
        self.labels.get(label).map(|s| s.as_str())
    }

    /// Every label resolved so far, in no particular order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(|s| s.as_str())
    }

    /// Whether any label resolves to something other than itself.
    pub fn renames(&self) -> bool {
        self.labels.iter().any(|(label, id)| label != id)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
