use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A label mapping with order-irrelevant comparison semantics.
pub type Map = BTreeMap<String, String>;

/// A recorded set of label requirements, as accumulated in a match signature.
///
/// Comparisons are explicit key/value set comparisons; two selectors are equal
/// iff they require the same keys with the same values, regardless of how they
/// were built.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Selector(Map);

// === impl Selector ===

impl Selector {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true iff every key this selector requires is present in
    /// `labels` with an equal value. Extra keys in `labels` are ignored.
    pub fn matches(&self, labels: &Map) -> bool {
        for (k, v) in self.0.iter() {
            if labels.get(k) != Some(v) {
                return false;
            }
        }
        true
    }

    /// Returns true iff the selector's requirements are set-equal to `labels`.
    pub fn matches_exactly(&self, labels: &Map) -> bool {
        &self.0 == labels
    }
}

impl From<Map> for Selector {
    #[inline]
    fn from(labels: Map) -> Self {
        Self(labels)
    }
}

impl AsRef<Map> for Selector {
    #[inline]
    fn as_ref(&self) -> &Map {
        &self.0
    }
}

impl std::iter::FromIterator<(String, String)> for Selector {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Selector {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}
