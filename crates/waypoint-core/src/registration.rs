//! Registration keys for the lookup directory.
//!
//! A registration is a `(category, key, sub_key)` triple. Three categories
//! are in use: `client` (one entry per connected producer), `topic` (one
//! entry per topic) and `channel` (one entry per topic/channel pair).

/// The literal wildcard accepted by lookup operations.
///
/// Only meaningful in the key and sub-key positions; categories are always
/// matched exactly.
pub const WILDCARD: &str = "*";

/// Category for producer connection entries.
pub const CATEGORY_CLIENT: &str = "client";
/// Category for topic entries.
pub const CATEGORY_TOPIC: &str = "topic";
/// Category for topic/channel entries.
pub const CATEGORY_CHANNEL: &str = "channel";

/// A single index entry in the registration store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Registration {
    /// Entry category (`client`, `topic` or `channel`).
    pub category: String,
    /// Topic name, or empty for `client` entries.
    pub key: String,
    /// Channel name, or empty for `client` and `topic` entries.
    pub sub_key: String,
}

impl Registration {
    /// Create a registration from raw parts.
    #[must_use]
    pub fn new(
        category: impl Into<String>,
        key: impl Into<String>,
        sub_key: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            key: key.into(),
            sub_key: sub_key.into(),
        }
    }

    /// The `("client", "", "")` entry shared by all connected producers.
    #[must_use]
    pub fn client() -> Self {
        Self::new(CATEGORY_CLIENT, "", "")
    }

    /// The `("topic", name, "")` entry for a topic.
    #[must_use]
    pub fn topic(name: impl Into<String>) -> Self {
        Self::new(CATEGORY_TOPIC, name, "")
    }

    /// The `("channel", topic, channel)` entry for a topic/channel pair.
    #[must_use]
    pub fn channel(topic: impl Into<String>, channel: impl Into<String>) -> Self {
        Self::new(CATEGORY_CHANNEL, topic, channel)
    }

    /// Match against a query where `key`/`sub_key` may be [`WILDCARD`].
    #[must_use]
    pub fn is_match(&self, category: &str, key: &str, sub_key: &str) -> bool {
        if category != self.category {
            return false;
        }
        if key != WILDCARD && self.key != key {
            return false;
        }
        if sub_key != WILDCARD && self.sub_key != sub_key {
            return false;
        }
        true
    }
}

/// An owned list of registrations returned from store queries.
#[derive(Debug, Default, Clone)]
pub struct Registrations(pub Vec<Registration>);

impl Registrations {
    /// Retain only the entries matching the query.
    #[must_use]
    pub fn filter(&self, category: &str, key: &str, sub_key: &str) -> Registrations {
        Registrations(
            self.0
                .iter()
                .filter(|r| r.is_match(category, key, sub_key))
                .cloned()
                .collect(),
        )
    }

    /// Extract the key column.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.0.iter().map(|r| r.key.clone()).collect()
    }

    /// Extract the sub-key column.
    #[must_use]
    pub fn sub_keys(&self) -> Vec<String> {
        self.0.iter().map(|r| r.sub_key.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Registration> {
        self.0.iter()
    }
}

impl IntoIterator for Registrations {
    type Item = Registration;
    type IntoIter = std::vec::IntoIter<Registration>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Registrations {
    type Item = &'a Registration;
    type IntoIter = std::slice::Iter<'a, Registration>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Registration> for Registrations {
    fn from_iter<T: IntoIterator<Item = Registration>>(iter: T) -> Self {
        Registrations(iter.into_iter().collect())
    }
}
