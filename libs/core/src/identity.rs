use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a logical channel
///
/// A `(service_type, service_name, topic)` triple. Empty strings are legal;
/// an empty topic addresses the whole service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId {
    service_type: String,
    service_name: String,
    #[serde(default)]
    topic: String,
}

impl ChannelId {
    pub fn new(
        service_type: impl Into<String>,
        service_name: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            service_type: service_type.into(),
            service_name: service_name.into(),
            topic: topic.into(),
        }
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn concatenated(&self) -> impl Iterator<Item = u8> + '_ {
        self.service_type
            .bytes()
            .chain(self.service_name.bytes())
            .chain(self.topic.bytes())
    }
}

impl Ord for ChannelId {
    /// Lexicographic over the concatenated fields.
    ///
    /// Distinct triples can concatenate to the same bytes (`"ab","c"` and
    /// `"a","bc"`); those fall back to a field-wise comparison so the order
    /// stays consistent with `Eq`.
    fn cmp(&self, other: &Self) -> Ordering {
        self.concatenated()
            .cmp(other.concatenated())
            .then_with(|| self.service_type.cmp(&other.service_type))
            .then_with(|| self.service_name.cmp(&other.service_name))
            .then_with(|| self.topic.cmp(&other.topic))
    }
}

impl PartialOrd for ChannelId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.topic.is_empty() {
            write!(f, "{}/{}", self.service_type, self.service_name)
        } else {
            write!(f, "{}/{}/{}", self.service_type, self.service_name, self.topic)
        }
    }
}
