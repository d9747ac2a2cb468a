use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::LogicError;
use crate::traits::PostalCodeLogic;
use crate::types::{PostalCode, PostalCodeInfo};

const FIXTURES: &[(&str, &str, &str, f64, f64)] = &[
    ("10001", "New York", "NY", 40.7506, -73.9972),
    ("55401", "Minneapolis", "MN", 44.9833, -93.2683),
    ("60601", "Chicago", "IL", 41.8858, -87.6181),
    ("94105", "San Francisco", "CA", 37.7898, -122.3942),
    ("98101", "Seattle", "WA", 47.6114, -122.3305),
];

/// Fixed in-memory lookup table keyed by five digit zone.
#[derive(Debug, Clone)]
pub struct InMemoryPostalCodeLogic {
    entries: HashMap<String, PostalCodeInfo>,
}

impl InMemoryPostalCodeLogic {
    /// Provider seeded with a handful of well-known US codes.
    #[must_use]
    pub fn with_fixtures() -> Self {
        Self::from_entries(FIXTURES.iter().map(|(code, city, state, lat, lon)| PostalCodeInfo {
            code: (*code).to_string(),
            city: (*city).to_string(),
            state: (*state).to_string(),
            latitude: *lat,
            longitude: *lon,
        }))
    }

    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = PostalCodeInfo>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|info| (info.code.clone(), info))
                .collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InMemoryPostalCodeLogic {
    fn default() -> Self {
        Self::with_fixtures()
    }
}

#[async_trait]
impl PostalCodeLogic for InMemoryPostalCodeLogic {
    async fn lookup(&self, code: &PostalCode) -> Result<Option<PostalCodeInfo>, LogicError> {
        Ok(self.entries.get(code.zone()).cloned())
    }
}
