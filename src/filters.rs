use crate::debounce::Debouncer;
use crate::models::{FilterValue, SortOrder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Duration;

/// Immutable filter snapshot. Updates always produce a fresh value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    pub search: String,
    pub fields: BTreeMap<String, FilterValue>,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
}

impl FilterCriteria {
    pub fn sorted(sort_by: Option<String>, sort_order: SortOrder) -> Self {
        Self {
            sort_by,
            sort_order,
            ..Self::default()
        }
    }

    pub fn merged(&self, patch: &FilterPatch) -> Self {
        let mut next = self.clone();
        if let Some(search) = &patch.search {
            next.search = search.clone();
        }
        for (name, value) in &patch.fields {
            match value {
                Some(value) => {
                    next.fields.insert(name.clone(), value.clone());
                }
                None => {
                    next.fields.remove(name);
                }
            }
        }
        if let Some(sort_by) = &patch.sort_by {
            next.sort_by = Some(sort_by.clone());
        }
        if let Some(sort_order) = patch.sort_order {
            next.sort_order = sort_order;
        }
        next
    }

    /// Trimmed search text, or `None` when there is nothing to search for.
    pub fn search_term(&self) -> Option<&str> {
        let trimmed = self.search.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}

/// Partial update to a [`FilterCriteria`]. A field set to `None` is removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPatch {
    pub search: Option<String>,
    pub fields: BTreeMap<String, Option<FilterValue>>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl FilterPatch {
    pub fn search(text: impl Into<String>) -> Self {
        Self {
            search: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn field(mut self, name: &str, value: impl Into<FilterValue>) -> Self {
        self.fields.insert(name.to_string(), Some(value.into()));
        self
    }

    pub fn without_field(mut self, name: &str) -> Self {
        self.fields.insert(name.to_string(), None);
        self
    }

    pub fn sort(mut self, sort_by: &str, sort_order: SortOrder) -> Self {
        self.sort_by = Some(sort_by.to_string());
        self.sort_order = Some(sort_order);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.fields.is_empty() && self.sort_by.is_none() && self.sort_order.is_none()
    }
}

/// Current filters plus the debouncer that feeds search text into them.
pub struct FilterState {
    current: Arc<FilterCriteria>,
    defaults: Arc<FilterCriteria>,
    debouncer: Debouncer,
    commits: u64,
}

impl FilterState {
    pub fn new(defaults: FilterCriteria, search_delay: Duration) -> Self {
        let defaults = Arc::new(defaults);
        Self {
            current: defaults.clone(),
            defaults,
            debouncer: Debouncer::new(search_delay),
            commits: 0,
        }
    }

    pub fn current(&self) -> Arc<FilterCriteria> {
        self.current.clone()
    }

    pub fn apply(&mut self, patch: &FilterPatch) -> Arc<FilterCriteria> {
        self.current = Arc::new(self.current.merged(patch));
        self.commits += 1;
        self.current.clone()
    }

    pub fn reset(&mut self) -> Arc<FilterCriteria> {
        self.current = self.defaults.clone();
        self.commits += 1;
        self.current.clone()
    }

    /// Number of filter commits made so far, debounced or immediate.
    pub fn commit_count(&self) -> u64 {
        self.commits
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    pub fn debouncer_mut(&mut self) -> &mut Debouncer {
        &mut self.debouncer
    }
}
