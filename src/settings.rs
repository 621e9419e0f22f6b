use crate::cache::lookup::DEFAULT_LOOKUP_TTL;
use crate::errors::{AppError, AppResult};
use crate::filters::FilterCriteria;
use crate::models::SortOrder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::time::Duration;

const MIN_PAGE_SIZE: u32 = 1;
const MAX_PAGE_SIZE: u32 = 500;
const MAX_SEARCH_DEBOUNCE_MS: u64 = 5_000;
const MIN_LOOKUP_TTL_SECONDS: u64 = 1;
const MAX_LOOKUP_TTL_SECONDS: u64 = 86_400;

/// Tunables for one collection screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerSettings {
    pub page_size: u32,
    pub search_debounce_ms: u64,
    pub lookup_ttl_seconds: u64,
    /// When set, the active view also lists soft-deleted rows and a soft
    /// delete flips the row's flag instead of removing it.
    pub include_deleted: bool,
    pub default_sort_by: Option<String>,
    pub default_sort_order: SortOrder,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            page_size: 10,
            search_debounce_ms: 300,
            lookup_ttl_seconds: DEFAULT_LOOKUP_TTL.as_secs(),
            include_deleted: false,
            default_sort_by: Some("createdAt".to_string()),
            default_sort_order: SortOrder::Desc,
        }
    }
}

impl ControllerSettings {
    /// Reads settings from a YAML or JSON file and clamps them into range.
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|error| AppError::Io(format!("Failed to read {}: {}", path.to_string_lossy(), error)))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let parsed: Self = serde_yaml::from_str(raw)?;
        Ok(parsed.normalized())
    }

    pub fn normalized(mut self) -> Self {
        self.page_size = self.page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
        self.search_debounce_ms = self.search_debounce_ms.min(MAX_SEARCH_DEBOUNCE_MS);
        self.lookup_ttl_seconds = self
            .lookup_ttl_seconds
            .clamp(MIN_LOOKUP_TTL_SECONDS, MAX_LOOKUP_TTL_SECONDS);
        if self
            .default_sort_by
            .as_deref()
            .is_some_and(|value| value.trim().is_empty())
        {
            self.default_sort_by = None;
        }
        self
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn lookup_ttl(&self) -> Duration {
        Duration::from_secs(self.lookup_ttl_seconds)
    }

    pub fn default_filters(&self) -> FilterCriteria {
        FilterCriteria::sorted(self.default_sort_by.clone(), self.default_sort_order)
    }
}

#[cfg(test)]
mod tests {
    use super::ControllerSettings;
    use crate::models::SortOrder;
    use std::io::Write;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let settings = ControllerSettings::parse("pageSize: 25\n").expect("settings");
        assert_eq!(settings.page_size, 25);
        assert_eq!(settings.search_debounce_ms, 300);
        assert_eq!(settings.default_sort_by.as_deref(), Some("createdAt"));
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let settings = ControllerSettings::parse(
            "pageSize: 0\nsearchDebounceMs: 60000\nlookupTtlSeconds: 0\ndefaultSortBy: ''\n",
        )
        .expect("settings");
        assert_eq!(settings.page_size, 1);
        assert_eq!(settings.search_debounce_ms, 5_000);
        assert_eq!(settings.lookup_ttl_seconds, 1);
        assert_eq!(settings.default_sort_by, None);
    }

    #[test]
    fn loads_json_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"pageSize": 50, "includeDeleted": true, "defaultSortBy": "name", "defaultSortOrder": "asc"}}"#
        )
        .expect("write settings");

        let settings = ControllerSettings::load(file.path()).expect("load");
        assert_eq!(settings.page_size, 50);
        assert!(settings.include_deleted);
        assert_eq!(settings.default_filters().sort_order, SortOrder::Asc);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = ControllerSettings::load(&dir.path().join("absent.yaml")).expect_err("missing");
        assert!(error.to_string().starts_with("IO_FAILURE"));
    }

    #[test]
    fn empty_file_means_defaults() {
        assert_eq!(
            ControllerSettings::parse("  \n").expect("settings"),
            ControllerSettings::default()
        );
    }
}
