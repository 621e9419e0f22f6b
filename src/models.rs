use crate::errors::{AppError, AppResult, FieldError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// A record managed by a collection controller. Only the id and the
/// soft-delete flag are ever inspected; everything else passes through.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn is_deleted(&self) -> bool;
    fn set_deleted(&mut self, deleted: bool);
}

/// Schemaless entity for screens that have no typed model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_deleted: false,
            created_at: None,
            updated_at: None,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl Entity for Record {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.is_deleted = deleted;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    Active,
    Deleted,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::Active => Self::Deleted,
            Self::Deleted => Self::Active,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(value) => write!(f, "{}", value),
            Self::Number(value) => write!(f, "{}", value),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

/// Pagination block as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_count: u64,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListData<E> {
    pub items: Vec<E>,
    pub pagination: PaginationInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub search: Option<String>,
    pub view: ViewMode,
    pub include_deleted: bool,
    pub filters: BTreeMap<String, FilterValue>,
}

impl ListQuery {
    /// Flattens the query into the string parameters a REST transport sends.
    pub fn to_params(&self) -> BTreeMap<String, String> {
        // filters first so a filter can never shadow a paging key
        let mut params: BTreeMap<String, String> = self
            .filters
            .iter()
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect();
        params.insert("page".to_string(), self.page.to_string());
        params.insert("limit".to_string(), self.limit.to_string());
        if let Some(sort_by) = &self.sort_by {
            params.insert("sortBy".to_string(), sort_by.clone());
        }
        params.insert("sortOrder".to_string(), self.sort_order.as_str().to_string());
        if let Some(search) = &self.search {
            params.insert("search".to_string(), search.clone());
        }
        match self.view {
            ViewMode::Deleted => {
                params.insert("isDeleted".to_string(), "true".to_string());
            }
            ViewMode::Active if self.include_deleted => {
                params.insert("includeDeleted".to_string(), "true".to_string());
            }
            ViewMode::Active => {}
        }
        params
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Vec<FieldError>,
}

/// Uniform response envelope shared by every resource endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn ok_empty() -> Self {
        Self {
            success: true,
            data: None,
            message: None,
            error: None,
        }
    }

    pub fn failure(code: &str, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.to_string()),
            error: Some(ApiErrorBody {
                code: Some(code.to_string()),
                message: Some(message.to_string()),
                details: Vec::new(),
            }),
        }
    }

    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        self.error.get_or_insert_with(ApiErrorBody::default).details = details;
        self
    }

    /// Successful envelopes yield their (possibly absent) data; failures are
    /// classified into the error taxonomy.
    pub fn into_result(self) -> AppResult<Option<T>> {
        if self.success {
            return Ok(self.data);
        }

        let body = self.error.unwrap_or_default();
        let message = body
            .message
            .or(self.message)
            .unwrap_or_else(|| "Request failed".to_string());

        if !body.details.is_empty() {
            return Err(AppError::Validation {
                message,
                fields: body.details,
            });
        }

        Err(match body.code.as_deref() {
            Some("VALIDATION_ERROR") => AppError::Validation {
                message,
                fields: Vec::new(),
            },
            Some("NOT_FOUND") => AppError::NotFound(message),
            Some("UNAUTHORIZED") | Some("FORBIDDEN") => AppError::Unauthorized(message),
            _ => AppError::Internal(message),
        })
    }

    /// Like [`Envelope::into_result`] but a successful response must carry data.
    pub fn into_data(self) -> AppResult<T> {
        self.into_result()?
            .ok_or_else(|| AppError::Internal("Response did not include data".to_string()))
    }
}

/// Shallow JSON object merge: keys in `patch` replace keys in `base`.
pub fn merge_objects(base: &mut Value, patch: &Value) -> AppResult<()> {
    let Some(target) = base.as_object_mut() else {
        return Err(AppError::Internal("Merge target is not an object".to_string()));
    };
    let Some(source) = patch.as_object() else {
        return Err(AppError::Internal("Patch is not an object".to_string()));
    };
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
    Ok(())
}
