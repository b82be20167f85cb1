use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sort direction as understood by the record source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// Column with sort direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Next sort after a click on `column`: flips the direction when the
    /// column is already sorted, otherwise starts ascending.
    pub fn toggled(&self, column: &str) -> Self {
        if self.column == column {
            Self {
                column: self.column.clone(),
                direction: self.direction.toggle(),
            }
        } else {
            Self::asc(column)
        }
    }
}

/// Page-number pagination over a remote table.
///
/// Pages are 1-based. `total_rows` is whatever the source reported for the
/// current filter on the last successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u32,
    pub rows_per_page: u32,
    pub total_rows: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(50)
    }
}

impl Pagination {
    pub fn new(rows_per_page: u32) -> Self {
        Self {
            current_page: 1,
            rows_per_page: rows_per_page.max(1),
            total_rows: 0,
        }
    }

    /// Number of pages, never less than one.
    pub fn total_pages(&self) -> u32 {
        let per_page = self.rows_per_page.max(1) as u64;
        let pages = self.total_rows.div_ceil(per_page).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn offset(&self) -> u64 {
        (self.current_page.saturating_sub(1) as u64) * self.rows_per_page as u64
    }

    pub fn is_first_page(&self) -> bool {
        self.current_page <= 1
    }

    pub fn is_last_page(&self) -> bool {
        self.current_page >= self.total_pages()
    }

    pub fn next_page(&self) -> Option<Self> {
        if self.is_last_page() {
            return None;
        }
        Some(Self {
            current_page: self.current_page + 1,
            ..self.clone()
        })
    }

    pub fn prev_page(&self) -> Option<Self> {
        if self.is_first_page() {
            return None;
        }
        Some(Self {
            current_page: self.current_page - 1,
            ..self.clone()
        })
    }

    /// Jump to an explicit page; out-of-range pages are rejected.
    pub fn jump_to(&self, page: u32) -> Option<Self> {
        if page == 0 || page > self.total_pages() {
            return None;
        }
        Some(Self {
            current_page: page,
            ..self.clone()
        })
    }

    pub fn with_rows_per_page(&self, rows_per_page: u32) -> Self {
        Self {
            current_page: 1,
            rows_per_page: rows_per_page.max(1),
            total_rows: self.total_rows,
        }
    }

    pub fn reset_page(&self) -> Self {
        Self {
            current_page: 1,
            ..self.clone()
        }
    }
}

/// Per-column filter patterns. Blank patterns are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filters(BTreeMap<String, String>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_inputs<I, K, V>(inputs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let map = inputs
            .into_iter()
            .filter_map(|(column, pattern)| {
                let trimmed = pattern.as_ref().trim();
                (!trimmed.is_empty()).then(|| (column.into(), trimmed.to_string()))
            })
            .collect();
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Reference to a table (schema + name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// Everything that determines which page is on screen. Any change to these
/// requires a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadParams {
    pub table: TableRef,
    pub pagination: Pagination,
    pub sort: SortSpec,
    pub filters: Filters,
}

impl LoadParams {
    /// Fresh parameters for a newly selected table: first page, sorted by
    /// the primary key, no filters.
    pub fn for_table(table: TableRef, primary_key: &str, rows_per_page: u32) -> Self {
        Self {
            table,
            pagination: Pagination::new(rows_per_page),
            sort: SortSpec::asc(primary_key),
            filters: Filters::new(),
        }
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest {
            table: self.table.clone(),
            page: self.pagination.current_page,
            limit: self.pagination.rows_per_page,
            sort_column: self.sort.column.clone(),
            sort_direction: self.sort.direction,
            filters: self.filters.clone(),
        }
    }
}

/// Wire shape of a paged/sorted/filtered fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub table: TableRef,
    pub page: u32,
    pub limit: u32,
    pub sort_column: String,
    pub sort_direction: SortDirection,
    pub filters: Filters,
}

impl PageRequest {
    /// Query-string parameters, filters serialized as a JSON object.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
            ("sortBy", self.sort_column.clone()),
            ("sortOrder", self.sort_direction.as_str().to_string()),
            ("filters", self.filters.to_json()),
        ]
    }
}
