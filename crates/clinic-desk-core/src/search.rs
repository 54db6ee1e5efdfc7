//! Patient search box.

use crate::query::Filter;

/// Columns a search query is matched against.
pub const SEARCH_COLUMNS: [&str; 4] = [
    "first_name",
    "last_name",
    "email_address",
    "medical_record_number",
];

/// Case-insensitive substring search over the patient name, email and MRN
/// columns. The query is used exactly as typed; only an empty query filters
/// nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    query: String,
}

impl SearchFilter {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }

    /// The filter pushed down to the fetch.
    pub fn to_filter(&self) -> Filter {
        if self.is_empty() {
            return Filter::All;
        }
        Filter::Or(
            SEARCH_COLUMNS
                .iter()
                .map(|column| Filter::contains(*column, self.query.as_str()))
                .collect(),
        )
    }
}
