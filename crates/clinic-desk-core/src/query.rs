//! Table-level query description shared by the database layer and the gateway.
//!
//! A [`Query`] is the dashboard's equivalent of a PostgREST select: an order,
//! a filter tree and optional embedded lookups of referenced rows. Filters can
//! be rendered to SQL with bound parameters for the store.

use std::fmt;

use serde_json::Value;

/// A record as exchanged with the backend: column name to JSON value.
pub type Row = serde_json::Map<String, Value>;

/// The two backend tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Patients,
    Appointments,
}

const PATIENT_COLUMNS: &[&str] = &[
    "id",
    "first_name",
    "last_name",
    "email_address",
    "phone_number",
    "date_of_birth",
    "medical_record_number",
    "home_address",
    "status",
    "created_at",
];

const APPOINTMENT_COLUMNS: &[&str] = &[
    "id",
    "patient_id",
    "appointment_date",
    "appointment_type",
    "status",
    "notes",
    "created_at",
];

impl Table {
    pub const ALL: [Table; 2] = [Table::Patients, Table::Appointments];

    /// Backend table name.
    pub const fn name(&self) -> &'static str {
        match self {
            Table::Patients => "patients_records",
            Table::Appointments => "appointments_records",
        }
    }

    pub const fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Patients => PATIENT_COLUMNS,
            Table::Appointments => APPOINTMENT_COLUMNS,
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single column comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column = value` (`IS NULL` when value is null)
    Eq { column: String, value: Value },
    /// `column >= value`
    Gte { column: String, value: Value },
    /// `column < value`
    Lt { column: String, value: Value },
    /// Case-insensitive substring match, with Unicode case folding
    Contains { column: String, needle: String },
}

impl Predicate {
    fn column(&self) -> &str {
        match self {
            Predicate::Eq { column, .. }
            | Predicate::Gte { column, .. }
            | Predicate::Lt { column, .. }
            | Predicate::Contains { column, .. } => column,
        }
    }
}

/// Boolean filter tree over predicates.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// No filtering
    #[default]
    All,
    Where(Predicate),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Where(Predicate::Eq {
            column: column.into(),
            value: value.into(),
        })
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Where(Predicate::Gte {
            column: column.into(),
            value: value.into(),
        })
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Where(Predicate::Lt {
            column: column.into(),
            value: value.into(),
        })
    }

    pub fn contains(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Filter::Where(Predicate::Contains {
            column: column.into(),
            needle: needle.into(),
        })
    }

    /// Conjunction, flattening `All`.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, other) => Filter::And(vec![f, other]),
        }
    }

    /// First referenced column that `table` does not have.
    pub fn unknown_column(&self, table: Table) -> Option<String> {
        match self {
            Filter::All => None,
            Filter::Where(p) => (!table.has_column(p.column())).then(|| p.column().to_string()),
            Filter::And(fs) | Filter::Or(fs) => fs.iter().find_map(|f| f.unknown_column(table)),
        }
    }

    /// Render as a SQL boolean expression, appending bound values to `params`.
    ///
    /// Column names must have been checked with [`Filter::unknown_column`].
    pub fn to_sql(&self, params: &mut Vec<Value>) -> String {
        match self {
            Filter::All => "1 = 1".to_string(),
            Filter::Where(p) => predicate_sql(p, params),
            Filter::And(fs) => join_sql(fs, " AND ", "1 = 1", params),
            Filter::Or(fs) => join_sql(fs, " OR ", "0 = 1", params),
        }
    }
}

fn join_sql(filters: &[Filter], op: &str, empty: &str, params: &mut Vec<Value>) -> String {
    if filters.is_empty() {
        return empty.to_string();
    }
    let parts: Vec<String> = filters.iter().map(|f| f.to_sql(params)).collect();
    format!("({})", parts.join(op))
}

fn predicate_sql(predicate: &Predicate, params: &mut Vec<Value>) -> String {
    match predicate {
        Predicate::Eq { column, value } if value.is_null() => format!("{column} IS NULL"),
        Predicate::Eq { column, value } => {
            params.push(value.clone());
            format!("{column} = ?")
        }
        Predicate::Gte { column, value } => {
            params.push(value.clone());
            format!("{column} >= ?")
        }
        Predicate::Lt { column, value } => {
            params.push(value.clone());
            format!("{column} < ?")
        }
        Predicate::Contains { column, needle } => {
            params.push(Value::String(needle.clone()));
            format!("icontains({column}, ?)")
        }
    }
}

/// Whether `haystack` contains `needle` once both are lowercased.
///
/// Backs the `icontains` SQL function registered on every connection.
pub(crate) fn contains_ignoring_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Sort direction on a single column; ties are broken by `id` ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

impl OrderBy {
    /// SQL `ORDER BY` body. Nulls sort last in both directions.
    pub fn to_sql(&self) -> String {
        let dir = if self.ascending { "ASC" } else { "DESC" };
        format!("{} {dir} NULLS LAST, id ASC", self.column)
    }
}

/// Lookup of a referenced row, attached to each result under `alias`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Embed {
    /// Key the looked-up object is stored under
    pub alias: &'static str,
    /// Referenced table (joined on its `id`)
    pub table: Table,
    /// Column of the base table holding the reference
    pub foreign_key: &'static str,
    /// Columns of the referenced row to include
    pub columns: &'static [&'static str],
}

/// A select against one table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub order_by: Option<OrderBy>,
    pub filter: Filter,
    pub embeds: Vec<Embed>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Order ascending by `column`.
    pub fn ascending(column: impl Into<String>) -> Self {
        Self::new().order(column, true)
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order_by = Some(OrderBy {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = self.filter.and(filter);
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    /// First column referenced by the query that does not exist.
    pub fn unknown_column(&self, table: Table) -> Option<String> {
        if let Some(order) = &self.order_by {
            if !table.has_column(&order.column) {
                return Some(order.column.clone());
            }
        }
        if let Some(bad) = self.filter.unknown_column(table) {
            return Some(bad);
        }
        self.embeds.iter().find_map(|e| {
            if !table.has_column(e.foreign_key) {
                Some(e.foreign_key.to_string())
            } else {
                e.columns
                    .iter()
                    .find(|c| !e.table.has_column(c))
                    .map(|c| c.to_string())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contains_ignoring_case() {
        assert!(contains_ignoring_case("Ada", "aD"));
        assert!(contains_ignoring_case("ÅSTRÖM", "åström"));
        assert!(contains_ignoring_case("Élodie", "ÉLO"));
        assert!(!contains_ignoring_case("Ada", "bob"));
        assert!(contains_ignoring_case("Ada", ""));
    }

    #[test]
    fn test_and_flattens_all() {
        let f = Filter::All.and(Filter::eq("id", 1));
        assert_eq!(f, Filter::eq("id", 1));
        let f = Filter::eq("id", 1).and(Filter::eq("status", "Pending")).and(Filter::All);
        assert!(matches!(f, Filter::And(ref v) if v.len() == 2));
    }

    #[test]
    fn test_to_sql_binds_params() {
        let filter = Filter::Or(vec![
            Filter::contains("first_name", "50%_Off"),
            Filter::eq("patient_id", Value::Null),
        ])
        .and(Filter::gte("appointment_date", "2024-01-05"));

        let mut params = Vec::new();
        let sql = filter.to_sql(&mut params);
        assert_eq!(
            sql,
            "((icontains(first_name, ?) OR patient_id IS NULL) AND appointment_date >= ?)"
        );
        assert_eq!(params, vec![json!("50%_Off"), json!("2024-01-05")]);
    }

    #[test]
    fn test_unknown_column_detected() {
        let q = Query::ascending("medical_record_number").filter(Filter::eq("name", "x"));
        assert_eq!(q.unknown_column(Table::Patients), Some("name".into()));

        let q = Query::ascending("appointment_date");
        assert_eq!(q.unknown_column(Table::Patients), Some("appointment_date".into()));
        assert_eq!(q.unknown_column(Table::Appointments), None);
    }

    #[test]
    fn test_order_by_sql() {
        let q = Query::ascending("medical_record_number");
        assert_eq!(
            q.order_by.unwrap().to_sql(),
            "medical_record_number ASC NULLS LAST, id ASC"
        );
    }
}
