//! Filter fragments and query documents.
//!
//! Fragments are plain data. A query is a conjunction of fragments under one
//! top-level `bool.filter`; the document serializes to the search backend's
//! Elasticsearch dialect:
//!
//! ```json
//! {"from": 0, "size": 0, "query": {"bool": {"filter": [ ... ]}}, "sort": [ ... ]}
//! ```

use serde::{Serialize, Serializer};
use serde_json::{json, Value};

/// Well-known catalog field names.
pub mod fields {
    /// Scope identifier of the connected data source
    pub const ORIGIN: &str = "core.origin";
    /// `OBJECT` or `RELATIONSHIP`
    pub const ELEMENT_TYPE: &str = "elementType";
    /// Asset type (objects) or dotted relationship type name
    pub const TYPE: &str = "type";
    /// Normalized (lower-cased, tokenized) asset name
    pub const NAME: &str = "core.name";
    /// Fully qualified class type
    pub const CLASS_TYPE: &str = "core.classType";
    /// Unique identity of an element
    pub const IDENTITY: &str = "core.identity";
    /// Timestamp of the last scan
    pub const SCANNED_TIME: &str = "com.infa.ccgf.models.governance.scannedTime";
}

/// One filter fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Exact match: `{"term": {field: value}}`
    Term { field: String, value: String },
    /// Lexicographic bounds: `{"range": {field: {"gte": .., "lt": ..}}}`
    Range {
        field: String,
        gte: Option<String>,
        lt: Option<String>,
    },
    /// Glob pattern: `{"wildcard": {field: pattern}}`
    Wildcard { field: String, pattern: String },
    /// Disjunction with at least one required match
    AnyOf(Vec<Filter>),
}

impl Filter {
    /// Render this fragment as backend JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Filter::Term { field, value } => json!({ "term": { field: value } }),
            Filter::Range { field, gte, lt } => {
                let mut bounds = serde_json::Map::new();
                if let Some(gte) = gte {
                    bounds.insert("gte".into(), Value::String(gte.clone()));
                }
                if let Some(lt) = lt {
                    bounds.insert("lt".into(), Value::String(lt.clone()));
                }
                json!({ "range": { field: bounds } })
            }
            Filter::Wildcard { field, pattern } => json!({ "wildcard": { field: pattern } }),
            Filter::AnyOf(filters) => json!({
                "bool": {
                    "should": filters.iter().map(Filter::to_json).collect::<Vec<_>>(),
                    "minimum_should_match": 1
                }
            }),
        }
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Exact-match fragment.
pub fn equality_filter(field: &str, value: &str) -> Filter {
    Filter::Term {
        field: field.to_string(),
        value: value.to_string(),
    }
}

/// Half-open lexicographic range `[start, end)` over lower-cased values.
///
/// Returns `None` when both bounds are absent.
pub fn range_filter(field: &str, start: Option<&str>, end: Option<&str>) -> Option<Filter> {
    if start.is_none() && end.is_none() {
        return None;
    }
    Some(Filter::Range {
        field: field.to_string(),
        gte: start.map(str::to_lowercase),
        lt: end.map(str::to_lowercase),
    })
}

/// Wildcard disjunction on the first letter of a dotted name segment.
///
/// For every letter in `[start, end)` (or `[start, 'z']` when `end` is
/// absent) matches `*.x*` and `*.X*`. A missing `start` cannot be expressed
/// with wildcards and yields `None`.
pub fn wildcard_group_filter(field: &str, start: Option<&str>, end: Option<&str>) -> Option<Filter> {
    let first = leading_letter(start?)?;
    let last = match end.and_then(leading_letter) {
        Some(end) if end > first => (end as u8 - 1) as char,
        Some(_) => return None,
        None => 'z',
    };

    let mut patterns = Vec::new();
    for letter in first..=last {
        patterns.push(segment_wildcard(field, &letter.to_string()));
        patterns.push(segment_wildcard(field, &letter.to_ascii_uppercase().to_string()));
    }
    Some(Filter::AnyOf(patterns))
}

/// Wildcard disjunction over two-letter segment prefixes.
///
/// `start` is either a bare letter (`c`) or a two-letter prefix (`cf`). Second
/// letters run from `start`'s second letter (or `a`) up to `end`'s second
/// letter when `end` shares the first letter, otherwise through `z`. Every
/// combination is emitted in all four case permutations.
///
/// A bare-letter start also covers segments that are just the letter (`*.c`)
/// or continue with a non-letter (`*.c3*`, `*.c_*`), which no letter pair
/// reaches.
pub fn two_letter_wildcard_filter(field: &str, start: &str, end: Option<&str>) -> Option<Filter> {
    let start = start.to_lowercase();
    let mut chars = start.chars();
    let first = chars.next().filter(char::is_ascii_lowercase)?;
    let from = chars.next().unwrap_or('a');

    let end = end.map(str::to_lowercase);
    let upto = match end.as_deref().map(|e| e.chars().collect::<Vec<_>>()) {
        Some(e) if e.first() == Some(&first) && e.len() > 1 => (e[1] as u8).checked_sub(1)? as char,
        _ => 'z',
    };
    if from > upto {
        return None;
    }

    let mut patterns = Vec::new();
    if start.len() == 1 {
        for a in [first, first.to_ascii_uppercase()] {
            patterns.push(Filter::Wildcard {
                field: field.to_string(),
                pattern: format!("*.{a}"),
            });
            for symbol in NON_LETTER_SECOND {
                patterns.push(segment_wildcard(field, &format!("{a}{symbol}")));
            }
        }
    }
    for second in from..=upto {
        for a in [first, first.to_ascii_uppercase()] {
            for b in [second, second.to_ascii_uppercase()] {
                patterns.push(segment_wildcard(field, &format!("{a}{b}")));
            }
        }
    }
    Some(Filter::AnyOf(patterns))
}

/// Characters other than letters that may follow the first letter of a type
/// name segment.
const NON_LETTER_SECOND: [char; 13] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '_', '-', '.',
];

fn segment_wildcard(field: &str, prefix: &str) -> Filter {
    Filter::Wildcard {
        field: field.to_string(),
        pattern: format!("*.{prefix}*"),
    }
}

fn leading_letter(s: &str) -> Option<char> {
    s.chars()
        .next()
        .map(|c| c.to_ascii_lowercase())
        .filter(char::is_ascii_lowercase)
}

/// Sort clause on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortClause {
    pub field: String,
    pub descending: bool,
}

impl SortClause {
    /// Descending sort on `field`.
    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: true,
        }
    }

    fn to_json(&self) -> Value {
        let order = if self.descending { "desc" } else { "asc" };
        json!({ &self.field: { "order": order } })
    }
}

/// A windowed conjunctive query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryDocument {
    pub from: u64,
    pub size: u64,
    pub filters: Vec<Filter>,
    pub sort: Vec<SortClause>,
}

impl QueryDocument {
    /// A zero-size query used only for its total hit count.
    pub fn count(filters: Vec<Filter>) -> Self {
        Self {
            from: 0,
            size: 0,
            filters,
            sort: Vec::new(),
        }
    }

    /// One page of results.
    pub fn page(filters: Vec<Filter>, from: u64, size: u64) -> Self {
        Self {
            from,
            size,
            filters,
            sort: Vec::new(),
        }
    }

    /// Add a sort clause.
    pub fn with_sort(mut self, sort: SortClause) -> Self {
        self.sort.push(sort);
        self
    }

    /// Render as backend JSON.
    pub fn to_json(&self) -> Value {
        let mut doc = json!({
            "from": self.from,
            "size": self.size,
            "query": {
                "bool": {
                    "filter": self.filters.iter().map(Filter::to_json).collect::<Vec<_>>()
                }
            }
        });
        if !self.sort.is_empty() {
            doc["sort"] = Value::Array(self.sort.iter().map(SortClause::to_json).collect());
        }
        doc
    }
}

impl Serialize for QueryDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
