//! Common test utilities for integration tests.
//!
//! [`SyntheticBackend`] evaluates filter fragments against an in-memory
//! record set with the same matching rules as the catalog's search service:
//! term filters match exact values or array members, range filters match any
//! lower-cased token of the name, wildcards are globs, and hits past the
//! result window are never served.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use tagsync_catalog::{Filter, QueryDocument, Result, SearchBackend, SearchHit, SearchResponse};

pub const TABLE: &str = "com.infa.odin.models.relational.Table";
pub const VIEW: &str = "com.infa.odin.models.relational.View";
pub const COLUMN: &str = "com.infa.odin.models.relational.Column";

/// In-memory search service with a hard result window.
pub struct SyntheticBackend {
    records: Vec<SearchHit>,
    window: usize,
    requests: Mutex<Vec<QueryDocument>>,
}

impl SyntheticBackend {
    pub fn new(records: Vec<SearchHit>, window: usize) -> Self {
        Self {
            records,
            window,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of queries executed so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of zero-size (count) queries executed so far.
    pub fn probe_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|q| q.size == 0)
            .count()
    }

    pub fn records(&self) -> &[SearchHit] {
        &self.records
    }
}

#[async_trait]
impl SearchBackend for SyntheticBackend {
    async fn execute(&self, query: &QueryDocument) -> Result<SearchResponse> {
        self.requests.lock().unwrap().push(query.clone());

        let matched: Vec<&SearchHit> = self
            .records
            .iter()
            .filter(|r| query.filters.iter().all(|f| matches(f, r)))
            .collect();

        let from = query.from as usize;
        let end = (from + query.size as usize).min(self.window).min(matched.len());
        let hits = if from < end {
            matched[from..end].iter().map(|&r| r.clone()).collect()
        } else {
            Vec::new()
        };

        Ok(SearchResponse {
            total_hits: matched.len() as u64,
            hits,
        })
    }
}

fn field_values<'a>(record: &'a SearchHit, field: &str) -> Vec<&'a str> {
    record.get_strs(field)
}

fn matches(filter: &Filter, record: &SearchHit) -> bool {
    match filter {
        Filter::Term { field, value } => field_values(record, field).contains(&value.as_str()),
        Filter::Range { field, gte, lt } => field_values(record, field).iter().any(|v| {
            tokens(v).any(|token| {
                gte.as_deref().is_none_or(|g| token.as_str() >= g)
                    && lt.as_deref().is_none_or(|l| token.as_str() < l)
            })
        }),
        Filter::Wildcard { field, pattern } => field_values(record, field)
            .iter()
            .any(|v| glob_match(pattern.as_bytes(), v.as_bytes())),
        Filter::AnyOf(filters) => filters.iter().any(|f| matches(f, record)),
    }
}

/// Lower-cased tokens of an analyzed text field.
fn tokens(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(|c: char| c.is_whitespace() || c == '_')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn glob_match(pattern: &[u8], value: &[u8]) -> bool {
    match pattern.split_first() {
        None => value.is_empty(),
        Some((b'*', rest)) => (0..=value.len()).any(|i| glob_match(rest, &value[i..])),
        Some((c, rest)) => value.first() == Some(c) && glob_match(rest, &value[1..]),
    }
}

pub fn hit(value: Value) -> SearchHit {
    let Value::Object(map) = value else {
        panic!("record must be a JSON object")
    };
    SearchHit::new(map)
}

/// An object record with every field the graph requires.
pub fn object(identity: &str, name: &str, class_type: &str, origin: &str) -> SearchHit {
    let mut types = vec![class_type.to_string()];
    if class_type == COLUMN {
        types.push("core.DataElement".to_string());
    } else if class_type == TABLE || class_type == VIEW {
        types.push("core.DataSet".to_string());
    }
    hit(json!({
        "elementType": "OBJECT",
        "core.identity": identity,
        "core.name": name,
        "core.origin": origin,
        "core.externalId": format!("{origin}://{name}~{identity}"),
        "core.classType": class_type,
        "type": types,
    }))
}

/// A relationship record inside `origin`.
pub fn relationship(source: &str, target: &str, kind: &str, origin: &str) -> SearchHit {
    hit(json!({
        "elementType": "RELATIONSHIP",
        "core.origin": origin,
        "core.sourceIdentity": source,
        "core.targetIdentity": target,
        "type": kind,
    }))
}

/// Add fields to a record.
pub fn with(mut record: SearchHit, fields: Value) -> SearchHit {
    if let Value::Object(extra) = fields {
        record.source.extend(extra);
    }
    record
}

/// `n` column names spread over the alphabet, each a single token.
pub fn spread_names(n: usize) -> Vec<String> {
    let letters: Vec<char> = ('a'..='z').collect();
    (0..n)
        .map(|i| format!("{}{}{}", letters[i % 26], letters[(i / 26) % 26], i))
        .collect()
}
