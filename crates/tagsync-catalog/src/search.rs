//! Search execution primitive, count oracle and paginated fetcher.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::Result;
use crate::filter::{fields, Filter, QueryDocument, SortClause};

/// Element type of object records.
pub const ELEMENT_OBJECT: &str = "OBJECT";

/// Element type of relationship records.
pub const ELEMENT_RELATIONSHIP: &str = "RELATIONSHIP";

/// One search hit: the record's source field map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHit {
    pub source: Map<String, Value>,
}

impl SearchHit {
    pub fn new(source: Map<String, Value>) -> Self {
        Self { source }
    }

    /// String value of a field.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.source.get(field).and_then(Value::as_str)
    }

    /// Values of a field that may hold a string or an array of strings.
    pub fn get_strs(&self, field: &str) -> Vec<&str> {
        match self.source.get(field) {
            Some(Value::String(s)) => vec![s.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn element_type(&self) -> Option<&str> {
        self.get_str(fields::ELEMENT_TYPE)
    }

    pub fn identity(&self) -> Option<&str> {
        self.get_str(fields::IDENTITY)
    }
}

/// Backend response: reported total plus the hits in this window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub total_hits: u64,
    pub hits: Vec<SearchHit>,
}

/// Search execution primitive.
///
/// Transport, authentication and retries belong to implementations.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Execute one query document.
    async fn execute(&self, query: &QueryDocument) -> Result<SearchResponse>;
}

/// Reports the total hit count for a filter set.
pub struct CountOracle<'a> {
    backend: &'a dyn SearchBackend,
}

impl<'a> CountOracle<'a> {
    pub fn new(backend: &'a dyn SearchBackend) -> Self {
        Self { backend }
    }

    /// Issue a zero-size query and return the backend-reported total.
    pub async fn probe(&self, filters: &[Filter]) -> Result<u64> {
        let response = self
            .backend
            .execute(&QueryDocument::count(filters.to_vec()))
            .await?;
        trace!(total = response.total_hits, "probe");
        Ok(response.total_hits)
    }
}

/// Retrieves every record for one sub-query by walking `from`/`size` windows.
pub struct PaginatedFetcher<'a> {
    backend: &'a dyn SearchBackend,
    page_size: u64,
    sort: Vec<SortClause>,
}

impl<'a> PaginatedFetcher<'a> {
    pub fn new(backend: &'a dyn SearchBackend, page_size: u64) -> Self {
        Self {
            backend,
            page_size: page_size.max(1),
            sort: Vec::new(),
        }
    }

    /// Sort every page by `clause`.
    pub fn with_sort(mut self, clause: SortClause) -> Self {
        self.sort.push(clause);
        self
    }

    /// Fetch all records matching `filters`.
    ///
    /// Stops when a page comes back empty or `from` reaches the reported total.
    pub async fn fetch_all(&self, filters: &[Filter]) -> Result<Vec<SearchHit>> {
        let mut records = Vec::new();
        let mut from = 0u64;

        loop {
            let mut query = QueryDocument::page(filters.to_vec(), from, self.page_size);
            query.sort = self.sort.clone();

            let response = self.backend.execute(&query).await?;
            let returned = response.hits.len() as u64;
            records.extend(response.hits);
            from += returned;

            trace!(from, total = response.total_hits, returned, "page");
            if returned == 0 || from >= response.total_hits {
                break;
            }
        }

        debug!("Fetched {} records", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::equality_filter;
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves a fixed list of records in windows, recording each request.
    struct FixedBackend {
        records: Vec<SearchHit>,
        reported_total: u64,
        requests: Mutex<Vec<(u64, u64)>>,
    }

    impl FixedBackend {
        fn new(n: usize) -> Self {
            let records = (0..n)
                .map(|i| {
                    let Value::Object(map) = json!({"core.identity": format!("id-{i}")}) else {
                        unreachable!()
                    };
                    SearchHit::new(map)
                })
                .collect();
            Self {
                records,
                reported_total: n as u64,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SearchBackend for FixedBackend {
        async fn execute(&self, query: &QueryDocument) -> Result<SearchResponse> {
            self.requests.lock().unwrap().push((query.from, query.size));
            let hits = self
                .records
                .iter()
                .skip(query.from as usize)
                .take(query.size as usize)
                .cloned()
                .collect();
            Ok(SearchResponse {
                total_hits: self.reported_total,
                hits,
            })
        }
    }

    #[tokio::test]
    async fn test_probe_uses_zero_size() {
        let backend = FixedBackend::new(42);
        let oracle = CountOracle::new(&backend);
        let count = oracle
            .probe(&[equality_filter(fields::ELEMENT_TYPE, ELEMENT_OBJECT)])
            .await
            .unwrap();

        assert_eq!(count, 42);
        assert_eq!(*backend.requests.lock().unwrap(), vec![(0, 0)]);
    }

    #[tokio::test]
    async fn test_fetch_all_pages() {
        let backend = FixedBackend::new(250);
        let fetcher = PaginatedFetcher::new(&backend, 100);
        let records = fetcher.fetch_all(&[]).await.unwrap();

        assert_eq!(records.len(), 250);
        assert_eq!(records[249].identity(), Some("id-249"));
        assert_eq!(
            *backend.requests.lock().unwrap(),
            vec![(0, 100), (100, 100), (200, 100)]
        );
    }

    #[tokio::test]
    async fn test_fetch_all_stops_on_empty_page() {
        let mut backend = FixedBackend::new(30);
        backend.reported_total = 1000;
        let fetcher = PaginatedFetcher::new(&backend, 20);
        let records = fetcher.fetch_all(&[]).await.unwrap();

        assert_eq!(records.len(), 30);
        assert_eq!(backend.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_all_empty() {
        let backend = FixedBackend::new(0);
        let fetcher = PaginatedFetcher::new(&backend, 100);
        assert!(fetcher.fetch_all(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn test_get_strs_accepts_string_or_array() {
        let Value::Object(map) = json!({
            "type": ["core.DataElement", "com.infa.odin.models.relational.Column"],
            "core.curationStatus": "ACCEPTED"
        }) else {
            unreachable!()
        };
        let hit = SearchHit::new(map);
        assert_eq!(hit.get_strs("type").len(), 2);
        assert_eq!(hit.get_strs("core.curationStatus"), vec!["ACCEPTED"]);
        assert!(hit.get_strs("missing").is_empty());
    }
}
