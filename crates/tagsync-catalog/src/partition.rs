//! Progressive query partitioning.
//!
//! The search backend refuses to page past a fixed result window, so a scope
//! that reports `count >= cap` hits is split and re-probed until every piece
//! fits. The ladder, top-down:
//!
//! 1. whole category
//! 2. concrete asset type (objects only)
//! 3. five-way alphabetic split `<a, a-f, f-k, k-p, p-u, u+`
//! 4. single letters inside the overflowing range
//! 5. five two-letter sub-ranges of the overflowing letter (deepest tier)
//!
//! Objects split on range filters over the normalized `core.name` field.
//! Relationships have no asset-type tier and split on wildcard groups over the
//! last segments of the dotted `type` name; wildcards cannot express the
//! pre-alphabet bucket, so relationships whose type segments start with a
//! non-letter are not covered by a split plan.
//!
//! Each split compares its children's counts against the parent's; a shortfall
//! is logged and added to [`QueryPlan::uncovered`].
//!
//! Each tier is its own method and the ladder never recurses, so plan
//! construction is a bounded sequence of probes.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use tagsync_config::{SearchConfig, DEFAULT_QUERY_LIMIT};

use crate::dedup::{Deduplicator, DedupStats};
use crate::error::Result;
use crate::filter::{
    equality_filter, fields, range_filter, two_letter_wildcard_filter, wildcard_group_filter,
    Filter,
};
use crate::range::AlphaRange;
use crate::search::{CountOracle, PaginatedFetcher, SearchBackend, SearchHit, ELEMENT_OBJECT, ELEMENT_RELATIONSHIP};

/// Partitioning path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    #[serde(rename = "OBJECT")]
    Objects,
    #[serde(rename = "RELATIONSHIP")]
    Relationships,
}

impl Category {
    /// Value of the `elementType` field.
    pub fn element_type(self) -> &'static str {
        match self {
            Category::Objects => ELEMENT_OBJECT,
            Category::Relationships => ELEMENT_RELATIONSHIP,
        }
    }

    /// Name filter for one tier, or `None` when the range is not expressible.
    fn name_filter(self, range: &AlphaRange, tier: Tier) -> Option<Filter> {
        match (self, tier) {
            (Category::Objects, _) => {
                range_filter(fields::NAME, range.start.as_deref(), range.end.as_deref())
            }
            (Category::Relationships, Tier::TwoLetter) => two_letter_wildcard_filter(
                fields::TYPE,
                range.start.as_deref()?,
                range.end.as_deref(),
            ),
            (Category::Relationships, _) => {
                wildcard_group_filter(fields::TYPE, range.start.as_deref(), range.end.as_deref())
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_type())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    FiveWay,
    SingleLetter,
    TwoLetter,
}

/// One planned sub-query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanEntry {
    pub category: Category,
    pub filters: Vec<Filter>,
    /// Probe-time count, diagnostic only
    pub expected_count: u64,
    /// Splitting path, e.g. `OBJECT:Table:a-f:c-d`
    pub description: String,
    /// Still at or over the cap at the deepest tier; the backend window truncates it
    pub residual: bool,
}

/// Ordered list of sub-queries covering a scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryPlan {
    pub entries: Vec<PlanEntry>,
    /// Records counted at some tier that none of the sub-queries below it match.
    pub uncovered: u64,
}

impl QueryPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter()
    }

    /// Sum of probe-time counts.
    pub fn total_expected(&self) -> u64 {
        self.entries.iter().map(|e| e.expected_count).sum()
    }

    /// Entries flagged as unresolvable.
    pub fn residuals(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| e.residual)
    }

    pub fn extend(&mut self, other: QueryPlan) {
        self.entries.extend(other.entries);
        self.uncovered += other.uncovered;
    }

    /// Fetch every entry in plan order and merge the results.
    pub async fn fetch(
        &self,
        fetcher: &PaginatedFetcher<'_>,
    ) -> Result<(Vec<SearchHit>, DedupStats)> {
        let mut dedup = Deduplicator::new();
        let mut records = Vec::new();

        for (i, entry) in self.entries.iter().enumerate() {
            debug!(
                "Fetching query {}/{}: {} (expecting ~{})",
                i + 1,
                self.entries.len(),
                entry.description,
                entry.expected_count
            );
            let hits = fetcher.fetch_all(&entry.filters).await?;
            debug!("  Retrieved {} results", hits.len());
            records.extend(dedup.dedup(hits));
        }

        let stats = dedup.stats();
        info!(
            "Collected {} records ({} after deduplication)",
            stats.input, stats.kept
        );
        Ok((records, stats))
    }
}

/// Partitioner settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionConfig {
    /// Maximum hits a single window may report
    pub cap: u64,
    /// Report every probe at INFO instead of DEBUG
    pub verbose: bool,
    /// Asset types for the type tier, in probe order
    pub asset_types: Vec<String>,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for PartitionConfig {
    fn from(search: &SearchConfig) -> Self {
        Self {
            cap: if search.query_limit == 0 {
                DEFAULT_QUERY_LIMIT
            } else {
                search.query_limit
            },
            verbose: search.verbose,
            asset_types: search.asset_types.clone(),
        }
    }
}

/// Builds query plans whose entries each fit under the cap.
pub struct ProgressivePartitioner<'a> {
    oracle: CountOracle<'a>,
    config: PartitionConfig,
}

impl<'a> ProgressivePartitioner<'a> {
    pub fn new(backend: &'a dyn SearchBackend, config: PartitionConfig) -> Self {
        Self {
            oracle: CountOracle::new(backend),
            config,
        }
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// Plan objects then relationships for one origin.
    pub async fn plan_all(&self, origin: &str) -> Result<QueryPlan> {
        let mut plan = QueryPlan::default();
        self.build_objects(origin, &mut plan).await?;
        self.build_relationships(origin, &mut plan).await?;
        self.summarize(&plan);
        Ok(plan)
    }

    /// Plan the object records of one origin.
    pub async fn plan_objects(&self, origin: &str) -> Result<QueryPlan> {
        let mut plan = QueryPlan::default();
        self.build_objects(origin, &mut plan).await?;
        self.summarize(&plan);
        Ok(plan)
    }

    /// Plan the relationship records of one origin.
    pub async fn plan_relationships(&self, origin: &str) -> Result<QueryPlan> {
        let mut plan = QueryPlan::default();
        self.build_relationships(origin, &mut plan).await?;
        self.summarize(&plan);
        Ok(plan)
    }

    /// Plan every object of one class type, across origins.
    ///
    /// No type tier: an overflowing class type goes straight to name splitting.
    pub async fn plan_class_type(&self, class_type: &str) -> Result<QueryPlan> {
        let mut plan = QueryPlan::default();
        let base = vec![equality_filter(fields::CLASS_TYPE, class_type)];
        let description = format!("CLASS:{}", short_type(class_type));

        let count = self.oracle.probe(&base).await?;
        self.progress(format_args!("{description}: {count}"));

        if count == 0 {
            // nothing to fetch
        } else if !self.exceeds(count) {
            plan.entries.push(entry(Category::Objects, base, count, description, false));
        } else {
            self.progress(format_args!("  exceeds {} - splitting alphabetically", self.config.cap));
            self.split_five_way(Category::Objects, &base, count, &description, &mut plan)
                .await?;
        }

        self.summarize(&plan);
        Ok(plan)
    }

    async fn build_objects(&self, origin: &str, plan: &mut QueryPlan) -> Result<()> {
        let category = Category::Objects;
        let base = scope_filters(origin, category);

        let total = self.oracle.probe(&base).await?;
        self.progress(format_args!("All OBJECTS: {total}"));

        if !self.exceeds(total) {
            plan.entries
                .push(entry(category, base, total, "All OBJECTS".to_string(), false));
            return Ok(());
        }

        self.progress(format_args!("  exceeds {} - splitting by asset type", self.config.cap));
        let mut covered = 0;
        for asset_type in &self.config.asset_types {
            let mut filters = base.clone();
            filters.push(equality_filter(fields::TYPE, asset_type));
            let description = format!("OBJECT:{}", short_type(asset_type));

            let count = self.oracle.probe(&filters).await?;
            self.progress(format_args!("  {description}: {count}"));
            covered += count;

            if count == 0 {
                continue;
            }
            if !self.exceeds(count) {
                plan.entries
                    .push(entry(category, filters, count, description, false));
            } else {
                self.split_five_way(category, &filters, count, &description, plan)
                    .await?;
            }
        }
        self.record_shortfall("All OBJECTS (by asset type)", total, covered, plan);
        Ok(())
    }

    async fn build_relationships(&self, origin: &str, plan: &mut QueryPlan) -> Result<()> {
        let category = Category::Relationships;
        let base = scope_filters(origin, category);

        let total = self.oracle.probe(&base).await?;
        self.progress(format_args!("All RELATIONSHIPS: {total}"));

        if total == 0 {
            return Ok(());
        }
        if !self.exceeds(total) {
            plan.entries.push(entry(
                category,
                base,
                total,
                "All RELATIONSHIPS".to_string(),
                false,
            ));
            return Ok(());
        }

        self.progress(format_args!("  exceeds {} - splitting by type name", self.config.cap));
        self.split_five_way(category, &base, total, "RELATIONSHIP", plan)
            .await
    }

    /// Tier 3: the six top-level name ranges.
    async fn split_five_way(
        &self,
        category: Category,
        base: &[Filter],
        base_count: u64,
        path: &str,
        plan: &mut QueryPlan,
    ) -> Result<()> {
        let mut covered = 0;
        for range in AlphaRange::five_way() {
            let Some(name_filter) = category.name_filter(&range, Tier::FiveWay) else {
                debug!("{path}:{range}: not expressible for {category}, skipped");
                continue;
            };
            let filters = with_filter(base, name_filter);
            let description = format!("{path}:{range}");

            let count = self.oracle.probe(&filters).await?;
            self.progress(format_args!("    {description}: {count}"));
            covered += count;

            if count == 0 {
                continue;
            }
            if !self.exceeds(count) {
                plan.entries
                    .push(entry(category, filters, count, description, false));
            } else {
                self.split_single_letter(category, base, &range, filters, count, &description, plan)
                    .await?;
            }
        }
        self.record_shortfall(path, base_count, covered, plan);
        Ok(())
    }

    /// Tier 4: single letters inside `parent`.
    ///
    /// The pre-alphabet bucket has no letters to split on and is emitted as a
    /// residual with the count already probed for it.
    #[allow(clippy::too_many_arguments)]
    async fn split_single_letter(
        &self,
        category: Category,
        base: &[Filter],
        parent: &AlphaRange,
        parent_filters: Vec<Filter>,
        parent_count: u64,
        path: &str,
        plan: &mut QueryPlan,
    ) -> Result<()> {
        if parent.is_pre_alpha() {
            warn!(
                "{path}: {parent_count} records before 'a' cannot be split further; results past {} will be truncated",
                self.config.cap
            );
            plan.entries.push(entry(
                category,
                parent_filters,
                parent_count,
                path.to_string(),
                true,
            ));
            return Ok(());
        }

        let mut covered = 0;
        for range in parent.single_letters() {
            let Some(name_filter) = category.name_filter(&range, Tier::SingleLetter) else {
                continue;
            };
            let filters = with_filter(base, name_filter);
            let description = format!("{path}:{range}");

            let count = self.oracle.probe(&filters).await?;
            self.progress(format_args!("      {description}: {count}"));
            covered += count;

            if count == 0 {
                continue;
            }
            if !self.exceeds(count) {
                plan.entries
                    .push(entry(category, filters, count, description, false));
            } else if let Some(letter) = range.leading_letter() {
                self.split_two_letter(category, base, letter, count, &description, plan)
                    .await?;
            }
        }
        self.record_shortfall(path, parent_count, covered, plan);
        Ok(())
    }

    /// Tier 5: five two-letter sub-ranges of `letter`. Nothing splits below this.
    async fn split_two_letter(
        &self,
        category: Category,
        base: &[Filter],
        letter: char,
        letter_count: u64,
        path: &str,
        plan: &mut QueryPlan,
    ) -> Result<()> {
        let mut covered = 0;
        for range in AlphaRange::two_letter(letter) {
            let Some(name_filter) = category.name_filter(&range, Tier::TwoLetter) else {
                continue;
            };
            let filters = with_filter(base, name_filter);
            let description = format!("{path}:{range}");

            let count = self.oracle.probe(&filters).await?;
            self.progress(format_args!("        {description}: {count}"));
            covered += count;

            if count == 0 {
                continue;
            }
            let residual = self.exceeds(count);
            if residual {
                warn!(
                    "{description}: {count} records still at or over {} after two-letter split",
                    self.config.cap
                );
            }
            plan.entries
                .push(entry(category, filters, count, description, residual));
        }
        self.record_shortfall(path, letter_count, covered, plan);
        Ok(())
    }

    /// Sub-queries may overlap, so `expected - covered` is a lower bound.
    fn record_shortfall(&self, path: &str, expected: u64, covered: u64, plan: &mut QueryPlan) {
        if covered < expected {
            let missing = expected - covered;
            plan.uncovered += missing;
            warn!(
                "{path}: sub-queries cover {covered} of {expected} records; {missing} will not be fetched"
            );
        }
    }

    /// Inclusive: a scope with exactly `cap` hits is split.
    fn exceeds(&self, count: u64) -> bool {
        count >= self.config.cap
    }

    fn progress(&self, message: fmt::Arguments<'_>) {
        if self.config.verbose {
            info!("{message}");
        } else {
            debug!("{message}");
        }
    }

    fn summarize(&self, plan: &QueryPlan) {
        info!(
            "Query plan: {} queries, {} results expected",
            plan.len(),
            plan.total_expected()
        );
        for (i, e) in plan.entries.iter().enumerate() {
            self.progress(format_args!(
                "  {:>3}. {:<40} {:>8}{}",
                i + 1,
                e.description,
                e.expected_count,
                if e.residual { "  (residual)" } else { "" }
            ));
        }
    }
}

fn scope_filters(origin: &str, category: Category) -> Vec<Filter> {
    vec![
        equality_filter(fields::ORIGIN, origin),
        equality_filter(fields::ELEMENT_TYPE, category.element_type()),
    ]
}

fn with_filter(base: &[Filter], extra: Filter) -> Vec<Filter> {
    let mut filters = base.to_vec();
    filters.push(extra);
    filters
}

fn entry(
    category: Category,
    filters: Vec<Filter>,
    expected_count: u64,
    description: String,
    residual: bool,
) -> PlanEntry {
    PlanEntry {
        category,
        filters,
        expected_count,
        description,
        residual,
    }
}

/// Last dotted segment of a class or asset type.
pub fn short_type(class_type: &str) -> &str {
    class_type.rsplit('.').next().unwrap_or(class_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::QueryDocument;
    use crate::search::SearchResponse;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Answers probes from a table keyed by the last filter's JSON.
    struct TableBackend {
        counts: HashMap<String, u64>,
        default: u64,
        probes: Mutex<usize>,
    }

    #[async_trait]
    impl SearchBackend for TableBackend {
        async fn execute(&self, query: &QueryDocument) -> Result<SearchResponse> {
            *self.probes.lock().unwrap() += 1;
            let key = query
                .filters
                .last()
                .map(|f| f.to_json().to_string())
                .unwrap_or_default();
            Ok(SearchResponse {
                total_hits: self.counts.get(&key).copied().unwrap_or(self.default),
                hits: Vec::new(),
            })
        }
    }

    fn config(cap: u64) -> PartitionConfig {
        PartitionConfig {
            cap,
            verbose: false,
            asset_types: vec!["x.Table".into()],
        }
    }

    #[test]
    fn test_short_type() {
        assert_eq!(short_type("com.infa.odin.models.relational.Column"), "Column");
        assert_eq!(short_type("Plain"), "Plain");
    }

    #[tokio::test]
    async fn test_object_entry_emitted_even_when_empty() {
        let backend = TableBackend {
            counts: HashMap::new(),
            default: 0,
            probes: Mutex::new(0),
        };
        let partitioner = ProgressivePartitioner::new(&backend, config(10));
        let plan = partitioner.plan_objects("origin").await.unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.entries[0].description, "All OBJECTS");
        assert_eq!(plan.entries[0].expected_count, 0);
    }

    #[tokio::test]
    async fn test_relationships_empty_plan_when_none() {
        let backend = TableBackend {
            counts: HashMap::new(),
            default: 0,
            probes: Mutex::new(0),
        };
        let partitioner = ProgressivePartitioner::new(&backend, config(10));
        let plan = partitioner.plan_relationships("origin").await.unwrap();
        assert!(plan.is_empty());
    }

    #[tokio::test]
    async fn test_count_equal_to_cap_is_split() {
        // Every probe reports exactly the cap, so every tier overflows.
        let backend = TableBackend {
            counts: HashMap::new(),
            default: 10,
            probes: Mutex::new(0),
        };
        let partitioner = ProgressivePartitioner::new(&backend, config(10));
        let plan = partitioner.plan_objects("origin").await.unwrap();

        // 1 pre-alpha residual + 26 letters * 5 two-letter residuals
        assert_eq!(plan.len(), 1 + 26 * 5);
        assert!(plan.iter().all(|e| e.residual));
        assert_eq!(plan.entries[0].description, "OBJECT:Table:<a");
        assert_eq!(plan.entries[1].description, "OBJECT:Table:a-f:a-b:a-af");
    }

    #[tokio::test]
    async fn test_relationships_never_plan_pre_alpha() {
        let backend = TableBackend {
            counts: HashMap::new(),
            default: 10,
            probes: Mutex::new(0),
        };
        let partitioner = ProgressivePartitioner::new(&backend, config(10));
        let plan = partitioner.plan_relationships("origin").await.unwrap();

        assert_eq!(plan.len(), 26 * 5);
        assert!(plan.iter().all(|e| !e.description.contains('<')));
        assert_eq!(plan.entries.last().unwrap().description, "RELATIONSHIP:u+:z+:zu+");
    }

    #[tokio::test]
    async fn test_objects_of_unlisted_types_are_reported_uncovered() {
        let backend = TableBackend {
            counts: HashMap::from([
                (
                    equality_filter(fields::ELEMENT_TYPE, Category::Objects.element_type())
                        .to_json()
                        .to_string(),
                    20,
                ),
                (
                    equality_filter(fields::TYPE, "x.Table").to_json().to_string(),
                    6,
                ),
            ]),
            default: 0,
            probes: Mutex::new(0),
        };
        let partitioner = ProgressivePartitioner::new(&backend, config(10));
        let plan = partitioner.plan_objects("origin").await.unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.entries[0].description, "OBJECT:Table");
        assert_eq!(plan.total_expected(), 6);
        assert_eq!(plan.uncovered, 14);
    }

    #[tokio::test]
    async fn test_fully_covered_plan_has_nothing_uncovered() {
        let backend = TableBackend {
            counts: HashMap::new(),
            default: 10,
            probes: Mutex::new(0),
        };
        let partitioner = ProgressivePartitioner::new(&backend, config(10));
        let plan = partitioner.plan_objects("origin").await.unwrap();
        assert_eq!(plan.uncovered, 0);
    }

    #[tokio::test]
    async fn test_class_type_plan() {
        let backend = TableBackend {
            counts: HashMap::from([(
                equality_filter(fields::CLASS_TYPE, "core.Resource")
                    .to_json()
                    .to_string(),
                7,
            )]),
            default: 0,
            probes: Mutex::new(0),
        };
        let partitioner = ProgressivePartitioner::new(&backend, config(10));
        let plan = partitioner.plan_class_type("core.Resource").await.unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.entries[0].description, "CLASS:Resource");
        assert_eq!(plan.entries[0].expected_count, 7);
        assert_eq!(*backend.probes.lock().unwrap(), 1);
    }

    #[test]
    fn test_partition_config_from_search() {
        let search = SearchConfig {
            query_limit: 500,
            verbose: true,
            ..Default::default()
        };
        let config = PartitionConfig::from(&search);
        assert_eq!(config.cap, 500);
        assert!(config.verbose);
        assert_eq!(config.asset_types.len(), 5);
    }
}
