//! Catalog session: loads governance objects and resource graphs.
//!
//! Load order matters: policies first (classifications and business terms
//! point at them), then resources, classifications and business terms. A
//! resource's own objects and relationships are loaded on demand.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::dedup::DedupStats;
use crate::error::{CatalogError, Result};
use crate::filter::{equality_filter, fields, Filter, SortClause};
use crate::graph::{CatalogGraph, CatalogObject, ObjectId, RecordOutcome, SkipReason};
use crate::partition::{PartitionConfig, ProgressivePartitioner, QueryPlan};
use crate::search::{PaginatedFetcher, SearchBackend, SearchHit, ELEMENT_RELATIONSHIP};

/// Class types.
pub mod class_types {
    pub const RESOURCE: &str = "core.Resource";
    pub const POLICY: &str = "com.infa.ccgf.models.governance.Policy";
    pub const BUSINESS_TERM: &str = "com.infa.ccgf.models.governance.BusinessTerm";
    pub const ELEMENT_CLASSIFICATION: &str = "core.DataElementClassification";
    pub const ENTITY_CLASSIFICATION: &str = "core.DataEntityClassification";
}

/// Relationship types.
pub mod relationship_types {
    pub const POLICY_CLASSIFICATION: &str =
        "com.infa.ccgf.models.governance.relatedPolicyClassification";
    pub const BUSINESS_TERM_POLICY: &str =
        "com.infa.ccgf.models.governance.relatedBusinessTermPolicy";
    pub const TECHNICAL_GLOSSARY: &str =
        "com.infa.ccgf.models.governance.IClassTechnicalGlossaryBase";
    pub const CLASSIFIED_AS: &str = "core.ClassifiedAs";
}

const ASSOCIATION_KIND: &str = "core.associationKind";
const PARENT_CHILD: &str = "core.ParentChild";
const CURATION_STATUS: &str = "core.curationStatus";
const ACCEPTED: &str = "ACCEPTED";
const SOURCE_IDENTITY: &str = "core.sourceIdentity";
const TARGET_IDENTITY: &str = "core.targetIdentity";
const SOURCE_ORIGIN: &str = "core.sourceOrigin";
const TARGET_ORIGIN: &str = "core.targetOrigin";

fn is_classification(class_type: &str) -> bool {
    class_type == class_types::ELEMENT_CLASSIFICATION
        || class_type == class_types::ENTITY_CLASSIFICATION
}

fn is_accepted(hit: &SearchHit) -> bool {
    hit.get_strs(CURATION_STATUS)
        .iter()
        .any(|s| s.contains(ACCEPTED))
}

/// Objects and counters from loading one resource.
#[derive(Debug, Clone)]
pub struct ResourceLoad {
    pub resource: ObjectId,
    pub origin: String,
    /// Objects of the resource, in fetch order
    pub objects: Vec<ObjectId>,
    pub plan: QueryPlan,
    pub fetched: DedupStats,
    pub relationships: usize,
    pub skipped: usize,
}

/// A loaded catalog.
pub struct CatalogSession<'a> {
    backend: &'a dyn SearchBackend,
    partition: PartitionConfig,
    page_size: u64,
    graph: CatalogGraph,
    policies: Vec<ObjectId>,
    resources: Vec<ObjectId>,
    classifications: Vec<ObjectId>,
    business_terms: Vec<ObjectId>,
    skipped: usize,
}

impl<'a> CatalogSession<'a> {
    pub fn new(backend: &'a dyn SearchBackend, partition: PartitionConfig, page_size: u64) -> Self {
        Self {
            backend,
            partition,
            page_size,
            graph: CatalogGraph::new(),
            policies: Vec::new(),
            resources: Vec::new(),
            classifications: Vec::new(),
            business_terms: Vec::new(),
            skipped: 0,
        }
    }

    pub fn graph(&self) -> &CatalogGraph {
        &self.graph
    }

    pub fn policies(&self) -> &[ObjectId] {
        &self.policies
    }

    pub fn resources(&self) -> &[ObjectId] {
        &self.resources
    }

    pub fn classifications(&self) -> &[ObjectId] {
        &self.classifications
    }

    pub fn business_terms(&self) -> &[ObjectId] {
        &self.business_terms
    }

    /// Records dropped during conversion so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn find_resource(&self, name: &str) -> Option<ObjectId> {
        self.resources
            .iter()
            .copied()
            .find(|&id| self.graph.get(id).name == name)
    }

    /// Load policies, resources, classifications and business terms.
    pub async fn load(&mut self) -> Result<()> {
        info!("Fetching policy information");
        self.policies = self.load_class_type(class_types::POLICY).await?;

        self.load_resources().await?;

        info!("Fetching classification information");
        let classification_policies = self
            .policy_links(relationship_types::POLICY_CLASSIFICATION)
            .await?;
        let mut classifications = self
            .load_class_type(class_types::ELEMENT_CLASSIFICATION)
            .await?;
        classifications.extend(
            self.load_class_type(class_types::ENTITY_CLASSIFICATION)
                .await?,
        );
        self.attach_policies(&classifications, &classification_policies);
        self.classifications = classifications;

        info!("Fetching business term information");
        let term_policies = self
            .policy_links(relationship_types::BUSINESS_TERM_POLICY)
            .await?;
        let terms = self.load_class_type(class_types::BUSINESS_TERM).await?;
        self.attach_policies(&terms, &term_policies);
        self.business_terms = terms;

        info!(
            "Loaded {} policies, {} resources, {} classifications, {} business terms",
            self.policies.len(),
            self.resources.len(),
            self.classifications.len(),
            self.business_terms.len()
        );
        Ok(())
    }

    /// Enumerate resources only. Enough to plan a resource without governance data.
    pub async fn load_resources(&mut self) -> Result<&[ObjectId]> {
        info!("Fetching resource information");
        self.resources = self.load_class_type(class_types::RESOURCE).await?;
        for &id in &self.resources {
            self.graph.mark_resource(id);
        }
        Ok(&self.resources)
    }

    /// Load one resource's objects and relationships and link them.
    pub async fn load_resource(&mut self, name: &str) -> Result<ResourceLoad> {
        let resource = self
            .find_resource(name)
            .ok_or_else(|| CatalogError::ResourceNotFound(name.to_string()))?;
        let origin = self.graph.get(resource).origin.clone();
        info!("Fetching detailed information for {}", name);

        let partitioner = ProgressivePartitioner::new(self.backend, self.partition.clone());
        let plan = partitioner.plan_all(&origin).await?;
        let fetcher = PaginatedFetcher::new(self.backend, self.page_size);
        let (records, fetched) = plan.fetch(&fetcher).await?;

        let mut skipped = 0;
        let mut objects = Vec::new();
        let mut seen = HashSet::new();
        for record in records.iter().filter(|r| r.element_type() != Some(ELEMENT_RELATIONSHIP)) {
            match CatalogObject::from_hit(record) {
                RecordOutcome::Ok(object) => {
                    let id = self.graph.insert(object);
                    if seen.insert(id) {
                        objects.push(id);
                    }
                }
                RecordOutcome::Skipped(reason) => {
                    debug!("Skipping object record: {}", reason);
                    skipped += 1;
                }
            }
        }

        let mut relationships = 0;
        for record in records.iter().filter(|r| r.element_type() == Some(ELEMENT_RELATIONSHIP)) {
            match self.link_resource_relationship(record) {
                RecordOutcome::Ok(()) => relationships += 1,
                RecordOutcome::Skipped(reason) => {
                    debug!("Skipping relationship record: {}", reason);
                    skipped += 1;
                }
            }
        }

        for relationship_type in [
            relationship_types::TECHNICAL_GLOSSARY,
            relationship_types::CLASSIFIED_AS,
        ] {
            let (linked, dropped) = self
                .link_supplementary(relationship_type, &origin)
                .await?;
            relationships += linked;
            skipped += dropped;
        }

        self.skipped += skipped;
        info!(
            "Resource {}: {} objects, {} relationships linked, {} records skipped",
            name,
            objects.len(),
            relationships,
            skipped
        );

        Ok(ResourceLoad {
            resource,
            origin,
            objects,
            plan,
            fetched,
            relationships,
            skipped,
        })
    }

    /// Find an object by identity, querying the backend when it is not loaded yet.
    pub async fn object_by_identity(&mut self, identity: &str) -> Result<Option<ObjectId>> {
        if let Some(id) = self.graph.find(identity) {
            return Ok(Some(id));
        }

        let records = self
            .fetcher()
            .fetch_all(&[equality_filter(fields::IDENTITY, identity)])
            .await?;
        for record in &records {
            if let RecordOutcome::Ok(object) = CatalogObject::from_hit(record) {
                return Ok(Some(self.graph.insert(object)));
            }
        }
        Ok(None)
    }

    fn fetcher(&self) -> PaginatedFetcher<'a> {
        PaginatedFetcher::new(self.backend, self.page_size)
            .with_sort(SortClause::desc(fields::SCANNED_TIME))
    }

    async fn load_class_type(&mut self, class_type: &str) -> Result<Vec<ObjectId>> {
        let partitioner = ProgressivePartitioner::new(self.backend, self.partition.clone());
        let plan = partitioner.plan_class_type(class_type).await?;
        let fetcher = PaginatedFetcher::new(self.backend, self.page_size);
        let (records, _) = plan.fetch(&fetcher).await?;

        let mut ids = Vec::with_capacity(records.len());
        for record in &records {
            match CatalogObject::from_hit(record) {
                RecordOutcome::Ok(object) => ids.push(self.graph.insert(object)),
                RecordOutcome::Skipped(reason) => {
                    debug!("Skipping {} record: {}", class_type, reason);
                    self.skipped += 1;
                }
            }
        }
        debug!("Loaded {} objects of {}", ids.len(), class_type);
        Ok(ids)
    }

    /// Map each target identity to the source identities of one relationship type.
    async fn policy_links(&self, relationship_type: &str) -> Result<HashMap<String, Vec<String>>> {
        let records = self
            .fetcher()
            .fetch_all(&relationship_filters(relationship_type))
            .await?;

        let mut links: HashMap<String, Vec<String>> = HashMap::new();
        for record in &records {
            if let (Some(source), Some(target)) =
                (record.get_str(SOURCE_IDENTITY), record.get_str(TARGET_IDENTITY))
            {
                links
                    .entry(target.to_string())
                    .or_default()
                    .push(source.to_string());
            }
        }
        debug!("{} {} relationships", records.len(), relationship_type);
        Ok(links)
    }

    fn attach_policies(&mut self, objects: &[ObjectId], links: &HashMap<String, Vec<String>>) {
        let policies: HashSet<ObjectId> = self.policies.iter().copied().collect();
        for &id in objects {
            let Some(sources) = links.get(&self.graph.get(id).identity) else {
                continue;
            };
            let parents: Vec<ObjectId> = sources
                .iter()
                .filter_map(|identity| self.graph.find(identity))
                .filter(|p| policies.contains(p))
                .collect();
            if !parents.is_empty() {
                debug!(
                    "Attaching {} policies to {}",
                    parents.len(),
                    self.graph.get(id).name
                );
                self.graph.set_parent_policies(id, parents);
            }
        }
    }

    fn link_resource_relationship(&mut self, record: &SearchHit) -> RecordOutcome<()> {
        let (source_id, target_id) = match endpoints(record) {
            Ok(ids) => ids,
            Err(reason) => return RecordOutcome::Skipped(reason),
        };
        let source = self.graph.find(source_id);
        let target = self.graph.find(target_id);

        if record.get_str(ASSOCIATION_KIND) == Some(PARENT_CHILD) {
            if let (Some(parent), Some(child)) = (source, target) {
                self.graph.link_parent_child(parent, child);
            }
        }

        if !is_accepted(record) {
            return RecordOutcome::Ok(());
        }
        match (source, target) {
            (Some(source), Some(target)) => {
                self.link_governance(source, target);
                RecordOutcome::Ok(())
            }
            (None, _) => RecordOutcome::Skipped(SkipReason::UnknownEndpoint(source_id.into())),
            (_, None) => RecordOutcome::Skipped(SkipReason::UnknownEndpoint(target_id.into())),
        }
    }

    /// Link accepted relationships of one type that touch `origin`.
    async fn link_supplementary(
        &mut self,
        relationship_type: &str,
        origin: &str,
    ) -> Result<(usize, usize)> {
        let records = self
            .fetcher()
            .fetch_all(&relationship_filters(relationship_type))
            .await?;

        let mut linked = 0;
        let mut skipped = 0;
        for record in &records {
            let touches_origin = record.get_str(SOURCE_ORIGIN) == Some(origin)
                || record.get_str(TARGET_ORIGIN) == Some(origin);
            if !touches_origin || !is_accepted(record) {
                continue;
            }
            let (source_id, target_id) = match endpoints(record) {
                Ok(ids) => ids,
                Err(reason) => {
                    debug!("Skipping {} record: {}", relationship_type, reason);
                    skipped += 1;
                    continue;
                }
            };
            let source = self.object_by_identity(source_id).await?;
            let target = self.object_by_identity(target_id).await?;
            match (source, target) {
                (Some(source), Some(target)) => {
                    self.link_governance(source, target);
                    linked += 1;
                }
                _ => skipped += 1,
            }
        }
        debug!(
            "{}: {} linked, {} skipped for origin {}",
            relationship_type, linked, skipped, origin
        );
        Ok((linked, skipped))
    }

    fn link_governance(&mut self, source: ObjectId, target: ObjectId) {
        let class_type = &self.graph.get(target).class_type;
        let classification = is_classification(class_type);
        let business_term = class_type == class_types::BUSINESS_TERM;
        if classification {
            self.graph.add_classification(source, target);
        } else if business_term {
            self.graph.add_business_term(source, target);
        }
    }
}

fn relationship_filters(relationship_type: &str) -> Vec<Filter> {
    vec![
        equality_filter(fields::ELEMENT_TYPE, ELEMENT_RELATIONSHIP),
        equality_filter(fields::TYPE, relationship_type),
    ]
}

fn endpoints(record: &SearchHit) -> std::result::Result<(&str, &str), SkipReason> {
    let source = record
        .get_str(SOURCE_IDENTITY)
        .ok_or(SkipReason::MissingField(SOURCE_IDENTITY))?;
    let target = record
        .get_str(TARGET_IDENTITY)
        .ok_or(SkipReason::MissingField(TARGET_IDENTITY))?;
    Ok((source, target))
}
