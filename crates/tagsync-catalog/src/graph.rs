//! Typed catalog object graph.
//!
//! Objects live in an arena and refer to each other by [`ObjectId`]; the
//! graph owns every object and all links.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::filter::fields;
use crate::search::{SearchHit, ELEMENT_OBJECT};

/// Data element marker in an object's `type` list.
const TYPE_DATA_ELEMENT: &str = "core.DataElement";

/// Data set marker in an object's `type` list.
const TYPE_DATA_SET: &str = "core.DataSet";

/// Index of an object in its [`CatalogGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

/// Why a record was not converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A required field is absent or not a string
    MissingField(&'static str),
    /// The record is not of the expected element type
    ElementType(String),
    /// A relationship endpoint is not in the graph
    UnknownEndpoint(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingField(field) => write!(f, "missing field '{field}'"),
            SkipReason::ElementType(t) => write!(f, "unexpected element type '{t}'"),
            SkipReason::UnknownEndpoint(id) => write!(f, "unknown endpoint '{id}'"),
        }
    }
}

/// Outcome of converting one raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome<T> {
    Ok(T),
    Skipped(SkipReason),
}

impl<T> RecordOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            RecordOutcome::Ok(value) => Some(value),
            RecordOutcome::Skipped(_) => None,
        }
    }
}

/// One catalog object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CatalogObject {
    pub identity: String,
    pub name: String,
    pub description: String,
    pub origin: String,
    pub external_id: String,
    pub class_type: String,
    pub element_type: String,
    pub types: Vec<String>,
    pub is_resource: bool,

    pub parents: Vec<ObjectId>,
    pub children: Vec<ObjectId>,
    pub classifications: Vec<ObjectId>,
    pub business_terms: Vec<ObjectId>,
    pub parent_policies: Vec<ObjectId>,
}

impl CatalogObject {
    /// Convert a search record into an object.
    pub fn from_hit(hit: &SearchHit) -> RecordOutcome<CatalogObject> {
        match hit.element_type() {
            Some(ELEMENT_OBJECT) => {}
            Some(other) => return RecordOutcome::Skipped(SkipReason::ElementType(other.into())),
            None => return RecordOutcome::Skipped(SkipReason::MissingField(fields::ELEMENT_TYPE)),
        }

        let required = |field: &'static str| {
            hit.get_str(field)
                .map(str::to_string)
                .ok_or(SkipReason::MissingField(field))
        };
        let converted = (|| {
            Ok::<_, SkipReason>(CatalogObject {
                identity: required(fields::IDENTITY)?,
                name: required(fields::NAME)?,
                description: hit.get_str("core.description").unwrap_or_default().to_string(),
                origin: required(fields::ORIGIN)?,
                external_id: required("core.externalId")?,
                class_type: required(fields::CLASS_TYPE)?,
                element_type: required(fields::ELEMENT_TYPE)?,
                types: hit.get_strs(fields::TYPE).into_iter().map(str::to_string).collect(),
                ..Default::default()
            })
        })();

        match converted {
            Ok(object) => RecordOutcome::Ok(object),
            Err(reason) => RecordOutcome::Skipped(reason),
        }
    }

    /// Last dotted segment of the class type, e.g. `Column`.
    pub fn short_type(&self) -> &str {
        self.class_type
            .rsplit('.')
            .next()
            .unwrap_or(&self.class_type)
    }

    pub fn is_data_element(&self) -> bool {
        self.types.iter().any(|t| t == TYPE_DATA_ELEMENT)
    }

    pub fn is_data_set(&self) -> bool {
        self.types.iter().any(|t| t == TYPE_DATA_SET)
    }
}

/// Arena of catalog objects keyed by identity.
#[derive(Debug, Default)]
pub struct CatalogGraph {
    objects: Vec<CatalogObject>,
    by_identity: HashMap<String, ObjectId>,
}

impl CatalogGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object; an object with the same identity keeps its first version.
    pub fn insert(&mut self, object: CatalogObject) -> ObjectId {
        if let Some(&id) = self.by_identity.get(&object.identity) {
            return id;
        }
        let id = ObjectId(self.objects.len());
        self.by_identity.insert(object.identity.clone(), id);
        self.objects.push(object);
        id
    }

    pub fn find(&self, identity: &str) -> Option<ObjectId> {
        self.by_identity.get(identity).copied()
    }

    /// Object by id. Ids are only minted by this graph.
    pub fn get(&self, id: ObjectId) -> &CatalogObject {
        &self.objects[id.0]
    }

    fn get_mut(&mut self, id: ObjectId) -> &mut CatalogObject {
        &mut self.objects[id.0]
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &CatalogObject)> {
        self.objects.iter().enumerate().map(|(i, o)| (ObjectId(i), o))
    }

    pub fn mark_resource(&mut self, id: ObjectId) {
        self.get_mut(id).is_resource = true;
    }

    pub fn link_parent_child(&mut self, parent: ObjectId, child: ObjectId) {
        push_unique(&mut self.get_mut(parent).children, child);
        push_unique(&mut self.get_mut(child).parents, parent);
    }

    pub fn add_classification(&mut self, object: ObjectId, classification: ObjectId) {
        push_unique(&mut self.get_mut(object).classifications, classification);
    }

    pub fn add_business_term(&mut self, object: ObjectId, term: ObjectId) {
        push_unique(&mut self.get_mut(object).business_terms, term);
    }

    pub fn set_parent_policies(&mut self, object: ObjectId, policies: Vec<ObjectId>) {
        self.get_mut(object).parent_policies = policies;
    }

    pub fn classification_names(&self, id: ObjectId) -> Vec<String> {
        self.names(&self.get(id).classifications)
    }

    pub fn business_term_names(&self, id: ObjectId) -> Vec<String> {
        self.names(&self.get(id).business_terms)
    }

    /// Policies governing an object: its own, those of its business terms and
    /// classifications, and the same for all descendants. Sorted, no duplicates.
    pub fn related_policy_names(&self, id: ObjectId) -> Vec<String> {
        let mut names = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let object = self.get(current);
            let governing = object
                .parent_policies
                .iter()
                .chain(
                    object
                        .business_terms
                        .iter()
                        .chain(&object.classifications)
                        .flat_map(|&linked| self.get(linked).parent_policies.iter()),
                );
            for &policy in governing {
                names.insert(self.get(policy).name.clone());
            }
            stack.extend(object.children.iter().copied());
        }

        names.into_iter().collect()
    }

    fn names(&self, ids: &[ObjectId]) -> Vec<String> {
        ids.iter().map(|&id| self.get(id).name.clone()).collect()
    }
}

fn push_unique(list: &mut Vec<ObjectId>, id: ObjectId) {
    if !list.contains(&id) {
        list.push(id);
    }
}
