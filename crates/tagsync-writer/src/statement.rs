//! DDL statement construction.
//!
//! Tag statements:
//!
//! ```text
//! ALTER VIEW  p ALTER Column c SET tags ( 'tag' = 'v1,v2' )    -- view column
//! ALTER TABLE p ALTER Column c SET tags ( 'tag' = 'v1,v2' )    -- column
//! ALTER TABLE p.n SET tags ( 'tag' = 'v1,v2' )                 -- table
//! ALTER VIEW  p.n SET tags ( 'tag' = 'v1,v2' )                 -- view
//! ```
//!
//! Unset statements use `UNSET tags ( 'tag' )` in the same positions. Comments
//! use `alter table|view p alter column c comment '...'` for columns and
//! `COMMENT ON TABLE|VIEW p.n is '...'` for tables and views.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use tagsync_catalog::{CatalogGraph, ObjectId};
use tagsync_config::WritebackConfig;

use crate::path::{ObjectKind, ObjectPath};

static HTML_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^<]+?>").expect("HTML tag pattern is valid"));

/// Descriptions this short are not written as comments.
const MIN_DESCRIPTION_LEN: usize = 2;

/// Remove HTML tags and escape single quotes for a SQL string literal.
pub fn sanitize_literal(text: &str) -> String {
    HTML_TAG.replace_all(text, "").replace('\'', "\\'")
}

/// One object the builder can address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementTarget {
    pub kind: ObjectKind,
    pub parent: String,
    pub name: String,
}

impl StatementTarget {
    /// `ALTER <kind> <object> [ALTER Column <name>]`
    fn alter_prefix(&self) -> String {
        if self.kind.is_column() {
            format!(
                "ALTER {} {} ALTER Column {}",
                self.kind.keyword(),
                self.parent,
                self.name
            )
        } else {
            format!("ALTER {} {}.{}", self.kind.keyword(), self.parent, self.name)
        }
    }

    pub fn set_tag(&self, tag: &str, values: &[String]) -> String {
        format!(
            "{} SET tags ( '{}' = '{}' )",
            self.alter_prefix(),
            tag,
            values.join(",").replace('\'', "\\'")
        )
    }

    pub fn unset_tag(&self, tag: &str) -> String {
        format!("{} UNSET tags ( '{}' )", self.alter_prefix(), tag)
    }

    /// Comment statement; `description` must already be sanitized.
    pub fn comment(&self, description: &str) -> String {
        if self.kind.is_column() {
            format!(
                "alter {} {} alter column {} comment '{}'",
                self.kind.keyword().to_lowercase(),
                self.parent,
                self.name,
                description
            )
        } else {
            format!(
                "COMMENT ON {} {}.{} is '{}'",
                self.kind.keyword(),
                self.parent,
                self.name,
                description
            )
        }
    }
}

/// Statements generated for one resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatementPlan {
    /// Executed first when unsetting is enabled; failures are tolerated
    pub unset: Vec<String>,
    /// Tag and comment statements
    pub set: Vec<String>,
    /// Objects without a usable path or kind
    pub skipped: usize,
}

impl StatementPlan {
    pub fn is_empty(&self) -> bool {
        self.unset.is_empty() && self.set.is_empty()
    }

    pub fn len(&self) -> usize {
        self.unset.len() + self.set.len()
    }
}

/// Builds tag and comment statements from a catalog graph.
#[derive(Debug, Clone)]
pub struct StatementBuilder {
    config: WritebackConfig,
    asset_url: String,
}

impl StatementBuilder {
    pub fn new(config: WritebackConfig, asset_url: impl Into<String>) -> Self {
        Self {
            config,
            asset_url: asset_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build statements for `objects`, in order.
    pub fn build(&self, graph: &CatalogGraph, objects: &[ObjectId]) -> StatementPlan {
        let mut plan = StatementPlan::default();
        let unset_tags = if self.config.unset_tags_first {
            self.config.managed_tags()
        } else {
            Vec::new()
        };

        for &id in objects {
            let object = graph.get(id);
            let Some(kind) = ObjectKind::from_short_type(object.short_type()) else {
                continue;
            };
            let Some(path) = ObjectPath::from_external_id(&object.external_id) else {
                debug!("No warehouse path for {}, skipping", object.external_id);
                plan.skipped += 1;
                continue;
            };
            let target = StatementTarget {
                kind,
                parent: path.parent,
                name: object.name.clone(),
            };
            debug!("Evaluating: {} {}.{}", kind, target.parent, target.name);

            for tag in &unset_tags {
                plan.unset.push(target.unset_tag(tag));
            }

            let tags = [
                (
                    self.config.business_terms,
                    &self.config.business_term_tag,
                    graph.business_term_names(id),
                ),
                (
                    self.config.parent_policies,
                    &self.config.parent_policy_tag,
                    graph.related_policy_names(id),
                ),
                (
                    self.config.classifications,
                    &self.config.classification_tag,
                    graph.classification_names(id),
                ),
            ];
            for (enabled, tag, values) in tags {
                if enabled && !values.is_empty() {
                    let statement = target.set_tag(tag, &values);
                    info!("Adding {}", statement);
                    plan.set.push(statement);
                }
            }

            let comment = self
                .config
                .comments
                .then(|| self.comment(&target, &object.identity, &object.description))
                .flatten();
            if let Some(statement) = comment {
                info!("Adding {}", statement);
                plan.set.push(statement);
            }
        }

        debug!(
            "{} unset and {} set statements, {} objects skipped",
            plan.unset.len(),
            plan.set.len(),
            plan.skipped
        );
        plan
    }

    fn comment(&self, target: &StatementTarget, identity: &str, description: &str) -> Option<String> {
        let described = description.chars().count() > MIN_DESCRIPTION_LEN;
        if target.kind.is_column() {
            return described.then(|| target.comment(&sanitize_literal(description)));
        }

        let linked = self.config.include_url_in_table_comment;
        if !described && !linked {
            return None;
        }
        let mut text = sanitize_literal(description);
        if linked {
            text = format!(
                "{}   ([{}]({}/{}))",
                text, self.config.url_text, self.asset_url, identity
            );
        }
        Some(target.comment(&text))
    }
}
