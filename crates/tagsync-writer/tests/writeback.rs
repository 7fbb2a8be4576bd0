//! End-to-end statement generation and execution.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package tagsync-writer --test writeback
//! ```

mod common;

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::sales_graph;
use tagsync_config::WritebackConfig;
use tagsync_writer::{
    DryRunExecutor, StatementBuilder, TagWriter, WarehouseExecutor, WarehouseTarget,
};

const ASSET_URL: &str = "https://cdgc.dm-us.informaticacloud.com/asset";

#[test]
fn test_statements_for_sales_graph() {
    let sales = sales_graph();
    let plan = StatementBuilder::new(WritebackConfig::default(), ASSET_URL)
        .build(&sales.graph, &sales.objects);

    assert!(plan.unset.is_empty());
    assert_eq!(
        plan.set,
        vec![
            "ALTER TABLE main.sales.orders SET tags ( 'infa_policy' = 'GDPR' )",
            "COMMENT ON TABLE main.sales.orders is 'Customer orders'",
            "ALTER TABLE main.sales.orders ALTER Column email SET tags ( 'infa_business_term' = 'Customer' )",
            "ALTER TABLE main.sales.orders ALTER Column email SET tags ( 'infa_policy' = 'GDPR' )",
            "ALTER TABLE main.sales.orders ALTER Column email SET tags ( 'infa_classification' = 'PII' )",
            "alter table main.sales.orders alter column email comment 'Customer\\'s e-mail'",
            "ALTER VIEW main.sales.recent_orders SET tags ( 'infa_policy' = 'GDPR' )",
            "ALTER VIEW main.sales.recent_orders ALTER Column email SET tags ( 'infa_policy' = 'GDPR' )",
            "ALTER VIEW main.sales.recent_orders ALTER Column email SET tags ( 'infa_classification' = 'PII' )",
        ]
    );
}

#[test]
fn test_disabled_tag_kinds_are_not_written() {
    let sales = sales_graph();
    let config = WritebackConfig {
        business_terms: false,
        parent_policies: false,
        comments: false,
        ..Default::default()
    };
    let plan = StatementBuilder::new(config, ASSET_URL).build(&sales.graph, &sales.objects);

    assert_eq!(plan.set.len(), 2);
    assert!(plan.set.iter().all(|s| s.contains("infa_classification")));
}

#[tokio::test]
async fn test_unset_then_set_dry_run() {
    let sales = sales_graph();
    let config = WritebackConfig {
        unset_tags_first: true,
        comments: false,
        ..Default::default()
    };
    let plan = StatementBuilder::new(config, ASSET_URL).build(&sales.graph, &sales.objects);
    assert_eq!(plan.unset.len(), 5 * 3);

    let executor = DryRunExecutor::new();
    let report = TagWriter::new(&executor).apply(&plan).await.unwrap();

    let executed = executor.statements();
    assert_eq!(executed.len(), plan.len());
    let first_set = executed.iter().position(|s| s.contains(" SET tags")).unwrap();
    assert!(executed[..first_set].iter().all(|s| s.contains("UNSET tags")));
    assert_eq!(report.unset_executed, 15);
    assert_eq!(report.executed, plan.set.len());
}

#[tokio::test]
async fn test_warehouse_execution_records_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/2.0/sql/statements"))
        .and(body_partial_json(json!({"statement": "USE CATALOG main"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statement_id": "pre",
            "status": {"state": "SUCCEEDED"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/2.0/sql/statements"))
        .and(body_partial_json(json!({
            "statement": "COMMENT ON TABLE main.sales.orders is 'Customer orders'"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statement_id": "bad",
            "status": {"state": "FAILED", "error": {"message": "PERMISSION_DENIED"}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/2.0/sql/statements"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statement_id": "ok",
            "status": {"state": "SUCCEEDED"}
        })))
        .mount(&server)
        .await;

    let sales = sales_graph();
    let plan = StatementBuilder::new(WritebackConfig::default(), ASSET_URL)
        .build(&sales.graph, &sales.objects);

    let target = WarehouseTarget {
        hostname: "unused".into(),
        port: 443,
        http_path: "/sql/1.0/warehouses/wh-1".into(),
    };
    let executor = WarehouseExecutor::new(&target, "tok")
        .unwrap()
        .with_base_url(server.uri())
        .with_poll_interval(Duration::from_millis(10));

    let report = TagWriter::new(&executor)
        .with_pre_statements(vec!["USE CATALOG main".into()])
        .apply(&plan)
        .await
        .unwrap();

    assert_eq!(report.pre_statements, 1);
    assert_eq!(report.executed, plan.set.len() - 1);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].error.contains("PERMISSION_DENIED"));
}
