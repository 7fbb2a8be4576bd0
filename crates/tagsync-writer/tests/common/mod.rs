//! Common test utilities for writer integration tests.

#![allow(dead_code)]

use tagsync_catalog::{CatalogGraph, CatalogObject, ObjectId};

pub const RELATIONAL: &str = "com.infa.odin.models.relational";

/// A relational object under `o1://`.
pub fn object(identity: &str, name: &str, short_type: &str, path: &str) -> CatalogObject {
    CatalogObject {
        identity: identity.into(),
        name: name.into(),
        origin: "o1".into(),
        external_id: format!("o1://{path}~{identity}"),
        class_type: format!("{RELATIONAL}.{short_type}"),
        element_type: "OBJECT".into(),
        ..Default::default()
    }
}

/// A governance object with no warehouse path.
pub fn governance(identity: &str, name: &str, class_type: &str) -> CatalogObject {
    CatalogObject {
        identity: identity.into(),
        name: name.into(),
        class_type: class_type.into(),
        element_type: "OBJECT".into(),
        ..Default::default()
    }
}

/// Orders table with two columns and a view column, governed by one
/// policy through a classification and a business term.
pub struct SalesGraph {
    pub graph: CatalogGraph,
    pub objects: Vec<ObjectId>,
}

pub fn sales_graph() -> SalesGraph {
    let mut graph = CatalogGraph::new();

    let gdpr = graph.insert(governance("pol-1", "GDPR", "governance.Policy"));
    let pii = graph.insert(governance("cls-1", "PII", "core.DataElementClassification"));
    let customer = graph.insert(governance("bt-1", "Customer", "governance.BusinessTerm"));
    graph.set_parent_policies(pii, vec![gdpr]);

    let mut orders = object("t1", "orders", "Table", "main/sales/orders");
    orders.description = "<p>Customer <b>orders</b></p>".into();
    let orders = graph.insert(orders);

    let mut email = object("c1", "email", "Column", "main/sales/orders/email");
    email.description = "Customer's e-mail".into();
    let email = graph.insert(email);
    let amount = graph.insert(object("c2", "amount", "Column", "main/sales/orders/amount"));

    let recent = graph.insert(object("v1", "recent_orders", "View", "main/sales/recent_orders"));
    let recent_email = graph.insert(object(
        "vc1",
        "email",
        "ViewColumn",
        "main/sales/recent_orders/email",
    ));

    graph.link_parent_child(orders, email);
    graph.link_parent_child(orders, amount);
    graph.link_parent_child(recent, recent_email);
    graph.add_classification(email, pii);
    graph.add_business_term(email, customer);
    graph.add_classification(recent_email, pii);

    SalesGraph {
        graph,
        objects: vec![orders, email, amount, recent, recent_email],
    }
}
