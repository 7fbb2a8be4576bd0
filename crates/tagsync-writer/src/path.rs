//! Warehouse paths and object kinds derived from catalog objects.

use std::fmt;

/// Kind of warehouse object a catalog object maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    ViewColumn,
    Column,
    Table,
    View,
}

impl ObjectKind {
    /// Classify by short type suffix. `ViewColumn` is checked before `Column`
    /// and `Table` before `View`.
    pub fn from_short_type(short_type: &str) -> Option<Self> {
        if short_type.ends_with("ViewColumn") {
            Some(Self::ViewColumn)
        } else if short_type.ends_with("Column") {
            Some(Self::Column)
        } else if short_type.ends_with("Table") {
            Some(Self::Table)
        } else if short_type.ends_with("View") {
            Some(Self::View)
        } else {
            None
        }
    }

    pub fn is_column(self) -> bool {
        matches!(self, Self::ViewColumn | Self::Column)
    }

    /// DDL keyword of the object (or of the column's container).
    pub fn keyword(self) -> &'static str {
        match self {
            Self::ViewColumn | Self::View => "VIEW",
            Self::Column | Self::Table => "TABLE",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ViewColumn => "ViewColumn",
            Self::Column => "Column",
            Self::Table => "Table",
            Self::View => "View",
        };
        f.write_str(name)
    }
}

/// Dotted warehouse path of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPath {
    /// Full path, e.g. `main.sales.orders.id`
    pub path: String,
    /// Path of the container, e.g. `main.sales.orders`
    pub parent: String,
}

impl ObjectPath {
    /// Derive the path from an external id like
    /// `origin://main/sales/orders/id~column-hash`.
    ///
    /// Everything after `~` is ignored; the scheme segment and the empty
    /// segment after `//` are dropped. Returns `None` when nothing is left.
    pub fn from_external_id(external_id: &str) -> Option<Self> {
        let friendly = external_id.split('~').next().unwrap_or_default();
        let segments: Vec<&str> = friendly.split('/').skip(2).collect();
        let (_, parents) = segments.split_last()?;

        Some(Self {
            path: segments.join("."),
            parent: parents.join("."),
        })
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_path_from_external_id() {
        let path =
            ObjectPath::from_external_id("a1b2://main/sales/orders/customer_id~c0ffee").unwrap();
        assert_eq!(path.path, "main.sales.orders.customer_id");
        assert_eq!(path.parent, "main.sales.orders");
    }

    #[test]
    fn test_path_without_suffix() {
        let path = ObjectPath::from_external_id("a1b2://main/sales").unwrap();
        assert_eq!(path.path, "main.sales");
        assert_eq!(path.parent, "main");
    }

    #[test]
    fn test_path_too_short() {
        assert!(ObjectPath::from_external_id("a1b2:/").is_none());
        assert!(ObjectPath::from_external_id("").is_none());
    }

    #[test]
    fn test_kind_precedence() {
        assert_eq!(ObjectKind::from_short_type("ViewColumn"), Some(ObjectKind::ViewColumn));
        assert_eq!(ObjectKind::from_short_type("Column"), Some(ObjectKind::Column));
        assert_eq!(ObjectKind::from_short_type("ExternalTable"), Some(ObjectKind::Table));
        assert_eq!(ObjectKind::from_short_type("MaterializedView"), Some(ObjectKind::View));
        assert_eq!(ObjectKind::from_short_type("Schema"), None);
    }

    #[test]
    fn test_keyword() {
        assert_eq!(ObjectKind::ViewColumn.keyword(), "VIEW");
        assert_eq!(ObjectKind::Column.keyword(), "TABLE");
        assert!(ObjectKind::Column.is_column());
        assert!(!ObjectKind::View.is_column());
    }
}
