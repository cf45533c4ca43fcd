use crate::error::{QueryError, QueryResult};
use sea_query::SelectStatement;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Modifier applied to a relational `SELECT` statement
#[derive(Clone)]
pub struct RelationalScope(Arc<dyn Fn(&mut SelectStatement) + Send + Sync>);

impl RelationalScope {
    pub fn new(scope: impl Fn(&mut SelectStatement) + Send + Sync + 'static) -> Self {
        Self(Arc::new(scope))
    }

    /// Scope that leaves the statement untouched
    pub fn identity() -> Self {
        Self::new(|_| {})
    }

    pub fn apply(&self, statement: &mut SelectStatement) {
        (self.0)(statement);
    }
}

impl fmt::Debug for RelationalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RelationalScope(..)")
    }
}

/// Document-store filter or sort expression
///
/// `Map` has no key order; `Ordered` keeps insertion order, which matters
/// for multi-key sorts.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Map(Map<String, Value>),
    Ordered(Vec<(String, Value)>),
}

impl Default for Document {
    fn default() -> Self {
        Self::Map(Map::new())
    }
}

impl Document {
    /// Build an ordered document from key/value pairs
    pub fn ordered<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Ordered(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a map document from a JSON object
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a JSON object
    pub fn from_json(value: Value) -> QueryResult<Self> {
        match value {
            Value::Object(map) => Ok(Self::Map(map)),
            other => Err(QueryError::InvalidScope(format!(
                "document must be a JSON object, got {other}"
            ))),
        }
    }

    /// Iterate entries in document order
    pub fn entries(&self) -> Box<dyn Iterator<Item = (&str, &Value)> + '_> {
        match self {
            Self::Map(map) => Box::new(map.iter().map(|(k, v)| (k.as_str(), v))),
            Self::Ordered(pairs) => Box::new(pairs.iter().map(|(k, v)| (k.as_str(), v))),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Map(map) => map.is_empty(),
            Self::Ordered(pairs) => pairs.is_empty(),
        }
    }
}

/// Filter value produced by a service
#[derive(Debug, Clone)]
pub enum Filter {
    Relational(RelationalScope),
    Document(Document),
}

/// Sort value produced by a service
#[derive(Debug, Clone)]
pub enum Sort {
    Relational(RelationalScope),
    Document(Document),
}

impl Filter {
    pub fn relational(scope: impl Fn(&mut SelectStatement) + Send + Sync + 'static) -> Self {
        Self::Relational(RelationalScope::new(scope))
    }

    /// # Errors
    ///
    /// Returns `InvalidScope` if the filter targets the document backend
    pub fn into_relational(self) -> QueryResult<RelationalScope> {
        match self {
            Self::Relational(scope) => Ok(scope),
            Self::Document(_) => Err(QueryError::InvalidScope(
                "relational strategy received a document filter".to_string(),
            )),
        }
    }

    /// # Errors
    ///
    /// Returns `InvalidScope` if the filter targets the relational backend
    pub fn into_document(self) -> QueryResult<Document> {
        match self {
            Self::Document(doc) => Ok(doc),
            Self::Relational(_) => Err(QueryError::InvalidScope(
                "document strategy received a relational filter".to_string(),
            )),
        }
    }
}

impl Sort {
    pub fn relational(scope: impl Fn(&mut SelectStatement) + Send + Sync + 'static) -> Self {
        Self::Relational(RelationalScope::new(scope))
    }

    /// # Errors
    ///
    /// Returns `InvalidScope` if the sort targets the document backend
    pub fn into_relational(self) -> QueryResult<RelationalScope> {
        match self {
            Self::Relational(scope) => Ok(scope),
            Self::Document(_) => Err(QueryError::InvalidScope(
                "relational strategy received a document sort".to_string(),
            )),
        }
    }

    /// # Errors
    ///
    /// Returns `InvalidScope` if the sort targets the relational backend
    pub fn into_document(self) -> QueryResult<Document> {
        match self {
            Self::Document(doc) => Ok(doc),
            Self::Relational(_) => Err(QueryError::InvalidScope(
                "document strategy received a relational sort".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::{Alias, Asterisk, Query, SqliteQueryBuilder};
    use serde_json::json;

    #[test]
    fn test_relational_scope_applies() {
        let scope = RelationalScope::new(|q| {
            q.limit(3);
        });
        let mut stmt = Query::select();
        stmt.column(Asterisk).from(Alias::new("people"));
        scope.apply(&mut stmt);

        assert_eq!(
            stmt.to_string(SqliteQueryBuilder),
            r#"SELECT * FROM "people" LIMIT 3"#
        );
    }

    #[test]
    fn test_variant_mismatch_is_invalid_scope() {
        let filter = Filter::Document(Document::default());
        assert!(matches!(
            filter.into_relational(),
            Err(QueryError::InvalidScope(_))
        ));

        let sort = Sort::relational(|_| {});
        assert!(matches!(sort.into_document(), Err(QueryError::InvalidScope(_))));
    }

    #[test]
    fn test_ordered_document_keeps_order() {
        let doc = Document::ordered([("age", json!(-1)), ("id", json!(1))]);
        let keys: Vec<&str> = doc.entries().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["age", "id"]);
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(Document::from_json(json!({"name": "Alice"})).is_ok());
        assert!(Document::from_json(json!([1, 2])).is_err());
    }
}
