use crate::context::QueryContext;
use crate::error::QueryResult;
use crate::scope::Document;
use async_trait::async_trait;
use sea_query::SelectStatement;
use std::fmt;
use std::sync::Arc;

/// Relational storage handle
///
/// Receives fully built statements; rendering them to a dialect is the
/// store's job.
#[async_trait]
pub trait RelationalStore<R>: Send + Sync {
    /// Table the entity lives in
    fn table(&self) -> &str;

    async fn fetch(&self, ctx: &QueryContext, statement: SelectStatement) -> QueryResult<Vec<R>>;

    async fn count(&self, ctx: &QueryContext, statement: SelectStatement) -> QueryResult<u64>;
}

/// Options for a document `find`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

/// Document collection handle, already bound to one collection
#[async_trait]
pub trait DocumentStore<R>: Send + Sync {
    async fn find(
        &self,
        ctx: &QueryContext,
        filter: &Document,
        options: FindOptions,
    ) -> QueryResult<Vec<R>>;

    async fn count_documents(&self, ctx: &QueryContext, filter: &Document) -> QueryResult<u64>;
}

/// The storage handle a query runs against
pub enum Backend<R> {
    Relational(Arc<dyn RelationalStore<R>>),
    Document(Arc<dyn DocumentStore<R>>),
}

impl<R> Clone for Backend<R> {
    fn clone(&self) -> Self {
        match self {
            Self::Relational(store) => Self::Relational(Arc::clone(store)),
            Self::Document(store) => Self::Document(Arc::clone(store)),
        }
    }
}

impl<R> fmt::Debug for Backend<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

impl<R> Backend<R> {
    pub fn relational(store: impl RelationalStore<R> + 'static) -> Self {
        Self::Relational(Arc::new(store))
    }

    pub fn document(store: impl DocumentStore<R> + 'static) -> Self {
        Self::Document(Arc::new(store))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Relational(_) => "relational",
            Self::Document(_) => "document",
        }
    }

    pub fn as_relational(&self) -> Option<&Arc<dyn RelationalStore<R>>> {
        match self {
            Self::Relational(store) => Some(store),
            Self::Document(_) => None,
        }
    }

    pub fn as_document(&self) -> Option<&Arc<dyn DocumentStore<R>>> {
        match self {
            Self::Document(store) => Some(store),
            Self::Relational(_) => None,
        }
    }
}
