use crate::backend::Backend;
use crate::context::QueryContext;
use crate::error::{QueryError, QueryResult};
use crate::executor::PanicPolicy;
use crate::middleware::{Middleware, Next};
use crate::options::{
    QueryOptions, DEFAULT_LIMIT, DEFAULT_NEED_PAGINATION, DEFAULT_NEED_TOTAL, DEFAULT_START,
};
use crate::scope::{Filter, Sort};
use crate::strategy::{DocumentStrategy, RelationalStrategy, Strategy};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

type FilterProducer = Arc<dyn Fn(&QueryContext) -> anyhow::Result<Filter> + Send + Sync>;
type SortProducer = Arc<dyn Fn() -> Sort + Send + Sync>;

/// One page of results plus the total match count
///
/// `total` is zero when the total was not requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<R> {
    pub items: Vec<R>,
    pub total: u64,
}

impl<R> Default for Page<R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<R> Page<R> {
    pub fn new(items: Vec<R>, total: u64) -> Self {
        Self { items, total }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

}

/// Everything one list query needs; never mutated while the query runs
pub struct QueryBuilder<R> {
    backend: Option<Backend<R>>,
    start: u32,
    limit: u32,
    need_total: bool,
    need_pagination: bool,
    panic_policy: PanicPolicy,
    strategy: Option<Arc<dyn Strategy<R>>>,
    middlewares: Vec<Arc<dyn Middleware<R>>>,
    filter: Option<FilterProducer>,
    sort: Option<SortProducer>,
}

impl<R> Default for QueryBuilder<R> {
    fn default() -> Self {
        Self {
            backend: None,
            start: DEFAULT_START,
            limit: DEFAULT_LIMIT,
            need_total: DEFAULT_NEED_TOTAL,
            need_pagination: DEFAULT_NEED_PAGINATION,
            panic_policy: PanicPolicy::default(),
            strategy: None,
            middlewares: Vec::new(),
            filter: None,
            sort: None,
        }
    }
}

impl<R> QueryBuilder<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the descriptor from a configuration snapshot
    pub fn from_options<F, S>(options: &QueryOptions<R, F, S>) -> Self {
        Self {
            backend: options.backend().cloned(),
            start: options.start(),
            limit: options.limit(),
            need_total: options.need_total(),
            need_pagination: options.need_pagination(),
            panic_policy: options.panic_policy(),
            ..Self::default()
        }
    }

    pub fn with_backend(mut self, backend: Backend<R>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_start(mut self, start: u32) -> Self {
        self.start = start;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_need_total(mut self, need_total: bool) -> Self {
        self.need_total = need_total;
        self
    }

    pub fn with_need_pagination(mut self, need_pagination: bool) -> Self {
        self.need_pagination = need_pagination;
        self
    }

    pub fn with_panic_policy(mut self, policy: PanicPolicy) -> Self {
        self.panic_policy = policy;
        self
    }

    /// Install the filter producer, replacing any previous one
    pub fn set_filter<P>(mut self, producer: P) -> Self
    where
        P: Fn(&QueryContext) -> anyhow::Result<Filter> + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(producer));
        self
    }

    /// Install the sort producer, replacing any previous one
    pub fn set_sort<P>(mut self, producer: P) -> Self
    where
        P: Fn() -> Sort + Send + Sync + 'static,
    {
        self.sort = Some(Arc::new(producer));
        self
    }

    /// Pin a strategy instead of inferring one from the backend
    pub fn set_strategy(mut self, strategy: Arc<dyn Strategy<R>>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Append a middleware; the first one added is the outermost
    pub fn use_middleware(mut self, middleware: Arc<dyn Middleware<R>>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn backend(&self) -> Option<&Backend<R>> {
        self.backend.as_ref()
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    /// The configured limit, before normalization
    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn need_total(&self) -> bool {
        self.need_total
    }

    pub fn need_pagination(&self) -> bool {
        self.need_pagination
    }

    pub fn panic_policy(&self) -> PanicPolicy {
        self.panic_policy
    }

    pub fn middleware_count(&self) -> usize {
        self.middlewares.len()
    }

    /// Offset and page size to apply, or `None` when pagination is off
    ///
    /// A limit below 1 is replaced by [`DEFAULT_LIMIT`].
    #[must_use]
    pub fn window(&self) -> Option<(u64, u64)> {
        if !self.need_pagination {
            return None;
        }
        let limit = if self.limit < 1 {
            DEFAULT_LIMIT
        } else {
            self.limit
        };
        Some((u64::from(self.start), u64::from(limit)))
    }

    /// Run the filter producer
    ///
    /// # Errors
    ///
    /// `Filter` if the producer fails, `Configuration` if none is installed
    pub fn produce_filter(&self, ctx: &QueryContext) -> QueryResult<Filter> {
        let producer = self
            .filter
            .as_ref()
            .ok_or_else(|| QueryError::Configuration("no filter producer set".to_string()))?;
        producer(ctx).map_err(QueryError::Filter)
    }

    /// Run the sort producer
    ///
    /// # Errors
    ///
    /// `Configuration` if none is installed
    pub fn produce_sort(&self) -> QueryResult<Sort> {
        let producer = self
            .sort
            .as_ref()
            .ok_or_else(|| QueryError::Configuration("no sort producer set".to_string()))?;
        Ok(producer())
    }
}

impl<R: Send + 'static> QueryBuilder<R> {
    /// Explicit strategy if set, otherwise one matching the backend
    fn resolve_strategy(&self) -> QueryResult<Arc<dyn Strategy<R>>> {
        if let Some(strategy) = &self.strategy {
            return Ok(Arc::clone(strategy));
        }

        match &self.backend {
            Some(Backend::Relational(_)) => {
                debug!("Inferred relational strategy");
                Ok(Arc::new(RelationalStrategy::new()))
            }
            Some(Backend::Document(_)) => {
                debug!("Inferred document strategy");
                Ok(Arc::new(DocumentStrategy::new()))
            }
            None => Err(QueryError::Configuration(
                "no resolvable backend".to_string(),
            )),
        }
    }

    /// Execute the query through the middleware chain
    ///
    /// # Errors
    ///
    /// `Configuration` if no strategy can be resolved; otherwise whatever the
    /// outermost middleware (or the strategy) returns
    pub async fn query_list(&self, ctx: &QueryContext) -> QueryResult<Page<R>> {
        let strategy = self.resolve_strategy()?;
        Next::new(self, strategy.as_ref(), &self.middlewares)
            .run(ctx)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Document;

    #[test]
    fn test_window_normalizes_limit() {
        let builder: QueryBuilder<()> = QueryBuilder::new().with_start(30).with_limit(0);

        assert_eq!(builder.limit(), 0);
        assert_eq!(builder.window(), Some((30, 10)));
    }

    #[test]
    fn test_window_off_without_pagination() {
        let builder: QueryBuilder<()> = QueryBuilder::new()
            .with_limit(5)
            .with_need_pagination(false);

        assert_eq!(builder.window(), None);
    }

    #[test]
    fn test_setters_overwrite() {
        let builder: QueryBuilder<()> = QueryBuilder::new()
            .set_filter(|_| Err(anyhow::anyhow!("first")))
            .set_filter(|_| Ok(Filter::Document(Document::default())));

        let filter = builder.produce_filter(&QueryContext::new()).unwrap();
        assert!(matches!(filter, Filter::Document(_)));
    }

    #[test]
    fn test_filter_error_is_wrapped() {
        let builder: QueryBuilder<()> =
            QueryBuilder::new().set_filter(|_| Err(anyhow::anyhow!("unknown status")));

        let err = builder.produce_filter(&QueryContext::new()).unwrap_err();
        assert!(matches!(err, QueryError::Filter(_)));
    }

    #[test]
    fn test_missing_producers() {
        let builder: QueryBuilder<()> = QueryBuilder::new();

        assert!(matches!(
            builder.produce_filter(&QueryContext::new()),
            Err(QueryError::Configuration(_))
        ));
        assert!(matches!(
            builder.produce_sort(),
            Err(QueryError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_no_backend_no_strategy() {
        let builder: QueryBuilder<()> = QueryBuilder::new();

        let err = builder.query_list(&QueryContext::new()).await.unwrap_err();
        assert!(matches!(err, QueryError::Configuration(ref m) if m == "no resolvable backend"));
    }
}
