use crate::builder::{Page, QueryBuilder};
use crate::context::QueryContext;
use crate::error::QueryResult;
use crate::middleware::Middleware;
use crate::options::{load_query_options, QueryOption};
use crate::scope::{Filter, Sort};
use crate::strategy::Strategy;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Translates typed filter and sort inputs into backend scopes
///
/// Each method is called exactly once per query.
pub trait Service<F, S>: Send + Sync {
    /// # Errors
    ///
    /// An error aborts the query before any storage access
    fn filter(&self, ctx: &QueryContext, filter: Option<&F>) -> anyhow::Result<Filter>;

    fn sort(&self, sort: Option<&S>) -> Sort;
}

pub struct List<R, F, S> {
    strategy: Option<Arc<dyn Strategy<R>>>,
    middlewares: Vec<Arc<dyn Middleware<R>>>,
    _inputs: PhantomData<fn() -> (F, S)>,
}

impl<R, F, S> Default for List<R, F, S> {
    fn default() -> Self {
        Self {
            strategy: None,
            middlewares: Vec::new(),
            _inputs: PhantomData,
        }
    }
}

impl<R, F, S> List<R, F, S>
where
    R: Send + 'static,
    F: Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this strategy for every query instead of inferring one
    pub fn set_strategy(mut self, strategy: Arc<dyn Strategy<R>>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn use_middleware(mut self, middleware: Arc<dyn Middleware<R>>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Run one list query
    ///
    /// The options are loaded over the defaults; their typed filter and
    /// sort are handed to `service` when the strategy asks for scopes.
    ///
    /// # Errors
    ///
    /// Whatever [`QueryBuilder::query_list`] returns
    pub async fn query<T>(
        &self,
        ctx: &QueryContext,
        service: Arc<T>,
        options: impl IntoIterator<Item = QueryOption<R, F, S>>,
    ) -> QueryResult<Page<R>>
    where
        T: Service<F, S> + 'static,
    {
        let mut options = load_query_options(options);
        let filter = options.filter.take();
        let sort = options.sort.take();

        let mut builder = QueryBuilder::from_options(&options);
        if let Some(strategy) = &self.strategy {
            builder = builder.set_strategy(Arc::clone(strategy));
        }
        for middleware in &self.middlewares {
            builder = builder.use_middleware(Arc::clone(middleware));
        }
        debug!(
            "Query {} built with {} middleware",
            ctx.id(),
            builder.middleware_count()
        );

        let filter_service = Arc::clone(&service);
        let builder = builder
            .set_filter(move |ctx| filter_service.filter(ctx, filter.as_ref()))
            .set_sort(move || service.sort(sort.as_ref()));

        builder.query_list(ctx).await
    }
}
