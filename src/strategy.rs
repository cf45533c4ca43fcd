use crate::backend::{FindOptions, RelationalStore};
use crate::builder::{Page, QueryBuilder};
use crate::context::QueryContext;
use crate::error::{QueryError, QueryResult};
use crate::executor::join_pair;
use crate::scope::RelationalScope;
use async_trait::async_trait;
use sea_query::{Alias, Asterisk, Expr, Func, Query, SelectStatement};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait Strategy<R>: Send + Sync {
    async fn query_list(
        &self,
        ctx: &QueryContext,
        builder: &QueryBuilder<R>,
    ) -> QueryResult<Page<R>>;
}

/// Strategy for [`Backend::Relational`](crate::backend::Backend::Relational) handles
pub struct RelationalStrategy<R> {
    _entity: PhantomData<fn() -> R>,
}

impl<R> Default for RelationalStrategy<R> {
    fn default() -> Self {
        Self {
            _entity: PhantomData,
        }
    }
}

impl<R> RelationalStrategy<R> {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Build the page and count statements for a table
///
/// The page statement gets the filter, the sort and the window; the count
/// statement only the filter.
fn relational_statements(
    table: &str,
    filter: &RelationalScope,
    sort: &RelationalScope,
    window: Option<(u64, u64)>,
) -> (SelectStatement, SelectStatement) {
    let mut page = Query::select();
    page.column(Asterisk).from(Alias::new(table));
    filter.apply(&mut page);
    sort.apply(&mut page);
    if let Some((offset, limit)) = window {
        page.offset(offset).limit(limit);
    }

    let mut count = Query::select();
    count
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Alias::new(table));
    filter.apply(&mut count);

    (page, count)
}

#[async_trait]
impl<R: Send + 'static> Strategy<R> for RelationalStrategy<R> {
    async fn query_list(
        &self,
        ctx: &QueryContext,
        builder: &QueryBuilder<R>,
    ) -> QueryResult<Page<R>> {
        let store: Arc<dyn RelationalStore<R>> = builder
            .backend()
            .and_then(|b| b.as_relational())
            .cloned()
            .ok_or_else(|| {
                QueryError::Configuration(
                    "relational strategy needs a relational backend".to_string(),
                )
            })?;

        let filter = builder.produce_filter(ctx)?;
        let sort = builder.produce_sort()?;
        let filter = filter.into_relational()?;
        let sort = sort.into_relational()?;

        let (page_stmt, count_stmt) =
            relational_statements(store.table(), &filter, &sort, builder.window());
        debug!(
            "Query {} on table {} (window {:?}, total {})",
            ctx.id(),
            store.table(),
            builder.window(),
            builder.need_total()
        );

        let fetch = {
            let store = Arc::clone(&store);
            let ctx = ctx.clone();
            async move { store.fetch(&ctx, page_stmt).await }
        };
        let need_total = builder.need_total();
        let count = {
            let ctx = ctx.clone();
            async move {
                if need_total {
                    store.count(&ctx, count_stmt).await
                } else {
                    Ok(0)
                }
            }
        };

        let (items, total) = join_pair(fetch, count, builder.panic_policy()).await?;
        Ok(Page::new(items, total))
    }
}

/// Strategy for [`Backend::Document`](crate::backend::Backend::Document) handles
pub struct DocumentStrategy<R> {
    _entity: PhantomData<fn() -> R>,
}

impl<R> Default for DocumentStrategy<R> {
    fn default() -> Self {
        Self {
            _entity: PhantomData,
        }
    }
}

impl<R> DocumentStrategy<R> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<R: Send + 'static> Strategy<R> for DocumentStrategy<R> {
    async fn query_list(
        &self,
        ctx: &QueryContext,
        builder: &QueryBuilder<R>,
    ) -> QueryResult<Page<R>> {
        let store = builder
            .backend()
            .and_then(|b| b.as_document())
            .cloned()
            .ok_or_else(|| {
                QueryError::Configuration(
                    "document strategy needs a document backend".to_string(),
                )
            })?;

        let filter = builder.produce_filter(ctx)?;
        let sort = builder.produce_sort()?;
        let filter = filter.into_document()?;
        let sort = sort.into_document()?;

        let mut options = FindOptions {
            sort: Some(sort),
            ..FindOptions::default()
        };
        if let Some((skip, limit)) = builder.window() {
            options.skip = Some(skip);
            options.limit = Some(limit);
        }
        debug!("Query {} on document store ({:?})", ctx.id(), options);

        let fetch = {
            let store = Arc::clone(&store);
            let ctx = ctx.clone();
            let filter = filter.clone();
            async move { store.find(&ctx, &filter, options).await }
        };
        let need_total = builder.need_total();
        let count = {
            let ctx = ctx.clone();
            async move {
                if need_total {
                    store.count_documents(&ctx, &filter).await
                } else {
                    Ok(0)
                }
            }
        };

        let (items, total) = join_pair(fetch, count, builder.panic_policy()).await?;
        Ok(Page::new(items, total))
    }
}
