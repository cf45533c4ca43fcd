//! Interceptors around strategy execution.
//!
//! Middleware run in onion order: the first one registered sees the query
//! first on the way in and last on the way out. Each receives a [`Next`]
//! continuation for the rest of the chain, which ends in the strategy call.

use crate::builder::{Page, QueryBuilder};
use crate::context::QueryContext;
use crate::error::{QueryError, QueryResult};
use crate::strategy::Strategy;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[async_trait]
pub trait Middleware<R>: Send + Sync {
    /// Handle the query; call `next.run(ctx)` to continue down the chain
    async fn handle(
        &self,
        ctx: &QueryContext,
        builder: &QueryBuilder<R>,
        next: Next<'_, R>,
    ) -> QueryResult<Page<R>>;
}

/// The rest of the chain, terminating in the strategy call
///
/// Consumed by [`Next::run`], so the chain runs at most once per query.
pub struct Next<'a, R> {
    builder: &'a QueryBuilder<R>,
    strategy: &'a dyn Strategy<R>,
    chain: &'a [Arc<dyn Middleware<R>>],
}

impl<'a, R: Send + 'static> Next<'a, R> {
    pub(crate) fn new(
        builder: &'a QueryBuilder<R>,
        strategy: &'a dyn Strategy<R>,
        chain: &'a [Arc<dyn Middleware<R>>],
    ) -> Self {
        Self {
            builder,
            strategy,
            chain,
        }
    }

    /// Number of middleware still ahead of the strategy
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }

    pub async fn run(self, ctx: &QueryContext) -> QueryResult<Page<R>> {
        match self.chain.split_first() {
            Some((current, rest)) => {
                let next = Next {
                    builder: self.builder,
                    strategy: self.strategy,
                    chain: rest,
                };
                current.handle(ctx, self.builder, next).await
            }
            None => self.strategy.query_list(ctx, self.builder).await,
        }
    }
}

/// Logs how long the rest of the chain took
#[derive(Debug, Clone, Copy, Default)]
pub struct Timing;

#[async_trait]
impl<R: Send + 'static> Middleware<R> for Timing {
    async fn handle(
        &self,
        ctx: &QueryContext,
        _builder: &QueryBuilder<R>,
        next: Next<'_, R>,
    ) -> QueryResult<Page<R>> {
        let started = Instant::now();
        let result = next.run(ctx).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(page) => info!(
                "Query {} finished in {:?}: {} items, total {}",
                ctx.id(),
                elapsed,
                page.len(),
                page.total
            ),
            Err(e) => info!("Query {} failed after {:?}: {e}", ctx.id(), elapsed),
        }

        result
    }
}

/// Bounds the rest of the chain by a deadline
///
/// The inner chain sees a child context that is cancelled when the deadline
/// passes, so stores watching the context stop early.
#[derive(Debug, Clone, Copy)]
pub struct Timeout {
    duration: Duration,
}

impl Timeout {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl<R: Send + 'static> Middleware<R> for Timeout {
    async fn handle(
        &self,
        ctx: &QueryContext,
        _builder: &QueryBuilder<R>,
        next: Next<'_, R>,
    ) -> QueryResult<Page<R>> {
        let scoped = ctx.child();
        match tokio::time::timeout(self.duration, next.run(&scoped)).await {
            Ok(result) => result,
            Err(_) => {
                scoped.cancel();
                warn!("Query {} exceeded {:?}", ctx.id(), self.duration);
                Err(QueryError::Timeout(self.duration))
            }
        }
    }
}

/// Rejects queries whose context lacks a value, e.g. a tenant or user id
#[derive(Debug, Clone)]
pub struct RequireContext {
    key: String,
}

impl RequireContext {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[async_trait]
impl<R: Send + 'static> Middleware<R> for RequireContext {
    async fn handle(
        &self,
        ctx: &QueryContext,
        _builder: &QueryBuilder<R>,
        next: Next<'_, R>,
    ) -> QueryResult<Page<R>> {
        if ctx.value(&self.key).is_none() {
            warn!("Query {} rejected: missing '{}'", ctx.id(), self.key);
            return Err(QueryError::Rejected(format!(
                "missing context value '{}'",
                self.key
            )));
        }
        next.run(ctx).await
    }
}
