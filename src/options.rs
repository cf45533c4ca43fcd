use crate::backend::Backend;
use crate::executor::PanicPolicy;

/// Default offset
pub const DEFAULT_START: u32 = 0;
/// Default page size, also used when a limit below 1 reaches a strategy
pub const DEFAULT_LIMIT: u32 = 10;
/// Total count is queried unless turned off
pub const DEFAULT_NEED_TOTAL: bool = true;
/// Pagination is applied unless turned off
pub const DEFAULT_NEED_PAGINATION: bool = true;

/// Immutable query configuration snapshot
///
/// `F` and `S` are the service's typed filter and sort inputs; they are
/// handed back to the service when the query runs.
pub struct QueryOptions<R, F, S> {
    pub(crate) backend: Option<Backend<R>>,
    pub(crate) filter: Option<F>,
    pub(crate) sort: Option<S>,
    pub(crate) start: u32,
    pub(crate) limit: u32,
    pub(crate) need_total: bool,
    pub(crate) need_pagination: bool,
    pub(crate) panic_policy: PanicPolicy,
}

impl<R, F, S> Default for QueryOptions<R, F, S> {
    fn default() -> Self {
        Self {
            backend: None,
            filter: None,
            sort: None,
            start: DEFAULT_START,
            limit: DEFAULT_LIMIT,
            need_total: DEFAULT_NEED_TOTAL,
            need_pagination: DEFAULT_NEED_PAGINATION,
            panic_policy: PanicPolicy::default(),
        }
    }
}

impl<R, F, S> QueryOptions<R, F, S> {
    pub fn backend(&self) -> Option<&Backend<R>> {
        self.backend.as_ref()
    }

    pub fn filter(&self) -> Option<&F> {
        self.filter.as_ref()
    }

    pub fn sort(&self) -> Option<&S> {
        self.sort.as_ref()
    }

    pub fn start(&self) -> u32 {
        self.start
    }

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
}

/// A configuration mutator applied over the defaults
pub type QueryOption<R, F, S> = Box<dyn FnOnce(&mut QueryOptions<R, F, S>) + Send>;

/// Apply mutators in order over the defaults; the last write to a field wins
pub fn load_query_options<R, F, S, I>(options: I) -> QueryOptions<R, F, S>
where
    I: IntoIterator<Item = QueryOption<R, F, S>>,
{
    let mut loaded = QueryOptions::default();
    for option in options {
        option(&mut loaded);
    }
    loaded
}

pub fn with_backend<R, F, S>(backend: Backend<R>) -> QueryOption<R, F, S>
where
    R: 'static,
    F: 'static,
    S: 'static,
{
    Box::new(move |o| o.backend = Some(backend))
}

pub fn with_filter<R, F, S>(filter: F) -> QueryOption<R, F, S>
where
    R: 'static,
    F: Send + 'static,
    S: 'static,
{
    Box::new(move |o| o.filter = Some(filter))
}

pub fn with_sort<R, F, S>(sort: S) -> QueryOption<R, F, S>
where
    R: 'static,
    F: 'static,
    S: Send + 'static,
{
    Box::new(move |o| o.sort = Some(sort))
}

pub fn with_start<R, F, S>(start: u32) -> QueryOption<R, F, S>
where
    R: 'static,
    F: 'static,
    S: 'static,
{
    Box::new(move |o| o.start = start)
}

pub fn with_limit<R, F, S>(limit: u32) -> QueryOption<R, F, S>
where
    R: 'static,
    F: 'static,
    S: 'static,
{
    Box::new(move |o| o.limit = limit)
}

pub fn with_need_total<R, F, S>(need_total: bool) -> QueryOption<R, F, S>
where
    R: 'static,
    F: 'static,
    S: 'static,
{
    Box::new(move |o| o.need_total = need_total)
}

pub fn with_need_pagination<R, F, S>(need_pagination: bool) -> QueryOption<R, F, S>
where
    R: 'static,
    F: 'static,
    S: 'static,
{
    Box::new(move |o| o.need_pagination = need_pagination)
}

pub fn with_panic_policy<R, F, S>(policy: PanicPolicy) -> QueryOption<R, F, S>
where
    R: 'static,
    F: 'static,
    S: 'static,
{
    Box::new(move |o| o.panic_policy = policy)
}

/// Collects mutators fluently so the generic parameters are named once
pub struct OptionsBuilder<R, F, S> {
    options: Vec<QueryOption<R, F, S>>,
}

impl<R, F, S> Default for OptionsBuilder<R, F, S> {
    fn default() -> Self {
        Self {
            options: Vec::new(),
        }
    }
}

impl<R, F, S> OptionsBuilder<R, F, S>
where
    R: 'static,
    F: Send + 'static,
    S: Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a typed filter and sort already set
    pub fn with_filter_and_sort(filter: F, sort: S) -> Self {
        Self::new().filter(filter).sort(sort)
    }

    pub fn backend(mut self, backend: Backend<R>) -> Self {
        self.options.push(with_backend(backend));
        self
    }

    pub fn filter(mut self, filter: F) -> Self {
        self.options.push(with_filter(filter));
        self
    }

    pub fn sort(mut self, sort: S) -> Self {
        self.options.push(with_sort(sort));
        self
    }

    pub fn start(mut self, start: u32) -> Self {
        self.options.push(with_start(start));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.options.push(with_limit(limit));
        self
    }

    pub fn need_total(mut self, need_total: bool) -> Self {
        self.options.push(with_need_total(need_total));
        self
    }

    pub fn need_pagination(mut self, need_pagination: bool) -> Self {
        self.options.push(with_need_pagination(need_pagination));
        self
    }

    pub fn panic_policy(mut self, policy: PanicPolicy) -> Self {
        self.options.push(with_panic_policy(policy));
        self
    }

    /// Hand over the collected mutators
    pub fn build(self) -> Vec<QueryOption<R, F, S>> {
        self.options
    }
}
