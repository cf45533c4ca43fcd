// Public exports for library usage
pub mod backend;
pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod memory;
pub mod middleware;
pub mod options;
pub mod scope;
pub mod service;
pub mod sql;
pub mod strategy;

pub use backend::{Backend, DocumentStore, FindOptions, RelationalStore};
pub use builder::{Page, QueryBuilder};
pub use context::QueryContext;
pub use error::{QueryError, QueryResult};
pub use executor::PanicPolicy;
pub use memory::MemoryCollection;
pub use middleware::{Middleware, Next, RequireContext, Timeout, Timing};
pub use options::{load_query_options, OptionsBuilder, QueryOption, QueryOptions};
pub use scope::{Document, Filter, RelationalScope, Sort};
pub use service::{List, Service};
pub use sql::SqliteStore;
pub use strategy::{DocumentStrategy, RelationalStrategy, Strategy};
