use anyhow::{Context, Result};
use clap::Parser;
use listquery::config::{BackendKind, Config};
use listquery::{
    Backend, Document, Filter, List, MemoryCollection, OptionsBuilder, PanicPolicy, QueryContext,
    Service, Sort, SqliteStore, Timeout, Timing,
};
use sea_query::{Alias, Expr, Order};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
struct Person {
    id: i64,
    name: String,
    age: i64,
}

#[derive(Debug, Clone)]
struct PeopleFilter {
    name: Option<String>,
    min_age: Option<u32>,
}

#[derive(Debug, Clone)]
struct PeopleSort {
    field: String,
    descending: bool,
}

/// Scopes for the `people` table
struct SqlPeople;

impl Service<PeopleFilter, PeopleSort> for SqlPeople {
    fn filter(&self, _ctx: &QueryContext, filter: Option<&PeopleFilter>) -> Result<Filter> {
        let filter = filter.cloned();
        Ok(Filter::relational(move |q| {
            let Some(filter) = &filter else { return };
            if let Some(name) = &filter.name {
                q.and_where(Expr::col(Alias::new("name")).eq(name.as_str()));
            }
            if let Some(min_age) = filter.min_age {
                q.and_where(Expr::col(Alias::new("age")).gte(min_age));
            }
        }))
    }

    fn sort(&self, sort: Option<&PeopleSort>) -> Sort {
        let sort = sort.cloned();
        Sort::relational(move |q| {
            if let Some(sort) = &sort {
                let order = if sort.descending {
                    Order::Desc
                } else {
                    Order::Asc
                };
                q.order_by(Alias::new(sort.field.as_str()), order);
            }
        })
    }
}

/// Documents for the in-memory collection
struct DocumentPeople;

impl Service<PeopleFilter, PeopleSort> for DocumentPeople {
    fn filter(&self, _ctx: &QueryContext, filter: Option<&PeopleFilter>) -> Result<Filter> {
        let mut doc = Map::new();
        if let Some(filter) = filter {
            if let Some(name) = &filter.name {
                doc.insert("name".to_string(), json!(name));
            }
            if let Some(min_age) = filter.min_age {
                doc.insert("age".to_string(), json!({ "$gte": min_age }));
            }
        }
        Ok(Filter::Document(Document::Map(doc)))
    }

    fn sort(&self, sort: Option<&PeopleSort>) -> Sort {
        let pairs = sort
            .map(|s| vec![(s.field.clone(), json!(if s.descending { -1 } else { 1 }))])
            .unwrap_or_default();
        Sort::Document(Document::ordered(pairs))
    }
}

fn sample_people() -> Vec<Person> {
    [
        (1, "Alice", 25),
        (2, "Bob", 30),
        (3, "Carol", 35),
        (4, "Dave", 41),
        (5, "Erin", 19),
    ]
    .into_iter()
    .map(|(id, name, age)| Person {
        id,
        name: name.to_string(),
        age,
    })
    .collect()
}

async fn sqlite_backend(url: &str) -> Result<Backend<Person>> {
    // A single connection keeps an in-memory database alive and shared
    let pool: SqlitePool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect(url)
        .await
        .with_context(|| format!("Failed to connect to {url}"))?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS people (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER NOT NULL)",
    )
    .execute(&pool)
    .await?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM people")
        .fetch_one(&pool)
        .await?;
    if existing == 0 {
        for person in sample_people() {
            sqlx::query("INSERT INTO people (id, name, age) VALUES (?, ?, ?)")
                .bind(person.id)
                .bind(&person.name)
                .bind(person.age)
                .execute(&pool)
                .await?;
        }
        info!("Seeded people table");
    }

    Ok(Backend::relational(SqliteStore::new(pool, "people")))
}

async fn memory_backend() -> Result<Backend<Person>> {
    let people = MemoryCollection::<Person>::new();
    people.insert_many(&sample_people()).await?;
    Ok(Backend::document(people))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse CLI arguments
    let config = Config::parse();
    config.validate()?;

    info!("listquery v{} starting...", env!("CARGO_PKG_VERSION"));

    let backend = match config.backend {
        BackendKind::Sqlite => sqlite_backend(&config.database_url).await?,
        BackendKind::Memory => memory_backend().await?,
    };
    info!("Using {} backend", backend.kind());

    let list = List::<Person, PeopleFilter, PeopleSort>::new()
        .use_middleware(Arc::new(Timing))
        .use_middleware(Arc::new(Timeout::new(config.timeout())));

    let options = OptionsBuilder::with_filter_and_sort(
        PeopleFilter {
            name: config.name.clone(),
            min_age: config.min_age,
        },
        PeopleSort {
            field: config.sort.clone(),
            descending: config.descending,
        },
    )
    .backend(backend)
    .start(config.start)
    .limit(config.limit)
    .need_total(!config.no_total)
    .need_pagination(!config.no_pagination)
    .panic_policy(if config.absorb_panics {
        PanicPolicy::Absorb
    } else {
        PanicPolicy::Surface
    })
    .build();

    let ctx = QueryContext::new();
    let page = match config.backend {
        BackendKind::Sqlite => list.query(&ctx, Arc::new(SqlPeople), options).await?,
        BackendKind::Memory => list.query(&ctx, Arc::new(DocumentPeople), options).await?,
    };

    println!("{}", serde_json::to_string_pretty(&page)?);

    Ok(())
}
