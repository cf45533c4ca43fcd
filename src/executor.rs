use crate::error::{QueryError, QueryResult};
use futures::future::BoxFuture;
use std::any::Any;
use std::future::Future;
use tokio::task::JoinError;
use tracing::{debug, error};

/// A zero-argument fallible operation
pub type Operation = BoxFuture<'static, QueryResult<()>>;

/// What to do when an operation panics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PanicPolicy {
    /// Report the panic as [`QueryError::Panicked`]
    #[default]
    Surface,
    /// Log the panic and treat the operation as having produced its default value
    Absorb,
}

/// Run all operations concurrently and return the first error, in submission order
///
/// # Errors
///
/// Returns the first operation error, or a panic/join failure depending on `policy`
pub async fn run_all<I>(operations: I, policy: PanicPolicy) -> QueryResult<()>
where
    I: IntoIterator<Item = Operation>,
{
    let handles: Vec<_> = operations.into_iter().map(tokio::spawn).collect();
    debug!("Waiting on {} concurrent operations", handles.len());

    let mut first_error = None;
    for (index, handle) in handles.into_iter().enumerate() {
        if let Err(e) = settle(index, handle.await, policy) {
            first_error.get_or_insert(e);
        }
    }

    first_error.map_or(Ok(()), Err)
}

/// Run two operations concurrently and return both outputs
///
/// An absorbed panic yields `Default::default()` for that branch.
///
/// # Errors
///
/// Returns the first branch error (the first branch wins if both fail)
pub async fn join_pair<A, B, FA, FB>(
    first: FA,
    second: FB,
    policy: PanicPolicy,
) -> QueryResult<(A, B)>
where
    A: Default + Send + 'static,
    B: Default + Send + 'static,
    FA: Future<Output = QueryResult<A>> + Send + 'static,
    FB: Future<Output = QueryResult<B>> + Send + 'static,
{
    let (first, second) = tokio::join!(tokio::spawn(first), tokio::spawn(second));

    let first = settle(0, first, policy);
    let second = settle(1, second, policy);

    match (first, second) {
        (Ok(a), Ok(b)) => Ok((a.unwrap_or_default(), b.unwrap_or_default())),
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}

/// Turn a joined task into an outcome; `Ok(None)` means an absorbed panic
fn settle<T>(
    index: usize,
    joined: Result<QueryResult<T>, JoinError>,
    policy: PanicPolicy,
) -> QueryResult<Option<T>> {
    match joined {
        Ok(result) => result.map(Some),
        Err(e) if e.is_panic() => {
            let message = panic_message(e.into_panic());
            error!("Operation {index} panicked: {message}");
            match policy {
                PanicPolicy::Surface => Err(QueryError::Panicked(message)),
                PanicPolicy::Absorb => Ok(None),
            }
        }
        Err(e) => Err(QueryError::Executor(format!(
            "Failed to join operation {index}: {e}"
        ))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    async fn explode<T>(message: &'static str) -> QueryResult<T> {
        panic!("{message}")
    }

    fn ok_after(ms: u64, counter: Arc<AtomicUsize>) -> Operation {
        async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_run_all_success() {
        let counter = Arc::new(AtomicUsize::new(0));
        let ops = vec![
            ok_after(5, counter.clone()),
            ok_after(1, counter.clone()),
            ok_after(0, counter.clone()),
        ];

        run_all(ops, PanicPolicy::Surface).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_all_waits_for_siblings_after_failure() {
        let counter = Arc::new(AtomicUsize::new(0));
        let failing: Operation = async { Err(QueryError::Backend("down".to_string())) }.boxed();
        let ops = vec![failing, ok_after(20, counter.clone())];

        let err = run_all(ops, PanicPolicy::Surface).await.unwrap_err();
        assert!(matches!(err, QueryError::Backend(ref m) if m == "down"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_all_empty() {
        tokio_test::assert_ok!(run_all(Vec::new(), PanicPolicy::Surface).await);
    }

    #[tokio::test]
    async fn test_panic_surfaces_by_default() {
        let ops = vec![explode::<()>("page fetch exploded").boxed()];

        let err = run_all(ops, PanicPolicy::Surface).await.unwrap_err();
        assert!(matches!(err, QueryError::Panicked(ref m) if m == "page fetch exploded"));
    }

    #[tokio::test]
    async fn test_panic_absorbed_when_requested() {
        let ops = vec![explode::<()>("ignored").boxed()];
        tokio_test::assert_ok!(run_all(ops, PanicPolicy::Absorb).await);
    }

    #[tokio::test]
    async fn test_join_pair_outputs() {
        let (items, total) = join_pair(
            async { Ok(vec![1, 2, 3]) },
            async { Ok(42_u64) },
            PanicPolicy::Surface,
        )
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3]);
        assert_eq!(total, 42);
    }

    #[tokio::test]
    async fn test_join_pair_second_error() {
        let result = join_pair(
            async { Ok(vec![1]) },
            async { Err::<u64, _>(QueryError::Backend("count failed".to_string())) },
            PanicPolicy::Surface,
        )
        .await;

        assert!(matches!(result, Err(QueryError::Backend(_))));
    }

    #[tokio::test]
    async fn test_join_pair_absorbed_panic_yields_default() {
        let (items, total): (Vec<u32>, u64) = join_pair(
            explode::<Vec<u32>>("fetch panicked"),
            async { Ok(7_u64) },
            PanicPolicy::Absorb,
        )
        .await
        .unwrap();

        assert!(items.is_empty());
        assert_eq!(total, 7);
    }
}
