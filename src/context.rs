use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Per-query context threaded through middleware, strategies and stores
///
/// The engine never enforces cancellation itself. Stores and middleware that
/// honor it watch [`QueryContext::cancelled`].
#[derive(Debug, Clone)]
pub struct QueryContext {
    id: Uuid,
    cancel: CancellationToken,
    values: Arc<HashMap<String, String>>,
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryContext {
    /// Create a fresh context with a new query id
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            values: Arc::new(HashMap::new()),
        }
    }

    /// Replace the cancellation token, e.g. to tie queries to a request lifetime
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Derive a context carrying one more key/value pair
    pub fn with_value(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut values = (*self.values).clone();
        values.insert(key.into(), value.into());
        Self {
            id: self.id,
            cancel: self.cancel.clone(),
            values: Arc::new(values),
        }
    }

    /// Derive a context whose cancellation can be triggered without
    /// cancelling the parent
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            id: self.id,
            cancel: self.cancel.child_token(),
            values: Arc::clone(&self.values),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the context is cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_value_does_not_touch_parent() {
        let parent = QueryContext::new();
        let scoped = parent.with_value("tenant", "acme");

        assert_eq!(scoped.value("tenant"), Some("acme"));
        assert_eq!(parent.value("tenant"), None);
        assert_eq!(scoped.id(), parent.id());
    }

    #[test]
    fn test_child_cancellation_is_one_way() {
        let parent = QueryContext::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let other_child = parent.child();
        parent.cancel();
        assert!(other_child.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves() {
        let ctx = QueryContext::new();
        let waiter = ctx.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        ctx.cancel();
        handle.await.unwrap();
    }
}
