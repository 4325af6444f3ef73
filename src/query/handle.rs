use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use super::kind::QueryKind;
use super::outcome::QueryOutcome;
use crate::error::SqlDispatchError;

/// Which side of a deployment served a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionRole {
    Read,
    Write,
    /// The manager's single unpooled connection.
    Shared,
}

/// Connection a handle ran on. Set once, never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionBinding {
    pub endpoint: String,
    pub role: ConnectionRole,
    pub connection_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Pending,
    Succeeded,
    Failed,
}

type Completion = Result<QueryOutcome, SqlDispatchError>;

/// One execution lifecycle. Completes exactly once, with either an outcome or
/// an error; later completion attempts are ignored.
#[derive(Debug)]
pub struct QueryHandle {
    id: u64,
    sql: String,
    kind: QueryKind,
    binding: OnceLock<ConnectionBinding>,
    state: Mutex<HandleState>,
    sender: Mutex<Option<oneshot::Sender<Completion>>>,
}

impl QueryHandle {
    /// New pending handle and the future that resolves when it completes.
    #[must_use]
    pub fn new(id: u64, sql: impl Into<String>, kind: QueryKind) -> (Arc<Self>, QueryFuture) {
        let (tx, rx) = oneshot::channel();
        let handle = Arc::new(Self {
            id,
            sql: sql.into(),
            kind,
            binding: OnceLock::new(),
            state: Mutex::new(HandleState::Pending),
            sender: Mutex::new(Some(tx)),
        });
        let future = QueryFuture {
            handle: Arc::clone(&handle),
            rx,
        };
        (handle, future)
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    /// Record the connection this handle runs on. Returns false if a binding
    /// was already set; the first one stays.
    pub fn bind(&self, binding: ConnectionBinding) -> bool {
        self.binding.set(binding).is_ok()
    }

    #[must_use]
    pub fn binding(&self) -> Option<&ConnectionBinding> {
        self.binding.get()
    }

    #[must_use]
    pub fn state(&self) -> HandleState {
        self.state
            .lock()
            .map_or(HandleState::Pending, |state| *state)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state() != HandleState::Pending
    }

    /// Deliver the result. Returns false when the handle already completed.
    pub fn complete(&self, result: Completion) -> bool {
        let Some(sender) = self.sender.lock().ok().and_then(|mut slot| slot.take()) else {
            return false;
        };
        if let Ok(mut state) = self.state.lock() {
            *state = if result.is_ok() {
                HandleState::Succeeded
            } else {
                HandleState::Failed
            };
        }
        // the caller may have dropped its future; the result is discarded then
        let _ = sender.send(result);
        true
    }
}

/// Resolves with the result of a submitted query. The result is buffered, so
/// awaiting after the query finished still observes it.
#[derive(Debug)]
pub struct QueryFuture {
    handle: Arc<QueryHandle>,
    rx: oneshot::Receiver<Completion>,
}

impl QueryFuture {
    #[must_use]
    pub fn handle(&self) -> &Arc<QueryHandle> {
        &self.handle
    }
}

impl Future for QueryFuture {
    type Output = Completion;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let polled = Pin::new(&mut self.rx).poll(cx);
        match polled {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(SqlDispatchError::Other(format!(
                "query {} was dropped before completing",
                self.handle.id
            )))),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_exactly_once() {
        let (handle, future) = QueryHandle::new(1, "SELECT 1", QueryKind::Select);
        assert_eq!(handle.state(), HandleState::Pending);
        assert!(handle.complete(Ok(QueryOutcome::Affected(1))));
        assert!(!handle.complete(Err(SqlDispatchError::execution("late"))));
        assert_eq!(handle.state(), HandleState::Succeeded);
        assert_eq!(future.await.unwrap(), QueryOutcome::Affected(1));
    }

    #[tokio::test]
    async fn binding_is_set_once() {
        let (handle, _future) = QueryHandle::new(2, "SELECT 1", QueryKind::Select);
        let first = ConnectionBinding {
            endpoint: "a".into(),
            role: ConnectionRole::Read,
            connection_id: 1,
        };
        assert!(handle.bind(first.clone()));
        assert!(!handle.bind(ConnectionBinding {
            endpoint: "b".into(),
            ..first.clone()
        }));
        assert_eq!(handle.binding(), Some(&first));
    }

    #[tokio::test]
    async fn dropped_handle_fails_the_future() {
        let (handle, future) = QueryHandle::new(3, "SELECT 1", QueryKind::Select);
        handle.sender.lock().unwrap().take();
        assert!(future.await.is_err());
    }
}
