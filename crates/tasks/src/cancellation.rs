//! Cancellation helpers.

use tokio_util::sync::CancellationToken;

/// A token cancelled as soon as either `a` or `b` is cancelled.
///
/// Must be called inside a tokio runtime: a small watcher task forwards
/// cancellation from `b`. The watcher exits once the returned token is
/// cancelled, so holders should cancel it (or wrap it in a drop guard) when
/// the work it guards is finished.
pub fn linked_token(a: &CancellationToken, b: &CancellationToken) -> CancellationToken {
    let linked = a.child_token();

    if b.is_cancelled() {
        linked.cancel();
        return linked;
    }

    let other = b.clone();
    let watcher = linked.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = other.cancelled() => watcher.cancel(),
            _ = watcher.cancelled() => {}
        }
    });

    linked
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancelling_first_parent_cancels_linked() {
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        let linked = linked_token(&a, &b);

        a.cancel();
        tokio::time::timeout(Duration::from_secs(1), linked.cancelled())
            .await
            .expect("linked token should be cancelled");
        assert!(!b.is_cancelled());
    }

    #[tokio::test]
    async fn cancelling_second_parent_cancels_linked() {
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        let linked = linked_token(&a, &b);

        b.cancel();
        tokio::time::timeout(Duration::from_secs(1), linked.cancelled())
            .await
            .expect("linked token should be cancelled");
        assert!(!a.is_cancelled());
    }

    #[tokio::test]
    async fn already_cancelled_parent_yields_cancelled_token() {
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        b.cancel();
        assert!(linked_token(&a, &b).is_cancelled());
    }

    #[tokio::test]
    async fn cancelling_linked_leaves_parents_alone() {
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        let linked = linked_token(&a, &b);

        linked.cancel();
        tokio::task::yield_now().await;
        assert!(!a.is_cancelled());
        assert!(!b.is_cancelled());
    }
}
