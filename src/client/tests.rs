use super::*;
use crate::service::types::GenerationError;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex as StdMutex;

/// Selector that counts invocations and succeeds or refuses on demand
struct CountingSelector {
    calls: AtomicU32,
    succeed: bool,
}

impl CountingSelector {
    fn new(succeed: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            succeed,
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CredentialSelector for CountingSelector {
    fn select_credential(&self) -> BoxFuture<'_, Result<(), GenerationError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let succeed = self.succeed;
        Box::pin(async move {
            if succeed {
                Ok(())
            } else {
                Err(GenerationError::PermissionDenied("user closed the picker".into()))
            }
        })
    }
}

/// Thunk that replays scripted outcomes and counts invocations
struct ScriptedCall {
    outcomes: StdMutex<VecDeque<Result<&'static str, GenerationError>>>,
    calls: AtomicU32,
}

impl ScriptedCall {
    fn new(outcomes: Vec<Result<&'static str, GenerationError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: StdMutex::new(outcomes.into()),
            calls: AtomicU32::new(0),
        })
    }

    fn thunk(
        self: &Arc<Self>,
    ) -> impl Fn() -> BoxFuture<'static, Result<&'static str, GenerationError>> + Send + Sync + use<>
    {
        let script = Arc::clone(self);
        move || -> BoxFuture<'static, Result<&'static str, GenerationError>> {
            script.calls.fetch_add(1, Ordering::SeqCst);
            let next = script
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GenerationError::Unknown("script exhausted".into())));
            Box::pin(async move { next })
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn test_success_on_first_attempt() {
    let selector = CountingSelector::new(true);
    let client = RetryingApiClient::new(selector.clone());
    let script = ScriptedCall::new(vec![Ok("image")]);

    let result = client.execute(script.thunk()).await;

    assert_eq!(result, Ok("image"));
    assert_eq!(script.calls(), 1);
    assert_eq!(selector.calls(), 0);
}

#[tokio::test]
async fn test_permission_denied_then_reauth_then_success() {
    let selector = CountingSelector::new(true);
    let client = RetryingApiClient::new(selector.clone());
    let script = ScriptedCall::new(vec![
        Err(GenerationError::PermissionDenied("expired key".into())),
        Ok("image"),
    ]);

    let result = client.execute(script.thunk()).await;

    assert_eq!(result, Ok("image"));
    assert_eq!(script.calls(), 2);
    assert_eq!(selector.calls(), 1);

    let stats = client.statistics().await;
    assert_eq!(stats.reauth_attempts, 1);
    assert_eq!(stats.reauth_successes, 1);
    assert_eq!(stats.error_types.get("PermissionDenied"), Some(&1));
}

#[tokio::test]
async fn test_not_found_is_reauth_eligible() {
    let selector = CountingSelector::new(true);
    let client = RetryingApiClient::new(selector.clone());
    let script = ScriptedCall::new(vec![
        Err(GenerationError::NotFound("project".into())),
        Ok("image"),
    ]);

    assert_eq!(client.execute(script.thunk()).await, Ok("image"));
    assert_eq!(selector.calls(), 1);
}

#[tokio::test]
async fn test_second_failure_is_surfaced_without_looping() {
    let selector = CountingSelector::new(true);
    let client = RetryingApiClient::new(selector.clone());
    let script = ScriptedCall::new(vec![
        Err(GenerationError::PermissionDenied("first".into())),
        Err(GenerationError::PermissionDenied("second".into())),
        Ok("never reached"),
    ]);

    let result = client.execute(script.thunk()).await;

    assert_eq!(
        result,
        Err(GenerationError::PermissionDenied("second".into()))
    );
    assert_eq!(script.calls(), 2);
    assert_eq!(selector.calls(), 1);
}

#[tokio::test]
async fn test_refused_reauth_surfaces_original_error() {
    let selector = CountingSelector::new(false);
    let client = RetryingApiClient::new(selector.clone());
    let script = ScriptedCall::new(vec![
        Err(GenerationError::PermissionDenied("expired key".into())),
        Ok("never reached"),
    ]);

    let result = client.execute(script.thunk()).await;

    assert_eq!(
        result,
        Err(GenerationError::PermissionDenied("expired key".into()))
    );
    assert_eq!(script.calls(), 1);
    assert_eq!(selector.calls(), 1);
}

#[tokio::test]
async fn test_terminal_errors_are_not_retried() {
    let terminal = [
        GenerationError::NetworkError("connection reset".into()),
        GenerationError::SafetyRefusal("cannot depict that".into()),
        GenerationError::Unknown("boom".into()),
        GenerationError::MalformedModelOutput("bad json".into()),
    ];

    for error in terminal {
        let selector = CountingSelector::new(true);
        let client = RetryingApiClient::new(selector.clone());
        let script = ScriptedCall::new(vec![Err(error.clone()), Ok("never reached")]);

        assert_eq!(client.execute(script.thunk()).await, Err(error));
        assert_eq!(script.calls(), 1);
        assert_eq!(selector.calls(), 0);
    }
}

#[tokio::test]
async fn test_each_outer_call_gets_its_own_reauth() {
    let selector = CountingSelector::new(true);
    let client = RetryingApiClient::new(selector.clone());
    let script = ScriptedCall::new(vec![
        Err(GenerationError::PermissionDenied("a".into())),
        Ok("one"),
        Err(GenerationError::NotFound("b".into())),
        Ok("two"),
    ]);

    assert_eq!(client.execute(script.thunk()).await, Ok("one"));
    assert_eq!(client.execute(script.thunk()).await, Ok("two"));
    assert_eq!(script.calls(), 4);
    assert_eq!(selector.calls(), 2);

    let stats = client.statistics().await;
    assert_eq!(stats.total_calls, 2);
    assert_eq!(stats.total_attempts, 4);
}
