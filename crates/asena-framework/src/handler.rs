//! Handler services.
//!
//! Every command handler is a `tower::Service<Arc<CommandContext>>` that
//! yields `()` or a [`BoxError`]. [`HandlerService`] adapts a plain async
//! function; anything else implementing the service contract, including
//! layered stacks, can be registered through [`BoxedHandlerService::new`].

use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tower::util::BoxCloneSyncService;
use tower::{BoxError, Service};
use tracing::error;

use asena_core::OutgoingMessage;

use crate::context::CommandContext;

/// Type-erased handler stored in a descriptor.
pub type BoxedHandlerService = BoxCloneSyncService<Arc<CommandContext>, (), BoxError>;

// ============================================================================
// HandlerResponse
// ============================================================================

/// Values a handler can return.
///
/// The response is applied after the handler body completes. An `Err`
/// becomes a handler fault; send failures of text replies are only logged.
#[async_trait]
pub trait HandlerResponse: Send + 'static {
    async fn respond(self, ctx: &CommandContext) -> Result<(), BoxError>;
}

#[async_trait]
impl HandlerResponse for () {
    async fn respond(self, _ctx: &CommandContext) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Replies with the text, quoting the triggering message.
#[async_trait]
impl HandlerResponse for String {
    async fn respond(self, ctx: &CommandContext) -> Result<(), BoxError> {
        if let Err(e) = ctx.reply(self).await {
            error!(command = %ctx.command(), "Failed to send reply: {e}");
        }
        Ok(())
    }
}

#[async_trait]
impl HandlerResponse for &'static str {
    async fn respond(self, ctx: &CommandContext) -> Result<(), BoxError> {
        self.to_string().respond(ctx).await
    }
}

#[async_trait]
impl HandlerResponse for OutgoingMessage {
    async fn respond(self, ctx: &CommandContext) -> Result<(), BoxError> {
        if let Err(e) = ctx.send(self).await {
            error!(command = %ctx.command(), "Failed to send message: {e}");
        }
        Ok(())
    }
}

#[async_trait]
impl<T: HandlerResponse> HandlerResponse for Option<T> {
    async fn respond(self, ctx: &CommandContext) -> Result<(), BoxError> {
        match self {
            Some(t) => t.respond(ctx).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<T, E> HandlerResponse for Result<T, E>
where
    T: HandlerResponse,
    E: Into<BoxError> + Send + 'static,
{
    async fn respond(self, ctx: &CommandContext) -> Result<(), BoxError> {
        match self {
            Ok(t) => t.respond(ctx).await,
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// HandlerService
// ============================================================================

/// A tower [`Service`] wrapping an async handler function.
///
/// ```rust,ignore
/// async fn ping(_ctx: Arc<CommandContext>) -> String {
///     "pong".into()
/// }
/// let svc = HandlerService::new(ping);
/// ```
#[derive(Clone)]
pub struct HandlerService<F> {
    handler: F,
}

impl<F> HandlerService<F> {
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F, Fut, R> Service<Arc<CommandContext>> for HandlerService<F>
where
    F: Fn(Arc<CommandContext>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerResponse,
{
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<(), BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<CommandContext>) -> Self::Future {
        let handler = self.handler.clone();
        async move {
            let response = handler(Arc::clone(&ctx)).await;
            response.respond(&ctx).await
        }
        .boxed()
    }
}

/// Boxes an async handler function.
pub fn handler_fn<F, Fut, R>(handler: F) -> BoxedHandlerService
where
    F: Fn(Arc<CommandContext>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerResponse,
{
    BoxCloneSyncService::new(HandlerService::new(handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSocket, message};
    use crate::trigger::Invocation;
    use tower::ServiceExt;

    fn ctx(socket: Arc<RecordingSocket>) -> Arc<CommandContext> {
        Arc::new(CommandContext::new(
            "ping",
            Arc::new(message("123@s.whatsapp.net", "!ping")),
            socket,
            Invocation::Pattern {
                matched: String::new(),
            },
            '!',
        ))
    }

    #[tokio::test]
    async fn test_string_response_replies_with_quote() {
        let socket = RecordingSocket::new().shared();
        let svc = handler_fn(|_ctx| async { "pong".to_string() });

        svc.oneshot(ctx(socket.clone())).await.unwrap();

        let sent = socket.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.text, "pong");
        assert!(sent[0].1.quoted.is_some());
    }

    #[tokio::test]
    async fn test_err_response_is_a_fault() {
        let socket = RecordingSocket::new().shared();
        let svc = handler_fn(|_ctx| async { Err::<(), _>("boom") });

        let err = svc.oneshot(ctx(socket.clone())).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(socket.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failed_reply_is_not_a_fault() {
        let socket = RecordingSocket::new().failing_sends().shared();
        let svc = handler_fn(|_ctx| async { Some("pong") });

        assert!(svc.oneshot(ctx(socket)).await.is_ok());
    }
}
