//! Application callback for submitted messages.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::connection::Connection;
use crate::message::{ShortMessage, ShortMessageResp};

/// Handles `submit_sm` requests on bound sessions.
///
/// Called once per request, in arrival order for a given connection. An
/// error is answered with [`Status::UnknownError`](crate::message::Status)
/// and the session continues.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle_submit(
        &self,
        conn: &Connection,
        message: ShortMessage,
    ) -> anyhow::Result<ShortMessageResp>;
}

/// Handler backed by a closure. See [`handler_fn`].
pub struct HandlerFn<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

/// Wrap a closure taking the message and returning a future.
///
/// ```
/// use smpp_session::message::ShortMessageResp;
/// use smpp_session::server::handler_fn;
///
/// let handler = handler_fn(|_msg| async { anyhow::Ok(ShortMessageResp::ok("1234")) });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F, Fut>
where
    F: Fn(ShortMessage) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ShortMessageResp>> + Send,
{
    HandlerFn {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F, Fut>
where
    F: Fn(ShortMessage) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ShortMessageResp>> + Send,
{
    async fn handle_submit(
        &self,
        _conn: &Connection,
        message: ShortMessage,
    ) -> anyhow::Result<ShortMessageResp> {
        (self.f)(message).await
    }
}
