//! Request/response relay between the background, content and presentation
//! contexts.
//!
//! Every context is a task that owns its state and is reached only through a
//! [`ContextHandle`]. Each request travels in an [`Envelope`] together with a
//! oneshot reply channel; answering a requester that went away is ignored.

pub mod background;
pub mod content;
pub mod messages;
pub mod session;

use std::{fmt, time::Duration};

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use uuid::Uuid;

pub use background::{Background, BackgroundHandle, Tab, TabHost};
pub use content::{ContentHandle, ContentScript};
pub use messages::{
    BackgroundRequest, BackgroundResponse, ContentRequest, ContentResponse, VideoData, VideoDetails,
};
pub use session::BrowserSession;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Could not deliver message to {context}: receiving end is closed")]
    Delivery { context: &'static str },

    #[error("{context} dropped the request without responding")]
    NoResponse { context: &'static str },

    #[error("Script injection failed: {reason}")]
    InjectionFailed { reason: String },

    #[error("Unexpected response from {context}")]
    UnexpectedResponse { context: &'static str },
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Wait between making sure the content context exists and messaging it
    pub settle_delay: Duration,
    pub inbox_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            inbox_capacity: 16,
        }
    }
}

pub struct Envelope<Req, Resp> {
    pub id: Uuid,
    pub request: Req,
    pub reply: oneshot::Sender<Resp>,
}

/// An isolated execution context answering typed requests.
pub trait Context: Send + Sized + 'static {
    const CONTEXT_ID: &'static str;
    type Request: fmt::Debug + Send + 'static;
    type Response: Send + 'static;

    fn handle(&mut self, request: Self::Request) -> impl Future<Output = Self::Response> + Send;

    fn run(
        mut self,
        mut inbox: mpsc::Receiver<Envelope<Self::Request, Self::Response>>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> impl Future<Output = ()> + Send {
        async move {
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        tracing::debug!(context = Self::CONTEXT_ID, "Shutting down");
                        return;
                    }
                    envelope = inbox.recv() => match envelope {
                        Some(Envelope { id, request, reply }) => {
                            tracing::debug!(context = Self::CONTEXT_ID, %id, ?request, "Handling request");
                            let response = self.handle(request).await;
                            if reply.send(response).is_err() {
                                tracing::debug!(context = Self::CONTEXT_ID, %id, "Requester went away");
                            }
                        }
                        None => return,
                    },
                }
            }
        }
    }
}

pub struct ContextHandle<Req, Resp> {
    context: &'static str,
    tx: mpsc::Sender<Envelope<Req, Resp>>,
}

impl<Req, Resp> Clone for ContextHandle<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            context: self.context,
            tx: self.tx.clone(),
        }
    }
}

impl<Req, Resp> ContextHandle<Req, Resp> {
    pub async fn request(&self, request: Req) -> Result<Resp, RelayError> {
        let (reply, response) = oneshot::channel();
        let envelope = Envelope {
            id: Uuid::new_v4(),
            request,
            reply,
        };

        self.tx
            .send(envelope)
            .await
            .map_err(|_| RelayError::Delivery {
                context: self.context,
            })?;

        response.await.map_err(|_| RelayError::NoResponse {
            context: self.context,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Start `context` on its own task.
pub fn spawn_context<C: Context>(
    context: C,
    capacity: usize,
    shutdown: broadcast::Receiver<()>,
) -> ContextHandle<C::Request, C::Response> {
    let (tx, rx) = mpsc::channel(capacity);
    tokio::spawn(context.run(rx, shutdown));
    ContextHandle {
        context: C::CONTEXT_ID,
        tx,
    }
}
