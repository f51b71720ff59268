//! Stateless pub-sub for order lifecycle events.
//!
//! Each hook gets its own bounded channel. The engine publishes into it through an [`EventProducer`], and the
//! [`EventHandler`] runs the hook on a separate task for every event. Hooks only ever see the event itself, never the
//! engine's state, so a slow or failing hook cannot hold up the transition that produced the event.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinSet},
};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, listener) = mpsc::channel(buffer_size);
        Self { listener, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Dispatches events until every producer has been dropped, then drains the hook runs still in flight.
    ///
    /// A hook that panics is logged and forgotten. It does not stop later events from being handled.
    pub async fn start_handler(self) {
        let Self { mut listener, sender, handler } = self;
        // Only producers may keep the channel open
        drop(sender);
        debug!("📬️ Event handler started");
        let mut running = JoinSet::new();
        loop {
            tokio::select! {
                Some(finished) = running.join_next(), if !running.is_empty() => report_hook_result(finished),
                next = listener.recv() => match next {
                    Some(event) => {
                        trace!("📬️ Dispatching event");
                        running.spawn((handler)(event));
                    },
                    None => break,
                },
            }
        }
        if !running.is_empty() {
            debug!("📬️ All producers are gone. Waiting for {} hook runs to finish", running.len());
        }
        while let Some(finished) = running.join_next().await {
            report_hook_result(finished);
        }
        debug!("📬️ Event handler has shut down");
    }
}

fn report_hook_result(result: Result<(), JoinError>) {
    match result {
        Ok(()) => trace!("📬️ Event handled"),
        Err(e) if e.is_panic() => error!("📬️ An event hook panicked. {e}"),
        Err(e) => warn!("📬️ An event hook was cancelled. {e}"),
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    /// Queues `event` for the hook. Waits while the channel is full, and drops the event with a warning if the
    /// handler has already shut down.
    pub async fn publish_event(&self, event: E) {
        if self.sender.send(event).await.is_err() {
            warn!("📬️ The event handler has shut down. Dropping event.");
        }
    }
}
