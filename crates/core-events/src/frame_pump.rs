//! Timer-backed frame source feeding `Event::FrameDue` into the event loop.
//!
//! `schedule` hands out a fresh token and spawns a sleep task that delivers
//! `FrameDue(token)` through the event channel after the deferral window.
//! Cancellation is by invalidation, not by killing the task: a cancelled
//! token may still arrive and the scheduler drops it on the equality check,
//! so the pump never needs to race the timer.
//!
//! Must be used from within a tokio runtime (`schedule` spawns).

use std::sync::atomic::Ordering;
use std::time::Duration;

use core_render::scheduler::FrameSource;
use tokio::sync::mpsc::Sender;

use crate::{CHANNEL_SEND_FAILURES, Event};

#[derive(Debug)]
pub struct FramePump {
    tx: Sender<Event>,
    next_token: u64,
    cancelled: u64,
}

impl FramePump {
    pub fn new(tx: Sender<Event>) -> Self {
        Self {
            tx,
            next_token: 0,
            cancelled: 0,
        }
    }

    /// Tokens invalidated through `cancel` so far.
    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl FrameSource for FramePump {
    type Handle = u64;

    fn schedule(&mut self, max_deferral: Duration) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(max_deferral).await;
            if tx.send(Event::FrameDue(token)).await.is_err() {
                CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
            }
        });
        tracing::trace!(target: "runtime.events", token, deferral_ms = max_deferral.as_millis() as u64, "frame_scheduled");
        token
    }

    fn cancel(&mut self, handle: u64) {
        // The sleep task still fires; the stale token is dropped downstream.
        self.cancelled += 1;
        tracing::trace!(target: "runtime.events", token = handle, "frame_cancelled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn scheduled_frame_arrives_with_its_token() {
        let (tx, mut rx) = mpsc::channel::<Event>(8);
        let mut pump = FramePump::new(tx);
        let token = pump.schedule(Duration::from_millis(1));
        let event = tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("frame should arrive")
            .expect("channel open");
        assert_eq!(event, Event::FrameDue(token));
    }

    #[tokio::test]
    async fn tokens_are_sequential() {
        let (tx, _rx) = mpsc::channel::<Event>(8);
        let mut pump = FramePump::new(tx);
        assert_eq!(pump.schedule(Duration::from_millis(1)), 0);
        assert_eq!(pump.schedule(Duration::from_millis(1)), 1);
        assert_eq!(pump.schedule(Duration::from_millis(1)), 2);
    }

    #[tokio::test]
    async fn cancelled_token_still_delivers() {
        let (tx, mut rx) = mpsc::channel::<Event>(8);
        let mut pump = FramePump::new(tx);
        let token = pump.schedule(Duration::from_millis(1));
        pump.cancel(token);
        assert_eq!(pump.cancelled(), 1);
        // Delivery is not suppressed; the consumer's token check is what
        // makes cancellation effective.
        let event = tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("frame should arrive")
            .expect("channel open");
        assert_eq!(event, Event::FrameDue(token));
    }
}
