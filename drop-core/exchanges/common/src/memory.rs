use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tracing::trace;

use crate::{ChannelClosed, DirectChannel, Frame};

/// In-process [`DirectChannel`] end.
///
/// Frames are delivered through unbounded queues; each end keeps a byte
/// counter of what it sent that the other end has not received yet, so
/// `buffered_amount` behaves like a real transport buffer. Dropping or
/// closing either end closes both. Frames already queued are still
/// delivered after close.
pub struct MemoryChannel {
    outgoing: mpsc::UnboundedSender<Frame>,
    incoming: Mutex<mpsc::UnboundedReceiver<Frame>>,
    outbound: Arc<watch::Sender<u64>>,
    inbound: Arc<watch::Sender<u64>>,
    closed: Arc<watch::Sender<bool>>,
}

impl MemoryChannel {
    /// Creates two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        let a_load = Arc::new(watch::Sender::new(0u64));
        let b_load = Arc::new(watch::Sender::new(0u64));
        let closed = Arc::new(watch::Sender::new(false));

        let a = Self {
            outgoing: a_tx,
            incoming: Mutex::new(a_rx),
            outbound: a_load.clone(),
            inbound: b_load.clone(),
            closed: closed.clone(),
        };
        let b = Self {
            outgoing: b_tx,
            incoming: Mutex::new(b_rx),
            outbound: b_load,
            inbound: a_load,
            closed,
        };
        return (a, b);
    }
}

impl DirectChannel for MemoryChannel {
    fn send(&self, frame: Frame) -> Result<(), ChannelClosed> {
        if !self.is_open() {
            return Err(ChannelClosed);
        }
        let len = frame.len() as u64;
        self.outbound.send_modify(|load| *load += len);
        if self.outgoing.send(frame).is_err() {
            self.outbound
                .send_modify(|load| *load = load.saturating_sub(len));
            return Err(ChannelClosed);
        }
        Ok(())
    }

    async fn recv(&self) -> Option<Frame> {
        let mut incoming = self.incoming.lock().await;
        let mut closed = self.closed.subscribe();
        let frame = tokio::select! {
            biased;
            frame = incoming.recv() => frame,
            _ = closed.wait_for(|closed| *closed) => incoming.try_recv().ok(),
        }?;
        let len = frame.len() as u64;
        self.inbound
            .send_modify(|load| *load = load.saturating_sub(len));
        trace!("memory channel delivered {len} bytes");
        Some(frame)
    }

    fn buffered_amount(&self) -> u64 {
        *self.outbound.borrow()
    }

    async fn wait_buffered_at_most(
        &self,
        threshold: u64,
    ) -> Result<(), ChannelClosed> {
        let mut load = self.outbound.subscribe();
        let mut closed = self.closed.subscribe();
        tokio::select! {
            biased;
            drained = load.wait_for(|load| *load <= threshold) => {
                drained.map(|_| ()).map_err(|_| ChannelClosed)
            }
            _ = closed.wait_for(|closed| *closed) => Err(ChannelClosed),
        }
    }

    fn is_open(&self) -> bool {
        !*self.closed.borrow()
    }

    async fn closed(&self) {
        let mut closed = self.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    fn close(&self) {
        self.closed.send_replace(true);
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn frames_arrive_in_order() {
        let (a, b) = MemoryChannel::pair();

        a.send(Frame::Text("first".into())).unwrap();
        a.send(Frame::Binary(vec![1, 2, 3])).unwrap();

        assert_eq!(b.recv().await, Some(Frame::Text("first".into())));
        assert_eq!(b.recv().await, Some(Frame::Binary(vec![1, 2, 3])));
    }

    #[tokio::test]
    async fn buffered_amount_tracks_undelivered_bytes() {
        let (a, b) = MemoryChannel::pair();

        a.send(Frame::Binary(vec![0; 100])).unwrap();
        a.send(Frame::Binary(vec![0; 50])).unwrap();
        assert_eq!(a.buffered_amount(), 150);
        assert_eq!(b.buffered_amount(), 0);

        b.recv().await.unwrap();
        assert_eq!(a.buffered_amount(), 50);
    }

    #[tokio::test]
    async fn wait_returns_at_once_when_already_drained() {
        let (a, _b) = MemoryChannel::pair();

        a.send(Frame::Binary(vec![0; 10])).unwrap();

        tokio::time::timeout(
            Duration::from_millis(100),
            a.wait_buffered_at_most(10),
        )
        .await
        .expect("must not wait for a drain that already happened")
        .unwrap();
    }

    #[tokio::test]
    async fn wait_resumes_when_peer_drains() {
        let (a, b) = MemoryChannel::pair();
        for _ in 0..4 {
            a.send(Frame::Binary(vec![0; 256])).unwrap();
        }

        let reader = tokio::spawn(async move {
            for _ in 0..4 {
                b.recv().await.unwrap();
            }
            b
        });

        a.wait_buffered_at_most(256).await.unwrap();
        assert!(a.buffered_amount() <= 256);
        let _b = reader.await.unwrap();
    }

    #[tokio::test]
    async fn close_fails_waiters_and_senders() {
        let (a, b) = MemoryChannel::pair();
        a.send(Frame::Binary(vec![0; 64])).unwrap();

        let waiter = a.wait_buffered_at_most(0);
        b.close();

        assert_eq!(waiter.await, Err(ChannelClosed));
        assert!(!a.is_open());
        assert_eq!(a.send(Frame::Text("late".into())), Err(ChannelClosed));
    }

    #[tokio::test]
    async fn closed_resolves_on_either_side() {
        let (a, b) = MemoryChannel::pair();
        let watcher = tokio::spawn(async move {
            a.closed().await;
            a.is_open()
        });

        b.close();

        assert!(!watcher.await.unwrap());
    }

    #[tokio::test]
    async fn queued_frames_survive_close() {
        let (a, b) = MemoryChannel::pair();
        a.send(Frame::Text("last words".into())).unwrap();
        drop(a);

        assert_eq!(b.recv().await, Some(Frame::Text("last words".into())));
        assert_eq!(b.recv().await, None);
    }
}
