// sistema_chat_criptografado/chat_peer/src/transport/memory.rs

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};

use super::{Frame, Transport, TransportError};

/// Par de transportes ligados por canais, dentro do mesmo processo.
pub struct MemoryTransport {
    outbound: std::sync::Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Frame>>,
    shutdown: watch::Sender<bool>,
    failing_sends: AtomicUsize,
}

impl MemoryTransport {
    pub fn pair() -> (MemoryTransport, MemoryTransport) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (MemoryTransport::new(a_tx, b_rx), MemoryTransport::new(b_tx, a_rx))
    }

    fn new(outbound: mpsc::UnboundedSender<Frame>, inbound: mpsc::UnboundedReceiver<Frame>) -> Self {
        MemoryTransport {
            outbound: std::sync::Mutex::new(Some(outbound)),
            inbound: Mutex::new(inbound),
            shutdown: watch::channel(false).0,
            failing_sends: AtomicUsize::new(0),
        }
    }

    /// As próximas `count` chamadas a `send` falham com `NotConnected`,
    /// simulando um peer que ainda não subiu.
    pub fn fail_next_sends(&self, count: usize) {
        self.failing_sends.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        let failing = self
            .failing_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(TransportError::NotConnected);
        }

        let outbound = self.outbound.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match outbound.as_ref() {
            Some(tx) => tx.send(frame).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    async fn receive(&self) -> Result<Frame, TransportError> {
        let mut shutdown = self.shutdown.subscribe();
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            biased;
            frame = inbound.recv() => frame.ok_or(TransportError::Closed),
            _ = shutdown.wait_for(|closed| *closed) => Err(TransportError::Closed),
        }
    }

    async fn close(&self) {
        self.shutdown.send_replace(true);
        // o peer recebe Closed quando o canal esvaziar
        self.outbound.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_cross_the_pair() {
        let (a, b) = MemoryTransport::pair();
        a.send(Frame::Ciphertext("42".into())).await.unwrap();
        b.send(Frame::Ciphertext("7".into())).await.unwrap();
        assert_eq!(b.receive().await.unwrap(), Frame::Ciphertext("42".into()));
        assert_eq!(a.receive().await.unwrap(), Frame::Ciphertext("7".into()));
    }

    #[tokio::test]
    async fn test_close_reaches_both_ends() {
        let (a, b) = MemoryTransport::pair();
        a.send(Frame::Ciphertext("1".into())).await.unwrap();
        a.close().await;

        assert!(matches!(a.receive().await, Err(TransportError::Closed)));
        assert!(matches!(a.send(Frame::Ciphertext("2".into())).await, Err(TransportError::Closed)));
        assert_eq!(b.receive().await.unwrap(), Frame::Ciphertext("1".into()));
        assert!(matches!(b.receive().await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_injected_send_failures() {
        let (a, b) = MemoryTransport::pair();
        a.fail_next_sends(2);
        for _ in 0..2 {
            assert!(matches!(
                a.send(Frame::Ciphertext("1".into())).await,
                Err(TransportError::NotConnected)
            ));
        }
        a.send(Frame::Ciphertext("1".into())).await.unwrap();
        assert_eq!(b.receive().await.unwrap(), Frame::Ciphertext("1".into()));
    }
}
