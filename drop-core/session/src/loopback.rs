use anyhow::{Result, bail};
use roomdropx_common::{MemoryChannel, Payload};
use serde_json::json;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tracing::debug;
use uuid::Uuid;

use crate::PeerConnector;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Link {
    Pending,
    Described,
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Local {
    Offer,
    Answer,
}

#[derive(Default)]
struct LinkState {
    local: Option<Local>,
    remote_described: bool,
    applied: Vec<String>,
}

/// [`PeerConnector`] joining two endpoints of the same process.
///
/// Descriptions carry a per-pair token, so an offer or answer from another
/// pair is refused. Each side gathers two host candidates once it has a
/// local description; the direct channel is a [`MemoryChannel`] end.
pub struct LoopbackConnector {
    token: String,
    channel: Mutex<Option<MemoryChannel>>,
    state: Mutex<LinkState>,
    link: watch::Sender<Link>,
    candidates_tx: mpsc::UnboundedSender<Payload>,
    candidates_rx: Mutex<Option<mpsc::UnboundedReceiver<Payload>>>,
}

impl LoopbackConnector {
    /// Two connectors wired to each other.
    pub fn pair() -> (Self, Self) {
        let token = Uuid::new_v4().to_string();
        let (a, b) = MemoryChannel::pair();
        (Self::new(token.clone(), a), Self::new(token, b))
    }

    fn new(token: String, channel: MemoryChannel) -> Self {
        let (candidates_tx, candidates_rx) = mpsc::unbounded_channel();
        Self {
            token,
            channel: Mutex::new(Some(channel)),
            state: Mutex::new(LinkState::default()),
            link: watch::Sender::new(Link::Pending),
            candidates_tx,
            candidates_rx: Mutex::new(Some(candidates_rx)),
        }
    }

    /// Remote candidates applied so far, in order.
    pub fn applied_candidates(&self) -> Vec<String> {
        self.state().applied.clone()
    }

    fn state(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn description(&self, kind: &str) -> Payload {
        json!({ "type": kind, "sdp": format!("loopback:{}", self.token) })
    }

    fn check_description(&self, payload: &Payload, kind: &str) -> Result<()> {
        if payload["type"].as_str() != Some(kind) {
            bail!("expected {} description, got {}", kind, payload["type"]);
        }
        if payload["sdp"] != self.description(kind)["sdp"] {
            bail!("{} does not belong to this link", kind);
        }
        Ok(())
    }

    fn gather_candidates(&self) {
        for (index, port) in [50000u16, 50001].into_iter().enumerate() {
            let candidate = json!({
                "candidate": format!(
                    "candidate:{} 1 udp 2122260223 127.0.0.1 {} typ host",
                    index + 1,
                    port
                ),
                "sdpMid": "0",
            });
            let _ = self.candidates_tx.send(candidate);
        }
    }
}

impl PeerConnector for LoopbackConnector {
    type Channel = MemoryChannel;

    fn take_candidate_rx(&self) -> Option<mpsc::UnboundedReceiver<Payload>> {
        self.candidates_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    async fn create_offer(&self) -> Result<Payload> {
        {
            let mut state = self.state();
            if state.local.is_some() {
                bail!("local description already set");
            }
            state.local = Some(Local::Offer);
        }
        self.gather_candidates();
        Ok(self.description("offer"))
    }

    async fn accept_offer(&self, offer: Payload) -> Result<Payload> {
        self.check_description(&offer, "offer")?;
        {
            let mut state = self.state();
            if state.local.is_some() {
                bail!("local description already set");
            }
            state.local = Some(Local::Answer);
            state.remote_described = true;
        }
        self.link.send_if_modified(|link| {
            let pending = *link == Link::Pending;
            if pending {
                *link = Link::Described;
            }
            pending
        });
        self.gather_candidates();
        Ok(self.description("answer"))
    }

    async fn accept_answer(&self, answer: Payload) -> Result<()> {
        self.check_description(&answer, "answer")?;
        {
            let mut state = self.state();
            if state.local != Some(Local::Offer) {
                bail!("no offer to answer");
            }
            if state.remote_described {
                bail!("answer already applied");
            }
            state.remote_described = true;
        }
        self.link.send_if_modified(|link| {
            let pending = *link == Link::Pending;
            if pending {
                *link = Link::Described;
            }
            pending
        });
        Ok(())
    }

    async fn add_candidate(&self, candidate: Payload) -> Result<()> {
        let Some(line) = candidate["candidate"]
            .as_str()
            .filter(|c| c.starts_with("candidate:"))
        else {
            bail!("malformed candidate {}", candidate);
        };
        let mut state = self.state();
        if !state.remote_described {
            bail!("no remote description yet");
        }
        debug!("Applied candidate {}", line);
        state.applied.push(line.to_string());
        Ok(())
    }

    async fn open_channel(&self) -> Result<MemoryChannel> {
        let mut link = self.link.subscribe();
        let reached = *link
            .wait_for(|link| *link != Link::Pending)
            .await?;
        if reached == Link::Closed {
            bail!("connector closed");
        }
        match self
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            Some(channel) => Ok(channel),
            None => bail!("channel already opened"),
        }
    }

    fn close(&self) {
        self.link.send_replace(Link::Closed);
        let channel = self
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(channel);
    }
}
