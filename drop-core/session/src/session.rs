use chrono::{DateTime, Utc};
use roomdropx_common::{DirectChannel, NegotiationMessage, Payload, Subscribers};
use std::{future::pending, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    Directive, JoinAck, Negotiation, PeerConnector, RelayClient, RelayEvent,
    Role, RoomError, SessionError, SessionPhase,
};

pub trait SessionSubscriber: Send + Sync {
    fn get_id(&self) -> String;
    fn notify_status(&self, event: SessionStatusEvent);
    fn notify_error(&self, event: SessionErrorEvent);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionStatusEvent {
    pub session_id: String,
    pub phase: SessionPhase,
    pub room: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionErrorEvent {
    pub session_id: String,
    pub error: RoomError,
}

/// One endpoint's session: room membership, negotiation and, once open,
/// the direct channel.
///
/// Owned by a single task. Relay events and local candidates are consumed by
/// [`Session::negotiate`] and [`Session::monitor`], or fed in by hand
/// through [`Session::handle_relay_event`] and
/// [`Session::handle_local_candidate`].
pub struct Session<R: RelayClient, P: PeerConnector> {
    id: String,
    created_at: DateTime<Utc>,
    relay: R,
    connector: P,
    negotiation: Negotiation,
    room: Option<String>,
    channel: Option<Arc<P::Channel>>,
    relay_rx: Option<mpsc::UnboundedReceiver<RelayEvent>>,
    candidate_rx: Option<mpsc::UnboundedReceiver<Payload>>,
    reported: SessionPhase,
    torn_down: bool,
    subscribers: Subscribers<dyn SessionSubscriber>,
}

impl<R: RelayClient, P: PeerConnector> Session<R, P> {
    pub fn new(relay: R, connector: P) -> Self {
        let relay_rx = relay.take_event_rx();
        let candidate_rx = connector.take_candidate_rx();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            relay,
            connector,
            negotiation: Negotiation::new(),
            room: None,
            channel: None,
            relay_rx,
            candidate_rx,
            reported: SessionPhase::Idle,
            torn_down: false,
            subscribers: Subscribers::new(),
        }
    }

    pub fn get_id(&self) -> &str {
        &self.id
    }

    pub fn get_created_at(&self) -> String {
        self.created_at.to_rfc3339()
    }

    pub fn phase(&self) -> SessionPhase {
        self.negotiation.phase()
    }

    pub fn role(&self) -> Option<Role> {
        self.negotiation.role()
    }

    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    pub fn connector(&self) -> &P {
        &self.connector
    }

    /// The direct channel, once the session reached `Open`.
    pub fn channel(&self) -> Option<Arc<P::Channel>> {
        self.channel.clone()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn SessionSubscriber>) {
        self.subscribers
            .insert(subscriber.get_id(), subscriber);
    }

    pub fn unsubscribe(&self, subscriber: Arc<dyn SessionSubscriber>) {
        self.subscribers.remove(&subscriber.get_id());
    }

    pub async fn create_room(
        &mut self,
        code: Option<&str>,
        pin: Option<&str>,
    ) -> Result<String, SessionError> {
        self.expect_idle("create a room")?;
        match self.relay.create_room(code, pin).await {
            Ok(code) => {
                info!("Created room {}", code);
                self.room = Some(code.clone());
                let directive = self.negotiation.room_entered(false);
                self.report();
                self.apply(directive).await?;
                Ok(code)
            }
            Err(e) => Err(self.fail_room(e).await),
        }
    }

    pub async fn join_room(
        &mut self,
        code: &str,
        pin: Option<&str>,
    ) -> Result<JoinAck, SessionError> {
        self.expect_idle("join a room")?;
        match self.relay.join_room(code, pin).await {
            Ok(ack) => {
                info!(
                    "Joined room {} (peer present: {})",
                    ack.code, ack.peer_already_present
                );
                self.room = Some(ack.code.clone());
                let directive =
                    self.negotiation.room_entered(ack.peer_already_present);
                self.report();
                self.apply(directive).await?;
                Ok(ack)
            }
            Err(e) => Err(self.fail_room(e).await),
        }
    }

    pub async fn choose_role(&mut self, role: Role) -> Result<(), SessionError> {
        let directive = self.negotiation.choose_role(role)?;
        self.report();
        self.apply(directive).await
    }

    pub async fn handle_relay_event(
        &mut self,
        event: RelayEvent,
    ) -> Result<(), SessionError> {
        let directive = match event {
            RelayEvent::PeerJoined => {
                info!("Peer joined");
                self.negotiation.peer_joined()
            }
            RelayEvent::PeerLeft => {
                info!("Peer left");
                self.negotiation.peer_left();
                if self.phase().is_closed() {
                    self.teardown().await;
                }
                Directive::None
            }
            RelayEvent::Signal(NegotiationMessage::Offer(offer)) => {
                self.negotiation.offer_received(offer)
            }
            RelayEvent::Signal(NegotiationMessage::Answer(answer)) => {
                self.negotiation.answer_received(answer)
            }
            RelayEvent::Signal(NegotiationMessage::Candidate(candidate)) => {
                self.negotiation.candidate_received(candidate)
            }
            RelayEvent::Error(e) => return Err(self.fail_room(e).await),
        };
        self.report();
        self.apply(directive).await
    }

    /// Relays a candidate produced by the local transport.
    pub async fn handle_local_candidate(
        &mut self,
        candidate: Payload,
    ) -> Result<(), SessionError> {
        if self.room.is_none() || self.phase().is_closed() {
            debug!("Dropping local candidate outside a room");
            return Ok(());
        }
        self.signal(NegotiationMessage::Candidate(candidate)).await
    }

    /// Drives the exchange until the direct channel is open.
    ///
    /// Fails when the session falls back to `Idle` or closes first.
    /// Cancelling it while it waits for the peer loses nothing and the call
    /// can be retried. Cancelling it mid-step may leave the exchange half
    /// done; close the session then.
    pub async fn negotiate(&mut self) -> Result<Arc<P::Channel>, SessionError> {
        let phase = self.phase();
        if !matches!(
            phase,
            SessionPhase::AwaitingPeer
                | SessionPhase::Negotiating
                | SessionPhase::Open
        ) {
            return Err(SessionError::InvalidPhase {
                action: "negotiate",
                phase,
            });
        }
        self.drive(|phase| {
            !matches!(
                phase,
                SessionPhase::AwaitingPeer | SessionPhase::Negotiating
            )
        })
        .await?;
        match (self.phase(), &self.channel) {
            (SessionPhase::Open, Some(channel)) => Ok(channel.clone()),
            (phase, _) => Err(SessionError::InvalidPhase {
                action: "negotiate",
                phase,
            }),
        }
    }

    /// Keeps serving the relay and the transport until the session closes:
    /// late candidates are applied, peer departure and channel loss close
    /// the session.
    pub async fn monitor(&mut self) -> Result<(), SessionError> {
        self.drive(|phase| phase.is_closed()).await
    }

    pub async fn handle_channel_closed(&mut self) {
        if self.phase().is_closed() {
            return;
        }
        info!("Direct channel closed");
        self.negotiation.close();
        self.teardown().await;
        self.report();
    }

    /// Tears the session down. Calling it again is a no-op.
    pub async fn close(&mut self) {
        self.negotiation.close();
        self.teardown().await;
        self.report();
    }

    /// Serves relay events, local candidates and channel closure until
    /// `done` holds.
    ///
    /// Cancelling while it waits for the next input loses nothing and the
    /// call can be resumed. Cancelling while an input is being applied may
    /// leave the exchange half done (an offer accepted with no answer
    /// relayed); close the session in that case.
    async fn drive(
        &mut self,
        done: fn(SessionPhase) -> bool,
    ) -> Result<(), SessionError> {
        loop {
            if done(self.phase()) {
                return Ok(());
            }
            let channel = self.channel.clone();
            tokio::select! {
                event = next(&mut self.relay_rx) => match event {
                    Some(event) => self.handle_relay_event(event).await?,
                    None => {
                        self.relay_rx = None;
                        let e = self.fail_room(RoomError::Disconnected).await;
                        return Err(e);
                    }
                },
                candidate = next(&mut self.candidate_rx) => match candidate {
                    Some(candidate) => {
                        self.handle_local_candidate(candidate).await?
                    }
                    None => self.candidate_rx = None,
                },
                _ = closed(channel.as_deref()) => {
                    self.handle_channel_closed().await
                }
            }
        }
    }

    async fn apply(&mut self, directive: Directive) -> Result<(), SessionError> {
        match directive {
            Directive::None => Ok(()),
            Directive::CreateOffer => {
                let offer = match self.connector.create_offer().await {
                    Ok(offer) => offer,
                    Err(e) => return Err(self.transport_failed(e).await),
                };
                info!("Sending offer");
                self.signal(NegotiationMessage::Offer(offer)).await
            }
            Directive::CreateAnswer(offer) => {
                let answer = match self.connector.accept_offer(offer).await {
                    Ok(answer) => answer,
                    Err(e) => {
                        warn!("Offer rejected by transport: {:#}", e);
                        self.negotiation.offer_rejected();
                        return Ok(());
                    }
                };
                info!("Sending answer");
                self.signal(NegotiationMessage::Answer(answer)).await?;
                let queued = self.negotiation.answer_sent();
                self.report();
                self.add_candidates(queued).await;
                self.open_channel().await
            }
            Directive::ApplyAnswer(answer) => {
                if let Err(e) = self.connector.accept_answer(answer).await {
                    warn!("Answer rejected by transport: {:#}", e);
                    return Ok(());
                }
                let queued = self.negotiation.answer_applied();
                self.report();
                self.add_candidates(queued).await;
                self.open_channel().await
            }
            Directive::ApplyCandidates(_) => {
                self.add_candidates(directive).await;
                Ok(())
            }
        }
    }

    async fn add_candidates(&self, directive: Directive) {
        let Directive::ApplyCandidates(candidates) = directive else {
            return;
        };
        for candidate in candidates {
            if let Err(e) = self.connector.add_candidate(candidate).await {
                warn!("Discarding candidate: {:#}", e);
            }
        }
    }

    async fn open_channel(&mut self) -> Result<(), SessionError> {
        match self.connector.open_channel().await {
            Ok(channel) => {
                info!("Direct channel open");
                self.channel = Some(Arc::new(channel));
                Ok(())
            }
            Err(e) => Err(self.transport_failed(e).await),
        }
    }

    async fn signal(
        &mut self,
        message: NegotiationMessage,
    ) -> Result<(), SessionError> {
        match self.relay.signal(message).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail_room(e).await),
        }
    }

    async fn fail_room(&mut self, e: RoomError) -> SessionError {
        warn!("Relay error: {}", e);
        let was_in_room = self.room.is_some();
        self.negotiation.room_error(e);
        if self.phase().is_closed() {
            self.teardown().await;
        } else if e.is_recoverable() {
            self.room = None;
            if was_in_room {
                self.relay.leave().await;
            }
        }
        self.subscribers.for_each(|s| {
            s.notify_error(SessionErrorEvent {
                session_id: self.id.clone(),
                error: e,
            });
        });
        self.report();
        SessionError::Room(e)
    }

    async fn transport_failed(&mut self, e: anyhow::Error) -> SessionError {
        error!("Connectivity transport failed: {:#}", e);
        self.negotiation.close();
        self.teardown().await;
        self.report();
        SessionError::Transport(e)
    }

    async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        if let Some(channel) = &self.channel {
            channel.close();
        }
        self.connector.close();
        self.relay.leave().await;
        debug!("Session {} torn down", self.id);
    }

    fn expect_idle(&self, action: &'static str) -> Result<(), SessionError> {
        match self.phase() {
            SessionPhase::Idle => Ok(()),
            phase => Err(SessionError::InvalidPhase { action, phase }),
        }
    }

    fn report(&mut self) {
        let phase = self.phase();
        if phase == self.reported {
            return;
        }
        self.reported = phase;
        let event = SessionStatusEvent {
            session_id: self.id.clone(),
            phase,
            room: self.room.clone(),
        };
        self.subscribers
            .for_each(|s| s.notify_status(event.clone()));
    }
}

async fn next<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

async fn closed<C: DirectChannel>(channel: Option<&C>) {
    match channel {
        Some(channel) => channel.closed().await,
        None => pending().await,
    }
}
