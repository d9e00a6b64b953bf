//! Offer/answer/candidate sequencing for one endpoint.
//!
//! [`Negotiation`] performs no I/O. Every input returns a [`Directive`]
//! telling the caller what to do with the connectivity transport next, and
//! the caller reports back how it went. This keeps every ordering decision
//! in one place:
//! - exactly one offer, produced by the initiator once it has both its role
//!   and a peer;
//! - exactly one answer, produced by the responder and only after an offer;
//! - candidates outside `Negotiating`/`Open` are discarded, candidates that
//!   arrive before the remote description are queued and released in
//!   arrival order once it is applied.

use roomdropx_common::Payload;
use tracing::{info, warn};

use crate::{Role, RoomError, SessionError, SessionPhase};

/// Next step for the connectivity transport.
#[derive(Clone, Debug, PartialEq)]
pub enum Directive {
    None,
    /// Produce the offer and relay it.
    CreateOffer,
    /// Apply the remote offer, then relay the resulting answer.
    CreateAnswer(Payload),
    /// Apply the remote answer.
    ApplyAnswer(Payload),
    /// Apply remote candidates, in order.
    ApplyCandidates(Vec<Payload>),
}

#[derive(Debug, Default)]
pub struct Negotiation {
    phase: SessionPhase,
    role: Option<Role>,
    peer_present: bool,
    offer_sent: bool,
    offer_received: bool,
    answer_done: bool,
    remote_described: bool,
    pending_candidates: Vec<Payload>,
}

impl Negotiation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Number of remote candidates waiting for the remote description.
    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    /// The relay acknowledged a create or join.
    pub fn room_entered(&mut self, peer_already_present: bool) -> Directive {
        if self.phase != SessionPhase::Idle {
            warn!("Room acknowledgement while {}", self.phase);
            return Directive::None;
        }
        self.set_phase(SessionPhase::AwaitingPeer);
        self.peer_present = peer_already_present;
        self.maybe_offer()
    }

    pub fn choose_role(&mut self, role: Role) -> Result<Directive, SessionError> {
        if self.phase.is_closed() {
            return Err(SessionError::InvalidPhase {
                action: "choose a role",
                phase: self.phase,
            });
        }
        match self.role {
            Some(current) if current == role => return Ok(Directive::None),
            Some(current) => return Err(SessionError::RoleConflict(current)),
            None => {}
        }
        info!("Role set to {:?}", role);
        self.role = Some(role);
        Ok(self.maybe_offer())
    }

    pub fn peer_joined(&mut self) -> Directive {
        self.peer_present = true;
        self.maybe_offer()
    }

    /// Peer left: an exchange in progress or an open channel cannot survive.
    pub fn peer_left(&mut self) {
        self.peer_present = false;
        if matches!(
            self.phase,
            SessionPhase::Negotiating | SessionPhase::Open
        ) {
            self.set_phase(SessionPhase::Closed);
        }
    }

    pub fn offer_received(&mut self, offer: Payload) -> Directive {
        if !matches!(
            self.phase,
            SessionPhase::AwaitingPeer | SessionPhase::Negotiating
        ) {
            warn!("Ignoring offer while {}", self.phase);
            return Directive::None;
        }
        match self.role {
            Some(Role::Initiator) => {
                warn!("Ignoring offer received by the initiator");
                return Directive::None;
            }
            Some(Role::Responder) => {}
            None => {
                info!("Offer received before choosing a role, answering");
                self.role = Some(Role::Responder);
            }
        }
        if self.offer_received {
            warn!("Ignoring second offer");
            return Directive::None;
        }
        self.offer_received = true;
        self.peer_present = true;
        self.set_phase(SessionPhase::Negotiating);
        Directive::CreateAnswer(offer)
    }

    /// The transport could not apply the offer; a later one may still work.
    pub fn offer_rejected(&mut self) {
        self.offer_received = false;
    }

    /// Responder: the answer was produced and relayed.
    pub fn answer_sent(&mut self) -> Directive {
        self.answer_done = true;
        self.set_phase(SessionPhase::Open);
        self.remote_applied()
    }

    pub fn answer_received(&mut self, answer: Payload) -> Directive {
        if self.role != Some(Role::Initiator) {
            warn!("Ignoring answer received by the responder");
            return Directive::None;
        }
        if !self.offer_sent {
            warn!("Ignoring answer before any offer was sent");
            return Directive::None;
        }
        if self.answer_done {
            warn!("Ignoring duplicate answer");
            return Directive::None;
        }
        if self.phase != SessionPhase::Negotiating {
            warn!("Ignoring answer while {}", self.phase);
            return Directive::None;
        }
        Directive::ApplyAnswer(answer)
    }

    /// Initiator: the transport accepted the answer.
    pub fn answer_applied(&mut self) -> Directive {
        self.answer_done = true;
        self.set_phase(SessionPhase::Open);
        self.remote_applied()
    }

    pub fn candidate_received(&mut self, candidate: Payload) -> Directive {
        if !self.phase.accepts_candidates() {
            warn!("Discarding candidate received while {}", self.phase);
            return Directive::None;
        }
        if !self.remote_described {
            self.pending_candidates.push(candidate);
            return Directive::None;
        }
        Directive::ApplyCandidates(vec![candidate])
    }

    /// Applies a relay failure. Recoverable ones return to `Idle` with the
    /// role kept while no exchange has started; anything else, or any
    /// failure once negotiating, closes the session.
    pub fn room_error(&mut self, error: RoomError) {
        if self.phase.is_closed() {
            return;
        }
        let matchmaking = matches!(
            self.phase,
            SessionPhase::Idle | SessionPhase::AwaitingPeer
        );
        if error.is_recoverable() && matchmaking {
            let role = self.role;
            *self = Self {
                role,
                ..Self::default()
            };
            info!("Back to idle after {}", error);
        } else {
            self.set_phase(SessionPhase::Closed);
        }
    }

    pub fn close(&mut self) {
        self.pending_candidates.clear();
        self.set_phase(SessionPhase::Closed);
    }

    fn maybe_offer(&mut self) -> Directive {
        if self.role == Some(Role::Initiator)
            && self.peer_present
            && !self.offer_sent
            && self.phase == SessionPhase::AwaitingPeer
        {
            self.offer_sent = true;
            self.set_phase(SessionPhase::Negotiating);
            return Directive::CreateOffer;
        }
        Directive::None
    }

    fn remote_applied(&mut self) -> Directive {
        self.remote_described = true;
        if self.pending_candidates.is_empty() {
            return Directive::None;
        }
        Directive::ApplyCandidates(std::mem::take(&mut self.pending_candidates))
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            info!("Session {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }
}
