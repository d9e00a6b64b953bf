use std::fmt;

/// Which side of the handshake an endpoint plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Creates the channel and produces the offer.
    Initiator,
    /// Answers the initiator's offer.
    Responder,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    #[default]
    Idle,
    AwaitingPeer,
    Negotiating,
    Open,
    Closed,
}

impl SessionPhase {
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionPhase::Closed)
    }

    /// Whether relayed candidates belong to the current exchange.
    pub fn accepts_candidates(&self) -> bool {
        matches!(self, SessionPhase::Negotiating | SessionPhase::Open)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::AwaitingPeer => "awaiting peer",
            SessionPhase::Negotiating => "negotiating",
            SessionPhase::Open => "open",
            SessionPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}
