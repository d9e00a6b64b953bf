use thiserror::Error;

use crate::{Role, SessionPhase};

/// Failure reported by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("room not found")]
    NotFound,
    #[error("wrong room PIN")]
    BadPin,
    #[error("room is full")]
    RoomFull,
    #[error("room code already in use")]
    Exists,
    #[error("relay has no free rooms")]
    ServerFull,
    #[error("relay requires a room PIN")]
    PinRequired,
    #[error("not in a room")]
    NoRoom,
    #[error("relay connection lost")]
    Disconnected,
}

impl RoomError {
    /// Recoverable errors send the session back to `Idle`; the rest close it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RoomError::NotFound
                | RoomError::BadPin
                | RoomError::RoomFull
                | RoomError::Exists
                | RoomError::ServerFull
                | RoomError::PinRequired
        )
    }

    /// Relay wire name of the error.
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::NotFound => "not_found",
            RoomError::BadPin => "bad_pin",
            RoomError::RoomFull => "room_full",
            RoomError::Exists => "exists",
            RoomError::ServerFull => "server_full",
            RoomError::PinRequired => "pin_required",
            RoomError::NoRoom => "no_room",
            RoomError::Disconnected => "disconnected",
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error("role already chosen as {0:?}")]
    RoleConflict(Role),
    #[error("cannot {action} while {phase}")]
    InvalidPhase {
        action: &'static str,
        phase: SessionPhase,
    },
    #[error("connectivity transport failed: {0:#}")]
    Transport(anyhow::Error),
}
