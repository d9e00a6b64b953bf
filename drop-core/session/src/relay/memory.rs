use rand::{Rng, distr::Alphanumeric};
use roomdropx_common::NegotiationMessage;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, info, warn};

use super::{JoinAck, RelayClient, RelayConfig, RelayEvent};
use crate::RoomError;

/// Random codes tried before a crowded code space counts as full.
const CODE_ATTEMPTS: usize = 64;

/// In-process relay registry shared by any number of clients.
///
/// Rooms hold at most two participants and expire `room_ttl` after
/// creation. Cloning shares the same registry.
#[derive(Clone)]
pub struct MemoryRelay {
    config: Arc<RelayConfig>,
    registry: Arc<Mutex<Registry>>,
}

#[derive(Default)]
struct Registry {
    next_client: u64,
    clients: HashMap<u64, Client>,
    rooms: HashMap<String, Room>,
}

struct Client {
    events: mpsc::UnboundedSender<RelayEvent>,
    room: Option<String>,
}

struct Room {
    pin: Option<String>,
    created_at: Instant,
    members: Vec<u64>,
}

impl MemoryRelay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Registers a new endpoint.
    pub fn connect(&self) -> MemoryRelayClient {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = self.lock();
        let id = registry.next_client;
        registry.next_client += 1;
        registry.clients.insert(
            id,
            Client {
                events: tx,
                room: None,
            },
        );
        debug!("Relay client {} connected", id);
        MemoryRelayClient {
            id,
            relay: self.clone(),
            events: Mutex::new(Some(rx)),
        }
    }

    /// Number of live rooms, expired ones included until collected.
    pub fn room_count(&self) -> usize {
        self.lock().rooms.len()
    }

    /// Drops every room and client; all event streams end.
    pub fn shutdown(&self) {
        let mut registry = self.lock();
        registry.rooms.clear();
        registry.clients.clear();
        info!("Relay shut down");
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, room: &Room) -> bool {
        room.created_at.elapsed() > self.config.room_ttl
    }

    fn generate_code(&self, registry: &Registry) -> Result<String, RoomError> {
        for _ in 0..CODE_ATTEMPTS {
            let code: String = rand::rng()
                .sample_iter(&Alphanumeric)
                .take(self.config.code_length)
                .map(char::from)
                .collect();
            if !registry.rooms.contains_key(&code) {
                return Ok(code);
            }
        }
        warn!("No free room code of length {}", self.config.code_length);
        Err(RoomError::ServerFull)
    }

    fn create_room(
        &self,
        client: u64,
        code: Option<&str>,
        pin: Option<&str>,
    ) -> Result<String, RoomError> {
        let mut registry = self.lock();
        leave_room(&mut registry, client);
        registry
            .rooms
            .retain(|_, room| !room.members.is_empty() && !self.is_expired(room));

        if registry.rooms.len() >= self.config.max_rooms {
            return Err(RoomError::ServerFull);
        }
        let code = match normalize(code) {
            Some(code) => code.to_string(),
            None => self.generate_code(&registry)?,
        };
        if registry.rooms.contains_key(&code) {
            return Err(RoomError::Exists);
        }
        let pin = normalize(pin).map(str::to_string);
        if self.config.pin_required && pin.is_none() {
            return Err(RoomError::PinRequired);
        }

        registry.rooms.insert(
            code.clone(),
            Room {
                pin,
                created_at: Instant::now(),
                members: vec![client],
            },
        );
        if let Some(entry) = registry.clients.get_mut(&client) {
            entry.room = Some(code.clone());
        }
        info!("Room {} created", code);
        Ok(code)
    }

    fn join_room(
        &self,
        client: u64,
        code: &str,
        pin: Option<&str>,
    ) -> Result<JoinAck, RoomError> {
        let mut registry = self.lock();
        leave_room(&mut registry, client);
        let code = code.trim();

        let Some(room) = registry.rooms.get(code) else {
            return Err(RoomError::NotFound);
        };
        if self.is_expired(room) {
            return Err(RoomError::NotFound);
        }
        if let Some(expected) = &room.pin {
            if normalize(pin) != Some(expected.as_str()) {
                return Err(RoomError::BadPin);
            }
        }
        if room.members.len() >= 2 {
            return Err(RoomError::RoomFull);
        }

        let others = room.members.clone();
        if let Some(room) = registry.rooms.get_mut(code) {
            room.members.push(client);
        }
        if let Some(entry) = registry.clients.get_mut(&client) {
            entry.room = Some(code.to_string());
        }
        notify(&registry, &others, RelayEvent::PeerJoined);
        info!("Client {} joined room {}", client, code);
        Ok(JoinAck {
            code: code.to_string(),
            peer_already_present: !others.is_empty(),
        })
    }

    fn signal(
        &self,
        client: u64,
        message: NegotiationMessage,
    ) -> Result<(), RoomError> {
        let registry = self.lock();
        let room = registry
            .clients
            .get(&client)
            .and_then(|c| c.room.as_ref())
            .and_then(|code| registry.rooms.get(code))
            .ok_or(RoomError::NoRoom)?;
        let others: Vec<u64> = room
            .members
            .iter()
            .copied()
            .filter(|m| *m != client)
            .collect();
        debug!("Relaying {} from client {}", message.kind(), client);
        notify(&registry, &others, RelayEvent::Signal(message));
        Ok(())
    }

    fn leave(&self, client: u64) {
        leave_room(&mut self.lock(), client);
    }

    fn disconnect(&self, client: u64) {
        let mut registry = self.lock();
        leave_room(&mut registry, client);
        registry.clients.remove(&client);
        debug!("Relay client {} disconnected", client);
    }
}

/// Removes `client` from its room, telling the remaining member.
fn leave_room(registry: &mut Registry, client: u64) {
    let Some(code) = registry
        .clients
        .get_mut(&client)
        .and_then(|c| c.room.take())
    else {
        return;
    };
    let Some(room) = registry.rooms.get_mut(&code) else {
        return;
    };
    room.members.retain(|m| *m != client);
    let remaining = room.members.clone();
    if remaining.is_empty() {
        registry.rooms.remove(&code);
        debug!("Room {} removed", code);
    }
    notify(registry, &remaining, RelayEvent::PeerLeft);
}

fn notify(registry: &Registry, clients: &[u64], event: RelayEvent) {
    for id in clients {
        if let Some(client) = registry.clients.get(id) {
            let _ = client.events.send(event.clone());
        }
    }
}

fn normalize(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A [`MemoryRelay`] participant. Dropping it leaves its room.
pub struct MemoryRelayClient {
    id: u64,
    relay: MemoryRelay,
    events: Mutex<Option<mpsc::UnboundedReceiver<RelayEvent>>>,
}

impl MemoryRelayClient {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl RelayClient for MemoryRelayClient {
    fn take_event_rx(&self) -> Option<mpsc::UnboundedReceiver<RelayEvent>> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    async fn create_room(
        &self,
        code: Option<&str>,
        pin: Option<&str>,
    ) -> Result<String, RoomError> {
        self.relay.create_room(self.id, code, pin)
    }

    async fn join_room(
        &self,
        code: &str,
        pin: Option<&str>,
    ) -> Result<JoinAck, RoomError> {
        self.relay.join_room(self.id, code, pin)
    }

    async fn signal(&self, message: NegotiationMessage) -> Result<(), RoomError> {
        self.relay.signal(self.id, message)
    }

    async fn leave(&self) {
        self.relay.leave(self.id);
    }
}

impl Drop for MemoryRelayClient {
    fn drop(&mut self) {
        self.relay.disconnect(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn relay() -> MemoryRelay {
        MemoryRelay::new(RelayConfig::default())
    }

    #[tokio::test]
    async fn join_notifies_creator_only() {
        let relay = relay();
        let creator = relay.connect();
        let joiner = relay.connect();
        let mut creator_rx = creator.take_event_rx().unwrap();
        let mut joiner_rx = joiner.take_event_rx().unwrap();

        let code = creator.create_room(Some("ABCD"), None).await.unwrap();
        let ack = joiner.join_room(&code, None).await.unwrap();

        assert_eq!(code, "ABCD");
        assert!(ack.peer_already_present);
        assert_eq!(creator_rx.try_recv(), Ok(RelayEvent::PeerJoined));
        assert!(joiner_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn pin_mismatch_is_rejected_silently() {
        let relay = relay();
        let creator = relay.connect();
        let joiner = relay.connect();
        let mut creator_rx = creator.take_event_rx().unwrap();

        creator.create_room(Some("ABCD"), Some("9999")).await.unwrap();

        assert_eq!(
            joiner.join_room("ABCD", Some("1234")).await,
            Err(RoomError::BadPin)
        );
        assert_eq!(
            joiner.join_room("ABCD", None).await,
            Err(RoomError::BadPin)
        );
        assert!(creator_rx.try_recv().is_err());
        assert!(joiner.join_room("ABCD", Some("9999")).await.is_ok());
    }

    #[tokio::test]
    async fn third_participant_is_turned_away() {
        let relay = relay();
        let a = relay.connect();
        let b = relay.connect();
        let c = relay.connect();

        let code = a.create_room(None, None).await.unwrap();
        b.join_room(&code, None).await.unwrap();

        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|ch| ch.is_ascii_alphanumeric()));
        assert_eq!(c.join_room(&code, None).await, Err(RoomError::RoomFull));
        assert_eq!(
            c.join_room("nope", None).await,
            Err(RoomError::NotFound)
        );
    }

    #[tokio::test]
    async fn create_enforces_limits() {
        let relay = MemoryRelay::new(RelayConfig {
            max_rooms: 1,
            pin_required: true,
            ..RelayConfig::default()
        });
        let a = relay.connect();
        let b = relay.connect();

        assert_eq!(
            a.create_room(Some("ROOM"), Some("  ")).await,
            Err(RoomError::PinRequired)
        );
        a.create_room(Some("ROOM"), Some("42")).await.unwrap();
        assert_eq!(
            b.create_room(Some("OTHER"), Some("42")).await,
            Err(RoomError::ServerFull)
        );
    }

    #[tokio::test]
    async fn exhausted_code_space_reports_full() {
        let relay = MemoryRelay::new(RelayConfig {
            code_length: 1,
            max_rooms: 100,
            ..RelayConfig::default()
        });
        let codes: Vec<char> =
            ('0'..='9').chain('A'..='Z').chain('a'..='z').collect();
        let mut owners = Vec::new();
        for code in &codes {
            let owner = relay.connect();
            owner
                .create_room(Some(&code.to_string()), None)
                .await
                .unwrap();
            owners.push(owner);
        }
        assert_eq!(relay.room_count(), 62);

        let late = relay.connect();
        assert_eq!(
            late.create_room(None, None).await,
            Err(RoomError::ServerFull)
        );
    }

    #[tokio::test]
    async fn taken_code_is_refused() {
        let relay = relay();
        let a = relay.connect();
        let b = relay.connect();

        a.create_room(Some("SAME"), None).await.unwrap();

        assert_eq!(
            b.create_room(Some("SAME"), None).await,
            Err(RoomError::Exists)
        );
    }

    #[tokio::test]
    async fn signals_reach_the_other_participant() {
        let relay = relay();
        let a = relay.connect();
        let b = relay.connect();
        let lonely = relay.connect();
        let mut a_rx = a.take_event_rx().unwrap();
        let mut b_rx = b.take_event_rx().unwrap();
        let offer = NegotiationMessage::Offer(json!({"sdp": "x"}));

        let code = a.create_room(None, None).await.unwrap();
        b.join_room(&code, None).await.unwrap();
        a.signal(offer.clone()).await.unwrap();

        assert_eq!(b_rx.try_recv(), Ok(RelayEvent::Signal(offer.clone())));
        assert_eq!(a_rx.try_recv(), Ok(RelayEvent::PeerJoined));
        assert!(a_rx.try_recv().is_err());
        assert_eq!(lonely.signal(offer).await, Err(RoomError::NoRoom));
    }

    #[tokio::test]
    async fn leaving_and_dropping_notify_peer() {
        let relay = relay();
        let a = relay.connect();
        let b = relay.connect();
        let mut a_rx = a.take_event_rx().unwrap();

        let code = a.create_room(None, None).await.unwrap();
        b.join_room(&code, None).await.unwrap();
        drop(b);

        assert_eq!(a_rx.try_recv(), Ok(RelayEvent::PeerJoined));
        assert_eq!(a_rx.try_recv(), Ok(RelayEvent::PeerLeft));
        assert_eq!(relay.room_count(), 1);

        a.leave().await;
        assert_eq!(relay.room_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_ends_event_streams() {
        let relay = relay();
        let a = relay.connect();
        let mut a_rx = a.take_event_rx().unwrap();

        relay.shutdown();

        assert_eq!(a_rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn rooms_expire() {
        let relay = MemoryRelay::new(RelayConfig {
            room_ttl: Duration::from_secs(60),
            ..RelayConfig::default()
        });
        let a = relay.connect();
        let b = relay.connect();

        let code = a.create_room(None, None).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(b.join_room(&code, None).await, Err(RoomError::NotFound));
        b.create_room(None, None).await.unwrap();
        assert_eq!(relay.room_count(), 1);
    }
}
