use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::config::SessionTimings;
use crate::entities::character::{CharacterSlot, CharacterSnapshot};
use crate::error::HandshakeError;
use crate::net::login_flow::{handle_login_payload, LoginDecision, LoginRejection};
use crate::net::packets::{
    credentials_packet, hex_dump, world_data_packet, PacketKind, AUTH_FAILED, CREATE_OK,
    GREETING, INGAME_ACK_STRAY, MIN_LOGIN_PACKET, NAME_TAKEN,
};
use crate::net::roster::encode_roster;
use crate::net::session_ids::{SessionId, SessionIdPool};
use crate::net::state::{ConnectionState, ConnectionStateMachine};
use crate::net::transport::{RecvOutcome, Transport};
use crate::net::world_entry::encode_world_entry;
use crate::persistence::store::{CharacterStore, CreateOutcome, Storage};
use crate::world::time::GameClock;

/// State shared by every connection, built once at startup.
pub struct ServerContext {
    pub states: ConnectionStateMachine,
    pub session_ids: SessionIdPool,
    pub store: Arc<dyn Storage>,
    pub clock: GameClock,
    pub timings: SessionTimings,
}

impl ServerContext {
    pub fn new(
        store: Arc<dyn Storage>,
        clock: GameClock,
        timings: SessionTimings,
        session_ids: SessionIdPool,
    ) -> Self {
        Self {
            states: ConnectionStateMachine::new(),
            session_ids,
            store,
            clock,
            timings,
        }
    }
}

/// Everything one connection's handshake owns.
pub struct HandshakeContext<T: Transport> {
    transport: T,
    session: SessionId,
    login: Option<String>,
    character: Option<CharacterSnapshot>,
    server: Arc<ServerContext>,
    stop: Arc<AtomicBool>,
    buf: Vec<u8>,
}

impl<T: Transport> HandshakeContext<T> {
    pub fn new(
        transport: T,
        session: SessionId,
        server: Arc<ServerContext>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let buf = vec![0u8; server.timings.max_packet];
        Self {
            transport,
            session,
            login: None,
            character: None,
            server,
            stop,
            buf,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn timings(&self) -> SessionTimings {
        self.server.timings
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn authenticated_login(&self) -> Result<String, HandshakeError> {
        self.login.clone().ok_or(HandshakeError::NotAuthenticated)
    }

    pub fn send(&mut self, bytes: &[u8], what: &'static str) -> Result<(), HandshakeError> {
        trace!(session = %self.session, what, len = bytes.len(), bytes = %hex_dump(bytes), "send");
        self.transport.send(bytes)?;
        Ok(())
    }

    pub fn transition(&self, target: ConnectionState) -> Result<(), HandshakeError> {
        self.server.states.transition(self.session, target)?;
        debug!(session = %self.session, state = ?target, "state advanced");
        Ok(())
    }

    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), HandshakeError> {
        self.transport.set_read_timeout(Some(timeout))?;
        Ok(())
    }

    /// One receive. `Ok(None)` is a poll timeout.
    pub fn recv_once(&mut self) -> Result<Option<Vec<u8>>, HandshakeError> {
        if self.stop_requested() {
            return Err(HandshakeError::Stopped);
        }
        match self.transport.recv(&mut self.buf)? {
            RecvOutcome::Data(n) => {
                let packet = self.buf[..n].to_vec();
                trace!(session = %self.session, len = n, bytes = %hex_dump(&packet), "recv");
                Ok(Some(packet))
            }
            RecvOutcome::Timeout => Ok(None),
            RecvOutcome::Closed => Err(HandshakeError::ConnectionClosed),
        }
    }

    /// Polls until a packet arrives, the optional limit passes, or the
    /// connection is stopped.
    pub fn recv_packet(
        &mut self,
        limit: Option<Duration>,
        what: &'static str,
    ) -> Result<Vec<u8>, HandshakeError> {
        let deadline = limit.map(|limit| Instant::now() + limit);
        loop {
            if let Some(packet) = self.recv_once()? {
                return Ok(packet);
            }
            if deadline.map_or(false, |deadline| Instant::now() >= deadline) {
                return Err(HandshakeError::Timeout(what));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStep {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenOutcome {
    EnterWorld,
    Deleted(CharacterSlot),
    NameTaken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeExit {
    InGame,
    AuthFailed,
    Deleted(CharacterSlot),
    NameTaken,
}

pub fn send_credentials<T: Transport>(ctx: &mut HandshakeContext<T>) -> Result<(), HandshakeError> {
    ctx.send(GREETING, "greeting")?;
    ctx.transition(ConnectionState::ReadyForInitialData)?;
    let now = ctx.server.clock.now();
    ctx.send(&credentials_packet(&now), "credentials")?;
    ctx.transition(ConnectionState::WaitingForLoginData)?;
    Ok(())
}

pub fn wait_for_login<T: Transport>(
    ctx: &mut HandshakeContext<T>,
) -> Result<Vec<u8>, HandshakeError> {
    let timings = ctx.timings();
    ctx.set_read_timeout(timings.poll)?;
    let deadline = timings.login.map(|limit| Instant::now() + limit);
    loop {
        let remaining = deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()));
        if remaining == Some(Duration::ZERO) {
            return Err(HandshakeError::Timeout("login"));
        }
        let packet = ctx.recv_packet(remaining, "login")?;
        if packet.len() >= MIN_LOGIN_PACKET {
            return Ok(packet);
        }
        trace!(session = %ctx.session, len = packet.len(), "ignoring short packet before login");
    }
}

pub fn authenticate<T: Transport>(
    ctx: &mut HandshakeContext<T>,
    payload: &[u8],
) -> Result<AuthStep, HandshakeError> {
    match handle_login_payload(payload, &*ctx.server.store)? {
        LoginDecision::Accepted { login, registered } => {
            if !ctx.server.states.set_authenticated_login(ctx.session, &login) {
                debug!(session = %ctx.session, "login recorded for untracked session");
            }
            info!(session = %ctx.session, login = %login, registered, "login accepted");
            ctx.login = Some(login);
            Ok(AuthStep::Accepted)
        }
        LoginDecision::Rejected(rejection) => {
            match &rejection {
                LoginRejection::Malformed(err) => {
                    warn!(session = %ctx.session, error = %err, "malformed login payload")
                }
                LoginRejection::WrongPassword { login } => {
                    info!(session = %ctx.session, login = %login, "wrong password")
                }
            }
            ctx.send(AUTH_FAILED, "auth failed")?;
            Ok(AuthStep::Rejected)
        }
    }
}

pub fn send_roster<T: Transport>(ctx: &mut HandshakeContext<T>) -> Result<(), HandshakeError> {
    let login = ctx.authenticated_login()?;
    let roster = ctx.server.store.roster(&login)?;
    ctx.transition(ConnectionState::WaitingForCharacterSelect)?;
    ctx.send(&encode_roster(&roster), "roster")?;
    Ok(())
}

pub fn screen_interaction<T: Transport>(
    ctx: &mut HandshakeContext<T>,
) -> Result<ScreenOutcome, HandshakeError> {
    let login = ctx.authenticated_login()?;
    let timings = ctx.timings();
    ctx.set_read_timeout(timings.poll)?;
    let store = Arc::clone(&ctx.server.store);
    loop {
        let packet = ctx.recv_packet(timings.screen, "character screen")?;
        match PacketKind::decode(&packet) {
            PacketKind::Delete { slot } => {
                let removed = store.delete(&login, slot)?;
                info!(session = %ctx.session, login = %login, slot = slot.index(), removed, "character deleted");
                return Ok(ScreenOutcome::Deleted(slot));
            }
            PacketKind::Select { slot } => match store.load(&login, slot)? {
                Some(character) => {
                    info!(session = %ctx.session, login = %login, name = %character.name, "character selected");
                    ctx.character = Some(character);
                    return Ok(ScreenOutcome::EnterWorld);
                }
                None => {
                    debug!(session = %ctx.session, slot = slot.index(), "select on empty slot");
                }
            },
            PacketKind::Create(request) => {
                if store.name_exists(&request.name)? {
                    info!(session = %ctx.session, name = %request.name, "name taken");
                    ctx.send(NAME_TAKEN, "name taken")?;
                    return Ok(ScreenOutcome::NameTaken);
                }
                let character = CharacterSnapshot::new_character(&request.name, request.appearance);
                match store.create(&login, request.slot, character.clone())? {
                    CreateOutcome::Created => {
                        info!(session = %ctx.session, login = %login, name = %character.name, "character created");
                        ctx.send(CREATE_OK, "create ok")?;
                        ctx.character = Some(character);
                        return Ok(ScreenOutcome::EnterWorld);
                    }
                    CreateOutcome::NameTaken => {
                        ctx.send(NAME_TAKEN, "name taken")?;
                        return Ok(ScreenOutcome::NameTaken);
                    }
                    CreateOutcome::SlotOccupied => {
                        debug!(session = %ctx.session, slot = request.slot.index(), "create on occupied slot");
                    }
                }
            }
            PacketKind::Unknown => {
                trace!(session = %ctx.session, len = packet.len(), "ignoring screen packet");
            }
        }
    }
}

pub fn enter_game<T: Transport>(ctx: &mut HandshakeContext<T>) -> Result<(), HandshakeError> {
    let character = ctx.character.as_ref().ok_or(HandshakeError::NoCharacter)?;
    let packet = encode_world_entry(ctx.session, character)?;
    ctx.transition(ConnectionState::WaitingForIngameAck)?;
    ctx.send(&packet, "world entry")?;
    Ok(())
}

pub fn await_ingame_ack<T: Transport>(ctx: &mut HandshakeContext<T>) -> Result<(), HandshakeError> {
    let timings = ctx.timings();
    ctx.set_read_timeout(timings.poll)?;
    let deadline = timings.ingame_ack.map(|limit| Instant::now() + limit);
    loop {
        let remaining = deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()));
        if remaining == Some(Duration::ZERO) {
            return Err(HandshakeError::Timeout("ingame ack"));
        }
        let packet = ctx.recv_packet(remaining, "ingame ack")?;
        if packet.first() == Some(&INGAME_ACK_STRAY) {
            continue;
        }
        break;
    }
    ctx.transition(ConnectionState::InGame)?;
    ctx.send(&world_data_packet(ctx.session), "world data")?;
    Ok(())
}

/// Runs every handshake step in order. Domain rejections end the handshake
/// with an exit value; transport and state failures are errors.
pub fn run_handshake<T: Transport>(
    ctx: &mut HandshakeContext<T>,
) -> Result<HandshakeExit, HandshakeError> {
    send_credentials(ctx)?;
    let payload = wait_for_login(ctx)?;
    if authenticate(ctx, &payload)? == AuthStep::Rejected {
        return Ok(HandshakeExit::AuthFailed);
    }
    send_roster(ctx)?;
    match screen_interaction(ctx)? {
        ScreenOutcome::EnterWorld => {}
        ScreenOutcome::Deleted(slot) => return Ok(HandshakeExit::Deleted(slot)),
        ScreenOutcome::NameTaken => return Ok(HandshakeExit::NameTaken),
    }
    enter_game(ctx)?;
    await_ingame_ack(ctx)?;
    Ok(HandshakeExit::InGame)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::entities::character::Appearance;
    use crate::error::StateError;
    use crate::net::creation::{build_create_request, CreateCharacterRequest};
    use crate::net::login::build_login_payload;
    use crate::net::packets::{DELETE_DISCRIMINATOR, SELECT_DISCRIMINATOR, SLOT_BYTE};
    use crate::net::transport::scripted::{Incoming, ScriptedTransport};
    use crate::net::world_entry::{decode_world_entry, WORLD_ENTRY_HEADER};
    use crate::persistence::store::{MemoryStore, UserStore};
    use std::sync::Mutex;

    pub(crate) fn test_timings() -> SessionTimings {
        SessionTimings {
            poll: Duration::from_millis(5),
            ..SessionTimings::default()
        }
    }

    pub(crate) fn server_with_timings(
        store: Arc<MemoryStore>,
        timings: SessionTimings,
    ) -> Arc<ServerContext> {
        Arc::new(ServerContext::new(
            store,
            GameClock::default(),
            timings,
            SessionIdPool::default(),
        ))
    }

    pub(crate) fn server_with(store: Arc<MemoryStore>) -> Arc<ServerContext> {
        server_with_timings(store, test_timings())
    }

    fn slot(index: usize) -> CharacterSlot {
        CharacterSlot::new(index).expect("slot")
    }

    fn screen_packet(discriminator: u8, slot_byte: u8) -> Vec<u8> {
        let mut packet = vec![0u8; 18];
        packet[0] = discriminator;
        packet[SLOT_BYTE] = slot_byte;
        packet
    }

    struct Harness {
        ctx: HandshakeContext<ScriptedTransport>,
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        server: Arc<ServerContext>,
    }

    fn harness(store: Arc<MemoryStore>, script: Vec<Incoming>) -> Harness {
        let server = server_with(store);
        let session = server.session_ids.allocate().expect("session");
        server.states.add(session);
        let transport = ScriptedTransport::new(script);
        let sent = transport.sent_log();
        let ctx = HandshakeContext::new(
            transport,
            session,
            Arc::clone(&server),
            Arc::new(AtomicBool::new(false)),
        );
        Harness { ctx, sent, server }
    }

    fn login_packet() -> Vec<u8> {
        build_login_payload("user", "pass", 40).expect("login payload")
    }

    fn store_with_hero() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .create(
                "user",
                slot(0),
                CharacterSnapshot::new_character("Hero", Appearance::default()),
            )
            .expect("seed");
        store
    }

    fn world_entries(sent: &[Vec<u8>]) -> Vec<Vec<u8>> {
        sent.iter()
            .filter(|packet| packet.starts_with(&WORLD_ENTRY_HEADER))
            .cloned()
            .collect()
    }

    #[test]
    fn select_slot_zero_reaches_in_game() {
        let mut h = harness(
            store_with_hero(),
            vec![
                Incoming::Packet(vec![0x01, 0x02]),
                Incoming::Timeout,
                Incoming::Packet(login_packet()),
                Incoming::Packet(vec![0x00; 4]),
                Incoming::Packet(screen_packet(SELECT_DISCRIMINATOR, 4)),
                Incoming::Packet(vec![INGAME_ACK_STRAY, 0x00, 0x00]),
                Incoming::Packet(vec![0x20, 0x00, 0x2C, 0x01]),
            ],
        );
        let exit = run_handshake(&mut h.ctx).expect("handshake");
        assert_eq!(exit, HandshakeExit::InGame);
        let session = h.ctx.session();
        assert_eq!(h.server.states.get(session), Some(ConnectionState::InGame));
        assert_eq!(h.server.states.authenticated_login(session).as_deref(), Some("user"));

        let sent = h.sent.lock().expect("sent").clone();
        assert_eq!(sent[0], GREETING);
        let entries = world_entries(&sent);
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(usize::from(entry[entry.len() - 1]), entry.len() % 256);
        let view = decode_world_entry(entry).expect("decode");
        assert_eq!(view.session, session);
        assert_eq!(view.character.name, "Hero");
        assert_eq!(sent.last(), Some(&world_data_packet(session)));
    }

    #[test]
    fn delete_slot_one_never_enters_world() {
        let store = Arc::new(MemoryStore::new());
        store
            .create(
                "user",
                slot(1),
                CharacterSnapshot::new_character("Doomed", Appearance::default()),
            )
            .expect("seed");
        let mut h = harness(
            Arc::clone(&store),
            vec![
                Incoming::Packet(login_packet()),
                Incoming::Packet(screen_packet(DELETE_DISCRIMINATOR, 8)),
                Incoming::Packet(screen_packet(SELECT_DISCRIMINATOR, 8)),
            ],
        );
        let exit = run_handshake(&mut h.ctx).expect("handshake");
        assert_eq!(exit, HandshakeExit::Deleted(slot(1)));
        assert!(store.load("user", slot(1)).expect("load").is_none());
        assert!(world_entries(&h.sent.lock().expect("sent")).is_empty());
        assert_eq!(
            h.server.states.get(h.ctx.session()),
            Some(ConnectionState::WaitingForCharacterSelect)
        );
    }

    #[test]
    fn wrong_password_sends_auth_failed() {
        let store = Arc::new(MemoryStore::new());
        store
            .authenticate_or_register("user", "other")
            .expect("register");
        let mut h = harness(store, vec![Incoming::Packet(login_packet())]);
        assert_eq!(run_handshake(&mut h.ctx).expect("handshake"), HandshakeExit::AuthFailed);
        let sent = h.sent.lock().expect("sent");
        assert_eq!(sent.last().map(Vec::as_slice), Some(AUTH_FAILED));
        assert_eq!(h.server.states.authenticated_login(h.ctx.session()), None);
    }

    #[test]
    fn create_then_enter_world() {
        let store = Arc::new(MemoryStore::new());
        let request = CreateCharacterRequest {
            slot: slot(2),
            appearance: Appearance::default(),
            name: "Ярослав".to_string(),
        };
        let mut h = harness(
            Arc::clone(&store),
            vec![
                Incoming::Packet(login_packet()),
                Incoming::Packet(vec![0x99; 20]),
                Incoming::Packet(screen_packet(SELECT_DISCRIMINATOR, 4)),
                Incoming::Packet(build_create_request(&request).expect("create")),
                Incoming::Packet(vec![0x20, 0x00]),
            ],
        );
        assert_eq!(run_handshake(&mut h.ctx).expect("handshake"), HandshakeExit::InGame);
        let sent = h.sent.lock().expect("sent").clone();
        assert!(sent.iter().any(|packet| packet == CREATE_OK));
        assert_eq!(world_entries(&sent).len(), 1);
        assert_eq!(
            store.load("user", slot(2)).expect("load").map(|c| c.name),
            Some("Ярослав".to_string())
        );
    }

    #[test]
    fn taken_name_ends_handshake() {
        let store = store_with_hero();
        let request = CreateCharacterRequest {
            slot: slot(1),
            appearance: Appearance::default(),
            name: "hero".to_string(),
        };
        let mut h = harness(
            store,
            vec![
                Incoming::Packet(login_packet()),
                Incoming::Packet(build_create_request(&request).expect("create")),
            ],
        );
        assert_eq!(run_handshake(&mut h.ctx).expect("handshake"), HandshakeExit::NameTaken);
        let sent = h.sent.lock().expect("sent");
        assert_eq!(sent.last().map(Vec::as_slice), Some(NAME_TAKEN));
        assert!(world_entries(&sent).is_empty());
    }

    #[test]
    fn peer_closing_is_a_transport_failure() {
        let mut h = harness(store_with_hero(), vec![Incoming::Timeout]);
        assert!(matches!(
            run_handshake(&mut h.ctx),
            Err(HandshakeError::ConnectionClosed)
        ));
    }

    #[test]
    fn out_of_order_step_is_a_state_error() {
        let mut h = harness(store_with_hero(), Vec::new());
        h.ctx.login = Some("user".to_string());
        h.ctx.character = Some(CharacterSnapshot::new_character("Hero", Appearance::default()));
        assert!(matches!(
            enter_game(&mut h.ctx),
            Err(HandshakeError::State(StateError::Transition { .. }))
        ));
        assert!(h.sent.lock().expect("sent").is_empty());
        assert_eq!(h.server.states.get(h.ctx.session()), Some(ConnectionState::Base));
    }

    #[test]
    fn stop_flag_interrupts_waiting() {
        let mut h = harness(store_with_hero(), vec![Incoming::Timeout; 8]);
        h.ctx.stop.store(true, Ordering::SeqCst);
        send_credentials(&mut h.ctx).expect("credentials");
        assert!(matches!(wait_for_login(&mut h.ctx), Err(HandshakeError::Stopped)));
    }
}
