use crate::entities::character::CharacterSlot;
use crate::net::bits::BitCursor;
use crate::net::clock_codec::write_game_time;
use crate::net::creation::{parse_create_request, CreateCharacterRequest};
use crate::net::session_ids::SessionId;
use crate::world::time::GameDateTime;

pub const GREETING: &[u8] = &[0x0A, 0x00, 0x2C, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
pub const CREDENTIALS_HEADER: &[u8] = &[0x12, 0x00, 0x2C, 0x01, 0x00, 0x00, 0x00, 0x00, 0x04];
pub const CREDENTIALS_FOOTER: &[u8] = &[0x00, 0x00, 0x00, 0x00, 0x00];
pub const SELECT_START: &[u8] = &[0x2C, 0x01, 0x00, 0x00, 0x00, 0x00, 0x03];
pub const CREATE_OK: &[u8] = &[0x0A, 0x00, 0x2C, 0x01, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00];
pub const NAME_TAKEN: &[u8] = &[0x0A, 0x00, 0x2C, 0x01, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00];
pub const AUTH_FAILED: &[u8] = &[0x0A, 0x00, 0x2C, 0x01, 0x00, 0x00, 0x00, 0x00, 0x03, 0x00];
pub const WORLD_DATA_HEADER: &[u8] = &[0x0C, 0x00, 0x2C, 0x01, 0x00, 0x00, 0x00, 0x01];
pub const WORLD_DATA_FOOTER: &[u8] = &[0x00, 0x01];
pub const TRANSMISSION_END: &[u8] = &[0x04, 0x00, 0xF4, 0x01];
pub const KEEPALIVE_SHORT: &[u8] = &[0x08, 0x00, 0x2C, 0x01, 0x00, 0x00, 0x00, 0x0A];
pub const KEEPALIVE_LONG: &[u8] = &[0x08, 0x00, 0x2C, 0x01, 0x00, 0x00, 0x00, 0x0B];

pub const DELETE_DISCRIMINATOR: u8 = 0x2A;
pub const SELECT_DISCRIMINATOR: u8 = 0x15;
pub const INGAME_ACK_STRAY: u8 = 0x13;
/// Delete and select carry the slot byte at offset 17.
pub const SLOT_BYTE: usize = 17;
pub const MIN_LOGIN_PACKET: usize = 13;

pub const PING_PREFIX: [u8; 4] = [0x08, 0x00, 0x2C, 0x01];
pub const PING_MIN_LEN: usize = 6;
pub const PING_REPLY_HEADER: [u8; 4] = [0x0C, 0x00, 0x2C, 0x01];

/// Classification of one buffer received on the character screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketKind {
    Delete { slot: CharacterSlot },
    Select { slot: CharacterSlot },
    Create(CreateCharacterRequest),
    Unknown,
}

impl PacketKind {
    pub fn decode(packet: &[u8]) -> PacketKind {
        match packet.first() {
            Some(&DELETE_DISCRIMINATOR) if packet.len() > SLOT_BYTE => {
                match CharacterSlot::from_wire(packet[SLOT_BYTE]) {
                    Some(slot) => PacketKind::Delete { slot },
                    None => PacketKind::Unknown,
                }
            }
            Some(&SELECT_DISCRIMINATOR) if packet.len() > SLOT_BYTE => {
                match CharacterSlot::from_wire(packet[SLOT_BYTE]) {
                    Some(slot) => PacketKind::Select { slot },
                    None => PacketKind::Unknown,
                }
            }
            _ => match parse_create_request(packet) {
                Ok(Some(request)) => PacketKind::Create(request),
                Ok(None) | Err(_) => PacketKind::Unknown,
            },
        }
    }
}

pub fn credentials_packet(time: &GameDateTime) -> Vec<u8> {
    let mut cursor = BitCursor::with_capacity(
        CREDENTIALS_HEADER.len() + 4 + CREDENTIALS_FOOTER.len(),
    );
    cursor.write_bytes(CREDENTIALS_HEADER);
    write_game_time(&mut cursor, time);
    cursor.write_bytes(CREDENTIALS_FOOTER);
    cursor.into_bytes()
}

pub fn world_data_packet(session: SessionId) -> Vec<u8> {
    let mut cursor = BitCursor::with_capacity(WORLD_DATA_HEADER.len() + 2 + WORLD_DATA_FOOTER.len());
    cursor.write_bytes(WORLD_DATA_HEADER);
    cursor.write_int(u64::from(session.get()), 16);
    cursor.write_bytes(WORLD_DATA_FOOTER);
    cursor.into_bytes()
}

pub fn is_ping(packet: &[u8]) -> bool {
    packet.len() >= PING_MIN_LEN && packet.starts_with(&PING_PREFIX)
}

/// Builds ping replies. The toggle flips and the counter advances on every
/// reply, so replies depend on how many pings came before.
#[derive(Debug, Default)]
pub struct PingResponder {
    toggle: bool,
    counter: u16,
}

impl PingResponder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replies_sent(&self) -> u16 {
        self.counter
    }

    /// Returns `None` for anything that is not a client ping.
    pub fn respond(&mut self, ping: &[u8]) -> Option<Vec<u8>> {
        if !is_ping(ping) {
            return None;
        }
        self.toggle = !self.toggle;
        self.counter = self.counter.wrapping_add(1);
        let mut reply = Vec::with_capacity(PING_REPLY_HEADER.len() + 5);
        reply.extend_from_slice(&PING_REPLY_HEADER);
        reply.push(u8::from(self.toggle));
        reply.extend_from_slice(&self.counter.to_le_bytes());
        reply.extend_from_slice(&ping[4..6]);
        Some(reply)
    }
}

pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (index, byte) in bytes.iter().enumerate() {
        if index > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
