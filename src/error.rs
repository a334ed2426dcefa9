use std::io;

use thiserror::Error;

use crate::net::session_ids::SessionId;
use crate::net::state::ConnectionState;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of data: needed {needed} bits, {available} available")]
    UnexpectedEnd { needed: usize, available: usize },

    #[error("coordinate {0} cannot be encoded")]
    CoordinateOutOfRange(String),

    #[error("unsupported character {0:?} in name")]
    UnsupportedNameChar(char),

    #[error("invalid letter code 0x{0:02x}")]
    InvalidLetterCode(u8),

    #[error("empty name")]
    EmptyName,

    #[error("packet too short: need {needed} bytes, got {got}")]
    ShortPacket { needed: usize, got: usize },

    #[error("slot byte 0x{0:02x} does not name a character slot")]
    InvalidSlot(u8),

    #[error("unexpected {0} framing")]
    BadFrame(&'static str),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("illegal state transition for session {session}: {from:?} -> {to:?}")]
    Transition {
        session: SessionId,
        from: ConnectionState,
        to: ConnectionState,
    },

    #[error("session {0} is not tracked")]
    UnknownSession(SessionId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginParseError {
    #[error("login payload too short ({0} bytes)")]
    TooShort(usize),

    #[error("login payload is missing the credential delimiter")]
    MissingDelimiter,

    #[error("login payload has an empty {0}")]
    EmptyField(&'static str),

    #[error("undecodable byte 0x{byte:02x} in {field}")]
    BadByte { field: &'static str, byte: u8 },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage i/o error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("storage format error at {path}: {message}")]
    Format { path: String, message: String },

    #[error("invalid character slot {0}")]
    InvalidSlot(usize),
}

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("no character selected for world entry")]
    NoCharacter,

    #[error("session has no authenticated login")]
    NotAuthenticated,

    #[error("server is stopping")]
    Stopped,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("bind {addr} failed: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("listener setup failed: {0}")]
    Listener(#[source] io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("signal handler install failed: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
