pub mod bits;
pub mod clock_codec;
pub mod coords;
pub mod creation;
pub mod fields;
pub mod handshake;
pub mod ingame;
pub mod login;
pub mod login_flow;
pub mod packets;
pub mod roster;
pub mod server;
pub mod session_ids;
pub mod state;
pub mod text;
pub mod transport;
pub mod world_entry;
