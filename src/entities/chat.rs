/// Chat channels as the client numbers them.
///
/// `Group` and `Gm` share wire code 0x05 in the client's own table. Both are
/// kept; decoding the shared code yields `Group`. Needs confirming against a
/// live client before anything routes on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatType {
    Say,
    Whisper,
    Shout,
    Clan,
    Trade,
    Group,
    Gm,
    System,
}

pub const CHAT_CODE_SHARED: u8 = 0x05;

impl ChatType {
    pub fn code(self) -> u8 {
        match self {
            ChatType::Say => 0x00,
            ChatType::Whisper => 0x01,
            ChatType::Shout => 0x02,
            ChatType::Clan => 0x03,
            ChatType::Trade => 0x04,
            ChatType::Group | ChatType::Gm => CHAT_CODE_SHARED,
            ChatType::System => 0x06,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(ChatType::Say),
            0x01 => Some(ChatType::Whisper),
            0x02 => Some(ChatType::Shout),
            0x03 => Some(ChatType::Clan),
            0x04 => Some(ChatType::Trade),
            CHAT_CODE_SHARED => Some(ChatType::Group),
            0x06 => Some(ChatType::System),
            _ => None,
        }
    }

    pub fn shares_code_with(self, other: ChatType) -> bool {
        self != other && self.code() == other.code()
    }
}
