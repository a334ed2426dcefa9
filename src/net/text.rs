//! Text handling for names on the wire.
//!
//! Names travel as Windows-1251 bytes. Three layouts exist: a fixed 19 byte
//! field in roster entries, a rolling bit-shifted run in the world-entry
//! packet, and the 7-bit letter codes the client uses in creation requests.

use crate::error::CodecError;
use crate::net::bits::BitCursor;

pub const ROSTER_NAME_LEN: usize = 19;
const CYRILLIC_UPPER_A: u32 = 0x0410;
const CYRILLIC_LOWER_A: u32 = 0x0430;
const CYRILLIC_UPPER_IO: char = '\u{0401}';
const CYRILLIC_LOWER_IO: char = '\u{0451}';
const CP1251_IO_UPPER: u8 = 0xa8;
const CP1251_IO_LOWER: u8 = 0xb8;
const CP1251_CYRILLIC_START: u8 = 0xc0;
const CYRILLIC_LOWER_THRESHOLD: u8 = 65;

pub fn encode_cp1251(text: &str) -> Vec<u8> {
    text.chars().map(cp1251_byte).collect()
}

pub fn decode_cp1251(bytes: &[u8]) -> String {
    bytes.iter().map(|&byte| cp1251_char(byte)).collect()
}

fn cp1251_byte(ch: char) -> u8 {
    let code = ch as u32;
    if code < 0x80 {
        return code as u8;
    }
    match ch {
        CYRILLIC_UPPER_IO => CP1251_IO_UPPER,
        CYRILLIC_LOWER_IO => CP1251_IO_LOWER,
        _ if (CYRILLIC_UPPER_A..CYRILLIC_UPPER_A + 64).contains(&code) => {
            CP1251_CYRILLIC_START + (code - CYRILLIC_UPPER_A) as u8
        }
        _ => b'?',
    }
}

fn cp1251_char(byte: u8) -> char {
    match byte {
        0x00..=0x7f => byte as char,
        CP1251_IO_UPPER => CYRILLIC_UPPER_IO,
        CP1251_IO_LOWER => CYRILLIC_LOWER_IO,
        CP1251_CYRILLIC_START..=0xff => {
            char::from_u32(CYRILLIC_UPPER_A + u32::from(byte - CP1251_CYRILLIC_START))
                .unwrap_or('?')
        }
        _ => '?',
    }
}

/// Roster names are always 19 bytes: truncated, or padded with zeros.
pub fn fixed_name(name: &str) -> [u8; ROSTER_NAME_LEN] {
    let mut field = [0u8; ROSTER_NAME_LEN];
    for (slot, byte) in field.iter_mut().zip(encode_cp1251(name)) {
        *slot = byte;
    }
    field
}

pub fn parse_fixed_name(field: &[u8]) -> String {
    let end = field.iter().position(|&byte| byte == 0).unwrap_or(field.len());
    decode_cp1251(&field[..end])
}

/// Each output byte carries seven bits of its own character and the high bit
/// of the previous one; a final byte holds the last carry.
pub fn pack_rolling(bytes: &[u8]) -> Vec<u8> {
    if bytes.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(bytes.len() + 1);
    let mut carry = 0u8;
    for &byte in bytes {
        out.push(((byte & 0x7f) << 1) | carry);
        carry = byte >> 7;
    }
    out.push(carry);
    out
}

pub fn unpack_rolling(packed: &[u8]) -> Vec<u8> {
    packed
        .windows(2)
        .map(|pair| (pair[0] >> 1) | ((pair[1] & 1) << 7))
        .collect()
}

/// Writes a world-entry name: a length byte followed by the rolling run.
pub fn write_rolling_name(cursor: &mut BitCursor, name: &str) {
    let mut raw = encode_cp1251(name);
    raw.truncate(u8::MAX as usize - 1);
    let packed = pack_rolling(&raw);
    cursor.write_int(packed.len() as u64, 8);
    cursor.write_bytes(&packed);
}

pub fn read_rolling_name(cursor: &mut BitCursor) -> Result<String, CodecError> {
    let len = cursor.read_u8()? as usize;
    let packed = cursor.read_bytes(len)?;
    Ok(decode_cp1251(&unpack_rolling(&packed)))
}

pub fn letter_code(ch: char) -> Result<u8, CodecError> {
    let code = ch as u32;
    match ch {
        'A'..='Z' => Ok(2 * (ch as u8 - b'A' + 1)),
        'a'..='z' => Ok(2 * (ch as u8 - b'a' + 27)),
        _ if (CYRILLIC_UPPER_A..CYRILLIC_LOWER_A).contains(&code) => {
            Ok(2 * (code - CYRILLIC_UPPER_A) as u8 + 1)
        }
        _ if (CYRILLIC_LOWER_A..CYRILLIC_LOWER_A + 32).contains(&code) => {
            Ok(CYRILLIC_LOWER_THRESHOLD + 2 * (code - CYRILLIC_LOWER_A) as u8)
        }
        _ => Err(CodecError::UnsupportedNameChar(ch)),
    }
}

pub fn letter_for_code(code: u8) -> Result<char, CodecError> {
    let letter = match code {
        2..=52 if code % 2 == 0 => Some((b'A' + code / 2 - 1) as char),
        54..=104 if code % 2 == 0 => Some((b'a' + code / 2 - 27) as char),
        1..=63 if code % 2 == 1 => char::from_u32(CYRILLIC_UPPER_A + u32::from(code - 1) / 2),
        65..=127 if code % 2 == 1 => char::from_u32(
            CYRILLIC_LOWER_A + u32::from(code - CYRILLIC_LOWER_THRESHOLD) / 2,
        ),
        _ => None,
    };
    letter.ok_or(CodecError::InvalidLetterCode(code))
}

/// Packs a name the way the client does inside a creation request.
pub fn encode_creation_name(name: &str) -> Result<Vec<u8>, CodecError> {
    let codes = name
        .chars()
        .map(letter_code)
        .collect::<Result<Vec<u8>, CodecError>>()?;
    let Some(&first) = codes.first() else {
        return Err(CodecError::EmptyName);
    };
    let mut run = Vec::with_capacity(codes.len().max(2));
    run.push(first >> 1);
    run.push(codes.get(1).map_or(0, |code| code << 1) | (first & 1));
    run.extend(codes.iter().skip(2).map(|code| code << 1));
    Ok(run)
}

/// Inverse of [`encode_creation_name`]. The first letter's parity bit lives in
/// the low bit of the second byte, so decoding it peeks one byte ahead.
pub fn decode_creation_name(run: &[u8]) -> Result<String, CodecError> {
    if run.len() < 2 {
        return Err(CodecError::ShortPacket {
            needed: 2,
            got: run.len(),
        });
    }
    if run[0] > 0x3f {
        return Err(CodecError::InvalidLetterCode(run[0]));
    }
    let first = (run[0] << 1) | (run[1] & 1);
    if first == 0 {
        return Err(CodecError::EmptyName);
    }
    let mut name = String::new();
    name.push(letter_for_code(first)?);
    for &byte in &run[1..] {
        let code = byte >> 1;
        if code == 0 {
            break;
        }
        name.push(letter_for_code(code)?);
    }
    Ok(name)
}
