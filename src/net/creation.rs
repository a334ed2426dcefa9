use crate::entities::character::{Appearance, CharacterSlot, Gender};
use crate::error::CodecError;
use crate::net::packets::SLOT_BYTE;
use crate::net::text::{decode_creation_name, encode_creation_name};

pub const CREATE_MIN_LEN: usize = 0x1B;
pub const CREATE_MARKER: [u8; 4] = [0x08, 0x40, 0x80, 0x05];
const MARKER_OFFSET: usize = 13;
const APPEARANCE_OFFSET: usize = 18;
const NAME_OFFSET: usize = 22;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCharacterRequest {
    pub slot: CharacterSlot,
    pub appearance: Appearance,
    pub name: String,
}

/// `Ok(None)` when the buffer is not shaped like a creation request at all.
pub fn parse_create_request(packet: &[u8]) -> Result<Option<CreateCharacterRequest>, CodecError> {
    if packet.len() < CREATE_MIN_LEN
        || packet[MARKER_OFFSET..MARKER_OFFSET + CREATE_MARKER.len()] != CREATE_MARKER
    {
        return Ok(None);
    }
    let slot = CharacterSlot::from_wire(packet[SLOT_BYTE])
        .ok_or(CodecError::InvalidSlot(packet[SLOT_BYTE]))?;
    let looks = packet[APPEARANCE_OFFSET];
    let hair = packet[APPEARANCE_OFFSET + 1];
    let appearance = Appearance {
        gender: Gender::from_code(looks >> 6),
        face: looks & 0x3f,
        hair_style: hair >> 2,
        hair_color: packet[APPEARANCE_OFFSET + 2],
        tattoo: packet[APPEARANCE_OFFSET + 3],
    };
    let name = decode_creation_name(&packet[NAME_OFFSET..])?;
    Ok(Some(CreateCharacterRequest {
        slot,
        appearance,
        name,
    }))
}

/// Client-side layout of a creation request; used by tooling and tests.
pub fn build_create_request(request: &CreateCharacterRequest) -> Result<Vec<u8>, CodecError> {
    let run = encode_creation_name(&request.name)?;
    let mut packet = vec![0u8; NAME_OFFSET];
    packet[0] = CREATE_MARKER[0];
    packet[MARKER_OFFSET..MARKER_OFFSET + CREATE_MARKER.len()].copy_from_slice(&CREATE_MARKER);
    packet[SLOT_BYTE] = request.slot.to_wire();
    let appearance = &request.appearance;
    packet[APPEARANCE_OFFSET] = (appearance.gender.code() << 6) | (appearance.face & 0x3f);
    packet[APPEARANCE_OFFSET + 1] = (appearance.hair_style & 0x3f) << 2;
    packet[APPEARANCE_OFFSET + 2] = appearance.hair_color;
    packet[APPEARANCE_OFFSET + 3] = appearance.tattoo;
    packet.extend_from_slice(&run);
    packet.push(0);
    if packet.len() < CREATE_MIN_LEN {
        packet.resize(CREATE_MIN_LEN, 0);
    }
    Ok(packet)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, slot: usize) -> CreateCharacterRequest {
        CreateCharacterRequest {
            slot: CharacterSlot::new(slot).expect("slot"),
            appearance: Appearance {
                gender: Gender::Female,
                face: 12,
                hair_style: 33,
                hair_color: 200,
                tattoo: 4,
            },
            name: name.to_string(),
        }
    }

    #[test]
    fn parses_ascii_creation() {
        let original = request("Hero", 2);
        let packet = build_create_request(&original).expect("build");
        assert!(packet.len() >= CREATE_MIN_LEN);
        assert_eq!(parse_create_request(&packet).expect("parse"), Some(original));
    }

    #[test]
    fn parses_cyrillic_creation_with_first_letter_parity() {
        // 'Я' has an odd code, so its low bit rides in the second byte.
        let original = request("Ярослав", 0);
        let packet = build_create_request(&original).expect("build");
        assert_eq!(parse_create_request(&packet).expect("parse"), Some(original));
    }

    #[test]
    fn single_letter_name_survives() {
        let original = request("Б", 1);
        let packet = build_create_request(&original).expect("build");
        assert_eq!(parse_create_request(&packet).expect("parse"), Some(original));
    }

    #[test]
    fn wrong_marker_or_short_packet_is_not_a_creation() {
        let mut packet = build_create_request(&request("Hero", 0)).expect("build");
        packet[MARKER_OFFSET] = 0x09;
        assert_eq!(parse_create_request(&packet).expect("parse"), None);
        assert_eq!(parse_create_request(&[0u8; CREATE_MIN_LEN - 1]).expect("parse"), None);
    }

    #[test]
    fn bad_slot_is_an_error() {
        let mut packet = build_create_request(&request("Hero", 0)).expect("build");
        packet[SLOT_BYTE] = 0x40;
        assert_eq!(
            parse_create_request(&packet),
            Err(CodecError::InvalidSlot(0x40))
        );
    }
}
