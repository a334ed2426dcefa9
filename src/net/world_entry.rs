use std::f64::consts::TAU;

use crate::entities::character::{CharacterSnapshot, WorldPosition};
use crate::error::CodecError;
use crate::net::bits::BitCursor;
use crate::net::coords::{decode_coordinate, encode_coordinate};
use crate::net::fields::{
    read_appearance, read_item_slots, read_split14, write_appearance, write_item_slots,
    write_split14,
};
use crate::net::session_ids::SessionId;
use crate::net::text::{read_rolling_name, write_rolling_name};

pub const WORLD_ENTRY_HEADER: [u8; 5] = [0x7A, 0x00, 0x2C, 0x01, 0x00];
pub const WORLD_ENTRY_FOOTER: [u8; 3] = [0x00, 0x00, 0x2C];

pub fn encode_angle(angle: f64) -> u8 {
    if !angle.is_finite() {
        return 0;
    }
    ((angle / TAU * 256.0).round() as i64).rem_euclid(256) as u8
}

pub fn decode_angle(byte: u8) -> f64 {
    f64::from(byte) / 256.0 * TAU
}

/// Builds the packet that moves a session from character select into the
/// world. The final byte is patched to the packet length modulo 256 once the
/// rest is assembled.
pub fn encode_world_entry(
    session: SessionId,
    character: &CharacterSnapshot,
) -> Result<Vec<u8>, CodecError> {
    let position = &character.position;
    let x = encode_coordinate(position.x)?;
    let y = encode_coordinate(position.y)?;
    let z = encode_coordinate(position.z)?;

    let mut cursor = BitCursor::with_capacity(160);
    cursor.write_bytes(&WORLD_ENTRY_HEADER);
    cursor.write_int(u64::from(session.get()), 16);
    cursor.write_bytes(&x);
    cursor.write_bytes(&y);
    cursor.write_bytes(&z);
    cursor.write_int(u64::from(encode_angle(position.angle)), 8);

    write_split14(&mut cursor, character.health);
    write_split14(&mut cursor, character.max_health);
    write_split14(&mut cursor, character.mana);
    write_split14(&mut cursor, character.max_mana);
    cursor.write_int(u64::from(character.satiety), 8);
    for stat in character.primary.as_array() {
        cursor.write_int(u64::from(stat), 8);
    }
    for stat in character.elemental.as_array() {
        cursor.write_int(u64::from(stat), 8);
    }
    let experience = &character.experience;
    cursor.write_int(u64::from(experience.title_level), 8);
    cursor.write_int(u64::from(experience.title_xp), 32);
    cursor.write_int(u64::from(experience.degree_level), 8);
    cursor.write_int(u64::from(experience.degree_xp), 32);
    cursor.write_int(u64::from(character.stat_points), 16);
    cursor.write_int(u64::from(character.money), 32);
    cursor.write_int(u64::from(character.karma), 8);
    cursor.write_int(u64::from(character.clan_id), 16);
    cursor.write_int(u64::from(character.guild_id), 16);
    cursor.write_int(u64::from(character.clan_rank), 8);
    write_appearance(&mut cursor, &character.appearance);
    write_rolling_name(&mut cursor, &character.name);
    write_item_slots(&mut cursor, &character.equipment);
    cursor.write_bytes(&WORLD_ENTRY_FOOTER);
    cursor.write_int(0, 8);

    let mut packet = cursor.into_bytes();
    let len = packet.len();
    packet[len - 1] = (len % 256) as u8;
    Ok(packet)
}

/// Parsed world-entry packet, as a client would see it.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldEntryView {
    pub session: SessionId,
    pub character: CharacterSnapshot,
    pub length_byte: u8,
}

pub fn decode_world_entry(packet: &[u8]) -> Result<WorldEntryView, CodecError> {
    let mut cursor = BitCursor::from_bytes(packet.to_vec());
    if cursor.read_bytes(WORLD_ENTRY_HEADER.len())? != WORLD_ENTRY_HEADER {
        return Err(CodecError::BadFrame("world entry header"));
    }
    let session = SessionId(cursor.read_int(16)? as u16);
    let mut coordinates = [0.0f64; 3];
    for coordinate in coordinates.iter_mut() {
        let bytes = cursor.read_bytes(4)?;
        *coordinate = decode_coordinate([bytes[0], bytes[1], bytes[2], bytes[3]]);
    }
    let angle = decode_angle(cursor.read_u8()?);

    let mut character = CharacterSnapshot {
        position: WorldPosition {
            x: coordinates[0],
            y: coordinates[1],
            z: coordinates[2],
            angle,
        },
        ..CharacterSnapshot::default()
    };
    character.health = read_split14(&mut cursor)?;
    character.max_health = read_split14(&mut cursor)?;
    character.mana = read_split14(&mut cursor)?;
    character.max_mana = read_split14(&mut cursor)?;
    character.satiety = cursor.read_u8()?;
    let primary = &mut character.primary;
    for stat in [
        &mut primary.strength,
        &mut primary.agility,
        &mut primary.accuracy,
        &mut primary.endurance,
        &mut primary.perception,
        &mut primary.luck,
    ] {
        *stat = cursor.read_u8()?;
    }
    let elemental = &mut character.elemental;
    for stat in [
        &mut elemental.earth,
        &mut elemental.water,
        &mut elemental.air,
        &mut elemental.fire,
    ] {
        *stat = cursor.read_u8()?;
    }
    character.experience.title_level = cursor.read_u8()?;
    character.experience.title_xp = cursor.read_int(32)? as u32;
    character.experience.degree_level = cursor.read_u8()?;
    character.experience.degree_xp = cursor.read_int(32)? as u32;
    character.stat_points = cursor.read_int(16)? as u16;
    character.money = cursor.read_int(32)? as u32;
    character.karma = cursor.read_u8()?;
    character.clan_id = cursor.read_int(16)? as u16;
    character.guild_id = cursor.read_int(16)? as u16;
    character.clan_rank = cursor.read_u8()?;
    character.appearance = read_appearance(&mut cursor)?;
    character.name = read_rolling_name(&mut cursor)?;
    character.equipment = read_item_slots(&mut cursor)?;
    if cursor.read_bytes(WORLD_ENTRY_FOOTER.len())? != WORLD_ENTRY_FOOTER {
        return Err(CodecError::BadFrame("world entry footer"));
    }
    let length_byte = cursor.read_u8()?;
    Ok(WorldEntryView {
        session,
        character,
        length_byte,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::character::{Appearance, Gender};
    use crate::entities::equipment::{EquipmentSlot, ItemId};

    fn warrior() -> CharacterSnapshot {
        let mut character = CharacterSnapshot::new_character(
            "Воин",
            Appearance {
                gender: Gender::Male,
                face: 2,
                hair_style: 7,
                hair_color: 11,
                tattoo: 0,
            },
        );
        character.health = 950;
        character.max_health = 1200;
        character.mana = 40;
        character.max_mana = 300;
        character.money = 123_456;
        character.experience.title_xp = 70_000;
        character.experience.degree_xp = 9;
        character.stat_points = 513;
        character.clan_id = 0x0102;
        character.clan_rank = 3;
        character.position = WorldPosition {
            x: 2048.0,
            y: -300.5,
            z: 0.0,
            angle: std::f64::consts::PI,
        };
        character
            .equipment
            .set_slot(EquipmentSlot::Armor, Some(ItemId(0x0444)));
        character
    }

    #[test]
    fn trailing_byte_is_length_mod_256() {
        let packet = encode_world_entry(SessionId(0x0400), &warrior()).expect("encode");
        assert!(packet.starts_with(&WORLD_ENTRY_HEADER));
        assert_eq!(
            usize::from(packet[packet.len() - 1]),
            packet.len() % 256
        );
        assert_eq!(&packet[packet.len() - 4..packet.len() - 1], &WORLD_ENTRY_FOOTER);
    }

    #[test]
    fn session_id_follows_header() {
        let packet = encode_world_entry(SessionId(0x1234), &warrior()).expect("encode");
        assert_eq!(&packet[5..7], &[0x12, 0x34]);
        assert_eq!(&packet[7..11], &[0x45, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn decodes_fields_back() {
        let character = warrior();
        let packet = encode_world_entry(SessionId(0x0401), &character).expect("encode");
        let view = decode_world_entry(&packet).expect("decode");
        assert_eq!(view.session, SessionId(0x0401));
        assert_eq!(usize::from(view.length_byte), packet.len() % 256);
        let decoded = view.character;
        assert_eq!(decoded.name, "Воин");
        assert_eq!(decoded.health, 950);
        assert_eq!(decoded.max_mana, 300);
        assert_eq!(decoded.money, 123_456);
        assert_eq!(decoded.experience, character.experience);
        assert_eq!(decoded.stat_points, 513);
        assert_eq!(decoded.clan_id, 0x0102);
        assert_eq!(decoded.clan_rank, 3);
        assert_eq!(decoded.appearance, character.appearance);
        assert_eq!(decoded.equipment, character.equipment);
        assert_eq!(decoded.position.x, 2048.0);
        assert_eq!(decoded.position.z, 0.0);
        assert!((decoded.position.y - -300.5).abs() <= 300.5 * f64::powi(2.0, -23));
        assert_eq!(encode_angle(decoded.position.angle), 128);
    }

    #[test]
    fn angle_wraps_both_ways() {
        assert_eq!(encode_angle(0.0), 0);
        assert_eq!(encode_angle(TAU), 0);
        assert_eq!(encode_angle(-TAU / 4.0), 192);
        assert_eq!(encode_angle(TAU / 4.0), 64);
        assert_eq!(encode_angle(f64::NAN), 0);
    }

    #[test]
    fn unencodable_position_is_an_error() {
        let mut character = warrior();
        character.position.x = f64::INFINITY;
        assert!(matches!(
            encode_world_entry(SessionId(0x0400), &character),
            Err(CodecError::CoordinateOutOfRange(_))
        ));
    }

    #[test]
    fn truncated_packet_does_not_panic() {
        let packet = encode_world_entry(SessionId(0x0400), &warrior()).expect("encode");
        for cut in [0, 4, 9, 30, packet.len() - 1] {
            assert!(decode_world_entry(&packet[..cut]).is_err());
        }
    }
}
