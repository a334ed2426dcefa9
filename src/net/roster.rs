use crate::entities::character::{
    CharacterSlot, CharacterSnapshot, ElementalStats, Experience, PrimaryStats, ROSTER_SLOTS,
};
use crate::error::CodecError;
use crate::net::bits::BitCursor;
use crate::net::fields::{
    item_block_len, read_appearance, read_item_slots, read_split14, write_appearance,
    write_item_slots, write_split14,
};
use crate::net::packets::SELECT_START;
use crate::net::text::{fixed_name, parse_fixed_name, ROSTER_NAME_LEN};

pub const ROSTER_HEADER: [u8; 7] = [0x6C, 0x00, 0x2C, 0x01, 0x00, 0x00, 0x00];
pub const ROSTER_FOOTER: [u8; 3] = [0x00, 0x2C, 0x00];
/// Occupied flag through karma, before the item block.
const ROSTER_BODY_LEN: usize = 1 + ROSTER_NAME_LEN + 4 + 4 + 6 + 4 + 2 + 1;

#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub slot: u8,
    pub occupied: bool,
    pub character: CharacterSnapshot,
}

pub fn encode_roster_entry(slot: CharacterSlot, character: Option<&CharacterSnapshot>) -> Vec<u8> {
    let default_snapshot;
    let snapshot = match character {
        Some(snapshot) => snapshot,
        None => {
            default_snapshot = CharacterSnapshot::default();
            &default_snapshot
        }
    };
    let len = ROSTER_HEADER.len()
        + 1
        + ROSTER_BODY_LEN
        + item_block_len(&snapshot.equipment)
        + ROSTER_FOOTER.len();
    let mut cursor = BitCursor::with_capacity(len);
    cursor.write_bytes(&ROSTER_HEADER);
    cursor.write_int(slot.index() as u64, 8);

    cursor.write_bit(character.is_some());
    cursor.write_int(0, 7);
    cursor.write_bytes(&fixed_name(&snapshot.name));
    write_appearance(&mut cursor, &snapshot.appearance);
    write_split14(&mut cursor, snapshot.max_health);
    write_split14(&mut cursor, snapshot.max_mana);
    for stat in snapshot.primary.as_array() {
        cursor.write_int(u64::from(stat), 8);
    }
    for stat in snapshot.elemental.as_array() {
        cursor.write_int(u64::from(stat), 8);
    }
    cursor.write_int(u64::from(snapshot.experience.title_level), 8);
    cursor.write_int(u64::from(snapshot.experience.degree_level), 8);
    cursor.write_int(u64::from(snapshot.karma), 8);
    write_item_slots(&mut cursor, &snapshot.equipment);

    cursor.write_bytes(&ROSTER_FOOTER);
    cursor.into_bytes()
}

/// Select-start followed by one entry per slot, empty slots included.
pub fn encode_roster(characters: &[Option<CharacterSnapshot>; ROSTER_SLOTS]) -> Vec<u8> {
    let mut packet = SELECT_START.to_vec();
    for (slot, character) in CharacterSlot::all().zip(characters.iter()) {
        packet.extend_from_slice(&encode_roster_entry(slot, character.as_ref()));
    }
    packet
}

pub fn decode_roster_entry(cursor: &mut BitCursor) -> Result<RosterEntry, CodecError> {
    let header = cursor.read_bytes(ROSTER_HEADER.len())?;
    if header != ROSTER_HEADER {
        return Err(CodecError::BadFrame("roster header"));
    }
    let slot = cursor.read_u8()?;
    let occupied = cursor.read_bit()?;
    cursor.skip_bits(7)?;
    let name = parse_fixed_name(&cursor.read_bytes(ROSTER_NAME_LEN)?);
    let appearance = read_appearance(cursor)?;
    let max_health = read_split14(cursor)?;
    let max_mana = read_split14(cursor)?;
    let mut primary = [0u8; 6];
    for stat in primary.iter_mut() {
        *stat = cursor.read_u8()?;
    }
    let mut elemental = [0u8; 4];
    for stat in elemental.iter_mut() {
        *stat = cursor.read_u8()?;
    }
    let title_level = cursor.read_u8()?;
    let degree_level = cursor.read_u8()?;
    let karma = cursor.read_u8()?;
    let equipment = read_item_slots(cursor)?;
    cursor.skip_bits(ROSTER_FOOTER.len() * 8)?;

    let defaults = CharacterSnapshot::default();
    let character = CharacterSnapshot {
        name,
        max_health,
        max_mana,
        primary: PrimaryStats {
            strength: primary[0],
            agility: primary[1],
            accuracy: primary[2],
            endurance: primary[3],
            perception: primary[4],
            luck: primary[5],
        },
        elemental: ElementalStats {
            earth: elemental[0],
            water: elemental[1],
            air: elemental[2],
            fire: elemental[3],
        },
        experience: Experience {
            title_level,
            degree_level,
            ..defaults.experience
        },
        appearance,
        equipment,
        karma,
        ..defaults
    };
    Ok(RosterEntry {
        slot,
        occupied,
        character,
    })
}
