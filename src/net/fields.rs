//! Field codecs shared by the roster and world-entry layouts.

use crate::entities::character::{Appearance, Gender};
use crate::entities::equipment::{Equipment, ItemId, EQUIPMENT_SLOTS};
use crate::error::CodecError;
use crate::net::bits::BitCursor;

pub const SLOT_PRESENT: u8 = 0x04;
pub const SLOT_ABSENT: u8 = 0x00;
pub const ITEM_PADDING: [usize; 2] = [12, 4];

/// 14-bit value laid out as top 6 bits, 2 padding bits, low 8 bits.
pub fn write_split14(cursor: &mut BitCursor, value: u16) {
    cursor.write_int(u64::from(value >> 8), 6);
    cursor.write_int(0, 2);
    cursor.write_int(u64::from(value), 8);
}

pub fn read_split14(cursor: &mut BitCursor) -> Result<u16, CodecError> {
    let high = cursor.read_int(6)? as u16;
    cursor.skip_bits(2)?;
    let low = cursor.read_int(8)? as u16;
    Ok((high << 8) | low)
}

pub fn write_appearance(cursor: &mut BitCursor, appearance: &Appearance) {
    cursor.write_int(u64::from(appearance.gender.code()), 2);
    cursor.write_int(u64::from(appearance.face), 6);
    cursor.write_int(u64::from(appearance.hair_style), 6);
    cursor.write_int(0, 2);
    cursor.write_int(u64::from(appearance.hair_color), 8);
    cursor.write_int(u64::from(appearance.tattoo), 8);
}

pub fn read_appearance(cursor: &mut BitCursor) -> Result<Appearance, CodecError> {
    let gender = Gender::from_code(cursor.read_int(2)? as u8);
    let face = cursor.read_int(6)? as u8;
    let hair_style = cursor.read_int(6)? as u8;
    cursor.skip_bits(2)?;
    let hair_color = cursor.read_u8()?;
    let tattoo = cursor.read_u8()?;
    Ok(Appearance {
        gender,
        face,
        hair_style,
        hair_color,
        tattoo,
    })
}

/// Presence flags in slot order, the ids of present slots, then the fixed
/// zero padding blocks (emitted even when nothing is equipped).
pub fn write_item_slots(cursor: &mut BitCursor, equipment: &Equipment) {
    for (_, item) in equipment.iter() {
        cursor.write_int(
            u64::from(if item.is_some() { SLOT_PRESENT } else { SLOT_ABSENT }),
            8,
        );
    }
    for (_, item) in equipment.iter() {
        if let Some(ItemId(id)) = item {
            cursor.write_int(u64::from(id), 16);
        }
    }
    for block in ITEM_PADDING {
        for _ in 0..block {
            cursor.write_int(0, 8);
        }
    }
}

pub fn read_item_slots(cursor: &mut BitCursor) -> Result<Equipment, CodecError> {
    let mut present = [false; EQUIPMENT_SLOTS.len()];
    for flag in present.iter_mut() {
        *flag = cursor.read_u8()? == SLOT_PRESENT;
    }
    let mut equipment = Equipment::default();
    for (slot, _) in EQUIPMENT_SLOTS.iter().zip(present).filter(|(_, on)| *on) {
        let id = cursor.read_int(16)? as u16;
        equipment.set_slot(*slot, Some(ItemId(id)));
    }
    cursor.skip_bits(ITEM_PADDING.iter().sum::<usize>() * 8)?;
    Ok(equipment)
}

pub fn item_block_len(equipment: &Equipment) -> usize {
    EQUIPMENT_SLOTS.len() + equipment.equipped_count() * 2 + ITEM_PADDING.iter().sum::<usize>()
}
