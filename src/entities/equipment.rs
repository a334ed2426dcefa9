use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentSlot {
    Helmet,
    Amulet,
    Armor,
    Shield,
    Belt,
    Gloves,
    Weapon,
    Bracelet,
    RingLeft,
    RingRight,
    Pants,
    Boots,
}

impl EquipmentSlot {
    pub const COUNT: usize = 12;

    pub fn index(self) -> usize {
        match self {
            EquipmentSlot::Helmet => 0,
            EquipmentSlot::Amulet => 1,
            EquipmentSlot::Armor => 2,
            EquipmentSlot::Shield => 3,
            EquipmentSlot::Belt => 4,
            EquipmentSlot::Gloves => 5,
            EquipmentSlot::Weapon => 6,
            EquipmentSlot::Bracelet => 7,
            EquipmentSlot::RingLeft => 8,
            EquipmentSlot::RingRight => 9,
            EquipmentSlot::Pants => 10,
            EquipmentSlot::Boots => 11,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        EQUIPMENT_SLOTS.get(index).copied()
    }
}

/// Wire order of the equipment block.
pub const EQUIPMENT_SLOTS: [EquipmentSlot; EquipmentSlot::COUNT] = [
    EquipmentSlot::Helmet,
    EquipmentSlot::Amulet,
    EquipmentSlot::Armor,
    EquipmentSlot::Shield,
    EquipmentSlot::Belt,
    EquipmentSlot::Gloves,
    EquipmentSlot::Weapon,
    EquipmentSlot::Bracelet,
    EquipmentSlot::RingLeft,
    EquipmentSlot::RingRight,
    EquipmentSlot::Pants,
    EquipmentSlot::Boots,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    slots: Vec<Option<ItemId>>,
}

impl Default for Equipment {
    fn default() -> Self {
        Self {
            slots: vec![None; EquipmentSlot::COUNT],
        }
    }
}

impl Equipment {
    pub fn slot(&self, slot: EquipmentSlot) -> Option<ItemId> {
        self.slots.get(slot.index()).copied().flatten()
    }

    pub fn set_slot(&mut self, slot: EquipmentSlot, item: Option<ItemId>) -> Option<ItemId> {
        if self.slots.len() < EquipmentSlot::COUNT {
            self.slots.resize(EquipmentSlot::COUNT, None);
        }
        std::mem::replace(&mut self.slots[slot.index()], item)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EquipmentSlot, Option<ItemId>)> + '_ {
        EQUIPMENT_SLOTS.iter().map(|&slot| (slot, self.slot(slot)))
    }

    pub fn equipped_count(&self) -> usize {
        self.iter().filter(|(_, item)| item.is_some()).count()
    }
}
