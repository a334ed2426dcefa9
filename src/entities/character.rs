use serde::{Deserialize, Serialize};

use crate::entities::equipment::Equipment;

pub const ROSTER_SLOTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharacterSlot(usize);

impl CharacterSlot {
    pub fn new(index: usize) -> Option<Self> {
        (index < ROSTER_SLOTS).then_some(Self(index))
    }

    /// Slot encoding used by select, delete and create packets: `byte / 4 - 1`.
    pub fn from_wire(byte: u8) -> Option<Self> {
        let index = (byte / 4).checked_sub(1)?;
        Self::new(usize::from(index))
    }

    pub fn to_wire(self) -> u8 {
        ((self.0 + 1) * 4) as u8
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn all() -> impl Iterator<Item = CharacterSlot> {
        (0..ROSTER_SLOTS).map(CharacterSlot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn code(self) -> u8 {
        match self {
            Gender::Male => 0,
            Gender::Female => 1,
        }
    }

    pub fn from_code(code: u8) -> Self {
        if code == 1 {
            Gender::Female
        } else {
            Gender::Male
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appearance {
    pub gender: Gender,
    pub face: u8,
    pub hair_style: u8,
    pub hair_color: u8,
    pub tattoo: u8,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            gender: Gender::Male,
            face: 1,
            hair_style: 1,
            hair_color: 0,
            tattoo: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Facing, radians.
    pub angle: f64,
}

pub const DEFAULT_SPAWN: WorldPosition = WorldPosition {
    x: 424.0,
    y: 153.0,
    z: -1350.0,
    angle: 0.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryStats {
    pub strength: u8,
    pub agility: u8,
    pub accuracy: u8,
    pub endurance: u8,
    pub perception: u8,
    pub luck: u8,
}

impl PrimaryStats {
    pub fn as_array(&self) -> [u8; 6] {
        [
            self.strength,
            self.agility,
            self.accuracy,
            self.endurance,
            self.perception,
            self.luck,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementalStats {
    pub earth: u8,
    pub water: u8,
    pub air: u8,
    pub fire: u8,
}

impl ElementalStats {
    pub fn as_array(&self) -> [u8; 4] {
        [self.earth, self.water, self.air, self.fire]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experience {
    pub title_level: u8,
    pub title_xp: u32,
    pub degree_level: u8,
    pub degree_xp: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterSnapshot {
    pub name: String,
    pub health: u16,
    pub max_health: u16,
    pub mana: u16,
    pub max_mana: u16,
    pub primary: PrimaryStats,
    pub elemental: ElementalStats,
    pub satiety: u8,
    pub experience: Experience,
    pub stat_points: u16,
    pub money: u32,
    pub position: WorldPosition,
    pub appearance: Appearance,
    pub equipment: Equipment,
    pub karma: u8,
    pub clan_id: u16,
    pub guild_id: u16,
    pub clan_rank: u8,
}

impl Default for CharacterSnapshot {
    fn default() -> Self {
        Self {
            name: String::new(),
            health: 100,
            max_health: 100,
            mana: 100,
            max_mana: 100,
            primary: PrimaryStats {
                strength: 10,
                agility: 10,
                accuracy: 10,
                endurance: 10,
                perception: 10,
                luck: 10,
            },
            elemental: ElementalStats {
                earth: 0,
                water: 0,
                air: 0,
                fire: 0,
            },
            satiety: 50,
            experience: Experience {
                title_level: 1,
                title_xp: 0,
                degree_level: 1,
                degree_xp: 0,
            },
            stat_points: 5,
            money: 0,
            position: DEFAULT_SPAWN,
            appearance: Appearance::default(),
            equipment: Equipment::default(),
            karma: 0,
            clan_id: 0,
            guild_id: 0,
            clan_rank: 0,
        }
    }
}

impl CharacterSnapshot {
    pub fn new_character(name: &str, appearance: Appearance) -> Self {
        Self {
            name: name.to_string(),
            appearance,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_slot_formula() {
        assert_eq!(CharacterSlot::from_wire(4).map(CharacterSlot::index), Some(0));
        assert_eq!(CharacterSlot::from_wire(8).map(CharacterSlot::index), Some(1));
        assert_eq!(CharacterSlot::from_wire(14).map(CharacterSlot::index), Some(2));
        assert_eq!(CharacterSlot::from_wire(3), None);
        assert_eq!(CharacterSlot::from_wire(16), None);
        let slot = CharacterSlot::new(2).expect("slot");
        assert_eq!(CharacterSlot::from_wire(slot.to_wire()), Some(slot));
    }

    #[test]
    fn new_character_keeps_engine_defaults() {
        let appearance = Appearance {
            gender: Gender::Female,
            face: 3,
            hair_style: 2,
            hair_color: 7,
            tattoo: 1,
        };
        let snapshot = CharacterSnapshot::new_character("Hero", appearance);
        assert_eq!(snapshot.name, "Hero");
        assert_eq!(snapshot.appearance, appearance);
        assert_eq!(snapshot.max_health, CharacterSnapshot::default().max_health);
        assert_eq!(snapshot.position, DEFAULT_SPAWN);
    }

    #[test]
    fn snapshot_survives_yaml() {
        let snapshot = CharacterSnapshot::new_character("Воин", Appearance::default());
        let text = serde_yaml::to_string(&snapshot).expect("serialize");
        let parsed: CharacterSnapshot = serde_yaml::from_str(&text).expect("parse");
        assert_eq!(parsed, snapshot);
    }
}
