use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::entities::character::{CharacterSlot, CharacterSnapshot, ROSTER_SLOTS};
use crate::error::StoreError;
use crate::persistence::accounts::{
    authenticate_or_register_record, normalize_login, AuthOutcome, UserRecord,
};

pub type Roster = [Option<CharacterSnapshot>; ROSTER_SLOTS];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    NameTaken,
    SlotOccupied,
}

pub trait UserStore: Send + Sync {
    fn authenticate_or_register(
        &self,
        login: &str,
        password: &str,
    ) -> Result<AuthOutcome, StoreError>;
}

pub trait CharacterStore: Send + Sync {
    fn roster(&self, login: &str) -> Result<Roster, StoreError>;

    fn load(
        &self,
        login: &str,
        slot: CharacterSlot,
    ) -> Result<Option<CharacterSnapshot>, StoreError> {
        let roster = self.roster(login)?;
        Ok(roster[slot.index()].clone())
    }

    fn create(
        &self,
        login: &str,
        slot: CharacterSlot,
        character: CharacterSnapshot,
    ) -> Result<CreateOutcome, StoreError>;

    /// Returns whether a character was removed.
    fn delete(&self, login: &str, slot: CharacterSlot) -> Result<bool, StoreError>;

    /// Case-insensitive across every login.
    fn name_exists(&self, name: &str) -> Result<bool, StoreError>;
}

pub trait Storage: UserStore + CharacterStore {}

impl<T: UserStore + CharacterStore> Storage for T {}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Applies a create against one roster plus the global name check.
pub(crate) fn apply_create(
    roster: &mut Roster,
    slot: CharacterSlot,
    character: CharacterSnapshot,
    name_taken: bool,
) -> CreateOutcome {
    if name_taken {
        return CreateOutcome::NameTaken;
    }
    let entry = &mut roster[slot.index()];
    if entry.is_some() {
        return CreateOutcome::SlotOccupied;
    }
    *entry = Some(character);
    CreateOutcome::Created
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<String, UserRecord>,
    rosters: HashMap<String, Roster>,
}

/// Process-local storage; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl UserStore for MemoryStore {
    fn authenticate_or_register(
        &self,
        login: &str,
        password: &str,
    ) -> Result<AuthOutcome, StoreError> {
        let key = normalize_login(login);
        let mut state = self.lock();
        let (outcome, record) =
            authenticate_or_register_record(state.users.get(&key), login, password);
        if let Some(record) = record {
            state.users.insert(key, record);
        }
        Ok(outcome)
    }
}

impl CharacterStore for MemoryStore {
    fn roster(&self, login: &str) -> Result<Roster, StoreError> {
        Ok(self
            .lock()
            .rosters
            .get(&normalize_login(login))
            .cloned()
            .unwrap_or_default())
    }

    fn create(
        &self,
        login: &str,
        slot: CharacterSlot,
        character: CharacterSnapshot,
    ) -> Result<CreateOutcome, StoreError> {
        let mut state = self.lock();
        let wanted = normalize_name(&character.name);
        let name_taken = state
            .rosters
            .values()
            .flat_map(|roster| roster.iter().flatten())
            .any(|existing| normalize_name(&existing.name) == wanted);
        let roster = state.rosters.entry(normalize_login(login)).or_default();
        Ok(apply_create(roster, slot, character, name_taken))
    }

    fn delete(&self, login: &str, slot: CharacterSlot) -> Result<bool, StoreError> {
        let mut state = self.lock();
        Ok(state
            .rosters
            .get_mut(&normalize_login(login))
            .and_then(|roster| roster[slot.index()].take())
            .is_some())
    }

    fn name_exists(&self, name: &str) -> Result<bool, StoreError> {
        let wanted = normalize_name(name);
        Ok(self
            .lock()
            .rosters
            .values()
            .flat_map(|roster| roster.iter().flatten())
            .any(|existing| normalize_name(&existing.name) == wanted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::character::Appearance;

    fn slot(index: usize) -> CharacterSlot {
        CharacterSlot::new(index).expect("slot")
    }

    fn named(name: &str) -> CharacterSnapshot {
        CharacterSnapshot::new_character(name, Appearance::default())
    }

    #[test]
    fn registers_unknown_login_once() {
        let store = MemoryStore::new();
        assert_eq!(
            store.authenticate_or_register("Hero", "pw").expect("auth"),
            AuthOutcome::Registered
        );
        assert_eq!(
            store.authenticate_or_register("hero", "pw").expect("auth"),
            AuthOutcome::Authenticated
        );
        assert_eq!(
            store.authenticate_or_register("HERO", "bad").expect("auth"),
            AuthOutcome::WrongPassword
        );
    }

    #[test]
    fn create_checks_names_across_logins() {
        let store = MemoryStore::new();
        assert_eq!(
            store.create("alice", slot(0), named("Knight")).expect("create"),
            CreateOutcome::Created
        );
        assert_eq!(
            store.create("bob", slot(0), named("knight")).expect("create"),
            CreateOutcome::NameTaken
        );
        assert_eq!(
            store.create("alice", slot(0), named("Archer")).expect("create"),
            CreateOutcome::SlotOccupied
        );
        assert!(store.name_exists("KNIGHT").expect("exists"));
        assert!(!store.name_exists("Archer").expect("exists"));
    }

    #[test]
    fn roster_load_and_delete() {
        let store = MemoryStore::new();
        store.create("alice", slot(1), named("Knight")).expect("create");
        let roster = store.roster("Alice").expect("roster");
        assert!(roster[0].is_none());
        assert_eq!(roster[1].as_ref().map(|c| c.name.as_str()), Some("Knight"));
        assert!(store.load("alice", slot(1)).expect("load").is_some());
        assert!(store.delete("alice", slot(1)).expect("delete"));
        assert!(!store.delete("alice", slot(1)).expect("delete"));
        assert!(store.load("alice", slot(1)).expect("load").is_none());
        assert!(!store.name_exists("Knight").expect("exists"));
    }
}
