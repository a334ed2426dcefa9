use std::collections::HashMap;
use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::entities::character::{CharacterSlot, CharacterSnapshot, ROSTER_SLOTS};
use crate::error::StoreError;
use crate::persistence::accounts::{
    authenticate_or_register_record, normalize_login, AuthOutcome, UserRecord,
};
use crate::persistence::store::{
    apply_create, normalize_name, CharacterStore, CreateOutcome, Roster, UserStore,
};

pub const DEFAULT_ROSTER_CACHE: usize = 256;

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: Vec<UserRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedCharacter {
    slot: usize,
    character: CharacterSnapshot,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CharacterFile {
    login: String,
    #[serde(default)]
    characters: Vec<SavedCharacter>,
}

struct CharacterState {
    cache: LruCache<String, Roster>,
    /// Normalized character name -> owning login.
    names: HashMap<String, String>,
}

/// File-backed storage under `<root>/save`: one users file plus one roster
/// file per login. Rosters are read through an LRU cache.
pub struct YamlStore {
    root: PathBuf,
    users: Mutex<HashMap<String, UserRecord>>,
    characters: Mutex<CharacterState>,
}

impl YamlStore {
    pub fn open(root: &Path, cache_capacity: usize) -> Result<Self, StoreError> {
        let root = root.join("save");
        let store = Self {
            users: Mutex::new(HashMap::new()),
            characters: Mutex::new(CharacterState {
                cache: LruCache::new(
                    NonZeroUsize::new(cache_capacity.max(1)).unwrap_or(NonZeroUsize::MIN),
                ),
                names: HashMap::new(),
            }),
            root,
        };
        store.load_users()?;
        store.index_names()?;
        Ok(store)
    }

    fn users_path(&self) -> PathBuf {
        self.root.join("users.yaml")
    }

    fn characters_dir(&self) -> PathBuf {
        self.root.join("characters")
    }

    fn roster_path(&self, login_key: &str) -> PathBuf {
        let file: String = login_key
            .chars()
            .map(|ch| if ch.is_alphanumeric() { ch } else { '_' })
            .collect();
        self.characters_dir().join(format!("{file}.yaml"))
    }

    fn load_users(&self) -> Result<(), StoreError> {
        let path = self.users_path();
        let Some(data) = read_optional(&path)? else {
            return Ok(());
        };
        let file: UsersFile = parse_yaml(&path, &data)?;
        let mut users = lock(&self.users);
        for record in file.users {
            users.insert(normalize_login(&record.login), record);
        }
        debug!(count = users.len(), path = %path.display(), "loaded users");
        Ok(())
    }

    fn save_users(&self, users: &HashMap<String, UserRecord>) -> Result<(), StoreError> {
        let mut records: Vec<UserRecord> = users.values().cloned().collect();
        records.sort_by(|a, b| a.login.cmp(&b.login));
        write_yaml(&self.users_path(), &UsersFile { users: records })
    }

    fn index_names(&self) -> Result<(), StoreError> {
        let dir = self.characters_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(source) => return Err(io_error(&dir, source)),
        };
        let mut state = lock(&self.characters);
        for entry in entries {
            let path = entry.map_err(|source| io_error(&dir, source))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("yaml") {
                continue;
            }
            let data = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
            let file: CharacterFile = match parse_yaml(&path, &data) {
                Ok(file) => file,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable roster file");
                    continue;
                }
            };
            let login = normalize_login(&file.login);
            for saved in &file.characters {
                state
                    .names
                    .insert(normalize_name(&saved.character.name), login.clone());
            }
        }
        debug!(names = state.names.len(), "indexed character names");
        Ok(())
    }

    fn read_roster(&self, login_key: &str) -> Result<Roster, StoreError> {
        let path = self.roster_path(login_key);
        let mut roster = Roster::default();
        let Some(data) = read_optional(&path)? else {
            return Ok(roster);
        };
        let file: CharacterFile = parse_yaml(&path, &data)?;
        for saved in file.characters {
            if saved.slot >= ROSTER_SLOTS {
                return Err(StoreError::InvalidSlot(saved.slot));
            }
            roster[saved.slot] = Some(saved.character);
        }
        Ok(roster)
    }

    fn write_roster(&self, login_key: &str, roster: &Roster) -> Result<(), StoreError> {
        let file = CharacterFile {
            login: login_key.to_string(),
            characters: roster
                .iter()
                .enumerate()
                .filter_map(|(slot, character)| {
                    character.clone().map(|character| SavedCharacter { slot, character })
                })
                .collect(),
        };
        write_yaml(&self.roster_path(login_key), &file)
    }

    fn cached_roster<'a>(
        &self,
        state: &'a mut CharacterState,
        login_key: &str,
    ) -> Result<&'a mut Roster, StoreError> {
        if !state.cache.contains(login_key) {
            let roster = self.read_roster(login_key)?;
            state.cache.put(login_key.to_string(), roster);
        }
        state
            .cache
            .get_mut(login_key)
            .ok_or_else(|| StoreError::Format {
                path: self.roster_path(login_key).display().to_string(),
                message: "roster evicted while in use".to_string(),
            })
    }
}

impl UserStore for YamlStore {
    fn authenticate_or_register(
        &self,
        login: &str,
        password: &str,
    ) -> Result<AuthOutcome, StoreError> {
        let key = normalize_login(login);
        let mut users = lock(&self.users);
        let (outcome, record) = authenticate_or_register_record(users.get(&key), login, password);
        if let Some(record) = record {
            let mut next = users.clone();
            next.insert(key, record);
            self.save_users(&next)?;
            *users = next;
        }
        Ok(outcome)
    }
}

impl CharacterStore for YamlStore {
    fn roster(&self, login: &str) -> Result<Roster, StoreError> {
        let key = normalize_login(login);
        let mut state = lock(&self.characters);
        Ok(self.cached_roster(&mut state, &key)?.clone())
    }

    fn create(
        &self,
        login: &str,
        slot: CharacterSlot,
        character: CharacterSnapshot,
    ) -> Result<CreateOutcome, StoreError> {
        let key = normalize_login(login);
        let name = normalize_name(&character.name);
        let mut state = lock(&self.characters);
        let name_taken = state.names.contains_key(&name);
        let mut roster = self.cached_roster(&mut state, &key)?.clone();
        let outcome = apply_create(&mut roster, slot, character, name_taken);
        if outcome == CreateOutcome::Created {
            self.write_roster(&key, &roster)?;
            state.cache.put(key.clone(), roster);
            state.names.insert(name, key);
        }
        Ok(outcome)
    }

    fn delete(&self, login: &str, slot: CharacterSlot) -> Result<bool, StoreError> {
        let key = normalize_login(login);
        let mut state = lock(&self.characters);
        let mut roster = self.cached_roster(&mut state, &key)?.clone();
        let Some(removed) = roster[slot.index()].take() else {
            return Ok(false);
        };
        self.write_roster(&key, &roster)?;
        state.cache.put(key, roster);
        state.names.remove(&normalize_name(&removed.name));
        Ok(true)
    }

    fn name_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(lock(&self.characters)
            .names
            .contains_key(&normalize_name(name)))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn io_error(path: &Path, source: io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(data) => Ok(Some(data)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(io_error(path, source)),
    }
}

fn parse_yaml<T: for<'de> Deserialize<'de>>(path: &Path, data: &str) -> Result<T, StoreError> {
    serde_yaml::from_str(data).map_err(|err| StoreError::Format {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

/// Writes through a temporary file so a crash never leaves half a file behind.
fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
    }
    let data = serde_yaml::to_string(value).map_err(|err| StoreError::Format {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    let tmp = path.with_extension("yaml.tmp");
    fs::write(&tmp, data).map_err(|source| io_error(&tmp, source))?;
    fs::rename(&tmp, path).map_err(|source| io_error(path, source))
}
