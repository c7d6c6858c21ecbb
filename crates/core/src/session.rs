use crate::{PackConfig, PowerupCatalog, PowerupSummary, RngState, SessionStore};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

pub const MAX_PLAYERS: usize = 4;
pub const MAX_NAME_LEN: usize = 20;
pub const MAX_COMMANDERS: usize = 10;
pub const SESSION_TTL_HOURS: i64 = 24;
pub const SESSION_CODE_LEN: usize = 5;
pub const PLAYER_ID_LEN: usize = 16;
pub const PACK_CODE_LEN: usize = 8;

const UPPER_ALNUM: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const LOWER_ALNUM: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found")]
    SessionNotFound,
    #[error("Player not found")]
    PlayerNotFound,
    #[error("Session is full")]
    SessionFull,
    #[error("Session has already started")]
    SessionAlreadyStarted,
    #[error("Session is already complete")]
    SessionComplete,
    #[error("Only host can roll powerups")]
    NotHost,
    #[error("Not all players have locked in")]
    NotAllLocked,
    #[error("Pack code not found")]
    PackNotFound,
    #[error("Session was modified concurrently, retry")]
    Conflict,
}

/// Session lifecycle. Ordered, and only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Waiting,
    Selecting,
    Complete,
}

impl SessionState {
    /// Moves to `next` if it lies ahead; returns whether the state changed.
    pub fn advance_to(&mut self, next: SessionState) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub number: u32,
    pub name: String,
    pub powerup: Option<PowerupSummary>,
    pub commander_url: Option<String>,
    pub commander_data: Option<Value>,
    pub commander_locked: bool,
    pub pack_code: Option<String>,
    pub pack_config: Option<PackConfig>,
    #[serde(default)]
    pub commanders: Vec<Value>,
}

impl Player {
    pub fn new(id: String, number: u32, name: &str) -> Self {
        Self {
            id,
            number,
            name: player_name(name, number),
            powerup: None,
            commander_url: None,
            commander_data: None,
            commander_locked: false,
            pack_code: None,
            pack_config: None,
            commanders: Vec::new(),
        }
    }
}

/// Trimmed, at most 20 characters, `"Player <n>"` when blank.
pub fn player_name(raw: &str, number: u32) -> String {
    let name: String = raw.trim().chars().take(MAX_NAME_LEN).collect();
    let name = name.trim_end().to_string();
    if name.is_empty() {
        format!("Player {number}")
    } else {
        name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_code: String,
    pub host_id: String,
    pub state: SessionState,
    pub players: Vec<Player>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Session {
    pub fn new(code: &str, host_id: &str, host_name: &str, now: DateTime<Utc>) -> Self {
        Self {
            session_code: code.to_string(),
            host_id: host_id.to_string(),
            state: SessionState::Waiting,
            players: vec![Player::new(host_id.to_string(), 1, host_name)],
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| player.id == id)
    }

    pub fn all_locked(&self) -> bool {
        self.players.iter().all(|player| player.commander_locked)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > Duration::hours(SESSION_TTL_HOURS)
    }
}

/// A player's seat in a session, returned by create and join.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub player_id: String,
    pub session: Session,
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub struct SessionManager<S: SessionStore> {
    store: S,
    catalog: PowerupCatalog,
    rng: RngState,
}

impl<S: SessionStore> SessionManager<S> {
    pub fn new(store: S, catalog: PowerupCatalog, rng: RngState) -> Self {
        Self { store, catalog, rng }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Drops sessions older than the TTL, measured from creation.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for session in self.store.all() {
            if session.is_expired(now) && self.store.remove(&session.session_code).is_some() {
                log::info!("session {} expired", session.session_code);
                removed += 1;
            }
        }
        removed
    }

    fn load(&self, code: &str) -> Result<Session, SessionError> {
        self.sweep_expired(Utc::now());
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(SessionError::SessionNotFound);
        }
        self.store.get(&code).ok_or(SessionError::SessionNotFound)
    }

    fn commit(&self, expected_version: u64, mut session: Session) -> Result<Session, SessionError> {
        session.updated_at = Utc::now();
        let code = session.session_code.clone();
        self.store
            .compare_and_swap(&code, expected_version, session)
            .ok_or(SessionError::Conflict)
    }

    pub fn create(&mut self, player_name: &str) -> Seat {
        self.sweep_expired(Utc::now());
        let player_id = self.rng.code(LOWER_ALNUM, PLAYER_ID_LEN);
        loop {
            let code = self.rng.code(UPPER_ALNUM, SESSION_CODE_LEN);
            let session = Session::new(&code, &player_id, player_name, Utc::now());
            if self.store.put(session.clone()) {
                log::info!("session {code} created by {}", session.players[0].name);
                return Seat { player_id, session };
            }
            log::debug!("session code {code} taken, regenerating");
        }
    }

    pub fn join(&mut self, code: &str, player_name: &str) -> Result<Seat, SessionError> {
        let current = self.load(code)?;
        if current.players.len() >= MAX_PLAYERS {
            return Err(SessionError::SessionFull);
        }
        if current.state != SessionState::Waiting {
            return Err(SessionError::SessionAlreadyStarted);
        }
        let mut next = current.clone();
        let player_id = self.rng.code(LOWER_ALNUM, PLAYER_ID_LEN);
        let number = next.players.len() as u32 + 1;
        next.players.push(Player::new(player_id.clone(), number, player_name));
        let session = self.commit(current.version, next)?;
        log::info!("player {number} joined session {}", session.session_code);
        Ok(Seat { player_id, session })
    }

    pub fn roll_powerups(&mut self, code: &str, player_id: &str) -> Result<Session, SessionError> {
        let current = self.load(code)?;
        if current.host_id != player_id {
            return Err(SessionError::NotHost);
        }
        if current.state == SessionState::Complete {
            return Err(SessionError::SessionComplete);
        }
        let mut next = current.clone();
        for player in &mut next.players {
            player.powerup = Some(self.catalog.roll(&mut self.rng).summary());
        }
        next.state.advance_to(SessionState::Selecting);
        self.commit(current.version, next)
    }

    /// Records the player's commander. The last lock issues pack codes and
    /// completes the session.
    pub fn lock_commander(
        &mut self,
        code: &str,
        player_id: &str,
        commander_url: &str,
        commander_data: Option<Value>,
    ) -> Result<Session, SessionError> {
        let current = self.load(code)?;
        let mut next = current.clone();
        let player = next.player_mut(player_id).ok_or(SessionError::PlayerNotFound)?;
        player.commander_url = Some(commander_url.to_string());
        player.commander_data = commander_data;
        player.commander_locked = true;
        if next.all_locked() {
            self.issue_pack_codes(&mut next);
            next.state.advance_to(SessionState::Complete);
        }
        self.commit(current.version, next)
    }

    pub fn update_commanders(
        &mut self,
        code: &str,
        player_id: &str,
        mut commanders: Vec<Value>,
    ) -> Result<Session, SessionError> {
        let current = self.load(code)?;
        let mut next = current.clone();
        let player = next.player_mut(player_id).ok_or(SessionError::PlayerNotFound)?;
        commanders.truncate(MAX_COMMANDERS);
        player.commanders = commanders;
        self.commit(current.version, next)
    }

    pub fn generate_pack_codes(&mut self, code: &str) -> Result<Session, SessionError> {
        let current = self.load(code)?;
        if !current.all_locked() {
            return Err(SessionError::NotAllLocked);
        }
        let mut next = current.clone();
        self.issue_pack_codes(&mut next);
        next.state.advance_to(SessionState::Complete);
        self.commit(current.version, next)
    }

    /// Players that already hold a code keep it.
    fn issue_pack_codes(&mut self, session: &mut Session) {
        let mut taken: HashSet<String> = self
            .store
            .all()
            .iter()
            .chain(std::iter::once(&*session))
            .flat_map(|session| session.players.iter())
            .filter_map(|player| player.pack_code.clone())
            .collect();
        for player in session.players.iter_mut().filter(|player| player.pack_code.is_none()) {
            let code = loop {
                let code = self.rng.code(UPPER_ALNUM, PACK_CODE_LEN);
                if taken.insert(code.clone()) {
                    break code;
                }
            };
            let powerup = player
                .powerup
                .as_ref()
                .and_then(|summary| self.catalog.by_id(&summary.id));
            let commander_url = player.commander_url.clone().unwrap_or_default();
            player.pack_config = Some(PackConfig::issue(powerup, &commander_url));
            player.pack_code = Some(code);
        }
    }

    pub fn session(&self, code: &str) -> Result<Session, SessionError> {
        self.load(code)
    }

    pub fn pack_by_code(&self, pack_code: &str) -> Result<PackConfig, SessionError> {
        self.sweep_expired(Utc::now());
        let pack_code = normalize_code(pack_code);
        self.store
            .all()
            .into_iter()
            .flat_map(|session| session.players)
            .find(|player| player.pack_code.as_deref() == Some(pack_code.as_str()))
            .and_then(|player| {
                let mut config = player.pack_config?;
                if let Some(url) = player.commander_url {
                    config.commander_url = url;
                }
                Some(config)
            })
            .ok_or(SessionError::PackNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_only_moves_forward() {
        let mut state = SessionState::Waiting;
        assert!(state.advance_to(SessionState::Selecting));
        assert!(!state.advance_to(SessionState::Waiting));
        assert_eq!(state, SessionState::Selecting);
        assert!(state.advance_to(SessionState::Complete));
        assert!(!state.advance_to(SessionState::Selecting));
        assert_eq!(state, SessionState::Complete);
    }

    #[test]
    fn names_are_trimmed_and_capped() {
        assert_eq!(player_name("  ", 3), "Player 3");
        assert_eq!(player_name(" Ann ", 1), "Ann");
        assert_eq!(player_name(&"x".repeat(30), 1).chars().count(), MAX_NAME_LEN);
    }

    #[test]
    fn expiry_counts_from_creation() {
        let created = Utc::now();
        let session = Session::new("ABCDE", "h", "Host", created);
        assert!(!session.is_expired(created + Duration::hours(23)));
        assert!(session.is_expired(created + Duration::hours(25)));
    }

    #[test]
    fn session_serializes_camel_case() {
        let session = Session::new("ABCDE", "h", "", Utc::now());
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["sessionCode"], "ABCDE");
        assert_eq!(json["state"], "waiting");
        assert_eq!(json["players"][0]["name"], "Player 1");
        assert_eq!(json["players"][0]["commanderLocked"], false);
        assert!(json["players"][0]["packCode"].is_null());
    }
}
