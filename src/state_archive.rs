use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::{GameEngine, MatchDocument};
use crate::error::{ArchiveError, DocumentError};
use crate::lobby::Lobby;
use crate::match_store::MatchRoom;

const ARCHIVE_VERSION: u8 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ArchiveFile {
    version: u8,
    #[serde(rename = "savedAtIso")]
    saved_at_iso: String,
    #[serde(rename = "savedAtMs")]
    saved_at_ms: u64,
    lobby: Lobby,
    document: MatchDocument,
}

// Only the header is parsed when pruning.
#[derive(Clone, Debug, Deserialize)]
struct ArchiveHeader {
    version: u8,
    #[serde(rename = "savedAtMs")]
    saved_at_ms: u64,
}

pub struct StateArchive {
    dir: PathBuf,
}

impl StateArchive {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, match_id: &str) -> PathBuf {
        self.dir.join(format!("{match_id}.json"))
    }

    pub fn save(&self, room: &MatchRoom, now_ms: u64) -> Result<(), ArchiveError> {
        fs::create_dir_all(&self.dir).map_err(|source| io_error(&self.dir, source))?;

        let match_id = room.match_id().to_string();
        let payload = ArchiveFile {
            version: ARCHIVE_VERSION,
            saved_at_iso: iso_timestamp(now_ms),
            saved_at_ms: now_ms,
            lobby: room.lobby.clone(),
            document: room.engine.to_document(),
        };
        let text = serde_json::to_string_pretty(&payload).map_err(|source| ArchiveError::Json {
            match_id: match_id.clone(),
            source,
        })?;

        // Staged write, then rename over the live file.
        let path = self.path_for(&match_id);
        let staging = self.dir.join(format!("{match_id}.json.tmp"));
        fs::write(&staging, text).map_err(|source| io_error(&staging, source))?;
        fs::rename(&staging, &path).map_err(|source| io_error(&path, source))?;
        debug!(match_id = %match_id, path = %path.display(), "match archived");
        Ok(())
    }

    pub fn load(&self, match_id: &str) -> Result<MatchRoom, ArchiveError> {
        let path = self.path_for(match_id);
        let text = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
        let parsed: ArchiveFile = serde_json::from_str(&text).map_err(|source| ArchiveError::Json {
            match_id: match_id.to_string(),
            source,
        })?;
        if parsed.version != ARCHIVE_VERSION {
            return Err(DocumentError::UnsupportedVersion(parsed.version).into());
        }
        let engine = GameEngine::from_document(parsed.document)?;
        Ok(MatchRoom {
            lobby: parsed.lobby,
            engine,
        })
    }

    // Unreadable archives are logged and skipped.
    pub fn load_all(&self) -> Vec<MatchRoom> {
        let mut rooms = Vec::new();
        for match_id in self.archived_ids() {
            match self.load(&match_id) {
                Ok(room) => rooms.push(room),
                Err(error) => warn!(match_id = %match_id, %error, "skipping unreadable archive"),
            }
        }
        rooms
    }

    pub fn remove(&self, match_id: &str) -> Result<(), ArchiveError> {
        let path = self.path_for(match_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_error(&path, source)),
        }
    }

    pub fn prune_older_than(&self, now_ms: u64, max_age_ms: u64) -> usize {
        let cutoff = now_ms.saturating_sub(max_age_ms);
        let mut pruned = 0;
        for match_id in self.archived_ids() {
            let path = self.path_for(&match_id);
            let header = fs::read_to_string(&path)
                .ok()
                .and_then(|text| serde_json::from_str::<ArchiveHeader>(&text).ok());
            let Some(header) = header else {
                warn!(path = %path.display(), "archive header unreadable; leaving in place");
                continue;
            };
            if header.version != ARCHIVE_VERSION || header.saved_at_ms >= cutoff {
                continue;
            }
            match self.remove(&match_id) {
                Ok(()) => pruned += 1,
                Err(error) => warn!(match_id = %match_id, %error, "failed to prune archive"),
            }
        }
        if pruned > 0 {
            info!(pruned, dir = %self.dir.display(), "pruned stale match archives");
        }
        pruned
    }

    fn archived_ids(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(error) => {
                if error.kind() != ErrorKind::NotFound {
                    warn!(dir = %self.dir.display(), %error, "failed to list archive dir");
                }
                return Vec::new();
            }
        };
        let mut ids: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                    return None;
                }
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
            })
            .collect();
        ids.sort();
        ids
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ArchiveError {
    ArchiveError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn iso_timestamp(now_ms: u64) -> String {
    Utc.timestamp_millis_opt(now_ms as i64)
        .single()
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ARCHIVE_MAX_AGE_MS;
    use crate::engine::GameEngineOptions;
    use crate::types::{MatchPhase, PieceType};

    fn started_room(match_id: &str) -> MatchRoom {
        let mut room = MatchRoom::new(match_id, 2, GameEngineOptions::default());
        let a = room.lobby.join("A").expect("seat");
        let b = room.lobby.join("B").expect("seat");
        room.lobby.set_ready(&a.id, true);
        room.lobby.set_ready(&b.id, true);
        room.lobby.mark_started();
        room.engine
            .initialize(room.lobby.start_players(), 99, 1_000)
            .expect("match starts");
        room.engine
            .place_piece(0, 4, 4, PieceType::Mirror, 0, 2_000)
            .expect("placement");
        room
    }

    #[test]
    fn save_then_load_restores_lobby_and_engine() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = StateArchive::new(dir.path().join("matches"));
        let room = started_room("ABC123");
        archive.save(&room, 5_000).expect("save");
        assert!(archive.path_for("ABC123").is_file());
        assert!(!dir.path().join("matches/ABC123.json.tmp").exists());

        let loaded = archive.load("ABC123").expect("load");
        assert_eq!(loaded.lobby, room.lobby);
        assert_eq!(loaded.engine.to_document(), room.engine.to_document());
        assert_eq!(loaded.engine.phase(), MatchPhase::Playing);
    }

    #[test]
    fn load_all_skips_corrupt_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = StateArchive::new(dir.path().to_path_buf());
        archive.save(&started_room("GOOD01"), 1).expect("save");
        fs::write(archive.path_for("BAD001"), "{not json").expect("write");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

        let rooms = archive.load_all();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].match_id(), "GOOD01");
        assert!(matches!(
            archive.load("BAD001"),
            Err(ArchiveError::Json { .. })
        ));
    }

    #[test]
    fn missing_dir_loads_nothing_and_remove_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = StateArchive::new(dir.path().join("absent"));
        assert!(archive.load_all().is_empty());
        assert!(matches!(archive.load("NOPE00"), Err(ArchiveError::Io { .. })));
        assert!(archive.remove("NOPE00").is_ok());
    }

    #[test]
    fn prune_removes_only_stale_archives() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = StateArchive::new(dir.path().to_path_buf());
        let now = ARCHIVE_MAX_AGE_MS * 2;
        archive.save(&started_room("OLD001"), 1_000).expect("save");
        archive.save(&started_room("NEW001"), now - 1_000).expect("save");

        assert_eq!(archive.prune_older_than(now, ARCHIVE_MAX_AGE_MS), 1);
        assert!(!archive.path_for("OLD001").exists());
        assert!(archive.path_for("NEW001").exists());
    }

    #[test]
    fn saved_payload_carries_iso_timestamp() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = StateArchive::new(dir.path().to_path_buf());
        archive.save(&started_room("TIME01"), 0).expect("save");
        let text = fs::read_to_string(archive.path_for("TIME01")).expect("read");
        let value: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(value["savedAtIso"], "1970-01-01T00:00:00.000Z");
        assert_eq!(value["version"], 1);
    }
}
