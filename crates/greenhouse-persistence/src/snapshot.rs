//! ---
//! gh_section: "03-persistence-logging"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Persistence abstractions and storage bindings."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{PersistenceError, Result};

/// Current snapshot envelope version.
pub const SNAPSHOT_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEnvelope {
    version: u16,
    created_at: DateTime<Utc>,
    hash: String,
    state: Value,
}

/// Persist a state snapshot to the provided filesystem path.
///
/// The state is hashed in its canonical JSON value form, so the digest does
/// not depend on key order in the written file. The envelope is written as
/// pretty JSON next to its target and renamed into place.
pub fn save_snapshot<T: Serialize>(state: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let state = serde_json::to_value(state)?;
    let envelope = SnapshotEnvelope {
        version: SNAPSHOT_VERSION,
        created_at: Utc::now(),
        hash: compute_hash(&state)?,
        state,
    };

    let staging = path.with_extension(match extension(path) {
        Some(ext) => format!("{ext}.tmp"),
        None => "tmp".to_owned(),
    });
    {
        let mut writer = BufWriter::new(File::create(&staging)?);
        writer.write_all(&serde_json::to_vec_pretty(&envelope)?)?;
        writer.flush()?;
    }
    fs::rename(&staging, path)?;
    Ok(())
}

/// Load a snapshot from disk, verify its hash and decode the contained state.
pub fn load_snapshot<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let envelope = load_envelope(path)?;
    if envelope.version != SNAPSHOT_VERSION {
        return Err(PersistenceError::UnsupportedVersion(envelope.version));
    }
    if compute_hash(&envelope.state)? != envelope.hash {
        return Err(PersistenceError::HashMismatch);
    }
    Ok(serde_json::from_value(envelope.state)?)
}

/// Verify the integrity of a snapshot without decoding the payload.
pub fn verify_snapshot(path: &Path) -> bool {
    match load_envelope(path) {
        Ok(envelope) => compute_hash(&envelope.state)
            .map(|hash| hash == envelope.hash)
            .unwrap_or(false),
        Err(_) => false,
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

fn load_envelope(path: &Path) -> Result<SnapshotEnvelope> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn compute_hash(state: &Value) -> Result<String> {
    let serialized = serde_json::to_vec(state)?;
    Ok(hex::encode(Sha256::digest(serialized)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Switches {
        heater: bool,
        lights: bool,
        tick: u64,
    }

    fn sample() -> Switches {
        Switches {
            heater: true,
            lights: false,
            tick: 42,
        }
    }

    #[test]
    fn save_and_load_json_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("equipment.json");

        save_snapshot(&sample(), &path).unwrap();
        assert!(verify_snapshot(&path));
        let loaded: Switches = load_snapshot(&path).unwrap();
        assert_eq!(loaded, sample());
        assert!(!dir.path().join("equipment.json.tmp").exists());
    }

    #[test]
    fn extensionless_target_is_saved_and_verified() {
        let dir = tempdir().unwrap();
        let bare = dir.path().join("equipment");

        save_snapshot(&sample(), &bare).unwrap();
        assert!(verify_snapshot(&bare));
        assert!(!dir.path().join("equipment.tmp").exists());
    }

    #[test]
    fn verify_rejects_tampered_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("equipment.json");
        save_snapshot(&sample(), &path).unwrap();

        let mut envelope: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        envelope["state"]["heater"] = Value::Bool(false);
        fs::write(&path, serde_json::to_vec_pretty(&envelope).unwrap()).unwrap();

        assert!(!verify_snapshot(&path));
        assert!(matches!(
            load_snapshot::<Switches>(&path),
            Err(PersistenceError::HashMismatch)
        ));
    }

    #[test]
    fn verify_is_false_for_missing_file() {
        let dir = tempdir().unwrap();
        assert!(!verify_snapshot(&dir.path().join("missing.json")));
    }
}
