//! Crash-safe checkpoint persistence: a single JSON file at
//! `<artifacts_dir>/execution/checkpoint.json`.
//!
//! Writes go to a sibling temp file and are renamed into place so a crash
//! mid-write never leaves a half-written checkpoint behind (`tokio::fs`
//! rename is atomic on the same filesystem, matching the teacher's own
//! write-then-rename pattern in `state::store`).

use super::dag_state::DAGState;
use crate::error::{EngineError, Result};
use std::path::{Path, PathBuf};

pub fn checkpoint_path(artifacts_dir: &str) -> PathBuf {
    Path::new(artifacts_dir).join("execution").join("checkpoint.json")
}

/// Saves `state` to the checkpoint file, creating `execution/` if needed.
/// Called on executor start, at every level barrier, and after every
/// successful replan.
pub async fn save(artifacts_dir: &str, state: &DAGState) -> Result<()> {
    let path = checkpoint_path(artifacts_dir);
    let dir = path.parent().expect("checkpoint path always has a parent");
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| EngineError::CheckpointIo {
            path: dir.display().to_string(),
            source,
        })?;

    let body = serde_json::to_vec_pretty(state).expect("DAGState is always serializable");

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &body)
        .await
        .map_err(|source| EngineError::CheckpointIo {
            path: tmp_path.display().to_string(),
            source,
        })?;
    tokio::fs::rename(&tmp_path, &path)
        .await
        .map_err(|source| EngineError::CheckpointIo {
            path: path.display().to_string(),
            source,
        })?;
    Ok(())
}

/// Loads the last saved checkpoint, or `None` if no checkpoint file exists.
/// A checkpoint that exists but fails to parse (incompatible schema from a
/// prior version, truncated write) is treated as absent, never as a hard
/// error — there is no migration path, only a fresh start.
pub async fn load(artifacts_dir: &str) -> Result<Option<DAGState>> {
    let path = checkpoint_path(artifacts_dir);
    let body = match tokio::fs::read(&path).await {
        Ok(body) => body,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(EngineError::CheckpointIo {
                path: path.display().to_string(),
                source,
            })
        }
    };

    match serde_json::from_slice(&body) {
        Ok(state) => Ok(Some(state)),
        Err(_) => Ok(None),
    }
}
