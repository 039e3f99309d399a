use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::{Checkpoint, CheckpointConfig, CheckpointFile, CheckpointManager, CheckpointStorage, StreamPhase};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct FilePos {
    file: String,
    pos: u64,
}

impl FilePos {
    fn new(file: &str, pos: u64) -> Self {
        Self {
            file: file.to_string(),
            pos,
        }
    }
}

impl Checkpoint for FilePos {
    const KIND: &'static str = "file-pos";

    fn to_cli_string(&self) -> String {
        format!("{}@{}", self.file, self.pos)
    }

    fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        let (file, pos) = s
            .split_once('@')
            .ok_or_else(|| anyhow::anyhow!("expected 'file@pos', got '{s}'"))?;
        Ok(Self::new(file, pos.parse()?))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct Counter(u64);

impl Checkpoint for Counter {
    const KIND: &'static str = "counter";

    fn to_cli_string(&self) -> String {
        self.0.to_string()
    }

    fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        Ok(Self(s.parse()?))
    }
}

fn emitting(tmp: &TempDir) -> CheckpointManager {
    CheckpointManager::new(CheckpointConfig::emitting(tmp.path()))
}

#[test]
fn test_file_keeps_kind_and_phase() {
    let file = CheckpointFile::new(&FilePos::new("a", 4), StreamPhase::StreamStart).unwrap();
    assert_eq!(file.kind, "file-pos");
    assert_eq!(file.phase, StreamPhase::StreamStart);
    assert_eq!(file.parse::<FilePos>().unwrap(), FilePos::new("a", 4));
}

#[test]
fn test_file_rejects_other_kind() {
    let file = CheckpointFile::new(&Counter(3), StreamPhase::StreamEnd).unwrap();
    let err = file.parse::<FilePos>().unwrap_err().to_string();
    assert!(err.contains("expected 'file-pos', found 'counter'"), "{err}");
}

#[test]
fn test_phase_names() {
    assert_eq!(StreamPhase::StreamStart.to_string(), "stream_start");
    assert_eq!("stream_end".parse::<StreamPhase>().unwrap(), StreamPhase::StreamEnd);
    assert!("snapshot".parse::<StreamPhase>().is_err());
}

#[test]
fn test_should_emit() {
    assert!(CheckpointConfig::emitting("/tmp").should_emit());
    assert!(!CheckpointConfig::reading("/tmp").should_emit());
    assert!(!CheckpointConfig::default().should_emit());
    let no_storage = CheckpointConfig {
        emit: true,
        storage: CheckpointStorage::Disabled,
    };
    assert!(!no_storage.should_emit());
}

#[test]
fn test_cli_string() {
    let pos = FilePos::from_cli_string("mysql-bin.000002@120").unwrap();
    assert_eq!(pos, FilePos::new("mysql-bin.000002", 120));
    assert_eq!(pos.to_cli_string(), "mysql-bin.000002@120");
    assert!(FilePos::from_cli_string("mysql-bin.000002").is_err());
}

#[tokio::test]
async fn test_emit_then_read() {
    let tmp = TempDir::new().unwrap();
    let manager = emitting(&tmp);
    manager
        .emit_checkpoint(&FilePos::new("mysql-bin.000001", 4), StreamPhase::StreamStart)
        .await
        .unwrap();

    let read: FilePos = manager.read_checkpoint(StreamPhase::StreamStart).await.unwrap();
    assert_eq!(read, FilePos::new("mysql-bin.000001", 4));
    assert!(manager
        .read_checkpoint::<FilePos>(StreamPhase::StreamEnd)
        .await
        .is_err());
}

#[tokio::test]
async fn test_reading_config_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let manager = CheckpointManager::new(CheckpointConfig::reading(tmp.path()));
    manager
        .emit_checkpoint(&Counter(1), StreamPhase::StreamEnd)
        .await
        .unwrap();

    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    assert!(manager.read_checkpoint::<Counter>(StreamPhase::StreamEnd).await.is_err());
}

#[tokio::test]
async fn test_emit_without_storage_fails() {
    let manager = CheckpointManager::new(CheckpointConfig {
        emit: true,
        storage: CheckpointStorage::Disabled,
    });
    let err = manager
        .emit_checkpoint(&Counter(1), StreamPhase::StreamEnd)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no checkpoint storage"));
}

#[tokio::test]
async fn test_latest_write_wins() {
    let tmp = TempDir::new().unwrap();
    let manager = emitting(&tmp);
    for pos in [120, 455] {
        manager
            .emit_checkpoint(&FilePos::new("mysql-bin.000003", pos), StreamPhase::StreamEnd)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let read: FilePos = manager.read_checkpoint(StreamPhase::StreamEnd).await.unwrap();
    assert_eq!(read.pos, 455);
}

#[tokio::test]
async fn test_kinds_and_phases_share_a_directory() {
    let tmp = TempDir::new().unwrap();
    let manager = emitting(&tmp);
    manager
        .emit_checkpoint(&FilePos::new("mysql-bin.000001", 4), StreamPhase::StreamStart)
        .await
        .unwrap();
    manager
        .emit_checkpoint(&FilePos::new("mysql-bin.000002", 900), StreamPhase::StreamEnd)
        .await
        .unwrap();
    manager
        .emit_checkpoint(&Counter(7), StreamPhase::StreamEnd)
        .await
        .unwrap();

    let start: FilePos = manager.read_checkpoint(StreamPhase::StreamStart).await.unwrap();
    let end: FilePos = manager.read_checkpoint(StreamPhase::StreamEnd).await.unwrap();
    let counter: Counter = manager.read_checkpoint(StreamPhase::StreamEnd).await.unwrap();
    assert_eq!(start.pos, 4);
    assert_eq!(end.file, "mysql-bin.000002");
    assert_eq!(counter, Counter(7));
}
