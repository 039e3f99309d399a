//! Reading binlog files from disk.

use binlog_core::{EventPayload, EventSource, EventType, PreconditionError, Pulled, SourceError};
use mysql_binlog_source::LocalBinlogSource;
use std::io::Write;
use tempfile::NamedTempFile;

const HEADER_LEN: usize = 19;

struct FileBuilder {
    bytes: Vec<u8>,
    checksum: bool,
}

impl FileBuilder {
    fn new(checksum: bool) -> Self {
        Self {
            bytes: vec![0xfe, b'b', b'i', b'n'],
            checksum,
        }
    }

    fn event(self, event_type: u8, mut body: Vec<u8>) -> Self {
        if self.checksum {
            body.extend_from_slice(&[0x11, 0x22, 0x33, 0x44]);
        }
        self.raw_event(event_type, body)
    }

    fn raw_event(mut self, event_type: u8, body: Vec<u8>) -> Self {
        let len = HEADER_LEN + body.len();
        let end = (self.bytes.len() + len) as u32;
        self.bytes.extend_from_slice(&1_700_000_000u32.to_le_bytes());
        self.bytes.push(event_type);
        self.bytes.extend_from_slice(&1u32.to_le_bytes());
        self.bytes.extend_from_slice(&(len as u32).to_le_bytes());
        self.bytes.extend_from_slice(&end.to_le_bytes());
        self.bytes.extend_from_slice(&0u16.to_le_bytes());
        self.bytes.extend_from_slice(&body);
        self
    }

    /// The FORMAT_DESCRIPTION event always ends with the algorithm byte and a CRC slot.
    fn format_description(self) -> Self {
        let mut body = Vec::new();
        body.extend_from_slice(&4u16.to_le_bytes());
        let mut version = b"8.0.36".to_vec();
        version.resize(50, 0);
        body.extend_from_slice(&version);
        body.extend_from_slice(&0u32.to_le_bytes());
        body.push(HEADER_LEN as u8);
        let mut post_headers = vec![0u8; 41];
        post_headers[18] = 8;
        body.extend_from_slice(&post_headers);
        body.push(u8::from(self.checksum));
        body.extend_from_slice(&[0x11, 0x22, 0x33, 0x44]);
        self.raw_event(15, body)
    }

    fn query(self, sql: &str) -> Self {
        let mut body = Vec::new();
        body.extend_from_slice(&9u32.to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        body.push(4);
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(&0u16.to_le_bytes());
        body.extend_from_slice(b"shop\0");
        body.extend_from_slice(sql.as_bytes());
        self.event(2, body)
    }

    fn write(self) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&self.bytes).unwrap();
        file.flush().unwrap();
        file
    }
}

async fn pull_event(source: &mut LocalBinlogSource) -> binlog_core::ChangeEvent {
    match source.pull(None).await.unwrap() {
        Pulled::Event(event) => event,
        other => panic!("expected an event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_reads_events_with_checksums() {
    let file = FileBuilder::new(true)
        .format_description()
        .query("BEGIN")
        .query("INSERT INTO t VALUES (1)")
        .write();

    let mut source = LocalBinlogSource::open(file.path()).await.unwrap();
    let fde = pull_event(&mut source).await;
    assert_eq!(fde.header.event_type, EventType::FormatDescription);
    assert_eq!(fde.end_log_position(), 4 + 19 + 103);

    let begin = pull_event(&mut source).await;
    let EventPayload::Query(query) = begin.payload else {
        panic!("expected query");
    };
    assert_eq!(query.query, "BEGIN");

    let insert = pull_event(&mut source).await;
    let EventPayload::Query(query) = insert.payload else {
        panic!("expected query");
    };
    assert_eq!(query.query, "INSERT INTO t VALUES (1)");
    assert_eq!(query.schema, "shop");

    assert_eq!(source.pull(None).await.unwrap(), Pulled::EndOfStream);
}

#[tokio::test]
async fn test_reads_events_without_checksums() {
    let file = FileBuilder::new(false)
        .format_description()
        .query("CREATE TABLE t (id INT)")
        .write();

    let mut source = LocalBinlogSource::open(file.path()).await.unwrap();
    pull_event(&mut source).await;
    let event = pull_event(&mut source).await;
    let EventPayload::Query(query) = event.payload else {
        panic!("expected query");
    };
    assert_eq!(query.query, "CREATE TABLE t (id INT)");
}

#[tokio::test]
async fn test_file_name_is_base_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mysql-bin.000012");
    std::fs::write(&path, [0xfe, b'b', b'i', b'n']).unwrap();

    let mut source = LocalBinlogSource::open(&path).await.unwrap();
    assert_eq!(source.file_name(), "mysql-bin.000012");
    assert_eq!(source.pull(None).await.unwrap(), Pulled::EndOfStream);
}

#[tokio::test]
async fn test_rejects_bad_magic() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"GIF89a").unwrap();

    let err = LocalBinlogSource::open(file.path()).await.err().unwrap();
    assert!(matches!(
        err,
        SourceError::Precondition(PreconditionError::BadFileHeader(_))
    ));
}

#[tokio::test]
async fn test_truncated_event_is_malformed() {
    let mut bytes = FileBuilder::new(false).query("BEGIN").bytes;
    bytes.truncate(bytes.len() - 3);
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();

    let mut source = LocalBinlogSource::open(file.path()).await.unwrap();
    let err = source.pull(None).await.unwrap_err();
    assert!(matches!(err, SourceError::Malformed(_)));
}
