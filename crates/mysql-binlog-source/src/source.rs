//! Event sources: a local binlog file and a live replication stream.

use crate::codec::{BinlogCodec, BINLOG_MAGIC};
use async_trait::async_trait;
use binlog_core::{
    ChangeEvent, EventHeader, EventSource, EventType, PreconditionError, Pulled, SourceError,
};
use futures::StreamExt;
use mysql_async::{BinlogStream, BinlogStreamRequest, Pool};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};
use tracing::{debug, info};

/// Pick a replica server id that is unlikely to collide with real replicas.
pub fn random_server_id() -> u32 {
    rand::random::<u32>() % 1000000 + 1000000 // Random ID between 1M-2M
}

/// Reads events from a binlog file on disk.
pub struct LocalBinlogSource {
    path: PathBuf,
    reader: BufReader<File>,
    codec: BinlogCodec,
}

impl LocalBinlogSource {
    /// Open `path` and check the binlog magic header.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let mut reader = BufReader::new(File::open(&path).await?);

        let mut magic = [0u8; 4];
        let read = read_full(&mut reader, &mut magic).await?;
        if read != magic.len() || magic != BINLOG_MAGIC {
            return Err(PreconditionError::BadFileHeader(path.display().to_string()).into());
        }
        info!("Opened local binlog file {}", path.display());

        Ok(Self {
            path,
            reader,
            codec: BinlogCodec::for_file(),
        })
    }

    /// Base name of the file, used as the current binlog file name.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    async fn next_event(&mut self) -> Result<Pulled, SourceError> {
        let mut header_bytes = [0u8; EventHeader::SIZE];
        match read_full(&mut self.reader, &mut header_bytes).await? {
            0 => return Ok(Pulled::EndOfStream),
            n if n < EventHeader::SIZE => {
                return Err(SourceError::Malformed(format!(
                    "{}: truncated event header ({n} of {} bytes)",
                    self.path.display(),
                    EventHeader::SIZE
                )))
            }
            _ => {}
        }

        let header = BinlogCodec::decode_header(&header_bytes)
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        let mut body = vec![0u8; header.event_length as usize - EventHeader::SIZE];
        let read = read_full(&mut self.reader, &mut body).await?;
        if read < body.len() {
            return Err(SourceError::Malformed(format!(
                "{}: truncated {:?} event ending at {} ({read} of {} body bytes)",
                self.path.display(),
                header.event_type,
                header.end_log_position,
                body.len()
            )));
        }

        let event = self
            .codec
            .decode_event(header, &body)
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        Ok(Pulled::Event(event))
    }
}

#[async_trait]
impl EventSource for LocalBinlogSource {
    fn source_type(&self) -> &'static str {
        "mysql-binlog-file"
    }

    /// Files never block, so the deadline is ignored.
    async fn pull(&mut self, _deadline: Option<Duration>) -> Result<Pulled, SourceError> {
        self.next_event().await
    }
}

/// Fill `buf` as far as the reader allows, returning the bytes read.
async fn read_full(reader: &mut BufReader<File>, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Tails a server's binlog through the replication protocol.
pub struct LiveBinlogSource {
    stream: BinlogStream,
    codec: BinlogCodec,
    server_id: u32,
}

impl LiveBinlogSource {
    /// Register as a replica with `server_id` and start dumping from `file:position`.
    pub async fn connect(
        pool: &Pool,
        server_id: u32,
        file: &str,
        position: u64,
    ) -> anyhow::Result<Self> {
        let conn = pool.get_conn().await?;
        let request = BinlogStreamRequest::new(server_id)
            .with_filename(file.as_bytes())
            .with_pos(position);
        let stream = conn.get_binlog_stream(request).await?;
        info!(server_id, "Started binlog dump from {file}:{position}");

        Ok(Self {
            stream,
            codec: BinlogCodec::for_stream(),
            server_id,
        })
    }

    pub fn server_id(&self) -> u32 {
        self.server_id
    }

    fn convert(&mut self, event: mysql_async::binlog::events::Event) -> Result<Pulled, SourceError> {
        let raw = event.header();
        let header = EventHeader {
            timestamp: raw.timestamp(),
            event_type: EventType::from_code(raw.event_type_raw()),
            server_id: raw.server_id(),
            event_length: raw.event_size(),
            end_log_position: u64::from(raw.log_pos()),
            flags: raw.flags_raw(),
        };
        debug!(
            event_type = ?header.event_type,
            end_log_position = header.end_log_position,
            "Received event"
        );
        let event: ChangeEvent = self
            .codec
            .decode_event(header, event.data())
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        Ok(Pulled::Event(event))
    }
}

#[async_trait]
impl EventSource for LiveBinlogSource {
    fn source_type(&self) -> &'static str {
        "mysql-binlog-stream"
    }

    async fn pull(&mut self, deadline: Option<Duration>) -> Result<Pulled, SourceError> {
        let next = match deadline {
            Some(deadline) => match tokio::time::timeout(deadline, self.stream.next()).await {
                Ok(next) => next,
                Err(_) => return Ok(Pulled::Timeout),
            },
            None => self.stream.next().await,
        };

        match next {
            Some(Ok(event)) => self.convert(event),
            Some(Err(e)) => Err(SourceError::Connection(e.to_string())),
            None => Ok(Pulled::EndOfStream),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_server_id_range() {
        for _ in 0..100 {
            let id = random_server_id();
            assert!((1_000_000..2_000_000).contains(&id));
        }
    }
}
