use crate::decode::time::now_in_s;
use crate::event::FrameEvent;
use crate::pipeline::Producer;
use crate::source::{beast, InputFormat, SourceTag};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Replays a capture file and ends naturally, for the pipeline's wait
/// mode.
pub struct FileProducer {
    path: PathBuf,
    tag: Arc<SourceTag>,
}

impl FileProducer {
    pub fn new(path: impl Into<PathBuf>, tag: SourceTag) -> Self {
        FileProducer {
            path: path.into(),
            tag: Arc::new(tag),
        }
    }
}

#[async_trait::async_trait]
impl Producer for FileProducer {
    fn name(&self) -> &str {
        &self.tag.name
    }

    async fn run(
        self: Box<Self>,
        tx: mpsc::Sender<FrameEvent>,
        cancel: CancellationToken,
    ) -> std::io::Result<()> {
        let file = tokio::fs::File::open(&self.path).await?;
        match self.tag.format {
            InputFormat::Beast => {
                read_beast(file, &self.tag, &tx, &cancel).await
            }
            _ => read_lines(file, &self.tag, &tx, &cancel).await,
        }
    }
}

/// Connects to a dump1090 port and feeds frames until cancelled,
/// reconnecting with a fixed delay when the peer goes away.
pub struct TcpProducer {
    address: String,
    tag: Arc<SourceTag>,
    reconnect_delay: Duration,
}

impl TcpProducer {
    pub fn new(address: impl Into<String>, tag: SourceTag) -> Self {
        TcpProducer {
            address: address.into(),
            tag: Arc::new(tag),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

#[async_trait::async_trait]
impl Producer for TcpProducer {
    fn name(&self) -> &str {
        &self.tag.name
    }

    async fn run(
        self: Box<Self>,
        tx: mpsc::Sender<FrameEvent>,
        cancel: CancellationToken,
    ) -> std::io::Result<()> {
        loop {
            let connection = tokio::select! {
                c = TcpStream::connect(&self.address) => c,
                _ = cancel.cancelled() => return Ok(()),
            };
            match connection {
                Ok(stream) => {
                    info!(address = %self.address, "connected");
                    let result = match self.tag.format {
                        InputFormat::Beast => {
                            read_beast(stream, &self.tag, &tx, &cancel).await
                        }
                        _ => {
                            read_lines(stream, &self.tag, &tx, &cancel).await
                        }
                    };
                    if let Err(e) = result {
                        warn!(address = %self.address, error = %e, "connection lost");
                    }
                }
                Err(e) => {
                    warn!(address = %self.address, error = %e, "connect failed");
                }
            }
            if cancel.is_cancelled() || tx.is_closed() {
                return Ok(());
            }
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = cancel.cancelled() => return Ok(()),
            }
        }
    }
}

/// One FrameEvent per text line (AVR and SBS1 framings).
async fn read_lines<R>(
    reader: R,
    tag: &Arc<SourceTag>,
    tx: &mpsc::Sender<FrameEvent>,
    cancel: &CancellationToken,
) -> std::io::Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = cancel.cancelled() => return Ok(()),
        };
        let Some(line) = line else {
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }
        let event = FrameEvent {
            data: line.into_bytes(),
            received_at: now_in_s(),
            tag: tag.clone(),
        };
        if tx.send(event).await.is_err() {
            return Ok(());
        }
    }
}

/// One FrameEvent per Beast record, unescaped by the deframer.
async fn read_beast<R>(
    reader: R,
    tag: &Arc<SourceTag>,
    tx: &mpsc::Sender<FrameEvent>,
    cancel: &CancellationToken,
) -> std::io::Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut reader = reader;
    let mut deframer = beast::Deframer::new();
    let mut buffer = [0u8; 4096];
    loop {
        let read = tokio::select! {
            read = reader.read(&mut buffer) => read?,
            _ = cancel.cancelled() => return Ok(()),
        };
        if read == 0 {
            return Ok(());
        }
        deframer.push(&buffer[..read]);
        while let Some(record) = deframer.next_record() {
            let event = FrameEvent {
                data: record,
                received_at: now_in_s(),
                tag: tag.clone(),
            };
            if tx.send(event).await.is_err() {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Producer;

    #[tokio::test]
    async fn file_replay_ends_naturally() {
        let dir = std::env::temp_dir();
        let path = dir.join("watch1090-avr-replay-test.txt");
        tokio::fs::write(
            &path,
            "*8D40621D58C382D690C8AC2863A7;\n*8D40621D58C386435CC412692AD6;\n",
        )
        .await
        .unwrap();

        let producer = Box::new(FileProducer::new(
            &path,
            SourceTag::new("replay", InputFormat::Avr),
        ));
        let (tx, mut rx) = mpsc::channel(16);
        producer
            .run(tx, CancellationToken::new())
            .await
            .unwrap();

        let mut frames = Vec::new();
        while let Ok(event) = rx.try_recv() {
            frames.push(event);
        }
        assert_eq!(frames.len(), 2);
        assert!(frames[0].data.starts_with(b"*8D40621D"));

        let _ = tokio::fs::remove_file(&path).await;
    }
}
