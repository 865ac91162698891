use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use watch1090::event::Event;
use watch1090::prelude::Sink;

enum Writer {
    Stdout(tokio::io::Stdout),
    File(tokio::fs::File),
}

/// Writes one JSON record per event. Frame events are noisy and only
/// included on request.
pub struct JsonLinesSink {
    writer: Mutex<Writer>,
    include_frames: bool,
}

impl JsonLinesSink {
    pub fn stdout(include_frames: bool) -> Self {
        JsonLinesSink {
            writer: Mutex::new(Writer::Stdout(tokio::io::stdout())),
            include_frames,
        }
    }

    pub async fn file(
        path: &str,
        include_frames: bool,
    ) -> std::io::Result<Self> {
        let file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .await?;
        Ok(JsonLinesSink {
            writer: Mutex::new(Writer::File(file)),
            include_frames,
        })
    }
}

#[async_trait]
impl Sink for JsonLinesSink {
    fn name(&self) -> &str {
        "json-lines"
    }

    async fn on_event(&self, event: Event) {
        if !self.include_frames
            && matches!(event, Event::Frame(_) | Event::DedupedFrame(_))
        {
            return;
        }
        let Ok(mut line) = serde_json::to_vec(&event) else {
            return;
        };
        line.push(b'\n');
        let mut writer = self.writer.lock().await;
        let result = match &mut *writer {
            Writer::Stdout(out) => out.write_all(&line).await,
            Writer::File(file) => file.write_all(&line).await,
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "output write failed");
        }
    }

    async fn close(&self) {
        let mut writer = self.writer.lock().await;
        let _ = match &mut *writer {
            Writer::Stdout(out) => out.flush().await,
            Writer::File(file) => file.flush().await,
        };
    }
}
