//! Stream transport for the dispatcher.
//!
//! Two framings are supported:
//!
//! - `Lines`: one JSON document per `\n`-terminated line, blank lines ignored
//! - `Native`: browser native messaging, a u32 little-endian length prefix
//!   followed by that many bytes of JSON
//!
//! Frames are capped at [`MAX_FRAME_BYTES`]. Each request is dispatched on its
//! own task so a `stop` can reach the executor while a `run` is in flight;
//! responses are written in completion order and matched by `id`.

use std::io::ErrorKind;
use std::sync::Arc;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::ApiError;
use crate::message::{Request, Response};

/// Largest frame accepted or produced, in bytes.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

const RESPONSE_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Framing {
    #[default]
    Lines,
    Native,
}

/// Read the next frame. `Ok(None)` on a clean end of stream.
pub async fn read_frame<R>(reader: &mut R, framing: Framing) -> Result<Option<Vec<u8>>, ApiError>
where
    R: AsyncBufRead + Unpin,
{
    match framing {
        Framing::Lines => loop {
            let mut line = Vec::new();
            let limit = MAX_FRAME_BYTES as u64 + 1;
            let read = (&mut *reader).take(limit).read_until(b'\n', &mut line).await?;
            if read == 0 {
                return Ok(None);
            }
            if line.last() != Some(&b'\n') && line.len() > MAX_FRAME_BYTES {
                return Err(ApiError::FrameTooLarge(line.len()));
            }
            let trimmed = line.trim_ascii();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_vec()));
            }
        },
        Framing::Native => {
            let len = match reader.read_u32_le().await {
                Ok(len) => len as usize,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            if len > MAX_FRAME_BYTES {
                return Err(ApiError::FrameTooLarge(len));
            }
            let mut frame = vec![0; len];
            reader.read_exact(&mut frame).await?;
            Ok(Some(frame))
        }
    }
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, framing: Framing, frame: &[u8]) -> Result<(), ApiError>
where
    W: AsyncWrite + Unpin,
{
    if frame.len() > MAX_FRAME_BYTES {
        return Err(ApiError::FrameTooLarge(frame.len()));
    }
    match framing {
        Framing::Lines => {
            writer.write_all(frame).await?;
            writer.write_all(b"\n").await?;
        }
        Framing::Native => {
            writer.write_u32_le(frame.len() as u32).await?;
            writer.write_all(frame).await?;
        }
    }
    writer.flush().await?;
    Ok(())
}

/// Serves a [`Dispatcher`] over a byte stream pair.
pub struct Bridge {
    dispatcher: Arc<Dispatcher>,
    framing: Framing,
}

impl Bridge {
    pub fn new(dispatcher: Arc<Dispatcher>, framing: Framing) -> Self {
        Self {
            dispatcher,
            framing,
        }
    }

    /// Serve until `reader` reaches end of stream, then wait for in-flight
    /// requests to answer. An oversized or truncated frame ends the session
    /// with an error.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), ApiError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        info!(framing = ?self.framing, "Bridge started");
        let mut reader = BufReader::new(reader);
        let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);
        let writer_task = tokio::spawn(write_responses(writer, self.framing, rx));

        let read_result = loop {
            let frame = match read_frame(&mut reader, self.framing).await {
                Ok(Some(frame)) => frame,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };

            let request: Request = match serde_json::from_slice(&frame) {
                Ok(request) => request,
                Err(e) => {
                    warn!("Discarding malformed request: {}", e);
                    let error = ApiError::InvalidRequest(e.to_string());
                    if tx.send(Response::err(None, &error)).await.is_err() {
                        break Ok(());
                    }
                    continue;
                }
            };

            let dispatcher = self.dispatcher.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let response = dispatcher.handle(request).await;
                let _ = tx.send(response).await;
            });
        };

        drop(tx);
        let write_result = writer_task
            .await
            .map_err(|e| ApiError::Io(std::io::Error::other(e)))?;
        info!("Bridge closed");
        read_result.and(write_result)
    }
}

async fn write_responses<W>(
    mut writer: W,
    framing: Framing,
    mut rx: mpsc::Receiver<Response>,
) -> Result<(), ApiError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut frame = serde_json::to_vec(&response)?;
        if frame.len() > MAX_FRAME_BYTES {
            warn!(bytes = frame.len(), "Response too large, replacing with an error");
            let error = ApiError::FrameTooLarge(frame.len());
            frame = serde_json::to_vec(&Response::err(response.id, &error))?;
        }
        debug!(bytes = frame.len(), "Writing response");
        write_frame(&mut writer, framing, &frame).await?;
    }
    Ok(())
}
