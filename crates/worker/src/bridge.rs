//! Framed byte-stream bridge to a worker.
//!
//! Lets a worker run behind stdio or a pipe: tasks are read as frames
//! from `reader`, every message the worker emits is written as a frame
//! to `writer`.

use crate::host::Link;
use mcore::{
    Message, Task,
    frame::{self, FrameError},
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};

/// Pump frames between a byte stream and a worker until either side
/// closes.
///
/// Returns once the reader hits EOF and the worker has flushed its last
/// message, or when the worker goes away.
pub async fn serve<R, W>(reader: R, writer: W, link: Link) -> Result<(), FrameError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let Link { inbox, outbox } = link;
    let (received, sent) = tokio::join!(receiver_loop(reader, inbox), sender_loop(writer, outbox));
    received.and(sent)
}

/// Reads task frames and forwards them to the worker. Dropping `inbox`
/// on return shuts the worker down.
async fn receiver_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    inbox: mpsc::UnboundedSender<Task>,
) -> Result<(), FrameError> {
    loop {
        let task: Task = match frame::read_message(&mut reader).await {
            Ok(task) => task,
            Err(FrameError::ConnectionClosed) => return Ok(()),
            // The whole frame was consumed; the stream is still aligned.
            Err(FrameError::Json(e)) => {
                tracing::warn!("skipping malformed task frame: {e}");
                continue;
            }
            Err(e) => return Err(e),
        };
        if inbox.send(task).is_err() {
            tracing::debug!("worker gone, closing bridge");
            return Ok(());
        }
    }
}

/// Writes worker messages as frames until the worker exits.
async fn sender_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut outbox: mpsc::UnboundedReceiver<Message>,
) -> Result<(), FrameError> {
    while let Some(msg) = outbox.recv().await {
        frame::write_message(&mut writer, &msg).await?;
    }
    Ok(())
}
