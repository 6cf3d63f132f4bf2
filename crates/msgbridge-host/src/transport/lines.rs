//! Line-delimited JSON channel over an async byte stream (stdio in the binary).
//!
//! Outbound lines go through an unbounded queue drained by a writer task.
//! The reader task starts when the first intake is installed, so nothing read
//! before attachment is lost. Lines that are not JSON are forwarded as a JSON
//! string; the protocol's boundary validation then answers with an error
//! envelope instead of this layer guessing.

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use msgbridge_core::error::{MsgBridgeError, Result};

use super::codec;
use super::{Channel, Intake};

type BoxReader = Box<dyn AsyncBufRead + Send + Unpin>;
type IntakeSlot = Arc<RwLock<Option<Intake>>>;

pub struct LineChannel {
    out_tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    intake: IntakeSlot,
    pending_reader: Mutex<Option<(BoxReader, watch::Sender<bool>)>>,
    eof_rx: watch::Receiver<bool>,
    max_line_bytes: usize,
}

impl LineChannel {
    /// Wrap `reader`/`writer`. Must be called inside a tokio runtime.
    pub fn spawn<R, W>(reader: R, writer: W, max_line_bytes: usize) -> Arc<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_loop(writer, out_rx));
        let (eof_tx, eof_rx) = watch::channel(false);
        let reader: BoxReader = Box::new(BufReader::new(reader));

        Arc::new(Self {
            out_tx: Mutex::new(Some(out_tx)),
            writer: Mutex::new(Some(writer)),
            intake: Arc::new(RwLock::new(None)),
            pending_reader: Mutex::new(Some((reader, eof_tx))),
            eof_rx,
            max_line_bytes,
        })
    }

    /// Resolves once the inbound stream reached EOF or failed.
    pub async fn closed(&self) {
        let mut rx = self.eof_rx.clone();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Stop accepting outbound messages and wait until queued lines are flushed.
    pub async fn shutdown(&self) {
        drop(self.out_tx.lock().take());
        let writer = self.writer.lock().take();
        if let Some(handle) = writer {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "line writer task failed");
            }
        }
    }
}

impl Channel for LineChannel {
    fn post_message(&self, message: Value) -> Result<()> {
        let line = codec::encode_line(&message)?;
        match self.out_tx.lock().as_ref() {
            Some(tx) => tx
                .send(line)
                .map_err(|_| MsgBridgeError::Transport("line writer stopped".into())),
            None => Err(MsgBridgeError::Transport("line channel shut down".into())),
        }
    }

    fn on_did_receive_message(&self, intake: Intake) {
        *self.intake.write() = Some(intake);

        let pending = self.pending_reader.lock().take();
        if let Some((reader, eof_tx)) = pending {
            tokio::spawn(read_loop(
                reader,
                Arc::clone(&self.intake),
                self.max_line_bytes,
                eof_tx,
            ));
        }
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Bytes>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        if let Err(e) = writer.write_all(&line).await {
            tracing::warn!(error = %e, "line write failed; writer stopping");
            return;
        }
        if let Err(e) = writer.flush().await {
            tracing::warn!(error = %e, "line flush failed; writer stopping");
            return;
        }
    }
}

async fn read_loop(
    mut reader: BoxReader,
    intake: IntakeSlot,
    max_line_bytes: usize,
    eof_tx: watch::Sender<bool>,
) {
    let mut buf = Vec::with_capacity(1024);
    loop {
        match read_frame(&mut reader, &mut buf, max_line_bytes).await {
            Ok(Frame::Line) => {
                let Some(decoded) = codec::decode_line(&buf) else {
                    continue;
                };
                let value = match decoded {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::debug!(error = %e, "undecodable line forwarded for validation");
                        Value::String(String::from_utf8_lossy(&buf).into_owned())
                    }
                };
                let current = intake.read().clone();
                if let Some(f) = current {
                    f(value);
                }
            }
            Ok(Frame::Oversize) => {
                tracing::warn!(max_line_bytes, "inbound line exceeds limit; dropped");
            }
            Ok(Frame::Eof) => break,
            Err(e) => {
                tracing::warn!(error = %e, "line read failed");
                break;
            }
        }
    }
    tracing::debug!("line channel reached end of input");
    let _ = eof_tx.send(true);
}

#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Line,
    Oversize,
    Eof,
}

/// Read one line into `buf` (terminator stripped), never buffering more than
/// `max + 1` bytes. Oversize lines are consumed up to their terminator.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>, max: usize) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let limit = max as u64 + 1;
    buf.clear();
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(Frame::Eof);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        return Ok(Frame::Line);
    }
    if buf.len() <= max {
        // final line without terminator
        return Ok(Frame::Line);
    }

    loop {
        buf.clear();
        let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
        if n == 0 || buf.last() == Some(&b'\n') {
            buf.clear();
            return Ok(Frame::Oversize);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn frames_respect_limit() {
        let input: &[u8] = b"short\nthis-line-is-way-too-long\nok\nlast";
        let mut r = BufReader::new(input);
        let mut buf = Vec::new();

        assert_eq!(read_frame(&mut r, &mut buf, 8).await.unwrap(), Frame::Line);
        assert_eq!(buf, b"short");
        assert_eq!(read_frame(&mut r, &mut buf, 8).await.unwrap(), Frame::Oversize);
        assert_eq!(read_frame(&mut r, &mut buf, 8).await.unwrap(), Frame::Line);
        assert_eq!(buf, b"ok");
        assert_eq!(read_frame(&mut r, &mut buf, 8).await.unwrap(), Frame::Line);
        assert_eq!(buf, b"last");
        assert_eq!(read_frame(&mut r, &mut buf, 8).await.unwrap(), Frame::Eof);
    }

    #[tokio::test]
    async fn inbound_lines_reach_intake_and_outbound_lines_are_written() {
        let (mut ui_in, host_in) = tokio::io::duplex(4096);
        let (host_out, mut ui_out) = tokio::io::duplex(4096);
        let ch = LineChannel::spawn(host_in, host_out, 1024);

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        ch.on_did_receive_message(Arc::new(move |v| {
            let _ = seen_tx.send(v);
        }));

        ui_in.write_all(b"{\"type\":\"sys/ping\"}\n\nnot json\n").await.unwrap();
        assert_eq!(seen_rx.recv().await, Some(json!({"type": "sys/ping"})));
        assert_eq!(seen_rx.recv().await, Some(json!("not json")));

        ch.post_message(json!({"type": "x", "payload": 1})).unwrap();
        drop(ui_in);
        ch.closed().await;
        ch.shutdown().await;

        let mut written = String::new();
        ui_out.read_to_string(&mut written).await.unwrap();
        assert!(written.ends_with('\n'));
        let echoed: Value = serde_json::from_str(written.trim_end()).unwrap();
        assert_eq!(echoed, json!({"type": "x", "payload": 1}));

        assert!(ch.post_message(json!(null)).is_err());
    }
}
