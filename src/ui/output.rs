//! Output gate
//!
//! Serializes every pane's rendered chunks onto the real stdout. One thread
//! owns the writer; panes only send messages, so a chunk is always written
//! whole before the next one starts.

use std::io::Write;
use std::sync::mpsc::{self, Sender};
use std::thread;

use tracing::{debug, warn};

enum GateMessage {
    Chunk(Vec<u8>),
    /// Acknowledged once every earlier chunk has been flushed
    Sync(Sender<()>),
}

/// Cloneable handle to the single stdout writer
#[derive(Clone)]
pub struct OutputGate {
    tx: Sender<GateMessage>,
}

impl OutputGate {
    /// Start the writer thread that owns `out`.
    pub fn spawn<W>(mut out: W) -> Self
    where
        W: Write + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<GateMessage>();

        let spawned = thread::Builder::new()
            .name("output-gate".to_string())
            .spawn(move || {
                for message in rx {
                    match message {
                        GateMessage::Chunk(chunk) => {
                            if let Err(e) = out.write_all(&chunk).and_then(|()| out.flush()) {
                                warn!("Failed to write to terminal: {}", e);
                            }
                        }
                        GateMessage::Sync(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
                debug!("Output gate finished");
            });
        if let Err(e) = spawned {
            warn!("Failed to start output gate: {}", e);
        }

        Self { tx }
    }

    /// Queue one chunk. Returns false if the writer is gone.
    pub fn write(&self, chunk: Vec<u8>) -> bool {
        self.tx.send(GateMessage::Chunk(chunk)).is_ok()
    }

    /// Block until everything queued so far has reached the writer.
    pub fn sync(&self) {
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.tx.send(GateMessage::Sync(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Writer whose contents can be inspected from the test thread
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        pub(crate) fn contents(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            // Byte at a time so a non-atomic writer would interleave
            if let Some(&b) = buf.first() {
                self.0.lock().unwrap().push(b);
                thread::yield_now();
                return Ok(1);
            }
            Ok(0)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_chunks_written_in_order() {
        let sink = SharedBuf::default();
        let gate = OutputGate::spawn(sink.clone());

        assert!(gate.write(b"one ".to_vec()));
        assert!(gate.write(b"two".to_vec()));
        gate.sync();

        assert_eq!(sink.contents(), b"one two".to_vec());
    }

    #[test]
    fn test_concurrent_panes_never_split_a_sequence() {
        let sink = SharedBuf::default();
        let gate = OutputGate::spawn(sink.clone());
        let chunks: Vec<String> = (1..=4)
            .map(|pane| format!("\x1b[{pane};{pane}H\x1b[1;3{pane}m"))
            .collect();

        let handles: Vec<_> = chunks
            .iter()
            .cloned()
            .map(|chunk| {
                let gate = gate.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        gate.write(chunk.clone().into_bytes());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        gate.sync();

        let mut rest = String::from_utf8(sink.contents()).unwrap();
        assert_eq!(rest.len(), chunks.iter().map(|c| c.len() * 50).sum::<usize>());
        for chunk in &chunks {
            rest = rest.replace(chunk.as_str(), "");
        }
        assert!(rest.is_empty(), "interleaved output left: {:?}", rest);
    }
}
