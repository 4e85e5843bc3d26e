use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerialError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: serialport::Error,
    },
    #[error(transparent)]
    Port(#[from] serialport::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The serial console on the far side of the bridge.
///
/// One reader, one writer: the poll loop drains output, WebSocket sessions
/// write input. Both directions go through interior locking so the handle
/// can be shared as `Arc<dyn SerialPeer>`.
pub trait SerialPeer: Send + Sync {
    /// Drains every byte currently readable, without blocking. An empty
    /// vec means nothing was pending.
    fn read_available(&self) -> Result<Vec<u8>, SerialError>;

    /// Writes a full payload to the peer.
    fn write_all(&self, data: &[u8]) -> Result<(), SerialError>;

    /// Reconfigures the transmission rate in place.
    fn set_baud(&self, rate: u32) -> Result<(), SerialError>;
}

/// A real tty device driven through the `serialport` crate.
pub struct TtyPeer {
    port: Mutex<Box<dyn serialport::SerialPort>>,
}

impl TtyPeer {
    pub fn open(path: &str, baud: u32) -> Result<Self, SerialError> {
        let port = serialport::new(path, baud)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .timeout(Duration::from_millis(50))
            .open()
            .map_err(|source| SerialError::Open {
                path: path.to_string(),
                source,
            })?;
        Ok(Self {
            port: Mutex::new(port),
        })
    }
}

impl SerialPeer for TtyPeer {
    fn read_available(&self) -> Result<Vec<u8>, SerialError> {
        let mut port = self.port.lock().unwrap();
        let pending = port.bytes_to_read()? as usize;
        if pending == 0 {
            return Ok(Vec::new());
        }
        // The driver already buffers `pending` bytes, so this cannot block.
        let mut buf = vec![0u8; pending];
        port.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write_all(&self, data: &[u8]) -> Result<(), SerialError> {
        let mut port = self.port.lock().unwrap();
        port.write_all(data)?;
        port.flush()?;
        Ok(())
    }

    fn set_baud(&self, rate: u32) -> Result<(), SerialError> {
        let mut port = self.port.lock().unwrap();
        port.set_baud_rate(rate)?;
        Ok(())
    }
}

/// In-memory peer: scripted output chunks, captured input, recorded rate.
/// Stands in for the tty in tests and on development machines without a
/// console attached.
#[derive(Default)]
pub struct MockSerialPeer {
    outbox: Mutex<VecDeque<Vec<u8>>>,
    written: Mutex<Vec<u8>>,
    baud: AtomicU32,
}

impl MockSerialPeer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a chunk the fake console will emit on the next drain.
    pub fn emit(&self, bytes: &[u8]) {
        self.outbox.lock().unwrap().push_back(bytes.to_vec());
    }

    /// Everything the bridge has written toward the console so far.
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn baud(&self) -> u32 {
        self.baud.load(Ordering::Acquire)
    }
}

impl SerialPeer for MockSerialPeer {
    fn read_available(&self) -> Result<Vec<u8>, SerialError> {
        Ok(self.outbox.lock().unwrap().pop_front().unwrap_or_default())
    }

    fn write_all(&self, data: &[u8]) -> Result<(), SerialError> {
        self.written.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn set_baud(&self, rate: u32) -> Result<(), SerialError> {
        self.baud.store(rate, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_drains_one_chunk_per_read() {
        let peer = MockSerialPeer::new();
        peer.emit(b"first");
        peer.emit(b"second");
        assert_eq!(peer.read_available().unwrap(), b"first");
        assert_eq!(peer.read_available().unwrap(), b"second");
        assert!(peer.read_available().unwrap().is_empty());
    }

    #[test]
    fn mock_captures_writes_in_order() {
        let peer = MockSerialPeer::new();
        peer.write_all(b"ls").unwrap();
        peer.write_all(b" -la\n").unwrap();
        assert_eq!(peer.written(), b"ls -la\n");
    }

    #[test]
    fn mock_records_rate_changes() {
        let peer = MockSerialPeer::new();
        peer.set_baud(9600).unwrap();
        assert_eq!(peer.baud(), 9600);
    }
}
