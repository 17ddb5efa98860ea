use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, error, info, trace};

use crate::error::LinkError;
use crate::firmware::{Mode, ModeRegister};
use crate::utils::config::LinkConfig;
use crate::utils::consts::READ_CHUNK_BYTES;

/// Host to device command channel
pub trait CommandSink {
    fn send_mode(&mut self, mode: Mode) -> Result<(), LinkError>;
}

/// Serial port to the device, 8N1 without flow control
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialLink {
    pub fn open(config: &LinkConfig) -> Result<Self, LinkError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout())
            .open()
            .inspect_err(|e| error!("Cannot open {}: {}", config.port, e))?;
        info!("Opened {} at {} baud", config.port, config.baud_rate);
        Ok(Self {
            port,
            name: config.port.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Forward raw chunks to `tx` from a dedicated thread until `running`
    /// clears, the receiver goes away or the port fails
    pub fn spawn_reader(
        &self,
        tx: Sender<Vec<u8>>,
        running: Arc<AtomicBool>,
    ) -> Result<JoinHandle<()>, LinkError> {
        let port = self.port.try_clone()?;
        let name = self.name.clone();
        Ok(thread::spawn(move || read_loop(port, tx, running, &name)))
    }
}

impl CommandSink for SerialLink {
    fn send_mode(&mut self, mode: Mode) -> Result<(), LinkError> {
        self.port.write_all(&[mode.code()])?;
        self.port.flush()?;
        info!("Sent mode {} to {}", mode, self.name);
        Ok(())
    }
}

/// In-process link: the command goes straight into the firmware's register
impl CommandSink for Arc<ModeRegister> {
    fn send_mode(&mut self, mode: Mode) -> Result<(), LinkError> {
        self.on_receive(mode.code())
            .map(|_| ())
            .ok_or(LinkError::InvalidCommand(mode.code() as char))
    }
}

fn read_loop<R: Read>(mut port: R, tx: Sender<Vec<u8>>, running: Arc<AtomicBool>, name: &str) {
    let mut buf = [0u8; READ_CHUNK_BYTES];
    while running.load(Ordering::SeqCst) {
        match port.read(&mut buf) {
            Ok(0) => {
                info!("{} reached end of stream", name);
                break;
            }
            Ok(n) => {
                trace!("Read {} bytes from {}", n, name);
                if tx.send(buf[..n].to_vec()).is_err() {
                    debug!("Chunk receiver dropped, stopping reader");
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                error!("Read from {} failed: {}", name, e);
                break;
            }
        }
    }
    debug!("Reader for {} finished", name);
}

/// Device side of the loopback transport. Splits every write into
/// randomly sized chunks, the way a UART driver hands bytes over.
pub struct LoopbackWriter {
    tx: Sender<Vec<u8>>,
    rng: StdRng,
    max_chunk: usize,
}

impl LoopbackWriter {
    pub fn new(tx: Sender<Vec<u8>>, max_chunk: usize, seed: u64) -> Self {
        Self {
            tx,
            rng: StdRng::seed_from_u64(seed),
            max_chunk: max_chunk.max(1),
        }
    }
}

impl Write for LoopbackWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut rest = buf;
        while !rest.is_empty() {
            let n = self.rng.random_range(1..=self.max_chunk).min(rest.len());
            let (chunk, tail) = rest.split_at(n);
            self.tx
                .send(chunk.to_vec())
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "host side closed"))?;
            rest = tail;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_writer_preserves_bytes() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut writer = LoopbackWriter::new(tx, 5, 1);
        let data: Vec<u8> = (0..200u8).collect();
        writer.write_all(&data).unwrap();
        drop(writer);

        let chunks: Vec<Vec<u8>> = rx.iter().collect();
        assert!(chunks.len() >= 40);
        assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= 5));
        assert_eq!(chunks.concat(), data);
    }

    #[test]
    fn test_loopback_writer_reports_closed_host() {
        let (tx, rx) = crossbeam_channel::unbounded::<Vec<u8>>();
        drop(rx);
        let mut writer = LoopbackWriter::new(tx, 8, 1);
        let err = writer.write_all(b"X 134").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_read_loop_stops_at_end_of_stream() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let running = Arc::new(AtomicBool::new(true));
        let data = b"P 262 1.00 Y\r\n".to_vec();
        let handle = thread::spawn(move || {
            read_loop(io::Cursor::new(data), tx, running, "test");
        });
        handle.join().unwrap();

        // The sender is gone once the loop returns
        let chunks: Vec<Vec<u8>> = rx.iter().collect();
        assert_eq!(chunks, vec![b"P 262 1.00 Y\r\n".to_vec()]);
    }

    #[test]
    fn test_register_command_sink() {
        let mut register = Arc::new(ModeRegister::new(Mode::Distance1));
        register.send_mode(Mode::ThermalBoth).unwrap();
        assert_eq!(register.current(), Mode::ThermalBoth);
    }
}
