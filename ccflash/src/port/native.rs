//! Native serial transport using the `serialport` crate.
//!
//! Events are serialized onto an `mpsc` channel owned by the driver: a
//! reader thread pumps received bytes (and removal/close notifications)
//! into it, and each armed timer is a detached one-shot thread sending its
//! firing into the same channel. The session consumes the receiving end on
//! a single thread, so transitions never race.

use crate::error::{Error, Result};
use crate::port::{Parity, PortInfo, SerialSettings, StopBits, TimerScheduler, Transport};
use crate::session::{SessionEvent, TimerKind};
use log::{debug, trace, warn};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Poll interval for the reader thread; bounds close latency.
const READ_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial transport backed by a real port, pumping [`SessionEvent`]s into
/// the session's queue.
pub struct NativeTransport {
    port_name: String,
    events: Sender<SessionEvent>,
    port: Option<Box<dyn serialport::SerialPort>>,
    shutdown: Option<Arc<AtomicBool>>,
    reader: Option<JoinHandle<()>>,
}

impl NativeTransport {
    /// Create a transport for the named port. Nothing is opened yet.
    pub fn new(port_name: impl Into<String>, events: Sender<SessionEvent>) -> Self {
        Self {
            port_name: port_name.into(),
            events,
            port: None,
            shutdown: None,
            reader: None,
        }
    }

    /// The port name this transport targets.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.port_name
    }
}

impl Transport for NativeTransport {
    fn open(&mut self, settings: &SerialSettings) -> Result<()> {
        let mut port = serialport::new(&self.port_name, settings.baud_rate)
            .timeout(READ_POLL_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .parity(settings.parity.into())
            .stop_bits(settings.stop_bits.into())
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| Error::PortOpen(format!("{}: {e}", self.port_name)))?;

        trace!("Setting DTR={} RTS={}", settings.dtr, settings.rts);
        port.write_data_terminal_ready(settings.dtr)
            .map_err(|e| Error::PortOpen(e.to_string()))?;
        port.write_request_to_send(settings.rts)
            .map_err(|e| Error::PortOpen(e.to_string()))?;

        let reader_port = port
            .try_clone()
            .map_err(|e| Error::PortOpen(e.to_string()))?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let reader = spawn_reader(reader_port, self.events.clone(), Arc::clone(&shutdown));

        self.port = Some(port);
        self.shutdown = Some(shutdown);
        self.reader = Some(reader);

        debug!("Opened {} at {} baud", self.port_name, settings.baud_rate);
        let _ = self.events.send(SessionEvent::PortOpened);
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(port) = self.port.as_mut() else {
            return Err(Error::Send("port is not open".into()));
        };

        trace!("Sending {} bytes", bytes.len());
        port.write_all(bytes)
            .and_then(|()| port.flush())
            .map_err(|e| Error::Send(e.to_string()))
    }

    fn close(&mut self) {
        if let Some(flag) = self.shutdown.take() {
            flag.store(true, Ordering::SeqCst);
        }

        // Drop our handle; the reader keeps its clone until it notices the
        // shutdown flag, sends PortClosed and exits (bounded by the poll
        // timeout).
        self.port.take();
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        debug!("Closed {}", self.port_name);
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

fn spawn_reader(
    mut port: Box<dyn serialport::SerialPort>,
    events: Sender<SessionEvent>,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0u8; 256];
        loop {
            if shutdown.load(Ordering::SeqCst) {
                let _ = events.send(SessionEvent::PortClosed);
                return;
            }

            match port.read(&mut buf) {
                Ok(0) => {},
                Ok(n) => {
                    let _ = events.send(SessionEvent::BytesReceived(buf[..n].to_vec()));
                },
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {},
                Err(e) => {
                    if shutdown.load(Ordering::SeqCst) {
                        let _ = events.send(SessionEvent::PortClosed);
                    } else {
                        warn!("Serial read failed, treating port as removed: {e}");
                        let _ = events.send(SessionEvent::DeviceRemoved);
                    }
                    return;
                },
            }
        }
    })
}

/// One-shot timers backed by detached sleeper threads.
///
/// Fire-once, no cancellation: the session ignores firings that no longer
/// apply, so a stale thread waking up is harmless.
#[derive(Clone)]
pub struct NativeTimers {
    events: Sender<SessionEvent>,
}

impl NativeTimers {
    /// Create a scheduler delivering firings into the given queue.
    pub fn new(events: Sender<SessionEvent>) -> Self {
        Self { events }
    }
}

impl TimerScheduler for NativeTimers {
    fn schedule(&mut self, delay: Duration, timer: TimerKind) {
        let events = self.events.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            let _ = events.send(SessionEvent::TimerElapsed(timer));
        });
    }
}

/// List the serial ports available on this system.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(Error::Serial)?;

    Ok(ports
        .into_iter()
        .map(|p| {
            let (manufacturer, product) = match &p.port_type {
                serialport::SerialPortType::UsbPort(info) => {
                    (info.manufacturer.clone(), info.product.clone())
                },
                _ => (None, None),
            };

            PortInfo {
                name: p.port_name,
                manufacturer,
                product,
            }
        })
        .collect())
}

// Type conversions from our types to serialport types

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => Self::None,
            Parity::Odd => Self::Odd,
            Parity::Even => Self::Even,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => Self::One,
            StopBits::Two => Self::Two,
        }
    }
}
