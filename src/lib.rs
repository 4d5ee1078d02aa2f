//! Uniform access to UART style serial ports on Linux, Windows, macOS and Solaris.
//!
//! The entry point is [`SerialManager`]: it opens ports with access and exclusivity
//! semantics, configures framing and flow control, reads and writes byte streams with
//! endianness aware helpers, controls modem lines, delivers received data and line
//! events to registered listeners from background workers, watches for device hotplug,
//! and transfers files over XMODEM.
//!
//! All platform specific behaviour lives behind the [`SerialAdapter`] trait. With the
//! `"serial2"` feature enabled (the default) a ready to use adapter backed by the
//! [`serial2`] crate is available through [`SerialManager::new()`]; custom adapters can
//! be plugged in through [`SerialManager::with_adapter()`].
//!
//! ```no_run
//! use sercom::{BaudRate, DataBits, Parity, SerialManager, StopBits};
//!
//! # fn main() -> Result<(), sercom::Error> {
//! let manager = SerialManager::new();
//! let handle = manager.open("/dev/ttyUSB0", true, true, true)?;
//! manager.configure_data(handle, DataBits::Eight, StopBits::One, Parity::None, BaudRate::B115200, 0)?;
//! manager.write_bytes(handle, b"hello", 0)?;
//! manager.close(handle)?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod log;

pub mod adapter;
pub mod settings;

mod dispatcher;
mod endian;
mod error;
mod listener;
mod looper;
mod manager;
mod registry;
mod xmodem;

pub use adapter::{AdapterError, ReadOutcome, SerialAdapter};
pub use endian::{read_u16_be, read_u16_le, read_u32_be, read_u32_le, write_u16_be, write_u16_le, write_u32_be, write_u32_le};
pub use error::{Error, IoError};
pub use listener::{DataListener, EventListener, PortMonitorEvent, PortMonitorListener};
pub use looper::DeliverySink;
pub use manager::{SerialManager, DEFAULT_READ_BYTE_COUNT};
pub use settings::{BaudRate, ByteWidth, DataBits, Endian, FileTransferProtocol, FlowControl, OsType, Parity, StopBits};

#[cfg(feature = "serial2")]
pub use adapter::serial2::Serial2Adapter;

/// Identifies one opened serial port.
///
/// Handles are allocated by the adapter on open and stay valid until [`SerialManager::close()`].
/// Negative values never name an open port; the one negative value an application will see is
/// the `-1` returned by [`SerialManager::open()`] for a duplicate exclusive claim.
pub type SerialHandle = i64;
