//! [`SerialAdapter`] trait to support driving different native serial backends.

use std::sync::Arc;

use crate::listener::PortMonitorListener;
use crate::looper::DeliverySink;
use crate::SerialHandle;

#[cfg(feature = "serial2")]
pub mod serial2;

/// Outcome of one adapter read.
///
/// The three non-error cases a serial read must distinguish: bytes arrived, nothing
/// was available within the adapter's read interval, or the endpoint reached end of
/// stream (on Linux this is what a yanked USB-UART converter looks like).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
	Data(Vec<u8>),
	NoData,
	Eof,
}

/// A failure inside the adapter, carried as a negative native status code.
///
/// The code is a negated OS error number where one exists. An adapter may attach a
/// detail message; without one, the façade maps the code through the OS error table.
#[derive(Debug)]
pub struct AdapterError {
	code: i32,
	detail: Option<String>,
}

impl AdapterError {
	pub fn new(code: i32) -> Self {
		Self { code, detail: None }
	}

	pub fn with_detail(code: i32, detail: impl Into<String>) -> Self {
		Self {
			code,
			detail: Some(detail.into()),
		}
	}

	/// The handle does not name a port this adapter has open.
	pub fn bad_handle(handle: SerialHandle) -> Self {
		Self::with_detail(-9, format!("adapter has no open port for handle {}", handle))
	}

	/// The operation exists in the contract but this adapter can not perform it.
	pub fn unsupported(what: &str) -> Self {
		Self::with_detail(-95, format!("{} is not supported by this adapter", what))
	}

	pub fn code(&self) -> i32 {
		self.code
	}

	pub fn detail(&self) -> Option<&str> {
		self.detail.as_deref()
	}
}

impl From<std::io::Error> for AdapterError {
	fn from(other: std::io::Error) -> Self {
		let code = other.raw_os_error().map(|code| -code).unwrap_or(-5);
		Self::with_detail(code, other.to_string())
	}
}

impl std::error::Error for AdapterError {}

impl std::fmt::Display for AdapterError {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match &self.detail {
			Some(detail) => write!(f, "adapter error {}: {}", self.code, detail),
			None => write!(f, "adapter error {}", self.code),
		}
	}
}

/// The native serial backend consumed by [`SerialManager`][crate::SerialManager].
///
/// All platform divergence lives below this trait. Implementations must be usable from
/// multiple threads at once: the façade issues reads and writes on caller threads while
/// the delivery pumps started by [`SerialAdapter::start_data_delivery()`] run on their
/// own, possibly touching the same handle.
///
/// The numeric parameters of the configuration operations take the wire values defined
/// in [`settings`][crate::settings]; handles are non-negative and allocated by
/// [`SerialAdapter::open()`].
pub trait SerialAdapter: Send + Sync {
	/// Names of the serial ports currently present in the system.
	fn list_ports(&self) -> Vec<String>;

	/// Open a port and allocate a handle for it.
	///
	/// With `exclusive` set the adapter takes an OS level or process level claim so a
	/// second open of the same port fails until this handle is closed.
	fn open(&self, name: &str, enable_read: bool, enable_write: bool, exclusive: bool)
		-> Result<SerialHandle, AdapterError>;

	/// Close the port. The handle is invalid afterwards.
	fn close(&self, handle: SerialHandle) -> Result<(), AdapterError>;

	/// Read up to `count` bytes, reporting the outcome per [`ReadOutcome`].
	fn read_bytes(&self, handle: SerialHandle, count: usize) -> Result<ReadOutcome, AdapterError>;

	/// Write the whole buffer, returning once the bytes sit in the OS transmit queue.
	///
	/// `delay_ms` is the pause to keep between consecutive bytes; zero writes the
	/// buffer in one go.
	fn write_bytes(&self, handle: SerialHandle, buffer: &[u8], delay_ms: u32) -> Result<(), AdapterError>;

	/// Apply frame settings. `baud` of 251 selects `custom_baud`.
	fn configure_data(
		&self,
		handle: SerialHandle,
		data_bits: u8,
		stop_bits: u8,
		parity: u8,
		baud: u32,
		custom_baud: u32,
	) -> Result<(), AdapterError>;

	/// Apply flow control and error behaviour settings.
	fn configure_control(
		&self,
		handle: SerialHandle,
		flow: u8,
		xon: u8,
		xoff: u8,
		parity_frame_check: bool,
		overflow_check: bool,
	) -> Result<(), AdapterError>;

	/// The port's current settings as an ordered list of printable fields.
	///
	/// Adapters with raw access report the native structure in field order (termios
	/// fields on POSIX, the DCB on Windows); others report what they can observe.
	fn current_configuration(&self, handle: SerialHandle) -> Result<Vec<String>, AdapterError>;

	fn set_rts(&self, handle: SerialHandle, assert: bool) -> Result<(), AdapterError>;

	fn set_dtr(&self, handle: SerialHandle, assert: bool) -> Result<(), AdapterError>;

	/// Status of the control lines, in the order CTS, DSR, DCD, RI, LOOP, RTS, DTR.
	/// A line the platform can not report is 0.
	fn line_status(&self, handle: SerialHandle) -> Result<[i32; 7], AdapterError>;

	/// Serial line interrupt counts, in the order CTS, DSR, RING, DCD, receive buffer,
	/// transmit buffer, frame error, overrun, parity, break, buffer overrun.
	/// All zero where the platform keeps no counts.
	fn interrupt_counts(&self, handle: SerialHandle) -> Result<[i32; 11], AdapterError>;

	/// Bytes currently queued in the OS receive and transmit buffers.
	fn buffered_byte_counts(&self, handle: SerialHandle) -> Result<(i32, i32), AdapterError>;

	/// Discard queued receive and/or transmit bytes.
	fn clear_buffers(&self, handle: SerialHandle, rx: bool, tx: bool) -> Result<(), AdapterError>;

	/// Assert BREAK on the transmit line for the given duration.
	fn send_break(&self, handle: SerialHandle, duration_ms: u32) -> Result<(), AdapterError>;

	/// Minimum number of bytes a data delivery carries (POSIX VMIN semantics).
	fn set_min_data_length(&self, handle: SerialHandle, count: usize) -> Result<(), AdapterError>;

	/// Begin pushing received bytes for `handle` into `sink`.
	///
	/// Delivery must be active when this returns and continue until
	/// [`SerialAdapter::stop_data_delivery()`].
	fn start_data_delivery(&self, handle: SerialHandle, sink: DeliverySink) -> Result<(), AdapterError>;

	/// Stop pushing received bytes. Joins the adapter's pump before returning.
	fn stop_data_delivery(&self, handle: SerialHandle) -> Result<(), AdapterError>;

	/// Begin pushing line events for `handle` into `sink`.
	///
	/// The event value is the bitset of lines whose state changed, over the
	/// [`mask`][crate::settings::mask] constants.
	fn start_event_delivery(&self, handle: SerialHandle, sink: DeliverySink) -> Result<(), AdapterError>;

	/// Stop pushing line events. Joins the adapter's pump before returning.
	fn stop_event_delivery(&self, handle: SerialHandle) -> Result<(), AdapterError>;

	/// Watch the named port for hotplug and report to `listener`.
	fn start_port_monitor(
		&self,
		handle: SerialHandle,
		name: &str,
		listener: Arc<dyn PortMonitorListener>,
	) -> Result<(), AdapterError>;

	/// Stop the hotplug watcher. Joins the watcher thread before returning.
	fn stop_port_monitor(&self, handle: SerialHandle) -> Result<(), AdapterError>;
}
