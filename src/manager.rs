//! The library entry point: open, configure, read, write, listen, close.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::adapter::{ReadOutcome, SerialAdapter};
use crate::dispatcher::Dispatcher;
use crate::endian::{pack_int, pack_int_array};
use crate::error::Error;
use crate::listener::{DataListener, EventListener, PortMonitorListener};
use crate::registry::{contains_handle, contains_name, find_by_handle, PortRecord, PortRegistry};
use crate::settings::{BaudRate, ByteWidth, DataBits, Endian, FileTransferProtocol, FlowControl, OsType, Parity, StopBits};
use crate::{xmodem, SerialHandle};

/// How many bytes a read tries for when the caller does not say.
pub const DEFAULT_READ_BYTE_COUNT: usize = 1024;

/// Manages every open serial port of this process.
///
/// One manager holds the registry of open handles, the delivery workers behind
/// registered listeners and the adapter doing the actual I/O. Operations that change
/// which ports are open or which listeners are registered serialize on the registry;
/// plain reads and writes go straight to the adapter so the hot path stays cheap.
///
/// The manager is meant to be shared: every method takes `&self` and the type is
/// `Send + Sync`.
pub struct SerialManager {
	adapter: Arc<dyn SerialAdapter>,
	registry: PortRegistry,
	dispatcher: Dispatcher,
	os_type: OsType,
	// clear_io_buffers and send_break serialize against each other on this.
	control_lock: Mutex<()>,
}

impl SerialManager {
	/// Create a manager backed by the bundled [`serial2`] adapter.
	#[cfg(feature = "serial2")]
	pub fn new() -> SerialManager {
		Self::with_adapter(Arc::new(crate::adapter::serial2::Serial2Adapter::new()))
	}

	/// Create a manager on a custom adapter, detecting the host operating system.
	pub fn with_adapter(adapter: Arc<dyn SerialAdapter>) -> SerialManager {
		Self::with_adapter_and_os(adapter, OsType::host())
	}

	/// Create a manager on a custom adapter with an explicit operating system value.
	///
	/// The operating system decides platform gated behaviour such as the mandatory
	/// exclusive open on Windows. Pass the value matching what the adapter talks to;
	/// this is also the hook for exercising foreign-platform behaviour in tests.
	pub fn with_adapter_and_os(adapter: Arc<dyn SerialAdapter>, os_type: OsType) -> SerialManager {
		SerialManager {
			dispatcher: Dispatcher::new(adapter.clone()),
			adapter,
			registry: PortRegistry::new(),
			os_type,
			control_lock: Mutex::new(()),
		}
	}

	/// The operating system this manager was created for.
	pub fn os_type(&self) -> OsType {
		self.os_type
	}

	/// Version of this library.
	pub fn library_version(&self) -> &'static str {
		env!("CARGO_PKG_VERSION")
	}

	/// Names of the serial ports currently present in the system.
	///
	/// Empty when there are none or enumeration fails; never an error.
	pub fn list_ports(&self) -> Vec<String> {
		self.adapter.list_ports()
	}

	/// Open a serial port.
	///
	/// At least one of `enable_read` and `enable_write` must be set. With `exclusive`
	/// the caller claims the port for this process; on Windows `exclusive` is
	/// mandatory because COM ports can not be shared.
	///
	/// If this process already has the port open and `exclusive` is requested, the
	/// call returns `Ok(-1)` without touching the adapter; the caller holding the
	/// other handle is the owner. A clash with a different process surfaces as
	/// [`Error::Io`] from the adapter instead.
	pub fn open(&self, name: &str, enable_read: bool, enable_write: bool, exclusive: bool)
		-> Result<SerialHandle, Error> {
		if name.is_empty() {
			return Err(Error::InvalidArgument("port name must not be empty"));
		}
		if !enable_read && !enable_write {
			return Err(Error::InvalidArgument("enable read, write or both"));
		}

		let mut records = self.registry.lock();
		if exclusive && contains_name(&records, name) {
			info!("port {} is already opened by this process", name);
			return Ok(-1);
		}
		if self.os_type == OsType::Windows && !exclusive {
			return Err(Error::PlatformUnsupported("Windows requires exclusive port ownership"));
		}

		let handle = self.adapter.open(name, enable_read, enable_write, exclusive)?;
		records.push(PortRecord::new(name, handle));
		debug!("opened port {} as handle {}", name, handle);
		Ok(handle)
	}

	/// Close a serial port.
	///
	/// Fails while a data or event listener is still registered for the handle; the
	/// delivery workers have to be torn down first. If the adapter refuses the close,
	/// the handle stays registered and usable.
	pub fn close(&self, handle: SerialHandle) -> Result<(), Error> {
		let mut records = self.registry.lock();
		let position = records
			.iter()
			.position(|record| record.handle == handle)
			.ok_or(Error::UnknownHandle(handle))?;

		if records[position].data_looper.is_some() {
			return Err(Error::DataListenerStillActive);
		}
		if records[position].event_looper.is_some() {
			return Err(Error::EventListenerStillActive);
		}

		self.adapter.close(handle)?;
		let record = records.remove(position);
		debug!("closed port {} (handle {})", record.name, handle);
		Ok(())
	}

	/// Write bytes to the port.
	///
	/// Returns `Ok(false)` for an empty buffer, without touching the adapter.
	/// Otherwise the call blocks until the adapter has handed every byte to the OS
	/// transmit queue, then returns `Ok(true)`. `delay_ms` is the pause kept between
	/// consecutive bytes.
	pub fn write_bytes(&self, handle: SerialHandle, buffer: &[u8], delay_ms: u32) -> Result<bool, Error> {
		if buffer.is_empty() {
			return Ok(false);
		}
		self.adapter.write_bytes(handle, buffer, delay_ms)?;
		Ok(true)
	}

	/// Write one byte.
	pub fn write_single_byte(&self, handle: SerialHandle, byte: u8) -> Result<bool, Error> {
		self.write_bytes(handle, &[byte], 0)
	}

	/// Write a string as its UTF-8 bytes.
	pub fn write_string(&self, handle: SerialHandle, data: &str, delay_ms: u32) -> Result<bool, Error> {
		self.write_bytes(handle, data.as_bytes(), delay_ms)
	}

	/// Write one integer in the given byte order and width.
	///
	/// [`ByteWidth::Two`] silently drops the high 16 bits.
	pub fn write_int(
		&self,
		handle: SerialHandle,
		value: i32,
		delay_ms: u32,
		endian: Endian,
		width: ByteWidth,
	) -> Result<bool, Error> {
		self.write_bytes(handle, &pack_int(value, endian, width), delay_ms)
	}

	/// Write an array of integers, packed back to back in array order.
	pub fn write_int_array(
		&self,
		handle: SerialHandle,
		values: &[i32],
		delay_ms: u32,
		endian: Endian,
		width: ByteWidth,
	) -> Result<bool, Error> {
		self.write_bytes(handle, &pack_int_array(values, endian, width), delay_ms)
	}

	/// Read up to `byte_count` bytes from the port.
	///
	/// Three outcomes:
	/// 1. `Ok(Some(bytes))` with data read from the port;
	/// 2. `Ok(Some(empty))` when the port had nothing to read;
	/// 3. `Ok(None)` on end of stream, which on Linux is what unplugging a USB-UART
	///    converter looks like.
	///
	/// Reading is allowed alongside a registered data listener; it is the caller's
	/// business to manage the interleaving that results.
	pub fn read_bytes(&self, handle: SerialHandle, byte_count: usize) -> Result<Option<Vec<u8>>, Error> {
		match self.adapter.read_bytes(handle, byte_count)? {
			ReadOutcome::Data(bytes) => Ok(Some(bytes)),
			ReadOutcome::NoData => Ok(Some(Vec::new())),
			ReadOutcome::Eof => Ok(None),
		}
	}

	/// Read with the default byte count of [`DEFAULT_READ_BYTE_COUNT`].
	pub fn read_bytes_default(&self, handle: SerialHandle) -> Result<Option<Vec<u8>>, Error> {
		self.read_bytes(handle, DEFAULT_READ_BYTE_COUNT)
	}

	/// Read one byte.
	pub fn read_single_byte(&self, handle: SerialHandle) -> Result<Option<Vec<u8>>, Error> {
		self.read_bytes(handle, 1)
	}

	/// Read up to `byte_count` bytes and decode them as UTF-8.
	///
	/// Same outcomes as [`SerialManager::read_bytes()`]; invalid sequences are
	/// replaced rather than failing the read.
	pub fn read_string(&self, handle: SerialHandle, byte_count: usize) -> Result<Option<String>, Error> {
		Ok(self
			.read_bytes(handle, byte_count)?
			.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
	}

	/// Read a string with the default byte count.
	pub fn read_string_default(&self, handle: SerialHandle) -> Result<Option<String>, Error> {
		self.read_string(handle, DEFAULT_READ_BYTE_COUNT)
	}

	/// Configure baud rate and frame format.
	///
	/// `custom_baud` is consulted only when `baud` is [`BaudRate::Custom`]; the
	/// adapter receives the sentinel 251 plus the custom value in that case, and the
	/// plain rate with a zero custom value otherwise.
	pub fn configure_data(
		&self,
		handle: SerialHandle,
		data_bits: DataBits,
		stop_bits: StopBits,
		parity: Parity,
		baud: BaudRate,
		custom_baud: u32,
	) -> Result<(), Error> {
		self.check_handle(handle)?;
		let baud_value = baud.value();
		let custom = if baud == BaudRate::Custom { custom_baud } else { 0 };
		self.adapter
			.configure_data(handle, data_bits.value(), stop_bits.value(), parity.value(), baud_value, custom)?;
		Ok(())
	}

	/// Configure flow control and error behaviour.
	///
	/// `xon` and `xoff` matter only with [`FlowControl::Software`].
	pub fn configure_control(
		&self,
		handle: SerialHandle,
		flow: FlowControl,
		xon: u8,
		xoff: u8,
		parity_frame_check: bool,
		overflow_check: bool,
	) -> Result<(), Error> {
		self.check_handle(handle)?;
		self.adapter
			.configure_control(handle, flow.value(), xon, xoff, parity_frame_check, overflow_check)?;
		Ok(())
	}

	/// The port's current settings as an ordered list of printable fields.
	///
	/// The field set and order are the adapter's: termios field order on POSIX
	/// adapters, the DCB on Windows; the bundled serial2 adapter reports the portable
	/// subset it can observe.
	pub fn current_configuration(&self, handle: SerialHandle) -> Result<Vec<String>, Error> {
		self.check_handle(handle)?;
		Ok(self.adapter.current_configuration(handle)?)
	}

	/// Assert or drop the RTS line.
	pub fn set_rts(&self, handle: SerialHandle, assert: bool) -> Result<(), Error> {
		self.check_handle(handle)?;
		self.adapter.set_rts(handle, assert)?;
		Ok(())
	}

	/// Assert or drop the DTR line.
	pub fn set_dtr(&self, handle: SerialHandle, assert: bool) -> Result<(), Error> {
		self.check_handle(handle)?;
		self.adapter.set_dtr(handle, assert)?;
		Ok(())
	}

	/// Minimum number of bytes one data delivery carries (POSIX VMIN semantics).
	///
	/// Returns `Ok(false)` on Windows, which has no such control.
	pub fn set_min_data_length(&self, handle: SerialHandle, byte_count: usize) -> Result<bool, Error> {
		if self.os_type == OsType::Windows {
			return Ok(false);
		}
		self.check_handle(handle)?;
		self.adapter.set_min_data_length(handle, byte_count)?;
		Ok(true)
	}

	/// Discard bytes queued in the OS receive and/or transmit buffers.
	///
	/// Does nothing when both flags are false. Serialized against concurrent flush
	/// and break requests on this manager.
	pub fn clear_io_buffers(&self, handle: SerialHandle, clear_rx: bool, clear_tx: bool) -> Result<(), Error> {
		let _control = self.control_lock.lock().expect("control mutex poisoned");
		self.check_handle(handle)?;
		if clear_rx || clear_tx {
			self.adapter.clear_buffers(handle, clear_rx, clear_tx)?;
		}
		Ok(())
	}

	/// Hold the transmit line in the BREAK condition for `duration_ms` milliseconds.
	///
	/// Serialized against concurrent flush and break requests on this manager.
	pub fn send_break(&self, handle: SerialHandle, duration_ms: u32) -> Result<(), Error> {
		let _control = self.control_lock.lock().expect("control mutex poisoned");
		self.check_handle(handle)?;
		self.adapter.send_break(handle, duration_ms)?;
		Ok(())
	}

	/// Serial line interrupt counts since the port was opened.
	///
	/// Order: CTS, DSR, RING, DCD, receive buffer, transmit buffer, frame error,
	/// overrun, parity, break, buffer overrun. Platforms without interrupt accounting
	/// report all zeros; in practice only Linux reports real counts.
	pub fn interrupt_counts(&self, handle: SerialHandle) -> Result<[i32; 11], Error> {
		self.check_handle(handle)?;
		Ok(self.adapter.interrupt_counts(handle)?)
	}

	/// Status of the modem control lines.
	///
	/// Order: CTS, DSR, DCD, RI, LOOP, RTS, DTR. A line the platform can not report
	/// is 0 in its slot.
	pub fn line_status(&self, handle: SerialHandle) -> Result<[i32; 7], Error> {
		self.check_handle(handle)?;
		Ok(self.adapter.line_status(handle)?)
	}

	/// Number of bytes queued in the OS receive and transmit buffers, in that order.
	pub fn io_buffer_byte_counts(&self, handle: SerialHandle) -> Result<(i32, i32), Error> {
		self.check_handle(handle)?;
		Ok(self.adapter.buffered_byte_counts(handle)?)
	}

	/// Register a listener for received data.
	///
	/// The listener starts receiving on a background worker before this returns; one
	/// data listener per handle. Reading directly while a listener is registered stays
	/// allowed.
	pub fn register_data_listener(&self, handle: SerialHandle, listener: Arc<dyn DataListener>) -> Result<(), Error> {
		let mut records = self.registry.lock();
		let record = find_by_handle(&mut records, handle).ok_or(Error::UnknownHandle(handle))?;
		if record.data_looper.is_some() {
			return Err(Error::DataListenerAlreadyRegistered);
		}
		self.dispatcher.attach_data_looper(record, listener)
	}

	/// Unregister a data listener and tear down its delivery worker.
	///
	/// Returns only after the worker has exited; no callback is delivered afterwards.
	/// Unregistering a listener that is not registered is a no-op.
	pub fn unregister_data_listener(&self, listener: &Arc<dyn DataListener>) -> Result<(), Error> {
		let mut records = self.registry.lock();
		for record in records.iter_mut() {
			let matches = record
				.data_looper
				.as_ref()
				.is_some_and(|looper| looper.serves_data_listener(listener));
			if matches {
				self.dispatcher.detach_data_looper(record);
				return Ok(());
			}
		}
		Ok(())
	}

	/// Register a listener for line events.
	///
	/// Delivery is filtered through the listener's event mask, which starts as
	/// [`mask::DEFAULT`][crate::settings::mask::DEFAULT]. Line events only fire when
	/// the port reports modem line changes; configure hardware flow control first
	/// where the lines are otherwise unused.
	pub fn register_event_listener(&self, handle: SerialHandle, listener: Arc<dyn EventListener>) -> Result<(), Error> {
		let mut records = self.registry.lock();
		let record = find_by_handle(&mut records, handle).ok_or(Error::UnknownHandle(handle))?;
		if record.event_looper.is_some() {
			return Err(Error::EventListenerAlreadyRegistered);
		}
		self.dispatcher.attach_event_looper(record, listener)
	}

	/// Unregister an event listener and tear down its delivery worker.
	///
	/// Returns only after the worker has exited; no callback is delivered afterwards.
	/// Unregistering a listener that is not registered is a no-op.
	pub fn unregister_event_listener(&self, listener: &Arc<dyn EventListener>) -> Result<(), Error> {
		let mut records = self.registry.lock();
		for record in records.iter_mut() {
			let matches = record
				.event_looper
				.as_ref()
				.is_some_and(|looper| looper.serves_event_listener(listener));
			if matches {
				self.dispatcher.detach_event_looper(record);
				return Ok(());
			}
		}
		Ok(())
	}

	/// Stop delivering events to the listener until [`SerialManager::resume_event_delivery()`].
	///
	/// Events arriving while paused are dropped, not queued; resuming delivers only
	/// what arrives after the resume.
	pub fn pause_event_delivery(&self, listener: &Arc<dyn EventListener>) -> Result<(), Error> {
		self.with_event_looper(listener, |looper| looper.pause())
	}

	/// Resume delivering events to a paused listener.
	pub fn resume_event_delivery(&self, listener: &Arc<dyn EventListener>) -> Result<(), Error> {
		self.with_event_looper(listener, |looper| looper.resume())
	}

	/// Replace the listener's event mask.
	///
	/// An event is delivered when it has at least one bit in common with the mask,
	/// reduced to those bits. The filter runs in the delivery worker; the adapter
	/// keeps producing everything.
	pub fn set_event_mask(&self, listener: &Arc<dyn EventListener>, mask: u32) -> Result<(), Error> {
		self.with_event_looper(listener, |looper| looper.set_mask(mask))
	}

	/// The listener's current event mask.
	pub fn get_event_mask(&self, listener: &Arc<dyn EventListener>) -> Result<u32, Error> {
		self.with_event_looper(listener, |looper| looper.mask())
	}

	/// Watch the port behind `handle` for hotplug.
	///
	/// The listener is called with [`PortMonitorEvent::Added`][crate::PortMonitorEvent::Added]
	/// when the port (re)appears in the system and
	/// [`PortMonitorEvent::Removed`][crate::PortMonitorEvent::Removed] when it vanishes.
	pub fn register_port_monitor(
		&self,
		handle: SerialHandle,
		listener: Arc<dyn PortMonitorListener>,
	) -> Result<(), Error> {
		let name = {
			let mut records = self.registry.lock();
			find_by_handle(&mut records, handle)
				.ok_or(Error::UnknownHandle(handle))?
				.name
				.clone()
		};
		self.adapter.start_port_monitor(handle, &name, listener)?;
		Ok(())
	}

	/// Stop watching the port for hotplug. The watcher thread is gone when this returns.
	pub fn unregister_port_monitor(&self, handle: SerialHandle) -> Result<(), Error> {
		self.check_handle(handle)?;
		self.adapter.stop_port_monitor(handle)?;
		Ok(())
	}

	/// Send a file over the port.
	///
	/// Blocks until the transfer completes or fails. The receiving side must be ready
	/// or become ready within the protocol's handshake window.
	pub fn send_file(&self, handle: SerialHandle, path: &Path, protocol: FileTransferProtocol) -> Result<(), Error> {
		self.check_handle(handle)?;
		match protocol {
			FileTransferProtocol::Xmodem => xmodem::send_file(self, handle, path),
		}
	}

	/// Receive a file from the port, writing it to `path`.
	///
	/// Blocks until the transfer completes or fails.
	pub fn receive_file(&self, handle: SerialHandle, path: &Path, protocol: FileTransferProtocol) -> Result<(), Error> {
		self.check_handle(handle)?;
		match protocol {
			FileTransferProtocol::Xmodem => xmodem::receive_file(self, handle, path),
		}
	}

	fn check_handle(&self, handle: SerialHandle) -> Result<(), Error> {
		let records = self.registry.lock();
		if contains_handle(&records, handle) {
			Ok(())
		} else {
			Err(Error::UnknownHandle(handle))
		}
	}

	fn with_event_looper<R>(
		&self,
		listener: &Arc<dyn EventListener>,
		operation: impl FnOnce(&crate::looper::Looper) -> R,
	) -> Result<R, Error> {
		let records = self.registry.lock();
		for record in records.iter() {
			if let Some(looper) = &record.event_looper {
				if looper.serves_event_listener(listener) {
					return Ok(operation(looper));
				}
			}
		}
		Err(Error::UnknownListener)
	}
}

impl Drop for SerialManager {
	fn drop(&mut self) {
		// Best effort: tear down whatever the application left open so no worker
		// threads outlive the manager.
		let mut records = self.registry.lock();
		for record in records.iter_mut() {
			self.dispatcher.detach_data_looper(record);
			self.dispatcher.detach_event_looper(record);
			if let Err(error) = self.adapter.close(record.handle) {
				debug!("failed to close handle {} on drop: {}", record.handle, error);
			}
		}
		records.clear();
	}
}
