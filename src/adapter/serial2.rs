//! [`SerialAdapter`] implementation backed by the `serial2` crate.
//!
//! Reads and writes go straight to the OS port. Asynchronous delivery is pumped by
//! per-port background threads: a reader pump for data, a modem-line poller for line
//! events and a device list poller for hotplug. serial2 exposes no BREAK, interrupt
//! count or queued-byte-count access, so those contract operations report an
//! unsupported status (and all-zero counts where the contract allows it).

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::adapter::{AdapterError, ReadOutcome, SerialAdapter};
use crate::listener::{PortMonitorEvent, PortMonitorListener};
use crate::looper::DeliverySink;
use crate::settings::mask;
use crate::SerialHandle;

// Pump threads block in reads or sleeps no longer than this, so a stop flag is
// honored promptly.
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const MONITOR_INTERVAL: Duration = Duration::from_millis(500);

/// Adapter driving real ports through [`serial2::SerialPort`].
pub struct Serial2Adapter {
	state: Mutex<AdapterState>,
}

struct AdapterState {
	next_handle: SerialHandle,
	ports: HashMap<SerialHandle, PortEntry>,
}

struct PortEntry {
	name: String,
	port: Arc<serial2::SerialPort>,
	exclusive: bool,
	min_data_length: Arc<AtomicUsize>,
	data_pump: Option<Pump>,
	event_pump: Option<Pump>,
	monitor: Option<Pump>,
}

struct Pump {
	stop: Arc<AtomicBool>,
	worker: JoinHandle<()>,
}

impl Pump {
	fn spawn(name: String, work: impl FnOnce(Arc<AtomicBool>) + Send + 'static) -> Pump {
		let stop = Arc::new(AtomicBool::new(false));
		let worker_stop = stop.clone();
		let worker = std::thread::Builder::new()
			.name(name)
			.spawn(move || work(worker_stop))
			.expect("failed to spawn adapter pump thread");
		Pump { stop, worker }
	}

	fn stop_and_join(self) {
		self.stop.store(true, Ordering::Release);
		let _ = self.worker.join();
	}
}

impl Serial2Adapter {
	pub fn new() -> Serial2Adapter {
		Serial2Adapter {
			state: Mutex::new(AdapterState {
				next_handle: 0,
				ports: HashMap::new(),
			}),
		}
	}

	fn lock(&self) -> MutexGuard<'_, AdapterState> {
		self.state.lock().expect("adapter state mutex poisoned")
	}

	fn port(&self, handle: SerialHandle) -> Result<Arc<serial2::SerialPort>, AdapterError> {
		let state = self.lock();
		state
			.ports
			.get(&handle)
			.map(|entry| entry.port.clone())
			.ok_or_else(|| AdapterError::bad_handle(handle))
	}
}

impl Default for Serial2Adapter {
	fn default() -> Self {
		Self::new()
	}
}

impl SerialAdapter for Serial2Adapter {
	fn list_ports(&self) -> Vec<String> {
		match serial2::SerialPort::available_ports() {
			Ok(ports) => ports
				.into_iter()
				.map(|path| path.to_string_lossy().into_owned())
				.collect(),
			Err(error) => {
				debug!("failed to enumerate serial ports: {}", error);
				Vec::new()
			},
		}
	}

	fn open(
		&self,
		name: &str,
		_enable_read: bool,
		_enable_write: bool,
		exclusive: bool,
	) -> Result<SerialHandle, AdapterError> {
		let mut state = self.lock();
		let clash = state
			.ports
			.values()
			.any(|entry| entry.name == name && (entry.exclusive || exclusive));
		if clash {
			return Err(AdapterError::with_detail(-16, format!("port {} is already in use", name)));
		}

		let mut port = serial2::SerialPort::open(name, serial2::KeepSettings)?;
		port.set_read_timeout(POLL_INTERVAL)?;

		let handle = state.next_handle;
		state.next_handle += 1;
		state.ports.insert(
			handle,
			PortEntry {
				name: name.to_string(),
				port: Arc::new(port),
				exclusive,
				min_data_length: Arc::new(AtomicUsize::new(1)),
				data_pump: None,
				event_pump: None,
				monitor: None,
			},
		);
		Ok(handle)
	}

	fn close(&self, handle: SerialHandle) -> Result<(), AdapterError> {
		let entry = {
			let mut state = self.lock();
			state.ports.remove(&handle).ok_or_else(|| AdapterError::bad_handle(handle))?
		};
		// Stop the pumps outside the state lock; they only hold the port.
		if let Some(pump) = entry.data_pump {
			pump.stop_and_join();
		}
		if let Some(pump) = entry.event_pump {
			pump.stop_and_join();
		}
		if let Some(pump) = entry.monitor {
			pump.stop_and_join();
		}
		drop(entry.port);
		Ok(())
	}

	fn read_bytes(&self, handle: SerialHandle, count: usize) -> Result<ReadOutcome, AdapterError> {
		if count == 0 {
			return Ok(ReadOutcome::NoData);
		}
		let port = self.port(handle)?;
		let mut buffer = vec![0; count];
		match port.read(&mut buffer) {
			Ok(0) => Ok(ReadOutcome::Eof),
			Ok(read) => {
				buffer.truncate(read);
				Ok(ReadOutcome::Data(buffer))
			},
			Err(error) if is_no_data(&error) => Ok(ReadOutcome::NoData),
			Err(error) => Err(error.into()),
		}
	}

	fn write_bytes(&self, handle: SerialHandle, buffer: &[u8], delay_ms: u32) -> Result<(), AdapterError> {
		let port = self.port(handle)?;
		if delay_ms == 0 {
			port.write_all(buffer)?;
			return Ok(());
		}
		let delay = Duration::from_millis(delay_ms as u64);
		for (index, &byte) in buffer.iter().enumerate() {
			if index > 0 {
				std::thread::sleep(delay);
			}
			port.write_all(&[byte])?;
		}
		Ok(())
	}

	fn configure_data(
		&self,
		handle: SerialHandle,
		data_bits: u8,
		stop_bits: u8,
		parity: u8,
		baud: u32,
		custom_baud: u32,
	) -> Result<(), AdapterError> {
		let port = self.port(handle)?;

		let char_size = match data_bits {
			5 => serial2::CharSize::Bits5,
			6 => serial2::CharSize::Bits6,
			7 => serial2::CharSize::Bits7,
			8 => serial2::CharSize::Bits8,
			other => return Err(AdapterError::with_detail(-22, format!("invalid data bits value {}", other))),
		};
		let stop_bits = match stop_bits {
			1 => serial2::StopBits::One,
			2 => serial2::StopBits::Two,
			4 => return Err(AdapterError::unsupported("1.5 stop bits")),
			other => return Err(AdapterError::with_detail(-22, format!("invalid stop bits value {}", other))),
		};
		let parity = match parity {
			1 => serial2::Parity::None,
			2 => serial2::Parity::Odd,
			3 => serial2::Parity::Even,
			4 => return Err(AdapterError::unsupported("mark parity")),
			5 => return Err(AdapterError::unsupported("space parity")),
			other => return Err(AdapterError::with_detail(-22, format!("invalid parity value {}", other))),
		};
		let rate = if baud == 251 { custom_baud } else { baud };

		let mut settings = port.get_configuration()?;
		settings.set_baud_rate(rate)?;
		settings.set_char_size(char_size);
		settings.set_stop_bits(stop_bits);
		settings.set_parity(parity);
		port.set_configuration(&settings)?;
		Ok(())
	}

	fn configure_control(
		&self,
		handle: SerialHandle,
		flow: u8,
		_xon: u8,
		_xoff: u8,
		_parity_frame_check: bool,
		_overflow_check: bool,
	) -> Result<(), AdapterError> {
		let port = self.port(handle)?;
		let flow = match flow {
			1 => serial2::FlowControl::None,
			2 => serial2::FlowControl::RtsCts,
			// serial2 always uses the standard XON/XOFF characters; custom control
			// characters and error check toggles have no portable surface.
			3 => serial2::FlowControl::XonXoff,
			other => return Err(AdapterError::with_detail(-22, format!("invalid flow control value {}", other))),
		};
		let mut settings = port.get_configuration()?;
		settings.set_flow_control(flow);
		port.set_configuration(&settings)?;
		Ok(())
	}

	fn current_configuration(&self, handle: SerialHandle) -> Result<Vec<String>, AdapterError> {
		let port = self.port(handle)?;
		let settings = port.get_configuration()?;
		let mut fields = Vec::with_capacity(5);
		fields.push(format!("baud_rate {}", settings.get_baud_rate()?));
		fields.push(match settings.get_char_size() {
			Ok(value) => format!("char_size {:?}", value),
			Err(_) => String::from("char_size unknown"),
		});
		fields.push(match settings.get_stop_bits() {
			Ok(value) => format!("stop_bits {:?}", value),
			Err(_) => String::from("stop_bits unknown"),
		});
		fields.push(match settings.get_parity() {
			Ok(value) => format!("parity {:?}", value),
			Err(_) => String::from("parity unknown"),
		});
		fields.push(match settings.get_flow_control() {
			Ok(value) => format!("flow_control {:?}", value),
			Err(_) => String::from("flow_control unknown"),
		});
		Ok(fields)
	}

	fn set_rts(&self, handle: SerialHandle, assert: bool) -> Result<(), AdapterError> {
		Ok(self.port(handle)?.set_rts(assert)?)
	}

	fn set_dtr(&self, handle: SerialHandle, assert: bool) -> Result<(), AdapterError> {
		Ok(self.port(handle)?.set_dtr(assert)?)
	}

	fn line_status(&self, handle: SerialHandle) -> Result<[i32; 7], AdapterError> {
		let port = self.port(handle)?;
		// LOOP, RTS and DTR are not readable through serial2.
		Ok([
			port.read_cts()? as i32,
			port.read_dsr()? as i32,
			port.read_cd()? as i32,
			port.read_ri()? as i32,
			0,
			0,
			0,
		])
	}

	fn interrupt_counts(&self, handle: SerialHandle) -> Result<[i32; 11], AdapterError> {
		self.port(handle)?;
		Ok([0; 11])
	}

	fn buffered_byte_counts(&self, handle: SerialHandle) -> Result<(i32, i32), AdapterError> {
		self.port(handle)?;
		Err(AdapterError::unsupported("queued byte counts"))
	}

	fn clear_buffers(&self, handle: SerialHandle, rx: bool, tx: bool) -> Result<(), AdapterError> {
		let port = self.port(handle)?;
		match (rx, tx) {
			(true, true) => port.discard_buffers()?,
			(true, false) => port.discard_input_buffer()?,
			(false, true) => port.discard_output_buffer()?,
			(false, false) => {},
		}
		Ok(())
	}

	fn send_break(&self, handle: SerialHandle, _duration_ms: u32) -> Result<(), AdapterError> {
		self.port(handle)?;
		Err(AdapterError::unsupported("BREAK"))
	}

	fn set_min_data_length(&self, handle: SerialHandle, count: usize) -> Result<(), AdapterError> {
		let state = self.lock();
		let entry = state.ports.get(&handle).ok_or_else(|| AdapterError::bad_handle(handle))?;
		entry.min_data_length.store(count.max(1), Ordering::Release);
		Ok(())
	}

	fn start_data_delivery(&self, handle: SerialHandle, sink: DeliverySink) -> Result<(), AdapterError> {
		let mut state = self.lock();
		let entry = state.ports.get_mut(&handle).ok_or_else(|| AdapterError::bad_handle(handle))?;
		if entry.data_pump.is_some() {
			return Err(AdapterError::with_detail(-16, "data delivery is already active"));
		}
		let port = entry.port.clone();
		let min_data_length = entry.min_data_length.clone();
		entry.data_pump = Some(Pump::spawn(format!("sercom-rxpump-{}", handle), move |stop| {
			run_data_pump(port, sink, min_data_length, stop)
		}));
		Ok(())
	}

	fn stop_data_delivery(&self, handle: SerialHandle) -> Result<(), AdapterError> {
		let pump = {
			let mut state = self.lock();
			let entry = state.ports.get_mut(&handle).ok_or_else(|| AdapterError::bad_handle(handle))?;
			entry.data_pump.take()
		};
		if let Some(pump) = pump {
			pump.stop_and_join();
		}
		Ok(())
	}

	fn start_event_delivery(&self, handle: SerialHandle, sink: DeliverySink) -> Result<(), AdapterError> {
		let mut state = self.lock();
		let entry = state.ports.get_mut(&handle).ok_or_else(|| AdapterError::bad_handle(handle))?;
		if entry.event_pump.is_some() {
			return Err(AdapterError::with_detail(-16, "event delivery is already active"));
		}
		let port = entry.port.clone();
		entry.event_pump = Some(Pump::spawn(format!("sercom-linepump-{}", handle), move |stop| {
			run_event_pump(port, sink, stop)
		}));
		Ok(())
	}

	fn stop_event_delivery(&self, handle: SerialHandle) -> Result<(), AdapterError> {
		let pump = {
			let mut state = self.lock();
			let entry = state.ports.get_mut(&handle).ok_or_else(|| AdapterError::bad_handle(handle))?;
			entry.event_pump.take()
		};
		if let Some(pump) = pump {
			pump.stop_and_join();
		}
		Ok(())
	}

	fn start_port_monitor(
		&self,
		handle: SerialHandle,
		name: &str,
		listener: Arc<dyn PortMonitorListener>,
	) -> Result<(), AdapterError> {
		let mut state = self.lock();
		let entry = state.ports.get_mut(&handle).ok_or_else(|| AdapterError::bad_handle(handle))?;
		if entry.monitor.is_some() {
			return Err(AdapterError::with_detail(-16, "port monitor is already active"));
		}
		let watched = PathBuf::from(name);
		entry.monitor = Some(Pump::spawn(format!("sercom-watch-{}", handle), move |stop| {
			run_port_monitor(watched, listener, stop)
		}));
		Ok(())
	}

	fn stop_port_monitor(&self, handle: SerialHandle) -> Result<(), AdapterError> {
		let pump = {
			let mut state = self.lock();
			let entry = state.ports.get_mut(&handle).ok_or_else(|| AdapterError::bad_handle(handle))?;
			entry.monitor.take()
		};
		if let Some(pump) = pump {
			pump.stop_and_join();
		}
		Ok(())
	}
}

fn is_no_data(error: &std::io::Error) -> bool {
	matches!(error.kind(), std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock)
}

fn run_data_pump(
	port: Arc<serial2::SerialPort>,
	sink: DeliverySink,
	min_data_length: Arc<AtomicUsize>,
	stop: Arc<AtomicBool>,
) {
	let mut pending = Vec::new();
	let mut chunk = [0u8; 1024];
	while !stop.load(Ordering::Acquire) {
		match port.read(&mut chunk) {
			Ok(0) => {
				debug!("serial endpoint reached end of stream, data pump exiting");
				break;
			},
			Ok(read) => {
				pending.extend_from_slice(&chunk[..read]);
				if pending.len() >= min_data_length.load(Ordering::Acquire) {
					sink.data(std::mem::take(&mut pending));
				}
			},
			Err(error) if is_no_data(&error) => {},
			Err(error) => {
				error!("data pump read failed: {}", error);
				break;
			},
		}
	}
}

fn run_event_pump(port: Arc<serial2::SerialPort>, sink: DeliverySink, stop: Arc<AtomicBool>) {
	let mut last = read_lines(&port);
	while !stop.load(Ordering::Acquire) {
		std::thread::sleep(POLL_INTERVAL);
		let current = read_lines(&port);
		let changed = current ^ last;
		if changed != 0 {
			sink.event(changed);
			last = current;
		}
	}
}

fn read_lines(port: &serial2::SerialPort) -> u32 {
	let mut lines = 0;
	if port.read_cts().unwrap_or(false) {
		lines |= mask::CTS;
	}
	if port.read_dsr().unwrap_or(false) {
		lines |= mask::DSR;
	}
	if port.read_cd().unwrap_or(false) {
		lines |= mask::DCD;
	}
	if port.read_ri().unwrap_or(false) {
		lines |= mask::RI;
	}
	lines
}

fn run_port_monitor(watched: PathBuf, listener: Arc<dyn PortMonitorListener>, stop: Arc<AtomicBool>) {
	let present = |paths: &[PathBuf]| paths.iter().any(|path| *path == watched);
	let mut last = serial2::SerialPort::available_ports()
		.map(|paths| present(&paths))
		.unwrap_or(true);
	while !stop.load(Ordering::Acquire) {
		std::thread::sleep(MONITOR_INTERVAL);
		let Ok(paths) = serial2::SerialPort::available_ports() else {
			continue;
		};
		let now = present(&paths);
		if now != last {
			let event = if now { PortMonitorEvent::Added } else { PortMonitorEvent::Removed };
			debug!("port {} {:?}", watched.display(), event);
			if catch_unwind(AssertUnwindSafe(|| listener.on_port_event(event))).is_err() {
				error!("port monitor listener panicked, continuing watch");
			}
			last = now;
		}
	}
}
