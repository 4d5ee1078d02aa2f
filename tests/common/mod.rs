#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use sercom::{
	AdapterError, DataListener, DeliverySink, EventListener, PortMonitorEvent, PortMonitorListener, ReadOutcome,
	SerialAdapter, SerialHandle,
};

/// In-memory adapter with scriptable behaviour.
///
/// Tests act as the far side of the wire: [`MockAdapter::remote_write`] makes bytes
/// readable through the adapter, [`MockAdapter::take_tx`] collects what the
/// application wrote, and [`MockAdapter::deliver_data`] / [`MockAdapter::deliver_event`]
/// push notifications into whatever delivery sink the library registered.
pub struct MockAdapter {
	state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
	next_handle: SerialHandle,
	available: Vec<String>,
	open_calls: usize,
	ports: HashMap<SerialHandle, MockPort>,
}

#[derive(Default)]
struct MockPort {
	name: String,
	exclusive: bool,
	rx: VecDeque<u8>,
	tx: Vec<u8>,
	read_script: VecDeque<Result<ReadOutcome, i32>>,
	close_error: Option<i32>,
	min_data_length: usize,
	data_sink: Option<DeliverySink>,
	event_sink: Option<DeliverySink>,
	monitor: Option<Arc<dyn PortMonitorListener>>,
	break_calls: Vec<u32>,
	clear_calls: Vec<(bool, bool)>,
}

impl MockAdapter {
	pub fn new() -> MockAdapter {
		MockAdapter {
			state: Mutex::new(MockState::default()),
		}
	}

	pub fn with_ports(names: &[&str]) -> MockAdapter {
		let adapter = Self::new();
		adapter.lock().available = names.iter().map(|name| name.to_string()).collect();
		adapter
	}

	fn lock(&self) -> MutexGuard<'_, MockState> {
		self.state.lock().unwrap()
	}

	fn with_port<R>(&self, handle: SerialHandle, f: impl FnOnce(&mut MockPort) -> R) -> R {
		let mut state = self.lock();
		let port = state.ports.get_mut(&handle).expect("mock port does not exist");
		f(port)
	}

	/// How many times `open` reached the adapter.
	pub fn open_calls(&self) -> usize {
		self.lock().open_calls
	}

	/// Make bytes available for the application to read.
	pub fn remote_write(&self, handle: SerialHandle, bytes: &[u8]) {
		self.with_port(handle, |port| port.rx.extend(bytes.iter().copied()));
	}

	/// Take everything the application wrote so far.
	pub fn take_tx(&self, handle: SerialHandle) -> Vec<u8> {
		self.with_port(handle, |port| std::mem::take(&mut port.tx))
	}

	/// Script the outcome of upcoming reads, ahead of the shared byte buffer.
	pub fn queue_read(&self, handle: SerialHandle, outcome: ReadOutcome) {
		self.with_port(handle, |port| port.read_script.push_back(Ok(outcome)));
	}

	/// Script an error for an upcoming read.
	pub fn queue_read_error(&self, handle: SerialHandle, code: i32) {
		self.with_port(handle, |port| port.read_script.push_back(Err(code)));
	}

	/// Make `close` fail with the given status until cleared.
	pub fn fail_close(&self, handle: SerialHandle, code: Option<i32>) {
		self.with_port(handle, |port| port.close_error = code);
	}

	/// Push received bytes through the registered data delivery sink.
	pub fn deliver_data(&self, handle: SerialHandle, bytes: &[u8]) {
		let sink = self.with_port(handle, |port| port.data_sink.clone());
		sink.expect("data delivery is not active").data(bytes.to_vec());
	}

	/// Push a line event through the registered event delivery sink.
	pub fn deliver_event(&self, handle: SerialHandle, event: u32) {
		let sink = self.with_port(handle, |port| port.event_sink.clone());
		sink.expect("event delivery is not active").event(event);
	}

	pub fn data_sink(&self, handle: SerialHandle) -> Option<DeliverySink> {
		self.with_port(handle, |port| port.data_sink.clone())
	}

	pub fn has_data_sink(&self, handle: SerialHandle) -> bool {
		self.with_port(handle, |port| port.data_sink.is_some())
	}

	pub fn has_event_sink(&self, handle: SerialHandle) -> bool {
		self.with_port(handle, |port| port.event_sink.is_some())
	}

	pub fn has_monitor(&self, handle: SerialHandle) -> bool {
		self.with_port(handle, |port| port.monitor.is_some())
	}

	/// Fire a hotplug event at the registered monitor listener.
	pub fn trigger_port_event(&self, handle: SerialHandle, event: PortMonitorEvent) {
		let listener = self.with_port(handle, |port| port.monitor.clone());
		listener.expect("port monitor is not active").on_port_event(event);
	}

	pub fn break_calls(&self, handle: SerialHandle) -> Vec<u32> {
		self.with_port(handle, |port| port.break_calls.clone())
	}

	pub fn clear_calls(&self, handle: SerialHandle) -> Vec<(bool, bool)> {
		self.with_port(handle, |port| port.clear_calls.clone())
	}

	pub fn min_data_length(&self, handle: SerialHandle) -> usize {
		self.with_port(handle, |port| port.min_data_length)
	}
}

impl SerialAdapter for MockAdapter {
	fn list_ports(&self) -> Vec<String> {
		self.lock().available.clone()
	}

	fn open(
		&self,
		name: &str,
		_enable_read: bool,
		_enable_write: bool,
		exclusive: bool,
	) -> Result<SerialHandle, AdapterError> {
		let mut state = self.lock();
		state.open_calls += 1;
		let clash = state
			.ports
			.values()
			.any(|port| port.name == name && (port.exclusive || exclusive));
		if clash {
			return Err(AdapterError::with_detail(-16, format!("port {} is already in use", name)));
		}
		let handle = state.next_handle;
		state.next_handle += 1;
		state.ports.insert(
			handle,
			MockPort {
				name: name.to_string(),
				exclusive,
				min_data_length: 1,
				..MockPort::default()
			},
		);
		Ok(handle)
	}

	fn close(&self, handle: SerialHandle) -> Result<(), AdapterError> {
		let mut state = self.lock();
		let port = state.ports.get(&handle).ok_or_else(|| AdapterError::bad_handle(handle))?;
		if let Some(code) = port.close_error {
			return Err(AdapterError::new(code));
		}
		state.ports.remove(&handle);
		Ok(())
	}

	fn read_bytes(&self, handle: SerialHandle, count: usize) -> Result<ReadOutcome, AdapterError> {
		let mut state = self.lock();
		let port = state.ports.get_mut(&handle).ok_or_else(|| AdapterError::bad_handle(handle))?;
		if let Some(scripted) = port.read_script.pop_front() {
			return scripted.map_err(AdapterError::new);
		}
		if port.rx.is_empty() {
			return Ok(ReadOutcome::NoData);
		}
		let take = count.min(port.rx.len());
		Ok(ReadOutcome::Data(port.rx.drain(..take).collect()))
	}

	fn write_bytes(&self, handle: SerialHandle, buffer: &[u8], _delay_ms: u32) -> Result<(), AdapterError> {
		let mut state = self.lock();
		let port = state.ports.get_mut(&handle).ok_or_else(|| AdapterError::bad_handle(handle))?;
		port.tx.extend_from_slice(buffer);
		Ok(())
	}

	fn configure_data(
		&self,
		handle: SerialHandle,
		_data_bits: u8,
		_stop_bits: u8,
		_parity: u8,
		_baud: u32,
		_custom_baud: u32,
	) -> Result<(), AdapterError> {
		self.with_port(handle, |_| ());
		Ok(())
	}

	fn configure_control(
		&self,
		handle: SerialHandle,
		_flow: u8,
		_xon: u8,
		_xoff: u8,
		_parity_frame_check: bool,
		_overflow_check: bool,
	) -> Result<(), AdapterError> {
		self.with_port(handle, |_| ());
		Ok(())
	}

	fn current_configuration(&self, handle: SerialHandle) -> Result<Vec<String>, AdapterError> {
		self.with_port(handle, |_| ());
		Ok(vec![String::from("baud_rate 9600")])
	}

	fn set_rts(&self, handle: SerialHandle, _assert: bool) -> Result<(), AdapterError> {
		self.with_port(handle, |_| ());
		Ok(())
	}

	fn set_dtr(&self, handle: SerialHandle, _assert: bool) -> Result<(), AdapterError> {
		self.with_port(handle, |_| ());
		Ok(())
	}

	fn line_status(&self, handle: SerialHandle) -> Result<[i32; 7], AdapterError> {
		self.with_port(handle, |_| ());
		Ok([0; 7])
	}

	fn interrupt_counts(&self, handle: SerialHandle) -> Result<[i32; 11], AdapterError> {
		self.with_port(handle, |_| ());
		Ok([0; 11])
	}

	fn buffered_byte_counts(&self, handle: SerialHandle) -> Result<(i32, i32), AdapterError> {
		self.with_port(handle, |port| Ok((port.rx.len() as i32, port.tx.len() as i32)))
	}

	fn clear_buffers(&self, handle: SerialHandle, rx: bool, tx: bool) -> Result<(), AdapterError> {
		self.with_port(handle, |port| {
			port.clear_calls.push((rx, tx));
			if rx {
				port.rx.clear();
			}
			if tx {
				port.tx.clear();
			}
		});
		Ok(())
	}

	fn send_break(&self, handle: SerialHandle, duration_ms: u32) -> Result<(), AdapterError> {
		self.with_port(handle, |port| port.break_calls.push(duration_ms));
		Ok(())
	}

	fn set_min_data_length(&self, handle: SerialHandle, count: usize) -> Result<(), AdapterError> {
		self.with_port(handle, |port| port.min_data_length = count);
		Ok(())
	}

	fn start_data_delivery(&self, handle: SerialHandle, sink: DeliverySink) -> Result<(), AdapterError> {
		self.with_port(handle, |port| port.data_sink = Some(sink));
		Ok(())
	}

	fn stop_data_delivery(&self, handle: SerialHandle) -> Result<(), AdapterError> {
		self.with_port(handle, |port| port.data_sink = None);
		Ok(())
	}

	fn start_event_delivery(&self, handle: SerialHandle, sink: DeliverySink) -> Result<(), AdapterError> {
		self.with_port(handle, |port| port.event_sink = Some(sink));
		Ok(())
	}

	fn stop_event_delivery(&self, handle: SerialHandle) -> Result<(), AdapterError> {
		self.with_port(handle, |port| port.event_sink = None);
		Ok(())
	}

	fn start_port_monitor(
		&self,
		handle: SerialHandle,
		_name: &str,
		listener: Arc<dyn PortMonitorListener>,
	) -> Result<(), AdapterError> {
		self.with_port(handle, |port| port.monitor = Some(listener));
		Ok(())
	}

	fn stop_port_monitor(&self, handle: SerialHandle) -> Result<(), AdapterError> {
		self.with_port(handle, |port| port.monitor = None);
		Ok(())
	}
}

/// Data listener that records every chunk it receives.
#[derive(Default)]
pub struct RecordingDataListener {
	chunks: Mutex<Vec<Vec<u8>>>,
}

impl RecordingDataListener {
	pub fn chunks(&self) -> Vec<Vec<u8>> {
		self.chunks.lock().unwrap().clone()
	}

	pub fn chunk_count(&self) -> usize {
		self.chunks.lock().unwrap().len()
	}
}

impl DataListener for RecordingDataListener {
	fn on_data(&self, bytes: &[u8]) {
		self.chunks.lock().unwrap().push(bytes.to_vec());
	}
}

/// Event listener that records every event it receives.
#[derive(Default)]
pub struct RecordingEventListener {
	events: Mutex<Vec<u32>>,
}

impl RecordingEventListener {
	pub fn events(&self) -> Vec<u32> {
		self.events.lock().unwrap().clone()
	}

	pub fn event_count(&self) -> usize {
		self.events.lock().unwrap().len()
	}
}

impl EventListener for RecordingEventListener {
	fn on_event(&self, event: u32) {
		self.events.lock().unwrap().push(event);
	}
}

/// Port monitor listener that records every hotplug event.
#[derive(Default)]
pub struct RecordingMonitorListener {
	events: Mutex<Vec<PortMonitorEvent>>,
}

impl RecordingMonitorListener {
	pub fn events(&self) -> Vec<PortMonitorEvent> {
		self.events.lock().unwrap().clone()
	}
}

impl PortMonitorListener for RecordingMonitorListener {
	fn on_port_event(&self, event: PortMonitorEvent) {
		self.events.lock().unwrap().push(event);
	}
}

/// Poll `condition` until it holds or `timeout` runs out.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
	let deadline = Instant::now() + timeout;
	loop {
		if condition() {
			return true;
		}
		if Instant::now() >= deadline {
			return condition();
		}
		std::thread::sleep(Duration::from_millis(5));
	}
}
