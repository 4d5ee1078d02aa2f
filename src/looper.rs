//! Background workers that carry adapter notifications to listener callbacks.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::listener::{DataListener, EventListener};
use crate::settings::mask;
use crate::SerialHandle;

pub(crate) enum Notification {
	Data(Vec<u8>),
	Event(u32),
	Pause,
	Resume,
	Shutdown,
}

/// Where a [`SerialAdapter`][crate::SerialAdapter] pushes received bytes and line events.
///
/// Handed to the adapter when delivery starts. Cheap to clone; a sink whose looper has
/// gone away swallows notifications instead of erroring, so adapter pumps do not need
/// to coordinate with tear-down.
#[derive(Clone)]
pub struct DeliverySink {
	tx: Sender<Notification>,
}

impl DeliverySink {
	/// Deliver a chunk of received bytes.
	pub fn data(&self, bytes: Vec<u8>) {
		let _ = self.tx.send(Notification::Data(bytes));
	}

	/// Deliver a line event bitset.
	pub fn event(&self, event: u32) {
		let _ = self.tx.send(Notification::Event(event));
	}
}

#[derive(Clone)]
enum Target {
	Data(Arc<dyn DataListener>),
	Event(Arc<dyn EventListener>),
}

/// One background worker bound to one listener.
///
/// Notifications travel through a FIFO channel, so per-handle delivery order equals
/// the order the adapter produced them. Pause and resume travel through the same
/// channel: notifications queued behind a pause marker are dropped until the matching
/// resume marker, so nothing delivered while paused can fire on resume.
pub(crate) struct Looper {
	tx: Sender<Notification>,
	mask: Arc<AtomicU32>,
	alive: Arc<AtomicBool>,
	worker: Option<JoinHandle<()>>,
	target: Target,
}

impl Looper {
	pub fn spawn_data(handle: SerialHandle, listener: Arc<dyn DataListener>) -> Looper {
		Self::spawn(handle, Target::Data(listener), "data")
	}

	pub fn spawn_event(handle: SerialHandle, listener: Arc<dyn EventListener>) -> Looper {
		Self::spawn(handle, Target::Event(listener), "event")
	}

	fn spawn(handle: SerialHandle, target: Target, kind: &str) -> Looper {
		let (tx, rx) = channel();
		let mask = Arc::new(AtomicU32::new(mask::DEFAULT));
		let alive = Arc::new(AtomicBool::new(true));
		let worker_target = target.clone();
		let worker_mask = mask.clone();
		let worker_alive = alive.clone();
		let worker = std::thread::Builder::new()
			.name(format!("sercom-{}-{}", kind, handle))
			.spawn(move || run(rx, worker_target, worker_mask, worker_alive))
			.expect("failed to spawn looper thread");
		Looper {
			tx,
			mask,
			alive,
			worker: Some(worker),
			target,
		}
	}

	pub fn sink(&self) -> DeliverySink {
		DeliverySink { tx: self.tx.clone() }
	}

	pub fn pause(&self) {
		let _ = self.tx.send(Notification::Pause);
	}

	pub fn resume(&self) {
		let _ = self.tx.send(Notification::Resume);
	}

	pub fn set_mask(&self, mask: u32) {
		self.mask.store(mask, Ordering::Release);
	}

	pub fn mask(&self) -> u32 {
		self.mask.load(Ordering::Acquire)
	}

	pub fn serves_data_listener(&self, listener: &Arc<dyn DataListener>) -> bool {
		match &self.target {
			Target::Data(own) => Arc::ptr_eq(own, listener),
			Target::Event(_) => false,
		}
	}

	pub fn serves_event_listener(&self, listener: &Arc<dyn EventListener>) -> bool {
		match &self.target {
			Target::Event(own) => Arc::ptr_eq(own, listener),
			Target::Data(_) => false,
		}
	}

	/// Flag the worker as dead without waiting for it.
	///
	/// Tear-down runs this first so the worker stops invoking the listener even if the
	/// adapter takes time to stop its pump.
	pub fn mark_dead(&self) {
		self.alive.store(false, Ordering::Release);
	}

	/// Terminate the worker and wait for it to exit.
	pub fn shutdown(&mut self) {
		self.alive.store(false, Ordering::Release);
		let _ = self.tx.send(Notification::Shutdown);
		if let Some(worker) = self.worker.take() {
			if worker.join().is_err() {
				error!("looper worker panicked before shutdown");
			}
		}
	}
}

impl Drop for Looper {
	fn drop(&mut self) {
		if self.worker.is_some() {
			self.shutdown();
		}
	}
}

fn run(rx: Receiver<Notification>, target: Target, mask: Arc<AtomicU32>, alive: Arc<AtomicBool>) {
	let mut paused = false;
	while let Ok(notification) = rx.recv() {
		if !alive.load(Ordering::Acquire) {
			break;
		}
		match notification {
			Notification::Shutdown => break,
			Notification::Pause => paused = true,
			Notification::Resume => paused = false,
			Notification::Data(bytes) => {
				if paused {
					continue;
				}
				if let Target::Data(listener) = &target {
					trace!("delivering {} bytes to data listener", bytes.len());
					if catch_unwind(AssertUnwindSafe(|| listener.on_data(&bytes))).is_err() {
						error!("data listener panicked, continuing delivery");
					}
				}
			},
			Notification::Event(event) => {
				if paused {
					continue;
				}
				if let Target::Event(listener) = &target {
					let filtered = event & mask.load(Ordering::Acquire);
					if filtered == 0 {
						continue;
					}
					trace!("delivering line event {:#04x}", filtered);
					if catch_unwind(AssertUnwindSafe(|| listener.on_event(filtered))).is_err() {
						error!("event listener panicked, continuing delivery");
					}
				}
			},
		}
	}
}
