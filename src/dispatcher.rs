//! Creates and destroys the per-handle delivery workers.

use std::sync::Arc;

use crate::adapter::SerialAdapter;
use crate::error::Error;
use crate::listener::{DataListener, EventListener};
use crate::looper::Looper;
use crate::registry::PortRecord;

/// Owner of all loopers.
///
/// Attach spawns the worker, switches adapter delivery on and stores the looper in the
/// record; registration is complete only once delivery is active. Detach reverses that
/// in order: flag the worker dead, stop adapter delivery, join the worker. Both
/// directions finish before they return, so no worker outlives its registration.
pub(crate) struct Dispatcher {
	adapter: Arc<dyn SerialAdapter>,
}

impl Dispatcher {
	pub fn new(adapter: Arc<dyn SerialAdapter>) -> Dispatcher {
		Dispatcher { adapter }
	}

	pub fn attach_data_looper(&self, record: &mut PortRecord, listener: Arc<dyn DataListener>) -> Result<(), Error> {
		let mut looper = Looper::spawn_data(record.handle, listener);
		if let Err(error) = self.adapter.start_data_delivery(record.handle, looper.sink()) {
			looper.shutdown();
			return Err(error.into());
		}
		debug!("data delivery started for handle {}", record.handle);
		record.data_looper = Some(looper);
		Ok(())
	}

	pub fn detach_data_looper(&self, record: &mut PortRecord) {
		if let Some(mut looper) = record.data_looper.take() {
			looper.mark_dead();
			if let Err(error) = self.adapter.stop_data_delivery(record.handle) {
				debug!("adapter failed to stop data delivery for handle {}: {}", record.handle, error);
			}
			looper.shutdown();
			debug!("data delivery stopped for handle {}", record.handle);
		}
	}

	pub fn attach_event_looper(&self, record: &mut PortRecord, listener: Arc<dyn EventListener>) -> Result<(), Error> {
		let mut looper = Looper::spawn_event(record.handle, listener);
		if let Err(error) = self.adapter.start_event_delivery(record.handle, looper.sink()) {
			looper.shutdown();
			return Err(error.into());
		}
		debug!("event delivery started for handle {}", record.handle);
		record.event_looper = Some(looper);
		Ok(())
	}

	pub fn detach_event_looper(&self, record: &mut PortRecord) {
		if let Some(mut looper) = record.event_looper.take() {
			looper.mark_dead();
			if let Err(error) = self.adapter.stop_event_delivery(record.handle) {
				debug!("adapter failed to stop event delivery for handle {}: {}", record.handle, error);
			}
			looper.shutdown();
			debug!("event delivery stopped for handle {}", record.handle);
		}
	}
}
