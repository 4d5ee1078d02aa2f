//! The process-wide registry of open port handles.

use std::sync::{Mutex, MutexGuard};

use crate::looper::Looper;
use crate::SerialHandle;

/// Everything the library tracks about one open port.
///
/// A looper field is present exactly while the matching listener is registered;
/// the listener itself lives inside the looper.
pub(crate) struct PortRecord {
	pub name: String,
	pub handle: SerialHandle,
	pub data_looper: Option<Looper>,
	pub event_looper: Option<Looper>,
}

impl PortRecord {
	pub fn new(name: &str, handle: SerialHandle) -> PortRecord {
		PortRecord {
			name: name.to_string(),
			handle,
			data_looper: None,
			event_looper: None,
		}
	}
}

/// Synchronized collection of [`PortRecord`]s.
///
/// One mutex serializes every add, remove and scan: lookups feed uniqueness and
/// ownership decisions, so they take the same lock as structural changes. The
/// collection stays a plain vector with linear scans; the registry never holds more
/// than a modest number of handles.
pub(crate) struct PortRegistry {
	records: Mutex<Vec<PortRecord>>,
}

impl PortRegistry {
	pub fn new() -> PortRegistry {
		PortRegistry {
			records: Mutex::new(Vec::new()),
		}
	}

	pub fn lock(&self) -> MutexGuard<'_, Vec<PortRecord>> {
		self.records.lock().expect("port registry mutex poisoned")
	}
}

pub(crate) fn find_by_handle(records: &mut [PortRecord], handle: SerialHandle) -> Option<&mut PortRecord> {
	records.iter_mut().find(|record| record.handle == handle)
}

pub(crate) fn contains_handle(records: &[PortRecord], handle: SerialHandle) -> bool {
	records.iter().any(|record| record.handle == handle)
}

pub(crate) fn contains_name(records: &[PortRecord], name: &str) -> bool {
	records.iter().any(|record| record.name == name)
}
