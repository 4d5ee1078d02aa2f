use crate::adapter::AdapterError;
use crate::SerialHandle;

/// An error reported by a [`SerialManager`][crate::SerialManager] operation.
#[derive(Debug)]
pub enum Error {
	/// An input value was outside its legal domain.
	InvalidArgument(&'static str),

	/// The requested combination is not supported on this operating system.
	PlatformUnsupported(&'static str),

	/// The handle does not name an open port.
	UnknownHandle(SerialHandle),

	/// The listener is not registered with any open port.
	UnknownListener,

	/// The port already has a data listener.
	DataListenerAlreadyRegistered,

	/// The port already has an event listener.
	EventListenerAlreadyRegistered,

	/// The port can not be closed while its data listener is registered.
	DataListenerStillActive,

	/// The port can not be closed while its event listener is registered.
	EventListenerStillActive,

	/// The adapter reported an I/O failure.
	Io(IoError),

	/// A file transfer did not make progress within its protocol deadline.
	Timeout(&'static str),

	/// A file transfer was cancelled or cut short by the remote side.
	TransferAborted(&'static str),

	/// A local file could not be read or written during a file transfer.
	File(std::io::Error),
}

/// An I/O failure from the adapter: the native status code and its mapped message.
#[derive(Debug)]
pub struct IoError {
	pub code: i32,
	pub message: String,
}

/// Map a negative adapter status code to a human readable message.
///
/// Adapter codes are negated OS error numbers, so the mapping goes through
/// [`std::io::Error::from_raw_os_error`].
pub(crate) fn map_error_code(code: i32) -> String {
	if code < 0 {
		std::io::Error::from_raw_os_error(-code).to_string()
	} else {
		format!("unexpected adapter status {}", code)
	}
}

impl From<AdapterError> for Error {
	fn from(other: AdapterError) -> Self {
		let message = match other.detail() {
			Some(detail) => detail.to_string(),
			None => map_error_code(other.code()),
		};
		Self::Io(IoError {
			code: other.code(),
			message,
		})
	}
}

impl std::error::Error for Error {}
impl std::error::Error for IoError {}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
			Self::PlatformUnsupported(what) => write!(f, "not supported on this platform: {}", what),
			Self::UnknownHandle(handle) => write!(f, "no open port with handle {}", handle),
			Self::UnknownListener => write!(f, "listener is not registered with any open port"),
			Self::DataListenerAlreadyRegistered => write!(f, "port already has a data listener"),
			Self::EventListenerAlreadyRegistered => write!(f, "port already has an event listener"),
			Self::DataListenerStillActive => write!(f, "unregister the data listener before closing the port"),
			Self::EventListenerStillActive => write!(f, "unregister the event listener before closing the port"),
			Self::Io(e) => write!(f, "{}", e),
			Self::Timeout(what) => write!(f, "timed out {}", what),
			Self::TransferAborted(why) => write!(f, "file transfer aborted: {}", why),
			Self::File(e) => write!(f, "file error: {}", e),
		}
	}
}

impl std::fmt::Display for IoError {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "I/O error {}: {}", self.code, self.message)
	}
}
