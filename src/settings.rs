//! Port settings and the numeric values they take on the adapter boundary.
//!
//! Every enum in this module carries a fixed numeric value through its `value()`
//! accessor. These values are what a [`SerialAdapter`][crate::SerialAdapter] receives,
//! so they must not change: native layers switch on them.

/// Bit masks for the UART control lines, as used in event masks and line events.
pub mod mask {
	/// Clear To Send.
	pub const CTS: u32 = 0x01;
	/// Data Set Ready.
	pub const DSR: u32 = 0x02;
	/// Data Carrier Detect.
	pub const DCD: u32 = 0x04;
	/// Ring Indicator.
	pub const RI: u32 = 0x08;
	/// Loopback.
	pub const LOOP: u32 = 0x10;
	/// Request To Send.
	pub const RTS: u32 = 0x20;
	/// Data Terminal Ready.
	pub const DTR: u32 = 0x40;

	/// Mask applied to a freshly registered event listener: the four input lines.
	pub const DEFAULT: u32 = CTS | DSR | DCD | RI;
}

/// Pre-defined baud rates.
///
/// [`BaudRate::Custom`] asks the adapter to apply the separate custom baud value
/// given to [`SerialManager::configure_data()`][crate::SerialManager::configure_data].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[rustfmt::skip]
pub enum BaudRate {
	B0, B50, B75, B110, B134, B150, B200, B300, B600, B1200,
	B1800, B2400, B4800, B9600, B14400, B19200, B28800, B38400,
	B56000, B57600, B115200, B128000, B153600, B230400, B256000,
	B460800, B500000, B576000, B921600, B1000000, B1152000,
	B1500000, B2000000, B2500000, B3000000, B3500000, B4000000,
	Custom,
}

impl BaudRate {
	/// The numeric value crossing the adapter boundary.
	///
	/// For the pre-defined rates this is the rate itself; for [`BaudRate::Custom`]
	/// it is the sentinel `251`.
	#[rustfmt::skip]
	pub fn value(self) -> u32 {
		match self {
			Self::B0 => 0, Self::B50 => 50, Self::B75 => 75, Self::B110 => 110,
			Self::B134 => 134, Self::B150 => 150, Self::B200 => 200, Self::B300 => 300,
			Self::B600 => 600, Self::B1200 => 1200, Self::B1800 => 1800, Self::B2400 => 2400,
			Self::B4800 => 4800, Self::B9600 => 9600, Self::B14400 => 14400, Self::B19200 => 19200,
			Self::B28800 => 28800, Self::B38400 => 38400, Self::B56000 => 56000, Self::B57600 => 57600,
			Self::B115200 => 115200, Self::B128000 => 128000, Self::B153600 => 153600, Self::B230400 => 230400,
			Self::B256000 => 256000, Self::B460800 => 460800, Self::B500000 => 500000, Self::B576000 => 576000,
			Self::B921600 => 921600, Self::B1000000 => 1000000, Self::B1152000 => 1152000, Self::B1500000 => 1500000,
			Self::B2000000 => 2000000, Self::B2500000 => 2500000, Self::B3000000 => 3000000, Self::B3500000 => 3500000,
			Self::B4000000 => 4000000,
			Self::Custom => 251,
		}
	}
}

/// Number of data bits in a serial frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
	Five,
	Six,
	Seven,
	Eight,
}

impl DataBits {
	pub fn value(self) -> u8 {
		match self {
			Self::Five => 5,
			Self::Six => 6,
			Self::Seven => 7,
			Self::Eight => 8,
		}
	}
}

/// Number of stop bits in a serial frame.
///
/// Note the numeric encoding: one and a half stop bits is `4` on the wire, not `1.5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
	One,
	OneAndHalf,
	Two,
}

impl StopBits {
	pub fn value(self) -> u8 {
		match self {
			Self::One => 1,
			Self::OneAndHalf => 4,
			Self::Two => 2,
		}
	}
}

/// Parity of a serial frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
	None,
	Odd,
	Even,
	Mark,
	Space,
}

impl Parity {
	pub fn value(self) -> u8 {
		match self {
			Self::None => 1,
			Self::Odd => 2,
			Self::Even => 3,
			Self::Mark => 4,
			Self::Space => 5,
		}
	}
}

/// How data flow between DTE and DCE is controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
	None,
	Hardware,
	Software,
}

impl FlowControl {
	pub fn value(self) -> u8 {
		match self {
			Self::None => 1,
			Self::Hardware => 2,
			Self::Software => 3,
		}
	}
}

/// Byte order used when sending integers over the port.
///
/// [`Endian::Default`] packs big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
	Little,
	Big,
	Default,
}

impl Endian {
	pub fn value(self) -> u8 {
		match self {
			Self::Little => 1,
			Self::Big => 2,
			Self::Default => 3,
		}
	}

	/// True for [`Endian::Little`]; [`Endian::Big`] and [`Endian::Default`] pack big-endian.
	pub fn is_little(self) -> bool {
		matches!(self, Self::Little)
	}
}

/// Number of bytes an integer is packed into when sent over the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteWidth {
	Two,
	Four,
}

impl ByteWidth {
	pub fn value(self) -> u8 {
		match self {
			Self::Two => 2,
			Self::Four => 4,
		}
	}
}

/// File transfer protocol for [`SerialManager::send_file()`][crate::SerialManager::send_file]
/// and [`SerialManager::receive_file()`][crate::SerialManager::receive_file].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTransferProtocol {
	Xmodem,
}

impl FileTransferProtocol {
	pub fn value(self) -> u8 {
		match self {
			Self::Xmodem => 1,
		}
	}
}

/// Operating system family as identified by this library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsType {
	Linux,
	Windows,
	Solaris,
	MacOsX,
	Other,
}

impl OsType {
	pub fn value(self) -> i32 {
		match self {
			Self::Linux => 1,
			Self::Windows => 2,
			Self::Solaris => 3,
			Self::MacOsX => 4,
			Self::Other => -1,
		}
	}

	/// Identify an operating system from its name.
	pub fn from_name(name: &str) -> OsType {
		let name = name.to_lowercase();
		if name.contains("linux") {
			Self::Linux
		} else if name.contains("windows") {
			Self::Windows
		} else if name.contains("solaris") || name.contains("sunos") || name.contains("illumos") {
			Self::Solaris
		} else if name.contains("mac os") || name.contains("macos") || name.contains("darwin") {
			Self::MacOsX
		} else {
			Self::Other
		}
	}

	/// The operating system this process is running on.
	pub fn host() -> OsType {
		Self::from_name(std::env::consts::OS)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use assert2::assert;

	#[test]
	fn wire_values_are_fixed() {
		assert!(BaudRate::Custom.value() == 251);
		assert!(BaudRate::B115200.value() == 115200);
		assert!(StopBits::One.value() == 1);
		assert!(StopBits::OneAndHalf.value() == 4);
		assert!(StopBits::Two.value() == 2);
		assert!(Parity::None.value() == 1);
		assert!(Parity::Space.value() == 5);
		assert!(FlowControl::Software.value() == 3);
		assert!(Endian::Little.value() == 1);
		assert!(Endian::Default.value() == 3);
		assert!(FileTransferProtocol::Xmodem.value() == 1);
	}

	#[test]
	fn line_masks_are_fixed() {
		assert!(mask::CTS == 0x01);
		assert!(mask::DSR == 0x02);
		assert!(mask::DCD == 0x04);
		assert!(mask::RI == 0x08);
		assert!(mask::LOOP == 0x10);
		assert!(mask::RTS == 0x20);
		assert!(mask::DTR == 0x40);
		assert!(mask::DEFAULT == 0x0F);
	}

	#[test]
	fn os_type_from_name() {
		assert!(OsType::from_name("Linux") == OsType::Linux);
		assert!(OsType::from_name("Windows 11") == OsType::Windows);
		assert!(OsType::from_name("SunOS") == OsType::Solaris);
		assert!(OsType::from_name("Mac OS X") == OsType::MacOsX);
		assert!(OsType::from_name("darwin") == OsType::MacOsX);
		assert!(OsType::from_name("plan9") == OsType::Other);
		assert!(OsType::from_name("plan9").value() == -1);
	}
}
