use std::path::PathBuf;

/// Inspect and exercise serial ports.
#[derive(clap::Parser)]
pub struct Options {
	/// Print more verbose messages. Can be used multiple times.
	#[clap(long, short)]
	#[clap(global = true)]
	#[clap(action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// The serial port to use.
	#[clap(long, short)]
	#[clap(global = true)]
	#[cfg_attr(target_os = "windows", clap(default_value = "COM1"))]
	#[cfg_attr(not(target_os = "windows"), clap(default_value = "/dev/ttyUSB0"))]
	pub port: String,

	/// The baud rate for the serial port.
	#[clap(long, short)]
	#[clap(global = true)]
	#[clap(default_value = "115200")]
	pub baud_rate: u32,

	#[clap(subcommand)]
	pub command: Command,
}

#[derive(clap::Parser)]
pub enum Command {
	/// List the serial ports present in the system.
	List,

	/// Print bytes arriving on the port as hex.
	Dump {
		/// Stop after this many seconds; 0 keeps dumping until interrupted.
		#[clap(long)]
		#[clap(default_value = "0")]
		seconds: u64,
	},

	/// Show the port configuration and modem line status.
	Status,

	/// Send a file over the port using XMODEM.
	SendFile {
		/// The file to send.
		file: PathBuf,
	},

	/// Receive a file from the port using XMODEM, storing it at the given path.
	ReceiveFile {
		/// Where to store the received file.
		file: PathBuf,
	},
}
