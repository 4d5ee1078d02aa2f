use std::sync::Arc;

use sercom::settings::{BaudRate, DataBits, Parity, StopBits};
use sercom::{DataListener, SerialManager};

struct PrintListener;

impl DataListener for PrintListener {
	fn on_data(&self, bytes: &[u8]) {
		println!("{:02X?}", bytes);
	}
}

fn main() {
	if do_main().is_err() {
		std::process::exit(1);
	}
}

fn print_usage() {
	eprintln!("usage: watch TTY BAUD-RATE");
}

fn do_main() -> Result<(), ()> {
	let mut args = std::env::args();

	let _ = args.next().unwrap();

	#[cfg(feature = "log")]
	{
		env_logger::init();
	}

	let tty = args.next().ok_or_else(print_usage)?;
	let baud_rate = args.next().ok_or_else(print_usage)?;
	let baud_rate: u32 = baud_rate
		.parse()
		.map_err(|_| eprintln!("invalid baud rate: {}", baud_rate))?;

	let manager = SerialManager::new();
	let handle = manager
		.open(&tty, true, true, true)
		.map_err(|e| eprintln!("failed to open serial port at {}: {}", tty, e))?;
	if handle < 0 {
		eprintln!("{} is already open in this process", tty);
		return Err(());
	}

	manager
		.configure_data(handle, DataBits::Eight, StopBits::One, Parity::None, BaudRate::Custom, baud_rate)
		.map_err(|e| eprintln!("failed to configure serial port: {}", e))?;

	let listener: Arc<dyn DataListener> = Arc::new(PrintListener);
	manager
		.register_data_listener(handle, listener.clone())
		.map_err(|e| eprintln!("failed to register data listener: {}", e))?;

	eprintln!("watching {} at {} baud, press enter to stop", tty, baud_rate);
	let mut line = String::new();
	let _ = std::io::stdin().read_line(&mut line);

	manager
		.unregister_data_listener(&listener)
		.map_err(|e| eprintln!("failed to unregister data listener: {}", e))?;
	manager.close(handle).map_err(|e| eprintln!("failed to close port: {}", e))?;
	Ok(())
}
