use std::sync::Arc;
use std::time::Duration;

use sercom::settings::{BaudRate, DataBits, FileTransferProtocol, Parity, StopBits};
use sercom::{DataListener, SerialHandle, SerialManager};

mod logging;
mod options;

use options::{Command, Options};

fn main() {
	if let Err(()) = do_main(clap::Parser::parse()) {
		std::process::exit(1);
	}
}

fn do_main(options: Options) -> Result<(), ()> {
	logging::init(module_path!(), options.verbose as i8);
	match &options.command {
		Command::List => {
			let ports = SerialManager::new().list_ports();
			if ports.is_empty() {
				log::info!("No serial ports found.");
			}
			for port in ports {
				println!("{}", port);
			}
		},
		Command::Dump { seconds } => {
			let manager = SerialManager::new();
			let handle = open_port(&manager, &options)?;
			let listener: Arc<dyn DataListener> = Arc::new(HexDump);
			manager
				.register_data_listener(handle, listener.clone())
				.map_err(|e| log::error!("Failed to register data listener: {}", e))?;
			log::info!("Dumping data from {}.", options.port);
			if *seconds == 0 {
				loop {
					std::thread::sleep(Duration::from_secs(3600));
				}
			}
			std::thread::sleep(Duration::from_secs(*seconds));
			manager
				.unregister_data_listener(&listener)
				.map_err(|e| log::error!("Failed to unregister data listener: {}", e))?;
			manager.close(handle).map_err(|e| log::error!("Failed to close port: {}", e))?;
		},
		Command::Status => {
			let manager = SerialManager::new();
			let handle = open_port(&manager, &options)?;
			let configuration = manager
				.current_configuration(handle)
				.map_err(|e| log::error!("Failed to read configuration: {}", e))?;
			for field in configuration {
				println!("{}", field);
			}
			let status = manager
				.line_status(handle)
				.map_err(|e| log::error!("Failed to read line status: {}", e))?;
			for (name, value) in ["CTS", "DSR", "DCD", "RI", "LOOP", "RTS", "DTR"].iter().zip(status) {
				println!("{}: {}", name, value);
			}
			manager.close(handle).map_err(|e| log::error!("Failed to close port: {}", e))?;
		},
		Command::SendFile { file } => {
			let manager = SerialManager::new();
			let handle = open_port(&manager, &options)?;
			log::info!("Sending {} over {}.", file.display(), options.port);
			manager
				.send_file(handle, file, FileTransferProtocol::Xmodem)
				.map_err(|e| log::error!("Transfer failed: {}", e))?;
			log::info!("Transfer complete.");
			manager.close(handle).map_err(|e| log::error!("Failed to close port: {}", e))?;
		},
		Command::ReceiveFile { file } => {
			let manager = SerialManager::new();
			let handle = open_port(&manager, &options)?;
			log::info!("Receiving into {} from {}.", file.display(), options.port);
			manager
				.receive_file(handle, file, FileTransferProtocol::Xmodem)
				.map_err(|e| log::error!("Transfer failed: {}", e))?;
			log::info!("Transfer complete.");
			manager.close(handle).map_err(|e| log::error!("Failed to close port: {}", e))?;
		},
	}
	Ok(())
}

fn open_port(manager: &SerialManager, options: &Options) -> Result<SerialHandle, ()> {
	let handle = manager
		.open(&options.port, true, true, true)
		.map_err(|e| log::error!("Failed to open {}: {}", options.port, e))?;
	if handle < 0 {
		log::error!("{} is already open in this process.", options.port);
		return Err(());
	}
	manager
		.configure_data(handle, DataBits::Eight, StopBits::One, Parity::None, BaudRate::Custom, options.baud_rate)
		.map_err(|e| log::error!("Failed to configure {}: {}", options.port, e))?;
	Ok(handle)
}

struct HexDump;

impl DataListener for HexDump {
	fn on_data(&self, bytes: &[u8]) {
		println!("{:02X?}", bytes);
	}
}
