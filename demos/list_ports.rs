use sercom::SerialManager;

fn main() {
	let manager = SerialManager::new();
	let ports = manager.list_ports();
	if ports.is_empty() {
		eprintln!("no serial ports found");
		return;
	}
	for port in ports {
		println!("{}", port);
	}
}
