use std::sync::Arc;

use assert2::{assert, let_assert};
use sercom::settings::{BaudRate, ByteWidth, DataBits, Endian, FlowControl, Parity, StopBits};
use sercom::{Error, ReadOutcome, SerialManager};

mod common;

use common::MockAdapter;

fn setup() -> (Arc<MockAdapter>, SerialManager, sercom::SerialHandle) {
	let adapter = Arc::new(MockAdapter::new());
	let manager = SerialManager::with_adapter(adapter.clone());
	let handle = manager.open("/dev/ttyUSB0", true, true, true).unwrap();
	(adapter, manager, handle)
}

#[test]
fn empty_write_never_reaches_the_adapter() {
	let (adapter, manager, handle) = setup();
	let_assert!(Ok(written) = manager.write_bytes(handle, &[], 0));
	assert!(!written);
	assert!(adapter.take_tx(handle).is_empty());
}

#[test]
fn write_bytes_and_single_byte() {
	let (adapter, manager, handle) = setup();
	let_assert!(Ok(true) = manager.write_bytes(handle, b"abc", 0));
	let_assert!(Ok(true) = manager.write_single_byte(handle, 0x0A));
	assert!(adapter.take_tx(handle) == b"abc\x0A");
}

#[test]
fn write_string_sends_utf8() {
	let (adapter, manager, handle) = setup();
	let_assert!(Ok(true) = manager.write_string(handle, "héllo", 0));
	assert!(adapter.take_tx(handle) == "héllo".as_bytes());
}

#[test]
fn write_int_endianness() {
	let (adapter, manager, handle) = setup();

	let_assert!(Ok(true) = manager.write_int(handle, 650, 0, Endian::Big, ByteWidth::Two));
	assert!(adapter.take_tx(handle) == [0x02, 0x8A]);

	let_assert!(Ok(true) = manager.write_int(handle, 650, 0, Endian::Little, ByteWidth::Two));
	assert!(adapter.take_tx(handle) == [0x8A, 0x02]);

	// Default packs big-endian.
	let_assert!(Ok(true) = manager.write_int(handle, 650, 0, Endian::Default, ByteWidth::Two));
	assert!(adapter.take_tx(handle) == [0x02, 0x8A]);

	let_assert!(Ok(true) = manager.write_int(handle, 0x0102_0304, 0, Endian::Little, ByteWidth::Four));
	assert!(adapter.take_tx(handle) == [0x04, 0x03, 0x02, 0x01]);
}

#[test]
fn write_int_array_concatenates_in_order() {
	let (adapter, manager, handle) = setup();
	let_assert!(Ok(true) = manager.write_int_array(handle, &[650, 1], 0, Endian::Big, ByteWidth::Two));
	assert!(adapter.take_tx(handle) == [0x02, 0x8A, 0x00, 0x01]);

	let_assert!(Ok(false) = manager.write_int_array(handle, &[], 0, Endian::Big, ByteWidth::Two));
	assert!(adapter.take_tx(handle).is_empty());
}

#[test]
fn read_distinguishes_data_nodata_and_eof() {
	let (adapter, manager, handle) = setup();

	adapter.remote_write(handle, b"hello");
	let_assert!(Ok(Some(bytes)) = manager.read_bytes(handle, 16));
	assert!(bytes == b"hello");

	// Nothing queued: an empty buffer, not an error.
	let_assert!(Ok(Some(bytes)) = manager.read_bytes(handle, 16));
	assert!(bytes.is_empty());

	adapter.queue_read(handle, ReadOutcome::Eof);
	let_assert!(Ok(outcome) = manager.read_bytes(handle, 16));
	assert!(outcome.is_none());

	adapter.queue_read_error(handle, -5);
	let_assert!(Err(Error::Io(io)) = manager.read_bytes(handle, 16));
	assert!(io.code == -5);
}

#[test]
fn read_respects_the_requested_count() {
	let (adapter, manager, handle) = setup();
	adapter.remote_write(handle, b"abcdef");

	let_assert!(Ok(Some(head)) = manager.read_bytes(handle, 4));
	assert!(head == b"abcd");
	let_assert!(Ok(Some(tail)) = manager.read_single_byte(handle));
	assert!(tail == b"e");
	let_assert!(Ok(Some(rest)) = manager.read_bytes_default(handle));
	assert!(rest == b"f");
}

#[test]
fn read_string_decodes_utf8() {
	let (adapter, manager, handle) = setup();
	adapter.remote_write(handle, "héllo".as_bytes());

	let_assert!(Ok(Some(text)) = manager.read_string_default(handle));
	assert!(text == "héllo");

	adapter.queue_read(handle, ReadOutcome::Eof);
	let_assert!(Ok(eof) = manager.read_string_default(handle));
	assert!(eof.is_none());
}

#[test]
fn read_and_write_surface_adapter_bad_handles() {
	let adapter = Arc::new(MockAdapter::new());
	let manager = SerialManager::with_adapter(adapter);

	// The hot path skips the registry; the adapter reports the bad handle.
	assert!(matches!(manager.write_bytes(42, b"x", 0), Err(Error::Io(_))));
	assert!(matches!(manager.read_bytes(42, 8), Err(Error::Io(_))));
}

#[test]
fn configuration_requires_a_known_handle() {
	let (_adapter, manager, handle) = setup();

	assert!(manager
		.configure_data(handle, DataBits::Eight, StopBits::One, Parity::None, BaudRate::B115200, 0)
		.is_ok());
	assert!(manager
		.configure_control(handle, FlowControl::Hardware, 0x11, 0x13, false, false)
		.is_ok());

	assert!(matches!(
		manager.configure_data(9, DataBits::Eight, StopBits::One, Parity::None, BaudRate::B9600, 0),
		Err(Error::UnknownHandle(9))
	));
	assert!(matches!(
		manager.configure_control(9, FlowControl::None, 0x11, 0x13, false, false),
		Err(Error::UnknownHandle(9))
	));
}
