//! XMODEM file transfer over an open port.
//!
//! The classic checksum variant: 128 byte blocks framed as
//! `SOH, block, 255 - block, data[128], checksum`, NAK driven handshake, ten
//! retransmissions per block, one minute to establish the session. Short final blocks
//! are padded with SUB, and the padding reaches the receiver; the protocol carries no
//! file length.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::manager::SerialManager;
use crate::SerialHandle;

const SOH: u8 = 0x01;
const EOT: u8 = 0x04;
const ACK: u8 = 0x06;
const NAK: u8 = 0x15;
const CAN: u8 = 0x18;
const SUB: u8 = 0x1A;

const BLOCK_SIZE: usize = 128;
const FRAME_SIZE: usize = BLOCK_SIZE + 4;
const MAX_RETRIES: u32 = 10;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(10);
const NAK_INTERVAL: Duration = Duration::from_secs(3);

/// Send the file at `path` over the port.
pub(crate) fn send_file(manager: &SerialManager, handle: SerialHandle, path: &Path) -> Result<(), Error> {
	let mut file = File::open(path).map_err(Error::File)?;
	debug!("xmodem send: waiting for receiver handshake");

	match read_control(manager, handle, HANDSHAKE_TIMEOUT)? {
		NAK => {},
		CAN => return Err(Error::TransferAborted("receiver cancelled the transfer")),
		_ => return Err(Error::TransferAborted("receiver sent an unexpected handshake byte")),
	}

	let mut block_number: u8 = 1;
	let mut data = [0u8; BLOCK_SIZE];
	loop {
		let used = read_block(&mut file, &mut data)?;
		if used == 0 {
			break;
		}
		let frame = encode_frame(block_number, &data);
		send_frame(manager, handle, &frame)?;
		trace!("xmodem send: block {} acknowledged", block_number);
		block_number = block_number.wrapping_add(1);
	}

	// End of transfer: EOT until the receiver acknowledges.
	let mut attempts = 0;
	loop {
		manager.write_bytes(handle, &[EOT], 0)?;
		match read_control(manager, handle, REPLY_TIMEOUT) {
			Ok(ACK) => {
				debug!("xmodem send: transfer complete");
				return Ok(());
			},
			Ok(CAN) => return Err(Error::TransferAborted("receiver cancelled the transfer")),
			Ok(_) | Err(Error::Timeout(_)) => {
				attempts += 1;
				if attempts >= MAX_RETRIES {
					return Err(Error::Timeout("waiting for the final acknowledgement"));
				}
			},
			Err(error) => return Err(error),
		}
	}
}

/// Receive a file from the port, writing it to `path`.
pub(crate) fn receive_file(manager: &SerialManager, handle: SerialHandle, path: &Path) -> Result<(), Error> {
	let mut file = File::create(path).map_err(Error::File)?;
	debug!("xmodem receive: soliciting sender");

	// Solicit the first block with NAKs until the sender starts.
	let handshake_deadline = Instant::now() + HANDSHAKE_TIMEOUT;
	manager.write_bytes(handle, &[NAK], 0)?;
	let mut next_nak = Instant::now() + NAK_INTERVAL;

	let mut expected: u8 = 1;
	loop {
		// Before the first block the sender gets the full handshake window and
		// periodic NAK reminders; afterwards each block must arrive promptly.
		let deadline = if expected == 1 {
			handshake_deadline
		} else {
			Instant::now() + REPLY_TIMEOUT
		};
		let control = loop {
			match poll_byte(manager, handle)? {
				Some(byte) => break byte,
				None => {
					let now = Instant::now();
					if now >= deadline {
						return Err(Error::Timeout("waiting for the sender"));
					}
					if expected == 1 && now >= next_nak {
						manager.write_bytes(handle, &[NAK], 0)?;
						next_nak = now + NAK_INTERVAL;
					}
					std::thread::sleep(POLL_INTERVAL);
				},
			}
		};

		match control {
			EOT => {
				manager.write_bytes(handle, &[ACK], 0)?;
				file.flush().map_err(Error::File)?;
				debug!("xmodem receive: transfer complete");
				return Ok(());
			},
			CAN => return Err(Error::TransferAborted("sender cancelled the transfer")),
			SOH => {
				let mut frame = [0u8; FRAME_SIZE];
				frame[0] = SOH;
				collect_exact(manager, handle, &mut frame[1..], REPLY_TIMEOUT)?;
				match check_frame(&frame, expected) {
					FrameCheck::Good => {
						file.write_all(&frame[3..3 + BLOCK_SIZE]).map_err(Error::File)?;
						manager.write_bytes(handle, &[ACK], 0)?;
						trace!("xmodem receive: block {} stored", expected);
						expected = expected.wrapping_add(1);
					},
					FrameCheck::Duplicate => {
						// The sender missed our ACK; acknowledge again, keep the first copy.
						manager.write_bytes(handle, &[ACK], 0)?;
					},
					FrameCheck::Bad => {
						manager.write_bytes(handle, &[NAK], 0)?;
					},
				}
			},
			other => {
				trace!("xmodem receive: ignoring stray byte {:#04x}", other);
			},
		}
	}
}

enum FrameCheck {
	Good,
	Duplicate,
	Bad,
}

fn check_frame(frame: &[u8; FRAME_SIZE], expected: u8) -> FrameCheck {
	let block = frame[1];
	if block != !frame[2] {
		return FrameCheck::Bad;
	}
	if checksum(&frame[3..3 + BLOCK_SIZE]) != frame[FRAME_SIZE - 1] {
		return FrameCheck::Bad;
	}
	if block == expected {
		FrameCheck::Good
	} else if block == expected.wrapping_sub(1) {
		FrameCheck::Duplicate
	} else {
		FrameCheck::Bad
	}
}

fn encode_frame(block_number: u8, data: &[u8; BLOCK_SIZE]) -> Vec<u8> {
	let mut frame = Vec::with_capacity(FRAME_SIZE);
	frame.push(SOH);
	frame.push(block_number);
	frame.push(!block_number);
	frame.extend_from_slice(data);
	frame.push(checksum(data));
	frame
}

fn checksum(data: &[u8]) -> u8 {
	data.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte))
}

/// Fill `data` from the file, padding a short tail with SUB.
///
/// Returns the number of file bytes used; zero means the file is exhausted.
fn read_block(file: &mut File, data: &mut [u8; BLOCK_SIZE]) -> Result<usize, Error> {
	let mut used = 0;
	while used < BLOCK_SIZE {
		let read = file.read(&mut data[used..]).map_err(Error::File)?;
		if read == 0 {
			break;
		}
		used += read;
	}
	data[used..].fill(SUB);
	Ok(used)
}

/// Transmit one frame until the receiver acknowledges it.
///
/// A NAK and a silent receiver both count as one failed attempt; the block goes out
/// again until the retries are exhausted.
fn send_frame(manager: &SerialManager, handle: SerialHandle, frame: &[u8]) -> Result<(), Error> {
	let mut attempts = 0;
	loop {
		manager.write_bytes(handle, frame, 0)?;
		match read_control(manager, handle, REPLY_TIMEOUT) {
			Ok(ACK) => return Ok(()),
			Ok(CAN) => return Err(Error::TransferAborted("receiver cancelled the transfer")),
			Ok(_) | Err(Error::Timeout(_)) => {
				attempts += 1;
				if attempts >= MAX_RETRIES {
					return Err(Error::Timeout("retransmitting a rejected block"));
				}
			},
			Err(error) => return Err(error),
		}
	}
}

/// One byte from the port, or `None` when nothing is available right now.
fn poll_byte(manager: &SerialManager, handle: SerialHandle) -> Result<Option<u8>, Error> {
	match manager.read_single_byte(handle)? {
		Some(bytes) if bytes.is_empty() => Ok(None),
		Some(bytes) => Ok(Some(bytes[0])),
		None => Err(Error::TransferAborted("serial endpoint reached end of stream")),
	}
}

/// Wait for a single control byte, polling until `timeout` runs out.
fn read_control(manager: &SerialManager, handle: SerialHandle, timeout: Duration) -> Result<u8, Error> {
	let deadline = Instant::now() + timeout;
	loop {
		if let Some(byte) = poll_byte(manager, handle)? {
			return Ok(byte);
		}
		if Instant::now() >= deadline {
			return Err(Error::Timeout("waiting for a protocol reply"));
		}
		std::thread::sleep(POLL_INTERVAL);
	}
}

/// Read exactly `buffer.len()` bytes, polling until `timeout` runs out.
fn collect_exact(
	manager: &SerialManager,
	handle: SerialHandle,
	buffer: &mut [u8],
	timeout: Duration,
) -> Result<(), Error> {
	let deadline = Instant::now() + timeout;
	let mut filled = 0;
	while filled < buffer.len() {
		match manager.read_bytes(handle, buffer.len() - filled)? {
			None => return Err(Error::TransferAborted("serial endpoint reached end of stream")),
			Some(bytes) if bytes.is_empty() => {
				if Instant::now() >= deadline {
					return Err(Error::Timeout("waiting for the rest of a block"));
				}
				std::thread::sleep(POLL_INTERVAL);
			},
			Some(bytes) => {
				buffer[filled..filled + bytes.len()].copy_from_slice(&bytes);
				filled += bytes.len();
			},
		}
	}
	Ok(())
}
