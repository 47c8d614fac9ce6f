//! KLF-200 transport frames.
//!
//! Inside the SLIP framing, every frame has the layout
//!
//! ```text
//! [ProtocolID = 0][Length][Command u16 BE][Data ...][Checksum]
//! ```
//!
//! where `Length` covers the command and data bytes plus itself, and
//! `Checksum` is the XOR of all preceding bytes.

use crate::error::{Error, Result};

/// Protocol identifier; always zero for the public API.
const PROTOCOL_ID: u8 = 0;

/// Largest data payload a frame can carry (length is a single byte).
const MAX_DATA_LEN: usize = 250;

/// Command identifiers consumed or produced by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Command {
    ErrorNtf = 0x0000,
    GetAllNodesInformationReq = 0x0202,
    GetAllNodesInformationCfm = 0x0203,
    GetAllNodesInformationNtf = 0x0204,
    GetAllNodesInformationFinishedNtf = 0x0205,
    NodeStatePositionChangedNtf = 0x0211,
    CommandSendReq = 0x0300,
    CommandSendCfm = 0x0301,
    SessionFinishedNtf = 0x0304,
    PasswordEnterReq = 0x3000,
    PasswordEnterCfm = 0x3001,
}

impl Command {
    /// Map a wire command id to a known command, if any.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0000 => Some(Command::ErrorNtf),
            0x0202 => Some(Command::GetAllNodesInformationReq),
            0x0203 => Some(Command::GetAllNodesInformationCfm),
            0x0204 => Some(Command::GetAllNodesInformationNtf),
            0x0205 => Some(Command::GetAllNodesInformationFinishedNtf),
            0x0211 => Some(Command::NodeStatePositionChangedNtf),
            0x0300 => Some(Command::CommandSendReq),
            0x0301 => Some(Command::CommandSendCfm),
            0x0304 => Some(Command::SessionFinishedNtf),
            0x3000 => Some(Command::PasswordEnterReq),
            0x3001 => Some(Command::PasswordEnterCfm),
            _ => None,
        }
    }
}

/// A decoded transport frame.
///
/// The command is kept as the raw u16 so frames the client does not care
/// about still decode and can be skipped by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: u16,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(command: Command, data: Vec<u8>) -> Self {
        debug_assert!(data.len() <= MAX_DATA_LEN);
        Self {
            command: command as u16,
            data,
        }
    }

    /// Encode into the transport layout (without SLIP framing).
    pub fn encode(&self) -> Vec<u8> {
        let length = (self.data.len() + 3) as u8;
        let mut out = Vec::with_capacity(self.data.len() + 5);
        out.push(PROTOCOL_ID);
        out.push(length);
        out.extend_from_slice(&self.command.to_be_bytes());
        out.extend_from_slice(&self.data);
        out.push(checksum(&out));
        out
    }

    /// Decode a transport frame, validating protocol id, length, and checksum.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() < 5 {
            return Err(Error::Frame(format!("frame too short: {} bytes", raw.len())));
        }
        if raw[0] != PROTOCOL_ID {
            return Err(Error::Frame(format!("unexpected protocol id {:#04x}", raw[0])));
        }

        let length = raw[1] as usize;
        if raw.len() != length + 2 {
            return Err(Error::Frame(format!(
                "length mismatch: header says {}, got {} bytes",
                length,
                raw.len()
            )));
        }

        let expected = checksum(&raw[..raw.len() - 1]);
        let actual = raw[raw.len() - 1];
        if expected != actual {
            return Err(Error::Frame(format!(
                "checksum mismatch: expected {expected:#04x}, got {actual:#04x}"
            )));
        }

        let command = u16::from_be_bytes([raw[2], raw[3]]);
        Ok(Self {
            command,
            data: raw[4..raw.len() - 1].to_vec(),
        })
    }
}

/// XOR checksum over the frame bytes.
fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}
