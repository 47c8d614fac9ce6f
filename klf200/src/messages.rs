//! Typed views over the frames this client exchanges with the gateway.

use crate::error::{Error, Result};
use crate::frame::{Command, Frame};
use crate::position::Position;
use crate::product::Product;

/// Password field size in `GW_PASSWORD_ENTER_REQ`.
const PASSWORD_LEN: usize = 32;

/// Payload size of `GW_COMMAND_SEND_REQ`.
const COMMAND_SEND_LEN: usize = 66;

/// Payload size of `GW_NODE_STATE_POSITION_CHANGED_NTF`.
const STATE_CHANGED_LEN: usize = 20;

/// A spontaneous node state change pushed by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub node_id: u8,
    pub current_position: Position,
    pub target_position: Position,
}

/// Frames the gateway sends that this client understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingMessage {
    PasswordEnterCfm {
        accepted: bool,
    },
    /// Enumeration confirm; `node_count` is zero when the system table is empty.
    GetAllNodesInformationCfm {
        node_count: u8,
    },
    NodeInformation(Product),
    GetAllNodesInformationFinished,
    CommandSendCfm {
        session_id: u16,
        accepted: bool,
    },
    NodeStatePositionChanged(StateChange),
    /// `GW_ERROR_NTF`; the gateway could not process a request.
    GatewayError {
        code: u8,
    },
    /// Anything this client has no use for (session bookkeeping, etc.).
    Other {
        command: u16,
    },
}

impl IncomingMessage {
    /// Parse a decoded transport frame into a typed message.
    pub fn parse(frame: &Frame) -> Result<Self> {
        let data = &frame.data;
        match Command::from_u16(frame.command) {
            Some(Command::PasswordEnterCfm) => Ok(Self::PasswordEnterCfm {
                accepted: expect_byte(data, 0, "GW_PASSWORD_ENTER_CFM")? == 0,
            }),
            Some(Command::GetAllNodesInformationCfm) => {
                let status = expect_byte(data, 0, "GW_GET_ALL_NODES_INFORMATION_CFM")?;
                let total = expect_byte(data, 1, "GW_GET_ALL_NODES_INFORMATION_CFM")?;
                // Status != 0 means the system table is empty.
                Ok(Self::GetAllNodesInformationCfm {
                    node_count: if status == 0 { total } else { 0 },
                })
            }
            Some(Command::GetAllNodesInformationNtf) => Ok(Self::NodeInformation(
                Product::parse_node_information(data)?,
            )),
            Some(Command::GetAllNodesInformationFinishedNtf) => {
                Ok(Self::GetAllNodesInformationFinished)
            }
            Some(Command::CommandSendCfm) => {
                if data.len() < 3 {
                    return Err(Error::Frame("GW_COMMAND_SEND_CFM too short".into()));
                }
                Ok(Self::CommandSendCfm {
                    session_id: u16::from_be_bytes([data[0], data[1]]),
                    accepted: data[2] == 1,
                })
            }
            Some(Command::NodeStatePositionChangedNtf) => {
                if data.len() < STATE_CHANGED_LEN {
                    return Err(Error::Frame(
                        "GW_NODE_STATE_POSITION_CHANGED_NTF too short".into(),
                    ));
                }
                Ok(Self::NodeStatePositionChanged(StateChange {
                    node_id: data[0],
                    current_position: Position::from_raw(u16::from_be_bytes([data[2], data[3]])),
                    target_position: Position::from_raw(u16::from_be_bytes([data[4], data[5]])),
                }))
            }
            Some(Command::ErrorNtf) => Ok(Self::GatewayError {
                code: expect_byte(data, 0, "GW_ERROR_NTF")?,
            }),
            _ => Ok(Self::Other {
                command: frame.command,
            }),
        }
    }
}

fn expect_byte(data: &[u8], index: usize, what: &str) -> Result<u8> {
    data.get(index)
        .copied()
        .ok_or_else(|| Error::Frame(format!("{what} too short")))
}

/// Build a `GW_PASSWORD_ENTER_REQ` frame.
///
/// The password field is 32 bytes, zero padded; longer passwords are
/// truncated the way the gateway itself would.
pub fn password_enter(password: &str) -> Frame {
    let mut data = vec![0u8; PASSWORD_LEN];
    let bytes = password.as_bytes();
    let len = bytes.len().min(PASSWORD_LEN);
    data[..len].copy_from_slice(&bytes[..len]);
    Frame::new(Command::PasswordEnterReq, data)
}

/// Build a `GW_GET_ALL_NODES_INFORMATION_REQ` frame.
pub fn get_all_nodes_information() -> Frame {
    Frame::new(Command::GetAllNodesInformationReq, Vec::new())
}

/// Build a `GW_COMMAND_SEND_REQ` frame driving one node's main parameter
/// to the given position.
pub fn command_send(session_id: u16, node_id: u8, position: Position) -> Frame {
    let mut data = vec![0u8; COMMAND_SEND_LEN];
    data[0..2].copy_from_slice(&session_id.to_be_bytes());
    data[2] = 1; // command originator: user
    data[3] = 3; // priority level: user level 2
    // data[4..7]: parameter active + FPI bitmasks stay zero (main parameter only)
    data[7..9].copy_from_slice(&position.raw().to_be_bytes());
    // data[9..41]: functional parameters FP1-FP16, unused
    data[41] = 1; // index array count
    data[42] = node_id;
    // data[43..62]: rest of the index array, data[62..66]: priority locks
    Frame::new(Command::CommandSendReq, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::tests::node_information_payload;

    #[test]
    fn test_password_enter_pads_to_32_bytes() {
        let frame = password_enter("velux123");
        assert_eq!(frame.command, Command::PasswordEnterReq as u16);
        assert_eq!(frame.data.len(), PASSWORD_LEN);
        assert_eq!(&frame.data[..8], b"velux123");
        assert!(frame.data[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_password_enter_truncates_long_password() {
        let frame = password_enter(&"p".repeat(40));
        assert_eq!(frame.data.len(), PASSWORD_LEN);
    }

    #[test]
    fn test_command_send_layout() {
        let frame = command_send(0x0102, 9, Position::from_percent(42));
        assert_eq!(frame.data.len(), COMMAND_SEND_LEN);
        assert_eq!(&frame.data[0..2], &[0x01, 0x02]);
        assert_eq!(frame.data[2], 1);
        assert_eq!(frame.data[3], 3);
        assert_eq!(
            u16::from_be_bytes([frame.data[7], frame.data[8]]),
            42 * 512
        );
        assert_eq!(frame.data[41], 1);
        assert_eq!(frame.data[42], 9);
    }

    #[test]
    fn test_parse_password_cfm() {
        let ok = Frame::new(Command::PasswordEnterCfm, vec![0]);
        assert_eq!(
            IncomingMessage::parse(&ok).unwrap(),
            IncomingMessage::PasswordEnterCfm { accepted: true }
        );

        let rejected = Frame::new(Command::PasswordEnterCfm, vec![1]);
        assert_eq!(
            IncomingMessage::parse(&rejected).unwrap(),
            IncomingMessage::PasswordEnterCfm { accepted: false }
        );
    }

    #[test]
    fn test_parse_enumeration_cfm_empty_table() {
        let frame = Frame::new(Command::GetAllNodesInformationCfm, vec![1, 5]);
        assert_eq!(
            IncomingMessage::parse(&frame).unwrap(),
            IncomingMessage::GetAllNodesInformationCfm { node_count: 0 }
        );
    }

    #[test]
    fn test_parse_node_information_ntf() {
        let frame = Frame::new(
            Command::GetAllNodesInformationNtf,
            node_information_payload(3, "Living Room", 75 * 512),
        );
        match IncomingMessage::parse(&frame).unwrap() {
            IncomingMessage::NodeInformation(product) => {
                assert_eq!(product.node_id, 3);
                assert_eq!(product.name, "Living Room");
                assert_eq!(product.target_position.percent(), Some(75));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parse_command_send_cfm() {
        let frame = Frame::new(Command::CommandSendCfm, vec![0x00, 0x07, 1]);
        assert_eq!(
            IncomingMessage::parse(&frame).unwrap(),
            IncomingMessage::CommandSendCfm {
                session_id: 7,
                accepted: true
            }
        );
    }

    #[test]
    fn test_parse_state_change_ntf() {
        let mut data = vec![0u8; STATE_CHANGED_LEN];
        data[0] = 4;
        data[2..4].copy_from_slice(&(10u16 * 512).to_be_bytes());
        data[4..6].copy_from_slice(&(60u16 * 512).to_be_bytes());

        let frame = Frame::new(Command::NodeStatePositionChangedNtf, data);
        match IncomingMessage::parse(&frame).unwrap() {
            IncomingMessage::NodeStatePositionChanged(change) => {
                assert_eq!(change.node_id, 4);
                assert_eq!(change.current_position.percent(), Some(10));
                assert_eq!(change.target_position.percent(), Some(60));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parse_unknown_command_is_other() {
        let frame = Frame {
            command: 0x0009,
            data: vec![1, 2, 3],
        };
        assert_eq!(
            IncomingMessage::parse(&frame).unwrap(),
            IncomingMessage::Other { command: 0x0009 }
        );
    }

    #[test]
    fn test_parse_truncated_cfm_is_error() {
        let frame = Frame::new(Command::PasswordEnterCfm, Vec::new());
        assert!(IncomingMessage::parse(&frame).is_err());
    }
}
