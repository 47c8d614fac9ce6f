//! Product handles returned by node enumeration.

use crate::error::{Error, Result};
use crate::position::Position;

/// Payload size of a `GW_GET_ALL_NODES_INFORMATION_NTF` frame.
const NODE_INFORMATION_LEN: usize = 124;

/// One controllable product (motorized cover) known to the gateway.
///
/// A product is a snapshot taken at enumeration time; the gateway does not
/// update it in place. Spontaneous changes arrive separately as
/// [`StateChange`](crate::messages::StateChange) notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    /// System-table index of the node (0-199).
    pub node_id: u8,
    /// Display name as configured on the gateway.
    pub name: String,
    pub current_position: Position,
    pub target_position: Position,
}

impl Product {
    /// Parse the payload of a `GW_GET_ALL_NODES_INFORMATION_NTF` frame.
    ///
    /// Field offsets per the gateway API: node id at 0, the 64-byte
    /// NUL-padded UTF-8 name at 4, current position at 85, target at 87.
    pub fn parse_node_information(data: &[u8]) -> Result<Self> {
        if data.len() < NODE_INFORMATION_LEN {
            return Err(Error::Frame(format!(
                "node information payload too short: {} bytes",
                data.len()
            )));
        }

        Ok(Self {
            node_id: data[0],
            name: parse_name(&data[4..68]),
            current_position: Position::from_raw(u16::from_be_bytes([data[85], data[86]])),
            target_position: Position::from_raw(u16::from_be_bytes([data[87], data[88]])),
        })
    }
}

/// Decode a NUL-padded UTF-8 name field.
fn parse_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn node_information_payload(node_id: u8, name: &str, target_raw: u16) -> Vec<u8> {
        let mut data = vec![0u8; NODE_INFORMATION_LEN];
        data[0] = node_id;
        let name_bytes = name.as_bytes();
        data[4..4 + name_bytes.len()].copy_from_slice(name_bytes);
        data[85..87].copy_from_slice(&0x1234u16.to_be_bytes());
        data[87..89].copy_from_slice(&target_raw.to_be_bytes());
        data
    }

    #[test]
    fn test_parse_node_information() {
        let data = node_information_payload(7, "Kitchen Blind", 30 * 512);
        let product = Product::parse_node_information(&data).unwrap();

        assert_eq!(product.node_id, 7);
        assert_eq!(product.name, "Kitchen Blind");
        assert_eq!(product.current_position.raw(), 0x1234);
        assert_eq!(product.target_position.percent(), Some(30));
    }

    #[test]
    fn test_parse_unknown_target() {
        let data = node_information_payload(1, "Office", 0xF7FF);
        let product = Product::parse_node_information(&data).unwrap();
        assert_eq!(product.target_position.percent(), None);
    }

    #[test]
    fn test_parse_full_width_name() {
        let name = "x".repeat(64);
        let data = node_information_payload(2, &name, 0);
        let product = Product::parse_node_information(&data).unwrap();
        assert_eq!(product.name.len(), 64);
    }

    #[test]
    fn test_parse_rejects_short_payload() {
        assert!(Product::parse_node_information(&[0u8; 60]).is_err());
    }
}
