//! OSC packet codec
//!
//! Thin layer over `rosc`: one message per outbound datagram, and inbound
//! datagrams flattened to the messages they contain (bundles recursively,
//! in order).

use crate::error::Result;
use rosc::{OscMessage, OscPacket, OscType};

/// Encode a single message as a datagram
pub fn encode(message: OscMessage) -> Result<Vec<u8>> {
    Ok(rosc::encoder::encode(&OscPacket::Message(message))?)
}

/// Decode a datagram into its messages
pub fn decode(datagram: &[u8]) -> Result<Vec<OscMessage>> {
    let (_, packet) = rosc::decoder::decode_udp(datagram)?;
    let mut messages = Vec::new();
    flatten(packet, &mut messages);
    Ok(messages)
}

fn flatten(packet: OscPacket, out: &mut Vec<OscMessage>) {
    match packet {
        OscPacket::Message(message) => out.push(message),
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                flatten(inner, out);
            }
        }
    }
}

/// Numeric argument as `f32` (OSC int, float or double)
pub fn as_number(arg: &OscType) -> Option<f32> {
    match *arg {
        OscType::Float(v) => Some(v),
        OscType::Int(v) => Some(v as f32),
        OscType::Double(v) => Some(v as f32),
        OscType::Long(v) => Some(v as f32),
        _ => None,
    }
}

/// String argument
pub fn as_str(arg: &OscType) -> Option<&str> {
    match arg {
        OscType::String(s) => Some(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::{OscBundle, OscTime};

    fn message(addr: &str, args: Vec<OscType>) -> OscMessage {
        OscMessage {
            addr: addr.to_string(),
            args,
        }
    }

    #[test]
    fn test_decode_single_message() {
        let bytes = encode(message("/trill/command/listAll", vec![])).unwrap();
        let messages = decode(&bytes).unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].addr, "/trill/command/listAll");
        assert!(messages[0].args.is_empty());
    }

    #[test]
    fn test_nested_bundles_flattened_in_order() {
        let inner = OscPacket::Bundle(OscBundle {
            timetag: OscTime {
                seconds: 0,
                fractional: 1,
            },
            content: vec![OscPacket::Message(message("/b", vec![]))],
        });
        let outer = OscPacket::Bundle(OscBundle {
            timetag: OscTime {
                seconds: 0,
                fractional: 1,
            },
            content: vec![
                OscPacket::Message(message("/a", vec![])),
                inner,
                OscPacket::Message(message("/c", vec![])),
            ],
        });
        let bytes = rosc::encoder::encode(&outer).unwrap();

        let addrs: Vec<String> = decode(&bytes)
            .unwrap()
            .into_iter()
            .map(|m| m.addr)
            .collect();
        assert_eq!(addrs, vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(decode(&[0x01, 0x02, 0x03]).is_err());
    }

    #[test]
    fn test_numeric_arguments() {
        assert_eq!(as_number(&OscType::Float(1.5)), Some(1.5));
        assert_eq!(as_number(&OscType::Int(3)), Some(3.0));
        assert_eq!(as_number(&OscType::Double(0.25)), Some(0.25));
        assert_eq!(as_number(&OscType::String("1".into())), None);
        assert_eq!(as_str(&OscType::String("bar".into())), Some("bar"));
        assert_eq!(as_str(&OscType::Int(1)), None);
    }
}
