//! Wire encoding for OSC messages.
//!
//! Thin wrapper over `rosc`: outbound messages are encoded one per datagram,
//! inbound datagrams may carry a bundle, which is flattened into its messages
//! in order.

use crate::error::{Error, Result};
use rosc::{OscMessage, OscPacket, OscType};

/// Largest datagram we expect from the DAW.
pub const MAX_DATAGRAM: usize = 65_536;

/// Build a message from an address and typed arguments.
pub fn message(address: &str, args: Vec<OscType>) -> OscMessage {
    OscMessage {
        addr: address.to_string(),
        args,
    }
}

/// Encode a single message into wire bytes.
pub fn encode_message(msg: &OscMessage) -> Result<Vec<u8>> {
    if !msg.addr.starts_with('/') {
        return Err(Error::Validation(format!(
            "OSC address must start with '/', got '{}'",
            msg.addr
        )));
    }
    rosc::encoder::encode(&OscPacket::Message(msg.clone()))
        .map_err(|e| Error::transport(&format!("failed to encode {}", msg.addr), e))
}

/// Encode an address plus arguments into wire bytes.
pub fn encode(address: &str, args: Vec<OscType>) -> Result<Vec<u8>> {
    encode_message(&message(address, args))
}

/// Decode a datagram into the messages it carries.
pub fn decode(datagram: &[u8]) -> Result<Vec<OscMessage>> {
    let (_, packet) = rosc::decoder::decode_udp(datagram)
        .map_err(|e| Error::Decode(format!("{} ({} bytes)", e, datagram.len())))?;
    let mut messages = Vec::new();
    flatten(packet, &mut messages);
    Ok(messages)
}

fn flatten(packet: OscPacket, out: &mut Vec<OscMessage>) {
    match packet {
        OscPacket::Message(msg) => out.push(msg),
        OscPacket::Bundle(bundle) => {
            for p in bundle.content {
                flatten(p, out);
            }
        }
    }
}

/// Numeric view of an argument. REAPER sends most feedback values as floats.
pub fn arg_as_f64(arg: &OscType) -> Option<f64> {
    match arg {
        OscType::Int(v) => Some(*v as f64),
        OscType::Long(v) => Some(*v as f64),
        OscType::Float(v) => Some(*v as f64),
        OscType::Double(v) => Some(*v),
        OscType::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        OscType::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Boolean view of an argument: any non-zero number is `true`.
pub fn arg_as_bool(arg: &OscType) -> Option<bool> {
    match arg {
        OscType::Bool(b) => Some(*b),
        other => arg_as_f64(other).map(|v| v != 0.0),
    }
}
