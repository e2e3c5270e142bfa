//! Wire format of the peer protocol.
//!
//! Every message is one TCP connection's worth of bytes: a 12-byte ASCII
//! command, zero-padded on the right, followed by the command's payload
//! encoded as JSON. The reader consumes the stream to EOF before parsing.

use crate::error::{CoinError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

pub const COMMAND_LENGTH: usize = 12;
pub const NODE_VERSION: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpType {
    Tx,
    Block,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionPayload {
    pub version: usize,
    pub best_height: usize,
    pub addr_from: SocketAddr,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddrPayload {
    pub addr_list: Vec<SocketAddr>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetBlocksPayload {
    pub addr_from: SocketAddr,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvPayload {
    pub addr_from: SocketAddr,
    pub op_type: OpType,
    pub items: Vec<Vec<u8>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetDataPayload {
    pub addr_from: SocketAddr,
    pub op_type: OpType,
    pub id: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BlockPayload {
    pub addr_from: SocketAddr,
    pub block: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TxPayload {
    pub addr_from: SocketAddr,
    pub transaction: Vec<u8>,
}

#[derive(Debug)]
pub enum Message {
    Version(VersionPayload),
    Addr(AddrPayload),
    GetBlocks(GetBlocksPayload),
    Inv(InvPayload),
    GetData(GetDataPayload),
    Block(BlockPayload),
    Tx(TxPayload),
}

fn command_to_bytes(command: &str) -> [u8; COMMAND_LENGTH] {
    let mut bytes = [0u8; COMMAND_LENGTH];
    for (i, b) in command.bytes().enumerate() {
        bytes[i] = b;
    }
    bytes
}

fn bytes_to_command(bytes: &[u8]) -> Result<String> {
    let trimmed: Vec<u8> = bytes.iter().copied().filter(|b| *b != 0x00).collect();
    String::from_utf8(trimmed)
        .map_err(|e| CoinError::ProtocolError(format!("command is not ASCII: {}", e)))
}

impl Message {
    pub fn command(&self) -> &'static str {
        match self {
            Message::Version(_) => "version",
            Message::Addr(_) => "addr",
            Message::GetBlocks(_) => "getblocks",
            Message::Inv(_) => "inv",
            Message::GetData(_) => "getdata",
            Message::Block(_) => "block",
            Message::Tx(_) => "tx",
        }
    }

    pub fn to_frame(&self) -> Result<Vec<u8>> {
        let payload = match self {
            Message::Version(p) => serde_json::to_vec(p),
            Message::Addr(p) => serde_json::to_vec(p),
            Message::GetBlocks(p) => serde_json::to_vec(p),
            Message::Inv(p) => serde_json::to_vec(p),
            Message::GetData(p) => serde_json::to_vec(p),
            Message::Block(p) => serde_json::to_vec(p),
            Message::Tx(p) => serde_json::to_vec(p),
        }
        .map_err(|e| CoinError::ProtocolError(e.to_string()))?;

        let mut frame = command_to_bytes(self.command()).to_vec();
        frame.extend(payload);
        Ok(frame)
    }

    pub fn from_frame(bytes: &[u8]) -> Result<Message> {
        if bytes.len() < COMMAND_LENGTH {
            return Err(CoinError::ProtocolError(format!(
                "short frame: {} bytes",
                bytes.len()
            )));
        }
        let command = bytes_to_command(&bytes[..COMMAND_LENGTH])?;
        let payload = &bytes[COMMAND_LENGTH..];

        fn decode<'a, T: Deserialize<'a>>(payload: &'a [u8], command: &str) -> Result<T> {
            serde_json::from_slice(payload).map_err(|e| {
                CoinError::ProtocolError(format!("malformed {} payload: {}", command, e))
            })
        }

        match command.as_str() {
            "version" => Ok(Message::Version(decode(payload, "version")?)),
            "addr" => Ok(Message::Addr(decode(payload, "addr")?)),
            "getblocks" => Ok(Message::GetBlocks(decode(payload, "getblocks")?)),
            "inv" => Ok(Message::Inv(decode(payload, "inv")?)),
            "getdata" => Ok(Message::GetData(decode(payload, "getdata")?)),
            "block" => Ok(Message::Block(decode(payload, "block")?)),
            "tx" => Ok(Message::Tx(decode(payload, "tx")?)),
            unknown => Err(CoinError::ProtocolError(format!(
                "unknown command: {}",
                unknown
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:3001".parse().expect("address parse failed")
    }

    #[test]
    fn test_command_field_is_zero_padded() {
        let msg = Message::Tx(TxPayload {
            addr_from: test_addr(),
            transaction: vec![1, 2, 3],
        });
        let frame = msg.to_frame().expect("framing failed");

        assert_eq!(&frame[..2], b"tx");
        assert!(frame[2..COMMAND_LENGTH].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_frame_roundtrip() {
        let msg = Message::Inv(InvPayload {
            addr_from: test_addr(),
            op_type: OpType::Block,
            items: vec![vec![0xde, 0xad], vec![0xbe, 0xef]],
        });
        let frame = msg.to_frame().expect("framing failed");

        match Message::from_frame(&frame).expect("parsing failed") {
            Message::Inv(payload) => {
                assert_eq!(payload.addr_from, test_addr());
                assert_eq!(payload.op_type, OpType::Block);
                assert_eq!(payload.items, vec![vec![0xde, 0xad], vec![0xbe, 0xef]]);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_version_roundtrip() {
        let msg = Message::Version(VersionPayload {
            version: NODE_VERSION,
            best_height: 42,
            addr_from: test_addr(),
        });
        let frame = msg.to_frame().expect("framing failed");

        match Message::from_frame(&frame).expect("parsing failed") {
            Message::Version(payload) => {
                assert_eq!(payload.version, NODE_VERSION);
                assert_eq!(payload.best_height, 42);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_short_frame_is_protocol_error() {
        let result = Message::from_frame(b"tx");
        assert!(matches!(result, Err(CoinError::ProtocolError(_))));
    }

    #[test]
    fn test_unknown_command_is_protocol_error() {
        let mut frame = [0u8; COMMAND_LENGTH].to_vec();
        frame[..7].copy_from_slice(b"unknown");
        frame.extend(b"{}");
        assert!(matches!(
            Message::from_frame(&frame),
            Err(CoinError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_malformed_payload_is_protocol_error() {
        let mut frame = command_to_bytes("version").to_vec();
        frame.extend(b"not json");
        assert!(matches!(
            Message::from_frame(&frame),
            Err(CoinError::ProtocolError(_))
        ));
    }
}
