//! Outgoing peer messages. Every send is one-shot: dial, write the frame,
//! close. A peer that cannot be dialed is dropped from the known list.

use crate::core::block::Block;
use crate::core::transaction::Transaction;
use crate::network::message::{
    AddrPayload, BlockPayload, GetBlocksPayload, GetDataPayload, InvPayload, Message, NODE_VERSION,
    OpType, TxPayload, VersionPayload,
};
use crate::node::context::NodeContext;
use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;
use tracing::{debug, error};

pub(crate) const TCP_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn send_version(ctx: &NodeContext, addr_to: &SocketAddr, best_height: usize) {
    send_data(
        ctx,
        addr_to,
        Message::Version(VersionPayload {
            version: NODE_VERSION,
            best_height,
            addr_from: ctx.node_addr(),
        }),
    )
    .await;
}

/// Shares every peer this node knows about, itself included.
pub async fn send_addr(ctx: &NodeContext, addr_to: &SocketAddr) {
    let mut addr_list = ctx.peers();
    if !addr_list.contains(&ctx.node_addr()) {
        addr_list.push(ctx.node_addr());
    }
    send_data(ctx, addr_to, Message::Addr(AddrPayload { addr_list })).await;
}

pub async fn send_get_blocks(ctx: &NodeContext, addr_to: &SocketAddr) {
    send_data(
        ctx,
        addr_to,
        Message::GetBlocks(GetBlocksPayload {
            addr_from: ctx.node_addr(),
        }),
    )
    .await;
}

/// Announces inventory (block hashes or transaction ids) to a peer.
pub async fn send_inv(ctx: &NodeContext, addr_to: &SocketAddr, op_type: OpType, items: &[Vec<u8>]) {
    send_data(
        ctx,
        addr_to,
        Message::Inv(InvPayload {
            addr_from: ctx.node_addr(),
            op_type,
            items: items.to_vec(),
        }),
    )
    .await;
}

pub async fn send_get_data(ctx: &NodeContext, addr_to: &SocketAddr, op_type: OpType, id: &[u8]) {
    send_data(
        ctx,
        addr_to,
        Message::GetData(GetDataPayload {
            addr_from: ctx.node_addr(),
            op_type,
            id: id.to_vec(),
        }),
    )
    .await;
}

pub async fn send_block(ctx: &NodeContext, addr_to: &SocketAddr, block: &Block) {
    let block_bytes = match block.serialize() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Block serialization failed: {}", e);
            return;
        }
    };
    send_data(
        ctx,
        addr_to,
        Message::Block(BlockPayload {
            addr_from: ctx.node_addr(),
            block: block_bytes,
        }),
    )
    .await;
}

pub async fn send_tx(ctx: &NodeContext, addr_to: &SocketAddr, tx: &Transaction) {
    let tx_bytes = match tx.serialize() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Transaction serialization failed: {}", e);
            return;
        }
    };
    send_data(
        ctx,
        addr_to,
        Message::Tx(TxPayload {
            addr_from: ctx.node_addr(),
            transaction: tx_bytes,
        }),
    )
    .await;
}

async fn send_data(ctx: &NodeContext, addr_to: &SocketAddr, msg: Message) {
    debug!("Sending {} to {}", msg.command(), addr_to);
    let frame = match msg.to_frame() {
        Ok(frame) => frame,
        Err(e) => {
            error!("Failed to frame {} message: {}", msg.command(), e);
            return;
        }
    };

    let mut stream = match TcpStream::connect_timeout(addr_to, TCP_TIMEOUT) {
        Ok(stream) => stream,
        Err(e) => {
            error!("Peer {} is not available ({}), dropping it", addr_to, e);
            ctx.evict_peer(addr_to);
            return;
        }
    };
    let _ = stream.set_write_timeout(Some(TCP_TIMEOUT));

    if let Err(e) = stream.write_all(&frame).and_then(|_| stream.flush()) {
        error!("Failed to send {} to {}: {}", msg.command(), addr_to, e);
    }
}
