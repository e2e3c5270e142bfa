//! TCP server and the gossip state machine.
//!
//! The accept loop spawns one task per connection; a handler reads exactly
//! one framed message, dispatches it, and closes. Handler failures are
//! logged and terminate only that connection.

use crate::config::CENTRAL_NODE;
use crate::core::block::Block;
use crate::core::proof_of_work::ProofOfWork;
use crate::core::transaction::Transaction;
use crate::error::{CoinError, Result};
use crate::network::message::{
    AddrPayload, BlockPayload, GetBlocksPayload, GetDataPayload, InvPayload, Message, OpType,
    TxPayload, VersionPayload,
};
use crate::network::operations::{
    TCP_TIMEOUT, send_block, send_get_blocks, send_get_data, send_inv, send_tx, send_version,
};
use crate::node::context::NodeContext;
use crate::node::miner::{mine_pending_transactions, should_trigger_mining};
use crate::node::memory_pool::txid_hex;
use crate::store::UTXOSet;
use std::io::Read;
use std::net::{Shutdown, TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

pub struct Server {
    ctx: NodeContext,
}

impl Server {
    pub fn new(ctx: NodeContext) -> Server {
        Server { ctx }
    }

    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.ctx.node_addr())
            .map_err(|e| CoinError::ProtocolError(format!("bind failed: {}", e)))?;
        info!("Node listening on {}", self.ctx.node_addr());

        // Everyone but the seed introduces itself to the seed on boot; the
        // version exchange drives the initial chain sync.
        if !self.ctx.is_seed_node() {
            let best_height = self.ctx.blockchain().get_best_height().await?;
            send_version(&self.ctx, &CENTRAL_NODE, best_height).await;
        }

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let ctx = self.ctx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = process_stream(ctx, stream).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
        Ok(())
    }
}

/// Reads the connection's single message and dispatches it.
pub async fn process_stream(ctx: NodeContext, mut stream: TcpStream) -> Result<()> {
    let peer_addr = stream
        .peer_addr()
        .map_err(|e| CoinError::ProtocolError(e.to_string()))?;
    let _ = stream.set_read_timeout(Some(TCP_TIMEOUT));

    let mut request = vec![];
    stream
        .read_to_end(&mut request)
        .map_err(|e| CoinError::ProtocolError(format!("read from {} failed: {}", peer_addr, e)))?;
    let msg = Message::from_frame(request.as_slice())?;
    debug!("Received {} command from {}", msg.command(), peer_addr);

    let result = process_message(&ctx, msg).await;
    let _ = stream.shutdown(Shutdown::Both);
    result
}

pub async fn process_message(ctx: &NodeContext, msg: Message) -> Result<()> {
    match msg {
        Message::Version(payload) => handle_version(ctx, payload).await,
        Message::Addr(payload) => handle_addr(ctx, payload).await,
        Message::GetBlocks(payload) => handle_get_blocks(ctx, payload).await,
        Message::Inv(payload) => handle_inv(ctx, payload).await,
        Message::GetData(payload) => handle_get_data(ctx, payload).await,
        Message::Block(payload) => handle_block(ctx, payload).await,
        Message::Tx(payload) => handle_tx(ctx, payload).await,
    }
}

/// Height handshake: the shorter side asks for blocks, the taller side
/// answers with its own version. Either way the sender becomes a known
/// peer.
async fn handle_version(ctx: &NodeContext, payload: VersionPayload) -> Result<()> {
    debug!(
        "version = {}, best_height = {}",
        payload.version, payload.best_height
    );
    let my_best_height = ctx.blockchain().get_best_height().await?;
    if my_best_height < payload.best_height {
        send_get_blocks(ctx, &payload.addr_from).await;
    } else if my_best_height > payload.best_height {
        send_version(ctx, &payload.addr_from, my_best_height).await;
    }

    if !ctx.peer_is_known(&payload.addr_from) {
        ctx.add_peer(payload.addr_from);
    }
    Ok(())
}

/// Merges the announced peers, then asks every peer for its blocks.
async fn handle_addr(ctx: &NodeContext, payload: AddrPayload) -> Result<()> {
    ctx.add_peers(payload.addr_list.as_slice());
    info!("There are {} known nodes now", ctx.peers().len());
    for peer in ctx.other_peers() {
        send_get_blocks(ctx, &peer).await;
    }
    Ok(())
}

async fn handle_get_blocks(ctx: &NodeContext, payload: GetBlocksPayload) -> Result<()> {
    let blocks = ctx.blockchain().get_block_hashes().await?;
    send_inv(ctx, &payload.addr_from, OpType::Block, blocks.as_slice()).await;
    Ok(())
}

/// Remembers announced blocks and requests the first; requests an announced
/// transaction unless it is already pending.
async fn handle_inv(ctx: &NodeContext, payload: InvPayload) -> Result<()> {
    debug!(
        "Received inventory with {} {:?} items",
        payload.items.len(),
        payload.op_type
    );
    match payload.op_type {
        OpType::Block => {
            let first = payload
                .items
                .first()
                .cloned()
                .ok_or_else(|| CoinError::ProtocolError("empty block inventory".to_string()))?;
            ctx.transit_add_blocks(payload.items.as_slice());
            send_get_data(ctx, &payload.addr_from, OpType::Block, first.as_slice()).await;
            ctx.transit_remove(first.as_slice());
        }
        OpType::Tx => {
            let txid = payload
                .items
                .first()
                .ok_or_else(|| CoinError::ProtocolError("empty tx inventory".to_string()))?;
            if !ctx.mempool_contains(&txid_hex(txid)) {
                send_get_data(ctx, &payload.addr_from, OpType::Tx, txid.as_slice()).await;
            }
        }
    }
    Ok(())
}

async fn handle_get_data(ctx: &NodeContext, payload: GetDataPayload) -> Result<()> {
    match payload.op_type {
        OpType::Block => {
            if let Some(block) = ctx.blockchain().get_block(payload.id.as_slice()).await? {
                send_block(ctx, &payload.addr_from, &block).await;
            }
        }
        OpType::Tx => {
            if let Some(tx) = ctx.mempool_get(&txid_hex(payload.id.as_slice())) {
                send_tx(ctx, &payload.addr_from, &tx).await;
            } else {
                debug!(
                    "Requested transaction {} is not pending, most likely already mined",
                    txid_hex(payload.id.as_slice())
                );
            }
        }
    }
    Ok(())
}

/// Rejects a received block unless its proof of work holds and every
/// resolvable transaction verifies. A referenced transaction that is not
/// locally stored yet is tolerated: during tip-first sync the history
/// arrives after the blocks spending from it.
async fn validate_incoming_block(ctx: &NodeContext, block: &Block) -> Result<()> {
    if !ProofOfWork::validate(block)? {
        return Err(CoinError::InvalidBlock(format!(
            "proof of work check failed for {}",
            block.get_hash_hex()
        )));
    }
    for tx in block.get_transactions() {
        match ctx.blockchain().verify_transaction(tx).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "Block {} carries invalid transaction {}",
                    block.get_hash_hex(),
                    tx.get_tx_id_hex()
                );
                return Err(CoinError::InvalidSignature);
            }
            Err(CoinError::TransactionNotFound(txid)) => {
                debug!(
                    "Block {} references transaction {} not in the local store yet",
                    block.get_hash_hex(),
                    txid
                );
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Appends a received block, then either requests the next block in
/// transit or, once the sync batch is drained, rebuilds the chainstate.
async fn handle_block(ctx: &NodeContext, payload: BlockPayload) -> Result<()> {
    let block = Block::deserialize(payload.block.as_slice())?;
    validate_incoming_block(ctx, &block).await?;

    ctx.blockchain().add_block(&block).await?;
    info!("Added block {}", block.get_hash_hex());

    // Whatever this block mined is no longer pending here either.
    for tx in block.get_transactions() {
        ctx.mempool_remove(&tx.get_tx_id_hex());
    }

    if let Some(next) = ctx.transit_first() {
        send_get_data(ctx, &payload.addr_from, OpType::Block, next.as_slice()).await;
        ctx.transit_remove(next.as_slice());
    } else {
        UTXOSet::new(ctx.blockchain().clone()).reindex().await?;
    }
    Ok(())
}

/// Admits a transaction to the mempool. The seed floods the announcement to
/// every other peer; a miner starts mining once enough transactions are
/// pending.
async fn handle_tx(ctx: &NodeContext, payload: TxPayload) -> Result<()> {
    let tx = Transaction::deserialize(payload.transaction.as_slice())?;
    if ctx.mempool_contains_transaction(&tx) {
        debug!("Transaction {} is already pending", tx.get_tx_id_hex());
        return Ok(());
    }

    info!("Transaction {} entered the mempool", tx.get_tx_id_hex());
    let txid = tx.get_id_bytes();
    ctx.mempool_add(tx);

    if ctx.is_seed_node() {
        for peer in ctx.other_peers() {
            if peer != payload.addr_from {
                send_inv(ctx, &peer, OpType::Tx, &[txid.clone()]).await;
            }
        }
    } else if should_trigger_mining(ctx) {
        mine_pending_transactions(ctx).await?;
    }
    Ok(())
}
