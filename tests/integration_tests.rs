//! End-to-end scenarios over the library: genesis, spending with local
//! mining, insufficient funds, and block synchronization between two nodes
//! driven through the message handlers.

use once_cell::sync::Lazy;
use powcoin::network::message::{BlockPayload, InvPayload, OpType};
use powcoin::network::{Message, process_message};
use powcoin::node::NodeContext;
use powcoin::{
    Blockchain, CoinError, ProofOfWork, SUBSIDY, Transaction, UTXOSet, Wallet, hash_pub_key,
};
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(Mutex::default);

/// Serializes tests that repoint TREE_DIR; parallel tests would otherwise
/// open each other's stores.
fn lock_env() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn point_store_at(dir: &tempfile::TempDir) {
    unsafe {
        std::env::set_var("TREE_DIR", dir.path());
    }
}

async fn balance_of(utxo_set: &UTXOSet, wallet: &Wallet) -> i64 {
    utxo_set
        .get_balance(hash_pub_key(wallet.get_public_key()).as_slice())
        .await
        .expect("balance failed")
}

#[tokio::test]
async fn genesis_pays_the_subsidy() {
    let _env = lock_env();
    let dir = tempfile::tempdir().expect("temp dir creation failed");
    point_store_at(&dir);

    let wallet = Wallet::new().expect("wallet creation failed");
    let blockchain = Blockchain::create_blockchain(&wallet.get_address())
        .await
        .expect("blockchain creation failed");
    let utxo_set = UTXOSet::new(blockchain.clone());
    utxo_set.reindex().await.expect("reindex failed");

    assert_eq!(
        blockchain
            .get_best_height()
            .await
            .expect("height lookup failed"),
        0
    );
    assert_eq!(balance_of(&utxo_set, &wallet).await, SUBSIDY);
}

#[tokio::test]
async fn local_spend_with_immediate_mining() {
    let _env = lock_env();
    let dir = tempfile::tempdir().expect("temp dir creation failed");
    point_store_at(&dir);

    let alice = Wallet::new().expect("wallet creation failed");
    let bob = Wallet::new().expect("wallet creation failed");
    let blockchain = Blockchain::create_blockchain(&alice.get_address())
        .await
        .expect("blockchain creation failed");
    let utxo_set = UTXOSet::new(blockchain.clone());
    utxo_set.reindex().await.expect("reindex failed");

    let tx = Transaction::new_utxo_transaction(
        &alice,
        &alice.get_address(),
        &bob.get_address(),
        30,
        &utxo_set,
    )
    .await
    .expect("transaction construction failed");
    let coinbase =
        Transaction::new_coinbase_tx(&alice.get_address()).expect("coinbase creation failed");
    let block = blockchain
        .mine_block(&[tx, coinbase])
        .await
        .expect("mining failed");
    utxo_set.update(&block).await.expect("update failed");

    assert_eq!(
        blockchain
            .get_best_height()
            .await
            .expect("height lookup failed"),
        1
    );
    // 20 change plus the fresh 50 coinbase for Alice, 30 for Bob.
    assert_eq!(balance_of(&utxo_set, &alice).await, 70);
    assert_eq!(balance_of(&utxo_set, &bob).await, 30);

    // Every persisted block still satisfies its proof of work, and spends
    // never exceed the value they consume.
    let mut iterator = blockchain.iterator().await.expect("iterator failed");
    while let Some(block) = iterator.next() {
        assert!(ProofOfWork::validate(&block).expect("validation failed"));
        for tx in block.get_transactions() {
            assert!(
                blockchain
                    .verify_transaction(tx)
                    .await
                    .expect("verification failed")
            );
        }
    }
}

#[tokio::test]
async fn insufficient_funds_leaves_the_chain_untouched() {
    let _env = lock_env();
    let dir = tempfile::tempdir().expect("temp dir creation failed");
    point_store_at(&dir);

    let alice = Wallet::new().expect("wallet creation failed");
    let bob = Wallet::new().expect("wallet creation failed");
    let blockchain = Blockchain::create_blockchain(&alice.get_address())
        .await
        .expect("blockchain creation failed");
    let utxo_set = UTXOSet::new(blockchain.clone());
    utxo_set.reindex().await.expect("reindex failed");

    let result = Transaction::new_utxo_transaction(
        &bob,
        &bob.get_address(),
        &alice.get_address(),
        1000,
        &utxo_set,
    )
    .await;
    assert!(matches!(result, Err(CoinError::NotEnoughFunds)));

    assert_eq!(
        blockchain
            .get_best_height()
            .await
            .expect("height lookup failed"),
        0
    );
    assert_eq!(balance_of(&utxo_set, &alice).await, SUBSIDY);
    assert_eq!(balance_of(&utxo_set, &bob).await, 0);
}

#[tokio::test]
async fn fresh_node_syncs_to_the_longer_chain() {
    let _env = lock_env();

    // Node one holds a four-block chain.
    let dir_one = tempfile::tempdir().expect("temp dir creation failed");
    point_store_at(&dir_one);
    let wallet_one = Wallet::new().expect("wallet creation failed");
    let chain_one = Blockchain::create_blockchain(&wallet_one.get_address())
        .await
        .expect("blockchain creation failed");
    for _ in 0..3 {
        let coinbase = Transaction::new_coinbase_tx(&wallet_one.get_address())
            .expect("coinbase creation failed");
        chain_one
            .mine_block(&[coinbase])
            .await
            .expect("mining failed");
    }
    let hashes_one = chain_one
        .get_block_hashes()
        .await
        .expect("hash walk failed");
    assert_eq!(hashes_one.len(), 4);

    // Node two starts from its own genesis.
    let dir_two = tempfile::tempdir().expect("temp dir creation failed");
    point_store_at(&dir_two);
    let wallet_two = Wallet::new().expect("wallet creation failed");
    let chain_two = Blockchain::create_blockchain(&wallet_two.get_address())
        .await
        .expect("blockchain creation failed");
    let ctx_two = NodeContext::new(
        chain_two,
        "127.0.0.1:3001".parse().expect("address parse failed"),
        None,
    );

    // Node one's inventory announcement, then the blocks tip-first, exactly
    // as the gossip exchange delivers them. The announcing address is not
    // listening; the outgoing getdata dials simply fail.
    let node_one_addr: SocketAddr = "127.0.0.1:3999".parse().expect("address parse failed");
    process_message(
        &ctx_two,
        Message::Inv(InvPayload {
            addr_from: node_one_addr,
            op_type: OpType::Block,
            items: hashes_one.clone(),
        }),
    )
    .await
    .expect("inv handling failed");

    for hash in &hashes_one {
        let block = chain_one
            .get_block(hash.as_slice())
            .await
            .expect("block lookup failed")
            .expect("announced block missing");
        process_message(
            &ctx_two,
            Message::Block(BlockPayload {
                addr_from: node_one_addr,
                block: block.serialize().expect("serialization failed"),
            }),
        )
        .await
        .expect("block handling failed");
    }

    // Node two converged on node one's tip and best chain.
    assert_eq!(
        ctx_two
            .blockchain()
            .get_best_height()
            .await
            .expect("height lookup failed"),
        3
    );
    assert_eq!(
        ctx_two.blockchain().get_tip_hash().await,
        chain_one.get_tip_hash().await
    );
    assert_eq!(
        ctx_two
            .blockchain()
            .get_block_hashes()
            .await
            .expect("hash walk failed"),
        hashes_one
    );

    // The sync batch drained, so the chainstate was rebuilt: node one's
    // wallet owns all four subsidies on node two's view of the chain.
    let utxo_two = UTXOSet::new(ctx_two.blockchain().clone());
    assert_eq!(balance_of(&utxo_two, &wallet_one).await, 4 * SUBSIDY);
}
