use clap::{Parser, Subcommand};
use data_encoding::HEXLOWER;
use powcoin::node::NodeContext;
use powcoin::{
    Block, Blockchain, CENTRAL_NODE, CoinError, GLOBAL_CONFIG, ProofOfWork, Result, Server,
    Transaction, UTXOSet, Wallets, convert_address, hash_pub_key, pub_key_hash_from_address,
    send_tx, validate_address,
};
use std::env;
use std::process;
use tracing::info;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt,
    prelude::*,
};

#[derive(Debug, Parser)]
#[command(name = "powcoin")]
struct Opt {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(name = "createwallet", about = "Create a new wallet")]
    CreateWallet,
    #[command(name = "showwallet", about = "Dump every local wallet")]
    ShowWallet,
    #[command(name = "getbalance", about = "Sum the unspent outputs of an address")]
    GetBalance {
        #[arg(long)]
        address: String,
    },
    #[command(
        name = "createblockchain",
        about = "Create a blockchain with a genesis reward to the address"
    )]
    CreateBlockchain {
        #[arg(long)]
        address: String,
    },
    #[command(name = "printchain", about = "Print every block of the best chain")]
    PrintChain,
    #[command(name = "send", about = "Transfer coins between addresses")]
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: i64,
        #[arg(long, help = "Mine the transaction locally instead of gossiping it")]
        mine: bool,
    },
    #[command(name = "startnode", about = "Run the node server")]
    StartNode {
        #[arg(long, help = "Enable mining with rewards to this address")]
        miner: Option<String>,
    },
}

fn initialize_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(filter))
        .init();
}

fn create_wallet() -> Result<()> {
    let mut wallets = Wallets::new()?;
    let address = wallets.create_wallet()?;
    println!("Your new address: {}", address);
    Ok(())
}

fn show_wallet() -> Result<()> {
    let wallets = Wallets::new()?;
    for (address, wallet) in wallets.iter() {
        println!("Address: {}", address);
        println!("  Private key: {}", HEXLOWER.encode(wallet.get_pkcs8()));
        println!("  Public key: {}", HEXLOWER.encode(wallet.get_public_key()));
        println!(
            "  Public key hash: {}",
            HEXLOWER.encode(hash_pub_key(wallet.get_public_key()).as_slice())
        );
    }
    Ok(())
}

async fn get_balance(address: &str) -> Result<()> {
    let pub_key_hash = pub_key_hash_from_address(address)?;
    let blockchain = Blockchain::open_blockchain().await?;
    let utxo_set = UTXOSet::new(blockchain);
    let balance = utxo_set.get_balance(pub_key_hash.as_slice()).await?;
    println!("Balance of {}: {}", address, balance);
    Ok(())
}

async fn create_blockchain(address: &str) -> Result<()> {
    if !validate_address(address)? {
        return Err(CoinError::InvalidAddress(address.to_string()));
    }
    let blockchain = Blockchain::create_blockchain(address).await?;
    let utxo_set = UTXOSet::new(blockchain);
    utxo_set.reindex().await?;
    println!("Done!");
    Ok(())
}

fn print_transaction(tx: &Transaction) {
    println!("- Transaction {}", tx.get_tx_id_hex());
    for input in tx.get_vin() {
        let address = convert_address(hash_pub_key(input.get_pub_key()).as_slice());
        println!(
            "  -- Input txid = {}, vout = {}, from = {}",
            input.get_input_tx_id_hex(),
            input.get_vout(),
            address
        );
    }
    for output in tx.get_vout() {
        println!(
            "  -- Output value = {}, to = {}",
            output.get_value(),
            convert_address(output.get_pub_key_hash())
        );
    }
}

fn print_block(block: &Block) -> Result<()> {
    println!("Block {}", block.get_hash_hex());
    println!(
        "  Prev hash: {}",
        HEXLOWER.encode(block.get_prev_block_hash())
    );
    println!("  Height: {}", block.get_height());
    println!("  Timestamp: {}", block.get_timestamp());
    println!("  PoW: {}", ProofOfWork::validate(block)?);
    block.get_transactions().iter().for_each(print_transaction);
    Ok(())
}

async fn print_chain() -> Result<()> {
    let blockchain = Blockchain::open_blockchain().await?;
    let mut iterator = blockchain.iterator().await?;
    while let Some(block) = iterator.next() {
        print_block(&block)?;
    }
    Ok(())
}

async fn send(from: &str, to: &str, amount: i64, mine: bool) -> Result<()> {
    if !validate_address(from)? {
        return Err(CoinError::InvalidAddress(from.to_string()));
    }
    if !validate_address(to)? {
        return Err(CoinError::InvalidAddress(to.to_string()));
    }
    if amount <= 0 {
        return Err(CoinError::InvalidTransaction(
            "amount must be positive".to_string(),
        ));
    }

    let blockchain = Blockchain::open_blockchain().await?;
    let utxo_set = UTXOSet::new(blockchain.clone());
    let wallets = Wallets::new()?;
    let wallet = wallets
        .get_wallet(from)
        .ok_or_else(|| CoinError::WalletNotFound(from.to_string()))?;

    let tx = Transaction::new_utxo_transaction(wallet, from, to, amount, &utxo_set).await?;

    if mine {
        let coinbase = Transaction::new_coinbase_tx(from)?;
        let block = blockchain.mine_block(&[tx, coinbase]).await?;
        utxo_set.update(&block).await?;
        info!("Mined block {}", block.get_hash_hex());
    } else {
        let ctx = NodeContext::new(blockchain, GLOBAL_CONFIG.get_node_addr(), None);
        send_tx(&ctx, &CENTRAL_NODE, &tx).await;
    }
    println!("Success!");
    Ok(())
}

async fn start_node(miner: Option<String>) -> Result<()> {
    if let Some(mining_addr) = miner.as_deref() {
        if !validate_address(mining_addr)? {
            return Err(CoinError::InvalidAddress(mining_addr.to_string()));
        }
        info!("Mining is on, rewards go to {}", mining_addr);
    }

    let blockchain = Blockchain::open_blockchain().await?;
    let ctx = NodeContext::new(blockchain, GLOBAL_CONFIG.get_node_addr(), miner);
    Server::new(ctx).run().await
}

async fn process_command(command: Command) -> Result<()> {
    match command {
        Command::CreateWallet => create_wallet(),
        Command::ShowWallet => show_wallet(),
        Command::GetBalance { address } => get_balance(&address).await,
        Command::CreateBlockchain { address } => create_blockchain(&address).await,
        Command::PrintChain => print_chain().await,
        Command::Send {
            from,
            to,
            amount,
            mine,
        } => send(&from, &to, amount, mine).await,
        Command::StartNode { miner } => start_node(miner).await,
    }
}

#[tokio::main]
async fn main() {
    initialize_logging();

    if env::var("NODE_ID").is_err() {
        eprintln!("NODE_ID environment variable is not set");
        process::exit(1);
    }

    let opt = Opt::parse();
    if let Err(e) = process_command(opt.command).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
