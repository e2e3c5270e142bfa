//! CLI-level checks driving the compiled binary against a throwaway data
//! directory.

use assert_cmd::Command;
use std::path::Path;

fn powcoin(dir: &Path, node_id: &str) -> Command {
    let mut cmd = Command::cargo_bin("powcoin").expect("binary not built");
    cmd.env("NODE_ID", node_id)
        .env("TREE_DIR", dir.join("data"))
        .env("WALLET_FILE", dir.join("wallet.dat"))
        .current_dir(dir);
    cmd
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn create_wallet(dir: &Path) -> String {
    let output = powcoin(dir, "4000")
        .arg("createwallet")
        .output()
        .expect("createwallet failed to run");
    assert!(output.status.success(), "{}", stderr_of(&output));
    stdout_of(&output)
        .lines()
        .find_map(|line| line.strip_prefix("Your new address: "))
        .expect("no address in output")
        .trim()
        .to_string()
}

#[test]
fn node_id_is_required() {
    let dir = tempfile::tempdir().expect("temp dir creation failed");
    let output = Command::cargo_bin("powcoin")
        .expect("binary not built")
        .env_remove("NODE_ID")
        .current_dir(dir.path())
        .arg("printchain")
        .output()
        .expect("command failed to run");

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("NODE_ID"));
}

#[test]
fn getbalance_rejects_a_garbage_address() {
    let dir = tempfile::tempdir().expect("temp dir creation failed");
    let output = powcoin(dir.path(), "4000")
        .args(["getbalance", "--address", "not-an-address"])
        .output()
        .expect("command failed to run");

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("Invalid address"));
}

#[test]
fn wallet_and_chain_lifecycle() {
    let dir = tempfile::tempdir().expect("temp dir creation failed");
    let alice = create_wallet(dir.path());
    let bob = create_wallet(dir.path());

    // showwallet lists both wallets.
    let output = powcoin(dir.path(), "4000")
        .arg("showwallet")
        .output()
        .expect("showwallet failed to run");
    assert!(output.status.success());
    let listing = stdout_of(&output);
    assert!(listing.contains(&alice));
    assert!(listing.contains(&bob));
    assert!(listing.contains("Public key hash:"));

    // Genesis pays Alice the subsidy.
    let output = powcoin(dir.path(), "4000")
        .args(["createblockchain", "--address", alice.as_str()])
        .output()
        .expect("createblockchain failed to run");
    assert!(output.status.success(), "{}", stderr_of(&output));

    let output = powcoin(dir.path(), "4000")
        .args(["getbalance", "--address", alice.as_str()])
        .output()
        .expect("getbalance failed to run");
    assert!(output.status.success());
    assert!(stdout_of(&output).contains(&format!("Balance of {}: 50", alice)));

    // Creating the chain twice is an error.
    let output = powcoin(dir.path(), "4000")
        .args(["createblockchain", "--address", alice.as_str()])
        .output()
        .expect("createblockchain failed to run");
    assert!(!output.status.success());

    // A locally mined transfer moves 30 to Bob and rewards Alice again.
    let output = powcoin(dir.path(), "4000")
        .args([
            "send", "--from", alice.as_str(), "--to", bob.as_str(), "--amount", "30", "--mine",
        ])
        .output()
        .expect("send failed to run");
    assert!(output.status.success(), "{}", stderr_of(&output));

    let output = powcoin(dir.path(), "4000")
        .args(["getbalance", "--address", alice.as_str()])
        .output()
        .expect("getbalance failed to run");
    assert!(stdout_of(&output).contains(&format!("Balance of {}: 70", alice)));

    let output = powcoin(dir.path(), "4000")
        .args(["getbalance", "--address", bob.as_str()])
        .output()
        .expect("getbalance failed to run");
    assert!(stdout_of(&output).contains(&format!("Balance of {}: 30", bob)));

    // Overspending fails without touching the chain.
    let output = powcoin(dir.path(), "4000")
        .args([
            "send", "--from", bob.as_str(), "--to", alice.as_str(), "--amount", "1000", "--mine",
        ])
        .output()
        .expect("send failed to run");
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("Not enough funds"));

    // The printed chain shows both blocks with valid proof of work.
    let output = powcoin(dir.path(), "4000")
        .arg("printchain")
        .output()
        .expect("printchain failed to run");
    assert!(output.status.success());
    let chain_dump = stdout_of(&output);
    assert_eq!(chain_dump.matches("Block ").count(), 2);
    assert_eq!(chain_dump.matches("PoW: true").count(), 2);
    assert!(!chain_dump.contains("PoW: false"));
}
