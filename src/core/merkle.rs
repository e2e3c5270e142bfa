//! Binary Merkle tree over transaction serializations.
//!
//! Leaves are the SHA-256 hashes of each item; parents hash the
//! concatenation of their children. A level with an odd node count
//! duplicates its last node before pairing.

use crate::util::sha256_digest;

pub struct MerkleTree {
    root: Vec<u8>,
}

impl MerkleTree {
    pub fn new(data: &[Vec<u8>]) -> MerkleTree {
        let mut nodes: Vec<Vec<u8>> = data.iter().map(|datum| sha256_digest(datum)).collect();
        if nodes.is_empty() {
            nodes.push(sha256_digest(&[]));
        }

        while nodes.len() > 1 {
            if nodes.len() % 2 != 0 {
                let last = nodes
                    .last()
                    .cloned()
                    .expect("non-empty level always has a last node");
                nodes.push(last);
            }
            nodes = nodes
                .chunks(2)
                .map(|pair| {
                    let mut concat = pair[0].clone();
                    concat.extend_from_slice(&pair[1]);
                    sha256_digest(&concat)
                })
                .collect();
        }

        MerkleTree {
            root: nodes.swap_remove(0),
        }
    }

    pub fn get_root(&self) -> &[u8] {
        self.root.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_leaf_root_is_leaf_hash() {
        let data = vec![b"only".to_vec()];
        let tree = MerkleTree::new(&data);
        assert_eq!(tree.get_root(), sha256_digest(b"only").as_slice());
    }

    #[test]
    fn test_two_leaves() {
        let data = vec![b"left".to_vec(), b"right".to_vec()];
        let tree = MerkleTree::new(&data);

        let mut concat = sha256_digest(b"left");
        concat.extend(sha256_digest(b"right"));
        assert_eq!(tree.get_root(), sha256_digest(&concat).as_slice());
    }

    #[test]
    fn test_odd_count_duplicates_last() {
        let three = vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()];
        let four = vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"c".to_vec()];
        assert_eq!(
            MerkleTree::new(&three).get_root(),
            MerkleTree::new(&four).get_root()
        );
    }

    #[test]
    fn test_root_changes_with_content() {
        let data = vec![b"a".to_vec(), b"b".to_vec()];
        let tampered = vec![b"a".to_vec(), b"B".to_vec()];
        assert_ne!(
            MerkleTree::new(&data).get_root(),
            MerkleTree::new(&tampered).get_root()
        );
    }

    #[test]
    fn test_root_is_order_sensitive() {
        let ab = vec![b"a".to_vec(), b"b".to_vec()];
        let ba = vec![b"b".to_vec(), b"a".to_vec()];
        assert_ne!(
            MerkleTree::new(&ab).get_root(),
            MerkleTree::new(&ba).get_root()
        );
    }
}
