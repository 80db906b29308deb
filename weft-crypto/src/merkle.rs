use borsh::{BorshDeserialize, BorshSerialize};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use weft_types::error::WeftError;
use weft_types::primitives::Hash;

use crate::hash::sha384_multi;

/// Leaf count above which leaf hashing is spread across the rayon pool.
const PARALLEL_LEAF_THRESHOLD: usize = 1024;

/// Which side of the running hash a proof sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// One step of a Merkle inclusion proof.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ProofStep {
    #[serde(with = "weft_types::primitives::serde_hash")]
    pub sibling: Hash,
    pub side: Side,
}

/// An inclusion proof for one leaf of a [`MerkleTree`].
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: u64,
    /// Siblings from the leaf level up to just below the root.
    pub steps: Vec<ProofStep>,
}

/// Binary Merkle tree over an ordered list of leaves.
///
/// Leaves and internal nodes are hashed under distinct one-byte prefixes. A
/// node without a sibling is carried up unchanged rather than paired with a
/// copy of itself, so no two distinct leaf lists share a root.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// `levels[0]` holds leaf hashes; the last level holds the root.
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Build the tree over `leaves` in the order given.
    pub fn from_leaves<L: AsRef<[u8]> + Sync>(leaves: &[L]) -> Self {
        let leaf_hashes: Vec<Hash> = if leaves.len() >= PARALLEL_LEAF_THRESHOLD {
            leaves.par_iter().map(|l| hash_leaf(l.as_ref())).collect()
        } else {
            leaves.iter().map(|l| hash_leaf(l.as_ref())).collect()
        };

        let mut levels = vec![leaf_hashes];
        while levels.last().map_or(false, |level| level.len() > 1) {
            let current = &levels[levels.len() - 1];
            let next: Vec<Hash> = current
                .chunks(2)
                .map(|pair| {
                    if pair.len() == 2 {
                        hash_internal(&pair[0], &pair[1])
                    } else {
                        pair[0]
                    }
                })
                .collect();
            levels.push(next);
        }
        Self { levels }
    }

    /// The root hash, or `None` for a tree with no leaves.
    pub fn root(&self) -> Option<Hash> {
        self.levels.last().and_then(|level| level.first().copied())
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Build an inclusion proof for the leaf at `index`.
    pub fn prove(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count() {
            return None;
        }
        let mut steps = Vec::new();
        let mut i = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = i ^ 1;
            if let Some(hash) = level.get(sibling) {
                let side = if i % 2 == 1 { Side::Left } else { Side::Right };
                steps.push(ProofStep {
                    sibling: *hash,
                    side,
                });
            }
            i /= 2;
        }
        Some(MerkleProof {
            leaf_index: index as u64,
            steps,
        })
    }

    /// Verify that `leaf` is included under `root`.
    pub fn verify_proof(root: &Hash, leaf: &[u8], proof: &MerkleProof) -> Result<(), WeftError> {
        let mut current = hash_leaf(leaf);
        for step in &proof.steps {
            current = match step.side {
                Side::Left => hash_internal(&step.sibling, &current),
                Side::Right => hash_internal(&current, &step.sibling),
            };
        }
        if current == *root {
            Ok(())
        } else {
            Err(WeftError::MerkleProofInvalid)
        }
    }
}

// ─── Hash helpers ────────────────────────────────────────────────────────────

const LEAF_PREFIX: [u8; 1] = [0x00];
const INTERNAL_PREFIX: [u8; 1] = [0x01];

pub fn hash_leaf(data: &[u8]) -> Hash {
    sha384_multi(&[&LEAF_PREFIX[..], data])
}

pub fn hash_internal(left: &Hash, right: &Hash) -> Hash {
    sha384_multi(&[&INTERNAL_PREFIX[..], &left[..], &right[..]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("TX{:04}:0", i)).collect()
    }

    #[test]
    fn test_empty_tree_has_no_root() {
        let tree = MerkleTree::from_leaves::<String>(&[]);
        assert_eq!(tree.root(), None);
        assert_eq!(tree.leaf_count(), 0);
        assert!(tree.prove(0).is_none());
    }

    #[test]
    fn test_single_leaf_root_is_leaf_hash() {
        let tree = MerkleTree::from_leaves(&["TX0001:0"]);
        assert_eq!(tree.root(), Some(hash_leaf(b"TX0001:0")));
    }

    #[test]
    fn test_two_leaves() {
        let tree = MerkleTree::from_leaves(&["a", "b"]);
        let expected = hash_internal(&hash_leaf(b"a"), &hash_leaf(b"b"));
        assert_eq!(tree.root(), Some(expected));
    }

    #[test]
    fn test_odd_leaf_is_carried() {
        let tree = MerkleTree::from_leaves(&["a", "b", "c"]);
        let ab = hash_internal(&hash_leaf(b"a"), &hash_leaf(b"b"));
        let expected = hash_internal(&ab, &hash_leaf(b"c"));
        assert_eq!(tree.root(), Some(expected));
    }

    #[test]
    fn test_duplicated_tail_changes_root() {
        let three = MerkleTree::from_leaves(&["a", "b", "c"]);
        let four = MerkleTree::from_leaves(&["a", "b", "c", "c"]);
        assert_ne!(three.root(), four.root());
    }

    #[test]
    fn test_leaf_hash_differs_from_internal() {
        let l = hash_leaf(b"x");
        assert_ne!(hash_internal(&l, &l), hash_leaf(&[l, l].concat()));
    }

    #[test]
    fn test_proofs_verify_for_every_leaf() {
        for n in 1..12 {
            let leaves = keys(n);
            let tree = MerkleTree::from_leaves(&leaves);
            let root = tree.root().unwrap();
            for (i, leaf) in leaves.iter().enumerate() {
                let proof = tree.prove(i).unwrap();
                assert!(
                    MerkleTree::verify_proof(&root, leaf.as_bytes(), &proof).is_ok(),
                    "leaf {} of {} failed",
                    i,
                    n
                );
            }
        }
    }

    #[test]
    fn test_proof_rejects_wrong_leaf() {
        let leaves = keys(5);
        let tree = MerkleTree::from_leaves(&leaves);
        let root = tree.root().unwrap();
        let proof = tree.prove(2).unwrap();
        assert_eq!(
            MerkleTree::verify_proof(&root, b"TX9999:0", &proof),
            Err(WeftError::MerkleProofInvalid)
        );
    }

    #[test]
    fn test_proof_rejects_wrong_root() {
        let leaves = keys(4);
        let tree = MerkleTree::from_leaves(&leaves);
        let proof = tree.prove(1).unwrap();
        assert!(MerkleTree::verify_proof(&[7u8; 48], leaves[1].as_bytes(), &proof).is_err());
    }

    #[test]
    fn test_parallel_and_sequential_paths_agree() {
        let leaves = keys(PARALLEL_LEAF_THRESHOLD + 3);
        let tree = MerkleTree::from_leaves(&leaves);
        let sequential: Vec<Hash> = leaves.iter().map(|l| hash_leaf(l.as_bytes())).collect();
        assert_eq!(tree.levels[0], sequential);
    }

    proptest! {
        #[test]
        fn prop_every_leaf_proves(
            leaves in proptest::collection::vec("[a-z]{1,6}:[0-9]", 1..40),
            pick in any::<usize>(),
        ) {
            let tree = MerkleTree::from_leaves(&leaves);
            let root = tree.root().unwrap();
            let index = pick % leaves.len();
            let proof = tree.prove(index).unwrap();
            prop_assert!(MerkleTree::verify_proof(&root, leaves[index].as_bytes(), &proof).is_ok());
        }
    }
}
