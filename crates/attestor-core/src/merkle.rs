//! Sorted-pair Keccak Merkle trees.
//!
//! Leaves are deduplicated and sorted before the tree is built, and every
//! internal node hashes its two children in ascending order. A proof is
//! therefore just the list of sibling hashes; verifiers never need to know
//! whether a node was a left or a right child.
//!
//! The tree is stored flat with binary heap indexing: the root sits at
//! index 0, the children of `i` at `2i + 1` and `2i + 2`, and the `n`
//! leaves fill the last `n` slots.

use std::str::FromStr;

use alloy_primitives::{Keccak256, B256};

use crate::error::{AttestationError, Result};

/// Merkle tree over a set of 32-byte leaf hashes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerkleTree {
    nodes: Vec<B256>,
    leaf_count: usize,
}

impl MerkleTree {
    /// Build a tree from leaf hashes. Duplicates are dropped.
    pub fn build(leaves: impl IntoIterator<Item = B256>) -> Self {
        let mut leaves: Vec<B256> = leaves.into_iter().collect();
        leaves.sort_unstable();
        leaves.dedup();

        let n = leaves.len();
        if n == 0 {
            return Self::default();
        }

        let mut nodes = vec![B256::ZERO; n - 1];
        nodes.extend(leaves);
        for i in (0..n - 1).rev() {
            nodes[i] = sorted_hash(&nodes[2 * i + 1], &nodes[2 * i + 2]);
        }

        Self { nodes, leaf_count: n }
    }

    /// Build a tree from `0x`-prefixed hex leaf hashes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHash` for any string that is not a 32-byte hex value.
    pub fn from_hex_leaves<S: AsRef<str>>(leaves: &[S]) -> Result<Self> {
        let parsed = leaves
            .iter()
            .map(|leaf| {
                let leaf = leaf.as_ref();
                B256::from_str(leaf)
                    .map_err(|_| AttestationError::InvalidHash { value: leaf.to_string() })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::build(parsed))
    }

    /// Root hash; `None` for an empty tree.
    pub fn root(&self) -> Option<B256> {
        self.nodes.first().copied()
    }

    /// Number of distinct leaves.
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Leaves in sorted order.
    pub fn leaves(&self) -> &[B256] {
        &self.nodes[self.nodes.len() - self.leaf_count..]
    }

    /// Inclusion proof for the leaf at `index` in sorted order.
    pub fn proof(&self, index: usize) -> Option<Vec<B256>> {
        if index >= self.leaf_count {
            return None;
        }

        let mut proof = Vec::new();
        let mut pos = self.leaf_count - 1 + index;
        while pos > 0 {
            let sibling = if pos % 2 == 1 { pos + 1 } else { pos - 1 };
            proof.push(self.nodes[sibling]);
            pos = (pos - 1) / 2;
        }
        Some(proof)
    }

    /// Inclusion proof for a leaf given by its hash.
    pub fn proof_for_leaf(&self, leaf: &B256) -> Option<Vec<B256>> {
        let index = self.leaves().binary_search(leaf).ok()?;
        self.proof(index)
    }
}

/// Hash two nodes in ascending order.
pub fn sorted_hash(a: &B256, b: &B256) -> B256 {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Keccak256::new();
    hasher.update(low);
    hasher.update(high);
    hasher.finalize()
}

/// Check that `leaf` folds through `proof` to `root`.
pub fn verify(leaf: B256, proof: &[B256], root: B256) -> bool {
    proof.iter().fold(leaf, |node, sibling| sorted_hash(&node, sibling)) == root
}
