// src/bloom.rs

//! Fixed-width Bloom fingerprints over interned names.
//!
//! A commit's fingerprint is the union of the fingerprints of every file
//! name it contains. Before scanning a parent commit for a matching file,
//! the matcher checks whether the name's fingerprint is a subset of the
//! parent's; a failed subset test proves the name is absent. False
//! positives only cost a scan, never a wrong answer.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Number of 64-bit words in a fingerprint (512 bits total).
const BLOOM_WORDS: usize = 8;

/// Bits set per name.
const BLOOM_HASHES: u64 = 4;

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Bloom {
    bits: [u64; BLOOM_WORDS],
}

impl Bloom {
    pub const EMPTY: Bloom = Bloom {
        bits: [0; BLOOM_WORDS],
    };

    /// Fingerprint a single name, using double hashing to derive the bit
    /// positions (h1 + i*h2, the same scheme as the chunk-store filter).
    pub fn of_name(name: &str) -> Bloom {
        let mut hasher1 = DefaultHasher::new();
        name.hash(&mut hasher1);
        let h1 = hasher1.finish();

        let mut hasher2 = DefaultHasher::new();
        (name, 0x517cc1b727220a95u64).hash(&mut hasher2);
        let h2 = hasher2.finish();

        let mut bloom = Bloom::EMPTY;
        let nbits = (BLOOM_WORDS * 64) as u64;
        for i in 0..BLOOM_HASHES {
            let bit = h1.wrapping_add(i.wrapping_mul(h2)) % nbits;
            bloom.bits[(bit / 64) as usize] |= 1 << (bit % 64);
        }
        bloom
    }

    /// Fold another fingerprint into this one.
    pub fn union_with(&mut self, other: &Bloom) {
        for (word, extra) in self.bits.iter_mut().zip(other.bits.iter()) {
            *word |= extra;
        }
    }

    /// True when every bit of `other` is set here. A `false` result is a
    /// definite "not present"; `true` may be a false positive.
    pub fn contains(&self, other: &Bloom) -> bool {
        self.bits
            .iter()
            .zip(other.bits.iter())
            .all(|(have, want)| want & !have == 0)
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&word| word == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_contains_members() {
        let a = Bloom::of_name("src/alpha.c,v");
        let b = Bloom::of_name("src/beta.c,v");
        let mut both = Bloom::EMPTY;
        both.union_with(&a);
        both.union_with(&b);

        assert!(both.contains(&a));
        assert!(both.contains(&b));
    }

    #[test]
    fn test_subset_test_rejects_outsiders() {
        let mut commit = Bloom::EMPTY;
        for name in ["Makefile,v", "README,v", "src/main.c,v"] {
            commit.union_with(&Bloom::of_name(name));
        }

        // With 512 bits and three names, a random outsider colliding on
        // all of its bits is vanishingly unlikely.
        let mut rejected = 0;
        for i in 0..100 {
            let probe = Bloom::of_name(&format!("other/file{}.c,v", i));
            if !commit.contains(&probe) {
                rejected += 1;
            }
        }
        assert!(rejected > 90, "only {} of 100 outsiders rejected", rejected);
    }

    #[test]
    fn test_empty_is_subset_of_everything() {
        let commit = Bloom::of_name("x,v");
        assert!(commit.contains(&Bloom::EMPTY));
        assert!(Bloom::EMPTY.is_empty());
        assert!(!commit.is_empty());
    }
}
