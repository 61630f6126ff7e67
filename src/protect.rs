//! Encoded constant tables
//!
//! Every string the native code needs (string literals, but also the class names, member names,
//! and descriptors used to look things up through JNI) is stored in a per-class table instead of
//! appearing as a literal. Each entry is encoded as
//!
//! ```text
//! enc[j] = rotl8(plain[j] ^ k[j], (j + i) % 8)
//! ```
//!
//! where `i` is the entry index and `k` is a xorshift keystream seeded by a per-entry key. Entry
//! keys are drawn in order from a ChaCha8 generator seeded by the build seed and the class name,
//! so the same input produces the same tables on every platform and `rand` release.

use crate::jvm::class_file::{decode_modified_utf8, encode_modified_utf8};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// How much of the constant data is encoded
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protection {
    /// Plain literals
    None,
    /// String literals and lookup symbols
    #[default]
    Strings,
    /// Strings, symbols, and numeric constants loaded with `ldc`/`ldc2_w`
    Full,
}

impl Protection {
    pub fn encodes_strings(self) -> bool {
        self != Protection::None
    }

    pub fn encodes_numbers(self) -> bool {
        self == Protection::Full
    }
}

impl FromStr for Protection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Protection::None),
            "strings" => Ok(Protection::Strings),
            "full" => Ok(Protection::Full),
            other => Err(format!(
                "unknown protection {:?} (expected none, strings, or full)",
                other
            )),
        }
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protection::None => "none",
            Protection::Strings => "strings",
            Protection::Full => "full",
        })
    }
}

#[derive(Clone, Debug)]
struct Entry {
    plain: Vec<u8>,
    key: u64,
}

/// Per-class table of protected constants
#[derive(Clone, Debug)]
pub struct ProtectedPool {
    protection: Protection,
    keys: ChaCha8Rng,
    entries: Vec<Entry>,
    lookup: HashMap<Vec<u8>, usize>,
}

impl ProtectedPool {
    pub fn new(seed: u64, class_name: &str, protection: Protection) -> ProtectedPool {
        ProtectedPool {
            protection,
            keys: ChaCha8Rng::seed_from_u64(seed ^ name_hash(class_name)),
            entries: vec![],
            lookup: HashMap::new(),
        }
    }

    pub fn protection(&self) -> Protection {
        self.protection
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add an entry (or find the existing identical one)
    pub fn intern(&mut self, bytes: &[u8]) -> usize {
        if let Some(index) = self.lookup.get(bytes) {
            return *index;
        }
        let index = self.entries.len();
        let key = self.keys.gen::<u64>() | 1;
        self.entries.push(Entry {
            plain: bytes.to_vec(),
            key,
        });
        self.lookup.insert(bytes.to_vec(), index);
        index
    }

    /// Add a string, stored in the modified UTF-8 that JNI expects
    pub fn intern_str(&mut self, string: &str) -> usize {
        self.intern(&encode_modified_utf8(string))
    }

    pub fn plain(&self, index: usize) -> Option<&[u8]> {
        self.entries.get(index).map(|entry| entry.plain.as_slice())
    }

    pub fn key(&self, index: usize) -> Option<u64> {
        self.entries.get(index).map(|entry| entry.key)
    }

    pub fn encoded(&self, index: usize) -> Option<Vec<u8>> {
        let entry = self.entries.get(index)?;
        Some(encode(entry.key, index, &entry.plain))
    }

    /// Decode an entry from its encoded form
    pub fn decode(&self, index: usize) -> Option<Vec<u8>> {
        let entry = self.entries.get(index)?;
        Some(decode(entry.key, index, &encode(entry.key, index, &entry.plain)))
    }

    pub fn decode_str(&self, index: usize) -> Option<String> {
        decode_modified_utf8(&self.decode(index)?).ok()
    }
}

/// Keystream shared with the generated C++ (see `njb_keystream` in the support header)
pub fn keystream(key: u64) -> impl Iterator<Item = u8> {
    let mut state = key | 1;
    std::iter::repeat_with(move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 56) as u8
    })
}

pub fn encode(key: u64, index: usize, plain: &[u8]) -> Vec<u8> {
    plain
        .iter()
        .zip(keystream(key))
        .enumerate()
        .map(|(j, (byte, k))| (byte ^ k).rotate_left(((j + index) % 8) as u32))
        .collect()
}

pub fn decode(key: u64, index: usize, encoded: &[u8]) -> Vec<u8> {
    encoded
        .iter()
        .zip(keystream(key))
        .enumerate()
        .map(|(j, (byte, k))| byte.rotate_right(((j + index) % 8) as u32) ^ k)
        .collect()
}

/// FNV-1a, folding the class name into the seed
fn name_hash(name: &str) -> u64 {
    name.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
    })
}
