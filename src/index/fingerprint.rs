//! Signature fingerprints: four 32-bit words, three of Bloom filter bits over
//! the type atoms of a signature and one atom count.
//!
//! Every concrete atom sets six bits derived from two integer hashes. A query
//! can only match an item whose filter contains all of the query's bits, so the
//! executor rejects most items without running unification. The fourth word
//! holds the number of distinct atoms and doubles as a ranking distance.
//!
//! Generic parameters are counted but never hashed: a query generic may bind
//! to any signature generic, so hashing either side would reject valid matches.

use super::item::{FunctionType, TypeRef};
use super::names::SpecialTypes;
use ahash::AHashSet;

/// Bloom words plus distinct-atom count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeFingerprint([u32; 4]);

impl TypeFingerprint {
    pub const EMPTY: Self = Self([0; 4]);

    pub const fn atom_count(&self) -> u32 {
        self.0[3]
    }

    /// Returns the item's atom count when it may contain the query, `None`
    /// when some query bit is missing.
    pub fn compare(item: &Self, query: &Self) -> Option<u32> {
        let missing = item.0[..3]
            .iter()
            .zip(&query.0[..3])
            .any(|(&f, &q)| (f & q) ^ q != 0);
        (!missing).then_some(item.0[3])
    }
}

const fn hash_a(key: u32) -> u32 {
    let mut k = key.wrapping_add(0x7ed5_5d16).wrapping_add(key << 12);
    k = (k ^ 0xc761_c23c) ^ (k >> 19);
    k = k.wrapping_add(0x1656_67b1).wrapping_add(k << 5);
    k = k.wrapping_add(0xd3a2_646c) ^ (k << 9);
    k = k.wrapping_add(0xfd70_46c5).wrapping_add(k << 3);
    (k ^ 0xb55a_4f09) ^ (k >> 16)
}

const fn hash_b(key: u32) -> u32 {
    let mut k = (!key).wrapping_add(key << 15);
    k ^= k >> 12;
    k = k.wrapping_add(k << 2);
    k ^= k >> 4;
    k = k.wrapping_mul(2057);
    k ^ (((k as i32) >> 16) as u32)
}

const fn bit(hash: u32) -> u32 {
    1 << (hash & 31)
}

/// Accumulates atoms into a [`TypeFingerprint`].
#[derive(Debug)]
pub struct FingerprintBuilder<'a> {
    special: &'a SpecialTypes,
    words: [u32; 3],
    atoms: AHashSet<TypeRef>,
}

impl<'a> FingerprintBuilder<'a> {
    pub fn new(special: &'a SpecialTypes) -> Self {
        Self {
            special,
            words: [0; 3],
            atoms: AHashSet::new(),
        }
    }

    pub fn add_atom(&mut self, id: TypeRef) {
        match id {
            TypeRef::Wildcard => {}
            TypeRef::Generic(_) => {
                self.atoms.insert(id);
            }
            TypeRef::Named(name) => {
                let name = self.special.collapse(name);
                let h0a = hash_a(name.0);
                let h0b = hash_b(name.0);
                let h1a = h0a.wrapping_add(h0b.wrapping_mul(2));
                let h1b = h0a.wrapping_add(h0b.wrapping_mul(3));
                let h2a = h0a.wrapping_add(h0b.wrapping_mul(4));
                let h2b = h0a.wrapping_add(h0b.wrapping_mul(5));
                self.words[0] |= bit(h0a) | bit(h1b);
                self.words[1] |= bit(h1a) | bit(h2b);
                self.words[2] |= bit(h2a) | bit(h0b);
                self.atoms.insert(TypeRef::Named(name));
            }
        }
    }

    /// Adds a node, its generics, and each binding key with its constraints.
    pub fn add_function_type(&mut self, ty: &FunctionType) {
        self.add_atom(ty.id);
        for generic in &ty.generics {
            self.add_function_type(generic);
        }
        for (key, constraints) in &ty.bindings {
            self.add_atom(TypeRef::Named(*key));
            for constraint in constraints {
                self.add_function_type(constraint);
            }
        }
    }

    pub fn finish(self) -> TypeFingerprint {
        let [a, b, c] = self.words;
        TypeFingerprint([a, b, c, self.atoms.len() as u32])
    }
}
