//! Fixed-length codon sequences and the two genome operators.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::GeneticsError;

/// An ordered, fixed-length sequence of codons.
///
/// The genome is logically circular: [`Genome::codon`] reduces any cursor
/// modulo the length, so decoding never runs off the end. Construction
/// rejects empty sequences, which keeps that reduction well-defined.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Genome {
    codons: Vec<u8>,
}

impl Genome {
    pub fn new(codons: Vec<u8>) -> Result<Self, GeneticsError> {
        if codons.is_empty() {
            return Err(GeneticsError::EmptyGenome);
        }
        Ok(Self { codons })
    }

    /// Draw `length` codons uniformly from `[0, codon_init_max]`.
    pub fn random<R: Rng + ?Sized>(
        rng: &mut R,
        length: usize,
        codon_init_max: u8,
    ) -> Result<Self, GeneticsError> {
        let codons = (0..length)
            .map(|_| rng.random_range(0..=codon_init_max))
            .collect();
        Self::new(codons)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.codons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codons.is_empty()
    }

    /// Codon at `cursor`, wrapping past the end.
    #[must_use]
    pub fn codon(&self, cursor: usize) -> u8 {
        self.codons[cursor % self.codons.len()]
    }

    #[must_use]
    pub fn codons(&self) -> &[u8] {
        &self.codons
    }

    /// Single-point crossover: children swap tails at `point`.
    ///
    /// Both parents must share a length and `point` must lie in
    /// `[0, len - 1]`; at 0 the children are straight copies of the
    /// opposite parent.
    #[must_use]
    pub fn crossover(&self, other: &Genome, point: usize) -> (Genome, Genome) {
        debug_assert_eq!(self.len(), other.len(), "parents must share a length");
        debug_assert!(point < self.len(), "crossover point out of range");

        let mut left = self.codons[..point].to_vec();
        left.extend_from_slice(&other.codons[point..]);
        let mut right = other.codons[..point].to_vec();
        right.extend_from_slice(&self.codons[point..]);
        (Self { codons: left }, Self { codons: right })
    }

    /// Per-codon bit-flip mutation: with `probability`, flip one uniformly
    /// chosen bit among the low `codon_bits` bits, then mask back into the
    /// valid range.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R, probability: f32, codon_bits: u32) {
        let mask = if codon_bits >= 8 {
            u8::MAX
        } else {
            (1u8 << codon_bits) - 1
        };
        for codon in &mut self.codons {
            if rng.random::<f32>() < probability {
                let bit = rng.random_range(0..codon_bits);
                *codon ^= 1 << bit;
                *codon &= mask;
            }
        }
    }
}
