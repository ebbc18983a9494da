//! Pseudo-random sequence generation
//!
//! Length-31 Gold sequence of 3GPP TS 36.211 section 7.2, used by every
//! scrambler and by the cell-specific reference signals.

/// Gold sequence generator
pub struct GoldSequence {
    /// Gold sequence LFSR state
    x1: u32,
    x2: u32,
}

impl GoldSequence {
    /// Sequence offset N_c
    const NC: usize = 1600;

    /// Create new generator with initialization value
    pub fn new(c_init: u32) -> Self {
        // x1(0) = 1, x1(n) = 0 for n = 1..30
        let mut seq = Self {
            x1: 1,
            x2: c_init & 0x7FFFFFFF,
        };

        for _ in 0..Self::NC {
            seq.advance();
        }

        seq
    }

    /// Advance LFSR state
    fn advance(&mut self) {
        // x1(n+31) = (x1(n+3) + x1(n)) mod 2
        let x1_new = ((self.x1 >> 3) ^ self.x1) & 1;
        self.x1 = (self.x1 >> 1) | (x1_new << 30);

        // x2(n+31) = (x2(n+3) + x2(n+2) + x2(n+1) + x2(n)) mod 2
        let x2_new = ((self.x2 >> 3) ^ (self.x2 >> 2) ^ (self.x2 >> 1) ^ self.x2) & 1;
        self.x2 = (self.x2 >> 1) | (x2_new << 30);
    }

    /// Generate next bit from the sequence
    pub fn next_bit(&mut self) -> u8 {
        let c = ((self.x1 ^ self.x2) & 1) as u8;
        self.advance();
        c
    }

    /// Generate `len` bits for `c_init`
    pub fn bits(c_init: u32, len: usize) -> Vec<u8> {
        let mut seq = Self::new(c_init);
        (0..len).map(|_| seq.next_bit()).collect()
    }
}

/// XOR a bit vector with the Gold sequence for `c_init`
pub fn scramble(bits: &mut [u8], c_init: u32) {
    let mut seq = GoldSequence::new(c_init);
    for bit in bits.iter_mut() {
        *bit ^= seq.next_bit();
    }
}
