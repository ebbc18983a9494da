//! Tail-biting convolutional coding and rate matching
//!
//! 3GPP TS 36.212 sections 5.1.3.1 and 5.1.4.2, used by PBCH and PDCCH.

/// Generator polynomials (octal 133, 171, 165), constraint length 7
const GENERATORS: [u8; 3] = [0o133, 0o171, 0o165];

/// Inter-column permutation of the sub-block interleaver (Table 5.1.4-2)
pub const SUBBLOCK_PERMUTATION: [usize; 32] = [
    1, 17, 9, 25, 5, 21, 13, 29, 3, 19, 11, 27, 7, 23, 15, 31,
    0, 16, 8, 24, 4, 20, 12, 28, 2, 18, 10, 26, 6, 22, 14, 30,
];

/// Encode with the rate 1/3 tail-biting convolutional code.
/// Returns the three output streams d(0), d(1), d(2).
pub fn encode(bits: &[u8]) -> [Vec<u8>; 3] {
    let mut streams = [
        Vec::with_capacity(bits.len()),
        Vec::with_capacity(bits.len()),
        Vec::with_capacity(bits.len()),
    ];

    // Register starts with the last six input bits
    let mut reg: u8 = 0;
    for &bit in &bits[bits.len().saturating_sub(6)..] {
        reg = (reg >> 1) | ((bit & 1) << 5);
    }

    for &bit in bits {
        let state = ((bit & 1) << 6) | reg;
        for (stream, &g) in streams.iter_mut().zip(GENERATORS.iter()) {
            stream.push(((state & g).count_ones() & 1) as u8);
        }
        reg = state >> 1;
    }

    streams
}

/// Output order of the sub-block interleaver for `len` input positions.
/// Dummy padding is removed, so the result is a permutation of `0..len`.
pub fn subblock_interleave_order(len: usize) -> Vec<usize> {
    const COLUMNS: usize = 32;
    let rows = len.div_ceil(COLUMNS);
    let padding = rows * COLUMNS - len;

    let mut order = Vec::with_capacity(len);
    for &col in SUBBLOCK_PERMUTATION.iter() {
        for row in 0..rows {
            let pos = row * COLUMNS + col;
            if pos >= padding {
                order.push(pos - padding);
            }
        }
    }
    order
}

/// Rate match the three encoded streams to `e` output bits
pub fn rate_match(streams: &[Vec<u8>; 3], e: usize) -> Vec<u8> {
    let len = streams[0].len();
    if len == 0 {
        return Vec::new();
    }

    let order = subblock_interleave_order(len);
    let circular: Vec<u8> = streams
        .iter()
        .flat_map(|stream| order.iter().map(move |&i| stream[i]))
        .collect();

    circular.iter().copied().cycle().take(e).collect()
}

/// Convolutionally encode and rate match in one step
pub fn encode_and_rate_match(bits: &[u8], e: usize) -> Vec<u8> {
    rate_match(&encode(bits), e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_zero_codeword() {
        let streams = encode(&[0u8; 40]);
        for s in &streams {
            assert_eq!(s.len(), 40);
            assert!(s.iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_impulse_response() {
        let mut bits = vec![0u8; 40];
        bits[10] = 1;
        let streams = encode(&bits);

        // Each generator has weight 5
        for s in &streams {
            assert_eq!(s.iter().filter(|&&b| b == 1).count(), 5);
        }
        // g0 = 1 + D^2 + D^3 + D^5 + D^6
        let ones: Vec<usize> = streams[0].iter().enumerate().filter(|(_, &b)| b == 1).map(|(i, _)| i).collect();
        assert_eq!(ones, vec![10, 12, 13, 15, 16]);
    }

    #[test]
    fn test_tail_biting_wraps() {
        // An impulse at the end wraps its response to the start of the block
        let mut bits = vec![0u8; 40];
        bits[39] = 1;
        let streams = encode(&bits);
        let ones: Vec<usize> = streams[0].iter().enumerate().filter(|(_, &b)| b == 1).map(|(i, _)| i).collect();
        assert_eq!(ones, vec![1, 2, 4, 5, 39]);
    }

    #[test]
    fn test_interleaver_is_permutation() {
        for len in [1, 31, 32, 40, 59, 120] {
            let mut order = subblock_interleave_order(len);
            assert_eq!(order.len(), len);
            order.sort_unstable();
            assert_eq!(order, (0..len).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_rate_match_repeats() {
        let mut bits = vec![0u8; 40];
        bits[3] = 1;
        let streams = encode(&bits);

        let e = encode_and_rate_match(&bits, 120);
        assert_eq!(e.iter().filter(|&&b| b == 1).count(), 15);

        let long = rate_match(&streams, 1920);
        assert_eq!(long.len(), 1920);
        assert_eq!(&long[..120], &e[..]);
        assert_eq!(&long[120..240], &e[..]);
    }
}
