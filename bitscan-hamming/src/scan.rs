/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Batch scoring of a linear code buffer against a single query.
//!
//! A code buffer holds `n` codes of `query.len()` bytes each, stored back to back. The
//! computer is chosen once per call through [`crate::dispatch_hamming`] or
//! [`crate::dispatch_gen_hamming`] and then applied to every code.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{
    dispatch::{dispatch_gen_hamming, dispatch_hamming, WithComputer},
    HammingComputer, Parallelism, ScanError,
};

/// A code identifier paired with its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Neighbor {
    /// Distance from the query. Compared first.
    pub distance: u32,
    /// Position of the code within the scanned buffer.
    pub id: usize,
}

impl Neighbor {
    /// Create a new neighbor.
    pub fn new(id: usize, distance: u32) -> Self {
        Self { distance, id }
    }

    /// Return the contents of `self` as a tuple.
    pub fn as_tuple(self) -> (usize, u32) {
        (self.id, self.distance)
    }
}

/// Compute the bitwise Hamming distance between `query` and every code in `codes`,
/// writing the distance of code `i` to `out[i]`.
///
/// # Errors
///
/// * [`ScanError::EmptyQuery`] if `query` is empty.
/// * [`ScanError::RaggedCodes`] if `codes.len()` is not a multiple of `query.len()`.
/// * [`ScanError::OutputLength`] if `out` does not hold one entry per code.
pub fn hamming_distances(
    query: &[u8],
    codes: &[u8],
    out: &mut [u32],
    parallelism: Parallelism,
) -> Result<(), ScanError> {
    let num_codes = check_buffers(query, codes, Some(out.len()))?;
    tracing::trace!(code_size = query.len(), num_codes, "bitwise hamming scan");
    dispatch_hamming(
        query,
        Fill {
            codes,
            out,
            parallelism,
        },
    );
    Ok(())
}

/// Compute the generalized Hamming distance between `query` and every code in `codes`,
/// writing the distance of code `i` to `out[i]`.
///
/// # Errors
///
/// Returns the same errors as [`hamming_distances`], and additionally
/// [`ScanError::CodeSize`] if `query.len()` is not a multiple of 8.
pub fn generalized_hamming_distances(
    query: &[u8],
    codes: &[u8],
    out: &mut [u32],
    parallelism: Parallelism,
) -> Result<(), ScanError> {
    let num_codes = check_buffers(query, codes, Some(out.len()))?;
    tracing::trace!(code_size = query.len(), num_codes, "generalized hamming scan");
    dispatch_gen_hamming(
        query,
        Fill {
            codes,
            out,
            parallelism,
        },
    )?;
    Ok(())
}

/// Return the `k` codes in `codes` closest to `query` in bitwise Hamming distance.
///
/// The result is ordered by increasing distance, with ties ordered by increasing id.
///
/// # Errors
///
/// Returns the same errors as [`hamming_distances`], and additionally
/// [`ScanError::NotEnoughCodes`] if `k` exceeds the number of codes.
pub fn hamming_knn(
    query: &[u8],
    codes: &[u8],
    k: usize,
    parallelism: Parallelism,
) -> Result<Vec<Neighbor>, ScanError> {
    let num_codes = check_buffers(query, codes, None)?;
    if k > num_codes {
        return Err(ScanError::NotEnoughCodes {
            k,
            available: num_codes,
        });
    }
    if k == 0 {
        return Ok(Vec::new());
    }

    let mut distances = vec![0u32; num_codes];
    hamming_distances(query, codes, &mut distances, parallelism)?;

    let mut neighbors: Vec<Neighbor> = distances
        .into_iter()
        .enumerate()
        .map(|(id, distance)| Neighbor::new(id, distance))
        .collect();

    if k < neighbors.len() {
        neighbors.select_nth_unstable(k - 1);
        neighbors.truncate(k);
    }
    neighbors.sort_unstable();
    Ok(neighbors)
}

/////////////
// Helpers //
/////////////

/// Validate the shape of a scan and return the number of codes.
fn check_buffers(
    query: &[u8],
    codes: &[u8],
    out_len: Option<usize>,
) -> Result<usize, ScanError> {
    let code_size = query.len();
    if code_size == 0 {
        return Err(ScanError::EmptyQuery);
    }
    if codes.len() % code_size != 0 {
        return Err(ScanError::RaggedCodes {
            len: codes.len(),
            code_size,
        });
    }

    let num_codes = codes.len() / code_size;
    if let Some(actual) = out_len {
        if actual != num_codes {
            return Err(ScanError::OutputLength {
                expected: num_codes,
                actual,
            });
        }
    }
    Ok(num_codes)
}

/// Score every code of a buffer into an output slice.
struct Fill<'b> {
    codes: &'b [u8],
    out: &'b mut [u32],
    parallelism: Parallelism,
}

impl WithComputer for Fill<'_> {
    type Output = ();

    fn apply<'a, C>(self, computer: C)
    where
        C: HammingComputer<'a>,
    {
        let code_size = computer.code_size();
        match self.parallelism {
            Parallelism::Sequential => {
                for (d, code) in std::iter::zip(self.out, self.codes.chunks_exact(code_size)) {
                    *d = computer.hamming(code);
                }
            }
            #[cfg(feature = "rayon")]
            Parallelism::Rayon => {
                self.out
                    .par_iter_mut()
                    .zip(self.codes.par_chunks_exact(code_size))
                    .for_each(|(d, code)| *d = computer.hamming(code));
            }
        }
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::{popcount, GenHammingComputerM8, HammingComputerDefault};

    fn parallelisms() -> Vec<Parallelism> {
        let mut all = vec![Parallelism::Sequential];
        #[cfg(feature = "rayon")]
        all.push(Parallelism::Rayon);
        all
    }

    fn random_buffer(rng: &mut StdRng, len: usize) -> Vec<u8> {
        (0..len).map(|_| rng.random()).collect()
    }

    #[test]
    fn distances_match_computers() {
        let mut rng = StdRng::seed_from_u64(0x63e0_7b1d_a5c2_948f);
        for code_size in [3, 4, 8, 16, 20, 24, 32, 40, 64, 72] {
            let num_codes = 257;
            let query = random_buffer(&mut rng, code_size);
            let codes = random_buffer(&mut rng, code_size * num_codes);

            let bitwise = HammingComputerDefault::new(&query);
            let expected: Vec<u32> = codes
                .chunks_exact(code_size)
                .map(|c| bitwise.hamming(c))
                .collect();

            for parallelism in parallelisms() {
                let mut out = vec![u32::MAX; num_codes];
                hamming_distances(&query, &codes, &mut out, parallelism).unwrap();
                assert_eq!(out, expected, "code size {code_size}, {parallelism:?}");
            }

            if code_size % 8 != 0 {
                let mut out = vec![0; num_codes];
                let err = generalized_hamming_distances(
                    &query,
                    &codes,
                    &mut out,
                    Parallelism::Sequential,
                )
                .unwrap_err();
                assert!(matches!(err, ScanError::CodeSize(_)));
                continue;
            }

            let generalized = GenHammingComputerM8::new(&query);
            let expected: Vec<u32> = codes
                .chunks_exact(code_size)
                .map(|c| generalized.hamming(c))
                .collect();
            for (i, code) in codes.chunks_exact(code_size).enumerate() {
                assert_eq!(
                    expected[i],
                    popcount::generalized_hamming(&query, code).unwrap()
                );
            }

            for parallelism in parallelisms() {
                let mut out = vec![u32::MAX; num_codes];
                generalized_hamming_distances(&query, &codes, &mut out, parallelism).unwrap();
                assert_eq!(out, expected, "code size {code_size}, {parallelism:?}");
            }
        }
    }

    #[test]
    fn knn_ordering() {
        // Distances to the all-zero query: 3, 1, 8, 1, 0, 3.
        let query = [0u8; 1];
        let codes: [u8; 6] = [0b0000_0111, 0b0100_0000, 0xff, 0b0000_0010, 0, 0b1010_1000];

        for parallelism in parallelisms() {
            let knn = hamming_knn(&query, &codes, 4, parallelism).unwrap();
            let tuples: Vec<_> = knn.into_iter().map(Neighbor::as_tuple).collect();
            assert_eq!(tuples, [(4, 0), (1, 1), (3, 1), (0, 3)]);

            let all = hamming_knn(&query, &codes, codes.len(), parallelism).unwrap();
            assert_eq!(all.len(), codes.len());
            assert_eq!(all.last(), Some(&Neighbor::new(2, 8)));

            assert!(hamming_knn(&query, &codes, 0, parallelism)
                .unwrap()
                .is_empty());
        }
    }

    #[test]
    fn knn_matches_full_sort() {
        let mut rng = StdRng::seed_from_u64(0x1f90_c36a_e4d8_2b57);
        let code_size = 8;
        let num_codes = 1000;

        // Few distinct bits produce many ties.
        let query = [0u8; 8];
        let codes: Vec<u8> = (0..code_size * num_codes)
            .map(|_| if rng.random_bool(0.9) { 0 } else { 1 << rng.random_range(0..8) })
            .collect();

        let mut expected: Vec<Neighbor> = codes
            .chunks_exact(code_size)
            .enumerate()
            .map(|(id, c)| Neighbor::new(id, popcount::hamming(&query, c).unwrap()))
            .collect();
        expected.sort();

        for k in [1, 10, 100, 999, 1000] {
            let knn = hamming_knn(&query, &codes, k, Parallelism::Sequential).unwrap();
            assert_eq!(knn, expected[..k], "k = {k}");
        }
    }

    #[test]
    fn shape_errors() {
        let mut out = [0u32; 2];
        assert_eq!(
            hamming_distances(&[], &[], &mut out, Parallelism::Sequential).unwrap_err(),
            ScanError::EmptyQuery
        );
        assert_eq!(
            hamming_distances(&[0; 4], &[0; 10], &mut out, Parallelism::Sequential)
                .unwrap_err(),
            ScanError::RaggedCodes {
                len: 10,
                code_size: 4
            }
        );
        assert_eq!(
            hamming_distances(&[0; 4], &[0; 12], &mut out, Parallelism::Sequential)
                .unwrap_err(),
            ScanError::OutputLength {
                expected: 3,
                actual: 2
            }
        );
        assert_eq!(
            hamming_knn(&[0; 4], &[0; 12], 4, Parallelism::Sequential).unwrap_err(),
            ScanError::NotEnoughCodes { k: 4, available: 3 }
        );
    }
}
