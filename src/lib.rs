//! # khll
//!
//! Estimate the number of distinct k-mers in nucleotide sequences with a
//! HyperLogLog sketch.
//!
//! K-mers are hashed with a canonical ntHash rolling hash, so a k-mer and its
//! reverse complement count once. Sketches built with the same `k` and `b`
//! can be merged, and are stored in a compact binary file: a 10 byte header
//! followed by `2^b` one byte registers.
//!
//! ```
//! use khll::sketch::hyperloglog::HyperLogLog64;
//!
//! let mut hll = HyperLogLog64::new(5, 4).unwrap();
//! hll.add_sequence(b"ACGTACGT");
//! assert_eq!(hll.size(), 4);
//! assert!(hll.count() >= 1);
//! ```

pub mod errors;
pub use errors::KhllError as Error;

pub mod cmd;
pub mod encodings;
pub mod sketch;

pub use sketch::hyperloglog::HyperLogLog;
