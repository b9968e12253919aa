/*
HyperLogLog over canonical ntHash values of k-mers, following
  Flajolet, Fusy, Gandouet, Meunier. HyperLogLog: the analysis of a
  near-optimal cardinality estimation algorithm (2007).
*/

use std::cmp;
use std::fs::File;
use std::io::{self, Read, Write};
use std::ops::Add;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use log::debug;
use nthash_rs::NtHash;

use crate::encodings::HashWord;
use crate::errors::KhllError;
use crate::Error;

pub mod estimators;
use estimators::CounterType;

/// Bytes before the register array in a sketch file: k, b, total_seen_kmers.
pub const HEADER_SIZE: usize = 10;

/// Largest `b` for which buffered adds pack the bucket index in 56 bits.
pub const MAX_BUFFERED_PRECISION: u8 = 56;

const PACKED_INDEX_MASK: u64 = (1 << 56) - 1;
const PACKED_VALUE_SHIFT: u32 = 56;

pub type HyperLogLog32 = HyperLogLog<u32>;
pub type HyperLogLog64 = HyperLogLog<u64>;
pub type HyperLogLog128 = HyperLogLog<u128>;

#[derive(Debug, Clone, PartialEq)]
pub struct HyperLogLog<H: HashWord = u64> {
    registers: Vec<CounterType>,
    k: u8,
    b: u8,
    total_seen_kmers: u64,
    shift: u32,
    mask: H,
    alpha_m: f64,
}

impl<H: HashWord> HyperLogLog<H> {
    /// Empty sketch for k-mers of length `k`, indexed by the top `b` hash bits.
    pub fn new(k: u8, b: u8) -> Result<HyperLogLog<H>, Error> {
        HyperLogLog::<H>::check_parameters(k, b)?;
        let registers = allocate_registers(b)?;
        Ok(HyperLogLog::from_parts(k, b, 0, registers))
    }

    /// Empty sketch with `b = ceil(log2((1.04 / error_rate)^2))`.
    pub fn with_error_rate(k: u8, error_rate: f64) -> Result<HyperLogLog<H>, Error> {
        if !(error_rate > 0. && error_rate < 1.) {
            return Err(KhllError::invalid(format!(
                "error rate must be in (0, 1), got {}",
                error_rate
            )));
        }

        let b = f64::ceil(f64::log2(f64::powi(1.04 / error_rate, 2)));
        if b > f64::from(u8::MAX) {
            return Err(KhllError::invalid(format!(
                "error rate {} needs b = {}, which does not fit in a sketch header",
                error_rate, b
            )));
        }

        HyperLogLog::new(k, b as u8)
    }

    fn check_parameters(k: u8, b: u8) -> Result<(), Error> {
        let max_k = H::BITS / 2;
        if k == 0 || u32::from(k) > max_k {
            return Err(KhllError::invalid(format!(
                "k must be in [1, {}], got {}",
                max_k, k
            )));
        }

        if b == 0 || u32::from(b) >= H::BITS {
            return Err(KhllError::invalid(format!(
                "b must be in [1, {}], got {}",
                H::BITS - 1,
                b
            )));
        }

        if u32::from(b) >= usize::BITS {
            return Err(KhllError::invalid(format!(
                "b = {} exceeds the number of addressable registers",
                b
            )));
        }

        Ok(())
    }

    fn from_parts(k: u8, b: u8, total_seen_kmers: u64, registers: Vec<CounterType>) -> Self {
        let shift = H::BITS - u32::from(b);
        HyperLogLog {
            alpha_m: estimators::alpha(registers.len()),
            registers,
            k,
            b,
            total_seen_kmers,
            shift,
            mask: H::low_mask(shift),
        }
    }

    pub fn clear(&mut self) {
        self.registers.iter_mut().for_each(|r| *r = 0);
        self.total_seen_kmers = 0;
    }

    #[inline]
    fn split(&self, hash: H) -> (usize, CounterType) {
        let idx = hash.bucket(self.shift);
        let lsb = hash.and(self.mask);
        // the top b bits of lsb are zero, so clz(lsb) >= b
        let value = lsb.clz() + 1 - u32::from(self.b);
        (idx, value as CounterType)
    }

    #[inline]
    fn update(&mut self, idx: usize, value: CounterType) {
        let register = &mut self.registers[idx];
        *register = cmp::max(*register, value);
    }

    pub fn add_hash(&mut self, hash: H) {
        let (idx, value) = self.split(hash);
        self.update(idx, value);
        self.total_seen_kmers = self.total_seen_kmers.wrapping_add(1);
    }

    pub fn add_many(&mut self, hashes: &[H]) {
        for hash in hashes {
            self.add_hash(*hash);
        }
    }

    /// Add every k-mer of `seq`. Sequences shorter than k add nothing.
    pub fn add_sequence(&mut self, seq: &[u8]) {
        // the hasher rejects sequences shorter than k
        if let Ok(mut hasher) = NtHash::new(seq, u16::from(self.k), H::NUM_HASHES, 0) {
            while hasher.roll() {
                self.add_hash(H::from_hashes(hasher.hashes()));
            }
        }
    }

    /// Same result as [`add_sequence`](Self::add_sequence), but hashes the
    /// whole record into `buffer` before touching the registers.
    ///
    /// Each entry packs the bucket index in the low 56 bits and the register
    /// value in the high 8 bits. `buffer` is cleared first, so it can be
    /// reused across records. Sketches with `b > 56` use the direct path.
    pub fn add_sequence_buffered(&mut self, seq: &[u8], buffer: &mut Vec<u64>) {
        if self.b > MAX_BUFFERED_PRECISION {
            return self.add_sequence(seq);
        }

        buffer.clear();
        if let Ok(mut hasher) = NtHash::new(seq, u16::from(self.k), H::NUM_HASHES, 0) {
            while hasher.roll() {
                let (idx, value) = self.split(H::from_hashes(hasher.hashes()));
                buffer.push((u64::from(value) << PACKED_VALUE_SHIFT) | idx as u64);
            }
        }

        for packed in buffer.iter() {
            let idx = (packed & PACKED_INDEX_MASK) as usize;
            let value = (packed >> PACKED_VALUE_SHIFT) as CounterType;
            self.update(idx, value);
        }
        self.total_seen_kmers = self.total_seen_kmers.wrapping_add(buffer.len() as u64);
    }

    /// Estimated number of distinct k-mers.
    pub fn count(&self) -> usize {
        estimators::estimate(&self.registers, self.alpha_m, H::BITS)
    }

    /// Expected relative error of [`count`](Self::count), `1.04 / sqrt(m)`.
    pub fn standard_error(&self) -> f64 {
        1.04 / (self.registers.len() as f64).sqrt()
    }

    /// Number of k-mers added, duplicates included.
    pub fn size(&self) -> u64 {
        self.total_seen_kmers
    }

    pub fn ksize(&self) -> u8 {
        self.k
    }

    pub fn precision(&self) -> u8 {
        self.b
    }

    pub fn registers(&self) -> &[CounterType] {
        &self.registers
    }

    pub fn is_empty(&self) -> bool {
        self.registers.iter().all(|&r| r == 0)
    }

    pub fn check_compatible(&self, other: &HyperLogLog<H>) -> Result<(), Error> {
        if self.k != other.k || self.b != other.b || self.registers.len() != other.registers.len()
        {
            return Err(KhllError::IncompatibleSketches {
                k1: self.k,
                b1: self.b,
                k2: other.k,
                b2: other.b,
            });
        }
        Ok(())
    }

    /// In-place union: registers take the elementwise max, totals add up
    /// (wrapping at `u64::MAX`).
    pub fn merge(&mut self, other: &HyperLogLog<H>) -> Result<(), Error> {
        self.check_compatible(other)?;
        self.registers
            .iter_mut()
            .zip(other.registers.iter())
            .for_each(|(a, b)| *a = cmp::max(*a, *b));
        self.total_seen_kmers = self.total_seen_kmers.wrapping_add(other.total_seen_kmers);
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let mut writer = io::BufWriter::new(File::create(&path)?);
        self.save_to_writer(&mut writer)?;
        writer.flush()?;
        debug!(
            "saved sketch (k={}, b={}) to {}",
            self.k,
            self.b,
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn save_to_writer<W>(&self, wtr: &mut W) -> Result<(), Error>
    where
        W: io::Write,
    {
        check_endianness()?;
        wtr.write_u8(self.k)?;
        wtr.write_u8(self.b)?;
        wtr.write_u64::<LittleEndian>(self.total_seen_kmers)?;
        wtr.write_all(&self.registers)?;
        Ok(())
    }

    pub fn from_reader<R>(mut rdr: R) -> Result<HyperLogLog<H>, Error>
    where
        R: io::Read,
    {
        check_endianness()?;

        let mut header = Vec::with_capacity(HEADER_SIZE);
        rdr.by_ref()
            .take(HEADER_SIZE as u64)
            .read_to_end(&mut header)?;
        if header.len() < HEADER_SIZE {
            return Err(KhllError::TruncatedSketch {
                expected: HEADER_SIZE,
                found: header.len(),
            });
        }

        let k = header[0];
        let b = header[1];
        HyperLogLog::<H>::check_parameters(k, b)?;
        let total_seen_kmers = LittleEndian::read_u64(&header[2..HEADER_SIZE]);

        // grows only with the bytes actually present
        let size = 1usize << b;
        let mut registers = Vec::new();
        rdr.take(size as u64).read_to_end(&mut registers)?;
        if registers.len() < size {
            return Err(KhllError::TruncatedSketch {
                expected: HEADER_SIZE + size,
                found: HEADER_SIZE + registers.len(),
            });
        }

        let max_value = H::BITS - u32::from(b) + 1;
        if let Some(r) = registers.iter().find(|&&r| u32::from(r) > max_value) {
            return Err(KhllError::invalid(format!(
                "register value {} exceeds {} for b = {}",
                r, max_value, b
            )));
        }

        Ok(HyperLogLog::from_parts(k, b, total_seen_kmers, registers))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<HyperLogLog<H>, Error> {
        let reader = io::BufReader::new(File::open(&path)?);
        let hll = HyperLogLog::from_reader(reader)?;
        debug!(
            "loaded sketch (k={}, b={}) from {}",
            hll.k,
            hll.b,
            path.as_ref().display()
        );
        Ok(hll)
    }
}

impl<'a, H: HashWord> Add<&'a HyperLogLog<H>> for &'a HyperLogLog<H> {
    type Output = Result<HyperLogLog<H>, Error>;

    fn add(self, other: &'a HyperLogLog<H>) -> Self::Output {
        let mut merged = self.clone();
        merged.merge(other)?;
        Ok(merged)
    }
}

fn allocate_registers(b: u8) -> Result<Vec<CounterType>, Error> {
    let size = 1usize << b;
    let mut registers = Vec::new();
    registers.try_reserve_exact(size).map_err(|_| {
        KhllError::invalid(format!("cannot allocate 2^{} registers", b))
    })?;
    registers.resize(size, 0);
    Ok(registers)
}

fn check_endianness() -> Result<(), Error> {
    if cfg!(target_endian = "big") {
        Err(KhllError::UnsupportedEndianness)
    } else {
        Ok(())
    }
}
