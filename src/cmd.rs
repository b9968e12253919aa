use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use cfg_if::cfg_if;
use log::{debug, info, warn};
use needletail::errors::ParseErrorKind;
use needletail::{parse_fastx_file, parse_fastx_stdin, FastxReader};

use crate::errors::KhllError;
use crate::Error;

cfg_if! {
    if #[cfg(feature = "hash128")] {
        pub type Sketch = crate::sketch::hyperloglog::HyperLogLog128;
    } else {
        pub type Sketch = crate::sketch::hyperloglog::HyperLogLog64;
    }
}

pub const DEFAULT_PRECISION: u8 = 12;

/// Records between progress messages while building.
pub const PROGRESS_INTERVAL: usize = 100_000;

#[derive(Debug, Clone, PartialEq)]
pub struct BuildParameters {
    pub ksize: u8,
    /// Register index bits; `None` means [`DEFAULT_PRECISION`].
    pub precision: Option<u8>,
    /// Target standard error. Takes precedence over `precision`.
    pub error_rate: Option<f64>,
    /// Sequence file; `None` reads stdin.
    pub input: Option<PathBuf>,
    /// Sketch to update if it exists, and to save the result to.
    pub sketch: Option<PathBuf>,
    pub passthrough: bool,
}

impl BuildParameters {
    pub fn new(ksize: u8) -> BuildParameters {
        BuildParameters {
            ksize,
            precision: None,
            error_rate: None,
            input: None,
            sketch: None,
            passthrough: false,
        }
    }

    fn new_sketch(&self) -> Result<Sketch, Error> {
        match self.error_rate {
            Some(error_rate) => Sketch::with_error_rate(self.ksize, error_rate),
            None => Sketch::new(self.ksize, self.precision.unwrap_or(DEFAULT_PRECISION)),
        }
    }
}

fn prepare_sketch(params: &BuildParameters) -> Result<Sketch, Error> {
    if let Some(path) = &params.sketch {
        if path.exists() {
            let hll = Sketch::from_path(path)?;
            info!(
                "Updating sketch {} (k={}, b={})",
                path.display(),
                hll.ksize(),
                hll.precision()
            );

            if hll.ksize() != params.ksize {
                warn!(
                    "Ignoring k={}, {} was built with k={}",
                    params.ksize,
                    path.display(),
                    hll.ksize()
                );
            }
            if let Some(b) = params.precision {
                if b != hll.precision() {
                    warn!(
                        "Ignoring b={}, {} was built with b={}",
                        b,
                        path.display(),
                        hll.precision()
                    );
                }
            }
            return Ok(hll);
        }
    }

    params.new_sketch()
}

fn open_sequences(input: Option<&Path>) -> Result<Option<Box<dyn FastxReader>>, Error> {
    let reader = match input {
        Some(path) => parse_fastx_file(path),
        None => parse_fastx_stdin(),
    };

    match reader {
        Ok(reader) => Ok(Some(reader)),
        Err(e) if matches!(e.kind, ParseErrorKind::EmptyFile) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Add every record of the input to a sketch, optionally echoing the records
/// to `out`, and save the sketch when a path was given.
pub fn build<W: Write>(params: &BuildParameters, out: &mut W) -> Result<Sketch, Error> {
    let mut hll = prepare_sketch(params)?;

    let source = params
        .input
        .as_ref()
        .map_or_else(|| "stdin".into(), |p| p.display().to_string());
    info!(
        "Building sketch for {} with k={}, b={}...",
        source,
        hll.ksize(),
        hll.precision()
    );

    let mut records = 0usize;
    match open_sequences(params.input.as_deref())? {
        Some(mut reader) => {
            let mut buffer = Vec::new();

            while let Some(record) = reader.next() {
                let record = record?;
                hll.add_sequence_buffered(&record.seq(), &mut buffer);

                if params.passthrough {
                    record.write(&mut *out, None)?;
                }

                records += 1;
                if records % PROGRESS_INTERVAL == 0 {
                    debug!(
                        "Processed {} records, {} k-mers, ~{} distinct",
                        records,
                        hll.size(),
                        hll.count()
                    );
                }
            }
        }
        None => warn!("{} is empty", source),
    }
    out.flush()?;
    info!("Processed {} records, {} k-mers", records, hll.size());

    if let Some(path) = &params.sketch {
        hll.save(path)?;
        info!("Saved sketch to {}", path.display());
    }

    Ok(hll)
}

pub fn load_sketch<P: AsRef<Path>>(path: P) -> Result<Sketch, Error> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(KhllError::MissingSketch {
            path: path.display().to_string(),
        });
    }
    Sketch::from_path(path)
}

fn read_paths<P: AsRef<Path>>(list: P) -> Result<Vec<PathBuf>, Error> {
    let reader = io::BufReader::new(File::open(list)?);
    let mut paths = vec![];
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            paths.push(PathBuf::from(line));
        }
    }
    Ok(paths)
}

/// Union of all sketches named in `lists` (one path per line) and `sketches`.
///
/// The last sketch is loaded first and the others are merged into it, in
/// order. The result is saved to `output` if given.
pub fn merge_sketches(
    lists: Vec<&str>,
    sketches: Vec<&str>,
    output: Option<&str>,
) -> Result<Sketch, Error> {
    let mut paths = vec![];
    for list in lists {
        paths.extend(read_paths(list)?);
    }
    paths.extend(sketches.into_iter().map(PathBuf::from));

    let (last, rest) = paths.split_last().ok_or(KhllError::NothingToMerge)?;
    let mut merged = load_sketch(last)?;
    debug!("Loaded {}", last.display());

    for path in rest {
        let hll = load_sketch(path)?;
        merged.merge(&hll)?;
        debug!("Merged {}", path.display());
    }
    info!("Merged {} sketches", paths.len());

    if let Some(output) = output {
        merged.save(output)?;
        info!("Saved merged sketch to {}", output);
    }

    Ok(merged)
}

/// `count`, or `count,total` when `total` is set.
pub fn report(hll: &Sketch, total: bool) -> String {
    if total {
        format!("{},{}", hll.count(), hll.size())
    } else {
        hll.count().to_string()
    }
}
