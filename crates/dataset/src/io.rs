//! Binary dataset persistence
//!
//! Append holds an exclusive advisory lock on the file for the duration of
//! the call and writes each record with a single `write_all`, so concurrent
//! enrolments interleave whole records, never bytes.

use crate::Dataset;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, warn};
use voice_biometric_common::{EngineError, Result};

/// Upper bound on a plausible record length; anything above this means the
/// stream is not a dataset file.
const MAX_RECORD_LEN: u32 = 1 << 20;

/// Append labeled feature vectors to the dataset file, creating it if
/// needed.
///
/// # Errors
/// Fails if the vectors and labels differ in count, a vector is empty or
/// non-finite, or the file cannot be locked or written.
pub fn append_samples(path: &Path, features: &[Vec<f64>], labels: &[i32]) -> Result<()> {
    if features.len() != labels.len() {
        return Err(EngineError::InputMalformed(format!(
            "{} feature vectors for {} labels",
            features.len(),
            labels.len()
        )));
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock()?;

    let result = write_records(&file, features, labels);

    file.unlock()?;
    result?;

    debug!(count = features.len(), path = %path.display(), "appended dataset records");
    Ok(())
}

fn write_records(file: &File, features: &[Vec<f64>], labels: &[i32]) -> Result<()> {
    let mut writer = BufWriter::new(file);

    for (vector, &label) in features.iter().zip(labels) {
        if vector.is_empty() {
            return Err(EngineError::InputMalformed(
                "empty feature vector".to_string(),
            ));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::InputMalformed(
                "non-finite feature value".to_string(),
            ));
        }

        // One buffer per record so a record is written in a single syscall
        let mut record = Vec::with_capacity(4 + vector.len() * 8 + 4);
        record.extend_from_slice(&(vector.len() as u32).to_le_bytes());
        for value in vector {
            record.extend_from_slice(&value.to_le_bytes());
        }
        record.extend_from_slice(&label.to_le_bytes());
        writer.write_all(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Load the dataset, inferring the dimension from the first valid record.
///
/// Records whose length differs from the inferred dimension are skipped with
/// a warning; a truncated or implausible record aborts the load.
///
/// # Errors
/// Fails on IO errors or a structurally corrupt file.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut dataset = Dataset::default();
    let mut expected_len: Option<u32> = None;
    let mut skipped = 0usize;

    loop {
        let mut len_bytes = [0u8; 4];
        match reader.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_bytes);
        if len == 0 || len > MAX_RECORD_LEN {
            return Err(EngineError::InputMalformed(format!(
                "implausible record length {len} in {}",
                path.display()
            )));
        }

        match expected_len {
            Some(expected) if expected != len => {
                // Mixed dimension: consume and drop the record
                reader.seek(SeekFrom::Current(i64::from(len) * 8 + 4))?;
                skipped += 1;
                continue;
            }
            None => expected_len = Some(len),
            _ => {}
        }

        let mut vector = Vec::with_capacity(len as usize);
        let mut value_bytes = [0u8; 8];
        for _ in 0..len {
            reader.read_exact(&mut value_bytes).map_err(truncated(path))?;
            vector.push(f64::from_le_bytes(value_bytes));
        }

        let mut label_bytes = [0u8; 4];
        reader.read_exact(&mut label_bytes).map_err(truncated(path))?;
        dataset.push(vector, i32::from_le_bytes(label_bytes));
    }

    if skipped > 0 {
        warn!(
            skipped,
            expected = expected_len,
            "rejected dataset records with mismatched dimension"
        );
    }

    debug!(
        samples = dataset.len(),
        dimension = dataset.dimension(),
        "loaded dataset"
    );

    Ok(dataset)
}

fn truncated(path: &Path) -> impl Fn(std::io::Error) -> EngineError + '_ {
    move |e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            EngineError::InputMalformed(format!("truncated record in {}", path.display()))
        } else {
            e.into()
        }
    }
}

/// Export the dataset as CSV (`label,f0,f1,...`) for offline analysis.
///
/// # Errors
/// Fails on IO errors.
pub fn export_csv(path: &Path, dataset: &Dataset) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    if let Some(dim) = dataset.dimension() {
        write!(writer, "label")?;
        for i in 0..dim {
            write!(writer, ",f{i}")?;
        }
        writeln!(writer)?;
    }

    for (vector, label) in dataset.features.iter().zip(&dataset.labels) {
        write!(writer, "{label}")?;
        for value in vector {
            write!(writer, ",{value}")?;
        }
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}
