//! Spectrum ingest and normalization.
//!
//! Turns a frequency file and a data file (one spectrum per line, all part-1
//! values followed by all part-2 values, whitespace separated) into spectra
//! in the base representation of the chosen formulation.
//!
//! File-level problems (missing file, unparsable number, bad ignore index) are
//! fatal. Spectrum-level problems (wrong column count, too many NaN values)
//! only reject that spectrum and are reported against its index.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::domain::{DataFormat, Formulation, Spectrum};
use crate::error::{AppError, InversionError};

/// Where and how to read the input.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub frequency_file: PathBuf,
    pub data_file: PathBuf,
    pub data_format: DataFormat,
    pub formulation: Formulation,
    /// Frequency indices (into the frequency file) to drop.
    pub ignore: Vec<usize>,
    /// Scale every spectrum so its lowest-frequency magnitude equals this value.
    pub norm_mag: Option<f64>,
}

/// Ingest output.
#[derive(Debug, Clone)]
pub struct IngestedData {
    /// Frequencies left after the ignore list.
    pub frequencies: Vec<f64>,
    /// Un-normalized data per spectrum in the base representation (`2·n`
    /// values, NaN where a sample is missing). Rows that could not be read
    /// are empty.
    pub raw: Vec<Vec<f64>>,
    /// Normalized, NaN-filtered spectra ready for inversion.
    pub spectra: Vec<Result<Spectrum, InversionError>>,
    /// Per-spectrum normalization factors (`None` without `norm_mag`).
    pub norm_factors: Option<Vec<f64>>,
}

impl IngestedData {
    pub fn rejected(&self) -> usize {
        self.spectra.iter().filter(|s| s.is_err()).count()
    }
}

/// Load, convert, filter and normalize all spectra.
pub fn load_spectra(options: &IngestOptions) -> Result<IngestedData, AppError> {
    let all_frequencies = read_frequencies(&options.frequency_file)?;
    let rows = read_rows(&options.data_file)?;
    if rows.is_empty() {
        return Err(AppError::new(
            3,
            format!("No spectra found in '{}'.", options.data_file.display()),
        ));
    }

    let keep = kept_indices(all_frequencies.len(), &options.ignore)?;
    let frequencies: Vec<f64> = keep.iter().map(|&i| all_frequencies[i]).collect();
    if frequencies.len() < 2 {
        return Err(AppError::new(
            3,
            "Fewer than 2 frequencies remain after applying the ignore list.",
        ));
    }
    if let Some(norm_mag) = options.norm_mag {
        if !(norm_mag.is_finite() && norm_mag > 0.0) {
            return Err(AppError::new(2, format!("norm_mag must be > 0, got {norm_mag}")));
        }
    }

    let target = options.formulation.base_format();
    let mut raw = Vec::with_capacity(rows.len());
    let mut spectra = Vec::with_capacity(rows.len());
    let mut factors = Vec::with_capacity(rows.len());

    for (idx, row) in rows.iter().enumerate() {
        if row.len() != 2 * all_frequencies.len() {
            let msg = format!(
                "expected {} values, found {}",
                2 * all_frequencies.len(),
                row.len()
            );
            log::warn!("spectrum {idx}: {msg}");
            raw.push(Vec::new());
            spectra.push(Err(InversionError::InvalidSpectrum(msg)));
            factors.push(f64::NAN);
            continue;
        }

        let selected = select_columns(row, &keep);
        let base = convert_spectrum(&selected, options.data_format, target);
        let prepared = filter_nan(&frequencies, &base).and_then(|(freqs, data)| match options.norm_mag {
            Some(norm_mag) => {
                let factor = normalization_factor(&freqs, &data, norm_mag)?;
                let scaled = data.iter().map(|v| v * factor).collect();
                Ok((Spectrum::with_relative_weights(freqs, scaled)?, factor))
            }
            None => Ok((Spectrum::with_relative_weights(freqs, data)?, 1.0)),
        });

        match prepared {
            Ok((spectrum, factor)) => {
                spectra.push(Ok(spectrum));
                factors.push(factor);
            }
            Err(e) => {
                log::warn!("spectrum {idx}: {e}");
                spectra.push(Err(e));
                factors.push(f64::NAN);
            }
        }
        raw.push(base);
    }

    Ok(IngestedData {
        frequencies,
        raw,
        spectra,
        norm_factors: options.norm_mag.map(|_| factors),
    })
}

/// Read a single column of frequencies (Hz).
pub fn read_frequencies(path: &Path) -> Result<Vec<f64>, AppError> {
    let frequencies: Vec<f64> = read_rows(path)?.into_iter().flatten().collect();
    if let Some(bad) = frequencies.iter().find(|f| !(f.is_finite() && **f > 0.0)) {
        return Err(AppError::new(
            2,
            format!("Frequencies must be finite and > 0, found {bad} in '{}'.", path.display()),
        ));
    }
    Ok(frequencies)
}

/// Read whitespace separated numbers, one `Vec` per non-empty line.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<f64>>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b' ')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 1;
        let record = result.map_err(|e| {
            AppError::new(2, format!("Failed to read '{}' line {line}: {e}", path.display()))
        })?;

        // Repeated spaces and tabs produce empty or compound fields.
        let mut values = Vec::new();
        for token in record.iter().flat_map(str::split_whitespace) {
            let value = token.parse::<f64>().map_err(|_| {
                AppError::new(
                    2,
                    format!("Invalid number '{token}' in '{}' line {line}.", path.display()),
                )
            })?;
            values.push(value);
        }
        if !values.is_empty() {
            rows.push(values);
        }
    }
    Ok(rows)
}

/// Indices of frequencies that survive the ignore list.
fn kept_indices(n: usize, ignore: &[usize]) -> Result<Vec<usize>, AppError> {
    if let Some(bad) = ignore.iter().find(|&&i| i >= n) {
        return Err(AppError::new(
            2,
            format!("Ignored frequency index {bad} is out of range (0..{n})."),
        ));
    }
    Ok((0..n).filter(|i| !ignore.contains(i)).collect())
}

/// Pick the kept frequency columns from a `[part1…, part2…]` row.
fn select_columns(row: &[f64], keep: &[usize]) -> Vec<f64> {
    let n = row.len() / 2;
    let mut out: Vec<f64> = keep.iter().map(|&i| row[i]).collect();
    out.extend(keep.iter().map(|&i| row[n + i]));
    out
}

/// Convert a `[part1…, part2…]` row between formats. NaN samples stay NaN.
pub fn convert_spectrum(row: &[f64], from: DataFormat, to: DataFormat) -> Vec<f64> {
    let n = row.len() / 2;
    let mut part1 = Vec::with_capacity(n);
    let mut part2 = Vec::with_capacity(n);
    for i in 0..n {
        let (a, b) = if row[i].is_nan() || row[n + i].is_nan() {
            (f64::NAN, f64::NAN)
        } else {
            from.convert(to, row[i], row[n + i])
        };
        part1.push(a);
        part2.push(b);
    }
    part1.extend(part2);
    part1
}

/// Drop every frequency with a NaN in either part.
///
/// Fails if fewer than two frequencies remain.
pub fn filter_nan(frequencies: &[f64], data: &[f64]) -> Result<(Vec<f64>, Vec<f64>), InversionError> {
    let n = frequencies.len();
    let keep: Vec<usize> = (0..n)
        .filter(|&i| !data[i].is_nan() && !data[n + i].is_nan())
        .collect();
    if keep.len() < 2 {
        return Err(InversionError::InvalidSpectrum(format!(
            "only {} of {n} frequencies carry data",
            keep.len()
        )));
    }
    let freqs = keep.iter().map(|&i| frequencies[i]).collect();
    Ok((freqs, select_columns(data, &keep)))
}

/// Factor that scales the magnitude at the lowest frequency to `norm_mag`.
pub fn normalization_factor(frequencies: &[f64], data: &[f64], norm_mag: f64) -> Result<f64, InversionError> {
    let n = frequencies.len();
    let lowest = (0..n)
        .min_by(|&a, &b| frequencies[a].total_cmp(&frequencies[b]))
        .ok_or_else(|| InversionError::InvalidSpectrum("spectrum is empty".to_string()))?;
    let magnitude = data[lowest].hypot(data[n + lowest]);
    if !(magnitude.is_finite() && magnitude > 0.0) {
        return Err(InversionError::InvalidSpectrum(
            "cannot normalize a spectrum with zero magnitude".to_string(),
        ));
    }
    Ok(norm_mag / magnitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ddecomp-ingest-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn options(freq: PathBuf, data: PathBuf) -> IngestOptions {
        IngestOptions {
            frequency_file: freq,
            data_file: data,
            data_format: DataFormat::RreRmim,
            formulation: Formulation::Resistivity,
            ignore: Vec::new(),
            norm_mag: None,
        }
    }

    #[test]
    fn reads_whitespace_separated_rows() {
        let path = temp_file("rows.dat", "1.0  2.0\t3.0\n\n4e1 nan 6\n");
        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![1.0, 2.0, 3.0]);
        assert_eq!(rows[1][0], 40.0);
        assert!(rows[1][1].is_nan());
    }

    #[test]
    fn invalid_number_is_fatal() {
        let path = temp_file("bad.dat", "1.0 abc\n");
        let err = read_rows(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn converts_magnitude_phase_to_base_representation() {
        // |ρ| = 100, φ = -10 mrad.
        let row = [100.0, 100.0, -10.0, -10.0];
        let base = convert_spectrum(&row, DataFormat::RmagRpha, DataFormat::RreRmim);
        assert!((base[0] - 100.0 * 0.01f64.cos()).abs() < 1e-10);
        assert!((base[2] - 100.0 * 0.01f64.sin()).abs() < 1e-10);

        let cond = convert_spectrum(&row, DataFormat::RmagRpha, DataFormat::CreCim);
        assert!((cond[0].hypot(cond[2]) - 0.01).abs() < 1e-14);
        assert!(cond[2] > 0.0);
    }

    #[test]
    fn ignore_list_and_nan_filtering() {
        let freq = temp_file("f1.dat", "1\n10\n100\n1000\n");
        let data = temp_file(
            "d1.dat",
            "100 90 80 70 1 2 3 4\n\
             100 nan 80 70 1 2 3 4\n\
             nan nan nan 70 1 2 3 4\n\
             1 2 3\n",
        );
        let mut opts = options(freq, data);
        opts.ignore = vec![2];

        let ingested = load_spectra(&opts).unwrap();
        assert_eq!(ingested.frequencies, vec![1.0, 10.0, 1000.0]);
        assert_eq!(ingested.spectra.len(), 4);

        let first = ingested.spectra[0].as_ref().unwrap();
        assert_eq!(first.data(), &[100.0, 90.0, 70.0, 1.0, 2.0, 4.0]);

        let second = ingested.spectra[1].as_ref().unwrap();
        assert_eq!(second.frequencies(), &[1.0, 1000.0]);
        assert_eq!(second.data(), &[100.0, 70.0, 1.0, 4.0]);
        assert!(ingested.raw[1][1].is_nan());

        assert!(matches!(ingested.spectra[2], Err(InversionError::InvalidSpectrum(_))));
        assert!(matches!(ingested.spectra[3], Err(InversionError::InvalidSpectrum(_))));
        assert!(ingested.raw[3].is_empty());
        assert_eq!(ingested.rejected(), 2);
    }

    #[test]
    fn all_nan_spectrum_is_rejected() {
        let err = filter_nan(&[1.0, 2.0], &[f64::NAN; 4]).unwrap_err();
        assert!(matches!(err, InversionError::InvalidSpectrum(_)));
    }

    #[test]
    fn out_of_range_ignore_index_is_fatal() {
        let freq = temp_file("f2.dat", "1\n10\n");
        let data = temp_file("d2.dat", "1 1 0.1 0.1\n");
        let mut opts = options(freq, data);
        opts.ignore = vec![5];
        assert_eq!(load_spectra(&opts).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn normalization_scales_lowest_frequency_magnitude() {
        let freq = temp_file("f3.dat", "10\n1\n");
        let data = temp_file("d3.dat", "30 50 40 0\n");
        let mut opts = options(freq, data);
        opts.norm_mag = Some(10.0);

        let ingested = load_spectra(&opts).unwrap();
        let factors = ingested.norm_factors.as_ref().unwrap();
        // Lowest frequency is the second column: |50 + 0j| = 50.
        assert!((factors[0] - 0.2).abs() < 1e-15);
        let spectrum = ingested.spectra[0].as_ref().unwrap();
        assert!((spectrum.data()[1] - 10.0).abs() < 1e-12);
        assert_eq!(ingested.raw[0], vec![30.0, 50.0, 40.0, 0.0]);
    }

    #[test]
    fn empty_data_file_has_no_spectra() {
        let freq = temp_file("f4.dat", "1\n10\n");
        let data = temp_file("d4.dat", "\n");
        assert_eq!(load_spectra(&options(freq, data)).unwrap_err().exit_code(), 3);
    }
}
