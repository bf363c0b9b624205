//! Feature vector boundary: standardization statistics and CSV persistence.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Per-dimension mean and standard deviation applied as `(v - mean) / std`.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Standardizer {
    pub fn new(mean: Vec<f32>, std: Vec<f32>) -> Result<Self> {
        if mean.len() != std.len() {
            return Err(Error::LengthMismatch {
                expected: mean.len(),
                actual: std.len(),
            });
        }
        Ok(Self { mean, std })
    }

    /// Load statistics from two text files holding one value per line.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(mean_path: P, std_path: Q) -> Result<Self> {
        let mean = parse_values(&fs::read_to_string(mean_path.as_ref())?)?;
        let std = parse_values(&fs::read_to_string(std_path.as_ref())?)?;
        debug!(
            mean = %mean_path.as_ref().display(),
            std = %std_path.as_ref().display(),
            len = mean.len(),
            "loaded standardization statistics"
        );
        Self::new(mean, std)
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Standardize `values` in place. The vector must have exactly
    /// [`len`](Self::len) entries; nothing is modified otherwise.
    pub fn apply(&self, values: &mut [f32]) -> Result<()> {
        if values.len() != self.mean.len() {
            return Err(Error::LengthMismatch {
                expected: self.mean.len(),
                actual: values.len(),
            });
        }
        for ((v, m), s) in values.iter_mut().zip(&self.mean).zip(&self.std) {
            *v = (*v - m) / s;
        }
        Ok(())
    }
}

/// Parse whitespace-separated decimal values.
pub fn parse_values(text: &str) -> Result<Vec<f32>> {
    let mut values = Vec::new();
    for (i, line) in text.lines().enumerate() {
        for token in line.split_whitespace() {
            let value = token.parse().map_err(|_| Error::Parse {
                line: i + 1,
                value: token.to_string(),
            })?;
            values.push(value);
        }
    }
    Ok(values)
}

/// Write `values` as comma-separated fixed-point decimals, NaN as `0.000000`.
///
/// No separator follows the last value.
pub fn write_csv<W: Write>(mut writer: W, values: &[f32]) -> Result<()> {
    let mut nans = 0usize;
    for (i, &v) in values.iter().enumerate() {
        if i > 0 {
            writer.write_all(b",")?;
        }
        let v = if v.is_nan() {
            nans += 1;
            0.0
        } else {
            v
        };
        write!(writer, "{v:.6}")?;
    }
    writer.flush()?;
    if nans > 0 {
        warn!(nans, "wrote NaN feature values as 0.0");
    }
    Ok(())
}

/// Save `values` to `path` in the [`write_csv`] format.
pub fn save_csv<P: AsRef<Path>>(path: P, values: &[f32]) -> Result<()> {
    let file = File::create(path)?;
    write_csv(BufWriter::new(file), values)
}

/// Read a vector written by [`save_csv`].
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<f32>> {
    let text = fs::read_to_string(path)?;
    let mut values = Vec::new();
    for (i, line) in text.lines().enumerate() {
        for token in line.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let value = token.parse().map_err(|_| Error::Parse {
                line: i + 1,
                value: token.to_string(),
            })?;
            values.push(value);
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_format() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &[0.5, f32::NAN, -1.25]).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "0.500000,0.000000,-1.250000"
        );
    }

    #[test]
    fn csv_single_and_empty() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &[2.0]).unwrap();
        assert_eq!(buf, b"2.000000");

        let mut buf = Vec::new();
        write_csv(&mut buf, &[]).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn save_and_load_csv() {
        let path = std::env::temp_dir().join("lbp_face_vector_test.csv");
        save_csv(&path, &[0.25, 1.0, f32::NAN]).unwrap();

        let loaded = load_csv(&path).unwrap();
        assert_eq!(loaded, vec![0.25, 1.0, 0.0]);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn parse_values_reports_line() {
        assert_eq!(parse_values("1.5\n-2\n\n3e-1\n").unwrap(), vec![1.5, -2.0, 0.3]);

        match parse_values("1.0\nabc\n") {
            Err(Error::Parse { line, value }) => {
                assert_eq!(line, 2);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn standardize() {
        let stats = Standardizer::new(vec![1.0, 2.0], vec![2.0, 0.5]).unwrap();
        let mut v = [3.0, 1.0];
        stats.apply(&mut v).unwrap();
        assert!((v[0] - 1.0).abs() < 1e-6);
        assert!((v[1] + 2.0).abs() < 1e-6);
    }

    #[test]
    fn standardize_length_mismatch() {
        assert!(matches!(
            Standardizer::new(vec![0.0; 3], vec![1.0; 2]),
            Err(Error::LengthMismatch {
                expected: 3,
                actual: 2
            })
        ));

        let stats = Standardizer::new(vec![0.0; 3], vec![1.0; 3]).unwrap();
        let mut v = [5.0; 4];
        assert!(matches!(
            stats.apply(&mut v),
            Err(Error::LengthMismatch {
                expected: 3,
                actual: 4
            })
        ));
        assert_eq!(v, [5.0; 4]);
    }

    #[test]
    fn load_statistics_from_files() {
        let dir = std::env::temp_dir();
        let mean_path = dir.join("lbp_face_mean_test.txt");
        let std_path = dir.join("lbp_face_std_test.txt");
        std::fs::write(&mean_path, "0.5\n0.25\n").unwrap();
        std::fs::write(&std_path, "2.0\n4.0\n").unwrap();

        let stats = Standardizer::load(&mean_path, &std_path).unwrap();
        assert_eq!(stats.len(), 2);
        let mut v = [1.5, 0.25];
        stats.apply(&mut v).unwrap();
        assert!((v[0] - 0.5).abs() < 1e-6);
        assert!(v[1].abs() < 1e-6);

        std::fs::remove_file(mean_path).ok();
        std::fs::remove_file(std_path).ok();
    }
}
