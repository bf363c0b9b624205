use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mapping::{MappingKind, PatternMapper};
use crate::types::Region;
use crate::vector::Standardizer;

/// Cell side used when nothing else is configured, matching a 64 pixel
/// detection window described by a single cell.
pub const DEFAULT_CELL_SIZE: usize = 64;

/// Settings for describing an image, loadable from JSON.
///
/// Every field is optional in the file; missing fields take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorConfig {
    pub mapping: MappingKind,
    pub cell_size: usize,
    pub transposed: bool,
    /// Describe only this part of the image.
    pub region: Option<Region>,
    /// Mean statistics file, one value per line.
    pub mean: Option<PathBuf>,
    /// Standard deviation statistics file, one value per line.
    pub std: Option<PathBuf>,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            mapping: MappingKind::Uniform,
            cell_size: DEFAULT_CELL_SIZE,
            transposed: false,
            region: None,
            mean: None,
            std: None,
        }
    }
}

impl DescriptorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cell_size == 0 {
            return Err(Error::InvalidConfig("cell_size must be positive".into()));
        }
        if self.mean.is_some() != self.std.is_some() {
            return Err(Error::InvalidConfig(
                "mean and std statistics must be given together".into(),
            ));
        }
        Ok(())
    }

    pub fn mapper(&self) -> PatternMapper {
        PatternMapper::new(self.mapping, self.transposed)
    }

    /// Load the configured standardization statistics, if any.
    pub fn standardizer(&self) -> Result<Option<Standardizer>> {
        match (&self.mean, &self.std) {
            (Some(mean), Some(std)) => Standardizer::load(mean, std).map(Some),
            (None, None) => Ok(None),
            _ => Err(Error::InvalidConfig(
                "mean and std statistics must be given together".into(),
            )),
        }
    }
}
