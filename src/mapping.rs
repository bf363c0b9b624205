//! Pattern-equivalence mappings from raw 8-neighbor comparison codes to
//! descriptor classes.

use serde::{Deserialize, Serialize};

/// Maps an 8-bit neighbor comparison pattern to a descriptor class.
///
/// The extractor only depends on this capability, so alternative groupings can
/// be plugged in without touching the pooling code. Implementations must be
/// total: every `u8` maps to a class in `0..class_count()`.
pub trait PatternClassifier {
    /// Number of distinct output classes.
    fn class_count(&self) -> usize;

    /// Class index of `pattern`, in `0..class_count()`.
    fn classify(&self, pattern: u8) -> usize;
}

/// Supported pattern grouping policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingKind {
    /// Uniform patterns: one circular run of 1 to 7 set bits gets its own
    /// class per (rotation, run length); flat and non-uniform patterns share
    /// two trailing classes.
    Uniform,
}

/// Number of classes produced by [`MappingKind::Uniform`].
pub const UNIFORM_CLASSES: usize = 58;

/// A dense 256-entry lookup table from pattern to class.
///
/// Built once and never mutated, so a single mapper can be shared across
/// threads and extraction calls.
///
/// Deserialized mappers must match the table their `kind` and `transposed`
/// flag build, so a stored table can never yield an out-of-range class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMapper")]
pub struct PatternMapper {
    kind: MappingKind,
    transposed: bool,
    class_count: usize,
    #[serde(serialize_with = "table_serde::serialize")]
    table: [u8; 256],
}

/// Unchecked wire form of [`PatternMapper`].
#[derive(Deserialize)]
struct RawMapper {
    kind: MappingKind,
    transposed: bool,
    class_count: usize,
    #[serde(deserialize_with = "table_serde::deserialize")]
    table: [u8; 256],
}

impl TryFrom<RawMapper> for PatternMapper {
    type Error = String;

    fn try_from(raw: RawMapper) -> Result<Self, Self::Error> {
        let expected = Self::new(raw.kind, raw.transposed);
        if raw.class_count != expected.class_count {
            return Err(format!(
                "{:?} mapping has {} classes, found {}",
                raw.kind, expected.class_count, raw.class_count
            ));
        }
        if let Some(pattern) = (0..256).find(|&p| raw.table[p] != expected.table[p]) {
            return Err(format!(
                "pattern {pattern:#04x} maps to class {}, expected {}",
                raw.table[pattern], expected.table[pattern]
            ));
        }
        Ok(expected)
    }
}

impl PatternMapper {
    /// Build the mapping for the given grouping policy.
    ///
    /// `transposed` relabels the run start positions as if the image axes were
    /// swapped, for callers feeding column-major buffers.
    pub fn new(kind: MappingKind, transposed: bool) -> Self {
        match kind {
            MappingKind::Uniform => Self::uniform(transposed),
        }
    }

    /// Build the 58-class uniform mapping.
    pub fn uniform(transposed: bool) -> Self {
        let mut table = [0u8; 256];
        let non_uniform = Self::non_uniform_class(UNIFORM_CLASSES) as u8;
        let flat = Self::flat_class(UNIFORM_CLASSES) as u8;

        table.fill(non_uniform);
        table[0x00] = flat;
        table[0xff] = flat;

        for offset in 0..8u32 {
            for run in 1..=7u32 {
                let start = if transposed {
                    (2 + 16 - offset - (run - 1)) % 8
                } else {
                    offset
                };
                let pattern = (((1u32 << run) - 1) as u8).rotate_left(start);
                table[pattern as usize] = (offset * 7 + (run - 1)) as u8;
            }
        }

        Self {
            kind: MappingKind::Uniform,
            transposed,
            class_count: UNIFORM_CLASSES,
            table,
        }
    }

    /// Class shared by the all-zero and all-one patterns.
    pub const fn flat_class(class_count: usize) -> usize {
        class_count - 2
    }

    /// Catch-all class for patterns with more than two transitions.
    pub const fn non_uniform_class(class_count: usize) -> usize {
        class_count - 1
    }

    pub fn kind(&self) -> MappingKind {
        self.kind
    }

    pub fn is_transposed(&self) -> bool {
        self.transposed
    }

    /// The raw lookup table.
    pub fn table(&self) -> &[u8; 256] {
        &self.table
    }
}

impl PatternClassifier for PatternMapper {
    fn class_count(&self) -> usize {
        self.class_count
    }

    #[inline]
    fn classify(&self, pattern: u8) -> usize {
        self.table[pattern as usize] as usize
    }
}

// serde only derives array impls up to 32 elements.
mod table_serde {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(table: &[u8; 256], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(table)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 256], D::Error> {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        bytes
            .try_into()
            .map_err(|v: Vec<u8>| D::Error::invalid_length(v.len(), &"256 table entries"))
    }
}
