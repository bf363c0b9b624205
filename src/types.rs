use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A rectangular image region in integer pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Region {
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// One past the last column covered by the region.
    pub fn right(&self) -> usize {
        self.x + self.width
    }

    /// One past the last row covered by the region.
    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl FromStr for Region {
    type Err = String;

    /// Parses `x,y,width,height`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(format!(
                "invalid region '{s}', expected x,y,width,height"
            ));
        }
        let mut values = [0usize; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| format!("invalid region component '{part}' in '{s}'"))?;
        }
        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }
}

/// Shape of a descriptor accumulator: `classes` histogram planes over a
/// `cols` x `rows` grid of cells.
///
/// The accumulator is one flat buffer indexed as
/// `class * (cols * rows) + row * cols + col`, i.e. one contiguous plane per
/// class, each plane stored row-major. Flattening a descriptor into a feature
/// vector is therefore the identity on this layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellGrid {
    pub classes: usize,
    pub cols: usize,
    pub rows: usize,
}

impl CellGrid {
    /// Derive the grid for a `width` x `height` image tiled by square cells.
    ///
    /// Partial cells at the right and bottom edges are dropped. Fails with
    /// [`Error::InvalidConfig`] when `cell_size` is zero or the image is too
    /// small to hold a single cell in either axis.
    pub fn new(width: usize, height: usize, cell_size: usize, classes: usize) -> Result<Self> {
        if cell_size == 0 {
            return Err(Error::InvalidConfig("cell size must be positive".into()));
        }
        let cols = width / cell_size;
        let rows = height / cell_size;
        if cols == 0 || rows == 0 {
            return Err(Error::InvalidConfig(format!(
                "a {width}x{height} image holds no {cell_size}x{cell_size} cells"
            )));
        }
        if classes == 0 {
            return Err(Error::InvalidConfig("pattern classes must be positive".into()));
        }
        Ok(Self {
            classes,
            cols,
            rows,
        })
    }

    /// Number of spatial cells (the length of one class plane).
    pub fn num_cells(&self) -> usize {
        self.cols * self.rows
    }

    /// Total number of accumulator values.
    pub fn len(&self) -> usize {
        self.classes * self.num_cells()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat offset of `(class, row, col)`.
    ///
    /// # Panics
    ///
    /// If any coordinate is outside the grid.
    #[inline]
    pub fn index(&self, class: usize, row: usize, col: usize) -> usize {
        assert!(
            class < self.classes && row < self.rows && col < self.cols,
            "({class}, {row}, {col}) outside {}x{}x{} grid",
            self.classes,
            self.rows,
            self.cols
        );
        class * self.num_cells() + row * self.cols + col
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_drops_partial_cells() {
        let grid = CellGrid::new(100, 70, 32, 58).unwrap();
        assert_eq!(grid.cols, 3);
        assert_eq!(grid.rows, 2);
        assert_eq!(grid.num_cells(), 6);
        assert_eq!(grid.len(), 58 * 6);
    }

    #[test]
    fn grid_rejects_zero_cells() {
        assert!(matches!(
            CellGrid::new(64, 64, 0, 58),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            CellGrid::new(63, 128, 64, 58),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            CellGrid::new(128, 10, 16, 58),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn grid_index_is_class_major() {
        let grid = CellGrid::new(12, 8, 4, 3).unwrap();
        // 3 cols x 2 rows = 6 cells per plane
        assert_eq!(grid.index(0, 0, 0), 0);
        assert_eq!(grid.index(0, 0, 2), 2);
        assert_eq!(grid.index(0, 1, 0), 3);
        assert_eq!(grid.index(1, 0, 0), 6);
        assert_eq!(grid.index(2, 1, 2), 17);
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn grid_index_rejects_column_past_edge() {
        let grid = CellGrid::new(12, 8, 4, 3).unwrap();
        // Would alias cell (1, 0) without the check
        grid.index(0, 0, 3);
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn grid_index_rejects_unknown_class() {
        let grid = CellGrid::new(12, 8, 4, 3).unwrap();
        grid.index(3, 0, 0);
    }

    #[test]
    fn region_parsing() {
        let region: Region = "10, 20,64,48".parse().unwrap();
        assert_eq!(region, Region::new(10, 20, 64, 48));
        assert_eq!(region.right(), 74);
        assert_eq!(region.bottom(), 68);

        assert!("1,2,3".parse::<Region>().is_err());
        assert!("1,2,x,4".parse::<Region>().is_err());
    }
}
