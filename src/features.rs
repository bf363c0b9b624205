//! Dense LBP extraction with bilinear pooling into a grid of cells.

#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::mapping::PatternClassifier;
use crate::types::{CellGrid, Region};

/// Added to each cell norm so empty cells normalize to zero instead of NaN.
pub const NORM_EPSILON: f32 = 1e-10;

/// An owned row-major grayscale image with real-valued intensities.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayImage {
    data: Vec<f32>,
    width: usize,
    height: usize,
}

impl GrayImage {
    pub fn new(data: Vec<f32>, width: usize, height: usize) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::InvalidImage {
                len: data.len(),
                width,
                height,
                stride: width,
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn from_fn<F>(width: usize, height: usize, f: F) -> Self
    where
        F: Fn(usize, usize) -> f32,
    {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// Convert an 8-bit luma image from the `image` crate.
    pub fn from_luma(image: &image::GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.as_raw().iter().map(|&v| v as f32).collect(),
            width: width as usize,
            height: height as usize,
        }
    }

    pub fn view(&self) -> ImageView<'_> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// A borrowed, possibly strided, window onto a row-major intensity buffer.
///
/// Row `y` starts at `data[y * stride]`; sub-regions share the parent buffer.
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    data: &'a [f32],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a> ImageView<'a> {
    /// View a densely packed `width` x `height` buffer.
    pub fn new(data: &'a [f32], width: usize, height: usize) -> Result<Self> {
        Self::with_stride(data, width, height, width)
    }

    pub fn with_stride(data: &'a [f32], width: usize, height: usize, stride: usize) -> Result<Self> {
        let needed = if width == 0 || height == 0 {
            0
        } else {
            (height - 1) * stride + width
        };
        if stride < width || data.len() < needed {
            return Err(Error::InvalidImage {
                len: data.len(),
                width,
                height,
                stride,
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Zero-copy view of `region`, which must lie inside this view.
    pub fn region(&self, region: &Region) -> Result<ImageView<'a>> {
        if region.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "region {}x{} at ({}, {}) is empty",
                region.width, region.height, region.x, region.y
            )));
        }
        if region.right() > self.width || region.bottom() > self.height {
            return Err(Error::RegionOutOfBounds {
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
                image_width: self.width,
                image_height: self.height,
            });
        }
        let data: &'a [f32] = self.data;
        let start = region.y * self.stride + region.x;
        Ok(ImageView {
            data: &data[start..],
            width: region.width,
            height: region.height,
            stride: self.stride,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn row(&self, y: usize) -> &'a [f32] {
        let data: &'a [f32] = self.data;
        let start = y * self.stride;
        &data[start..start + self.width]
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.row(y)[x]
    }
}

/// How a pixel's weight splits between the two nearest cell centers along one
/// axis. `lo` may be -1 or `cells` for pixels outside the outermost centers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AxisSplit {
    pub lo: isize,
    pub w_lo: f32,
    pub w_hi: f32,
}

impl AxisSplit {
    /// `pos` is a sample coordinate in pixels (pixel `x` has its center at
    /// `x + 0.5`). Cell `c` has its center at `(c + 0.5) * cell_size`.
    #[inline]
    pub fn at(pos: f32, cell_size: f32) -> Self {
        let t = pos / cell_size - 0.5;
        let lo = t.floor();
        let w_hi = t - lo;
        Self {
            lo: lo as isize,
            w_lo: 1.0 - w_hi,
            w_hi,
        }
    }
}

/// Neighbor comparison code of interior pixel `x` given its row and the rows
/// above and below. Bit k is set when neighbor k is strictly brighter than the
/// center, clockwise from east: E, SE, S, SW, W, NW, N, NE.
#[inline]
fn local_pattern(above: &[f32], row: &[f32], below: &[f32], x: usize) -> u8 {
    let center = row[x];
    let neighbors = [
        row[x + 1],
        below[x + 1],
        below[x],
        below[x - 1],
        row[x - 1],
        above[x - 1],
        above[x],
        above[x + 1],
    ];
    neighbors
        .iter()
        .enumerate()
        .fold(0u8, |bits, (k, &v)| if v > center { bits | (1 << k) } else { bits })
}

/// Accumulate raw bilinear weights into `out` without normalizing.
///
/// `out` must be zeroed and sized for `grid`.
pub(crate) fn accumulate<C>(
    classifier: &C,
    image: &ImageView<'_>,
    cell_size: usize,
    grid: &CellGrid,
    out: &mut [f32],
) where
    C: PatternClassifier + ?Sized,
{
    let (width, height) = (image.width(), image.height());
    if width < 3 || height < 3 {
        return;
    }

    let cell = cell_size as f32;
    let cols = grid.cols as isize;
    let rows = grid.rows as isize;
    let plane = grid.num_cells();

    for y in 1..height - 1 {
        let sy = AxisSplit::at(y as f32 + 0.5, cell);
        // Cell indices only grow with y
        if sy.lo >= rows {
            break;
        }
        let (above, row, below) = (image.row(y - 1), image.row(y), image.row(y + 1));

        for x in 1..width - 1 {
            let sx = AxisSplit::at(x as f32 + 0.5, cell);
            if sx.lo >= cols {
                break;
            }

            let class = classifier.classify(local_pattern(above, row, below, x));
            debug_assert!(class < grid.classes);
            let base = class * plane;

            for (cy, wy) in [(sy.lo, sy.w_lo), (sy.lo + 1, sy.w_hi)] {
                if cy < 0 || cy >= rows {
                    continue;
                }
                let row_base = base + cy as usize * grid.cols;
                for (cx, wx) in [(sx.lo, sx.w_lo), (sx.lo + 1, sx.w_hi)] {
                    if cx < 0 || cx >= cols {
                        continue;
                    }
                    out[row_base + cx as usize] += wx * wy;
                }
            }
        }
    }
}

/// Square-root (Hellinger) normalization of each cell histogram.
pub(crate) fn normalize_cells(grid: &CellGrid, out: &mut [f32]) {
    let plane = grid.num_cells();
    for cell in 0..plane {
        let energy: f32 = (0..grid.classes).map(|k| out[k * plane + cell]).sum();
        let norm = energy.sqrt() + NORM_EPSILON;
        for k in 0..grid.classes {
            let v = &mut out[k * plane + cell];
            *v = v.sqrt() / norm;
        }
    }
}

/// Compute a dense LBP descriptor of `image` into the caller's buffer.
///
/// `out` must hold exactly `class_count * cols * rows` values, where
/// `cols = width / cell_size` and `rows = height / cell_size`; it is laid out
/// as described on [`CellGrid`]. Every pixel except the one-pixel border adds
/// its pattern class to the (up to) four cells whose centers surround it,
/// weighted bilinearly. Each cell is then square-root normalized.
///
/// Configuration and buffer-size errors are reported before `out` is touched.
pub fn extract<C>(
    classifier: &C,
    image: &ImageView<'_>,
    cell_size: usize,
    out: &mut [f32],
) -> Result<CellGrid>
where
    C: PatternClassifier + ?Sized,
{
    let grid = CellGrid::new(
        image.width(),
        image.height(),
        cell_size,
        classifier.class_count(),
    )?;
    if out.len() != grid.len() {
        return Err(Error::BufferSizeMismatch {
            expected: grid.len(),
            actual: out.len(),
        });
    }

    out.fill(0.0);
    accumulate(classifier, image, cell_size, &grid, out);
    normalize_cells(&grid, out);

    debug!(
        width = image.width(),
        height = image.height(),
        cell_size,
        cols = grid.cols,
        rows = grid.rows,
        classes = grid.classes,
        "extracted LBP descriptor"
    );
    Ok(grid)
}

/// [`extract`] over a densely packed row-major buffer.
pub fn extract_slice<C>(
    classifier: &C,
    image: &[f32],
    width: usize,
    height: usize,
    cell_size: usize,
    out: &mut [f32],
) -> Result<CellGrid>
where
    C: PatternClassifier + ?Sized,
{
    let view = ImageView::new(image, width, height)?;
    extract(classifier, &view, cell_size, out)
}

/// An owned descriptor: the accumulator together with its grid shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptor {
    grid: CellGrid,
    values: Vec<f32>,
}

impl Descriptor {
    /// Allocate an accumulator for `image` and extract into it.
    pub fn compute<C>(classifier: &C, image: &ImageView<'_>, cell_size: usize) -> Result<Self>
    where
        C: PatternClassifier + ?Sized,
    {
        let grid = CellGrid::new(
            image.width(),
            image.height(),
            cell_size,
            classifier.class_count(),
        )?;
        let mut values = vec![0.0; grid.len()];
        extract(classifier, image, cell_size, &mut values)?;
        Ok(Self { grid, values })
    }

    pub fn grid(&self) -> CellGrid {
        self.grid
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, class: usize, row: usize, col: usize) -> f32 {
        self.values[self.grid.index(class, row, col)]
    }

    /// The normalized histogram of one cell, in class order.
    pub fn cell(&self, row: usize, col: usize) -> impl Iterator<Item = f32> + '_ {
        let start = self.grid.index(0, row, col);
        self.values
            .iter()
            .skip(start)
            .step_by(self.grid.num_cells())
            .copied()
    }

    /// The flattened feature vector in (class, row, col) order.
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.values
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }
}

/// Describe several regions of one image independently.
///
/// All regions are validated before any extraction runs. With the `rayon`
/// feature the regions are processed in parallel; results keep the order of
/// `regions` either way.
pub fn describe_regions<C>(
    classifier: &C,
    image: &ImageView<'_>,
    regions: &[Region],
    cell_size: usize,
) -> Result<Vec<Descriptor>>
where
    C: PatternClassifier + Sync + ?Sized,
{
    let views = regions
        .iter()
        .map(|region| image.region(region))
        .collect::<Result<Vec<_>>>()?;

    #[cfg(feature = "rayon")]
    let descriptors = views
        .into_par_iter()
        .map(|view| Descriptor::compute(classifier, &view, cell_size))
        .collect();

    #[cfg(not(feature = "rayon"))]
    let descriptors = views
        .iter()
        .map(|view| Descriptor::compute(classifier, view, cell_size))
        .collect();

    descriptors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::PatternMapper;

    fn raw_accumulate(image: &GrayImage, cell_size: usize) -> (CellGrid, Vec<f32>) {
        let mapper = PatternMapper::uniform(false);
        let grid = CellGrid::new(image.width(), image.height(), cell_size, 58).unwrap();
        let mut out = vec![0.0; grid.len()];
        accumulate(&mapper, &image.view(), cell_size, &grid, &mut out);
        (grid, out)
    }

    #[test]
    fn pattern_bit_order() {
        // 3x3 neighborhood, center 5:
        //   NW=9 N=1 NE=9
        //   W=1  c=5 E=9
        //   SW=1 S=9 SE=1
        let above = [9.0, 1.0, 9.0];
        let row = [1.0, 5.0, 9.0];
        let below = [1.0, 9.0, 1.0];
        // E=bit0, S=bit2, NW=bit5, NE=bit7
        assert_eq!(local_pattern(&above, &row, &below, 1), 0b1010_0101);
    }

    #[test]
    fn pattern_is_strictly_greater() {
        let flat = [3.0, 3.0, 3.0];
        assert_eq!(local_pattern(&flat, &flat, &flat, 1), 0);
    }

    #[test]
    fn axis_split_weights() {
        // Pixel 4 with cell size 3 sits on the center of cell 1
        let s = AxisSplit::at(4.5, 3.0);
        assert_eq!(s.lo, 1);
        assert!((s.w_lo - 1.0).abs() < 1e-6);
        assert!(s.w_hi.abs() < 1e-6);

        // Sample halfway between the centers of cells 0 and 1
        let s = AxisSplit::at(4.0, 4.0);
        assert_eq!(s.lo, 0);
        assert!((s.w_lo - 0.5).abs() < 1e-6);
        assert!((s.w_hi - 0.5).abs() < 1e-6);

        // Pixel 1 with cell size 2: a quarter of the way from cell 0 to cell 1
        let s = AxisSplit::at(1.5, 2.0);
        assert_eq!(s.lo, 0);
        assert!((s.w_lo - 0.75).abs() < 1e-6);
        assert!((s.w_hi - 0.25).abs() < 1e-6);

        // Before the first center, the low cell is -1
        let s = AxisSplit::at(1.5, 8.0);
        assert_eq!(s.lo, -1);
        assert!((s.w_lo + s.w_hi - 1.0).abs() < 1e-6);
    }

    #[test]
    fn centered_pixel_lands_in_one_cell() {
        // Only (4, 4) sees a brighter east neighbor, so class 0 receives that
        // single pixel's weight.
        let image = GrayImage::from_fn(9, 9, |x, y| if (x, y) == (5, 4) { 1.0 } else { 0.0 });
        let (grid, out) = raw_accumulate(&image, 3);

        let plane = &out[grid.index(0, 0, 0)..grid.index(1, 0, 0)];
        let total: f32 = plane.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!((out[grid.index(0, 1, 1)] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn interior_weights_sum_to_one() {
        // Every pixel whose four surrounding cells exist contributes unit mass
        let image = GrayImage::from_fn(16, 16, |x, y| ((x * 7 + y * 13) % 5) as f32);
        let (_, out) = raw_accumulate(&image, 4);

        let mut expected = 0.0f32;
        for y in 1..15usize {
            for x in 1..15usize {
                let sx = AxisSplit::at(x as f32 + 0.5, 4.0);
                let sy = AxisSplit::at(y as f32 + 0.5, 4.0);
                let wx = if sx.lo < 0 { sx.w_hi } else if sx.lo + 1 >= 4 { sx.w_lo } else { 1.0 };
                let wy = if sy.lo < 0 { sy.w_hi } else if sy.lo + 1 >= 4 { sy.w_lo } else { 1.0 };
                expected += wx * wy;
            }
        }
        let total: f32 = out.iter().sum();
        assert!((total - expected).abs() < 1e-3, "{total} vs {expected}");
    }

    #[test]
    fn pixels_past_last_center_are_skipped() {
        // 60 / 16 leaves 12 pixels after the last cell; pixels 56 and 57
        // fall past the center of cell 3, which does not exist.
        let flat = GrayImage::from_fn(60, 60, |_, _| 1.0);
        let (grid, out) = raw_accumulate(&flat, 16);
        assert_eq!((grid.cols, grid.rows), (3, 3));

        // Per-axis mass reaching each cell from pixels 1..=55:
        //   cell 0: 7 pixels before its center (5.46875) + 16 after (8)
        //   cells 1, 2: 8 from each side
        let axis = [13.46875f32, 16.0, 16.0];
        let flat_class = PatternMapper::flat_class(58);
        for row in 0..3 {
            for col in 0..3 {
                let v = out[grid.index(flat_class, row, col)];
                let expected = axis[row] * axis[col];
                assert!((v - expected).abs() < 1e-2, "cell ({row}, {col}): {v} vs {expected}");
            }
        }
        let total: f32 = out.iter().sum();
        let axis_total: f32 = axis.iter().sum();
        assert!((total - axis_total * axis_total).abs() < 1e-1);

        // Texture confined to columns and rows >= 57 only changes skipped
        // pixels and the border
        let noisy = GrayImage::from_fn(60, 60, |x, y| {
            if x >= 57 || y >= 57 {
                ((x * 7 + y * 3) % 5) as f32
            } else {
                1.0
            }
        });
        let (_, noisy_out) = raw_accumulate(&noisy, 16);
        assert_eq!(noisy_out, out);
    }

    #[test]
    fn border_contributes_nothing() {
        let image = GrayImage::from_fn(3, 3, |_, _| 7.0);
        let (grid, out) = raw_accumulate(&image, 1);

        for row in 0..3 {
            for col in 0..3 {
                let energy: f32 = (0..58).map(|k| out[grid.index(k, row, col)]).sum();
                if (row, col) == (1, 1) {
                    assert!((energy - 1.0).abs() < 1e-6);
                } else {
                    assert_eq!(energy, 0.0);
                }
            }
        }
    }

    #[test]
    fn empty_cells_normalize_to_zero() {
        let grid = CellGrid::new(2, 2, 1, 58).unwrap();
        let mut out = vec![0.0; grid.len()];
        normalize_cells(&grid, &mut out);
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn normalized_cells_have_unit_energy() {
        let image = GrayImage::from_fn(32, 32, |x, y| ((x * 31 + y * 17) % 23) as f32);
        let mapper = PatternMapper::uniform(false);
        let descriptor = Descriptor::compute(&mapper, &image.view(), 8).unwrap();
        let grid = descriptor.grid();

        for row in 0..grid.rows {
            for col in 0..grid.cols {
                let energy: f32 = descriptor.cell(row, col).map(|v| v * v).sum();
                assert!((energy - 1.0).abs() < 1e-4, "cell ({row}, {col}): {energy}");
            }
        }
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn descriptor_get_checks_bounds() {
        let image = GrayImage::from_fn(32, 16, |x, y| (x ^ y) as f32);
        let descriptor = Descriptor::compute(&PatternMapper::uniform(false), &image.view(), 8).unwrap();
        descriptor.get(0, 0, descriptor.grid().cols);
    }

    #[test]
    fn strided_view_matches_copy() {
        let image = GrayImage::from_fn(40, 30, |x, y| ((x * x + 3 * y) % 11) as f32);
        let region = Region::new(5, 3, 24, 16);
        let view = image.view().region(&region).unwrap();

        let copy = GrayImage::from_fn(24, 16, |x, y| image.view().get(x + 5, y + 3));
        let mapper = PatternMapper::uniform(false);

        let a = Descriptor::compute(&mapper, &view, 8).unwrap();
        let b = Descriptor::compute(&mapper, &copy.view(), 8).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn view_validation() {
        let data = vec![0.0; 10];
        assert!(ImageView::new(&data, 5, 2).is_ok());
        assert!(matches!(
            ImageView::new(&data, 4, 3),
            Err(Error::InvalidImage { .. })
        ));
        assert!(ImageView::with_stride(&data, 2, 3, 4).is_ok());
        assert!(ImageView::with_stride(&data, 5, 2, 4).is_err());

        let view = ImageView::new(&data, 5, 2).unwrap();
        assert!(matches!(
            view.region(&Region::new(3, 0, 3, 1)),
            Err(Error::RegionOutOfBounds { .. })
        ));
        assert!(matches!(
            view.region(&Region::new(0, 0, 0, 1)),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn gray_image_from_luma() {
        let luma = image::GrayImage::from_fn(4, 2, |x, y| image::Luma([(x + 10 * y) as u8]));
        let image = GrayImage::from_luma(&luma);
        assert_eq!(image.width(), 4);
        assert_eq!(image.height(), 2);
        assert_eq!(image.view().get(3, 1), 13.0);
    }
}
