use std::ops::Range;

/// Which entries of a matrix carry data.
///
/// Entries outside the populated region are the additive identity (zero). They are never
/// stored and are excluded when a row minimum is taken.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum MatrixShape {
    /// Every entry is populated.
    Dense,

    /// Row `i` is populated in columns `[i - bandwidth, i + bandwidth]`, clipped to the matrix.
    Banded {
        /// How many columns on each side of the diagonal are populated.
        bandwidth: usize,
    },

    /// Row `i` is populated in columns `[0, i]`.
    LowerTriangular,
}

impl MatrixShape {
    /// The populated columns of `row` in a matrix with `cols` columns.
    #[must_use]
    pub fn columns(self, row: usize, cols: usize) -> Range<usize> {
        match self {
            Self::Dense => 0..cols,
            Self::Banded { bandwidth } => {
                let first = row.saturating_sub(bandwidth);
                let end = row.saturating_add(bandwidth).saturating_add(1).min(cols);
                first.min(end)..end
            }
            Self::LowerTriangular => 0..row.saturating_add(1).min(cols),
        }
    }
}

/// An immutable matrix of integers that stores only its populated entries.
///
/// Entries are kept row after row in one allocation, so the length of a row is the amount of
/// work it represents.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    shape: MatrixShape,

    entries: Box<[i32]>,

    // Row `r` occupies `entries[row_starts[r]..row_starts[r + 1]]`.
    row_starts: Box<[usize]>,
}

impl Matrix {
    /// Builds a matrix by asking `entry` for the value of every populated position,
    /// row by row and left to right.
    pub(crate) fn build(
        rows: usize,
        cols: usize,
        shape: MatrixShape,
        mut entry: impl FnMut(usize, usize) -> i32,
    ) -> Self {
        let mut entries = Vec::new();
        let mut row_starts = Vec::with_capacity(rows.saturating_add(1));

        for row in 0..rows {
            row_starts.push(entries.len());
            entries.extend(shape.columns(row, cols).map(|col| entry(row, col)));
        }

        row_starts.push(entries.len());

        Self {
            rows,
            cols,
            shape,
            entries: entries.into_boxed_slice(),
            row_starts: row_starts.into_boxed_slice(),
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Which entries carry data.
    #[must_use]
    pub fn shape(&self) -> MatrixShape {
        self.shape
    }

    /// Number of stored (populated) entries.
    #[must_use]
    pub fn populated_len(&self) -> usize {
        self.entries.len()
    }

    /// The populated entries of `row`, or `None` if the row does not exist.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[i32]> {
        let start = *self.row_starts.get(row)?;
        let end = *self.row_starts.get(row.checked_add(1)?)?;

        self.entries.get(start..end)
    }

    /// The entry at the given position, reading unpopulated positions as zero.
    ///
    /// Returns `None` if the position lies outside the matrix.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<i32> {
        if col >= self.cols {
            return None;
        }

        let populated = self.shape.columns(row, self.cols);
        let entries = self.row(row)?;

        if populated.contains(&col) {
            entries.get(col.checked_sub(populated.start)?).copied()
        } else {
            Some(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banded_columns_are_clipped() {
        let shape = MatrixShape::Banded { bandwidth: 2 };

        assert_eq!(shape.columns(0, 10), 0..3);
        assert_eq!(shape.columns(5, 10), 3..8);
        assert_eq!(shape.columns(9, 10), 7..10);
    }

    #[test]
    fn triangular_columns_grow_with_row() {
        let shape = MatrixShape::LowerTriangular;

        assert_eq!(shape.columns(0, 4), 0..1);
        assert_eq!(shape.columns(3, 4), 0..4);
    }

    #[test]
    fn triangular_stores_only_lower_half() {
        let matrix = Matrix::build(4, 4, MatrixShape::LowerTriangular, |row, col| {
            i32::try_from(row * 10 + col + 1).unwrap()
        });

        assert_eq!(matrix.populated_len(), 10);
        assert_eq!(matrix.row(0).unwrap(), &[1]);
        assert_eq!(matrix.row(3).unwrap(), &[31, 32, 33, 34]);
        assert_eq!(matrix.row(4), None);

        assert_eq!(matrix.get(1, 0), Some(11));
        assert_eq!(matrix.get(1, 3), Some(0));
        assert_eq!(matrix.get(1, 4), None);
        assert_eq!(matrix.get(4, 0), None);
    }

    #[test]
    fn banded_reads_zero_outside_band() {
        let matrix = Matrix::build(6, 6, MatrixShape::Banded { bandwidth: 1 }, |_, _| 7);

        assert_eq!(matrix.row(0).unwrap().len(), 2);
        assert_eq!(matrix.row(3).unwrap().len(), 3);
        assert_eq!(matrix.get(3, 2), Some(7));
        assert_eq!(matrix.get(3, 0), Some(0));
        assert_eq!(matrix.get(3, 5), Some(0));
    }

    #[test]
    fn dense_has_every_entry() {
        let matrix = Matrix::build(3, 5, MatrixShape::Dense, |_, col| {
            i32::try_from(col).unwrap()
        });

        assert_eq!(matrix.populated_len(), 15);
        assert_eq!(matrix.row(2).unwrap(), &[0, 1, 2, 3, 4]);
    }
}
