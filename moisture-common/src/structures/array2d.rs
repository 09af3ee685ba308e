use std::io::{Error, ErrorKind};
use std::ops::{Index, IndexMut};

/// A row-major 2-D array. Reads outside the array return `nodata`.
#[derive(Clone, Debug, PartialEq)]
pub struct Array2D<T: Copy> {
    pub rows: isize,
    pub columns: isize,
    data: Vec<T>,
    pub nodata: T,
}

impl<T: Copy> Array2D<T> {
    pub fn new(rows: isize, columns: isize, initial_value: T, nodata: T) -> Result<Array2D<T>, Error> {
        if rows < 0 || columns < 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Only non-negative rows and columns values are accepted.",
            ));
        }
        Ok(Array2D {
            rows,
            columns,
            data: vec![initial_value; (rows * columns) as usize],
            nodata,
        })
    }

    /// Wraps existing row-major data.
    pub fn from_vec(rows: isize, columns: isize, data: Vec<T>, nodata: T) -> Result<Array2D<T>, Error> {
        if rows < 0 || columns < 0 || data.len() != (rows * columns) as usize {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "Data length {} does not match a {} x {} array.",
                    data.len(),
                    rows,
                    columns
                ),
            ));
        }
        Ok(Array2D {
            rows,
            columns,
            data,
            nodata,
        })
    }

    pub fn get_value(&self, row: isize, column: isize) -> T {
        if row < 0 || column < 0 || row >= self.rows || column >= self.columns {
            return self.nodata;
        }
        self.data[(row * self.columns + column) as usize]
    }

    pub fn set_value(&mut self, row: isize, column: isize, value: T) {
        if row >= 0 && column >= 0 && row < self.rows && column < self.columns {
            self.data[(row * self.columns + column) as usize] = value;
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Builds a new array by applying `f` to every cell.
    pub fn map<U: Copy, F: Fn(T) -> U>(&self, f: F, nodata: U) -> Array2D<U> {
        Array2D {
            rows: self.rows,
            columns: self.columns,
            data: self.data.iter().map(|v| f(*v)).collect(),
            nodata,
        }
    }
}

impl<T: Copy> Index<(isize, isize)> for Array2D<T> {
    type Output = T;

    fn index(&self, index: (isize, isize)) -> &T {
        let (row, column) = index;
        if row < 0 || column < 0 || row >= self.rows || column >= self.columns {
            return &self.nodata;
        }
        &self.data[(row * self.columns + column) as usize]
    }
}

impl<T: Copy> IndexMut<(isize, isize)> for Array2D<T> {
    fn index_mut(&mut self, index: (isize, isize)) -> &mut T {
        let (row, column) = index;
        if row < 0 || column < 0 || row >= self.rows || column >= self.columns {
            panic!(
                "Array2D index ({}, {}) out of bounds for {} x {}",
                row, column, self.rows, self.columns
            );
        }
        &mut self.data[(row * self.columns + column) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_reads_nodata() {
        let mut a = Array2D::new(2, 3, 0f64, -1f64).unwrap();
        a.set_value(1, 2, 5.0);
        assert_eq!(a.get_value(1, 2), 5.0);
        assert_eq!(a.get_value(2, 0), -1.0);
        assert_eq!(a[(-1, 0)], -1.0);
        assert_eq!(a.as_slice()[5], 5.0);
    }

    #[test]
    fn test_from_vec_checks_length() {
        assert!(Array2D::from_vec(2, 2, vec![1u8; 3], 0u8).is_err());
        let a = Array2D::from_vec(2, 2, vec![1u8, 2, 3, 4], 0u8).unwrap();
        assert_eq!(a[(1, 0)], 3);
    }
}
