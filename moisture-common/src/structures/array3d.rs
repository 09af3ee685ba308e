use std::io::{Error, ErrorKind};

/// A layered row-major array: `layers x rows x columns`.
#[derive(Clone, Debug, PartialEq)]
pub struct Array3D<T: Copy> {
    pub layers: usize,
    pub rows: usize,
    pub columns: usize,
    data: Vec<T>,
}

impl<T: Copy> Array3D<T> {
    pub fn new(layers: usize, rows: usize, columns: usize, initial_value: T) -> Array3D<T> {
        Array3D {
            layers,
            rows,
            columns,
            data: vec![initial_value; layers * rows * columns],
        }
    }

    pub fn from_vec(layers: usize, rows: usize, columns: usize, data: Vec<T>) -> Result<Array3D<T>, Error> {
        if data.len() != layers * rows * columns {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "Data length {} does not match a {} x {} x {} array.",
                    data.len(),
                    layers,
                    rows,
                    columns
                ),
            ));
        }
        Ok(Array3D {
            layers,
            rows,
            columns,
            data,
        })
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.layers, self.rows, self.columns)
    }

    pub fn layer_len(&self) -> usize {
        self.rows * self.columns
    }

    pub fn get_value(&self, layer: usize, row: usize, column: usize) -> T {
        self.data[(layer * self.rows + row) * self.columns + column]
    }

    pub fn set_value(&mut self, layer: usize, row: usize, column: usize, value: T) {
        let idx = (layer * self.rows + row) * self.columns + column;
        self.data[idx] = value;
    }

    pub fn layer(&self, layer: usize) -> &[T] {
        let n = self.layer_len();
        &self.data[layer * n..(layer + 1) * n]
    }

    pub fn layer_mut(&mut self, layer: usize) -> &mut [T] {
        let n = self.layer_len();
        &mut self.data[layer * n..(layer + 1) * n]
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_addressing() {
        let mut a = Array3D::new(3, 2, 2, 0i32);
        a.set_value(1, 1, 0, 7);
        assert_eq!(a.layer(1), &[0, 0, 7, 0]);
        assert_eq!(a.as_slice()[6], 7);
        a.layer_mut(2)[3] = 9;
        assert_eq!(a.get_value(2, 1, 1), 9);
    }
}
