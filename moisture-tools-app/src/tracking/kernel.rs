//! Access to the monthly transport kernel.
//!
//! The kernel for one month is a 4-D tensor indexed
//! `(source_lat, source_lon, dest_lat, dest_lon)`. On the 0.5° global grid a
//! single month is tens of gigabytes, so the file-backed kernel only ever
//! reads the two 2-D slices that touch one cell. A month is opened once and
//! then serves the slices of every cell of a batch.

use crate::errors::TrackingError;
use crate::netcdf_io;
use std::fmt;
use std::path::{Path, PathBuf};

/// Calendar month, 1 to 12.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month(u8);

impl Month {
    pub fn new(month: u8) -> Result<Month, TrackingError> {
        if (1..=12).contains(&month) {
            Ok(Month(month))
        } else {
            Err(TrackingError::Configuration(format!(
                "month must lie in 1..=12, got {}",
                month
            )))
        }
    }

    pub fn all() -> impl Iterator<Item = Month> {
        (1..=12u8).map(Month)
    }

    pub fn number(&self) -> u8 {
        self.0
    }

    /// Zero-based position along a month axis.
    pub fn index(&self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// The two kernel slices through one grid cell, row-major over the grid.
/// Unresolved kernel entries are `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelSlices {
    /// Transport from the cell to every destination.
    pub outgoing: Vec<Option<f64>>,
    /// Transport into the cell from every source.
    pub incoming: Vec<Option<f64>>,
}

pub trait TransportKernel: Send + Sync {
    /// Grid shape `(rows, columns)` the kernel is defined on.
    fn shape(&self) -> (usize, usize);

    fn open_month(&self, month: Month) -> Result<Box<dyn KernelMonth + '_>, TrackingError>;
}

/// One opened month of a kernel.
pub trait KernelMonth {
    fn month(&self) -> Month;

    fn slices(&self, row: usize, column: usize) -> Result<KernelSlices, TrackingError>;
}

/// One NetCDF file per month, named `{prefix}{MM}.nc`, holding a 4-D variable.
#[derive(Clone, Debug)]
pub struct NetcdfKernel {
    dir: PathBuf,
    file_prefix: String,
    variable: String,
    rows: usize,
    columns: usize,
}

impl NetcdfKernel {
    pub fn new(dir: &Path, file_prefix: &str, variable: &str, rows: usize, columns: usize) -> NetcdfKernel {
        NetcdfKernel {
            dir: dir.to_path_buf(),
            file_prefix: file_prefix.to_string(),
            variable: variable.to_string(),
            rows,
            columns,
        }
    }

    pub fn month_path(&self, month: Month) -> PathBuf {
        self.dir.join(format!("{}{}.nc", self.file_prefix, month))
    }

    /// Checks that every month file exists and has the expected shape.
    pub fn verify(&self) -> Result<(), TrackingError> {
        for month in Month::all() {
            self.open(month)?;
        }
        Ok(())
    }

    fn open(&self, month: Month) -> Result<netcdf::File, TrackingError> {
        let file = netcdf_io::open(&self.month_path(month), "transport kernel")?;
        let shape = netcdf_io::shape(&netcdf_io::variable(&file, &self.variable)?);
        let expected = vec![self.rows, self.columns, self.rows, self.columns];
        if shape != expected {
            return Err(TrackingError::mismatch(
                format!("kernel month {}", month),
                format!("'{}' has shape {:?}, expected {:?}", self.variable, shape, expected),
            ));
        }
        Ok(file)
    }
}

impl TransportKernel for NetcdfKernel {
    fn shape(&self) -> (usize, usize) {
        (self.rows, self.columns)
    }

    fn open_month(&self, month: Month) -> Result<Box<dyn KernelMonth + '_>, TrackingError> {
        Ok(Box::new(NetcdfKernelMonth {
            kernel: self,
            month,
            file: self.open(month)?,
        }))
    }
}

struct NetcdfKernelMonth<'a> {
    kernel: &'a NetcdfKernel,
    month: Month,
    file: netcdf::File,
}

impl KernelMonth for NetcdfKernelMonth<'_> {
    fn month(&self) -> Month {
        self.month
    }

    fn slices(&self, row: usize, column: usize) -> Result<KernelSlices, TrackingError> {
        let (r, c) = (self.kernel.rows, self.kernel.columns);
        let var = netcdf_io::variable(&self.file, &self.kernel.variable)?;
        let outgoing = netcdf_io::read_slab_f64(&var, &[row, column, 0, 0], &[1, 1, r, c])?;
        let incoming = netcdf_io::read_slab_f64(&var, &[0, 0, row, column], &[r, c, 1, 1])?;
        Ok(KernelSlices {
            outgoing: to_optional(outgoing),
            incoming: to_optional(incoming),
        })
    }
}

fn to_optional(values: Vec<f64>) -> Vec<Option<f64>> {
    values
        .into_iter()
        .map(|v| if v.is_nan() { None } else { Some(v) })
        .collect()
}

/// An in-memory kernel for small grids.
#[derive(Clone, Debug)]
pub struct DenseKernel {
    rows: usize,
    columns: usize,
    // month, source cell, destination cell
    data: Vec<f64>,
}

impl DenseKernel {
    /// Builds the kernel from `f(month, src_row, src_col, dst_row, dst_col)`.
    pub fn from_fn<F>(rows: usize, columns: usize, f: F) -> DenseKernel
    where
        F: Fn(Month, usize, usize, usize, usize) -> f64,
    {
        let cells = rows * columns;
        let mut data = Vec::with_capacity(12 * cells * cells);
        for month in Month::all() {
            for src in 0..cells {
                for dst in 0..cells {
                    data.push(f(month, src / columns, src % columns, dst / columns, dst % columns));
                }
            }
        }
        DenseKernel { rows, columns, data }
    }

    fn value(&self, month: Month, src: usize, dst: usize) -> f64 {
        let cells = self.rows * self.columns;
        self.data[(month.index() * cells + src) * cells + dst]
    }
}

impl TransportKernel for DenseKernel {
    fn shape(&self) -> (usize, usize) {
        (self.rows, self.columns)
    }

    fn open_month(&self, month: Month) -> Result<Box<dyn KernelMonth + '_>, TrackingError> {
        Ok(Box::new(DenseKernelMonth { kernel: self, month }))
    }
}

struct DenseKernelMonth<'a> {
    kernel: &'a DenseKernel,
    month: Month,
}

impl KernelMonth for DenseKernelMonth<'_> {
    fn month(&self) -> Month {
        self.month
    }

    fn slices(&self, row: usize, column: usize) -> Result<KernelSlices, TrackingError> {
        let k = self.kernel;
        let cells = k.rows * k.columns;
        let cell = row * k.columns + column;
        let outgoing = (0..cells).map(|dst| k.value(self.month, cell, dst)).collect();
        let incoming = (0..cells).map(|src| k.value(self.month, src, cell)).collect();
        Ok(KernelSlices {
            outgoing: to_optional(outgoing),
            incoming: to_optional(incoming),
        })
    }
}
