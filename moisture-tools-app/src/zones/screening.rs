use crate::errors::TrackingError;
use crate::netcdf_io;
use crate::pool::{RunSummary, UnitStatus, WorkerPool};
use crate::tables::{target_cells_path, Coordinate, CoordinateTable, ZoneId};
use log::{info, warn};
use moisture_common::structures::{Array2D, GridAxes};
use moisture_common::utils::round_to;
use std::path::{Path, PathBuf};

/// A categorical raster of zone ids on a lat/lon lattice. Cells outside every
/// zone hold NaN.
#[derive(Clone, Debug)]
pub struct ZoneRaster {
    ids: Array2D<f64>,
    axes: GridAxes,
}

impl ZoneRaster {
    pub fn new(ids: Array2D<f64>, axes: GridAxes) -> Result<ZoneRaster, TrackingError> {
        if ids.rows as usize != axes.rows() || ids.columns as usize != axes.columns() {
            return Err(TrackingError::mismatch(
                "zone raster",
                format!(
                    "{} x {} raster on {} x {} axes",
                    ids.rows,
                    ids.columns,
                    axes.rows(),
                    axes.columns()
                ),
            ));
        }
        Ok(ZoneRaster { ids, axes })
    }

    /// Reads a 2-D id variable (a leading length-1 dimension is allowed) and
    /// its `lat`/`lon` coordinates.
    pub fn load(path: &Path, variable: &str) -> Result<ZoneRaster, TrackingError> {
        let file = netcdf_io::open(path, "zone raster")?;
        let shape: Vec<usize> = netcdf_io::shape(&netcdf_io::variable(&file, variable)?)
            .into_iter()
            .skip_while(|len| *len == 1)
            .collect();
        if shape.len() != 2 {
            return Err(TrackingError::mismatch(
                "zone raster",
                format!("'{}' in {} is not a 2-D grid", variable, path.display()),
            ));
        }
        let axes = netcdf_io::read_axes(&file)?.ok_or_else(|| {
            TrackingError::mismatch("zone raster", format!("{} has no lat/lon coordinates", path.display()))
        })?;
        let values = netcdf_io::read_f64(&file, variable)?;
        let ids = Array2D::from_vec(shape[0] as isize, shape[1] as isize, values, f64::NAN)?;
        ZoneRaster::new(ids, axes)
    }

    pub fn axes(&self) -> &GridAxes {
        &self.axes
    }

    /// `true` where the cell belongs to zone `id`.
    pub fn mask(&self, id: ZoneId) -> Array2D<bool> {
        self.ids.map(|v| v == id.0 as f64, false)
    }

    pub fn count(&self, id: ZoneId) -> usize {
        let target = id.0 as f64;
        self.ids.as_slice().iter().filter(|v| **v == target).count()
    }

    /// Coordinates of every cell in zone `id`, rounded to 0.01 degrees, in
    /// row-major order.
    pub fn screen(&self, id: ZoneId) -> CoordinateTable {
        let mask = self.mask(id);
        let mut cells = vec![];
        for row in 0..mask.rows {
            for col in 0..mask.columns {
                if mask[(row, col)] {
                    cells.push(Coordinate {
                        lat: round_to(self.axes.lats()[row as usize], 2),
                        lon: round_to(self.axes.lons()[col as usize], 2),
                    });
                }
            }
        }
        CoordinateTable::new(cells)
    }

    /// Every integral id present in the raster, ascending.
    pub fn distinct_ids(&self) -> Vec<ZoneId> {
        let mut ids: Vec<ZoneId> = self
            .ids
            .as_slice()
            .iter()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| ZoneId(*v as i64))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Writes one coordinate table per zone.
pub struct ZoneScreener<'a> {
    raster: &'a ZoneRaster,
    out_dir: PathBuf,
}

impl<'a> ZoneScreener<'a> {
    pub fn new(raster: &'a ZoneRaster, out_dir: &Path) -> ZoneScreener<'a> {
        ZoneScreener {
            raster,
            out_dir: out_dir.to_path_buf(),
        }
    }

    pub fn screen_zone(&self, id: ZoneId) -> Result<UnitStatus, TrackingError> {
        let table = self.raster.screen(id);
        if table.is_empty() {
            warn!("zone {}: no cells in the zone raster", id);
        }
        table.write(&target_cells_path(&self.out_dir, id))?;
        info!("zone {}: {} target cells", id, table.len());
        Ok(UnitStatus::Succeeded)
    }

    pub fn run(&self, pool: &WorkerPool, ids: &[ZoneId]) -> RunSummary {
        pool.run(ids, |id| self.screen_zone(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster() -> ZoneRaster {
        let n = f64::NAN;
        #[rustfmt::skip]
        let ids = vec![
            n,   1.0, 1.0, 2.0,
            3.0, 1.0, n,   2.0,
            1.0, n,   n,   2.0,
        ];
        let axes = GridAxes::regular(1.0, -0.5, 3, 359.0, 0.333, 4);
        ZoneRaster::new(Array2D::from_vec(3, 4, ids, n).unwrap(), axes).unwrap()
    }

    #[test]
    fn test_screen_is_row_major_and_rounded() {
        let raster = raster();
        let table = raster.screen(ZoneId(1));
        assert_eq!(table.len(), raster.count(ZoneId(1)));
        assert_eq!(table.len(), 4);
        let cells: Vec<(f64, f64)> = table.cells.iter().map(|c| (c.lat, c.lon)).collect();
        assert_eq!(cells, vec![(1.0, 359.33), (1.0, 359.67), (0.5, 359.33), (0.0, 359.0)]);
        assert!(raster.screen(ZoneId(7)).is_empty());
    }

    #[test]
    fn test_counts_match_raster() {
        let raster = raster();
        assert_eq!(raster.distinct_ids(), vec![ZoneId(1), ZoneId(2), ZoneId(3)]);
        for id in raster.distinct_ids() {
            let mask = raster.mask(id);
            let in_mask = mask.as_slice().iter().filter(|m| **m).count();
            assert_eq!(raster.screen(id).len(), in_mask);
        }
    }

    #[test]
    fn test_load_and_screen_in_parallel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zones.nc");
        {
            let mut file = netcdf::create(&path).unwrap();
            netcdf_io::put_axes(&mut file, &GridAxes::new(vec![50.0, 49.5], vec![4.0, 4.5])).unwrap();
            let mut band = file.add_variable::<f32>("Band1", &["lat", "lon"]).unwrap();
            band.put_attribute("_FillValue", -9999f32).unwrap();
            band.put_values(&[5.0f32, 5.0, -9999.0, 6.0], ..).unwrap();
        }

        let raster = ZoneRaster::load(&path, "Band1").unwrap();
        assert_eq!(raster.distinct_ids(), vec![ZoneId(5), ZoneId(6)]);

        let out = dir.path().join("target_cells");
        let pool = WorkerPool::new(2).unwrap();
        let summary = ZoneScreener::new(&raster, &out).run(&pool, &[ZoneId(5), ZoneId(6), ZoneId(9)]);
        assert_eq!(summary.succeeded(), 3);
        let five = CoordinateTable::read(&target_cells_path(&out, ZoneId(5))).unwrap();
        assert_eq!(five.cells, vec![Coordinate { lat: 50.0, lon: 4.0 }, Coordinate { lat: 50.0, lon: 4.5 }]);
        assert!(CoordinateTable::read(&target_cells_path(&out, ZoneId(9))).unwrap().is_empty());
    }
}
