use super::footprint::{Direction, Footprint, FootprintEngine};
use super::kernel::Month;
use crate::errors::TrackingError;
use crate::pool::Deadline;
use crate::tables::Coordinate;
use log::debug;
use moisture_common::structures::{Array3D, GridAxes};

pub const FOOTPRINT_UNITS: &str = "l/month";

/// Monthly footprint volumes summed over many cells: month x lat x lon.
/// Every value is finite.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateFootprint {
    pub direction: Direction,
    pub grid: Array3D<f64>,
    pub axes: GridAxes,
}

impl AggregateFootprint {
    pub fn zeros(direction: Direction, axes: &GridAxes) -> AggregateFootprint {
        AggregateFootprint {
            direction,
            grid: Array3D::new(12, axes.rows(), axes.columns(), 0.0),
            axes: axes.clone(),
        }
    }

    pub fn units(&self) -> &'static str {
        FOOTPRINT_UNITS
    }

    pub fn description(&self) -> &'static str {
        self.direction.description()
    }

    /// Adds one footprint, counting unresolved cells as 0.
    pub fn accumulate(&mut self, footprint: &Footprint) {
        debug_assert_eq!(footprint.direction, self.direction);
        let layer = self.grid.layer_mut(footprint.month.index());
        for (acc, v) in layer.iter_mut().zip(&footprint.values) {
            if let Some(x) = v {
                if x.is_finite() {
                    *acc += x;
                }
            }
        }
    }

    /// Adds another aggregate of the same direction on the same lattice.
    pub fn merge(&mut self, other: &AggregateFootprint, zone: &str) -> Result<(), TrackingError> {
        if other.direction != self.direction {
            return Err(TrackingError::mismatch(
                zone,
                format!("cannot add a {} footprint to a {} one", other.direction, self.direction),
            ));
        }
        if other.grid.shape() != self.grid.shape() || !other.axes.matches(&self.axes, 1e-9) {
            return Err(TrackingError::mismatch(zone, "lat/lon axes differ between footprints"));
        }
        for (acc, v) in self.grid.as_mut_slice().iter_mut().zip(other.grid.as_slice()) {
            *acc += v;
        }
        Ok(())
    }

    pub fn total(&self) -> f64 {
        self.grid.as_slice().iter().sum()
    }
}

/// The forward and backward aggregates of one batch of cells.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchOutput {
    pub forward: AggregateFootprint,
    pub backward: AggregateFootprint,
}

impl BatchOutput {
    pub fn get(&self, direction: Direction) -> &AggregateFootprint {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Backward => &self.backward,
        }
    }
}

pub struct BatchAggregator<'a> {
    engine: FootprintEngine<'a>,
    deadline: Option<Deadline>,
}

impl<'a> BatchAggregator<'a> {
    pub fn new(engine: FootprintEngine<'a>) -> BatchAggregator<'a> {
        BatchAggregator {
            engine,
            deadline: None,
        }
    }

    /// Abandons the batch with `TimedOut` once `deadline` passes.
    pub fn with_deadline(mut self, deadline: Option<Deadline>) -> BatchAggregator<'a> {
        self.deadline = deadline;
        self
    }

    /// Sums the footprints of every cell over all twelve months.
    pub fn aggregate(&self, cells: &[Coordinate]) -> Result<BatchOutput, TrackingError> {
        let axes = self.engine.axes();
        let mut forward = AggregateFootprint::zeros(Direction::Forward, axes);
        let mut backward = AggregateFootprint::zeros(Direction::Backward, axes);
        for month in Month::all() {
            let kernel = self.engine.open_month(month)?;
            for cell in cells {
                if let Some(deadline) = &self.deadline {
                    deadline.check()?;
                }
                let pair = self.engine.track(kernel.as_ref(), cell.lat, cell.lon)?;
                forward.accumulate(&pair.forward);
                backward.accumulate(&pair.backward);
            }
            debug!("tracked month {} for {} cells", month, cells.len());
        }
        Ok(BatchOutput { forward, backward })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::climatology::FluxClimatology;
    use crate::tracking::kernel::DenseKernel;
    use moisture_common::structures::Array2D;
    use std::time::Duration;

    fn fixture() -> (DenseKernel, FluxClimatology, GridAxes) {
        let axes = GridAxes::regular(1.5, -1.0, 3, 0.0, 1.0, 3);
        let kernel = DenseKernel::from_fn(3, 3, |m, sr, sc, dr, dc| {
            let d = (sr as f64 - dr as f64).abs() + (sc as f64 - dc as f64).abs();
            if d == 0.0 {
                0.0
            } else if (sr + dc) % 4 == 0 {
                f64::NAN
            } else {
                d * m.number() as f64
            }
        });
        let mut evap = Array3D::new(12, 3, 3, 0.0);
        let mut precip = Array3D::new(12, 3, 3, 0.0);
        for m in 0..12 {
            for r in 0..3 {
                for c in 0..3 {
                    evap.set_value(m, r, c, 1.0 + (m + r * 3 + c) as f64 * 0.1);
                    precip.set_value(m, r, c, 2.0 + (m * 2 + r + c) as f64 * 0.05);
                }
            }
        }
        let area = Array2D::new(3, 3, 1000.0, f64::NAN).unwrap();
        (kernel, FluxClimatology::new(evap, precip, area).unwrap(), axes)
    }

    fn cells() -> Vec<Coordinate> {
        vec![
            Coordinate { lat: 1.5, lon: 0.0 },
            Coordinate { lat: 0.5, lon: 1.0 },
            Coordinate { lat: -0.5, lon: 2.0 },
            Coordinate { lat: 0.5, lon: 2.0 },
            Coordinate { lat: -0.5, lon: 0.0 },
        ]
    }

    fn assert_close(a: &AggregateFootprint, b: &AggregateFootprint) {
        for (x, y) in a.grid.as_slice().iter().zip(b.grid.as_slice()) {
            assert!((x - y).abs() <= 1e-9 * x.abs().max(1.0), "Expected {}, got {}", x, y);
        }
    }

    #[test]
    fn test_split_batches_sum_to_single_pass() {
        let (kernel, climatology, axes) = fixture();
        let engine = FootprintEngine::new(&kernel, &climatology, &axes).unwrap();
        let aggregator = BatchAggregator::new(engine);
        let cells = cells();

        let whole = aggregator.aggregate(&cells).unwrap();
        let mut merged = aggregator.aggregate(&cells[..2]).unwrap();
        let rest = aggregator.aggregate(&cells[2..]).unwrap();
        merged.forward.merge(&rest.forward, "1").unwrap();
        merged.backward.merge(&rest.backward, "1").unwrap();
        assert_close(&whole.forward, &merged.forward);
        assert_close(&whole.backward, &merged.backward);

        let mut reversed = cells.clone();
        reversed.reverse();
        let shuffled = aggregator.aggregate(&reversed).unwrap();
        assert_close(&whole.forward, &shuffled.forward);
        assert_close(&whole.backward, &shuffled.backward);
    }

    #[test]
    fn test_aggregates_are_finite_and_conserve_volume() {
        let (kernel, climatology, axes) = fixture();
        let engine = FootprintEngine::new(&kernel, &climatology, &axes).unwrap();
        let output = BatchAggregator::new(engine).aggregate(&cells()).unwrap();
        assert!(output.forward.grid.as_slice().iter().all(|v| v.is_finite()));
        assert!(output.backward.grid.as_slice().iter().all(|v| v.is_finite()));
        assert_eq!(output.get(Direction::Backward).units(), "l/month");

        // a single cell's forward footprint holds exactly what it evaporates
        let engine = FootprintEngine::new(&kernel, &climatology, &axes).unwrap();
        let single = BatchAggregator::new(engine)
            .aggregate(&[Coordinate { lat: 0.5, lon: 1.0 }])
            .unwrap();
        let jan = single.forward.grid.layer(0).iter().sum::<f64>();
        let expected = climatology.evaporation_at(Month::new(1).unwrap(), 1, 1) * 1000.0;
        assert!((jan - expected).abs() < 1e-9, "Expected {}, got {}", expected, jan);
    }

    #[test]
    fn test_merge_rejects_other_lattice() {
        let axes = GridAxes::regular(1.5, -1.0, 3, 0.0, 1.0, 3);
        let shifted = GridAxes::regular(1.5, -1.0, 3, 0.5, 1.0, 3);
        let mut a = AggregateFootprint::zeros(Direction::Forward, &axes);
        let b = AggregateFootprint::zeros(Direction::Forward, &shifted);
        assert!(matches!(a.merge(&b, "4"), Err(TrackingError::GridMismatch { .. })));
        let c = AggregateFootprint::zeros(Direction::Backward, &axes);
        assert!(a.merge(&c, "4").is_err());
    }

    #[test]
    fn test_deadline_abandons_batch() {
        let (kernel, climatology, axes) = fixture();
        let engine = FootprintEngine::new(&kernel, &climatology, &axes).unwrap();
        let deadline = Deadline::new(Duration::from_nanos(1));
        std::thread::sleep(Duration::from_millis(2));
        let result = BatchAggregator::new(engine)
            .with_deadline(Some(deadline))
            .aggregate(&cells());
        assert!(matches!(result, Err(TrackingError::TimedOut { .. })));
    }
}
