//! Percentile watersheds.
//!
//! Cells of an annual footprint are ranked by value, largest first, and taken
//! until their running sum reaches `p` percent of the total. The smallest
//! value taken is the boundary, and every cell at or above the boundary is in
//! the watershed. Cells tied with the boundary are all included, so the
//! realized share can exceed `p`.

use crate::errors::TrackingError;
use crate::tracking::Direction;
use moisture_common::structures::{Array2D, GridAxes};
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShedThreshold {
    /// Cells consumed before the running sum reached the target.
    pub count: usize,
    /// Value of the last consumed cell.
    pub boundary: f64,
    pub total: f64,
    pub target: f64,
}

/// Finds the boundary value for `percent` of the finite values. Returns
/// `None` when the values sum to zero, i.e. there is nothing to delineate.
pub fn shed_threshold(values: &[f64], percent: f64) -> Option<ShedThreshold> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));

    // summing in rank order makes the last running sum equal the total exactly
    let total: f64 = sorted.iter().sum();
    if !(total > 0.0) {
        return None;
    }
    let target = total * percent / 100.0;

    let mut running = 0.0;
    let mut count = 0;
    for v in &sorted {
        running += v;
        count += 1;
        if running >= target {
            break;
        }
    }
    // never let a rounding shortfall pull zero-valued cells into the shed
    while count > 1 && sorted[count - 1] <= 0.0 {
        count -= 1;
    }
    Some(ShedThreshold {
        count,
        boundary: sorted[count - 1],
        total,
        target,
    })
}

/// A percentile watershed on a lat/lon lattice.
#[derive(Clone, Debug)]
pub struct Watershed {
    pub direction: Direction,
    pub percent: f64,
    pub axes: GridAxes,
    pub mask: Array2D<bool>,
    /// Annual values inside the mask, `None` outside.
    pub values: Array2D<Option<f64>>,
    pub threshold: Option<ShedThreshold>,
    /// Longitudes in [-180, 180) and latitudes south to north.
    pub normalized: bool,
}

pub fn validate_percent(percent: f64) -> Result<(), TrackingError> {
    if percent > 0.0 && percent <= 100.0 {
        Ok(())
    } else {
        Err(TrackingError::Configuration(format!(
            "percentile must lie in (0, 100], got {}",
            percent
        )))
    }
}

/// Delineates the `percent` watershed of an annual footprint grid.
pub fn delineate(
    annual: &Array2D<f64>,
    axes: &GridAxes,
    direction: Direction,
    percent: f64,
) -> Result<Watershed, TrackingError> {
    validate_percent(percent)?;
    if annual.rows as usize != axes.rows() || annual.columns as usize != axes.columns() {
        return Err(TrackingError::mismatch(
            "watershed",
            format!(
                "{} x {} grid on {} x {} axes",
                annual.rows,
                annual.columns,
                axes.rows(),
                axes.columns()
            ),
        ));
    }
    let threshold = shed_threshold(annual.as_slice(), percent);
    let mask = match threshold {
        Some(t) => annual.map(|v| v.is_finite() && v >= t.boundary, false),
        None => annual.map(|_| false, false),
    };
    let mut values = annual.map(Some, None);
    for (v, inside) in values.as_mut_slice().iter_mut().zip(mask.as_slice()) {
        if !inside {
            *v = None;
        }
    }
    Ok(Watershed {
        direction,
        percent,
        axes: axes.clone(),
        mask,
        values,
        threshold,
        normalized: false,
    })
}

impl Watershed {
    pub fn cell_count(&self) -> usize {
        self.mask.as_slice().iter().filter(|m| **m).count()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_count() == 0
    }

    /// Sum of the values inside the watershed.
    pub fn included_total(&self) -> f64 {
        self.values.as_slice().iter().flatten().sum()
    }

    /// Remaps longitudes from [0, 360) to [-180, 180) and orders them
    /// ascending, and orders latitudes south to north. Values are only
    /// permuted, never resampled.
    pub fn normalized(&self) -> Watershed {
        let remapped: Vec<f64> = self
            .axes
            .lons()
            .iter()
            .map(|lon| (lon + 180.0).rem_euclid(360.0) - 180.0)
            .collect();
        let mut columns: Vec<usize> = (0..remapped.len()).collect();
        columns.sort_by(|a, b| remapped[*a].partial_cmp(&remapped[*b]).unwrap_or(Ordering::Equal));
        let mut rows: Vec<usize> = (0..self.axes.rows()).collect();
        if !self.axes.lats_ascending() {
            rows.reverse();
        }

        let axes = GridAxes::new(
            rows.iter().map(|r| self.axes.lats()[*r]).collect(),
            columns.iter().map(|c| remapped[*c]).collect(),
        );
        let mask = permute(&self.mask, &rows, &columns);
        let values = permute(&self.values, &rows, &columns);
        Watershed {
            direction: self.direction,
            percent: self.percent,
            axes,
            mask,
            values,
            threshold: self.threshold,
            normalized: true,
        }
    }
}

fn permute<T: Copy>(grid: &Array2D<T>, rows: &[usize], columns: &[usize]) -> Array2D<T> {
    let mut out = grid.clone();
    for (new_r, old_r) in rows.iter().enumerate() {
        for (new_c, old_c) in columns.iter().enumerate() {
            out.set_value(
                new_r as isize,
                new_c as isize,
                grid.get_value(*old_r as isize, *old_c as isize),
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: isize, columns: isize, values: Vec<f64>) -> (Array2D<f64>, GridAxes) {
        let axes = GridAxes::regular(90.0, -0.5, rows as usize, 0.0, 0.5, columns as usize);
        (Array2D::from_vec(rows, columns, values, f64::NAN).unwrap(), axes)
    }

    #[test]
    fn test_boundary_example() {
        let t = shed_threshold(&[40.0, 30.0, 20.0, 10.0], 99.0).unwrap();
        assert_eq!(t.count, 4);
        assert_eq!(t.boundary, 10.0);
        assert_eq!(t.total, 100.0);

        let (annual, axes) = grid(2, 2, vec![20.0, 40.0, 10.0, 30.0]);
        let shed = delineate(&annual, &axes, Direction::Backward, 99.0).unwrap();
        assert_eq!(shed.cell_count(), 4);

        let shed = delineate(&annual, &axes, Direction::Backward, 50.0).unwrap();
        assert_eq!(shed.mask.as_slice(), &[false, true, false, true]);
        assert_eq!(shed.values.as_slice(), &[None, Some(40.0), None, Some(30.0)]);
    }

    #[test]
    fn test_ties_are_included() {
        let (annual, axes) = grid(1, 4, vec![10.0, 10.0, 10.0, 5.0]);
        let shed = delineate(&annual, &axes, Direction::Forward, 50.0).unwrap();
        assert_eq!(shed.threshold.unwrap().count, 2);
        assert_eq!(shed.cell_count(), 3, "All cells tied at the boundary are included");
        assert!(shed.included_total() / shed.threshold.unwrap().total > 0.5);
    }

    #[test]
    fn test_monotone_in_percent() {
        let values: Vec<f64> = (0..48).map(|i| ((i * 37) % 11) as f64 * 1.5 + (i % 3) as f64).collect();
        let (annual, axes) = grid(6, 8, values);
        let mut last = 0;
        for p in [1.0, 5.0, 20.0, 33.3, 50.0, 75.0, 90.0, 99.0, 100.0] {
            let n = delineate(&annual, &axes, Direction::Backward, p).unwrap().cell_count();
            assert!(n >= last, "p = {} gave {} cells, fewer than {}", p, n, last);
            last = n;
        }
    }

    #[test]
    fn test_zero_and_missing_values() {
        let (annual, axes) = grid(1, 3, vec![0.0, 0.0, 0.0]);
        let shed = delineate(&annual, &axes, Direction::Backward, 99.0).unwrap();
        assert!(shed.is_empty());
        assert!(shed.threshold.is_none());

        let (annual, axes) = grid(1, 4, vec![f64::NAN, 3.0, 0.0, 1.0]);
        let shed = delineate(&annual, &axes, Direction::Backward, 100.0).unwrap();
        assert_eq!(shed.mask.as_slice(), &[false, true, false, true]);

        assert!(matches!(
            delineate(&annual, &axes, Direction::Backward, 0.0),
            Err(TrackingError::Configuration(_))
        ));
        assert!(delineate(&annual, &axes, Direction::Backward, 100.5).is_err());
    }

    #[test]
    fn test_normalization_is_a_permutation() {
        let values: Vec<f64> = (0..24).map(|i| i as f64).collect();
        let axes = GridAxes::regular(1.0, -1.0, 3, 0.0, 45.0, 8);
        let annual = Array2D::from_vec(3, 8, values, f64::NAN).unwrap();
        let shed = delineate(&annual, &axes, Direction::Forward, 100.0).unwrap();
        let normal = shed.normalized();

        assert_eq!(
            normal.axes.lons(),
            &[-180.0, -135.0, -90.0, -45.0, 0.0, 45.0, 90.0, 135.0]
        );
        assert_eq!(normal.axes.lats(), &[-1.0, 0.0, 1.0]);
        // the cell at lat 1, lon 180 moves to the first column of the last row
        assert_eq!(normal.values.get_value(2, 0), Some(4.0));
        assert_eq!(normal.values.get_value(0, 4), Some(16.0));

        let mut before: Vec<f64> = shed.values.as_slice().iter().flatten().copied().collect();
        let mut after: Vec<f64> = normal.values.as_slice().iter().flatten().copied().collect();
        before.sort_by(|a, b| a.partial_cmp(b).unwrap());
        after.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(before, after);
        assert_eq!(normal.cell_count(), shed.cell_count());
    }
}
