//! Dissolves the positive cells of a watershed into one MultiPolygon.
//!
//! Cell boundaries are traced on an integer vertex lattice with y pointing
//! north, keeping the filled cells on the left of every edge. Outer rings
//! therefore come out counter-clockwise and holes clockwise. Cells that only
//! touch at a corner belong to different polygons.

use super::percentile::Watershed;
use geojson::{Geometry, Value as GeoValue};
use moisture_common::algorithms::{point_in_ring, ring_signed_area};
use moisture_common::structures::Array2D;
use std::collections::HashMap;

type Vertex = (i64, i64);

#[derive(Clone, Copy, Debug)]
struct Edge {
    from: Vertex,
    to: Vertex,
}

impl Edge {
    fn direction(&self) -> Vertex {
        (self.to.0 - self.from.0, self.to.1 - self.from.1)
    }
}

/// Traces every boundary ring of the filled cells. Row 0 of `filled` is the
/// northernmost row. Rings are returned unclosed.
fn trace_rings(filled: &Array2D<bool>) -> Vec<Vec<Vertex>> {
    let rows = filled.rows as i64;
    let mut edges = vec![];
    for r in 0..filled.rows {
        for c in 0..filled.columns {
            if !filled[(r, c)] {
                continue;
            }
            let (x0, x1) = (c as i64, c as i64 + 1);
            let (y0, y1) = (rows - r as i64 - 1, rows - r as i64);
            if !filled[(r + 1, c)] {
                edges.push(Edge { from: (x0, y0), to: (x1, y0) });
            }
            if !filled[(r, c + 1)] {
                edges.push(Edge { from: (x1, y0), to: (x1, y1) });
            }
            if !filled[(r - 1, c)] {
                edges.push(Edge { from: (x1, y1), to: (x0, y1) });
            }
            if !filled[(r, c - 1)] {
                edges.push(Edge { from: (x0, y1), to: (x0, y0) });
            }
        }
    }

    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for (i, e) in edges.iter().enumerate() {
        outgoing.entry(e.from).or_default().push(i);
    }

    let mut visited = vec![false; edges.len()];
    let mut rings = vec![];
    for first in 0..edges.len() {
        if visited[first] {
            continue;
        }
        let mut ring = vec![];
        let mut current = first;
        loop {
            visited[current] = true;
            ring.push(edges[current].from);
            let (dx, dy) = edges[current].direction();
            // left turns first keeps corner-touching cells apart
            let next = outgoing
                .get(&edges[current].to)
                .into_iter()
                .flatten()
                .copied()
                .filter(|e| !visited[*e] || *e == first)
                .min_by_key(|e| {
                    let (ox, oy) = edges[*e].direction();
                    match (dx * oy - dy * ox).signum() {
                        1 => 0,
                        0 => 1,
                        _ => 2,
                    }
                });
            match next {
                Some(e) if e != first => current = e,
                _ => break,
            }
        }
        rings.push(ring);
    }
    rings
}

/// Drops vertices in the middle of straight runs.
fn simplify(ring: &[Vertex]) -> Vec<Vertex> {
    let n = ring.len();
    let direction = |a: Vertex, b: Vertex| ((b.0 - a.0).signum(), (b.1 - a.1).signum());
    (0..n)
        .filter(|i| {
            let prev = ring[(i + n - 1) % n];
            let next = ring[(i + 1) % n];
            direction(prev, ring[*i]) != direction(ring[*i], next)
        })
        .map(|i| ring[i])
        .collect()
}

fn to_f64(ring: &[Vertex]) -> Vec<(f64, f64)> {
    ring.iter().map(|(x, y)| (*x as f64, *y as f64)).collect()
}

/// Polygons as lists of rings (outer first) on the integer lattice.
fn polygons(filled: &Array2D<bool>) -> Vec<Vec<Vec<Vertex>>> {
    let mut outers: Vec<(f64, Vec<Vertex>, Vec<Vec<Vertex>>)> = vec![];
    let mut holes: Vec<((f64, f64), Vec<Vertex>)> = vec![];
    for ring in trace_rings(filled) {
        if ring.len() < 4 {
            continue;
        }
        let area = ring_signed_area(&to_f64(&ring));
        if area > 0.0 {
            outers.push((area, simplify(&ring), vec![]));
        } else {
            // the cell to the right of the first edge lies inside the hole
            let (x0, y0) = ring[0];
            let (dx, dy) = (ring[1].0 - x0, ring[1].1 - y0);
            let probe = (
                x0 as f64 + 0.5 * dx as f64 + 0.5 * dy as f64,
                y0 as f64 + 0.5 * dy as f64 - 0.5 * dx as f64,
            );
            holes.push((probe, simplify(&ring)));
        }
    }

    let outer_rings: Vec<Vec<(f64, f64)>> = outers.iter().map(|(_, r, _)| to_f64(r)).collect();
    for (probe, hole) in holes {
        let owner = outers
            .iter()
            .enumerate()
            .filter(|(i, _)| point_in_ring(probe.0, probe.1, &outer_rings[*i]))
            .min_by(|a, b| a.1 .0.partial_cmp(&b.1 .0).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i);
        if let Some(i) = owner {
            outers[i].2.push(hole);
        }
    }

    outers
        .into_iter()
        .map(|(_, outer, holes)| {
            let mut rings = vec![outer];
            rings.extend(holes);
            rings
        })
        .collect()
}

/// The positive-value cells of `shed` as a single MultiPolygon in lon/lat, or
/// `None` when there are none. The pixel grid is anchored at the largest
/// latitude and smallest longitude with the lattice spacing as pixel size.
pub fn vectorize(shed: &Watershed) -> Option<Geometry> {
    let axes = &shed.axes;
    let (rows, columns) = (axes.rows(), axes.columns());
    if rows == 0 || columns == 0 {
        return None;
    }
    let lons_ascending = columns < 2 || axes.lons()[1] > axes.lons()[0];
    let mut filled = Array2D::from_vec(rows as isize, columns as isize, vec![false; rows * columns], false).ok()?;
    let mut any = false;
    for r in 0..rows {
        for c in 0..columns {
            let src_r = if axes.lats_ascending() { rows - 1 - r } else { r };
            let src_c = if lons_ascending { c } else { columns - 1 - c };
            let positive = matches!(shed.values.get_value(src_r as isize, src_c as isize), Some(v) if v > 0.0);
            if positive {
                filled.set_value(r as isize, c as isize, true);
                any = true;
            }
        }
    }
    if !any {
        return None;
    }

    let north = axes.lats().iter().copied().fold(f64::MIN, f64::max);
    let west = axes.lons().iter().copied().fold(f64::MAX, f64::min);
    let (mut dx, mut dy) = (axes.lon_spacing(), axes.lat_spacing());
    if dx == 0.0 {
        dx = if dy == 0.0 { 1.0 } else { dy };
    }
    if dy == 0.0 {
        dy = dx;
    }
    let to_geo = |(x, y): Vertex| vec![west + x as f64 * dx, north - (rows as i64 - y) as f64 * dy];

    let coordinates: Vec<Vec<Vec<Vec<f64>>>> = polygons(&filled)
        .into_iter()
        .map(|rings| {
            rings
                .into_iter()
                .map(|ring| {
                    let mut line: Vec<Vec<f64>> = ring.iter().map(|v| to_geo(*v)).collect();
                    if let Some(first) = line.first().cloned() {
                        line.push(first);
                    }
                    line
                })
                .collect()
        })
        .collect();
    if coordinates.is_empty() {
        return None;
    }
    Some(Geometry::new(GeoValue::MultiPolygon(coordinates)))
}
