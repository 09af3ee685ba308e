/// Calculates the signed area of a closed ring using the shoelace formula.
///
/// # Arguments
/// * `ring` - Ring vertices as `(x, y)` pairs. The ring may or may not repeat
///   its first vertex at the end.
///
/// # Returns
/// Positive area for a counter-clockwise ring, negative for a clockwise ring
/// (in a y-up coordinate system). Fewer than three vertices give 0.0.
pub fn ring_signed_area(ring: &[(f64, f64)]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for i in 0..ring.len() {
        let (x1, y1) = ring[i];
        let (x2, y2) = ring[(i + 1) % ring.len()];
        twice_area += x1 * y2 - x2 * y1;
    }
    twice_area / 2.0
}

/// Even-odd test of whether `(x, y)` lies inside `ring`.
///
/// # Notes
/// - Points exactly on the ring boundary may be classified either way; callers
///   should test interior points such as cell centres.
pub fn point_in_ring(x: f64, y: f64, ring: &[(f64, f64)]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}
