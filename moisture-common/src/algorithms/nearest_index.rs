/// Returns the index of the axis value closest to `target`.
///
/// # Arguments
/// * `axis` - Coordinate values of a grid axis, in storage order
/// * `target` - The coordinate to locate
///
/// # Returns
/// The index minimising `|axis[i] - target|`. Ties resolve to the first
/// occurrence in axis order, and a target beyond either end of the axis maps
/// to the nearest edge index.
///
/// # Notes
/// - An empty axis, or a NaN target, returns 0.
pub fn nearest_index(axis: &[f64], target: f64) -> usize {
    let mut best_index = 0usize;
    let mut best_distance = f64::INFINITY;
    for (i, value) in axis.iter().enumerate() {
        let distance = (value - target).abs();
        // strict comparison keeps the first of equally close nodes
        if distance < best_distance {
            best_distance = distance;
            best_index = i;
        }
    }
    best_index
}
