use std::time::Instant;

/// Formats the time elapsed since `start`, e.g. `1min 4.213s` or `0.87s`.
pub fn get_formatted_elapsed_time(start: Instant) -> String {
    let elapsed = start.elapsed();
    let minutes = elapsed.as_secs() / 60;
    let seconds = elapsed.as_secs() % 60;
    let millis = elapsed.subsec_millis();
    if minutes > 0 {
        format!("{}min {}.{:03}s", minutes, seconds, millis)
    } else {
        format!("{}.{:03}s", seconds, millis)
    }
}

/// Rounds `value` to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
