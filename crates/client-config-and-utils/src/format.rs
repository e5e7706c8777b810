//! Human-readable formatting helpers.

const UNITS: [&str; 5] = ["bytes", "KB", "MB", "GB", "TB"];

/// Format a byte count with one decimal and a binary (1024) unit.
///
/// Values of 1024 TB and above stay in TB.
pub fn format_size(size: f64) -> String {
    let mut value = size;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{:.1} {}", value, unit)
}
