//! Pipe-delimited tabular output from SQL-style endpoints
//!
//! ```text
//!      day      |  crashes
//! --------------+---------
//! 2024-01-01    |4
//! 2024-01-02    |6
//! ```

use super::Row;
use serde_json::Value;

fn cells(line: &str) -> impl Iterator<Item = &str> {
    line.split('|').map(str::trim)
}

/// Parse a text table into rows keyed by the header's column names.
///
/// Line one holds the column names and line two is the separator; fewer
/// than three lines yields no rows. Cells beyond the header are ignored.
pub fn parse_tabular(text: &str) -> Vec<Row> {
    let lines: Vec<&str> = text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .collect();
    if lines.len() < 3 {
        return Vec::new();
    }

    let columns: Vec<&str> = cells(lines[0]).collect();
    lines[2..]
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            columns
                .iter()
                .zip(cells(line))
                .map(|(column, cell)| (column.to_string(), Value::String(cell.to_string())))
                .collect()
        })
        .collect()
}
