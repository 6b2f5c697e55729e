//! Presenters for command results.
//!
//! Every presenter supports two formats: aligned, human-readable text and
//! JSON. Presenters only write to the writer they are given; diagnostics go
//! through `tracing`.

use std::io::Write;

use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::AppError;

pub(crate) mod admin;
pub(crate) mod answer;
pub(crate) mod progress;
pub(crate) mod sources;

/// Gap between aligned columns.
const COLUMN_GAP: usize = 2;

/// Left-aligned text columns.
///
/// Every cell except the last one of a row is padded to the widest cell of
/// its column plus a two-space gap; the last cell is written as is, so long
/// free-text columns such as locations never stretch the table.
#[derive(Debug, Default)]
pub(crate) struct Table {
    rows: Vec<Vec<String>>,
}

impl Table {
    pub(crate) fn new<I, S>(header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::default();
        table.push(header);
        table
    }

    pub(crate) fn push<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub(crate) fn render(&self) -> String {
        let widths = self.column_widths();
        let mut rendered = String::new();
        for row in &self.rows {
            let mut line = String::new();
            let padded = row.len().saturating_sub(1);
            for (cell, width) in row.iter().take(padded).zip(&widths) {
                line.push_str(cell);
                let fill = width.saturating_sub(cell.width()).saturating_add(COLUMN_GAP);
                line.extend(std::iter::repeat_n(' ', fill));
            }
            if let Some(last) = row.last() {
                line.push_str(last);
            }
            rendered.push_str(line.trim_end());
            rendered.push('\n');
        }
        rendered
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = Vec::new();
        for row in &self.rows {
            let padded = row.len().saturating_sub(1);
            for (index, cell) in row.iter().take(padded).enumerate() {
                if widths.len() <= index {
                    widths.push(0);
                }
                if let Some(current) = widths.get_mut(index) {
                    *current = (*current).max(cell.width());
                }
            }
        }
        widths
    }
}

/// Writes `value` as indented JSON followed by a newline.
pub(crate) fn write_pretty_json<W, T>(out: &mut W, value: &T) -> Result<(), AppError>
where
    W: Write,
    T: Serialize + ?Sized,
{
    serde_json::to_writer_pretty(&mut *out, value).map_err(AppError::EncodeOutput)?;
    writeln!(out)?;
    Ok(())
}

/// Friendly label for a backend component identifier.
pub(crate) fn component_label(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "" => String::from("Unknown"),
        "disk_capacity" => String::from("Disk Capacity"),
        "index_freshness" => String::from("Index Freshness"),
        "source_access" => String::from("Source Access"),
        "ollama" => String::from("Ollama"),
        "weaviate" => String::from("Weaviate"),
        _ => trimmed
            .replace('_', " ")
            .split_whitespace()
            .map(capitalise)
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn capitalise(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Renders a byte count with binary units, for example `1.5KiB`.
#[expect(
    clippy::cast_precision_loss,
    clippy::float_arithmetic,
    reason = "sizes are shown with one decimal place, so the approximation is intended"
)]
pub(crate) fn format_bytes(size: u64) -> String {
    const UNIT: f64 = 1024.0;
    const SUFFIXES: [&str; 6] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
    if size < 1024 {
        return format!("{size}B");
    }
    let mut value = size as f64 / UNIT;
    for suffix in SUFFIXES {
        if value < UNIT || suffix == "EiB" {
            return format!("{value:.1}{suffix}");
        }
        value /= UNIT;
    }
    format!("{value:.1}EiB")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn table_pads_all_but_the_last_column() {
        let mut table = Table::new(["ALIAS", "TYPE", "LOCATION"]);
        table.push(["man-pages", "man", "/usr/share/man"]);
        table.push(["wiki", "kiwix", "/srv/wikipedia_en.zim"]);

        assert_eq!(
            table.render(),
            "ALIAS      TYPE   LOCATION\n\
             man-pages  man    /usr/share/man\n\
             wiki       kiwix  /srv/wikipedia_en.zim\n"
        );
    }

    #[test]
    fn table_measures_display_width() {
        let mut table = Table::new(["NAME", "NOTE"]);
        table.push(["日本", "wide"]);

        assert_eq!(table.render(), "NAME  NOTE\n日本  wide\n");
    }

    #[test]
    fn empty_trailing_cells_leave_no_trailing_spaces() {
        let mut table = Table::new(["COMPONENT", "STATUS", "DETAILS"]);
        table.push(["  Remediation", "", ""]);

        assert_eq!(
            table.render(),
            "COMPONENT      STATUS  DETAILS\n  Remediation\n"
        );
    }

    #[rstest]
    #[case("disk_capacity", "Disk Capacity")]
    #[case("vector_store_latency", "Vector Store Latency")]
    #[case("GPU", "Gpu")]
    #[case("  ", "Unknown")]
    fn component_labels(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(component_label(raw), expected);
    }

    #[rstest]
    #[case(0, "0B")]
    #[case(512, "512B")]
    #[case(1024, "1.0KiB")]
    #[case(1536, "1.5KiB")]
    #[case(5 * 1024 * 1024, "5.0MiB")]
    fn byte_counts(#[case] size: u64, #[case] expected: &str) {
        assert_eq!(format_bytes(size), expected);
    }
}
