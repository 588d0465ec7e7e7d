//! Plain-text tables.
//!
//! A [`TextTable`] holds labelled numeric rows and renders them as an ASCII
//! grid for the terminal or as a Markdown table for reports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A titled table of labelled numeric rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextTable {
    /// Table title.
    pub title: String,
    /// Header of the label column.
    pub label_header: String,
    /// Headers of the value columns.
    pub columns: Vec<String>,
    /// Rows as `(label, values)`.
    pub rows: Vec<(String, Vec<f64>)>,
    /// Decimal places shown.
    pub precision: usize,
}

impl TextTable {
    /// Create an empty table.
    pub fn new(
        title: impl Into<String>,
        label_header: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            title: title.into(),
            label_header: label_header.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            precision: 2,
        }
    }

    /// Set the number of decimal places.
    pub const fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Append a row.
    pub fn push_row(&mut self, label: impl Into<String>, values: Vec<f64>) {
        self.rows.push((label.into(), values));
    }

    fn format_value(&self, value: f64) -> String {
        if value.is_nan() {
            "NaN".to_string()
        } else {
            format!("{:.*}", self.precision, value)
        }
    }

    fn cells(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|(label, values)| {
                std::iter::once(label.clone())
                    .chain(values.iter().map(|v| self.format_value(*v)))
                    .collect()
            })
            .collect()
    }

    fn header(&self) -> Vec<String> {
        std::iter::once(self.label_header.clone())
            .chain(self.columns.iter().cloned())
            .collect()
    }

    /// Render as a Markdown table preceded by the title.
    pub fn to_markdown(&self) -> String {
        let header = self.header();
        let mut out = format!("### {}\n\n", self.title);
        out.push_str(&format!("| {} |\n", header.join(" | ")));
        out.push('|');
        for i in 0..header.len() {
            out.push_str(if i == 0 { " :--- |" } else { " ---: |" });
        }
        out.push('\n');
        for row in self.cells() {
            out.push_str(&format!("| {} |\n", row.join(" | ")));
        }
        out
    }
}

impl fmt::Display for TextTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.header();
        let cells = self.cells();

        let mut widths: Vec<usize> = header.iter().map(String::len).collect();
        for row in &cells {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.len());
            }
        }
        let rule: String = widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+");

        writeln!(f, "{}", self.title)?;
        writeln!(f, "+{}+", rule)?;
        let line = |f: &mut fmt::Formatter<'_>, row: &[String]| -> fmt::Result {
            write!(f, "|")?;
            for (i, (cell, w)) in row.iter().zip(&widths).enumerate() {
                if i == 0 {
                    write!(f, " {:<w$} |", cell, w = *w)?;
                } else {
                    write!(f, " {:>w$} |", cell, w = *w)?;
                }
            }
            writeln!(f)
        };
        line(f, header.as_slice())?;
        writeln!(f, "+{}+", rule)?;
        for row in &cells {
            line(f, row.as_slice())?;
        }
        write!(f, "+{}+", rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TextTable {
        let mut t = TextTable::new("Panel", "", ["a", "b"]);
        t.push_row("mean", vec![1.0, -0.125]);
        t.push_row("std", vec![f64::NAN, 2.5]);
        t
    }

    #[test]
    fn test_ascii_render() {
        let out = table().to_string();
        assert!(out.starts_with("Panel\n+"));
        assert!(out.contains("| mean |"));
        assert!(out.contains("-0.13") || out.contains("-0.12"));
        assert!(out.contains("NaN"));
    }

    #[test]
    fn test_markdown_render() {
        let out = table().with_precision(3).to_markdown();
        assert!(out.starts_with("### Panel\n\n|  | a | b |\n"));
        assert!(out.contains("| mean | 1.000 | -0.125 |"));
        assert!(out.contains(" :--- | ---: | ---: |"));
    }
}
