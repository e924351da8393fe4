use std::fmt;

use crate::signal_analysis::hmm::observations::{ObservationError, ObservationMatrix};

/// Markers read as a missing value, besides the empty cell
const MISSING_MARKERS: [&str; 4] = ["NA", "N/A", "NaN", "nan"];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if trimmed.is_empty() || MISSING_MARKERS.contains(&trimmed) {
            return Cell::Missing;
        }

        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Cell::Number(value),
            _ => Cell::Text(trimmed.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => write!(f, "NaN"),
            Cell::Number(value) => write!(f, "{}", value),
            Cell::Text(text) => write!(f, "{}", text),
        }
    }
}

/// One table of the workbook. Every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

/// Numeric columns of a sheet, restricted to the complete rows.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub dropped_rows: usize,
}

impl NumericTable {
    pub fn to_observations(&self) -> Result<ObservationMatrix, ObservationError> {
        ObservationMatrix::from_rows(&self.rows)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

impl Sheet {
    pub fn new(name: String, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Missing);
                row
            })
            .collect();

        Self { name, headers, rows }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.headers.len()
    }

    pub fn column(&self, column: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |row| &row[column])
    }

    // Numeric when at least one cell holds a number and no cell holds text
    pub fn is_numeric_column(&self, column: usize) -> bool {
        let mut has_number = false;
        for cell in self.column(column) {
            match cell {
                Cell::Text(_) => return false,
                Cell::Number(_) => has_number = true,
                Cell::Missing => {}
            }
        }
        has_number
    }

    pub fn numeric_columns(&self) -> Vec<usize> {
        (0..self.num_columns()).filter(|&column| self.is_numeric_column(column)).collect()
    }

    /// Keep the numeric columns, then drop every row with a missing value in one of them
    pub fn numeric_sub_table(&self) -> NumericTable {
        let numeric_columns = self.numeric_columns();
        let columns = numeric_columns.iter().map(|&column| self.headers[column].clone()).collect();

        if numeric_columns.is_empty() {
            return NumericTable { columns, rows: Vec::new(), dropped_rows: 0 };
        }

        let mut rows = Vec::with_capacity(self.rows.len());
        let mut dropped_rows = 0;

        for row in &self.rows {
            let values: Option<Vec<f64>> = numeric_columns.iter().map(|&column| row[column].as_number()).collect();
            match values {
                Some(values) => rows.push(values),
                None => dropped_rows += 1,
            }
        }

        NumericTable { columns, rows, dropped_rows }
    }

    /// First `num_rows` rows as an aligned text table
    pub fn head(&self, num_rows: usize) -> String {
        let shown: Vec<Vec<String>> = self
            .rows
            .iter()
            .take(num_rows)
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();

        let index_width = shown.len().saturating_sub(1).to_string().len();
        let widths: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .map(|(column, header)| {
                shown.iter().map(|row| row[column].len()).chain(std::iter::once(header.len())).max().unwrap_or(0)
            })
            .collect();

        let mut output = String::new();
        output.push_str(&" ".repeat(index_width));
        for (header, width) in self.headers.iter().zip(&widths) {
            output.push_str(&format!("  {:>width$}", header, width = width));
        }
        output.push('\n');

        for (index, row) in shown.iter().enumerate() {
            output.push_str(&format!("{:>width$}", index, width = index_width));
            for (value, width) in row.iter().zip(&widths) {
                output.push_str(&format!("  {:>width$}", value, width = width));
            }
            output.push('\n');
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracking_sheet() -> Sheet {
        let headers = vec!["tiger".to_string(), "speed".to_string(), "distance".to_string()];
        let rows = vec![
            vec![Cell::parse("T1"), Cell::parse("1.5"), Cell::parse("10")],
            vec![Cell::parse("T1"), Cell::parse(""), Cell::parse("12")],
            vec![Cell::parse("T2"), Cell::parse("3.0"), Cell::parse("NaN")],
            vec![Cell::parse("T2"), Cell::parse("2.5"), Cell::parse("20")],
        ];
        Sheet::new("tracks".to_string(), headers, rows)
    }

    #[test]
    fn test_cell_parse() {
        assert_eq!(Cell::parse(" 2.5 "), Cell::Number(2.5));
        assert_eq!(Cell::parse("NA"), Cell::Missing);
        assert_eq!(Cell::parse(""), Cell::Missing);
        assert_eq!(Cell::parse("inf"), Cell::Text("inf".to_string()));
        assert_eq!(Cell::parse("north"), Cell::Text("north".to_string()));
    }

    #[test]
    fn test_numeric_sub_table() {
        let table = tracking_sheet().numeric_sub_table();

        assert_eq!(table.columns, vec!["speed".to_string(), "distance".to_string()]);
        assert_eq!(table.rows, vec![vec![1.5, 10.0], vec![2.5, 20.0]]);
        assert_eq!(table.dropped_rows, 2);

        let observations = table.to_observations().unwrap();
        assert_eq!(observations.num_observations(), 2);
        assert_eq!(observations.num_features(), 2);
    }

    #[test]
    fn test_no_numeric_columns() {
        let sheet = Sheet::new(
            "names".to_string(),
            vec!["name".to_string()],
            vec![vec![Cell::parse("Raja")], vec![Cell::parse("Machli")]],
        );
        let table = sheet.numeric_sub_table();

        assert_eq!(table.num_columns(), 0);
        assert_eq!(table.num_rows(), 0);
        assert!(table.to_observations().unwrap().is_empty());
    }

    #[test]
    fn test_all_missing_column_is_not_numeric() {
        let sheet = Sheet::new(
            "gaps".to_string(),
            vec!["speed".to_string(), "notes".to_string()],
            vec![vec![Cell::parse("1.0"), Cell::Missing], vec![Cell::parse("2.0")]],
        );

        assert_eq!(sheet.numeric_columns(), vec![0]);
        assert_eq!(sheet.numeric_sub_table().rows, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_head() {
        let head = tracking_sheet().head(2);
        let lines: Vec<&str> = head.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("tiger") && lines[0].contains("distance"));
        assert!(lines[2].contains("NaN"));
    }
}
