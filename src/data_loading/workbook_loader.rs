use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Range, Reader};
use csv::ReaderBuilder;
use thiserror::Error;
use tracing::{debug, warn};

use super::sheet::{Cell, Sheet};

/// Named sheets in load order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|sheet| sheet.name()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name() == name)
    }

    pub fn first(&self) -> Option<&Sheet> {
        self.sheets.first()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension().map(|extension| extension.eq_ignore_ascii_case("csv")).unwrap_or(false)
}

const EXCEL_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

fn is_excel(path: &Path) -> bool {
    path.extension()
        .map(|extension| EXCEL_EXTENSIONS.iter().any(|excel| extension.eq_ignore_ascii_case(excel)))
        .unwrap_or(false)
}

fn sheet_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// First record is the header row
pub fn read_sheet<R: Read>(name: &str, reader: R) -> Result<Sheet, LoaderError> {
    let mut csv_reader = ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|source| LoaderError::Csv { sheet: name.to_string(), source })?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_id, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|source| LoaderError::Csv { sheet: name.to_string(), source })?;

        if record.len() > headers.len() {
            return Err(LoaderError::RowTooLong {
                sheet: name.to_string(),
                row: row_id,
                expected: headers.len(),
                found: record.len(),
            });
        }

        rows.push(record.iter().map(Cell::parse).collect());
    }

    debug!("Read sheet '{}': {} rows, {} columns", name, rows.len(), headers.len());

    Ok(Sheet::new(name.to_string(), headers, rows))
}

pub fn load_sheet(path: &Path) -> Result<Sheet, LoaderError> {
    let file = fs::File::open(path).map_err(|source| LoaderError::Io { path: path.to_path_buf(), source })?;
    read_sheet(&sheet_name(path), file)
}

fn excel_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Missing,
        Data::Int(value) => Cell::Number(*value as f64),
        Data::Float(value) if value.is_finite() => Cell::Number(*value),
        Data::Float(_) => Cell::Missing,
        Data::String(text) => Cell::parse(text),
        other => Cell::Text(other.to_string()),
    }
}

// First row of the used range is the header row
pub fn sheet_from_range(name: &str, range: &Range<Data>) -> Sheet {
    let mut rows = range.rows();

    let headers: Vec<String> = rows
        .next()
        .map(|header_row| {
            header_row
                .iter()
                .enumerate()
                .map(|(column, data)| match data.to_string().trim() {
                    "" => format!("Unnamed: {}", column),
                    header => header.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let cells: Vec<Vec<Cell>> = rows.map(|row| row.iter().map(excel_cell).collect()).collect();

    debug!("Read worksheet '{}': {} rows, {} columns", name, cells.len(), headers.len());

    Sheet::new(name.to_string(), headers, cells)
}

/// Every worksheet of an Excel workbook, in workbook order.
pub fn load_excel_workbook(path: &Path) -> Result<Workbook, LoaderError> {
    let mut excel = open_workbook_auto(path).map_err(|source| LoaderError::Excel { path: path.to_path_buf(), source })?;

    let mut sheets = Vec::new();
    for name in excel.sheet_names() {
        let range = excel
            .worksheet_range(&name)
            .map_err(|source| LoaderError::Excel { path: path.to_path_buf(), source })?;
        sheets.push(sheet_from_range(&name, &range));
    }

    if sheets.is_empty() {
        return Err(LoaderError::NoSheets { path: path.to_path_buf() });
    }

    Ok(Workbook::new(sheets))
}

/// An Excel file yields all its worksheets. A `.csv` file is a one-sheet workbook;
/// a directory holds one sheet per `.csv` file, sorted by name.
pub fn load_workbook(path: &Path) -> Result<Workbook, LoaderError> {
    if path.is_dir() {
        let entries = fs::read_dir(path).map_err(|source| LoaderError::Io { path: path.to_path_buf(), source })?;

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| LoaderError::Io { path: path.to_path_buf(), source })?;
            let entry_path = entry.path();

            if entry_path.is_file() && is_csv(&entry_path) {
                files.push(entry_path);
            } else {
                warn!("Skipping {}: not a CSV file", entry_path.display());
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(LoaderError::NoSheets { path: path.to_path_buf() });
        }

        let sheets = files.iter().map(|file| load_sheet(file)).collect::<Result<Vec<Sheet>, LoaderError>>()?;

        return Ok(Workbook::new(sheets));
    }

    if is_excel(path) {
        return load_excel_workbook(path);
    }

    if !is_csv(path) {
        return Err(LoaderError::UnsupportedFile { path: path.to_path_buf() });
    }

    Ok(Workbook::new(vec![load_sheet(path)?]))
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("malformed CSV in sheet '{sheet}': {source}")]
    Csv { sheet: String, source: csv::Error },
    #[error("failed to read workbook {path}: {source}")]
    Excel { path: PathBuf, source: calamine::Error },
    #[error("row {row} of sheet '{sheet}' has {found} cells, header has {expected}")]
    RowTooLong { sheet: String, row: usize, expected: usize, found: usize },
    #[error("no CSV sheets found in {path}")]
    NoSheets { path: PathBuf },
    #[error("{path} is not a CSV or Excel file")]
    UnsupportedFile { path: PathBuf },
}
