pub mod sheet;
pub mod workbook_loader;

pub use sheet::{Cell, NumericTable, Sheet};
pub use workbook_loader::{load_excel_workbook, load_sheet, load_workbook, read_sheet, sheet_from_range, LoaderError, Workbook};
