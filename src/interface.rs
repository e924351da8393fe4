pub mod diagram;
pub mod reporter;
pub mod terminal_summary;
