//! `strata_xlsx` v1:
//! Hierarchical relational export to XLSX.
//!
//! Module layout:
//! - `conf`   : constants and default presets
//! - `spec`   : dataset, settings, options, report and error models
//! - `util`   : pure helper functions
//! - `sink`   : spreadsheet sink interface and command recorder
//! - `layout` : layout engine driving a sink
//! - `writer` : `rust_xlsxwriter`-backed sink
//! - `frame`  : Polars `DataFrame` ingestion
pub mod conf;
pub mod frame;
pub mod layout;
pub mod sink;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{
    C_NO_DATA_TEXT, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX,
    TUP_EXCEL_ILLEGAL, derive_default_export_options, derive_default_styles,
    derive_default_table_settings,
};
pub use frame::{derive_table_from_dataframe, derive_table_from_ipc_bytes};
pub use layout::{export_dataset, export_table};
pub use sink::{EnumSinkCommand, RecordingSink, SpreadsheetSink};
pub use spec::{
    EnumCellValue, EnumChildHeaderRule, EnumColumnOffsetRule, EnumHorizontalAlign,
    EnumNumberFormat, EnumValueKind, ExportError, SinkError, SpecAutofitCellsPolicy,
    SpecCellFormat, SpecColumn, SpecColumnOverride, SpecDataset, SpecExportOptions,
    SpecExportReport, SpecExportSettings, SpecRelation, SpecSheetLayout, SpecTable,
    SpecTableSettings,
};
pub use util::{derive_contiguous_ranges, sanitize_sheet_name, validate_sheet_name};
pub use writer::XlsxSink;
