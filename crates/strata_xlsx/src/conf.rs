//! Export constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::{SpecCellFormat, SpecExportOptions, SpecTableSettings};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Deepest outline level Excel can group.
pub const N_OUTLINE_LEVEL_MAX: u8 = 7;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [char; 11] = ['<', '>', '*', '?', '"', '|', ':', '/', '\\', '[', ']'];

/// Marker written on the sheet of a table without rows.
pub const C_NO_DATA_TEXT: &str = "No Data";
/// Prefix of synthesized sheet names (`output0`, `output1`, ...).
pub const C_SHEET_NAME_FALLBACK_PREFIX: &str = "output";
/// Name of the sheet a fresh sink starts with.
pub const C_SHEET_NAME_DEFAULT: &str = "Sheet1";

/// Default row height in points, used for multi-line row estimates.
pub const F_ROW_HEIGHT_DEFAULT: f64 = 15.0;
/// Number format applied to timestamps written without one.
pub const C_FMT_TIMESTAMP_DEFAULT: &str = "yyyy-mm-dd hh:mm:ss";

/// Style registry key for header cells.
pub const C_STYLE_HEADER: &str = "header";
/// Style registry key for plain text cells.
pub const C_STYLE_TEXT: &str = "text";
/// Style registry key for odd data rows.
pub const C_STYLE_ROW_ODD: &str = "row_odd";
/// Style registry key for even data rows.
pub const C_STYLE_ROW_EVEN: &str = "row_even";

/// Build the default named style registry used by [`crate::layout::export_dataset`].
pub fn derive_default_styles() -> BTreeMap<String, SpecCellFormat> {
    let cfg_base_fmt_spec = SpecCellFormat {
        font_name: Some("Times New Roman".to_string()),
        font_size: Some(11),
        border: Some(1),
        align: Some("left".to_string()),
        valign: Some("vcenter".to_string()),
        ..Default::default()
    };

    let mut dict_fmt = BTreeMap::new();
    dict_fmt.insert(C_STYLE_TEXT.to_string(), cfg_base_fmt_spec.clone());
    dict_fmt.insert(
        C_STYLE_HEADER.to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            align: Some("center".to_string()),
            bg_color: Some("#D9E1F2".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(C_STYLE_ROW_ODD.to_string(), cfg_base_fmt_spec.clone());
    dict_fmt.insert(
        C_STYLE_ROW_EVEN.to_string(),
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bg_color: Some("#F2F2F2".to_string()),
            ..Default::default()
        }),
    );

    dict_fmt
}

/// Build per-table settings bound to the default style presets.
pub fn derive_default_table_settings() -> SpecTableSettings {
    SpecTableSettings::default()
}

/// Build default export options.
pub fn derive_default_export_options() -> SpecExportOptions {
    SpecExportOptions::default()
}
