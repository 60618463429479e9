//! Shared export specification models: dataset, settings, options, report and errors.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conf::{
    C_STYLE_HEADER, C_STYLE_ROW_EVEN, C_STYLE_ROW_ODD, derive_default_styles,
};

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Resolved cell format, the concrete value behind a style reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellValues

/// Value kind of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumValueKind {
    /// Signed 64-bit integer.
    Integer,
    /// Double precision floating point.
    Float,
    /// Boolean.
    Boolean,
    /// Text.
    String,
    /// Naive date-time.
    Timestamp,
}

impl fmt::Display for EnumValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c_kind = match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Timestamp => "timestamp",
        };
        write!(f, "{c_kind}")
    }
}

/// Typed cell value carried from dataset rows to the sink.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EnumCellValue {
    /// Missing/blank value.
    #[default]
    None,
    /// Integer value.
    Integer(i64),
    /// Floating-point value.
    Float(f64),
    /// Boolean value.
    Boolean(bool),
    /// Text value.
    String(String),
    /// Date-time value.
    Timestamp(NaiveDateTime),
}

impl EnumCellValue {
    /// Value kind, `None` for blanks.
    pub fn kind(&self) -> Option<EnumValueKind> {
        match self {
            Self::None => None,
            Self::Integer(_) => Some(EnumValueKind::Integer),
            Self::Float(_) => Some(EnumValueKind::Float),
            Self::Boolean(_) => Some(EnumValueKind::Boolean),
            Self::String(_) => Some(EnumValueKind::String),
            Self::Timestamp(_) => Some(EnumValueKind::Timestamp),
        }
    }

    /// Whether the value is blank.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<i64> for EnumCellValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for EnumCellValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for EnumCellValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for EnumCellValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for EnumCellValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<NaiveDateTime> for EnumCellValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<EnumCellValue>> From<Option<T>> for EnumCellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RelationalDataset

/// One typed table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecColumn {
    /// Column name, unique within its table.
    pub name: String,
    /// Value kind.
    pub kind: EnumValueKind,
}

impl SpecColumn {
    pub fn new(name: impl Into<String>, kind: EnumValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// One table row, positionally aligned with the table columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecRow {
    values: Vec<EnumCellValue>,
}

impl SpecRow {
    /// Value at column position.
    pub fn get(&self, col_idx: usize) -> Option<&EnumCellValue> {
        self.values.get(col_idx)
    }

    /// All values in column order.
    pub fn values(&self) -> &[EnumCellValue] {
        &self.values
    }
}

/// Parent key column -> child table key column link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRelation {
    /// Key column on the parent (declaring) table.
    pub col_key_local: String,
    /// Child table name within the same dataset.
    pub table_child: String,
    /// Key column on the child table.
    pub col_key_child: String,
}

/// Named, typed record store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecTable {
    /// Table name, used as sheet name fallback.
    pub name: String,
    columns: Vec<SpecColumn>,
    rows: Vec<SpecRow>,
    relation: Option<SpecRelation>,
}

impl SpecTable {
    /// Create an empty table with the given column layout.
    pub fn new(name: impl Into<String>, columns: Vec<SpecColumn>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
            relation: None,
        }
    }

    /// Declare the consumed child relation. Only one relation is followed;
    /// a second call replaces the first.
    pub fn with_relation(
        mut self,
        col_key_local: impl Into<String>,
        table_child: impl Into<String>,
        col_key_child: impl Into<String>,
    ) -> Self {
        self.relation = Some(SpecRelation {
            col_key_local: col_key_local.into(),
            table_child: table_child.into(),
            col_key_child: col_key_child.into(),
        });
        self
    }

    /// Append one row. The row width must equal the column count.
    pub fn push_row(&mut self, values: Vec<EnumCellValue>) -> Result<(), ExportError> {
        if values.len() != self.columns.len() {
            return Err(ExportError::InvalidDataset(format!(
                "Row width mismatch in table {:?}: expected {}, got {}.",
                self.name,
                self.columns.len(),
                values.len()
            )));
        }
        self.rows.push(SpecRow { values });
        Ok(())
    }

    /// Builder form of [`Self::push_row`].
    pub fn with_row(mut self, values: Vec<EnumCellValue>) -> Result<Self, ExportError> {
        self.push_row(values)?;
        Ok(self)
    }

    pub fn columns(&self) -> &[SpecColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[SpecRow] {
        &self.rows
    }

    pub fn relation(&self) -> Option<&SpecRelation> {
        self.relation.as_ref()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name == name)
    }

    /// Name-based value lookup.
    pub fn value(&self, row_idx: usize, col_name: &str) -> Option<&EnumCellValue> {
        let n_idx_col = self.column_index(col_name)?;
        self.rows.get(row_idx)?.get(n_idx_col)
    }
}

/// Ordered forest of related tables.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecDataset {
    /// Dataset tables in export order.
    pub tables: Vec<SpecTable>,
}

impl SpecDataset {
    pub fn new(tables: Vec<SpecTable>) -> Self {
        Self { tables }
    }

    /// Wrap a single table as a one-table dataset.
    pub fn from_table(table: SpecTable) -> Self {
        Self {
            tables: vec![table],
        }
    }

    /// Position of a table by name.
    pub fn table_index(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|table| table.name == name)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnOverrideSpecification

/// Symbolic number-format identifiers mapped to fixed Excel format codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EnumNumberFormat {
    #[default]
    General,
    Text,
    Scientific,
    Fraction,
    Decimal0,
    Decimal1,
    Decimal2,
    Decimal3,
    Decimal4,
    Number0,
    Number2,
    NumberRed2,
    Percent0,
    Percent1,
    Percent2,
    Percent3,
    Percent4,
    CurrencyBlack0,
    CurrencyRed0,
    CurrencyBlack2,
    CurrencyRed2,
    AccountingBlack0,
    AccountingRed0,
    AccountingBlack2,
    AccountingRed2,
    DateShort,
    DateGeneral,
    DateLong,
    DateMonthYear,
    DateIso,
    Time12,
    Time12Seconds,
    Time24,
    Time24Seconds,
    TimeElapsed,
    Timestamp12,
    Timestamp12Seconds,
    Timestamp24,
    Timestamp24Seconds,
    TimestampIso,
    /// Caller-supplied literal format code.
    Custom(String),
}

impl EnumNumberFormat {
    /// Every catalog entry (excluding `Custom`).
    pub const CATALOG: [EnumNumberFormat; 40] = [
        Self::General,
        Self::Text,
        Self::Scientific,
        Self::Fraction,
        Self::Decimal0,
        Self::Decimal1,
        Self::Decimal2,
        Self::Decimal3,
        Self::Decimal4,
        Self::Number0,
        Self::Number2,
        Self::NumberRed2,
        Self::Percent0,
        Self::Percent1,
        Self::Percent2,
        Self::Percent3,
        Self::Percent4,
        Self::CurrencyBlack0,
        Self::CurrencyRed0,
        Self::CurrencyBlack2,
        Self::CurrencyRed2,
        Self::AccountingBlack0,
        Self::AccountingRed0,
        Self::AccountingBlack2,
        Self::AccountingRed2,
        Self::DateShort,
        Self::DateGeneral,
        Self::DateLong,
        Self::DateMonthYear,
        Self::DateIso,
        Self::Time12,
        Self::Time12Seconds,
        Self::Time24,
        Self::Time24Seconds,
        Self::TimeElapsed,
        Self::Timestamp12,
        Self::Timestamp12Seconds,
        Self::Timestamp24,
        Self::Timestamp24Seconds,
        Self::TimestampIso,
    ];

    /// Stable identifier used in settings documents.
    pub fn identifier(&self) -> &str {
        match self {
            Self::General => "general",
            Self::Text => "text",
            Self::Scientific => "scientific",
            Self::Fraction => "fraction",
            Self::Decimal0 => "decimal_0",
            Self::Decimal1 => "decimal_1",
            Self::Decimal2 => "decimal_2",
            Self::Decimal3 => "decimal_3",
            Self::Decimal4 => "decimal_4",
            Self::Number0 => "number_0",
            Self::Number2 => "number_2",
            Self::NumberRed2 => "number_red_2",
            Self::Percent0 => "percent_0",
            Self::Percent1 => "percent_1",
            Self::Percent2 => "percent_2",
            Self::Percent3 => "percent_3",
            Self::Percent4 => "percent_4",
            Self::CurrencyBlack0 => "currency_black_0",
            Self::CurrencyRed0 => "currency_red_0",
            Self::CurrencyBlack2 => "currency_black_2",
            Self::CurrencyRed2 => "currency_red_2",
            Self::AccountingBlack0 => "accounting_black_0",
            Self::AccountingRed0 => "accounting_red_0",
            Self::AccountingBlack2 => "accounting_black_2",
            Self::AccountingRed2 => "accounting_red_2",
            Self::DateShort => "date_short",
            Self::DateGeneral => "date_general",
            Self::DateLong => "date_long",
            Self::DateMonthYear => "date_month_year",
            Self::DateIso => "date_iso",
            Self::Time12 => "time_12",
            Self::Time12Seconds => "time_12_seconds",
            Self::Time24 => "time_24",
            Self::Time24Seconds => "time_24_seconds",
            Self::TimeElapsed => "time_elapsed",
            Self::Timestamp12 => "timestamp_12",
            Self::Timestamp12Seconds => "timestamp_12_seconds",
            Self::Timestamp24 => "timestamp_24",
            Self::Timestamp24Seconds => "timestamp_24_seconds",
            Self::TimestampIso => "timestamp_iso",
            Self::Custom(_) => "custom",
        }
    }

    /// Excel number-format code. These strings are written verbatim into the
    /// workbook and must not change.
    pub fn format_code(&self) -> &str {
        match self {
            Self::General => "General",
            Self::Text => "@",
            Self::Scientific => "0.00E+00",
            Self::Fraction => "# ?/?",
            Self::Decimal0 => "0",
            Self::Decimal1 => "0.0",
            Self::Decimal2 => "0.00",
            Self::Decimal3 => "0.000",
            Self::Decimal4 => "0.0000",
            Self::Number0 => "#,##0",
            Self::Number2 => "#,##0.00",
            Self::NumberRed2 => "#,##0.00;[Red]-#,##0.00",
            Self::Percent0 => "0%",
            Self::Percent1 => "0.0%",
            Self::Percent2 => "0.00%",
            Self::Percent3 => "0.000%",
            Self::Percent4 => "0.0000%",
            Self::CurrencyBlack0 => "\"$\"#,##0_);(\"$\"#,##0)",
            Self::CurrencyRed0 => "\"$\"#,##0_);[Red](\"$\"#,##0)",
            Self::CurrencyBlack2 => "\"$\"#,##0.00_);(\"$\"#,##0.00)",
            Self::CurrencyRed2 => "\"$\"#,##0.00_);[Red](\"$\"#,##0.00)",
            Self::AccountingBlack0 => "_(\"$\"* #,##0_);_(\"$\"* (#,##0);_(\"$\"* \"-\"_);_(@_)",
            Self::AccountingRed0 => {
                "_(\"$\"* #,##0_);[Red]_(\"$\"* (#,##0);_(\"$\"* \"-\"_);_(@_)"
            }
            Self::AccountingBlack2 => {
                "_(\"$\"* #,##0.00_);_(\"$\"* (#,##0.00);_(\"$\"* \"-\"??_);_(@_)"
            }
            Self::AccountingRed2 => {
                "_(\"$\"* #,##0.00_);[Red]_(\"$\"* (#,##0.00);_(\"$\"* \"-\"??_);_(@_)"
            }
            Self::DateShort => "m/d/yyyy",
            Self::DateGeneral => "d-mmm-yy",
            Self::DateLong => "dddd, mmmm d, yyyy",
            Self::DateMonthYear => "mmm-yy",
            Self::DateIso => "yyyy-mm-dd",
            Self::Time12 => "h:mm AM/PM",
            Self::Time12Seconds => "h:mm:ss AM/PM",
            Self::Time24 => "h:mm",
            Self::Time24Seconds => "h:mm:ss",
            Self::TimeElapsed => "[h]:mm:ss",
            Self::Timestamp12 => "m/d/yyyy h:mm AM/PM",
            Self::Timestamp12Seconds => "m/d/yyyy h:mm:ss AM/PM",
            Self::Timestamp24 => "m/d/yyyy h:mm",
            Self::Timestamp24Seconds => "m/d/yyyy h:mm:ss",
            Self::TimestampIso => "yyyy-mm-dd hh:mm:ss",
            Self::Custom(code) => code.as_str(),
        }
    }

    /// Parse a settings identifier. `custom:<code>` yields [`Self::Custom`].
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        if let Some(code) = identifier.strip_prefix("custom:") {
            return Some(Self::Custom(code.to_string()));
        }
        Self::CATALOG
            .iter()
            .find(|fmt_num| fmt_num.identifier() == identifier)
            .cloned()
    }
}

impl TryFrom<String> for EnumNumberFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_identifier(&value).ok_or_else(|| format!("Unknown number format: {value:?}"))
    }
}

impl From<EnumNumberFormat> for String {
    fn from(value: EnumNumberFormat) -> Self {
        match value {
            EnumNumberFormat::Custom(code) => format!("custom:{code}"),
            other => other.identifier().to_string(),
        }
    }
}

/// Horizontal alignment applied by a column override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumHorizontalAlign {
    #[default]
    General,
    Left,
    Center,
    Right,
    Fill,
    Justify,
    CenterAcross,
    Distributed,
}

impl EnumHorizontalAlign {
    /// Alignment keyword understood by [`SpecCellFormat::align`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
            Self::Fill => "fill",
            Self::Justify => "justify",
            Self::CenterAcross => "center_across",
            Self::Distributed => "distributed",
        }
    }
}

/// Per-column display configuration overriding a native column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecColumnOverride {
    /// Native column this override binds to; ignored when no column matches.
    pub col_bound: String,
    /// Header text.
    pub display_name: String,
    /// Number format applied to data cells.
    pub number_format: EnumNumberFormat,
    /// Horizontal alignment applied to data cells.
    pub align: EnumHorizontalAlign,
    /// Hidden overrides drop the column.
    pub if_visible: bool,
    /// Sort key; `None` sorts last.
    pub display_order: Option<i64>,
}

impl Default for SpecColumnOverride {
    fn default() -> Self {
        Self {
            col_bound: String::new(),
            display_name: String::new(),
            number_format: EnumNumberFormat::General,
            align: EnumHorizontalAlign::General,
            if_visible: true,
            display_order: None,
        }
    }
}

impl SpecColumnOverride {
    /// Visible override with `General` format and alignment.
    pub fn new(col_bound: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            col_bound: col_bound.into(),
            display_name: display_name.into(),
            ..Default::default()
        }
    }

    /// Format patch layered on top of the row style for data cells.
    pub fn derive_format_patch(&self) -> SpecCellFormat {
        SpecCellFormat {
            align: Some(self.align.as_str().to_string()),
            num_format: Some(self.number_format.format_code().to_string()),
            ..Default::default()
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExportSettings

/// Styling/behavior configuration bound positionally to one dataset table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecTableSettings {
    /// Sheet name used when no caller override applies.
    pub sheet_name: Option<String>,
    /// Emit the header row for this table.
    pub if_show_header: bool,
    /// Columns to indent the table by.
    pub col_offset: usize,
    /// Header row height in points.
    pub header_row_height: Option<f64>,
    /// Style reference for header cells.
    pub style_header: String,
    /// Alternate odd/even row styles.
    pub if_alternate_rows: bool,
    /// Style reference for odd rows (all rows when not alternating).
    pub style_odd: String,
    /// Style reference for even rows.
    pub style_even: String,
    /// Column remapping; non-empty switches the table to allow-list mode.
    pub column_overrides: Vec<SpecColumnOverride>,
}

impl Default for SpecTableSettings {
    fn default() -> Self {
        Self {
            sheet_name: None,
            if_show_header: true,
            col_offset: 0,
            header_row_height: None,
            style_header: C_STYLE_HEADER.to_string(),
            if_alternate_rows: false,
            style_odd: C_STYLE_ROW_ODD.to_string(),
            style_even: C_STYLE_ROW_EVEN.to_string(),
            column_overrides: Vec::new(),
        }
    }
}

/// Ordered per-table settings; entry `i` describes dataset table `i`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecExportSettings {
    /// Descriptive name only.
    pub name: String,
    /// Positional per-table settings.
    pub per_table: Vec<SpecTableSettings>,
}

impl SpecExportSettings {
    /// Parse a JSON settings document.
    pub fn from_json_str(text: &str) -> Result<Self, ExportError> {
        serde_json::from_str(text).map_err(|err| ExportError::InvalidSettings(err.to_string()))
    }

    /// Load a JSON settings document from disk.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ExportError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|err| {
            ExportError::InvalidSettings(format!(
                "Failed to read {}: {err}",
                path.as_ref().display()
            ))
        })?;
        Self::from_json_str(&text)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_string(&self) -> Result<String, ExportError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| ExportError::InvalidSettings(err.to_string()))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExportOptions

/// How a nested table's `col_offset` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumColumnOffsetRule {
    /// Offset counted from the sheet's left margin (default).
    #[default]
    Absolute,
    /// Offset added to the parent table's column start.
    Cumulative,
}

/// How often a nested table's header is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumChildHeaderRule {
    /// Once per table, before its first row group (default).
    #[default]
    OncePerTable,
    /// Before every parent row's child group.
    PerGroup,
}

/// Autofit width inference policy used by [`crate::writer::XlsxSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAutofitCellsPolicy {
    /// Max rows inspected per column; `None` inspects all.
    pub height_body_inferred_max: Option<usize>,
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            height_body_inferred_max: Some(20_000),
            width_cell_min: 8,
            width_cell_max: 60,
            width_cell_padding: 2,
        }
    }
}

/// Export-wide options.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecExportOptions {
    /// Style registry resolving style references.
    pub styles: BTreeMap<String, SpecCellFormat>,
    /// Global header switch, AND-ed with each table's `if_show_header`.
    pub if_show_headers: bool,
    /// Nested column offset interpretation.
    pub rule_col_offset: EnumColumnOffsetRule,
    /// Nested header emission frequency.
    pub rule_child_header: EnumChildHeaderRule,
}

impl Default for SpecExportOptions {
    fn default() -> Self {
        Self {
            styles: derive_default_styles(),
            if_show_headers: true,
            rule_col_offset: EnumColumnOffsetRule::Absolute,
            rule_child_header: EnumChildHeaderRule::OncePerTable,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// One sheet produced by an export call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetLayout {
    /// Actual unique sheet name.
    pub sheet_name: String,
    /// Dataset table indices placed on this sheet, in emission order.
    pub tables: Vec<usize>,
    /// Exclusive end of the emitted row range.
    pub row_end_exclusive: usize,
    /// Inclusive start of the touched column range.
    pub col_start_inclusive: usize,
    /// Exclusive end of the touched column range.
    pub col_end_exclusive: usize,
}

/// Per-export report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecExportReport {
    /// Sheets in creation order.
    pub sheets: Vec<SpecSheetLayout>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecExportReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        tracing::warn!("{}", msg.as_ref());
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Failure raised by a [`crate::sink::SpreadsheetSink`].
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{axis} index overflow: {value}")]
    IndexOverflow { axis: &'static str, value: usize },

    #[error("Sheet not found: {name}")]
    SheetNotFound { name: String },

    #[error("Cannot write after persist().")]
    Closed,
}

/// Export call failure.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Bad sheet name {name:?}: {reason}")]
    BadSheetName { name: String, reason: String },

    #[error("Settings mismatch: dataset has {n_tables} tables, settings describe {n_settings}")]
    SettingsMismatch { n_tables: usize, n_settings: usize },

    #[error("Invalid relation on table {table:?}: {message}")]
    InvalidRelation { table: String, message: String },

    #[error("Unknown style reference {style:?} on table {table:?}")]
    UnknownStyleRef { table: String, style: String },

    #[error("Custom number format for column {column:?} on table {table:?} has no format code")]
    InvalidNumberFormat { table: String, column: String },

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Unsupported value kind: {kind}")]
    UnsupportedValueKind { kind: String },

    #[error(transparent)]
    Sink(#[from] SinkError),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_format_identifiers_round_trip_through_catalog() {
        for fmt_num in EnumNumberFormat::CATALOG {
            assert_eq!(
                EnumNumberFormat::from_identifier(fmt_num.identifier()),
                Some(fmt_num.clone())
            );
        }
        assert_eq!(
            EnumNumberFormat::from_identifier("custom:0.0\" kg\""),
            Some(EnumNumberFormat::Custom("0.0\" kg\"".to_string()))
        );
        assert_eq!(EnumNumberFormat::from_identifier("nope"), None);
    }

    #[test]
    fn test_number_format_codes_are_fixed() {
        assert_eq!(EnumNumberFormat::General.format_code(), "General");
        assert_eq!(EnumNumberFormat::Decimal2.format_code(), "0.00");
        assert_eq!(EnumNumberFormat::Percent4.format_code(), "0.0000%");
        assert_eq!(
            EnumNumberFormat::CurrencyRed2.format_code(),
            "\"$\"#,##0.00_);[Red](\"$\"#,##0.00)"
        );
        assert_eq!(
            EnumNumberFormat::Timestamp24Seconds.format_code(),
            "m/d/yyyy h:mm:ss"
        );
    }

    #[test]
    fn test_push_row_rejects_width_mismatch() {
        let mut table = SpecTable::new(
            "Directors",
            vec![
                SpecColumn::new("DID", EnumValueKind::Integer),
                SpecColumn::new("Name", EnumValueKind::String),
            ],
        );
        assert!(table.push_row(vec![15.into(), "Ann".into()]).is_ok());
        let err = table.push_row(vec![34.into()]).unwrap_err();
        assert!(matches!(err, ExportError::InvalidDataset(_)));
        assert_eq!(table.value(0, "Name"), Some(&EnumCellValue::from("Ann")));
    }

    #[test]
    fn test_settings_json_defaults_missing_fields() {
        let settings = SpecExportSettings::from_json_str(
            r#"{
                "name": "org chart",
                "per_table": [
                    {"sheet_name": "Org", "column_overrides": [
                        {"col_bound": "Salary", "display_name": "Pay",
                         "number_format": "currency_red_2", "align": "right",
                         "display_order": 2}
                    ]},
                    {"if_alternate_rows": true}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(settings.per_table.len(), 2);
        let cfg_first = &settings.per_table[0];
        assert!(cfg_first.if_show_header);
        assert_eq!(cfg_first.style_header, C_STYLE_HEADER);
        let override_pay = &cfg_first.column_overrides[0];
        assert!(override_pay.if_visible);
        assert_eq!(override_pay.number_format, EnumNumberFormat::CurrencyRed2);
        assert_eq!(override_pay.align, EnumHorizontalAlign::Right);
        assert!(settings.per_table[1].if_alternate_rows);

        let c_json = settings.to_json_string().unwrap();
        assert_eq!(SpecExportSettings::from_json_str(&c_json).unwrap(), settings);
    }

    #[test]
    fn test_settings_json_rejects_unknown_number_format() {
        let err = SpecExportSettings::from_json_str(
            r#"{"per_table": [{"column_overrides": [{"number_format": "bogus"}]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ExportError::InvalidSettings(_)));
    }
}
