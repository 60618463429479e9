//! XLSX sink that buffers layout commands and renders them through `rust_xlsxwriter`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;
use std::path::Path;

use chrono::{Datelike, NaiveDateTime, Timelike};
use rust_xlsxwriter::{ExcelDateTime, Format, FormatAlign, FormatBorder, Workbook, Worksheet};

use crate::conf::{
    C_FMT_TIMESTAMP_DEFAULT, C_SHEET_NAME_DEFAULT, F_ROW_HEIGHT_DEFAULT, N_NCOLS_EXCEL_MAX,
    N_NROWS_EXCEL_MAX,
};
use crate::sink::SpreadsheetSink;
use crate::spec::{EnumCellValue, SinkError, SpecAutofitCellsPolicy, SpecCellFormat};
use crate::util::{
    convert_value_to_text, derive_contiguous_ranges, estimate_line_count, estimate_width_len,
};

/// One buffered cell.
#[derive(Debug, Clone, Default, PartialEq)]
struct SpecBufferedCell {
    value: EnumCellValue,
    format: Option<SpecCellFormat>,
}

/// Buffered content of one worksheet.
#[derive(Debug, Clone, Default)]
struct SpecSheetBuffer {
    name: String,
    dict_cells: BTreeMap<(usize, usize), SpecBufferedCell>,
    dict_row_levels: BTreeMap<usize, u8>,
    set_ranges_collapsed: BTreeSet<(usize, usize)>,
    dict_row_heights: BTreeMap<usize, f64>,
    l_autofit_cols: Vec<(usize, usize)>,
    l_autofit_rows: Vec<(usize, usize)>,
}

impl SpecSheetBuffer {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Stateful workbook sink.
///
/// Commands are buffered in memory; the workbook is built and written once,
/// by [`SpreadsheetSink::persist_to_path`] or [`SpreadsheetSink::persist_to_writer`].
/// Any command after that fails with [`SinkError::Closed`].
pub struct XlsxSink {
    l_sheets: Vec<SpecSheetBuffer>,
    idx_sheet_selected: usize,
    policy_autofit: SpecAutofitCellsPolicy,
    if_closed: bool,
}

impl Default for XlsxSink {
    fn default() -> Self {
        Self::new()
    }
}

impl XlsxSink {
    /// Create a sink holding one empty default sheet.
    pub fn new() -> Self {
        Self::with_autofit_policy(SpecAutofitCellsPolicy::default())
    }

    /// Create a sink with a custom column autofit policy.
    pub fn with_autofit_policy(policy_autofit: SpecAutofitCellsPolicy) -> Self {
        Self {
            l_sheets: vec![SpecSheetBuffer::new(C_SHEET_NAME_DEFAULT)],
            idx_sheet_selected: 0,
            policy_autofit,
            if_closed: false,
        }
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.l_sheets.iter().map(|sheet| sheet.name.clone()).collect()
    }

    /// Whether the workbook has been persisted.
    pub fn is_closed(&self) -> bool {
        self.if_closed
    }

    fn ensure_open(&self) -> Result<(), SinkError> {
        if self.if_closed {
            return Err(SinkError::Closed);
        }
        Ok(())
    }

    fn sheet_selected(&mut self) -> Result<&mut SpecSheetBuffer, SinkError> {
        self.ensure_open()?;
        Ok(&mut self.l_sheets[self.idx_sheet_selected])
    }

    fn cell_mut(&mut self, row: usize, col: usize) -> Result<&mut SpecBufferedCell, SinkError> {
        cast_row_num(row)?;
        cast_col_num(col)?;
        Ok(self
            .sheet_selected()?
            .dict_cells
            .entry((row, col))
            .or_default())
    }

    fn render_workbook(&self) -> Result<Workbook, SinkError> {
        let mut workbook = Workbook::new();
        let mut dict_formats: HashMap<SpecCellFormat, Format> = HashMap::new();

        for sheet in &self.l_sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&sheet.name)?;
            render_sheet(worksheet, sheet, &self.policy_autofit, &mut dict_formats)?;
        }

        Ok(workbook)
    }
}

impl SpreadsheetSink for XlsxSink {
    fn set_cell_value(
        &mut self,
        row: usize,
        col: usize,
        value: &EnumCellValue,
    ) -> Result<(), SinkError> {
        self.cell_mut(row, col)?.value = value.clone();
        Ok(())
    }

    fn set_cell_style(
        &mut self,
        row: usize,
        col: usize,
        format: &SpecCellFormat,
    ) -> Result<(), SinkError> {
        self.cell_mut(row, col)?.format = Some(format.clone());
        Ok(())
    }

    fn add_grouped_row(&mut self, row: usize, level: u8) -> Result<(), SinkError> {
        cast_row_num(row)?;
        self.sheet_selected()?.dict_row_levels.insert(row, level);
        Ok(())
    }

    fn collapse_rows(&mut self, row_first: usize, row_last: usize) -> Result<(), SinkError> {
        cast_row_num(row_last)?;
        self.sheet_selected()?
            .set_ranges_collapsed
            .insert((row_first, row_last));
        Ok(())
    }

    fn set_row_height(&mut self, row: usize, height: f64) -> Result<(), SinkError> {
        cast_row_num(row)?;
        self.sheet_selected()?.dict_row_heights.insert(row, height);
        Ok(())
    }

    fn add_sheet(&mut self, name: &str) -> Result<(), SinkError> {
        self.ensure_open()?;
        self.l_sheets.push(SpecSheetBuffer::new(name));
        Ok(())
    }

    fn rename_default_sheet(&mut self, name: &str) -> Result<(), SinkError> {
        self.ensure_open()?;
        self.l_sheets[0].name = name.to_string();
        Ok(())
    }

    fn select_sheet(&mut self, name: &str) -> Result<(), SinkError> {
        self.ensure_open()?;
        self.idx_sheet_selected = self
            .l_sheets
            .iter()
            .position(|sheet| sheet.name == name)
            .ok_or_else(|| SinkError::SheetNotFound {
                name: name.to_string(),
            })?;
        Ok(())
    }

    fn autofit_columns(&mut self, col_first: usize, col_last: usize) -> Result<(), SinkError> {
        cast_col_num(col_last)?;
        self.sheet_selected()?
            .l_autofit_cols
            .push((col_first, col_last));
        Ok(())
    }

    fn autofit_rows(&mut self, row_first: usize, row_last: usize) -> Result<(), SinkError> {
        cast_row_num(row_last)?;
        self.sheet_selected()?
            .l_autofit_rows
            .push((row_first, row_last));
        Ok(())
    }

    fn persist_to_path(&mut self, path: &Path) -> Result<(), SinkError> {
        self.ensure_open()?;
        let mut workbook = self.render_workbook()?;
        workbook.save(path)?;
        self.if_closed = true;
        tracing::debug!("Workbook written to {}", path.display());
        Ok(())
    }

    fn persist_to_writer(&mut self, writer: &mut dyn Write) -> Result<(), SinkError> {
        self.ensure_open()?;
        let mut workbook = self.render_workbook()?;
        let v_bytes = workbook.save_to_buffer()?;
        writer.write_all(&v_bytes)?;
        writer.flush()?;
        self.if_closed = true;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region SheetRendering

fn render_sheet(
    worksheet: &mut Worksheet,
    sheet: &SpecSheetBuffer,
    policy_autofit: &SpecAutofitCellsPolicy,
    dict_formats: &mut HashMap<SpecCellFormat, Format>,
) -> Result<(), SinkError> {
    let fmt_timestamp_default = SpecCellFormat {
        num_format: Some(C_FMT_TIMESTAMP_DEFAULT.to_string()),
        ..Default::default()
    };

    let mut n_cells_as_text = 0usize;
    for (&(row_idx, col_idx), cell) in &sheet.dict_cells {
        let mut fmt_spec = cell.format.clone();
        if matches!(cell.value, EnumCellValue::Timestamp(_))
            && fmt_spec
                .as_ref()
                .is_none_or(|fmt_cell| fmt_cell.num_format.is_none())
        {
            fmt_spec = Some(
                fmt_spec
                    .unwrap_or_default()
                    .merge(&fmt_timestamp_default),
            );
        }

        let format = match fmt_spec {
            Some(fmt_spec) => Some(
                dict_formats
                    .entry(fmt_spec)
                    .or_insert_with_key(derive_rust_xlsx_format)
                    .clone(),
            ),
            None => None,
        };
        if !write_cell_with_format(worksheet, row_idx, col_idx, &cell.value, format.as_ref())? {
            n_cells_as_text += 1;
        }
    }
    if n_cells_as_text > 0 {
        tracing::warn!(
            "Sheet {:?}: {} timestamps outside the Excel date range written as text",
            sheet.name,
            n_cells_as_text
        );
    }

    render_row_groups(worksheet, sheet)?;
    render_row_heights(worksheet, sheet)?;
    render_column_widths(worksheet, sheet, policy_autofit)?;

    Ok(())
}

/// One outline group: `(level, row_first, row_last, if_collapsed)`.
type TupRowGroup = (u8, usize, usize, bool);

/// Derive outline groups from outermost to innermost level.
///
/// A run of rows with level >= `k` becomes one level-`k` group; the run is
/// collapsed when the layout asked to collapse exactly that range.
fn plan_row_groups(sheet: &SpecSheetBuffer) -> Vec<TupRowGroup> {
    let n_level_max = sheet.dict_row_levels.values().copied().max().unwrap_or(0);
    let mut l_groups = Vec::new();

    for n_level in 1..=n_level_max {
        let l_rows: Vec<usize> = sheet
            .dict_row_levels
            .iter()
            .filter(|(_, level)| **level >= n_level)
            .map(|(row_idx, _)| *row_idx)
            .collect();

        for (row_first, row_last) in derive_contiguous_ranges(&l_rows) {
            let if_collapsed = sheet.set_ranges_collapsed.contains(&(row_first, row_last));
            l_groups.push((n_level, row_first, row_last, if_collapsed));
        }
    }
    l_groups
}

fn render_row_groups(worksheet: &mut Worksheet, sheet: &SpecSheetBuffer) -> Result<(), SinkError> {
    for (_, row_first, row_last, if_collapsed) in plan_row_groups(sheet) {
        let (row_first, row_last) = (cast_row_num(row_first)?, cast_row_num(row_last)?);
        if if_collapsed {
            worksheet.group_rows_collapsed(row_first, row_last)?;
        } else {
            worksheet.group_rows(row_first, row_last)?;
        }
    }
    Ok(())
}

fn render_row_heights(worksheet: &mut Worksheet, sheet: &SpecSheetBuffer) -> Result<(), SinkError> {
    let mut dict_heights = sheet.dict_row_heights.clone();

    for &(row_first, row_last) in &sheet.l_autofit_rows {
        let mut dict_lines: BTreeMap<usize, usize> = BTreeMap::new();
        for (&(row_idx, _), cell) in sheet.dict_cells.range((row_first, 0)..=(row_last, usize::MAX)) {
            let n_lines = dict_lines.entry(row_idx).or_insert(1);
            *n_lines = usize::max(*n_lines, estimate_line_count(&cell.value));
        }
        for (row_idx, n_lines) in dict_lines {
            if n_lines > 1 {
                dict_heights
                    .entry(row_idx)
                    .or_insert(n_lines as f64 * F_ROW_HEIGHT_DEFAULT);
            }
        }
    }

    for (row_idx, height) in dict_heights {
        worksheet.set_row_height(cast_row_num(row_idx)?, height)?;
    }
    Ok(())
}

fn render_column_widths(
    worksheet: &mut Worksheet,
    sheet: &SpecSheetBuffer,
    policy_autofit: &SpecAutofitCellsPolicy,
) -> Result<(), SinkError> {
    let n_min = usize::max(1, policy_autofit.width_cell_min);
    let n_max = usize::min(255, usize::max(n_min, policy_autofit.width_cell_max));
    let n_pad = policy_autofit.width_cell_padding;

    let mut dict_widths: BTreeMap<usize, usize> = BTreeMap::new();
    let mut dict_rows_seen: BTreeMap<usize, usize> = BTreeMap::new();

    for (&(_, col_idx), cell) in &sheet.dict_cells {
        if !sheet
            .l_autofit_cols
            .iter()
            .any(|&(col_first, col_last)| (col_first..=col_last).contains(&col_idx))
        {
            continue;
        }
        let n_rows_seen = dict_rows_seen.entry(col_idx).or_insert(0);
        if policy_autofit
            .height_body_inferred_max
            .is_some_and(|n_rows_max| *n_rows_seen >= n_rows_max)
        {
            continue;
        }
        *n_rows_seen += 1;

        let n_width = dict_widths.entry(col_idx).or_insert(0);
        *n_width = usize::max(*n_width, estimate_width_len(&cell.value));
    }

    for (col_idx, n_width_recorded) in dict_widths {
        let n_width_final = usize::min(n_max, usize::max(n_min, n_width_recorded + n_pad));
        worksheet.set_column_width(cast_col_num(col_idx)?, n_width_final as f64)?;
    }
    Ok(())
}

/// Write one cell; returns `false` when the value fell back to its text rendering.
fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: Option<&Format>,
) -> Result<bool, SinkError> {
    let row = cast_row_num(row_idx)?;
    let col = cast_col_num(col_idx)?;
    let fmt_default = Format::new();
    let format = format.unwrap_or(&fmt_default);

    match value {
        EnumCellValue::None => {
            worksheet.write_blank(row, col, format)?;
        }
        EnumCellValue::Integer(val) => {
            worksheet.write_number_with_format(row, col, *val as f64, format)?;
        }
        EnumCellValue::Float(val) => {
            if val.is_finite() {
                worksheet.write_number_with_format(row, col, *val, format)?;
            } else {
                worksheet.write_string_with_format(row, col, val.to_string(), format)?;
            }
        }
        EnumCellValue::Boolean(val) => {
            worksheet.write_boolean_with_format(row, col, *val, format)?;
        }
        EnumCellValue::String(val) => {
            worksheet.write_string_with_format(row, col, val, format)?;
        }
        EnumCellValue::Timestamp(val) => match derive_excel_datetime(val) {
            Ok(dt_excel) => {
                worksheet.write_datetime_with_format(row, col, &dt_excel, format)?;
            }
            Err(_) => {
                worksheet.write_string_with_format(row, col, convert_value_to_text(value), format)?;
                return Ok(false);
            }
        },
    }
    Ok(true)
}

fn derive_excel_datetime(value: &NaiveDateTime) -> Result<ExcelDateTime, SinkError> {
    let n_year = u16::try_from(value.year()).map_err(|_| SinkError::IndexOverflow {
        axis: "year",
        value: value.year().unsigned_abs() as usize,
    })?;
    let n_seconds =
        f64::from(value.second()) + f64::from(value.nanosecond() % 1_000_000_000) / 1e9;

    Ok(ExcelDateTime::from_ymd(n_year, value.month() as u8, value.day() as u8)?.and_hms(
        value.hour() as u16,
        value.minute() as u8,
        n_seconds,
    )?)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FormatConversion

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }

    for val in [&spec.align, &spec.valign].into_iter().flatten() {
        if let Some(align) = derive_format_align(val) {
            format = format.set_align(align);
        }
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    match align.trim().to_ascii_lowercase().as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "center_across" => Some(FormatAlign::CenterAcross),
        "distributed" => Some(FormatAlign::Distributed),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

fn cast_row_num(value: usize) -> Result<u32, SinkError> {
    if value >= N_NROWS_EXCEL_MAX {
        return Err(SinkError::IndexOverflow { axis: "row", value });
    }
    u32::try_from(value).map_err(|_| SinkError::IndexOverflow { axis: "row", value })
}

fn cast_col_num(value: usize) -> Result<u16, SinkError> {
    if value >= N_NCOLS_EXCEL_MAX {
        return Err(SinkError::IndexOverflow {
            axis: "column",
            value,
        });
    }
    u16::try_from(value).map_err(|_| SinkError::IndexOverflow {
        axis: "column",
        value,
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::export_dataset;
    use crate::spec::{
        EnumValueKind, SpecColumn, SpecDataset, SpecExportOptions, SpecTable,
    };
    use chrono::NaiveDate;

    fn create_org_dataset() -> SpecDataset {
        let directors = SpecTable::new(
            "Directors",
            vec![
                SpecColumn::new("DID", EnumValueKind::Integer),
                SpecColumn::new("Name", EnumValueKind::String),
            ],
        )
        .with_row(vec![15.into(), "Ann".into()])
        .unwrap()
        .with_row(vec![34.into(), "Bob\nSenior".into()])
        .unwrap()
        .with_relation("DID", "Managers", "DID");
        let managers = SpecTable::new(
            "Managers",
            vec![
                SpecColumn::new("DID", EnumValueKind::Integer),
                SpecColumn::new("Hired", EnumValueKind::Timestamp),
            ],
        )
        .with_row(vec![
            34.into(),
            NaiveDate::from_ymd_opt(2021, 3, 4)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
                .into(),
        ])
        .unwrap();
        let audit = SpecTable::new("Audit", vec![SpecColumn::new("Ok", EnumValueKind::Boolean)])
            .with_row(vec![true.into()])
            .unwrap();
        SpecDataset::new(vec![directors, managers, audit])
    }

    #[test]
    fn test_persist_to_path_writes_xlsx_zip() {
        let dir_tmp = tempfile::tempdir().unwrap();
        let path_out = dir_tmp.path().join("org.xlsx");

        let mut sink = XlsxSink::new();
        export_dataset(
            &mut sink,
            &create_org_dataset(),
            None,
            None,
            &SpecExportOptions::default(),
        )
        .unwrap();
        assert_eq!(sink.sheet_names(), vec!["Directors", "Audit"]);
        sink.persist_to_path(&path_out).unwrap();

        let v_bytes = std::fs::read(&path_out).unwrap();
        assert!(v_bytes.len() > 100);
        assert_eq!(&v_bytes[..2], b"PK");
        assert!(sink.is_closed());
    }

    #[test]
    fn test_persist_to_writer_and_reject_later_writes() {
        let mut sink = XlsxSink::new();
        sink.set_cell_value(0, 0, &EnumCellValue::from(1.5)).unwrap();
        sink.set_cell_style(0, 0, &SpecCellFormat::default()).unwrap();

        let mut v_out: Vec<u8> = Vec::new();
        sink.persist_to_writer(&mut v_out).unwrap();
        assert_eq!(&v_out[..2], b"PK");

        assert!(matches!(
            sink.set_cell_value(1, 0, &EnumCellValue::from("late")),
            Err(SinkError::Closed)
        ));
        assert!(matches!(
            sink.persist_to_writer(&mut v_out),
            Err(SinkError::Closed)
        ));
    }

    #[test]
    fn test_out_of_range_coordinates_are_rejected() {
        let mut sink = XlsxSink::new();
        assert!(matches!(
            sink.set_cell_value(N_NROWS_EXCEL_MAX, 0, &EnumCellValue::None),
            Err(SinkError::IndexOverflow { axis: "row", .. })
        ));
        assert!(matches!(
            sink.set_cell_value(0, N_NCOLS_EXCEL_MAX, &EnumCellValue::None),
            Err(SinkError::IndexOverflow { axis: "column", .. })
        ));
    }

    #[test]
    fn test_select_unknown_sheet_fails() {
        let mut sink = XlsxSink::new();
        sink.add_sheet("Second").unwrap();
        assert!(sink.select_sheet("Second").is_ok());
        assert!(matches!(
            sink.select_sheet("Third"),
            Err(SinkError::SheetNotFound { .. })
        ));
    }

    #[test]
    fn test_derive_format_align_and_border() {
        assert_eq!(derive_format_align(" Center "), Some(FormatAlign::Center));
        assert_eq!(derive_format_align("vcenter"), Some(FormatAlign::VerticalCenter));
        assert_eq!(derive_format_align("sideways"), None);
        assert_eq!(derive_format_border(1), FormatBorder::Thin);
        assert_eq!(derive_format_border(99), FormatBorder::None);
    }

    #[test]
    fn test_derive_excel_datetime_accepts_naive_timestamps() {
        let dt = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_opt(23, 59, 58)
            .unwrap();
        assert!(derive_excel_datetime(&dt).is_ok());
    }

    #[test]
    fn test_timestamps_outside_excel_range_are_written_as_text() {
        let dt_early = NaiveDate::from_ymd_opt(1850, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(derive_excel_datetime(&dt_early).is_err());

        let mut sink = XlsxSink::new();
        sink.set_cell_value(0, 0, &EnumCellValue::from(dt_early)).unwrap();
        sink.set_cell_style(
            0,
            0,
            &SpecCellFormat {
                num_format: Some("yyyy-mm-dd".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        sink.set_cell_value(1, 0, &EnumCellValue::from(2.5)).unwrap();

        let mut v_out: Vec<u8> = Vec::new();
        sink.persist_to_writer(&mut v_out).unwrap();
        assert_eq!(&v_out[..2], b"PK");
        assert!(sink.is_closed());
    }

    #[test]
    fn test_plan_row_groups_collapses_exact_level_runs() {
        let mut sink = XlsxSink::new();
        for (row, level) in [(2, 1), (3, 2), (4, 2), (5, 1), (7, 1)] {
            sink.add_grouped_row(row, level).unwrap();
        }
        sink.collapse_rows(3, 4).unwrap();
        sink.collapse_rows(2, 5).unwrap();
        sink.collapse_rows(6, 7).unwrap();

        assert_eq!(
            plan_row_groups(&sink.l_sheets[0]),
            vec![(1, 2, 5, true), (1, 7, 7, false), (2, 3, 4, true)]
        );
        assert!(plan_row_groups(&SpecSheetBuffer::new("Empty")).is_empty());
    }

    #[test]
    fn test_exported_children_render_as_collapsed_group() {
        let mut sink = XlsxSink::new();
        export_dataset(
            &mut sink,
            &create_org_dataset(),
            None,
            None,
            &SpecExportOptions::default(),
        )
        .unwrap();

        assert_eq!(plan_row_groups(&sink.l_sheets[0]), vec![(1, 3, 4, true)]);
        assert!(plan_row_groups(&sink.l_sheets[1]).is_empty());
    }
}
