//! Layout engine: sheet assignment, header/row emission and nested outline traversal.

use std::collections::{BTreeMap, BTreeSet};

use crate::conf::{C_NO_DATA_TEXT, N_OUTLINE_LEVEL_MAX, derive_default_table_settings};
use crate::sink::SpreadsheetSink;
use crate::spec::{
    EnumCellValue, EnumChildHeaderRule, EnumColumnOffsetRule, EnumNumberFormat, ExportError,
    SpecCellFormat, SpecDataset, SpecExportOptions, SpecExportReport, SpecExportSettings,
    SpecSheetLayout, SpecTable, SpecTableSettings,
};
use crate::util::{
    EnumSheetNameSource, SpecColumnPlan, convert_value_to_text_cell, derive_key_token,
    derive_rows_by_key, derive_unique_sheet_name, resolve_effective_columns, resolve_sheet_name,
};

////////////////////////////////////////////////////////////////////////////////
// #region PublicApi

/// Export every table of `dataset` into `sink`.
///
/// `settings[i]` binds positionally to `dataset.tables[i]`; `None` applies
/// [`derive_default_table_settings`] to every table. All configuration is
/// validated before the first sink command is issued.
pub fn export_dataset<S: SpreadsheetSink + ?Sized>(
    sink: &mut S,
    dataset: &SpecDataset,
    sheet_names: Option<&[String]>,
    settings: Option<&SpecExportSettings>,
    options: &SpecExportOptions,
) -> Result<SpecExportReport, ExportError> {
    let mut report = SpecExportReport::default();
    let plan = plan_layout(dataset, sheet_names, settings, options, &mut report)?;

    for (idx_sheet, sheet_plan) in plan.sheets.iter().enumerate() {
        if idx_sheet == 0 {
            sink.rename_default_sheet(&sheet_plan.sheet_name)?;
        } else {
            sink.add_sheet(&sheet_plan.sheet_name)?;
            sink.select_sheet(&sheet_plan.sheet_name)?;
        }
        tracing::debug!(
            "Sheet {} ({:?}) starts at table {:?}",
            idx_sheet,
            sheet_plan.sheet_name,
            dataset.tables[sheet_plan.idx_table_root].name
        );

        let layout_sheet = emit_sheet(sink, &plan, sheet_plan)?;
        report.sheets.push(layout_sheet);
    }

    tracing::info!(
        "Exported {} tables into {} sheets",
        dataset.tables.len(),
        report.sheets.len()
    );
    Ok(report)
}

/// One-table form of [`export_dataset`].
pub fn export_table<S: SpreadsheetSink + ?Sized>(
    sink: &mut S,
    table: &SpecTable,
    sheet_name: Option<&str>,
    table_settings: Option<&SpecTableSettings>,
    options: &SpecExportOptions,
) -> Result<SpecExportReport, ExportError> {
    let dataset = SpecDataset::from_table(table.clone());
    let l_sheet_names: Option<Vec<String>> = sheet_name.map(|c_name| vec![c_name.to_string()]);
    let settings = table_settings.map(|cfg| SpecExportSettings {
        name: String::new(),
        per_table: vec![cfg.clone()],
    });

    export_dataset(
        sink,
        &dataset,
        l_sheet_names.as_deref(),
        settings.as_ref(),
        options,
    )
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region LayoutPlan

/// Resolved formats of one table.
#[derive(Debug, Clone)]
struct SpecTableFormats {
    fmt_header: SpecCellFormat,
    fmt_odd: SpecCellFormat,
    fmt_even: SpecCellFormat,
}

/// Resolved child relation of one table.
#[derive(Debug, Clone)]
struct SpecChildLink {
    idx_table_child: usize,
    idx_col_key_local: usize,
    dict_rows_by_key: BTreeMap<String, Vec<usize>>,
}

#[derive(Debug, Clone)]
struct SpecSheetPlan {
    sheet_name: String,
    idx_table_root: usize,
}

/// Everything an export needs, resolved and validated up front.
struct LayoutPlan<'a> {
    dataset: &'a SpecDataset,
    options: &'a SpecExportOptions,
    l_settings: Vec<SpecTableSettings>,
    l_columns: Vec<SpecColumnPlan>,
    l_formats: Vec<SpecTableFormats>,
    l_children: Vec<Option<SpecChildLink>>,
    sheets: Vec<SpecSheetPlan>,
}

fn plan_layout<'a>(
    dataset: &'a SpecDataset,
    sheet_names: Option<&[String]>,
    settings: Option<&SpecExportSettings>,
    options: &'a SpecExportOptions,
    report: &mut SpecExportReport,
) -> Result<LayoutPlan<'a>, ExportError> {
    let n_tables = dataset.tables.len();
    if n_tables == 0 {
        return Err(ExportError::InvalidDataset(
            "Dataset contains no tables.".to_string(),
        ));
    }

    let l_settings = resolve_table_settings(n_tables, settings, report)?;
    let l_children = plan_child_links(dataset)?;
    validate_relation_chains(dataset, &l_children)?;

    let mut l_formats = Vec::with_capacity(n_tables);
    let mut l_columns = Vec::with_capacity(n_tables);
    for (table, cfg) in dataset.tables.iter().zip(&l_settings) {
        validate_number_formats(table, cfg)?;
        l_formats.push(resolve_table_formats(table, cfg, options)?);

        let plan_columns = resolve_effective_columns(table, &cfg.column_overrides);
        for c_warning in &plan_columns.warnings {
            report.warn(c_warning);
        }
        l_columns.push(plan_columns);
    }

    let sheets = plan_sheets(dataset, sheet_names, &l_settings, &l_children)?;

    Ok(LayoutPlan {
        dataset,
        options,
        l_settings,
        l_columns,
        l_formats,
        l_children,
        sheets,
    })
}

/// Bind settings positionally; fewer entries than tables is an error.
fn resolve_table_settings(
    n_tables: usize,
    settings: Option<&SpecExportSettings>,
    report: &mut SpecExportReport,
) -> Result<Vec<SpecTableSettings>, ExportError> {
    let Some(settings) = settings else {
        return Ok(vec![derive_default_table_settings(); n_tables]);
    };

    let n_settings = settings.per_table.len();
    if n_settings < n_tables {
        return Err(ExportError::SettingsMismatch {
            n_tables,
            n_settings,
        });
    }
    if n_settings > n_tables {
        report.warn(format!(
            "Settings {:?} describe {} tables, dataset has {}; extra entries ignored.",
            settings.name, n_settings, n_tables
        ));
    }

    Ok(settings.per_table[..n_tables].to_vec())
}

fn plan_child_links(dataset: &SpecDataset) -> Result<Vec<Option<SpecChildLink>>, ExportError> {
    let mut l_children = Vec::with_capacity(dataset.tables.len());

    for table in &dataset.tables {
        let Some(relation) = table.relation() else {
            l_children.push(None);
            continue;
        };
        let invalid = |message: String| ExportError::InvalidRelation {
            table: table.name.clone(),
            message,
        };

        let idx_col_key_local = table
            .column_index(&relation.col_key_local)
            .ok_or_else(|| invalid(format!("unknown key column {:?}", relation.col_key_local)))?;
        let idx_table_child = dataset
            .table_index(&relation.table_child)
            .ok_or_else(|| invalid(format!("unknown child table {:?}", relation.table_child)))?;
        let table_child = &dataset.tables[idx_table_child];
        let idx_col_key_child = table_child
            .column_index(&relation.col_key_child)
            .ok_or_else(|| {
                invalid(format!(
                    "unknown key column {:?} on child table {:?}",
                    relation.col_key_child, relation.table_child
                ))
            })?;

        l_children.push(Some(SpecChildLink {
            idx_table_child,
            idx_col_key_local,
            dict_rows_by_key: derive_rows_by_key(table_child, idx_col_key_child),
        }));
    }

    Ok(l_children)
}

/// Reject cyclic chains and chains deeper than the outline can show.
fn validate_relation_chains(
    dataset: &SpecDataset,
    l_children: &[Option<SpecChildLink>],
) -> Result<(), ExportError> {
    for (idx_table, table) in dataset.tables.iter().enumerate() {
        let mut set_visited = BTreeSet::from([idx_table]);
        let mut n_depth = 0usize;
        let mut idx_cur = idx_table;

        while let Some(link) = &l_children[idx_cur] {
            if !set_visited.insert(link.idx_table_child) {
                return Err(ExportError::InvalidRelation {
                    table: table.name.clone(),
                    message: "relation chain forms a cycle".to_string(),
                });
            }
            n_depth += 1;
            if n_depth > usize::from(N_OUTLINE_LEVEL_MAX) {
                return Err(ExportError::InvalidRelation {
                    table: table.name.clone(),
                    message: format!(
                        "relation chain nests deeper than {N_OUTLINE_LEVEL_MAX} outline levels"
                    ),
                });
            }
            idx_cur = link.idx_table_child;
        }
    }
    Ok(())
}

fn validate_number_formats(table: &SpecTable, cfg: &SpecTableSettings) -> Result<(), ExportError> {
    for col_override in &cfg.column_overrides {
        if let EnumNumberFormat::Custom(code) = &col_override.number_format {
            if code.trim().is_empty() {
                return Err(ExportError::InvalidNumberFormat {
                    table: table.name.clone(),
                    column: col_override.col_bound.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Resolve the style references a table will use; an empty reference is
/// the blank format.
fn resolve_table_formats(
    table: &SpecTable,
    cfg: &SpecTableSettings,
    options: &SpecExportOptions,
) -> Result<SpecTableFormats, ExportError> {
    let resolve = |style: &str, if_used: bool| -> Result<SpecCellFormat, ExportError> {
        if !if_used || style.is_empty() {
            return Ok(SpecCellFormat::default());
        }
        options
            .styles
            .get(style)
            .cloned()
            .ok_or_else(|| ExportError::UnknownStyleRef {
                table: table.name.clone(),
                style: style.to_string(),
            })
    };

    Ok(SpecTableFormats {
        fmt_header: resolve(
            &cfg.style_header,
            options.if_show_headers && cfg.if_show_header,
        )?,
        fmt_odd: resolve(&cfg.style_odd, true)?,
        fmt_even: resolve(&cfg.style_even, cfg.if_alternate_rows)?,
    })
}

/// Pick the tables that start sheets and name those sheets.
///
/// Tables reached through any relation are emitted nested under their parent
/// and never start a sheet of their own. Caller-supplied names are reserved
/// first and must be unique (case-insensitive); derived names take a `__N`
/// suffix when they collide.
fn plan_sheets(
    dataset: &SpecDataset,
    sheet_names: Option<&[String]>,
    l_settings: &[SpecTableSettings],
    l_children: &[Option<SpecChildLink>],
) -> Result<Vec<SpecSheetPlan>, ExportError> {
    let set_nested: BTreeSet<usize> = l_children
        .iter()
        .flatten()
        .map(|link| link.idx_table_child)
        .collect();

    let mut l_resolved = Vec::new();
    for (idx_table, table) in dataset.tables.iter().enumerate() {
        if set_nested.contains(&idx_table) {
            continue;
        }
        let (c_name, source) =
            resolve_sheet_name(sheet_names, l_resolved.len(), &l_settings[idx_table], table)?;
        l_resolved.push((idx_table, c_name, source));
    }

    let mut set_names_existing = BTreeSet::new();
    for (_, c_name, source) in &l_resolved {
        if *source == EnumSheetNameSource::Caller
            && !set_names_existing.insert(c_name.to_lowercase())
        {
            return Err(ExportError::BadSheetName {
                name: c_name.clone(),
                reason: "duplicates another sheet name (case-insensitive)".to_string(),
            });
        }
    }

    let l_sheets = l_resolved
        .into_iter()
        .map(|(idx_table, c_name, source)| SpecSheetPlan {
            sheet_name: match source {
                EnumSheetNameSource::Caller => c_name,
                EnumSheetNameSource::Derived => {
                    derive_unique_sheet_name(&c_name, &mut set_names_existing)
                }
            },
            idx_table_root: idx_table,
        })
        .collect();

    Ok(l_sheets)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Emission

/// Per-sheet mutable emission state.
struct SheetState {
    layout: SpecSheetLayout,
    set_header_emitted: BTreeSet<usize>,
    if_touched_col: bool,
}

impl SheetState {
    fn new(sheet_name: &str) -> Self {
        Self {
            layout: SpecSheetLayout {
                sheet_name: sheet_name.to_string(),
                tables: Vec::new(),
                row_end_exclusive: 0,
                col_start_inclusive: 0,
                col_end_exclusive: 0,
            },
            set_header_emitted: BTreeSet::new(),
            if_touched_col: false,
        }
    }

    fn touch_table(&mut self, idx_table: usize) {
        if !self.layout.tables.contains(&idx_table) {
            self.layout.tables.push(idx_table);
        }
    }

    fn touch_col(&mut self, col: usize) {
        if self.if_touched_col {
            self.layout.col_start_inclusive = usize::min(self.layout.col_start_inclusive, col);
            self.layout.col_end_exclusive = usize::max(self.layout.col_end_exclusive, col + 1);
        } else {
            self.layout.col_start_inclusive = col;
            self.layout.col_end_exclusive = col + 1;
            self.if_touched_col = true;
        }
    }
}

fn emit_sheet<S: SpreadsheetSink + ?Sized>(
    sink: &mut S,
    plan: &LayoutPlan<'_>,
    sheet_plan: &SpecSheetPlan,
) -> Result<SpecSheetLayout, ExportError> {
    let idx_table = sheet_plan.idx_table_root;
    let table = &plan.dataset.tables[idx_table];
    let cfg = &plan.l_settings[idx_table];
    let col_start = cfg.col_offset;

    let mut state = SheetState::new(&sheet_plan.sheet_name);
    state.touch_table(idx_table);

    let n_row_end = if table.rows().is_empty() {
        tracing::debug!("Table {:?} has no rows", table.name);
        sink.set_cell_value(0, col_start, &EnumCellValue::from(C_NO_DATA_TEXT))?;
        state.touch_col(col_start);
        1
    } else {
        let n_row = emit_header(sink, plan, &mut state, idx_table, 0, col_start, 0)?;
        let l_rows: Vec<usize> = (0..table.rows().len()).collect();
        emit_table_rows(sink, plan, &mut state, idx_table, &l_rows, 0, col_start, n_row)?
    };
    state.layout.row_end_exclusive = n_row_end;

    if n_row_end > 0 && state.if_touched_col {
        sink.autofit_columns(
            state.layout.col_start_inclusive,
            state.layout.col_end_exclusive - 1,
        )?;
        sink.autofit_rows(0, n_row_end - 1)?;
    }

    Ok(state.layout)
}

/// Emit the header row of a table if enabled, returning the advanced cursor.
fn emit_header<S: SpreadsheetSink + ?Sized>(
    sink: &mut S,
    plan: &LayoutPlan<'_>,
    state: &mut SheetState,
    idx_table: usize,
    level: u8,
    col_start: usize,
    n_row: usize,
) -> Result<usize, ExportError> {
    let cfg = &plan.l_settings[idx_table];
    let plan_columns = &plan.l_columns[idx_table];
    if !(plan.options.if_show_headers && cfg.if_show_header) || plan_columns.columns.is_empty() {
        return Ok(n_row);
    }

    let fmt_header = &plan.l_formats[idx_table].fmt_header;
    for (n_pos, col) in plan_columns.columns.iter().enumerate() {
        let n_col = col_start + n_pos;
        sink.set_cell_value(n_row, n_col, &EnumCellValue::from(col.header_text.as_str()))?;
        sink.set_cell_style(n_row, n_col, fmt_header)?;
        state.touch_col(n_col);
    }
    if level > 0 {
        sink.add_grouped_row(n_row, level)?;
    }
    if let Some(height) = cfg.header_row_height {
        sink.set_row_height(n_row, height)?;
    }
    state.set_header_emitted.insert(idx_table);

    Ok(n_row + 1)
}

/// Emit `rows` of a table and, depth-first, their matching child rows.
///
/// Returns the cursor after the last emitted row.
#[allow(clippy::too_many_arguments)]
fn emit_table_rows<S: SpreadsheetSink + ?Sized>(
    sink: &mut S,
    plan: &LayoutPlan<'_>,
    state: &mut SheetState,
    idx_table: usize,
    rows: &[usize],
    level: u8,
    col_start: usize,
    mut n_row: usize,
) -> Result<usize, ExportError> {
    let cfg = &plan.l_settings[idx_table];
    let formats = &plan.l_formats[idx_table];
    let table = &plan.dataset.tables[idx_table];

    for (n_pos, &idx_row) in rows.iter().enumerate() {
        let fmt_row = if cfg.if_alternate_rows && n_pos % 2 == 1 {
            &formats.fmt_even
        } else {
            &formats.fmt_odd
        };
        emit_row_cells(sink, plan, state, idx_table, idx_row, fmt_row, col_start, n_row)?;
        if level > 0 {
            sink.add_grouped_row(n_row, level)?;
        }
        n_row += 1;

        let Some(link) = &plan.l_children[idx_table] else {
            continue;
        };
        let l_rows_child = table.rows()[idx_row]
            .get(link.idx_col_key_local)
            .and_then(derive_key_token)
            .and_then(|c_token| link.dict_rows_by_key.get(&c_token));
        let Some(l_rows_child) = l_rows_child.filter(|l_rows| !l_rows.is_empty()) else {
            continue;
        };

        let idx_table_child = link.idx_table_child;
        let level_child = level + 1;
        let col_offset_child = plan.l_settings[idx_table_child].col_offset;
        let col_start_child = match plan.options.rule_col_offset {
            EnumColumnOffsetRule::Absolute => col_offset_child,
            EnumColumnOffsetRule::Cumulative => col_start + col_offset_child,
        };
        state.touch_table(idx_table_child);

        let n_row_subtree_start = n_row;
        let if_header_due = match plan.options.rule_child_header {
            EnumChildHeaderRule::OncePerTable => !state.set_header_emitted.contains(&idx_table_child),
            EnumChildHeaderRule::PerGroup => true,
        };
        if if_header_due {
            n_row = emit_header(
                sink,
                plan,
                state,
                idx_table_child,
                level_child,
                col_start_child,
                n_row,
            )?;
        }
        n_row = emit_table_rows(
            sink,
            plan,
            state,
            idx_table_child,
            l_rows_child,
            level_child,
            col_start_child,
            n_row,
        )?;
        sink.collapse_rows(n_row_subtree_start, n_row - 1)?;
    }

    Ok(n_row)
}

#[allow(clippy::too_many_arguments)]
fn emit_row_cells<S: SpreadsheetSink + ?Sized>(
    sink: &mut S,
    plan: &LayoutPlan<'_>,
    state: &mut SheetState,
    idx_table: usize,
    idx_row: usize,
    fmt_row: &SpecCellFormat,
    col_start: usize,
    n_row: usize,
) -> Result<(), ExportError> {
    let plan_columns = &plan.l_columns[idx_table];
    let row = &plan.dataset.tables[idx_table].rows()[idx_row];

    for (n_pos, col) in plan_columns.columns.iter().enumerate() {
        let n_col = col_start + n_pos;
        let value = row.get(col.idx_col_native).unwrap_or(&EnumCellValue::None);

        match &col.fmt_patch {
            Some(fmt_patch) => {
                sink.set_cell_value(n_row, n_col, value)?;
                sink.set_cell_style(n_row, n_col, &fmt_row.merge(fmt_patch))?;
            }
            None => {
                sink.set_cell_value(n_row, n_col, &convert_value_to_text_cell(value))?;
                sink.set_cell_style(n_row, n_col, fmt_row)?;
            }
        }
        state.touch_col(n_col);
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
