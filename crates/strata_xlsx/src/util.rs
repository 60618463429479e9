//! Stateless helper utilities used by the layout engine and the XLSX sink.

use std::collections::{BTreeMap, BTreeSet};

use crate::conf::{C_SHEET_NAME_FALLBACK_PREFIX, N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL};
use crate::spec::{
    EnumCellValue, ExportError, SpecCellFormat, SpecColumnOverride, SpecTable, SpecTableSettings,
};

////////////////////////////////////////////////////////////////////////////////
// #region SheetNaming

/// Reject a caller-supplied sheet name Excel would not accept.
pub fn validate_sheet_name(name: &str) -> Result<(), ExportError> {
    if let Some(chr) = name.chars().find(|chr| TUP_EXCEL_ILLEGAL.contains(chr)) {
        return Err(ExportError::BadSheetName {
            name: name.to_string(),
            reason: format!("contains forbidden character {chr:?}"),
        });
    }
    if name.chars().count() > N_LEN_EXCEL_SHEET_NAME_MAX {
        return Err(ExportError::BadSheetName {
            name: name.to_string(),
            reason: format!("longer than {N_LEN_EXCEL_SHEET_NAME_MAX} characters"),
        });
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(ExportError::BadSheetName {
            name: name.to_string(),
            reason: "must not start or end with an apostrophe".to_string(),
        });
    }
    Ok(())
}

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for chr_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(chr_illegal, replace_to);
    }
    c_name = c_name.trim().trim_matches('\'').to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Where a resolved sheet name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumSheetNameSource {
    /// Sheet-name override or `SpecTableSettings::sheet_name`.
    Caller,
    /// Sanitized table name or the `output{idx}` fallback.
    Derived,
}

/// Resolve a working sheet name by priority:
/// caller override -> table settings -> table name -> `output{idx}`.
///
/// Caller-supplied names are validated and used as given; a caller name that
/// collides with another one is rejected by the layout planner. Derived names
/// are sanitized and yield to caller names, taking a `__N` suffix on collision.
pub fn resolve_sheet_name(
    sheet_names: Option<&[String]>,
    idx_sheet: usize,
    table_settings: &SpecTableSettings,
    table: &SpecTable,
) -> Result<(String, EnumSheetNameSource), ExportError> {
    let c_name_caller = sheet_names
        .and_then(|l_names| l_names.get(idx_sheet))
        .filter(|c_name| !c_name.is_empty())
        .or_else(|| {
            table_settings
                .sheet_name
                .as_ref()
                .filter(|c_name| !c_name.is_empty())
        });
    if let Some(c_name) = c_name_caller {
        validate_sheet_name(c_name)?;
        return Ok((c_name.clone(), EnumSheetNameSource::Caller));
    }

    let c_name = if table.name.trim().is_empty() {
        format!("{C_SHEET_NAME_FALLBACK_PREFIX}{idx_sheet}")
    } else {
        sanitize_sheet_name(&table.name, "_")
    };
    Ok((c_name, EnumSheetNameSource::Derived))
}

/// Return `name`, or a `name__N` variant when already taken (case-insensitive).
pub fn derive_unique_sheet_name(name: &str, set_names_existing: &mut BTreeSet<String>) -> String {
    if set_names_existing.insert(name.to_lowercase()) {
        return name.to_string();
    }

    let base_name: String = name
        .chars()
        .take(usize::max(1, N_LEN_EXCEL_SHEET_NAME_MAX - 4))
        .collect();

    let mut n_idx = 2usize;
    loop {
        let candidate: String = format!("{base_name}__{n_idx}")
            .chars()
            .take(N_LEN_EXCEL_SHEET_NAME_MAX)
            .collect();
        if set_names_existing.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n_idx += 1;
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnResolution

/// One column as it lands on the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecResolvedColumn {
    /// Native column position in the table.
    pub idx_col_native: usize,
    /// Header text.
    pub header_text: String,
    /// Override format patch; `None` when the table has no overrides.
    pub fmt_patch: Option<SpecCellFormat>,
}

/// Effective column layout of one table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecColumnPlan {
    /// Columns in sheet order.
    pub columns: Vec<SpecResolvedColumn>,
    /// Overrides are present (allow-list mode, typed values).
    pub if_override_mode: bool,
    /// Ignored override diagnostics.
    pub warnings: Vec<String>,
}

/// Sort overrides by `display_order`, `None` last, stable for ties.
pub fn sort_column_overrides(overrides: &[SpecColumnOverride]) -> Vec<&SpecColumnOverride> {
    let mut l_overrides: Vec<&SpecColumnOverride> = overrides.iter().collect();
    l_overrides.sort_by_key(|col_override| match col_override.display_order {
        Some(n_order) => (0u8, n_order),
        None => (1u8, 0),
    });
    l_overrides
}

/// Resolve the effective column set of `table`.
///
/// Without overrides every native column is used in native order. With overrides
/// only visible overrides bound to an existing native column are used, in sorted
/// order; the first override bound to a given column wins.
pub fn resolve_effective_columns(
    table: &SpecTable,
    overrides: &[SpecColumnOverride],
) -> SpecColumnPlan {
    if overrides.is_empty() {
        return SpecColumnPlan {
            columns: table
                .columns()
                .iter()
                .enumerate()
                .map(|(n_idx, col)| SpecResolvedColumn {
                    idx_col_native: n_idx,
                    header_text: col.name.clone(),
                    fmt_patch: None,
                })
                .collect(),
            if_override_mode: false,
            warnings: vec![],
        };
    }

    let mut plan = SpecColumnPlan {
        columns: vec![],
        if_override_mode: true,
        warnings: vec![],
    };
    let mut set_idx_bound = BTreeSet::new();

    for col_override in sort_column_overrides(overrides) {
        let Some(n_idx_col) = table.column_index(&col_override.col_bound) else {
            plan.warnings.push(format!(
                "Table {:?}: override bound to unknown column {:?} ignored.",
                table.name, col_override.col_bound
            ));
            continue;
        };
        if !set_idx_bound.insert(n_idx_col) {
            plan.warnings.push(format!(
                "Table {:?}: duplicate override for column {:?} ignored.",
                table.name, col_override.col_bound
            ));
            continue;
        }
        if !col_override.if_visible {
            continue;
        }

        plan.columns.push(SpecResolvedColumn {
            idx_col_native: n_idx_col,
            header_text: col_override.display_name.clone(),
            fmt_patch: Some(col_override.derive_format_patch()),
        });
    }

    plan
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RelationKeys

/// Normalized comparison token of a key value.
///
/// Blank keys never match. Integers and integral floats share one token so that
/// `34` and `34.0` join.
pub fn derive_key_token(value: &EnumCellValue) -> Option<String> {
    match value {
        EnumCellValue::None => None,
        EnumCellValue::Integer(n) => Some(format!("n:{n}")),
        EnumCellValue::Float(n) => {
            if n.is_nan() {
                None
            } else if n.fract() == 0.0 && n.abs() < 9.0e15 {
                Some(format!("n:{}", *n as i64))
            } else {
                Some(format!("f:{n}"))
            }
        }
        EnumCellValue::Boolean(b) => Some(format!("b:{b}")),
        EnumCellValue::String(s) => Some(format!("s:{s}")),
        EnumCellValue::Timestamp(dt) => Some(format!("t:{dt}")),
    }
}

/// Group row positions of `table` by the key token of column `idx_col_key`.
///
/// Positions keep storage order within each group.
pub fn derive_rows_by_key(table: &SpecTable, idx_col_key: usize) -> BTreeMap<String, Vec<usize>> {
    let mut dict_rows_by_key: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (n_idx_row, row) in table.rows().iter().enumerate() {
        let Some(c_token) = row.get(idx_col_key).and_then(derive_key_token) else {
            continue;
        };
        dict_rows_by_key.entry(c_token).or_default().push(n_idx_row);
    }
    dict_rows_by_key
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Plain text rendering of a value with no type-specific formatting.
pub fn convert_value_to_text(value: &EnumCellValue) -> String {
    match value {
        EnumCellValue::None => String::new(),
        EnumCellValue::Integer(n) => n.to_string(),
        EnumCellValue::Float(n) => n.to_string(),
        EnumCellValue::Boolean(b) => if *b { "True" } else { "False" }.to_string(),
        EnumCellValue::String(s) => s.clone(),
        EnumCellValue::Timestamp(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

/// Stringified cell value; blanks stay blank.
pub fn convert_value_to_text_cell(value: &EnumCellValue) -> EnumCellValue {
    if value.is_none() {
        return EnumCellValue::None;
    }
    EnumCellValue::String(convert_value_to_text(value))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WidthEstimation

/// Estimate displayed width units for one cell value.
pub fn estimate_width_len(value: &EnumCellValue) -> usize {
    match value {
        EnumCellValue::None => 0,
        EnumCellValue::String(s) => s
            .lines()
            .map(estimate_unicode_string_width)
            .max()
            .unwrap_or(0),
        EnumCellValue::Float(n) => format!("{n:.4}").len(),
        EnumCellValue::Timestamp(_) => 19,
        other => convert_value_to_text(other).len(),
    }
}

/// Width of a string where non-ASCII glyphs count as 1.6 units.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

/// Line count of a value as displayed (strings may wrap on `\n`).
pub fn estimate_line_count(value: &EnumCellValue) -> usize {
    match value {
        EnumCellValue::String(s) => usize::max(1, s.lines().count()),
        _ => 1,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RangeUtils

/// Convert sorted indices to contiguous inclusive ranges.
pub fn derive_contiguous_ranges(sorted_indices: &[usize]) -> Vec<(usize, usize)> {
    if sorted_indices.is_empty() {
        return vec![];
    }

    let mut l_contiguous_ranges = Vec::new();
    let mut n_idx_start = sorted_indices[0];
    let mut n_idx_end = sorted_indices[0];

    for idx in &sorted_indices[1..] {
        if *idx == n_idx_end + 1 {
            n_idx_end = *idx;
        } else {
            l_contiguous_ranges.push((n_idx_start, n_idx_end));
            n_idx_start = *idx;
            n_idx_end = *idx;
        }
    }

    l_contiguous_ranges.push((n_idx_start, n_idx_end));
    l_contiguous_ranges
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{EnumNumberFormat, EnumValueKind, SpecColumn};

    fn create_managers_table() -> SpecTable {
        SpecTable::new(
            "Managers",
            vec![
                SpecColumn::new("DID", EnumValueKind::Integer),
                SpecColumn::new("MID", EnumValueKind::Integer),
                SpecColumn::new("Name", EnumValueKind::String),
            ],
        )
    }

    #[test]
    fn test_validate_sheet_name_rejects_forbidden_chars() {
        for c_name in ["Bad/Name", "a<b", "q?", "x[1]", "c:d", "back\\slash", "p|q"] {
            assert!(
                matches!(
                    validate_sheet_name(c_name),
                    Err(ExportError::BadSheetName { .. })
                ),
                "{c_name} should be rejected"
            );
        }
        assert!(validate_sheet_name(&"x".repeat(32)).is_err());
        assert!(validate_sheet_name("'quoted").is_err());
        assert!(validate_sheet_name("Directors 2024").is_ok());
    }

    #[test]
    fn test_resolve_sheet_name_priority_chain() {
        let table = create_managers_table();
        let mut cfg = SpecTableSettings::default();
        let l_names = vec!["Override".to_string(), String::new()];

        assert_eq!(
            resolve_sheet_name(Some(&l_names), 0, &cfg, &table).unwrap(),
            ("Override".to_string(), EnumSheetNameSource::Caller)
        );
        assert_eq!(
            resolve_sheet_name(Some(&l_names), 1, &cfg, &table).unwrap(),
            ("Managers".to_string(), EnumSheetNameSource::Derived)
        );

        cfg.sheet_name = Some("FromSettings".to_string());
        assert_eq!(
            resolve_sheet_name(Some(&l_names), 5, &cfg, &table).unwrap(),
            ("FromSettings".to_string(), EnumSheetNameSource::Caller)
        );

        cfg.sheet_name = Some(String::new());
        let table_unnamed = SpecTable::new("", vec![]);
        assert_eq!(
            resolve_sheet_name(None, 3, &cfg, &table_unnamed).unwrap(),
            ("output3".to_string(), EnumSheetNameSource::Derived)
        );

        let l_bad = vec!["Bad/Name".to_string()];
        assert!(matches!(
            resolve_sheet_name(Some(&l_bad), 0, &cfg, &table),
            Err(ExportError::BadSheetName { .. })
        ));
    }

    #[test]
    fn test_table_names_are_sanitized_not_rejected() {
        let table = SpecTable::new("Sales/2024: [Q1]", vec![]);
        let (c_name, source) =
            resolve_sheet_name(None, 0, &SpecTableSettings::default(), &table).unwrap();
        assert_eq!(c_name, "Sales_2024_ _Q1_");
        assert_eq!(source, EnumSheetNameSource::Derived);
    }

    #[test]
    fn test_derive_unique_sheet_name_is_case_insensitive() {
        let mut set_names = BTreeSet::new();
        assert_eq!(derive_unique_sheet_name("Data", &mut set_names), "Data");
        assert_eq!(derive_unique_sheet_name("data", &mut set_names), "data__2");
        assert_eq!(derive_unique_sheet_name("Data", &mut set_names), "Data__3");
    }

    #[test]
    fn test_resolve_effective_columns_native_mode() {
        let plan = resolve_effective_columns(&create_managers_table(), &[]);
        assert!(!plan.if_override_mode);
        let l_headers: Vec<_> = plan.columns.iter().map(|c| c.header_text.as_str()).collect();
        assert_eq!(l_headers, vec!["DID", "MID", "Name"]);
        assert!(plan.columns.iter().all(|c| c.fmt_patch.is_none()));
    }

    #[test]
    fn test_resolve_effective_columns_allow_list_mode() {
        let l_overrides = vec![
            SpecColumnOverride {
                display_order: None,
                ..SpecColumnOverride::new("DID", "Director")
            },
            SpecColumnOverride {
                display_order: Some(2),
                number_format: EnumNumberFormat::Decimal0,
                ..SpecColumnOverride::new("MID", "Manager Id")
            },
            SpecColumnOverride {
                display_order: Some(1),
                ..SpecColumnOverride::new("Name", "Manager")
            },
            SpecColumnOverride {
                display_order: Some(0),
                ..SpecColumnOverride::new("Missing", "Ghost")
            },
            SpecColumnOverride {
                display_order: Some(3),
                ..SpecColumnOverride::new("Name", "Shadowed")
            },
        ];

        let plan = resolve_effective_columns(&create_managers_table(), &l_overrides);
        assert!(plan.if_override_mode);
        let l_headers: Vec<_> = plan.columns.iter().map(|c| c.header_text.as_str()).collect();
        assert_eq!(l_headers, vec!["Manager", "Manager Id", "Director"]);
        assert_eq!(
            plan.columns[1].fmt_patch.as_ref().unwrap().num_format.as_deref(),
            Some("0")
        );
        assert_eq!(plan.warnings.len(), 2);

        assert_eq!(
            resolve_effective_columns(&create_managers_table(), &l_overrides),
            plan
        );
    }

    #[test]
    fn test_hidden_override_drops_column_and_still_claims_binding() {
        let l_overrides = vec![
            SpecColumnOverride {
                if_visible: false,
                display_order: Some(0),
                ..SpecColumnOverride::new("Name", "Hidden")
            },
            SpecColumnOverride {
                display_order: Some(1),
                ..SpecColumnOverride::new("Name", "Visible")
            },
        ];
        let plan = resolve_effective_columns(&create_managers_table(), &l_overrides);
        assert!(plan.columns.is_empty());
        assert!(plan.if_override_mode);
    }

    #[test]
    fn test_derive_key_token_joins_integral_floats() {
        assert_eq!(
            derive_key_token(&EnumCellValue::Integer(34)),
            derive_key_token(&EnumCellValue::Float(34.0))
        );
        assert_ne!(
            derive_key_token(&EnumCellValue::Integer(34)),
            derive_key_token(&EnumCellValue::from("34"))
        );
        assert_eq!(derive_key_token(&EnumCellValue::None), None);
        assert_eq!(derive_key_token(&EnumCellValue::Float(f64::NAN)), None);
    }

    #[test]
    fn test_derive_rows_by_key_keeps_storage_order() {
        let mut table = create_managers_table();
        table.push_row(vec![34.into(), 1.into(), "A".into()]).unwrap();
        table.push_row(vec![15.into(), 2.into(), "B".into()]).unwrap();
        table.push_row(vec![34.into(), 3.into(), "C".into()]).unwrap();
        table
            .push_row(vec![EnumCellValue::None, 4.into(), "D".into()])
            .unwrap();

        let dict_rows = derive_rows_by_key(&table, 0);
        assert_eq!(dict_rows["n:34"], vec![0, 2]);
        assert_eq!(dict_rows["n:15"], vec![1]);
        assert_eq!(dict_rows.len(), 2);
    }

    #[test]
    fn test_convert_value_to_text_cell() {
        assert_eq!(
            convert_value_to_text_cell(&EnumCellValue::Integer(15)),
            EnumCellValue::from("15")
        );
        assert_eq!(
            convert_value_to_text_cell(&EnumCellValue::Boolean(true)),
            EnumCellValue::from("True")
        );
        assert_eq!(
            convert_value_to_text_cell(&EnumCellValue::None),
            EnumCellValue::None
        );
    }

    #[test]
    fn test_derive_contiguous_ranges() {
        assert_eq!(
            derive_contiguous_ranges(&[1, 2, 3, 5, 7, 8]),
            vec![(1, 3), (5, 5), (7, 8)]
        );
        assert!(derive_contiguous_ranges(&[]).is_empty());
    }
}
