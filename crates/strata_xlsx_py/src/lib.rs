use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{StructArray, TryExtend};
use arrow::datatypes::{ArrowDataType, ArrowSchema, Field as ArrowField};
use arrow::record_batch::RecordBatchT;
use polars::prelude::DataFrame;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::ffi as pyffi;
use pyo3::prelude::*;
use pyo3::types::{PyAny, PyDict, PyTuple};
use strata_xlsx::conf::derive_default_styles;
use strata_xlsx::frame::derive_table_from_dataframe;
use strata_xlsx::sink::SpreadsheetSink;
use strata_xlsx::spec::{
    EnumChildHeaderRule, EnumColumnOffsetRule, EnumHorizontalAlign, EnumNumberFormat,
    ExportError, SpecAutofitCellsPolicy, SpecCellFormat, SpecColumnOverride, SpecDataset,
    SpecExportOptions, SpecExportReport, SpecExportSettings, SpecTable, SpecTableSettings,
};
use strata_xlsx::{XlsxSink, export_dataset};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "strata.xlsx.export.v1";
const C_BRIDGE_TRANSPORT: &str = "arrow_c_data";
const C_ARROW_ARRAY_STREAM_CAPSULE_NAME: &[u8] = b"arrow_array_stream\0";

/// Export related tables into one workbook at `file_out`.
///
/// Returns `(sheets, warnings)` where each sheet is
/// `(sheet_name, table_indices, row_end_exclusive, col_start_inclusive, col_end_exclusive)`.
#[pyfunction]
#[pyo3(signature = (
    file_out,
    tables,
    sheet_names = None,
    settings = None,
    if_show_headers = true,
    styles = None,
    rule_col_offset = "absolute",
    rule_child_header = "once",
    policy_autofit = None
))]
#[allow(clippy::too_many_arguments)]
fn export_workbook<'py>(
    py: Python<'py>,
    file_out: PathBuf,
    tables: &Bound<'py, PyAny>,
    sheet_names: Option<Vec<String>>,
    settings: Option<&Bound<'py, PyAny>>,
    if_show_headers: bool,
    styles: Option<&Bound<'py, PyDict>>,
    rule_col_offset: &str,
    rule_child_header: &str,
    policy_autofit: Option<&Bound<'py, PyAny>>,
) -> PyResult<Bound<'py, PyTuple>> {
    let mut l_tables = Vec::new();
    for obj_table in tables.try_iter()? {
        l_tables.push(parse_spec_table(py, &obj_table?)?);
    }
    let dataset = SpecDataset::new(l_tables);

    let cfg_settings = parse_spec_export_settings(settings)?;
    let options = SpecExportOptions {
        styles: parse_styles(styles)?,
        if_show_headers,
        rule_col_offset: parse_rule_col_offset(rule_col_offset)?,
        rule_child_header: parse_rule_child_header(rule_child_header)?,
    };
    let policy = parse_spec_autofit_cells_policy(policy_autofit)?.unwrap_or_default();

    let report = py
        .allow_threads(|| -> Result<SpecExportReport, ExportError> {
            let mut sink = XlsxSink::with_autofit_policy(policy);
            let report = export_dataset(
                &mut sink,
                &dataset,
                sheet_names.as_deref(),
                cfg_settings.as_ref(),
                &options,
            )?;
            sink.persist_to_path(&file_out)?;
            Ok(report)
        })
        .map_err(convert_export_error)?;

    create_report_tuple(py, &report)
}

fn create_report_tuple<'py>(
    py: Python<'py>,
    report: &SpecExportReport,
) -> PyResult<Bound<'py, PyTuple>> {
    let mut l_sheet_obj = Vec::with_capacity(report.sheets.len());
    for sheet in &report.sheets {
        let tup_sheet = (
            sheet.sheet_name.clone(),
            sheet.tables.clone(),
            sheet.row_end_exclusive,
            sheet.col_start_inclusive,
            sheet.col_end_exclusive,
        )
            .into_pyobject(py)?;
        l_sheet_obj.push(tup_sheet);
    }

    let tup_sheets = PyTuple::new(py, l_sheet_obj)?;
    (tup_sheets, report.warnings.clone()).into_pyobject(py)
}

fn convert_export_error(err: ExportError) -> PyErr {
    match err {
        ExportError::Sink(_) => PyRuntimeError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region DatasetImport

/// Read a table object exposing `name`, `df` and optional `relation`.
///
/// `relation` is either a `(col_key_local, table_child, col_key_child)` tuple or
/// an object with those attributes.
fn parse_spec_table(py: Python<'_>, obj: &Bound<'_, PyAny>) -> PyResult<SpecTable> {
    let name = extract_optional_attr::<String>(obj, "name")?.unwrap_or_default();
    let obj_df = extract_optional_attr_bound(obj, "df")?
        .ok_or_else(|| PyValueError::new_err(format!("Table {name:?} has no `df`.")))?;

    let df = derive_dataframe_from_any_dataframe(py, &obj_df)?;
    let mut table = derive_table_from_dataframe(&name, &df).map_err(convert_export_error)?;

    if let Some(obj_relation) = extract_optional_attr_bound(obj, "relation")? {
        let (col_key_local, table_child, col_key_child) =
            match obj_relation.extract::<(String, String, String)>() {
                Ok(tup_relation) => tup_relation,
                Err(_) => (
                    extract_required_attr::<String>(&obj_relation, "col_key_local")?,
                    extract_required_attr::<String>(&obj_relation, "table_child")?,
                    extract_required_attr::<String>(&obj_relation, "col_key_child")?,
                ),
            };
        table = table.with_relation(col_key_local, table_child, col_key_child);
    }

    Ok(table)
}

fn derive_dataframe_from_any_dataframe(
    py: Python<'_>,
    df: &Bound<'_, PyAny>,
) -> PyResult<DataFrame> {
    let df_polars = convert_to_polars_dataframe(py, df)?;
    let obj_capsule = df_polars.call_method0("__arrow_c_stream__")?;
    derive_dataframe_from_arrow_c_stream_capsule(&obj_capsule)
}

fn derive_dataframe_from_arrow_c_stream_capsule(
    obj_capsule: &Bound<'_, PyAny>,
) -> PyResult<DataFrame> {
    let ptr_capsule = obj_capsule.as_ptr();
    let ptr_stream_name = C_ARROW_ARRAY_STREAM_CAPSULE_NAME
        .as_ptr()
        .cast::<std::os::raw::c_char>();

    // Safety: both pointers are owned by live objects for the duration of the call.
    if unsafe { pyffi::PyCapsule_IsValid(ptr_capsule, ptr_stream_name) } == 0 {
        return Err(PyValueError::new_err(
            "Expected a valid `arrow_array_stream` PyCapsule.",
        ));
    }

    // Safety: capsule name was validated above.
    let ptr_stream = unsafe { pyffi::PyCapsule_GetPointer(ptr_capsule, ptr_stream_name) };
    if ptr_stream.is_null() {
        return Err(PyValueError::new_err(
            "Arrow C stream capsule pointer is null.",
        ));
    }

    let stream = ptr_stream.cast::<arrow::ffi::ArrowArrayStream>();
    // Safety: `stream` points to a live ArrowArrayStream owned by the capsule.
    let mut reader = unsafe { arrow::ffi::ArrowArrayStreamReader::try_new(&mut *stream) }
        .map_err(|err| PyValueError::new_err(format!("Failed to open Arrow C stream: {err}")))?;

    let schema_arrow = derive_arrow_schema_from_stream_field(reader.field())?;
    let schema_ref = Arc::new(schema_arrow.clone());
    let mut df = DataFrame::empty_with_arrow_schema(&schema_arrow);

    while let Some(res_batch) = unsafe { reader.next() } {
        let array_batch = res_batch
            .map_err(|err| PyValueError::new_err(format!("Failed to read Arrow batch: {err}")))?;
        let array_struct = array_batch
            .as_any()
            .downcast_ref::<StructArray>()
            .ok_or_else(|| PyValueError::new_err("Arrow C stream must yield StructArray batches."))?;

        let record_batch = RecordBatchT::try_new(
            array_struct.len(),
            schema_ref.clone(),
            array_struct.values().to_vec(),
        )
        .map_err(|err| PyValueError::new_err(format!("Invalid Arrow record batch: {err}")))?;

        df.try_extend(std::iter::once(record_batch))
            .map_err(|err| PyValueError::new_err(format!("Failed to append Arrow batch: {err}")))?;
    }

    Ok(df)
}

fn derive_arrow_schema_from_stream_field(field: &ArrowField) -> PyResult<ArrowSchema> {
    match field.dtype() {
        ArrowDataType::Struct(fields) => Ok(fields
            .iter()
            .cloned()
            .map(|field_inner| (field_inner.name.clone(), field_inner))
            .collect::<ArrowSchema>()),
        dtype => Err(PyValueError::new_err(format!(
            "Arrow stream schema must be Struct, got: {dtype:?}"
        ))),
    }
}

fn convert_to_polars_dataframe<'py>(
    py: Python<'py>,
    df: &Bound<'py, PyAny>,
) -> PyResult<Bound<'py, PyAny>> {
    let cls_dataframe = py.import("polars")?.getattr("DataFrame")?;
    if df.is_instance(&cls_dataframe)? {
        return Ok(df.clone());
    }
    cls_dataframe.call1((df,))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SettingsImport

/// Accept a JSON settings document or an object exposing `name` and `per_table`.
fn parse_spec_export_settings(
    obj: Option<&Bound<'_, PyAny>>,
) -> PyResult<Option<SpecExportSettings>> {
    let Some(obj) = obj.filter(|obj| !obj.is_none()) else {
        return Ok(None);
    };

    if let Ok(c_json) = obj.extract::<String>() {
        return SpecExportSettings::from_json_str(&c_json)
            .map(Some)
            .map_err(convert_export_error);
    }

    let mut settings = SpecExportSettings {
        name: extract_optional_attr::<String>(obj, "name")?.unwrap_or_default(),
        per_table: Vec::new(),
    };
    if let Some(obj_per_table) = extract_optional_attr_bound(obj, "per_table")? {
        for obj_cfg in obj_per_table.try_iter()? {
            settings.per_table.push(parse_spec_table_settings(&obj_cfg?)?);
        }
    }
    Ok(Some(settings))
}

fn parse_spec_table_settings(obj: &Bound<'_, PyAny>) -> PyResult<SpecTableSettings> {
    let mut cfg = SpecTableSettings::default();

    cfg.sheet_name = extract_optional_attr::<String>(obj, "sheet_name")?;
    cfg.header_row_height = extract_optional_attr::<f64>(obj, "header_row_height")?;
    if let Some(v) = extract_optional_attr::<bool>(obj, "if_show_header")? {
        cfg.if_show_header = v;
    }
    if let Some(v) = extract_optional_attr::<usize>(obj, "col_offset")? {
        cfg.col_offset = v;
    }
    if let Some(v) = extract_optional_attr::<String>(obj, "style_header")? {
        cfg.style_header = v;
    }
    if let Some(v) = extract_optional_attr::<bool>(obj, "if_alternate_rows")? {
        cfg.if_alternate_rows = v;
    }
    if let Some(v) = extract_optional_attr::<String>(obj, "style_odd")? {
        cfg.style_odd = v;
    }
    if let Some(v) = extract_optional_attr::<String>(obj, "style_even")? {
        cfg.style_even = v;
    }
    if let Some(obj_overrides) = extract_optional_attr_bound(obj, "column_overrides")? {
        for obj_override in obj_overrides.try_iter()? {
            cfg.column_overrides
                .push(parse_spec_column_override(&obj_override?)?);
        }
    }

    Ok(cfg)
}

fn parse_spec_column_override(obj: &Bound<'_, PyAny>) -> PyResult<SpecColumnOverride> {
    let mut col_override = SpecColumnOverride::new(
        extract_required_attr::<String>(obj, "col_bound")?,
        extract_optional_attr::<String>(obj, "display_name")?.unwrap_or_default(),
    );

    if let Some(v) = extract_optional_attr::<String>(obj, "number_format")? {
        col_override.number_format = EnumNumberFormat::from_identifier(&v)
            .ok_or_else(|| PyValueError::new_err(format!("Unknown number format: {v:?}")))?;
    }
    if let Some(v) = extract_optional_attr::<String>(obj, "align")? {
        col_override.align = parse_horizontal_align(&v)?;
    }
    if let Some(v) = extract_optional_attr::<bool>(obj, "if_visible")? {
        col_override.if_visible = v;
    }
    col_override.display_order = extract_optional_attr::<i64>(obj, "display_order")?;

    Ok(col_override)
}

fn parse_horizontal_align(value: &str) -> PyResult<EnumHorizontalAlign> {
    match value {
        "general" => Ok(EnumHorizontalAlign::General),
        "left" => Ok(EnumHorizontalAlign::Left),
        "center" => Ok(EnumHorizontalAlign::Center),
        "right" => Ok(EnumHorizontalAlign::Right),
        "fill" => Ok(EnumHorizontalAlign::Fill),
        "justify" => Ok(EnumHorizontalAlign::Justify),
        "center_across" => Ok(EnumHorizontalAlign::CenterAcross),
        "distributed" => Ok(EnumHorizontalAlign::Distributed),
        _ => Err(PyValueError::new_err(format!(
            "Unknown horizontal alignment: {value:?}"
        ))),
    }
}

fn parse_rule_col_offset(value: &str) -> PyResult<EnumColumnOffsetRule> {
    match value {
        "absolute" => Ok(EnumColumnOffsetRule::Absolute),
        "cumulative" => Ok(EnumColumnOffsetRule::Cumulative),
        _ => Err(PyValueError::new_err(
            "rule_col_offset must be one of: 'absolute', 'cumulative'.",
        )),
    }
}

fn parse_rule_child_header(value: &str) -> PyResult<EnumChildHeaderRule> {
    match value {
        "once" => Ok(EnumChildHeaderRule::OncePerTable),
        "per_group" => Ok(EnumChildHeaderRule::PerGroup),
        _ => Err(PyValueError::new_err(
            "rule_child_header must be one of: 'once', 'per_group'.",
        )),
    }
}

/// Overlay caller styles onto the default registry.
fn parse_styles(
    obj: Option<&Bound<'_, PyDict>>,
) -> PyResult<BTreeMap<String, SpecCellFormat>> {
    let mut dict_styles = derive_default_styles();
    let Some(obj) = obj else {
        return Ok(dict_styles);
    };

    for (obj_key, obj_fmt) in obj.iter() {
        let c_key = obj_key.extract::<String>()?;
        if let Some(fmt_spec) = parse_spec_cell_format(&obj_fmt)? {
            dict_styles.insert(c_key, fmt_spec);
        }
    }
    Ok(dict_styles)
}

fn parse_spec_cell_format(obj: &Bound<'_, PyAny>) -> PyResult<Option<SpecCellFormat>> {
    if obj.is_none() {
        return Ok(None);
    }

    Ok(Some(SpecCellFormat {
        font_name: extract_optional_attr::<String>(obj, "font_name")?,
        font_size: extract_optional_attr::<i64>(obj, "font_size")?,
        bold: extract_optional_attr::<bool>(obj, "bold")?,
        italic: extract_optional_attr::<bool>(obj, "italic")?,
        align: extract_optional_attr::<String>(obj, "align")?,
        valign: extract_optional_attr::<String>(obj, "valign")?,
        border: extract_optional_attr::<i64>(obj, "border")?,
        text_wrap: extract_optional_attr::<bool>(obj, "text_wrap")?,
        num_format: extract_optional_attr::<String>(obj, "num_format")?,
        bg_color: extract_optional_attr::<String>(obj, "bg_color")?,
        font_color: extract_optional_attr::<String>(obj, "font_color")?,
    }))
}

fn parse_spec_autofit_cells_policy(
    obj: Option<&Bound<'_, PyAny>>,
) -> PyResult<Option<SpecAutofitCellsPolicy>> {
    let Some(obj) = obj.filter(|obj| !obj.is_none()) else {
        return Ok(None);
    };

    let mut policy = SpecAutofitCellsPolicy::default();
    if obj.hasattr("height_body_inferred_max")? {
        policy.height_body_inferred_max =
            extract_optional_attr::<usize>(obj, "height_body_inferred_max")?;
    }
    if let Some(v) = extract_optional_attr::<usize>(obj, "width_cell_min")? {
        policy.width_cell_min = v;
    }
    if let Some(v) = extract_optional_attr::<usize>(obj, "width_cell_max")? {
        policy.width_cell_max = v;
    }
    if let Some(v) = extract_optional_attr::<usize>(obj, "width_cell_padding")? {
        policy.width_cell_padding = v;
    }

    Ok(Some(policy))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

fn extract_optional_attr<T>(obj: &Bound<'_, PyAny>, attr: &str) -> PyResult<Option<T>>
where
    for<'a> T: FromPyObject<'a>,
{
    match extract_optional_attr_bound(obj, attr)? {
        Some(val) => Ok(Some(val.extract::<T>()?)),
        None => Ok(None),
    }
}

fn extract_required_attr<T>(obj: &Bound<'_, PyAny>, attr: &str) -> PyResult<T>
where
    for<'a> T: FromPyObject<'a>,
{
    extract_optional_attr::<T>(obj, attr)?
        .ok_or_else(|| PyValueError::new_err(format!("Missing required attribute `{attr}`.")))
}

fn extract_optional_attr_bound<'py>(
    obj: &Bound<'py, PyAny>,
    attr: &str,
) -> PyResult<Option<Bound<'py, PyAny>>> {
    if !obj.hasattr(attr)? {
        return Ok(None);
    }
    let val = obj.getattr(attr)?;
    if val.is_none() {
        return Ok(None);
    }
    Ok(Some(val))
}

#[pymodule]
fn _strata_xlsx_rs(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_function(wrap_pyfunction!(export_workbook, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
