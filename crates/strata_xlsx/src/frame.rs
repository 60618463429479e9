//! Polars `DataFrame` ingestion into dataset tables.

use std::io::Cursor;

use polars::prelude::{AnyValue, DataFrame, DataType, IpcReader, SerReader};

use crate::spec::{EnumCellValue, EnumValueKind, ExportError, SpecColumn, SpecTable};

/// Map a Polars dtype to the closest value kind. Unknown dtypes land on `String`.
pub fn derive_value_kind(dtype: &DataType) -> EnumValueKind {
    if dtype.is_integer() {
        EnumValueKind::Integer
    } else if dtype.is_float() {
        EnumValueKind::Float
    } else if matches!(dtype, DataType::Boolean) {
        EnumValueKind::Boolean
    } else {
        EnumValueKind::String
    }
}

/// Convert one Polars value into a typed cell value.
///
/// Values the kind cannot represent yield [`ExportError::UnsupportedValueKind`].
pub fn convert_any_value(
    value: &AnyValue<'_>,
    kind: EnumValueKind,
) -> Result<EnumCellValue, ExportError> {
    let cell = match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::Boolean(val) => EnumCellValue::Boolean(*val),
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::UInt8(val) => EnumCellValue::Integer(i64::from(*val)),
        AnyValue::UInt16(val) => EnumCellValue::Integer(i64::from(*val)),
        AnyValue::UInt32(val) => EnumCellValue::Integer(i64::from(*val)),
        AnyValue::UInt64(val) => match i64::try_from(*val) {
            Ok(val) => EnumCellValue::Integer(val),
            Err(_) => EnumCellValue::Float(*val as f64),
        },
        AnyValue::Int8(val) => EnumCellValue::Integer(i64::from(*val)),
        AnyValue::Int16(val) => EnumCellValue::Integer(i64::from(*val)),
        AnyValue::Int32(val) => EnumCellValue::Integer(i64::from(*val)),
        AnyValue::Int64(val) => EnumCellValue::Integer(*val),
        AnyValue::Float32(val) => EnumCellValue::Float(f64::from(*val)),
        AnyValue::Float64(val) => EnumCellValue::Float(*val),
        other if kind == EnumValueKind::String => EnumCellValue::String(other.to_string()),
        other => {
            return Err(ExportError::UnsupportedValueKind {
                kind: other.dtype().to_string(),
            });
        }
    };
    Ok(cell)
}

/// Build a dataset table from a Polars `DataFrame`.
///
/// Cells of unsupported kinds fall back to their text rendering.
pub fn derive_table_from_dataframe(name: &str, df: &DataFrame) -> Result<SpecTable, ExportError> {
    let l_cols = df.get_columns();
    let l_kinds: Vec<EnumValueKind> = l_cols
        .iter()
        .map(|col| derive_value_kind(col.dtype()))
        .collect();

    let mut table = SpecTable::new(
        name,
        l_cols
            .iter()
            .zip(&l_kinds)
            .map(|(col, kind)| SpecColumn::new(col.name().to_string(), *kind))
            .collect(),
    );

    let mut l_if_warned = vec![false; l_cols.len()];
    for n_idx_row in 0..df.height() {
        let mut l_values = Vec::with_capacity(l_cols.len());
        for (n_idx_col, col) in l_cols.iter().enumerate() {
            let value = col.get(n_idx_row).map_err(|err| {
                ExportError::InvalidDataset(format!(
                    "Failed to read cell ({n_idx_row}, {:?}): {err}",
                    col.name().as_str()
                ))
            })?;
            let cell = match convert_any_value(&value, l_kinds[n_idx_col]) {
                Ok(cell) => cell,
                Err(err) => {
                    if !l_if_warned[n_idx_col] {
                        tracing::warn!(
                            "{}; column {:?} of table {:?} is written as text",
                            err,
                            col.name().as_str(),
                            name
                        );
                        l_if_warned[n_idx_col] = true;
                    }
                    EnumCellValue::String(value.to_string())
                }
            };
            l_values.push(cell);
        }
        table.push_row(l_values)?;
    }

    Ok(table)
}

/// Build a dataset table from Polars IPC bytes.
pub fn derive_table_from_ipc_bytes(name: &str, v_ipc_df: &[u8]) -> Result<SpecTable, ExportError> {
    let df = IpcReader::new(Cursor::new(v_ipc_df))
        .finish()
        .map_err(|err| ExportError::InvalidDataset(format!("Failed to read IPC bytes: {err}")))?;
    derive_table_from_dataframe(name, &df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;
    use polars::prelude::{IpcWriter, SerWriter};

    #[test]
    fn test_derive_table_from_dataframe_maps_kinds_and_nulls() {
        let df = df!(
            "DID" => [Some(15i64), None, Some(34)],
            "Score" => [1.5f64, 2.0, 3.25],
            "Active" => [true, false, true],
            "Name" => ["Ann", "Bob", "Cid"],
        )
        .unwrap();

        let table = derive_table_from_dataframe("Directors", &df).unwrap();
        let l_kinds: Vec<_> = table.columns().iter().map(|col| col.kind).collect();
        assert_eq!(
            l_kinds,
            vec![
                EnumValueKind::Integer,
                EnumValueKind::Float,
                EnumValueKind::Boolean,
                EnumValueKind::String
            ]
        );
        assert_eq!(table.rows().len(), 3);
        assert_eq!(table.value(0, "DID"), Some(&EnumCellValue::Integer(15)));
        assert_eq!(table.value(1, "DID"), Some(&EnumCellValue::None));
        assert_eq!(table.value(2, "Score"), Some(&EnumCellValue::Float(3.25)));
        assert_eq!(table.value(1, "Active"), Some(&EnumCellValue::Boolean(false)));
        assert_eq!(table.value(2, "Name"), Some(&EnumCellValue::from("Cid")));
    }

    #[test]
    fn test_convert_any_value_widens_and_rejects_unknown_kinds() {
        assert_eq!(
            convert_any_value(&AnyValue::UInt64(u64::MAX), EnumValueKind::Integer).unwrap(),
            EnumCellValue::Float(u64::MAX as f64)
        );
        assert_eq!(
            convert_any_value(&AnyValue::Null, EnumValueKind::Float).unwrap(),
            EnumCellValue::None
        );
        assert!(matches!(
            convert_any_value(&AnyValue::Binary(b"raw"), EnumValueKind::Integer),
            Err(ExportError::UnsupportedValueKind { .. })
        ));
    }

    #[test]
    fn test_derive_table_from_ipc_bytes() {
        let mut df = df!("MID" => [7i64, 8], "Name" => ["Eve", "Fay"]).unwrap();
        let mut v_bytes: Vec<u8> = Vec::new();
        IpcWriter::new(&mut v_bytes).finish(&mut df).unwrap();

        let table = derive_table_from_ipc_bytes("Managers", &v_bytes).unwrap();
        assert_eq!(table.name, "Managers");
        assert_eq!(table.value(1, "MID"), Some(&EnumCellValue::Integer(8)));

        assert!(matches!(
            derive_table_from_ipc_bytes("Broken", b"not ipc"),
            Err(ExportError::InvalidDataset(_))
        ));
    }
}
