//! Layout command sink interface and an in-memory recorder.
//!
//! Coordinates are 0-based: row 0 is the first spreadsheet row, column 0 is `A`.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::conf::C_SHEET_NAME_DEFAULT;
use crate::spec::{EnumCellValue, SinkError, SpecCellFormat};

/// Receiver of layout commands produced by [`crate::layout::export_dataset`].
///
/// A sink starts with one default sheet, selected. Cell commands target the
/// selected sheet.
pub trait SpreadsheetSink {
    /// Write a typed value.
    fn set_cell_value(
        &mut self,
        row: usize,
        col: usize,
        value: &EnumCellValue,
    ) -> Result<(), SinkError>;

    /// Apply a resolved style to a cell.
    fn set_cell_style(
        &mut self,
        row: usize,
        col: usize,
        format: &SpecCellFormat,
    ) -> Result<(), SinkError>;

    /// Tag a row as grouped at `level` (level >= 1).
    fn add_grouped_row(&mut self, row: usize, level: u8) -> Result<(), SinkError>;

    /// Collapse the grouped rows of `row_first..=row_last`.
    fn collapse_rows(&mut self, row_first: usize, row_last: usize) -> Result<(), SinkError>;

    /// Set an explicit row height in points.
    fn set_row_height(&mut self, row: usize, height: f64) -> Result<(), SinkError>;

    /// Append a sheet. Does not change the selection.
    fn add_sheet(&mut self, name: &str) -> Result<(), SinkError>;

    /// Rename the sink's initial sheet.
    fn rename_default_sheet(&mut self, name: &str) -> Result<(), SinkError>;

    /// Select the sheet receiving subsequent cell commands.
    fn select_sheet(&mut self, name: &str) -> Result<(), SinkError>;

    /// Fit column widths of `col_first..=col_last` to their content.
    fn autofit_columns(&mut self, col_first: usize, col_last: usize) -> Result<(), SinkError>;

    /// Fit row heights of `row_first..=row_last` to their content.
    fn autofit_rows(&mut self, row_first: usize, row_last: usize) -> Result<(), SinkError>;

    /// Write the workbook to a file.
    fn persist_to_path(&mut self, path: &Path) -> Result<(), SinkError>;

    /// Write the workbook bytes to a stream.
    fn persist_to_writer(&mut self, writer: &mut dyn Write) -> Result<(), SinkError>;
}

/// One recorded sink command.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumSinkCommand {
    SetCellValue {
        row: usize,
        col: usize,
        value: EnumCellValue,
    },
    SetCellStyle {
        row: usize,
        col: usize,
        format: SpecCellFormat,
    },
    AddGroupedRow {
        row: usize,
        level: u8,
    },
    CollapseRows {
        row_first: usize,
        row_last: usize,
    },
    SetRowHeight {
        row: usize,
        height: f64,
    },
    AddSheet(String),
    RenameDefaultSheet(String),
    SelectSheet(String),
    AutofitColumns {
        col_first: usize,
        col_last: usize,
    },
    AutofitRows {
        row_first: usize,
        row_last: usize,
    },
    Persist,
}

/// Sink recording every command per sheet, in order.
///
/// Persisting writes nothing; it only records the call.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    l_sheet_names: Vec<String>,
    idx_sheet_selected: usize,
    dict_commands: BTreeMap<usize, Vec<EnumSinkCommand>>,
    l_commands: Vec<EnumSinkCommand>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            l_sheet_names: vec![C_SHEET_NAME_DEFAULT.to_string()],
            idx_sheet_selected: 0,
            dict_commands: BTreeMap::new(),
            l_commands: Vec::new(),
        }
    }

    /// Sheet names in creation order.
    pub fn sheet_names(&self) -> &[String] {
        &self.l_sheet_names
    }

    /// Every command in call order, across sheets.
    pub fn commands(&self) -> &[EnumSinkCommand] {
        &self.l_commands
    }

    /// Commands issued while `sheet_name` was selected.
    pub fn sheet_commands(&self, sheet_name: &str) -> &[EnumSinkCommand] {
        self.l_sheet_names
            .iter()
            .position(|c_name| c_name == sheet_name)
            .and_then(|n_idx| self.dict_commands.get(&n_idx))
            .map_or(&[], Vec::as_slice)
    }

    /// Final cell values of a sheet keyed by `(row, col)`.
    pub fn sheet_cells(&self, sheet_name: &str) -> BTreeMap<(usize, usize), EnumCellValue> {
        let mut dict_cells = BTreeMap::new();
        for command in self.sheet_commands(sheet_name) {
            if let EnumSinkCommand::SetCellValue { row, col, value } = command {
                dict_cells.insert((*row, *col), value.clone());
            }
        }
        dict_cells
    }

    /// Final cell styles of a sheet keyed by `(row, col)`.
    pub fn sheet_styles(&self, sheet_name: &str) -> BTreeMap<(usize, usize), SpecCellFormat> {
        let mut dict_styles = BTreeMap::new();
        for command in self.sheet_commands(sheet_name) {
            if let EnumSinkCommand::SetCellStyle { row, col, format } = command {
                dict_styles.insert((*row, *col), format.clone());
            }
        }
        dict_styles
    }

    /// Outline level per grouped row of a sheet.
    pub fn sheet_outline_levels(&self, sheet_name: &str) -> BTreeMap<usize, u8> {
        let mut dict_levels = BTreeMap::new();
        for command in self.sheet_commands(sheet_name) {
            if let EnumSinkCommand::AddGroupedRow { row, level } = command {
                dict_levels.insert(*row, *level);
            }
        }
        dict_levels
    }

    /// Collapse ranges of a sheet in call order.
    pub fn sheet_collapsed_ranges(&self, sheet_name: &str) -> Vec<(usize, usize)> {
        self.sheet_commands(sheet_name)
            .iter()
            .filter_map(|command| match command {
                EnumSinkCommand::CollapseRows {
                    row_first,
                    row_last,
                } => Some((*row_first, *row_last)),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, command: EnumSinkCommand) {
        self.dict_commands
            .entry(self.idx_sheet_selected)
            .or_default()
            .push(command.clone());
        self.l_commands.push(command);
    }
}

impl SpreadsheetSink for RecordingSink {
    fn set_cell_value(
        &mut self,
        row: usize,
        col: usize,
        value: &EnumCellValue,
    ) -> Result<(), SinkError> {
        self.record(EnumSinkCommand::SetCellValue {
            row,
            col,
            value: value.clone(),
        });
        Ok(())
    }

    fn set_cell_style(
        &mut self,
        row: usize,
        col: usize,
        format: &SpecCellFormat,
    ) -> Result<(), SinkError> {
        self.record(EnumSinkCommand::SetCellStyle {
            row,
            col,
            format: format.clone(),
        });
        Ok(())
    }

    fn add_grouped_row(&mut self, row: usize, level: u8) -> Result<(), SinkError> {
        self.record(EnumSinkCommand::AddGroupedRow { row, level });
        Ok(())
    }

    fn collapse_rows(&mut self, row_first: usize, row_last: usize) -> Result<(), SinkError> {
        self.record(EnumSinkCommand::CollapseRows {
            row_first,
            row_last,
        });
        Ok(())
    }

    fn set_row_height(&mut self, row: usize, height: f64) -> Result<(), SinkError> {
        self.record(EnumSinkCommand::SetRowHeight { row, height });
        Ok(())
    }

    fn add_sheet(&mut self, name: &str) -> Result<(), SinkError> {
        self.l_sheet_names.push(name.to_string());
        self.l_commands
            .push(EnumSinkCommand::AddSheet(name.to_string()));
        Ok(())
    }

    fn rename_default_sheet(&mut self, name: &str) -> Result<(), SinkError> {
        self.l_sheet_names[0] = name.to_string();
        self.l_commands
            .push(EnumSinkCommand::RenameDefaultSheet(name.to_string()));
        Ok(())
    }

    fn select_sheet(&mut self, name: &str) -> Result<(), SinkError> {
        let n_idx = self
            .l_sheet_names
            .iter()
            .position(|c_name| c_name == name)
            .ok_or_else(|| SinkError::SheetNotFound {
                name: name.to_string(),
            })?;
        self.idx_sheet_selected = n_idx;
        self.l_commands
            .push(EnumSinkCommand::SelectSheet(name.to_string()));
        Ok(())
    }

    fn autofit_columns(&mut self, col_first: usize, col_last: usize) -> Result<(), SinkError> {
        self.record(EnumSinkCommand::AutofitColumns {
            col_first,
            col_last,
        });
        Ok(())
    }

    fn autofit_rows(&mut self, row_first: usize, row_last: usize) -> Result<(), SinkError> {
        self.record(EnumSinkCommand::AutofitRows {
            row_first,
            row_last,
        });
        Ok(())
    }

    fn persist_to_path(&mut self, _path: &Path) -> Result<(), SinkError> {
        self.l_commands.push(EnumSinkCommand::Persist);
        Ok(())
    }

    fn persist_to_writer(&mut self, _writer: &mut dyn Write) -> Result<(), SinkError> {
        self.l_commands.push(EnumSinkCommand::Persist);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_routes_commands_to_selected_sheet() {
        let mut sink = RecordingSink::new();
        sink.rename_default_sheet("First").unwrap();
        sink.set_cell_value(0, 0, &EnumCellValue::from("a")).unwrap();
        sink.add_sheet("Second").unwrap();
        sink.select_sheet("Second").unwrap();
        sink.set_cell_value(0, 1, &EnumCellValue::from("b")).unwrap();
        sink.add_grouped_row(0, 1).unwrap();

        assert_eq!(sink.sheet_names(), ["First", "Second"]);
        assert_eq!(sink.sheet_cells("First").len(), 1);
        assert_eq!(
            sink.sheet_cells("Second").get(&(0, 1)),
            Some(&EnumCellValue::from("b"))
        );
        assert_eq!(sink.sheet_outline_levels("Second").get(&0), Some(&1));
        assert!(sink.sheet_outline_levels("First").is_empty());
    }

    #[test]
    fn test_recording_sink_select_unknown_sheet_fails() {
        let mut sink = RecordingSink::new();
        assert!(matches!(
            sink.select_sheet("Nope"),
            Err(SinkError::SheetNotFound { .. })
        ));
    }
}
