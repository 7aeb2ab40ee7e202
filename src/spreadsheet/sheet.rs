use crate::spreadsheet::cell::Cell;

/// Represents a worksheet read from a workbook, holding its non-empty cells.
pub struct Sheet {
    /// Source file name
    pub(crate) file_name: String,
    /// Sheet name
    pub(crate) name: String,
    /// All cells in the sheet, ordered by (row, col) once finished
    pub(crate) cells: Vec<Cell>,
    /// Actual data range (determined from cell data)
    pub(crate) row_lower_bound: Option<usize>,
    pub(crate) row_upper_bound: Option<usize>,
    pub(crate) col_lower_bound: Option<usize>,
    pub(crate) col_upper_bound: Option<usize>,
}

impl Sheet {
    pub(crate) fn new(file_name: &str, name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            cells: Vec::new(),
            row_lower_bound: None,
            row_upper_bound: None,
            col_lower_bound: None,
            col_upper_bound: None,
        }
    }

    /// Sheet name as shown on the workbook tab.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the sheet contains no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell to the sheet, widening the data range.
    pub(crate) fn push(&mut self, cell: Cell) {
        self.update_bound(cell.row, cell.col);
        self.cells.push(cell);
    }

    fn update_bound(&mut self, row: usize, col: usize) {
        if self.row_lower_bound.map(|row_lower_bound| row < row_lower_bound).unwrap_or(true) {
            self.row_lower_bound = Some(row);
        }
        if self.row_upper_bound.map(|row_upper_bound| row_upper_bound < row).unwrap_or(true) {
            self.row_upper_bound = Some(row);
        }
        if self.col_lower_bound.map(|col_lower_bound| col < col_lower_bound).unwrap_or(true) {
            self.col_lower_bound = Some(col);
        }
        if self.col_upper_bound.map(|col_upper_bound| col_upper_bound < col).unwrap_or(true) {
            self.col_upper_bound = Some(col);
        }
    }

    /// Orders cells by position. Worksheets are normally already ordered.
    pub(crate) fn finish(&mut self) {
        self.cells.sort_by_key(|cell| (cell.row, cell.col));
    }

    /// Lays the cells out as a dense grid over the data range.
    /// Positions without a cell are `None`; rows without cells are all `None`.
    pub(crate) fn grid(&self) -> Vec<Vec<Option<&Cell>>> {
        let (Some(row_lower), Some(row_upper), Some(col_lower), Some(col_upper)) = (
            self.row_lower_bound,
            self.row_upper_bound,
            self.col_lower_bound,
            self.col_upper_bound,
        ) else {
            return Vec::new();
        };
        let mut index = 0usize;
        let mut table = Vec::<Vec<Option<&Cell>>>::with_capacity(row_upper - row_lower + 1);
        for row in row_lower..=row_upper {
            let mut record = Vec::<Option<&Cell>>::with_capacity(col_upper - col_lower + 1);
            for col in col_lower..=col_upper {
                // a repeated position keeps its first cell
                while self.cells.get(index).is_some_and(|cell| (cell.row, cell.col) < (row, col)) {
                    index += 1;
                }
                match self.cells.get(index) {
                    Some(cell) if cell.row == row && cell.col == col => {
                        record.push(Some(cell));
                        index += 1;
                    }
                    _ => record.push(None),
                }
            }
            table.push(record);
        }
        table
    }
}
