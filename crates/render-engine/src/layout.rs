//! Near-square grid arrangement.

/// Column/row count of the wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub columns: u32,
    pub rows: u32,
}

impl GridLayout {
    /// Layout for `num_cells` cells: `ceil(sqrt(n))` columns and
    /// `ceil(n / columns)` rows. An empty wall still gets one (blank) cell.
    pub fn for_cells(num_cells: usize) -> Self {
        if num_cells == 0 {
            return Self {
                columns: 1,
                rows: 1,
            };
        }
        let n = num_cells as u32;
        let mut columns = (n as f64).sqrt().ceil() as u32;
        // Guard against float rounding on perfect squares.
        while columns > 1 && (columns - 1) * (columns - 1) >= n {
            columns -= 1;
        }
        while columns * columns < n {
            columns += 1;
        }
        let rows = n.div_ceil(columns);
        Self { columns, rows }
    }

    /// Total cell count including padding cells.
    pub fn capacity(&self) -> usize {
        (self.columns * self.rows) as usize
    }

    /// Top-left pixel of cell `index` (row-major).
    pub fn cell_origin(&self, index: usize, cell_width: u32, cell_height: u32) -> (u32, u32) {
        let index = index as u32;
        let col = index % self.columns;
        let row = index / self.columns;
        (col * cell_width, row * cell_height)
    }

    /// Size of the whole wall in pixels.
    pub fn canvas_size(&self, cell_width: u32, cell_height: u32) -> (u32, u32) {
        (self.columns * cell_width, self.rows * cell_height)
    }
}
