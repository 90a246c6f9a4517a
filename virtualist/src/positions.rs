/// Collections at least this long only compute positions up to a bounded lookahead on demand.
pub const LARGE_LIST_THRESHOLD: usize = 500;

/// Items computed past the requested index when extending positions of a large collection.
pub const POSITION_LOOKAHEAD: usize = 64;

/// Row/column state threaded through a forward position scan.
///
/// The cursor describes where the *next* item goes. Rows advance only when the last column is
/// filled, by the largest item size seen in that row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RowCursor {
    /// 1-based column of the next item.
    pub column: usize,
    pub row_top: f64,
    pub max_size_in_row: f64,
}

impl RowCursor {
    pub const START: Self = Self {
        column: 1,
        row_top: 0.0,
        max_size_in_row: 0.0,
    };

    /// Seeds a cursor for the item following `prev`.
    ///
    /// `row_sizes` are the sizes of the items from `prev`'s row start through `prev` itself; only
    /// that row is scanned, never the whole collection.
    pub fn resume(
        prev_column: usize,
        prev_top: f64,
        row_sizes: impl IntoIterator<Item = f64>,
        num_columns: usize,
    ) -> Self {
        let mut cursor = Self {
            column: prev_column,
            row_top: prev_top,
            max_size_in_row: row_sizes.into_iter().fold(0.0, f64::max),
        };
        cursor.advance(num_columns);
        cursor
    }

    /// Places an item and returns its `(top, column)`.
    pub fn place(&mut self, size: f64, num_columns: usize) -> (f64, usize) {
        let placed = (self.row_top, self.column);
        self.max_size_in_row = self.max_size_in_row.max(size);
        self.advance(num_columns);
        placed
    }

    /// Extent covered so far, including a partially filled row.
    pub fn extent(&self) -> f64 {
        self.row_top + self.max_size_in_row
    }

    fn advance(&mut self, num_columns: usize) {
        if self.column >= num_columns.max(1) {
            self.row_top += self.max_size_in_row;
            self.max_size_in_row = 0.0;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

/// Index of the first item in `index`'s row.
pub fn row_start(index: usize, num_columns: usize) -> usize {
    index - index % num_columns.max(1)
}

/// Height of the row containing `index`: the largest size among its items.
pub fn row_extent(
    index: usize,
    len: usize,
    num_columns: usize,
    mut size_of: impl FnMut(usize) -> f64,
) -> f64 {
    if num_columns <= 1 {
        return size_of(index);
    }
    let start = row_start(index, num_columns);
    let end = (start + num_columns).min(len);
    (start..end).map(&mut size_of).fold(0.0, f64::max)
}

/// Cumulative item offsets along the scroll axis.
///
/// Offsets are valid over a single prefix `[0, end]` and extended lazily. Position 0 is the
/// leading edge of the content; header and padding offsets belong to the consumer.
#[derive(Clone, Debug, Default)]
pub struct PositionCalculator {
    tops: Vec<f64>,
    columns: Vec<usize>,
    valid_end: Option<usize>,
    num_columns: usize,
}

impl PositionCalculator {
    pub fn new(len: usize, num_columns: usize) -> Self {
        let mut calc = Self::default();
        calc.reset(len, num_columns);
        calc
    }

    /// Resizes for a new data set and invalidates every position.
    pub fn reset(&mut self, len: usize, num_columns: usize) {
        self.tops.clear();
        self.tops.resize(len, 0.0);
        self.columns.clear();
        self.columns.resize(len, 1);
        self.valid_end = None;
        self.num_columns = num_columns.max(1);
    }

    pub fn len(&self) -> usize {
        self.tops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tops.is_empty()
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    /// Inclusive range of indices whose positions are current.
    pub fn valid_range(&self) -> Option<(usize, usize)> {
        self.valid_end.map(|end| (0, end))
    }

    /// Number of leading indices with current positions.
    pub fn valid_len(&self) -> usize {
        self.valid_end.map_or(0, |end| end + 1)
    }

    pub fn is_valid(&self, index: usize) -> bool {
        self.valid_end.is_some_and(|end| index <= end)
    }

    /// Returns the position of `index` if it is current.
    pub fn top(&self, index: usize) -> Option<f64> {
        self.is_valid(index).then(|| self.tops[index])
    }

    /// Returns the 1-based column of `index` if its position is current.
    pub fn column(&self, index: usize) -> Option<usize> {
        self.is_valid(index).then(|| self.columns[index])
    }

    pub fn row_start(&self, index: usize) -> usize {
        row_start(index, self.num_columns)
    }

    /// Recomputes positions for `[start, end]` (`end` defaults to the last index).
    ///
    /// `start` is pulled back to the first invalid index when it lies past the valid prefix.
    /// Returns the number of positions written.
    pub fn recompute(
        &mut self,
        start: usize,
        end: Option<usize>,
        mut size_of: impl FnMut(usize) -> f64,
    ) -> usize {
        let len = self.len();
        if len == 0 {
            return 0;
        }
        let end = end.unwrap_or(len - 1).min(len - 1);
        let start = start.min(self.valid_len());
        if start > end {
            return 0;
        }

        let n = self.num_columns;
        let mut cursor = self.resume(start, &mut size_of);
        for i in start..=end {
            let (top, column) = cursor.place(size_of(i), n);
            self.tops[i] = top;
            self.columns[i] = column;
        }
        self.valid_end = Some(self.valid_end.map_or(end, |prev| prev.max(end)));
        vtrace!(start, end, "PositionCalculator::recompute");
        end - start + 1
    }

    /// Builds the cursor for `start` from the (valid) item before it.
    fn resume(&self, start: usize, size_of: &mut impl FnMut(usize) -> f64) -> RowCursor {
        if start == 0 {
            return RowCursor::START;
        }
        let prev = start - 1;
        debug_assert!(self.is_valid(prev), "resume from an invalid position ({prev})");
        let column = self.columns[prev];
        let first = prev + 1 - column;
        RowCursor::resume(
            column,
            self.tops[prev],
            (first..=prev).map(size_of),
            self.num_columns,
        )
    }

    /// Drops validity from `index`'s row onward.
    ///
    /// Returns the previous valid end when `index` was inside the valid range; a change outside it
    /// needs no work now and is picked up by the next [`Self::ensure`].
    pub fn invalidate_from(&mut self, index: usize) -> Option<usize> {
        let end = self.valid_end?;
        let first = self.row_start(index);
        if first > end {
            return None;
        }
        self.valid_end = first.checked_sub(1);
        Some(end)
    }

    /// Invalidates after a size change at `index` and re-validates forward.
    ///
    /// Small collections are re-validated up to the previous valid end; large ones only over a
    /// bounded window, the rest is extended lazily.
    pub fn revalidate_from(&mut self, index: usize, size_of: impl FnMut(usize) -> f64) {
        let Some(prev_end) = self.invalidate_from(index) else {
            return;
        };
        let first = self.row_start(index);
        let end = if self.len() >= LARGE_LIST_THRESHOLD {
            prev_end.min(first + POSITION_LOOKAHEAD)
        } else {
            prev_end
        };
        self.recompute(first, Some(end), size_of);
    }

    /// Makes sure the position of `index` is current and returns it.
    pub fn ensure(&mut self, index: usize, size_of: impl FnMut(usize) -> f64) -> Option<f64> {
        let len = self.len();
        if index >= len {
            return None;
        }
        if !self.is_valid(index) {
            let end = if len >= LARGE_LIST_THRESHOLD {
                (index + POSITION_LOOKAHEAD).min(len - 1)
            } else {
                len - 1
            };
            self.recompute(self.valid_len(), Some(end), size_of);
        }
        Some(self.tops[index])
    }
}
