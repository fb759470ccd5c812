//! In-memory raw tables as they arrive from a spreadsheet export.
//!
//! A [`RawTable`] keeps column labels exactly as the source wrote them (after
//! making duplicates unique) and stores every cell as a loosely typed
//! [`RawCell`]. Tables from several sheets can be concatenated; rows keep
//! their insertion order and columns are the union of all labels in
//! first-seen order.

use std::{borrow::Cow, collections::HashMap};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawCell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

static EMPTY_CELL: RawCell = RawCell::Empty;

impl RawCell {
    pub fn empty() -> &'static RawCell {
        &EMPTY_CELL
    }

    /// Wraps a text field, collapsing blank strings to [`RawCell::Empty`].
    pub fn from_text(value: &str) -> Self {
        if value.trim().is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(value.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(text) => text.trim().is_empty(),
            RawCell::Number(_) => false,
        }
    }

    /// Display form of the cell. Integral numbers render without a fraction.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            RawCell::Empty => Cow::Borrowed(""),
            RawCell::Text(text) => Cow::Borrowed(text.as_str()),
            RawCell::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    Cow::Owned(format!("{n:.0}"))
                } else {
                    Cow::Owned(n.to_string())
                }
            }
        }
    }
}

impl From<&str> for RawCell {
    fn from(value: &str) -> Self {
        RawCell::from_text(value)
    }
}

impl From<String> for RawCell {
    fn from(value: String) -> Self {
        if value.trim().is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(value)
        }
    }
}

impl From<f64> for RawCell {
    fn from(value: f64) -> Self {
        RawCell::Number(value)
    }
}

impl From<i64> for RawCell {
    fn from(value: i64) -> Self {
        RawCell::Number(value as f64)
    }
}

impl From<i32> for RawCell {
    fn from(value: i32) -> Self {
        RawCell::Number(f64::from(value))
    }
}

impl<T: Into<RawCell>> From<Option<T>> for RawCell {
    fn from(value: Option<T>) -> Self {
        value.map_or(RawCell::Empty, Into::into)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    positions: HashMap<String, usize>,
    rows: Vec<Vec<RawCell>>,
}

impl RawTable {
    /// Creates an empty table with the given header labels.
    ///
    /// Repeated labels get `.1`, `.2`, ... suffixes so each label addresses
    /// exactly one column.
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = RawTable::default();
        for header in headers {
            table.add_column(header.as_ref());
        }
        table
    }

    fn add_column(&mut self, label: &str) -> usize {
        let label = label.trim();
        let mut candidate = label.to_string();
        let mut suffix = 1;
        while self.positions.contains_key(&candidate) {
            candidate = format!("{label}.{suffix}");
            suffix += 1;
        }
        let idx = self.columns.len();
        self.positions.insert(candidate.clone(), idx);
        self.columns.push(candidate);
        for row in &mut self.rows {
            row.push(RawCell::Empty);
        }
        idx
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.positions.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends a positional row. Short rows are padded with empty cells; cells
    /// past the last header open `Unnamed: N` columns.
    pub fn push_row<I>(&mut self, cells: I)
    where
        I: IntoIterator<Item = RawCell>,
    {
        let mut row: Vec<RawCell> = cells.into_iter().collect();
        while row.len() > self.columns.len() {
            let label = format!("Unnamed: {}", self.columns.len());
            self.add_column(&label);
        }
        row.resize(self.columns.len(), RawCell::Empty);
        self.rows.push(row);
    }

    /// Appends a row given as `(label, cell)` pairs. Unknown labels open new
    /// columns; labels not mentioned stay empty.
    pub fn push_mapped<I, S>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (S, RawCell)>,
        S: AsRef<str>,
    {
        let mut row = vec![RawCell::Empty; self.columns.len()];
        for (label, cell) in pairs {
            let label = label.as_ref().trim();
            let idx = match self.column_index(label) {
                Some(idx) => idx,
                None => {
                    let idx = self.add_column(label);
                    row.push(RawCell::Empty);
                    idx
                }
            };
            row[idx] = cell;
        }
        self.rows.push(row);
    }

    pub fn row(&self, index: usize) -> Option<&[RawCell]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[RawCell]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn cell(&self, row: usize, column: usize) -> &RawCell {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(RawCell::empty())
    }

    /// Appends every row of `other`, merging columns by label.
    pub fn append(&mut self, other: RawTable) {
        let mapping: Vec<usize> = other
            .columns
            .iter()
            .map(|label| match self.column_index(label) {
                Some(idx) => idx,
                None => {
                    let idx = self.columns.len();
                    self.positions.insert(label.clone(), idx);
                    self.columns.push(label.clone());
                    for row in &mut self.rows {
                        row.push(RawCell::Empty);
                    }
                    idx
                }
            })
            .collect();
        for source in other.rows {
            let mut row = vec![RawCell::Empty; self.columns.len()];
            for (cell, &target) in source.into_iter().zip(&mapping) {
                row[target] = cell;
            }
            self.rows.push(row);
        }
    }

    pub fn concat<I>(tables: I) -> RawTable
    where
        I: IntoIterator<Item = RawTable>,
    {
        let mut combined = RawTable::default();
        for table in tables {
            combined.append(table);
        }
        combined
    }
}
