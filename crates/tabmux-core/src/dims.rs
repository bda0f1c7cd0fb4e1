//! Terminal cell-grid dimensions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A terminal viewport size in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub cols: u16,
    pub rows: u16,
}

impl Dimensions {
    /// Size assumed for a freshly created surface before its first fit.
    pub const INITIAL: Dimensions = Dimensions { cols: 120, rows: 24 };

    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// A fit result is only usable when both axes are non-zero.
    pub fn is_usable(&self) -> bool {
        self.cols > 0 && self.rows > 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}
