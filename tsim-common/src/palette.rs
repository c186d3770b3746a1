//! Book color palette
//!
//! Colors are keyed by a book's catalog `position`, not its id, so the same
//! book keeps its color no matter which subset is selected.

/// Ten categorical colors, cycled when there are more books
pub const COLOR_PALETTE: [&str; 10] = [
    "#e15759", // red
    "#4e79a7", // blue
    "#59a14f", // green
    "#f28e2b", // orange
    "#edc948", // yellow
    "#b07aa1", // purple
    "#76b7b2", // teal
    "#ff9da7", // pink
    "#9c755f", // brown
    "#bab0ab", // gray
];

/// Color for the book at `position` in the catalog
pub fn color_for_position(position: usize) -> &'static str {
    COLOR_PALETTE[position % COLOR_PALETTE.len()]
}
