//! Shape rules for element-wise operators over arrays.

use sheetcalc_common::ErrorKind;

/// Combined `(rows, cols)` of two operands. Each axis must match or be 1
/// on one side; otherwise the operation yields `#VALUE!`.
pub fn broadcast_shape(a: (usize, usize), b: (usize, usize)) -> Result<(usize, usize), ErrorKind> {
    fn axis(x: usize, y: usize) -> Result<usize, ErrorKind> {
        match (x, y) {
            _ if x == y => Ok(x),
            (1, n) | (n, 1) => Ok(n),
            _ => Err(ErrorKind::Value),
        }
    }
    Ok((axis(a.0, b.0)?, axis(a.1, b.1)?))
}

/// Map an output index back into an operand of shape `dims`.
#[inline]
pub fn project_index(dims: (usize, usize), row: usize, col: usize) -> (usize, usize) {
    (
        if dims.0 == 1 { 0 } else { row },
        if dims.1 == 1 { 0 } else { col },
    )
}
