use crate::errors::{BenchError, Result};
use ndarray::{Array, Array2, Axis, Dimension};

/// mean of |a - b| over all elements
pub fn mean_absolute_error<D: Dimension>(a: &Array<f64, D>, b: &Array<f64, D>) -> Result<f64> {
    if a.shape() != b.shape() {
        return Err(BenchError::ShapeMismatch(format!(
            "cannot compare {:?} with {:?}",
            a.shape(),
            b.shape()
        )));
    }
    if a.is_empty() {
        return Err(BenchError::ShapeMismatch("empty arrays".to_string()));
    }
    let sum: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum();
    Ok(sum / a.len() as f64)
}

/// MAE of every column (variable) separately
pub fn per_column_mae(a: &Array2<f64>, b: &Array2<f64>) -> Result<Vec<f64>> {
    if a.dim() != b.dim() || a.nrows() == 0 {
        return Err(BenchError::ShapeMismatch(format!(
            "cannot compare {:?} with {:?}",
            a.shape(),
            b.shape()
        )));
    }
    Ok(a.axis_iter(Axis(1))
        .zip(b.axis_iter(Axis(1)))
        .map(|(ca, cb)| {
            ca.iter().zip(cb.iter()).map(|(x, y)| (x - y).abs()).sum::<f64>() / ca.len() as f64
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_mae() {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let b = array![[1.5, 2.0], [2.0, 4.0]];
        assert_relative_eq!(mean_absolute_error(&a, &b).unwrap(), 0.375);
        let cols = per_column_mae(&a, &b).unwrap();
        assert_relative_eq!(cols[0], 0.75);
        assert_relative_eq!(cols[1], 0.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = array![[1.0, 2.0]];
        let b = array![[1.0], [2.0]];
        assert!(mean_absolute_error(&a, &b).is_err());
        assert!(per_column_mae(&a, &b).is_err());
    }
}
