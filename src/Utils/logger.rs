use crate::errors::{BenchError, Result};
use csv::Writer;
use ndarray::{Array1, Array2};
use simplelog::*;
use std::fs::File;
use std::path::Path;

/// Initialize the global logger: terminal output plus an optional log file.
/// A second call is ignored (the logger can only be installed once per process).
pub fn init_logger(level: LevelFilter, log_file: Option<&Path>) {
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    loggers.push(TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ));
    if let Some(filename) = log_file {
        match File::create(filename) {
            Ok(file) => loggers.push(WriteLogger::new(level, Config::default(), file)),
            Err(e) => eprintln!("cannot create log file {}: {}", filename.display(), e),
        }
    }
    let _ = CombinedLogger::init(loggers);
}

/// "off", "error", "warn", "info", "debug" or "trace"
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    match level.to_lowercase().as_str() {
        "off" | "none" => Ok(LevelFilter::Off),
        "error" => Ok(LevelFilter::Error),
        "warn" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        other => Err(BenchError::InvalidTaskValue {
            section: "output".to_string(),
            key: "log_level".to_string(),
            value: other.to_string(),
        }),
    }
}

/// save prediction table: first column is the argument (grid), then one column per variable
pub fn save_prediction_to_csv(
    filename: &Path,
    arg: &str,
    grid: &Array1<f64>,
    headers: &[String],
    values: &Array2<f64>,
) -> Result<()> {
    if grid.len() != values.nrows() || headers.len() != values.ncols() {
        return Err(BenchError::ShapeMismatch(format!(
            "grid has {} points, headers {}, table is {:?}",
            grid.len(),
            headers.len(),
            values.shape()
        )));
    }
    let file = File::create(filename)?;
    let mut writer = Writer::from_writer(file);

    let mut headers_with_x = Vec::with_capacity(headers.len() + 1);
    headers_with_x.push(arg.to_string());
    headers_with_x.extend(headers.iter().cloned());
    writer.write_record(&headers_with_x)?;

    for (i, row) in values.rows().into_iter().enumerate() {
        let mut row_data = Vec::with_capacity(row.len() + 1);
        row_data.push(grid[i].to_string());
        row_data.extend(row.iter().map(|&val| val.to_string()));
        writer.write_record(&row_data)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::tempdir;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("INFO").unwrap(), LevelFilter::Info);
        assert_eq!(parse_level("none").unwrap(), LevelFilter::Off);
        assert!(parse_level("loud").is_err());
    }

    #[test]
    fn test_save_prediction_to_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pred.csv");
        let grid = array![0.0, 0.5];
        let values = array![[1.0, 2.0], [3.0, 4.0]];
        let headers = vec!["u".to_string(), "v".to_string()];
        save_prediction_to_csv(&path, "t", &grid, &headers, &values).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "t,u,v");
        assert_eq!(lines[1], "0,1,2");
        assert_eq!(lines[2], "0.5,3,4");
    }

    #[test]
    fn test_save_prediction_shape_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pred.csv");
        let grid = array![0.0];
        let values = array![[1.0, 2.0], [3.0, 4.0]];
        let headers = vec!["u".to_string(), "v".to_string()];
        assert!(save_prediction_to_csv(&path, "t", &grid, &headers, &values).is_err());
    }
}
