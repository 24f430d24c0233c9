use crate::benchmark::experiment_log::AggregationKey;
use crate::discovery::equation::EquationSystem;
use crate::errors::Result;
use log::info;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Pareto fronts of every launch for one (method, magnitude)
#[derive(Debug, Clone, PartialEq)]
pub struct ParetoRecord {
    pub key: AggregationKey,
    pub fronts: Vec<Vec<EquationSystem>>,
}

/// one `<method>__<magnitude>.txt` file per record listing `Iteration i` and the text form of
/// every system of that front
pub fn write_pareto(dir: &Path, records: &[ParetoRecord]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(records.len());
    for record in records {
        let path = dir.join(format!("{}.txt", record.key.file_stem()));
        let mut f = BufWriter::new(File::create(&path)?);
        for (iteration, front) in record.fronts.iter().enumerate() {
            write!(f, "Iteration {}\n\n", iteration)?;
            for system in front {
                write!(f, "{}\n\n", system.text_form())?;
            }
        }
        f.flush()?;
        info!("Pareto fronts for {} written to {}", record.key.label(), path.display());
        written.push(path);
    }
    Ok(written)
}
