//! Delimited photometry table and field snapshot dumps.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use shared::algo::nan_median;
use shared::image_proc::ApertureRadii;

use crate::error::TrackError;
use crate::reducer::DifferentialMeasurement;
use crate::state::FrameSolution;

/// Arbitrary zero point used when reporting magnitudes.
pub const MAG_ZEROPOINT: f64 = 20.0;

/// Units of the values written to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Units {
    #[default]
    Flux,
    Mag,
}

impl Units {
    pub fn label(&self) -> &'static str {
        match self {
            Units::Flux => "Flux",
            Units::Mag => "Mag",
        }
    }

    fn convert(&self, value: f64) -> f64 {
        match self {
            Units::Flux => value,
            Units::Mag => flux_to_mag(value),
        }
    }
}

impl std::str::FromStr for Units {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Flux" | "flux" => Ok(Units::Flux),
            "Mag" | "mag" => Ok(Units::Mag),
            other => Err(TrackError::InvalidConfiguration(format!(
                "units must be \"Flux\" or \"Mag\", received: {other}"
            ))),
        }
    }
}

pub fn flux_to_mag(flux: f64) -> f64 {
    -2.5 * flux.log10() + MAG_ZEROPOINT
}

/// Divide a series by its median, ignoring NaN entries.
///
/// Returns the series unchanged (as NaN) when no finite median exists.
pub fn normalize_by_median(series: &[f64]) -> Vec<f64> {
    let median = nan_median(series);
    series.iter().map(|v| v / median).collect()
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{value:.6}")
    }
}

/// Write the per-frame table: header lines describing the photometry
/// radii, then one row per frame with the median-normalized differential,
/// the target and each comparison star.
///
/// The comparison column count is fixed by `n_comparisons`; rows carrying
/// a different count are rejected.
pub fn write_table<W: Write>(
    writer: &mut W,
    radii: &ApertureRadii,
    n_comparisons: usize,
    rows: &[DifferentialMeasurement],
    units: Units,
) -> Result<(), TrackError> {
    let label = units.label();
    writeln!(writer, "Aperture (radius, pixels) = {}", radii.aperture)?;
    writeln!(
        writer,
        "Sky Annulus (inner and outer radius, pixels) = {}, {}",
        radii.sky_inner, radii.sky_outer
    )?;
    writeln!(writer, "{}", "-".repeat(30))?;

    let mut header = format!(
        "Normalized Differential Photometry (Units = {label}), Target (Units = {label}), "
    );
    for n in 0..n_comparisons {
        header.push_str(&format!("Comparison{n} (Units = {label}), "));
    }
    writeln!(writer, "{header}")?;

    let ratios: Vec<f64> = rows.iter().map(|r| r.differential_ratio).collect();
    let normalized = normalize_by_median(&ratios);

    for (row, diff) in rows.iter().zip(normalized) {
        if row.comparison_fluxes.len() != n_comparisons {
            return Err(TrackError::InvalidConfiguration(format!(
                "row has {} comparison stars, table expects {n_comparisons}",
                row.comparison_fluxes.len()
            )));
        }
        let line = std::iter::once(diff)
            .chain(std::iter::once(row.target_flux))
            .chain(row.comparison_fluxes.iter().copied())
            .map(|v| format_value(units.convert(v)))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(writer, "{line}")?;
    }
    Ok(())
}

/// Write the table to `path`.
pub fn save_table<P: AsRef<Path>>(
    path: P,
    radii: &ApertureRadii,
    n_comparisons: usize,
    rows: &[DifferentialMeasurement],
    units: Units,
) -> Result<(), TrackError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_table(&mut writer, radii, n_comparisons, rows, units)?;
    writer.flush()?;
    Ok(())
}

/// Dump the per-frame field snapshots as pretty JSON.
pub fn write_frame_solutions<W: Write>(
    writer: W,
    solutions: &[FrameSolution],
) -> Result<(), TrackError> {
    serde_json::to_writer_pretty(writer, solutions)?;
    Ok(())
}
