use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use csv::Writer;
use serde::Serialize;

use crate::binning::{BinnedRecord, CombinedBinnedRecord};
use crate::combine::CombinedRecord;
use crate::stats::SummaryRecord;
use crate::SedError;

pub fn create_timestamped_output_dir(base: &Path) -> Result<PathBuf, SedError> {
    fs::create_dir_all(base)?;

    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let mut output_dir = base.join(&timestamp);
    let mut counter = 1_u32;

    while output_dir.exists() {
        output_dir = base.join(format!("{timestamp}-{counter:02}"));
        counter += 1;
    }

    fs::create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn fmt_f64(value: f64) -> String {
    format!("{value:.10}")
}

fn fmt_option_f64(value: Option<f64>) -> String {
    value.map(fmt_f64).unwrap_or_default()
}

/// Age summary table: `modeloutput_*` central columns.
pub fn write_age_summary_csv(path: &Path, records: &[SummaryRecord]) -> Result<(), SedError> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record([
        "measurementid",
        "modeloutput_median",
        "modeloutput_mean",
        "lower_2_sigma",
        "lower_1_sigma",
        "upper_1_sigma",
        "upper_2_sigma",
        "model_name",
    ])?;
    for record in records {
        writer.write_record([
            record.id.raw().to_string(),
            fmt_f64(record.summary.median),
            fmt_f64(record.summary.mean),
            fmt_f64(record.summary.lower_2_sigma),
            fmt_f64(record.summary.lower_1_sigma),
            fmt_f64(record.summary.upper_1_sigma),
            fmt_f64(record.summary.upper_2_sigma),
            record.tag.model_name(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Rate summary table: `SR_*` central columns plus the scheme tag.
pub fn write_rate_summary_csv(path: &Path, records: &[SummaryRecord]) -> Result<(), SedError> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record([
        "measurementid",
        "SR_median",
        "SR_mean",
        "SR_lower_2_sigma",
        "SR_lower_1_sigma",
        "SR_upper_1_sigma",
        "SR_upper_2_sigma",
        "model_name",
        "SR_mode",
    ])?;
    for record in records {
        writer.write_record([
            record.id.raw().to_string(),
            fmt_f64(record.summary.median),
            fmt_f64(record.summary.mean),
            fmt_f64(record.summary.lower_2_sigma),
            fmt_f64(record.summary.lower_1_sigma),
            fmt_f64(record.summary.upper_1_sigma),
            fmt_f64(record.summary.upper_2_sigma),
            record.tag.model_name(),
            record.mode.map(|m| m.label().to_string()).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Combined envelope table for `label` in {"age", "SR"}.
pub fn write_combined_csv(
    path: &Path,
    records: &[CombinedRecord],
    label: &str,
) -> Result<(), SedError> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record([
        "measurementid".to_string(),
        format!("Max_{label}"),
        format!("Min_{label}"),
        format!("Weighted_mean_{label}"),
    ])?;
    for record in records {
        writer.write_record([
            record.id.raw().to_string(),
            fmt_f64(record.max),
            fmt_f64(record.min),
            fmt_f64(record.weighted_mean),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_binned_csv(path: &Path, records: &[BinnedRecord]) -> Result<(), SedError> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record([
        "Binned_mid_age",
        "SR_median",
        "SR_lower_1_sigma",
        "SR_upper_1_sigma",
        "SR_lower_2_sigma",
        "SR_upper_2_sigma",
        "coreid",
        "model_name",
    ])?;
    for record in records {
        writer.write_record([
            record.mid_age.to_string(),
            fmt_option_f64(record.sr_median),
            fmt_option_f64(record.sr_lower_1_sigma),
            fmt_option_f64(record.sr_upper_1_sigma),
            fmt_option_f64(record.sr_lower_2_sigma),
            fmt_option_f64(record.sr_upper_2_sigma),
            record.core.clone(),
            record.model_name.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_combined_binned_csv(
    path: &Path,
    records: &[CombinedBinnedRecord],
) -> Result<(), SedError> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record([
        "Binned_mid_age",
        "Weighted_SR_median",
        "SR_lower_1_sigma",
        "SR_upper_1_sigma",
        "SR_lower_2_sigma",
        "SR_upper_2_sigma",
        "coreid",
    ])?;
    for record in records {
        writer.write_record([
            record.mid_age.to_string(),
            fmt_option_f64(record.weighted_sr_median),
            fmt_option_f64(record.sr_lower_1_sigma),
            fmt_option_f64(record.sr_upper_1_sigma),
            fmt_option_f64(record.sr_lower_2_sigma),
            fmt_option_f64(record.sr_upper_2_sigma),
            record.core.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SedError> {
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}
