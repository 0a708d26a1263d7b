//! Export of acquired frames under the naming convention of the GRANDMA
//! collaboration.
//!
//! Only frames whose OBJECT was set by the observer pass
//! (`GRANDMA_<event>_<tile>`) are exported. The primary header gains the
//! collaboration keywords and the data unit is copied unchanged.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::info;
use std::path::{Path, PathBuf};

use crate::config::ExportConfig;
use crate::models::plan::parse_timestamp;
use crate::parsing::fits_header::{
    read_fits_file, write_fits_file, FitsError, FitsHeader, FitsResult, FitsValue,
};
use crate::services::observer::OBJECT_PREFIX;

const TELESCOPE_CTA_N: &str = "FRAM-CTA-N";
const TELESCOPE_AUGER: &str = "FRAM-Auger";

/// Frame metadata needed to name and annotate an exported file.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    pub event_name: String,
    pub tile_id: i64,
    pub telescope: &'static str,
    pub filter: String,
    pub exposure_s: f64,
    pub ra: f64,
    pub dec: f64,
    /// DATE-OBS exactly as found in the header
    pub date_obs: String,
    pub observed_at: NaiveDateTime,
}

/// Result of exporting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Written(PathBuf),
    /// The target already exists and replacing was not requested
    AlreadyExported(PathBuf),
    /// OBJECT does not name a plan field
    NotPlanFrame,
}

/// Split `GRANDMA_<event>_<tile>` into event name and tile id.
///
/// The tile id is taken after the last underscore so event names may contain
/// underscores themselves.
pub fn parse_object_name(object: &str) -> Option<(String, i64)> {
    let rest = object.strip_prefix(OBJECT_PREFIX)?.strip_prefix('_')?;
    let (event, tile) = rest.rsplit_once('_')?;
    if event.is_empty() {
        return None;
    }
    Some((event.to_string(), tile.trim().parse().ok()?))
}

fn required_f64(header: &FitsHeader, keyword: &str) -> FitsResult<f64> {
    header
        .get_f64(keyword)
        .ok_or_else(|| FitsError::MissingKeyword(keyword.to_string()))
}

/// Read frame metadata; `None` when the frame does not belong to a plan.
pub fn frame_info(header: &FitsHeader) -> FitsResult<Option<FrameInfo>> {
    let Some((event_name, tile_id)) = header
        .get_str("OBJECT")
        .as_deref()
        .and_then(parse_object_name)
    else {
        return Ok(None);
    };

    let instrument = header.get_str("INSTRUME").unwrap_or_default();
    let telescope = if instrument.contains("BART") {
        TELESCOPE_CTA_N
    } else {
        TELESCOPE_AUGER
    };

    let date_obs = header
        .get_str("DATE-OBS")
        .ok_or_else(|| FitsError::MissingKeyword("DATE-OBS".to_string()))?;
    let observed_at = parse_timestamp(&date_obs)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| FitsError::InvalidValue {
            keyword: "DATE-OBS".to_string(),
            value: date_obs.clone(),
        })?;

    Ok(Some(FrameInfo {
        event_name,
        tile_id,
        telescope,
        filter: header
            .get_str("FILTER")
            .unwrap_or_else(|| "Unknown".to_string()),
        exposure_s: required_f64(header, "EXPOSURE")?,
        ra: required_f64(header, "TELRA")?,
        dec: required_f64(header, "TELDEC")?,
        date_obs,
        observed_at,
    }))
}

fn coordinate_token(value: f64) -> String {
    format!("{:.6}", value).replace('.', "-")
}

/// `<event>_<observer>_<telescope>_<time>_<filter>_UNSTACK_1x<exp>s_<ra>_<dec>.fits`
pub fn export_filename(info: &FrameInfo, observer_name: &str) -> String {
    format!(
        "{}.fits",
        [
            info.event_name.clone(),
            observer_name.to_string(),
            info.telescope.to_string(),
            info.observed_at.format("%Y-%m-%dT%H-%M-%S").to_string(),
            info.filter.clone(),
            "UNSTACK".to_string(),
            format!("1x{}s", info.exposure_s.trunc() as i64),
            coordinate_token(info.ra),
            coordinate_token(info.dec),
        ]
        .join("_")
    )
}

/// Add the collaboration keywords to a frame header.
pub fn annotate_header(header: &mut FitsHeader, info: &FrameInfo, observer_name: &str) {
    header.set("USERNAME", FitsValue::Str(observer_name.to_string()));
    header.set("INSTRU", FitsValue::Str(info.telescope.to_string()));
    header.set("OBSDATE", FitsValue::Str(info.date_obs.clone()));
    header.set("TARGET", FitsValue::Str(info.event_name.clone()));
    header.set("TILEID", FitsValue::Int(info.tile_id));
    header.set("STACK", FitsValue::Int(0));
}

/// Export one frame into `<output_dir>/<event>/`.
pub fn export_file(path: &Path, options: &ExportConfig) -> Result<ExportOutcome> {
    let (mut header, data) =
        read_fits_file(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let Some(info) =
        frame_info(&header).with_context(|| format!("Unusable header in {}", path.display()))?
    else {
        return Ok(ExportOutcome::NotPlanFrame);
    };

    let out_dir = options.output_dir.join(&info.event_name);
    let out_path = out_dir.join(export_filename(&info, &options.observer_name));
    if out_path.exists() && !options.replace {
        info!("{} already exported", path.display());
        return Ok(ExportOutcome::AlreadyExported(out_path));
    }

    annotate_header(&mut header, &info, &options.observer_name);
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    write_fits_file(&out_path, &header, &data)
        .with_context(|| format!("Failed to write {}", out_path.display()))?;

    info!("{} -> {}", path.display(), out_path.display());
    Ok(ExportOutcome::Written(out_path))
}
