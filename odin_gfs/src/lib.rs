/*
 * Copyright © 2024, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */
#![allow(unused)]

use std::path::PathBuf;
use chrono::{DateTime,Datelike,Timelike,Utc};
use serde::{Deserialize,Serialize};
use tokio::time::Duration;

use odin_common::datetime::{self,secs,minutes,hours,full_hour,deserialize_duration};

mod errors;
pub use errors::*;

pub mod http_client;
pub mod queue;
pub mod worker;
pub mod downloader;
pub mod daemon;
pub mod dataset;
pub mod unpacker;

pub use dataset::{Dataset,Checklist,DatasetAxes};
pub use downloader::Downloader;
pub use daemon::Daemon;

/// a UTC instant at a 6-hour grid point (0,6,12,18), minute/second/nanos zeroed.
/// formatted as `YYYYMMDDHH` for remote path interpolation and `t{HH}z` for file prefixes.
pub type DatasetTime = DateTime<Utc>;

/// floor `dt` down to the nearest dataset-time grid point (hour a multiple of 6)
pub fn floor_to_dataset_time (dt: &DateTime<Utc>) -> DatasetTime {
    let fh = full_hour(dt);
    let dh = fh.hour() % 6;
    if dh > 0 { fh - chrono::Duration::hours(dh as i64) } else { fh }
}

/// the empirically observed lag between a dataset-time and the earliest the mirror tends to have
/// published its first files.
pub const PUBLICATION_LAG: chrono::Duration = chrono::Duration::minutes(210);

/// `(now - 3h30m)` floored to the hour, then to the nearest multiple-of-6 hour - the newest
/// dataset-time that is plausibly already published at `now`.
pub fn latest_publishable_dataset_time (now: &DateTime<Utc>) -> DatasetTime {
    floor_to_dataset_time( &(*now - PUBLICATION_LAG))
}

pub fn is_dataset_time (dt: &DateTime<Utc>) -> bool {
    dt.hour() % 6 == 0 && dt.minute() == 0 && dt.second() == 0
}

/// `YYYYMMDDHH`, used to interpolate the remote directory path template
pub fn fmt_path_date (dt: &DatasetTime) -> String {
    format!( "{:04}{:02}{:02}{:02}", dt.year(), dt.month(), dt.day(), dt.hour())
}

/// `gfs.{YYYYMMDDHH}` artifact stem
pub fn fmt_dataset_stem (dt: &DatasetTime) -> String {
    format!( "gfs.{}", fmt_path_date(dt))
}

/// parse a `YYYYMMDDHH` dataset-time, as accepted on the `download` CLI subcommand. Does not
/// require the hour to land on a 6h grid point - an explicit request is taken at face value.
pub fn parse_ds_time (s: &str) -> Option<DatasetTime> {
    use chrono::TimeZone;
    if s.len() != 10 || !s.bytes().all(|b| b.is_ascii_digit()) { return None; }
    let year: i32 = s[0..4].parse().ok()?;
    let month: u32 = s[4..6].parse().ok()?;
    let day: u32 = s[6..8].parse().ok()?;
    let hour: u32 = s[8..10].parse().ok()?;
    Utc.with_ymd_and_hms(year,month,day,hour,0,0).single()
}

/// NOMADS-style remote file basename, e.g. `gfs.t12z.pgrb2f048` / `gfs.t12z.pgrb2bf048`
pub fn remote_filename (dt: &DatasetTime, step: u32, is_b_suffix: bool) -> String {
    let suffix = if is_b_suffix { "bf" } else { "f" };
    format!( "gfs.t{:02}z.pgrb2{}{:02}", dt.hour(), suffix, step)
}

/// interpolate `{0}` in `dir_path_pattern` with `YYYYMMDDHH`, guaranteeing a trailing slash so
/// a worker can prepend it directly to a remote filename - mirrors the original's
/// `os.path.join(dataset_path.format(ds_time_str), filename)`.
pub fn remote_dir_path (dir_path_pattern: &str, dt: &DatasetTime) -> String {
    let mut dir = dir_path_pattern.replace( "{0}", &fmt_path_date(dt));
    if !dir.ends_with('/') { dir.push('/'); }
    dir
}

/// general GFS server / download engine parameters configuration, mirroring `odin_hrrr::HrrrConfig`
#[derive(Clone,Serialize,Deserialize,Debug)]
pub struct GfsConfig {
    /// logical mirror hostname that is resolved to one or more A records
    pub host: String,

    /// directory path template, e.g. "/data/nccf/com/gfs/prod/gfs.{0}/" - "{0}" is replaced with `YYYYMMDDHH`
    pub dir_path_pattern: String,

    /// per-file download timeout
    #[serde(deserialize_with="deserialize_duration")]
    pub timeout: Duration,

    /// per-file timeout used while no file of the session has completed yet (tolerates late publication)
    #[serde(deserialize_with="deserialize_duration")]
    pub first_file_timeout: Duration,

    /// cap on the per-server exponential backoff exponent
    pub max_backoff: u32,

    /// how long to keep downloaded datasets around (daemon retention is primarily driven by `num_datasets`,
    /// this is a secondary age-based sweep mirroring `HrrrConfig::max_age`)
    #[serde(deserialize_with="deserialize_duration")]
    pub max_age: Duration,

    /// number of most-recent datasets the daemon retains on disk
    pub num_datasets: usize,
}

impl Default for GfsConfig {
    fn default() -> Self {
        GfsConfig {
            host: "www.ftp.ncep.noaa.gov".to_string(),
            dir_path_pattern: "/data/nccf/com/gfs/prod/gfs.{0}/".to_string(),
            timeout: secs(120),
            first_file_timeout: secs(600),
            max_backoff: 10,
            max_age: hours(24),
            num_datasets: 2,
        }
    }
}

/// parameters describing the shape of the `Dataset` we assemble, mirroring `odin_hrrr::HrrrDataSetConfig`
#[derive(Clone,Serialize,Deserialize,Debug)]
pub struct GfsDataSetConfig {
    /// forecast hours to retrieve, relative to the dataset-time (the Dataset's hour-axis)
    pub hours: Vec<u32>,

    /// pressure levels (hPa) to retrieve (the Dataset's pressure-axis)
    pub pressures: Vec<u32>,

    /// variable short names (the Dataset's variable-axis)
    pub variables: Vec<String>,

    /// grid shape
    pub ny: usize,
    pub nx: usize,
}

impl Default for GfsDataSetConfig {
    fn default() -> Self {
        GfsDataSetConfig {
            hours: (0..=12).step_by(6).collect(),
            pressures: vec![1000,850,700,500],
            variables: vec!["UGRD".to_string(), "VGRD".to_string()],
            ny: 181,
            nx: 360,
        }
    }
}

/// load a config struct the way sibling ODIN crates do, but without the embedded-resource/BinContext
/// indirection `odin_build::define_load_config!{}` expands into - see DESIGN.md for why.
///
/// Lookup order: `$ODIN_ROOT/configs/odin_gfs/<filename>`, then `$ODIN_ROOT/configs/<filename>`,
/// falling back to `C::default()` if neither exists.
pub fn load_config<C> (filename: &str) -> errors::Result<C>
where C: for<'a> serde::Deserialize<'a> + Default
{
    let root = odin_build::get_or_create_root_dir()?;

    let mut crate_path = root.clone();
    crate_path.push( "configs");
    crate_path.push( "odin_gfs");
    crate_path.push( filename);

    let mut shared_path = root;
    shared_path.push( "configs");
    shared_path.push( filename);

    for path in [crate_path, shared_path] {
        if path.is_file() {
            let data = odin_build::file_contents_as_bytes(&path)?;
            return Ok( ron::de::from_bytes(data.as_slice()).map_err( odin_build::OdinBuildError::from)? )
        }
    }

    Ok( C::default() )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn floors_to_six_hour_grid() {
        let dt = Utc.with_ymd_and_hms(2026,7,28,14,37,12).unwrap();
        let ft = floor_to_dataset_time(&dt);
        assert_eq!( ft.hour(), 12);
        assert_eq!( ft.minute(), 0);
        assert!( is_dataset_time(&ft));
    }

    #[test]
    fn formats_path_date_and_stem() {
        let dt = Utc.with_ymd_and_hms(2026,7,28,12,0,0).unwrap();
        assert_eq!( fmt_path_date(&dt), "2026072812");
        assert_eq!( fmt_dataset_stem(&dt), "gfs.2026072812");
        assert_eq!( remote_filename(&dt, 48, false), "gfs.t12z.pgrb2f48");
        assert_eq!( remote_filename(&dt, 48, true), "gfs.t12z.pgrb2bf48");
    }

    #[test]
    fn remote_dir_path_interpolates_and_keeps_trailing_slash() {
        let dt = Utc.with_ymd_and_hms(2026,7,28,12,0,0).unwrap();
        assert_eq!( remote_dir_path("/data/nccf/com/gfs/prod/gfs.{0}/", &dt), "/data/nccf/com/gfs/prod/gfs.2026072812/");
        assert_eq!( remote_dir_path("/data/nccf/com/gfs/prod/gfs.{0}", &dt), "/data/nccf/com/gfs/prod/gfs.2026072812/");
    }

    #[test]
    fn parses_ds_time_strings() {
        let dt = parse_ds_time("2026072812").unwrap();
        assert_eq!( dt, Utc.with_ymd_and_hms(2026,7,28,12,0,0).unwrap());
        assert!( parse_ds_time("not-a-date").is_none());
        assert!( parse_ds_time("202607281").is_none()); // too short
    }

    #[test]
    fn latest_publishable_is_a_valid_dataset_time() {
        let now = Utc.with_ymd_and_hms(2026,7,28,14,37,0).unwrap();
        let lp = latest_publishable_dataset_time(&now);
        assert!( is_dataset_time(&lp));
    }
}
