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

//! the perpetual scheduler: wakes at the expected publication time of the next dataset-time,
//! invokes a `Downloader` session, prunes old artifacts, and repeats. Session failures are logged
//! and swallowed so the daemon survives a bad cycle; operator signals propagate out immediately.

use std::path::PathBuf;
use std::sync::Arc;
use chrono::{DateTime,Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info,warn,error};
use odin_action::{async_trait,DynDataRefAction,DynDataRefActionTrait,OdinActionError};

use odin_common::datetime::hours;

use crate::{DatasetTime,GfsConfig,GfsDataSetConfig,PUBLICATION_LAG,latest_publishable_dataset_time,fmt_path_date};
use crate::errors::{Result,GfsError};
use crate::dataset::Dataset;
use crate::downloader::Downloader;
use crate::unpacker::GribUnpacker;

/// invoked with every unrecoverable session failure; the CLI wires `--email-exceptions` to one that
/// logs the notice (see DESIGN.md for why SMTP dispatch itself is out of scope).
pub type AlertSink = DynDataRefAction<GfsError>;

#[derive(Debug)]
struct NoAlert;

#[async_trait]
impl DynDataRefActionTrait<GfsError> for NoAlert {
    async fn execute (&self, _data: &GfsError) -> std::result::Result<(),OdinActionError> { Ok(()) }
}

pub fn no_alert () -> AlertSink { Box::new(NoAlert) }

pub struct Daemon {
    config: GfsConfig,
    ds_config: GfsDataSetConfig,
    directory: PathBuf,
    num_datasets: usize,
    write_dataset: bool,
    write_gribmirror: bool,
    unpacker: Arc<dyn GribUnpacker>,
    alert: AlertSink,
}

impl Daemon {
    pub fn new (
        config: GfsConfig,
        ds_config: GfsDataSetConfig,
        directory: impl Into<PathBuf>,
        num_datasets: usize,
        write_dataset: bool,
        write_gribmirror: bool,
        unpacker: Arc<dyn GribUnpacker>,
        alert: AlertSink,
    ) -> Self {
        Daemon { config, ds_config, directory: directory.into(), num_datasets, write_dataset, write_gribmirror, unpacker, alert }
    }

    /// enumerate artifacts under `directory`; by dataset-time descending, keep the most recent
    /// `num_datasets`, unlinking all files (dataset + gribmirror) of every non-kept artifact.
    /// Returns the newest retained dataset-time, or `None` if the directory held none.
    pub fn clean (&self) -> Result<Option<DatasetTime>> {
        let mut found = Dataset::listdir( &self.directory)?;
        found.sort_by( |a,b| b.0.cmp(&a.0)); // descending by dataset-time

        let newest_kept = found.first().map(|(dt,_)| *dt);

        for (dt, _path) in found.iter().skip( self.num_datasets) {
            for suffix in ["", ".gribmirror"] {
                let p = Dataset::filename( &self.directory, dt, suffix);
                if p.is_file() {
                    if let Err(e) = std::fs::remove_file(&p) {
                        warn!( path = ?p, error = %e, "failed to remove stale dataset file");
                    }
                }
            }
        }

        Ok( if self.num_datasets == 0 { None } else { newest_kept })
    }

    fn next_target (retained: Option<DatasetTime>, now: DateTime<Utc>) -> DatasetTime {
        let latest = latest_publishable_dataset_time(&now);
        match retained {
            None => latest,
            Some(r) if r < latest => latest,
            Some(r) => r + hours(6),
        }
    }

    /// run the perpetual cycle until `cancel` fires. Each iteration: sleep until the target's
    /// expected publication window, run one Downloader session (logged, never propagated), sweep
    /// retention, advance the target by 6h.
    pub async fn run (&self, cancel: CancellationToken) -> Result<()> {
        let retained = self.clean()?;
        let mut target = Self::next_target( retained, Utc::now());

        loop {
            let wake_at = target + PUBLICATION_LAG;
            let wait = (wake_at - Utc::now()).to_std().unwrap_or( std::time::Duration::ZERO);

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(wait) => {},
            }
            if cancel.is_cancelled() { return Ok(()); }

            info!( ds_time = %fmt_path_date(&target), "starting download session");
            let mut dl = Downloader::new(
                self.config.clone(), self.ds_config.clone(), &self.directory, target,
                self.write_dataset, self.write_gribmirror, self.unpacker.clone(),
            );

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                result = dl.run() => match result {
                    Ok(()) => info!( ds_time = %fmt_path_date(&target), "session succeeded"),
                    Err(e) => {
                        error!( ds_time = %fmt_path_date(&target), error = %e, "session failed, continuing to next cycle");
                        let _ = self.alert.execute(&e).await;
                    }
                },
            }

            if let Err(e) = self.clean() {
                warn!( error = %e, "retention sweep failed");
            }

            target = target + hours(6);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn latest_publishable_subtracts_lag_and_floors_to_six_hours() {
        // 14:37 minus 3h30m = 11:07, floored to the hour = 11:00, floored to a 6h grid point = 06:00
        let now = Utc.with_ymd_and_hms(2026,7,28,14,37,0).unwrap();
        let lp = latest_publishable_dataset_time(&now);
        assert_eq!( lp, Utc.with_ymd_and_hms(2026,7,28,6,0,0).unwrap());
    }

    #[test]
    fn next_target_is_latest_publishable_when_nothing_retained() {
        let now = Utc.with_ymd_and_hms(2026,7,28,14,37,0).unwrap();
        let target = Daemon::next_target(None, now);
        assert_eq!( target, latest_publishable_dataset_time(&now));
    }

    #[test]
    fn next_target_advances_by_six_hours_when_retained_is_current() {
        let now = Utc.with_ymd_and_hms(2026,7,28,14,37,0).unwrap();
        let latest = latest_publishable_dataset_time(&now);
        let target = Daemon::next_target( Some(latest), now);
        assert_eq!( target, latest + hours(6));
    }

    #[test]
    fn next_target_catches_up_when_retained_is_stale() {
        let now = Utc.with_ymd_and_hms(2026,7,28,14,37,0).unwrap();
        let stale = Utc.with_ymd_and_hms(2026,7,20,0,0,0).unwrap();
        let target = Daemon::next_target( Some(stale), now);
        assert_eq!( target, latest_publishable_dataset_time(&now));
    }

    #[test]
    fn clean_keeps_newest_n_and_deletes_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let times = [
            Utc.with_ymd_and_hms(2024,1,1,0,0,0).unwrap(),
            Utc.with_ymd_and_hms(2024,1,1,6,0,0).unwrap(),
            Utc.with_ymd_and_hms(2024,1,1,12,0,0).unwrap(),
        ];
        for t in &times {
            std::fs::write( Dataset::filename( dir.path(), t, ""), b"x").unwrap();
            std::fs::write( Dataset::filename( dir.path(), t, ".gribmirror"), b"x").unwrap();
        }

        let daemon = Daemon::new(
            GfsConfig::default(), GfsDataSetConfig::default(), dir.path(), 2, true, true,
            Arc::new( crate::unpacker::SimpleGribUnpacker::new()), no_alert(),
        );
        let newest = daemon.clean().unwrap();
        assert_eq!( newest, Some(times[2]));

        assert!( !Dataset::filename( dir.path(), &times[0], "").exists());
        assert!( !Dataset::filename( dir.path(), &times[0], ".gribmirror").exists());
        assert!( Dataset::filename( dir.path(), &times[1], "").exists());
        assert!( Dataset::filename( dir.path(), &times[2], "").exists());
    }

    #[test]
    fn clean_twice_in_a_row_is_a_no_op_on_the_second_run() {
        let dir = tempfile::tempdir().unwrap();
        let t = Utc.with_ymd_and_hms(2024,1,1,0,0,0).unwrap();
        std::fs::write( Dataset::filename( dir.path(), &t, ""), b"x").unwrap();

        let daemon = Daemon::new(
            GfsConfig::default(), GfsDataSetConfig::default(), dir.path(), 1, true, false,
            Arc::new( crate::unpacker::SimpleGribUnpacker::new()), no_alert(),
        );
        let first = daemon.clean().unwrap();
        let second = daemon.clean().unwrap();
        assert_eq!( first, second);
        assert!( Dataset::filename( dir.path(), &t, "").exists());
    }
}
