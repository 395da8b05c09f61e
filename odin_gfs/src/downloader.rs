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

//! the session object: `open` creates the scratch directory and output writers, `download` resolves
//! the mirror, seeds the retry queue, spawns one worker per resolved IP and supervises them against
//! a wall-clock deadline, `close` publishes or discards the outputs and reclaims the scratch
//! directory. `run` drives all three and guarantees `close` executes exactly once regardless of how
//! `download` ends.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use chrono::{DateTime,Utc};
use futures::FutureExt;
use rand::Rng;
use tokio::sync::{Mutex,mpsc};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use odin_common::datetime::hours;
use odin_common::fs::ensure_dir;

use crate::{DatasetTime,GfsConfig,GfsDataSetConfig,remote_filename,remote_dir_path};
use crate::errors::{GfsError,Result};
use crate::dataset::{Dataset,DatasetAxes,Checklist};
use crate::queue::{RetryQueue,FileRequest};
use crate::unpacker::GribUnpacker;
use crate::worker::{Worker,CompletionState};

/// one attempt to acquire a complete dataset-time, from `open` to `close`.
pub struct Downloader {
    config: GfsConfig,
    ds_config: GfsDataSetConfig,
    directory: PathBuf,
    ds_time: DatasetTime,
    write_dataset: bool,
    write_gribmirror: bool,
    unpacker: Arc<dyn GribUnpacker>,
    deadline: DateTime<Utc>,

    tmp_dir: Option<PathBuf>,
    dataset: Option<Arc<Dataset>>,
    gribmirror: Option<Arc<Mutex<tokio::fs::File>>>,
    checklist: Option<Arc<Mutex<Checklist>>>,
    pub success: bool,
}

impl Downloader {
    /// `deadline` default is `max(now + 2h, ds_time + 6h)` - see DESIGN.md for why this shape is
    /// preserved rather than simplified to a single fixed slack.
    pub fn new (
        config: GfsConfig,
        ds_config: GfsDataSetConfig,
        directory: impl Into<PathBuf>,
        ds_time: DatasetTime,
        write_dataset: bool,
        write_gribmirror: bool,
        unpacker: Arc<dyn GribUnpacker>,
    ) -> Self {
        let now = Utc::now();
        let deadline = std::cmp::max( now + hours(2), ds_time + hours(6));
        Downloader {
            config, ds_config, directory: directory.into(), ds_time, write_dataset, write_gribmirror, unpacker, deadline,
            tmp_dir: None, dataset: None, gribmirror: None, checklist: None, success: false,
        }
    }

    pub fn with_deadline (mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn ds_time (&self) -> DatasetTime { self.ds_time }

    /// create the scratch directory and output writers. Refuses if neither output is requested.
    /// The scratch directory is created *before* any subsequent fallible step so `close` can always
    /// reclaim it, even if a later step in `open` itself fails.
    pub async fn open (&mut self) -> Result<()> {
        if !self.write_dataset && !self.write_gribmirror {
            return Err(GfsError::NoOutputRequested);
        }

        let suffix: u32 = rand::rng().random();
        let tmp_dir = self.directory.join( format!("download.{:08x}", suffix));
        ensure_dir(&tmp_dir)?;
        #[cfg(unix)] {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp_dir, std::fs::Permissions::from_mode(0o775))?;
        }
        self.tmp_dir = Some(tmp_dir.clone());

        let axes = DatasetAxes::from( &self.ds_config);
        self.checklist = Some( Arc::new( Mutex::new( Checklist::new( axes.clone()))));

        if self.write_dataset {
            self.dataset = Some( Arc::new( Dataset::create( &tmp_dir, &self.ds_time, axes)?));
        }

        if self.write_gribmirror {
            let path = Dataset::filename( &tmp_dir, &self.ds_time, ".gribmirror");
            let file = tokio::fs::OpenOptions::new().create(true).write(true).truncate(true).open(&path).await?;
            self.gribmirror = Some( Arc::new( Mutex::new(file)));
        }

        Ok(())
    }

    /// resolve the mirror, seed the queue, spawn one worker per address, and supervise them against
    /// `self.deadline`. On return the session's outcome is fully determined: `Ok(())` only if the
    /// checklist ended up fully set.
    pub async fn download (&mut self) -> Result<()> {
        let now = Utc::now();
        if self.deadline <= now {
            return Err(GfsError::DeadlinePassed);
        }

        let addrs = resolve_host( &self.config.host).await?;
        if addrs.is_empty() {
            return Err(GfsError::NoAddresses( self.config.host.clone()));
        }
        tracing::info!( host = %self.config.host, count = addrs.len(), "resolved mirror addresses");

        let remote_dir = remote_dir_path( &self.config.dir_path_pattern, &self.ds_time);

        let queue = Arc::new( RetryQueue::new());
        for &hour in &self.ds_config.hours {
            for is_b_suffix in [false,true] {
                let filename = remote_filename( &self.ds_time, hour, is_b_suffix);
                queue.put( FileRequest::new( hour, filename)).await;
            }
        }
        let files_count = self.ds_config.hours.len() * 2;

        let completion = Arc::new( CompletionState::new( files_count));
        let cancel = CancellationToken::new();
        let (error_tx, mut error_rx) = mpsc::channel::<GfsError>( addrs.len().max(1));

        let tmp_dir = self.tmp_dir.clone().expect("open() must run before download()");
        let checklist = self.checklist.clone().expect("open() must run before download()");

        let mut handles = Vec::with_capacity( addrs.len());
        for addr in &addrs {
            let worker = Worker {
                addr: *addr,
                queue: queue.clone(),
                completion: completion.clone(),
                dataset: self.dataset.clone(),
                checklist: checklist.clone(),
                gribmirror: self.gribmirror.clone(),
                unpacker: self.unpacker.clone(),
                tmp_dir: tmp_dir.clone(),
                host: self.config.host.clone(),
                remote_dir: remote_dir.clone(),
                timeout: self.config.timeout,
                first_file_timeout: self.config.first_file_timeout,
                max_backoff: self.config.max_backoff,
                cancel: cancel.clone(),
            };
            // `Worker::run` never returns voluntarily (see worker.rs); catch a panic here so a
            // raising worker surfaces on `error_rx` per §5 ("the supervisor receives that
            // exception") instead of just silently vanishing from the pool.
            let addr = *addr;
            let watch_tx = error_tx.clone();
            handles.push( tokio::spawn( async move {
                if let Err(panic) = AssertUnwindSafe( worker.run()).catch_unwind().await {
                    let msg = panic_message(&panic);
                    let _ = watch_tx.send( GfsError::OpFailed( format!("worker for {addr} panicked: {msg}"))).await;
                }
            }));
        }
        drop(error_tx); // supervisor's clone; channel closes once every worker's clone also drops

        let total_timeout = (self.deadline - Utc::now()).to_std().unwrap_or( std::time::Duration::ZERO);

        enum Outcome { Completed, TimedOut, WorkerError(GfsError) }

        let outcome = tokio::select! {
            _ = completion.notify.notified() => Outcome::Completed,
            _ = tokio::time::sleep( total_timeout) => Outcome::TimedOut,
            Some(err) = error_rx.recv() => Outcome::WorkerError(err),
        };

        cancel.cancel();
        queue.close().await;
        for h in handles { let _ = h.await; }

        match outcome {
            Outcome::WorkerError(err) => Err(err),
            Outcome::TimedOut => Err(GfsError::Timeout),
            Outcome::Completed => {
                let cl = checklist.lock().await;
                if cl.all() {
                    self.success = true;
                    Ok(())
                } else {
                    Err(GfsError::Incomplete( cl.missing(), cl.capacity()))
                }
            }
        }
    }

    /// close writers, publish or discard outputs, and remove the scratch directory. Idempotent -
    /// a second call (after the scratch directory has already been reclaimed) is a no-op.
    pub async fn close (&mut self, move_files: bool) -> Result<()> {
        if let Some(ds) = self.dataset.take() {
            if let Err(e) = ds.flush() {
                warn!( error = %e, "failed to flush dataset mmap");
            }
        }
        self.gribmirror.take();
        self.checklist = None;

        let Some(tmp_dir) = self.tmp_dir.take() else { return Ok(()); };

        for suffix in ["", ".gribmirror"] {
            let src = Dataset::filename( &tmp_dir, &self.ds_time, suffix);
            if !src.is_file() { continue; }

            if move_files {
                let dst = Dataset::filename( &self.directory, &self.ds_time, suffix);
                tokio::fs::rename( &src, &dst).await?;
            } else {
                tokio::fs::remove_file( &src).await?;
            }
        }

        if let Ok(mut entries) = tokio::fs::read_dir( &tmp_dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                warn!( path = ?entry.path(), "removing stray file left in scratch directory");
                let _ = tokio::fs::remove_file( entry.path()).await;
            }
        }
        let _ = tokio::fs::remove_dir( &tmp_dir).await;

        Ok(())
    }

    /// drive `open` -> `download` -> `close` as one session; `close` always runs, success or failure.
    pub async fn run (&mut self) -> Result<()> {
        if let Err(e) = self.open().await {
            let _ = self.close(false).await;
            return Err(e);
        }

        let result = self.download().await;
        let close_result = self.close( result.is_ok()).await;
        result?;
        close_result
    }
}

fn panic_message (payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() { s.to_string() }
    else if let Some(s) = payload.downcast_ref::<String>() { s.clone() }
    else { "non-string panic payload".to_string() }
}

async fn resolve_host (host: &str) -> Result<Vec<std::net::SocketAddr>> {
    use tokio::net::lookup_host;
    let addrs: Vec<_> = lookup_host( format!("{host}:80")).await
        .map_err( GfsError::IOError)?
        .collect();
    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unpacker::SimpleGribUnpacker;

    fn test_config() -> (GfsConfig,GfsDataSetConfig) {
        let mut cfg = GfsConfig::default();
        cfg.host = "127.0.0.1".to_string(); // resolves trivially, no workers will be contacted in these tests
        let ds_cfg = GfsDataSetConfig { hours: vec![0], pressures: vec![1000], variables: vec!["UGRD".into()], ny: 1, nx: 1 };
        (cfg, ds_cfg)
    }

    #[test]
    fn panic_message_downcasts_common_payload_shapes() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!( panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!( panic_message(boxed.as_ref()), "kaboom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(42i32);
        assert_eq!( panic_message(boxed.as_ref()), "non-string panic payload");
    }

    #[tokio::test]
    async fn open_refuses_when_no_output_requested() {
        let (cfg,ds_cfg) = test_config();
        let dir = tempfile::tempdir().unwrap();
        let mut dl = Downloader::new( cfg, ds_cfg, dir.path(), Utc::now(), false, false, Arc::new(SimpleGribUnpacker::new()));
        let err = dl.open().await.unwrap_err();
        assert!( matches!(err, GfsError::NoOutputRequested));
    }

    #[tokio::test]
    async fn download_fails_immediately_if_deadline_already_passed() {
        let (cfg,ds_cfg) = test_config();
        let dir = tempfile::tempdir().unwrap();
        let ds_time = Utc::now();
        let mut dl = Downloader::new( cfg, ds_cfg, dir.path(), ds_time, true, false, Arc::new(SimpleGribUnpacker::new()))
            .with_deadline( Utc::now() - chrono::Duration::seconds(1));
        dl.open().await.unwrap();
        let err = dl.download().await.unwrap_err();
        assert!( matches!(err, GfsError::DeadlinePassed));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (cfg,ds_cfg) = test_config();
        let dir = tempfile::tempdir().unwrap();
        let mut dl = Downloader::new( cfg, ds_cfg, dir.path(), Utc::now(), true, false, Arc::new(SimpleGribUnpacker::new()));
        dl.open().await.unwrap();
        dl.close(false).await.unwrap();
        dl.close(false).await.unwrap(); // no-op, no error
    }

    #[tokio::test]
    async fn failed_session_leaves_no_published_files_and_removes_scratch_dir() {
        let (cfg,ds_cfg) = test_config();
        let dir = tempfile::tempdir().unwrap();
        let ds_time = Utc::now();
        let mut dl = Downloader::new( cfg, ds_cfg, dir.path(), ds_time, true, true, Arc::new(SimpleGribUnpacker::new()));
        dl.open().await.unwrap();
        let tmp_dir = dl.tmp_dir.clone().unwrap();
        assert!( tmp_dir.is_dir());

        dl.close(false).await.unwrap();

        assert!( !tmp_dir.exists());
        assert!( !Dataset::filename( dir.path(), &ds_time, "").exists());
        assert!( !Dataset::filename( dir.path(), &ds_time, ".gribmirror").exists());
    }
}
