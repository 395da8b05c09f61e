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

//! one worker per resolved mirror IP: drains the retry queue, fetches into a temp file, invokes
//! the unpacker, and applies per-server exponential backoff on failure. Never exits voluntarily -
//! only cancellation or the queue closing ends the loop.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize,AtomicBool,Ordering};
use std::time::Instant;

use tokio::sync::{Mutex,Notify};
use tokio_util::sync::CancellationToken;
use tracing::{info,warn,error,debug};

use crate::errors::TransientError;
use crate::http_client::HttpClient;
use crate::queue::{RetryQueue,FileRequest};
use crate::dataset::{Dataset,Checklist};
use crate::unpacker::GribUnpacker;

/// per-server exponential backoff state, one instance per worker (one worker per server IP).
#[derive(Default)]
pub struct ServerBackoff {
    current: u32,
    max: u32,
}

impl ServerBackoff {
    pub fn new (max: u32) -> Self { ServerBackoff { current: 0, max } }

    pub fn current (&self) -> u32 { self.current }

    pub fn reset (&mut self) { self.current = 0; }

    /// Timeout outcome: jump the backoff immediately past the timeout itself so a slow mirror
    /// isn't probed faster than it can respond.
    pub fn bump_for_timeout (&mut self, timeout_secs: u64) -> std::time::Duration {
        let min_k = (64 - (timeout_secs.max(1)).leading_zeros()) + 1; // ceil(log2(timeout))+1
        let k = self.current.max(min_k);
        self.current = k.min(self.max);
        std::time::Duration::from_secs( 1u64 << self.current)
    }

    /// any other transient failure: one more notch of backoff.
    pub fn bump_for_error (&mut self) -> std::time::Duration {
        self.current = (self.current + 1).min(self.max);
        std::time::Duration::from_secs( 1u64 << self.current)
    }
}

/// shared session state a worker reports completion into.
pub struct CompletionState {
    pub files_complete: AtomicUsize,
    pub files_count: usize,
    pub have_first_file: AtomicBool,
    pub notify: Notify,
}

impl CompletionState {
    pub fn new (files_count: usize) -> Self {
        CompletionState {
            files_complete: AtomicUsize::new(0),
            files_count,
            have_first_file: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    fn mark_complete (&self) {
        self.have_first_file.store(true, Ordering::SeqCst);
        let n = self.files_complete.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= self.files_count {
            // notify_one (not notify_waiters): stores a permit if the supervisor hasn't called
            // `notified()` yet, so completion racing ahead of the supervisor's await isn't lost.
            self.notify.notify_one();
        }
    }
}

pub struct Worker {
    pub addr: SocketAddr,
    pub queue: Arc<RetryQueue>,
    pub completion: Arc<CompletionState>,
    pub dataset: Option<Arc<Dataset>>,
    pub checklist: Arc<Mutex<Checklist>>,
    pub gribmirror: Option<Arc<Mutex<tokio::fs::File>>>,
    pub unpacker: Arc<dyn GribUnpacker>,
    pub tmp_dir: PathBuf,
    pub host: String,
    /// the formatted remote directory (`dir_path_pattern` with `{0}` interpolated to this
    /// session's dataset-time), trailing slash guaranteed - prepended directly to a filename.
    pub remote_dir: String,
    pub timeout: std::time::Duration,
    pub first_file_timeout: std::time::Duration,
    pub max_backoff: u32,
    pub cancel: CancellationToken,
}

impl Worker {
    pub async fn run (mut self) {
        let mut client = HttpClient::new( self.addr, self.host.clone());
        let mut backoff = ServerBackoff::new( self.max_backoff);
        let span = tracing::info_span!("worker", ip = %self.addr);
        let _enter = span.enter();

        loop {
            let req = tokio::select! {
                _ = self.cancel.cancelled() => break,
                req = self.queue.take() => match req {
                    Some(req) => req,
                    None => break, // queue closed - session is tearing down
                },
            };

            let now = Instant::now();
            if req.not_before > now {
                client.close(); // don't hold a connection idle across a long sleep
                let wait = req.not_before - now;
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {},
                }
            }

            let have_first = self.completion.have_first_file.load(Ordering::SeqCst);

            // the per-file attempt is always bounded by `timeout` (default 120s); `first_file_timeout`
            // (600s) only governs how far out a 404 gets re-enqueued (below), not how long we wait
            // on the socket for this attempt.
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => break,
                res = tokio::time::timeout( self.timeout, self.attempt(&mut client, &req)) => res,
            };

            match outcome {
                Ok(Ok(())) => {
                    backoff.reset();
                    self.completion.mark_complete();
                    debug!( file = %req.filename, "download complete");
                }
                Ok(Err(TransientError::NotFound)) => {
                    let offset = if have_first { self.timeout } else { self.first_file_timeout };
                    info!( file = %req.filename, "not found yet, retrying in {:?}", offset);
                    self.requeue( req, offset).await;
                    // no server-backoff penalty - yield so another worker/IP tries sooner
                }
                Ok(Err(e)) => {
                    let sleep = backoff.bump_for_error();
                    self.log_failure( &req, &e, backoff.current(), sleep);
                    self.requeue( req, std::time::Duration::ZERO).await;
                    self.sleep_or_cancel( sleep).await;
                }
                Err(_elapsed) => {
                    // the in-flight request on `client`'s connection was abandoned mid-read; its
                    // state is unknown, so drop it rather than risk reusing a half-written stream.
                    client.close();
                    let sleep = backoff.bump_for_timeout( self.timeout.as_secs());
                    self.log_failure( &req, &TransientError::TimedOut, backoff.current(), sleep);
                    self.requeue( req, std::time::Duration::ZERO).await;
                    self.sleep_or_cancel( sleep).await;
                }
            }

            if self.cancel.is_cancelled() { break; }
        }
    }

    async fn requeue (&self, req: FileRequest, offset: std::time::Duration) {
        let not_before = Instant::now() + offset;
        self.queue.put( FileRequest::with_not_before( req.hour, not_before, req.filename)).await;
    }

    async fn sleep_or_cancel (&self, dur: std::time::Duration) {
        tokio::select! {
            _ = self.cancel.cancelled() => {},
            _ = tokio::time::sleep(dur) => {},
        }
    }

    fn log_failure (&self, req: &FileRequest, err: &TransientError, backoff: u32, sleep: std::time::Duration) {
        if backoff >= 5 {
            error!( file = %req.filename, ip = %self.addr, backoff, ?sleep, error = ?err, "persistent failure");
        } else {
            warn!( file = %req.filename, ip = %self.addr, backoff, ?sleep, "{}", err);
        }
    }

    async fn attempt (&self, client: &mut HttpClient, req: &FileRequest) -> Result<(),TransientError> {
        use tokio::io::AsyncWriteExt;

        let mut tmp_path = self.tmp_dir.clone();
        tmp_path.push( format!("{}.part", req.filename));

        {
            let mut file = tokio::fs::File::create( &tmp_path).await?;
            let remote_path = format!("{}{}", self.remote_dir, req.filename);
            client.get_into( &remote_path, &mut file).await?;
            file.flush().await?;
        }

        let result = self.unpacker.unpack( &tmp_path, self.dataset.as_deref(), &self.checklist, self.gribmirror.clone(), req.hour).await;
        let _ = tokio::fs::remove_file( &tmp_path).await; // payload now lives in Dataset/gribmirror; ignore ENOENT races

        result.map_err( |e| TransientError::Decode( e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_backoff_jumps_past_timeout_itself() {
        let mut b = ServerBackoff::new(10);
        let d = b.bump_for_timeout(120); // ceil(log2(120))+1 == 8
        assert_eq!( b.current(), 8);
        assert_eq!( d, std::time::Duration::from_secs(256));
    }

    #[test]
    fn other_error_backoff_increments_by_one() {
        let mut b = ServerBackoff::new(10);
        b.bump_for_error();
        assert_eq!( b.current(), 1);
        let d = b.bump_for_error();
        assert_eq!( b.current(), 2);
        assert_eq!( d, std::time::Duration::from_secs(4));
    }

    #[test]
    fn backoff_is_capped() {
        let mut b = ServerBackoff::new(3);
        for _ in 0..10 { b.bump_for_error(); }
        assert_eq!( b.current(), 3);
    }

    #[test]
    fn reset_clears_backoff() {
        let mut b = ServerBackoff::new(10);
        b.bump_for_error();
        b.bump_for_error();
        b.reset();
        assert_eq!( b.current(), 0);
    }

    #[test]
    fn completion_state_notifies_at_exact_count() {
        let state = CompletionState::new(2);
        assert_eq!( state.files_complete.load(Ordering::SeqCst), 0);
        state.mark_complete();
        assert_eq!( state.files_complete.load(Ordering::SeqCst), 1);
        assert!( state.have_first_file.load(Ordering::SeqCst));
        state.mark_complete();
        assert_eq!( state.files_complete.load(Ordering::SeqCst), 2);
    }
}
