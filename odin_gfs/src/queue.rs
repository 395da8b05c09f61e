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

//! priority retry queue of pending file requests, ordered by (hour, not_before). `take` blocks
//! until an item is available or the queue is closed; `put` never blocks. A closed queue wakes
//! every blocked taker with `None` so no worker can block past session teardown.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;
use tokio::sync::{Mutex,Notify};

#[derive(Clone,Debug,PartialEq,Eq)]
pub struct FileRequest {
    pub hour: u32,
    pub not_before: Instant,
    pub filename: String,
}

impl FileRequest {
    pub fn new (hour: u32, filename: impl Into<String>) -> Self {
        FileRequest { hour, not_before: Instant::now(), filename: filename.into() }
    }

    pub fn with_not_before (hour: u32, not_before: Instant, filename: impl Into<String>) -> Self {
        FileRequest { hour, not_before, filename: filename.into() }
    }
}

// order so the BinaryHeap (a max-heap) yields the request with smallest (hour, not_before) first
impl Ord for FileRequest {
    fn cmp (&self, other: &Self) -> std::cmp::Ordering {
        Reverse((self.hour, self.not_before)).cmp( &Reverse((other.hour, other.not_before)))
    }
}
impl PartialOrd for FileRequest {
    fn partial_cmp (&self, other: &Self) -> Option<std::cmp::Ordering> { Some( self.cmp(other)) }
}

struct State {
    heap: BinaryHeap<FileRequest>,
    closed: bool,
}

/// multi-producer/multi-consumer priority queue. Cloning shares the underlying state (it's an `Arc`
/// internally via the caller holding it behind `Arc<RetryQueue>`, matching how the Downloader hands
/// out a shared reference to every worker).
pub struct RetryQueue {
    state: Mutex<State>,
    notify: Notify,
}

impl RetryQueue {
    pub fn new() -> Self {
        RetryQueue {
            state: Mutex::new( State { heap: BinaryHeap::new(), closed: false }),
            notify: Notify::new(),
        }
    }

    /// non-blocking enqueue.
    pub async fn put (&self, req: FileRequest) {
        let mut state = self.state.lock().await;
        if state.closed { return; }
        state.heap.push(req);
        self.notify.notify_one();
    }

    /// blocks until an item is available or the queue is closed, in which case `None` is returned.
    /// Does not itself wait out `not_before` - the caller is expected to sleep on the difference.
    pub async fn take (&self) -> Option<FileRequest> {
        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(req) = state.heap.pop() {
                    return Some(req);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// wake every blocked taker with a close signal; subsequent `put`s are dropped.
    pub async fn close (&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        self.notify.notify_waiters();
    }

    pub async fn len (&self) -> usize {
        self.state.lock().await.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn drains_in_hour_then_not_before_order() {
        let q = RetryQueue::new();
        let now = Instant::now();
        q.put( FileRequest::with_not_before(6, now + Duration::from_secs(5), "b")).await;
        q.put( FileRequest::with_not_before(0, now, "a")).await;
        q.put( FileRequest::with_not_before(6, now, "c")).await;

        assert_eq!( q.take().await.unwrap().filename, "a");
        assert_eq!( q.take().await.unwrap().filename, "c");
        assert_eq!( q.take().await.unwrap().filename, "b");
    }

    #[tokio::test]
    async fn take_blocks_until_put_then_wakes() {
        let q = std::sync::Arc::new( RetryQueue::new());
        let q2 = q.clone();

        let handle = tokio::spawn( async move { q2.take().await });
        tokio::time::sleep( Duration::from_millis(20)).await;
        q.put( FileRequest::new(0, "late")).await;

        let req = tokio::time::timeout( Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert_eq!( req.unwrap().filename, "late");
    }

    #[tokio::test]
    async fn close_wakes_blocked_takers_with_none() {
        let q = std::sync::Arc::new( RetryQueue::new());
        let q2 = q.clone();
        let handle = tokio::spawn( async move { q2.take().await });

        tokio::time::sleep( Duration::from_millis(20)).await;
        q.close().await;

        let req = tokio::time::timeout( Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert!( req.is_none());
    }
}
