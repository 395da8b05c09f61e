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

//! drives a real `Worker` against a loopback mock mirror, standing in for the NOAA mirror a
//! `Downloader` would otherwise resolve on port 80. Exercises the request/retry/backoff loop
//! end to end: request framing, not-found retry, timeout backoff and recovery, and the
//! completion notification the supervisor in `Downloader::download` waits on.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use odin_gfs::dataset::{Checklist, Dataset, DatasetAxes};
use odin_gfs::queue::{FileRequest, RetryQueue};
use odin_gfs::unpacker::{encode_record, SimpleGribUnpacker};
use odin_gfs::worker::{CompletionState, Worker};

enum MockResponse {
    Ok(Vec<u8>),
    NotFound,
    Hang,
}

/// accepts one connection per queued response and replies with an unsized (connection-closing)
/// body, which is what makes `HttpClient` reconnect for the next request without us having to
/// model HTTP keep-alive in the mock.
fn spawn_mock_mirror(listener: TcpListener, responses: Vec<MockResponse>) {
    let responses = Arc::new(Mutex::new(VecDeque::from(responses)));
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else { return };
            let responses = responses.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                let _ = sock.read(&mut buf).await; // drain the request line and headers

                match responses.lock().await.pop_front() {
                    Some(MockResponse::Ok(body)) => {
                        let _ = sock.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await;
                        let _ = sock.write_all(&body).await;
                        // dropping `sock` here closes the connection, ending the unsized body
                    }
                    Some(MockResponse::NotFound) => {
                        let _ = sock.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n").await;
                    }
                    Some(MockResponse::Hang) | None => {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                }
            });
        }
    });
}

fn single_slot_axes() -> DatasetAxes {
    DatasetAxes { hours: vec![0], pressures: vec![1000], variables: vec!["UGRD".into()], ny: 1, nx: 1 }
}

fn test_worker(
    addr: std::net::SocketAddr,
    queue: Arc<RetryQueue>,
    completion: Arc<CompletionState>,
    dataset: Option<Arc<Dataset>>,
    checklist: Arc<Mutex<Checklist>>,
    tmp_dir: std::path::PathBuf,
    cancel: CancellationToken,
    timeout: Duration,
    max_backoff: u32,
) -> Worker {
    Worker {
        addr,
        queue,
        completion,
        dataset,
        checklist,
        gribmirror: None,
        unpacker: Arc::new(SimpleGribUnpacker::new()),
        tmp_dir,
        host: "mock-mirror".to_string(),
        remote_dir: "/".to_string(),
        timeout,
        first_file_timeout: timeout,
        max_backoff,
        cancel,
    }
}

#[tokio::test]
async fn worker_completes_session_against_loopback_mirror() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let record = encode_record(0, 1000, 0, &[42.0]);
    spawn_mock_mirror(listener, vec![MockResponse::Ok(record.clone()), MockResponse::Ok(record)]);

    let dir = tempfile::tempdir().unwrap();
    let axes = single_slot_axes();
    let dataset = Arc::new(Dataset::create(dir.path(), &chrono::Utc::now(), axes.clone()).unwrap());
    let checklist = Arc::new(Mutex::new(Checklist::new(axes)));
    let queue = Arc::new(RetryQueue::new());
    queue.put(FileRequest::new(0, "gfs.t00z.pgrb2f00")).await;
    queue.put(FileRequest::new(0, "gfs.t00z.pgrb2bf00")).await;

    let completion = Arc::new(CompletionState::new(2));
    let cancel = CancellationToken::new();

    let worker = test_worker(
        addr, queue.clone(), completion.clone(), Some(dataset), checklist.clone(),
        dir.path().to_path_buf(), cancel.clone(), Duration::from_millis(500), 10,
    );
    let handle = tokio::spawn(worker.run());

    tokio::select! {
        _ = completion.notify.notified() => {}
        _ = tokio::time::sleep(Duration::from_secs(2)) => panic!("session did not complete in time"),
    }

    assert!(checklist.lock().await.all());

    cancel.cancel();
    queue.close().await;
    let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
}

#[tokio::test]
async fn worker_retries_not_found_until_mirror_publishes_the_file() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let record = encode_record(0, 1000, 0, &[7.0]);
    spawn_mock_mirror(listener, vec![MockResponse::NotFound, MockResponse::Ok(record)]);

    let dir = tempfile::tempdir().unwrap();
    let axes = single_slot_axes();
    let checklist = Arc::new(Mutex::new(Checklist::new(axes)));
    let queue = Arc::new(RetryQueue::new());
    queue.put(FileRequest::new(0, "gfs.t00z.pgrb2f00")).await;

    let completion = Arc::new(CompletionState::new(1));
    let cancel = CancellationToken::new();

    // short first_file_timeout so the not-found retry offset doesn't stall the test
    let worker = test_worker(
        addr, queue.clone(), completion.clone(), None, checklist.clone(),
        dir.path().to_path_buf(), cancel.clone(), Duration::from_millis(150), 10,
    );
    let handle = tokio::spawn(worker.run());

    tokio::select! {
        _ = completion.notify.notified() => {}
        _ = tokio::time::sleep(Duration::from_secs(2)) => panic!("file was never recovered after not-found"),
    }

    assert!(checklist.lock().await.all());
    assert!(completion.have_first_file.load(std::sync::atomic::Ordering::SeqCst));

    cancel.cancel();
    queue.close().await;
    let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
}

#[tokio::test]
async fn worker_recovers_after_a_mirror_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let record = encode_record(0, 1000, 0, &[3.0]);
    spawn_mock_mirror(listener, vec![MockResponse::Hang, MockResponse::Ok(record)]);

    let dir = tempfile::tempdir().unwrap();
    let axes = single_slot_axes();
    let checklist = Arc::new(Mutex::new(Checklist::new(axes)));
    let queue = Arc::new(RetryQueue::new());
    queue.put(FileRequest::new(0, "gfs.t00z.pgrb2f00")).await;

    let completion = Arc::new(CompletionState::new(1));
    let cancel = CancellationToken::new();

    // max_backoff=0 pins the post-timeout sleep to 2^0 == 1s regardless of the configured timeout,
    // keeping this test fast without weakening the backoff arithmetic covered in worker::tests.
    let worker = test_worker(
        addr, queue.clone(), completion.clone(), None, checklist.clone(),
        dir.path().to_path_buf(), cancel.clone(), Duration::from_millis(200), 0,
    );
    let handle = tokio::spawn(worker.run());

    tokio::select! {
        _ = completion.notify.notified() => {}
        _ = tokio::time::sleep(Duration::from_secs(3)) => panic!("worker never recovered from the timed-out attempt"),
    }

    assert!(checklist.lock().await.all());

    cancel.cancel();
    queue.close().await;
    let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
}
