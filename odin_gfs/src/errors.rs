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

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GfsError>;

/// per-attempt failures a worker recovers from by re-enqueueing. Never escapes `download()`.
#[derive(Error,Debug)]
pub enum TransientError {
    #[error("not found")]
    NotFound,

    #[error("bad status {0}")]
    BadStatus(u16),

    #[error("network error: {0}")]
    NetworkError(#[from] std::io::Error),

    #[error("attempt timed out")]
    TimedOut,

    #[error("grib decode failed: {0}")]
    Decode(String),
}

#[derive(Error,Debug)]
pub enum GfsError {
    #[error("io error {0}")]
    IOError( #[from] std::io::Error),

    #[error("config error {0}")]
    ConfigError( #[from] odin_build::OdinBuildError),

    #[error("deadline already passed")]
    DeadlinePassed,

    #[error("session timed out waiting for completion")]
    Timeout,

    #[error("incomplete: {0}/{1} records missing from checklist")]
    Incomplete(usize,usize),

    #[error("neither write_dataset nor write_gribmirror requested")]
    NoOutputRequested,

    #[error("no addresses resolved for host {0}")]
    NoAddresses(String),

    #[error("operation cancelled")]
    Cancelled,

    /// a generic error
    #[error("operation failed: {0}")]
    OpFailed(String),
}

pub fn op_failed (msg: impl ToString)->GfsError {
    GfsError::OpFailed(msg.to_string())
}
