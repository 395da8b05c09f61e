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

//! the grib-unpacker contract: parses a local GRIB file, writes each record's float grid into the
//! Dataset's slot, marks the Checklist, and optionally appends the raw record bytes to a mirror
//! sink. This crate ships one conforming implementation, `SimpleGribUnpacker`, over a reduced,
//! self-describing record framing rather than full WMO GRIB2 Section 0-8 semantics - real decode
//! logic can be dropped in later behind the same `GribUnpacker` trait without touching the engine.

use std::path::Path;
use std::sync::Arc;
use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::dataset::{Dataset,Checklist};

const RECORD_MARKER: &[u8;4] = b"GRIB";
const END_MARKER: &[u8;4] = b"7777";

#[derive(Error,Debug)]
pub enum UnpackError {
    #[error("truncated record at byte {0}")]
    Truncated(usize),

    #[error("bad record marker at byte {0}")]
    BadMarker(usize),

    #[error("bad end-of-record marker at byte {0}")]
    BadEndMarker(usize),

    #[error("record hour {actual} does not match expected hour {expected}")]
    HourMismatch{ expected: u32, actual: u32 },

    #[error("unknown variable id {0}")]
    UnknownVariable(u8),

    #[error("unknown pressure level {0}")]
    UnknownPressure(u32),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// given a local GRIB file path, an optional Dataset writer, the shared Checklist, and an optional
/// raw-passthrough sink, decode every record and account for it in `checklist`. `assert_hour` is
/// the forecast hour this file is expected to carry; a disagreeing record is an error.
#[async_trait]
pub trait GribUnpacker: Send + Sync {
    async fn unpack (
        &self,
        path: &Path,
        dataset: Option<&Dataset>,
        checklist: &Mutex<Checklist>,
        gribmirror: Option<Arc<Mutex<tokio::fs::File>>>,
        assert_hour: u32,
    ) -> Result<(), UnpackError>;
}

/// reads a repeated `"GRIB" | hour:u32 | pressure:u32 | variable_id:u8 | grid f32 x (ny*nx) | "7777"`
/// record sequence (little-endian), rather than decoding real GRIB2 section framing. `variable_id`
/// indexes into the Dataset axes' `variables` list in declaration order.
pub struct SimpleGribUnpacker;

impl SimpleGribUnpacker {
    pub fn new () -> Self { SimpleGribUnpacker }
}

#[async_trait]
impl GribUnpacker for SimpleGribUnpacker {
    async fn unpack (
        &self,
        path: &Path,
        dataset: Option<&Dataset>,
        checklist: &Mutex<Checklist>,
        gribmirror: Option<Arc<Mutex<tokio::fs::File>>>,
        assert_hour: u32,
    ) -> Result<(), UnpackError> {
        let data = tokio::fs::read(path).await?;
        let axes = { checklist.lock().await.axes().clone() };
        let grid_len = axes.grid_len();

        let mut cursor = 0usize;
        while cursor < data.len() {
            let record_start = cursor;

            let marker = read_bytes(&data, &mut cursor, 4)?;
            if marker != RECORD_MARKER { return Err(UnpackError::BadMarker(record_start)); }

            let hour = read_u32(&data, &mut cursor)?;
            if hour != assert_hour {
                return Err(UnpackError::HourMismatch{ expected: assert_hour, actual: hour });
            }

            let pressure = read_u32(&data, &mut cursor)?;
            if axes.pressure_index(pressure).is_none() {
                return Err(UnpackError::UnknownPressure(pressure));
            }

            let variable_id = read_u8(&data, &mut cursor)?;
            let variable = axes.variables.get(variable_id as usize)
                .ok_or(UnpackError::UnknownVariable(variable_id))?
                .clone();

            let grid = read_f32_grid(&data, &mut cursor, grid_len)?;

            let end = read_bytes(&data, &mut cursor, 4)?;
            if end != END_MARKER { return Err(UnpackError::BadEndMarker(cursor - 4)); }

            if let Some(ds) = dataset {
                ds.write_slot(hour, pressure, &variable, &grid);
            }
            checklist.lock().await.set(hour, pressure, &variable);

            if let Some(mirror) = &gribmirror {
                let mut f = mirror.lock().await;
                f.write_all(&data[record_start..cursor]).await?;
            }
        }

        Ok(())
    }
}

fn read_bytes<'a> (data: &'a [u8], cursor: &mut usize, n: usize) -> Result<&'a [u8], UnpackError> {
    if *cursor + n > data.len() { return Err(UnpackError::Truncated(*cursor)); }
    let slice = &data[*cursor..*cursor+n];
    *cursor += n;
    Ok(slice)
}

fn read_u32 (data: &[u8], cursor: &mut usize) -> Result<u32, UnpackError> {
    let bytes = read_bytes(data, cursor, 4)?;
    Ok( u32::from_le_bytes([bytes[0],bytes[1],bytes[2],bytes[3]]))
}

fn read_u8 (data: &[u8], cursor: &mut usize) -> Result<u8, UnpackError> {
    let bytes = read_bytes(data, cursor, 1)?;
    Ok(bytes[0])
}

fn read_f32_grid (data: &[u8], cursor: &mut usize, n: usize) -> Result<Vec<f32>, UnpackError> {
    let bytes = read_bytes(data, cursor, n * 4)?;
    let mut out = Vec::with_capacity(n);
    for chunk in bytes.chunks_exact(4) {
        out.push( f32::from_le_bytes([chunk[0],chunk[1],chunk[2],chunk[3]]));
    }
    Ok(out)
}

/// serialize one synthetic GRIB record in the `SimpleGribUnpacker` framing - used by tests and by
/// the mock-mirror test harness to produce bodies the engine can actually decode.
pub fn encode_record (hour: u32, pressure: u32, variable_id: u8, grid: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 4 + 4 + 1 + grid.len()*4 + 4);
    out.extend_from_slice(RECORD_MARKER);
    out.extend_from_slice(&hour.to_le_bytes());
    out.extend_from_slice(&pressure.to_le_bytes());
    out.push(variable_id);
    for v in grid { out.extend_from_slice(&v.to_le_bytes()); }
    out.extend_from_slice(END_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetAxes;

    fn axes() -> DatasetAxes {
        DatasetAxes { hours: vec![0,6], pressures: vec![1000,850], variables: vec!["UGRD".into(),"VGRD".into()], ny: 2, nx: 2 }
    }

    #[tokio::test]
    async fn unpacks_single_record_and_sets_checklist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f006");
        let grid = vec![1.0f32,2.0,3.0,4.0];
        tokio::fs::write(&path, encode_record(6, 1000, 0, &grid)).await.unwrap();

        let checklist = Mutex::new( Checklist::new( axes()));
        let unpacker = SimpleGribUnpacker::new();
        unpacker.unpack(&path, None, &checklist, None, 6).await.unwrap();

        assert_eq!( checklist.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn rejects_hour_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f006");
        tokio::fs::write(&path, encode_record(6, 1000, 0, &[0.0;4])).await.unwrap();

        let checklist = Mutex::new( Checklist::new( axes()));
        let unpacker = SimpleGribUnpacker::new();
        let err = unpacker.unpack(&path, None, &checklist, None, 12).await.unwrap_err();
        assert!( matches!(err, UnpackError::HourMismatch{expected:12,actual:6}));
    }

    #[tokio::test]
    async fn multi_record_file_marks_every_slot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f006");
        let mut bytes = Vec::new();
        bytes.extend( encode_record(6, 1000, 0, &[1.0;4]));
        bytes.extend( encode_record(6, 1000, 1, &[2.0;4]));
        bytes.extend( encode_record(6, 850, 0, &[3.0;4]));
        tokio::fs::write(&path, bytes).await.unwrap();

        let checklist = Mutex::new( Checklist::new( axes()));
        let unpacker = SimpleGribUnpacker::new();
        unpacker.unpack(&path, None, &checklist, None, 6).await.unwrap();

        assert_eq!( checklist.lock().await.len(), 3);
    }
}
