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

//! a minimal, concrete implementation of the fixed-shape output artifact the engine writes into:
//! a memmap-backed flat `f32` grid addressed by (hour, pressure, variable), plus a `Checklist`
//! coverage bitset over the same three axes. The Python original backs this with a numpy.memmap;
//! `memmap2::MmapMut` is the direct analogue.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path,PathBuf};
use bit_set::BitSet;
use memmap2::MmapMut;

use odin_common::fs::{ensure_dir,filename};
use crate::{DatasetTime,fmt_dataset_stem,GfsDataSetConfig};

/// shape of the grid the Dataset and Checklist are addressed over.
#[derive(Clone,Debug)]
pub struct DatasetAxes {
    pub hours: Vec<u32>,
    pub pressures: Vec<u32>,
    pub variables: Vec<String>,
    pub ny: usize,
    pub nx: usize,
}

impl From<&GfsDataSetConfig> for DatasetAxes {
    fn from (cfg: &GfsDataSetConfig) -> Self {
        DatasetAxes { hours: cfg.hours.clone(), pressures: cfg.pressures.clone(), variables: cfg.variables.clone(), ny: cfg.ny, nx: cfg.nx }
    }
}

impl DatasetAxes {
    pub fn slot_count (&self) -> usize {
        self.hours.len() * self.pressures.len() * self.variables.len()
    }

    pub fn grid_len (&self) -> usize { self.ny * self.nx }

    pub fn hour_index (&self, hour: u32) -> Option<usize> { self.hours.iter().position(|&h| h == hour) }
    pub fn pressure_index (&self, pressure: u32) -> Option<usize> { self.pressures.iter().position(|&p| p == pressure) }
    pub fn variable_index (&self, variable: &str) -> Option<usize> { self.variables.iter().position(|v| v == variable) }

    /// flat slot index into the (hour, pressure, variable) grid
    fn slot_index (&self, hi: usize, pi: usize, vi: usize) -> usize {
        (hi * self.pressures.len() + pi) * self.variables.len() + vi
    }
}

/// boolean coverage grid over (hour x pressure x variable). Bits only ever go false -> true.
pub struct Checklist {
    axes: DatasetAxes,
    bits: BitSet,
}

impl Checklist {
    pub fn new (axes: DatasetAxes) -> Self {
        let n = axes.slot_count();
        Checklist { axes, bits: BitSet::with_capacity(n) }
    }

    pub fn set (&mut self, hour: u32, pressure: u32, variable: &str) -> bool {
        if let (Some(hi),Some(pi),Some(vi)) = (self.axes.hour_index(hour), self.axes.pressure_index(pressure), self.axes.variable_index(variable)) {
            self.bits.insert( self.axes.slot_index(hi,pi,vi));
            true
        } else {
            false
        }
    }

    pub fn all (&self) -> bool {
        self.bits.len() == self.axes.slot_count()
    }

    pub fn missing (&self) -> usize {
        self.axes.slot_count() - self.bits.len()
    }

    pub fn len (&self) -> usize { self.bits.len() }
    pub fn capacity (&self) -> usize { self.axes.slot_count() }
    pub fn axes (&self) -> &DatasetAxes { &self.axes }
}

/// memmap-backed fixed-shape array of `f32`, one slot per (hour, pressure, variable), each slot
/// holding a `ny * nx` grid.
pub struct Dataset {
    axes: DatasetAxes,
    mmap: MmapMut,
}

impl Dataset {
    /// `gfs.{YYYYMMDDHH}{suffix}` - suffix "" for the dataset itself, ".gribmirror" for the raw mirror.
    pub fn filename (dir: impl AsRef<Path>, ds_time: &DatasetTime, suffix: &str) -> PathBuf {
        let mut path = dir.as_ref().to_path_buf();
        path.push( format!("{}{}", fmt_dataset_stem(ds_time), suffix));
        path
    }

    /// create (or truncate) and memmap-open a new backing file sized for the whole grid, zero-filled.
    pub fn create (dir: impl AsRef<Path>, ds_time: &DatasetTime, axes: DatasetAxes) -> io::Result<Self> {
        ensure_dir( dir.as_ref())?;
        let path = Self::filename( dir, ds_time, "");
        let byte_len = (axes.slot_count() * axes.grid_len() * std::mem::size_of::<f32>()) as u64;

        let file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(&path)?;
        file.set_len( byte_len)?;

        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok( Dataset { axes, mmap })
    }

    /// enumerate `gfs.{YYYYMMDDHH}` artifacts in `dir` (ignoring the `.gribmirror` companion file),
    /// used by the daemon's retention sweep.
    pub fn listdir (dir: impl AsRef<Path>) -> io::Result<Vec<(DatasetTime,PathBuf)>> {
        use chrono::{TimeZone,Utc};

        let mut out = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(name) = filename(&path) else { continue };
            let Some(stamp) = name.strip_prefix("gfs.") else { continue };
            if stamp.len() != 10 || !stamp.bytes().all(|b| b.is_ascii_digit()) { continue; }

            let year: i32 = stamp[0..4].parse().unwrap();
            let month: u32 = stamp[4..6].parse().unwrap();
            let day: u32 = stamp[6..8].parse().unwrap();
            let hour: u32 = stamp[8..10].parse().unwrap();
            if let Some(dt) = Utc.with_ymd_and_hms(year,month,day,hour,0,0).single() {
                out.push((dt,path));
            }
        }
        Ok(out)
    }

    pub fn checklist (&self) -> Checklist {
        Checklist::new( self.axes.clone())
    }

    /// copy a `ny*nx` grid into the slot for (hour, pressure, variable). Slots are disjoint across
    /// concurrently-fetched files, so concurrent `&self` writes from different workers are safe as
    /// long as no two files ever target the same slot - an invariant the remote naming scheme (one
    /// hour + one product suffix per file) guarantees.
    pub fn write_slot (&self, hour: u32, pressure: u32, variable: &str, grid: &[f32]) -> bool {
        let Some(hi) = self.axes.hour_index(hour) else { return false };
        let Some(pi) = self.axes.pressure_index(pressure) else { return false };
        let Some(vi) = self.axes.variable_index(variable) else { return false };
        if grid.len() != self.axes.grid_len() { return false; }

        let slot = (hi * self.axes.pressures.len() + pi) * self.axes.variables.len() + vi;
        let byte_offset = slot * self.axes.grid_len() * std::mem::size_of::<f32>();
        let byte_len = self.axes.grid_len() * std::mem::size_of::<f32>();

        // SAFETY: `mmap` is sized to hold `slot_count() * grid_len()` f32s; `byte_offset..+byte_len`
        // stays within bounds for any in-range (hi,pi,vi), and distinct slots never overlap.
        let dst: &mut [u8] = unsafe {
            let ptr = self.mmap.as_ptr().add(byte_offset) as *mut u8;
            std::slice::from_raw_parts_mut(ptr, byte_len)
        };
        dst.copy_from_slice( bytemuck_f32_to_bytes(grid));
        true
    }

    pub fn flush (&self) -> io::Result<()> {
        self.mmap.flush()
    }

    pub fn axes (&self) -> &DatasetAxes { &self.axes }
}

fn bytemuck_f32_to_bytes (grid: &[f32]) -> &[u8] {
    // f32 has no padding/alignment surprises relevant here; this mirrors the cast memmap2 itself
    // performs internally when exposing `&[u8]` views.
    unsafe { std::slice::from_raw_parts( grid.as_ptr() as *const u8, grid.len() * std::mem::size_of::<f32>()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axes() -> DatasetAxes {
        DatasetAxes { hours: vec![0,6], pressures: vec![1000,850], variables: vec!["UGRD".into(),"VGRD".into()], ny: 2, nx: 2 }
    }

    #[test]
    fn checklist_tracks_coverage() {
        let mut cl = Checklist::new( axes());
        assert!( !cl.all());
        assert_eq!( cl.capacity(), 2*2*2);

        for h in [0,6] {
            for p in [1000,850] {
                for v in ["UGRD","VGRD"] {
                    cl.set(h,p,v);
                }
            }
        }
        assert!( cl.all());
        assert_eq!( cl.missing(), 0);
    }

    #[test]
    fn checklist_set_is_idempotent_and_monotone() {
        let mut cl = Checklist::new( axes());
        cl.set(0,1000,"UGRD");
        cl.set(0,1000,"UGRD");
        assert_eq!( cl.len(), 1);
    }

    #[test]
    fn dataset_create_and_write_slot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let ds_time = chrono::Utc::now();
        let dataset = Dataset::create( dir.path(), &ds_time, axes()).unwrap();

        let grid = vec![1.0f32, 2.0, 3.0, 4.0];
        assert!( dataset.write_slot(6, 850, "VGRD", &grid));
        assert!( !dataset.write_slot(99, 850, "VGRD", &grid)); // out-of-axis hour rejected
    }

    #[test]
    fn listdir_finds_dataset_stems_and_ignores_gribmirror() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write( dir.path().join("gfs.2026072812"), b"").unwrap();
        std::fs::write( dir.path().join("gfs.2026072812.gribmirror"), b"").unwrap();
        std::fs::write( dir.path().join("not-a-dataset"), b"").unwrap();

        let found = Dataset::listdir( dir.path()).unwrap();
        assert_eq!( found.len(), 1);
        assert_eq!( found[0].1.file_name().unwrap(), "gfs.2026072812");
    }
}
