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

//! CLI entry point: `download` runs a single session for an explicit (or latest publishable)
//! dataset-time; `daemon` runs the perpetual scheduler. Not re-specified by the core engine design -
//! ordinary glue wiring config load, logging setup, and signal handling around the two entry points.

use std::process::ExitCode;
use std::sync::Arc;
use clap::{Parser,Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use odin_gfs::{load_config,parse_ds_time,latest_publishable_dataset_time,GfsConfig,GfsDataSetConfig,Downloader,Daemon,GfsError};
use odin_gfs::daemon::{no_alert,AlertSink};
use odin_gfs::unpacker::SimpleGribUnpacker;

#[derive(Parser)]
#[command(name = "gfs-downloader", about = "NOAA GFS GRIB2 download engine")]
struct Cli {
    /// target artifact directory
    #[arg(long, default_value = "datasets")]
    directory: String,

    /// GfsConfig RON filename (looked up the way all ODIN crates load configs)
    #[arg(long, default_value = "gfs.ron")]
    config: String,

    /// GfsDataSetConfig RON filename
    #[arg(long, default_value = "gfs_dataset.ron")]
    dataset_config: String,

    /// increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// decrease log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    quiet: u8,

    /// optional log file sink, in addition to stderr
    #[arg(long)]
    log_file: Option<String>,

    /// optional alert address; failures are logged as "would email X" (SMTP dispatch out of scope)
    #[arg(long)]
    email_exceptions: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// run a single download session
    Download {
        /// explicit dataset-time as YYYYMMDDHH (default: the latest publishable one)
        ds_time: Option<String>,
    },
    /// run the perpetual scheduler daemon
    Daemon {
        /// how many recent datasets to retain on disk
        #[arg(long, default_value_t = 2)]
        num_datasets: usize,
    },
}

fn init_logging (cli: &Cli) {
    let level = match cli.verbose as i8 - cli.quiet as i8 {
        i if i <= -2 => "error",
        -1 => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path)
                .unwrap_or_else(|e| panic!("failed to open log file {path}: {e}"));
            subscriber.with_writer(move || file.try_clone().expect("log file clone")).init();
        }
        None => subscriber.init(),
    }
}

fn alert_sink (cli: &Cli) -> AlertSink {
    match &cli.email_exceptions {
        Some(address) => {
            let address = address.clone();
            odin_action::dyn_dataref_action!( address: String => |data: &GfsError| {
                tracing::error!( address = %address, error = %data, "would send email alert (SMTP dispatch not implemented)");
                Ok::<(),String>(())
            })
        }
        None => no_alert(),
    }
}

#[tokio::main]
async fn main () -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let config: GfsConfig = match load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => { tracing::error!( error = %e, "failed to load GfsConfig"); return ExitCode::FAILURE; }
    };
    let ds_config: GfsDataSetConfig = match load_config(&cli.dataset_config) {
        Ok(c) => c,
        Err(e) => { tracing::error!( error = %e, "failed to load GfsDataSetConfig"); return ExitCode::FAILURE; }
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn( async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received interrupt, shutting down");
            signal_cancel.cancel();
        }
    });

    match cli.command {
        Command::Download { ds_time } => {
            let ds_time = match ds_time.as_deref() {
                Some(s) => match parse_ds_time(s) {
                    Some(dt) => dt,
                    None => { tracing::error!( value = %s, "bad dataset-time, expected YYYYMMDDHH"); return ExitCode::FAILURE; }
                },
                None => latest_publishable_dataset_time( &chrono::Utc::now()),
            };

            if let Err(e) = odin_common::fs::ensure_dir(&cli.directory) {
                tracing::error!( error = %e, "failed to create target directory");
                return ExitCode::FAILURE;
            }

            let mut downloader = Downloader::new(
                config, ds_config, cli.directory.clone(), ds_time, true, true,
                Arc::new( SimpleGribUnpacker::new()),
            );

            let session = downloader.run();
            tokio::pin!(session);
            let result = tokio::select! {
                _ = cancel.cancelled() => { tracing::warn!("interrupted before session completed"); return ExitCode::SUCCESS; }
                r = &mut session => r,
            };

            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!( error = %e, "download session failed");
                    let _ = alert_sink(&cli).execute(&e).await;
                    ExitCode::FAILURE
                }
            }
        }
        Command::Daemon { num_datasets } => {
            if let Err(e) = odin_common::fs::ensure_dir(&cli.directory) {
                tracing::error!( error = %e, "failed to create target directory");
                return ExitCode::FAILURE;
            }

            let daemon = Daemon::new(
                config, ds_config, cli.directory.clone(), num_datasets, true, true,
                Arc::new( SimpleGribUnpacker::new()), alert_sink(&cli),
            );

            match daemon.run(cancel).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => { tracing::error!( error = %e, "daemon exited with error"); ExitCode::FAILURE }
            }
        }
    }
}
