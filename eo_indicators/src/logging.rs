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

use std::{fs::File, path::{Path,PathBuf}, sync::Arc};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use eo_common::{datetime::{filename_timestamp, local_now}, fs::ensure_writable_dir};
use crate::errors::{configuration_error, op_failed, Result};

/// `<log_dir>/<experiment_id>_<timestamp>.log`
pub fn log_file_path (log_dir: impl AsRef<Path>, experiment_id: &str)->PathBuf {
    log_dir.as_ref().join( format!("{}_{}.log", experiment_id, filename_timestamp( &local_now())))
}

/// console logging plus an optional plain text log file. RUST_LOG overrides the configured level.
/// Note this only succeeds if there is no global subscriber set yet
pub fn init_tracing (level: &str, log_file: Option<&Path>)->Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else( |_| EnvFilter::try_new( level))
        .map_err( |e| configuration_error( format!("invalid log level '{level}': {e}")))?;

    let file_layer = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent().filter( |d| !d.as_os_str().is_empty()) { ensure_writable_dir( dir)?; }
            let file = File::create( path)?;
            Some( fmt::layer().with_ansi(false).with_writer( Arc::new(file)))
        }
        None => None
    };

    tracing_subscriber::registry()
        .with( filter)
        .with( fmt::layer().with_target(false))
        .with( file_layer)
        .try_init()
        .map_err( |e| op_failed(e))
}
