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

//! RON based config loading. Configs are plain serde structs that are instantiated once at startup
//! and then passed around as (shared) immutable objects

use std::path::{Path,PathBuf};
use serde::de::DeserializeOwned;

use crate::errors::*;

/// load a config struct from a RON file
pub fn load_config_path<C,P> (path: P) -> Result<C> where C: DeserializeOwned, P: AsRef<Path> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err( config_not_found( path.display()))
    }

    let data = std::fs::read(path)?;
    Ok( ron::de::from_bytes( data.as_slice())? )
}

/// instantiate a config struct from a RON string (mostly used for tests and embedded defaults)
pub fn config_from_str<C> (s: &str) -> Result<C> where C: DeserializeOwned {
    Ok( ron::from_str(s)? )
}

/// resolve a path that is referenced from within a config file. Relative paths are interpreted
/// with respect to the directory of the referencing config file, absolute paths are kept as is
pub fn resolve_config_ref (config_path: impl AsRef<Path>, referenced: impl AsRef<Path>) -> PathBuf {
    let referenced = referenced.as_ref();
    if referenced.is_absolute() {
        referenced.to_path_buf()
    } else {
        match config_path.as_ref().parent() {
            Some(dir) => dir.join( referenced),
            None => referenced.to_path_buf()
        }
    }
}
