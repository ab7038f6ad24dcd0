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

use std::fs::{self,File};
use std::io::{self,Write,ErrorKind};
use std::path::{Path,PathBuf};

use crate::io_error;

type Result<T> = std::result::Result<T,std::io::Error>;

pub fn filename<'a,T: AsRef<Path>> (path: &'a T)->Option<&'a str> {
    path.as_ref().file_name().and_then(|ostr| ostr.to_str())
}

pub fn filestem <'a,T: AsRef<Path>> (path: &'a T)->Option<&'a str> {
    path.as_ref().file_stem().and_then(|ostr| ostr.to_str())
}

pub fn ensure_dir (path: impl AsRef<Path>)->io::Result<()> {
    let path = path.as_ref();
    if !path.is_dir() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// check if dir pathname exists and is writable, try to create dir otherwise
pub fn ensure_writable_dir (path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    if path.is_dir() {
        let md = fs::metadata(&path)?;
        if md.permissions().readonly() {
            Err(io_error!(ErrorKind::PermissionDenied, "output_dir {:?} not writable", &path))
        } else {
            Ok(())
        }

    } else {
        fs::create_dir_all(path)
    }
}

/// replace the contents of file `dir/filename` (creating it if necessary) and return its path.
/// The data is first written to a temporary sibling which is then renamed, i.e. readers never
/// see partially written artifacts
pub fn set_filepath_contents (dir: impl AsRef<Path>, filename: &str, new_contents: &[u8]) -> Result<PathBuf>  {
    let dir = dir.as_ref();
    let path = dir.join(filename);
    let tmp_path = dir.join( format!(".{}.tmp", filename));

    let mut file = File::create(&tmp_path)?;
    file.write_all(new_contents)?;
    file.sync_all()?;
    fs::rename( &tmp_path, &path)?;

    Ok(path)
}

/// list files in `dir` (non recursive) that satisfy the given predicate on their filename, sorted by filename
pub fn matching_files_in_dir<P,F> (dir: &P, pred: F) -> Result<Vec<PathBuf>> where P: AsRef<Path>, F: Fn(&str)->bool {
    let dir: &Path = dir.as_ref();
    let mut list = Vec::new();

    if dir.is_dir() {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() {
                if let Some(fname) = filename(&path) {
                    if pred(fname) { list.push(path.clone()) }
                }
            }
        }
    }

    list.sort();
    Ok(list)
}

/// a filename that is safe to use as a single path component (path separators and whitespace replaced)
pub fn path_safe_name (s: &str)->String {
    s.chars().map( |c| if c == '/' || c == '\\' || c == ':' || c.is_whitespace() { '_' } else { c }).collect()
}
