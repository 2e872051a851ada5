/*  keyclave: Multi-realm identity server
 *  Copyright (C) 2023 The keyclave developers
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use crate::config::Config;
use crate::util::read_file as read;

use std::fs;
use std::process::exit;

use serde_yaml::Value;
use tracing::{debug, error, warn};

const EXIT_CODE: i32 = 1;

pub fn parse_config(path: &str) -> Config {
    let raw_config = read_config(path);
    debug!(
        "complete configuration:\n{}",
        raw_config
            .iter()
            .flat_map(|s| s.chars())
            .collect::<String>()
    );
    parse_raw_config(&raw_config)
}

fn read_config(path: &str) -> Vec<String> {
    match fs::metadata(path) {
        Err(e) => {
            error!("failed to read metadata of {}: {}", path, e);
            exit(EXIT_CODE);
        }
        Ok(metadata) => {
            if metadata.file_type().is_dir() {
                traverse_directory(path)
            } else if metadata.file_type().is_file() {
                read_file(path)
            } else {
                warn!("ignoring file {}", path);
                Vec::new()
            }
        }
    }
}

fn read_file(path: &str) -> Vec<String> {
    match read(path) {
        Err(error) => {
            error!("failed to read file {}: {}", path, error);
            exit(EXIT_CODE)
        }
        Ok(content) => vec![content],
    }
}

fn traverse_directory(path: &str) -> Vec<String> {
    let content = fs::read_dir(path);
    if let Err(err) = content {
        error!("failed to get directory content of {}: {}", path, err);
        exit(EXIT_CODE);
    }

    let mut result = Vec::new();

    for entry in content.unwrap() {
        if let Err(err) = entry {
            error!("failed to read {}: {}", path, err);
            exit(EXIT_CODE);
        }
        let entry_path = entry.unwrap().path();
        let entry_path_string = entry_path.to_str().unwrap();
        let content = read_config(entry_path_string);

        result.extend(content);
    }
    result
}

fn parse_raw_config(raw_config: &[String]) -> Config {
    let mut merged = Value::Null;
    for fragment in raw_config {
        match serde_yaml::from_str::<Value>(fragment) {
            Err(e) => {
                error!("could not parse config: {:#?}", e);
                exit(EXIT_CODE);
            }
            Ok(value) => merged = merge(merged, value),
        }
    }

    match serde_yaml::from_value(merged) {
        Err(e) => {
            error!("invalid config: {:#?}", e);
            exit(EXIT_CODE);
        }
        Ok(config) => config,
    }
}

/// Later fragments win. Mappings are merged recursively, everything
/// else is replaced wholesale.
fn merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => merge(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Mapping(base)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}
