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

use serde_derive::Serialize;
use std::collections::BTreeMap;

/// Prefix under which raw option values are stored and queried.
pub const OPTION_NAMESPACE: &str = "kc.";

/// Configuration options relevant to hostname and reverse-proxy
/// diagnostics, in the order they are rendered in the report.
pub const RELEVANT_OPTIONS: &[&str] = &[
    "hostname",
    "hostname-url",
    "hostname-admin-url",
    "hostname-strict",
    "hostname-strict-backchannel",
    "hostname-debug",
    "proxy-headers",
    "http-enabled",
    "http-relative-path",
    "http-port",
];

/// Inbound request headers relevant to reverse-proxy detection.
pub const RELEVANT_HEADERS: &[&str] = &[
    "Host",
    "Forwarded",
    "X-Forwarded-For",
    "X-Forwarded-Host",
    "X-Forwarded-Port",
    "X-Forwarded-Proto",
];

/// Flat string key to raw string value lookup over the server's
/// effective configuration.
pub trait OptionStore: Send + Sync {
    fn raw_value(&self, key: &str) -> Option<String>;
}

pub struct MapOptionStore {
    values: BTreeMap<String, String>,
}

impl From<BTreeMap<String, String>> for MapOptionStore {
    fn from(value: BTreeMap<String, String>) -> Self {
        Self { values: value }
    }
}

impl OptionStore for MapOptionStore {
    fn raw_value(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}

/// Collects the effective values of all relevant options. Absent and
/// empty values are omitted, declaration order is preserved so that
/// operators can read the result against a known schema.
pub fn config_snapshot(store: &dyn OptionStore) -> Vec<ConfigEntry> {
    RELEVANT_OPTIONS
        .iter()
        .filter_map(|key| {
            store
                .raw_value(&(OPTION_NAMESPACE.to_string() + key))
                .filter(|value| !value.is_empty())
                .map(|value| ConfigEntry {
                    key: (*key).to_string(),
                    value,
                })
        })
        .collect()
}
