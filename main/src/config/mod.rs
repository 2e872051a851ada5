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

pub mod parser;

use keyclave_business::hostname::ProxyHeaders;
use serde_derive::Deserialize;
use url::Url;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub store: Vec<Store>,

    pub web: Web,

    #[serde(default)]
    pub hostname: Hostname,

    #[serde(default)]
    pub log: Log,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub enum Store {
    #[serde(rename = "configuration file")]
    Config { name: String, base: String },
}

#[derive(Default, Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Web {
    pub bind: String,

    #[serde(default = "default_path")]
    pub path: Option<String>,

    pub workers: Option<usize>,

    #[serde(alias = "static files")]
    pub static_files: String,
}

#[allow(clippy::unnecessary_wraps)]
fn default_path() -> Option<String> {
    Some("".to_string())
}

/// How the server presents itself to the outside world. All of these
/// show up under their `kc.`-namespaced names in the diagnostics
/// report.
#[derive(Default, Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Hostname {
    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default)]
    pub url: Option<Url>,

    #[serde(default)]
    #[serde(alias = "admin url")]
    pub admin_url: Option<Url>,

    #[serde(default)]
    pub strict: bool,

    #[serde(default)]
    #[serde(alias = "strict backchannel")]
    pub strict_backchannel: bool,

    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    #[serde(alias = "proxy headers")]
    pub proxy_headers: ProxyHeadersConfig,
}

#[derive(Default, Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum ProxyHeadersConfig {
    #[default]
    #[serde(rename = "none")]
    None,

    #[serde(rename = "xforwarded")]
    XForwarded,

    #[serde(rename = "forwarded")]
    Forwarded,
}

impl From<ProxyHeadersConfig> for ProxyHeaders {
    fn from(value: ProxyHeadersConfig) -> Self {
        match value {
            ProxyHeadersConfig::None => Self::None,
            ProxyHeadersConfig::XForwarded => Self::XForwarded,
            ProxyHeadersConfig::Forwarded => Self::Forwarded,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Log {
    pub format: Format,
    pub fields: Fields,
    pub filter: Vec<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            format: Format::default(),
            fields: Fields::default(),
            filter: vec!["info".to_string()],
        }
    }
}

#[derive(Default, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Fields {
    pub ansi: bool,
    pub file: bool,
    pub level: bool,
    #[serde(rename = "line number")]
    pub line_number: bool,
    pub target: bool,
    #[serde(rename = "thread id")]
    pub thread_id: bool,
    #[serde(rename = "thread name")]
    pub thread_name: bool,
    #[serde(rename = "span events")]
    pub span_events: bool,
    pub time: Time,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Default)]
pub enum Format {
    #[serde(rename = "compact")]
    Compact,
    #[serde(rename = "pretty")]
    Pretty,
    #[default]
    #[serde(rename = "full")]
    Full,
    #[serde(rename = "json")]
    Json {
        flatten: bool,
        #[serde(rename = "current span")]
        current_span: bool,
        #[serde(rename = "span list")]
        span_list: bool,
    },
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Default)]
pub enum Time {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "uptime")]
    Uptime,
    #[default]
    #[serde(rename = "system")]
    SystemTime,
}
