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

use serde_derive::Deserialize;
use serde_derive::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Realm attribute holding the realm's own configured frontend URL.
pub const FRONTEND_URL_ATTRIBUTE: &str = "frontendUrl";

/// A tenant of the server. Each realm carries its own free-form string
/// attributes in addition to the fields the server interprets itself.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Realm {
    pub name: String,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Realm {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("not found")]
    NotFound,
}
