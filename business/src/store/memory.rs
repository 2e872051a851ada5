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

use crate::realm::Error;
use crate::realm::Realm;
use crate::store::RealmStore;
use async_trait::async_trait;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct MemoryRealmStore {
    realms: BTreeMap<String, Realm>,
}

impl From<Vec<Realm>> for MemoryRealmStore {
    fn from(value: Vec<Realm>) -> Self {
        Self {
            realms: value.into_iter().map(|v| (v.name.clone(), v)).collect(),
        }
    }
}

#[async_trait]
impl RealmStore for MemoryRealmStore {
    async fn get(&self, name: &str) -> Result<Realm, Error> {
        self.realms.get(name).cloned().ok_or(Error::NotFound)
    }
}
