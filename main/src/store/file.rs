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

use crate::util::iterate_directory;
use crate::util::read_file;
use async_trait::async_trait;
use keyclave_business::realm;
use keyclave_business::realm::Realm;
use keyclave_business::store::RealmStore;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::error;

#[derive(Default)]
pub struct FileRealmStore {
    realms: BTreeMap<String, Realm>,
}

#[async_trait]
impl RealmStore for FileRealmStore {
    async fn get(&self, name: &str) -> Result<Realm, realm::Error> {
        self.realms.get(name).cloned().ok_or(realm::Error::NotFound)
    }
}

impl FileRealmStore {
    pub fn read_realms(&mut self, base: &str) -> bool {
        if let Some(realms) = read_object(
            (base.to_string() + "/realms").as_str(),
            |realm: Realm, file| {
                let pattern = Regex::new(r"^[a-zA-Z0-9._-]+$").unwrap();
                if !pattern.is_match(&realm.name) {
                    error!("invalid realm name {}", realm.name);
                    return None;
                }

                if PathBuf::from(realm.name.clone() + ".yml") != file.file_name() {
                    error!(
                        "realm '{}' is stored in '{:?}' but was expected to be stored in '{}.yml'",
                        realm.name,
                        file.path(),
                        realm.name
                    );
                    return None;
                }
                Some(realm)
            },
        ) {
            realms
                .into_iter()
                .map(|v| (v.name.clone(), v))
                .for_each(|v| {
                    self.realms.insert(v.0, v.1);
                });
            true
        } else {
            false
        }
    }
}

fn read_object<O, T>(base: &str, transformer: T) -> Option<Vec<O>>
where
    O: for<'a> Deserialize<'a>,
    T: Fn(O, &std::fs::DirEntry) -> Option<O>,
{
    let mut result = Vec::default();
    let directory_entries = iterate_directory(base)?;
    for file in directory_entries {
        let file = match file {
            Err(e) => {
                error!("could not read store file: {}", e);
                return None;
            }
            Ok(f) => {
                if !f.path().is_file() {
                    error!(
                        "{:?} is no file. Only files are allowed inside the store",
                        f.path()
                    );
                    return None;
                }
                f
            }
        };
        let raw_content = match read_file(file.path()) {
            Err(e) => {
                error!("could not read file {:?}: {}", file.path(), e);
                return None;
            }
            Ok(content) => content,
        };

        let object = match serde_yaml::from_str::<O>(&raw_content) {
            Err(e) => {
                error!("file {:?} is malformed: {}", file.path(), e);
                return None;
            }
            Ok(v) => v,
        };

        let object = transformer(object, &file)?;
        result.push(object);
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_log::test;

    #[test(tokio::test)]
    async fn example_realms_are_read() {
        let mut uut = FileRealmStore::default();

        let loaded = uut.read_realms(&(env!("CARGO_MANIFEST_DIR").to_string() + "/../doc"));

        assert!(loaded);
        let realm = uut.get("master").await.unwrap();
        assert_eq!("master", realm.name);
    }

    #[test(tokio::test)]
    async fn missing_directory_is_reported() {
        let mut uut = FileRealmStore::default();

        assert!(!uut.read_realms("/nonexistent"));
    }

    #[test(tokio::test)]
    async fn unknown_realm_is_not_found() {
        let mut uut = FileRealmStore::default();
        uut.read_realms(&(env!("CARGO_MANIFEST_DIR").to_string() + "/../doc"));

        assert_eq!(
            Err(realm::Error::NotFound),
            uut.get("no-such-realm").await
        );
    }
}
