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
use crate::config::ProxyHeadersConfig;
use crate::config::Store;
use crate::runtime::Error;
use crate::runtime::Error::LoggedBeforeError;
use crate::store::file::FileRealmStore;
use keyclave_business::hostname::inject::base_uri_resolver;
use keyclave_business::hostname::BaseUriResolver;
use keyclave_business::hostname_debug::Handler as HostnameDebugHandler;
use keyclave_business::hostname_debug::ServerMode;
use keyclave_business::options::MapOptionStore;
use keyclave_business::options::OPTION_NAMESPACE;
use keyclave_business::store::RealmStore;
use keyclave_web::tera::load_template_engine;
use std::collections::BTreeMap;
use std::sync::Arc;
use tera::Tera;
use url::Url;

pub struct Constructor<'a> {
    config: &'a Config,

    server_mode: ServerMode,

    hostname_debug_handler: Arc<HostnameDebugHandler>,

    tera: Option<Tera>,
}

impl<'a> Constructor<'a> {
    pub fn new(config: &'a Config, server_mode: ServerMode) -> Result<Self, Error> {
        let realm_store = Self::build_realm_store(config)?;
        let tera = Some(Self::build_template_engine(config)?);
        let base_uri_resolver = Self::build_base_uri_resolver(config);
        let option_store = Self::build_option_store(config);
        let hostname_debug_handler = Arc::new(keyclave_business::hostname_debug::inject::handler(
            realm_store,
            base_uri_resolver,
            &option_store,
            server_mode,
        ));

        Ok(Self {
            config,
            server_mode,
            hostname_debug_handler,
            tera,
        })
    }

    fn build_realm_store(config: &Config) -> Result<Arc<dyn RealmStore>, Error> {
        let mut realm_store = FileRealmStore::default();
        for store_config in &config.store {
            match store_config {
                Store::Config { name: _, base } => {
                    if !realm_store.read_realms(base) {
                        return Err(LoggedBeforeError);
                    }
                }
            }
        }
        Ok(Arc::new(realm_store))
    }

    fn build_base_uri_resolver(config: &Config) -> Arc<dyn BaseUriResolver> {
        Arc::new(base_uri_resolver(
            config.hostname.url.clone(),
            config.hostname.admin_url.clone(),
            config.hostname.hostname.clone(),
            config.hostname.strict_backchannel,
            config.hostname.proxy_headers.into(),
        ))
    }

    fn build_template_engine(config: &'a Config) -> Result<Tera, Error> {
        Ok(load_template_engine(
            &config.web.static_files,
            config.web.path.as_deref().unwrap_or(""),
        )?)
    }

    /// Flattens the parsed configuration back into the namespaced raw
    /// values the diagnostics report works on.
    pub fn build_option_store(config: &Config) -> MapOptionStore {
        let mut values = BTreeMap::new();
        insert_option(&mut values, "hostname", config.hostname.hostname.clone());
        insert_option(
            &mut values,
            "hostname-url",
            config.hostname.url.as_ref().map(Url::to_string),
        );
        insert_option(
            &mut values,
            "hostname-admin-url",
            config.hostname.admin_url.as_ref().map(Url::to_string),
        );
        insert_option(
            &mut values,
            "hostname-strict",
            Some(config.hostname.strict.to_string()),
        );
        insert_option(
            &mut values,
            "hostname-strict-backchannel",
            Some(config.hostname.strict_backchannel.to_string()),
        );
        insert_option(
            &mut values,
            "hostname-debug",
            config.hostname.debug.then(|| "true".to_string()),
        );
        insert_option(
            &mut values,
            "proxy-headers",
            match config.hostname.proxy_headers {
                ProxyHeadersConfig::None => None,
                ProxyHeadersConfig::XForwarded => Some("xforwarded".to_string()),
                ProxyHeadersConfig::Forwarded => Some("forwarded".to_string()),
            },
        );
        insert_option(&mut values, "http-enabled", Some("true".to_string()));
        insert_option(
            &mut values,
            "http-relative-path",
            config.web.path.clone().filter(|path| !path.is_empty()),
        );
        insert_option(
            &mut values,
            "http-port",
            config
                .web
                .bind
                .rsplit_once(':')
                .map(|(_, port)| port.to_string()),
        );
        MapOptionStore::from(values)
    }
}

fn insert_option(values: &mut BTreeMap<String, String>, key: &str, value: Option<String>) {
    if let Some(value) = value {
        values.insert(OPTION_NAMESPACE.to_string() + key, value);
    }
}

impl<'a> keyclave_web::Constructor<'a> for Constructor<'a> {
    fn get_template_engine(&self) -> Option<Tera> {
        self.tera.clone()
    }

    fn hostname_debug_handler(&self) -> Arc<HostnameDebugHandler> {
        self.hostname_debug_handler.clone()
    }

    fn hostname_debug_enabled(&self) -> bool {
        self.server_mode == ServerMode::Development || self.config.hostname.debug
    }

    fn bind(&self) -> String {
        self.config.web.bind.clone()
    }

    fn workers(&self) -> Option<usize> {
        self.config.web.workers
    }

    fn web_path(&self) -> String {
        self.config.web.path.clone().unwrap_or_default()
    }

    fn static_files(&self) -> String {
        self.config.web.static_files.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Hostname;
    use crate::config::Web;
    use keyclave_business::options::config_snapshot;
    use keyclave_business::options::ConfigEntry;
    use pretty_assertions::assert_eq;
    use test_log::test;

    fn config(hostname: Hostname) -> Config {
        Config {
            store: vec![],
            web: Web {
                bind: "0.0.0.0:8088".to_string(),
                path: Some("".to_string()),
                workers: None,
                static_files: "static".to_string(),
            },
            hostname,
            log: Default::default(),
        }
    }

    #[test]
    fn options_are_namespaced_and_flattened() {
        let config = config(Hostname {
            hostname: Some("id.example.com".to_string()),
            proxy_headers: ProxyHeadersConfig::XForwarded,
            ..Default::default()
        });

        let store = Constructor::build_option_store(&config);

        assert_eq!(
            vec![
                ConfigEntry {
                    key: "hostname".to_string(),
                    value: "id.example.com".to_string(),
                },
                ConfigEntry {
                    key: "hostname-strict".to_string(),
                    value: "false".to_string(),
                },
                ConfigEntry {
                    key: "hostname-strict-backchannel".to_string(),
                    value: "false".to_string(),
                },
                ConfigEntry {
                    key: "proxy-headers".to_string(),
                    value: "xforwarded".to_string(),
                },
                ConfigEntry {
                    key: "http-enabled".to_string(),
                    value: "true".to_string(),
                },
                ConfigEntry {
                    key: "http-port".to_string(),
                    value: "8088".to_string(),
                },
            ],
            config_snapshot(&store)
        );
    }

    #[test]
    fn absent_hostname_options_are_omitted() {
        let config = config(Hostname::default());

        let store = Constructor::build_option_store(&config);
        let snapshot = config_snapshot(&store);

        assert!(!snapshot.iter().any(|entry| entry.key == "hostname"));
        assert!(!snapshot.iter().any(|entry| entry.key == "hostname-url"));
        assert!(!snapshot.iter().any(|entry| entry.key == "hostname-debug"));
    }
}
