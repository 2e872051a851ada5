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

use crate::hostname;
use crate::hostname::BaseUriResolver;
use crate::hostname::RequestContext;
use crate::hostname::UrlType;
use crate::options::ConfigEntry;
use crate::options::RELEVANT_HEADERS;
use crate::realm;
use crate::realm::FRONTEND_URL_ATTRIBUTE;
use crate::store::RealmStore;
use serde_derive::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;
use url::Url;

pub const REALMS_PATH: &str = "realms";

pub const DEBUG_PATH: &str = "hostname-debug";

pub const CORS_TEST_PATH: &str = "test";

/// Body returned by the CORS-echo endpoint.
pub fn cors_test_body() -> String {
    CORS_TEST_PATH.to_string() + "-OK"
}

/// How the server was started. Rendered verbatim in the report so
/// operators can tell a development instance from a production one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerMode {
    Development,
    Production,
}

impl Display for ServerMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "dev [start-dev]"),
            Self::Production => write!(f, "production [start]"),
        }
    }
}

/// Everything the report template needs, assembled per request and
/// discarded after rendering.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    pub realm: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub realm_url: Option<String>,

    pub frontend_url: String,

    pub backend_url: String,

    pub admin_url: String,

    pub frontend_test_url: String,

    pub backend_test_url: String,

    pub admin_test_url: String,

    pub server_mode: String,

    pub config: Vec<ConfigEntry>,

    pub headers: BTreeMap<String, String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("realm not found")]
    RealmNotFound,

    #[error("base URI resolution failed: {0}")]
    Hostname(#[from] hostname::Error),
}

pub struct Handler {
    realm_store: Arc<dyn RealmStore>,

    base_uri_resolver: Arc<dyn BaseUriResolver>,

    server_mode: ServerMode,

    /// Built once at wiring time. Configuration is stable for the
    /// process lifetime, so concurrent readers need no locking.
    config: Vec<ConfigEntry>,
}

impl Handler {
    #[instrument(skip_all, fields(realm = realm_name))]
    pub async fn assemble(
        &self,
        realm_name: &str,
        request: &RequestContext,
    ) -> Result<DiagnosticReport, Error> {
        let realm = match self.realm_store.get(realm_name).await {
            Ok(realm) => realm,
            Err(realm::Error::NotFound) => return Err(Error::RealmNotFound),
        };

        let frontend = self.base_uri_resolver.resolve(UrlType::Frontend, request)?;
        let backend = self.base_uri_resolver.resolve(UrlType::Backend, request)?;
        let admin = self.base_uri_resolver.resolve(UrlType::Admin, request)?;

        Ok(DiagnosticReport {
            realm: realm.name.clone(),
            realm_url: realm.attribute(FRONTEND_URL_ATTRIBUTE).map(str::to_string),
            frontend_test_url: cors_test_url(&frontend, &realm.name),
            backend_test_url: cors_test_url(&backend, &realm.name),
            admin_test_url: cors_test_url(&admin, &realm.name),
            frontend_url: frontend.to_string(),
            backend_url: backend.to_string(),
            admin_url: admin.to_string(),
            server_mode: self.server_mode.to_string(),
            config: self.config.clone(),
            headers: header_snapshot(request),
        })
    }
}

/// The URL an operator fetches to exercise the CORS-echo endpoint
/// through the given base URI. The realm name is path-segment-encoded.
pub fn cors_test_url(base: &Url, realm_name: &str) -> String {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .extend([REALMS_PATH, realm_name, DEBUG_PATH, CORS_TEST_PATH]);
    }
    url.to_string()
}

/// Captures the relevant headers of the current request. Absent and
/// empty values are omitted, keys come out lexicographically sorted.
pub fn header_snapshot(request: &RequestContext) -> BTreeMap<String, String> {
    RELEVANT_HEADERS
        .iter()
        .filter_map(|name| {
            request
                .header(name)
                .map(|value| ((*name).to_string(), value.to_string()))
        })
        .collect()
}

pub mod inject {
    use super::Handler;
    use super::ServerMode;
    use crate::hostname::BaseUriResolver;
    use crate::options::config_snapshot;
    use crate::options::OptionStore;
    use crate::store::RealmStore;
    use std::sync::Arc;

    pub fn handler(
        realm_store: Arc<dyn RealmStore>,
        base_uri_resolver: Arc<dyn BaseUriResolver>,
        option_store: &dyn OptionStore,
        server_mode: ServerMode,
    ) -> Handler {
        Handler {
            realm_store,
            base_uri_resolver,
            server_mode,
            config: config_snapshot(option_store),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hostname::ProxyHeaders;
    use crate::options::MapOptionStore;
    use crate::realm::Realm;
    use crate::store::memory::MemoryRealmStore;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use test_log::test;

    fn realm(name: &str, attributes: &[(&str, &str)]) -> Realm {
        Realm {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn request(host: &str, headers: &[(&str, &str)]) -> RequestContext {
        RequestContext {
            secure: false,
            host: host.to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn handler(realms: Vec<Realm>, options: &[(&str, &str)], mode: ServerMode) -> Handler {
        let option_store = MapOptionStore::from(
            options
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        );
        inject::handler(
            Arc::new(MemoryRealmStore::from(realms)),
            Arc::new(hostname::inject::base_uri_resolver(
                None,
                None,
                None,
                false,
                ProxyHeaders::None,
            )),
            &option_store,
            mode,
        )
    }

    #[test(tokio::test)]
    async fn unknown_realm_is_rejected() {
        let uut = handler(vec![], &[], ServerMode::Production);

        let result = uut.assemble("missing", &request("id.example.com", &[])).await;

        assert_eq!(Err(Error::RealmNotFound), result);
    }

    #[test(tokio::test)]
    async fn test_urls_follow_the_resolved_bases() {
        let uut = handler(vec![realm("master", &[])], &[], ServerMode::Production);

        let report = uut
            .assemble("master", &request("id.example.com", &[]))
            .await
            .unwrap();

        assert_eq!("http://id.example.com/", report.frontend_url);
        assert_eq!(
            "http://id.example.com/realms/master/hostname-debug/test",
            report.frontend_test_url
        );
        assert_eq!(report.frontend_test_url, report.backend_test_url);
        assert_eq!(report.frontend_test_url, report.admin_test_url);
    }

    #[test(tokio::test)]
    async fn realm_names_are_path_encoded_in_test_urls() {
        let uut = handler(vec![realm("my realm", &[])], &[], ServerMode::Production);

        let report = uut
            .assemble("my realm", &request("id.example.com", &[]))
            .await
            .unwrap();

        assert_eq!(
            "http://id.example.com/realms/my%20realm/hostname-debug/test",
            report.frontend_test_url
        );
    }

    #[test(tokio::test)]
    async fn realm_url_comes_from_the_realm_attribute() {
        let uut = handler(
            vec![realm("master", &[("frontendUrl", "https://id.example.com")])],
            &[],
            ServerMode::Production,
        );

        let report = uut
            .assemble("master", &request("id.example.com", &[]))
            .await
            .unwrap();

        assert_eq!(Some("https://id.example.com".to_string()), report.realm_url);
    }

    #[test(tokio::test)]
    async fn realm_url_is_absent_without_the_attribute() {
        let uut = handler(vec![realm("master", &[])], &[], ServerMode::Production);

        let report = uut
            .assemble("master", &request("id.example.com", &[]))
            .await
            .unwrap();

        assert_eq!(None, report.realm_url);
    }

    #[rstest]
    #[case::development(ServerMode::Development, "dev [start-dev]")]
    #[case::production(ServerMode::Production, "production [start]")]
    #[test_log::test]
    fn server_mode_is_rendered_verbatim(#[case] mode: ServerMode, #[case] expected: &str) {
        assert_eq!(expected, mode.to_string());
    }

    #[test(tokio::test)]
    async fn headers_are_captured_per_request() {
        let uut = handler(vec![realm("master", &[])], &[], ServerMode::Production);

        let first = uut
            .assemble(
                "master",
                &request(
                    "id.example.com",
                    &[
                        ("X-Forwarded-Host", "public.example.com"),
                        ("Host", "id.example.com"),
                    ],
                ),
            )
            .await
            .unwrap();
        let second = uut
            .assemble("master", &request("id.example.com", &[]))
            .await
            .unwrap();

        assert_eq!(
            vec![
                ("Host".to_string(), "id.example.com".to_string()),
                (
                    "X-Forwarded-Host".to_string(),
                    "public.example.com".to_string()
                ),
            ],
            first.headers.into_iter().collect::<Vec<_>>()
        );
        assert_eq!(BTreeMap::new(), second.headers);
    }

    #[test(tokio::test)]
    async fn irrelevant_and_empty_headers_are_omitted() {
        let uut = handler(vec![realm("master", &[])], &[], ServerMode::Production);

        let report = uut
            .assemble(
                "master",
                &request(
                    "id.example.com",
                    &[("Accept", "text/html"), ("Forwarded", "")],
                ),
            )
            .await
            .unwrap();

        assert_eq!(BTreeMap::new(), report.headers);
    }

    #[test(tokio::test)]
    async fn configured_options_show_up_in_the_report() {
        let uut = handler(
            vec![realm("master", &[])],
            &[("kc.hostname", "id.example.com"), ("kc.http-port", "8088")],
            ServerMode::Production,
        );

        let report = uut
            .assemble("master", &request("id.example.com", &[]))
            .await
            .unwrap();

        assert_eq!(
            vec![
                ConfigEntry {
                    key: "hostname".to_string(),
                    value: "id.example.com".to_string(),
                },
                ConfigEntry {
                    key: "http-port".to_string(),
                    value: "8088".to_string(),
                },
            ],
            report.config
        );
    }

    #[test(tokio::test)]
    async fn repeated_assembly_is_identical() {
        let uut = handler(vec![realm("master", &[])], &[], ServerMode::Development);
        let context = request("id.example.com", &[("Host", "id.example.com")]);

        let first = uut.assemble("master", &context).await.unwrap();
        let second = uut.assemble("master", &context).await.unwrap();

        assert_eq!(first, second);
    }

    #[test(tokio::test)]
    async fn report_attributes_use_camel_case_names() {
        let uut = handler(vec![realm("master", &[])], &[], ServerMode::Production);

        let report = uut
            .assemble("master", &request("id.example.com", &[]))
            .await
            .unwrap();

        let value = serde_json::to_value(report).unwrap();
        let object = value.as_object().unwrap();
        for name in [
            "realm",
            "frontendUrl",
            "backendUrl",
            "adminUrl",
            "frontendTestUrl",
            "backendTestUrl",
            "adminTestUrl",
            "serverMode",
            "config",
            "headers",
        ] {
            assert!(object.contains_key(name), "missing attribute {name}");
        }
    }

    #[test]
    fn cors_test_body_is_fixed() {
        assert_eq!("test-OK", cors_test_body());
    }

    #[test]
    fn bases_with_paths_keep_their_prefix() {
        let base = Url::parse("https://id.example.com/auth/").unwrap();

        assert_eq!(
            "https://id.example.com/auth/realms/master/hostname-debug/test",
            cors_test_url(&base, "master")
        );
    }
}
