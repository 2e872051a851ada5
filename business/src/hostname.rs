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

use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// The logical consumer for which a base URI is resolved. The same
/// physical server may be reachable under different hostnames for each.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UrlType {
    Frontend,
    Backend,
    Admin,
}

/// The slice of an inbound request that base URI resolution and the
/// diagnostics report depend on. `headers` holds only the relevant
/// header names, as captured by the web layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub secure: bool,

    pub host: String,

    pub headers: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }
}

/// Which reverse-proxy headers the server trusts when reconstructing
/// its externally visible address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProxyHeaders {
    #[default]
    None,
    XForwarded,
    Forwarded,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("request host '{0}' does not form a valid URL")]
    InvalidRequestHost(String),

    #[error("configured hostname '{0}' is not a valid host")]
    InvalidConfiguredHostname(String),
}

pub trait BaseUriResolver: Send + Sync {
    /// Pure function of the resolver configuration and the request
    /// context, so repeated calls within one request agree.
    fn resolve(&self, url_type: UrlType, request: &RequestContext) -> Result<Url, Error>;
}

pub struct StandardBaseUriResolver {
    frontend_url: Option<Url>,

    admin_url: Option<Url>,

    hostname: Option<String>,

    strict_backchannel: bool,

    proxy_headers: ProxyHeaders,
}

impl BaseUriResolver for StandardBaseUriResolver {
    fn resolve(&self, url_type: UrlType, request: &RequestContext) -> Result<Url, Error> {
        match url_type {
            UrlType::Frontend => self.frontend(request),
            UrlType::Backend => {
                if self.strict_backchannel {
                    self.frontend(request)
                } else {
                    self.request_base(request)
                }
            }
            UrlType::Admin => match &self.admin_url {
                Some(url) => Ok(url.clone()),
                None => self.frontend(request),
            },
        }
    }
}

impl StandardBaseUriResolver {
    fn frontend(&self, request: &RequestContext) -> Result<Url, Error> {
        if let Some(url) = &self.frontend_url {
            return Ok(url.clone());
        }
        let mut base = self.request_base(request)?;
        if let Some(hostname) = &self.hostname {
            base.set_host(Some(hostname))
                .map_err(|_| Error::InvalidConfiguredHostname(hostname.clone()))?;
        }
        Ok(base)
    }

    fn request_base(&self, request: &RequestContext) -> Result<Url, Error> {
        let (forwarded_host, forwarded_proto) = match self.proxy_headers {
            ProxyHeaders::None => (None, None),
            ProxyHeaders::XForwarded => (
                request.header("X-Forwarded-Host").map(|host| {
                    match request.header("X-Forwarded-Port") {
                        Some(port) if !host.contains(':') => format!("{host}:{port}"),
                        _ => host.to_string(),
                    }
                }),
                request.header("X-Forwarded-Proto").map(str::to_string),
            ),
            ProxyHeaders::Forwarded => request
                .header("Forwarded")
                .map(parse_forwarded)
                .unwrap_or((None, None)),
        };

        let scheme = forwarded_proto.unwrap_or_else(|| request.scheme().to_string());
        if let Some(host) = forwarded_host {
            match Url::parse(&format!("{scheme}://{host}/")) {
                Ok(url) => return Ok(url),
                Err(e) => debug!(%host, %e, "ignoring unusable forwarded host"),
            }
        }

        Url::parse(&format!("{}://{}/", scheme, request.host))
            .map_err(|_| Error::InvalidRequestHost(request.host.clone()))
    }
}

/// Extracts `host` and `proto` from the first element of an RFC 7239
/// Forwarded header. Unknown directives are skipped.
fn parse_forwarded(value: &str) -> (Option<String>, Option<String>) {
    let mut host = None;
    let mut proto = None;
    let first_element = value.split(',').next().unwrap_or("");
    for directive in first_element.split(';') {
        let mut parts = directive.trim().splitn(2, '=');
        if let (Some(name), Some(value)) = (parts.next(), parts.next()) {
            let value = value.trim().trim_matches('"');
            match name.trim().to_ascii_lowercase().as_str() {
                "host" => host = Some(value.to_string()),
                "proto" => proto = Some(value.to_string()),
                _ => {}
            }
        }
    }
    (host, proto)
}

pub mod inject {
    use super::ProxyHeaders;
    use super::StandardBaseUriResolver;
    use url::Url;

    pub fn base_uri_resolver(
        frontend_url: Option<Url>,
        admin_url: Option<Url>,
        hostname: Option<String>,
        strict_backchannel: bool,
        proxy_headers: ProxyHeaders,
    ) -> StandardBaseUriResolver {
        StandardBaseUriResolver {
            frontend_url,
            admin_url,
            hostname,
            strict_backchannel,
            proxy_headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use test_log::test;

    fn request(host: &str, secure: bool, headers: &[(&str, &str)]) -> RequestContext {
        RequestContext {
            secure,
            host: host.to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn resolver(proxy_headers: ProxyHeaders) -> StandardBaseUriResolver {
        inject::base_uri_resolver(None, None, None, false, proxy_headers)
    }

    #[test]
    fn plain_request_forms_the_base() {
        let uut = resolver(ProxyHeaders::None);
        let ctx = request("id.example.com:8088", false, &[]);

        let url = uut.resolve(UrlType::Frontend, &ctx).unwrap();

        assert_eq!("http://id.example.com:8088/", url.as_str());
    }

    #[test]
    fn forwarded_headers_are_ignored_without_proxy_mode() {
        let uut = resolver(ProxyHeaders::None);
        let ctx = request(
            "id.example.com",
            false,
            &[
                ("X-Forwarded-Host", "public.example.com"),
                ("X-Forwarded-Proto", "https"),
            ],
        );

        let url = uut.resolve(UrlType::Frontend, &ctx).unwrap();

        assert_eq!("http://id.example.com/", url.as_str());
    }

    #[test]
    fn x_forwarded_headers_rewrite_the_base() {
        let uut = resolver(ProxyHeaders::XForwarded);
        let ctx = request(
            "10.0.0.5:8088",
            false,
            &[
                ("X-Forwarded-Host", "public.example.com"),
                ("X-Forwarded-Proto", "https"),
            ],
        );

        let url = uut.resolve(UrlType::Frontend, &ctx).unwrap();

        assert_eq!("https://public.example.com/", url.as_str());
    }

    #[test]
    fn x_forwarded_port_is_appended_when_host_has_none() {
        let uut = resolver(ProxyHeaders::XForwarded);
        let ctx = request(
            "10.0.0.5:8088",
            false,
            &[
                ("X-Forwarded-Host", "public.example.com"),
                ("X-Forwarded-Port", "8443"),
                ("X-Forwarded-Proto", "https"),
            ],
        );

        let url = uut.resolve(UrlType::Frontend, &ctx).unwrap();

        assert_eq!("https://public.example.com:8443/", url.as_str());
    }

    #[rstest]
    #[case::quoted("host=\"public.example.com\";proto=https", "https://public.example.com/")]
    #[case::unquoted("for=192.0.2.60;proto=https;host=public.example.com", "https://public.example.com/")]
    #[case::first_element_wins(
        "host=public.example.com, host=inner.example.com",
        "http://public.example.com/"
    )]
    #[case::proto_only("proto=https", "https://10.0.0.5:8088/")]
    #[test_log::test]
    fn forwarded_header_is_parsed(#[case] forwarded: &str, #[case] expected: &str) {
        let uut = resolver(ProxyHeaders::Forwarded);
        let ctx = request("10.0.0.5:8088", false, &[("Forwarded", forwarded)]);

        let url = uut.resolve(UrlType::Frontend, &ctx).unwrap();

        assert_eq!(expected, url.as_str());
    }

    #[test]
    fn unusable_forwarded_host_falls_back_to_request_host() {
        let uut = resolver(ProxyHeaders::XForwarded);
        let ctx = request(
            "id.example.com",
            false,
            &[("X-Forwarded-Host", "not a host name")],
        );

        let url = uut.resolve(UrlType::Frontend, &ctx).unwrap();

        assert_eq!("http://id.example.com/", url.as_str());
    }

    #[test]
    fn configured_frontend_url_overrides_the_request() {
        let uut = inject::base_uri_resolver(
            Some(Url::parse("https://id.example.com/").unwrap()),
            None,
            None,
            false,
            ProxyHeaders::None,
        );
        let ctx = request("10.0.0.5:8088", false, &[]);

        let url = uut.resolve(UrlType::Frontend, &ctx).unwrap();

        assert_eq!("https://id.example.com/", url.as_str());
    }

    #[test]
    fn bare_hostname_replaces_only_the_host() {
        let uut = inject::base_uri_resolver(
            None,
            None,
            Some("id.example.com".to_string()),
            false,
            ProxyHeaders::None,
        );
        let ctx = request("10.0.0.5:8088", false, &[]);

        let url = uut.resolve(UrlType::Frontend, &ctx).unwrap();

        assert_eq!("http://id.example.com:8088/", url.as_str());
    }

    #[test]
    fn backend_follows_the_request_by_default() {
        let uut = inject::base_uri_resolver(
            Some(Url::parse("https://id.example.com/").unwrap()),
            None,
            None,
            false,
            ProxyHeaders::None,
        );
        let ctx = request("10.0.0.5:8088", false, &[]);

        let url = uut.resolve(UrlType::Backend, &ctx).unwrap();

        assert_eq!("http://10.0.0.5:8088/", url.as_str());
    }

    #[test]
    fn strict_backchannel_pins_backend_to_frontend() {
        let uut = inject::base_uri_resolver(
            Some(Url::parse("https://id.example.com/").unwrap()),
            None,
            None,
            true,
            ProxyHeaders::None,
        );
        let ctx = request("10.0.0.5:8088", false, &[]);

        let url = uut.resolve(UrlType::Backend, &ctx).unwrap();

        assert_eq!("https://id.example.com/", url.as_str());
    }

    #[test]
    fn admin_falls_back_to_frontend() {
        let uut = inject::base_uri_resolver(
            Some(Url::parse("https://id.example.com/").unwrap()),
            None,
            None,
            false,
            ProxyHeaders::None,
        );
        let ctx = request("10.0.0.5:8088", false, &[]);

        let url = uut.resolve(UrlType::Admin, &ctx).unwrap();

        assert_eq!("https://id.example.com/", url.as_str());
    }

    #[test]
    fn configured_admin_url_wins() {
        let uut = inject::base_uri_resolver(
            Some(Url::parse("https://id.example.com/").unwrap()),
            Some(Url::parse("https://admin.example.com/").unwrap()),
            None,
            false,
            ProxyHeaders::None,
        );
        let ctx = request("10.0.0.5:8088", false, &[]);

        let url = uut.resolve(UrlType::Admin, &ctx).unwrap();

        assert_eq!("https://admin.example.com/", url.as_str());
    }

    #[test]
    fn resolution_is_stable_within_a_request() {
        let uut = resolver(ProxyHeaders::XForwarded);
        let ctx = request(
            "10.0.0.5:8088",
            false,
            &[("X-Forwarded-Host", "public.example.com")],
        );

        assert_eq!(
            uut.resolve(UrlType::Frontend, &ctx),
            uut.resolve(UrlType::Frontend, &ctx)
        );
    }
}
