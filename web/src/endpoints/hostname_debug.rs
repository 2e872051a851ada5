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

use crate::endpoints::render_template_with_context;
use crate::endpoints::server_error;
use actix_web::http::StatusCode;
use actix_web::web::Data;
use actix_web::web::Path;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use keyclave_business::hostname::RequestContext;
use keyclave_business::hostname_debug;
use keyclave_business::hostname_debug::cors_test_body;
use keyclave_business::hostname_debug::Handler as BusinessHandler;
use keyclave_business::options::RELEVANT_HEADERS;
use std::sync::Arc;
use tera::Context;
use tera::Tera;
use tracing::instrument;
use tracing::warn;

const TEMPLATE: &str = "hostname_debug.html.j2";

#[instrument(skip_all, name = "hostname_debug_get")]
pub async fn get(
    realm_name: Path<String>,
    request: HttpRequest,
    handler: Data<Handler>,
    tera: Data<Tera>,
) -> HttpResponse {
    handler.handle(&realm_name, &request, &tera).await
}

/// Fixed acknowledgement for cross-origin reachability checks. The
/// realm path segment exists for routing symmetry with the report
/// and is deliberately not validated, so no path extractor.
#[instrument(skip_all, name = "hostname_debug_test")]
pub async fn test(request: HttpRequest) -> HttpResponse {
    let mut response = HttpResponse::Ok();
    response.content_type("text/plain");
    response.append_header(("Access-Control-Allow-Methods", "GET"));
    if let Some(origin) = request
        .headers()
        .get("Origin")
        .and_then(|v| v.to_str().ok())
    {
        response.append_header(("Access-Control-Allow-Origin", origin.to_string()));
    }
    response.body(cors_test_body())
}

#[derive(Clone)]
pub struct Handler {
    handler: Arc<BusinessHandler>,
}

impl Handler {
    async fn handle(&self, realm_name: &str, request: &HttpRequest, tera: &Tera) -> HttpResponse {
        let context = request_context(request);
        match self.handler.assemble(realm_name, &context).await {
            Ok(report) => match Context::from_serialize(&report) {
                Ok(tera_context) => {
                    render_template_with_context(TEMPLATE, StatusCode::OK, tera, &tera_context)
                }
                Err(e) => {
                    warn!(%e, "report not serializable");
                    server_error()
                }
            },
            Err(hostname_debug::Error::RealmNotFound) => {
                HttpResponse::NotFound().body("realm not found")
            }
            Err(e @ hostname_debug::Error::Hostname(_)) => {
                warn!(%e, "failed to resolve base URIs");
                server_error()
            }
        }
    }
}

/// Captures the raw request data the resolver and the report work on.
/// Forwarded headers are passed through untouched so the resolver can
/// apply its own proxy-header policy.
pub fn request_context(request: &HttpRequest) -> RequestContext {
    let headers = RELEVANT_HEADERS
        .iter()
        .filter_map(|name| {
            request
                .headers()
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .map(|v| ((*name).to_string(), v.to_string()))
        })
        .collect();
    let host = request
        .headers()
        .get("Host")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|v| v.to_string()))
        .unwrap_or_else(|| request.app_config().host().to_string());
    RequestContext {
        secure: request.app_config().secure(),
        host,
        headers,
    }
}

pub mod inject {
    use super::Handler;
    use keyclave_business::hostname_debug::Handler as BusinessHandler;
    use std::sync::Arc;

    pub fn handler(handler: Arc<BusinessHandler>) -> Handler {
        Handler { handler }
    }
}
