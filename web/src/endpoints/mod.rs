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

pub mod health;
pub mod hostname_debug;

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use tera::Context;
use tera::Tera;
use tracing::warn;

pub async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().body("method not allowed")
}

fn server_error() -> HttpResponse {
    HttpResponse::InternalServerError().body("internal error")
}

fn render_template_with_context(
    name: &str,
    code: StatusCode,
    tera: &Tera,
    context: &Context,
) -> HttpResponse {
    match tera.render(name, context) {
        Ok(body) => HttpResponse::build(code)
            .content_type("text/html")
            .body(body),
        Err(e) => {
            warn!(%e, template = name, "failed to render");
            server_error()
        }
    }
}
