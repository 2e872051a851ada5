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

pub mod endpoints;
pub mod tera;

use ::tera::Tera;
use actix_web::dev::Server;
use actix_web::http::KeepAlive;
use actix_web::middleware::DefaultHeaders;
use actix_web::web::get;
use actix_web::web::route as all;
use actix_web::web::scope;
use actix_web::web::Data;
use actix_web::web::ServiceConfig;
use actix_web::App;
use actix_web::HttpServer;
use keyclave_business::hostname_debug::Handler as HostnameDebugHandler;
use std::sync::Arc;
use tracing::warn;
use Error::LoggedBeforeError;

pub trait Constructor<'a> {
    fn get_template_engine(&self) -> Option<Tera>;
    fn hostname_debug_handler(&self) -> Arc<HostnameDebugHandler>;
    fn hostname_debug_enabled(&self) -> bool;
    fn bind(&self) -> String;
    fn workers(&self) -> Option<usize>;
    fn web_path(&self) -> String;
    fn static_files(&self) -> String;
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error: See above")]
    LoggedBeforeError,

    #[error("IO error")]
    StdIoError(#[from] std::io::Error),
}

pub fn build<'a>(constructor: &impl Constructor<'a>) -> Result<Server, Error> {
    let bind = constructor.bind();
    let workers = constructor.workers();

    let tera = constructor.get_template_engine().ok_or(LoggedBeforeError)?;
    let hostname_debug_handler =
        endpoints::hostname_debug::inject::handler(constructor.hostname_debug_handler());
    let hostname_debug_enabled = constructor.hostname_debug_enabled();

    let web_path = constructor.web_path();
    let static_files = constructor.static_files();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(tera.clone()))
            .app_data(Data::new(hostname_debug_handler.clone()))
            .wrap(DefaultHeaders::new().add(("Cache-Control", "no-store")))
            .wrap(DefaultHeaders::new().add(("Pragma", "no-cache")))
            .configure(routes(
                web_path.clone(),
                static_files.clone(),
                hostname_debug_enabled,
            ))
    })
    .disable_signals()
    .keep_alive(KeepAlive::Timeout(core::time::Duration::from_secs(60)))
    .shutdown_timeout(30);

    let server = server.bind(&bind);

    if let Err(e) = server {
        warn!("Failed to create server: {}", e);
        return Err(e.into());
    }
    let mut server = server.unwrap();

    if let Some(workers) = workers {
        server = server.workers(workers);
    }

    let srv = server.run();
    Ok(srv)
}

fn routes(
    web_path: String,
    static_files: String,
    hostname_debug_enabled: bool,
) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let mut realm_routes = scope(&(web_path.clone() + "/realms"));
        if hostname_debug_enabled {
            realm_routes = realm_routes
                .route(
                    "/{realm}/hostname-debug",
                    get().to(endpoints::hostname_debug::get),
                )
                .route(
                    "/{realm}/hostname-debug",
                    all().to(endpoints::method_not_allowed),
                )
                .route(
                    "/{realm}/hostname-debug/test",
                    get().to(endpoints::hostname_debug::test),
                )
                .route(
                    "/{realm}/hostname-debug/test",
                    all().to(endpoints::method_not_allowed),
                );
        }
        cfg.service(actix_files::Files::new(
            &(web_path.clone() + "/static/css"),
            static_files + "/css",
        ))
        .service(realm_routes)
        .route(
            &(web_path.clone() + "/health"),
            get().to(endpoints::health::get),
        )
        .route(
            &(web_path + "/health"),
            all().to(endpoints::method_not_allowed),
        );
    }
}
