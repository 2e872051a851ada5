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
use crate::constructor::Constructor;
use crate::terminate::terminator;
use keyclave_business::hostname_debug::ServerMode;

use actix_web::dev::ServerHandle;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::sync::oneshot::Receiver;
use tracing::error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Error: See above")]
    LoggedBeforeError,

    #[error("Template error: {0}")]
    TeraError(#[from] tera::Error),
}

pub fn run(config: Config, server_mode: ServerMode) -> Result<(), Error> {
    let actor_system = actix_rt::System::with_tokio_rt(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .thread_name(env!("CARGO_PKG_NAME"))
            .build()
            .map_err(|e| {
                error!("failed to start tokio runtime: {}", e);
                e
            })
            .unwrap()
    });
    actor_system.block_on(async move {
        let constructor = match Constructor::new(&config, server_mode) {
            Err(e) => {
                error!("startup failed: {}", e);
                return;
            }
            Ok(v) => v,
        };

        let (pass_server, receive_server) = oneshot::channel();
        tokio::spawn(runtime_primitives(receive_server));

        let srv = match keyclave_web::build(&constructor) {
            Err(e) => {
                error!("startup failed: {}", e);
                return;
            }
            Ok(srv) => srv,
        };
        if pass_server.send(srv.handle()).is_err() {
            error!("failed to create server");
            return;
        }
        if let Err(e) = srv.await {
            error!("HTTP server failed: {}", e);
        }
    });
    Ok(())
}

async fn runtime_primitives(receive_server: Receiver<ServerHandle>) {
    let server = match receive_server.await {
        Err(e) => {
            error!("failed to receive server: {}", e);
            return;
        }
        Ok(server) => server,
    };

    tokio::spawn(terminator(server));
}
