// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Server wiring: binds the listener, owns the store and work queue, and
//! spawns the worker pool.
//!
//! Grounded on `hdds-discovery-server::server::DiscoveryServer`, adapted
//! from an async accept loop spawning one `tokio` task per connection to a
//! blocking accept loop pushing connections onto a fixed-size worker pool,
//! matching this protocol's one-request-one-response-then-close contract
//! and its mandated bounded thread pool.

use crate::config::Config;
use crate::queue::WorkQueue;
use crate::store::{Store, StoreError};
use crate::worker::WorkerPool;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Server-level errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to create store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to bind listener on {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),
}

/// The cream cache server: one [`Store`], one [`WorkQueue`], and a fixed
/// pool of worker threads draining it.
pub struct CreamServer {
    config: Config,
    store: Arc<Store>,
    queue: Arc<WorkQueue<TcpStream>>,
}

impl CreamServer {
    /// Construct a server with a fresh store of `config.max_entries`
    /// capacity. Does not bind a socket yet -- see [`CreamServer::run`].
    pub fn new(config: Config) -> Result<Self, ServerError> {
        let store = Arc::new(Store::create(config.max_entries)?);
        Ok(Self {
            config,
            store,
            queue: Arc::new(WorkQueue::create()),
        })
    }

    /// Bind the listener, spawn the worker pool, and accept connections
    /// until the process is terminated. A transient `accept` error is
    /// logged and accepting continues; a bind failure is fatal and returned
    /// to the caller.
    pub fn run(&self) -> Result<(), ServerError> {
        let addr = SocketAddr::new(self.config.bind_address, self.config.port);
        let listener =
            TcpListener::bind(addr).map_err(|e| ServerError::Bind(addr, e))?;

        info!(
            %addr,
            workers = self.config.num_workers,
            capacity = self.config.max_entries,
            "cream listening"
        );

        let pool = WorkerPool::spawn(
            self.config.num_workers,
            Arc::clone(&self.queue),
            Arc::clone(&self.store),
        );

        for conn in listener.incoming() {
            match conn {
                Ok(stream) => {
                    if let Err(e) = self.queue.enqueue(stream) {
                        warn!(error = %e, "failed to enqueue accepted connection");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "transient accept error");
                }
            }
        }

        // listener.incoming() only stops yielding once the listener itself
        // is dropped; reachable only via `shutdown` racing a fresh accept.
        pool.join();
        Ok(())
    }

    /// Bind the listener and run it on a background thread, returning
    /// immediately with the bound address. Used by tests that need a live
    /// server without blocking the calling thread.
    pub fn spawn_background(self: Arc<Self>) -> SocketAddr {
        let addr = SocketAddr::new(self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(addr).expect("bind for background server");
        let bound = listener.local_addr().expect("local_addr");

        let pool = WorkerPool::spawn(
            self.config.num_workers,
            Arc::clone(&self.queue),
            Arc::clone(&self.store),
        );

        std::thread::spawn(move || {
            for conn in listener.incoming() {
                match conn {
                    Ok(stream) => {
                        if self.queue.enqueue(stream).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "transient accept error");
                    }
                }
            }
            pool.join();
        });

        bound
    }

    /// Invalidate the queue and store. Connections already queued are
    /// closed without being serviced; in-flight connections finish
    /// normally.
    pub fn shutdown(&self) {
        self.queue.invalidate(|stream| drop(stream));
        let _ = self.store.invalidate();
    }
}
