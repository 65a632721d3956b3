// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Worker pool: a fixed set of OS threads, each repeatedly dequeuing one
//! accepted connection, servicing exactly one request on it, and closing
//! it.
//!
//! Adapted from `hdds-discovery-server::server::DiscoveryServer`'s
//! per-connection task, which reads a length-prefixed message, dispatches
//! on it, and writes a response -- here expressed as a blocking function
//! run on a fixed thread pool rather than a `tokio::spawn`-per-connection
//! task, since this protocol is one-request-one-response-then-close and the
//! concurrency model calls for a bounded pool of blocking threads.

use crate::protocol::{
    key_size_in_bounds, value_size_in_bounds, RequestCode, RequestHeader, ResponseCode,
    ResponseHeader,
};
use crate::queue::WorkQueue;
use crate::store::Store;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// A fixed-size pool of worker threads draining a [`WorkQueue`] of accepted
/// connections.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `num_workers` threads, each looping on `queue.dequeue()` and
    /// servicing accepted connections against `store`.
    pub fn spawn(num_workers: usize, queue: Arc<WorkQueue<TcpStream>>, store: Arc<Store>) -> Self {
        let handles = (0..num_workers)
            .map(|id| {
                let queue = Arc::clone(&queue);
                let store = Arc::clone(&store);
                thread::Builder::new()
                    .name(format!("cream-worker-{id}"))
                    .spawn(move || worker_loop(&queue, &store))
                    .expect("failed to spawn worker thread")
            })
            .collect();
        Self { handles }
    }

    /// Block until every worker thread has exited (the queue must have been
    /// invalidated for that to happen).
    pub fn join(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn worker_loop(queue: &WorkQueue<TcpStream>, store: &Store) {
    loop {
        // dequeue() only returns None once the queue has been invalidated
        // and drained -- unlike a raw semaphore wait, a channel's recv()
        // cannot wake spuriously, so None here means "shut down," not
        // "try again."
        let Some(stream) = queue.dequeue() else {
            break;
        };
        handle_connection(stream, store);
    }
}

/// Per-connection state machine: `await_header -> await_key -> await_value?
/// -> produce_response -> closed`. Any read error or validation failure
/// jumps straight to `produce_response` with `BAD_REQUEST`; the connection
/// is always closed by returning, which drops `stream`.
fn handle_connection(mut stream: TcpStream, store: &Store) {
    let peer = stream.peer_addr().ok();
    debug!(?peer, "accepted connection");

    let header = match RequestHeader::read_from(&mut stream) {
        Ok(header) => header,
        Err(e) => {
            warn!(?peer, error = %e, "short or invalid request header");
            respond(&mut stream, ResponseCode::BadRequest, None);
            return;
        }
    };

    let outcome = match RequestCode::from_u32(header.request_code) {
        Some(RequestCode::Put) => handle_put(&mut stream, &header, store),
        Some(RequestCode::Get) => handle_get(&mut stream, &header, store),
        Some(RequestCode::Evict) => handle_evict(&mut stream, &header, store),
        Some(RequestCode::Clear) => handle_clear(store),
        None => Response::code(ResponseCode::Unsupported),
    };

    respond(&mut stream, outcome.code, outcome.payload.as_deref());
}

/// What a dispatch handler decided to send back.
struct Response {
    code: ResponseCode,
    payload: Option<Vec<u8>>,
}

impl Response {
    fn code(code: ResponseCode) -> Self {
        Self { code, payload: None }
    }

    fn with_payload(code: ResponseCode, payload: Vec<u8>) -> Self {
        Self {
            code,
            payload: Some(payload),
        }
    }
}

fn read_exact_sized(stream: &mut TcpStream, size: u32) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; size as usize];
    stream.read_exact(&mut buf)?;
    Ok(buf)
}

fn handle_put(stream: &mut TcpStream, header: &RequestHeader, store: &Store) -> Response {
    if !key_size_in_bounds(header.key_size) || !value_size_in_bounds(header.value_size) {
        return Response::code(ResponseCode::BadRequest);
    }

    let key = match read_exact_sized(stream, header.key_size) {
        Ok(k) => k,
        Err(_) => return Response::code(ResponseCode::BadRequest),
    };
    let value = match read_exact_sized(stream, header.value_size) {
        Ok(v) => v,
        Err(_) => return Response::code(ResponseCode::BadRequest),
    };

    match store.put(&key, &value, true) {
        Ok(()) => Response::code(ResponseCode::Ok),
        Err(_) => Response::code(ResponseCode::BadRequest),
    }
}

fn handle_get(stream: &mut TcpStream, header: &RequestHeader, store: &Store) -> Response {
    if !key_size_in_bounds(header.key_size) {
        return Response::code(ResponseCode::BadRequest);
    }

    let key = match read_exact_sized(stream, header.key_size) {
        Ok(k) => k,
        Err(_) => return Response::code(ResponseCode::BadRequest),
    };

    match store.get(&key) {
        Some(value) => Response::with_payload(ResponseCode::Ok, value),
        None => Response::code(ResponseCode::NotFound),
    }
}

fn handle_evict(stream: &mut TcpStream, header: &RequestHeader, store: &Store) -> Response {
    if !key_size_in_bounds(header.key_size) {
        return Response::code(ResponseCode::BadRequest);
    }

    let key = match read_exact_sized(stream, header.key_size) {
        Ok(k) => k,
        Err(_) => return Response::code(ResponseCode::BadRequest),
    };

    match store.delete(&key) {
        Some(_) => Response::code(ResponseCode::Ok),
        None => Response::code(ResponseCode::NotFound),
    }
}

fn handle_clear(store: &Store) -> Response {
    match store.clear() {
        Ok(()) => Response::code(ResponseCode::Ok),
        Err(_) => Response::code(ResponseCode::BadRequest),
    }
}

fn respond(stream: &mut TcpStream, code: ResponseCode, payload: Option<&[u8]>) {
    let value_size = payload.map(|p| p.len() as u32).unwrap_or(0);
    let header = ResponseHeader::new(code, value_size);

    if let Err(e) = header.write_to(stream) {
        warn!(error = %e, "failed writing response header");
        return;
    }
    if let Some(payload) = payload {
        if let Err(e) = stream.write_all(payload) {
            warn!(error = %e, "failed writing response payload");
        }
    }
}
