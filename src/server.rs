// TCP accept loop with a bounded worker pool, one upload per connection
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use http::StatusCode;

use crate::config::Srv;
use crate::http::HttpResponse;
use crate::upload::UploadService;

/// Upper bound on bytes discarded after an early error response.
const DRAIN_LIMIT: usize = 64 * 1024;

struct ThreadPool {
    sender: Option<mpsc::SyncSender<TcpStream>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl ThreadPool {
    fn new(size: usize, svc: Arc<UploadService>, active: Arc<AtomicUsize>, timeout: u64) -> Self {
        let (tx, rx) = mpsc::sync_channel::<TcpStream>(size * 2);
        let rx = Arc::new(Mutex::new(rx));
        let mut workers = Vec::with_capacity(size);

        for _ in 0..size {
            let rx = Arc::clone(&rx);
            let svc = Arc::clone(&svc);
            let active = Arc::clone(&active);
            workers.push(thread::spawn(move || {
                loop {
                    let stream = {
                        let lock = match rx.lock() {
                            Ok(g) => g,
                            Err(_) => break,
                        };
                        lock.recv()
                    };
                    match stream {
                        Ok(s) => {
                            let _guard = ConnGuard::new(&active);
                            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                                handle_connection(s, &svc, timeout);
                            }));
                            if result.is_err() {
                                tracing::error!("Panic in connection handler (recovered)");
                            }
                        }
                        Err(_) => break,
                    }
                }
            }));
        }

        ThreadPool { sender: Some(tx), workers }
    }

    fn dispatch(&self, stream: TcpStream) -> Result<(), TcpStream> {
        match &self.sender {
            Some(tx) => tx.try_send(stream).map_err(|e| match e {
                mpsc::TrySendError::Full(s) | mpsc::TrySendError::Disconnected(s) => s,
            }),
            None => Err(stream),
        }
    }

    /// Close the queue. Workers are joined only when `join` is set; otherwise
    /// their handles are dropped and any still stuck on a client are left
    /// behind for process exit to reap.
    fn shutdown(&mut self, join: bool) {
        self.sender.take();
        if !join {
            self.workers.clear();
            return;
        }
        for w in self.workers.drain(..) {
            let _ = w.join();
        }
    }
}

struct ConnGuard<'a>(&'a AtomicUsize);

impl<'a> ConnGuard<'a> {
    fn new(active: &'a AtomicUsize) -> Self {
        active.fetch_add(1, Ordering::AcqRel);
        ConnGuard(active)
    }
}

impl Drop for ConnGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct Server {
    cfg: Srv,
    svc: Arc<UploadService>,
    stop: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

impl Server {
    pub fn new(c: Srv, svc: UploadService) -> Self {
        Server {
            cfg: c,
            svc: Arc::new(svc),
            stop: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Setting the returned flag makes `run`/`serve` drain and return.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.cfg.listen_addr)?;
        self.serve(listener)
    }

    /// Accept on an already bound listener until shutdown is requested.
    pub fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        let num_workers = if self.cfg.worker_threads > 0 {
            self.cfg.worker_threads
        } else {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(4) * 2
        };

        tracing::info!("Listening on {} (http)", listener.local_addr()?);
        tracing::info!("Workers: {num_workers} | Max connections: {}", self.cfg.max_connections);

        let mut pool = ThreadPool::new(
            num_workers,
            Arc::clone(&self.svc),
            Arc::clone(&self.active),
            self.cfg.client_timeout,
        );
        self.accept_loop(&listener, &pool)?;

        tracing::info!("Shutting down...");
        let drained = self.drain();
        pool.shutdown(drained);
        let s = crate::metrics::snapshot();
        tracing::info!(
            uptime_s = s.uptime_seconds,
            connections = s.connections_total,
            preflights = s.preflights,
            uploads = s.uploads_ok,
            errors = s.requests_err,
            truncated = s.truncated_bodies,
            overloaded = s.rejected_overload,
            bytes_in = s.bytes_in,
            bytes_out = s.bytes_out,
            latency_samples = s.latency_samples,
            latency_avg_ms = s.latency_avg_ms,
            latency_max_ms = s.latency_max_ms,
            "Server stopped"
        );
        Ok(())
    }

    fn accept_loop(&self, listener: &TcpListener, pool: &ThreadPool) -> std::io::Result<()> {
        listener.set_nonblocking(true)?;
        let max_conns = self.cfg.max_connections;

        loop {
            if self.stop.load(Ordering::Acquire) { break; }

            match listener.accept() {
                Ok((stream, _)) => {
                    // Accepted sockets may inherit non-blocking mode on some platforms.
                    let _ = stream.set_nonblocking(false);
                    if self.active_connections() >= max_conns {
                        reject_overloaded(stream);
                        continue;
                    }
                    if let Err(s) = pool.dispatch(stream) {
                        reject_overloaded(s);
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock
                           || e.kind() == std::io::ErrorKind::TimedOut => {
                    thread::sleep(Duration::from_millis(20));
                }
                Err(e) => {
                    if !self.stop.load(Ordering::Acquire) {
                        tracing::error!("Accept error: {e}");
                    }
                    thread::sleep(Duration::from_millis(50));
                }
            }
        }
        Ok(())
    }

    /// Wait up to `shutdown_timeout` for in-flight connections. Returns
    /// whether every connection finished in time.
    fn drain(&self) -> bool {
        let timeout_secs = self.cfg.shutdown_timeout;
        let deadline = Instant::now() + Duration::from_secs(timeout_secs);
        let mut last_logged = 0usize;
        loop {
            let active = self.active_connections();
            if active == 0 {
                tracing::info!("All connections drained");
                return true;
            }
            if Instant::now() > deadline {
                tracing::warn!("Forcing shutdown with {active} active connections (timeout {timeout_secs}s)");
                return false;
            }
            if active != last_logged {
                tracing::info!("Waiting for {active} connection(s) to finish...");
                last_logged = active;
            }
            thread::sleep(Duration::from_millis(100));
        }
    }
}

fn reject_overloaded(mut s: TcpStream) {
    crate::metrics::inc_rejected_overload();
    let resp = HttpResponse::error(StatusCode::SERVICE_UNAVAILABLE);
    let _ = s.write_all(&resp.to_bytes());
    let _ = s.shutdown(Shutdown::Both);
}

pub fn handle_connection(mut c: TcpStream, svc: &UploadService, timeout: u64) {
    crate::metrics::inc_connections();
    let started = Instant::now();
    let ip = c.peer_addr().map(|a| a.ip().to_string()).unwrap_or_else(|_| "?".into());

    let timeout = (timeout > 0).then(|| Duration::from_secs(timeout));
    let _ = c.set_read_timeout(timeout);
    let _ = c.set_write_timeout(timeout);
    let _ = c.set_nodelay(true);

    let served = match svc.handle(&mut c) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Failed to write response to {ip}: {e}");
            crate::metrics::inc_requests_err();
            return;
        }
    };
    let Some(status) = served.status else {
        tracing::debug!("{ip} closed without sending a request");
        return;
    };

    crate::log::request(&served.method, served.file_name.as_deref(), &ip);
    let ms = started.elapsed().as_millis() as u64;
    crate::metrics::record_latency(ms);
    if served.method.eq_ignore_ascii_case("OPTIONS") {
        crate::metrics::inc_preflights();
    } else if status.is_success() {
        crate::metrics::inc_uploads_ok();
    } else {
        crate::metrics::inc_requests_err();
    }
    crate::log::response(status, ms);

    let _ = c.shutdown(Shutdown::Write);
    drain_unread(&mut c);
}

/// Swallow whatever the client is still sending so closing the socket does
/// not reset the connection before the response is read.
fn drain_unread(c: &mut TcpStream) {
    let _ = c.set_read_timeout(Some(Duration::from_millis(200)));
    let mut buf = [0u8; 4096];
    let mut total = 0usize;
    while total < DRAIN_LIMIT {
        match c.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => total += n,
        }
    }
}

pub fn install_shutdown_handler(stop: Arc<AtomicBool>) {
    let handler = move || stop.store(true, Ordering::Release);
    if let Err(e) = ctrlc::set_handler(handler) {
        tracing::warn!("Cannot install signal handler: {e}");
    }
}
