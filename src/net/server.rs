use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::{HandshakeError, ServerError};
use crate::net::handshake::{run_handshake, HandshakeContext, HandshakeExit, ServerContext};
use crate::net::ingame::{run_ingame, IngameStats, SessionEnd};
use crate::net::session_ids::SessionId;
use crate::net::state::ConnectionState;
use crate::net::transport::{TcpTransport, Transport};

const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Cooperative stop flag polled by the accept loop. Signal handlers and
/// tests flip it; the supervisor then stops every worker.
#[derive(Debug)]
pub struct ServerControl {
    running: AtomicBool,
}

impl Default for ServerControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerControl {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
        }
    }

    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Routes SIGINT and SIGTERM to `control`. Can be installed once per process.
pub fn install_shutdown_handler(control: Arc<ServerControl>) -> Result<(), ServerError> {
    ctrlc::set_handler(move || {
        info!("shutdown signal received");
        control.request_shutdown();
    })?;
    Ok(())
}

/// Releases everything a connection holds. Runs at most once, either
/// explicitly when the worker finishes or from `Drop` on unwind.
pub struct SessionCleanup {
    done: AtomicBool,
    session: SessionId,
    server: Arc<ServerContext>,
    socket: Option<TcpStream>,
}

impl SessionCleanup {
    pub fn new(session: SessionId, server: Arc<ServerContext>, socket: Option<TcpStream>) -> Self {
        Self {
            done: AtomicBool::new(false),
            session,
            server,
            socket,
        }
    }

    pub fn run(&self) -> bool {
        if self.done.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Some(socket) = &self.socket {
            let _ = socket.shutdown(Shutdown::Both);
        }
        let last_state = self.server.states.remove(self.session);
        self.server.session_ids.release(self.session);
        debug!(session = %self.session, ?last_state, "session cleaned up");
        true
    }
}

impl Drop for SessionCleanup {
    fn drop(&mut self) {
        self.run();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Ended(HandshakeExit),
    Played { end: SessionEnd, stats: IngameStats },
}

/// Handshake followed by the steady-state loop for sessions that reach the
/// world.
pub fn run_session<T: Transport>(
    ctx: &mut HandshakeContext<T>,
) -> Result<SessionOutcome, HandshakeError> {
    match run_handshake(ctx)? {
        HandshakeExit::InGame => {
            let (end, stats) = run_ingame(ctx)?;
            Ok(SessionOutcome::Played { end, stats })
        }
        exit => Ok(SessionOutcome::Ended(exit)),
    }
}

pub struct ConnectionWorker {
    session: SessionId,
    peer: SocketAddr,
    stop: Arc<AtomicBool>,
    socket: TcpStream,
    handle: Option<JoinHandle<()>>,
}

impl ConnectionWorker {
    pub fn start(
        stream: TcpStream,
        peer: SocketAddr,
        session: SessionId,
        server: Arc<ServerContext>,
    ) -> io::Result<Self> {
        let mut transport = TcpTransport::new(stream)?;
        transport.set_write_timeout(server.timings.write)?;
        let socket = transport.try_clone_stream()?;
        let cleanup = SessionCleanup::new(
            session,
            Arc::clone(&server),
            Some(transport.try_clone_stream()?),
        );
        let stop = Arc::new(AtomicBool::new(false));
        server.states.add(session);

        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(format!("session-{:04x}", session.get()))
            .spawn(move || {
                let mut ctx = HandshakeContext::new(transport, session, server, thread_stop);
                match run_session(&mut ctx) {
                    Ok(outcome) => info!(session = %session, %peer, ?outcome, "session finished"),
                    Err(HandshakeError::Stopped) => info!(session = %session, %peer, "session stopped"),
                    Err(HandshakeError::ConnectionClosed) => {
                        info!(session = %session, %peer, "peer disconnected")
                    }
                    Err(err) => warn!(session = %session, %peer, error = %err, "session failed"),
                }
                cleanup.run();
            })?;

        Ok(Self {
            session,
            peer,
            stop,
            socket,
            handle: Some(handle),
        })
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.socket.shutdown(Shutdown::Both);
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(session = %self.session, "session thread panicked");
            }
        }
    }
}

pub struct Supervisor {
    server: Arc<ServerContext>,
    max_connections: usize,
    workers: Vec<ConnectionWorker>,
}

impl Supervisor {
    pub fn new(server: Arc<ServerContext>, max_connections: usize) -> Self {
        Self {
            server,
            max_connections,
            workers: Vec::new(),
        }
    }

    pub fn sessions(&self) -> Vec<(SessionId, ConnectionState)> {
        self.server.states.snapshot()
    }

    pub fn active(&self) -> usize {
        self.workers.len()
    }

    fn reap(&mut self) {
        let mut index = 0;
        while index < self.workers.len() {
            if self.workers[index].is_finished() {
                let mut worker = self.workers.swap_remove(index);
                worker.join();
            } else {
                index += 1;
            }
        }
    }

    fn admit(&mut self, stream: TcpStream, peer: SocketAddr) {
        if self.workers.len() >= self.max_connections {
            warn!(%peer, limit = self.max_connections, "connection refused: server full");
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }
        let Some(session) = self.server.session_ids.allocate() else {
            warn!(%peer, "connection refused: session ids exhausted");
            let _ = stream.shutdown(Shutdown::Both);
            return;
        };
        match ConnectionWorker::start(stream, peer, session, Arc::clone(&self.server)) {
            Ok(worker) => {
                info!(session = %session, %peer, "connection accepted");
                self.workers.push(worker);
            }
            Err(err) => {
                warn!(%peer, error = %err, "connection setup failed");
                self.server.states.remove(session);
                self.server.session_ids.release(session);
            }
        }
    }

    pub fn stop_all(&mut self) {
        let count = self.workers.len();
        for worker in self.workers.drain(..) {
            worker.stop();
        }
        if count > 0 {
            info!(count, "stopped all sessions");
        }
    }

    pub fn serve(
        &mut self,
        listener: TcpListener,
        control: &ServerControl,
    ) -> Result<(), ServerError> {
        listener.set_nonblocking(true).map_err(ServerError::Listener)?;
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "gateway listening");
        }

        while control.is_running() {
            self.reap();
            match listener.accept() {
                Ok((stream, peer)) => self.admit(stream, peer),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL);
                }
                Err(err) => {
                    error!(error = %err, "accept failed");
                    thread::sleep(ACCEPT_POLL);
                }
            }
        }

        info!(
            workers = self.active(),
            tracked = self.sessions().len(),
            "gateway stopping"
        );
        self.stop_all();
        Ok(())
    }
}

pub fn bind_listener(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr).map_err(|source| ServerError::Bind {
        addr: addr.to_string(),
        source,
    })
}

pub fn run_server(
    bind_addr: &str,
    server: Arc<ServerContext>,
    max_connections: usize,
    control: &ServerControl,
) -> Result<(), ServerError> {
    let listener = bind_listener(bind_addr)?;
    Supervisor::new(server, max_connections).serve(listener, control)
}
