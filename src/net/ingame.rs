use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::error::HandshakeError;
use crate::net::handshake::HandshakeContext;
use crate::net::packets::{PingResponder, KEEPALIVE_LONG, KEEPALIVE_SHORT, TRANSMISSION_END};
use crate::net::transport::Transport;

#[derive(Debug, Clone, Copy)]
pub struct KeepaliveSchedule {
    interval: Duration,
    next_due: Instant,
}

impl KeepaliveSchedule {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_due: now + interval,
        }
    }

    pub fn due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    pub fn mark_sent(&mut self, now: Instant) {
        self.next_due = now + self.interval;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    PeerClosed,
    Stopped,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngameStats {
    pub short_keepalives: u64,
    pub long_keepalives: u64,
    pub pings: u64,
}

/// Steady-state loop after the world data packet: keepalives on two timers
/// and ping replies, until the peer leaves or the server stops.
pub fn run_ingame<T: Transport>(
    ctx: &mut HandshakeContext<T>,
) -> Result<(SessionEnd, IngameStats), HandshakeError> {
    let timings = ctx.timings();
    ctx.set_read_timeout(timings.poll)?;
    let started = Instant::now();
    let mut short = KeepaliveSchedule::new(timings.keepalive_short, started);
    let mut long = KeepaliveSchedule::new(timings.keepalive_long, started);
    let mut pings = PingResponder::new();
    let mut stats = IngameStats::default();
    info!(session = %ctx.session(), "session in game");

    loop {
        let now = Instant::now();
        if short.due(now) {
            ctx.send(KEEPALIVE_SHORT, "keepalive short")?;
            ctx.send(TRANSMISSION_END, "transmission end")?;
            short.mark_sent(now);
            stats.short_keepalives += 1;
        }
        if long.due(now) {
            ctx.send(KEEPALIVE_LONG, "keepalive long")?;
            long.mark_sent(now);
            stats.long_keepalives += 1;
        }

        let packet = match ctx.recv_once() {
            Ok(Some(packet)) => packet,
            Ok(None) => continue,
            Err(HandshakeError::ConnectionClosed) => {
                debug!(session = %ctx.session(), ?stats, "peer closed");
                return Ok((SessionEnd::PeerClosed, stats));
            }
            Err(HandshakeError::Stopped) => return Ok((SessionEnd::Stopped, stats)),
            Err(err) => return Err(err),
        };
        match pings.respond(&packet) {
            Some(reply) => {
                ctx.send(&reply, "ping reply")?;
                stats.pings += 1;
            }
            None => trace!(session = %ctx.session(), len = packet.len(), "ignoring in-game packet"),
        }
    }
}
