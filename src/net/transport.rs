use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvOutcome {
    Data(usize),
    Timeout,
    Closed,
}

/// Best-effort byte stream as the client uses it: one `recv` is treated as
/// one packet, there is no outer framing.
pub trait Transport: Send {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<RecvOutcome>;
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn shutdown(&mut self);
}

pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    pub fn try_clone_stream(&self) -> io::Result<TcpStream> {
        self.stream.try_clone()
    }
}

impl Transport for TcpTransport {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.set_read_timeout(timeout)
    }

    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.set_write_timeout(timeout)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<RecvOutcome> {
        match self.stream.read(buf) {
            Ok(0) => Ok(RecvOutcome::Closed),
            Ok(n) => Ok(RecvOutcome::Data(n)),
            Err(err)
                if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
            {
                Ok(RecvOutcome::Timeout)
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(RecvOutcome::Timeout),
            Err(err) => Err(err),
        }
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }

    fn shutdown(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Clone)]
    pub enum Incoming {
        Packet(Vec<u8>),
        Timeout,
    }

    /// In-memory transport fed from a script. Runs out of script => peer closed.
    #[derive(Debug, Default)]
    pub struct ScriptedTransport {
        incoming: VecDeque<Incoming>,
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        closed: Arc<Mutex<bool>>,
        pub read_timeouts: Vec<Option<Duration>>,
    }

    impl ScriptedTransport {
        pub fn new(script: impl IntoIterator<Item = Incoming>) -> Self {
            Self {
                incoming: script.into_iter().collect(),
                ..Self::default()
            }
        }

        pub fn sent_log(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
            Arc::clone(&self.sent)
        }

        pub fn closed_flag(&self) -> Arc<Mutex<bool>> {
            Arc::clone(&self.closed)
        }
    }

    impl Transport for ScriptedTransport {
        fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
            self.read_timeouts.push(timeout);
            Ok(())
        }

        fn set_write_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }

        fn recv(&mut self, buf: &mut [u8]) -> io::Result<RecvOutcome> {
            match self.incoming.pop_front() {
                Some(Incoming::Packet(packet)) => {
                    let len = packet.len().min(buf.len());
                    buf[..len].copy_from_slice(&packet[..len]);
                    Ok(RecvOutcome::Data(len))
                }
                Some(Incoming::Timeout) => Ok(RecvOutcome::Timeout),
                None => Ok(RecvOutcome::Closed),
            }
        }

        fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
            if *self.closed.lock().expect("closed flag") {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "transport shut down"));
            }
            self.sent.lock().expect("sent log").push(bytes.to_vec());
            Ok(())
        }

        fn shutdown(&mut self) {
            *self.closed.lock().expect("closed flag") = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn tcp_transport_reports_data_timeout_and_close() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let client = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).expect("connect");
            stream.write_all(&[1, 2, 3]).expect("write");
            let mut reply = [0u8; 2];
            stream.read_exact(&mut reply).expect("reply");
            thread::sleep(Duration::from_millis(150));
            reply
        });

        let (stream, _) = listener.accept().expect("accept");
        let mut transport = TcpTransport::new(stream).expect("transport");
        transport
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("timeout");
        let mut buf = [0u8; 16];
        assert_eq!(transport.recv(&mut buf).expect("recv"), RecvOutcome::Data(3));
        assert_eq!(&buf[..3], &[1, 2, 3]);
        transport.send(&[9, 8]).expect("send");
        transport
            .set_read_timeout(Some(Duration::from_millis(20)))
            .expect("timeout");
        assert_eq!(transport.recv(&mut buf).expect("recv"), RecvOutcome::Timeout);
        assert_eq!(client.join().expect("client"), [9, 8]);
        transport
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("timeout");
        assert_eq!(transport.recv(&mut buf).expect("recv"), RecvOutcome::Closed);
    }
}
