//! UDP datagram receiver.
//!
//! One [`DatagramReceiver`] owns one socket. Setup happens in
//! [`DatagramReceiver::bind`] and is all-or-nothing for the things that
//! matter (socket, bind, group join); interface binding and buffer sizing
//! degrade to warnings. [`DatagramReceiver::spawn`] moves the socket into a
//! named thread running the poll loop until the shared running flag clears.

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::socket::{
    AddressFamily, SockFlag, SockType, SockaddrIn, bind as nix_bind, setsockopt, socket, sockopt,
};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::os::fd::{AsFd, AsRawFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};
use udpjson_common::consts::{POLL_INTERVAL_MS, RECV_BUFFER_SIZE};

use crate::config::ChannelConfig;
use crate::stats::{ChannelStats, StatsSnapshot};

/// Channel setup failure.
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// `socket(2)` failed.
    #[error("{channel}: socket creation failed: {source}")]
    Socket {
        /// Channel label.
        channel: String,
        /// Underlying errno.
        source: Errno,
    },

    /// `SO_REUSEADDR` could not be set.
    #[error("{channel}: SO_REUSEADDR failed: {source}")]
    ReuseAddr {
        /// Channel label.
        channel: String,
        /// Underlying errno.
        source: Errno,
    },

    /// `bind(2)` failed.
    #[error("{channel}: bind to port {port} failed: {source}")]
    Bind {
        /// Channel label.
        channel: String,
        /// Requested port.
        port: u16,
        /// Underlying errno.
        source: Errno,
    },

    /// Multicast group join failed.
    #[error("{channel}: joining {group} failed: {source}")]
    JoinGroup {
        /// Channel label.
        channel: String,
        /// Multicast group.
        group: Ipv4Addr,
        /// Underlying error.
        source: io::Error,
    },

    /// Socket could not be switched to non-blocking mode.
    #[error("{channel}: socket configuration failed: {source}")]
    Configure {
        /// Channel label.
        channel: String,
        /// Underlying error.
        source: io::Error,
    },

    /// Receive thread could not be started.
    #[error("{channel}: failed to spawn receive thread: {source}")]
    Spawn {
        /// Channel label.
        channel: String,
        /// Underlying error.
        source: io::Error,
    },
}

/// A bound, configured UDP socket.
pub struct DatagramReceiver {
    label: String,
    socket: UdpSocket,
    stats: Arc<ChannelStats>,
}

impl DatagramReceiver {
    /// Create, configure and bind the socket described by `config`.
    ///
    /// # Errors
    /// Socket creation, `SO_REUSEADDR`, bind, group join and the
    /// non-blocking switch are fatal for this channel.
    pub fn bind(label: impl Into<String>, config: &ChannelConfig) -> Result<Self, ReceiverError> {
        let label = label.into();

        let fd = socket(
            AddressFamily::Inet,
            SockType::Datagram,
            SockFlag::empty(),
            None,
        )
        .map_err(|source| ReceiverError::Socket {
            channel: label.clone(),
            source,
        })?;

        setsockopt(&fd, sockopt::ReuseAddr, &true).map_err(|source| ReceiverError::ReuseAddr {
            channel: label.clone(),
            source,
        })?;

        if config.recv_buf_size > 0 {
            if let Err(e) = setsockopt(&fd, sockopt::RcvBuf, &(config.recv_buf_size as usize)) {
                warn!("{}: failed to set SO_RCVBUF={}: {}", label, config.recv_buf_size, e);
            }
        }

        let iface_addr = match config.iface.as_deref() {
            Some(iface) => {
                bind_to_device(&label, &fd, iface);
                interface_ipv4(&label, iface)
            }
            None => Ipv4Addr::UNSPECIFIED,
        };

        let local = SockaddrIn::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port));
        nix_bind(fd.as_raw_fd(), &local).map_err(|source| ReceiverError::Bind {
            channel: label.clone(),
            port: config.port,
            source,
        })?;

        let socket = UdpSocket::from(fd);

        if let Some(group) = config.multicast_ip {
            socket
                .join_multicast_v4(&group, &iface_addr)
                .map_err(|source| ReceiverError::JoinGroup {
                    channel: label.clone(),
                    group,
                    source,
                })?;
        }

        socket
            .set_nonblocking(true)
            .map_err(|source| ReceiverError::Configure {
                channel: label.clone(),
                source,
            })?;

        match config.multicast_ip {
            Some(group) => info!(
                "{}: listening on {}:{} (iface {})",
                label,
                group,
                config.port,
                config.iface.as_deref().unwrap_or("any")
            ),
            None => info!("{}: listening on port {}", label, config.port),
        }

        Ok(Self {
            label,
            socket,
            stats: Arc::new(ChannelStats::new()),
        })
    }

    /// Channel label used in logs and the thread name.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Counters of this channel.
    pub fn stats(&self) -> Arc<ChannelStats> {
        Arc::clone(&self.stats)
    }

    /// Run the receive loop on the calling thread.
    ///
    /// Waits at most one poll interval for readability, then reads one
    /// datagram. `handler` returns whether the datagram was accepted. The
    /// loop returns within one poll interval of `running` clearing.
    pub fn run<F>(&self, running: &AtomicBool, mut handler: F)
    where
        F: FnMut(&[u8]) -> bool,
    {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        debug!("{}: receive loop started", self.label);

        while running.load(Ordering::SeqCst) {
            let mut fds = [PollFd::new(self.socket.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, PollTimeout::from(POLL_INTERVAL_MS)) {
                Ok(0) => continue,
                Ok(_) => {}
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    error!("{}: poll failed: {}", self.label, e);
                    std::thread::sleep(std::time::Duration::from_millis(u64::from(
                        POLL_INTERVAL_MS,
                    )));
                    continue;
                }
            }

            let len = match self.socket.recv(&mut buf) {
                Ok(0) => continue,
                Ok(len) => len,
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::Interrupted =>
                {
                    continue;
                }
                Err(e) => {
                    debug!("{}: recv failed: {}", self.label, e);
                    continue;
                }
            };

            self.stats.record_datagram(len);
            trace!("{}: {} bytes", self.label, len);
            if handler(&buf[..len]) {
                self.stats.record_accepted();
            } else {
                self.stats.record_dropped();
            }
        }

        info!("{}: receive loop stopped ({})", self.label, self.stats.snapshot());
    }

    /// Move the receiver into a named thread running [`run`](Self::run).
    ///
    /// # Errors
    /// Returns `ReceiverError::Spawn` if the thread cannot be created; the
    /// socket is closed in that case.
    pub fn spawn<F>(self, running: Arc<AtomicBool>, handler: F) -> Result<ReceiverTask, ReceiverError>
    where
        F: FnMut(&[u8]) -> bool + Send + 'static,
    {
        let label = self.label.clone();
        let stats = self.stats();
        let flag = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name(format!("udpjson-{label}"))
            .spawn(move || self.run(&flag, handler))
            .map_err(|source| ReceiverError::Spawn {
                channel: label.clone(),
                source,
            })?;

        Ok(ReceiverTask {
            label,
            running,
            stats,
            handle: Some(handle),
        })
    }
}

/// Handle to a receive loop running on its own thread.
///
/// Dropping the handle stops and joins the loop.
pub struct ReceiverTask {
    label: String,
    running: Arc<AtomicBool>,
    stats: Arc<ChannelStats>,
    handle: Option<JoinHandle<()>>,
}

impl ReceiverTask {
    /// Channel label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// True once the loop thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Clear the running flag and wait for the loop to exit.
    ///
    /// The flag is shared, so every loop started with it stops as well.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.join();
    }

    /// Wait for the loop to exit without touching the flag.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("{}: receive thread panicked", self.label);
            }
        }
    }
}

impl Drop for ReceiverTask {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(target_os = "linux")]
fn bind_to_device(label: &str, fd: &std::os::fd::OwnedFd, iface: &str) {
    if let Err(e) = setsockopt(fd, sockopt::BindToDevice, &std::ffi::OsString::from(iface)) {
        warn!("{}: failed to bind device {}: {}", label, iface, e);
    }
}

#[cfg(not(target_os = "linux"))]
fn bind_to_device(label: &str, _fd: &std::os::fd::OwnedFd, iface: &str) {
    warn!("{}: binding to device {} is not supported on this platform", label, iface);
}

/// IPv4 address of `iface`, or `UNSPECIFIED` if it has none.
fn interface_ipv4(label: &str, iface: &str) -> Ipv4Addr {
    let addrs = match nix::ifaddrs::getifaddrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            warn!("{}: interface lookup failed: {}", label, e);
            return Ipv4Addr::UNSPECIFIED;
        }
    };

    for ifa in addrs {
        if ifa.interface_name != iface {
            continue;
        }
        if let Some(sin) = ifa.address.as_ref().and_then(|a| a.as_sockaddr_in()) {
            return *SocketAddrV4::from(*sin).ip();
        }
    }

    warn!("{}: interface {} has no IPv4 address, joining on any", label, iface);
    Ipv4Addr::UNSPECIFIED
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    fn loopback_channel() -> ChannelConfig {
        ChannelConfig::unicast(0)
    }

    #[test]
    fn binds_ephemeral_port() {
        let receiver = DatagramReceiver::bind("test", &loopback_channel()).unwrap();
        let addr = receiver.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(receiver.label(), "test");
    }

    #[test]
    fn bind_conflict_without_reuse_is_reported() {
        let blocker = UdpSocket::bind("0.0.0.0:0").unwrap();
        let port = blocker.local_addr().unwrap().port();

        // The blocker did not set SO_REUSEADDR, so the kernel refuses.
        let result = DatagramReceiver::bind("dup", &ChannelConfig::unicast(port));
        assert!(matches!(result, Err(ReceiverError::Bind { .. })));
    }

    #[test]
    fn delivers_datagrams_and_counts_them() {
        let receiver = DatagramReceiver::bind("rx", &loopback_channel()).unwrap();
        let port = receiver.local_addr().unwrap().port();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let running = Arc::new(AtomicBool::new(true));
        let mut task = receiver
            .spawn(Arc::clone(&running), move |data| {
                sink.lock().unwrap().push(data.to_vec());
                data != b"bad"
            })
            .unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(b"hello", ("127.0.0.1", port)).unwrap();
        sender.send_to(b"bad", ("127.0.0.1", port)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while task.stats().datagrams < 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        task.stop();
        assert!(task.is_finished());

        let snap = task.stats();
        assert_eq!(snap.datagrams, 2);
        assert_eq!(snap.bytes, 8);
        assert_eq!(snap.accepted, 1);
        assert_eq!(snap.dropped, 1);
        assert_eq!(seen.lock().unwrap()[0], b"hello");
    }

    #[test]
    fn stop_returns_within_poll_interval() {
        let receiver = DatagramReceiver::bind("idle", &loopback_channel()).unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let mut task = receiver.spawn(running, |_| true).unwrap();

        std::thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        task.stop();
        assert!(started.elapsed() < Duration::from_millis(u64::from(POLL_INTERVAL_MS) * 3));
    }
}
