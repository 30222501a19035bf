//! UDP channel endpoints.
//!
//! One datagram carries exactly one encoded message. The sender resolves
//! its fixed peer address once at construction; the receiver binds its
//! fixed local address and drains the socket into a conflating buffer on
//! every receive call, so kernel-side backlog can never grow stale.

use crate::channel::ConflatingQueue;
use crate::error::ChannelError;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

/// Largest datagram we expect on the link. Observations with an attached
/// camera frame dominate; commands are tiny.
const MAX_DATAGRAM_SIZE: usize = 65507;

/// Poll interval for timed receives
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Sending half of a channel, pinned to one peer endpoint.
pub struct UdpSender {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpSender {
    /// Create a sender towards `target` (e.g. "192.168.31.86:5555").
    pub fn connect(target: &str) -> Result<Self, ChannelError> {
        let target = target
            .to_socket_addrs()
            .map_err(|e| ChannelError::Unreachable(format!("{target}: {e}")))?
            .next()
            .ok_or_else(|| ChannelError::Unreachable(format!("{target}: no address")))?;

        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| ChannelError::Unreachable(format!("bind: {e}")))?;

        log::debug!("channel sender -> {}", target);
        Ok(Self { socket, target })
    }

    /// Send one message. Fire-and-forget: no acknowledgement, no
    /// backpressure. Delivery is at-most-once.
    pub fn send(&self, bytes: &[u8]) -> Result<(), ChannelError> {
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(ChannelError::Unreachable(format!(
                "message of {} bytes exceeds datagram limit",
                bytes.len()
            )));
        }
        self.socket
            .send_to(bytes, self.target)
            .map_err(|e| ChannelError::Unreachable(format!("{}: {e}", self.target)))?;
        Ok(())
    }

    /// Fixed peer endpoint this sender delivers to
    pub fn peer_addr(&self) -> SocketAddr {
        self.target
    }
}

/// Receiving half of a channel, bound to one local endpoint.
///
/// Incoming datagrams are pulled off the socket into a bounded conflating
/// queue; under overload the oldest buffered message is dropped first.
pub struct UdpReceiver {
    socket: UdpSocket,
    queue: ConflatingQueue<Vec<u8>>,
    recv_buffer: Vec<u8>,
}

impl UdpReceiver {
    /// Bind the local endpoint (e.g. "0.0.0.0:5556") with a receive queue
    /// of `capacity` messages.
    pub fn bind(addr: &str, capacity: usize) -> Result<Self, ChannelError> {
        let socket = UdpSocket::bind(addr)
            .map_err(|e| ChannelError::Unreachable(format!("{addr}: {e}")))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| ChannelError::Unreachable(format!("{addr}: {e}")))?;

        log::debug!("channel receiver bound on {addr} (queue capacity {capacity})");
        Ok(Self {
            socket,
            queue: ConflatingQueue::new(capacity),
            recv_buffer: vec![0u8; MAX_DATAGRAM_SIZE],
        })
    }

    /// Local address, useful when bound to an ephemeral port
    pub fn local_addr(&self) -> Result<SocketAddr, ChannelError> {
        self.socket
            .local_addr()
            .map_err(|e| ChannelError::Unreachable(e.to_string()))
    }

    /// Move every pending datagram from the socket into the queue
    fn pump(&mut self) {
        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((len, _)) => {
                    if self.queue.push(self.recv_buffer[..len].to_vec()).is_some() {
                        log::trace!("receive queue full, dropped oldest message");
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    // Transient socket errors are not fatal on a lossy link
                    log::debug!("recv error: {e}");
                    break;
                }
            }
        }
    }

    /// Non-blocking receive of the oldest buffered message
    pub fn try_receive(&mut self) -> Option<Vec<u8>> {
        self.pump();
        self.queue.pop()
    }

    /// Receive with a deadline. Fails with [`ChannelError::Timeout`] when
    /// nothing arrives in time; the caller retries or marks the session
    /// stale.
    pub fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>, ChannelError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(bytes) = self.try_receive() {
                return Ok(bytes);
            }
            if Instant::now() >= deadline {
                return Err(ChannelError::Timeout);
            }
            std::thread::sleep(RECV_POLL_INTERVAL);
        }
    }

    /// Drain all buffered messages and return only the newest.
    ///
    /// The conflated read used by control loops that only ever want the
    /// freshest sample.
    pub fn latest(&mut self) -> Option<Vec<u8>> {
        self.pump();
        self.queue.latest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_pair(capacity: usize) -> (UdpSender, UdpReceiver) {
        let receiver = UdpReceiver::bind("127.0.0.1:0", capacity).unwrap();
        let addr = receiver.local_addr().unwrap();
        let sender = UdpSender::connect(&addr.to_string()).unwrap();
        (sender, receiver)
    }

    /// Loopback delivery is fast but not instantaneous; poll briefly.
    fn recv_with_retry(receiver: &mut UdpReceiver) -> Option<Vec<u8>> {
        receiver.receive(Duration::from_millis(500)).ok()
    }

    #[test]
    fn send_and_receive_roundtrip() {
        let (sender, mut receiver) = loopback_pair(8);
        sender.send(b"hello").unwrap();
        assert_eq!(recv_with_retry(&mut receiver).unwrap(), b"hello");
    }

    #[test]
    fn receive_times_out_when_idle() {
        let (_sender, mut receiver) = loopback_pair(8);
        let result = receiver.receive(Duration::from_millis(20));
        assert!(matches!(result, Err(ChannelError::Timeout)));
    }

    #[test]
    fn capacity_one_buffers_most_recent_send() {
        let (sender, mut receiver) = loopback_pair(1);
        for i in 0..5u8 {
            sender.send(&[i]).unwrap();
        }
        // Let the datagrams land before draining the socket
        std::thread::sleep(Duration::from_millis(100));
        let newest = receiver.latest().unwrap();
        assert_eq!(newest, vec![4]);
        assert!(receiver.try_receive().is_none());
    }

    #[test]
    fn unresolvable_peer_is_unreachable() {
        let result = UdpSender::connect("not-a-host.invalid:5555");
        assert!(matches!(result, Err(ChannelError::Unreachable(_))));
    }

    #[test]
    fn oversized_message_is_rejected() {
        let (sender, _receiver) = loopback_pair(1);
        let huge = vec![0u8; MAX_DATAGRAM_SIZE + 1];
        assert!(matches!(
            sender.send(&huge),
            Err(ChannelError::Unreachable(_))
        ));
    }
}
