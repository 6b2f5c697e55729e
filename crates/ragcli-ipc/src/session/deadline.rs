//! Socket reads bounded by an absolute expiry.
//!
//! An OS read timeout restarts on every `recv`, so a peer trickling bytes
//! can keep a single frame open indefinitely. [`DeadlineReader`] re-arms the
//! timeout with the time left before each read and fails with
//! [`io::ErrorKind::TimedOut`] once the expiry has passed.

use std::io::{self, Read};
use std::os::unix::net::UnixStream;
use std::time::Instant;

use super::MIN_WAIT;

pub(super) struct DeadlineReader {
    stream: UnixStream,
    expires: Option<Instant>,
}

impl DeadlineReader {
    pub(super) const fn new(stream: UnixStream) -> Self {
        Self {
            stream,
            expires: None,
        }
    }

    /// Bounds every later read by `expires`; `None` blocks indefinitely.
    pub(super) const fn expire_at(&mut self, expires: Option<Instant>) {
        self.expires = expires;
    }
}

impl Read for DeadlineReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let limit = match self.expires {
            Some(expires) => {
                let left = expires.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "read deadline passed",
                    ));
                }
                Some(left.max(MIN_WAIT))
            }
            None => None,
        };
        self.stream.set_read_timeout(limit)?;
        self.stream.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use super::*;

    #[test]
    fn passed_expiry_fails_without_reading() {
        let (local, mut peer) = UnixStream::pair().expect("socket pair");
        peer.write_all(b"ready").expect("write");
        let mut reader = DeadlineReader::new(local);
        reader.expire_at(Some(Instant::now()));

        let mut buffer = [0_u8; 5];
        let error = reader.read(&mut buffer).expect_err("expiry passed");
        assert_eq!(error.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn trickled_bytes_do_not_extend_the_expiry() {
        let (local, mut peer) = UnixStream::pair().expect("socket pair");
        let writer = std::thread::spawn(move || {
            for _ in 0..20 {
                if peer.write_all(b"x").is_err() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        });
        let mut reader = DeadlineReader::new(local);
        let started = Instant::now();
        reader.expire_at(started.checked_add(Duration::from_millis(300)));

        let mut buffer = [0_u8; 64];
        let error = reader.read_exact(&mut buffer).expect_err("expiry reached");
        assert!(matches!(
            error.kind(),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
        ));
        assert!(started.elapsed() < Duration::from_millis(700));
        drop(reader);
        writer.join().expect("writer thread");
    }

    #[test]
    fn unbounded_reader_returns_available_bytes() {
        let (local, mut peer) = UnixStream::pair().expect("socket pair");
        peer.write_all(b"abc").expect("write");
        let mut reader = DeadlineReader::new(local);

        let mut buffer = [0_u8; 3];
        reader.read_exact(&mut buffer).expect("read");
        assert_eq!(&buffer, b"abc");
    }
}
