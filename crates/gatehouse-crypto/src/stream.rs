//! Framed, encrypted byte stream.
//!
//! Layout on the raw stream: each side first sends its 32-byte X25519 public
//! key in the clear, then every subsequent frame is a 4-byte big-endian
//! ciphertext length followed by the ChaCha20-Poly1305 ciphertext. Each
//! direction runs its own key and counter nonce, so the read and write
//! halves split cleanly into independently owned values.
//!
//! Inbound bytes accumulate in a buffer and frames are extracted once
//! complete, so a timed-out read loses nothing and can simply be retried.

use std::time::Duration;

use bytes::{Buf, BytesMut};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::error::TransportError;
use crate::keys::{Keypair, PublicKey};

/// Upper bound on a single ciphertext, protecting against hostile lengths.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

const FRAME_HEADER_LEN: usize = 4;
const HANDSHAKE_SALT: &[u8] = b"gatehouse handshake v1";

enum Role {
    Initiator,
    Responder,
}

/// An established encrypted connection over any reliable byte stream.
pub struct SecureStream<S> {
    local: PublicKey,
    remote: PublicKey,
    reader: SecureReader<ReadHalf<S>>,
    writer: SecureWriter<WriteHalf<S>>,
}

impl<S> SecureStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Dial-side handshake: exchange public keys and derive directional keys.
    pub async fn connect(io: S, keypair: &Keypair) -> Result<Self, TransportError> {
        Self::handshake(io, keypair, Role::Initiator).await
    }

    /// Accept-side handshake.
    pub async fn accept(io: S, keypair: &Keypair) -> Result<Self, TransportError> {
        Self::handshake(io, keypair, Role::Responder).await
    }

    async fn handshake(mut io: S, keypair: &Keypair, role: Role) -> Result<Self, TransportError> {
        io.write_all(keypair.public().as_bytes()).await?;
        io.flush().await?;

        let mut remote_bytes = [0u8; 32];
        io.read_exact(&mut remote_bytes).await?;
        let remote = PublicKey::from(remote_bytes);

        let (send_key, recv_key) = derive_keys(keypair, &remote, &role)?;
        let (read_half, write_half) = tokio::io::split(io);
        Ok(Self {
            local: *keypair.public(),
            remote,
            reader: SecureReader::new(read_half, &recv_key),
            writer: SecureWriter::new(write_half, &send_key),
        })
    }

    /// This side's raw public key.
    pub fn local_public_key(&self) -> &PublicKey {
        &self.local
    }

    /// The peer's raw public key, as observed during the handshake.
    pub fn remote_public_key(&self) -> &PublicKey {
        &self.remote
    }

    /// Sets or clears the read timeout; see [`SecureReader::set_read_timeout`].
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.reader.set_read_timeout(timeout);
    }

    /// Reads and opens the next frame.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        self.reader.read_frame().await
    }

    /// Seals and writes one frame.
    pub async fn write_frame(&mut self, plaintext: &[u8]) -> Result<(), TransportError> {
        self.writer.write_frame(plaintext).await
    }

    /// Splits into independently owned read and write halves.
    pub fn into_split(self) -> (SecureReader<ReadHalf<S>>, SecureWriter<WriteHalf<S>>) {
        (self.reader, self.writer)
    }
}

/// Decrypting half of a [`SecureStream`].
pub struct SecureReader<R> {
    io: R,
    cipher: ChaCha20Poly1305,
    nonce_counter: u64,
    pending: BytesMut,
    read_timeout: Option<Duration>,
}

impl<R> SecureReader<R>
where
    R: AsyncRead + Unpin,
{
    fn new(io: R, key: &[u8; 32]) -> Self {
        Self {
            io,
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
            nonce_counter: 0,
            pending: BytesMut::with_capacity(4096),
            read_timeout: None,
        }
    }

    /// Sets or clears the read timeout.
    ///
    /// A timed-out read returns [`TransportError::TimedOut`]; bytes already
    /// buffered are kept, so the caller retries without losing alignment.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    /// Reads the next frame, blocking until one is complete or the timeout
    /// elapses, and returns its decrypted plaintext.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            if let Some(ciphertext) = self.extract_frame()? {
                let nonce = next_nonce(&mut self.nonce_counter);
                return self
                    .cipher
                    .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
                    .map_err(|_| TransportError::Crypto);
            }

            let io = &mut self.io;
            let pending = &mut self.pending;
            let read = match self.read_timeout {
                Some(limit) => tokio::time::timeout(limit, io.read_buf(pending))
                    .await
                    .map_err(|_| TransportError::TimedOut)?,
                None => io.read_buf(pending).await,
            };
            if read? == 0 {
                return Err(TransportError::Closed);
            }
        }
    }

    /// Pops one complete length-delimited ciphertext off the buffer, if any.
    fn extract_frame(&mut self) -> Result<Option<BytesMut>, TransportError> {
        if self.pending.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }
        let declared = u32::from_be_bytes([
            self.pending[0],
            self.pending[1],
            self.pending[2],
            self.pending[3],
        ]) as usize;
        if declared > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge { len: declared, max: MAX_FRAME_LEN });
        }
        if self.pending.len() < FRAME_HEADER_LEN + declared {
            return Ok(None);
        }
        let mut frame = self.pending.split_to(FRAME_HEADER_LEN + declared);
        frame.advance(FRAME_HEADER_LEN);
        Ok(Some(frame))
    }
}

/// Encrypting half of a [`SecureStream`].
pub struct SecureWriter<W> {
    io: W,
    cipher: ChaCha20Poly1305,
    nonce_counter: u64,
}

impl<W> SecureWriter<W>
where
    W: AsyncWrite + Unpin,
{
    fn new(io: W, key: &[u8; 32]) -> Self {
        Self { io, cipher: ChaCha20Poly1305::new(Key::from_slice(key)), nonce_counter: 0 }
    }

    /// Seals `plaintext` and writes it as one length-delimited frame.
    pub async fn write_frame(&mut self, plaintext: &[u8]) -> Result<(), TransportError> {
        let nonce = next_nonce(&mut self.nonce_counter);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| TransportError::Crypto)?;
        if ciphertext.len() > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge {
                len: ciphertext.len(),
                max: MAX_FRAME_LEN,
            });
        }

        // Header and ciphertext go out in a single write.
        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + ciphertext.len());
        frame.extend_from_slice(&(ciphertext.len() as u32).to_be_bytes());
        frame.extend_from_slice(&ciphertext);
        self.io.write_all(&frame).await?;
        self.io.flush().await?;
        Ok(())
    }
}

/// Directional frame keys from the X25519 shared secret.
fn derive_keys(
    keypair: &Keypair,
    remote: &PublicKey,
    role: &Role,
) -> Result<([u8; 32], [u8; 32]), TransportError> {
    let shared = keypair.secret().diffie_hellman(remote);
    if !shared.was_contributory() {
        return Err(TransportError::Handshake);
    }

    let hkdf = Hkdf::<Sha256>::new(Some(HANDSHAKE_SALT), shared.as_bytes());
    let mut initiator_key = [0u8; 32];
    let mut responder_key = [0u8; 32];
    hkdf.expand(b"gatehouse v1 initiator", &mut initiator_key)
        .map_err(|_| TransportError::Crypto)?;
    hkdf.expand(b"gatehouse v1 responder", &mut responder_key)
        .map_err(|_| TransportError::Crypto)?;

    Ok(match role {
        Role::Initiator => (initiator_key, responder_key),
        Role::Responder => (responder_key, initiator_key),
    })
}

fn next_nonce(counter: &mut u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[4..].copy_from_slice(&counter.to_be_bytes());
    *counter = counter.wrapping_add(1);
    nonce
}

#[cfg(test)]
mod tests {
    use tokio::io::DuplexStream;

    use super::*;

    async fn establish() -> (SecureStream<DuplexStream>, SecureStream<DuplexStream>) {
        let (a, b) = tokio::io::duplex(4096);
        let dialer_keys = Keypair::generate();
        let host_keys = Keypair::generate();
        let (dialer, host) = tokio::join!(
            SecureStream::connect(a, &dialer_keys),
            SecureStream::accept(b, &host_keys),
        );
        (dialer.unwrap(), host.unwrap())
    }

    #[tokio::test]
    async fn handshake_exposes_both_public_keys() {
        let (dialer, host) = establish().await;
        assert_eq!(dialer.local_public_key().as_bytes(), host.remote_public_key().as_bytes());
        assert_eq!(dialer.remote_public_key().as_bytes(), host.local_public_key().as_bytes());
    }

    #[tokio::test]
    async fn frames_round_trip_in_both_directions() {
        let (mut dialer, mut host) = establish().await;

        dialer.write_frame(b"hello host").await.unwrap();
        assert_eq!(host.read_frame().await.unwrap(), b"hello host");

        host.write_frame(b"hello dialer").await.unwrap();
        assert_eq!(dialer.read_frame().await.unwrap(), b"hello dialer");
    }

    #[tokio::test]
    async fn sequential_frames_keep_their_order() {
        let (mut dialer, mut host) = establish().await;
        for i in 0..10u8 {
            dialer.write_frame(&[i; 3]).await.unwrap();
        }
        for i in 0..10u8 {
            assert_eq!(host.read_frame().await.unwrap(), vec![i; 3]);
        }
    }

    #[tokio::test]
    async fn read_timeout_is_recoverable() {
        let (mut dialer, mut host) = establish().await;
        host.set_read_timeout(Some(Duration::from_millis(20)));

        let first = host.read_frame().await;
        assert!(matches!(first, Err(TransportError::TimedOut)));

        dialer.write_frame(b"late but intact").await.unwrap();
        assert_eq!(host.read_frame().await.unwrap(), b"late but intact");
    }

    #[tokio::test]
    async fn closed_connection_is_distinguished() {
        let (dialer, mut host) = establish().await;
        drop(dialer);
        assert!(matches!(host.read_frame().await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn garbage_ciphertext_fails_authentication() {
        let (mut raw, b) = tokio::io::duplex(4096);
        let host_keys = Keypair::generate();
        let dialer_keys = Keypair::generate();

        let (host, handshake) = tokio::join!(SecureStream::accept(b, &host_keys), async {
            raw.write_all(dialer_keys.public().as_bytes()).await?;
            raw.flush().await?;
            let mut remote = [0u8; 32];
            raw.read_exact(&mut remote).await?;
            Ok::<_, std::io::Error>(())
        });
        let mut host = host.unwrap();
        handshake.unwrap();

        // A well-formed frame whose ciphertext was never sealed by the peer.
        raw.write_all(&8u32.to_be_bytes()).await.unwrap();
        raw.write_all(&[0xAA; 8]).await.unwrap();
        raw.flush().await.unwrap();

        assert!(matches!(host.read_frame().await, Err(TransportError::Crypto)));
    }

    #[tokio::test]
    async fn oversized_length_header_is_rejected() {
        let (mut raw, b) = tokio::io::duplex(4096);
        let host_keys = Keypair::generate();
        let dialer_keys = Keypair::generate();

        let (host, handshake) = tokio::join!(SecureStream::accept(b, &host_keys), async {
            raw.write_all(dialer_keys.public().as_bytes()).await?;
            raw.flush().await?;
            let mut remote = [0u8; 32];
            raw.read_exact(&mut remote).await?;
            Ok::<_, std::io::Error>(())
        });
        let mut host = host.unwrap();
        handshake.unwrap();

        raw.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
        raw.flush().await.unwrap();

        assert!(matches!(host.read_frame().await, Err(TransportError::FrameTooLarge { .. })));
    }

    #[tokio::test]
    async fn split_halves_operate_independently() {
        let (dialer, host) = establish().await;
        let (mut host_rx, mut host_tx) = host.into_split();
        let (mut dialer_rx, mut dialer_tx) = dialer.into_split();

        dialer_tx.write_frame(b"ping").await.unwrap();
        host_tx.write_frame(b"pong").await.unwrap();
        assert_eq!(host_rx.read_frame().await.unwrap(), b"ping");
        assert_eq!(dialer_rx.read_frame().await.unwrap(), b"pong");
    }
}
