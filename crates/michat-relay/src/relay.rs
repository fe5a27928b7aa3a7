//! Per-datagram introduction logic.
//!
//! For each inbound datagram:
//! 1. Register the sender address (may mint a new session token)
//! 2. Open the request with the service private key
//! 3. Publish the request's key into the target's slot
//! 4. Resolve the target's address
//! 5. Compose one notice for the target and one for the sender, both
//!    describing the sender's observed address
//! 6. Seal each notice to the key carried inside that same notice
//!
//! Step 6 reproduces the deployed wire behaviour: the target receives the
//! sender's key sealed to the sender's key, and the sender receives whatever
//! key sits in its own slot sealed to that key. Clients depend on this, so
//! it must not be changed to seal to the recipient's key.

use std::net::SocketAddr;
use std::sync::Arc;

use michat_common::{IntroductionNotice, IntroductionRequest, SessionToken};
use michat_crypto::{envelope, DecodeError, EncodeError, ServiceIdentity};
use tracing::debug;

use crate::directory::SessionDirectory;

/// Which of the two notices an outbound datagram carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Sent to the owner of the requested session.
    ToTarget,
    /// Sent back to the requester.
    ToSender,
}

/// A sealed notice ready for the transport.
#[derive(Debug)]
pub struct Outbound {
    pub kind: NoticeKind,
    pub destination: SocketAddr,
    pub payload: Vec<u8>,
}

/// Result of processing one request.
#[derive(Debug)]
pub struct Introduction {
    pub sender: SessionToken,
    pub target: SessionToken,
    pub outbound: Vec<Outbound>,
    /// Notices that could not be produced, with the reason.
    pub skipped: Vec<(NoticeKind, PacketError)>,
}

/// Packet handling errors
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("undecodable request: {0}")]
    Decode(#[from] DecodeError),
    #[error("no address registered for session {0}")]
    DirectoryMiss(SessionToken),
    #[error("no key published for session {0}")]
    MissingKey(SessionToken),
    #[error("failed to seal notice: {0}")]
    Encode(#[from] EncodeError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The rendezvous relay: shared directory plus the service identity.
pub struct Relay {
    directory: Arc<SessionDirectory>,
    identity: Arc<ServiceIdentity>,
}

impl Relay {
    pub fn new(directory: Arc<SessionDirectory>, identity: Arc<ServiceIdentity>) -> Self {
        Self {
            directory,
            identity,
        }
    }

    pub fn directory(&self) -> &SessionDirectory {
        &self.directory
    }

    /// Process one datagram from `src`.
    ///
    /// An `Err` means the whole datagram was dropped and the directory only
    /// learned the sender's address. Individual notices that fail land in
    /// [`Introduction::skipped`] without affecting the other notice.
    pub fn handle_datagram(
        &self,
        packet: &[u8],
        src: SocketAddr,
    ) -> Result<Introduction, PacketError> {
        let sender = self.directory.register(src);

        let request: IntroductionRequest = envelope::decode(packet, self.identity.private_key())?;
        let target = request.target_session;

        self.directory.publish_key(&target, request.publisher_key.clone());

        let mut intro = Introduction {
            sender,
            target,
            outbound: Vec::with_capacity(2),
            skipped: Vec::new(),
        };

        // Notice for the target: the sender's address and the key just published.
        let to_target = self
            .directory
            .resolve_address(&intro.target)
            .ok_or_else(|| PacketError::DirectoryMiss(intro.target.clone()))
            .and_then(|dest| seal(src, request.publisher_key, dest));
        intro.record(NoticeKind::ToTarget, to_target);

        // Notice for the sender: its own address and whatever sits in its own slot.
        let to_sender = self
            .directory
            .lookup_key(&intro.sender)
            .ok_or_else(|| PacketError::MissingKey(intro.sender.clone()))
            .and_then(|key| seal(src, key, src));
        intro.record(NoticeKind::ToSender, to_sender);

        Ok(intro)
    }
}

impl Introduction {
    fn record(&mut self, kind: NoticeKind, sealed: Result<(SocketAddr, Vec<u8>), PacketError>) {
        match sealed {
            Ok((destination, payload)) => self.outbound.push(Outbound {
                kind,
                destination,
                payload,
            }),
            Err(e) => {
                debug!("{:?} notice for {} skipped: {}", kind, self.sender, e);
                self.skipped.push((kind, e));
            }
        }
    }
}

/// Seal a notice about `about` to the key it carries, addressed to `dest`.
fn seal(
    about: SocketAddr,
    key: String,
    dest: SocketAddr,
) -> Result<(SocketAddr, Vec<u8>), PacketError> {
    let notice = IntroductionNotice::for_peer(about, key);
    let payload = envelope::encode_for(&notice, &notice.key)?;
    Ok((dest, payload))
}
