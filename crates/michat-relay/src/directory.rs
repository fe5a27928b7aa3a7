//! Session directory.
//!
//! Binds every observed sender address to a [`SessionToken`] (first seen
//! wins, never rebound) and keeps one published-key slot per token (last
//! write wins). Nothing is ever removed.
//!
//! All operations take the internal lock once, for the map access only;
//! callers never hold it across I/O or cipher work.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use michat_common::SessionToken;
use tracing::debug;

#[derive(Debug, Default)]
struct DirectoryState {
    tokens: HashMap<SocketAddr, SessionToken>,
    addresses: HashMap<SessionToken, SocketAddr>,
    keys: HashMap<SessionToken, String>,
}

/// Directory size counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectoryStats {
    pub sessions: usize,
    pub published_keys: usize,
}

/// Thread-safe address/token/key directory.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    state: RwLock<DirectoryState>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for `addr`, minting and binding a new one on first sight.
    pub fn register(&self, addr: SocketAddr) -> SessionToken {
        let addr = canonical_socketaddr(addr);

        if let Some(token) = self.read().tokens.get(&addr) {
            return token.clone();
        }

        // Re-check under the write lock; another caller may have won.
        let mut state = self.write();
        if let Some(token) = state.tokens.get(&addr) {
            return token.clone();
        }

        let token = loop {
            let candidate = SessionToken::generate();
            if !state.addresses.contains_key(&candidate) {
                break candidate;
            }
        };
        state.tokens.insert(addr, token.clone());
        state.addresses.insert(token.clone(), addr);
        drop(state);

        debug!("new session {} for {}", token, addr);
        token
    }

    pub fn resolve_address(&self, token: &SessionToken) -> Option<SocketAddr> {
        self.read().addresses.get(token).copied()
    }

    pub fn resolve_token(&self, addr: SocketAddr) -> Option<SessionToken> {
        self.read().tokens.get(&canonical_socketaddr(addr)).cloned()
    }

    /// Store `key` in the slot for `token`, replacing any previous key.
    ///
    /// The token does not need to be registered. There is no ownership
    /// check: anyone who knows a token may overwrite its slot.
    pub fn publish_key(&self, token: &SessionToken, key: String) {
        self.write().keys.insert(token.clone(), key);
    }

    pub fn lookup_key(&self, token: &SessionToken) -> Option<String> {
        self.read().keys.get(token).cloned()
    }

    pub fn stats(&self) -> DirectoryStats {
        let state = self.read();
        DirectoryStats {
            sessions: state.tokens.len(),
            published_keys: state.keys.len(),
        }
    }

    // A panic while holding the lock cannot leave the maps half-updated
    // (every mutation is a single insert), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, DirectoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DirectoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drop IPv6 flow labels, which vary per packet and do not identify a peer.
fn canonical_socketaddr(mut addr: SocketAddr) -> SocketAddr {
    if let SocketAddr::V6(ref mut v6) = addr {
        v6.set_flowinfo(0);
    }
    addr
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddrV6;
    use std::sync::Barrier;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_register_is_idempotent() {
        let dir = SessionDirectory::new();
        let a = dir.register(addr("10.0.0.1:5000"));
        let b = dir.register(addr("10.0.0.1:5000"));
        assert_eq!(a, b);
        assert_eq!(dir.stats().sessions, 1);
    }

    #[test]
    fn test_distinct_addresses_get_distinct_tokens() {
        let dir = SessionDirectory::new();
        let a = dir.register(addr("10.0.0.1:5000"));
        let b = dir.register(addr("10.0.0.1:5001"));
        let c = dir.register(addr("10.0.0.2:5000"));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
        assert_eq!(dir.stats().sessions, 3);
    }

    #[test]
    fn test_bidirectional_lookup() {
        let dir = SessionDirectory::new();
        let a = addr("192.0.2.10:40000");
        let token = dir.register(a);

        assert_eq!(dir.resolve_address(&token), Some(a));
        assert_eq!(dir.resolve_token(a), Some(token));
        assert_eq!(dir.resolve_token(addr("192.0.2.10:40001")), None);
    }

    #[test]
    fn test_flowinfo_does_not_split_sessions() {
        let dir = SessionDirectory::new();
        let ip = "2001:db8::5".parse().unwrap();
        let first = SocketAddr::V6(SocketAddrV6::new(ip, 7000, 0, 0));
        let labelled = SocketAddr::V6(SocketAddrV6::new(ip, 7000, 0xbeef, 0));

        let token = dir.register(first);
        assert_eq!(dir.register(labelled), token);
        assert_eq!(dir.resolve_token(labelled), Some(token));
    }

    #[test]
    fn test_concurrent_register_same_address() {
        const THREADS: usize = 16;
        let dir = SessionDirectory::new();
        let barrier = Barrier::new(THREADS);
        let a = addr("198.51.100.3:9527");

        let tokens: Vec<SessionToken> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        dir.register(a)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(tokens.iter().all(|t| t == &tokens[0]));
        assert_eq!(dir.stats().sessions, 1);
        assert_eq!(dir.resolve_address(&tokens[0]), Some(a));
    }

    #[test]
    fn test_publish_overwrites() {
        let dir = SessionDirectory::new();
        let token = dir.register(addr("10.0.0.1:5000"));

        assert_eq!(dir.lookup_key(&token), None);
        dir.publish_key(&token, "K1".to_string());
        dir.publish_key(&token, "K2".to_string());
        assert_eq!(dir.lookup_key(&token).as_deref(), Some("K2"));
        assert_eq!(dir.stats().published_keys, 1);
    }

    #[test]
    fn test_unknown_token_is_absent() {
        let dir = SessionDirectory::new();
        dir.register(addr("10.0.0.1:5000"));

        let unknown = SessionToken::from("00000000000000000000000000000000");
        assert_eq!(dir.resolve_address(&unknown), None);
        assert_eq!(dir.lookup_key(&unknown), None);
    }

    #[test]
    fn test_publish_for_unregistered_token() {
        let dir = SessionDirectory::new();
        let orphan = SessionToken::from("not-a-minted-token");

        dir.publish_key(&orphan, "K".to_string());
        assert_eq!(dir.lookup_key(&orphan).as_deref(), Some("K"));
        assert_eq!(dir.resolve_address(&orphan), None);
        assert_eq!(
            dir.stats(),
            DirectoryStats {
                sessions: 0,
                published_keys: 1
            }
        );
    }
}
