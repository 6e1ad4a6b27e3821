//! Client identity resolution behind trusted proxies.

/// Key used when neither the socket nor the forwarded chain yields an address.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Resolves the real client address from the socket peer and an
/// `X-Forwarded-For` chain, trusting a fixed number of proxy hops.
///
/// Addresses are considered nearest-first: the socket peer, then the
/// forwarded-for entries from right to left. The first `hops` of them are
/// trusted proxies; the next one is the client. With `hops = 0` the socket
/// peer is always the client and forwarded headers are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyTrust {
    hops: usize,
}

impl ProxyTrust {
    pub fn new(hops: usize) -> Self {
        Self { hops }
    }

    pub fn resolve(&self, peer: Option<&str>, forwarded_for: Option<&str>) -> String {
        let forwarded = forwarded_for
            .into_iter()
            .flat_map(|chain| chain.rsplit(','))
            .map(str::trim)
            .filter(|entry| !entry.is_empty());

        let chain: Vec<&str> = peer.into_iter().chain(forwarded).collect();

        if chain.is_empty() {
            return UNKNOWN_CLIENT.to_string();
        }

        // Past the end of the chain, the furthest known address is the best guess.
        let index = self.hops.min(chain.len() - 1);
        chain[index].to_string()
    }
}

impl Default for ProxyTrust {
    fn default() -> Self {
        Self::new(1)
    }
}
