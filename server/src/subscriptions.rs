//! Change-feed subscribers and their connection health
//!
//! Each client that opens a match page subscribes to that match's change
//! feed. This module tracks:
//! - which address listens to which match, and as which player
//! - when each subscriber was last heard from (heartbeats or any packet)
//! - the subscriber cap
//!
//! A subscriber that goes silent past the timeout is reported so the
//! presence manager can retire its match, covering abrupt disconnects where
//! no leave signal ever arrives.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A client watching one match
#[derive(Debug, Clone)]
pub struct Subscriber {
    /// Where snapshots are sent
    pub addr: SocketAddr,
    pub match_id: String,
    pub player_name: String,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Subscriber {
    pub fn new(addr: SocketAddr, match_id: &str, player_name: &str) -> Self {
        Self {
            addr,
            match_id: match_id.to_string(),
            player_name: player_name.to_string(),
            last_seen: Instant::now(),
        }
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

pub struct SubscriptionManager {
    subscribers: HashMap<SocketAddr, Subscriber>,
    max_subscribers: usize,
    timeout: Duration,
}

impl SubscriptionManager {
    pub fn new(max_subscribers: usize, timeout: Duration) -> Self {
        Self {
            subscribers: HashMap::new(),
            max_subscribers,
            timeout,
        }
    }

    /// Registers `addr` as a listener of `match_id`.
    ///
    /// An address listens to one match at a time; subscribing again replaces
    /// the previous subscription. Returns false when the server is at
    /// capacity.
    pub fn subscribe(&mut self, addr: SocketAddr, match_id: &str, player_name: &str) -> bool {
        if !self.subscribers.contains_key(&addr) && self.subscribers.len() >= self.max_subscribers
        {
            return false;
        }

        info!("{} ({}) subscribed to match {}", player_name, addr, match_id);
        self.subscribers
            .insert(addr, Subscriber::new(addr, match_id, player_name));
        true
    }

    pub fn unsubscribe(&mut self, addr: &SocketAddr) -> Option<Subscriber> {
        self.subscribers.remove(addr)
    }

    /// Marks the subscriber at `addr` as alive. Returns false if unknown.
    pub fn refresh(&mut self, addr: &SocketAddr) -> bool {
        if let Some(subscriber) = self.subscribers.get_mut(addr) {
            subscriber.last_seen = Instant::now();
            true
        } else {
            false
        }
    }

    /// Addresses listening to `match_id`
    pub fn addrs_for(&self, match_id: &str) -> Vec<SocketAddr> {
        self.subscribers
            .values()
            .filter(|s| s.match_id == match_id)
            .map(|s| s.addr)
            .collect()
    }

    /// Drops every subscription to a retired match
    pub fn remove_match(&mut self, match_id: &str) -> usize {
        let before = self.subscribers.len();
        self.subscribers.retain(|_, s| s.match_id != match_id);
        before - self.subscribers.len()
    }

    /// Removes and returns subscribers that went silent
    pub fn check_timeouts(&mut self) -> Vec<Subscriber> {
        let timeout = self.timeout;
        let timed_out: Vec<SocketAddr> = self
            .subscribers
            .values()
            .filter(|s| s.is_timed_out(timeout))
            .map(|s| s.addr)
            .collect();

        timed_out
            .iter()
            .filter_map(|addr| self.subscribers.remove(addr))
            .inspect(|s| {
                info!(
                    "{} ({}) timed out watching match {}",
                    s.player_name, s.addr, s.match_id
                )
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn manager(max: usize) -> SubscriptionManager {
        SubscriptionManager::new(max, Duration::from_secs(5))
    }

    #[test]
    fn test_subscriber_timeout() {
        let mut subscriber = Subscriber::new(test_addr(), "m1", "Alice");
        assert!(!subscriber.is_timed_out(Duration::from_secs(1)));

        subscriber.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(subscriber.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_subscribe_and_lookup() {
        let mut manager = manager(4);
        assert!(manager.subscribe(test_addr(), "m1", "Alice"));
        assert!(manager.subscribe(test_addr2(), "m1", "Bob"));

        let mut addrs = manager.addrs_for("m1");
        addrs.sort();
        assert_eq!(addrs, vec![test_addr(), test_addr2()]);
        assert!(manager.addrs_for("m2").is_empty());
    }

    #[test]
    fn test_resubscribe_replaces() {
        let mut manager = manager(1);
        assert!(manager.subscribe(test_addr(), "m1", "Alice"));
        assert!(manager.subscribe(test_addr(), "m2", "Alice"));

        assert_eq!(manager.len(), 1);
        assert!(manager.addrs_for("m1").is_empty());
        assert_eq!(manager.addrs_for("m2"), vec![test_addr()]);
    }

    #[test]
    fn test_capacity_limit() {
        let mut manager = manager(1);
        assert!(manager.subscribe(test_addr(), "m1", "Alice"));
        assert!(!manager.subscribe(test_addr2(), "m1", "Bob"));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_match() {
        let mut manager = manager(4);
        manager.subscribe(test_addr(), "m1", "Alice");
        manager.subscribe(test_addr2(), "m2", "Bob");

        assert_eq!(manager.remove_match("m1"), 1);
        assert_eq!(manager.remove_match("m1"), 0);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = manager(4);
        manager.subscribe(test_addr(), "m1", "Alice");
        manager.subscribe(test_addr2(), "m1", "Bob");

        if let Some(bob) = manager.subscribers.get_mut(&test_addr2()) {
            bob.last_seen = Instant::now() - Duration::from_secs(10);
        }

        let dropped = manager.check_timeouts();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].player_name, "Bob");
        assert_eq!(manager.len(), 1);
        assert!(manager.refresh(&test_addr()));
        assert!(!manager.refresh(&test_addr2()));
    }
}
