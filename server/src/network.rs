//! Server network layer handling UDP communications and the match event loop

use crate::lobby;
use crate::presence;
use crate::puzzle::{PuzzleError, PuzzleSource};
use crate::resolver;
use crate::store::{ChangeFeed, MatchChange, MatchStore, StoreError};
use crate::subscriptions::{Subscriber, SubscriptionManager};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{MatchPatch, MatchStatus, MatchUpdate, Packet, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    SubscriberTimeout {
        subscriber: Subscriber,
    },
    Shutdown,
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum OutboundMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

/// Tunables for a server instance
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_subscribers: usize,
    /// Silence after which a subscriber counts as disconnected
    pub subscriber_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_subscribers: 64,
            subscriber_timeout: Duration::from_secs(5),
        }
    }
}

/// Main server coordinating networking and the match store
pub struct Server {
    socket: Arc<UdpSocket>,
    subscriptions: Arc<RwLock<SubscriptionManager>>,
    store: MatchStore,
    puzzles: Box<dyn PuzzleSource + Send>,
    rng: StdRng,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    out_tx: mpsc::UnboundedSender<OutboundMessage>,
    out_rx: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        puzzles: Box<dyn PuzzleSource + Send>,
        config: ServerConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            subscriptions: Arc::new(RwLock::new(SubscriptionManager::new(
                config.max_subscribers,
                config.subscriber_timeout,
            ))),
            store: MatchStore::new(),
            puzzles,
            rng: StdRng::from_entropy(),
            server_tx,
            server_rx,
            out_tx,
            out_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sender for stopping the event loop with `ServerMessage::Shutdown`
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut out_rx = std::mem::replace(&mut self.out_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(OutboundMessage::SendPacket { packet, addr }) = out_rx.recv().await {
                if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                    error!("Failed to send packet to {}: {}", addr, e);
                }
            }
        });
    }

    /// Spawns task that fans store changes out to each match's subscribers
    fn spawn_change_forwarder(&self, mut feed: ChangeFeed) {
        let subscriptions = Arc::clone(&self.subscriptions);
        let out_tx = self.out_tx.clone();

        tokio::spawn(async move {
            while let Some(change) = feed.next().await {
                let addrs = {
                    let subscriptions = subscriptions.read().await;
                    subscriptions.addrs_for(change.match_id())
                };

                let packet = match &change {
                    MatchChange::Updated(snapshot) => Packet::Snapshot {
                        snapshot: snapshot.clone(),
                    },
                    MatchChange::Removed(match_id) => {
                        subscriptions.write().await.remove_match(match_id);
                        Packet::MatchRemoved {
                            match_id: match_id.clone(),
                        }
                    }
                };

                for addr in addrs {
                    let message = OutboundMessage::SendPacket {
                        packet: packet.clone(),
                        addr,
                    };
                    if out_tx.send(message).is_err() {
                        return;
                    }
                }
            }
        });
    }

    /// Spawns task that monitors subscriber heartbeats
    fn spawn_timeout_checker(&self) {
        let subscriptions = Arc::clone(&self.subscriptions);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut subscriptions = subscriptions.write().await;
                    subscriptions.check_timeouts()
                };

                for subscriber in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::SubscriberTimeout { subscriber })
                    {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.out_tx.send(OutboundMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn reject(&self, reason: impl ToString, addr: SocketAddr) {
        self.send_packet(
            Packet::Rejected {
                reason: reason.to_string(),
            },
            addr,
        );
    }

    /// Seats are claimed through the lobby and points through the resolver.
    /// A client may only zero the scores when it restarts a finished game.
    fn client_may_write(patch: &MatchPatch) -> bool {
        patch.player2_name.is_none() && (!patch.touches_scores() || patch.is_new_game())
    }

    fn apply_update(&mut self, match_id: &str, update: &MatchUpdate, addr: SocketAddr) {
        if update.patch.is_empty() {
            debug!("Empty update from {} for match {} ignored", addr, match_id);
            return;
        }
        if !Self::client_may_write(&update.patch) {
            warn!(
                "Update from {} on match {} writes seats or scores, ignored",
                addr, match_id
            );
            return;
        }

        match self.store.update(match_id, update) {
            Ok(Some(snapshot)) => {
                if update.patch.current.is_some() {
                    info!(
                        "Match {} round {}: {}",
                        match_id,
                        snapshot.round,
                        snapshot.current_alphagram().unwrap_or("-")
                    );
                } else {
                    debug!("Match {} is now {}", match_id, snapshot.status);
                }
            }
            Ok(None) => debug!("Update from {} for retired match {}", addr, match_id),
            Err(StoreError::Invalid { violation, .. }) => {
                warn!("Update from {} on match {} refused: {}", addr, match_id, violation)
            }
            Err(StoreError::Conflict(_)) | Err(StoreError::DuplicateId(_)) => {
                debug!("Update from {} on match {} lost the race", addr, match_id)
            }
        }
    }

    /// Processes incoming packets and updates the store
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        self.subscriptions.write().await.refresh(&addr);

        match packet {
            Packet::ListMatches => {
                let matches = self
                    .store
                    .list()
                    .into_iter()
                    .filter(|m| m.status != MatchStatus::Closed)
                    .collect();
                self.send_packet(Packet::MatchList { matches }, addr);
            }

            Packet::CreateMatch {
                player_name,
                lexicon,
            } => match lobby::create_match(&mut self.store, &mut self.rng, &player_name, &lexicon)
            {
                Ok(snapshot) => self.send_packet(Packet::MatchCreated { snapshot }, addr),
                Err(e) => self.reject(e, addr),
            },

            Packet::JoinMatch {
                match_id,
                player_name,
            } => match lobby::join_match(&mut self.store, &match_id, &player_name) {
                Ok(snapshot) => self.send_packet(Packet::JoinAccepted { snapshot }, addr),
                Err(e) => {
                    debug!("Join of {} by {} rejected: {}", match_id, player_name, e);
                    self.reject(e, addr);
                }
            },

            Packet::Subscribe {
                match_id,
                player_name,
            } => {
                let Some(snapshot) = self.store.get(&match_id).cloned() else {
                    self.send_packet(Packet::MatchRemoved { match_id }, addr);
                    return;
                };

                let subscribed = {
                    let mut subscriptions = self.subscriptions.write().await;
                    subscriptions.subscribe(addr, &match_id, &player_name)
                };
                if subscribed {
                    self.send_packet(Packet::Snapshot { snapshot }, addr);
                } else {
                    self.reject("Server full", addr);
                }
            }

            Packet::Heartbeat => {}

            Packet::UpdateMatch { match_id, update } => {
                self.apply_update(&match_id, &update, addr);
            }

            Packet::FetchPuzzle {
                lexicon,
                word_length,
            } => {
                let response = match self.puzzles.lookup(&lexicon, word_length) {
                    Ok(puzzle) => Packet::Puzzle {
                        alphagram: puzzle.alphagram,
                        solutions: puzzle.solutions,
                    },
                    Err(e) => {
                        match &e {
                            PuzzleError::Io { .. } => error!("{}", e),
                            _ => warn!("Puzzle lookup failed: {}", e),
                        }
                        Packet::PuzzleNotFound {
                            lexicon,
                            word_length,
                        }
                    }
                };
                self.send_packet(response, addr);
            }

            Packet::SubmitAnswer {
                match_id,
                answer,
                player_name,
            } => {
                let accepted =
                    match resolver::submit(&mut self.store, &match_id, &answer, &player_name) {
                        Ok(_) => true,
                        Err(rejection) => {
                            debug!(
                                "Submission from {} on match {} rejected: {}",
                                player_name, match_id, rejection
                            );
                            false
                        }
                    };
                self.send_packet(Packet::SubmitResult { match_id, accepted }, addr);
            }

            Packet::Leave {
                match_id,
                player_name,
            } => {
                self.subscriptions.write().await.unsubscribe(&addr);
                presence::leave(&mut self.store, &match_id, &player_name);
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let feed = self.store.subscribe(None);

        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_change_forwarder(feed);
        self.spawn_timeout_checker();

        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
                ServerMessage::SubscriberTimeout { subscriber } => {
                    presence::leave(
                        &mut self.store,
                        &subscriber.match_id,
                        &subscriber.player_name,
                    );
                }
                ServerMessage::Shutdown => break,
            }
        }

        info!("Server shutting down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::{LexiconIndex, LexiconPuzzles};
    use std::net::{IpAddr, Ipv4Addr};

    fn test_puzzles() -> Box<dyn PuzzleSource + Send> {
        Box::new(LexiconPuzzles::new("/nonexistent").with_lexicon(
            "TEST",
            LexiconIndex::from_words(["LETTERS", "STERLET", "TRESTLE"]),
        ))
    }

    #[test]
    fn test_server_message_creation() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080);
        let msg = ServerMessage::PacketReceived {
            packet: Packet::Heartbeat,
            addr,
        };

        match msg {
            ServerMessage::PacketReceived { packet: p, addr: a } => {
                assert_eq!(a, addr);
                assert!(matches!(p, Packet::Heartbeat));
            }
            _ => panic!("Unexpected message type"),
        }
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.max_subscribers, 64);
        assert_eq!(config.subscriber_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_server_binds_ephemeral_port() {
        let server = Server::new("127.0.0.1:0", test_puzzles(), ServerConfig::default())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_run_loop() {
        let mut server = Server::new("127.0.0.1:0", test_puzzles(), ServerConfig::default())
            .await
            .unwrap();
        server
            .shutdown_handle()
            .send(ServerMessage::Shutdown)
            .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), server.run()).await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_handle_create_then_update_conflict() {
        let mut server = Server::new("127.0.0.1:0", test_puzzles(), ServerConfig::default())
            .await
            .unwrap();
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9000);

        server
            .handle_packet(
                Packet::CreateMatch {
                    player_name: "Alice".to_string(),
                    lexicon: "TEST".to_string(),
                },
                addr,
            )
            .await;
        let created = server.store.list().pop().unwrap();

        match server.out_rx.try_recv() {
            Ok(OutboundMessage::SendPacket {
                packet: Packet::MatchCreated { snapshot },
                addr: a,
            }) => {
                assert_eq!(a, addr);
                assert_eq!(snapshot.id, created.id);
            }
            other => panic!("unexpected outbound message: {:?}", other),
        }

        let premature_start = MatchUpdate {
            expect: shared::MatchExpect::status(MatchStatus::Countdown),
            patch: shared::MatchPatch {
                status: Some(MatchStatus::InProgress),
                ..shared::MatchPatch::default()
            },
        };
        server
            .handle_packet(
                Packet::UpdateMatch {
                    match_id: created.id.clone(),
                    update: premature_start,
                },
                addr,
            )
            .await;
        assert_eq!(
            server.store.get(&created.id).map(|m| m.status),
            Some(MatchStatus::Waiting)
        );
    }

    #[tokio::test]
    async fn test_update_cannot_rewrite_seat_score_or_round() {
        let mut server = Server::new("127.0.0.1:0", test_puzzles(), ServerConfig::default())
            .await
            .unwrap();
        let alice = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9000);
        let bob = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9001);
        let carol = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9002);

        server
            .handle_packet(
                Packet::CreateMatch {
                    player_name: "Alice".to_string(),
                    lexicon: "TEST".to_string(),
                },
                alice,
            )
            .await;
        let match_id = server.store.list().pop().unwrap().id;
        for (name, addr) in [("Bob", bob), ("Carol", carol)] {
            server
                .handle_packet(
                    Packet::JoinMatch {
                        match_id: match_id.clone(),
                        player_name: name.to_string(),
                    },
                    addr,
                )
                .await;
        }
        assert_eq!(
            server.store.get(&match_id).unwrap().player2_name.as_deref(),
            Some("Bob")
        );

        let seat_grab = shared::MatchPatch {
            player2_name: Some("Mallory".to_string()),
            player1_score: Some(99),
            round: Some(0),
            ..shared::MatchPatch::default()
        };
        let score_bump = shared::MatchPatch {
            player1_score: Some(1),
            ..shared::MatchPatch::default()
        };
        let rewind = shared::MatchPatch {
            round: Some(0),
            ..shared::MatchPatch::default()
        };
        for patch in [seat_grab, score_bump, rewind] {
            server
                .handle_packet(
                    Packet::UpdateMatch {
                        match_id: match_id.clone(),
                        update: MatchUpdate {
                            expect: shared::MatchExpect::default(),
                            patch,
                        },
                    },
                    carol,
                )
                .await;
        }

        let record = server.store.get(&match_id).unwrap();
        assert_eq!(record.player2_name.as_deref(), Some("Bob"));
        assert_eq!(record.player1_score, 0);
        assert_eq!(record.round, 0);
        assert_eq!(record.status, MatchStatus::Waiting);
    }

    #[tokio::test]
    async fn test_handle_fetch_puzzle() {
        let mut server = Server::new("127.0.0.1:0", test_puzzles(), ServerConfig::default())
            .await
            .unwrap();
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9000);

        server
            .handle_packet(
                Packet::FetchPuzzle {
                    lexicon: "TEST".to_string(),
                    word_length: 7,
                },
                addr,
            )
            .await;
        server
            .handle_packet(
                Packet::FetchPuzzle {
                    lexicon: "TEST".to_string(),
                    word_length: 8,
                },
                addr,
            )
            .await;

        match server.out_rx.try_recv() {
            Ok(OutboundMessage::SendPacket {
                packet: Packet::Puzzle {
                    alphagram,
                    solutions,
                },
                ..
            }) => {
                assert_eq!(alphagram, "EELRSTT");
                assert_eq!(solutions.len(), 3);
            }
            other => panic!("unexpected outbound message: {:?}", other),
        }
        assert!(matches!(
            server.out_rx.try_recv(),
            Ok(OutboundMessage::SendPacket {
                packet: Packet::PuzzleNotFound { word_length: 8, .. },
                ..
            })
        ));
    }
}
