use crate::display;
use crate::session::{Action, GuessOutcome, Session};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{Match, Packet, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::time::{interval, timeout};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad packet: {0}")]
    Encode(#[from] bincode::Error),
    #[error("invalid server address: {0}")]
    Address(#[from] std::net::AddrParseError),
    #[error("no response from server")]
    Timeout,
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("unexpected response from server")]
    UnexpectedPacket,
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    request_timeout: Duration,
}

impl Client {
    pub async fn new(server_addr: &str) -> Result<Self, ClientError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            request_timeout: REQUEST_TIMEOUT,
        })
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), ClientError> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Sends a packet and waits for the first reply
    async fn request(&self, packet: &Packet) -> Result<Packet, ClientError> {
        self.send_packet(packet).await?;

        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, _) = timeout(self.request_timeout, self.socket.recv_from(&mut buffer))
            .await
            .map_err(|_| ClientError::Timeout)??;
        Ok(deserialize::<Packet>(&buffer[..len])?)
    }

    pub async fn list_matches(&self) -> Result<Vec<Match>, ClientError> {
        match self.request(&Packet::ListMatches).await? {
            Packet::MatchList { matches } => Ok(matches),
            Packet::Rejected { reason } => Err(ClientError::Rejected(reason)),
            _ => Err(ClientError::UnexpectedPacket),
        }
    }

    pub async fn create_match(&self, player_name: &str, lexicon: &str) -> Result<Match, ClientError> {
        let packet = Packet::CreateMatch {
            player_name: player_name.to_string(),
            lexicon: lexicon.to_string(),
        };
        match self.request(&packet).await? {
            Packet::MatchCreated { snapshot } => {
                info!("Created match {}", snapshot.id);
                Ok(snapshot)
            }
            Packet::Rejected { reason } => Err(ClientError::Rejected(reason)),
            _ => Err(ClientError::UnexpectedPacket),
        }
    }

    pub async fn join_match(&self, match_id: &str, player_name: &str) -> Result<Match, ClientError> {
        let packet = Packet::JoinMatch {
            match_id: match_id.to_string(),
            player_name: player_name.to_string(),
        };
        match self.request(&packet).await? {
            Packet::JoinAccepted { snapshot } => {
                info!("Joined match {}", snapshot.id);
                Ok(snapshot)
            }
            Packet::Rejected { reason } => Err(ClientError::Rejected(reason)),
            _ => Err(ClientError::UnexpectedPacket),
        }
    }

    async fn perform(&self, match_id: &str, actions: Vec<Action>) -> Result<(), ClientError> {
        for action in actions {
            let packet = match action {
                Action::Update(update) => Packet::UpdateMatch {
                    match_id: match_id.to_string(),
                    update,
                },
                Action::FetchPuzzle {
                    lexicon,
                    word_length,
                } => Packet::FetchPuzzle {
                    lexicon,
                    word_length,
                },
            };
            self.send_packet(&packet).await?;
        }
        Ok(())
    }

    fn handle_packet(&self, session: &mut Session, packet: Packet) -> Vec<Action> {
        match packet {
            Packet::Snapshot { snapshot } => {
                let actions = session.apply_snapshot(snapshot);
                print_frame(session);
                actions
            }

            Packet::MatchRemoved { match_id } => {
                info!("Match {} was removed", match_id);
                session.mark_removed();
                Vec::new()
            }

            Packet::Puzzle {
                alphagram,
                solutions,
            } => session.on_puzzle(&alphagram, &solutions).into_iter().collect(),

            Packet::PuzzleNotFound {
                lexicon,
                word_length,
            } => {
                session.on_puzzle_not_found(&lexicon, word_length);
                Vec::new()
            }

            Packet::SubmitResult { match_id, accepted } => {
                if accepted {
                    info!("Answer accepted for match {}", match_id);
                } else {
                    println!("Too slow, the round was already decided.");
                }
                Vec::new()
            }

            Packet::Rejected { reason } => {
                warn!("Server rejected request: {}", reason);
                Vec::new()
            }

            _ => {
                warn!("Unexpected packet type");
                Vec::new()
            }
        }
    }

    /// Subscribes to a match and plays it until it ends or the player leaves.
    ///
    /// Typed lines are guesses; `/leave` or `/quit` leaves the match.
    pub async fn play(&self, match_id: &str, mut session: Session) -> Result<Session, ClientError> {
        let player_name = session.player_name().to_string();
        self.send_packet(&Packet::Subscribe {
            match_id: match_id.to_string(),
            player_name: player_name.clone(),
        })
        .await?;

        let mut rng = StdRng::from_entropy();
        let mut second = interval(Duration::from_secs(1));
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        println!("Type your guesses and press enter. /leave quits the match.");

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => match deserialize::<Packet>(&buffer[..len]) {
                            Ok(packet) => {
                                let actions = self.handle_packet(&mut session, packet);
                                self.perform(match_id, actions).await?;
                            }
                            Err(e) => warn!("Failed to deserialize packet: {}", e),
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = second.tick() => {
                    self.send_packet(&Packet::Heartbeat).await?;
                    let actions = session.tick(&mut rng);
                    if let Some(line) = display::timer_line(&session) {
                        println!("{}", line);
                    }
                    self.perform(match_id, actions).await?;
                },

                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("Input closed");
                        break;
                    };
                    let input = line.trim();
                    if input == "/leave" || input == "/quit" {
                        break;
                    }
                    if !input.is_empty() {
                        let outcome = session.guess(input);
                        println!("{}", display::describe_guess(&outcome));
                        if let GuessOutcome::Complete { answer } = outcome {
                            self.send_packet(&Packet::SubmitAnswer {
                                match_id: match_id.to_string(),
                                answer,
                                player_name: player_name.clone(),
                            })
                            .await?;
                        }
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, leaving match");
                    break;
                },
            }

            if session.is_over() {
                println!("Your opponent has left the game.");
                return Ok(session);
            }
        }

        let leave = Packet::Leave {
            match_id: match_id.to_string(),
            player_name,
        };
        if let Err(e) = self.send_packet(&leave).await {
            warn!("Failed to send leave: {}", e);
        }
        Ok(session)
    }
}

fn print_frame(session: &Session) {
    println!();
    for line in display::render(session) {
        println!("{}", line);
    }
}
