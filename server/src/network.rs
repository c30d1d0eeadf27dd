//! TCP listener: turns accepted connections into sessions

use crate::config::GameConfig;
use crate::session::Session;
use crate::state::ServerState;
use log::{error, info, warn};
use shared::{Message, MessageChannel};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

/// Accepts players until the match is over, then flushes and returns.
pub struct Server {
    listener: TcpListener,
    state: Arc<ServerState>,
    config: GameConfig,
}

impl Server {
    pub async fn new(addr: &str, config: GameConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            state: Arc::new(ServerState::new()),
            config,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Server started, waiting for players");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.accept(stream, addr).await,
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
                _ = self.state.wait_finished() => break,
            }
        }

        self.state.shutdown().await;
        info!("Server shutting down");
        Ok(())
    }

    async fn accept(&self, stream: TcpStream, addr: SocketAddr) {
        let (channel, inbox) = MessageChannel::from_tcp(stream);
        let channel = Arc::new(channel);

        match self.state.join(Arc::clone(&channel)).await {
            Ok(id) => {
                info!("Player {} joined from {}", id, addr);
                let session = Session::new(
                    id,
                    channel,
                    inbox,
                    Arc::clone(&self.state),
                    self.config.clone(),
                );
                tokio::spawn(session.run());
            }
            Err(e) => {
                warn!("Turning away {}: {}", addr, e);
                let _ = channel.send(&Message::Rejected {
                    reason: e.to_string(),
                });
                channel.shutdown().await;
            }
        }
    }
}
