use chrono::Utc;
use common::network::{is_disconnect, Connection, Packet, Request, Response};
use common::{AccountFailure, Session};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::account_manager::{AccountManager, SignupDetails};
use crate::session::Identity;
use crate::wager_manager::WagerHandle;

/// Everything a client connection needs to serve requests.
#[derive(Clone)]
pub struct Services {
    pub accounts: AccountManager,
    pub wagers: WagerHandle,
    pub last_active_interval: Duration,
}

pub async fn handle_listen_server(listener: TcpListener, services: Services) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("failed to accept connection: {e}");
                continue;
            }
        };
        let services = services.clone();

        tokio::spawn(async move {
            match Connection::from_tcp_stream(stream).await {
                Ok(connection) => {
                    debug!(%peer, "client connected");
                    handle_connection(connection, services).await;
                    debug!(%peer, "client disconnected");
                }
                Err(e) => warn!(%peer, "websocket handshake failed: {e:#}"),
            }
        });
    }
}

/// Per-connection session state. The token is re-verified on every request.
#[derive(Default)]
struct ClientSession {
    token: Option<String>,
    last_touch: Option<(Identity, Instant)>,
}

impl ClientSession {
    fn adopt(&mut self, result: &Result<Session, AccountFailure>) {
        if let Ok(session) = result {
            self.token = Some(session.token.clone());
        }
    }

    async fn record_activity(&mut self, identity: &Identity, services: &Services) {
        let due = match &self.last_touch {
            Some((last, at)) => last != identity || at.elapsed() >= services.last_active_interval,
            None => true,
        };
        if due {
            services.accounts.touch_last_active(identity, Utc::now()).await;
            self.last_touch = Some((identity.clone(), Instant::now()));
        }
    }
}

async fn handle_connection(mut connection: Connection, services: Services) {
    let mut session = ClientSession::default();
    loop {
        let packet = match connection.read().await {
            Ok(packet) => packet,
            // connection aborted is considered successful
            Err(error) if is_disconnect(&error) => return,
            Err(error) => {
                warn!("dropping client after bad read: {error:#}");
                connection.send(Packet::Error).await.ok();
                return;
            }
        };

        let request = match packet {
            Packet::RequestPacket(request) => request,
            packet => {
                warn!("incorrect packet type: {:?}", packet);
                connection.send(Packet::Error).await.ok();
                return;
            }
        };

        let response = handle_request(request, &mut session, &services).await;
        if let Err(error) = connection.send(Packet::ResponsePacket(response)).await {
            debug!("failed to answer client: {error:#}");
            return;
        }
    }
}

async fn handle_request(request: Request, session: &mut ClientSession, services: &Services) -> Response {
    let identity = services.accounts.identify(session.token.as_deref());
    if let Some(identity) = &identity {
        session.record_activity(identity, services).await;
    }

    match request {
        Request::Signup {
            username,
            name,
            email,
            password,
        } => {
            let details = SignupDetails {
                username,
                name,
                email,
                password,
            };
            let result = services.accounts.signup(details).await;
            session.adopt(&result);
            Response::LoggedIn(result)
        }
        Request::Login { email, password } => {
            let result = services.accounts.login(&email, &password).await;
            session.adopt(&result);
            Response::LoggedIn(result)
        }
        Request::Resume { token } => {
            let result = services.accounts.resume(&token).await;
            session.adopt(&result);
            Response::LoggedIn(result)
        }
        Request::Logout => {
            if let Some(identity) = &identity {
                info!(%identity, "logged out");
            }
            session.token = None;
            session.last_touch = None;
            Response::None
        }
        Request::WhoAmI => Response::WhoAmI(services.accounts.profile(identity.as_ref()).await),
        Request::Profile { username } => {
            Response::Profile(services.accounts.public_profile(&username).await)
        }
        Request::Balance => Response::Balance(services.accounts.balance(identity.as_ref()).await),
        Request::CoinFlip { stake, guess } => {
            Response::CoinFlip(services.wagers.coin_flip(identity, stake, guess).await)
        }
        Request::ClaimDailyReward => Response::DailyReward(
            services
                .accounts
                .claim_daily_reward(identity.as_ref(), Utc::now())
                .await,
        ),
    }
}
