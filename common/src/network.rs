use crate::{Account, AccountFailure, CoinFlip, PublicProfile, Session, Side, WagerFailure};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use tokio::net::TcpStream;

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone)]
pub enum Request {
    Signup {
        username: String,
        name: String,
        email: String,
        password: String,
    }, // LoggedIn response
    Login { email: String, password: String }, // LoggedIn response
    Resume { token: String },                  // LoggedIn response
    Logout,                                    // None response
    WhoAmI,
    Profile { username: String }, // open to guests
    Balance,
    CoinFlip { stake: Decimal, guess: Side },
    ClaimDailyReward,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub enum Response {
    None,
    LoggedIn(Result<Session, AccountFailure>),
    WhoAmI(Result<Account, AccountFailure>),
    Profile(Result<PublicProfile, AccountFailure>),
    Balance(Result<Decimal, AccountFailure>),
    CoinFlip(Result<CoinFlip, WagerFailure>),
    DailyReward(Result<Decimal, AccountFailure>),
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Packet {
    RequestPacket(Request),
    ResponsePacket(Response),
    Error,
}

pub struct Connection {
    connection: socket::TungsteniteWebSocket,
}

impl Connection {
    pub async fn from_tcp_stream(connection: TcpStream) -> anyhow::Result<Self> {
        Ok(Self {
            connection: socket::TungsteniteWebSocket::accept(connection).await?,
        })
    }

    pub async fn connect(address: &str) -> anyhow::Result<Self> {
        Ok(Self {
            connection: socket::TungsteniteWebSocket::connect(address).await?,
        })
    }

    pub async fn read(&mut self) -> anyhow::Result<Packet> {
        Ok(rmp_serde::from_slice(&self.connection.read().await?)?)
    }

    pub async fn send(&mut self, data: Packet) -> anyhow::Result<()> {
        self.connection.write_all(&rmp_serde::to_vec(&data)?).await
    }

    /// Sends a request and waits for the matching response packet.
    pub async fn request(&mut self, request: Request) -> anyhow::Result<Response> {
        self.send(Packet::RequestPacket(request)).await?;
        match self.read().await? {
            Packet::ResponsePacket(response) => Ok(response),
            packet => anyhow::bail!("expected a response, got {:?}", packet),
        }
    }
}

/// True when the error means the peer went away rather than misbehaved.
pub fn is_disconnect(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<std::io::Error>()
        .is_some_and(|e| e.kind() == ErrorKind::ConnectionAborted)
}

trait WebSocketConnection {
    async fn read(&mut self) -> anyhow::Result<Vec<u8>>;

    async fn write_all(&mut self, buf: &[u8]) -> anyhow::Result<()>;
}

mod socket {
    use super::WebSocketConnection;
    use anyhow::bail;
    use futures_util::{SinkExt, StreamExt};
    use std::io::ErrorKind;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

    pub struct TungsteniteWebSocket {
        socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    }

    fn aborted() -> anyhow::Error {
        std::io::Error::new(ErrorKind::ConnectionAborted, "connection closed").into()
    }

    impl TungsteniteWebSocket {
        pub async fn accept(stream: TcpStream) -> anyhow::Result<Self> {
            let socket = tokio_tungstenite::accept_async(MaybeTlsStream::Plain(stream)).await?;
            Ok(Self { socket })
        }

        pub async fn connect(address: &str) -> anyhow::Result<Self> {
            let (socket, _) = tokio_tungstenite::connect_async(address).await?;
            Ok(Self { socket })
        }
    }

    impl WebSocketConnection for TungsteniteWebSocket {
        async fn read(&mut self) -> anyhow::Result<Vec<u8>> {
            loop {
                let message = self.socket.next().await.ok_or_else(aborted)?;
                match message {
                    Ok(Message::Binary(data)) => return Ok(data),
                    // tungstenite answers pings on its own
                    Ok(Message::Ping(_) | Message::Pong(_)) => continue,
                    Ok(Message::Close(_)) => return Err(aborted()),
                    Ok(_) => bail!("incorrect data type received"),
                    Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
                    | Err(tokio_tungstenite::tungstenite::Error::AlreadyClosed) => {
                        return Err(aborted())
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        async fn write_all(&mut self, buf: &[u8]) -> anyhow::Result<()> {
            Ok(self.socket.send(Message::Binary(buf.to_vec())).await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnects_are_told_apart_from_faults() {
        let closed: anyhow::Error =
            std::io::Error::new(ErrorKind::ConnectionAborted, "connection closed").into();
        let reset: anyhow::Error =
            std::io::Error::new(ErrorKind::ConnectionReset, "connection reset").into();
        assert!(is_disconnect(&closed));
        assert!(!is_disconnect(&reset));
        assert!(!is_disconnect(&anyhow::anyhow!("malformed packet")));
    }

    #[test]
    fn failures_cross_the_wire_intact() {
        let packet = Packet::ResponsePacket(Response::CoinFlip(Err(WagerFailure::InsufficientFunds)));
        let bytes = rmp_serde::to_vec(&packet).unwrap();
        let decoded: Packet = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, packet);
    }
}
