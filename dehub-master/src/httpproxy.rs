use std::convert::Infallible;
use std::sync::Arc;

use dehub_common::Command;
use dehub_core::{Mode, Session};
use dehub_ssh::{SshSession, SubChannelRequest};
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1 as server_http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use russh::ChannelMsg;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::compat::{FuturesAsyncReadCompatExt, TokioAsyncReadCompatExt};
use tracing::{error, warn};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

fn empty_body() -> BoxBody {
    Empty::new().map_err(|never| match never {}).boxed()
}

fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into()).map_err(|never| match never {}).boxed()
}

/// Runs a local HTTP proxy whose every dial (plain requests and `CONNECT`
/// tunnels alike) goes through the same `"forward-socks5"` sub-channel a
/// `forward_socks5` caller would use (spec §4.6.4). Blocks until `listener`
/// stops accepting or the tunnel shuts down.
pub async fn serve_http_proxy(ssh: &mut SshSession, listener: TcpListener) -> anyhow::Result<()> {
    let request = SubChannelRequest::new(Command::ForwardSocks5, ())?;
    let mut channel = ssh.channel_open_session().await?;
    channel.exec(true, request.encode()).await?;

    loop {
        match channel.wait().await {
            Some(ChannelMsg::Success) => break,
            Some(ChannelMsg::Failure) => anyhow::bail!("servant rejected forward-socks5 sub-channel"),
            Some(_) => continue,
            None => anyhow::bail!("channel closed before forward-socks5 was acknowledged"),
        }
    }

    let tunnel = Arc::new(Session::new(channel.into_stream().compat(), Mode::Client));

    loop {
        let (local, _) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                error!(%error, "failed to accept http proxy connection");
                return Err(error.into());
            }
        };

        let tunnel = tunnel.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(local);
            let service = service_fn(move |req| {
                let tunnel = tunnel.clone();
                async move { proxy_one(tunnel, req).await }
            });

            if let Err(error) = server_http1::Builder::new().serve_connection(io, service).with_upgrades().await {
                warn!(%error, "http proxy connection ended with an error");
            }
        });
    }
}

async fn proxy_one(tunnel: Arc<Session>, req: Request<Incoming>) -> Result<Response<BoxBody>, Infallible> {
    let target = match authority_of(&req) {
        Some(authority) => authority,
        None => {
            return Ok(bad_request("CONNECT or absolute-form request required"));
        }
    };

    if req.method() == Method::CONNECT {
        tokio::spawn(async move {
            match hyper::upgrade::on(req).await {
                Ok(upgraded) => {
                    if let Err(error) = relay_connect(tunnel, target, upgraded).await {
                        warn!(%error, "connect tunnel failed");
                    }
                }
                Err(error) => warn!(%error, "failed to upgrade connect request"),
            }
        });
        return Ok(Response::new(empty_body()));
    }

    match forward_request(&tunnel, &target, req).await {
        Ok(response) => Ok(response.map(BodyExt::boxed)),
        Err(error) => {
            warn!(%error, target, "failed to proxy request");
            Ok(bad_gateway())
        }
    }
}

async fn relay_connect(tunnel: Arc<Session>, target: String, upgraded: hyper::upgrade::Upgraded) -> anyhow::Result<()> {
    let mut remote = dial_via_socks5(&tunnel, &target).await?;
    let mut upgraded = TokioIo::new(upgraded);
    tokio::io::copy_bidirectional(&mut upgraded, &mut remote).await?;
    Ok(())
}

async fn forward_request(
    tunnel: &Session,
    target: &str,
    req: Request<Incoming>,
) -> anyhow::Result<Response<Incoming>> {
    let stream = dial_via_socks5(tunnel, target).await?;
    let io = TokioIo::new(stream);

    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;
    tokio::spawn(async move {
        if let Err(error) = conn.await {
            warn!(%error, "upstream connection ended with an error");
        }
    });

    Ok(sender.send_request(req).await?)
}

/// Opens a new stream on the tunnel and speaks the SOCKS5 client side of the
/// handshake against the servant's embedded SOCKS5 server to reach `target`
/// (spec §4.6.4's "dials through the SOCKS5 dialer bound to the mux's
/// `Open`"). Minimal unauthenticated CONNECT subset, mirroring the server
/// half already embedded on the servant.
async fn dial_via_socks5(tunnel: &Session, target: &str) -> anyhow::Result<tokio_util::compat::Compat<dehub_core::MuxStream>> {
    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| anyhow::anyhow!("target missing port: {target}"))?;
    let port: u16 = port.parse()?;

    let mut stream = tunnel.open().await.map_err(|error| anyhow::anyhow!("failed to open tunnel stream: {error}"))?.compat();

    stream.write_all(&[0x05, 0x01, 0x00]).await?;
    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await?;
    if reply != [0x05, 0x00] {
        anyhow::bail!("servant socks5 proxy rejected the unauthenticated method");
    }

    let host_bytes = host.as_bytes();
    let mut request = vec![0x05, 0x01, 0x00, 0x03, host_bytes.len() as u8];
    request.extend_from_slice(host_bytes);
    request.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&request).await?;

    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    if header[1] != 0x00 {
        anyhow::bail!("servant socks5 proxy returned error code {}", header[1]);
    }
    match header[3] {
        0x01 => {
            let mut skip = [0u8; 4 + 2];
            stream.read_exact(&mut skip).await?;
        }
        0x03 => {
            let mut len = [0u8];
            stream.read_exact(&mut len).await?;
            let mut skip = vec![0u8; len[0] as usize + 2];
            stream.read_exact(&mut skip).await?;
        }
        0x04 => {
            let mut skip = [0u8; 16 + 2];
            stream.read_exact(&mut skip).await?;
        }
        other => anyhow::bail!("unsupported address type {other} in socks5 reply"),
    }

    Ok(stream)
}

fn authority_of(req: &Request<Incoming>) -> Option<String> {
    if let Some(authority) = req.uri().authority() {
        return Some(default_port(authority.as_str(), req.method() == Method::CONNECT));
    }
    req.headers()
        .get(hyper::header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(|host| default_port(host, false))
}

fn default_port(authority: &str, is_connect: bool) -> String {
    if authority.contains(':') {
        authority.to_owned()
    } else {
        format!("{authority}:{}", if is_connect { 443 } else { 80 })
    }
}

fn bad_request(message: &str) -> Response<BoxBody> {
    Response::builder()
        .status(hyper::StatusCode::BAD_REQUEST)
        .body(full_body(message.to_owned()))
        .expect("static response is valid")
}

fn bad_gateway() -> Response<BoxBody> {
    Response::builder()
        .status(hyper::StatusCode::BAD_GATEWAY)
        .body(empty_body())
        .expect("static response is valid")
}
