// Transports feed decoded events to the pipeline over a channel
//
// Each transport decodes bytes into events and sends them, together with a
// reply sender, to the pipeline thread. Telemetry is broadcast from the
// periodic thread to every connected peer.

use anyhow::{Context, Result};
use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};
use stewart_proto::{Event, StreamDecoder, decode_datagram};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{TcpListener, UdpSocket},
    sync::{broadcast, mpsc},
};
use tracing::{debug, info, warn};

use crate::{
    config::{Config, DatagramMode, TransportConfig},
    controller::Controller,
};

const INBOUND_DEPTH: usize = 256;
const REPLY_DEPTH: usize = 64;
const TELEMETRY_DEPTH: usize = 16;
/// Time given to queued replies after a peer stops sending.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// One decoded event and where its replies go.
#[derive(Debug)]
pub struct Inbound {
    pub event: Event,
    pub at: Instant,
    pub reply: mpsc::Sender<String>,
}

/// Run the controller until the transport ends or the process is
/// interrupted.
pub async fn serve(controller: Arc<Controller>, config: &Config) -> Result<()> {
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_DEPTH);
    let (telemetry_tx, _) = broadcast::channel(TELEMETRY_DEPTH);
    let running = Arc::new(AtomicBool::new(true));

    let pipeline = {
        let controller = controller.clone();
        tokio::task::spawn_blocking(move || run_pipeline(&controller, inbound_rx))
    };
    let ticker = {
        let controller = controller.clone();
        let telemetry_tx = telemetry_tx.clone();
        let running = running.clone();
        let period = config.telemetry.tick_period();
        tokio::task::spawn_blocking(move || run_ticker(&controller, period, &telemetry_tx, &running))
    };

    let result = tokio::select! {
        result = run_transport(&config.transport, inbound_tx, telemetry_tx) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            Ok(())
        }
    };

    running.store(false, Ordering::Relaxed);
    let _ = ticker.await;
    // Ends once every transport task has dropped its sender
    let _ = tokio::time::timeout(DRAIN_TIMEOUT, pipeline).await;
    result
}

async fn run_transport(
    transport: &TransportConfig,
    inbound: mpsc::Sender<Inbound>,
    telemetry: broadcast::Sender<String>,
) -> Result<()> {
    match transport {
        TransportConfig::Stdin => {
            info!("reading from stdin");
            serve_stream(
                tokio::io::stdin(),
                tokio::io::stdout(),
                inbound,
                telemetry.subscribe(),
            )
            .await?;
            info!("stdin closed");
            Ok(())
        }
        TransportConfig::Tcp { address } => serve_tcp(*address, inbound, telemetry).await,
        TransportConfig::Udp { address, mode } => {
            serve_udp(*address, *mode, inbound, telemetry.subscribe()).await
        }
    }
}

/// Decode/apply activity: one thread owns every pipeline update.
pub fn run_pipeline(controller: &Controller, mut inbound: mpsc::Receiver<Inbound>) {
    while let Some(msg) = inbound.blocking_recv() {
        for line in controller.handle(msg.event, msg.at) {
            if msg.reply.try_send(line).is_err() {
                debug!("reply dropped, peer not reading");
            }
        }
    }
    debug!("pipeline stopped");
}

/// Periodic activity: watchdog, homing ramp and telemetry.
pub fn run_ticker(
    controller: &Controller,
    period: Duration,
    telemetry: &broadcast::Sender<String>,
    running: &AtomicBool,
) {
    let mut next = Instant::now();
    while running.load(Ordering::Relaxed) {
        next += period;
        if let Some(line) = controller.tick(Instant::now()) {
            // No receivers just means nobody is listening yet
            let _ = telemetry.send(line);
        }
        std::thread::sleep(next.saturating_duration_since(Instant::now()));
    }
}

/// Samples are dropped when the pipeline is backed up; commands wait.
async fn forward(inbound: &mpsc::Sender<Inbound>, msg: Inbound) -> Result<()> {
    if matches!(msg.event, Event::Sample(_)) {
        if inbound.try_send(msg).is_err() {
            debug!("pipeline busy, dropping sample");
        }
        return Ok(());
    }
    inbound
        .send(msg)
        .await
        .map_err(|_| anyhow::anyhow!("pipeline stopped"))
}

async fn serve_tcp(
    address: SocketAddr,
    inbound: mpsc::Sender<Inbound>,
    telemetry: broadcast::Sender<String>,
) -> Result<()> {
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind to {address}"))?;
    info!(%address, "listening for TCP peers");

    loop {
        let (socket, peer) = listener.accept().await.context("accept failed")?;
        info!(%peer, "peer connected");
        let inbound = inbound.clone();
        let telemetry = telemetry.subscribe();
        tokio::spawn(async move {
            let (reader, writer) = socket.into_split();
            if let Err(err) = serve_stream(reader, writer, inbound, telemetry).await {
                warn!(%peer, error = %err, "connection failed");
            }
            info!(%peer, "peer disconnected");
        });
    }
}

/// Serve one byte-stream peer until it stops sending.
pub async fn serve_stream<R, W>(
    mut reader: R,
    mut writer: W,
    inbound: mpsc::Sender<Inbound>,
    mut telemetry: broadcast::Receiver<String>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (reply_tx, mut reply_rx) = mpsc::channel(REPLY_DEPTH);
    let writer_task =
        tokio::spawn(async move { write_lines(&mut writer, &mut reply_rx, &mut telemetry).await });

    let result = read_stream(&mut reader, &inbound, &reply_tx).await;

    drop(reply_tx);
    match tokio::time::timeout(DRAIN_TIMEOUT, writer_task).await {
        Ok(Ok(Err(err))) => debug!(error = %err, "writer stopped"),
        Ok(_) => {}
        Err(_) => debug!("replies not drained in time"),
    }
    result
}

async fn read_stream<R: AsyncRead + Unpin>(
    reader: &mut R,
    inbound: &mpsc::Sender<Inbound>,
    reply: &mpsc::Sender<String>,
) -> Result<()> {
    let mut decoder = StreamDecoder::new();
    let mut buf = [0u8; 256];
    loop {
        let n = reader.read(&mut buf).await.context("read failed")?;
        if n == 0 {
            return Ok(());
        }
        let at = Instant::now();
        let events: Vec<Event> = decoder.feed(&buf[..n]).collect();
        for event in events {
            let msg = Inbound {
                event,
                at,
                reply: reply.clone(),
            };
            forward(inbound, msg).await?;
        }
    }
}

/// Write replies and telemetry, one `\r\n` terminated line each. Ends when
/// every reply sender is gone.
async fn write_lines<W: AsyncWrite + Unpin>(
    writer: &mut W,
    replies: &mut mpsc::Receiver<String>,
    telemetry: &mut broadcast::Receiver<String>,
) -> Result<()> {
    loop {
        let line = tokio::select! {
            line = replies.recv() => match line {
                Some(line) => line,
                None => return Ok(()),
            },
            line = telemetry.recv() => match line {
                Ok(line) => line,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "telemetry lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
        };
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\r\n").await?;
        writer.flush().await?;
    }
}

async fn serve_udp(
    address: SocketAddr,
    mode: DatagramMode,
    inbound: mpsc::Sender<Inbound>,
    mut telemetry: broadcast::Receiver<String>,
) -> Result<()> {
    let socket = UdpSocket::bind(address)
        .await
        .with_context(|| format!("failed to bind to {address}"))?;
    info!(%address, ?mode, "listening for datagrams");

    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(REPLY_DEPTH);
    let mut decoder = StreamDecoder::new();
    let mut peer: Option<SocketAddr> = None;
    let mut buf = vec![0u8; 1500];

    loop {
        let outgoing = tokio::select! {
            received = socket.recv_from(&mut buf) => {
                let (n, from) = received.context("receive failed")?;
                if peer != Some(from) {
                    info!(peer = %from, "datagram peer");
                    peer = Some(from);
                }
                let at = Instant::now();
                let events: Vec<Event> = match mode {
                    DatagramMode::Stream => decoder.feed(&buf[..n]).collect(),
                    DatagramMode::Packet => match decode_datagram(&buf[..n]) {
                        Ok(channels) => vec![Event::Sample(channels.into())],
                        Err(err) => {
                            debug!(%err, "dropping datagram");
                            Vec::new()
                        }
                    },
                };
                for event in events {
                    let msg = Inbound { event, at, reply: reply_tx.clone() };
                    forward(&inbound, msg).await?;
                }
                None
            }
            Some(line) = reply_rx.recv() => Some(line),
            line = telemetry.recv() => match line {
                Ok(line) => Some(line),
                Err(broadcast::error::RecvError::Lagged(_)) => None,
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
        };

        if let (Some(line), Some(peer)) = (outgoing, peer) {
            let mut datagram = line.into_bytes();
            datagram.extend_from_slice(b"\r\n");
            if let Err(err) = socket.send_to(&datagram, peer).await {
                debug!(%peer, error = %err, "send failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RecordingOutput;
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[tokio::test(flavor = "multi_thread")]
    async fn replies_over_a_byte_stream() {
        let controller = Arc::new(
            Controller::new(&Config::default(), Box::new(RecordingOutput::new()), None).unwrap(),
        );
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_DEPTH);
        let pipeline = {
            let controller = controller.clone();
            tokio::task::spawn_blocking(move || run_pipeline(&controller, inbound_rx))
        };
        let (telemetry_tx, _) = broadcast::channel(TELEMETRY_DEPTH);

        let (client, server) = tokio::io::duplex(1024);
        let (server_read, server_write) = tokio::io::split(server);
        let session = tokio::spawn(serve_stream(
            server_read,
            server_write,
            inbound_tx,
            telemetry_tx.subscribe(),
        ));

        let (client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(b"BITS?\nTELEM?X").await.unwrap();
        let mut lines = BufReader::new(client_read).lines();
        assert_eq!(
            lines.next_line().await.unwrap().as_deref(),
            Some("BITS:12,max_raw=4095")
        );
        assert_eq!(
            lines.next_line().await.unwrap().as_deref(),
            Some("TELEM:rate=0")
        );

        telemetry_tx.send("TELEM:test".to_string()).unwrap();
        assert_eq!(
            lines.next_line().await.unwrap().as_deref(),
            Some("TELEM:test")
        );

        drop(lines);
        drop(client_write);
        session.await.unwrap().unwrap();
        pipeline.await.unwrap();
    }
}
