//! Per-connection task for the video relay port
//!
//! A video client opens with a handshake naming itself and its opponent,
//! then streams length-prefixed frames. Inbound frames are forwarded to the
//! opponent's queue; a writer task drains this connection's own queue.

use crate::relay::{ForwardResult, VideoRelay};
use log::{debug, info, warn};
use shared::video::{read_frame, read_handshake, write_ack, write_frame};
use shared::FrameError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Serves one video client until it disconnects.
pub async fn handle_video_connection(stream: TcpStream, addr: SocketAddr, relay: Arc<VideoRelay>) {
    let (mut reader, mut writer) = stream.into_split();

    let handshake = match read_handshake(&mut reader).await {
        Ok(handshake) => handshake,
        Err(FrameError::Closed) | Err(FrameError::Io(_)) => {
            debug!("Video client {} left before the handshake", addr);
            return;
        }
        Err(e) => {
            warn!("Bad video handshake from {}: {}", addr, e);
            return;
        }
    };
    let nickname = handshake.nickname;

    let (id, frames) = relay.register_connection(&nickname).await;
    relay.register_pair(&nickname, &handshake.opponent).await;

    if let Err(e) = write_ack(&mut writer).await {
        warn!("Failed to acknowledge video handshake for {}: {}", nickname, e);
        release(&relay, &nickname, id).await;
        return;
    }
    info!(
        "Video connection {} from {} for {} (opponent {})",
        id, addr, nickname, handshake.opponent
    );

    let mut writer_task = tokio::spawn(run_writer(writer, frames, nickname.clone()));
    let mut forwarded = 0u64;
    let mut dropped = 0u64;

    loop {
        let frame = tokio::select! {
            frame = read_frame(&mut reader) => frame,
            _ = &mut writer_task => break,
        };

        match frame {
            Ok(Some(frame)) => match relay.forward_frame(&nickname, frame).await {
                ForwardResult::Delivered => forwarded += 1,
                ForwardResult::Dropped => dropped += 1,
                ForwardResult::NoPair | ForwardResult::RecipientUnreachable => {}
            },
            Ok(None) => break,
            Err(e) => {
                warn!("Dropping video connection for {}: {}", nickname, e);
                break;
            }
        }
    }

    release(&relay, &nickname, id).await;
    writer_task.abort();
    info!(
        "Video connection {} for {} closed ({} frames forwarded, {} dropped)",
        id, nickname, forwarded, dropped
    );
}

async fn release(relay: &VideoRelay, nickname: &str, id: u64) {
    // A newer connection for the same nickname owns the slot and the pairing.
    if relay.remove_connection(nickname, id).await {
        relay.unregister_pair(nickname).await;
    }
}

async fn run_writer(
    mut writer: OwnedWriteHalf,
    mut frames: mpsc::Receiver<Vec<u8>>,
    nickname: String,
) {
    while let Some(frame) = frames.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            debug!("Video writer for {} stopped: {}", nickname, e);
            break;
        }
    }
}
