use std::io::{Read, Write};

use dehub_common::{ExecMeta, WinSize};
use dehub_ssh::{ChannelStream, ResizeStream};
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::dispatch::log_meta_error;

fn to_pty_size(size: WinSize) -> PtySize {
    PtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: size.xpix,
        pixel_height: size.ypix,
    }
}

/// Spawns `meta.cmd` under a PTY sized to `meta.winsize` and splices it with
/// `channel` bidirectionally, applying resize notifications as they arrive
/// (spec §4.5.3). Runs until either side closes, then kills the child.
pub async fn handle(meta: serde_json::Value, mut channel: ChannelStream, mut resize: ResizeStream) {
    let meta: ExecMeta = match serde_json::from_value(meta) {
        Ok(meta) => meta,
        Err(error) => {
            log_meta_error("exec", &error);
            let _ = channel.write_all(format!("failed to parse exec request: {error}\n").as_bytes()).await;
            return;
        }
    };

    let pty_system = native_pty_system();
    let pair = match pty_system.openpty(to_pty_size(meta.winsize)) {
        Ok(pair) => pair,
        Err(error) => {
            error!(%error, "failed to open pty");
            let _ = channel.write_all(format!("failed to start pty: {error}\n").as_bytes()).await;
            return;
        }
    };

    let mut cmd = CommandBuilder::new(&meta.cmd);
    for arg in &meta.args {
        cmd.arg(arg);
    }

    let mut child = match pair.slave.spawn_command(cmd) {
        Ok(child) => child,
        Err(error) => {
            error!(%error, "failed to spawn command under pty");
            let _ = channel.write_all(format!("failed to start pty: {error}\n").as_bytes()).await;
            return;
        }
    };
    drop(pair.slave);

    let master = pair.master;
    let mut pty_writer = match master.take_writer() {
        Ok(writer) => writer,
        Err(error) => {
            error!(%error, "failed to take pty writer");
            let _ = child.kill();
            return;
        }
    };
    let mut pty_reader = match master.try_clone_reader() {
        Ok(reader) => reader,
        Err(error) => {
            error!(%error, "failed to clone pty reader");
            let _ = child.kill();
            return;
        }
    };

    // PTY -> channel: a blocking reader thread forwards chunks over an
    // mpsc channel to the async side, which writes them to the SSH channel.
    let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(16);
    let pty_reader_task = tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 8192];
        loop {
            match pty_reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if out_tx.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    // channel -> PTY: the async side reads from the SSH channel and forwards
    // chunks over an mpsc channel to a blocking writer thread.
    let (in_tx, mut in_rx) = mpsc::channel::<Vec<u8>>(16);
    let pty_writer_task = tokio::task::spawn_blocking(move || {
        while let Some(chunk) = in_rx.blocking_recv() {
            if pty_writer.write_all(&chunk).is_err() {
                break;
            }
        }
    });

    let splice = async {
        let mut buf = [0u8; 8192];
        loop {
            tokio::select! {
                biased;

                output = out_rx.recv() => {
                    match output {
                        Some(chunk) => {
                            if channel.write_all(&chunk).await.is_err() {
                                return;
                            }
                        }
                        None => return,
                    }
                }
                size = resize.recv() => {
                    match size {
                        Some(size) => {
                            if let Err(error) = master.resize(to_pty_size(size)) {
                                warn!(%error, "failed to resize pty");
                            }
                        }
                        None => {}
                    }
                }
                read = channel.read(&mut buf) => {
                    match read {
                        Ok(0) | Err(_) => return,
                        Ok(n) => {
                            if in_tx.send(buf[..n].to_vec()).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        }
    };

    splice.await;

    drop(in_tx);
    let _ = child.kill();
    let _ = child.wait();
    let _ = pty_reader_task.await;
    let _ = pty_writer_task.await;
}
