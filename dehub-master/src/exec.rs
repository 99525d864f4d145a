use crossterm::terminal;
use crossterm::tty::IsTty;
use dehub_common::{Command, ExecMeta, WinSize};
use dehub_ssh::{SshSession, SubChannelRequest};
use russh::ChannelMsg;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

enum ExecOp {
    Data(Vec<u8>),
    Resize(WinSize),
}

/// Runs `cmd args...` on the servant under a PTY, splicing the local
/// terminal with the remote one and pumping resize notifications (spec
/// §4.6.2). Returns once the remote side closes the channel.
pub async fn exec(ssh: &mut SshSession, cmd: &str, args: &[String]) -> anyhow::Result<()> {
    let is_tty = std::io::stdin().is_tty();
    let winsize = if is_tty {
        let (cols, rows) = terminal::size()?;
        terminal::enable_raw_mode()?;
        WinSize { rows, cols, xpix: 0, ypix: 0 }
    } else {
        WinSize::DEFAULT
    };

    let result = run_exec(ssh, cmd, args, winsize).await;

    if is_tty {
        let _ = terminal::disable_raw_mode();
    }

    result
}

async fn run_exec(ssh: &mut SshSession, cmd: &str, args: &[String], winsize: WinSize) -> anyhow::Result<()> {
    let request = SubChannelRequest::new(
        Command::Exec,
        ExecMeta {
            winsize,
            cmd: cmd.to_owned(),
            args: args.to_vec(),
        },
    )?;

    let mut channel = ssh.channel_open_session().await?;
    channel.exec(true, request.encode()).await?;

    loop {
        match channel.wait().await {
            Some(ChannelMsg::Success) => break,
            Some(ChannelMsg::Failure) => anyhow::bail!("servant rejected exec sub-channel"),
            Some(_) => continue,
            None => anyhow::bail!("channel closed before exec was acknowledged"),
        }
    }

    let (ops_tx, mut ops_rx) = mpsc::unbounded_channel();
    spawn_stdin_reader(ops_tx.clone());
    let resize_stop = spawn_resize_pump(ops_tx);

    let mut stdout = tokio::io::stdout();
    let result = loop {
        tokio::select! {
            op = ops_rx.recv() => {
                match op {
                    Some(ExecOp::Data(data)) => {
                        if channel.data(&data[..]).await.is_err() {
                            break Ok(());
                        }
                    }
                    Some(ExecOp::Resize(size)) => {
                        let _ = channel
                            .window_change(size.cols as u32, size.rows as u32, size.xpix as u32, size.ypix as u32)
                            .await;
                    }
                    None => break Ok(()),
                }
            }
            event = channel.wait() => {
                match event {
                    Some(ChannelMsg::Data { data }) => {
                        if stdout.write_all(&data).await.is_err() {
                            break Ok(());
                        }
                        let _ = stdout.flush().await;
                    }
                    Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | Some(ChannelMsg::ExitStatus { .. }) | None => {
                        break Ok(());
                    }
                    Some(_) => continue,
                }
            }
        }
    };

    resize_stop();
    result
}

fn spawn_stdin_reader(ops_tx: mpsc::UnboundedSender<ExecOp>) {
    tokio::spawn(async move {
        let mut stdin = tokio::io::stdin();
        let mut buf = [0u8; 8192];
        loop {
            match stdin.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => {
                    if ops_tx.send(ExecOp::Data(buf[..n].to_vec())).is_err() {
                        return;
                    }
                }
            }
        }
    });
}

#[cfg(unix)]
fn spawn_resize_pump(ops_tx: mpsc::UnboundedSender<ExecOp>) -> impl FnOnce() {
    use signal_hook::consts::SIGWINCH;
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGWINCH]).expect("failed to register SIGWINCH handler");
    let handle = signals.handle();

    tokio::task::spawn_blocking(move || {
        for _ in signals.forever() {
            let Ok((cols, rows)) = terminal::size() else { return };
            if ops_tx
                .send(ExecOp::Resize(WinSize { rows, cols, xpix: 0, ypix: 0 }))
                .is_err()
            {
                return;
            }
        }
    });

    move || handle.close()
}

#[cfg(windows)]
fn spawn_resize_pump(ops_tx: mpsc::UnboundedSender<ExecOp>) -> impl FnOnce() {
    let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let task_stop = stop.clone();

    tokio::spawn(async move {
        while !task_stop.load(std::sync::atomic::Ordering::Relaxed) {
            tokio::time::sleep(std::time::Duration::from_secs(3)).await;
            let Ok((cols, rows)) = terminal::size() else { continue };
            if ops_tx
                .send(ExecOp::Resize(WinSize { rows, cols, xpix: 0, ypix: 0 }))
                .is_err()
            {
                break;
            }
        }
    });

    move || stop.store(true, std::sync::atomic::Ordering::Relaxed)
}
