//! KataGo process client.
//!
//! Spawns the engine in GTP mode with piped stdio and splits the work across
//! three tasks: a stdout reader that turns response lines into events, a
//! stdin writer, and a command processor that serializes [`EngineCommand`]s
//! onto the wire. The blocking parts of the protocol (handshake) happen once
//! during spawn; everything after is channel-driven.

use crate::gtp::{format_color, format_vertex, parse_gtp_line, GtpMessage};
use crate::{EngineCommand, EngineEvent, GtpDirection};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;

const HANDSHAKE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Configuration for the engine process.
#[derive(Debug, Clone)]
pub struct KatagoConfig {
    pub executable: Option<PathBuf>,
    pub model: Option<PathBuf>,
    pub gtp_config: Option<PathBuf>,
    pub board_size: u8,
    pub komi: f32,
    /// Ruleset name, applied at initialization when set.
    pub rules: Option<String>,
    /// Search-visit cap; acts as the difficulty setting.
    pub max_visits: u32,
    /// Label used in log spans, e.g. the owning session id.
    pub label: Option<String>,
}

impl Default for KatagoConfig {
    fn default() -> Self {
        Self {
            executable: None,
            model: None,
            gtp_config: None,
            board_size: goban::BOARD_SIZE,
            komi: 7.5,
            rules: None,
            max_visits: 50,
            label: None,
        }
    }
}

pub struct KatagoEngine {
    process: Child,
    command_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl KatagoEngine {
    /// Spawn a new engine process and run the GTP handshake plus the
    /// session-initialization sequence (board size, clear, komi, time
    /// settings, visit cap).
    #[tracing::instrument(level = "info", skip(config), fields(label = ?config.label))]
    pub async fn spawn_with_config(config: KatagoConfig) -> Result<Self, String> {
        tracing::info!("Starting engine spawn (config: {:?})", config);
        let path = config
            .executable
            .clone()
            .or_else(find_katago_path)
            .ok_or("KataGo not found")?;
        tracing::info!("Found KataGo at: {:?}", path);

        let mut cmd = tokio::process::Command::new(&path);
        cmd.arg("gtp");
        if let Some(ref model) = config.model {
            cmd.arg("-model").arg(model);
        }
        if let Some(ref gtp_config) = config.gtp_config {
            cmd.arg("-config").arg(gtp_config);
        }

        let mut process = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| format!("Failed to spawn KataGo: {}", e))?;

        let mut stdin = process.stdin.take().ok_or("Failed to get stdin")?;
        let stdout = process.stdout.take().ok_or("Failed to get stdout")?;

        let (command_tx, mut command_rx) = mpsc::channel::<EngineCommand>(32);
        let (event_tx, event_rx) = mpsc::channel::<EngineEvent>(64);

        // Spawn output reader task
        let board_size = config.board_size;
        let reader_event_tx = event_tx.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        tracing::warn!("Engine stdout EOF - process closed");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            // Blank line terminates a response block.
                            continue;
                        }
                        tracing::trace!("GTP << {}", trimmed);

                        let _ = reader_event_tx
                            .send(EngineEvent::RawGtpMessage {
                                direction: GtpDirection::FromEngine,
                                message: trimmed.to_string(),
                            })
                            .await;

                        let event = match parse_gtp_line(trimmed, board_size) {
                            Ok(GtpMessage::Success(_)) => EngineEvent::Ready,
                            Ok(GtpMessage::Failure(msg)) => EngineEvent::Error(msg),
                            Ok(GtpMessage::Play(mv)) => EngineEvent::MoveGenerated(mv),
                            Ok(GtpMessage::Info(eval)) => EngineEvent::Evaluation(eval),
                            Err(e) => {
                                // Unparseable line: log, discard, carry on.
                                tracing::warn!("Discarding engine line: {}", e);
                                continue;
                            }
                        };

                        if reader_event_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Error reading from engine stdout: {}", e);
                        break;
                    }
                }
            }
            tracing::info!("Output reader task exiting");
        });

        // Handshake: the engine answers "=" to protocol_version once ready.
        stdin
            .write_all(b"protocol_version\n")
            .await
            .map_err(|e| format!("Failed to write to stdin: {}", e))?;
        stdin
            .flush()
            .await
            .map_err(|e| format!("Failed to flush: {}", e))?;

        let mut temp_rx = event_rx;
        let wait_result = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
            while let Some(event) = temp_rx.recv().await {
                if matches!(event, EngineEvent::Ready) {
                    return Ok(());
                }
            }
            Err("Engine closed before answering the handshake")
        })
        .await;

        match wait_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(format!("Engine initialization failed: {}", e)),
            Err(_) => return Err("Timeout waiting for engine to respond".to_string()),
        }
        let event_rx = temp_rx;
        tracing::debug!("Handshake complete");

        // Spawn stdin writer task
        let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(32);
        let writer_event_tx = event_tx.clone();
        tokio::spawn(async move {
            while let Some(cmd) = stdin_rx.recv().await {
                let trimmed = cmd.trim();
                tracing::trace!("GTP >> {}", trimmed);

                let _ = writer_event_tx
                    .send(EngineEvent::RawGtpMessage {
                        direction: GtpDirection::ToEngine,
                        message: trimmed.to_string(),
                    })
                    .await;

                if let Err(e) = stdin.write_all(cmd.as_bytes()).await {
                    tracing::error!("Failed to write to stdin: {}", e);
                }
                if let Err(e) = stdin.flush().await {
                    tracing::error!("Failed to flush stdin: {}", e);
                }
            }
            tracing::info!("Stdin writer task exiting");
        });

        // Session initialization, in the order the trainer expects the
        // engine to apply it.
        let mut init = vec![
            format!("boardsize {}\n", config.board_size),
            "clear_board\n".to_string(),
            format!("komi {}\n", config.komi),
            "time_settings 0 1 1\n".to_string(),
            format!("kata-set-param maxVisits {}\n", config.max_visits),
        ];
        if let Some(ref rules) = config.rules {
            init.insert(3, format!("kata-set-rules {}\n", rules));
        }
        for line in init {
            let _ = stdin_tx.send(line).await;
        }

        // Spawn command processor task
        let stdin_tx_for_commands = stdin_tx.clone();
        tokio::spawn(async move {
            while let Some(cmd) = command_rx.recv().await {
                tracing::debug!("Processing engine command: {:?}", cmd);
                let quit = matches!(cmd, EngineCommand::Quit);
                let line = serialize_command(&cmd, board_size);
                if stdin_tx_for_commands.send(line).await.is_err() {
                    break;
                }
                if quit {
                    break;
                }
            }
            tracing::info!("Command processor task exiting");
        });

        tracing::info!("Engine spawned and initialized successfully");
        Ok(Self {
            process,
            command_tx,
            event_rx,
        })
    }

    /// Queue a command for the engine.
    pub async fn send_command(&self, cmd: EngineCommand) -> Result<(), String> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|e| format!("Failed to send command: {}", e))
    }

    /// Try to receive an event from the engine (non-blocking).
    pub fn try_recv_event(&mut self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive an event from the engine. `None` means the process is gone.
    pub async fn recv_event(&mut self) -> Option<EngineEvent> {
        self.event_rx.recv().await
    }

    /// Shutdown the engine.
    pub async fn shutdown(mut self) {
        let _ = self.send_command(EngineCommand::Quit).await;
        let _ = tokio::time::timeout(std::time::Duration::from_secs(1), self.process.wait()).await;
        let _ = self.process.kill().await;
    }
}

/// Serialize a command to its wire form, newline included.
pub fn serialize_command(cmd: &EngineCommand, board_size: u8) -> String {
    match cmd {
        EngineCommand::ClearBoard => "clear_board\n".to_string(),
        EngineCommand::SetBoardSize(size) => format!("boardsize {}\n", size),
        EngineCommand::SetKomi(komi) => format!("komi {}\n", komi),
        EngineCommand::SetRules(rules) => format!("kata-set-rules {}\n", rules),
        EngineCommand::SetTimeSettings {
            main_s,
            byo_yomi_s,
            byo_yomi_stones,
        } => format!("time_settings {} {} {}\n", main_s, byo_yomi_s, byo_yomi_stones),
        EngineCommand::SetMaxVisits(visits) => {
            format!("kata-set-param maxVisits {}\n", visits)
        }
        EngineCommand::Play { color, vertex } => format!(
            "play {} {}\n",
            format_color(*color),
            format_vertex(*vertex, board_size)
        ),
        EngineCommand::Undo => "undo\n".to_string(),
        EngineCommand::GenerateMove { color, visits } => {
            format!("kata-genmove_analyze {} {}\n", format_color(*color), visits)
        }
        EngineCommand::Analyze { color, visits } => {
            format!("kata-analyze {} {}\n", format_color(*color), visits)
        }
        EngineCommand::Quit => "quit\n".to_string(),
    }
}

/// Find the KataGo executable: `KATAGO_PATH` first, then common install
/// locations, then the search path.
fn find_katago_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("KATAGO_PATH") {
        return Some(PathBuf::from(path));
    }

    let paths = [
        "/usr/local/bin/katago",
        "/usr/bin/katago",
        "/opt/homebrew/bin/katago",
        "/usr/games/katago",
        "katago", // In PATH
    ];

    for path_str in paths {
        if std::process::Command::new(path_str)
            .arg("version")
            .output()
            .is_ok()
        {
            return Some(PathBuf::from(path_str));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use goban::{Color, Coord, Vertex, BOARD_SIZE};

    #[test]
    fn test_serialize_play() {
        let cmd = EngineCommand::Play {
            color: Color::Black,
            vertex: Vertex::Play(Coord::new(15, 3)),
        };
        assert_eq!(serialize_command(&cmd, BOARD_SIZE), "play B Q16\n");

        let cmd = EngineCommand::Play {
            color: Color::White,
            vertex: Vertex::Pass,
        };
        assert_eq!(serialize_command(&cmd, BOARD_SIZE), "play W pass\n");
    }

    #[test]
    fn test_serialize_analysis_commands() {
        let cmd = EngineCommand::GenerateMove {
            color: Color::White,
            visits: 50,
        };
        assert_eq!(
            serialize_command(&cmd, BOARD_SIZE),
            "kata-genmove_analyze W 50\n"
        );
        let cmd = EngineCommand::Analyze {
            color: Color::Black,
            visits: 80,
        };
        assert_eq!(serialize_command(&cmd, BOARD_SIZE), "kata-analyze B 80\n");
    }

    #[test]
    fn test_serialize_setup_commands() {
        assert_eq!(
            serialize_command(&EngineCommand::SetKomi(7.5), BOARD_SIZE),
            "komi 7.5\n"
        );
        assert_eq!(
            serialize_command(
                &EngineCommand::SetTimeSettings {
                    main_s: 0,
                    byo_yomi_s: 1,
                    byo_yomi_stones: 1
                },
                BOARD_SIZE
            ),
            "time_settings 0 1 1\n"
        );
        assert_eq!(
            serialize_command(&EngineCommand::SetMaxVisits(200), BOARD_SIZE),
            "kata-set-param maxVisits 200\n"
        );
        assert_eq!(
            serialize_command(&EngineCommand::SetRules("chinese".to_string()), BOARD_SIZE),
            "kata-set-rules chinese\n"
        );
    }
}
