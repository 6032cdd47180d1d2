//! # Command Console
//!
//! Line-oriented control surface of the `mos-bridge` binary.
//!
//! ```text
//! call <service> <Method> [json]   submit a custom method
//! read <service>                   submit <service>.Read
//! write <service> <json>           submit <service>.Write
//! flush <service>                  discard pending requests
//! get                              report device liveness
//! watchdog <secs>                  set the watchdog interval (0 disables)
//! pending | stats | metrics        inspection
//! sim heartbeats|replies on|off    pause the simulated device
//! sim update <service> <json>      publish a simulated update broadcast
//! quit
//! ```
//!
//! Results do not come back here: they arrive on the event sink and are
//! printed by the event printer.

use mb_01_rpc_correlation::{RpcApi, RpcError, RpcServiceHandle};
use mb_02_liveness_monitor::{LivenessApi, LivenessError};
use serde_json::{json, Value};
use shared_bus::TransportError;
use shared_types::OutputSlot;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::adapters::RoutedEvent;
use crate::container::BridgeContainer;

pub const HELP: &str = "commands: call <service> <Method> [json] | read <service> | \
write <service> <json> | flush <service> | get | watchdog <secs> | pending | stats | \
metrics | sim heartbeats|replies on|off | sim update <service> <json> | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Call {
        service: String,
        method: String,
        args: Value,
    },
    Read {
        service: String,
    },
    Write {
        service: String,
        args: Value,
    },
    Flush {
        service: String,
    },
    Get,
    Watchdog(String),
    Pending,
    Stats,
    Metrics,
    Sim(SimCommand),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimCommand {
    Heartbeats(bool),
    Replies(bool),
    Update { service: String, payload: Value },
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("unknown command {0:?} (try `help`)")]
    UnknownCommand(String),

    #[error("invalid JSON argument: {0}")]
    Json(String),

    #[error("no such service {0:?}")]
    UnknownService(String),

    #[error("simulator is not running")]
    NoSimulator,

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Liveness(#[from] LivenessError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("metrics: {0}")]
    Metrics(String),
}

/// Parse one input line. Blank lines parse to `None`.
pub fn parse(line: &str) -> Result<Option<Command>, ConsoleError> {
    let line = line.trim();
    let Some((word, rest)) = split_word(line) else {
        return Ok(None);
    };

    let command = match word {
        "call" => {
            let (service, rest) =
                split_word(rest).ok_or(ConsoleError::Usage("call <service> <Method> [json]"))?;
            let (method, rest) =
                split_word(rest).ok_or(ConsoleError::Usage("call <service> <Method> [json]"))?;
            Command::Call {
                service: service.to_string(),
                method: method.to_string(),
                args: parse_args(rest, json!({}))?,
            }
        }
        "read" => Command::Read {
            service: single(rest, "read <service>")?,
        },
        "write" => {
            let (service, rest) =
                split_word(rest).ok_or(ConsoleError::Usage("write <service> <json>"))?;
            if rest.is_empty() {
                return Err(ConsoleError::Usage("write <service> <json>"));
            }
            Command::Write {
                service: service.to_string(),
                args: parse_args(rest, Value::Null)?,
            }
        }
        "flush" => Command::Flush {
            service: single(rest, "flush <service>")?,
        },
        "get" => Command::Get,
        "watchdog" => Command::Watchdog(single(rest, "watchdog <secs>")?),
        "pending" => Command::Pending,
        "stats" => Command::Stats,
        "metrics" => Command::Metrics,
        "sim" => Command::Sim(parse_sim(rest)?),
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(ConsoleError::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}

fn parse_sim(rest: &str) -> Result<SimCommand, ConsoleError> {
    const USAGE: &str = "sim heartbeats|replies on|off | sim update <service> <json>";
    let (what, rest) = split_word(rest).ok_or(ConsoleError::Usage(USAGE))?;
    match what {
        "heartbeats" => Ok(SimCommand::Heartbeats(parse_switch(rest, USAGE)?)),
        "replies" => Ok(SimCommand::Replies(parse_switch(rest, USAGE)?)),
        "update" => {
            let (service, rest) = split_word(rest).ok_or(ConsoleError::Usage(USAGE))?;
            Ok(SimCommand::Update {
                service: service.to_string(),
                payload: parse_args(rest, json!({}))?,
            })
        }
        _ => Err(ConsoleError::Usage(USAGE)),
    }
}

fn parse_switch(rest: &str, usage: &'static str) -> Result<bool, ConsoleError> {
    match rest.trim() {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(ConsoleError::Usage(usage)),
    }
}

fn split_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim())),
        None => Some((s, "")),
    }
}

fn single(rest: &str, usage: &'static str) -> Result<String, ConsoleError> {
    match split_word(rest) {
        Some((word, "")) => Ok(word.to_string()),
        _ => Err(ConsoleError::Usage(usage)),
    }
}

fn parse_args(rest: &str, default: Value) -> Result<Value, ConsoleError> {
    if rest.is_empty() {
        return Ok(default);
    }
    serde_json::from_str(rest).map_err(|e| ConsoleError::Json(e.to_string()))
}

fn service<'a>(
    container: &'a BridgeContainer,
    name: &str,
) -> Result<&'a RpcServiceHandle, ConsoleError> {
    container
        .service(name)
        .ok_or_else(|| ConsoleError::UnknownService(name.to_string()))
}

/// Run `command` against the container and describe what was done.
pub async fn execute(
    container: &BridgeContainer,
    command: Command,
) -> Result<String, ConsoleError> {
    match command {
        Command::Call {
            service: name,
            method,
            args,
        } => {
            let id = service(container, &name)?.call(&method, args).await?;
            Ok(format!("sent {}.{} id={}", name, method, id))
        }
        Command::Read { service: name } => {
            let id = service(container, &name)?.read().await?;
            Ok(format!("sent {}.Read id={}", name, id))
        }
        Command::Write {
            service: name,
            args,
        } => {
            let id = service(container, &name)?.write(args).await?;
            Ok(format!("sent {}.Write id={}", name, id))
        }
        Command::Flush { service: name } => {
            let n = service(container, &name)?.flush().await?;
            Ok(format!("flushed {} pending request(s) on {}", n, name))
        }
        Command::Get => {
            let state = container.liveness().get().await?;
            Ok(format!("{} is {}", container.liveness().device_id(), state))
        }
        Command::Watchdog(secs) => {
            let watchdog = container.liveness().set_watchdog(Value::String(secs)).await?;
            Ok(format!("watchdog interval {}s", watchdog.interval_secs))
        }
        Command::Pending => Ok(format!("{} pending", container.pending_total().await)),
        Command::Stats => {
            let client = container.client();
            let mut lines = vec![format!(
                "client {} -> {} ({})",
                client.self_id(),
                client.device_id(),
                if client.connected() { "connected" } else { "disconnected" }
            )];
            for name in container.service_names() {
                if let Some(handle) = container.service(name) {
                    lines.push(format!("{}: {:?}", handle.node_id(), handle.stats()));
                }
            }
            lines.push(format!(
                "{}: {:?}",
                container.liveness().device_id(),
                container.liveness().stats()
            ));
            Ok(lines.join("\n"))
        }
        Command::Metrics => {
            mos_telemetry::gather_metrics().map_err(|e| ConsoleError::Metrics(e.to_string()))
        }
        Command::Sim(sim) => {
            let simulator = container.simulator().ok_or(ConsoleError::NoSimulator)?;
            match sim {
                SimCommand::Heartbeats(on) => {
                    simulator.set_heartbeats(on);
                    Ok(format!("simulated heartbeats {}", on_off(on)))
                }
                SimCommand::Replies(on) => {
                    simulator.set_replies(on);
                    Ok(format!("simulated replies {}", on_off(on)))
                }
                SimCommand::Update { service, payload } => {
                    simulator.publish_update(&service, payload)?;
                    Ok(format!("published {}.Update", service))
                }
            }
        }
        Command::Help => Ok(HELP.to_string()),
        Command::Quit => Ok("bye".to_string()),
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

/// Read commands from `input` until EOF or `quit`, writing one response
/// per command to `output`.
pub async fn run<R, W>(container: &BridgeContainer, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let response = match parse(&line) {
            Ok(None) => continue,
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => match execute(container, command).await {
                Ok(text) => text,
                Err(e) => format!("error: {}", e),
            },
            Err(e) => format!("error: {}", e),
        };
        output.write_all(response.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
    Ok(())
}

/// One-line rendering of an event for the console.
pub fn format_event(event: &RoutedEvent) -> String {
    match event {
        RoutedEvent::Output(output) => {
            let slot = match output.slot() {
                OutputSlot::Success => "success",
                OutputSlot::Error => "error",
                OutputSlot::Status => "status",
                OutputSlot::Log => "log",
            };
            format!(
                "[{}] {} {} {}",
                slot, output.node_id, output.topic, output.payload
            )
        }
        RoutedEvent::Status { node_id, status } => {
            format!("[indicator] {} {}", node_id, status.text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::BridgeConfig;
    use shared_bus::{InMemoryBroker, TokioClock};
    use shared_types::{NodeOutput, NodeStatus, RecordingSink};
    use std::sync::Arc;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("   ").unwrap(), None);
        assert_eq!(
            parse("call Temp SetMode {\"mode\": \"eco\"}").unwrap(),
            Some(Command::Call {
                service: "Temp".into(),
                method: "SetMode".into(),
                args: json!({"mode": "eco"}),
            })
        );
        assert_eq!(
            parse("call Temp Reset").unwrap(),
            Some(Command::Call {
                service: "Temp".into(),
                method: "Reset".into(),
                args: json!({}),
            })
        );
        assert_eq!(
            parse("write Relay {\"on\":true}").unwrap(),
            Some(Command::Write {
                service: "Relay".into(),
                args: json!({"on": true}),
            })
        );
        assert_eq!(parse("watchdog 30").unwrap(), Some(Command::Watchdog("30".into())));
        assert_eq!(
            parse("sim heartbeats off").unwrap(),
            Some(Command::Sim(SimCommand::Heartbeats(false)))
        );
        assert_eq!(parse("exit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("read"), Err(ConsoleError::Usage(_))));
        assert!(matches!(parse("write Relay"), Err(ConsoleError::Usage(_))));
        assert!(matches!(parse("write Relay {oops"), Err(ConsoleError::Json(_))));
        assert!(matches!(parse("sim heartbeats maybe"), Err(ConsoleError::Usage(_))));
        assert!(matches!(parse("reboot"), Err(ConsoleError::UnknownCommand(_))));
    }

    #[test]
    fn test_format_event() {
        let event =
            RoutedEvent::Output(NodeOutput::success("dev/Temp", "Temp.Read", json!({"t": 1})));
        assert_eq!(format_event(&event), r#"[success] dev/Temp Temp.Read {"t":1}"#);

        let event = RoutedEvent::Status {
            node_id: "dev/liveness".into(),
            status: NodeStatus::offline(),
        };
        assert_eq!(format_event(&event), "[indicator] dev/liveness offline");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_script() {
        let mut config = BridgeConfig::default();
        config.identity.device_id = "dev".into();
        config.rpc.services = vec!["Temp".into()];
        config.simulator.enabled = false;
        let container = BridgeContainer::start(
            &config,
            Arc::new(InMemoryBroker::new()),
            Arc::new(RecordingSink::new()),
            Arc::new(TokioClock::new()),
        )
        .unwrap();

        let script: &[u8] = b"read Temp\nread Nope\n\nwatchdog soon\nwatchdog 5\nquit\nread Temp\n";
        let mut out = Vec::new();
        run(&container, tokio::io::BufReader::new(script), &mut out)
            .await
            .unwrap();

        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "sent Temp.Read id=1");
        assert!(lines[1].starts_with("error: no such service"));
        assert!(lines[2].starts_with("error:"));
        assert_eq!(lines[3], "watchdog interval 5s");

        container.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_reports_client_link() {
        let mut config = BridgeConfig::default();
        config.identity.self_id = "n1".into();
        config.identity.device_id = "dev".into();
        config.rpc.services = vec!["Temp".into()];
        config.simulator.enabled = false;
        let broker = Arc::new(InMemoryBroker::new());
        let container = BridgeContainer::start(
            &config,
            broker.clone(),
            Arc::new(RecordingSink::new()),
            Arc::new(TokioClock::new()),
        )
        .unwrap();

        let out = execute(&container, Command::Stats).await.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "client n1 -> dev (connected)");
        assert!(lines[1].starts_with("dev/Temp: "));
        assert_eq!(lines.len(), 3);

        broker.set_connected(false);
        let out = execute(&container, Command::Stats).await.unwrap();
        assert!(out.starts_with("client n1 -> dev (disconnected)"));

        container.shutdown().await;
    }
}
