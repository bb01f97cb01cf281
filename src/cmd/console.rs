//! Live socket commands: `forest console` (interactive) and `forest watch`.

use anyhow::Result;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};

use forest::config::ForestConfig;
use forest::console::{ConsoleView, FrameEffect};
use forest::dispatch::parse_command_line;
use forest::fleet::Fleet;
use forest::socket::{ConnectionState, InboundFrame, SocketSession};
use forest::ui::{self, icons};

use super::{dispatcher, session_config};

/// Read `function key=value ...` (or raw JSON) lines from stdin, send each
/// over the socket, and print whatever the backend streams back.
pub async fn cmd_console(config: &ForestConfig) -> Result<()> {
    let (session, mut frames) = SocketSession::spawn(session_config(config));
    let mut state_rx = session.subscribe_state();
    let mut view = ConsoleView::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!(
        "{} {}",
        style("Forest console").bold().cyan(),
        style(config.websocket_url()).dim()
    );
    println!("{}", style("Type `function key=value ...` or a JSON object. Ctrl-D exits.").dim());

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let request = match parse_command_line(&line) {
                    Ok(request) => request,
                    Err(e) => {
                        println!("{}{}", icons::CROSS, e);
                        continue;
                    }
                };
                if !view.knows(&request) {
                    println!("{}Backend did not advertise '{}'", icons::WARN, request.function);
                }
                view.begin_request();
                if let Err(e) = session.send_command(&request).await {
                    println!("{}{}", icons::CROSS, e);
                }
            }
            Some(frame) = frames.recv() => {
                match view.apply(frame) {
                    FrameEffect::CapabilitiesUpdated(count) => {
                        println!("{}", style(format!("{count} functions available")).dim());
                    }
                    FrameEffect::EventAppended(index) => {
                        if let Some(event) = view.events().get(index) {
                            println!("{}", serde_json::to_string_pretty(event)?);
                        }
                    }
                }
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *state_rx.borrow_and_update();
                view.set_connection(state);
                println!("{}", ui::connection_badge(state));
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.shutdown().await;
    Ok(())
}

/// Follow the socket and re-poll the leaves whenever the backend pushes an
/// event.
pub async fn cmd_watch(config: &ForestConfig) -> Result<()> {
    let (session, mut frames) = SocketSession::spawn(session_config(config));
    let mut state_rx = session.subscribe_state();
    let fleet = Fleet::new(dispatcher(config));

    loop {
        tokio::select! {
            Some(frame) = frames.recv() => {
                if let InboundFrame::Event(event) = frame {
                    println!("{}", style(event).dim());
                    match fleet.refresh().await {
                        Ok(_) => {
                            for leaf in fleet.leaves()? {
                                println!("{}", ui::leaf_line(&leaf));
                            }
                        }
                        Err(e) => println!("{}{}", icons::CROSS, e),
                    }
                }
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *state_rx.borrow_and_update();
                println!("{}", ui::connection_badge(state));
                if state == ConnectionState::Connected && fleet.refresh().await.is_ok() {
                    for leaf in fleet.leaves()? {
                        println!("{}", ui::leaf_line(&leaf));
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.shutdown().await;
    Ok(())
}
