//! Handlers for `turnkit decode` and `turnkit replay`.

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::TurnkitConfig;
use crate::error::Result;
use crate::permission::{PermissionBroker, PermissionResponse};
use crate::stream::{decode_stream, DecodeOptions, StreamEventSink, StreamOutcome};
use crate::types::{Message, ToolInvocation};

use super::{DecodeArgs, ReplayArgs};

/// Handle `turnkit decode <file>`.
pub async fn handle_decode(args: DecodeArgs, config: TurnkitConfig) -> Result<()> {
    let sink: Option<StreamEventSink> = args.events.then(|| {
        let sink: StreamEventSink = Arc::new(|event| {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{line}");
            }
        });
        sink
    });
    let options = DecodeOptions {
        sink,
        cancel: None,
        config: config.stream,
    };
    let message = decode_file(&args.file, args.chunk_size, options).await?;
    println!("{}", serde_json::to_string_pretty(&message)?);
    Ok(())
}

/// Handle `turnkit replay <file>`: every tool call goes through the broker,
/// answered from stdin.
pub async fn handle_replay(args: ReplayArgs, mut config: TurnkitConfig) -> Result<()> {
    if let Some(secs) = args.timeout_secs {
        config.permission.timeout_secs = secs;
    }
    let message = decode_file(&args.file, 64, DecodeOptions {
        config: config.stream.clone(),
        ..Default::default()
    })
    .await?;

    let broker = PermissionBroker::new(config.permission);
    let mut subscription = broker.subscribe();
    let responder = broker.clone();
    let prompt = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(request) = subscription.recv().await {
            println!("Allow `{}`? [y]es / [a]lways / [n]o", request.command);
            let Ok(Some(answer)) = lines.next_line().await else {
                responder.cancel_all_requests();
                break;
            };
            responder.respond_to_permission(&request.id, parse_answer(&answer));
        }
    });

    for invocation in message.tool_invocations() {
        let command = command_line(invocation);
        let decision = broker
            .request_permission(command.clone(), base_command(&command))
            .await;
        match decision {
            Ok(response) => println!("{} -> {response}", invocation.tool_call_id),
            Err(err) => println!("{} -> {err}", invocation.tool_call_id),
        }
    }

    prompt.abort();
    Ok(())
}

async fn decode_file(path: &Path, chunk_size: usize, options: DecodeOptions) -> Result<Message> {
    let bytes = tokio::fs::read(path).await?;
    let chunks: Vec<std::io::Result<Vec<u8>>> = bytes
        .chunks(chunk_size.max(1))
        .map(|chunk| Ok(chunk.to_vec()))
        .collect();
    let outcome = decode_stream(Some(futures::stream::iter(chunks)), options).await?;
    Ok(outcome
        .map(|StreamOutcome { message, .. }| message)
        .unwrap_or_default())
}

fn parse_answer(answer: &str) -> PermissionResponse {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" => PermissionResponse::Yes,
        "a" => PermissionResponse::Always,
        other => other.parse().unwrap_or(PermissionResponse::No),
    }
}

/// The shell command a tool call wants to run, or its name and arguments.
pub fn command_line(invocation: &ToolInvocation) -> String {
    invocation
        .args
        .get("command")
        .and_then(|command| command.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} {}", invocation.tool_name, invocation.args))
}

/// Executable name of a command line, without any directory prefix.
pub fn base_command(command: &str) -> String {
    let program = command.split_whitespace().next().unwrap_or_default();
    program.rsplit('/').next().unwrap_or(program).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolInvocationState;
    use serde_json::json;

    fn invocation(args: serde_json::Value) -> ToolInvocation {
        ToolInvocation {
            tool_call_id: "t1".into(),
            tool_name: "bash".into(),
            args,
            state: ToolInvocationState::Call,
            result: None,
        }
    }

    #[test]
    fn base_command_strips_path_and_arguments() {
        assert_eq!(base_command("/usr/bin/git push origin"), "git");
        assert_eq!(base_command("  ls -la"), "ls");
        assert_eq!(base_command(""), "");
    }

    #[test]
    fn command_line_prefers_command_argument() {
        assert_eq!(command_line(&invocation(json!({"command": "cargo test"}))), "cargo test");
        assert_eq!(
            command_line(&invocation(json!({"path": "a.rs"}))),
            r#"bash {"path":"a.rs"}"#
        );
    }

    #[test]
    fn answers_default_to_decline() {
        assert_eq!(parse_answer("y"), PermissionResponse::Yes);
        assert_eq!(parse_answer("Always\n"), PermissionResponse::Always);
        assert_eq!(parse_answer("what"), PermissionResponse::No);
    }
}
