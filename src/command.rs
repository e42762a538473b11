//! Command Front End
//!
//! Line-oriented command language driving a [`LoadBalancer`]:
//!
//! ```text
//! ADD_SERVER <id> <cache_capacity>
//! REMOVE_SERVER <id>
//! EDIT <doc_name> <content...>
//! GET <doc_name>
//! STATS
//! ```
//!
//! Keywords are case-insensitive, `#` starts a comment line and arguments
//! may be double-quoted to include whitespace.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::lb::{LoadBalancer, LoadBalancerStats};
use crate::ring::RingHasher;
use crate::server::Response;

/// Parsed front-end command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddServer { id: u32, cache_capacity: usize },
    RemoveServer { id: u32 },
    Edit { name: String, content: String },
    Get { name: String },
    Stats,
}

/// What a command printed
#[derive(Debug, Clone)]
pub enum CommandOutput {
    /// Responses in the order they were produced
    Responses(Vec<Response>),
    Stats(LoadBalancerStats),
}

impl Command {
    /// Parse one line; blank lines and comments yield `None`
    pub fn parse(line: &str, line_no: usize) -> Result<Option<Command>> {
        let invalid = |reason: String| Error::Command {
            line: line_no,
            reason,
        };

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }

        let (keyword, rest) = match split_token(trimmed).map_err(invalid)? {
            Some((keyword, rest)) => (keyword.to_ascii_uppercase(), rest),
            None => return Ok(None),
        };

        // Content is kept verbatim, so EDIT is not split into tokens
        if keyword == "EDIT" {
            return parse_edit(rest).map(Some).map_err(invalid);
        }

        let tokens = tokenize(rest).map_err(invalid)?;
        let args = tokens.as_slice();

        let command = match keyword.as_str() {
            "ADD_SERVER" => {
                let [id, capacity] = args else {
                    return Err(invalid("usage: ADD_SERVER <id> <cache_capacity>".into()));
                };
                Command::AddServer {
                    id: parse_number(id, "server id").map_err(invalid)?,
                    cache_capacity: parse_number(capacity, "cache capacity").map_err(invalid)?,
                }
            }
            "REMOVE_SERVER" => {
                let [id] = args else {
                    return Err(invalid("usage: REMOVE_SERVER <id>".into()));
                };
                Command::RemoveServer {
                    id: parse_number(id, "server id").map_err(invalid)?,
                }
            }
            "GET" => {
                let [name] = args else {
                    return Err(invalid("usage: GET <doc_name>".into()));
                };
                Command::Get { name: name.clone() }
            }
            "STATS" if args.is_empty() => Command::Stats,
            other => return Err(invalid(format!("unknown command: {}", other))),
        };

        Ok(Some(command))
    }

    /// Run the command against a load balancer
    pub async fn execute<H: RingHasher>(&self, lb: &LoadBalancer<H>) -> Result<CommandOutput> {
        let responses = match self {
            Command::AddServer { id, cache_capacity } => {
                lb.add_server(*id, *cache_capacity).await?.flushed
            }
            Command::RemoveServer { id } => lb.remove_server(*id).await?.flushed,
            Command::Edit { name, content } => vec![lb.edit(name, content).await?],
            Command::Get { name } => lb.get(name).await?.into_responses(),
            Command::Stats => return Ok(CommandOutput::Stats(lb.stats().await)),
        };
        Ok(CommandOutput::Responses(responses))
    }
}

/// Counters reported after a script finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptSummary {
    pub executed: usize,
    pub failed: usize,
    /// Failed ADD_SERVER / REMOVE_SERVER commands, included in `failed`
    pub topology_rejected: usize,
}

/// Output style of the script runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Execute commands line by line, writing every response to `output`.
///
/// A rejected command is reported and the script continues.
pub async fn run_script<H, R, W>(
    lb: &LoadBalancer<H>,
    input: R,
    output: &mut W,
    format: OutputFormat,
) -> Result<ScriptSummary>
where
    H: RingHasher,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut summary = ScriptSummary::default();
    let mut lines = input.lines();
    let mut line_no = 0;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;

        let result = match Command::parse(&line, line_no) {
            Ok(Some(command)) => command.execute(lb).await,
            Ok(None) => continue,
            Err(e) => Err(e),
        };

        let rendered = match result {
            Ok(out) => {
                summary.executed += 1;
                render(&out, format)?
            }
            Err(e) => {
                summary.failed += 1;
                if e.is_topology_error() {
                    summary.topology_rejected += 1;
                    tracing::warn!(line = line_no, error = %e, "Topology change rejected");
                } else {
                    tracing::warn!(line = line_no, error = %e, "Command failed");
                }
                render_error(&e, line_no, format)?
            }
        };

        output.write_all(rendered.as_bytes()).await?;
    }

    output.flush().await?;
    Ok(summary)
}

fn render(out: &CommandOutput, format: OutputFormat) -> Result<String> {
    let mut text = String::new();
    match (out, format) {
        (CommandOutput::Responses(responses), OutputFormat::Text) => {
            for response in responses {
                text.push_str(&response.to_string());
                text.push('\n');
            }
        }
        (CommandOutput::Responses(responses), OutputFormat::Json) => {
            for response in responses {
                let value = serde_json::json!({
                    "server": response.serving_id,
                    "response": response.payload,
                    "log_kind": response.log_kind(),
                    "log": response.log_detail(),
                });
                text.push_str(&serde_json::to_string(&value)?);
                text.push('\n');
            }
        }
        (CommandOutput::Stats(stats), OutputFormat::Text) => {
            text.push_str(&format!("[Stats] {}\n", stats));
        }
        (CommandOutput::Stats(stats), OutputFormat::Json) => {
            text.push_str(&serde_json::to_string(stats)?);
            text.push('\n');
        }
    }
    Ok(text)
}

fn render_error(error: &Error, line_no: usize, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => format!("[Error]-Line {}: {}\n", line_no, error),
        OutputFormat::Json => {
            let value = serde_json::json!({ "line": line_no, "error": error.to_string() });
            format!("{}\n", serde_json::to_string(&value)?)
        }
    })
}

/// `EDIT <doc_name> <content...>` with the content taken verbatim.
///
/// Content that is a single quoted run is unquoted.
fn parse_edit(rest: &str) -> std::result::Result<Command, String> {
    let usage = || "usage: EDIT <doc_name> <content...>".to_string();

    let (name, content) = split_token(rest)?.ok_or_else(usage)?;
    let content = content.trim();
    if content.is_empty() {
        return Err(usage());
    }

    let content = match content.strip_prefix('"').and_then(|c| c.strip_suffix('"')) {
        Some(inner) if !inner.contains('"') => inner,
        _ => content,
    };

    Ok(Command::Edit {
        name,
        content: content.to_string(),
    })
}

/// First token of `input` and the unparsed remainder
fn split_token(input: &str) -> std::result::Result<Option<(String, &str)>, String> {
    let input = input.trim_start();
    if input.is_empty() {
        return Ok(None);
    }

    if let Some(quoted) = input.strip_prefix('"') {
        return match quoted.find('"') {
            Some(end) => Ok(Some((quoted[..end].to_string(), &quoted[end + 1..]))),
            None => Err("unterminated quote".into()),
        };
    }

    let end = input.find(char::is_whitespace).unwrap_or(input.len());
    Ok(Some((input[..end].to_string(), &input[end..])))
}

/// Split on whitespace, keeping double-quoted runs together
fn tokenize(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quoted {
        return Err("unterminated quote".into());
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_number<T: std::str::FromStr>(value: &str, what: &str) -> std::result::Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("invalid {}: {}", what, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::ReplicaMode;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("add_server 3 10", 1).unwrap(),
            Some(Command::AddServer {
                id: 3,
                cache_capacity: 10
            })
        );
        assert_eq!(
            Command::parse("  REMOVE_SERVER 7", 1).unwrap(),
            Some(Command::RemoveServer { id: 7 })
        );
        assert_eq!(
            Command::parse("EDIT notes.txt hello  world ", 1).unwrap(),
            Some(Command::Edit {
                name: "notes.txt".into(),
                content: "hello  world".into()
            })
        );
        assert_eq!(
            Command::parse(r#"edit "my notes.txt" "two  spaces""#, 1).unwrap(),
            Some(Command::Edit {
                name: "my notes.txt".into(),
                content: "two  spaces".into()
            })
        );
        assert_eq!(
            Command::parse("Get a.txt", 1).unwrap(),
            Some(Command::Get { name: "a.txt".into() })
        );
        assert_eq!(Command::parse("stats", 1).unwrap(), Some(Command::Stats));
        assert_eq!(Command::parse("# comment", 1).unwrap(), None);
        assert_eq!(Command::parse("   ", 1).unwrap(), None);
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let err = Command::parse("ADD_SERVER x 1", 4).unwrap_err();
        assert!(matches!(err, Error::Command { line: 4, .. }));
        assert!(err.to_string().contains("invalid server id: x"));

        assert!(Command::parse("GET", 1).is_err());
        assert!(Command::parse("EDIT a.txt", 1).is_err());
        assert!(Command::parse("REMOVE_SERVER 1 2", 1).is_err());
        assert!(Command::parse("PUT a b", 1).is_err());
        assert!(Command::parse(r#"GET "open"#, 1).is_err());
    }

    #[test]
    fn test_empty_quoted_content() {
        assert_eq!(
            Command::parse(r#"EDIT a.txt """#, 1).unwrap(),
            Some(Command::Edit {
                name: "a.txt".into(),
                content: String::new()
            })
        );
    }

    #[test]
    fn test_edit_content_kept_verbatim() {
        let parsed = Command::parse("EDIT a.txt  x = \"1\"\tand  y", 1).unwrap();
        assert_eq!(
            parsed,
            Some(Command::Edit {
                name: "a.txt".into(),
                content: "x = \"1\"\tand  y".into()
            })
        );

        let parsed = Command::parse(r#"EDIT "b c.txt" say "hi""#, 1).unwrap();
        assert_eq!(
            parsed,
            Some(Command::Edit {
                name: "b c.txt".into(),
                content: r#"say "hi""#.into()
            })
        );
    }

    #[tokio::test]
    async fn test_run_script_text() {
        let lb = LoadBalancer::new(ReplicaMode::Single, 16);
        let script = "\
# single server
ADD_SERVER 5 2
EDIT a.txt v1
GET a.txt
GET missing.txt
REMOVE_SERVER 42
";
        let mut output = Vec::new();
        let summary = run_script(&lb, script.as_bytes(), &mut output, OutputFormat::Text)
            .await
            .unwrap();
        assert_eq!(
            summary,
            ScriptSummary {
                executed: 4,
                failed: 1,
                topology_rejected: 1
            }
        );

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "[Server 5]-Response: Request- EDIT a.txt - has been added to queue",
                "[Server 5]-Log: Task queued for lazy execution, queue size: 1",
                "[Server 5]-Response: Document a.txt has been created",
                "[Server 5]-Log: Cache MISS for a.txt",
                "[Server 5]-Response: v1",
                "[Server 5]-Log: Cache HIT for a.txt",
                "[Server 5]-Response: (null)",
                "[Server 5]-Log: Document missing.txt doesn't exist",
                "[Error]-Line 6: Server not found: 42",
            ]
        );
    }

    #[tokio::test]
    async fn test_run_script_json() {
        let lb = LoadBalancer::new(ReplicaMode::Triple, 16);
        let script = "ADD_SERVER 1 4\nEDIT a b\nSTATS\nbogus\n";
        let mut output = Vec::new();
        let summary = run_script(&lb, script.as_bytes(), &mut output, OutputFormat::Json)
            .await
            .unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.topology_rejected, 0);

        let values: Vec<serde_json::Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0]["log_kind"], "LAZY_EXEC");
        assert_eq!(values[1]["replica_count"], 3);
        assert_eq!(values[1]["pending_edits"], 1);
        assert_eq!(values[2]["line"], 4);
    }
}
