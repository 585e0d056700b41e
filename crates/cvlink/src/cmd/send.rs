use std::time::Duration;

use cvlink_command::join_tokens;
use cvlink_frame::{FrameConfig, UNBOUNDED_PAYLOAD};
use cvlink_server::{Client, ClientConfig};
use tracing::debug;

use crate::cmd::SendArgs;
use crate::exit::{server_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{is_error_response, print_response, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let config = ClientConfig {
        frame: FrameConfig {
            max_payload_size: args.max_payload.unwrap_or(UNBOUNDED_PAYLOAD),
            read_timeout: Some(timeout),
            write_timeout: Some(timeout),
        },
        expect_greeting: !args.no_greeting,
    };

    let endpoint = args.endpoint.endpoint();
    let mut client = Client::connect_with_config(&endpoint, config)
        .map_err(|err| server_error("connect failed", err))?;
    debug!(%endpoint, greeting = client.greeting(), "connected");

    let command = request_line(&args.command);
    let response = match args.id {
        Some(id) => client.request_with_id(id, &command),
        None => client.request(&command),
    }
    .map_err(|err| server_error("request failed", err))?;

    print_response(&command, &response, format);
    Ok(if is_error_response(&response) {
        FAILURE
    } else {
        SUCCESS
    })
}

/// One shell argument per token; arguments with spaces or quotes are quoted
/// so the server splits the line back into the same tokens.
fn request_line(args: &[String]) -> String {
    join_tokens(args)
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn request_line_keeps_shell_arguments_whole() {
        let args: Vec<String> = ["vbp", "Robot", "Echo", "two words"]
            .into_iter()
            .map(String::from)
            .collect();
        let line = request_line(&args);
        assert_eq!(line, r#"vbp Robot Echo "two words""#);
        assert_eq!(cvlink_command::tokenize(&line), args);
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert_eq!(parse_duration("0s").unwrap_err().code, USAGE);
        assert_eq!(parse_duration("bad").unwrap_err().code, USAGE);
        assert_eq!(parse_duration(" ").unwrap_err().code, USAGE);
    }
}
