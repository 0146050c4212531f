use tubechat_core::{ModelId, parse_timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Quick(usize),
    Video(String),
    Model(ModelId),
    Retry { turn: usize, model: ModelId },
    Seek(u32),
    Popup,
    ClosePopup,
    Key(String),
    Logout,
    Help,
    Quit,
}

pub const HELP: &str = "\
  <text>                 ask about the current video
  /q <n>                 ask quick question n
  /video <url|id>        open a video
  /model fast|thorough   select the model for new questions
  /retry <n> <model>     ask your turn #n again with another model
  /seek <MM:SS|secs>     jump the player to a timestamp
  /popup                 toggle the chat panel (extension action)
  /close                 close the chat panel
  /key <api-key>         store the API key
  /logout                forget the API key
  /help                  show this help
  /quit                  leave";

fn parse_model(arg: Option<&str>) -> Result<ModelId, String> {
    let arg = arg.ok_or("expected a model: fast or thorough")?;
    arg.parse::<ModelId>().map_err(|e| e.to_string())
}

fn parse_index(arg: Option<&str>) -> Result<usize, String> {
    arg.and_then(|a| a.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .ok_or_else(|| "expected a number starting at 1".to_string())
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Ask(line.to_string())));
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let command = match name {
        "q" => Command::Quick(parse_index(parts.next())?),
        "video" => Command::Video(
            parts
                .next()
                .ok_or("expected a video URL or id")?
                .to_string(),
        ),
        "model" => Command::Model(parse_model(parts.next())?),
        "retry" => Command::Retry {
            turn: parse_index(parts.next())?,
            model: parse_model(parts.next())?,
        },
        "seek" => {
            let arg = parts.next().ok_or("expected a timestamp")?;
            let seconds = parse_timestamp(arg)
                .or_else(|| arg.parse::<u32>().ok())
                .ok_or_else(|| format!("not a timestamp: {arg}"))?;
            Command::Seek(seconds)
        }
        "key" => Command::Key(parts.next().ok_or("expected an API key")?.to_string()),
        "popup" => Command::Popup,
        "close" => Command::ClosePopup,
        "logout" => Command::Logout,
        "help" | "h" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: /{other}")),
    };
    Ok(Some(command))
}
