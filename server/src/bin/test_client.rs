use clap::Parser;
use shared::{read_message, write_message, GameMessage};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::sleep;

/// Scripted game client for poking at a running server
///
/// Example: `test_client -n Ann list challenge:Bob wait:2000 move:4`
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Game server address
    #[arg(short = 's', long, default_value = "127.0.0.1:12345")]
    server: String,

    /// Nickname to register with
    #[arg(short = 'n', long)]
    nickname: String,

    /// How long to keep printing server messages after the script ends (ms)
    #[arg(short = 'l', long, default_value = "1000")]
    linger: u64,

    /// Commands: list, challenge:<nick>, accept:<nick>, reject:<nick>,
    /// move:<0-8>, wait:<ms>
    commands: Vec<String>,
}

enum Step {
    Send(GameMessage),
    Wait(Duration),
}

fn parse_step(command: &str) -> Result<Step, String> {
    let (verb, arg) = command.split_once(':').unwrap_or((command, ""));
    let step = match verb {
        "list" => Step::Send(GameMessage::ListPlayers),
        "challenge" => Step::Send(GameMessage::Challenge(arg.to_string())),
        "accept" => Step::Send(GameMessage::ChallengeAccept(arg.to_string())),
        "reject" => Step::Send(GameMessage::ChallengeReject(arg.to_string())),
        "move" => Step::Send(GameMessage::Move(arg.to_string())),
        "wait" => {
            let ms = arg
                .parse::<u64>()
                .map_err(|_| format!("Invalid wait duration: {}", arg))?;
            Step::Wait(Duration::from_millis(ms))
        }
        _ => return Err(format!("Unknown command: {}", command)),
    };
    Ok(step)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let steps = args
        .commands
        .iter()
        .map(|command| parse_step(command))
        .collect::<Result<Vec<_>, _>>()?;

    let stream = TcpStream::connect(&args.server).await?;
    println!("Connected to {}", args.server);
    let (mut reader, mut writer) = stream.into_split();

    match read_message(&mut reader).await? {
        Some(GameMessage::SetNickname) => {}
        other => return Err(format!("Expected SET_NICKNAME, got {:?}", other).into()),
    }

    write_message(&mut writer, &GameMessage::Nickname(args.nickname.clone())).await?;
    match read_message(&mut reader).await? {
        Some(GameMessage::NicknameSuccess(nickname)) => println!("Registered as {}", nickname),
        other => return Err(format!("Registration failed: {:?}", other).into()),
    }

    let printer = tokio::spawn(async move {
        loop {
            match read_message(&mut reader).await {
                Ok(Some(message)) => println!("<- {:?}", message),
                Ok(None) => {
                    println!("Server closed the connection");
                    break;
                }
                Err(e) => {
                    println!("Read error: {}", e);
                    if e.is_fatal() {
                        break;
                    }
                }
            }
        }
    });

    for step in steps {
        match step {
            Step::Send(message) => {
                println!("-> {:?}", message);
                write_message(&mut writer, &message).await?;
            }
            Step::Wait(duration) => sleep(duration).await,
        }
    }

    sleep(Duration::from_millis(args.linger)).await;
    printer.abort();
    Ok(())
}
