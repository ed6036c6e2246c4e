use tubesum::app::App;
use tubesum::config::Config;
use tubesum::error::Result;
use tubesum::models::{Requester, SummaryRecord};

const USAGE: &str = "\
Usage: tubesum <command>

Commands:
  summarize <video> [--user <id>:<name>]  Summarize a video id or YouTube link
  show <video>                            Print a stored summary without generating one
  recent [N]                              List the N most recent summaries (default 10)
  reformat                                Rebuild every stored summary's layout";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = Command::parse(&args) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let config = Config::load()?;
    let app = App::new(&config).await?;

    match command {
        Command::Summarize { video, requester } => {
            let view = app.summarize(&video, requester.as_ref()).await?;
            println!("{}", view.text);
            let origin = if view.from_cache { "cached" } else { "new" };
            eprintln!("({} summary by {})", origin, view.creator);
        }
        Command::Show { video } => match app.show(&video).await? {
            Some(view) => println!("{}", view.text),
            None => {
                eprintln!("No summary stored for {}", video);
                std::process::exit(1);
            }
        },
        Command::Recent { limit } => {
            for record in app.recent(limit).await? {
                print_record(&record);
            }
        }
        Command::Reformat => {
            let changed = app.reformat_all().await?;
            println!("Reformatted {} summaries", changed);
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq)]
enum Command {
    Summarize {
        video: String,
        requester: Option<Requester>,
    },
    Show {
        video: String,
    },
    Recent {
        limit: usize,
    },
    Reformat,
}

impl Command {
    fn parse(args: &[String]) -> Option<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match args.as_slice() {
            ["summarize", video] => Some(Command::Summarize {
                video: video.to_string(),
                requester: None,
            }),
            ["summarize", video, "--user", user] => Some(Command::Summarize {
                video: video.to_string(),
                requester: Some(parse_requester(user)?),
            }),
            ["show", video] => Some(Command::Show {
                video: video.to_string(),
            }),
            ["recent"] => Some(Command::Recent { limit: 10 }),
            ["recent", n] => Some(Command::Recent {
                limit: n.parse().ok()?,
            }),
            ["reformat"] => Some(Command::Reformat),
            _ => None,
        }
    }
}

/// `42:sora` -> requester 42 named "sora".
fn parse_requester(value: &str) -> Option<Requester> {
    let (id, name) = value.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some(Requester::new(id.trim().parse().ok()?, name))
}

fn print_record(record: &SummaryRecord) {
    println!(
        "━━ {}  {}  ({})",
        record.video_id,
        record.created_at.format("%Y-%m-%d %H:%M"),
        record.creator_name
    );
    println!("{}\n", record.formatted_text);
}
