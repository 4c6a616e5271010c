use clap::{Parser, ValueEnum};
use client::network;
use log::info;
use shared::{ScoreFeed, ScorePolicy, Tuning};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Half,
    Full,
    Fixed,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Game server base URL
    #[arg(short = 's', long, default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Frame interval in milliseconds
    #[arg(short = 'f', long, default_value = "16")]
    frame_ms: u64,

    /// Subscribe to server push channels and take score updates from them
    #[arg(short = 'p', long)]
    push: bool,

    /// JSON file overriding the default tuning
    #[arg(short = 't', long)]
    tuning: Option<PathBuf>,

    /// How a scoring guess pulls the board back up
    #[arg(long, value_enum)]
    score_policy: Option<PolicyArg>,

    /// Relief per correct guess for the fixed policy
    #[arg(long, default_value = "1.0")]
    fixed_relief: f64,
}

fn load_tuning(args: &Args) -> Result<Tuning, Box<dyn std::error::Error>> {
    let mut tuning = match &args.tuning {
        Some(path) => Tuning::from_json(&std::fs::read_to_string(path)?)?,
        None => Tuning::default(),
    };

    if let Some(policy) = args.score_policy {
        tuning.score_policy = match policy {
            PolicyArg::Half => ScorePolicy::HalfScore,
            PolicyArg::Full => ScorePolicy::FullScore,
            PolicyArg::Fixed => ScorePolicy::FixedPerGuess(args.fixed_relief),
        };
    }
    if args.push {
        tuning.score_feed = ScoreFeed::Push;
    }

    tuning.validate()?;
    Ok(tuning)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let tuning = load_tuning(&args)?;
    let push_enabled = tuning.score_feed == ScoreFeed::Push;

    info!("Starting client...");
    info!("Server: {}", args.server);
    info!("Score policy: {:?}, score feed: {:?}", tuning.score_policy, tuning.score_feed);
    info!("Type a word and press Enter to guess");

    let mut client = network::Client::new(
        &args.server,
        tuning,
        Duration::from_millis(args.frame_ms),
        push_enabled,
    )?;

    client.run().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_flag_selects_push_feed() {
        let args = Args::parse_from(["client", "--push"]);
        let tuning = load_tuning(&args).unwrap();
        assert_eq!(tuning.score_feed, ScoreFeed::Push);
    }

    #[test]
    fn test_fixed_policy_override() {
        let args = Args::parse_from(["client", "--score-policy", "fixed", "--fixed-relief", "2.5"]);
        let tuning = load_tuning(&args).unwrap();
        assert_eq!(tuning.score_policy, ScorePolicy::FixedPerGuess(2.5));
    }

    #[test]
    fn test_negative_fixed_relief_is_rejected() {
        let args = Args::parse_from(["client", "--score-policy", "fixed", "--fixed-relief=-1"]);
        assert!(load_tuning(&args).is_err());
    }
}
