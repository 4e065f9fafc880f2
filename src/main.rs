//! Command-line client for the KZG powers-of-tau ceremony.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::warn;

use kzg_ceremony::contribution::json::{decode_batch_contribution, encode_batch_contribution};
use kzg_ceremony::orchestrator::persist_outcome;
use kzg_ceremony::{
    contribute_to_ceremony, extrand, CancelToken, ClientConfig, SequencerClient,
};

#[derive(Parser)]
#[command(
    name = "kzg-ceremony",
    about = "Client for the Ethereum KZG powers-of-tau ceremony",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
    /// The URL of the ceremony sequencer
    #[arg(long, global = true, default_value = kzg_ceremony::config::DEFAULT_SEQUENCER_URL)]
    sequencer_url: String,
}

#[derive(Subcommand)]
enum Cmd {
    /// Show the current status of the sequencer
    Status,
    /// Join the lobby, wait for a turn, and contribute to the ceremony
    Contribute {
        /// Session id from the 'session_id' field of the authentication flow
        #[arg(long)]
        session_id: String,
        /// Mix entropy from the drand beacon into the local CSPRNG sample
        #[arg(long)]
        drand: bool,
        /// Mix entropy from an HTTP endpoint into the local CSPRNG sample
        #[arg(long)]
        urlrand: Option<String>,
    },
    /// Pull and verify the current sequencer transcript
    VerifyTranscript,
    /// Commands for offline contributions
    #[command(subcommand)]
    Offline(OfflineCmd),
}

#[derive(Subcommand)]
enum OfflineCmd {
    /// Download the current state of the ceremony to a file
    DownloadState {
        /// Destination path for the state file
        path: PathBuf,
    },
    /// Read a state file, contribute, and write the updated state
    Contribute {
        /// Path of the current-state file
        state_file: PathBuf,
        /// Destination path for the contribution file
        contribution_file: PathBuf,
        /// Mix entropy from an HTTP endpoint into the local CSPRNG sample
        #[arg(long)]
        urlrand: Option<String>,
        /// Mix hex-encoded entropy into the local CSPRNG sample
        #[arg(long)]
        hex_entropy: Option<String>,
    },
    /// Send a previously generated contribution to the sequencer
    SendContribution {
        /// Path of the contribution file
        contribution_file: PathBuf,
        /// Session id from the 'session_id' field of the authentication flow
        #[arg(long)]
        session_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::new(cli.sequencer_url);
    let client = SequencerClient::new(&config);

    match cli.command {
        Cmd::Status => {
            let status = client.status().await.context("get sequencer status")?;
            println!("Lobby size: {}", status.lobby_size);
            println!("Number of contributions: {}", status.num_contributions);
            println!("Sequencer address: {}", status.sequencer_address);
        }
        Cmd::Contribute {
            session_id,
            drand,
            urlrand,
        } => {
            if session_id.is_empty() {
                bail!("the session id can't be empty");
            }
            let ext_randomness = gather_entropy(drand, urlrand.as_deref(), None).await?;
            let outcome = contribute_to_ceremony(
                &client,
                &config,
                &session_id,
                &ext_randomness,
                Path::new("."),
                &CancelToken::new(),
            )
            .await
            .context("contributing to ceremony")?;
            println!(
                "Success! Receipt saved in {}, contribution in {}",
                outcome.receipt_path.display(),
                outcome.contribution_path.display()
            );
        }
        Cmd::VerifyTranscript => {
            print!("Pulling current transcript from sequencer... ");
            let transcript = client
                .current_transcript()
                .await
                .context("get current transcript")?;
            println!("OK");

            print!("Verifying transcript... ");
            let started = Instant::now();
            transcript
                .verify(&CancelToken::new())
                .context("verifying transcript")?;
            println!("Valid! (took {:.02}s)", started.elapsed().as_secs_f64());
        }
        Cmd::Offline(offline) => run_offline(offline, &client, &config).await?,
    }

    Ok(())
}

async fn run_offline(
    cmd: OfflineCmd,
    client: &SequencerClient,
    config: &ClientConfig,
) -> anyhow::Result<()> {
    match cmd {
        OfflineCmd::DownloadState { path } => {
            print!("Downloading current state... ");
            let transcript = client
                .current_transcript()
                .await
                .context("get current transcript")?;
            println!("OK");

            let state = transcript.to_batch_contribution();
            let bytes = encode_batch_contribution(&state, true).context("encoding state")?;
            std::fs::write(&path, bytes)
                .with_context(|| format!("writing state to {}", path.display()))?;
            println!("Saved current state in {}", path.display());
        }
        OfflineCmd::Contribute {
            state_file,
            contribution_file,
            urlrand,
            hex_entropy,
        } => {
            let ext_randomness = gather_entropy(false, urlrand.as_deref(), hex_entropy.as_deref())
                .await?;

            print!("Opening and parsing offline current state file... ");
            let bytes = std::fs::read(&state_file)
                .with_context(|| format!("reading state file {}", state_file.display()))?;
            let mut batch = decode_batch_contribution(&bytes).context("decoding state file")?;
            println!("OK");

            print!("Calculating contribution... ");
            batch
                .contribute(&ext_randomness)
                .context("calculating contribution")?;
            println!("OK");

            let bytes = encode_batch_contribution(&batch, true).context("encoding contribution")?;
            std::fs::write(&contribution_file, bytes)
                .with_context(|| format!("writing contribution to {}", contribution_file.display()))?;
            println!("Success, saved contribution in {}", contribution_file.display());
        }
        OfflineCmd::SendContribution {
            contribution_file,
            session_id,
        } => {
            if session_id.is_empty() {
                bail!("the session id can't be empty");
            }
            let bytes = std::fs::read(&contribution_file)
                .with_context(|| format!("reading {}", contribution_file.display()))?;
            let batch = decode_batch_contribution(&bytes).context("decoding contribution file")?;

            println!(
                "Sending contribution {} to the sequencer...",
                contribution_file.display()
            );
            let receipt = loop {
                match client.contribute(&session_id, &batch).await {
                    Ok(receipt) => break receipt,
                    Err(err @ kzg_ceremony::Error::ContributionRejected { .. }) => {
                        return Err(err).context("sequencer rejected the contribution");
                    }
                    Err(err) => {
                        warn!(%err, delay = ?config.send_delay, "sending contribution failed, retrying");
                        tokio::time::sleep(config.send_delay).await;
                    }
                }
            };

            let (receipt_path, contribution_path) =
                persist_outcome(Path::new("."), &session_id, &receipt, &batch)
                    .context("persisting receipt and contribution")?;
            println!(
                "Success! Receipt saved in {}, contribution in {}",
                receipt_path.display(),
                contribution_path.display()
            );
        }
    }
    Ok(())
}

async fn gather_entropy(
    drand: bool,
    urlrand: Option<&str>,
    hex_entropy: Option<&str>,
) -> anyhow::Result<Vec<Vec<u8>>> {
    let mut blobs = Vec::new();
    let http = reqwest::Client::new();
    if drand {
        print!("Pulling randomness from drand... ");
        let (bytes, round) = extrand::from_drand(&http).await.context("get drand bytes")?;
        println!("Got it! (length: {}, round: {round})", bytes.len());
        blobs.push(bytes);
    }
    if let Some(url) = urlrand {
        print!("Pulling randomness from {url}... ");
        let bytes = extrand::from_url(&http, url)
            .await
            .context("get bytes from url")?;
        println!("Got it! (length: {})", bytes.len());
        blobs.push(bytes);
    }
    if let Some(entropy) = hex_entropy {
        blobs.push(extrand::from_hex(entropy).context("decode hex entropy")?);
    }
    Ok(blobs)
}
