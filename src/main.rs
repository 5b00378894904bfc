use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use claimwatch::config::Config;
use claimwatch::driver::{BrowserSession, BrowserSessionConfig};
use claimwatch::flow::runner::run_all;
use claimwatch::flow::{builtin_flows, FlowSpec};
use claimwatch::report::email::{build_report_message, EmailSection};
use claimwatch::report::smtp::{Mailer, SmtpMailer};
use claimwatch::report::types::FlowStatus;

#[derive(Parser)]
#[command(name = "claimwatch")]
#[command(version = "0.1.0")]
#[command(about = "HK eClaims portal health check with email reporting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the portal flows and send the report email
    Run {
        /// Only run flows whose title contains this string (case-insensitive)
        #[arg(short, long)]
        flow: Option<String>,

        /// Show the browser window
        #[arg(long, default_value = "false")]
        headed: bool,

        /// Skip the report email regardless of the configured policy
        #[arg(long, default_value = "false")]
        no_email: bool,
    },

    /// List the built-in flows
    Flows,

    /// Send a one-section test email with the given screenshot inline
    SendTestEmail {
        /// Path to a PNG to embed
        image: PathBuf,

        /// Override the configured subject
        #[arg(short, long)]
        subject: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            flow,
            headed,
            no_email,
        } => {
            let mut cfg = Config::from_env();
            if headed {
                cfg.browser.headless = false;
            }
            if no_email {
                cfg.email.always_email = false;
                cfg.email.email_on_failure = false;
            }

            let flows = select_flows(flow.as_deref());
            if flows.is_empty() {
                anyhow::bail!("no flow title matches {:?}", flow.unwrap_or_default());
            }

            println!(
                "{} Running {} flow(s) against the eClaims portal",
                "▶".green().bold(),
                flows.len()
            );
            println!(
                "  Browser: {}",
                if cfg.browser.headless {
                    "headless".cyan()
                } else {
                    "headed".yellow()
                }
            );

            let session =
                BrowserSession::launch(BrowserSessionConfig::from(&cfg.browser)).await?;
            let mailer = SmtpMailer::new(cfg.email.clone());

            // Close the browser on every exit path before surfacing errors.
            let outcome = run_all(&session, &mailer, &cfg, &flows).await;
            session.close().await;
            let results = outcome?;

            println!("\n{} All flows passed", "✅".green().bold());
            for result in &results {
                println!(
                    "  {} {} ({}ms) -> {}",
                    "✔".green(),
                    result.title,
                    result.duration_ms,
                    result.screenshot_path
                );
            }
        }

        Commands::Flows => {
            for spec in builtin_flows() {
                println!("{}", spec.title.bold());
                println!("  start:  {}", spec.start_url);
                println!("  terms:  {}", spec.terms_url);
                println!("  button: {}", spec.claim_button);
            }
        }

        Commands::SendTestEmail { image, subject } => {
            let cfg = Config::from_env();
            let sender = cfg.email.sender()?;
            let subject =
                subject.unwrap_or_else(|| format!("{} [TEST]", cfg.email.subject));

            let section = EmailSection {
                title: "Delivery test".to_string(),
                status: FlowStatus::Passed,
                html_intro: "Hi Team,<br/><br/>This is a delivery test.".to_string(),
                observed_error: String::new(),
                failure_reason: None,
                image_path: image.to_string_lossy().into_owned(),
            };
            let message =
                build_report_message(&sender, &subject, &cfg.email.text_body, &[section])?;
            SmtpMailer::new(cfg.email.clone()).send(&message)?;
            println!("{} Test email sent to {}", "✉".green(), sender.to.cyan());
        }
    }

    Ok(())
}

fn select_flows(filter: Option<&str>) -> Vec<FlowSpec> {
    let flows = builtin_flows();
    match filter {
        Some(f) => {
            let needle = f.to_lowercase();
            flows
                .into_iter()
                .filter(|s| s.title.to_lowercase().contains(&needle))
                .collect()
        }
        None => flows,
    }
}
