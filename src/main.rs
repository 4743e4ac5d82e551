use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use chatform::analytics::{render_bar_chart, WordCount};
use chatform::api::Endpoints;
use chatform::config::{self, ClientConfig};
use chatform::{web_server, Capabilities, ChatError, ChatForm, PdfFile, TerminalRenderer};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Base URL of the chat backend [env: CHATFORM_API_BASE, default: http://localhost:8000]
    #[arg(long, global = true, conflicts_with = "api_host")]
    api_base: Option<String>,

    /// Host the page would be served from; localhost maps to the local backend port.
    #[arg(long, global = true)]
    api_host: Option<String>,

    /// Which form variant to use.
    #[arg(long, value_enum, global = true, default_value_t = Mode::Pdf)]
    mode: Mode,

    /// Hide upload analytics.
    #[arg(long, global = true)]
    no_analytics: bool,

    /// Model identifier [env: CHATFORM_MODEL, default: gpt-4.1-mini]
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Plain chat with a caller-supplied API key.
    Plain,
    /// Chat grounded in an uploaded PDF.
    Pdf,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Send one message and stream the answer to stdout.
    Send {
        #[arg(long, help = "Developer (system) instruction.")]
        developer: String,
        #[arg(long, help = "The user message.")]
        user: String,
        #[command(flatten)]
        doc: DocumentArgs,
    },
    /// Interactive chat: every line read from stdin is sent as a user message.
    Chat {
        #[arg(long, help = "Developer (system) instruction used for every message.")]
        developer: String,
        #[command(flatten)]
        doc: DocumentArgs,
    },
    /// Upload a PDF and print the documents the backend now knows about.
    Upload {
        #[arg(help = "Path to the PDF file.")]
        file: PathBuf,
    },
    /// Serve the chat form as a local web page.
    Serve {
        #[arg(long, default_value_t = 9900, help = "Port for the web server.")]
        port: u16,
    },
}

#[derive(clap::Args, Debug)]
struct DocumentArgs {
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, help = "API key (plain mode).")]
    api_key: Option<String>,
    #[arg(long, help = "PDF to upload before sending.")]
    pdf: Option<PathBuf>,
    #[arg(
        long,
        requires = "pdf",
        help = "Which of the documents returned by the --pdf upload to chat with (defaults to the uploaded file)."
    )]
    document: Option<String>,
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::from_env();
        if let Some(base) = &self.api_base {
            config.endpoints = Endpoints::new(base.clone());
        } else if let Some(host) = &self.api_host {
            config.endpoints = Endpoints::for_host(host);
        }
        config.capabilities = match self.mode {
            Mode::Plain => Capabilities::plain(),
            Mode::Pdf if self.no_analytics => Capabilities::pdf(),
            Mode::Pdf => Capabilities::pdf_gated(),
        };
        if let Some(model) = &self.model {
            config.default_model = model.clone();
        }
        config
    }
}

fn print_analytics(analytics: Option<&[WordCount]>) {
    if let Some(counts) = analytics.filter(|c| !c.is_empty()) {
        println!("Top words:");
        print!("{}", render_bar_chart(counts, 40));
    }
}

async fn prepare(chat: &mut ChatForm, doc: &DocumentArgs) -> Result<()> {
    chat.form_mut().api_key = doc
        .api_key
        .clone()
        .or_else(|| Some(config::OPENAI_API_KEY.clone()).filter(|k| !k.is_empty()));
    chat.form_mut().selected_filename = doc.document.clone();
    if let Some(path) = &doc.pdf {
        let file = PdfFile::from_path(path)
            .await
            .with_context(|| format!("Failed to load {}", path.display()))?;
        chat.select_file(file);
    }
    Ok(())
}

async fn upload_if_needed(chat: &mut ChatForm) -> Result<()> {
    let state = chat.upload_state();
    if state.has_file() && !state.is_uploaded() {
        let outcome = chat.upload().await.context("Upload failed")?;
        info!(documents = ?outcome.uploaded_filenames, "Document uploaded");
        if chat.capabilities().supports_analytics {
            print_analytics(outcome.analytics.as_deref());
        }
    }
    Ok(())
}

// The main entry point of the application, using tokio's async runtime
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for environment variables like API keys)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG; logs go to stderr so stdout carries the response.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.client_config();

    info!(command = ?cli.command, backend = %config.endpoints.base(), "chatform starting");

    match cli.command {
        Commands::Send { developer, user, doc } => {
            let mut chat = ChatForm::new(&config);
            prepare(&mut chat, &doc).await?;
            chat.form_mut().developer_message = developer;
            chat.form_mut().user_message = user;
            let uploading = !chat.upload_state().is_uploaded() && chat.upload_state().has_file();

            let mut renderer = TerminalRenderer::stdout();
            chat.upload_and_send(&mut renderer)
                .await
                .context("Chat request failed")?;
            println!();
            if uploading && config.capabilities.supports_analytics {
                print_analytics(chat.upload_state().analytics.as_deref());
            }
        }
        Commands::Chat { developer, doc } => {
            let mut chat = ChatForm::new(&config);
            prepare(&mut chat, &doc).await?;
            upload_if_needed(&mut chat).await?;
            chat.form_mut().developer_message = developer;

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                chat.form_mut().user_message = line.to_string();
                let mut renderer = TerminalRenderer::stdout();
                match chat.send(&mut renderer).await {
                    Ok(_) => {}
                    Err(e @ ChatError::Output(_)) => return Err(e).context("Chat session ended"),
                    Err(e) => {
                        // The session stays usable after a failed message.
                        eprintln!("Error: {}", e);
                        continue;
                    }
                }
                println!();
            }
            info!("Chat session finished.");
        }
        Commands::Upload { file } => {
            let mut chat = ChatForm::new(&config);
            let file = PdfFile::from_path(&file)
                .await
                .with_context(|| format!("Failed to load {}", file.display()))?;
            chat.select_file(file);
            let outcome = chat.upload().await.context("Upload failed")?;
            if let Some(message) = &outcome.message {
                println!("{}", message);
            }
            println!("Available documents:");
            for name in &outcome.uploaded_filenames {
                println!("  {}", name);
            }
            if config.capabilities.supports_analytics {
                print_analytics(outcome.analytics.as_deref());
            }
        }
        Commands::Serve { port } => {
            info!("Starting web UI on port {}...", port);
            let mut web_server_handle = tokio::spawn(async move {
                if let Err(e) = web_server::start_web_server(port, config).await {
                    error!("Web server failed: {:?}", e);
                }
            });

            let ctrl_c = tokio::signal::ctrl_c();
            // Pin the ctrl_c future to the stack so its address is stable
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, shutting down...");
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(_) => info!("Web server task completed."),
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }

            if !web_server_handle.is_finished() {
                web_server_handle.abort();
            }
            info!("Shutdown complete.");
        }
    }

    Ok(())
}
