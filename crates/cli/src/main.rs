use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "whatsgraph")]
#[command(about = "WhatsApp gateway for a hosted graph agent runtime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the gateway (webhook endpoint + health probe).
    Serve {
        /// Config file path (default: WHATSGRAPH_CONFIG_PATH or ~/.whatsgraph/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 8081)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Chat with the assistant directly (manual testing, no webhook involved).
    Chat {
        /// Config file path (default: WHATSGRAPH_CONFIG_PATH or ~/.whatsgraph/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Conversation id to use (default "manual-test-session").
        #[arg(long, value_name = "ID")]
        conversation: Option<String>,
    },

    /// Probe the runtime, then fire concurrent requests at it and report pass/fail.
    Smoke {
        /// Config file path (default: WHATSGRAPH_CONFIG_PATH or ~/.whatsgraph/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Number of concurrent requests to send.
        #[arg(long, short, default_value_t = 4)]
        requests: usize,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("whatsgraph {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("serve failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config, conversation }) => {
            if let Err(e) = run_chat(config, conversation).await {
                log::error!("chat failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Smoke { config, requests }) => {
            if let Err(e) = run_smoke(config, requests).await {
                log::error!("smoke failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn build_agent(config: &lib::config::Config) -> anyhow::Result<lib::agent::Agent> {
    let graph_config = lib::config::resolve_graph_config(config)?;
    let client = lib::runtime::LangGraphClient::new(lib::config::resolve_runtime_url(config));
    Ok(lib::agent::Agent::new(
        client,
        lib::config::resolve_assistant_id(config),
        graph_config,
    ))
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, _path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{}",
        config.gateway.bind,
        config.gateway.port
    );
    lib::gateway::run_gateway(config).await
}

async fn run_chat(
    config_path: Option<std::path::PathBuf>,
    conversation: Option<String>,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, _path) = lib::config::load_config(config_path)?;
    let agent = build_agent(&config)?;
    let conversation = conversation.unwrap_or_else(|| "manual-test-session".to_string());

    println!(
        "chatting as '{}' with assistant '{}' (/quit to exit)",
        conversation,
        lib::config::resolve_assistant_id(&config)
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        match agent.invoke(&conversation, input, &[]).await {
            Ok(reply) => {
                println!("< {}", reply.trim());
            }
            Err(e) => {
                eprintln!("chat error: {}", e);
            }
        }
    }

    Ok(())
}

/// Prompts rotated across smoke requests.
const SMOKE_PROMPTS: &[&str] = &[
    "Hello! How are you today?",
    "Can you schedule a meeting for tomorrow at 2 PM?",
    "Add a task to my todo list: review the release notes",
    "I need help organizing my week. I have three meetings coming up.",
];

async fn run_smoke(
    config_path: Option<std::path::PathBuf>,
    requests: usize,
) -> anyhow::Result<()> {
    let (config, _path) = lib::config::load_config(config_path)?;
    let agent = Arc::new(build_agent(&config)?);

    let probe = lib::runtime::LangGraphClient::new(lib::config::resolve_runtime_url(&config));
    println!("probing runtime at {} ...", probe.base_url());
    probe
        .ok()
        .await
        .map_err(|e| anyhow::anyhow!("runtime probe failed: {}", e))?;
    println!("runtime is up, sending {} concurrent request(s)", requests);

    let started = std::time::Instant::now();
    let mut tasks = Vec::new();
    for i in 0..requests {
        let agent = agent.clone();
        let prompt = SMOKE_PROMPTS[i % SMOKE_PROMPTS.len()].to_string();
        tasks.push(tokio::spawn(async move {
            let conversation = format!("smoke-{}", i);
            agent.invoke(&conversation, &prompt, &[]).await
        }));
    }

    let results = futures_util::future::join_all(tasks).await;
    let total = results.len();
    let mut passed = 0;
    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(Ok(reply)) if !reply.trim().is_empty() => {
                passed += 1;
                println!("request {}: ok ({} chars)", i, reply.len());
            }
            Ok(Ok(_)) => println!("request {}: empty reply", i),
            Ok(Err(e)) => println!("request {}: error: {}", i, e),
            Err(e) => println!("request {}: task failed: {}", i, e),
        }
    }

    println!(
        "{}/{} request(s) succeeded in {:.1?}",
        passed,
        total,
        started.elapsed()
    );
    if passed == total {
        Ok(())
    } else {
        anyhow::bail!("{} of {} smoke request(s) failed", total - passed, total)
    }
}
