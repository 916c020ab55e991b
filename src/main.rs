//! skillchat - Entry Point
//!
//! Modes:
//! - ask "<question>": route + answer once, print to stdout
//! - serve: HTTP chat service
//! - skills: list loaded skills and exit

use std::sync::Arc;

use skillchat::{ChatRequest, ChatService, Config, SkillStore};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn print_help() {
    println!("skillchat v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage:");
    println!("  skillchat ask \"<question>\"   Route and answer one question");
    println!("  skillchat serve              Run the HTTP chat service");
    println!("  skillchat skills             List loaded skills");
    println!("  skillchat --help, -h         Show this help");
    println!();
    println!("Environment variables:");
    println!("  ANTHROPIC_API_KEY              Claude API key");
    println!("  GLM_API_KEY                    GLM API key");
    println!("  SKILLCHAT_ROUTER_PROVIDER      claude | glm (default: claude)");
    println!("  SKILLCHAT_ANSWER_PROVIDER      claude | glm (default: claude)");
    println!("  SKILLCHAT_ROUTER_MODEL         Routing model id");
    println!("  SKILLCHAT_ANSWER_MODEL         Answering model id");
    println!("  SKILLCHAT_SKILLS_DIR           Skill files (default: ./skills)");
    println!("  SKILLCHAT_TRIGGER_SHORTCUT     Trigger short-circuit (default: true)");
    println!("  SKILLCHAT_CACHE_ENABLED        Routing cache (default: true)");
    println!("  SKILLCHAT_HOST / SKILLCHAT_PORT  HTTP bind (default: 127.0.0.1:8787)");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = args.first().map(String::as_str).unwrap_or("--help");

    if matches!(mode, "--help" | "-h" | "help") {
        print_help();
        return Ok(());
    }

    let serve_mode = mode == "serve";

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    if serve_mode {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        // stdout carries only the answer
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    match mode {
        "ask" => {
            let question = args[1..].join(" ");
            let config = Config::from_env()?;
            let service = ChatService::from_config(&config).await?;

            let response = service.chat(&ChatRequest::new(question)).await?;

            let skills = if response.loaded_skills.is_empty() {
                "(none)".to_string()
            } else {
                response.loaded_skills.join(", ")
            };
            println!("skills: {}", skills);
            if let Some(routing) = &response.routing_info {
                println!("confidence: {}", routing.confidence);
                println!("reasoning: {}", routing.reasoning);
            }
            println!();
            println!("{}", response.answer);
        }
        "serve" => {
            info!("skillchat v{}", env!("CARGO_PKG_VERSION"));

            let config = Config::from_env()?;
            let service = Arc::new(ChatService::from_config(&config).await?);
            skillchat::server::serve(&config, service)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
        }
        "skills" => {
            let (store, report) = SkillStore::open(Config::skills_dir_from_env()).await?;
            for skill in store.list_candidates()? {
                println!("{}\t{}\t{}\t[{}]", skill.skill_id, skill.domain, skill.title, skill.triggers.join("; "));
            }
            for rejected in &report.rejected {
                eprintln!("rejected: {} ({})", rejected.path.display(), rejected.reason);
            }
        }
        other => {
            print_help();
            anyhow::bail!("unknown command '{}'", other);
        }
    }

    Ok(())
}
