pub mod agent;
pub mod models;
pub mod server;
pub mod cli;
pub mod history;
pub mod llm;
pub mod roles;

use agent::QueryAgent;
use cli::Args;
use history::initialize_history_store;
use llm::{ LlmConfig, LlmType };
use llm::chat::new_client as new_chat_client;
use log::info;
use roles::RoleRegistry;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("adapter default"));
    info!("Chat Base URL: {}", args.chat_base_url.as_deref().unwrap_or("adapter default"));
    info!("Chat API Key: {}", Args::masked(&args.chat_api_key));
    info!("History Store Type: {}", args.history_type);
    info!("Context Window: {}", args.context_window);
    info!("Roles: {}", args.roles.join(", "));
    info!("LLM Failure Policy: {}", args.llm_failure_policy);
    info!("CORS Origin: {}", args.cors_origin);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let chat_config = LlmConfig {
        llm_type: args.chat_llm_type.parse::<LlmType>()?,
        base_url: args.chat_base_url.clone(),
        api_key: Some(args.chat_api_key.clone()).filter(|k| !k.is_empty()),
        completion_model: args.chat_model.clone(),
    };
    let chat_client = new_chat_client(&chat_config)?;
    info!(
        "Chat client configured: Type={}, Model={}",
        chat_client.provider(),
        chat_client.model()
    );

    let history_store = initialize_history_store(&args)?;
    let agent = QueryAgent::new(chat_client, history_store, RoleRegistry::new(&args.roles))
        .with_context_window(args.context_window)
        .with_failure_policy(args.llm_failure_policy);

    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, Arc::new(agent), args);
    server.run().await?;

    Ok(())
}
