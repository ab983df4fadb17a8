//! One-shot subcommands that print their result and exit.

use std::io::Write;

use anyhow::{anyhow, Context};
use chrono::Utc;

use epsimo_client::{AssistantUpdate, ClientConfig, PlatformClient};
use epsimo_core::{ApiKeys, ProjectId};

use crate::cli::{AssistantCommand, Commands, KeyCommand, ProjectCommand, ThreadCommand};

/// Run a non-interactive command, writing human-readable output to `out`.
///
/// # Errors
///
/// Returns an error if the backend call fails or output cannot be written.
pub async fn run(
    command: Commands,
    client: &PlatformClient,
    config: &ClientConfig,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Commands::Login { email, password } => {
            client.login(&email, &password).await?;
            writeln!(out, "Logged in as {email}")?;
        }
        Commands::Signup { email, password } => {
            client.signup(&email, &password).await?;
            writeln!(out, "Account created for {email}")?;
        }
        Commands::Token { token } => {
            client.accept_token(token.trim());
            writeln!(out, "Session token stored")?;
        }
        Commands::GoogleUrl => {
            writeln!(out, "{}", config.google_login_url())?;
            writeln!(
                out,
                "Open the URL, sign in, then run `epsimo token <TOKEN>`."
            )?;
        }
        Commands::Logout => {
            client.logout();
            writeln!(out, "Logged out")?;
        }
        Commands::Whoami => whoami(client, out)?,
        Commands::Projects { action } => projects(client, action, out).await?,
        Commands::Assistants { action } => assistants(client, action, out).await?,
        Commands::Threads { action } => threads(client, action, out).await?,
        Commands::Keys { action } => keys(client, action, out).await?,
        Commands::Credits => {
            let info = client.thread_info().await?;
            writeln!(
                out,
                "{} of {} threads used, {} remaining",
                info.thread_counter,
                info.thread_max,
                info.remaining()
            )?;
        }
        Commands::Price { agent_name } => {
            let price = client.agent_price(&agent_name).await?;
            writeln!(out, "{agent_name}: {price} per thread")?;
        }
        Commands::Buy { quantity } => {
            let checkout = client.create_checkout_session(quantity).await?;
            writeln!(out, "Complete the purchase at:\n{}", checkout.url)?;
        }
        Commands::Feedback { run_id, score } => {
            client.send_feedback(&run_id, score).await?;
            writeln!(out, "Feedback recorded for run {run_id}")?;
        }
        Commands::Chat { .. } => return Err(anyhow!("chat is interactive")),
    }
    Ok(())
}

fn whoami(client: &PlatformClient, out: &mut impl Write) -> anyhow::Result<()> {
    let session = client.session();
    writeln!(out, "Backend:  {}", client.base_url())?;
    writeln!(out, "User id:  {}", session.user_id())?;
    match session.claims() {
        None => writeln!(out, "Session:  not logged in")?,
        Some(Err(e)) => writeln!(out, "Session:  {e}")?,
        Some(Ok(claims)) => {
            let state = if claims.is_expired_at(Utc::now()) {
                "expired"
            } else {
                "active"
            };
            writeln!(out, "Session:  {state}")?;
            if let Some(at) = claims.expires_at() {
                writeln!(out, "Expires:  {}", at.format("%Y-%m-%d %H:%M UTC"))?;
            }
        }
    }
    let project = session
        .project_name()
        .unwrap_or_else(|| "(none selected)".to_string());
    writeln!(out, "Project:  {project}")?;
    Ok(())
}

async fn projects(
    client: &PlatformClient,
    action: ProjectCommand,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match action {
        ProjectCommand::List => {
            let current = client.session().project_name();
            for p in client.list_projects().await? {
                let marker = if current.as_deref() == Some(p.name.as_str()) {
                    "*"
                } else {
                    " "
                };
                writeln!(out, "{marker} {}  {}", p.project_id, p.name)?;
            }
        }
        ProjectCommand::Show { id } => {
            let project = client
                .list_projects()
                .await?
                .into_iter()
                .find(|p| p.project_id == id)
                .ok_or_else(|| anyhow!("project {id} not found"))?;
            writeln!(out, "{}  {}", project.project_id, project.name)?;
            if let Some(desc) = project.description.filter(|d| !d.is_empty()) {
                writeln!(out, "{desc}")?;
            }
        }
        ProjectCommand::Create { name, description } => {
            let project = client.create_project(&name, &description).await?;
            writeln!(out, "Created project {} ({})", project.name, project.project_id)?;
        }
        ProjectCommand::Update {
            id,
            name,
            description,
        } => {
            client.update_project(&id, &name, &description).await?;
            writeln!(out, "Updated project {id}")?;
        }
        ProjectCommand::Delete { id } => {
            client.delete_project(&id).await?;
            writeln!(out, "Deleted project {id}")?;
        }
        ProjectCommand::Select { id } => {
            let name = project_name(client, &id).await?;
            client.select_project(&id, &name).await?;
            writeln!(out, "Selected project {name}")?;
        }
    }
    Ok(())
}

async fn project_name(client: &PlatformClient, id: &ProjectId) -> anyhow::Result<String> {
    client
        .list_projects()
        .await?
        .into_iter()
        .find(|p| &p.project_id == id)
        .map(|p| p.name)
        .ok_or_else(|| anyhow!("project {id} not found"))
}

async fn assistants(
    client: &PlatformClient,
    action: AssistantCommand,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match action {
        AssistantCommand::List => {
            for a in client.list_assistants().await? {
                let kind = a.kind().unwrap_or("?");
                let shared = if a.public { " (public)" } else { "" };
                writeln!(out, "{}  {}  [{kind}]{shared}", a.assistant_id, a.name)?;
            }
        }
        AssistantCommand::Show { id } => {
            let assistant = client.get_assistant(&id).await?;
            writeln!(out, "{}  {}", assistant.assistant_id, assistant.name)?;
            writeln!(out, "public: {}", assistant.public)?;
            let config = serde_json::to_string_pretty(&assistant.config)
                .context("Failed to format assistant config")?;
            writeln!(out, "{config}")?;
        }
        AssistantCommand::Delete { id } => {
            client.delete_assistant(&id).await?;
            writeln!(out, "Deleted assistant {id}")?;
        }
        AssistantCommand::SetPublic { id, public } => {
            let assistant = client.get_assistant(&id).await?;
            let update = AssistantUpdate {
                public,
                ..AssistantUpdate::from(&assistant)
            };
            let saved = client.update_assistant(&id, &update).await?;
            let state = if saved.public { "public" } else { "private" };
            writeln!(out, "{} is now {state}", saved.name)?;
        }
    }
    Ok(())
}

async fn threads(
    client: &PlatformClient,
    action: ThreadCommand,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match action {
        ThreadCommand::List => {
            for t in client.list_threads().await? {
                let updated = t
                    .updated_at
                    .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                writeln!(out, "{}  {}  {updated}", t.thread_id, t.name)?;
            }
        }
        ThreadCommand::New { name, assistant } => {
            let thread = client.create_thread(&name, &assistant).await?;
            writeln!(out, "Created thread {} ({})", thread.name, thread.thread_id)?;
        }
    }
    Ok(())
}

async fn keys(
    client: &PlatformClient,
    action: KeyCommand,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let keys = match action {
        KeyCommand::Show => client.api_keys().await?,
        KeyCommand::Set {
            openai,
            anthropic,
            ydc,
            tavily,
        } => {
            let current = client.api_keys().await?;
            let merged = ApiKeys {
                openai_api_key: openai.unwrap_or(current.openai_api_key),
                anthropic_api_key: anthropic.unwrap_or(current.anthropic_api_key),
                ydc_api_key: ydc.unwrap_or(current.ydc_api_key),
                tavili_api_key: tavily.unwrap_or(current.tavili_api_key),
            };
            client.update_api_keys(&merged).await?
        }
    };
    for (label, value) in keys.masked() {
        writeln!(out, "{label:<10} {value}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use epsimo_client::{SessionContext, SessionState};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(uri: &str) -> PlatformClient {
        let session = SessionContext::in_memory(SessionState::fresh());
        session.set_token("T").unwrap();
        PlatformClient::new(uri, session)
    }

    async fn output(command: Commands, client: &PlatformClient) -> String {
        let mut out = Vec::new();
        run(command, client, &ClientConfig::default(), &mut out)
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn credits_prints_remaining() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/thread-info"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"thread_counter": 4, "thread_max": 10})),
            )
            .mount(&server)
            .await;

        let text = output(Commands::Credits, &client(&server.uri())).await;
        assert_eq!(text, "4 of 10 threads used, 6 remaining\n");
    }

    #[tokio::test]
    async fn keys_set_keeps_omitted_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chatbot_configuration/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "openaiApiKey": "sk-old-openai-key",
                "anthropicApiKey": "",
                "ydcApiKey": "ydc-existing",
                "taviliApiKey": ""
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chatbot_configuration/"))
            .and(body_partial_json(json!({
                "openaiApiKey": "sk-old-openai-key",
                "anthropicApiKey": "ant-new-key-1234",
                "ydcApiKey": "ydc-existing"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "openaiApiKey": "sk-old-openai-key",
                "anthropicApiKey": "ant-new-key-1234",
                "ydcApiKey": "ydc-existing",
                "taviliApiKey": ""
            })))
            .expect(1)
            .mount(&server)
            .await;

        let command = Commands::Keys {
            action: KeyCommand::Set {
                openai: None,
                anthropic: Some("ant-new-key-1234".to_string()),
                ydc: None,
                tavily: None,
            },
        };
        let text = output(command, &client(&server.uri())).await;
        assert!(text.contains("****1234"));
        assert!(!text.contains("ant-new-key-1234"));
    }

    #[tokio::test]
    async fn select_unknown_project_fails_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"project_id": "p1", "name": "Alpha"}
            ])))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let command = Commands::Projects {
            action: ProjectCommand::Select {
                id: "p2".parse().unwrap(),
            },
        };
        let mut out = Vec::new();
        let result = run(command, &client, &ClientConfig::default(), &mut out).await;
        assert!(result.is_err());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
        assert!(client.session().project_name().is_none());
    }

    #[tokio::test]
    async fn logout_clears_session() {
        let client = client("http://127.0.0.1:9");
        let text = output(Commands::Logout, &client).await;
        assert_eq!(text, "Logged out\n");
        assert!(!client.session().is_logged_in());
    }

    #[tokio::test]
    async fn google_url_points_at_backend() {
        let client = client("http://127.0.0.1:9");
        let mut out = Vec::new();
        let config = ClientConfig {
            backend_url: "http://api.example/".to_string(),
            ..ClientConfig::default()
        };
        run(Commands::GoogleUrl, &client, &config, &mut out)
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("http://api.example/auth/google/login\n"));
    }
}
