//! Chat inspection CLI commands: list, show.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use forkline_types::chat::{ChatDetail, ChatMessage, ChatType, MessageRole};

use crate::state::AppState;

const PREVIEW_CHARS: usize = 50;

/// List primary chats, newest first.
pub async fn list_chats(state: &AppState, json: bool) -> Result<()> {
    let chats = state.chat_service.list_primary_chats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chats)?);
        return Ok(());
    }

    if chats.is_empty() {
        println!();
        println!(
            "  {} No chats yet. Start the server with: {}",
            style("i").blue().bold(),
            style("forkline serve").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Title").fg(Color::White),
        Cell::new("Session").fg(Color::White),
        Cell::new("Last Active").fg(Color::White),
    ]);

    for detail in &chats {
        let chat = &detail.chat;
        let session_cell = match &chat.agent_session_id {
            Some(_) => Cell::new("● bound").fg(Color::Green),
            None => Cell::new("○ pending").fg(Color::Yellow),
        };

        table.add_row(vec![
            Cell::new(chat.id).fg(Color::Cyan),
            Cell::new(preview(list_label(detail))),
            session_cell,
            Cell::new(format_relative_time(&chat.updated_at)).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} chat{}",
        style(chats.len()).bold(),
        if chats.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Print a chat transcript. System messages are hidden unless `all`.
pub async fn show_chat(state: &AppState, chat_id: i64, all: bool, json: bool) -> Result<()> {
    let detail = state.chat_service.get_chat(chat_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    print_header(&detail);

    for message in visible_messages(&detail.messages, all) {
        let label = match message.role {
            MessageRole::User => style("you").green().bold(),
            MessageRole::Assistant => style("agent").cyan().bold(),
            MessageRole::System => style("system").dim().bold(),
        };
        println!(
            "  {} {}",
            label,
            style(format!("#{}", message.id)).dim()
        );
        for line in message.content.lines() {
            println!("    {line}");
        }
        println!();
    }

    Ok(())
}

fn print_header(detail: &ChatDetail) {
    let chat = &detail.chat;
    println!();
    match chat.chat_type {
        ChatType::Primary => println!(
            "  {} {}",
            style(format!("Chat {}", chat.id)).bold(),
            style(chat.title.as_deref().unwrap_or("")).dim()
        ),
        ChatType::Secondary => println!(
            "  {} {}  {}",
            style(format!("Fork {}", chat.id)).bold(),
            style(chat.title.as_deref().unwrap_or("")).dim(),
            style(format!(
                "from chat {} message {}",
                chat.parent_chat_id.unwrap_or_default(),
                chat.parent_message_id.unwrap_or_default()
            ))
            .yellow()
        ),
    }
    println!(
        "  {}",
        style(format!(
            "{} messages, updated {}",
            detail.messages.len(),
            format_relative_time(&chat.updated_at)
        ))
        .dim()
    );
    println!();
}

fn visible_messages(messages: &[ChatMessage], all: bool) -> impl Iterator<Item = &ChatMessage> {
    messages
        .iter()
        .filter(move |m| all || m.role != MessageRole::System)
}

/// Title, else the first user message, else a placeholder.
fn list_label(detail: &ChatDetail) -> &str {
    detail
        .chat
        .title
        .as_deref()
        .or_else(|| {
            detail
                .messages
                .iter()
                .find(|m| m.role == MessageRole::User)
                .map(|m| m.content.as_str())
        })
        .unwrap_or("(untitled)")
}

/// One-line preview of a title.
fn preview(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > PREVIEW_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        flat
    }
}

fn format_relative_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    let now = chrono::Utc::now();
    let diff = now - *dt;

    if diff.num_minutes() < 1 {
        "just now".to_string()
    } else if diff.num_hours() < 1 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_days() < 1 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_days() < 30 {
        format!("{}d ago", diff.num_days())
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}
