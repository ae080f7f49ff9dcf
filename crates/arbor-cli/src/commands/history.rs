use anyhow::{Result, bail};
use arbor_application::HistoryCoordinator;
use arbor_core::history::{ConversationEntry, EntryRole};

pub fn list(coordinator: &HistoryCoordinator) {
    let records = coordinator.list();
    if records.is_empty() {
        println!("No conversations stored.");
        return;
    }

    for record in records {
        let tags = if record.tags.is_empty() {
            String::new()
        } else {
            let tags: Vec<_> = record.tags.iter().map(String::as_str).collect();
            format!("  [{}]", tags.join(", "))
        };
        println!(
            "{}  {}  {}{}",
            record.id,
            record.update_time.format("%Y-%m-%d %H:%M"),
            record.title,
            tags
        );
    }
}

fn ensure_known(coordinator: &HistoryCoordinator, root: &str) -> Result<()> {
    if !coordinator.index().contains(root) {
        bail!("Conversation {} not found", root);
    }
    Ok(())
}

fn role_label(role: EntryRole) -> &'static str {
    match role {
        EntryRole::User => "user",
        EntryRole::Assistant => "assistant",
        EntryRole::Tool => "tool",
    }
}

fn print_entry(entry: &ConversationEntry) {
    println!("[{}] {}", role_label(entry.role), entry.message);
    for call in entry.tool_calls.iter().flatten() {
        println!("    -> {}({})", call.name, serde_json::Value::Object(call.parameters.clone()));
    }
    for response in entry.tool_responses.iter().flatten() {
        println!("    <- {} [{:?}]: {}", response.tool_name, response.status, response.result);
    }
}

pub async fn show(coordinator: &mut HistoryCoordinator, root: &str, json: bool) -> Result<()> {
    ensure_known(coordinator, root)?;
    let history = coordinator.switch_active(root).await;

    if json {
        println!("{}", serde_json::to_string_pretty(history)?);
        return Ok(());
    }
    for entry in history.active_branch() {
        print_entry(entry);
    }
    Ok(())
}

pub async fn rename(coordinator: &mut HistoryCoordinator, root: &str, title: String) -> Result<()> {
    if !coordinator.set_title(root, title).await {
        bail!("Failed to rename conversation {}", root);
    }
    Ok(())
}

pub async fn tag(coordinator: &mut HistoryCoordinator, root: &str, tag: &str, remove: bool) -> Result<()> {
    let updated = if remove {
        coordinator.remove_tag(root, tag).await
    } else {
        coordinator.add_tag(root, tag).await
    };
    if !updated {
        bail!("Failed to update tags of conversation {}", root);
    }
    Ok(())
}

pub async fn delete(coordinator: &mut HistoryCoordinator, root: &str) -> Result<()> {
    ensure_known(coordinator, root)?;
    coordinator.delete(root).await;
    println!("Deleted {}", root);
    Ok(())
}
