//! Plain-text renderers for the chat transcript. Everything here is a pure
//! function of its inputs; the interactive loop decides when to print.

use chrono::{DateTime, NaiveDateTime};
use shared::auth::Session;
use shared::conversation::{AssistantProposalMessage, Message, Role};
use shared::models::PlanItem;

pub const DEFAULT_WIDTH: usize = 80;
pub const APP_TITLE: &str = "Aegis LifeOS";
pub const PROPOSAL_TITLE: &str = "Proposed Study Plan";

const RECENT_CHATS: [&str; 2] = ["Study Plan: Biology", "Schedule Meeting"];
const KNOWLEDGE_VAULT: [&str; 1] = ["test_doc.pdf"];
const UNTITLED_TOPIC: &str = "(untitled)";

pub fn render_header(width: usize) -> String {
    let rule = "═".repeat(width.min(DEFAULT_WIDTH));
    format!("{rule}\n{APP_TITLE}\n{rule}\n")
}

/// Renders `messages` in order. `thinking` carries the indicator frame while
/// a request is in flight; the indicator is left as the unterminated last line
/// so the caller can redraw it in place.
pub fn render_message_list(messages: &[Message], thinking: Option<usize>, width: usize) -> String {
    let mut out = String::new();
    for message in messages {
        out.push_str(&render_message(message, width));
    }
    if let Some(frame) = thinking {
        out.push_str(&render_thinking_indicator(frame));
    }
    out
}

/// User turns hug the right edge, assistant turns the left.
pub fn render_message(message: &Message, width: usize) -> String {
    let bubble_width = (width * 4 / 5).max(20);
    let lines = wrap(message.content(), bubble_width);
    let mut out = String::new();

    match message.role() {
        Role::User => {
            for line in &lines {
                let text = format!("{line} │");
                out.push_str(&format!("{text:>width$}\n", width = width.saturating_sub(4)));
            }
            out.push_str(&format!("{:>width$}\n", "U", width = width.saturating_sub(4)));
        }
        Role::Assistant => {
            out.push_str("AI\n");
            for line in &lines {
                out.push_str(&format!("│ {line}\n"));
            }
        }
    }

    match message {
        Message::AssistantProposal(proposal) => out.push_str(&render_proposal_card(proposal)),
        Message::AssistantText(text) if !text.plan.is_empty() => {
            out.push_str(&render_scheduled_plan(&text.plan));
        }
        _ => {}
    }

    out.push('\n');
    out
}

pub fn render_proposal_card(proposal: &AssistantProposalMessage) -> String {
    let mut out = format!("  ┌─ {PROPOSAL_TITLE}\n");
    if proposal.plan.is_empty() {
        out.push_str("  │ (no plan items)\n");
    }
    for item in &proposal.plan {
        let duration = item
            .duration_hours
            .map(format_hours)
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "  │ {:<40} {duration:>6}\n",
            truncate(display_topic(item), 40)
        ));
    }

    if proposal.actionable_thread().is_some() {
        out.push_str("  └─ /approve   /modify <feedback>\n");
    } else {
        out.push_str("  └─ (no thread to act on)\n");
    }
    out
}

pub fn render_scheduled_plan(plan: &[PlanItem]) -> String {
    let mut out = String::from("  Scheduled:\n");
    for item in plan {
        let when = match (item.start.as_deref(), item.end.as_deref()) {
            (Some(start), Some(end)) => format_time_range(start, end),
            (Some(start), None) => format_timestamp(start),
            _ => item.duration_hours.map(format_hours).unwrap_or_default(),
        };
        out.push_str(&format!("  • {}  {when}\n", display_topic(item)));
    }
    out
}

pub fn render_thinking_indicator(frame: usize) -> String {
    format!("Thinking{}", ".".repeat(frame % 3 + 1))
}

pub fn render_sidebar(session: Option<&Session>) -> String {
    let mut out = String::from("── LifeOS Memory ──\n");
    out.push_str("Recent Chats\n");
    for chat in RECENT_CHATS {
        out.push_str(&format!("  {chat}\n"));
    }
    out.push_str("Knowledge Vault\n");
    for document in KNOWLEDGE_VAULT {
        out.push_str(&format!("  {document}\n"));
    }
    out.push_str("───────────────────\n");

    match session {
        Some(session) => {
            out.push_str(&format!("{}  (/logout)\n", session.display_name()));
            if let Some(image) = session.user.image.as_deref() {
                out.push_str(&format!("  avatar: {image}\n"));
            }
        }
        None => out.push_str("Not signed in  (/login)\n"),
    }
    out
}

pub fn render_help() -> String {
    [
        "Type a message and press Enter to send. End a line with \\ to keep typing.",
        "  /approve            approve the latest proposed plan",
        "  /modify [feedback]  ask for changes to the latest proposed plan",
        "  /attach <file.pdf>  upload a reference document",
        "  /login, /logout     sign in with Google or sign out",
        "  /sidebar            show recent chats and account",
        "  /quit               exit",
        "",
    ]
    .join("\n")
}

fn display_topic(item: &PlanItem) -> &str {
    let topic = item.topic.trim();
    if topic.is_empty() { UNTITLED_TOPIC } else { topic }
}

pub fn format_hours(hours: f64) -> String {
    if hours.fract() == 0.0 {
        format!("{hours:.0}h")
    } else {
        format!("{hours}h")
    }
}

fn format_time_range(start: &str, end: &str) -> String {
    match (parse_timestamp(start), parse_timestamp(end)) {
        (Some(start), Some(end)) if start.date() == end.date() => format!(
            "{} {}-{}",
            start.format("%a %b %-d"),
            start.format("%H:%M"),
            end.format("%H:%M")
        ),
        (Some(start), Some(end)) => format!(
            "{} to {}",
            start.format("%a %b %-d %H:%M"),
            end.format("%a %b %-d %H:%M")
        ),
        _ => format!("{start} to {end}"),
    }
}

fn format_timestamp(raw: &str) -> String {
    parse_timestamp(raw)
        .map(|value| value.format("%a %b %-d %H:%M").to_string())
        .unwrap_or_else(|| raw.to_string())
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.naive_local())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok())
}

fn wrap(text: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > max_width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }
    lines
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    truncated.push('…');
    truncated
}
