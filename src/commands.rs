//! JSON-lines command channel for a front end driving the registry.
//!
//! One JSON object per line in, one JSON object per line out:
//!
//! ```text
//! {"cmd":"list"}                                   → {"collabs":[..],"balconies":[..]}
//! {"cmd":"tags","id":"1-2"}                        → {"id":"1-2","tags":[..],"options":[..]}
//! {"cmd":"suggest","limit":5}                      → {"spaces":[..]}
//! {"cmd":"activity","category":"smoking"}          → {"category":"smoking","spaces":[..]}
//! {"cmd":"update","id":"1-1","occupied":true,
//!  "tags":["music"],"note":"Jam"}                  → {"updated":true}
//! {"cmd":"sync"}                                   → {"outcome":..}
//! {"cmd":"stats"}                                  → {"cycles":..,..}
//! ```

use serde_json::{json, Value};

use crate::activity::ActivityCategory;
use crate::registry::{ReconcileOutcome, SpaceRegistry};
use crate::sync::SyncLoop;

pub async fn handle(registry: &SpaceRegistry, sync: &SyncLoop, cmd: &Value) -> Value {
    match cmd.get("cmd").and_then(|v| v.as_str()) {
        Some("list") => cmd_list(registry),
        Some("tags") => cmd_tags(registry, cmd),
        Some("suggest") => cmd_suggest(registry, cmd),
        Some("activity") => cmd_activity(registry, cmd),
        Some("update") => cmd_update(registry, cmd),
        Some("sync") => cmd_sync(sync).await,
        Some("stats") => cmd_stats(sync),
        _ => json!({"error": "unknown command"}),
    }
}

/// Parse one input line and run it.
pub async fn handle_line(registry: &SpaceRegistry, sync: &SyncLoop, line: &str) -> Value {
    match serde_json::from_str::<Value>(line) {
        Ok(cmd) => handle(registry, sync, &cmd).await,
        Err(e) => json!({"error": e.to_string()}),
    }
}

fn cmd_list(registry: &SpaceRegistry) -> Value {
    let snapshot = registry.snapshot();
    json!({"collabs": snapshot.collabs, "balconies": snapshot.balconies})
}

fn cmd_tags(registry: &SpaceRegistry, cmd: &Value) -> Value {
    let Some(id) = cmd.get("id").and_then(|v| v.as_str()) else {
        return json!({"error": "missing id"});
    };
    let options = registry
        .space(id)
        .map(|s| s.kind.activity_tags().to_vec())
        .unwrap_or_default();
    json!({"id": id, "tags": registry.tags(id), "options": options})
}

fn cmd_suggest(registry: &SpaceRegistry, cmd: &Value) -> Value {
    let mut spaces = registry.suggestions();
    if let Some(limit) = cmd.get("limit").and_then(|v| v.as_u64()) {
        spaces.truncate(limit as usize);
    }
    json!({"spaces": spaces})
}

fn cmd_activity(registry: &SpaceRegistry, cmd: &Value) -> Value {
    let category = match cmd.get("category").and_then(|v| v.as_str()) {
        Some(name) => match name.parse::<ActivityCategory>() {
            Ok(c) => c,
            Err(e) => return json!({"error": e.to_string()}),
        },
        None => return json!({"error": "missing category"}),
    };
    json!({
        "category": category.to_string(),
        "spaces": registry.spaces_for_activity(category),
    })
}

fn cmd_update(registry: &SpaceRegistry, cmd: &Value) -> Value {
    let Some(id) = cmd.get("id").and_then(|v| v.as_str()) else {
        return json!({"error": "missing id"});
    };
    let Some(occupied) = cmd.get("occupied").and_then(|v| v.as_bool()) else {
        return json!({"error": "missing occupied"});
    };
    let tags: Vec<String> = cmd
        .get("tags")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|t| t.as_str().map(String::from)).collect())
        .unwrap_or_default();
    let note = cmd.get("note").and_then(|v| v.as_str()).unwrap_or("");

    json!({"updated": registry.update_space(id, occupied, tags, note)})
}

async fn cmd_sync(sync: &SyncLoop) -> Value {
    match sync.sync_now().await {
        Ok(ReconcileOutcome::Replaced { collabs, balconies }) => {
            json!({"outcome": "replaced", "collabs": collabs, "balconies": balconies})
        }
        Ok(ReconcileOutcome::Seeded(report)) => {
            json!({"outcome": "seeded", "written": report.written, "failed": report.failed})
        }
        Err(e) => json!({"error": format!("{e:#}")}),
    }
}

fn cmd_stats(sync: &SyncLoop) -> Value {
    let stats = sync.stats();
    json!({
        "cycles": stats.cycles,
        "consecutive_failures": stats.consecutive_failures,
        "last_success": stats.last_success.map(|t| t.to_rfc3339()),
        "last_error": stats.last_error,
    })
}
