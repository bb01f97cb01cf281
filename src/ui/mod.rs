//! Terminal rendering for fleet views and the console indicator.

pub mod icons;

use console::style;
use forest_common::{Branch, Leaf, Species};
use serde_json::Value;

use crate::socket::ConnectionState;

/// One row of the leaves view: state icon, name, addresses.
pub fn leaf_line(leaf: &Leaf) -> String {
    let state = if leaf.busy {
        icons::BUSY
    } else if leaf.active {
        icons::ACTIVE
    } else {
        icons::INACTIVE
    };
    let name = if leaf.active {
        style(&leaf.name).green().bold()
    } else {
        style(&leaf.name).dim()
    };
    let address = if leaf.address.is_empty() {
        String::new()
    } else {
        format!("  {}", style(leaf.address.join(", ")).cyan())
    };
    let desc = match leaf.desc.as_deref() {
        Some(desc) if !desc.is_empty() => format!("  {}", style(desc).dim()),
        _ => String::new(),
    };
    format!("{state}{name}{address}{desc}")
}

pub fn branch_line(branch: &Branch) -> String {
    let kind = branch
        .kind
        .as_deref()
        .map(|k| format!("  {}", style(format!("type {k}")).dim()))
        .unwrap_or_default();
    format!("{}{}{}", icons::BRANCH, style(&branch.name).bold(), kind)
}

pub fn species_line(species: &Species) -> String {
    match &species.id {
        Some(id) => format!("{}  {}", style(&species.name).bold(), style(id).dim()),
        None => style(&species.name).bold().to_string(),
    }
}

/// One `forest_status` entry: server name, load and memory when reported.
pub fn server_line(server: &Value) -> String {
    let name = ["name", "host", "address"]
        .iter()
        .find_map(|key| server.get(*key).and_then(Value::as_str))
        .unwrap_or("-");
    let mut details = Vec::new();
    if let Some(load) = server.get("load_1").and_then(Value::as_f64) {
        details.push(format!("load {load:.2}"));
    }
    let mem_used = server.get("mem_used").and_then(Value::as_f64);
    let mem_total = server.get("mem_total").and_then(Value::as_f64);
    if let (Some(used), Some(total)) = (mem_used, mem_total) {
        details.push(format!("mem {used:.0}/{total:.0} MB"));
    }
    if details.is_empty() {
        details.push(server.to_string());
    }
    format!(
        "{}{}  {}",
        icons::BRANCH,
        style(name).bold(),
        style(details.join("  ")).dim()
    )
}

/// Connection indicator shown while the console runs.
pub fn connection_badge(state: ConnectionState) -> String {
    match state {
        ConnectionState::Connected => {
            format!("{}{}", icons::CONNECTED, style("connected").green())
        }
        ConnectionState::Connecting => {
            format!("{}{}", icons::RECONNECT, style("connecting").yellow())
        }
        ConnectionState::Disconnected => {
            format!("{}{}", icons::CROSS, style("disconnected").red())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(s: String) -> String {
        console::strip_ansi_codes(&s).into_owned()
    }

    #[test]
    fn leaf_line_shows_name_and_addresses() {
        let mut leaf = Leaf::new("main");
        leaf.active = true;
        leaf.address = vec!["a.example.com".to_string(), "b.example.com".to_string()];
        let line = plain(leaf_line(&leaf));
        assert!(line.contains("main"));
        assert!(line.contains("a.example.com, b.example.com"));
    }

    #[test]
    fn busy_leaf_uses_busy_icon() {
        let mut leaf = Leaf::new("main");
        leaf.busy = true;
        let busy = plain(leaf_line(&leaf));
        leaf.busy = false;
        let idle = plain(leaf_line(&leaf));
        assert_ne!(busy, idle);
    }

    #[test]
    fn badge_names_state() {
        assert!(plain(connection_badge(ConnectionState::Connected)).contains("connected"));
        assert!(plain(connection_badge(ConnectionState::Disconnected)).contains("disconnected"));
        assert!(plain(connection_badge(ConnectionState::Connecting)).contains("connecting"));
    }

    #[test]
    fn branch_line_shows_type() {
        let branch: Branch =
            serde_json::from_value(serde_json::json!({"name": "b1", "type": "t1"})).unwrap();
        assert!(plain(branch_line(&branch)).contains("type t1"));
    }

    #[test]
    fn server_line_summarizes_measurements() {
        let server = serde_json::json!({
            "host": "trunk",
            "load_1": 0.5,
            "mem_used": 512.4,
            "mem_total": 2048
        });
        let line = plain(server_line(&server));
        assert!(line.contains("trunk"));
        assert!(line.contains("load 0.50"));
        assert!(line.contains("mem 512/2048 MB"));

        let bare = plain(server_line(&serde_json::json!({"state": "up"})));
        assert!(bare.contains("- "));
        assert!(bare.contains("\"state\":\"up\""));
    }
}
