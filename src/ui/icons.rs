//! Shared UI icons and emojis.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");

// Leaf state
pub static ACTIVE: Emoji<'_, '_> = Emoji("🟢 ", "[on] ");
pub static INACTIVE: Emoji<'_, '_> = Emoji("⚪ ", "[off]");
pub static BUSY: Emoji<'_, '_> = Emoji("⏳ ", "[..] ");

// Fleet entities
pub static LEAF: Emoji<'_, '_> = Emoji("🍃 ", "");
pub static BRANCH: Emoji<'_, '_> = Emoji("🌿 ", "");

// Connection indicator
pub static CONNECTED: Emoji<'_, '_> = Emoji("🔌 ", "[+]");
pub static RECONNECT: Emoji<'_, '_> = Emoji("🔄 ", "[~]");
