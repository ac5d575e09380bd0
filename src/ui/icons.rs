//! Shared UI icons and emojis.
//!
//! Each icon falls back to a bracketed ASCII tag on terminals without
//! emoji support.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

// Gate indicators
pub static RUNNING: Emoji<'_, '_> = Emoji("▶️  ", "[>]");
pub static SNAPSHOT: Emoji<'_, '_> = Emoji("📸 ", "[SNAP]");
pub static ROLLBACK: Emoji<'_, '_> = Emoji("⏪ ", "[ROLLBACK]");
pub static RESCUE: Emoji<'_, '_> = Emoji("🛟 ", "[RESCUE]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
