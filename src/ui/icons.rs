//! Shared UI icons.
//!
//! Each icon falls back to plain ASCII on terminals without emoji support.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");

// Review indicators
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
pub static REVIEW: Emoji<'_, '_> = Emoji("🔍 ", "[R]");
pub static RETRY: Emoji<'_, '_> = Emoji("🔄 ", "[RETRY]");
pub static MERGE: Emoji<'_, '_> = Emoji("🧩 ", "[MERGE]");
pub static COST: Emoji<'_, '_> = Emoji("💰 ", "$");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
