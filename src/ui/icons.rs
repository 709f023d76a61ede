//! Status glyphs prefixed to output lines

pub const CHECK: &str = "✔";
pub const CROSS: &str = "✘";
pub const INFO: &str = "›";
pub const DATABASE: &str = "🗄️";
pub const CLOCK: &str = "⏱";
