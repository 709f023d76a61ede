pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use output::{error, header, human_count, info, success, timing};
pub use progress::Spinner;
pub use table::{render_result, render_variables};
pub use theme::{theme, Theme};
