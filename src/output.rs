use std::sync::OnceLock;

static QUIET: OnceLock<bool> = OnceLock::new();

/// `MEMSEE_QUIET=1` silences informational output; tables and errors still print
pub fn is_quiet() -> bool {
    *QUIET.get_or_init(|| {
        std::env::var("MEMSEE_QUIET")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}
