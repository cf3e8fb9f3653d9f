//! Global output-mode flags, mirrored into the environment so every
//! module can check them without threading a config value around.

pub fn is_quiet() -> bool {
    std::env::var("BUILDSHEET_QUIET").is_ok()
}

pub fn is_verbose() -> bool {
    std::env::var("BUILDSHEET_VERBOSE").is_ok()
}

/// Print a status line unless `--quiet` is in effect.
pub fn status(message: &str) {
    if !is_quiet() {
        eprintln!("  {message}");
    }
}
