//! `canon version` command - Display version information.

use crate::error::CliResult;
use crate::output::{self, kv};

/// Package version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
const NAME: &str = env!("CARGO_PKG_NAME");

/// Run the version command
pub async fn run() -> CliResult<()> {
    output::header("Canon");

    kv("Version", VERSION);
    kv("Binary", NAME);

    #[cfg(debug_assertions)]
    let build_mode = "debug";
    #[cfg(not(debug_assertions))]
    let build_mode = "release";

    kv("Build", build_mode);

    let mut stores = vec!["memory"];

    #[cfg(feature = "postgres")]
    stores.push("postgresql");

    kv("Stores", &stores.join(", "));

    output::newline();

    output::section("Components");
    kv("canon-registry", env!("CARGO_PKG_VERSION"));
    kv("canon-migrate", env!("CARGO_PKG_VERSION"));

    Ok(())
}
