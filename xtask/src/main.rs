//! Build automation tasks for the connmgr workspace.
//!
//! Run with `cargo xtask <command>`.
//!
//! ## Available Commands
//!
//! - `ci`: Run all CI checks (format, lint, test, deny)
//! - `fmt`: Check/apply code formatting
//! - `clippy`: Run clippy lints
//! - `test`: Run all tests
//! - `deny`: Run cargo-deny checks
//! - `doc`: Generate documentation
//! - `clean`: Clean build artifacts
//! - `fuzz`: Run connection string fuzz targets (requires cargo-fuzz + nightly)
//! - `coverage`: Run code coverage (requires cargo-llvm-cov)

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for connmgr")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all checks (format, lint, test, deny)
    Ci,
    /// Run cargo fmt (--check by default, --fix to apply)
    Fmt {
        /// Apply formatting fixes
        #[arg(long)]
        fix: bool,
    },
    /// Run clippy with all features
    Clippy {
        /// Apply clippy suggestions
        #[arg(long)]
        fix: bool,
    },
    /// Run all tests
    Test {
        /// Test a specific package
        #[arg(short, long)]
        package: Option<String>,
        /// Only run unit tests inside the library crates
        #[arg(long)]
        lib: bool,
    },
    /// Run cargo-deny checks
    Deny,
    /// Generate documentation
    Doc {
        /// Open documentation in browser
        #[arg(long)]
        open: bool,
    },
    /// Clean build artifacts
    Clean,
    /// Run fuzz tests (requires cargo-fuzz + nightly)
    Fuzz {
        /// Fuzz target to run
        #[arg(default_value = "connection_string")]
        target: String,
        /// Maximum runtime in seconds
        #[arg(long, default_value = "60")]
        max_time: u64,
        /// List available fuzz targets
        #[arg(long)]
        list: bool,
    },
    /// Run code coverage
    Coverage {
        /// Output format (html, lcov, json)
        #[arg(long, default_value = "html")]
        format: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;
    sh.change_dir(workspace_root()?);

    match cli.command {
        Command::Ci => {
            println!("Running CI checks...");
            fmt(&sh, false)?;
            clippy(&sh, false)?;
            test(&sh, None, false)?;
            deny(&sh)?;
            println!("\n✅ All CI checks passed!");
        }
        Command::Fmt { fix } => fmt(&sh, fix)?,
        Command::Clippy { fix } => clippy(&sh, fix)?,
        Command::Test { package, lib } => test(&sh, package.as_deref(), lib)?,
        Command::Deny => deny(&sh)?,
        Command::Doc { open } => doc(&sh, open)?,
        Command::Clean => step("clean", || cmd!(sh, "cargo clean").run())?,
        Command::Fuzz {
            target,
            max_time,
            list,
        } => fuzz(&sh, &target, max_time, list)?,
        Command::Coverage { format } => coverage(&sh, &format)?,
    }

    Ok(())
}

/// Run one named step, reporting how it went.
fn step(name: &str, run: impl FnOnce() -> xshell::Result<()>) -> Result<()> {
    println!("==> {name}");
    run().with_context(|| format!("{name} failed"))?;
    println!("✅ {name} ok");
    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let output = std::process::Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("failed to run cargo locate-project")?;

    let manifest = String::from_utf8(output.stdout).context("cargo printed non UTF-8 path")?;
    PathBuf::from(manifest.trim())
        .parent()
        .map(PathBuf::from)
        .context("workspace manifest has no parent directory")
}

fn fmt(sh: &Shell, fix: bool) -> Result<()> {
    if fix {
        step("fmt (apply)", || cmd!(sh, "cargo fmt --all").run())
    } else {
        step("fmt", || cmd!(sh, "cargo fmt --all -- --check").run())
    }
}

fn clippy(sh: &Shell, fix: bool) -> Result<()> {
    let common = ["--workspace", "--all-features", "--all-targets"];
    if fix {
        step("clippy (apply)", || {
            cmd!(sh, "cargo clippy {common...} --fix --allow-dirty").run()
        })
    } else {
        step("clippy", || {
            cmd!(sh, "cargo clippy {common...} -- -D warnings").run()
        })
    }
}

fn test(sh: &Shell, package: Option<&str>, lib_only: bool) -> Result<()> {
    let mut args = vec!["--all-features"];
    match package {
        Some(pkg) => args.extend(["-p", pkg]),
        None => args.push("--workspace"),
    }
    if lib_only {
        args.push("--lib");
    }

    step("test", || cmd!(sh, "cargo test {args...}").run())
}

fn deny(sh: &Shell) -> Result<()> {
    step("cargo-deny", || cmd!(sh, "cargo deny check").run())
}

fn doc(sh: &Shell, open: bool) -> Result<()> {
    let open = open.then_some("--open");
    step("doc", || {
        cmd!(sh, "cargo doc --workspace --all-features --no-deps {open...}").run()
    })
}

fn fuzz_targets(fuzz_dir: &Path) -> Result<Vec<String>> {
    let targets_dir = fuzz_dir.join("fuzz_targets");
    let mut targets = Vec::new();
    if targets_dir.exists() {
        for entry in fs::read_dir(&targets_dir)? {
            let path = entry?.path();
            let name = path
                .file_stem()
                .filter(|_| path.extension().is_some_and(|ext| ext == "rs"));
            if let Some(name) = name {
                targets.push(name.to_string_lossy().into_owned());
            }
        }
    }
    targets.sort();
    Ok(targets)
}

fn fuzz(sh: &Shell, target: &str, max_time: u64, list: bool) -> Result<()> {
    let fuzz_dir = sh.current_dir().join("fuzz");
    if !fuzz_dir.exists() {
        bail!("Fuzz directory not found at {}", fuzz_dir.display());
    }

    let targets = fuzz_targets(&fuzz_dir)?;

    if list {
        println!("Available fuzz targets:");
        for name in &targets {
            println!("  - {name}");
        }
        return Ok(());
    }

    if !targets.iter().any(|t| t == target) {
        bail!(
            "Unknown fuzz target: {target}. Available: {}",
            targets.join(", ")
        );
    }

    // cargo-fuzz requires nightly
    let max_time = format!("-max_total_time={max_time}");
    let _dir = sh.push_dir(&fuzz_dir);
    step(&format!("fuzz {target}"), || {
        cmd!(sh, "cargo +nightly fuzz run {target} -- {max_time}").run()
    })
}

fn coverage(sh: &Shell, format: &str) -> Result<()> {
    // Requires cargo-llvm-cov
    let (flags, report): (&[&str], &str) = match format {
        "html" => (&["--html"][..], "target/llvm-cov/html/index.html"),
        "lcov" => (
            &["--lcov", "--output-path", "target/lcov.info"][..],
            "target/lcov.info",
        ),
        "json" => (
            &["--json", "--output-path", "target/coverage.json"][..],
            "target/coverage.json",
        ),
        other => bail!("Unknown coverage format: {other}. Use html, lcov, or json."),
    };

    step("coverage", || {
        cmd!(sh, "cargo llvm-cov --workspace --all-features {flags...}").run()
    })?;
    println!("Coverage report: {report}");
    Ok(())
}
