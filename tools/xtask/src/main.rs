//! # xtask - 开发辅助工具
//!
//! 提供本地质量门禁与资源检查命令。
//!
//! ## 命令
//!
//! - `check-all`: 运行 fmt、clippy、test
//! - `scene-check`: 检查资源目录（场景链接、故事起点、可达性、正文文件）

use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use clap::{Parser, Subcommand};
use host::FsSceneStore;
use scene_runtime::{DiagnosticLevel, DiagnosticResult, ResourceStore, analyze_scenes};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "开发辅助工具")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行 fmt、clippy、test 门禁检查
    CheckAll,

    /// 检查资源目录
    SceneCheck {
        /// 资源根目录（默认：resources）
        #[arg(default_value = "resources")]
        root: PathBuf,
    },
}

fn run(step: &str, cmd: &mut Command) -> anyhow::Result<()> {
    eprintln!("\n==> {step}");
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("{step} failed with {status}");
    }
    Ok(())
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        eprintln!("xtask error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Commands::CheckAll => {
            let mut fmt = Command::new("cargo");
            fmt.args(["fmt", "--all", "--", "--check"]);
            run("cargo fmt --all -- --check", &mut fmt)?;

            let mut clippy = Command::new("cargo");
            clippy.args(["clippy", "--workspace", "--all-targets"]);
            run("cargo clippy --workspace --all-targets", &mut clippy)?;

            let mut test = Command::new("cargo");
            test.args(["test", "--workspace"]);
            run("cargo test --workspace", &mut test)?;
        }
        Commands::SceneCheck { root } => scene_check(&root)?,
    }

    Ok(())
}

//=============================================================================
// scene-check 命令实现
//=============================================================================

/// 缺失的正文文件
struct MissingBody {
    scene: String,
    path: String,
}

fn scene_check(root: &Path) -> anyhow::Result<()> {
    if !root.is_dir() {
        anyhow::bail!(
            "资源目录不存在: {}\n请在 workspace 根目录运行，或指定资源目录",
            root.display()
        );
    }

    let store = FsSceneStore::open(root)?;
    let scenes = store.scenes();
    let stories = store.stories();
    eprintln!(
        "==> 检查 {} 个场景、{} 个故事...\n",
        scenes.len(),
        stories.len()
    );

    let diagnostics = analyze_scenes(&scenes, &stories, &store.achievements());
    let missing: Vec<MissingBody> = scenes
        .iter()
        .filter(|s| !root.join(&s.body).is_file())
        .map(|s| MissingBody {
            scene: s.id.clone(),
            path: s.body.clone(),
        })
        .collect();

    print_check_result(&diagnostics, &missing);

    if diagnostics.has_errors() {
        anyhow::bail!("场景检查发现错误");
    }
    Ok(())
}

fn print_check_result(result: &DiagnosticResult, missing: &[MissingBody]) {
    eprintln!("─────────────────────────────────────────────────────");

    for diag in &result.diagnostics {
        eprintln!("{}", diag);
    }

    // 正文缺失只影响显示，不阻止导航
    for body in missing {
        eprintln!("[WARN] {}: 正文文件不存在 {}", body.scene, body.path);
    }

    let error_count = result.count(DiagnosticLevel::Error);
    let warn_count = result.count(DiagnosticLevel::Warn) + missing.len();

    eprintln!();
    if error_count > 0 {
        eprintln!("❌ {} 个错误, {} 个警告", error_count, warn_count);
    } else if warn_count > 0 {
        eprintln!("⚠️  0 个错误, {} 个警告", warn_count);
    } else {
        eprintln!("✅ 检查通过，无错误");
    }
}
