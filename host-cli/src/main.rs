//! # Player
//!
//! 无界面的终端播放器。
//!
//! ## 用法
//!
//! ```bash
//! cargo run -p host-cli -- play A
//! cargo run -p host-cli -- continue A
//! cargo run -p host-cli -- stories
//! cargo run -p host-cli -- speed 4
//! cargo run -p host-cli -- --root demo/resources -vv play B
//! ```

mod input;
mod presenter;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use host::{AppConfig, FsSceneStore, SettingsFile};
use scene_runtime::{
    CompletionTracker, EngineContext, NavState, NavigationController, NavigatorConfig,
    Persistence, ResourceStore, StoryCode, TextSpeed,
};
use tracing::{Level, info, warn};

use input::{parse_command, spawn_stdin_reader};
use presenter::TerminalPresenter;

/// 主循环检查显示进度的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Parser)]
#[command(name = "player")]
#[command(about = "分支剧情播放器")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件（默认：config.json）
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// 资源根目录（覆盖配置文件）
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// 设置文件（覆盖配置文件）
    #[arg(long, global = true)]
    save: Option<PathBuf>,

    /// 日志详细程度（-v: debug, -vv: trace）
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// 从起始场景开始一个故事
    Play {
        /// 故事代码（A-Z）
        story: char,
    },

    /// 从存档继续
    Continue {
        /// 故事代码（A-Z）
        story: char,
    },

    /// 列出全部故事和已达成的结局
    Stories,

    /// 设置文字速度（1-16）
    Speed { value: u32 },

    /// 清除全部通关进度
    Reset,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("无法加载配置文件 {}", cli.config.display()))?;
    if let Some(root) = cli.root {
        config.resources_root = root;
    }
    if let Some(save) = cli.save {
        config.save_file = save;
    }
    config.validate()?;

    init_logging(&config, cli.verbose);

    let settings = Arc::new(
        SettingsFile::open(&config.save_file, config.text_speed()?)
            .with_context(|| format!("无法打开设置文件 {}", config.save_file.display()))?,
    );
    let completion = Arc::new(CompletionTracker::load(settings.clone()));

    match cli.command {
        Commands::Play { story } => {
            let story = story_code(story)?;
            let store = open_store(&config)?;
            let Some(start) = store.story(story).map(|s| s.start.clone()) else {
                bail!("故事 {} 不存在", story);
            };
            let mut nav = navigator(&config, store, settings, completion);
            nav.start(&start, story.as_char())?;
            run_turns(&mut nav)
        }
        Commands::Continue { story } => {
            let story = story_code(story)?;
            let store = open_store(&config)?;
            let mut nav = navigator(&config, store, settings, completion);
            nav.on_load(story.as_char())?;
            run_turns(&mut nav)
        }
        Commands::Stories => {
            let store = open_store(&config)?;
            for story in store.stories() {
                let reached = completion.reached_endings(story.code);
                let endings: Vec<String> = reached.iter().map(|e| e.to_string()).collect();
                println!("[{}] {} (起点: {})", story.code, story.name, story.start);
                if !story.description.is_empty() {
                    println!("    {}", story.description);
                }
                println!("    已达成结局: {}", display_list(&endings));
            }
            Ok(())
        }
        Commands::Speed { value } => {
            let speed = TextSpeed::new(value)?;
            settings.set_text_speed(speed)?;
            info!(speed = speed.get(), "文字速度已更新");
            Ok(())
        }
        Commands::Reset => {
            completion.clear_progress()?;
            info!("通关进度已清除");
            Ok(())
        }
    }
}

/// 初始化日志：输出到 stderr，避免和剧情文本混在一起
fn init_logging(config: &AppConfig, verbose: u8) {
    let level = match verbose {
        0 => Level::from_str(&config.log_level).unwrap_or(Level::INFO),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn story_code(story: char) -> anyhow::Result<StoryCode> {
    Ok(StoryCode::new(story.to_ascii_uppercase())?)
}

fn open_store(config: &AppConfig) -> anyhow::Result<Arc<FsSceneStore>> {
    let store = FsSceneStore::open(&config.resources_root).with_context(|| {
        format!("无法打开资源目录 {}", config.resources_root.display())
    })?;
    Ok(Arc::new(store))
}

fn navigator(
    config: &AppConfig,
    store: Arc<FsSceneStore>,
    settings: Arc<SettingsFile>,
    completion: Arc<CompletionTracker>,
) -> NavigationController {
    let context = EngineContext {
        store,
        persistence: settings,
        completion,
        presenter: Arc::new(TerminalPresenter::new()),
    };
    NavigationController::new(
        context,
        NavigatorConfig {
            base_delay: config.base_delay(),
        },
    )
}

/// 回合主循环，直到到达结局或返回菜单
fn run_turns(nav: &mut NavigationController) -> anyhow::Result<()> {
    let commands = spawn_stdin_reader().context("无法启动输入线程")?;
    let result = drive(nav, &commands);
    nav.shutdown();
    result
}

fn drive(nav: &mut NavigationController, commands: &Receiver<String>) -> anyhow::Result<()> {
    loop {
        if !nav.poll().is_active() {
            return Ok(());
        }

        match commands.recv_timeout(POLL_INTERVAL) {
            Ok(line) => match parse_command(&line, nav.state()) {
                Some(command) => nav.handle(command)?,
                None => warn!(input = %line, "无法识别的输入"),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                // 输入已结束：显示完当前场景后退出
                if nav.wait_display() == NavState::AwaitingChoice {
                    nav.on_menu();
                }
                return Ok(());
            }
        }
    }
}

fn display_list(items: &[String]) -> String {
    if items.is_empty() {
        "无".to_string()
    } else {
        items.join(", ")
    }
}
