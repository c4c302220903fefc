//! # Resources 模块
//!
//! 文件系统资源库：扫描资源根目录下的 `resource.json` 记录。
//!
//! ## 目录布局
//!
//! ```text
//! resources/
//! ├── stories/a/resource.json          {"record": "story", ...}
//! ├── stories/a/start/resource.json    {"record": "scene", "type": "choice", ...}
//! ├── stories/a/start/body.txt
//! └── achievements/a1/resource.json    {"record": "achievement", ...}
//! ```
//!
//! 每个 `resource.json` 只包含一条记录。场景的 `body` 相对于记录所在目录。
//! 无法解析的记录只记录日志并跳过，不影响其他记录。

pub mod path;

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use scene_runtime::{
    Achievement, EndCode, ResourceError, ResourceStore, SceneDefinition, SceneKind, SceneRef,
    Story, StoryCode,
};
use serde::Deserialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use path::{extract_base_dir, normalize_logical_path, resolve_relative_path};

/// 记录文件名
pub const RECORD_FILE: &str = "resource.json";

/// `resource.json` 中的一条记录
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "record", rename_all = "lowercase")]
enum ResourceRecord {
    Scene(SceneDefinition),
    Story(Story),
    Achievement(Achievement),
}

/// 文件系统资源库
///
/// 打开时一次性读取全部记录，之后只读。正文在 `open_body` 时才读取。
#[derive(Debug)]
pub struct FsSceneStore {
    root: PathBuf,
    scenes: HashMap<SceneRef, SceneDefinition>,
    stories: BTreeMap<StoryCode, Story>,
    achievements: HashMap<(StoryCode, EndCode), Achievement>,
}

impl FsSceneStore {
    /// 扫描资源根目录
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ResourceError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ResourceError::NotFound {
                id: root.display().to_string(),
            });
        }

        let mut store = Self {
            root,
            scenes: HashMap::new(),
            stories: BTreeMap::new(),
            achievements: HashMap::new(),
        };

        let records: Vec<PathBuf> = WalkDir::new(&store.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && e.file_name() == RECORD_FILE)
            .map(|e| e.into_path())
            .collect();

        for record_path in records {
            let logical = store.logical_path(&record_path);
            match read_record(&record_path) {
                Ok(record) => store.insert(&logical, record),
                Err(e) => warn!(path = %logical, error = %e, "跳过无法解析的资源记录"),
            }
        }

        info!(
            root = %store.root.display(),
            scenes = store.scenes.len(),
            stories = store.stories.len(),
            achievements = store.achievements.len(),
            "资源库加载完成"
        );
        Ok(store)
    }

    /// 文件在资源根目录下的逻辑路径
    fn logical_path(&self, file: &Path) -> String {
        let relative = file.strip_prefix(&self.root).unwrap_or(file);
        normalize_logical_path(&relative.to_string_lossy())
    }

    fn insert(&mut self, record_path: &str, record: ResourceRecord) {
        match record {
            ResourceRecord::Scene(mut scene) => {
                scene.id = scene.id.trim().to_string();
                scene.body = resolve_relative_path(&extract_base_dir(record_path), scene.body.trim());
                if let SceneKind::Choice { choices } = &mut scene.kind {
                    for choice in choices.iter_mut() {
                        choice.target = choice.target.trim().to_string();
                    }
                }
                if let Err(e) = scene.validate() {
                    warn!(path = %record_path, error = %e, "跳过无效的场景记录");
                    return;
                }
                debug!(scene = %scene.id, body = %scene.body, "加载场景记录");
                if let Some(previous) = self.scenes.insert(scene.id.clone(), scene) {
                    warn!(scene = %previous.id, path = %record_path, "场景 ID 重复，使用后加载的记录");
                }
            }
            ResourceRecord::Story(mut story) => {
                story.start = story.start.trim().to_string();
                if self.stories.insert(story.code, story).is_some() {
                    warn!(path = %record_path, "故事代码重复，使用后加载的记录");
                }
            }
            ResourceRecord::Achievement(achievement) => {
                let key = (achievement.story, achievement.end);
                if self.achievements.insert(key, achievement).is_some() {
                    warn!(path = %record_path, "成就重复，使用后加载的记录");
                }
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 全部场景定义（按 ID 排序）
    pub fn scenes(&self) -> Vec<SceneDefinition> {
        let mut scenes: Vec<_> = self.scenes.values().cloned().collect();
        scenes.sort_by(|a, b| a.id.cmp(&b.id));
        scenes
    }

    /// 全部成就（按故事、结局排序）
    pub fn achievements(&self) -> Vec<Achievement> {
        let mut achievements: Vec<_> = self.achievements.values().cloned().collect();
        achievements.sort_by_key(|a| (a.story, a.end));
        achievements
    }

    pub fn story(&self, code: StoryCode) -> Option<&Story> {
        self.stories.get(&code)
    }
}

fn read_record(path: &Path) -> Result<ResourceRecord, ResourceError> {
    let id = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|e| ResourceError::ReadFailed {
        id: id.clone(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| ResourceError::InvalidFormat {
        id,
        message: e.to_string(),
    })
}

impl ResourceStore for FsSceneStore {
    fn resolve(&self, id: &str) -> Result<SceneDefinition, ResourceError> {
        self.scenes
            .get(id)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound { id: id.to_string() })
    }

    fn open_body(&self, id: &str) -> Result<Box<dyn Read + Send>, ResourceError> {
        let scene = self
            .scenes
            .get(id)
            .ok_or_else(|| ResourceError::NotFound { id: id.to_string() })?;
        let file = File::open(self.root.join(&scene.body)).map_err(|e| ResourceError::ReadFailed {
            id: id.to_string(),
            message: e.to_string(),
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn stories(&self) -> Vec<Story> {
        self.stories.values().cloned().collect()
    }

    fn achievement(&self, story: StoryCode, end: EndCode) -> Option<Achievement> {
        self.achievements.get(&(story, end)).cloned()
    }
}
