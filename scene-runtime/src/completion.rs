//! # Completion 模块
//!
//! 记录玩家在每个故事中到达过的结局。
//!
//! 内部用一个 `u64` 位图表示一个故事（第 `end - 1` 位对应结局 `end`），
//! 对外只暴露结局代码集合。每次修改都立即同步写回 [`Persistence`]。

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::error::{ProgressError, RangeError};
use crate::persistence::Persistence;
use crate::scene::{EndCode, StoryCode};

const STORY_COUNT: usize = 26;

#[derive(Debug, Default)]
struct Masks {
    masks: [u64; STORY_COUNT],
    /// 本次会话中修改过的故事（按位）
    touched: u32,
}

/// 通关进度追踪器
pub struct CompletionTracker {
    persistence: Arc<dyn Persistence>,
    masks: Mutex<Masks>,
}

impl CompletionTracker {
    /// 从持久化服务读取全部故事的位图
    pub fn load(persistence: Arc<dyn Persistence>) -> Self {
        let mut masks = Masks::default();
        for story in StoryCode::all() {
            masks.masks[story.index()] = persistence.ending_bitmask(story);
        }
        debug!("通关进度已加载");
        Self {
            persistence,
            masks: Mutex::new(masks),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Masks> {
        self.masks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 某个结局是否已经到达过
    pub fn is_reached(&self, story: char, end: u32) -> Result<bool, RangeError> {
        let story = StoryCode::new(story)?;
        let end = EndCode::new(end)?;
        Ok(self.has(story, end))
    }

    pub fn has(&self, story: StoryCode, end: EndCode) -> bool {
        self.lock().masks[story.index()] & end.mask() != 0
    }

    /// 标记结局已到达并立即保存
    ///
    /// 已经标记过时不写入。
    pub fn set_reached(&self, story: char, end: u32) -> Result<(), ProgressError> {
        let story = StoryCode::new(story)?;
        let end = EndCode::new(end)?;
        self.mark(story, end)
    }

    pub fn mark(&self, story: StoryCode, end: EndCode) -> Result<(), ProgressError> {
        let mut masks = self.lock();
        let slot = story.index();
        let updated = masks.masks[slot] | end.mask();
        if updated == masks.masks[slot] {
            return Ok(());
        }

        self.persistence.set_ending_bitmask(story, updated)?;
        masks.masks[slot] = updated;
        masks.touched |= 1 << slot;
        info!(story = %story, end = %end, "到达新结局");
        Ok(())
    }

    /// 故事是否已经开始过（到达过任意结局）
    pub fn is_story_started(&self, story: char) -> Result<bool, RangeError> {
        let story = StoryCode::new(story)?;
        Ok(self.lock().masks[story.index()] != 0)
    }

    /// 某个故事已到达的结局集合
    pub fn reached_endings(&self, story: StoryCode) -> BTreeSet<EndCode> {
        let mask = self.lock().masks[story.index()];
        (EndCode::MIN..=EndCode::MAX)
            .filter_map(|code| EndCode::new(code).ok())
            .filter(|end| mask & end.mask() != 0)
            .collect()
    }

    /// 清空全部进度并保存
    pub fn clear_progress(&self) -> Result<(), ProgressError> {
        let mut masks = self.lock();
        for story in StoryCode::all() {
            self.persistence.set_ending_bitmask(story, 0)?;
            masks.masks[story.index()] = 0;
        }
        masks.touched = 0;
        info!("通关进度已清空");
        Ok(())
    }

    /// 会话结束时写回本次修改过的故事
    pub fn flush(&self) -> Result<(), ProgressError> {
        let masks = self.lock();
        for story in StoryCode::all() {
            if masks.touched & (1 << story.index()) != 0 {
                self.persistence
                    .set_ending_bitmask(story, masks.masks[story.index()])?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for CompletionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionTracker")
            .field("masks", &*self.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPersistence;

    fn tracker() -> (Arc<MemoryPersistence>, CompletionTracker) {
        let persistence = Arc::new(MemoryPersistence::new());
        let tracker = CompletionTracker::load(persistence.clone());
        (persistence, tracker)
    }

    #[test]
    fn test_set_and_query() {
        let (persistence, tracker) = tracker();

        assert!(!tracker.is_reached('B', 7).unwrap());
        tracker.set_reached('B', 7).unwrap();
        assert!(tracker.is_reached('B', 7).unwrap());
        assert!(!tracker.is_reached('B', 6).unwrap());

        let story = StoryCode::new('B').unwrap();
        assert_eq!(persistence.ending_bitmask(story), 0x40);
    }

    #[test]
    fn test_set_reached_idempotent() {
        let (persistence, tracker) = tracker();

        tracker.set_reached('A', 1).unwrap();
        let writes = persistence.write_count();
        let mask = persistence.ending_bitmask(StoryCode::new('A').unwrap());

        tracker.set_reached('A', 1).unwrap();
        assert_eq!(persistence.write_count(), writes);
        assert_eq!(
            persistence.ending_bitmask(StoryCode::new('A').unwrap()),
            mask
        );
    }

    #[test]
    fn test_range_checks() {
        let (_, tracker) = tracker();

        assert!(tracker.is_reached('A', 1).is_ok());
        assert!(tracker.is_reached('Z', 64).is_ok());
        assert_eq!(tracker.is_reached('A', 0), Err(RangeError::EndCode(0)));
        assert_eq!(tracker.is_reached('A', 65), Err(RangeError::EndCode(65)));
        assert_eq!(tracker.is_reached('@', 1), Err(RangeError::StoryCode('@')));
        assert_eq!(tracker.is_reached('[', 1), Err(RangeError::StoryCode('[')));
        assert!(matches!(
            tracker.set_reached('[', 1),
            Err(ProgressError::Range(RangeError::StoryCode('[')))
        ));
    }

    #[test]
    fn test_highest_ending_bit() {
        let (persistence, tracker) = tracker();
        tracker.set_reached('Z', 64).unwrap();
        assert_eq!(
            persistence.ending_bitmask(StoryCode::new('Z').unwrap()),
            1u64 << 63
        );
    }

    #[test]
    fn test_reload_after_restart() {
        let persistence = Arc::new(MemoryPersistence::new());
        let story = StoryCode::new('D').unwrap();
        persistence.set_ending_bitmask(story, 0xDEAD_BEEF).unwrap();

        let tracker = CompletionTracker::load(persistence.clone());
        assert_eq!(persistence.ending_bitmask(story), 0xDEAD_BEEF);
        assert!(tracker.is_reached('D', 1).unwrap());
        assert!(!tracker.is_reached('D', 5).unwrap());
        assert!(tracker.is_story_started('D').unwrap());
        assert!(!tracker.is_story_started('E').unwrap());
    }

    #[test]
    fn test_reached_endings_set() {
        let (_, tracker) = tracker();
        tracker.set_reached('C', 2).unwrap();
        tracker.set_reached('C', 9).unwrap();

        let ends: Vec<u32> = tracker
            .reached_endings(StoryCode::new('C').unwrap())
            .into_iter()
            .map(EndCode::get)
            .collect();
        assert_eq!(ends, vec![2, 9]);
    }

    #[test]
    fn test_clear_progress() {
        let (persistence, tracker) = tracker();
        tracker.set_reached('A', 3).unwrap();
        tracker.clear_progress().unwrap();

        assert!(!tracker.is_story_started('A').unwrap());
        assert_eq!(persistence.ending_bitmask(StoryCode::new('A').unwrap()), 0);
    }

    #[test]
    fn test_flush_rewrites_touched_stories() {
        let (persistence, tracker) = tracker();
        tracker.set_reached('F', 4).unwrap();
        let writes = persistence.write_count();

        tracker.flush().unwrap();
        assert_eq!(persistence.write_count(), writes + 1);
        assert_eq!(persistence.ending_bitmask(StoryCode::new('F').unwrap()), 0x8);
    }
}
