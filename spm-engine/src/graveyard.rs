//! 已删除、尚待宿主确认的对象暂存区。
//!
//! 删除时移入；重新添加同键对象或宿主确认主图元已删除时清出。

use spm_core::document::EntityId;
use spm_core::geometry::GeometricKey;

use crate::collection::SpmObject;
use crate::persistence::Persistent;

#[derive(Debug, Clone)]
pub struct Graveyard<T: SpmObject> {
    entries: Vec<T>,
}

impl<T: SpmObject> Default for Graveyard<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: SpmObject> Graveyard<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn bury(&mut self, item: T) {
        self.entries.push(item);
    }

    /// 取出全部与 `key` 相等的条目。
    pub fn exhume(&mut self, key: &T::Key, tolerance: f64) -> Vec<T> {
        let mut exhumed = Vec::new();
        let mut index = 0;
        while index < self.entries.len() {
            if self.entries[index].key().key_eq(key, tolerance) {
                exhumed.push(self.entries.remove(index));
            } else {
                index += 1;
            }
        }
        exhumed
    }

    pub fn contains(&self, key: &T::Key, tolerance: f64) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.key().key_eq(key, tolerance))
    }

    /// 宿主确认 `entity` 已删除：清出以它为主图元的条目，返回是否有条目被清出。
    pub fn confirm_erased(&mut self, entity: EntityId) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|entry| entry.binding().entity() != Some(entity));
        self.entries.len() != before
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
