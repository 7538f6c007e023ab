//! 与图元同步的有序集合。
//!
//! 集合保证同一几何键至多一个对象，排序后编号连续（从 1 开始）。
//! 所有需要宿主执行的动作（创建、删除、回写记录）都作为 [`Change`] 返回，
//! 集合本身从不直接操作图纸，因此宿主回调不会重入集合。

use std::fmt::Debug;

use spm_core::document::EntityId;
use spm_core::geometry::GeometricKey;
use tracing::debug;

use crate::effects::{Change, Effect, Effects, ObjectKind};
use crate::factory::EntityFactory;
use crate::graveyard::Graveyard;
use crate::host::RecordStore;
use crate::model::ModelSettings;
use crate::persistence::{Persistent, Ticket};

/// 可以放入 [`SyncCollection`] 的领域对象。
pub trait SpmObject: Persistent + EntityFactory + Clone + Debug {
    type Key: GeometricKey;

    const KIND: ObjectKind;

    /// 决定唯一性与排序的几何属性。
    fn key(&self) -> &Self::Key;

    #[inline]
    fn number(&self) -> usize {
        0
    }

    #[inline]
    fn set_number(&mut self, _number: usize) {}

    /// 退化对象（零长度、零力、自由约束、非有限坐标）不会进入集合。
    fn is_degenerate(&self, _tolerance: f64) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub struct SyncCollection<T: SpmObject> {
    items: Vec<T>,
    graveyard: Graveyard<T>,
    settings: ModelSettings,
    next_ticket: u64,
}

impl<T: SpmObject> SyncCollection<T> {
    pub fn new(settings: ModelSettings) -> Self {
        Self {
            items: Vec::new(),
            graveyard: Graveyard::new(),
            settings,
            next_ticket: 0,
        }
    }

    #[inline]
    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub(crate) fn set_settings(&mut self, settings: ModelSettings) {
        self.settings = settings;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    #[inline]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[inline]
    pub fn graveyard(&self) -> &Graveyard<T> {
        &self.graveyard
    }

    pub fn position_of(&self, key: &T::Key) -> Option<usize> {
        let tolerance = self.settings.tolerance;
        self.items
            .iter()
            .position(|item| item.key().key_eq(key, tolerance))
    }

    #[inline]
    pub fn contains(&self, key: &T::Key) -> bool {
        self.position_of(key).is_some()
    }

    pub fn get_by_property(&self, key: &T::Key) -> Option<&T> {
        self.position_of(key).map(|index| &self.items[index])
    }

    /// 按主图元查找。
    pub fn get_by_entity(&self, entity: EntityId) -> Option<&T> {
        self.items
            .iter()
            .find(|item| item.binding().entity() == Some(entity))
    }

    /// 按辅助图元查找所属对象。
    pub fn owner_of_label(&self, label: EntityId) -> Option<&T> {
        self.items
            .iter()
            .find(|item| item.binding().labels().contains(&label))
    }

    /// 添加对象。退化对象或已存在同键对象时拒绝且不产生副作用。
    ///
    /// `raise_events` 为真时请求宿主创建图元，`sort` 为真时添加后重新排序编号。
    pub fn add(&mut self, mut item: T, raise_events: bool, sort: bool) -> Change {
        let tolerance = self.settings.tolerance;
        if item.is_degenerate(tolerance) {
            debug!(kind = ?T::KIND, key = ?item.key(), "忽略退化对象");
            return Change::rejected();
        }
        if self.contains(item.key()) {
            debug!(kind = ?T::KIND, key = ?item.key(), "同键对象已存在");
            return Change::rejected();
        }
        self.graveyard.exhume(item.key(), tolerance);

        let mut effects = Effects::new();
        if raise_events {
            effects.push(self.request_primitive(&mut item));
        }
        self.items.push(item);
        if sort {
            self.sort();
        }
        Change::applied(effects)
    }

    pub fn add_range<I>(&mut self, items: I, raise_events: bool, sort: bool) -> Change
    where
        I: IntoIterator<Item = T>,
    {
        let mut change = Change::rejected();
        for item in items {
            change.merge(self.add(item, raise_events, false));
        }
        if sort && change.applied {
            self.sort();
        }
        change
    }

    /// 删除同键对象。`raise_events` 为真时请求删除主图元与辅助图元，
    /// 已绑定的对象移入墓地，等待宿主确认删除。
    pub fn remove(&mut self, key: &T::Key, raise_events: bool, sort: bool) -> Change {
        let Some(index) = self.position_of(key) else {
            return Change::rejected();
        };
        let item = self.items.remove(index);
        let mut effects = Effects::new();
        if raise_events {
            effects.extend(
                item.binding()
                    .entities()
                    .into_iter()
                    .map(|entity| Effect::Erase {
                        kind: T::KIND,
                        entity,
                    }),
            );
            if item.binding().entity().is_some() {
                self.graveyard.bury(item);
            }
        }
        if sort {
            self.sort();
        }
        Change::applied(effects)
    }

    pub fn remove_range(&mut self, keys: &[T::Key], raise_events: bool, sort: bool) -> Change {
        let mut change = Change::rejected();
        for key in keys {
            change.merge(self.remove(key, raise_events, false));
        }
        if sort && change.applied {
            self.sort();
        }
        change
    }

    /// 按几何键排序并重新编号。
    pub fn sort(&mut self) {
        let tolerance = self.settings.tolerance;
        self.items
            .sort_by(|a, b| a.key().key_cmp(b.key(), tolerance));
        self.renumber();
    }

    fn renumber(&mut self) {
        for (index, item) in self.items.iter_mut().enumerate() {
            item.set_number(index + 1);
        }
    }

    /// 修改非键属性。对象已绑定时返回回写记录的副作用。
    ///
    /// 闭包不应修改几何键。
    pub fn update<F>(&mut self, key: &T::Key, edit: F) -> Change
    where
        F: FnOnce(&mut T),
    {
        let Some(index) = self.position_of(key) else {
            return Change::rejected();
        };
        edit(&mut self.items[index]);
        let item = &self.items[index];
        let mut effects = Effects::new();
        if let Some(entity) = item.binding().entity() {
            effects.push(Effect::Persist {
                kind: T::KIND,
                entity,
                records: item.records(),
            });
        }
        Change::applied(effects)
    }

    /// 宿主创建图元后凭票据回绑。找不到等待中的对象时返回 `false`。
    pub fn bind(
        &mut self,
        ticket: Ticket,
        entity: EntityId,
        labels: Vec<EntityId>,
        store: &mut dyn RecordStore,
    ) -> bool {
        let Some(item) = self
            .items
            .iter_mut()
            .find(|item| item.binding().pending() == Some(ticket))
        else {
            return false;
        };
        item.binding_mut().set_labels(labels);
        item.attach(Some(entity), store);
        true
    }

    /// 把辅助图元关联到主图元为 `owner` 的对象。
    pub fn attach_label(&mut self, owner: EntityId, label: EntityId) -> bool {
        match self
            .items
            .iter_mut()
            .find(|item| item.binding().entity() == Some(owner))
        {
            Some(item) => {
                item.binding_mut().push_label(label);
                true
            }
            None => false,
        }
    }

    /// 宿主报告图元被删除。
    ///
    /// 主图元被删：对象移出集合，其余辅助图元一并删除；辅助图元被删：只解除关联；
    /// 墓地中对象的主图元被删：删除已确认，清出墓地。
    /// 不属于本集合的图元返回未生效。
    pub fn on_erased(&mut self, entity: EntityId) -> Change {
        if self.graveyard.confirm_erased(entity) {
            debug!(kind = ?T::KIND, entity = entity.get(), "宿主确认删除，清出墓地");
            return Change::rejected();
        }
        if let Some(index) = self
            .items
            .iter()
            .position(|item| item.binding().entity() == Some(entity))
        {
            let item = self.items.remove(index);
            let mut effects = Effects::new();
            effects.extend(item.binding().labels().iter().map(|label| Effect::Erase {
                kind: T::KIND,
                entity: *label,
            }));
            debug!(kind = ?T::KIND, entity = entity.get(), key = ?item.key(), "图元被删除，移除对象");
            self.sort();
            return Change::applied(effects);
        }
        if let Some(item) = self
            .items
            .iter_mut()
            .find(|item| item.binding().labels().contains(&entity))
        {
            item.binding_mut().remove_label(entity);
            return Change::applied(Effects::new());
        }
        Change::rejected()
    }

    /// 删除全部图元并按当前设置重新创建；回绑时以内存状态覆盖记录。
    pub fn regenerate(&mut self) -> Effects {
        let mut effects = Effects::new();
        let mut items = std::mem::take(&mut self.items);
        for item in &mut items {
            effects.extend(
                item.binding()
                    .entities()
                    .into_iter()
                    .map(|entity| Effect::Erase {
                        kind: T::KIND,
                        entity,
                    }),
            );
            effects.push(self.request_primitive(item));
        }
        self.items = items;
        effects
    }

    fn request_primitive(&mut self, item: &mut T) -> Effect {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        item.binding_mut().set_pending(ticket);
        Effect::Create {
            kind: T::KIND,
            ticket,
            request: item.create_primitive(&self.settings),
        }
    }
}
