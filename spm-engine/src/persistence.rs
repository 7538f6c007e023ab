//! 持久化对象基础：把领域对象绑定到唯一的图元和它的扩展字典。
//!
//! 状态机为 `Unbound -> Attaching -> Bound`：
//!
//! - 首次绑定（尚无字典句柄）先尝试读取记录，读不到才用内存状态初始化；
//! - 重新绑定（图元被重建）一律以内存状态覆盖写入。

use spm_core::document::{EntityId, RecordHandle};
use tracing::{debug, warn};

use crate::host::RecordStore;
use crate::records::{LoadStatus, Record, RecordSource};

/// 集合发出创建请求时分配的票据，宿主创建图元后凭票据回绑。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindState {
    Unbound,
    Attaching,
    Bound,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Binding {
    entity: Option<EntityId>,
    dictionary: Option<RecordHandle>,
    labels: Vec<EntityId>,
    pending: Option<Ticket>,
}

impl Binding {
    #[inline]
    pub fn entity(&self) -> Option<EntityId> {
        self.entity
    }

    #[inline]
    pub fn dictionary(&self) -> Option<RecordHandle> {
        self.dictionary
    }

    /// 辅助图元（例如力的标注文字）。
    #[inline]
    pub fn labels(&self) -> &[EntityId] {
        &self.labels
    }

    #[inline]
    pub fn pending(&self) -> Option<Ticket> {
        self.pending
    }

    pub fn state(&self) -> BindState {
        if self.pending.is_some() {
            BindState::Attaching
        } else if self.entity.is_some() {
            BindState::Bound
        } else {
            BindState::Unbound
        }
    }

    /// 主图元与辅助图元的全部 ID。
    pub fn entities(&self) -> Vec<EntityId> {
        self.entity.iter().chain(self.labels.iter()).copied().collect()
    }

    pub(crate) fn set_pending(&mut self, ticket: Ticket) {
        self.pending = Some(ticket);
    }

    pub(crate) fn set_labels(&mut self, labels: Vec<EntityId>) {
        self.labels = labels;
    }

    pub(crate) fn push_label(&mut self, label: EntityId) {
        if !self.labels.contains(&label) {
            self.labels.push(label);
        }
    }

    pub(crate) fn remove_label(&mut self, label: EntityId) -> bool {
        let before = self.labels.len();
        self.labels.retain(|id| *id != label);
        before != self.labels.len()
    }
}

/// 所有领域对象共享的持久化生命周期。
pub trait Persistent {
    fn binding(&self) -> &Binding;

    fn binding_mut(&mut self) -> &mut Binding;

    /// 内存状态对应的全部记录。
    fn records(&self) -> Vec<Record>;

    /// 从扩展字典恢复字段。
    fn load_records(&mut self, source: &RecordSource<'_>) -> LoadStatus;

    /// 绑定到图元。`None` 时不做任何事。
    fn attach(&mut self, entity: Option<EntityId>, store: &mut dyn RecordStore) {
        let Some(entity) = entity else {
            return;
        };
        let first_attach = self.binding().dictionary.is_none();
        {
            let binding = self.binding_mut();
            binding.entity = Some(entity);
            binding.pending = None;
        }

        if !first_attach {
            self.set_properties(store);
            return;
        }
        match self.get_properties(store) {
            LoadStatus::Loaded => {}
            LoadStatus::Missing => self.set_properties(store),
            LoadStatus::Repaired => {
                warn!(entity = entity.get(), "记录不完整，已使用默认值补齐并回写");
                self.set_properties(store);
            }
        }
    }

    /// 读取全部记录。字典不存在时返回 [`LoadStatus::Missing`]。
    fn get_properties(&mut self, store: &mut dyn RecordStore) -> LoadStatus {
        let Some(entity) = self.binding().entity else {
            return LoadStatus::Missing;
        };
        let Some(handle) = store.handle_of(entity) else {
            return LoadStatus::Missing;
        };
        self.binding_mut().dictionary = Some(handle);
        let source = RecordSource::new(&*store, handle);
        self.load_records(&source)
    }

    /// 以内存状态覆盖写入全部记录。
    fn set_properties(&mut self, store: &mut dyn RecordStore) {
        let records = self.records();
        for record in &records {
            self.persist_record(store, record);
        }
    }

    /// 只写入单条命名记录。
    fn set_record(&mut self, store: &mut dyn RecordStore, name: &str) {
        if let Some(record) = self.records().into_iter().find(|record| record.name == name) {
            self.persist_record(store, &record);
        }
    }

    fn persist_record(&mut self, store: &mut dyn RecordStore, record: &Record) {
        let Some(entity) = self.binding().entity else {
            return;
        };
        match store.write(entity, record.name, &record.values, true) {
            Some(handle) => self.binding_mut().dictionary = Some(handle),
            None => debug!(entity = entity.get(), record = record.name, "图元已失效，跳过写入"),
        }
    }
}
