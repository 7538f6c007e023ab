//! 宿主接口：引擎只通过这两个 trait 访问图元和记录存储。

use spm_core::document::{Document, DocumentEvent, Entity, EntityId, RecordHandle, TypedValue};

/// 宿主报告的外部变更（删除、撤销恢复）。
pub type HostEvent = DocumentEvent;

/// 图元的创建、删除与查询。
pub trait PrimitiveHost {
    fn create(&mut self, primitive: Entity) -> EntityId;

    /// 删除图元；图元已不存在时返回 `false`。
    fn erase(&mut self, entity: EntityId) -> bool;

    /// 删除图元但不记录撤销，也不产生通知。
    fn discard(&mut self, entity: EntityId) -> bool;

    fn primitive(&self, entity: EntityId) -> Option<&Entity>;

    fn primitives(&self) -> Vec<(EntityId, Entity)>;

    /// 取走排队中的删除/恢复通知。
    fn drain_events(&mut self) -> Vec<HostEvent>;
}

/// 附着在图元上的键值记录存储。
///
/// 所有操作遇到失效的图元都退化为 `None`/`false`，从不报错。
pub trait RecordStore {
    fn write(
        &mut self,
        entity: EntityId,
        name: &str,
        values: &[TypedValue],
        overwrite: bool,
    ) -> Option<RecordHandle>;

    fn read(&self, handle: RecordHandle, name: &str) -> Option<Vec<TypedValue>>;

    fn handle_of(&self, entity: EntityId) -> Option<RecordHandle>;

    /// 写入文档级命名记录，`overwrite = false` 且已存在时返回 `false`。
    fn write_named(&mut self, name: &str, values: &[TypedValue], overwrite: bool) -> bool;

    fn named_records(&self) -> Vec<(String, Vec<TypedValue>)>;
}

pub trait Host: PrimitiveHost + RecordStore {}

impl<T: PrimitiveHost + RecordStore> Host for T {}

impl PrimitiveHost for Document {
    fn create(&mut self, primitive: Entity) -> EntityId {
        self.add_entity(primitive)
    }

    fn erase(&mut self, entity: EntityId) -> bool {
        Document::erase(self, entity)
    }

    fn discard(&mut self, entity: EntityId) -> bool {
        Document::discard(self, entity)
    }

    fn primitive(&self, entity: EntityId) -> Option<&Entity> {
        self.entity(entity)
    }

    fn primitives(&self) -> Vec<(EntityId, Entity)> {
        self.entities().cloned().collect()
    }

    fn drain_events(&mut self) -> Vec<HostEvent> {
        Document::drain_events(self)
    }
}

impl RecordStore for Document {
    fn write(
        &mut self,
        entity: EntityId,
        name: &str,
        values: &[TypedValue],
        overwrite: bool,
    ) -> Option<RecordHandle> {
        self.write_record(entity, name, values, overwrite)
    }

    fn read(&self, handle: RecordHandle, name: &str) -> Option<Vec<TypedValue>> {
        self.read_record(handle, name).map(<[TypedValue]>::to_vec)
    }

    fn handle_of(&self, entity: EntityId) -> Option<RecordHandle> {
        self.dictionary_handle(entity)
    }

    fn write_named(&mut self, name: &str, values: &[TypedValue], overwrite: bool) -> bool {
        Document::write_named(self, name, values, overwrite)
    }

    fn named_records(&self) -> Vec<(String, Vec<TypedValue>)> {
        Document::named_records(self)
            .map(|(name, values)| (name.clone(), values.clone()))
            .collect()
    }
}
