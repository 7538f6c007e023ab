//! 记录存储适配层：固定布局、无版本的有序元组。
//!
//! | 记录        | 布局 |
//! |-------------|------|
//! | `Support`   | `[direction:int]` |
//! | `Force`     | `[magnitude:real, direction:int]` |
//! | `Owner`     | `[force:handle]`（力标注文字） |
//! | `Stringer`  | `[width, height, barCount:int, barDiameter, steelYield, steelModulus]` |
//! | `Panel`     | `[width, barDiameterX, spacingX, yieldX, modulusX, barDiameterY, spacingY, yieldY, modulusY]` |
//!
//! 缺失或类型不符的字段取默认值；多出的尾部字段忽略。

use spm_core::document::{RecordHandle, TypedValue};

use crate::host::RecordStore;

pub const SUPPORT_RECORD: &str = "Support";
pub const FORCE_RECORD: &str = "Force";
pub const OWNER_RECORD: &str = "Owner";
pub const STRINGER_RECORD: &str = "Stringer";
pub const PANEL_RECORD: &str = "Panel";

/// 一条待写入的命名记录。
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: &'static str,
    pub values: Vec<TypedValue>,
}

impl Record {
    pub fn new(name: &'static str, values: Vec<TypedValue>) -> Self {
        Self { name, values }
    }
}

/// 读取记录的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// 记录完整读取。
    Loaded,
    /// 尚未持久化，需要初始化。
    Missing,
    /// 记录存在但字段缺失或类型不符，已用默认值补齐，需要回写。
    Repaired,
}

/// 指向某个扩展字典的只读视图。
pub struct RecordSource<'a> {
    store: &'a dyn RecordStore,
    handle: RecordHandle,
}

impl<'a> RecordSource<'a> {
    pub fn new(store: &'a dyn RecordStore, handle: RecordHandle) -> Self {
        Self { store, handle }
    }

    #[inline]
    pub fn handle(&self) -> RecordHandle {
        self.handle
    }

    pub fn read(&self, name: &str) -> Option<Vec<TypedValue>> {
        self.store.read(self.handle, name)
    }
}

/// 按位置顺序解码记录字段，遇到缺失或类型不符时取默认值并标记修复。
pub struct RecordReader<'a> {
    values: &'a [TypedValue],
    cursor: usize,
    repaired: bool,
}

impl<'a> RecordReader<'a> {
    pub fn new(values: &'a [TypedValue]) -> Self {
        Self {
            values,
            cursor: 0,
            repaired: false,
        }
    }

    pub fn real(&mut self, default: f64) -> f64 {
        let value = self.next().and_then(TypedValue::as_real);
        self.or_default(value, default)
    }

    pub fn integer(&mut self, default: i32) -> i32 {
        let value = self.next().and_then(TypedValue::as_integer);
        self.or_default(value, default)
    }

    pub fn handle(&mut self) -> Option<u64> {
        let value = self.next().and_then(TypedValue::as_handle);
        if value.is_none() {
            self.repaired = true;
        }
        value
    }

    /// 标记当前记录需要修复（例如枚举编码越界）。
    pub fn mark_repaired(&mut self) {
        self.repaired = true;
    }

    pub fn status(&self) -> LoadStatus {
        if self.repaired {
            LoadStatus::Repaired
        } else {
            LoadStatus::Loaded
        }
    }

    fn next(&mut self) -> Option<&'a TypedValue> {
        let value = self.values.get(self.cursor);
        self.cursor += 1;
        value
    }

    fn or_default<T>(&mut self, value: Option<T>, default: T) -> T {
        match value {
            Some(value) => value,
            None => {
                self.repaired = true;
                default
            }
        }
    }
}
