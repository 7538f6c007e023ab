//! 集合变更产生的副作用清单，由宿主集成层（[`crate::session::Session`]）执行。

use spm_core::document::{Entity, EntityId};

use crate::persistence::Ticket;
use crate::records::Record;

/// 领域对象的种类，同时决定由哪个集合回绑图元。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Node,
    Stringer,
    Panel,
    Support,
    Force,
}

/// 创建图元的请求：主图元加若干辅助图元（标注文字等）。
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveRequest {
    pub primitive: Entity,
    pub labels: Vec<Entity>,
}

impl PrimitiveRequest {
    pub fn single(primitive: Entity) -> Self {
        Self {
            primitive,
            labels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Create {
        kind: ObjectKind,
        ticket: Ticket,
        request: PrimitiveRequest,
    },
    Erase {
        kind: ObjectKind,
        entity: EntityId,
    },
    /// 删除且不进入宿主撤销栈，用于丢弃撤销恢复出的重复图元。
    Discard {
        kind: ObjectKind,
        entity: EntityId,
    },
    Persist {
        kind: ObjectKind,
        entity: EntityId,
        records: Vec<Record>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Effects(Vec<Effect>);

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, effect: Effect) {
        self.0.push(effect);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.0.iter()
    }

    /// 本批副作用中将要删除的图元。
    pub fn erased(&self) -> Vec<EntityId> {
        self.0
            .iter()
            .filter_map(|effect| match effect {
                Effect::Erase { entity, .. } | Effect::Discard { entity, .. } => Some(*entity),
                _ => None,
            })
            .collect()
    }

    pub fn creations(&self) -> usize {
        self.0
            .iter()
            .filter(|effect| matches!(effect, Effect::Create { .. }))
            .count()
    }
}

impl Extend<Effect> for Effects {
    fn extend<I: IntoIterator<Item = Effect>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Effects {
    type Item = Effect;
    type IntoIter = std::vec::IntoIter<Effect>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// 一次集合操作的结果：是否生效以及需要执行的副作用。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Change {
    pub applied: bool,
    pub effects: Effects,
}

impl Change {
    pub fn rejected() -> Self {
        Self::default()
    }

    pub fn applied(effects: Effects) -> Self {
        Self {
            applied: true,
            effects,
        }
    }

    /// 合并另一次变更：任一生效即视为生效。
    pub fn merge(&mut self, other: Change) {
        self.applied |= other.applied;
        self.effects.extend(other.effects);
    }

    pub fn and(mut self, other: Change) -> Self {
        self.merge(other);
        self
    }
}
