//! 图元工厂：领域对象 ↔ 图元。

use spm_core::document::{Entity, EntityId};

use crate::conditions::{ConstraintObject, ForceObject};
use crate::effects::{ObjectKind, PrimitiveRequest};
use crate::host::RecordStore;
use crate::model::ModelSettings;
use crate::structural::{NodeObject, PanelObject, StringerObject};

pub mod layers {
    pub const EXTERNAL_NODE: &str = "ExtNode";
    pub const INTERNAL_NODE: &str = "IntNode";
    pub const STRINGER: &str = "Stringer";
    pub const PANEL: &str = "Panel";
    pub const SUPPORT: &str = "Support";
    pub const FORCE: &str = "Force";
    pub const FORCE_TEXT: &str = "ForceText";
}

pub mod blocks {
    pub const SUPPORT_X: &str = "SupportX";
    pub const SUPPORT_Y: &str = "SupportY";
    pub const SUPPORT_XY: &str = "SupportXY";
    pub const FORCE_ARROW: &str = "ForceArrow";
}

pub trait EntityFactory: Sized {
    /// 由当前状态生成图元（仅几何与样式，不含持久化属性）。
    fn create_primitive(&self, settings: &ModelSettings) -> PrimitiveRequest;

    /// 从已有图元重建对象。几何键取自图元本身，持久化属性经 `attach` 读取；
    /// 图层或图元类型不匹配时返回 `None`。
    fn reconstruct(
        entity: EntityId,
        primitive: &Entity,
        store: &mut dyn RecordStore,
        settings: &ModelSettings,
    ) -> Option<Self>;
}

/// 模型中全部对象种类的封闭集合。
#[derive(Debug, Clone)]
pub enum ModelObject {
    Node(NodeObject),
    Stringer(StringerObject),
    Panel(PanelObject),
    Support(ConstraintObject),
    Force(ForceObject),
}

impl ModelObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ModelObject::Node(_) => ObjectKind::Node,
            ModelObject::Stringer(_) => ObjectKind::Stringer,
            ModelObject::Panel(_) => ObjectKind::Panel,
            ModelObject::Support(_) => ObjectKind::Support,
            ModelObject::Force(_) => ObjectKind::Force,
        }
    }

    /// 按图层分派到具体类型的重建逻辑。
    pub fn reconstruct(
        entity: EntityId,
        primitive: &Entity,
        store: &mut dyn RecordStore,
        settings: &ModelSettings,
    ) -> Option<Self> {
        match primitive.layer_name() {
            layers::EXTERNAL_NODE | layers::INTERNAL_NODE => {
                NodeObject::reconstruct(entity, primitive, store, settings).map(ModelObject::Node)
            }
            layers::STRINGER => StringerObject::reconstruct(entity, primitive, store, settings)
                .map(ModelObject::Stringer),
            layers::PANEL => {
                PanelObject::reconstruct(entity, primitive, store, settings).map(ModelObject::Panel)
            }
            layers::SUPPORT => ConstraintObject::reconstruct(entity, primitive, store, settings)
                .map(ModelObject::Support),
            layers::FORCE => {
                ForceObject::reconstruct(entity, primitive, store, settings).map(ModelObject::Force)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use spm_core::document::Document;
    use spm_core::geometry::Point2;

    use super::*;

    #[test]
    fn unknown_layers_are_not_reconstructed() {
        let mut doc = Document::new();
        let id = doc.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "Sketch");
        let primitive = doc.entity(id).cloned().unwrap();
        let settings = ModelSettings::default();
        assert!(ModelObject::reconstruct(id, &primitive, &mut doc, &settings).is_none());
    }

    #[test]
    fn layer_selects_object_kind() {
        let mut doc = Document::new();
        let id = doc.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), layers::STRINGER);
        let primitive = doc.entity(id).cloned().unwrap();
        let settings = ModelSettings::default();
        let object = ModelObject::reconstruct(id, &primitive, &mut doc, &settings)
            .expect("stringer layer should reconstruct");
        assert_eq!(object.kind(), ObjectKind::Stringer);

        // a point on the stringer layer is not a stringer
        let stray = doc.add_point(Point2::new(5.0, 5.0), layers::STRINGER);
        let primitive = doc.entity(stray).cloned().unwrap();
        assert!(ModelObject::reconstruct(stray, &primitive, &mut doc, &settings).is_none());
    }
}
