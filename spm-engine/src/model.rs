//! 模型上下文：持有全部集合，负责跨集合的一致性（节点同步、编号、单元导出）。

use spm_core::document::{Entity, EntityId, TypedValue};
use spm_core::geometry::{DEFAULT_TOLERANCE, Point2, Quad, Segment};
use spm_core::units::UnitSettings;
use tracing::{debug, warn};

use crate::collection::{SpmObject, SyncCollection};
use crate::conditions::{Axis, ConditionCollection, Constraint, ConstraintObject, ForceObject, PlaneForce};
use crate::effects::{Change, Effect, Effects, ObjectKind};
use crate::factory::{ModelObject, layers};
use crate::host::RecordStore;
use crate::persistence::Ticket;
use crate::records::OWNER_RECORD;
use crate::structural::{
    NodeElement, NodeObject, NodeType, PanelElement, PanelObject, StringerElement, StringerObject,
    Structural,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSettings {
    /// 几何判等容差（图形单位）。
    pub tolerance: f64,
    pub units: UnitSettings,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            units: UnitSettings::default(),
        }
    }
}

/// 按编号排列的全部分析单元。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelElements {
    pub nodes: Vec<NodeElement>,
    pub stringers: Vec<StringerElement>,
    pub panels: Vec<PanelElement>,
}

#[derive(Debug, Clone)]
pub struct Model {
    settings: ModelSettings,
    nodes: SyncCollection<NodeObject>,
    stringers: SyncCollection<StringerObject>,
    panels: SyncCollection<PanelObject>,
    constraints: ConditionCollection<ConstraintObject>,
    forces: ConditionCollection<ForceObject>,
    /// 已恢复但所属力尚未恢复的标注文字。
    detached_labels: Vec<EntityId>,
}

impl Default for Model {
    fn default() -> Self {
        Self::new(ModelSettings::default())
    }
}

impl Model {
    pub fn new(settings: ModelSettings) -> Self {
        Self {
            settings,
            nodes: SyncCollection::new(settings),
            stringers: SyncCollection::new(settings),
            panels: SyncCollection::new(settings),
            constraints: ConditionCollection::new(settings),
            forces: ConditionCollection::new(settings),
            detached_labels: Vec::new(),
        }
    }

    #[inline]
    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// 更新设置。已有图元不会自动更新，需要随后调用 [`Model::regenerate`]。
    pub fn set_settings(&mut self, settings: ModelSettings) {
        self.settings = settings;
        self.nodes.set_settings(settings);
        self.stringers.set_settings(settings);
        self.panels.set_settings(settings);
        self.constraints.set_settings(settings);
        self.forces.set_settings(settings);
    }

    #[inline]
    pub fn nodes(&self) -> &SyncCollection<NodeObject> {
        &self.nodes
    }

    #[inline]
    pub fn stringers(&self) -> &SyncCollection<StringerObject> {
        &self.stringers
    }

    #[inline]
    pub fn panels(&self) -> &SyncCollection<PanelObject> {
        &self.panels
    }

    #[inline]
    pub fn constraints(&self) -> &ConditionCollection<ConstraintObject> {
        &self.constraints
    }

    #[inline]
    pub fn forces(&self) -> &ConditionCollection<ForceObject> {
        &self.forces
    }

    #[inline]
    pub fn detached_labels(&self) -> &[EntityId] {
        &self.detached_labels
    }

    pub fn add_stringer(&mut self, stringer: StringerObject) -> Change {
        let change = self.stringers.add(stringer, true, true);
        self.with_nodes(change)
    }

    pub fn add_stringers<I>(&mut self, stringers: I) -> Change
    where
        I: IntoIterator<Item = StringerObject>,
    {
        let change = self.stringers.add_range(stringers, true, true);
        self.with_nodes(change)
    }

    pub fn remove_stringer(&mut self, geometry: &Segment) -> Change {
        let change = self.stringers.remove(geometry, true, true);
        self.with_nodes(change)
    }

    pub fn add_panel(&mut self, panel: PanelObject) -> Change {
        let change = self.panels.add(panel, true, true);
        self.with_nodes(change)
    }

    pub fn add_panels<I>(&mut self, panels: I) -> Change
    where
        I: IntoIterator<Item = PanelObject>,
    {
        let change = self.panels.add_range(panels, true, true);
        self.with_nodes(change)
    }

    pub fn remove_panel(&mut self, geometry: &Quad) -> Change {
        let change = self.panels.remove(geometry, true, true);
        self.with_nodes(change)
    }

    /// 把桁条等分为 `count` 段。`count < 2`、桁条不存在或分段短于容差时不做任何事。
    pub fn divide_stringer(&mut self, geometry: &Segment, count: usize) -> Change {
        if count < 2 {
            return Change::rejected();
        }
        let Some(source) = self.stringers.get_by_property(geometry).cloned() else {
            return Change::rejected();
        };
        if source.geometry().length() / count as f64 <= self.settings.tolerance {
            warn!(number = source.number(), count, "分段长度小于容差，拒绝划分桁条");
            return Change::rejected();
        }
        let pieces = source.divide(count);
        let change = self
            .stringers
            .remove(geometry, true, false)
            .and(self.stringers.add_range(pieces, true, true));
        self.with_nodes(change)
    }

    /// 把矩形面板划分为 `rows × cols` 块；非矩形面板或子块边长短于容差时保持不变。
    pub fn divide_panel(&mut self, geometry: &Quad, rows: usize, cols: usize) -> Change {
        if rows.checked_mul(cols).is_none_or(|pieces| pieces < 2) {
            return Change::rejected();
        }
        let tolerance = self.settings.tolerance;
        let Some(source) = self.panels.get_by_property(geometry).cloned() else {
            return Change::rejected();
        };
        if !source.geometry().is_rectangular(tolerance) {
            warn!(number = source.number(), "面板不是矩形，无法划分");
            return Change::rejected();
        }
        let [v0, v1, _, v3] = source.geometry().vertices();
        if v0.distance_to(v1) / cols as f64 <= tolerance
            || v0.distance_to(v3) / rows as f64 <= tolerance
        {
            warn!(number = source.number(), rows, cols, "子块边长小于容差，拒绝划分面板");
            return Change::rejected();
        }
        let pieces = source.divide(rows, cols, tolerance);
        let change = self
            .panels
            .remove(geometry, true, false)
            .and(self.panels.add_range(pieces, true, true));
        self.with_nodes(change)
    }

    pub fn update_stringer<F>(&mut self, geometry: &Segment, edit: F) -> Change
    where
        F: FnOnce(&mut StringerObject),
    {
        self.stringers.update(geometry, edit)
    }

    pub fn update_panel<F>(&mut self, geometry: &Quad, edit: F) -> Change
    where
        F: FnOnce(&mut PanelObject),
    {
        self.panels.update(geometry, edit)
    }

    pub fn change_constraint(&mut self, position: Point2, value: Constraint) -> Change {
        self.constraints.change_condition(position, &value)
    }

    pub fn change_constraints(&mut self, positions: &[Point2], value: Constraint) -> Change {
        self.constraints.change_conditions(positions, &value)
    }

    pub fn change_force(&mut self, position: Point2, value: PlaneForce) -> Change {
        self.forces.change_condition(position, &value)
    }

    pub fn change_forces(&mut self, positions: &[Point2], value: PlaneForce) -> Change {
        self.forces.change_conditions(positions, &value)
    }

    pub fn remove_force_component(&mut self, position: Point2, axis: Axis) -> Change {
        self.forces.remove_component(position, axis)
    }

    /// 让节点集合与桁条、面板的控制点保持一致。
    ///
    /// 桁条端点为外节点，桁条中点与面板边中点为内节点；重合时外节点优先。
    /// 多余或类型不符的节点被删除，缺失的节点被创建。
    pub fn sync_nodes(&mut self) -> Change {
        let tolerance = self.settings.tolerance;
        let required = self.required_nodes();

        let stale: Vec<Point2> = self
            .nodes
            .iter()
            .filter(|node| {
                !required.iter().any(|(position, kind)| {
                    *kind == node.kind() && position.approx_eq(node.position(), tolerance)
                })
            })
            .map(|node| node.position())
            .collect();
        let mut change = self.nodes.remove_range(&stale, true, false);

        let missing: Vec<NodeObject> = required
            .iter()
            .filter(|(position, _)| !self.nodes.contains(position))
            .map(|(position, kind)| NodeObject::new(*position, *kind))
            .collect();
        change.merge(self.nodes.add_range(missing, true, false));

        if change.applied {
            self.nodes.sort();
            debug!(
                removed = stale.len(),
                total = self.nodes.len(),
                "节点已同步"
            );
        }
        change
    }

    fn required_nodes(&self) -> Vec<(Point2, NodeType)> {
        let tolerance = self.settings.tolerance;
        let grips = self
            .stringers
            .iter()
            .flat_map(Structural::grips)
            .chain(self.panels.iter().flat_map(Structural::grips));

        let mut required: Vec<(Point2, NodeType)> = Vec::new();
        for (position, kind) in grips {
            match required
                .iter_mut()
                .find(|(existing, _)| existing.approx_eq(position, tolerance))
            {
                Some(entry) => {
                    if kind == NodeType::External {
                        entry.1 = NodeType::External;
                    }
                }
                None => required.push((position, kind)),
            }
        }
        required
    }

    fn with_nodes(&mut self, change: Change) -> Change {
        if change.applied {
            change.and(self.sync_nodes())
        } else {
            change
        }
    }

    /// 把宿主新建的图元回绑到等待中的对象。
    pub fn bind(
        &mut self,
        kind: ObjectKind,
        ticket: Ticket,
        entity: EntityId,
        labels: Vec<EntityId>,
        store: &mut dyn RecordStore,
    ) -> bool {
        match kind {
            ObjectKind::Node => self.nodes.bind(ticket, entity, labels, store),
            ObjectKind::Stringer => self.stringers.bind(ticket, entity, labels, store),
            ObjectKind::Panel => self.panels.bind(ticket, entity, labels, store),
            ObjectKind::Support => self.constraints.bind(ticket, entity, labels, store),
            ObjectKind::Force => self.forces.bind(ticket, entity, labels, store),
        }
    }

    pub(crate) fn insert(&mut self, object: ModelObject, raise_events: bool, sort: bool) -> Change {
        match object {
            ModelObject::Node(node) => self.nodes.add(node, raise_events, sort),
            ModelObject::Stringer(stringer) => self.stringers.add(stringer, raise_events, sort),
            ModelObject::Panel(panel) => self.panels.add(panel, raise_events, sort),
            ModelObject::Support(support) => self.constraints.add(support, raise_events, sort),
            ModelObject::Force(force) => self.forces.add(force, raise_events, sort),
        }
    }

    pub(crate) fn sort_all(&mut self) {
        self.nodes.sort();
        self.stringers.sort();
        self.panels.sort();
        self.constraints.sort();
        self.forces.sort();
    }

    /// 按 `Owner` 记录把标注文字关联回所属的力。
    pub(crate) fn relink_label(&mut self, label: EntityId, store: &dyn RecordStore) -> bool {
        let owner = store
            .handle_of(label)
            .and_then(|handle| store.read(handle, OWNER_RECORD))
            .and_then(|values| values.first().and_then(TypedValue::as_handle));
        match owner {
            Some(owner) => self.forces.attach_label(EntityId::new(owner), label),
            None => false,
        }
    }

    fn relink_detached(&mut self, store: &dyn RecordStore) {
        let detached = std::mem::take(&mut self.detached_labels);
        for label in detached {
            if !self.relink_label(label, store) {
                self.detached_labels.push(label);
            }
        }
    }

    /// 宿主删除了图元。
    pub fn on_erased(&mut self, entity: EntityId) -> Change {
        if let Some(index) = self.detached_labels.iter().position(|id| *id == entity) {
            self.detached_labels.remove(index);
            return Change::applied(Effects::new());
        }
        let change = self.stringers.on_erased(entity);
        if change.applied {
            return self.with_nodes(change);
        }
        let change = self.panels.on_erased(entity);
        if change.applied {
            return self.with_nodes(change);
        }
        let change = self.forces.on_erased(entity);
        if change.applied {
            return change;
        }
        let change = self.constraints.on_erased(entity);
        if change.applied {
            return change;
        }
        let change = self.nodes.on_erased(entity);
        self.with_nodes(change)
    }

    /// 宿主通过撤销恢复了图元。
    ///
    /// 可识别的图元重建为对象并静默加入集合；与现有对象重复时删除恢复的图元。
    pub fn on_restored(
        &mut self,
        entity: EntityId,
        primitive: &Entity,
        store: &mut dyn RecordStore,
    ) -> Change {
        if primitive.layer_name() == layers::FORCE_TEXT {
            if !self.relink_label(entity, store) {
                self.detached_labels.push(entity);
            }
            return Change::applied(Effects::new());
        }
        let Some(object) = ModelObject::reconstruct(entity, primitive, store, &self.settings) else {
            return Change::rejected();
        };
        let kind = object.kind();
        let change = self.insert(object, false, true);
        if !change.applied {
            warn!(?kind, entity = entity.get(), "恢复的图元与现有对象重复，已删除");
            let mut effects = Effects::new();
            effects.push(Effect::Discard { kind, entity });
            return Change::applied(effects);
        }
        match kind {
            ObjectKind::Stringer | ObjectKind::Panel => self.with_nodes(change),
            ObjectKind::Force => {
                self.relink_detached(store);
                change
            }
            ObjectKind::Node => self.with_nodes(change),
            ObjectKind::Support => change,
        }
    }

    /// 按当前设置重建全部图元。
    pub fn regenerate(&mut self) -> Effects {
        let mut effects = self.nodes.regenerate();
        effects.extend(self.stringers.regenerate());
        effects.extend(self.panels.regenerate());
        effects.extend(self.constraints.regenerate());
        effects.extend(self.forces.regenerate());
        effects
    }

    pub fn elements(&self) -> ModelElements {
        ModelElements {
            nodes: self.collect_elements(&self.nodes),
            stringers: self.collect_elements(&self.stringers),
            panels: self.collect_elements(&self.panels),
        }
    }

    fn collect_elements<T: Structural>(&self, collection: &SyncCollection<T>) -> Vec<T::Element> {
        collection
            .iter()
            .filter_map(|item| match item.element(self) {
                Ok(element) => Some(element),
                Err(err) => {
                    warn!(kind = ?T::KIND, number = item.number(), error = %err, "跳过无法导出的单元");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::CrossSection;
    use crate::errors::EngineError;

    fn stringer(ax: f64, ay: f64, bx: f64, by: f64) -> StringerObject {
        StringerObject::new(
            Point2::new(ax, ay),
            Point2::new(bx, by),
            CrossSection::default(),
        )
    }

    fn square(size: f64) -> PanelObject {
        PanelObject::new([
            Point2::new(0.0, 0.0),
            Point2::new(size, 0.0),
            Point2::new(size, size),
            Point2::new(0.0, size),
        ])
    }

    fn kinds(model: &Model) -> (usize, usize) {
        let external = model
            .nodes()
            .iter()
            .filter(|node| node.kind() == NodeType::External)
            .count();
        (external, model.nodes().len() - external)
    }

    #[test]
    fn stringer_creates_three_nodes() {
        let mut model = Model::default();
        let change = model.add_stringer(stringer(0.0, 0.0, 100.0, 0.0));
        assert!(change.applied);
        // stringer + three nodes
        assert_eq!(change.effects.creations(), 4);
        assert_eq!(kinds(&model), (2, 1));
    }

    #[test]
    fn adjacent_stringers_share_end_nodes() {
        let mut model = Model::default();
        model.add_stringers([
            stringer(0.0, 0.0, 100.0, 0.0),
            stringer(100.0, 0.0, 200.0, 0.0),
        ]);
        assert_eq!(kinds(&model), (3, 2));
        let numbers: Vec<usize> = model.nodes().iter().map(|node| node.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn reversed_duplicate_stringer_is_ignored() {
        let mut model = Model::default();
        model.add_stringer(stringer(0.0, 0.0, 1.0, 0.0));
        let change = model.add_stringer(stringer(1.0, 0.0, 0.0, 0.0));
        assert!(!change.applied);
        assert!(change.effects.is_empty());
        assert_eq!(model.stringers().len(), 1);
    }

    #[test]
    fn panel_edge_midpoints_become_internal_nodes() {
        let mut model = Model::default();
        model.add_panel(square(200.0));
        assert_eq!(kinds(&model), (0, 4));

        // the stringer along the bottom edge shares its midpoint with the panel
        model.add_stringer(stringer(0.0, 0.0, 200.0, 0.0));
        assert_eq!(kinds(&model), (2, 4));
    }

    #[test]
    fn removing_stringer_erases_orphan_nodes() {
        let mut model = Model::default();
        model.add_stringers([
            stringer(0.0, 0.0, 100.0, 0.0),
            stringer(100.0, 0.0, 200.0, 0.0),
        ]);
        let change = model.remove_stringer(&Segment::new(
            Point2::new(100.0, 0.0),
            Point2::new(200.0, 0.0),
        ));
        assert!(change.applied);
        assert_eq!(kinds(&model), (2, 1));
    }

    #[test]
    fn divide_stringer_replaces_the_source() {
        let mut model = Model::default();
        model.add_stringer(stringer(0.0, 0.0, 300.0, 0.0));
        let geometry = Segment::new(Point2::new(0.0, 0.0), Point2::new(300.0, 0.0));
        assert!(model.divide_stringer(&geometry, 3).applied);
        assert_eq!(model.stringers().len(), 3);
        assert!(!model.stringers().contains(&geometry));
        assert_eq!(kinds(&model), (4, 3));
        assert!(!model.divide_stringer(&geometry, 3).applied);
    }

    #[test]
    fn divide_panel_rejects_skewed_panels() {
        let mut model = Model::default();
        let skewed = PanelObject::new([
            Point2::new(0.0, 0.0),
            Point2::new(400.0, 0.0),
            Point2::new(500.0, 200.0),
            Point2::new(0.0, 200.0),
        ]);
        let geometry = *skewed.geometry();
        model.add_panel(skewed);
        let change = model.divide_panel(&geometry, 2, 2);
        assert!(!change.applied);
        assert!(change.effects.is_empty());
        assert_eq!(model.panels().len(), 1);
    }

    #[test]
    fn divide_panel_splits_rectangles() {
        let mut model = Model::default();
        let panel = square(200.0);
        let geometry = *panel.geometry();
        model.add_panel(panel);
        assert!(model.divide_panel(&geometry, 2, 2).applied);
        assert_eq!(model.panels().len(), 4);
        // 4 outer edges split in two plus 4 inner half-edges
        assert_eq!(model.nodes().len(), 12);
    }

    #[test]
    fn elements_reference_node_numbers() {
        let mut model = Model::default();
        model.add_stringer(stringer(0.0, 0.0, 100.0, 0.0));
        model.change_constraint(Point2::new(0.0, 0.0), Constraint::Fixed);
        model.change_force(Point2::new(100.0, 0.0), PlaneForce::new(0.0, -1000.0));

        let elements = model.elements();
        assert_eq!(elements.stringers.len(), 1);
        assert_eq!(elements.stringers[0].grips, [1, 2, 3]);
        assert!((elements.stringers[0].length.millimeters() - 100.0).abs() < 1e-9);
        assert_eq!(elements.nodes[0].constraint, Constraint::Fixed);
        assert_eq!(elements.nodes[2].force, PlaneForce::new(0.0, -1000.0));
        assert_eq!(elements.nodes[1].constraint, Constraint::Free);
    }

    #[test]
    fn missing_node_is_reported() {
        let mut model = Model::default();
        let lonely = stringer(0.0, 0.0, 10.0, 0.0);
        model.insert(ModelObject::Stringer(lonely.clone()), false, true);
        assert_eq!(
            lonely.element(&model),
            Err(EngineError::NodeNotFound { x: 0.0, y: 0.0 })
        );
        assert!(model.elements().stringers.is_empty());
    }
}
