//! 宿主集成层：把模型产生的副作用落到宿主上，并把宿主的删除/恢复通知回送给模型。

use spm_core::document::{EntityId, TypedValue};
use spm_core::geometry::{Point2, Quad, Segment};
use spm_core::units::{Length, UnitSettings};
use tracing::{debug, info, warn};

use crate::attributes::{CrossSection, UniaxialReinforcement, WebReinforcement};
use crate::catalog;
use crate::conditions::{Axis, Constraint, PlaneForce};
use crate::effects::{Change, Effect, Effects, ObjectKind};
use crate::factory::{ModelObject, layers};
use crate::host::{Host, HostEvent};
use crate::model::{Model, ModelElements, ModelSettings};
use crate::records::OWNER_RECORD;
use crate::structural::{PanelObject, StringerObject};

#[derive(Debug)]
pub struct Session<H: Host> {
    host: H,
    model: Model,
}

impl<H: Host> Session<H> {
    /// 以空模型接管宿主，不读取已有图元。
    pub fn new(host: H, settings: ModelSettings) -> Self {
        Self {
            host,
            model: Model::new(settings),
        }
    }

    /// 从宿主现有图元重建模型。
    ///
    /// 重建过程不触发创建；重复或退化的图元以及找不到所属力的标注文字会被删除，
    /// 缺失的节点会被补齐。
    pub fn load(host: H, settings: ModelSettings) -> Self {
        let mut session = Self::new(host, settings);
        let mut labels = Vec::new();
        let mut stale = Effects::new();

        for (entity, primitive) in session.host.primitives() {
            if primitive.layer_name() == layers::FORCE_TEXT {
                labels.push(entity);
                continue;
            }
            let Some(object) =
                ModelObject::reconstruct(entity, &primitive, &mut session.host, &settings)
            else {
                continue;
            };
            let kind = object.kind();
            if !session.model.insert(object, false, false).applied {
                debug!(?kind, entity = entity.get(), "重复或退化的图元，删除");
                stale.push(Effect::Erase { kind, entity });
            }
        }
        for label in labels {
            if !session.model.relink_label(label, &session.host) {
                stale.push(Effect::Erase {
                    kind: ObjectKind::Force,
                    entity: label,
                });
            }
        }
        session.model.sort_all();
        stale.extend(session.model.sync_nodes().effects);
        session.apply(stale);

        info!(
            nodes = session.model.nodes().len(),
            stringers = session.model.stringers().len(),
            panels = session.model.panels().len(),
            supports = session.model.constraints().len(),
            forces = session.model.forces().len(),
            "已从图纸重建模型"
        );
        session
    }

    #[inline]
    pub fn host(&self) -> &H {
        &self.host
    }

    /// 直接访问宿主，例如模拟用户删除或撤销。修改后需调用 [`Session::reconcile`]。
    #[inline]
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    #[inline]
    pub fn model(&self) -> &Model {
        &self.model
    }

    #[inline]
    pub fn settings(&self) -> &ModelSettings {
        self.model.settings()
    }

    /// 执行副作用并处理由此产生的宿主通知。
    pub fn apply(&mut self, effects: Effects) {
        self.execute(effects);
        self.reconcile();
    }

    /// 处理宿主排队的删除/恢复通知，直到队列清空。返回处理的通知数量。
    pub fn reconcile(&mut self) -> usize {
        let mut processed = 0;
        loop {
            let events = self.host.drain_events();
            if events.is_empty() {
                return processed;
            }
            for event in events {
                processed += 1;
                let change = match event {
                    HostEvent::Erased(entity) => self.model.on_erased(entity),
                    HostEvent::Restored(entity) => match self.host.primitive(entity).cloned() {
                        Some(primitive) => {
                            self.model.on_restored(entity, &primitive, &mut self.host)
                        }
                        None => Change::rejected(),
                    },
                };
                self.execute(change.effects);
            }
        }
    }

    fn execute(&mut self, effects: Effects) {
        for effect in effects {
            match effect {
                Effect::Create {
                    kind,
                    ticket,
                    request,
                } => {
                    let entity = self.host.create(request.primitive);
                    let labels: Vec<EntityId> = request
                        .labels
                        .into_iter()
                        .map(|label| self.host.create(label))
                        .collect();
                    for label in &labels {
                        self.host.write(
                            *label,
                            OWNER_RECORD,
                            &[TypedValue::Handle(entity.get())],
                            true,
                        );
                    }
                    if !self.model.bind(kind, ticket, entity, labels.clone(), &mut self.host) {
                        warn!(?kind, entity = entity.get(), "没有等待绑定的对象，删除新建图元");
                        self.host.erase(entity);
                        for label in labels {
                            self.host.erase(label);
                        }
                    }
                }
                Effect::Erase { kind, entity } => {
                    if !self.host.erase(entity) {
                        debug!(?kind, entity = entity.get(), "图元已不存在");
                    }
                }
                Effect::Discard { kind, entity } => {
                    if !self.host.discard(entity) {
                        debug!(?kind, entity = entity.get(), "图元已不存在");
                    }
                }
                Effect::Persist {
                    kind,
                    entity,
                    records,
                } => {
                    for record in &records {
                        if self
                            .host
                            .write(entity, record.name, &record.values, true)
                            .is_none()
                        {
                            debug!(?kind, entity = entity.get(), record = record.name, "图元已失效，跳过写入");
                        }
                    }
                }
            }
        }
    }

    fn commit(&mut self, change: Change) -> bool {
        let applied = change.applied;
        self.apply(change.effects);
        applied
    }

    fn register_stringer_attributes(&mut self, stringer: &StringerObject) {
        catalog::register_cross_section(&mut self.host, &stringer.cross_section());
        if let Some(reinforcement) = stringer.reinforcement() {
            catalog::register_steel(&mut self.host, &reinforcement.steel);
        }
    }

    fn register_panel_attributes(&mut self, panel: &PanelObject) {
        let Some(reinforcement) = panel.reinforcement() else {
            return;
        };
        for direction in [reinforcement.x, reinforcement.y].into_iter().flatten() {
            catalog::register_steel(&mut self.host, &direction.steel);
        }
    }

    pub fn add_stringer(&mut self, stringer: StringerObject) -> bool {
        self.register_stringer_attributes(&stringer);
        let change = self.model.add_stringer(stringer);
        self.commit(change)
    }

    pub fn add_stringers<I>(&mut self, stringers: I) -> bool
    where
        I: IntoIterator<Item = StringerObject>,
    {
        let stringers: Vec<StringerObject> = stringers.into_iter().collect();
        for stringer in &stringers {
            self.register_stringer_attributes(stringer);
        }
        let change = self.model.add_stringers(stringers);
        self.commit(change)
    }

    pub fn remove_stringer(&mut self, geometry: &Segment) -> bool {
        let change = self.model.remove_stringer(geometry);
        self.commit(change)
    }

    pub fn add_panel(&mut self, panel: PanelObject) -> bool {
        self.register_panel_attributes(&panel);
        let change = self.model.add_panel(panel);
        self.commit(change)
    }

    pub fn add_panels<I>(&mut self, panels: I) -> bool
    where
        I: IntoIterator<Item = PanelObject>,
    {
        let panels: Vec<PanelObject> = panels.into_iter().collect();
        for panel in &panels {
            self.register_panel_attributes(panel);
        }
        let change = self.model.add_panels(panels);
        self.commit(change)
    }

    pub fn remove_panel(&mut self, geometry: &Quad) -> bool {
        let change = self.model.remove_panel(geometry);
        self.commit(change)
    }

    pub fn divide_stringer(&mut self, geometry: &Segment, count: usize) -> bool {
        let change = self.model.divide_stringer(geometry, count);
        self.commit(change)
    }

    pub fn divide_panel(&mut self, geometry: &Quad, rows: usize, cols: usize) -> bool {
        let change = self.model.divide_panel(geometry, rows, cols);
        self.commit(change)
    }

    pub fn set_stringer_cross_section(
        &mut self,
        geometry: &Segment,
        cross_section: CrossSection,
    ) -> bool {
        catalog::register_cross_section(&mut self.host, &cross_section);
        let change = self
            .model
            .update_stringer(geometry, |stringer| stringer.set_cross_section(cross_section));
        self.commit(change)
    }

    pub fn set_stringer_reinforcement(
        &mut self,
        geometry: &Segment,
        reinforcement: Option<UniaxialReinforcement>,
    ) -> bool {
        if let Some(reinforcement) = &reinforcement {
            catalog::register_steel(&mut self.host, &reinforcement.steel);
        }
        let change = self
            .model
            .update_stringer(geometry, |stringer| stringer.set_reinforcement(reinforcement));
        self.commit(change)
    }

    pub fn set_panel_width(&mut self, geometry: &Quad, width: Length) -> bool {
        let change = self
            .model
            .update_panel(geometry, |panel| panel.set_width(width));
        self.commit(change)
    }

    pub fn set_panel_reinforcement(
        &mut self,
        geometry: &Quad,
        reinforcement: Option<WebReinforcement>,
    ) -> bool {
        for direction in reinforcement
            .iter()
            .flat_map(|reinforcement| [reinforcement.x, reinforcement.y])
            .flatten()
        {
            catalog::register_steel(&mut self.host, &direction.steel);
        }
        let change = self
            .model
            .update_panel(geometry, |panel| panel.set_reinforcement(reinforcement));
        self.commit(change)
    }

    pub fn change_constraint(&mut self, position: Point2, value: Constraint) -> bool {
        let change = self.model.change_constraint(position, value);
        self.commit(change)
    }

    pub fn change_constraints(&mut self, positions: &[Point2], value: Constraint) -> bool {
        let change = self.model.change_constraints(positions, value);
        self.commit(change)
    }

    pub fn change_force(&mut self, position: Point2, value: PlaneForce) -> bool {
        let change = self.model.change_force(position, value);
        self.commit(change)
    }

    pub fn change_forces(&mut self, positions: &[Point2], value: PlaneForce) -> bool {
        let change = self.model.change_forces(positions, value);
        self.commit(change)
    }

    pub fn remove_force_component(&mut self, position: Point2, axis: Axis) -> bool {
        let change = self.model.remove_force_component(position, axis);
        self.commit(change)
    }

    /// 删除并重新创建全部图元。
    pub fn regenerate(&mut self) {
        let effects = self.model.regenerate();
        info!(count = effects.creations(), "重新生成全部图元");
        self.apply(effects);
    }

    /// 切换单位后重新生成图元（力标注文字随之更新）。
    pub fn set_units(&mut self, units: UnitSettings) {
        let settings = ModelSettings {
            units,
            ..*self.model.settings()
        };
        self.model.set_settings(settings);
        self.regenerate();
    }

    pub fn elements(&self) -> ModelElements {
        self.model.elements()
    }

    pub fn cross_section_catalog(&self) -> Vec<CrossSection> {
        catalog::cross_sections(&self.host)
    }
}
