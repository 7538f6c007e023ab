//! 边界条件对象：支座约束与节点力。
//!
//! 条件对象以位置为键，值不参与判等。改变某一位置的条件值时必须先删除旧对象、
//! 再添加新对象：图块类型取决于值，已有图元不会被原地修改。

use std::cmp::Ordering;
use std::fmt::Debug;
use std::ops::{Deref, DerefMut};

use spm_core::document::{BlockReference, Entity, EntityId, Text, TypedValue};
use spm_core::geometry::{GeometricKey, Point2, Vector2};
use spm_core::units::{Force, Length};

use crate::collection::{SpmObject, SyncCollection};
use crate::effects::{Change, ObjectKind, PrimitiveRequest};
use crate::factory::{EntityFactory, blocks, layers};
use crate::host::RecordStore;
use crate::model::ModelSettings;
use crate::persistence::{Binding, Persistent};
use crate::records::{FORCE_RECORD, LoadStatus, Record, RecordReader, RecordSource, SUPPORT_RECORD};

/// 小于此值（N）的力分量视为零。
pub const FORCE_TOLERANCE: f64 = 1e-6;

/// 力标注文字高度（mm）。
const LABEL_HEIGHT: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Constraint {
    #[default]
    Free,
    XFixed,
    YFixed,
    Fixed,
}

impl Constraint {
    pub fn code(self) -> i32 {
        match self {
            Constraint::Free => 0,
            Constraint::XFixed => 1,
            Constraint::YFixed => 2,
            Constraint::Fixed => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Constraint::Free),
            1 => Some(Constraint::XFixed),
            2 => Some(Constraint::YFixed),
            3 => Some(Constraint::Fixed),
            _ => None,
        }
    }

    pub fn block_name(self) -> Option<&'static str> {
        match self {
            Constraint::Free => None,
            Constraint::XFixed => Some(blocks::SUPPORT_X),
            Constraint::YFixed => Some(blocks::SUPPORT_Y),
            Constraint::Fixed => Some(blocks::SUPPORT_XY),
        }
    }

    pub fn from_block(name: &str) -> Option<Self> {
        match name {
            blocks::SUPPORT_X => Some(Constraint::XFixed),
            blocks::SUPPORT_Y => Some(Constraint::YFixed),
            blocks::SUPPORT_XY => Some(Constraint::Fixed),
            _ => None,
        }
    }

    pub fn restrains_x(self) -> bool {
        matches!(self, Constraint::XFixed | Constraint::Fixed)
    }

    pub fn restrains_y(self) -> bool {
        matches!(self, Constraint::YFixed | Constraint::Fixed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn code(self) -> i32 {
        match self {
            Axis::X => 1,
            Axis::Y => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Axis::X),
            2 => Some(Axis::Y),
            _ => None,
        }
    }

    fn unit(self) -> Vector2 {
        match self {
            Axis::X => Vector2::new(1.0, 0.0),
            Axis::Y => Vector2::new(0.0, 1.0),
        }
    }
}

/// 平面力：X、Y 两个分量。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaneForce {
    pub x: Force,
    pub y: Force,
}

impl PlaneForce {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: Force(x),
            y: Force(y),
        }
    }

    pub fn component(&self, axis: Axis) -> Force {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.x.is_zero(FORCE_TOLERANCE) && self.y.is_zero(FORCE_TOLERANCE)
    }
}

/// 条件对象的公共接口。
pub trait Condition: SpmObject {
    type Value: Clone + Debug + Default + PartialEq;

    fn position(&self) -> Point2;

    /// 把条件值拆成对象；退化值返回空列表。
    fn from_value(position: Point2, value: &Self::Value) -> Vec<Self>;

    /// 合并同一位置的对象为条件值。
    fn merge<'a, I>(items: I) -> Self::Value
    where
        I: IntoIterator<Item = &'a Self>,
        Self: 'a;
}

#[derive(Debug, Clone)]
pub struct ConstraintObject {
    position: Point2,
    value: Constraint,
    binding: Binding,
}

impl ConstraintObject {
    pub fn new(position: Point2, value: Constraint) -> Self {
        Self {
            position,
            value,
            binding: Binding::default(),
        }
    }

    #[inline]
    pub fn position(&self) -> Point2 {
        self.position
    }

    #[inline]
    pub fn value(&self) -> Constraint {
        self.value
    }
}

impl Persistent for ConstraintObject {
    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut Binding {
        &mut self.binding
    }

    fn records(&self) -> Vec<Record> {
        vec![Record::new(
            SUPPORT_RECORD,
            vec![TypedValue::Integer(self.value.code())],
        )]
    }

    fn load_records(&mut self, source: &RecordSource<'_>) -> LoadStatus {
        let Some(values) = source.read(SUPPORT_RECORD) else {
            return LoadStatus::Missing;
        };
        let mut reader = RecordReader::new(&values);
        let code = reader.integer(self.value.code());
        match Constraint::from_code(code) {
            Some(value) => self.value = value,
            None => reader.mark_repaired(),
        }
        reader.status()
    }
}

impl SpmObject for ConstraintObject {
    type Key = Point2;
    const KIND: ObjectKind = ObjectKind::Support;

    fn key(&self) -> &Point2 {
        &self.position
    }

    fn is_degenerate(&self, _tolerance: f64) -> bool {
        self.value == Constraint::Free || !self.position.is_finite()
    }
}

impl EntityFactory for ConstraintObject {
    fn create_primitive(&self, _settings: &ModelSettings) -> PrimitiveRequest {
        // 自由约束不会进入集合，这里只是兜底。
        let name = self.value.block_name().unwrap_or(blocks::SUPPORT_XY);
        PrimitiveRequest::single(Entity::BlockReference(BlockReference {
            name: name.to_string(),
            insert: self.position,
            scale: Vector2::new(1.0, 1.0),
            rotation: 0.0,
            layer: layers::SUPPORT.to_string(),
        }))
    }

    fn reconstruct(
        entity: EntityId,
        primitive: &Entity,
        store: &mut dyn RecordStore,
        _settings: &ModelSettings,
    ) -> Option<Self> {
        let Entity::BlockReference(block) = primitive else {
            return None;
        };
        if block.layer != layers::SUPPORT {
            return None;
        }
        let value = Constraint::from_block(&block.name).unwrap_or_default();
        let mut object = Self::new(block.insert, value);
        object.attach(Some(entity), store);
        Some(object)
    }
}

impl Condition for ConstraintObject {
    type Value = Constraint;

    fn position(&self) -> Point2 {
        self.position
    }

    fn from_value(position: Point2, value: &Constraint) -> Vec<Self> {
        if *value == Constraint::Free {
            Vec::new()
        } else {
            vec![Self::new(position, *value)]
        }
    }

    fn merge<'a, I>(items: I) -> Constraint
    where
        I: IntoIterator<Item = &'a Self>,
        Self: 'a,
    {
        items
            .into_iter()
            .next()
            .map(|item| item.value)
            .unwrap_or_default()
    }
}

/// 力分量的几何键：位置加方向。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceKey {
    pub position: Point2,
    pub axis: Axis,
}

impl GeometricKey for ForceKey {
    fn key_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.axis == other.axis && self.position.key_eq(&other.position, tolerance)
    }

    fn key_cmp(&self, other: &Self, tolerance: f64) -> Ordering {
        self.position
            .key_cmp(&other.position, tolerance)
            .then_with(|| self.axis.cmp(&other.axis))
    }
}

/// 单方向力分量，自带箭头图块与标注文字。
#[derive(Debug, Clone)]
pub struct ForceObject {
    key: ForceKey,
    magnitude: Force,
    binding: Binding,
}

impl ForceObject {
    pub fn new(position: Point2, axis: Axis, magnitude: Force) -> Self {
        Self {
            key: ForceKey { position, axis },
            magnitude,
            binding: Binding::default(),
        }
    }

    #[inline]
    pub fn position(&self) -> Point2 {
        self.key.position
    }

    #[inline]
    pub fn axis(&self) -> Axis {
        self.key.axis
    }

    #[inline]
    pub fn magnitude(&self) -> Force {
        self.magnitude
    }

    /// 箭头图块的旋转角：沿分量正方向为 0 或 π/2，负值反向。
    pub fn rotation(&self) -> f64 {
        let negative = self.magnitude.newtons() < 0.0;
        match (self.key.axis, negative) {
            (Axis::X, false) => 0.0,
            (Axis::X, true) => std::f64::consts::PI,
            (Axis::Y, false) => std::f64::consts::FRAC_PI_2,
            (Axis::Y, true) => -std::f64::consts::FRAC_PI_2,
        }
    }

    fn label(&self, settings: &ModelSettings) -> Entity {
        let height = settings.units.length.from_length(Length(LABEL_HEIGHT));
        let sign = if self.magnitude.newtons() < 0.0 { -1.0 } else { 1.0 };
        let back = self.key.axis.unit().as_vec2() * (-3.0 * height * sign);
        let insert = self
            .key
            .position
            .translate(Vector2::from(back))
            .translate(Vector2::new(0.5 * height, 0.5 * height));
        Entity::Text(Text {
            insert,
            content: settings.units.format_force(self.magnitude),
            height,
            rotation: 0.0,
            layer: layers::FORCE_TEXT.to_string(),
        })
    }
}

impl Persistent for ForceObject {
    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut Binding {
        &mut self.binding
    }

    fn records(&self) -> Vec<Record> {
        vec![Record::new(
            FORCE_RECORD,
            vec![
                TypedValue::Real(self.magnitude.newtons()),
                TypedValue::Integer(self.key.axis.code()),
            ],
        )]
    }

    fn load_records(&mut self, source: &RecordSource<'_>) -> LoadStatus {
        let Some(values) = source.read(FORCE_RECORD) else {
            return LoadStatus::Missing;
        };
        let mut reader = RecordReader::new(&values);
        self.magnitude = Force(reader.real(self.magnitude.newtons()));
        // 方向属于几何键，以图元为准
        if Axis::from_code(reader.integer(self.key.axis.code())) != Some(self.key.axis) {
            reader.mark_repaired();
        }
        reader.status()
    }
}

impl SpmObject for ForceObject {
    type Key = ForceKey;
    const KIND: ObjectKind = ObjectKind::Force;

    fn key(&self) -> &ForceKey {
        &self.key
    }

    fn is_degenerate(&self, _tolerance: f64) -> bool {
        !self.key.position.is_finite()
            || !self.magnitude.newtons().is_finite()
            || self.magnitude.is_zero(FORCE_TOLERANCE)
    }
}

impl EntityFactory for ForceObject {
    fn create_primitive(&self, settings: &ModelSettings) -> PrimitiveRequest {
        PrimitiveRequest {
            primitive: Entity::BlockReference(BlockReference {
                name: blocks::FORCE_ARROW.to_string(),
                insert: self.key.position,
                scale: Vector2::new(1.0, 1.0),
                rotation: self.rotation(),
                layer: layers::FORCE.to_string(),
            }),
            labels: vec![self.label(settings)],
        }
    }

    fn reconstruct(
        entity: EntityId,
        primitive: &Entity,
        store: &mut dyn RecordStore,
        _settings: &ModelSettings,
    ) -> Option<Self> {
        let Entity::BlockReference(block) = primitive else {
            return None;
        };
        if block.layer != layers::FORCE {
            return None;
        }
        let (cos, sin) = (block.rotation.cos(), block.rotation.sin());
        let axis = if cos.abs() >= sin.abs() { Axis::X } else { Axis::Y };
        let mut object = Self::new(block.insert, axis, Force(0.0));
        object.attach(Some(entity), store);
        Some(object)
    }
}

impl Condition for ForceObject {
    type Value = PlaneForce;

    fn position(&self) -> Point2 {
        self.key.position
    }

    fn from_value(position: Point2, value: &PlaneForce) -> Vec<Self> {
        [Axis::X, Axis::Y]
            .into_iter()
            .map(|axis| (axis, value.component(axis)))
            .filter(|(_, force)| !force.is_zero(FORCE_TOLERANCE))
            .map(|(axis, force)| Self::new(position, axis, force))
            .collect()
    }

    fn merge<'a, I>(items: I) -> PlaneForce
    where
        I: IntoIterator<Item = &'a Self>,
        Self: 'a,
    {
        items
            .into_iter()
            .fold(PlaneForce::default(), |mut merged, item| {
                match item.key.axis {
                    Axis::X => merged.x = Force(merged.x.newtons() + item.magnitude.newtons()),
                    Axis::Y => merged.y = Force(merged.y.newtons() + item.magnitude.newtons()),
                }
                merged
            })
    }
}

/// 条件集合：在同步集合之上提供按位置的条件值读写。
#[derive(Debug, Clone)]
pub struct ConditionCollection<T: Condition> {
    inner: SyncCollection<T>,
}

impl<T: Condition> ConditionCollection<T> {
    pub fn new(settings: ModelSettings) -> Self {
        Self {
            inner: SyncCollection::new(settings),
        }
    }

    /// 位于 `position` 的全部对象。
    pub fn at(&self, position: Point2) -> Vec<&T> {
        let tolerance = self.inner.settings().tolerance;
        self.inner
            .iter()
            .filter(|item| item.position().approx_eq(position, tolerance))
            .collect()
    }

    pub fn value_at(&self, position: Point2) -> T::Value {
        T::merge(self.at(position))
    }

    /// 有条件对象的位置（去重、有序）。
    pub fn positions(&self) -> Vec<Point2> {
        let tolerance = self.inner.settings().tolerance;
        let mut positions: Vec<Point2> = Vec::new();
        for item in self.inner.iter() {
            let position = item.position();
            if !positions.iter().any(|p| p.approx_eq(position, tolerance)) {
                positions.push(position);
            }
        }
        positions
    }

    /// 按条件值添加对象；退化值不产生任何对象。
    pub fn add_value(
        &mut self,
        position: Point2,
        value: &T::Value,
        raise_events: bool,
        sort: bool,
    ) -> Change {
        let items = T::from_value(position, value);
        if items.is_empty() {
            return Change::rejected();
        }
        self.inner.add_range(items, raise_events, sort)
    }

    pub fn remove_at(&mut self, position: Point2, raise_events: bool, sort: bool) -> Change {
        let keys: Vec<T::Key> = self
            .at(position)
            .into_iter()
            .map(|item| item.key().clone())
            .collect();
        self.inner.remove_range(&keys, raise_events, sort)
    }

    /// 先删除该位置已有的条件（不排序），再添加新值（排序）。
    pub fn change_condition(&mut self, position: Point2, value: &T::Value) -> Change {
        let removed = self.remove_at(position, true, false);
        let added = self.add_value(position, value, true, true);
        removed.and(added)
    }

    pub fn change_conditions(&mut self, positions: &[Point2], value: &T::Value) -> Change {
        positions
            .iter()
            .fold(Change::rejected(), |change, position| {
                change.and(self.change_condition(*position, value))
            })
    }
}

impl ConditionCollection<ForceObject> {
    /// 只删除一个方向的分量，另一方向保持不变。
    pub fn remove_component(&mut self, position: Point2, axis: Axis) -> Change {
        self.inner.remove(&ForceKey { position, axis }, true, true)
    }
}

impl<T: Condition> Deref for ConditionCollection<T> {
    type Target = SyncCollection<T>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T: Condition> DerefMut for ConditionCollection<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use spm_core::document::Document;

    use super::*;
    use crate::effects::{Effect, Effects};

    fn materialize<T: Condition>(
        collection: &mut ConditionCollection<T>,
        effects: Effects,
        doc: &mut Document,
    ) {
        for effect in effects {
            match effect {
                Effect::Create {
                    ticket, request, ..
                } => {
                    let entity = doc.add_entity(request.primitive);
                    let labels = request
                        .labels
                        .into_iter()
                        .map(|label| doc.add_entity(label))
                        .collect();
                    assert!(collection.bind(ticket, entity, labels, &mut *doc));
                }
                Effect::Erase { entity, .. } => {
                    doc.erase(entity);
                }
                Effect::Discard { entity, .. } => {
                    doc.discard(entity);
                }
                Effect::Persist { .. } => {}
            }
        }
    }

    #[test]
    fn free_constraint_is_a_silent_no_op() {
        let mut supports = ConditionCollection::<ConstraintObject>::new(ModelSettings::default());
        let change = supports.add_value(Point2::new(0.0, 0.0), &Constraint::Free, true, true);
        assert!(!change.applied);
        assert!(change.effects.is_empty());
        assert!(supports.is_empty());
    }

    #[test]
    fn change_condition_recreates_the_primitive() {
        let mut doc = Document::new();
        let mut supports = ConditionCollection::<ConstraintObject>::new(ModelSettings::default());
        let origin = Point2::new(0.0, 0.0);

        let change = supports.add_value(origin, &Constraint::XFixed, true, true);
        materialize(&mut supports, change.effects, &mut doc);
        let original = supports.at(origin)[0].binding().entity().unwrap();

        let change = supports.change_condition(origin, &Constraint::Fixed);
        assert!(change.applied);
        assert_eq!(change.effects.erased(), vec![original]);
        assert_eq!(change.effects.creations(), 1);
        materialize(&mut supports, change.effects, &mut doc);

        assert_eq!(supports.len(), 1);
        assert_eq!(supports.value_at(origin), Constraint::Fixed);
        assert!(!doc.contains(original));
        let current = supports.at(origin)[0].binding().entity().unwrap();
        match doc.entity(current) {
            Some(Entity::BlockReference(block)) => assert_eq!(block.name, blocks::SUPPORT_XY),
            other => panic!("unexpected primitive: {other:?}"),
        }
    }

    #[test]
    fn plane_force_skips_zero_components() {
        let mut forces = ConditionCollection::<ForceObject>::new(ModelSettings::default());
        let at = Point2::new(1.0, 1.0);
        let change = forces.add_value(at, &PlaneForce::new(0.0, -5000.0), true, true);
        assert!(change.applied);
        assert_eq!(change.effects.creations(), 1);
        assert_eq!(forces.len(), 1);
        assert_eq!(forces.value_at(at), PlaneForce::new(0.0, -5000.0));

        let change = forces.add_value(at, &PlaneForce::default(), true, true);
        assert!(!change.applied);
    }

    #[test]
    fn removing_one_axis_keeps_the_other() {
        let mut doc = Document::new();
        let mut forces = ConditionCollection::<ForceObject>::new(ModelSettings::default());
        let at = Point2::new(2.0, 0.0);
        let change = forces.change_condition(at, &PlaneForce::new(1000.0, 2000.0));
        materialize(&mut forces, change.effects, &mut doc);
        assert_eq!(forces.len(), 2);
        // arrow + label per component
        assert_eq!(doc.entities().count(), 4);

        let change = forces.remove_component(at, Axis::X);
        assert!(change.applied);
        assert_eq!(change.effects.erased().len(), 2);
        materialize(&mut forces, change.effects, &mut doc);
        assert_eq!(forces.value_at(at), PlaneForce::new(0.0, 2000.0));
        assert_eq!(doc.entities().count(), 2);
    }

    #[test]
    fn force_arrow_rotation_follows_sign_and_axis() {
        let left = ForceObject::new(Point2::new(0.0, 0.0), Axis::X, Force(-1.0));
        let up = ForceObject::new(Point2::new(0.0, 0.0), Axis::Y, Force(1.0));
        assert!((left.rotation() - std::f64::consts::PI).abs() < 1e-12);
        assert!((up.rotation() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn force_reconstruct_reads_magnitude_from_record() {
        let mut doc = Document::new();
        let settings = ModelSettings::default();
        let source = ForceObject::new(Point2::new(3.0, 4.0), Axis::Y, Force(-2500.0));
        let request = source.create_primitive(&settings);
        let id = doc.add_entity(request.primitive.clone());
        doc.write_record(
            id,
            FORCE_RECORD,
            &[TypedValue::Real(-2500.0), TypedValue::Integer(2)],
            true,
        );
        let rebuilt = ForceObject::reconstruct(id, &request.primitive, &mut doc, &settings)
            .expect("force layer should reconstruct");
        assert_eq!(rebuilt.axis(), Axis::Y);
        assert_eq!(rebuilt.magnitude(), Force(-2500.0));
        assert!(rebuilt.position().approx_eq(Point2::new(3.0, 4.0), 1e-12));
    }

    #[test]
    fn constraint_reconstruct_falls_back_to_block_name() {
        let mut doc = Document::new();
        let settings = ModelSettings::default();
        let id = doc.add_block_reference(
            blocks::SUPPORT_Y,
            Point2::new(0.0, 0.0),
            Vector2::new(1.0, 1.0),
            0.0,
            layers::SUPPORT,
        );
        let primitive = doc.entity(id).cloned().unwrap();
        let rebuilt = ConstraintObject::reconstruct(id, &primitive, &mut doc, &settings).unwrap();
        assert_eq!(rebuilt.value(), Constraint::YFixed);
        let handle = doc.dictionary_handle(id).expect("defaults persisted");
        assert_eq!(
            doc.read_record(handle, SUPPORT_RECORD),
            Some(&[TypedValue::Integer(2)][..])
        );
    }
}
