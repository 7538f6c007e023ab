//! 结构对象：节点、桁条与面板，以及它们导出的分析单元。

use spm_core::document::{Entity, EntityId, Line, PointEntity, Polyline, TypedValue};
use spm_core::geometry::{Point2, Quad, Segment};
use spm_core::units::Length;

use crate::attributes::{
    CrossSection, Steel, UniaxialReinforcement, WebReinforcement, WebReinforcementDirection,
};
use crate::collection::SpmObject;
use crate::conditions::{Constraint, PlaneForce};
use crate::effects::{ObjectKind, PrimitiveRequest};
use crate::errors::EngineError;
use crate::factory::{EntityFactory, layers};
use crate::host::RecordStore;
use crate::model::{Model, ModelSettings};
use crate::persistence::{Binding, Persistent};
use crate::records::{LoadStatus, PANEL_RECORD, Record, RecordReader, RecordSource, STRINGER_RECORD};

/// 面板默认厚度（mm）。
pub const DEFAULT_PANEL_WIDTH: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// 桁条或面板边的中点。
    Internal,
    /// 桁条端点。
    External,
}

impl NodeType {
    pub fn layer(self) -> &'static str {
        match self {
            NodeType::Internal => layers::INTERNAL_NODE,
            NodeType::External => layers::EXTERNAL_NODE,
        }
    }

    pub fn from_layer(layer: &str) -> Option<Self> {
        match layer {
            layers::INTERNAL_NODE => Some(NodeType::Internal),
            layers::EXTERNAL_NODE => Some(NodeType::External),
            _ => None,
        }
    }
}

/// 能导出分析单元的结构对象。
pub trait Structural: SpmObject {
    type Element;

    /// 对象要求存在的节点（位置与类型）。
    fn grips(&self) -> Vec<(Point2, NodeType)>;

    fn element(&self, model: &Model) -> Result<Self::Element, EngineError>;
}

fn node_number(model: &Model, position: Point2) -> Result<usize, EngineError> {
    model
        .nodes()
        .get_by_property(&position)
        .map(|node| node.number())
        .ok_or(EngineError::NodeNotFound {
            x: position.x(),
            y: position.y(),
        })
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeElement {
    pub number: usize,
    pub position: Point2,
    pub kind: NodeType,
    pub constraint: Constraint,
    pub force: PlaneForce,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringerElement {
    pub number: usize,
    /// 起点、中点、终点的节点编号。
    pub grips: [usize; 3],
    pub length: Length,
    pub angle: f64,
    pub cross_section: CrossSection,
    pub reinforcement: Option<UniaxialReinforcement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelElement {
    pub number: usize,
    /// 四条边中点的节点编号。
    pub grips: [usize; 4],
    pub vertices: [Point2; 4],
    pub width: Length,
    pub reinforcement: Option<WebReinforcement>,
}

#[derive(Debug, Clone)]
pub struct NodeObject {
    position: Point2,
    kind: NodeType,
    number: usize,
    binding: Binding,
}

impl NodeObject {
    pub fn new(position: Point2, kind: NodeType) -> Self {
        Self {
            position,
            kind,
            number: 0,
            binding: Binding::default(),
        }
    }

    #[inline]
    pub fn position(&self) -> Point2 {
        self.position
    }

    #[inline]
    pub fn kind(&self) -> NodeType {
        self.kind
    }
}

impl Persistent for NodeObject {
    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut Binding {
        &mut self.binding
    }

    fn records(&self) -> Vec<Record> {
        Vec::new()
    }

    fn load_records(&mut self, _source: &RecordSource<'_>) -> LoadStatus {
        LoadStatus::Loaded
    }
}

impl SpmObject for NodeObject {
    type Key = Point2;
    const KIND: ObjectKind = ObjectKind::Node;

    fn key(&self) -> &Point2 {
        &self.position
    }

    fn number(&self) -> usize {
        self.number
    }

    fn set_number(&mut self, number: usize) {
        self.number = number;
    }

    fn is_degenerate(&self, _tolerance: f64) -> bool {
        !self.position.is_finite()
    }
}

impl EntityFactory for NodeObject {
    fn create_primitive(&self, _settings: &ModelSettings) -> PrimitiveRequest {
        PrimitiveRequest::single(Entity::Point(PointEntity {
            position: self.position,
            layer: self.kind.layer().to_string(),
        }))
    }

    fn reconstruct(
        entity: EntityId,
        primitive: &Entity,
        store: &mut dyn RecordStore,
        _settings: &ModelSettings,
    ) -> Option<Self> {
        let Entity::Point(point) = primitive else {
            return None;
        };
        let kind = NodeType::from_layer(&point.layer)?;
        let mut node = Self::new(point.position, kind);
        node.attach(Some(entity), store);
        Some(node)
    }
}

impl Structural for NodeObject {
    type Element = NodeElement;

    fn grips(&self) -> Vec<(Point2, NodeType)> {
        vec![(self.position, self.kind)]
    }

    fn element(&self, model: &Model) -> Result<NodeElement, EngineError> {
        Ok(NodeElement {
            number: self.number,
            position: self.position,
            kind: self.kind,
            constraint: model.constraints().value_at(self.position),
            force: model.forces().value_at(self.position),
        })
    }
}

#[derive(Debug, Clone)]
pub struct StringerObject {
    geometry: Segment,
    cross_section: CrossSection,
    reinforcement: Option<UniaxialReinforcement>,
    number: usize,
    binding: Binding,
}

impl StringerObject {
    pub fn new(start: Point2, end: Point2, cross_section: CrossSection) -> Self {
        Self::from_segment(Segment::new(start, end), cross_section)
    }

    pub fn from_segment(geometry: Segment, cross_section: CrossSection) -> Self {
        Self {
            geometry,
            cross_section,
            reinforcement: None,
            number: 0,
            binding: Binding::default(),
        }
    }

    pub fn with_reinforcement(mut self, reinforcement: UniaxialReinforcement) -> Self {
        self.reinforcement = Some(reinforcement);
        self
    }

    #[inline]
    pub fn geometry(&self) -> &Segment {
        &self.geometry
    }

    #[inline]
    pub fn cross_section(&self) -> CrossSection {
        self.cross_section
    }

    #[inline]
    pub fn reinforcement(&self) -> Option<UniaxialReinforcement> {
        self.reinforcement
    }

    pub fn set_cross_section(&mut self, cross_section: CrossSection) {
        self.cross_section = cross_section;
    }

    pub fn set_reinforcement(&mut self, reinforcement: Option<UniaxialReinforcement>) {
        self.reinforcement = reinforcement;
    }

    /// 等分为 `count` 根新桁条，属性全部继承，绑定不继承。
    pub fn divide(&self, count: usize) -> Vec<StringerObject> {
        self.geometry
            .divide(count)
            .into_iter()
            .map(|segment| StringerObject {
                geometry: segment,
                cross_section: self.cross_section,
                reinforcement: self.reinforcement,
                number: 0,
                binding: Binding::default(),
            })
            .collect()
    }
}

impl Persistent for StringerObject {
    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut Binding {
        &mut self.binding
    }

    fn records(&self) -> Vec<Record> {
        // 无配筋记为 0 根
        let (bars, diameter, steel) = match self.reinforcement {
            Some(reinforcement) => (
                reinforcement.number_of_bars,
                reinforcement.bar_diameter.millimeters(),
                reinforcement.steel,
            ),
            None => (0, 0.0, Steel::default()),
        };
        vec![Record::new(
            STRINGER_RECORD,
            vec![
                TypedValue::Real(self.cross_section.width.millimeters()),
                TypedValue::Real(self.cross_section.height.millimeters()),
                TypedValue::Integer(bars),
                TypedValue::Real(diameter),
                TypedValue::Real(steel.yield_stress.megapascals()),
                TypedValue::Real(steel.elastic_modulus.megapascals()),
            ],
        )]
    }

    fn load_records(&mut self, source: &RecordSource<'_>) -> LoadStatus {
        let Some(values) = source.read(STRINGER_RECORD) else {
            return LoadStatus::Missing;
        };
        let mut reader = RecordReader::new(&values);
        let defaults = Steel::default();
        let width = reader.real(self.cross_section.width.millimeters());
        let height = reader.real(self.cross_section.height.millimeters());
        let bars = reader.integer(0);
        let diameter = reader.real(0.0);
        let yield_stress = reader.real(defaults.yield_stress.megapascals());
        let modulus = reader.real(defaults.elastic_modulus.megapascals());

        self.cross_section = CrossSection::new(width, height);
        self.reinforcement = (bars > 0).then(|| {
            UniaxialReinforcement::new(bars, diameter, Steel::new(yield_stress, modulus))
        });
        reader.status()
    }
}

impl SpmObject for StringerObject {
    type Key = Segment;
    const KIND: ObjectKind = ObjectKind::Stringer;

    fn key(&self) -> &Segment {
        &self.geometry
    }

    fn number(&self) -> usize {
        self.number
    }

    fn set_number(&mut self, number: usize) {
        self.number = number;
    }

    fn is_degenerate(&self, tolerance: f64) -> bool {
        self.geometry.is_degenerate(tolerance)
    }
}

impl EntityFactory for StringerObject {
    fn create_primitive(&self, _settings: &ModelSettings) -> PrimitiveRequest {
        PrimitiveRequest::single(Entity::Line(Line {
            start: self.geometry.start(),
            end: self.geometry.end(),
            layer: layers::STRINGER.to_string(),
        }))
    }

    fn reconstruct(
        entity: EntityId,
        primitive: &Entity,
        store: &mut dyn RecordStore,
        _settings: &ModelSettings,
    ) -> Option<Self> {
        let Entity::Line(line) = primitive else {
            return None;
        };
        if line.layer != layers::STRINGER {
            return None;
        }
        let mut stringer = Self::new(line.start, line.end, CrossSection::default());
        stringer.attach(Some(entity), store);
        Some(stringer)
    }
}

impl Structural for StringerObject {
    type Element = StringerElement;

    fn grips(&self) -> Vec<(Point2, NodeType)> {
        vec![
            (self.geometry.start(), NodeType::External),
            (self.geometry.midpoint(), NodeType::Internal),
            (self.geometry.end(), NodeType::External),
        ]
    }

    fn element(&self, model: &Model) -> Result<StringerElement, EngineError> {
        let units = model.settings().units;
        Ok(StringerElement {
            number: self.number,
            grips: [
                node_number(model, self.geometry.start())?,
                node_number(model, self.geometry.midpoint())?,
                node_number(model, self.geometry.end())?,
            ],
            length: units.length.to_length(self.geometry.length()),
            angle: self.geometry.angle(),
            cross_section: self.cross_section,
            reinforcement: self.reinforcement,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PanelObject {
    geometry: Quad,
    width: Length,
    reinforcement: Option<WebReinforcement>,
    number: usize,
    binding: Binding,
}

impl PanelObject {
    pub fn new(vertices: [Point2; 4]) -> Self {
        Self::from_quad(Quad::new(vertices))
    }

    pub fn from_quad(geometry: Quad) -> Self {
        Self {
            geometry,
            width: Length(DEFAULT_PANEL_WIDTH),
            reinforcement: None,
            number: 0,
            binding: Binding::default(),
        }
    }

    pub fn with_width(mut self, width: Length) -> Self {
        self.width = width;
        self
    }

    pub fn with_reinforcement(mut self, reinforcement: WebReinforcement) -> Self {
        self.set_reinforcement(Some(reinforcement));
        self
    }

    #[inline]
    pub fn geometry(&self) -> &Quad {
        &self.geometry
    }

    #[inline]
    pub fn width(&self) -> Length {
        self.width
    }

    #[inline]
    pub fn reinforcement(&self) -> Option<WebReinforcement> {
        self.reinforcement
    }

    pub fn set_width(&mut self, width: Length) {
        self.width = width;
    }

    /// 两个方向都为空的配筋记为无配筋。
    pub fn set_reinforcement(&mut self, reinforcement: Option<WebReinforcement>) {
        self.reinforcement = reinforcement.filter(|reinforcement| !reinforcement.is_empty());
    }

    /// 划分为 `rows × cols` 块，属性全部继承；非矩形面板原样返回。
    pub fn divide(&self, rows: usize, cols: usize, tolerance: f64) -> Vec<PanelObject> {
        match self.geometry.divide(rows, cols, tolerance) {
            Some(quads) => quads
                .into_iter()
                .map(|quad| PanelObject {
                    geometry: quad,
                    width: self.width,
                    reinforcement: self.reinforcement,
                    number: 0,
                    binding: Binding::default(),
                })
                .collect(),
            None => vec![self.clone()],
        }
    }
}

fn direction_values(direction: Option<WebReinforcementDirection>) -> [TypedValue; 4] {
    let (diameter, spacing, steel) = match direction {
        Some(direction) => (
            direction.bar_diameter.millimeters(),
            direction.spacing.millimeters(),
            direction.steel,
        ),
        None => (0.0, 0.0, Steel::default()),
    };
    [
        TypedValue::Real(diameter),
        TypedValue::Real(spacing),
        TypedValue::Real(steel.yield_stress.megapascals()),
        TypedValue::Real(steel.elastic_modulus.megapascals()),
    ]
}

fn read_direction(reader: &mut RecordReader<'_>) -> Option<WebReinforcementDirection> {
    let defaults = Steel::default();
    let diameter = reader.real(0.0);
    let spacing = reader.real(0.0);
    let yield_stress = reader.real(defaults.yield_stress.megapascals());
    let modulus = reader.real(defaults.elastic_modulus.megapascals());
    (diameter > 0.0 && spacing > 0.0).then(|| {
        WebReinforcementDirection::new(diameter, spacing, Steel::new(yield_stress, modulus))
    })
}

impl Persistent for PanelObject {
    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut Binding {
        &mut self.binding
    }

    fn records(&self) -> Vec<Record> {
        let reinforcement = self.reinforcement.unwrap_or_default();
        let mut values = vec![TypedValue::Real(self.width.millimeters())];
        values.extend(direction_values(reinforcement.x));
        values.extend(direction_values(reinforcement.y));
        vec![Record::new(PANEL_RECORD, values)]
    }

    fn load_records(&mut self, source: &RecordSource<'_>) -> LoadStatus {
        let Some(values) = source.read(PANEL_RECORD) else {
            return LoadStatus::Missing;
        };
        let mut reader = RecordReader::new(&values);
        self.width = Length(reader.real(self.width.millimeters()));
        let x = read_direction(&mut reader);
        let y = read_direction(&mut reader);
        self.set_reinforcement(Some(WebReinforcement { x, y }));
        reader.status()
    }
}

impl SpmObject for PanelObject {
    type Key = Quad;
    const KIND: ObjectKind = ObjectKind::Panel;

    fn key(&self) -> &Quad {
        &self.geometry
    }

    fn number(&self) -> usize {
        self.number
    }

    fn set_number(&mut self, number: usize) {
        self.number = number;
    }

    fn is_degenerate(&self, tolerance: f64) -> bool {
        self.geometry
            .edges()
            .iter()
            .any(|edge| edge.is_degenerate(tolerance))
    }
}

impl EntityFactory for PanelObject {
    fn create_primitive(&self, _settings: &ModelSettings) -> PrimitiveRequest {
        PrimitiveRequest::single(Entity::Polyline(Polyline {
            vertices: self.geometry.vertices().to_vec(),
            is_closed: true,
            layer: layers::PANEL.to_string(),
        }))
    }

    fn reconstruct(
        entity: EntityId,
        primitive: &Entity,
        store: &mut dyn RecordStore,
        _settings: &ModelSettings,
    ) -> Option<Self> {
        let Entity::Polyline(polyline) = primitive else {
            return None;
        };
        if polyline.layer != layers::PANEL {
            return None;
        }
        let vertices: [Point2; 4] = polyline.vertices.as_slice().try_into().ok()?;
        let mut panel = Self::new(vertices);
        panel.attach(Some(entity), store);
        Some(panel)
    }
}

impl Structural for PanelObject {
    type Element = PanelElement;

    fn grips(&self) -> Vec<(Point2, NodeType)> {
        self.geometry
            .edge_midpoints()
            .into_iter()
            .map(|midpoint| (midpoint, NodeType::Internal))
            .collect()
    }

    fn element(&self, model: &Model) -> Result<PanelElement, EngineError> {
        let [a, b, c, d] = self.geometry.edge_midpoints();
        Ok(PanelElement {
            number: self.number,
            grips: [
                node_number(model, a)?,
                node_number(model, b)?,
                node_number(model, c)?,
                node_number(model, d)?,
            ],
            vertices: self.geometry.vertices(),
            width: self.width,
            reinforcement: self.reinforcement,
        })
    }
}
