pub mod units;

pub mod geometry {
    use std::cmp::Ordering;

    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 默认几何容差（图形单位），点、线段与四边形的判等都以此为准。
    pub const DEFAULT_TOLERANCE: f64 = 1e-3;

    /// 直角判定使用的余弦容差。
    const RIGHT_ANGLE_COSINE: f64 = 1e-3;

    /// 二维点，内部以 `glam::DVec2` 表示。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn distance_to(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn midpoint(self, other: Point2) -> Point2 {
            Self((self.0 + other.0) * 0.5)
        }

        /// 线性插值，`t = 0` 返回自身，`t = 1` 返回 `other`。
        #[inline]
        pub fn lerp(self, other: Point2, t: f64) -> Point2 {
            Self(self.0 + (other.0 - self.0) * t)
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        /// 两坐标分量之差均不超过容差时视为同一点。
        #[inline]
        pub fn approx_eq(self, other: Point2, tolerance: f64) -> bool {
            (self.x() - other.x()).abs() <= tolerance && (self.y() - other.y()).abs() <= tolerance
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        /// 相对 X 轴正方向的角度（弧度，范围 `(-π, π]`）。
        #[inline]
        pub fn angle(self) -> f64 {
            self.0.y.atan2(self.0.x)
        }

        #[inline]
        pub fn dot(self, other: Vector2) -> f64 {
            self.0.dot(other.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 几何键：对象唯一性与排序所依赖的几何属性。
    ///
    /// `key_eq` 按容差判等；`key_cmp` 先把坐标吸附到容差网格再比较，
    /// 因而是全序，可直接用于排序。
    pub trait GeometricKey: Clone + std::fmt::Debug {
        fn key_eq(&self, other: &Self, tolerance: f64) -> bool;
        fn key_cmp(&self, other: &Self, tolerance: f64) -> Ordering;
    }

    #[inline]
    fn snap(value: f64, tolerance: f64) -> i64 {
        (value / tolerance.max(f64::EPSILON)).round() as i64
    }

    impl GeometricKey for Point2 {
        fn key_eq(&self, other: &Self, tolerance: f64) -> bool {
            self.approx_eq(*other, tolerance)
        }

        /// 字典序：先 X 后 Y。
        fn key_cmp(&self, other: &Self, tolerance: f64) -> Ordering {
            snap(self.x(), tolerance)
                .cmp(&snap(other.x(), tolerance))
                .then_with(|| snap(self.y(), tolerance).cmp(&snap(other.y(), tolerance)))
        }
    }

    /// 线段。构造时端点按点的全序规范化，因此 `(a, b)` 与 `(b, a)` 是同一线段。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Segment {
        start: Point2,
        end: Point2,
    }

    impl Segment {
        pub fn new(a: Point2, b: Point2) -> Self {
            if a.key_cmp(&b, DEFAULT_TOLERANCE) == Ordering::Greater {
                Self { start: b, end: a }
            } else {
                Self { start: a, end: b }
            }
        }

        #[inline]
        pub fn start(&self) -> Point2 {
            self.start
        }

        #[inline]
        pub fn end(&self) -> Point2 {
            self.end
        }

        #[inline]
        pub fn midpoint(&self) -> Point2 {
            self.start.midpoint(self.end)
        }

        #[inline]
        pub fn length(&self) -> f64 {
            self.start.distance_to(self.end)
        }

        #[inline]
        pub fn angle(&self) -> f64 {
            self.start.vector_to(self.end).angle()
        }

        /// 端点非有限值或长度不超过容差。
        #[inline]
        pub fn is_degenerate(&self, tolerance: f64) -> bool {
            !self.start.is_finite() || !self.end.is_finite() || self.length() <= tolerance
        }

        /// 等分为 `count` 段；`count` 为 0 或 1 时返回自身。
        pub fn divide(&self, count: usize) -> Vec<Segment> {
            if count <= 1 {
                return vec![*self];
            }
            let step = 1.0 / count as f64;
            (0..count)
                .map(|index| {
                    let a = self.start.lerp(self.end, index as f64 * step);
                    let b = if index + 1 == count {
                        self.end
                    } else {
                        self.start.lerp(self.end, (index + 1) as f64 * step)
                    };
                    Segment::new(a, b)
                })
                .collect()
        }
    }

    impl GeometricKey for Segment {
        fn key_eq(&self, other: &Self, tolerance: f64) -> bool {
            let direct = self.start.approx_eq(other.start, tolerance)
                && self.end.approx_eq(other.end, tolerance);
            let reversed = self.start.approx_eq(other.end, tolerance)
                && self.end.approx_eq(other.start, tolerance);
            direct || reversed
        }

        /// 先比较中点，再比较起点。
        fn key_cmp(&self, other: &Self, tolerance: f64) -> Ordering {
            self.midpoint()
                .key_cmp(&other.midpoint(), tolerance)
                .then_with(|| self.start.key_cmp(&other.start, tolerance))
        }
    }

    /// 四边形，顶点按调用方给定的顺序保存（首尾相连）。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Quad {
        vertices: [Point2; 4],
    }

    impl Quad {
        #[inline]
        pub fn new(vertices: [Point2; 4]) -> Self {
            Self { vertices }
        }

        #[inline]
        pub fn vertices(&self) -> [Point2; 4] {
            self.vertices
        }

        pub fn center(&self) -> Point2 {
            let sum = self
                .vertices
                .iter()
                .fold(DVec2::ZERO, |acc, vertex| acc + vertex.as_vec2());
            Point2::from_vec(sum * 0.25)
        }

        /// 四条边（`v0v1`、`v1v2`、`v2v3`、`v3v0`）。
        pub fn edges(&self) -> [Segment; 4] {
            let v = self.vertices;
            [
                Segment::new(v[0], v[1]),
                Segment::new(v[1], v[2]),
                Segment::new(v[2], v[3]),
                Segment::new(v[3], v[0]),
            ]
        }

        pub fn edge_midpoints(&self) -> [Point2; 4] {
            self.edges().map(|edge| edge.midpoint())
        }

        /// 顶点按点的全序排列，判等与排序都基于此顶点集合。
        pub fn sorted_vertices(&self, tolerance: f64) -> [Point2; 4] {
            let mut sorted = self.vertices;
            sorted.sort_by(|a, b| a.key_cmp(b, tolerance));
            sorted
        }

        /// 四个角均为直角且无退化边时视为矩形。
        pub fn is_rectangular(&self, tolerance: f64) -> bool {
            let v = self.vertices;
            (0..4).all(|index| {
                let prev = v[(index + 3) % 4];
                let current = v[index];
                let next = v[(index + 1) % 4];
                let a = current.vector_to(prev);
                let b = current.vector_to(next);
                let (la, lb) = (a.length(), b.length());
                if la <= tolerance || lb <= tolerance {
                    return false;
                }
                (a.dot(b) / (la * lb)).abs() <= RIGHT_ANGLE_COSINE
            })
        }

        /// 划分为 `rows × cols` 个子四边形，按行优先排列；非矩形或块数溢出时返回 `None`。
        ///
        /// 列沿 `v0 → v1` 方向，行沿 `v0 → v3` 方向。
        pub fn divide(&self, rows: usize, cols: usize, tolerance: f64) -> Option<Vec<Quad>> {
            let count = rows.checked_mul(cols)?;
            if count == 0 || !self.is_rectangular(tolerance) {
                return None;
            }
            let [v0, v1, _, v3] = self.vertices;
            let u_axis = v0.vector_to(v1).as_vec2();
            let v_axis = v0.vector_to(v3).as_vec2();
            let at = |u: f64, v: f64| Point2::from_vec(v0.as_vec2() + u_axis * u + v_axis * v);

            let mut quads = Vec::with_capacity(count);
            for row in 0..rows {
                let v_lo = row as f64 / rows as f64;
                let v_hi = (row + 1) as f64 / rows as f64;
                for col in 0..cols {
                    let u_lo = col as f64 / cols as f64;
                    let u_hi = (col + 1) as f64 / cols as f64;
                    quads.push(Quad::new([
                        at(u_lo, v_lo),
                        at(u_hi, v_lo),
                        at(u_hi, v_hi),
                        at(u_lo, v_hi),
                    ]));
                }
            }
            Some(quads)
        }
    }

    impl GeometricKey for Quad {
        fn key_eq(&self, other: &Self, tolerance: f64) -> bool {
            self.sorted_vertices(tolerance)
                .iter()
                .zip(other.sorted_vertices(tolerance).iter())
                .all(|(a, b)| a.approx_eq(*b, tolerance))
        }

        /// 先比较形心，再逐个比较排序后的顶点。
        fn key_cmp(&self, other: &Self, tolerance: f64) -> Ordering {
            let by_center = self.center().key_cmp(&other.center(), tolerance);
            if by_center != Ordering::Equal {
                return by_center;
            }
            let mine = self.sorted_vertices(tolerance);
            let theirs = other.sorted_vertices(tolerance);
            mine.iter()
                .zip(theirs.iter())
                .map(|(a, b)| a.key_cmp(b, tolerance))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        const TOL: f64 = DEFAULT_TOLERANCE;

        #[test]
        fn points_within_tolerance_are_equal() {
            let a = Point2::new(1.0, 2.0);
            assert!(a.key_eq(&Point2::new(1.0005, 1.9995), TOL));
            assert!(!a.key_eq(&Point2::new(1.01, 2.0), TOL));
            assert_eq!(a.key_cmp(&Point2::new(1.0002, 2.0), TOL), Ordering::Equal);
        }

        #[test]
        fn points_order_by_x_then_y() {
            let mut points = vec![
                Point2::new(1.0, 0.0),
                Point2::new(0.0, 5.0),
                Point2::new(0.0, -1.0),
            ];
            points.sort_by(|a, b| a.key_cmp(b, TOL));
            assert_eq!(points[0], Point2::new(0.0, -1.0));
            assert_eq!(points[1], Point2::new(0.0, 5.0));
            assert_eq!(points[2], Point2::new(1.0, 0.0));
        }

        #[test]
        fn segment_is_canonical_regardless_of_direction() {
            let a = Point2::new(3.0, 1.0);
            let b = Point2::new(-2.0, 4.0);
            let forward = Segment::new(a, b);
            let backward = Segment::new(b, a);
            assert_eq!(forward, backward);
            assert_eq!(forward.start(), b);
            assert!(forward.key_eq(&backward, TOL));
            assert_eq!(forward.key_cmp(&backward, TOL), Ordering::Equal);
        }

        #[test]
        fn segment_divides_into_equal_parts() {
            let segment = Segment::new(Point2::new(0.0, 0.0), Point2::new(3.0, 0.0));
            let parts = segment.divide(3);
            assert_eq!(parts.len(), 3);
            for (index, part) in parts.iter().enumerate() {
                assert!((part.start().x() - index as f64).abs() < 1e-9);
                assert!((part.end().x() - (index + 1) as f64).abs() < 1e-9);
                assert!((part.length() - 1.0).abs() < 1e-9);
            }
            assert_eq!(segment.divide(0), vec![segment]);
        }

        #[test]
        fn quad_equality_ignores_vertex_rotation() {
            let a = Quad::new([
                Point2::new(0.0, 0.0),
                Point2::new(2.0, 0.0),
                Point2::new(2.0, 1.0),
                Point2::new(0.0, 1.0),
            ]);
            let b = Quad::new([
                Point2::new(2.0, 1.0),
                Point2::new(0.0, 1.0),
                Point2::new(0.0, 0.0),
                Point2::new(2.0, 0.0),
            ]);
            assert!(a.key_eq(&b, TOL));
            assert_eq!(a.key_cmp(&b, TOL), Ordering::Equal);
            let c = Point2::new(1.0, 0.5);
            assert!(a.center().approx_eq(c, 1e-12));
        }

        #[test]
        fn rectangular_quad_divides_row_major() {
            let quad = Quad::new([
                Point2::new(0.0, 0.0),
                Point2::new(4.0, 0.0),
                Point2::new(4.0, 2.0),
                Point2::new(0.0, 2.0),
            ]);
            let parts = quad.divide(2, 2, TOL).expect("rectangle should divide");
            assert_eq!(parts.len(), 4);
            assert!(parts[0].center().approx_eq(Point2::new(1.0, 0.5), 1e-9));
            assert!(parts[1].center().approx_eq(Point2::new(3.0, 0.5), 1e-9));
            assert!(parts[3].center().approx_eq(Point2::new(3.0, 1.5), 1e-9));
        }

        #[test]
        fn skewed_quad_is_not_divisible() {
            let quad = Quad::new([
                Point2::new(0.0, 0.0),
                Point2::new(4.0, 0.0),
                Point2::new(5.0, 2.0),
                Point2::new(0.0, 2.0),
            ]);
            assert!(!quad.is_rectangular(TOL));
            assert!(quad.divide(2, 2, TOL).is_none());
        }

        #[test]
        fn overflowing_piece_count_is_not_divisible() {
            let quad = Quad::new([
                Point2::new(0.0, 0.0),
                Point2::new(4.0, 0.0),
                Point2::new(4.0, 2.0),
                Point2::new(0.0, 2.0),
            ]);
            assert!(quad.divide(usize::MAX / 2, 3, TOL).is_none());
        }

        #[test]
        fn non_finite_segment_is_degenerate() {
            let nan = Segment::new(Point2::new(f64::NAN, 0.0), Point2::new(1.0, 0.0));
            assert!(nan.is_degenerate(TOL));
            let infinite = Segment::new(Point2::new(0.0, 0.0), Point2::new(f64::INFINITY, 0.0));
            assert!(infinite.is_degenerate(TOL));
            assert!(!Segment::new(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)).is_degenerate(TOL));
        }
    }
}

pub mod document {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Point2, Vector2};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    /// 扩展字典句柄，首次写入记录时分配。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RecordHandle(u64);

    impl RecordHandle {
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    /// 记录中的单个类型化标量。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", content = "value")]
    pub enum TypedValue {
        Real(f64),
        Integer(i32),
        Text(String),
        Handle(u64),
    }

    impl TypedValue {
        /// 整数也可按实数读取，兼容旧版本图纸。
        pub fn as_real(&self) -> Option<f64> {
            match self {
                TypedValue::Real(value) => Some(*value),
                TypedValue::Integer(value) => Some(f64::from(*value)),
                _ => None,
            }
        }

        pub fn as_integer(&self) -> Option<i32> {
            match self {
                TypedValue::Integer(value) => Some(*value),
                _ => None,
            }
        }

        pub fn as_text(&self) -> Option<&str> {
            match self {
                TypedValue::Text(value) => Some(value),
                _ => None,
            }
        }

        pub fn as_handle(&self) -> Option<u64> {
            match self {
                TypedValue::Handle(value) => Some(*value),
                _ => None,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        pub is_visible: bool,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                is_visible: true,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum Entity {
        Point(PointEntity),
        Line(Line),
        Polyline(Polyline),
        BlockReference(BlockReference),
        Text(Text),
    }

    impl Entity {
        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Point(point) => &point.layer,
                Entity::Line(line) => &line.layer,
                Entity::Polyline(polyline) => &polyline.layer,
                Entity::BlockReference(reference) => &reference.layer,
                Entity::Text(text) => &text.layer,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PointEntity {
        pub position: Point2,
        pub layer: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub layer: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<Point2>,
        pub is_closed: bool,
        pub layer: String,
    }

    /// 块参照，旋转角以弧度储存。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct BlockReference {
        pub name: String,
        pub insert: Point2,
        pub scale: Vector2,
        pub rotation: f64,
        pub layer: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Text {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub rotation: f64,
        pub layer: String,
    }

    /// 附着在单个实体上的扩展字典。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ExtensionDictionary {
        pub owner: EntityId,
        pub handle: RecordHandle,
        pub records: BTreeMap<String, Vec<TypedValue>>,
    }

    /// 文档向引擎报告的外部变更。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum DocumentEvent {
        Erased(EntityId),
        Restored(EntityId),
    }

    #[derive(Debug, Clone)]
    struct ErasedEntity {
        id: EntityId,
        entity: Entity,
        dictionary: Option<ExtensionDictionary>,
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        layers: BTreeMap<String, Layer>,
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
        #[serde(default)]
        dictionaries: Vec<ExtensionDictionary>,
        #[serde(default)]
        named_objects: BTreeMap<String, Vec<TypedValue>>,
        #[serde(default)]
        next_handle: u64,
        #[serde(skip)]
        erased: Vec<ErasedEntity>,
        #[serde(skip)]
        events: Vec<DocumentEvent>,
    }

    impl Document {
        pub fn new() -> Self {
            let mut doc = Self::default();
            doc.ensure_layer("0");
            doc
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            self.layers
                .entry(key.to_string())
                .or_insert_with(|| Layer::new(key));
        }

        pub fn add_point(&mut self, position: Point2, layer: impl Into<String>) -> EntityId {
            let layer = layer.into();
            self.push(Entity::Point(PointEntity { position, layer }))
        }

        pub fn add_line(
            &mut self,
            start: Point2,
            end: Point2,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.push(Entity::Line(Line { start, end, layer }))
        }

        pub fn add_polyline<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = Point2>,
        {
            let layer = layer.into();
            self.push(Entity::Polyline(Polyline {
                vertices: vertices.into_iter().collect(),
                is_closed,
                layer,
            }))
        }

        pub fn add_block_reference(
            &mut self,
            name: impl Into<String>,
            insert: Point2,
            scale: Vector2,
            rotation: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.push(Entity::BlockReference(BlockReference {
                name: name.into(),
                insert,
                scale,
                rotation,
                layer,
            }))
        }

        pub fn add_text(
            &mut self,
            insert: Point2,
            content: impl Into<String>,
            height: f64,
            rotation: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.push(Entity::Text(Text {
                insert,
                content: content.into(),
                height,
                rotation,
                layer,
            }))
        }

        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            self.push(entity)
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.values()
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        #[inline]
        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities
                .iter()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        #[inline]
        pub fn contains(&self, id: EntityId) -> bool {
            self.entity(id).is_some()
        }

        /// 删除实体及其扩展字典，并记录到撤销栈。实体不存在时返回 `false`。
        pub fn erase(&mut self, id: EntityId) -> bool {
            let Some(erased) = self.take(id) else {
                return false;
            };
            self.erased.push(erased);
            self.events.push(DocumentEvent::Erased(id));
            true
        }

        /// 删除实体及其扩展字典，不记录撤销、不产生事件。
        pub fn discard(&mut self, id: EntityId) -> bool {
            self.take(id).is_some()
        }

        fn take(&mut self, id: EntityId) -> Option<ErasedEntity> {
            let index = self
                .entities
                .iter()
                .position(|(entity_id, _)| *entity_id == id)?;
            let (_, entity) = self.entities.remove(index);
            let dictionary = self
                .dictionaries
                .iter()
                .position(|dictionary| dictionary.owner == id)
                .map(|index| self.dictionaries.remove(index));
            Some(ErasedEntity {
                id,
                entity,
                dictionary,
            })
        }

        /// 撤销最近一次删除：以原 ID 恢复实体和扩展字典。
        pub fn undo_erase(&mut self) -> Option<EntityId> {
            let ErasedEntity {
                id,
                entity,
                dictionary,
            } = self.erased.pop()?;
            self.ensure_layer(entity.layer_name());
            self.entities.push((id, entity));
            if let Some(dictionary) = dictionary {
                self.dictionaries.push(dictionary);
            }
            self.events.push(DocumentEvent::Restored(id));
            Some(id)
        }

        /// 取走尚未处理的外部变更通知。
        pub fn drain_events(&mut self) -> Vec<DocumentEvent> {
            std::mem::take(&mut self.events)
        }

        /// 向实体的扩展字典写入记录；首次写入时分配字典。
        ///
        /// 实体已失效时返回 `None`；`overwrite = false` 时保留已有同名记录。
        pub fn write_record(
            &mut self,
            id: EntityId,
            name: &str,
            values: &[TypedValue],
            overwrite: bool,
        ) -> Option<RecordHandle> {
            if !self.contains(id) {
                return None;
            }
            let index = match self
                .dictionaries
                .iter()
                .position(|dictionary| dictionary.owner == id)
            {
                Some(index) => index,
                None => {
                    let handle = RecordHandle(self.next_handle);
                    self.next_handle += 1;
                    self.dictionaries.push(ExtensionDictionary {
                        owner: id,
                        handle,
                        records: BTreeMap::new(),
                    });
                    self.dictionaries.len() - 1
                }
            };
            let dictionary = &mut self.dictionaries[index];
            if overwrite || !dictionary.records.contains_key(name) {
                dictionary
                    .records
                    .insert(name.to_string(), values.to_vec());
            }
            Some(dictionary.handle)
        }

        /// 实体当前的字典句柄；尚未写入过记录时为 `None`。
        pub fn dictionary_handle(&self, id: EntityId) -> Option<RecordHandle> {
            self.dictionaries
                .iter()
                .find(|dictionary| dictionary.owner == id)
                .map(|dictionary| dictionary.handle)
        }

        pub fn read_record(&self, handle: RecordHandle, name: &str) -> Option<&[TypedValue]> {
            self.dictionaries
                .iter()
                .find(|dictionary| dictionary.handle == handle)
                .and_then(|dictionary| dictionary.records.get(name))
                .map(Vec::as_slice)
        }

        /// 写入文档级命名对象字典。
        pub fn write_named(&mut self, name: &str, values: &[TypedValue], overwrite: bool) -> bool {
            if !overwrite && self.named_objects.contains_key(name) {
                return false;
            }
            self.named_objects.insert(name.to_string(), values.to_vec());
            true
        }

        pub fn read_named(&self, name: &str) -> Option<&[TypedValue]> {
            self.named_objects.get(name).map(Vec::as_slice)
        }

        pub fn named_records(&self) -> impl Iterator<Item = (&String, &Vec<TypedValue>)> {
            self.named_objects.iter()
        }

        fn push(&mut self, entity: Entity) -> EntityId {
            self.ensure_layer(entity.layer_name());
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        #[inline]
        fn next_id(&mut self) -> EntityId {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            EntityId(id)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::geometry::Point2;

        #[test]
        fn document_stores_entities() {
            let mut doc = Document::new();
            let point = doc.add_point(Point2::new(0.0, 0.0), "ExtNode");
            let line = doc.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "Stringer");
            let panel = doc.add_polyline(
                [
                    Point2::new(0.0, 0.0),
                    Point2::new(10.0, 0.0),
                    Point2::new(10.0, 5.0),
                    Point2::new(0.0, 5.0),
                ],
                true,
                "Panel",
            );

            assert_eq!(point.get(), 0);
            assert_eq!(line.get(), 1);
            assert_eq!(panel.get(), 2);
            let layers: Vec<_> = doc.layers().map(|l| l.name.clone()).collect();
            assert!(layers.contains(&"0".to_string()));
            assert!(layers.contains(&"Stringer".to_string()));
            assert_eq!(doc.entities().count(), 3);

            match doc.entity(line) {
                Some(Entity::Line(line)) => assert_eq!(line.layer, "Stringer"),
                other => panic!("unexpected entity lookup result: {other:?}"),
            }

        }

        #[test]
        fn records_allocate_dictionary_lazily_and_respect_overwrite() {
            let mut doc = Document::new();
            let id = doc.add_point(Point2::new(1.0, 1.0), "ExtNode");
            assert!(doc.dictionary_handle(id).is_none());

            let handle = doc
                .write_record(id, "Support", &[TypedValue::Integer(1)], true)
                .expect("entity is alive");
            assert_eq!(doc.dictionary_handle(id), Some(handle));

            let again = doc
                .write_record(id, "Support", &[TypedValue::Integer(3)], false)
                .expect("entity is alive");
            assert_eq!(again, handle);
            assert_eq!(
                doc.read_record(handle, "Support"),
                Some(&[TypedValue::Integer(1)][..])
            );

            doc.write_record(id, "Support", &[TypedValue::Integer(3)], true);
            assert_eq!(
                doc.read_record(handle, "Support"),
                Some(&[TypedValue::Integer(3)][..])
            );
            assert!(doc.read_record(handle, "Missing").is_none());
        }

        #[test]
        fn stale_references_degrade_to_none() {
            let mut doc = Document::new();
            let id = doc.add_point(Point2::new(1.0, 1.0), "ExtNode");
            let handle = doc
                .write_record(id, "Support", &[TypedValue::Integer(2)], true)
                .unwrap();
            assert!(doc.erase(id));
            assert!(!doc.erase(id));
            assert!(doc.write_record(id, "Support", &[], true).is_none());
            assert!(doc.read_record(handle, "Support").is_none());
        }

        #[test]
        fn discard_skips_undo_stack_and_events() {
            let mut doc = Document::new();
            let kept = doc.add_point(Point2::new(0.0, 0.0), "ExtNode");
            let dropped = doc.add_point(Point2::new(1.0, 0.0), "ExtNode");
            doc.erase(kept);
            doc.drain_events();

            assert!(doc.discard(dropped));
            assert!(!doc.discard(dropped));
            assert!(!doc.contains(dropped));
            assert!(doc.drain_events().is_empty());
            assert_eq!(doc.undo_erase(), Some(kept));
            assert_eq!(doc.undo_erase(), None);
        }

        #[test]
        fn undo_erase_restores_entity_and_records() {
            let mut doc = Document::new();
            let id = doc.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "Stringer");
            let handle = doc
                .write_record(id, "Stringer", &[TypedValue::Real(120.0)], true)
                .unwrap();
            doc.erase(id);
            assert_eq!(doc.undo_erase(), Some(id));
            assert!(doc.contains(id));
            assert_eq!(
                doc.read_record(handle, "Stringer"),
                Some(&[TypedValue::Real(120.0)][..])
            );
            assert_eq!(
                doc.drain_events(),
                vec![DocumentEvent::Erased(id), DocumentEvent::Restored(id)]
            );
            assert!(doc.drain_events().is_empty());
            assert!(doc.undo_erase().is_none());
        }

        #[test]
        fn named_objects_are_not_clobbered_without_overwrite() {
            let mut doc = Document::new();
            assert!(doc.write_named("Steel:500", &[TypedValue::Real(500.0)], false));
            assert!(!doc.write_named("Steel:500", &[TypedValue::Real(1.0)], false));
            assert_eq!(
                doc.read_named("Steel:500"),
                Some(&[TypedValue::Real(500.0)][..])
            );
        }

        #[test]
        fn document_survives_json_round_trip() {
            let mut doc = Document::new();
            let id = doc.add_block_reference(
                "SupportXY",
                Point2::new(2.0, 3.0),
                Vector2::new(1.0, 1.0),
                0.0,
                "Support",
            );
            doc.write_record(id, "Support", &[TypedValue::Integer(3)], true);
            let json = serde_json::to_string(&doc).expect("serialize document");
            let restored: Document = serde_json::from_str(&json).expect("deserialize document");
            let handle = restored.dictionary_handle(id).expect("dictionary kept");
            assert_eq!(
                restored.read_record(handle, "Support"),
                Some(&[TypedValue::Integer(3)][..])
            );
            assert_eq!(restored.entity(id), doc.entity(id));
        }
    }
}
